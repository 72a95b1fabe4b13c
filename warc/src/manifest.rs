use time::OffsetDateTime;

use wcore::msgpack::{self, Timestamp, Value};

use crate::error::ArchiveError;
use crate::tree::{IndexNode, Tree, ROOT};

/// What travels in the encrypted index: descriptive metadata plus the tree.
///
/// Serialized as a map `{title, tags, memo, files, time?}`; `files` is the
/// nested index of the tree. Unknown keys are ignored on decode.
#[derive(Debug, Default)]
pub struct Manifest {
    pub title: String,
    pub tags: Vec<String>,
    pub memo: String,
    pub created: Option<OffsetDateTime>,
    pub tree: Tree,
}

impl Manifest {
    pub fn new(title: &str) -> Self {
        Manifest {
            title: title.to_string(),
            ..Manifest::default()
        }
    }

    /// Lay the tree out and serialize. Offsets start at 0 within the content.
    pub fn encode(&mut self) -> Result<Vec<u8>, ArchiveError> {
        let files = self.tree.build_index(ROOT, 0)?;

        let mut map = vec![
            (Value::from("title"), Value::from(self.title.as_str())),
            (
                Value::from("tags"),
                Value::Array(self.tags.iter().map(|t| Value::from(t.as_str())).collect()),
            ),
            (Value::from("memo"), Value::from(self.memo.as_str())),
            (Value::from("files"), files.to_value()),
        ];
        if let Some(created) = self.created {
            map.push((Value::from("time"), Value::Timestamp(Timestamp::from(created))));
        }

        Ok(msgpack::to_vec(&Value::Map(map))?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Manifest, ArchiveError> {
        let value = msgpack::from_slice(bytes)?;
        if value.as_map().is_none() {
            return Err(ArchiveError::Format("manifest is not a map".to_string()));
        }

        let text = |key: &str| -> Result<String, ArchiveError> {
            match value.get(key) {
                None | Some(Value::Nil) => Ok(String::new()),
                Some(Value::Str(s)) => Ok(s.clone()),
                Some(_) => Err(ArchiveError::Format(format!("manifest {} is not a string", key))),
            }
        };
        let title = text("title")?;
        let memo = text("memo")?;

        let tags = match value.get("tags") {
            None | Some(Value::Nil) => vec![],
            Some(Value::Array(items)) => items
                .iter()
                .map(|t| {
                    t.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| ArchiveError::Format("manifest tag is not a string".to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(ArchiveError::Format("manifest tags are not a list".to_string())),
        };

        let created = match value.get("time") {
            None | Some(Value::Nil) => None,
            Some(Value::Timestamp(ts)) => Some(
                ts.to_datetime()
                    .ok_or_else(|| ArchiveError::Format("manifest time out of range".to_string()))?,
            ),
            Some(_) => return Err(ArchiveError::Format("manifest time is not a timestamp".to_string())),
        };

        let files = value
            .get("files")
            .ok_or_else(|| ArchiveError::Format("manifest has no file index".to_string()))?;
        let tree = Tree::import_index(&IndexNode::from_root_value(files)?)?;

        Ok(Manifest {
            title,
            tags,
            memo,
            created,
            tree,
        })
    }
}
