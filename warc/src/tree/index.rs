use wcore::msgpack::Value;

use crate::error::ArchiveError;

/// Nested array projection of a tree: `[name, size]` for a file and
/// `[name, size, [child, ...]]` for a directory. The root must be a directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexNode {
    File {
        name: String,
        size: u64,
    },
    Dir {
        name: String,
        size: u64,
        children: Vec<IndexNode>,
    },
}

impl IndexNode {
    pub fn name(&self) -> &str {
        match self {
            IndexNode::File { name, .. } | IndexNode::Dir { name, .. } => name,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            IndexNode::File { size, .. } | IndexNode::Dir { size, .. } => *size,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            IndexNode::File { name, size } => Value::Array(vec![name.as_str().into(), (*size).into()]),
            IndexNode::Dir { name, size, children } => Value::Array(vec![
                name.as_str().into(),
                (*size).into(),
                Value::Array(children.iter().map(IndexNode::to_value).collect()),
            ]),
        }
    }

    pub fn from_root_value(value: &Value) -> Result<IndexNode, ArchiveError> {
        IndexNode::from_value(value, true)
    }

    fn from_value(value: &Value, is_root: bool) -> Result<IndexNode, ArchiveError> {
        let items = value
            .as_array()
            .ok_or_else(|| malformed("node is not an array"))?;

        let (name, size, children) = match items {
            [name, size] => (name, size, None),
            [name, size, children] => (name, size, Some(children)),
            _ => return Err(malformed("node needs two or three fields")),
        };
        let name = name
            .as_str()
            .ok_or_else(|| malformed("node name is not a string"))?
            .to_string();
        let size = size
            .as_u64()
            .ok_or_else(|| malformed("node size is not an unsigned integer"))?;

        let children = match children {
            None if is_root => return Err(malformed("root is not a directory")),
            None => return Ok(IndexNode::File { name, size }),
            Some(children) => children
                .as_array()
                .ok_or_else(|| malformed("directory children are not an array"))?,
        };

        let children = children
            .iter()
            .map(|v| IndexNode::from_value(v, false))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(IndexNode::Dir { name, size, children })
    }
}

fn malformed(why: &str) -> ArchiveError {
    ArchiveError::Format(format!("malformed index: {}", why))
}
