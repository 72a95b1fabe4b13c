use log::debug;
use rusqlite as rs;
use rusqlite::{Connection, OptionalExtension};
use time::OffsetDateTime;

use wcore::hash;

use crate::chunks;
use crate::{ChunkSource, Discovery, ManifestDescriptor, Publisher, Tag, APP_TAG, OWNER_TAG};

/// Chunk addressed blob store backed by sqlite, in memory or on disk.
///
/// Every blob is appended to one global offset space and stored as the
/// chunks `chunks::layout` gives it, chunks are fetched by absolute offset.
pub struct MemoryStore {
    conn: Connection,
}

fn sql_err(e: rs::Error) -> String {
    e.to_string()
}

impl MemoryStore {
    pub fn new(filename: Option<&str>) -> Result<Self, String> {
        let conn = match filename {
            None => Connection::open_in_memory(),
            Some(f) => Connection::open(f),
        }
        .map_err(sql_err)?;

        // Setup the db
        conn.execute_batch(
            "BEGIN;
             CREATE TABLE IF NOT EXISTS blob (
                id VARCHAR NOT NULL PRIMARY KEY,
                start INTEGER NOT NULL,
                size INTEGER NOT NULL,
                ts INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS chunk (
                start INTEGER NOT NULL PRIMARY KEY,
                id VARCHAR NOT NULL,
                content BLOB NOT NULL
             );
             CREATE TABLE IF NOT EXISTS tag (
                id VARCHAR NOT NULL,
                name VARCHAR NOT NULL,
                value VARCHAR NOT NULL
             );
             COMMIT;",
        )
        .map_err(sql_err)?;

        Ok(MemoryStore { conn })
    }

    /// `(start offset, size)` of a blob
    pub fn locate(&self, id: &str) -> Result<Option<(u64, u64)>, String> {
        self.conn
            .prepare_cached("SELECT start, size FROM blob WHERE id = ?1")
            .map_err(sql_err)?
            .query_row(rs::params![id], |row| {
                Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64))
            })
            .optional()
            .map_err(sql_err)
    }

    pub fn tags(&self, id: &str) -> Result<Vec<Tag>, String> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT name, value FROM tag WHERE id = ?1 ORDER BY rowid ASC")
            .map_err(sql_err)?;
        let tags = stmt
            .query_map(rs::params![id], |row| {
                Ok(Tag {
                    name: row.get(0)?,
                    value: row.get(1)?,
                })
            })
            .map_err(sql_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_err)?;
        Ok(tags)
    }

    fn build_descriptor(&self, id: &str, start: u64, size: u64, ts: i64, leading: usize) -> Result<ManifestDescriptor, String> {
        let want = (leading as u64).min(size);
        let mut data = vec![];

        while (data.len() as u64) < want {
            let chunk = self.get_chunk(start + data.len() as u64)?;
            data.extend_from_slice(&chunk);
        }
        data.truncate(size as usize);

        Ok(ManifestDescriptor {
            id: id.to_string(),
            total_size: size,
            next_fetch_offset: start + data.len() as u64,
            leading_chunk: data,
            timestamp: ts,
        })
    }
}

impl Publisher for MemoryStore {
    fn publish(&mut self, data: &[u8], tags: &[Tag]) -> Result<String, String> {
        let id = hash::hash_bytes(data).to_id();
        if self.locate(&id)?.is_some() {
            debug!("blob {} already stored", id);
            return Ok(id);
        }

        let tx = self.conn.transaction().map_err(sql_err)?;
        let start: i64 = tx
            .query_row("SELECT COALESCE(MAX(start + size), 0) FROM blob", [], |row| row.get(0))
            .map_err(sql_err)?;
        let ts = OffsetDateTime::now_utc().unix_timestamp();

        tx.execute(
            "INSERT INTO blob (id, start, size, ts) VALUES (?1, ?2, ?3, ?4)",
            rs::params![id, start, data.len() as i64, ts],
        )
        .map_err(sql_err)?;

        let ranges = chunks::layout(data.len());
        for range in ranges.iter() {
            tx.execute(
                "INSERT INTO chunk (start, id, content) VALUES (?1, ?2, ?3)",
                rs::params![start + range.start as i64, id, &data[range.clone()]],
            )
            .map_err(sql_err)?;
        }

        for tag in tags {
            tx.execute(
                "INSERT INTO tag (id, name, value) VALUES (?1, ?2, ?3)",
                rs::params![id, tag.name, tag.value],
            )
            .map_err(sql_err)?;
        }
        tx.commit().map_err(sql_err)?;

        debug!("published {} at {}: {} bytes in {} chunks", id, start, data.len(), ranges.len());
        Ok(id)
    }
}

impl ChunkSource for MemoryStore {
    fn get_chunk(&self, offset: u64) -> Result<Vec<u8>, String> {
        let offset = i64::try_from(offset).map_err(|_| format!("offset {} out of range", offset))?;
        let found: Option<(i64, Vec<u8>)> = self
            .conn
            .prepare_cached("SELECT start, content FROM chunk WHERE start <= ?1 ORDER BY start DESC LIMIT 1")
            .map_err(sql_err)?
            .query_row(rs::params![offset], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()
            .map_err(sql_err)?;

        match found {
            Some((start, content)) if ((offset - start) as usize) < content.len() => {
                Ok(content[(offset - start) as usize..].to_vec())
            }
            _ => Err(format!("no chunk at offset {}", offset)),
        }
    }
}

impl Discovery for MemoryStore {
    fn descriptors(&self, owner: &str, app: &str, leading: usize) -> Result<Vec<ManifestDescriptor>, String> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT b.id, b.start, b.size, b.ts
                 FROM blob b
                 WHERE EXISTS (SELECT 1 FROM tag t WHERE t.id = b.id AND t.name = ?1 AND t.value = ?2)
                 AND EXISTS (SELECT 1 FROM tag t WHERE t.id = b.id AND t.name = ?3 AND t.value = ?4)
                 ORDER BY b.start DESC",
            )
            .map_err(sql_err)?;

        let rows = stmt
            .query_map(rs::params![APP_TAG, app, OWNER_TAG, owner], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .map_err(sql_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_err)?;

        rows.into_iter()
            .map(|(id, start, size, ts)| self.build_descriptor(&id, start as u64, size as u64, ts, leading))
            .collect()
    }
}
