//! Dedup ledger: the set of item ids already reported for one network.

use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::{fs, io::AsyncWriteExt};

use crate::{domain::ItemId, errors::Error, Result};

/// Membership + append over reported ids.
///
/// Implementations must make an id durable before `contains` reports it, and
/// must never forget an id once appended.
#[async_trait]
pub trait Ledger: Send + Sync {
    fn contains(&self, id: ItemId) -> bool;

    async fn append(&mut self, id: ItemId) -> Result<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ledger backed by a newline-delimited, append-only id log.
#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    ids: HashSet<ItemId>,
}

impl FileLedger {
    /// Load every id from `path`, creating an empty log when it does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents = match fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(|e| Error::persistence(parent, e))?;
                }
                fs::write(&path, "")
                    .await
                    .map_err(|e| Error::persistence(&path, e))?;
                String::new()
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let ids = parse_log(&path, &contents)?;
        Ok(Self { path, ids })
    }
}

fn parse_log(path: &Path, contents: &str) -> Result<HashSet<ItemId>> {
    let mut ids = HashSet::new();
    for (idx, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let id = line.parse::<ItemId>().map_err(|_| Error::CorruptLedger {
            path: path.to_path_buf(),
            line: idx + 1,
            content: line.to_string(),
        })?;
        ids.insert(id);
    }
    Ok(ids)
}

#[async_trait]
impl Ledger for FileLedger {
    fn contains(&self, id: ItemId) -> bool {
        self.ids.contains(&id)
    }

    async fn append(&mut self, id: ItemId) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| Error::persistence(&self.path, e))?;
        file.write_all(format!("{id}\n").as_bytes())
            .await
            .map_err(|e| Error::persistence(&self.path, e))?;
        file.sync_data()
            .await
            .map_err(|e| Error::persistence(&self.path, e))?;

        self.ids.insert(id);
        Ok(())
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}
