//! JSON-file repository. Each entity lives in its own `<entity>s.json` file
//! under a data directory; every write rewrites the file through a temporary
//! file and a rename so readers never see a torn snapshot.

use confgate_core::error::{StoreError, StoreResult};
use confgate_core::store::Repository;
use confgate_core::types::{ConfigRecord, TenantScope};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

type RecordMap<R> = BTreeMap<(String, TenantScope), R>;

pub struct FileRepository<R: ConfigRecord> {
    path: PathBuf,
    records: RwLock<RecordMap<R>>,
}

impl<R> FileRepository<R>
where
    R: ConfigRecord + Serialize + DeserializeOwned,
{
    /// Open (or create) the repository file for `R` inside `dir`.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}s.json", R::ENTITY));

        let mut records = BTreeMap::new();
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            if !contents.trim().is_empty() {
                let list: Vec<R> = serde_json::from_str(&contents)?;
                for record in list {
                    let slot = (record.key().to_string(), record.scope().clone());
                    if records.insert(slot, record).is_some() {
                        return Err(StoreError::Corrupt {
                            key: path.display().to_string(),
                            reason: "duplicate (key, scope) pair".into(),
                        });
                    }
                }
            }
        }

        info!(path = %path.display(), records = records.len(), "Opened file repository");
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, records: &RecordMap<R>) -> StoreResult<()> {
        let list: Vec<&R> = records.values().collect();
        let json = serde_json::to_string_pretty(&list)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), records = list.len(), "Persisted repository");
        Ok(())
    }
}

impl<R> Repository<R> for FileRepository<R>
where
    R: ConfigRecord + Serialize + DeserializeOwned,
{
    fn find_one(&self, key: &str, scope: &TenantScope) -> StoreResult<Option<R>> {
        Ok(self
            .records
            .read()
            .get(&(key.to_string(), scope.clone()))
            .cloned())
    }

    fn upsert(&self, record: R) -> StoreResult<R> {
        let mut records = self.records.write();
        let slot = (record.key().to_string(), record.scope().clone());
        let previous = records.insert(slot.clone(), record.clone());
        if let Err(err) = self.persist(&records) {
            // Keep memory consistent with what is on disk.
            match previous {
                Some(prev) => records.insert(slot, prev),
                None => records.remove(&slot),
            };
            return Err(err);
        }
        Ok(record)
    }

    fn list(&self, scope: &TenantScope) -> StoreResult<Vec<R>> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|((_, s), _)| s == scope)
            .map(|(_, r)| r.clone())
            .collect())
    }

    fn find_all(&self, key: &str) -> StoreResult<Vec<R>> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|((k, _), _)| k == key)
            .map(|(_, r)| r.clone())
            .collect())
    }

    fn delete(&self, key: &str, scope: &TenantScope) -> StoreResult<bool> {
        let mut records = self.records.write();
        let slot = (key.to_string(), scope.clone());
        let Some(previous) = records.remove(&slot) else {
            return Ok(false);
        };
        if let Err(err) = self.persist(&records) {
            records.insert(slot, previous);
            return Err(err);
        }
        Ok(true)
    }
}
