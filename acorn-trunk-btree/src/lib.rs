//! Durable ordered [`Trunk`] over `sled` (§4.1 "BTree trunk — durable
//! ordered key/value pages").
//!
//! Live values live in sled's default tree keyed by id; history is
//! kept in a second named tree as a JSON-encoded `Vec<Nut<T>>` per id,
//! mirroring the file trunk's in-memory history map but durable.

use std::marker::PhantomData;
use std::path::Path;

use acorn_core::{AcornError, AcornResult, Nut, Trunk, TrunkCapabilities};
use serde::{de::DeserializeOwned, Serialize};

fn ser_err(err: serde_json::Error) -> AcornError {
    AcornError::Serialization(err.to_string())
}

fn sled_err(err: sled::Error) -> AcornError {
    AcornError::StorageUnavailable(err.to_string())
}

/// `sled`-backed [`Trunk`]. Keys are ordered, so a reader iterating the
/// underlying db sees ids in byte order; `load_all` does not rely on
/// that ordering, but nothing prevents a caller from opening the same
/// path directly for ordered scans.
pub struct BTreeTrunk<T> {
    live: sled::Tree,
    history: sled::Tree,
    _marker: PhantomData<T>,
}

impl<T> std::fmt::Debug for BTreeTrunk<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BTreeTrunk")
            .field("live_entries", &self.live.len())
            .finish()
    }
}

impl<T> BTreeTrunk<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Opens (creating if absent) a sled database at `path`.
    pub fn open(path: impl AsRef<Path>) -> AcornResult<Self> {
        let db = sled::open(path).map_err(sled_err)?;
        Self::from_db(&db)
    }

    /// Builds a trunk from an already-open `sled::Db`, useful for
    /// sharing one db across multiple trees keyed by type name.
    pub fn from_db(db: &sled::Db) -> AcornResult<Self> {
        let live = db.open_tree("live").map_err(sled_err)?;
        let history = db.open_tree("history").map_err(sled_err)?;
        Ok(BTreeTrunk {
            live,
            history,
            _marker: PhantomData,
        })
    }

    fn push_history(&self, id: &str, nut: &Nut<T>) -> AcornResult<()> {
        let mut entries: Vec<Nut<T>> = match self.history.get(id).map_err(sled_err)? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(ser_err)?,
            None => Vec::new(),
        };
        entries.push(nut.clone());
        let bytes = serde_json::to_vec(&entries).map_err(ser_err)?;
        self.history.insert(id, bytes).map_err(sled_err)?;
        Ok(())
    }
}

impl<T> Trunk<T> for BTreeTrunk<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn save(&self, id: &str, nut: Nut<T>) -> AcornResult<()> {
        self.push_history(id, &nut)?;
        let bytes = serde_json::to_vec(&nut).map_err(ser_err)?;
        self.live.insert(id, bytes).map_err(sled_err)?;
        self.live.flush().map_err(sled_err)?;
        Ok(())
    }

    fn load(&self, id: &str) -> AcornResult<Option<Nut<T>>> {
        match self.live.get(id).map_err(sled_err)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    fn delete(&self, id: &str) -> AcornResult<bool> {
        let removed = self.live.remove(id).map_err(sled_err)?.is_some();
        if removed {
            self.live.flush().map_err(sled_err)?;
        }
        Ok(removed)
    }

    fn load_all(&self) -> AcornResult<Vec<Nut<T>>> {
        let mut out = Vec::new();
        for entry in self.live.iter() {
            let (_, bytes) = entry.map_err(sled_err)?;
            out.push(serde_json::from_slice(&bytes).map_err(ser_err)?);
        }
        Ok(out)
    }

    fn history(&self, id: &str) -> AcornResult<Option<Vec<Nut<T>>>> {
        match self.history.get(id).map_err(sled_err)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    fn capabilities(&self) -> TrunkCapabilities {
        TrunkCapabilities::new("btree").durable().with_history()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn open_temp() -> (tempfile::TempDir, BTreeTrunk<u32>) {
        let dir = tempfile::tempdir().unwrap();
        let trunk = BTreeTrunk::open(dir.path().join("db")).unwrap();
        (dir, trunk)
    }

    #[test]
    fn save_load_delete_round_trip() {
        let (_dir, trunk) = open_temp();
        trunk.save("k1", Nut::new("k1", 1, SystemTime::UNIX_EPOCH, 0)).unwrap();
        assert_eq!(trunk.load("k1").unwrap().unwrap().payload, Some(1));
        assert!(trunk.delete("k1").unwrap());
        assert!(trunk.load("k1").unwrap().is_none());
    }

    #[test]
    fn history_survives_delete_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("db");
        {
            let trunk: BTreeTrunk<u32> = BTreeTrunk::open(&db_path).unwrap();
            trunk.save("k1", Nut::new("k1", 1, SystemTime::UNIX_EPOCH, 0)).unwrap();
            trunk.save("k1", Nut::new("k1", 2, SystemTime::UNIX_EPOCH, 1)).unwrap();
            trunk.delete("k1").unwrap();
        }
        let reopened: BTreeTrunk<u32> = BTreeTrunk::open(&db_path).unwrap();
        let history = reopened.history("k1").unwrap().unwrap();
        assert_eq!(history.len(), 2);
        assert!(reopened.load("k1").unwrap().is_none());
    }

    #[test]
    fn load_all_enumerates_live_entries() {
        let (_dir, trunk) = open_temp();
        trunk.save("a", Nut::new("a", 1, SystemTime::UNIX_EPOCH, 0)).unwrap();
        trunk.save("b", Nut::new("b", 2, SystemTime::UNIX_EPOCH, 0)).unwrap();
        assert_eq!(trunk.load_all().unwrap().len(), 2);
    }
}

#[cfg(all(test, feature = "contract-tests"))]
mod contract_tests {
    use super::*;
    use acorn_test_harness::TrunkContract;

    fn open_temp_bytes() -> (tempfile::TempDir, BTreeTrunk<Vec<u8>>) {
        let dir = tempfile::tempdir().unwrap();
        let trunk = BTreeTrunk::open(dir.path().join("db")).unwrap();
        (dir, trunk)
    }

    #[test]
    fn satisfies_trunk_contract() {
        let (_dir, trunk) = open_temp_bytes();
        TrunkContract::round_trip_bytes(&trunk).unwrap();
        TrunkContract::history_survives_delete(&trunk).unwrap();
    }

    #[test]
    fn satisfies_load_all_contract() {
        let (_dir, trunk) = open_temp_bytes();
        TrunkContract::load_all_enumerates_once(&trunk).unwrap();
    }

    #[test]
    fn advertises_durable_and_history_capabilities() {
        let (_dir, trunk) = open_temp_bytes();
        TrunkContract::assert_capabilities(&trunk, true, true);
    }
}
