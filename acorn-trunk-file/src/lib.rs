//! Append-only file [`Trunk`]: a log of length-prefixed JSON records,
//! replayed on open (§4.1, §6 on-disk format).
//!
//! Each record is `{op: "save"|"delete", id, nut?}`. The file is only
//! ever appended to except via the explicit [`FileTrunk::compact`]
//! operation, which rewrites the log from the current live set.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use acorn_core::{AcornError, AcornResult, Nut, Trunk, TrunkCapabilities};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: DeserializeOwned"))]
enum Record<T> {
    Save { id: String, nut: Nut<T> },
    Delete { id: String },
}

struct Inner<T> {
    live: HashMap<String, Nut<T>>,
    history: HashMap<String, Vec<Nut<T>>>,
}

impl<T> Default for Inner<T> {
    fn default() -> Self {
        Inner {
            live: HashMap::new(),
            history: HashMap::new(),
        }
    }
}

/// Append-only JSON log trunk. Durable: every `save`/`delete` fsyncs
/// before returning.
pub struct FileTrunk<T> {
    path: PathBuf,
    file: Mutex<File>,
    state: Mutex<Inner<T>>,
    _marker: PhantomData<T>,
}

impl<T> std::fmt::Debug for FileTrunk<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTrunk").field("path", &self.path).finish()
    }
}

fn io_err(err: io::Error) -> AcornError {
    AcornError::StorageUnavailable(err.to_string())
}

fn ser_err(err: serde_json::Error) -> AcornError {
    AcornError::Serialization(err.to_string())
}

impl<T> FileTrunk<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Opens (creating if absent) the log at `path`, replaying every
    /// record to reconstruct the live set and per-id history.
    pub fn open(path: impl AsRef<Path>) -> AcornResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let mut read_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(io_err)?;

        let state = Self::replay(&mut read_file)?;

        let append_file = OpenOptions::new().append(true).open(&path).map_err(io_err)?;

        Ok(FileTrunk {
            path,
            file: Mutex::new(append_file),
            state: Mutex::new(state),
            _marker: PhantomData,
        })
    }

    fn replay(file: &mut File) -> AcornResult<Inner<T>> {
        let mut reader = BufReader::new(file);
        let mut state = Inner::default();
        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(io_err(e)),
            }
            let len = u32::from_le_bytes(len_buf) as usize;
            let mut body = vec![0u8; len];
            reader.read_exact(&mut body).map_err(io_err)?;
            let record: Record<T> = serde_json::from_slice(&body).map_err(ser_err)?;
            Self::apply(&mut state, record);
        }
        Ok(state)
    }

    fn apply(state: &mut Inner<T>, record: Record<T>) {
        match record {
            Record::Save { id, nut } => {
                state.history.entry(id.clone()).or_default().push(nut.clone());
                state.live.insert(id, nut);
            }
            Record::Delete { id } => {
                state.live.remove(&id);
            }
        }
    }

    fn append(&self, record: &Record<T>) -> AcornResult<()> {
        let body = serde_json::to_vec(record).map_err(ser_err)?;
        let len = (body.len() as u32).to_le_bytes();
        let mut file = self.file.lock().unwrap();
        file.write_all(&len).map_err(io_err)?;
        file.write_all(&body).map_err(io_err)?;
        file.sync_data().map_err(io_err)?;
        Ok(())
    }

    /// Rewrites the log to contain exactly the current live set,
    /// dropping prior history. Only ever invoked explicitly (§6: "Files
    /// are only truncated during an explicit compact operation").
    pub fn compact(&self) -> AcornResult<()> {
        let state = self.state.lock().unwrap();
        let tmp_path = self.path.with_extension("compact.tmp");
        {
            let mut tmp = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)
                .map_err(io_err)?;
            for nut in state.live.values() {
                let record = Record::Save {
                    id: nut.id.clone(),
                    nut: nut.clone(),
                };
                let body = serde_json::to_vec(&record).map_err(ser_err)?;
                let len = (body.len() as u32).to_le_bytes();
                tmp.write_all(&len).map_err(io_err)?;
                tmp.write_all(&body).map_err(io_err)?;
            }
            tmp.sync_all().map_err(io_err)?;
        }
        std::fs::rename(&tmp_path, &self.path).map_err(io_err)?;

        let append_file = OpenOptions::new().append(true).open(&self.path).map_err(io_err)?;
        *self.file.lock().unwrap() = append_file;
        Ok(())
    }
}

impl<T> Trunk<T> for FileTrunk<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn save(&self, id: &str, nut: Nut<T>) -> AcornResult<()> {
        self.append(&Record::Save {
            id: id.to_string(),
            nut: nut.clone(),
        })?;
        let mut state = self.state.lock().unwrap();
        state.history.entry(id.to_string()).or_default().push(nut.clone());
        state.live.insert(id.to_string(), nut);
        Ok(())
    }

    fn load(&self, id: &str) -> AcornResult<Option<Nut<T>>> {
        Ok(self.state.lock().unwrap().live.get(id).cloned())
    }

    fn delete(&self, id: &str) -> AcornResult<bool> {
        let existed = self.state.lock().unwrap().live.contains_key(id);
        if existed {
            self.append(&Record::Delete { id: id.to_string() })?;
            self.state.lock().unwrap().live.remove(id);
        }
        Ok(existed)
    }

    fn load_all(&self) -> AcornResult<Vec<Nut<T>>> {
        Ok(self.state.lock().unwrap().live.values().cloned().collect())
    }

    fn history(&self, id: &str) -> AcornResult<Option<Vec<Nut<T>>>> {
        Ok(self.state.lock().unwrap().history.get(id).cloned())
    }

    fn capabilities(&self) -> TrunkCapabilities {
        TrunkCapabilities::new("file").durable().with_history()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    #[test]
    fn replays_state_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trunk.log");

        {
            let trunk: FileTrunk<u32> = FileTrunk::open(&path).unwrap();
            trunk.save("k1", Nut::new("k1", 1, SystemTime::UNIX_EPOCH, 0)).unwrap();
            trunk.save("k2", Nut::new("k2", 2, SystemTime::UNIX_EPOCH, 0)).unwrap();
            trunk.delete("k2").unwrap();
        }

        let reopened: FileTrunk<u32> = FileTrunk::open(&path).unwrap();
        assert_eq!(reopened.load("k1").unwrap().unwrap().payload, Some(1));
        assert!(reopened.load("k2").unwrap().is_none());
        assert_eq!(reopened.load_all().unwrap().len(), 1);
    }

    #[test]
    fn compact_rewrites_log_from_live_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trunk.log");
        let trunk: FileTrunk<u32> = FileTrunk::open(&path).unwrap();
        trunk.save("k1", Nut::new("k1", 1, SystemTime::UNIX_EPOCH, 0)).unwrap();
        trunk.save("k1", Nut::new("k1", 2, SystemTime::UNIX_EPOCH, 1)).unwrap();
        trunk.save("k2", Nut::new("k2", 9, SystemTime::UNIX_EPOCH, 0)).unwrap();
        trunk.delete("k2").unwrap();

        trunk.compact().unwrap();
        trunk.save("k3", Nut::new("k3", 3, SystemTime::UNIX_EPOCH, 0)).unwrap();

        drop(trunk);
        let reopened: FileTrunk<u32> = FileTrunk::open(&path).unwrap();
        assert_eq!(reopened.load_all().unwrap().len(), 2);
        assert_eq!(reopened.load("k1").unwrap().unwrap().version, 1);
    }
}

#[cfg(all(test, feature = "contract-tests"))]
mod contract_tests {
    use super::*;
    use acorn_test_harness::TrunkContract;

    fn open_temp_bytes() -> (tempfile::TempDir, FileTrunk<Vec<u8>>) {
        let dir = tempfile::tempdir().unwrap();
        let trunk = FileTrunk::open(dir.path().join("trunk.log")).unwrap();
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
