//! In-memory [`Trunk`] implementation: non-durable, supports history.
//!
//! Grounded on the teacher's `MemoryTrunk` stub and generalized to the
//! full `Trunk<T>` contract (§4.1).

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use acorn_core::{AcornResult, Nut, Trunk, TrunkCapabilities};

#[derive(Default)]
struct Inner<T> {
    live: HashMap<String, Nut<T>>,
    history: HashMap<String, Vec<Nut<T>>>,
}

/// A single in-process map, guarded by a mutex. Every version ever
/// saved is retained for `history`; `delete` only removes the live
/// entry.
pub struct MemoryTrunk<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> fmt::Debug for MemoryTrunk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.inner.lock().unwrap().live.len();
        f.debug_struct("MemoryTrunk").field("live_entries", &len).finish()
    }
}

impl<T> Default for MemoryTrunk<T> {
    fn default() -> Self {
        MemoryTrunk {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl<T> MemoryTrunk<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T> Trunk<T> for MemoryTrunk<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn save(&self, id: &str, nut: Nut<T>) -> AcornResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.history.entry(id.to_string()).or_default().push(nut.clone());
        inner.live.insert(id.to_string(), nut);
        Ok(())
    }

    fn load(&self, id: &str) -> AcornResult<Option<Nut<T>>> {
        Ok(self.inner.lock().unwrap().live.get(id).cloned())
    }

    fn delete(&self, id: &str) -> AcornResult<bool> {
        Ok(self.inner.lock().unwrap().live.remove(id).is_some())
    }

    fn load_all(&self) -> AcornResult<Vec<Nut<T>>> {
        Ok(self.inner.lock().unwrap().live.values().cloned().collect())
    }

    fn history(&self, id: &str) -> AcornResult<Option<Vec<Nut<T>>>> {
        Ok(self.inner.lock().unwrap().history.get(id).cloned())
    }

    fn capabilities(&self) -> TrunkCapabilities {
        TrunkCapabilities::new("memory").with_history()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    #[test]
    fn save_load_delete_round_trip() {
        let trunk = MemoryTrunk::new();
        let nut = Nut::new("k1", 42u32, SystemTime::UNIX_EPOCH, 0);
        trunk.save("k1", nut.clone()).unwrap();
        assert_eq!(trunk.load("k1").unwrap().unwrap().payload, Some(42));
        assert!(trunk.delete("k1").unwrap());
        assert!(trunk.load("k1").unwrap().is_none());
        assert!(!trunk.delete("k1").unwrap());
    }

    #[test]
    fn history_survives_delete() {
        let trunk = MemoryTrunk::new();
        trunk.save("k1", Nut::new("k1", 1u32, SystemTime::UNIX_EPOCH, 0)).unwrap();
        trunk.save("k1", Nut::new("k1", 2u32, SystemTime::UNIX_EPOCH, 1)).unwrap();
        trunk.delete("k1").unwrap();
        let history = trunk.history("k1").unwrap().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].payload, Some(1));
        assert_eq!(history[1].payload, Some(2));
    }

    #[test]
    fn load_all_enumerates_each_live_id_once() {
        let trunk = MemoryTrunk::new();
        trunk.save("a", Nut::new("a", 1u32, SystemTime::UNIX_EPOCH, 0)).unwrap();
        trunk.save("b", Nut::new("b", 2u32, SystemTime::UNIX_EPOCH, 0)).unwrap();
        trunk.save("a", Nut::new("a", 3u32, SystemTime::UNIX_EPOCH, 1)).unwrap();
        let all = trunk.load_all().unwrap();
        assert_eq!(all.len(), 2);
    }
}

#[cfg(all(test, feature = "contract-tests"))]
mod contract_tests {
    use super::*;
    use acorn_test_harness::TrunkContract;

    #[test]
    fn satisfies_trunk_contract() {
        let trunk = MemoryTrunk::<Vec<u8>>::new();
        TrunkContract::round_trip_bytes(&trunk).unwrap();
        let trunk = MemoryTrunk::<Vec<u8>>::new();
        TrunkContract::load_all_enumerates_once(&trunk).unwrap();
        let trunk = MemoryTrunk::<Vec<u8>>::new();
        TrunkContract::history_survives_delete(&trunk).unwrap();
    }

    #[test]
    fn advertises_non_durable_with_history() {
        let trunk = MemoryTrunk::<Vec<u8>>::new();
        TrunkContract::assert_capabilities(&trunk, false, true);
    }
}
