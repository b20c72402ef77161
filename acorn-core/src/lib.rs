//! `acorn-core` — the leaf layer of the AcornDB engine: the versioned
//! [`Nut`] envelope, the [`Trunk`] storage contract, the [`Judge`]
//! conflict resolver, and the typed [`Tree`] store built on top of
//! them.

mod clock;
mod error;
mod events;
mod judge;
mod locks;
mod nut;
mod tree;
mod trunk;
mod version_vector;

pub use clock::{system_clock, Clock, ManualClock, SharedClock, SystemClock};
pub use error::{AcornError, AcornResult, FaultComponent};
pub use events::{EventBus, TreeEvent};
pub use judge::{Judge, LocalWinsJudge, RemoteWinsJudge, TimestampJudge, VersionJudge};
pub use locks::StripedLocks;
pub use nut::Nut;
pub use tree::{ImportSummary, Tree, TreeStats};
pub use trunk::{Demotable, Trunk, TrunkCapabilities};
pub use version_vector::VersionVector;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct MemTrunk(Mutex<std::collections::HashMap<String, Nut<String>>>);

    impl Trunk<String> for MemTrunk {
        fn save(&self, id: &str, nut: Nut<String>) -> AcornResult<()> {
            self.0.lock().unwrap().insert(id.to_string(), nut);
            Ok(())
        }
        fn load(&self, id: &str) -> AcornResult<Option<Nut<String>>> {
            Ok(self.0.lock().unwrap().get(id).cloned())
        }
        fn delete(&self, id: &str) -> AcornResult<bool> {
            Ok(self.0.lock().unwrap().remove(id).is_some())
        }
        fn load_all(&self) -> AcornResult<Vec<Nut<String>>> {
            Ok(self.0.lock().unwrap().values().cloned().collect())
        }
        fn capabilities(&self) -> TrunkCapabilities {
            TrunkCapabilities::new("mem-test")
        }
    }

    #[test]
    fn basic_stash_and_crack() {
        let tree = Tree::new(MemTrunk::default());
        tree.stash("u1", "Alice".to_string()).unwrap();
        assert_eq!(tree.crack("u1").unwrap(), Some("Alice".to_string()));
        assert_eq!(tree.stats().total_stashed, 1);
    }

    #[test]
    fn toss_is_idempotent() {
        let tree = Tree::new(MemTrunk::default());
        tree.stash("u1", "Alice".to_string()).unwrap();
        assert!(tree.toss("u1").unwrap());
        assert!(!tree.toss("u1").unwrap());
        assert_eq!(tree.stats().total_tossed, 1);
    }

    #[test]
    fn empty_id_rejected() {
        let tree = Tree::new(MemTrunk::default());
        assert!(matches!(tree.stash("", "x".to_string()), Err(AcornError::EmptyId)));
        assert!(matches!(tree.crack(""), Err(AcornError::EmptyId)));
    }

    #[test]
    fn version_monotonically_increases() {
        let tree = Tree::new(MemTrunk::default());
        tree.stash("u1", "v0".to_string()).unwrap();
        tree.stash("u1", "v1".to_string()).unwrap();
        tree.stash("u1", "v2".to_string()).unwrap();
        let history = tree.trunk().load("u1").unwrap().unwrap();
        assert_eq!(history.version, 2);
    }

    #[test]
    fn stale_import_is_rejected_not_written() {
        let tree = Tree::new(MemTrunk::default());
        tree.stash("u1", "v0".to_string()).unwrap();
        let stale = Nut::new("u1", "stale".to_string(), std::time::SystemTime::UNIX_EPOCH, 0);
        let summary = tree.import_changes(vec![stale]).unwrap();
        assert_eq!(summary.rejected, 1);
        assert_eq!(tree.crack("u1").unwrap(), Some("v0".to_string()));
    }
}
