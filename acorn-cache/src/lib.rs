//! `acorn-cache` — the tiered (§4.3) and near-far (§4.4) caching layer
//! sitting between a `Tree` and its durable trunk.

mod lru;
mod near_far;
mod tiered;

pub use near_far::{NearFarOptions, NearFarTrunk, ReadPolicy, WritePolicy};
pub use tiered::{TieredTrunk, TieringOptions};

#[cfg(test)]
mod tests {
    use super::*;
    use acorn_core::{ManualClock, Nut, SharedClock, Trunk};
    use acorn_trunk_mem::MemoryTrunk;
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    #[test]
    fn tiered_promotes_on_read_and_demotes_on_crunch() {
        let hot = MemoryTrunk::<u32>::new();
        let cold = MemoryTrunk::<u32>::new();
        let trunk = TieredTrunk::new(hot, cold, TieringOptions::new(Duration::from_secs(3600)));

        trunk.save("k1", Nut::new("k1", 1, SystemTime::UNIX_EPOCH, 0)).unwrap();
        acorn_core::Demotable::demote(&trunk, "k1").unwrap();
        assert!(trunk.hot.load("k1").unwrap().is_none());

        let loaded = trunk.load("k1").unwrap().unwrap();
        assert_eq!(loaded.payload, Some(1));
        assert!(trunk.hot.load("k1").unwrap().is_some());
        assert!(trunk.cold.load("k1").unwrap().is_none());
    }

    #[test]
    fn tiered_sweep_archives_stale_entries() {
        let manual = Arc::new(ManualClock::new(SystemTime::UNIX_EPOCH));
        let clock: SharedClock = manual.clone();
        let hot = MemoryTrunk::<u32>::new();
        let cold = MemoryTrunk::<u32>::new();
        let trunk = TieredTrunk::new(hot, cold, TieringOptions::new(Duration::from_secs(60))).with_clock(clock);

        trunk.save("k1", Nut::new("k1", 1, SystemTime::UNIX_EPOCH, 0)).unwrap();
        manual.advance(Duration::from_secs(120));

        let moved = trunk.sweep().unwrap();
        assert_eq!(moved, 1);
        assert!(trunk.cold.load("k1").unwrap().is_some());
    }

    #[test]
    fn near_far_write_through_populates_backing_immediately() {
        let backing = MemoryTrunk::<u32>::new();
        let trunk = NearFarTrunk::new(backing, NearFarOptions::new(4));
        trunk.save("k1", Nut::new("k1", 7, SystemTime::UNIX_EPOCH, 0)).unwrap();
        assert_eq!(trunk.backing.load("k1").unwrap().unwrap().payload, Some(7));
    }

    #[test]
    fn near_far_write_back_defers_until_flush() {
        let backing = MemoryTrunk::<u32>::new();
        let trunk = NearFarTrunk::new(backing, NearFarOptions::new(4).with_write_policy(WritePolicy::WriteBack));
        trunk.save("k1", Nut::new("k1", 7, SystemTime::UNIX_EPOCH, 0)).unwrap();
        assert!(trunk.backing.load("k1").unwrap().is_none());

        let flushed = trunk.flush_dirty().unwrap();
        assert_eq!(flushed, 1);
        assert_eq!(trunk.backing.load("k1").unwrap().unwrap().payload, Some(7));
    }

    #[test]
    fn near_far_cache_aside_read_skips_far_repopulation() {
        let backing = MemoryTrunk::<u32>::new();
        backing.save("k1", Nut::new("k1", 9, SystemTime::UNIX_EPOCH, 0)).unwrap();
        let trunk = NearFarTrunk::new(backing, NearFarOptions::new(4).with_read_policy(ReadPolicy::CacheAside));
        let loaded = trunk.load("k1").unwrap().unwrap();
        assert_eq!(loaded.payload, Some(9));
    }
}

#[cfg(all(test, feature = "background-loop"))]
mod background_loop_tests {
    use super::*;
    use acorn_core::{Nut, Trunk};
    use acorn_trunk_mem::MemoryTrunk;
    use std::time::{Duration, SystemTime};

    #[tokio::test]
    async fn run_flusher_drains_pending_write_backs_on_a_timer() {
        let backing = MemoryTrunk::<u32>::new();
        let trunk = NearFarTrunk::new(backing, NearFarOptions::new(4).with_write_policy(WritePolicy::WriteBack));
        trunk.save("k1", Nut::new("k1", 7, SystemTime::UNIX_EPOCH, 0)).unwrap();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel();
        let flusher = tokio::spawn(async move {
            trunk.run_flusher(Duration::from_millis(5), stop_rx).await;
            trunk
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        stop_tx.send(()).unwrap();
        let trunk = tokio::time::timeout(Duration::from_secs(1), flusher).await.unwrap().unwrap();
        assert_eq!(trunk.backing.load("k1").unwrap().unwrap().payload, Some(7));
    }

    #[tokio::test]
    async fn run_sweeper_archives_stale_entries_on_a_timer() {
        let hot = MemoryTrunk::<u32>::new();
        let cold = MemoryTrunk::<u32>::new();
        let trunk = TieredTrunk::new(hot, cold, TieringOptions::new(Duration::from_millis(10)));
        trunk.save("k1", Nut::new("k1", 1, SystemTime::UNIX_EPOCH, 0)).unwrap();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel();
        let sweeper = tokio::spawn(async move {
            trunk.run_sweeper(Duration::from_millis(5), stop_rx).await;
            trunk
        });

        tokio::time::sleep(Duration::from_millis(60)).await;
        stop_tx.send(()).unwrap();
        let trunk = tokio::time::timeout(Duration::from_secs(1), sweeper).await.unwrap().unwrap();
        assert!(trunk.cold.load("k1").unwrap().is_some());
    }
}
