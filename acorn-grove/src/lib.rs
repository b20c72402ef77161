//! `acorn-grove` — a type-erased registry of `Tree`s, one per planted
//! type (§4.8). Backs the HTTP surface a sync server exposes and the
//! discovery-driven entangling a Canopy mesh performs.

mod erased_tangle;
mod erased_tree;
mod grove;

pub use erased_tangle::{ErasedTangle, TangleStatsEntry};
pub use erased_tree::{ErasedTree, TreeInfo, TypedTreeAdapter};
pub use grove::Grove;

#[cfg(test)]
mod tests {
    use super::*;
    use acorn_core::{AcornError, Tree};
    use acorn_tangle::Direction;
    use acorn_trunk_mem::MemoryTrunk;
    use serde_json::json;
    use std::sync::Arc;

    fn planted_grove() -> Grove {
        let grove = Grove::new();
        let tree = Arc::new(Tree::new(MemoryTrunk::<String>::new()));
        grove.plant(Arc::new(TypedTreeAdapter::new("greeting", tree))).unwrap();
        grove
    }

    #[test]
    fn plant_rejects_duplicate_type() {
        let grove = planted_grove();
        let tree = Arc::new(Tree::new(MemoryTrunk::<String>::new()));
        let err = grove.plant(Arc::new(TypedTreeAdapter::new("greeting", tree))).unwrap_err();
        assert!(matches!(err, AcornError::DuplicateType(t) if t == "greeting"));
    }

    #[test]
    fn stash_and_crack_round_trip_through_json() {
        let grove = planted_grove();
        grove.try_stash("greeting", "hi", json!("hello")).unwrap();
        let back = grove.try_crack("greeting", "hi").unwrap();
        assert_eq!(back, Some(json!("hello")));
    }

    #[test]
    fn unknown_type_is_not_found() {
        let grove = planted_grove();
        let err = grove.try_crack("nonexistent", "x").unwrap_err();
        assert!(matches!(err, AcornError::NotFound(_)));
    }

    #[test]
    fn toss_and_shake_all_aggregate_across_trees() {
        let grove = planted_grove();
        grove.try_stash("greeting", "hi", json!("hello")).unwrap();
        assert!(grove.try_toss("greeting", "hi").unwrap());
        assert_eq!(grove.shake_all().unwrap(), 0);
    }

    #[test]
    fn describe_lists_every_planted_tree() {
        let grove = planted_grove();
        grove.try_stash("greeting", "hi", json!("hello")).unwrap();
        let info = grove.get_tree_info().unwrap();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].type_name, "greeting");
        assert_eq!(info[0].nut_count, 1);
    }

    #[test]
    fn entangle_all_creates_one_tangle_per_tree() {
        let grove = planted_grove();
        let created = grove.entangle_all("http://127.0.0.1:9", Direction::Pull);
        assert_eq!(created, 1);
        let stats = grove.get_tangle_stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].from_tree_id, "greeting");
    }

    #[test]
    fn exported_changes_are_envelope_shaped_and_round_trip_through_import() {
        let source = planted_grove();
        source.try_stash("greeting", "hi", json!("hello")).unwrap();

        let exported = source.export_changes_json("greeting", &acorn_core::VersionVector::new()).unwrap();
        assert_eq!(exported.len(), 1);
        let envelope = &exported[0];
        assert!(envelope.get("nut").is_some());
        assert!(envelope.get("hop_set").is_some());

        let sink = planted_grove();
        let applied = sink.import_changes_json("greeting", exported).unwrap();
        assert_eq!(applied, 1);
        assert_eq!(sink.try_crack("greeting", "hi").unwrap(), Some(json!("hello")));
    }
}
