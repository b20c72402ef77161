use crate::nut::Nut;

/// A pure binary conflict resolver between two [`Nut`]s sharing an id.
///
/// Judges must be deterministic and total: never panic, never consult
/// external state. They decide both replication merges
/// ([`crate::Tree::import_changes`]) and local idempotency checks (a
/// `Stash` with an identical or older timestamp/version is a no-op
/// "smush").
pub trait Judge<T>: Send + Sync + std::fmt::Debug {
    /// Returns the nut that should be kept: a clone of `local` or a
    /// clone of `incoming`.
    fn judge(&self, local: &Nut<T>, incoming: &Nut<T>) -> Nut<T>
    where
        T: Clone;

    /// True when `judge(local, incoming)` would keep `incoming`. Kept as
    /// a separate, cheaper method so callers (e.g. `ImportChanges`)
    /// don't need to clone a payload just to compare versions.
    fn incoming_wins(&self, local: &Nut<T>, incoming: &Nut<T>) -> bool
    where
        T: Clone;
}

/// Newer `timestamp` wins; ties keep local.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampJudge;

impl<T> Judge<T> for TimestampJudge {
    fn judge(&self, local: &Nut<T>, incoming: &Nut<T>) -> Nut<T>
    where
        T: Clone,
    {
        if incoming.timestamp > local.timestamp {
            incoming.clone()
        } else {
            local.clone()
        }
    }

    fn incoming_wins(&self, local: &Nut<T>, incoming: &Nut<T>) -> bool
    where
        T: Clone,
    {
        incoming.timestamp > local.timestamp
    }
}

/// Higher `version` wins; ties fall through to [`TimestampJudge`].
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionJudge;

impl<T> Judge<T> for VersionJudge {
    fn judge(&self, local: &Nut<T>, incoming: &Nut<T>) -> Nut<T>
    where
        T: Clone,
    {
        if incoming.version > local.version {
            incoming.clone()
        } else if incoming.version < local.version {
            local.clone()
        } else {
            TimestampJudge.judge(local, incoming)
        }
    }

    fn incoming_wins(&self, local: &Nut<T>, incoming: &Nut<T>) -> bool
    where
        T: Clone,
    {
        if incoming.version != local.version {
            incoming.version > local.version
        } else {
            TimestampJudge.incoming_wins(local, incoming)
        }
    }
}

/// Always keeps local; incoming never wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalWinsJudge;

impl<T> Judge<T> for LocalWinsJudge {
    fn judge(&self, local: &Nut<T>, _incoming: &Nut<T>) -> Nut<T>
    where
        T: Clone,
    {
        local.clone()
    }

    fn incoming_wins(&self, _local: &Nut<T>, _incoming: &Nut<T>) -> bool
    where
        T: Clone,
    {
        false
    }
}

/// Always keeps incoming.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteWinsJudge;

impl<T> Judge<T> for RemoteWinsJudge {
    fn judge(&self, _local: &Nut<T>, incoming: &Nut<T>) -> Nut<T>
    where
        T: Clone,
    {
        incoming.clone()
    }

    fn incoming_wins(&self, _local: &Nut<T>, _incoming: &Nut<T>) -> bool
    where
        T: Clone,
    {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn nut(version: u64, secs: u64) -> Nut<u32> {
        Nut::new("k", 0u32, SystemTime::UNIX_EPOCH + Duration::from_secs(secs), version)
    }

    #[test]
    fn timestamp_judge_newer_wins_ties_keep_local() {
        let j = TimestampJudge;
        let local = nut(0, 5);
        let older = nut(0, 1);
        let newer = nut(0, 10);
        let tie = nut(0, 5);

        assert_eq!(j.judge(&local, &older).timestamp, local.timestamp);
        assert_eq!(j.judge(&local, &newer).timestamp, newer.timestamp);
        assert_eq!(j.judge(&local, &tie).timestamp, local.timestamp);
    }

    #[test]
    fn version_judge_falls_through_to_timestamp_on_tie() {
        let j = VersionJudge;
        let local = nut(2, 5);
        let incoming_same_version_newer = nut(2, 10);
        let result = j.judge(&local, &incoming_same_version_newer);
        assert_eq!(result.timestamp, incoming_same_version_newer.timestamp);
    }

    #[test]
    fn judge_determinism_and_self_identity() {
        let j = VersionJudge;
        let a = nut(3, 7);
        let b = nut(1, 2);
        assert_eq!(j.judge(&a, &b).version, j.judge(&a, &b).version);
        let self_judged = j.judge(&a, &a);
        assert_eq!(self_judged.version, a.version);
        assert_eq!(self_judged.timestamp, a.timestamp);
    }

    #[test]
    fn local_and_remote_wins_are_unconditional() {
        let a = nut(0, 1);
        let b = nut(5, 100);
        assert_eq!(LocalWinsJudge.judge(&a, &b).version, a.version);
        assert_eq!(RemoteWinsJudge.judge(&a, &b).version, b.version);
    }
}
