use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use tokio::sync::broadcast;

use crate::clock::{system_clock, SharedClock};
use crate::error::{AcornError, AcornResult, FaultComponent};
use crate::events::{EventBus, TreeEvent};
use crate::judge::{Judge, TimestampJudge};
use crate::locks::StripedLocks;
use crate::nut::Nut;
use crate::trunk::{Demotable, Trunk};
use crate::version_vector::VersionVector;

/// Read-only snapshot of a [`Tree`]'s counters (§3: "a counter set").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub total_stashed: u64,
    pub total_tossed: u64,
    pub squabbles_resolved: u64,
    pub smushes_performed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    total_stashed: AtomicU64,
    total_tossed: AtomicU64,
    squabbles_resolved: AtomicU64,
    smushes_performed: AtomicU64,
}

/// Summary returned by [`Tree::import_changes`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub applied: usize,
    pub squabbles_resolved: usize,
    pub rejected: usize,
}

/// Typed store over a single [`Trunk`]. Owns its trunk exclusively;
/// its lifecycle ends when the owner drops it (the trunk is expected
/// to flush/close on `Drop`).
pub struct Tree<T, S: Trunk<T>> {
    trunk: S,
    judge: Box<dyn Judge<T>>,
    clock: SharedClock,
    locks: StripedLocks,
    counters: Counters,
    events: EventBus,
    _marker: std::marker::PhantomData<T>,
}

impl<T, S: Trunk<T>> std::fmt::Debug for Tree<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tree")
            .field("trunk", &self.trunk)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<T, S> Tree<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: Trunk<T>,
{
    pub fn new(trunk: S) -> Self {
        Self::with_judge(trunk, Box::new(TimestampJudge))
    }

    pub fn with_judge(trunk: S, judge: Box<dyn Judge<T>>) -> Self {
        Tree {
            trunk,
            judge,
            clock: system_clock(),
            locks: StripedLocks::default(),
            counters: Counters::default(),
            events: EventBus::default(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn trunk(&self) -> &S {
        &self.trunk
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats {
            total_stashed: self.counters.total_stashed.load(Ordering::Relaxed),
            total_tossed: self.counters.total_tossed.load(Ordering::Relaxed),
            squabbles_resolved: self.counters.squabbles_resolved.load(Ordering::Relaxed),
            smushes_performed: self.counters.smushes_performed.load(Ordering::Relaxed),
        }
    }

    fn now(&self) -> SystemTime {
        self.clock.now()
    }

    fn fault(&self, kind: &'static str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(component = %FaultComponent::Tree, kind, %message, "fault");
        self.events.publish(TreeEvent::Fault {
            component: FaultComponent::Tree,
            kind,
            message,
        });
    }

    /// Build a nut, judge it against the current stored value, and
    /// persist the winner. Shared by `stash` and `toss` (a toss is a
    /// stash of a tombstone).
    fn stash_nut(&self, id: &str, nut_builder: impl FnOnce(Option<&Nut<T>>, SystemTime) -> Nut<T>) -> AcornResult<bool> {
        if id.is_empty() {
            return Err(AcornError::EmptyId);
        }
        self.locks.with_lock(id, || {
            let current = self.trunk.load(id)?;
            let now = self.now();
            let candidate = nut_builder(current.as_ref(), now);

            if let Some(current) = &current {
                if !self.judge.incoming_wins(current, &candidate) {
                    self.counters.smushes_performed.fetch_add(1, Ordering::Relaxed);
                    self.events.publish(TreeEvent::Smushed { id: id.to_string() });
                    return Ok(false);
                }
            }

            self.trunk.save(id, candidate.clone())?;
            Ok(true)
        })
    }

    /// Build a nut, build the next version, and stash it (§4.6 `Stash`).
    /// Returns whether the write was applied; `false` means the judge
    /// rejected it in favor of the current value (a `smush`), which a
    /// caller running in strict mode (§6) surfaces as `409`.
    pub fn stash(&self, id: &str, payload: T) -> AcornResult<bool> {
        let wrote = self.stash_nut(id, |current, now| match current {
            Some(current) => current.next(payload, now),
            None => Nut::new(id, payload, now, 0),
        })?;

        if wrote {
            let version = self.trunk.load(id)?.map(|n| n.version).unwrap_or(0);
            self.counters.total_stashed.fetch_add(1, Ordering::Relaxed);
            self.events.publish(TreeEvent::Stashed {
                id: id.to_string(),
                version,
            });
        }
        Ok(wrote)
    }

    /// Loads `id`, skipping tombstones and expired entries (§4.6 `Crack`).
    pub fn crack(&self, id: &str) -> AcornResult<Option<T>> {
        if id.is_empty() {
            return Err(AcornError::EmptyId);
        }
        let now = self.now();
        match self.trunk.load(id)? {
            Some(nut) if nut.is_tombstone() => Ok(None),
            Some(nut) if nut.is_expired(now) => Ok(None),
            Some(nut) => Ok(nut.payload),
            None => Ok(None),
        }
    }

    /// Deletes `id` (§4.6 `Toss`). Returns whether it existed. The
    /// version carried on the emitted event is one past whatever was
    /// last stored, so subscribers (namely a Tangle) can build a
    /// tombstone `Nut` to propagate even though the local trunk's
    /// `Delete` primitive does not itself keep one around.
    pub fn toss(&self, id: &str) -> AcornResult<bool> {
        if id.is_empty() {
            return Err(AcornError::EmptyId);
        }
        let (existed, next_version) = self.locks.with_lock(id, || -> AcornResult<(bool, u64)> {
            let prior_version = self.trunk.load(id)?.map(|n| n.version).unwrap_or(0);
            let existed = self.trunk.delete(id)?;
            Ok((existed, prior_version + 1))
        })?;
        if existed {
            self.counters.total_tossed.fetch_add(1, Ordering::Relaxed);
            self.events.publish(TreeEvent::Tossed {
                id: id.to_string(),
                version: next_version,
            });
        }
        Ok(existed)
    }

    /// Sweeps expired entries (§4.6 `Shake`).
    pub fn shake(&self) -> AcornResult<usize> {
        let now = self.now();
        let mut purged = 0usize;
        for nut in self.trunk.load_all()? {
            if nut.is_expired(now) {
                if self.locks.with_lock(&nut.id, || self.trunk.delete(&nut.id))? {
                    purged += 1;
                }
            }
        }
        self.events.publish(TreeEvent::Shaken { purged });
        Ok(purged)
    }

    /// Delegates to the trunk (§4.6 `History`).
    pub fn history(&self, id: &str) -> AcornResult<Option<Vec<Nut<T>>>> {
        self.trunk.history(id)
    }

    /// All nuts whose `(id, version)` is strictly greater than the
    /// vector entry (§4.6 `ExportChanges`). A snapshot consistent with
    /// a single point between the first and last element read.
    pub fn export_changes(&self, since: Option<&VersionVector>) -> AcornResult<Vec<Nut<T>>> {
        let all = self.trunk.load_all()?;
        Ok(match since {
            Some(since) => all
                .into_iter()
                .filter(|nut| since.is_newer(&nut.id, nut.version))
                .collect(),
            None => all,
        })
    }

    /// Judges each incoming nut against the current value, serially per
    /// id (§4.6 `ImportChanges`).
    pub fn import_changes(&self, incoming: impl IntoIterator<Item = Nut<T>>) -> AcornResult<ImportSummary> {
        let mut summary = ImportSummary::default();
        for nut in incoming {
            let outcome = self.locks.with_lock(&nut.id, || -> AcornResult<bool> {
                let current = self.trunk.load(&nut.id)?;
                match &current {
                    Some(current) => {
                        // Same version number on both sides means local and
                        // remote diverged from a common ancestor and both
                        // produced a competing write; the judge has to
                        // arbitrate rather than fast-forward.
                        let is_squabble =
                            current.version == nut.version && current.timestamp != nut.timestamp;
                        if is_squabble {
                            self.counters.squabbles_resolved.fetch_add(1, Ordering::Relaxed);
                            self.events.publish(TreeEvent::SquabbleResolved { id: nut.id.clone() });
                        }
                        if self.judge.incoming_wins(current, &nut) {
                            self.trunk.save(&nut.id, nut.clone())?;
                            Ok(true)
                        } else {
                            Ok(false)
                        }
                    }
                    None => {
                        self.trunk.save(&nut.id, nut.clone())?;
                        Ok(true)
                    }
                }
            });

            match outcome {
                Ok(true) => summary.applied += 1,
                Ok(false) => summary.rejected += 1,
                Err(err) => {
                    self.fault(err.kind(), err.to_string());
                    summary.rejected += 1;
                }
            }
        }
        Ok(summary)
    }
}

impl<T, S> Tree<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: Trunk<T> + Demotable<T>,
{
    /// Forces a hot->cold demotion on tiering-aware trunks; no-op
    /// otherwise (§4.6 `Crunch`).
    pub fn crunch(&self, id: &str) -> AcornResult<()> {
        self.trunk.demote(id)
    }
}
