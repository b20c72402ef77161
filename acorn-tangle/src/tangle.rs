use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use acorn_core::{system_clock, AcornError, AcornResult, SharedClock, Trunk, Tree};

use crate::backoff::ExponentialBackoff;
use crate::direction::Direction;
use crate::envelope::TangleEnvelope;
use crate::status::TangleStatus;
use crate::transport::TangleTransport;

/// Outcome of one reconciliation pass (§4.7.3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub pulled: usize,
    pub pushed: usize,
}

/// A replication link between a local `Tree` and a peer, reached
/// through a [`TangleTransport`]. Created by `Entangle(local, remote,
/// direction)` in spec terms; here the "remote" side is whatever
/// transport the caller supplies (in-process or HTTP).
pub struct Tangle<T, S: Trunk<T>> {
    id: String,
    local: std::sync::Arc<Tree<T, S>>,
    transport: Box<dyn TangleTransport<T>>,
    direction: Direction,
    clock: SharedClock,
    status: Mutex<TangleStatus>,
    backoff: Mutex<ExponentialBackoff>,
    last_success: Mutex<Option<SystemTime>>,
}

impl<T, S: Trunk<T>> std::fmt::Debug for Tangle<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tangle")
            .field("id", &self.id)
            .field("direction", &self.direction_label())
            .field("status", &*self.status.lock().unwrap())
            .finish()
    }
}

impl<T, S> Tangle<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: Trunk<T>,
{
    pub fn new(local: std::sync::Arc<Tree<T, S>>, transport: Box<dyn TangleTransport<T>>, direction: Direction) -> Self {
        Tangle {
            id: uuid::Uuid::new_v4().to_string(),
            local,
            transport,
            direction,
            clock: system_clock(),
            status: Mutex::new(TangleStatus::Connected),
            backoff: Mutex::new(ExponentialBackoff::default()),
            last_success: Mutex::new(None),
        }
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> TangleStatus {
        *self.status.lock().unwrap()
    }

    fn direction_label(&self) -> &'static str {
        match self.direction {
            Direction::Push => "push",
            Direction::Pull => "pull",
            Direction::Bidirectional => "bidirectional",
        }
    }

    fn record_success(&self) {
        *self.status.lock().unwrap() = TangleStatus::Connected;
        self.backoff.lock().unwrap().reset();
        *self.last_success.lock().unwrap() = Some(self.clock.now());
    }

    /// Marks a failed exchange, deciding whether the tangle has now
    /// gone dead (no success for `5 * backoff.cap()`, §4.7.5).
    fn record_failure(&self) {
        let dead_after = self.backoff.lock().unwrap().cap() * 5u32;
        let now = self.clock.now();
        let dead = match *self.last_success.lock().unwrap() {
            Some(last) => now.duration_since(last).unwrap_or_default() > dead_after,
            None => false,
        };
        *self.status.lock().unwrap() = if dead { TangleStatus::Dead } else { TangleStatus::Reconnecting };
    }

    /// The delay to wait before the next reconnect attempt, advancing
    /// the backoff state.
    pub fn next_backoff_delay(&self) -> std::time::Duration {
        self.backoff.lock().unwrap().next_delay()
    }

    /// One reconciliation pass: pull whatever the peer has that we're
    /// missing, and/or push whatever we have that it's missing,
    /// according to `direction` (§4.7.3).
    pub fn reconcile_once(&self) -> AcornResult<ReconcileSummary> {
        let result = self.try_reconcile();
        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        result
    }

    fn try_reconcile(&self) -> AcornResult<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();

        if self.direction.pulls() {
            let local_vector = {
                let mut vector = acorn_core::VersionVector::new();
                for nut in self.local.export_changes(None)? {
                    vector.set(nut.id, nut.version);
                }
                vector
            };
            let missing = self
                .transport
                .fetch_since(&local_vector)
                .map_err(|e| AcornError::TransportFailed(e.to_string()))?;
            let accepted: Vec<acorn_core::Nut<T>> = missing
                .into_iter()
                .filter(|envelope| {
                    let echo = self.is_echo(envelope);
                    if echo {
                        tracing::debug!(tangle_id = %self.id, nut_id = %envelope.nut.id, "dropped echoed nut during pull");
                    }
                    !echo
                })
                .map(|envelope| envelope.nut)
                .collect();
            let applied = self.local.import_changes(accepted)?;
            summary.pulled = applied.applied;
        }

        if self.direction.pushes() {
            let peer_vector = self
                .transport
                .exchange_vector()
                .map_err(|e| AcornError::TransportFailed(e.to_string()))?;
            let outgoing = self.local.export_changes(Some(&peer_vector))?;
            summary.pushed = outgoing.len();
            if !outgoing.is_empty() {
                let envelopes = outgoing.into_iter().map(|nut| self.wrap_for_forwarding(nut)).collect();
                self.transport
                    .push_changes(envelopes)
                    .map_err(|e| AcornError::TransportFailed(e.to_string()))?;
            }
        }

        Ok(summary)
    }

    /// Wraps a single locally-emitted nut for forwarding, stamping it
    /// with this tangle's id so a receiving Tangle elsewhere in a
    /// cyclic mesh can refuse to bounce it back (§4.7.4). Used both by
    /// `try_reconcile`'s push side and by `run_emission_driven`.
    pub fn wrap_for_forwarding(&self, nut: acorn_core::Nut<T>) -> TangleEnvelope<T> {
        TangleEnvelope::new(nut, self.id.clone())
    }

    /// True if `envelope` should be dropped rather than forwarded
    /// through this tangle.
    pub fn is_echo(&self, envelope: &TangleEnvelope<T>) -> bool {
        envelope.already_visited(&self.id)
    }
}

#[cfg(feature = "std")]
impl<T, S> Tangle<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: Trunk<T> + Send + Sync + 'static,
{
    /// Runs `reconcile_once` on a timer (default every 3s, §4.7 point 3)
    /// until `stop` fires, backing off on failure instead of waiting the
    /// full interval. Each attempt is bounded by `attempt_timeout`
    /// (default 10s, §5 "Cancellation and timeouts"); a timed-out attempt
    /// counts as a failure for backoff purposes.
    pub async fn run(&self, mut stop: tokio::sync::oneshot::Receiver<()>) {
        self.run_with(Duration::from_secs(3), Duration::from_secs(10), &mut stop).await
    }

    async fn run_with(&self, interval: Duration, attempt_timeout: Duration, stop: &mut tokio::sync::oneshot::Receiver<()>) {
        loop {
            let outcome = tokio::time::timeout(attempt_timeout, async { self.reconcile_once() }).await;
            let wait = match outcome {
                Ok(Ok(summary)) => {
                    tracing::debug!(tangle_id = %self.id, pulled = summary.pulled, pushed = summary.pushed, "reconciled");
                    interval
                }
                Ok(Err(err)) => {
                    tracing::warn!(tangle_id = %self.id, error = %err, "reconcile attempt failed");
                    self.next_backoff_delay()
                }
                Err(_) => {
                    tracing::warn!(tangle_id = %self.id, "reconcile attempt timed out");
                    self.record_failure();
                    self.next_backoff_delay()
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = &mut *stop => {
                    tracing::debug!(tangle_id = %self.id, "reconciler stopping");
                    break;
                }
            }
        }
    }

    /// Subscribes to the local tree's event bus and immediately
    /// forwards each `Stashed`/`Tossed` nut to the peer, rather than
    /// waiting for the next periodic sweep (§4.7 point 2). A no-op for
    /// pull-only tangles. Meant to run alongside `run` in its own task;
    /// exits when `stop` fires or the event bus is dropped.
    pub async fn run_emission_driven(&self, mut stop: tokio::sync::oneshot::Receiver<()>) {
        if !self.direction.pushes() {
            let _ = stop.await;
            return;
        }

        let mut events = self.local.subscribe();
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(acorn_core::TreeEvent::Stashed { id, .. }) | Ok(acorn_core::TreeEvent::Tossed { id, .. }) => {
                            self.forward_one(&id);
                        }
                        Ok(_) => {}
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(tangle_id = %self.id, skipped, "emission-driven dispatch lagged, periodic sweep will catch up");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = &mut stop => {
                    tracing::debug!(tangle_id = %self.id, "emission-driven dispatch stopping");
                    break;
                }
            }
        }
    }

    fn forward_one(&self, id: &str) {
        let nut = match self.local.trunk().load(id) {
            Ok(Some(nut)) => nut,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(tangle_id = %self.id, %err, "failed to load nut for emission-driven forward");
                return;
            }
        };
        let envelope = self.wrap_for_forwarding(nut);
        if let Err(err) = self.transport.push_changes(vec![envelope]) {
            tracing::warn!(tangle_id = %self.id, %err, "emission-driven push failed, periodic sweep will retry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_process::InProcessTransport;
    use acorn_core::Nut;
    use acorn_trunk_mem::MemoryTrunk;
    use std::sync::Arc;
    use std::time::SystemTime;

    #[test]
    fn bidirectional_reconcile_converges_both_ways() {
        let left = Arc::new(Tree::new(MemoryTrunk::<u32>::new()));
        let right = Arc::new(Tree::new(MemoryTrunk::<u32>::new()));

        left.stash("only-left", 1).unwrap();
        right.stash("only-right", 2).unwrap();

        let tangle = Tangle::new(
            left.clone(),
            Box::new(InProcessTransport::new(right.clone())),
            Direction::Bidirectional,
        );

        let summary = tangle.reconcile_once().unwrap();
        assert_eq!(summary.pulled, 1);
        assert_eq!(summary.pushed, 1);

        assert_eq!(left.crack("only-right").unwrap(), Some(2));
        assert_eq!(right.crack("only-left").unwrap(), Some(1));
        assert_eq!(tangle.status(), TangleStatus::Connected);
    }

    #[test]
    fn pull_only_direction_never_pushes() {
        let left = Arc::new(Tree::new(MemoryTrunk::<u32>::new()));
        let right = Arc::new(Tree::new(MemoryTrunk::<u32>::new()));
        left.stash("left-only", 9).unwrap();

        let tangle = Tangle::new(left.clone(), Box::new(InProcessTransport::new(right.clone())), Direction::Pull);
        let summary = tangle.reconcile_once().unwrap();
        assert_eq!(summary.pushed, 0);
        assert!(right.crack("left-only").unwrap().is_none());
    }

    #[test]
    fn envelope_detects_echo_through_self() {
        let left = Arc::new(Tree::new(MemoryTrunk::<u32>::new()));
        let right = Arc::new(Tree::new(MemoryTrunk::<u32>::new()));
        let tangle = Tangle::new(left, Box::new(InProcessTransport::new(right)), Direction::Push);

        let nut = Nut::new("k1", 1u32, SystemTime::UNIX_EPOCH, 0);
        let envelope = tangle.wrap_for_forwarding(nut);
        assert!(tangle.is_echo(&envelope));
    }

    #[tokio::test]
    async fn run_reconciles_until_stopped() {
        let left = Arc::new(Tree::new(MemoryTrunk::<u32>::new()));
        let right = Arc::new(Tree::new(MemoryTrunk::<u32>::new()));
        left.stash("k", 1).unwrap();

        let tangle = Tangle::new(
            left,
            Box::new(InProcessTransport::new(right.clone())),
            Direction::Bidirectional,
        );

        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel();
        let handle = tokio::spawn(async move {
            tangle.run_with(Duration::from_millis(5), Duration::from_secs(1), &mut stop_rx).await;
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(right.crack("k").unwrap(), Some(1));

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn emission_driven_dispatch_forwards_without_waiting_for_a_tick() {
        let left = Arc::new(Tree::new(MemoryTrunk::<u32>::new()));
        let right = Arc::new(Tree::new(MemoryTrunk::<u32>::new()));

        let tangle = Arc::new(Tangle::new(
            left.clone(),
            Box::new(InProcessTransport::new(right.clone())),
            Direction::Push,
        ));

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel();
        let dispatch_tangle = tangle.clone();
        let handle = tokio::spawn(async move {
            dispatch_tangle.run_emission_driven(stop_rx).await;
        });

        // Give the subscriber time to attach before the emission fires.
        tokio::time::sleep(Duration::from_millis(10)).await;
        left.stash("k", 7).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(right.crack("k").unwrap(), Some(7));

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn emission_driven_dispatch_is_a_noop_for_pull_only_direction() {
        let left = Arc::new(Tree::new(MemoryTrunk::<u32>::new()));
        let right = Arc::new(Tree::new(MemoryTrunk::<u32>::new()));

        let tangle = Tangle::new(left.clone(), Box::new(InProcessTransport::new(right.clone())), Direction::Pull);

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel();
        let handle = tokio::spawn(async move {
            tangle.run_emission_driven(stop_rx).await;
        });
        left.stash("k", 1).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(right.crack("k").unwrap().is_none());

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
