use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use acorn_core::{system_clock, AcornResult, Demotable, Nut, SharedClock, Trunk, TrunkCapabilities};

/// Governs the hot->cold movement policy of a [`TieredTrunk`] (§4.3).
#[derive(Debug, Clone, Copy)]
pub struct TieringOptions {
    pub archive_after: Duration,
    pub restore_on_read: bool,
    pub max_hot_entries: Option<usize>,
}

impl TieringOptions {
    pub fn new(archive_after: Duration) -> Self {
        TieringOptions {
            archive_after,
            restore_on_read: true,
            max_hot_entries: None,
        }
    }

    pub fn with_restore_on_read(mut self, restore: bool) -> Self {
        self.restore_on_read = restore;
        self
    }

    pub fn with_max_hot_entries(mut self, max: usize) -> Self {
        self.max_hot_entries = Some(max);
        self
    }
}

/// Composes a hot trunk and a cold trunk behind one `Trunk<T>` facade.
/// Reads try hot, then cold (promoting back to hot on
/// `restore_on_read`); writes always land in hot; cold only changes via
/// demotion (explicit `crunch`, capacity eviction, or the archive-age
/// sweep).
pub struct TieredTrunk<T, H, C> {
    pub(crate) hot: H,
    pub(crate) cold: C,
    options: TieringOptions,
    clock: SharedClock,
    last_access: Mutex<HashMap<String, SystemTime>>,
    _marker: std::marker::PhantomData<T>,
}

impl<T, H: std::fmt::Debug, C: std::fmt::Debug> std::fmt::Debug for TieredTrunk<T, H, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredTrunk")
            .field("hot", &self.hot)
            .field("cold", &self.cold)
            .finish()
    }
}

impl<T, H, C> TieredTrunk<T, H, C>
where
    T: Clone + Send + Sync + 'static,
    H: Trunk<T>,
    C: Trunk<T>,
{
    pub fn new(hot: H, cold: C, options: TieringOptions) -> Self {
        TieredTrunk {
            hot,
            cold,
            options,
            clock: system_clock(),
            last_access: Mutex::new(HashMap::new()),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    fn touch(&self, id: &str, now: SystemTime) {
        self.last_access.lock().unwrap().insert(id.to_string(), now);
    }

    fn evict_if_over_capacity(&self) -> AcornResult<()> {
        let Some(max) = self.options.max_hot_entries else {
            return Ok(());
        };
        let hot_entries = self.hot.load_all()?;
        if hot_entries.len() <= max {
            return Ok(());
        }
        let access = self.last_access.lock().unwrap();
        let mut by_age: Vec<_> = hot_entries
            .iter()
            .map(|nut| (nut.id.clone(), access.get(&nut.id).copied().unwrap_or(SystemTime::UNIX_EPOCH)))
            .collect();
        drop(access);
        by_age.sort_by_key(|(_, at)| *at);
        let overflow = hot_entries.len() - max;
        for (id, _) in by_age.into_iter().take(overflow) {
            self.demote(&id)?;
        }
        Ok(())
    }

    /// Moves every hot entry whose last-access exceeds `archive_after`
    /// to cold. Meant to be called periodically by the owner.
    pub fn sweep(&self) -> AcornResult<usize> {
        let now = self.clock.now();
        let stale: Vec<String> = {
            let access = self.last_access.lock().unwrap();
            self.hot
                .load_all()?
                .into_iter()
                .filter(|nut| {
                    let last = access.get(&nut.id).copied().unwrap_or(SystemTime::UNIX_EPOCH);
                    now.duration_since(last).unwrap_or_default() > self.options.archive_after
                })
                .map(|nut| nut.id)
                .collect()
        };
        let mut moved = 0;
        for id in stale {
            self.demote(&id)?;
            moved += 1;
        }
        Ok(moved)
    }
}

#[cfg(feature = "background-loop")]
impl<T, H, C> TieredTrunk<T, H, C>
where
    T: Clone + Send + Sync + 'static,
    H: Trunk<T> + Send + Sync + 'static,
    C: Trunk<T> + Send + Sync + 'static,
{
    /// Runs `sweep` on a timer until `stop` fires (§5 background
    /// activities / cooperative cancellation).
    pub async fn run_sweeper(&self, interval: Duration, mut stop: tokio::sync::oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep() {
                        Ok(moved) if moved > 0 => tracing::debug!(moved, "tiered sweep tick"),
                        Ok(_) => {}
                        Err(err) => tracing::warn!(error = %err, "tiered sweep tick failed"),
                    }
                }
                _ = &mut stop => break,
            }
        }
    }
}

impl<T, H, C> Trunk<T> for TieredTrunk<T, H, C>
where
    T: Clone + Send + Sync + 'static,
    H: Trunk<T>,
    C: Trunk<T>,
{
    fn save(&self, id: &str, nut: Nut<T>) -> AcornResult<()> {
        self.hot.save(id, nut)?;
        self.touch(id, self.clock.now());
        self.evict_if_over_capacity()
    }

    fn load(&self, id: &str) -> AcornResult<Option<Nut<T>>> {
        if let Some(nut) = self.hot.load(id)? {
            self.touch(id, self.clock.now());
            return Ok(Some(nut));
        }
        match self.cold.load(id)? {
            Some(nut) => {
                if self.options.restore_on_read {
                    self.hot.save(id, nut.clone())?;
                    self.touch(id, self.clock.now());
                    let _ = self.cold.delete(id);
                }
                Ok(Some(nut))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, id: &str) -> AcornResult<bool> {
        let hot_existed = self.hot.delete(id)?;
        let cold_existed = self.cold.delete(id)?;
        self.last_access.lock().unwrap().remove(id);
        Ok(hot_existed || cold_existed)
    }

    fn load_all(&self) -> AcornResult<Vec<Nut<T>>> {
        let mut merged: HashMap<String, Nut<T>> = self.cold.load_all()?.into_iter().map(|n| (n.id.clone(), n)).collect();
        for nut in self.hot.load_all()? {
            merged.insert(nut.id.clone(), nut);
        }
        Ok(merged.into_values().collect())
    }

    fn history(&self, id: &str) -> AcornResult<Option<Vec<Nut<T>>>> {
        match self.hot.history(id)? {
            Some(history) => Ok(Some(history)),
            None => self.cold.history(id),
        }
    }

    fn capabilities(&self) -> TrunkCapabilities {
        let hot_caps = self.hot.capabilities();
        let cold_caps = self.cold.capabilities();
        // `save` only lands in `hot` synchronously; a lossy hot tier
        // makes the whole trunk non-durable regardless of cold.
        TrunkCapabilities::new("tiered")
            .with_history()
            .durable_if(hot_caps.is_durable && cold_caps.is_durable)
    }
}

impl<T, H, C> Demotable<T> for TieredTrunk<T, H, C>
where
    T: Clone + Send + Sync + 'static,
    H: Trunk<T>,
    C: Trunk<T>,
{
    /// Forces an immediate hot->cold move, independent of age or
    /// capacity (§4.6 `Crunch`).
    fn demote(&self, id: &str) -> AcornResult<()> {
        if let Some(nut) = self.hot.load(id)? {
            self.cold.save(id, nut)?;
            self.hot.delete(id)?;
            self.last_access.lock().unwrap().remove(id);
        }
        Ok(())
    }
}
