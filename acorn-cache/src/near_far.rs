use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use acorn_core::{system_clock, AcornResult, Nut, SharedClock, Trunk, TrunkCapabilities};

use crate::lru::LruMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    WriteThrough,
    WriteBack,
    WriteAround,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPolicy {
    ReadThrough,
    CacheAside,
}

#[derive(Debug, Clone, Copy)]
pub struct NearFarOptions {
    pub near_capacity: usize,
    pub near_ttl: Option<Duration>,
    pub write_policy: WritePolicy,
    pub read_policy: ReadPolicy,
}

impl NearFarOptions {
    pub fn new(near_capacity: usize) -> Self {
        NearFarOptions {
            near_capacity,
            near_ttl: None,
            write_policy: WritePolicy::WriteThrough,
            read_policy: ReadPolicy::ReadThrough,
        }
    }

    pub fn with_near_ttl(mut self, ttl: Duration) -> Self {
        self.near_ttl = Some(ttl);
        self
    }

    pub fn with_write_policy(mut self, policy: WritePolicy) -> Self {
        self.write_policy = policy;
        self
    }

    pub fn with_read_policy(mut self, policy: ReadPolicy) -> Self {
        self.read_policy = policy;
        self
    }
}

/// Wraps any trunk with a bounded in-process near cache and an
/// optional far trunk (§4.4). `backing` is the source of truth:
/// `load_all`/`history` always delegate to it, since at steady state
/// `far ⊆ backing` and the caches never hold data the backing trunk
/// doesn't also have.
pub struct NearFarTrunk<T, B> {
    near: Mutex<LruMap<T>>,
    far: Option<Box<dyn Trunk<T>>>,
    pub(crate) backing: B,
    options: NearFarOptions,
    /// Pending write-back flushes, independent of near's bounded
    /// eviction: a dirty id stays here until a flush actually succeeds,
    /// even if it's since been evicted from `near` (§9: "a failed flush
    /// leaves the near entry marked dirty ... never dropped").
    dirty: Mutex<HashMap<String, Nut<T>>>,
    clock: SharedClock,
}

impl<T, B: std::fmt::Debug> std::fmt::Debug for NearFarTrunk<T, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NearFarTrunk").field("backing", &self.backing).finish()
    }
}

impl<T, B> NearFarTrunk<T, B>
where
    T: Clone + Send + Sync + 'static,
    B: Trunk<T>,
{
    pub fn new(backing: B, options: NearFarOptions) -> Self {
        NearFarTrunk {
            near: Mutex::new(LruMap::new(options.near_capacity)),
            far: None,
            backing,
            options,
            dirty: Mutex::new(HashMap::new()),
            clock: system_clock(),
        }
    }

    pub fn with_far(mut self, far: Box<dyn Trunk<T>>) -> Self {
        self.far = Some(far);
        self
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Attempts to flush every pending write-back entry to far (if
    /// configured) and backing. Entries that fail remain dirty for the
    /// next call. Returns the number successfully flushed.
    pub fn flush_dirty(&self) -> AcornResult<usize> {
        let pending: Vec<(String, Nut<T>)> = self.dirty.lock().unwrap().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let mut flushed = 0;
        for (id, nut) in pending {
            let result: AcornResult<()> = (|| {
                if let Some(far) = &self.far {
                    far.save(&id, nut.clone())?;
                }
                self.backing.save(&id, nut.clone())
            })();
            match result {
                Ok(()) => {
                    self.dirty.lock().unwrap().remove(&id);
                    flushed += 1;
                }
                Err(err) => {
                    tracing::warn!(id = %id, error = %err, "write-back flush failed, retrying next tick");
                }
            }
        }
        Ok(flushed)
    }
}

#[cfg(feature = "background-loop")]
impl<T, B> NearFarTrunk<T, B>
where
    T: Clone + Send + Sync + 'static,
    B: Trunk<T> + Send + Sync + 'static,
{
    /// Runs `flush_dirty` on a timer until `stop` fires (§5: "the
    /// near-far cache write-back flusher runs on a timer" and must
    /// accept a cooperative stop signal).
    pub async fn run_flusher(&self, interval: Duration, mut stop: tokio::sync::oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.flush_dirty() {
                        Ok(flushed) if flushed > 0 => tracing::debug!(flushed, "write-back flush tick"),
                        Ok(_) => {}
                        Err(err) => tracing::warn!(error = %err, "write-back flush tick failed"),
                    }
                }
                _ = &mut stop => break,
            }
        }
    }
}

impl<T, B> Trunk<T> for NearFarTrunk<T, B>
where
    T: Clone + Send + Sync + 'static,
    B: Trunk<T>,
{
    fn save(&self, id: &str, nut: Nut<T>) -> AcornResult<()> {
        match self.options.write_policy {
            WritePolicy::WriteThrough => {
                if let Some(far) = &self.far {
                    far.save(id, nut.clone())?;
                }
                self.backing.save(id, nut.clone())?;
                self.near.lock().unwrap().insert(id, nut, self.clock.now());
            }
            WritePolicy::WriteBack => {
                self.dirty.lock().unwrap().insert(id.to_string(), nut.clone());
                self.near.lock().unwrap().insert(id, nut, self.clock.now());
            }
            WritePolicy::WriteAround => {
                if let Some(far) = &self.far {
                    far.save(id, nut.clone())?;
                }
                self.backing.save(id, nut)?;
                self.near.lock().unwrap().remove(id);
            }
        }
        Ok(())
    }

    fn load(&self, id: &str) -> AcornResult<Option<Nut<T>>> {
        let now = self.clock.now();
        if let Some(nut) = self.near.lock().unwrap().get(id, now, self.options.near_ttl) {
            return Ok(Some(nut));
        }

        if self.options.read_policy == ReadPolicy::ReadThrough {
            if let Some(far) = &self.far {
                if let Some(nut) = far.load(id)? {
                    self.near.lock().unwrap().insert(id, nut.clone(), now);
                    return Ok(Some(nut));
                }
            }
        }

        match self.backing.load(id)? {
            Some(nut) => {
                if self.options.read_policy == ReadPolicy::ReadThrough {
                    if let Some(far) = &self.far {
                        far.save(id, nut.clone())?;
                    }
                }
                self.near.lock().unwrap().insert(id, nut.clone(), now);
                Ok(Some(nut))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, id: &str) -> AcornResult<bool> {
        self.near.lock().unwrap().remove(id);
        self.dirty.lock().unwrap().remove(id);
        if let Some(far) = &self.far {
            far.delete(id)?;
        }
        self.backing.delete(id)
    }

    fn load_all(&self) -> AcornResult<Vec<Nut<T>>> {
        self.backing.load_all()
    }

    fn history(&self, id: &str) -> AcornResult<Option<Vec<Nut<T>>>> {
        self.backing.history(id)
    }

    fn capabilities(&self) -> TrunkCapabilities {
        self.backing.capabilities()
    }
}
