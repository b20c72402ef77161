use std::marker::PhantomData;

use acorn_core::{AcornError, AcornResult, Nut, Trunk, TrunkCapabilities};
use serde::{de::DeserializeOwned, Serialize};

use crate::pipeline::{RootEnvelope, RootPipeline};

fn ser_err(err: serde_json::Error) -> AcornError {
    AcornError::Serialization(err.to_string())
}

/// Wraps a byte-oriented [`Trunk<Vec<u8>>`] with a [`RootPipeline`],
/// presenting the same `Trunk<T>` contract to callers above it (§4.2).
/// Tombstones bypass the pipeline entirely: there is no payload to
/// transform or verify.
pub struct RootedTrunk<T, S> {
    inner: S,
    pipeline: RootPipeline,
    _marker: PhantomData<T>,
}

impl<T, S: std::fmt::Debug> std::fmt::Debug for RootedTrunk<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootedTrunk").field("inner", &self.inner).finish()
    }
}

impl<T, S> RootedTrunk<T, S> {
    pub fn new(inner: S, pipeline: RootPipeline) -> Self {
        RootedTrunk {
            inner,
            pipeline,
            _marker: PhantomData,
        }
    }
}

impl<T, S> Trunk<T> for RootedTrunk<T, S>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    S: Trunk<Vec<u8>>,
{
    fn save(&self, id: &str, nut: Nut<T>) -> AcornResult<()> {
        let stored_payload = match &nut.payload {
            None => None,
            Some(payload) => {
                let plain = serde_json::to_vec(payload).map_err(ser_err)?;
                let envelope = self.pipeline.encode(id, plain)?;
                Some(serde_json::to_vec(&envelope).map_err(ser_err)?)
            }
        };
        let stored = Nut {
            id: nut.id,
            payload: stored_payload,
            timestamp: nut.timestamp,
            version: nut.version,
            expires_at: nut.expires_at,
            tags: nut.tags,
        };
        self.inner.save(id, stored)
    }

    fn load(&self, id: &str) -> AcornResult<Option<Nut<T>>> {
        let Some(stored) = self.inner.load(id)? else {
            return Ok(None);
        };
        let payload = match stored.payload {
            None => None,
            Some(bytes) => {
                let envelope: RootEnvelope = serde_json::from_slice(&bytes).map_err(ser_err)?;
                let plain = self.pipeline.decode(id, envelope)?;
                Some(serde_json::from_slice(&plain).map_err(ser_err)?)
            }
        };
        Ok(Some(Nut {
            id: stored.id,
            payload,
            timestamp: stored.timestamp,
            version: stored.version,
            expires_at: stored.expires_at,
            tags: stored.tags,
        }))
    }

    fn delete(&self, id: &str) -> AcornResult<bool> {
        self.inner.delete(id)
    }

    fn load_all(&self) -> AcornResult<Vec<Nut<T>>> {
        self.inner
            .load_all()?
            .into_iter()
            .map(|stored| {
                let payload = match stored.payload {
                    None => None,
                    Some(bytes) => {
                        let envelope: RootEnvelope = serde_json::from_slice(&bytes).map_err(ser_err)?;
                        let plain = self.pipeline.decode(&stored.id, envelope)?;
                        Some(serde_json::from_slice(&plain).map_err(ser_err)?)
                    }
                };
                Ok(Nut {
                    id: stored.id,
                    payload,
                    timestamp: stored.timestamp,
                    version: stored.version,
                    expires_at: stored.expires_at,
                    tags: stored.tags,
                })
            })
            .collect()
    }

    fn history(&self, id: &str) -> AcornResult<Option<Vec<Nut<T>>>> {
        let Some(history) = self.inner.history(id)? else {
            return Ok(None);
        };
        history
            .into_iter()
            .map(|stored| {
                let payload = match stored.payload {
                    None => None,
                    Some(bytes) => {
                        let envelope: RootEnvelope = serde_json::from_slice(&bytes).map_err(ser_err)?;
                        let plain = self.pipeline.decode(&stored.id, envelope)?;
                        Some(serde_json::from_slice(&plain).map_err(ser_err)?)
                    }
                };
                Ok(Nut {
                    id: stored.id,
                    payload,
                    timestamp: stored.timestamp,
                    version: stored.version,
                    expires_at: stored.expires_at,
                    tags: stored.tags,
                })
            })
            .collect::<AcornResult<Vec<_>>>()
            .map(Some)
    }

    fn capabilities(&self) -> TrunkCapabilities {
        self.inner.capabilities()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::CompressionAlgo;
    use crate::pipeline::RootKind;
    use crate::policy::AllowAllPolicy;
    use acorn_trunk_mem::MemoryTrunk;
    use std::sync::Arc;
    use std::time::SystemTime;

    fn rooted() -> RootedTrunk<String, MemoryTrunk<Vec<u8>>> {
        let pipeline = RootPipeline::new(vec![
            RootKind::Policy(Arc::new(AllowAllPolicy)),
            RootKind::Compression(CompressionAlgo::Gzip),
        ]);
        RootedTrunk::new(MemoryTrunk::new(), pipeline)
    }

    #[test]
    fn save_and_load_round_trips_through_pipeline() {
        let trunk = rooted();
        let nut = Nut::new("doc-1", "hello world".to_string(), SystemTime::UNIX_EPOCH, 0);
        trunk.save("doc-1", nut).unwrap();
        let loaded = trunk.load("doc-1").unwrap().unwrap();
        assert_eq!(loaded.payload, Some("hello world".to_string()));
    }

    #[test]
    fn tombstones_bypass_the_pipeline() {
        let trunk = rooted();
        let tomb: Nut<String> = Nut::tombstone("doc-1", SystemTime::UNIX_EPOCH, 1);
        trunk.save("doc-1", tomb).unwrap();
        let loaded = trunk.load("doc-1").unwrap().unwrap();
        assert!(loaded.is_tombstone());
    }
}
