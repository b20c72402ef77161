use std::collections::HashSet;
use std::time::SystemTime;

use serde::{de::DeserializeOwned, Serialize};

/// The unit of storage and replication: an immutable, versioned,
/// timestamped envelope around a typed payload.
///
/// Once emitted, a `Nut` is never mutated in place; an update produces
/// a new `Nut` with `version = prior + 1`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: DeserializeOwned"))]
pub struct Nut<T> {
    pub id: String,
    /// `None` only on tombstones (produced by `Toss`).
    pub payload: Option<T>,
    #[serde(with = "system_time_millis")]
    pub timestamp: SystemTime,
    pub version: u64,
    #[serde(default, with = "option_system_time_millis")]
    pub expires_at: Option<SystemTime>,
    #[serde(default)]
    pub tags: Option<HashSet<String>>,
}

impl<T> Nut<T> {
    pub fn new(id: impl Into<String>, payload: T, timestamp: SystemTime, version: u64) -> Self {
        Nut {
            id: id.into(),
            payload: Some(payload),
            timestamp,
            version,
            expires_at: None,
            tags: None,
        }
    }

    pub fn tombstone(id: impl Into<String>, timestamp: SystemTime, version: u64) -> Self {
        Nut {
            id: id.into(),
            payload: None,
            timestamp,
            version,
            expires_at: None,
            tags: None,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.payload.is_none()
    }

    pub fn is_expired(&self, now: SystemTime) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }

    pub fn with_expires_at(mut self, at: SystemTime) -> Self {
        self.expires_at = Some(at);
        self
    }

    pub fn with_tags(mut self, tags: HashSet<String>) -> Self {
        self.tags = Some(tags);
        self
    }
}

impl<T: Clone> Nut<T> {
    /// Builds the next version of this nut with a fresh payload and timestamp.
    pub fn next(&self, payload: T, now: SystemTime) -> Self {
        Nut {
            id: self.id.clone(),
            payload: Some(payload),
            timestamp: now,
            version: self.version + 1,
            expires_at: None,
            tags: self.tags.clone(),
        }
    }
}

mod system_time_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S: Serializer>(value: &SystemTime, ser: S) -> Result<S::Ok, S::Error> {
        let millis = value.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64;
        ser.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<SystemTime, D::Error> {
        let millis = u64::deserialize(de)?;
        Ok(UNIX_EPOCH + Duration::from_millis(millis))
    }
}

mod option_system_time_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S: Serializer>(value: &Option<SystemTime>, ser: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => {
                let millis = t.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64;
                ser.serialize_some(&millis)
            }
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<SystemTime>, D::Error> {
        let millis = Option::<u64>::deserialize(de)?;
        Ok(millis.map(|m| UNIX_EPOCH + Duration::from_millis(m)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_increments_version_and_replaces_payload() {
        let base = Nut::new("k1", 1u32, SystemTime::UNIX_EPOCH, 0);
        let later = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1);
        let updated = base.next(2u32, later);
        assert_eq!(updated.version, 1);
        assert_eq!(updated.payload, Some(2));
        assert_eq!(updated.timestamp, later);
    }

    #[test]
    fn tombstone_has_no_payload() {
        let tomb: Nut<u32> = Nut::tombstone("k1", SystemTime::UNIX_EPOCH, 4);
        assert!(tomb.is_tombstone());
    }

    #[test]
    fn expiry_is_inclusive_of_boundary() {
        let at = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(10);
        let nut = Nut::new("k1", 1u32, SystemTime::UNIX_EPOCH, 0).with_expires_at(at);
        assert!(nut.is_expired(at));
        assert!(!nut.is_expired(at - std::time::Duration::from_millis(1)));
    }
}
