use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

use crate::tracking::TrackingContext;

/// Days a saved snapshot stays resumable.
pub const SNAPSHOT_TTL_DAYS: i64 = 30;

/// Serialized session state, overwritten on every debounced save and read
/// once at startup. Unknown fields in stored data are ignored on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub schema_version: String,
    pub step_index: usize,
    pub answers: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking: Option<TrackingContext>,
    #[serde(default)]
    pub rate_limit_until: i64,
    #[serde(default)]
    pub updated_at: String,
}

impl Snapshot {
    /// Age-based staleness. A timestamp that fails to parse never expires a
    /// snapshot on its own: ambiguous data is kept, not silently discarded.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        let Ok(saved_at) = OffsetDateTime::parse(&self.updated_at, &Rfc3339) else {
            return false;
        };
        now - saved_at > Duration::days(SNAPSHOT_TTL_DAYS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(updated_at: &str) -> Snapshot {
        Snapshot {
            schema_version: "1.0".into(),
            step_index: 0,
            answers: Map::new(),
            tracking: None,
            rate_limit_until: 0,
            updated_at: updated_at.into(),
        }
    }

    #[test]
    fn expires_strictly_after_the_ttl() {
        let now = OffsetDateTime::from_unix_timestamp(1_754_000_000).unwrap();
        let fresh = (now - Duration::days(29)).format(&Rfc3339).unwrap();
        let stale = (now - Duration::days(40)).format(&Rfc3339).unwrap();

        assert!(!snapshot(&fresh).is_expired(now));
        assert!(snapshot(&stale).is_expired(now));
    }

    #[test]
    fn unparsable_timestamp_never_expires() {
        let now = OffsetDateTime::from_unix_timestamp(1_754_000_000).unwrap();
        assert!(!snapshot("not-a-date").is_expired(now));
        assert!(!snapshot("").is_expired(now));
    }
}
