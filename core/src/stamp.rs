//! Timestamp and nonce generation for outbound requests.

use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

/// Replay-protection values for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestStamp {
    /// Milliseconds since the Unix epoch, rendered as decimal text.
    pub timestamp: String,
    pub nonce: String,
}

/// Source of fresh `RequestStamp`s. Called once per outbound request.
pub trait StampSource: Send + Sync {
    fn stamp(&self) -> RequestStamp;
}

/// Wall clock plus a random UUID v4 nonce.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemStamp;

impl StampSource for SystemStamp {
    fn stamp(&self) -> RequestStamp {
        // A clock set before 1970 signs with 0 and the gateway rejects it.
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        RequestStamp {
            timestamp: millis.to_string(),
            nonce: Uuid::new_v4().to_string(),
        }
    }
}

/// Always returns the same stamp. For reproducing known signatures.
#[derive(Debug, Clone)]
pub struct FixedStamp(pub RequestStamp);

impl FixedStamp {
    pub fn new(timestamp: &str, nonce: &str) -> Self {
        Self(RequestStamp {
            timestamp: timestamp.to_string(),
            nonce: nonce.to_string(),
        })
    }
}

impl StampSource for FixedStamp {
    fn stamp(&self) -> RequestStamp {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_stamp_is_fresh_per_call() {
        let first = SystemStamp.stamp();
        let second = SystemStamp.stamp();
        assert_ne!(first.nonce, second.nonce);
        assert!(first.timestamp.parse::<u128>().unwrap() > 1_600_000_000_000);
        assert!(second.timestamp.parse::<u128>().unwrap() >= first.timestamp.parse::<u128>().unwrap());
    }
}
