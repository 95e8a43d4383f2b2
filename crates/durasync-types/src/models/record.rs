//! Save record addressing.

use serde::{Deserialize, Serialize};

/// Identifies one persisted record: a coarse `slot` namespace plus a `key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SaveRecordId {
    pub slot: String,
    pub key: String,
}

impl SaveRecordId {
    pub fn new(slot: impl Into<String>, key: impl Into<String>) -> Self {
        Self { slot: slot.into(), key: key.into() }
    }

    /// Both parts must contain something other than whitespace.
    pub fn is_valid(&self) -> bool {
        !self.slot.trim().is_empty() && !self.key.trim().is_empty()
    }
}

impl std::fmt::Display for SaveRecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.slot, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_validity() {
        assert!(SaveRecordId::new("global", "profile").is_valid());
        assert!(!SaveRecordId::new("  ", "profile").is_valid());
        assert!(!SaveRecordId::new("global", "").is_valid());
    }

    #[test]
    fn test_record_display() {
        assert_eq!(SaveRecordId::new("player-1", "inventory").to_string(), "player-1/inventory");
    }
}
