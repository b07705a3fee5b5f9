//! Identity types.

use std::fmt;

use uuid::Uuid;

/// Identifies one bridge instance in log records.
///
/// Several bridges may live in the same process (one per content view); the
/// id keeps their log lines apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BridgeId(Uuid);

impl BridgeId {
    /// Generates a fresh random (v4) id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for BridgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BridgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first block is enough to tell instances apart in a log.
        let text = self.0.to_string();
        f.write_str(&text[..8])
    }
}

/// Identifies one event listener registration.
///
/// Closures cannot be compared, so `off` takes this id instead of the
/// listener itself.  Ids are unique per bridge and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

impl ListenerId {
    /// The raw numeric value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_ids_are_unique() {
        assert_ne!(BridgeId::new(), BridgeId::new());
    }

    #[test]
    fn test_bridge_id_display_is_short_prefix() {
        let id = BridgeId::new();
        let shown = id.to_string();
        assert_eq!(shown.len(), 8);
        assert!(id.as_uuid().to_string().starts_with(&shown));
    }

    #[test]
    fn test_listener_id_display() {
        assert_eq!(ListenerId(7).to_string(), "listener#7");
        assert_eq!(ListenerId(7).value(), 7);
    }
}
