//! # Tracker Configuration

/// Runtime configuration of an [`AllocationService`](crate::AllocationService)
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Tracker name for log output
    pub name: &'static str,
    /// Report an overlapping `memtracker_add` as a failure instead of
    /// silently declining it
    pub strict_inserts: bool,
}

impl TrackerConfig {
    /// Declined inserts are logged but not reported
    pub const fn lenient(name: &'static str) -> Self {
        Self {
            name,
            strict_inserts: false,
        }
    }

    /// Declined inserts fail `memtracker_add`
    pub const fn strict(name: &'static str) -> Self {
        Self {
            name,
            strict_inserts: true,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::lenient("amtrack")
    }
}
