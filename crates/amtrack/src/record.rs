//! # Allocation Record
//!
//! Provenance of one tracked memory region.

use core::fmt;

use amtrack_core::{Accelerator, MemAddr};

/// Everything the tracker knows about one region
///
/// Only [`app_id`](Self::app_id) and [`app_flags`](Self::app_flags)
/// change after the record has been registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRecord {
    /// Host address (null for device-only memory)
    pub host_addr: MemAddr,
    /// Device address
    pub device_addr: MemAddr,
    /// Size of the region in bytes
    pub size_bytes: u64,
    /// Owning accelerator
    pub accelerator: Accelerator,
    /// Primary address lives in accelerator memory
    pub is_device_resident: bool,
    /// The tracker frees the allocation on eviction
    pub is_tracker_managed: bool,
    /// Caller tag
    pub app_id: i32,
    /// Caller allocation flags
    pub app_flags: u32,
}

impl AllocationRecord {
    /// Create a record with cleared application tags
    pub const fn new(
        host_addr: MemAddr,
        device_addr: MemAddr,
        size_bytes: u64,
        accelerator: Accelerator,
        is_device_resident: bool,
        is_tracker_managed: bool,
    ) -> Self {
        Self {
            host_addr,
            device_addr,
            size_bytes,
            accelerator,
            is_device_resident,
            is_tracker_managed,
            app_id: 0,
            app_flags: 0,
        }
    }
}

impl fmt::Display for AllocationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "host:{} device:{} size:{} acc:{} device_resident:{} managed:{} app_id:{} \
             app_flags:{:#x}",
            self.host_addr,
            self.device_addr,
            self.size_bytes,
            self.accelerator,
            self.is_device_resident,
            self.is_tracker_managed,
            self.app_id,
            self.app_flags,
        )
    }
}

static_assertions::assert_impl_all!(AllocationRecord: Send, Sync, Copy);
