//! # Allocation Service
//!
//! Public operation surface of the tracker.
//!
//! Every call that changes device memory goes to the driver first and is
//! mirrored into the registry right after. The two steps are not atomic
//! as a pair: another thread may observe a freed range that is still
//! tracked (or a fresh reservation that is not yet tracked) in between.
//! Read paths consult the registry only.

use core::fmt;

use amtrack_core::{
    Accelerator, AgentHandle, AllocFlags, Cause, Error, MemAddr, MemoryDriver, Result,
};

use crate::config::TrackerConfig;
use crate::range::MemRange;
use crate::record::AllocationRecord;
use crate::registry::AddressRangeRegistry;

// =============================================================================
// SIZE ACCOUNTING
// =============================================================================

/// Bytes tracked for one accelerator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeInfo {
    /// Tracker-managed, device-resident
    pub device_bytes: u64,
    /// Tracker-managed, host-resident (pinned)
    pub host_bytes: u64,
    /// Registered through `memtracker_add`
    pub user_bytes: u64,
}

impl SizeInfo {
    /// Sum of all three totals
    pub const fn total(&self) -> u64 {
        self.device_bytes
            .saturating_add(self.host_bytes)
            .saturating_add(self.user_bytes)
    }
}

// =============================================================================
// ALLOCATION SERVICE
// =============================================================================

/// Tracker context: the registry plus the driver it mirrors
///
/// One instance is meant to live for the whole process and be shared by
/// reference; independent instances do not see each other's entries.
#[derive(Debug)]
pub struct AllocationService<D: MemoryDriver> {
    pub(crate) driver: D,
    pub(crate) registry: AddressRangeRegistry,
    config: TrackerConfig,
}

impl<D: MemoryDriver> AllocationService<D> {
    /// Create a service with the default configuration
    pub fn new(driver: D) -> Self {
        Self::with_config(driver, TrackerConfig::default())
    }

    /// Create a service
    pub fn with_config(driver: D, config: TrackerConfig) -> Self {
        Self {
            driver,
            registry: AddressRangeRegistry::new(),
            config,
        }
    }

    /// Get the driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Get the registry
    pub fn registry(&self) -> &AddressRangeRegistry {
        &self.registry
    }

    /// Get the configuration
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Allocation
    // -------------------------------------------------------------------------

    /// Reserve `size` bytes on `acc` and track the range
    ///
    /// Returns `None` when `size` is zero, when the accelerator lacks the
    /// selected pool, or when the driver refuses. A returned address always
    /// has exactly one registry entry.
    pub fn allocate(&self, size: u64, acc: &Accelerator, flags: AllocFlags) -> Option<MemAddr> {
        if size == 0 {
            return None;
        }

        let host_pinned = flags.contains(AllocFlags::HOST_PINNED);
        let Some(pool) = acc.pool_for(flags) else {
            log::debug!("{}: {} has no pool for {:?}", self.config.name, acc, flags);
            return None;
        };

        let ptr = match self.driver.reserve(pool, size) {
            Ok(ptr) => ptr,
            Err(e) => {
                log::debug!("{}: reserve of {} bytes failed: {}", self.config.name, size, e);
                return None;
            }
        };

        let record = if host_pinned {
            if let Err(e) = self.driver.allow_access(&[acc.default_agent()], None, ptr) {
                log::warn!(
                    "{}: grant on pinned {} failed ({}), rolling back",
                    self.config.name,
                    ptr,
                    e
                );
                self.release(ptr);
                return None;
            }
            AllocationRecord::new(ptr, ptr, size, *acc, false, true)
        } else {
            AllocationRecord::new(MemAddr::null(), ptr, size, *acc, true, true)
        };

        if !self.registry.insert(ptr, record) {
            self.release(ptr);
            return None;
        }

        log::debug!("{}: allocated {} bytes at {} on {}", self.config.name, size, ptr, acc);
        Some(ptr)
    }

    /// Free memory returned by [`allocate`](Self::allocate)
    ///
    /// The driver free happens unconditionally; the call still fails if no
    /// entry was tracked for `ptr`. A null pointer is a no-op.
    pub fn free(&self, ptr: MemAddr) -> Result<()> {
        if ptr.is_null() {
            return Ok(());
        }

        if let Err(e) = self.driver.free(ptr) {
            log::debug!("{}: driver free of {} failed: {}", self.config.name, ptr, e);
        }

        match self.registry.remove(ptr) {
            Some(_) => Ok(()),
            None => Err(Error::new(Cause::NotFound)),
        }
    }

    /// Synchronous copy through the driver
    pub fn copy(&self, dst: MemAddr, src: MemAddr, size: u64) -> Result<()> {
        self.driver.copy(dst, src, size)
    }

    fn release(&self, ptr: MemAddr) {
        if let Err(e) = self.driver.free(ptr) {
            log::warn!("{}: rollback free of {} failed: {}", self.config.name, ptr, e);
        }
    }

    // -------------------------------------------------------------------------
    // Registry maintenance
    // -------------------------------------------------------------------------

    /// Copy of the record whose range contains `addr`
    pub fn memtracker_get_info(&self, addr: MemAddr) -> Result<AllocationRecord> {
        self.registry.find(addr).ok_or(Error::new(Cause::NotFound))
    }

    /// Track memory allocated outside this service
    ///
    /// Records are laid out the way [`allocate`](Self::allocate) lays
    /// them out: a device entry has a null `host_addr` and `device_addr`
    /// set to `ptr`, a host entry has both set to `ptr`.
    ///
    /// The entry is not tracker-managed, so
    /// [`memtracker_reset`](Self::memtracker_reset) drops it without
    /// freeing the memory. A null `ptr`, a zero `size` or a range running
    /// past the top of the address space fails with `InvalidArgument`.
    pub fn memtracker_add(
        &self,
        ptr: MemAddr,
        size: u64,
        acc: &Accelerator,
        is_device: bool,
    ) -> Result<()> {
        if ptr.is_null() || MemRange::new(ptr, size).is_none() {
            return Err(Error::new(Cause::InvalidArgument));
        }

        let record = if is_device {
            AllocationRecord::new(MemAddr::null(), ptr, size, *acc, true, false)
        } else {
            AllocationRecord::new(ptr, ptr, size, *acc, false, false)
        };

        if !self.registry.insert(ptr, record) && self.config.strict_inserts {
            return Err(Error::new(Cause::Overlap));
        }
        Ok(())
    }

    /// Set the application tags of the record containing `addr`
    pub fn memtracker_update(&self, addr: MemAddr, app_id: i32, app_flags: u32) -> Result<()> {
        if self.registry.update(addr, app_id, app_flags) {
            Ok(())
        } else {
            Err(Error::new(Cause::NotFound))
        }
    }

    /// Stop tracking the range containing `ptr` without freeing it
    pub fn memtracker_remove(&self, ptr: MemAddr) -> Result<()> {
        self.registry
            .remove(ptr)
            .map(|_| ())
            .ok_or(Error::new(Cause::NotFound))
    }

    /// Write one line per tracked range to `out`
    pub fn memtracker_print<W>(&self, out: &mut W) -> fmt::Result
    where
        W: fmt::Write + ?Sized,
    {
        let guard = self.registry.lock();
        for (range, record) in &guard {
            writeln!(out, "  {}::  {}", range, record)?;
        }
        Ok(())
    }

    /// Emit the same dump as [`memtracker_print`](Self::memtracker_print)
    /// at debug level
    pub fn memtracker_log(&self) {
        let guard = self.registry.lock();
        log::debug!("{}: {} tracked ranges", self.config.name, guard.len());
        for (range, record) in &guard {
            log::debug!("  {}::  {}", range, record);
        }
    }

    /// Tracked bytes owned by `acc`
    pub fn memtracker_size_info(&self, acc: &Accelerator) -> SizeInfo {
        let guard = self.registry.lock();
        let mut info = SizeInfo::default();

        for (_, record) in guard.iter().filter(|(_, r)| r.accelerator == *acc) {
            let total = match (record.is_tracker_managed, record.is_device_resident) {
                (true, true) => &mut info.device_bytes,
                (true, false) => &mut info.host_bytes,
                (false, _) => &mut info.user_bytes,
            };
            *total = total.saturating_add(record.size_bytes);
        }

        info
    }

    /// Drop every entry owned by `acc`, freeing tracker-managed memory
    pub fn memtracker_reset(&self, acc: &Accelerator) -> usize {
        self.registry.reset(acc, &self.driver)
    }

    /// Grant `peers` access to every device range owned by `acc`
    pub fn memtracker_update_peers(&self, acc: &Accelerator, peers: &[AgentHandle]) -> usize {
        self.registry.update_peers(acc, peers, &self.driver)
    }
}
