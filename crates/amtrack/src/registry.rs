//! # Address Range Registry
//!
//! Concurrent ordered map from tracked ranges to their records.
//!
//! Lookups accept any address inside a range and run in O(log N). Every
//! operation, full scans included, holds the one registry lock for its
//! whole duration: scans do not run alongside each other or alongside
//! mutations.

use alloc::collections::btree_map::{self, BTreeMap, Entry};

use amtrack_core::{Accelerator, AgentHandle, MemAddr, MemoryDriver};
use spin::{Mutex, MutexGuard};

use crate::range::MemRange;
use crate::record::AllocationRecord;

type RangeMap = BTreeMap<MemRange, AllocationRecord>;

// =============================================================================
// REGISTRY
// =============================================================================

/// Registry of every tracked region
///
/// Ranges stored here must be pairwise disjoint. Insertion does not check
/// this beyond declining a range that overlaps an existing key.
#[derive(Debug)]
pub struct AddressRangeRegistry {
    entries: Mutex<RangeMap>,
}

impl AddressRangeRegistry {
    /// Create an empty registry
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Track `record` under `[base, base + record.size_bytes)`
    ///
    /// Returns `false` without touching the registry when the range is
    /// empty, wraps past the top of the address space, or overlaps a
    /// tracked range.
    pub fn insert(&self, base: MemAddr, record: AllocationRecord) -> bool {
        log::trace!("insert: {} + {}", base, record.size_bytes);

        let Some(range) = MemRange::new(base, record.size_bytes) else {
            log::warn!("insert: declined invalid range {} + {}", base, record.size_bytes);
            return false;
        };

        match self.entries.lock().entry(range) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
            Entry::Occupied(existing) => {
                log::warn!(
                    "insert: {} overlaps tracked range {}, declined",
                    range,
                    existing.key()
                );
                false
            }
        }
    }

    /// Stop tracking the range containing `addr`
    pub fn remove(&self, addr: MemAddr) -> Option<AllocationRecord> {
        log::trace!("remove: {}", addr);
        self.entries.lock().remove(&MemRange::probe(addr))
    }

    /// Copy of the record whose range contains `addr`
    pub fn find(&self, addr: MemAddr) -> Option<AllocationRecord> {
        self.find_entry(addr).map(|(_, record)| record)
    }

    /// Range and record containing `addr`
    pub fn find_entry(&self, addr: MemAddr) -> Option<(MemRange, AllocationRecord)> {
        log::trace!("find: {}", addr);
        self.entries
            .lock()
            .get_key_value(&MemRange::probe(addr))
            .map(|(range, record)| (*range, *record))
    }

    /// Replace the application tags of the record containing `addr`
    ///
    /// Returns `false` if no range contains `addr`.
    pub fn update(&self, addr: MemAddr, app_id: i32, app_flags: u32) -> bool {
        match self.entries.lock().get_mut(&MemRange::probe(addr)) {
            Some(record) => {
                record.app_id = app_id;
                record.app_flags = app_flags;
                true
            }
            None => false,
        }
    }

    /// Lock the registry for a full scan
    ///
    /// The lock is held until the guard is dropped.
    pub fn lock(&self) -> RegistryGuard<'_> {
        RegistryGuard {
            entries: self.entries.lock(),
        }
    }

    /// Drop every entry owned by `acc`
    ///
    /// Tracker-managed allocations are freed through `driver` before their
    /// entry goes away. Returns the number of entries removed.
    pub fn reset<D>(&self, acc: &Accelerator, driver: &D) -> usize
    where
        D: MemoryDriver + ?Sized,
    {
        let mut entries = self.entries.lock();
        let mut count = 0;

        entries.retain(|range, record| {
            if record.accelerator != *acc {
                return true;
            }
            if record.is_tracker_managed {
                if let Err(e) = driver.free(range.base()) {
                    log::warn!("reset: free of {} failed: {}", range.base(), e);
                }
            }
            count += 1;
            false
        });

        log::debug!("reset: {} ranges removed for {}", count, acc);
        count
    }

    /// Grant `peers` access to every device-resident range owned by `acc`
    ///
    /// Driver failures are logged and skipped. Returns the number of
    /// ranges a grant was requested for.
    pub fn update_peers<D>(&self, acc: &Accelerator, peers: &[AgentHandle], driver: &D) -> usize
    where
        D: MemoryDriver + ?Sized,
    {
        let entries = self.entries.lock();
        let mut count = 0;

        for (range, _) in entries
            .iter()
            .filter(|(_, record)| record.accelerator == *acc && record.is_device_resident)
        {
            log::debug!("update_peers: {} -> {:?}", range, peers);
            if let Err(e) = driver.allow_access(peers, None, range.base()) {
                log::warn!("update_peers: grant on {} failed: {}", range.base(), e);
            }
            count += 1;
        }

        count
    }

    /// Number of tracked ranges
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for AddressRangeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// LOCKED SCAN
// =============================================================================

/// Exclusive hold on the registry for a full scan
#[derive(Debug)]
pub struct RegistryGuard<'a> {
    entries: MutexGuard<'a, RangeMap>,
}

impl RegistryGuard<'_> {
    /// Iterate over all entries in address order
    pub fn iter(&self) -> btree_map::Iter<'_, MemRange, AllocationRecord> {
        self.entries.iter()
    }

    /// Number of tracked ranges
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a, 'g> IntoIterator for &'g RegistryGuard<'a> {
    type Item = (&'g MemRange, &'g AllocationRecord);
    type IntoIter = btree_map::Iter<'g, MemRange, AllocationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

static_assertions::assert_impl_all!(AddressRangeRegistry: Send, Sync);
