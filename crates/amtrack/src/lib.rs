//! # AMTRACK
//!
//! Address-range allocation tracker and peer-access coordinator for
//! accelerator memory.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       AllocationService                         │
//! │    allocate / free / copy / memtracker_* / map_to_peers         │
//! │                                                                 │
//! │  ┌─────────────────────────────┐   ┌─────────────────────────┐  │
//! │  │    AddressRangeRegistry     │   │      MemoryDriver       │  │
//! │  │  MemRange → AllocationRecord│   │ (reserve, free, grant,  │  │
//! │  │  one lock, O(log N) lookup  │   │  policy, copy)          │  │
//! │  └─────────────────────────────┘   └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Registry Design
//!
//! Keys are byte ranges ordered so that overlapping ranges compare equal.
//! Any address inside a tracked range finds, updates or removes that
//! range. The map itself never checks that inserted ranges are disjoint;
//! the allocation protocol guarantees it by construction.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod config;
mod peers;
pub mod range;
pub mod record;
pub mod registry;
pub mod service;

// Re-exports
pub use config::TrackerConfig;
pub use range::MemRange;
pub use record::AllocationRecord;
pub use registry::{AddressRangeRegistry, RegistryGuard};
pub use service::{AllocationService, SizeInfo};

pub use amtrack_core::{
    Accelerator, AcceleratorId, AgentHandle, AllocFlags, Cause, Error, MemAddr, MemoryDriver,
    PoolAccess, PoolHandle, Result, Status,
};

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use amtrack_core::sim::SimDriver;

    use super::*;

    #[test]
    fn test_every_interior_address_resolves() {
        let svc = AllocationService::new(SimDriver::new(2));
        let a = svc.driver().accelerator(0).unwrap();
        let b = svc.driver().accelerator(1).unwrap();

        let sizes = [1u64, 17, 256, 4096];
        let ptrs: Vec<MemAddr> = sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| {
                let owner = if i % 2 == 0 { &a } else { &b };
                svc.allocate(size, owner, AllocFlags::empty()).unwrap()
            })
            .collect();

        for (&ptr, &size) in ptrs.iter().zip(&sizes) {
            let expected = svc.memtracker_get_info(ptr).unwrap();
            for offset in 0..size {
                assert_eq!(svc.memtracker_get_info(ptr + offset).unwrap(), expected);
            }
            assert!(svc.memtracker_get_info(ptr + size).is_err());
            assert!(svc.memtracker_get_info(MemAddr::new(ptr.raw() - 1)).is_err());
        }
    }

    #[test]
    fn test_device_allocation_boundaries() {
        let svc = AllocationService::new(SimDriver::new(1));
        let a = svc.driver().accelerator(0).unwrap();

        let base = svc.allocate(4096, &a, AllocFlags::empty()).unwrap();
        assert!(svc.registry().find(base).is_some());
        assert!(svc.registry().find(base + 4095).is_some());
        assert!(svc.registry().find(base + 4096).is_none());
    }

    #[test]
    fn test_pinned_allocation_then_reset() {
        let svc = AllocationService::new(SimDriver::new(1));
        let a = svc.driver().accelerator(0).unwrap();

        let ptr = svc.allocate(64, &a, AllocFlags::HOST_PINNED).unwrap();
        assert_eq!(svc.memtracker_reset(&a), 1);
        assert_eq!(svc.driver().frees(), [ptr]);
        assert!(svc.registry().is_empty());
    }

    #[test]
    fn test_external_entry_reset_without_free() {
        let svc = AllocationService::new(SimDriver::new(1));
        let a = svc.driver().accelerator(0).unwrap();

        svc.memtracker_add(MemAddr::new(0x6000_0000), 0x2000, &a, true).unwrap();
        assert_eq!(svc.memtracker_reset(&a), 1);
        assert!(svc.driver().frees().is_empty());
        assert!(svc.registry().is_empty());
    }

    #[test]
    fn test_allocate_free_keeps_registry_in_step() {
        let svc = AllocationService::new(SimDriver::new(1));
        let a = svc.driver().accelerator(0).unwrap();

        let ptrs: Vec<MemAddr> = (1..=8u64)
            .map(|i| svc.allocate(i * 100, &a, AllocFlags::empty()).unwrap())
            .collect();
        assert_eq!(svc.registry().len(), 8);
        assert_eq!(svc.driver().live_count(), 8);

        for ptr in ptrs {
            svc.free(ptr).unwrap();
        }
        assert!(svc.registry().is_empty());
        assert_eq!(svc.driver().live_count(), 0);
    }
}
