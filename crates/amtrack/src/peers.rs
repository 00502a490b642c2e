//! # Peer Access Mapping
//!
//! Grants other accelerators hardware access to a tracked allocation.
//!
//! The requested accelerators are reduced to a deduplicated list of
//! agents, each checked against the access policy of the pool backing the
//! allocation. All agents are granted in a single driver call, or none.

use alloc::vec::Vec;

use amtrack_core::{Accelerator, AgentHandle, Cause, Error, MemAddr, MemoryDriver, Result};

use crate::service::AllocationService;

impl<D: MemoryDriver> AllocationService<D> {
    /// Make the allocation containing `ptr` accessible from `peers`
    ///
    /// Device-resident memory is looked up in its accelerator's device
    /// pool and the owner is skipped (it already has access). Host memory
    /// is only supported when this service allocated it. An interior
    /// `ptr` grants the whole allocation. An empty agent set after
    /// filtering succeeds without a driver call.
    pub fn map_to_peers(&self, ptr: MemAddr, peers: &[Accelerator]) -> Result<()> {
        if ptr.is_null() || peers.is_empty() {
            return Err(Error::new(Cause::InvalidArgument));
        }

        let (range, record) = self
            .registry
            .find_entry(ptr)
            .ok_or(Error::new(Cause::NotFound))?;
        let owner = record.accelerator;

        let pool = if record.is_device_resident {
            owner.device_pool()
        } else if record.is_tracker_managed {
            owner.system_pool()
        } else {
            None
        }
        .ok_or(Error::new(Cause::Unsupported))?;

        let mut agents: Vec<AgentHandle> = Vec::with_capacity(peers.len());
        for peer in peers {
            if record.is_device_resident && *peer == owner {
                continue;
            }

            let agent = peer.default_agent();
            let access = self.driver.access_policy(agent, pool)?;
            if !access.is_grantable() {
                log::debug!("map_to_peers: {} may never access pool {:?}", peer, pool);
                return Err(Error::new(Cause::AccessDenied));
            }

            if !agents.contains(&agent) {
                agents.push(agent);
            }
        }

        if agents.is_empty() {
            return Ok(());
        }

        log::debug!("map_to_peers: {} -> {:?}", range, agents);
        self.driver.allow_access(&agents, Some(pool), range.base())
    }
}

#[cfg(test)]
mod tests {
    use amtrack_core::sim::{SimDriver, SimFaults};
    use amtrack_core::{AllocFlags, PoolAccess};

    use super::*;

    fn setup(count: u32) -> (AllocationService<SimDriver>, Vec<Accelerator>) {
        let driver = SimDriver::new(count);
        let accs = driver.accelerators();
        (AllocationService::new(driver), accs)
    }

    #[test]
    fn test_device_pointer_skips_owner() {
        let (svc, accs) = setup(3);
        let ptr = svc.allocate(4096, &accs[0], AllocFlags::empty()).unwrap();

        svc.map_to_peers(ptr, &accs).unwrap();

        let grants = svc.driver().grants();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].agents, [accs[1].default_agent(), accs[2].default_agent()]);
        assert_eq!(grants[0].pool, accs[0].device_pool());
        assert_eq!(grants[0].addr, ptr);
    }

    #[test]
    fn test_duplicates_collapse_into_one_grant() {
        let (svc, accs) = setup(2);
        let ptr = svc.allocate(64, &accs[0], AllocFlags::empty()).unwrap();

        svc.map_to_peers(ptr, &[accs[1], accs[1], accs[0], accs[1]]).unwrap();

        let grants = svc.driver().grants();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].agents, [accs[1].default_agent()]);
    }

    #[test]
    fn test_owner_only_is_vacuous_success() {
        let (svc, accs) = setup(1);
        let ptr = svc.allocate(64, &accs[0], AllocFlags::empty()).unwrap();

        assert!(svc.map_to_peers(ptr, &accs).is_ok());
        assert!(svc.driver().grants().is_empty());
    }

    #[test]
    fn test_pinned_pointer_keeps_owner_and_uses_system_pool() {
        let (svc, accs) = setup(2);
        let ptr = svc.allocate(64, &accs[0], AllocFlags::HOST_PINNED).unwrap();
        svc.driver().clear_journal();

        svc.map_to_peers(ptr, &accs).unwrap();

        let grants = svc.driver().grants();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].agents, [accs[0].default_agent(), accs[1].default_agent()]);
        assert_eq!(grants[0].pool, accs[0].system_pool());
    }

    #[test]
    fn test_interior_pointer_resolves() {
        let (svc, accs) = setup(2);
        let ptr = svc.allocate(4096, &accs[0], AllocFlags::empty()).unwrap();

        svc.map_to_peers(ptr + 100, &accs[1..]).unwrap();
        assert_eq!(svc.driver().grants()[0].addr, ptr);
    }

    #[test]
    fn test_policy_never_allowed_fails_fast() {
        let (svc, accs) = setup(3);
        let ptr = svc.allocate(64, &accs[0], AllocFlags::empty()).unwrap();
        svc.driver().set_policy(
            accs[2].default_agent(),
            accs[0].device_pool().unwrap(),
            PoolAccess::NeverAllowed,
        );

        let err = svc.map_to_peers(ptr, &accs).unwrap_err();
        assert_eq!(err.cause(), Cause::AccessDenied);
        assert!(svc.driver().grants().is_empty());
    }

    #[test]
    fn test_policy_query_failure() {
        let (svc, accs) = setup(2);
        let ptr = svc.allocate(64, &accs[0], AllocFlags::empty()).unwrap();
        svc.driver().set_faults(SimFaults {
            access_policy: true,
            ..SimFaults::default()
        });

        assert!(svc.map_to_peers(ptr, &accs).is_err());
    }

    #[test]
    fn test_rejected_inputs() {
        let (svc, accs) = setup(2);
        let external = MemAddr::new(0x7000);
        svc.memtracker_add(external, 64, &accs[0], false).unwrap();

        assert!(svc.map_to_peers(MemAddr::null(), &accs).is_err());
        assert!(svc.map_to_peers(external, &[]).is_err());
        assert!(svc.map_to_peers(MemAddr::new(0x1), &accs).is_err());

        // Host memory registered from outside is not supported
        let err = svc.map_to_peers(external, &accs).unwrap_err();
        assert_eq!(err.cause(), Cause::Unsupported);
    }

    #[test]
    fn test_grant_failure_propagates() {
        let (svc, accs) = setup(2);
        let ptr = svc.allocate(64, &accs[0], AllocFlags::empty()).unwrap();
        svc.driver().set_faults(SimFaults {
            allow_access: true,
            ..SimFaults::default()
        });

        assert!(svc.map_to_peers(ptr, &accs[1..]).is_err());
    }
}
