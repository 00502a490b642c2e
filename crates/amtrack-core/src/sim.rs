//! # Simulated Driver
//!
//! An in-memory [`MemoryDriver`] for tests and host-side bring-up.
//!
//! Reservations come from a bump cursor with a guard gap between
//! allocations, so addresses are never reused and never adjacent. Every
//! free and grant is journaled for later inspection, and each driver
//! primitive can be made to fail on demand.

use alloc::vec::Vec;

use hashbrown::HashMap;
use spin::Mutex;

use crate::driver::MemoryDriver;
use crate::error::{Cause, Error, Result};
use crate::types::*;

/// First address handed out
const SIM_BASE: u64 = 0x7f00_0000_0000;
/// Reservation granularity and guard gap
const SIM_PAGE: u64 = 4096;
/// Pool shared by all simulated accelerators for host-pinned memory
pub const SIM_SYSTEM_POOL: PoolHandle = PoolHandle(0x5000);

// =============================================================================
// JOURNAL
// =============================================================================

/// A recorded access grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    /// Agents granted access
    pub agents: Vec<AgentHandle>,
    /// Pool passed with the request
    pub pool: Option<PoolHandle>,
    /// Allocation base address
    pub addr: MemAddr,
}

/// Failure injection switches
#[derive(Debug, Clone, Copy, Default)]
pub struct SimFaults {
    /// `reserve` fails
    pub reserve: bool,
    /// `allow_access` fails
    pub allow_access: bool,
    /// `access_policy` fails
    pub access_policy: bool,
    /// `copy` fails
    pub copy: bool,
}

#[derive(Debug)]
struct SimState {
    cursor: u64,
    live: HashMap<MemAddr, (PoolHandle, u64)>,
    policies: HashMap<(AgentHandle, PoolHandle), PoolAccess>,
    faults: SimFaults,
    frees: Vec<MemAddr>,
    grants: Vec<Grant>,
    copies: u64,
}

// =============================================================================
// SIM DRIVER
// =============================================================================

/// In-memory driver
#[derive(Debug)]
pub struct SimDriver {
    accelerators: Vec<Accelerator>,
    state: Mutex<SimState>,
}

impl SimDriver {
    /// Create a driver exposing `count` accelerators
    ///
    /// Accelerator `i` gets agent `0x100 + i` and device pool `0x1000 + i`;
    /// all of them share [`SIM_SYSTEM_POOL`].
    pub fn new(count: u32) -> Self {
        let accelerators = (0..count)
            .map(|i| {
                Accelerator::new(
                    AcceleratorId(i),
                    AgentHandle(0x100 + u64::from(i)),
                    Some(PoolHandle(0x1000 + u64::from(i))),
                    Some(SIM_SYSTEM_POOL),
                )
            })
            .collect();
        Self::with_accelerators(accelerators)
    }

    /// Create a driver exposing the given accelerators
    pub fn with_accelerators(accelerators: Vec<Accelerator>) -> Self {
        Self {
            accelerators,
            state: Mutex::new(SimState {
                cursor: SIM_BASE,
                live: HashMap::new(),
                policies: HashMap::new(),
                faults: SimFaults::default(),
                frees: Vec::new(),
                grants: Vec::new(),
                copies: 0,
            }),
        }
    }

    /// Get accelerator by index
    pub fn accelerator(&self, index: usize) -> Option<Accelerator> {
        self.accelerators.get(index).copied()
    }

    /// Set the access policy of `agent` towards `pool`
    ///
    /// Unset pairs report [`PoolAccess::DisallowedByDefault`].
    pub fn set_policy(&self, agent: AgentHandle, pool: PoolHandle, access: PoolAccess) {
        self.state.lock().policies.insert((agent, pool), access);
    }

    /// Replace the failure injection switches
    pub fn set_faults(&self, faults: SimFaults) {
        self.state.lock().faults = faults;
    }

    /// Every address passed to `free`, in call order
    pub fn frees(&self) -> Vec<MemAddr> {
        self.state.lock().frees.clone()
    }

    /// Every successful grant, in call order
    pub fn grants(&self) -> Vec<Grant> {
        self.state.lock().grants.clone()
    }

    /// Number of successful copies
    pub fn copies(&self) -> u64 {
        self.state.lock().copies
    }

    /// Number of outstanding reservations
    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Check whether `addr` is an outstanding reservation
    pub fn is_live(&self, addr: MemAddr) -> bool {
        self.state.lock().live.contains_key(&addr)
    }

    /// Forget recorded frees and grants
    pub fn clear_journal(&self) {
        let mut state = self.state.lock();
        state.frees.clear();
        state.grants.clear();
    }
}

impl MemoryDriver for SimDriver {
    fn reserve(&self, pool: PoolHandle, size: u64) -> Result<MemAddr> {
        let mut state = self.state.lock();
        if state.faults.reserve || size == 0 {
            return Err(Error::new(Cause::DriverRejected));
        }

        let addr = MemAddr::new(state.cursor);
        let span = size.div_ceil(SIM_PAGE) * SIM_PAGE;
        state.cursor += span + SIM_PAGE;
        state.live.insert(addr, (pool, size));

        log::trace!("sim: reserve {} bytes from {:?} at {}", size, pool, addr);
        Ok(addr)
    }

    fn free(&self, addr: MemAddr) -> Result<()> {
        let mut state = self.state.lock();
        state.frees.push(addr);
        match state.live.remove(&addr) {
            Some(_) => Ok(()),
            None => Err(Error::new(Cause::DriverRejected)),
        }
    }

    fn allow_access(
        &self,
        agents: &[AgentHandle],
        pool: Option<PoolHandle>,
        addr: MemAddr,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if state.faults.allow_access || !state.live.contains_key(&addr) {
            return Err(Error::new(Cause::DriverRejected));
        }

        state.grants.push(Grant {
            agents: agents.to_vec(),
            pool,
            addr,
        });
        Ok(())
    }

    fn access_policy(&self, agent: AgentHandle, pool: PoolHandle) -> Result<PoolAccess> {
        let state = self.state.lock();
        if state.faults.access_policy {
            return Err(Error::new(Cause::DriverRejected));
        }

        Ok(state
            .policies
            .get(&(agent, pool))
            .copied()
            .unwrap_or(PoolAccess::DisallowedByDefault))
    }

    fn copy(&self, dst: MemAddr, src: MemAddr, _size: u64) -> Result<()> {
        let mut state = self.state.lock();
        if state.faults.copy || dst.is_null() || src.is_null() {
            return Err(Error::new(Cause::DriverRejected));
        }

        state.copies += 1;
        Ok(())
    }

    fn accelerators(&self) -> Vec<Accelerator> {
        self.accelerators.clone()
    }
}
