//! # Accelerator Driver Interface
//!
//! The tracker never reserves, frees, copies or maps memory itself. Every
//! such request goes through a [`MemoryDriver`] supplied by the
//! surrounding accelerator runtime.
//!
//! ```text
//! AllocationService ──► MemoryDriver ──► accelerator runtime
//!        │                                 (pools, agents, DMA)
//!        └──► AddressRangeRegistry
//! ```

use alloc::vec::Vec;

use crate::error::Result;
use crate::types::*;

// =============================================================================
// MEMORY DRIVER TRAIT
// =============================================================================

/// Driver collaborator of the tracker
///
/// Implementations report failure as an [`Error`](crate::Error) with
/// [`Cause::DriverRejected`](crate::Cause::DriverRejected) or a more
/// specific cause. The tracker never retries.
pub trait MemoryDriver: Send + Sync {
    /// Reserve `size` bytes from `pool`
    fn reserve(&self, pool: PoolHandle, size: u64) -> Result<MemAddr>;

    /// Release a reservation made by [`reserve`](Self::reserve)
    fn free(&self, addr: MemAddr) -> Result<()>;

    /// Grant `agents` access to the allocation starting at `addr`
    ///
    /// `pool` is `None` when the caller does not know (or care) which pool
    /// the allocation came from.
    fn allow_access(
        &self,
        agents: &[AgentHandle],
        pool: Option<PoolHandle>,
        addr: MemAddr,
    ) -> Result<()>;

    /// Query the access policy of `agent` towards `pool`
    fn access_policy(&self, agent: AgentHandle, pool: PoolHandle) -> Result<PoolAccess>;

    /// Synchronous copy of `size` bytes
    fn copy(&self, dst: MemAddr, src: MemAddr, size: u64) -> Result<()>;

    /// Every accelerator known to the runtime
    fn accelerators(&self) -> Vec<Accelerator>;
}

impl<D: MemoryDriver + ?Sized> MemoryDriver for &D {
    fn reserve(&self, pool: PoolHandle, size: u64) -> Result<MemAddr> {
        (**self).reserve(pool, size)
    }

    fn free(&self, addr: MemAddr) -> Result<()> {
        (**self).free(addr)
    }

    fn allow_access(
        &self,
        agents: &[AgentHandle],
        pool: Option<PoolHandle>,
        addr: MemAddr,
    ) -> Result<()> {
        (**self).allow_access(agents, pool, addr)
    }

    fn access_policy(&self, agent: AgentHandle, pool: PoolHandle) -> Result<PoolAccess> {
        (**self).access_policy(agent, pool)
    }

    fn copy(&self, dst: MemAddr, src: MemAddr, size: u64) -> Result<()> {
        (**self).copy(dst, src, size)
    }

    fn accelerators(&self) -> Vec<Accelerator> {
        (**self).accelerators()
    }
}
