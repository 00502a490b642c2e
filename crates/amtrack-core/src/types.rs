//! # AMTRACK Core Types
//!
//! Fundamental type definitions used across the tracker.
//!
//! These types provide:
//! - Strong typing for tracked addresses and driver handles
//! - The accelerator value the driver hands out
//! - Allocation flags and pool access policy

use core::fmt;
use core::ops::{Add, Sub};

// =============================================================================
// MEMORY ADDRESS
// =============================================================================

/// Address of a tracked region
///
/// The same type covers host and accelerator addresses; which one it is
/// depends on the residency recorded alongside it. It is never
/// dereferenced by the tracker.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct MemAddr(u64);

impl MemAddr {
    /// Create a new address
    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Create a null address
    #[inline]
    pub const fn null() -> Self {
        Self(0)
    }

    /// Get the raw u64 value
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Check if null
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Offset by bytes
    #[inline]
    pub const fn offset(self, bytes: u64) -> Self {
        Self(self.0.wrapping_add(bytes))
    }

    /// Create from a raw pointer
    #[inline]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize as u64)
    }
}

impl Add<u64> for MemAddr {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0.wrapping_add(rhs))
    }
}

impl Sub<MemAddr> for MemAddr {
    type Output = u64;

    fn sub(self, rhs: MemAddr) -> Self::Output {
        self.0.wrapping_sub(rhs.0)
    }
}

impl fmt::Debug for MemAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemAddr(0x{:016x})", self.0)
    }
}

impl fmt::Display for MemAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

// =============================================================================
// DRIVER HANDLES
// =============================================================================

/// Identifier of an accelerator (device context)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct AcceleratorId(pub u32);

/// Driver handle of an execution/memory-access agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct AgentHandle(pub u64);

/// Driver handle of a memory pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PoolHandle(pub u64);

// =============================================================================
// ACCELERATOR
// =============================================================================

/// An accelerator as enumerated by the driver
///
/// Equality compares the id only; the handles are properties of the
/// accelerator, not part of its identity.
#[derive(Debug, Clone, Copy)]
pub struct Accelerator {
    id: AcceleratorId,
    agent: AgentHandle,
    device_pool: Option<PoolHandle>,
    system_pool: Option<PoolHandle>,
}

impl Accelerator {
    /// Create a new accelerator description
    pub const fn new(
        id: AcceleratorId,
        agent: AgentHandle,
        device_pool: Option<PoolHandle>,
        system_pool: Option<PoolHandle>,
    ) -> Self {
        Self {
            id,
            agent,
            device_pool,
            system_pool,
        }
    }

    /// Get the accelerator id
    #[inline]
    pub const fn id(&self) -> AcceleratorId {
        self.id
    }

    /// Default execution agent
    #[inline]
    pub const fn default_agent(&self) -> AgentHandle {
        self.agent
    }

    /// Device-local memory pool, if the accelerator has one
    #[inline]
    pub const fn device_pool(&self) -> Option<PoolHandle> {
        self.device_pool
    }

    /// Host-pinned ("system") memory pool, if reachable from this accelerator
    #[inline]
    pub const fn system_pool(&self) -> Option<PoolHandle> {
        self.system_pool
    }

    /// Pool serving an allocation with the given flags
    pub fn pool_for(&self, flags: AllocFlags) -> Option<PoolHandle> {
        if flags.contains(AllocFlags::HOST_PINNED) {
            self.system_pool
        } else {
            self.device_pool
        }
    }
}

impl PartialEq for Accelerator {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Accelerator {}

impl fmt::Display for Accelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acc{}", self.id.0)
    }
}

// =============================================================================
// ALLOCATION FLAGS
// =============================================================================

bitflags::bitflags! {
    /// Flags accepted by the allocation service
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AllocFlags: u32 {
        /// Allocate from the system pool and grant the requesting agent access
        const HOST_PINNED = 1 << 0;
    }
}

// =============================================================================
// POOL ACCESS POLICY
// =============================================================================

/// Access policy of an agent towards a memory pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolAccess {
    /// The agent can never access the pool
    NeverAllowed,
    /// Access is granted without an explicit request
    AllowedByDefault,
    /// Access requires an explicit grant
    DisallowedByDefault,
}

impl PoolAccess {
    /// Check whether a grant can ever succeed
    #[inline]
    pub const fn is_grantable(self) -> bool {
        !matches!(self, Self::NeverAllowed)
    }
}

// =============================================================================
// STATIC ASSERTIONS
// =============================================================================

static_assertions::assert_impl_all!(MemAddr: Send, Sync, Copy);
static_assertions::assert_impl_all!(Accelerator: Send, Sync, Copy);
static_assertions::assert_impl_all!(AgentHandle: Send, Sync, Copy);
static_assertions::assert_impl_all!(PoolHandle: Send, Sync, Copy);
