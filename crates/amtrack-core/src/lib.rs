//! # AMTRACK Core
//!
//! Foundational types shared by the accelerator memory tracker: typed
//! addresses and driver handles, the two-valued error model, and the
//! [`MemoryDriver`] interface through which the tracker reaches the
//! accelerator runtime.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      amtrack-core                           │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │   Types     │  │   Driver    │  │     Error           │  │
//! │  │ (MemAddr,   │  │ (reserve,   │  │  (Error, Cause,     │  │
//! │  │  Accel.)    │  │  grant)     │  │   Status)           │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod driver;
pub mod error;
#[cfg(any(feature = "sim", test))]
pub mod sim;
pub mod types;

// Re-exports for convenience
pub use driver::MemoryDriver;
pub use error::{Cause, Error, Result, Status};
pub use types::*;
