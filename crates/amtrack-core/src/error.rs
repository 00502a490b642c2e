//! # AMTRACK Error Handling
//!
//! The tracker reports exactly two outcomes: success, or one generic
//! failure. Nothing at this layer distinguishes "not found" from "driver
//! rejected" in the contract.
//!
//! Diagnostics travel alongside as a [`Cause`], which callers may log but
//! must not branch on. Two errors compare equal regardless of cause.

use core::fmt;

// =============================================================================
// RESULT TYPE
// =============================================================================

/// AMTRACK Result type alias
pub type Result<T> = core::result::Result<T, Error>;

// =============================================================================
// CAUSE
// =============================================================================

/// Diagnostic detail attached to an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Cause {
    /// Unspecified failure
    Misc,
    /// No registry entry covers the address
    NotFound,
    /// Null pointer, empty list or similar
    InvalidArgument,
    /// The driver collaborator returned a failure status
    DriverRejected,
    /// Pool access policy forbids the requested agent
    AccessDenied,
    /// The accelerator does not expose the required memory pool
    Unsupported,
    /// The range overlaps an existing registry entry
    Overlap,
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Misc => write!(f, "unspecified failure"),
            Self::NotFound => write!(f, "address not tracked"),
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::DriverRejected => write!(f, "driver rejected request"),
            Self::AccessDenied => write!(f, "pool access denied"),
            Self::Unsupported => write!(f, "memory pool unavailable"),
            Self::Overlap => write!(f, "range overlaps tracked allocation"),
        }
    }
}

// =============================================================================
// ERROR
// =============================================================================

/// The single failure outcome of every tracker operation
#[derive(Clone, Copy)]
pub struct Error {
    cause: Cause,
}

impl Error {
    /// Generic failure without further detail
    pub const MISC: Self = Self::new(Cause::Misc);

    /// Create an error carrying a diagnostic cause
    #[inline]
    pub const fn new(cause: Cause) -> Self {
        Self { cause }
    }

    /// Diagnostic detail. Not part of the success/failure contract.
    #[inline]
    pub const fn cause(&self) -> Cause {
        self.cause
    }
}

impl PartialEq for Error {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for Error {}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error({:?})", self.cause)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation failed: {}", self.cause)
    }
}

impl From<Cause> for Error {
    fn from(cause: Cause) -> Self {
        Error::new(cause)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

// =============================================================================
// STATUS CODES
// =============================================================================

/// Raw status code for callers on a C-style boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    /// Operation completed
    Success = 0,
    /// Operation did not reliably complete
    ErrorMisc = -1,
}

impl Status {
    /// Get the raw code
    #[inline]
    pub const fn raw(self) -> i32 {
        self as i32
    }

    /// Check for success
    #[inline]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl<T> From<&Result<T>> for Status {
    fn from(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(_) => Status::ErrorMisc,
        }
    }
}

impl<T> From<Result<T>> for Status {
    fn from(result: Result<T>) -> Self {
        Status::from(&result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_compare_equal_across_causes() {
        assert_eq!(Error::new(Cause::NotFound), Error::new(Cause::DriverRejected));
        assert_eq!(Error::MISC.cause(), Cause::Misc);
    }

    #[test]
    fn test_status_mapping() {
        let ok: Result<u32> = Ok(7);
        let err: Result<u32> = Err(Cause::AccessDenied.into());

        assert_eq!(Status::from(&ok), Status::Success);
        assert_eq!(Status::from(err), Status::ErrorMisc);
        assert_eq!(Status::Success.raw(), 0);
        assert_eq!(Status::ErrorMisc.raw(), -1);
        assert!(!Status::ErrorMisc.is_success());
    }
}
