//! Error types for asset materialization
//!
//! Only one kind of failure is recoverable in this crate: the allocator
//! refusing to hand out storage while an asset is being materialized. It is
//! reported as an [`AllocError`] by the allocator and wrapped into an
//! [`AcquireError`] by the controller that tried to materialize the asset.
//!
//! Misuse of the reference-counting protocol (releasing a count that is
//! already zero, touching a forgotten controller, dropping a manager that
//! still owns referenced controllers) is not an error value. Those are
//! contract violations and panic.
//!
//! # Examples
//!
//! ```
//! use lazy_assets::{AcquireError, AllocError, AllocErrorKind};
//!
//! let err = AcquireError::new::<u64>(AllocError::new::<u64>(AllocErrorKind::Refused, 1));
//!
//! assert_eq!(err.asset(), "u64");
//! assert_eq!(err.alloc_error().kind(), AllocErrorKind::Refused);
//! assert_eq!(err.alloc_error().count(), 1);
//! ```

use std::error::Error as StdError;
use std::fmt;

/// Why an allocator could not provide storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocErrorKind {
    /// The requested count overflows the address space for the element type.
    LayoutOverflow,
    /// The underlying memory source returned no storage.
    OutOfMemory,
    /// The allocator declined the request by its own policy.
    Refused,
}

impl fmt::Display for AllocErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocErrorKind::LayoutOverflow => write!(f, "layout overflow"),
            AllocErrorKind::OutOfMemory => write!(f, "out of memory"),
            AllocErrorKind::Refused => write!(f, "request refused"),
        }
    }
}

/// Error returned by an [`AssetAllocator`](crate::AssetAllocator) that could
/// not provide storage.
///
/// # Examples
///
/// ```
/// use lazy_assets::{AllocError, AllocErrorKind};
///
/// let err = AllocError::new::<String>(AllocErrorKind::OutOfMemory, 4);
/// assert_eq!(
///     err.to_string(),
///     "failed to allocate 4 x alloc::string::String: out of memory"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocError {
    type_name: &'static str,
    count: usize,
    kind: AllocErrorKind,
}

impl AllocError {
    /// Create an error for a failed request of `count` values of `T`.
    pub fn new<T>(kind: AllocErrorKind, count: usize) -> Self {
        AllocError {
            type_name: std::any::type_name::<T>(),
            count,
            kind,
        }
    }

    /// Why the request failed.
    pub fn kind(&self) -> AllocErrorKind {
        self.kind
    }

    /// Number of values that were requested.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Name of the element type that was requested.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to allocate {} x {}: {}",
            self.count, self.type_name, self.kind
        )
    }
}

impl StdError for AllocError {}

/// Error returned when acquiring a strong reference could not materialize
/// the asset.
///
/// The controller that produced this error is left exactly as it was before
/// the call: no strong references, no storage. Acquiring again is allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireError {
    asset: &'static str,
    source: AllocError,
}

impl AcquireError {
    /// Wrap an allocation failure that happened while materializing an `A`.
    pub fn new<A>(source: AllocError) -> Self {
        AcquireError {
            asset: std::any::type_name::<A>(),
            source,
        }
    }

    /// Name of the asset type that failed to materialize.
    pub fn asset(&self) -> &'static str {
        self.asset
    }

    /// The allocator failure behind this error.
    pub fn alloc_error(&self) -> &AllocError {
        &self.source
    }

    /// Consume and return the allocator failure.
    pub fn into_alloc_error(self) -> AllocError {
        self.source
    }
}

impl fmt::Display for AcquireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to materialize {}", self.asset)?;
        write!(f, "\n  -> {}", self.source)
    }
}

impl StdError for AcquireError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}
