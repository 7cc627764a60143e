//! Error type for arena allocation failures.
//!
//! Exhaustion is the only failure the arena knows about. The fallible entry
//! point [`Arena::try_allocate`](crate::arena::Arena::try_allocate) hands it
//! back to the caller; every other allocation path treats it as fatal.

use std::alloc::Layout;
use std::fmt;

/// Errors that can occur while obtaining a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaAllocError {
    /// The requested size does not fit a valid allocation layout.
    CapacityOverflow {
        /// The number of bytes that was asked for.
        requested: usize,
    },

    /// The system allocator could not provide a page.
    OutOfMemory {
        /// Layout of the page that was refused.
        layout: Layout,
    },
}

impl ArenaAllocError {
    /// Size in bytes of the request that failed.
    #[must_use]
    pub const fn requested(&self) -> usize {
        match self {
            Self::CapacityOverflow { requested } => *requested,
            Self::OutOfMemory { layout } => layout.size(),
        }
    }
}

impl fmt::Display for ArenaAllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityOverflow { requested } => {
                write!(f, "arena capacity overflow: {requested} bytes requested")
            }
            Self::OutOfMemory { layout } => {
                write!(
                    f,
                    "arena out of memory: page of {} bytes could not be allocated",
                    layout.size()
                )
            }
        }
    }
}

impl std::error::Error for ArenaAllocError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ArenaAllocError::CapacityOverflow { requested: 12 };
        assert_eq!(
            err.to_string(),
            "arena capacity overflow: 12 bytes requested"
        );

        let layout = Layout::from_size_align(4096, 16).unwrap();
        let err = ArenaAllocError::OutOfMemory { layout };
        assert_eq!(
            err.to_string(),
            "arena out of memory: page of 4096 bytes could not be allocated"
        );
        assert_eq!(err.requested(), 4096);
    }
}
