use crate::decomp_error::DecompError;

/// Consistency checks that structures can run on themselves.
///
/// Implementors audit their own representation: span tables, partition
/// breakpoints, overlap box lists. Checks run automatically in debug builds
/// and under the `check-invariants`/`strict-invariants` features, and cost
/// nothing in release builds without them.
pub trait DebugInvariants {
    /// Panic on a broken invariant when invariant checking is enabled.
    fn debug_assert_invariants(&self);
    /// Run the checks unconditionally, returning the first failure.
    fn validate_invariants(&self) -> Result<(), DecompError>;
}

/// Run a fallible check and panic on error when invariant checking is
/// enabled; expands to nothing otherwise.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[decomp invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
