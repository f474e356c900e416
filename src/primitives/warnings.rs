//! One-time warning emission.
//!
//! ## Purpose
//!
//! Recoverable numerical degeneracies and resource-pressure conditions
//! are reported through the `log` facade, but repeating the same message
//! every iteration (or every voxel) would drown the log. `warn_once!`
//! emits a given call site's warning at most once per process.
//!
//! ## Design notes
//!
//! * **Per call site**: Each macro expansion owns its own flag.
//! * **Lock-free**: A relaxed atomic swap; duplicate emission under a
//!   race is harmless.

/// Emit a `log::warn!` at most once per process for this call site.
///
/// ```
/// use svb_rs::warn_once;
///
/// warn_once!("large problem: {} locations", 10_000);
/// warn_once!("large problem: {} locations", 20_000); // suppressed
/// ```
#[macro_export]
macro_rules! warn_once {
    ($($arg:tt)*) => {{
        static ISSUED: ::core::sync::atomic::AtomicBool =
            ::core::sync::atomic::AtomicBool::new(false);
        if !ISSUED.swap(true, ::core::sync::atomic::Ordering::Relaxed) {
            ::log::warn!($($arg)*);
        }
    }};
}
