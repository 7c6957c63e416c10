//! FILENAME: core/pivot-table/src/logging.rs
//! Category-tagged logging macros.
//!
//! The category becomes the `log` target, so a host application can filter
//! pivot output per subsystem ("LAYOUT", "RESPONSE", "AXIS", "TABLE", "SORT",
//! "REQUEST"). The crate never installs a logger itself.

// ============================================================================
// MACRO DEFINITIONS
// ============================================================================

macro_rules! log_debug {
    ($cat:expr, $($arg:tt)*) => {
        ::log::debug!(target: $cat, $($arg)*)
    };
}

macro_rules! log_info {
    ($cat:expr, $($arg:tt)*) => {
        ::log::info!(target: $cat, $($arg)*)
    };
}

macro_rules! log_warn {
    ($cat:expr, $($arg:tt)*) => {
        ::log::warn!(target: $cat, $($arg)*)
    };
}
