//! Process-wide lifecycle.
//!
//! `init()` must be called once before any request is executed and
//! `cleanup()` once after the last one. The calls are not synchronized
//! beyond an atomic flag; bracket them around all use from the entry point,
//! or hold the guard returned by [`scoped`].

use std::sync::atomic::{AtomicBool, Ordering};

use crate::scope::Scoped;

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Globally initialize the transfer engine.
pub fn init() {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        log::warn!("httpchain::init called while already initialized");
    } else {
        log::debug!("Initialized transfer engine");
    }
}

/// Globally clean up the transfer engine.
pub fn cleanup() {
    if INITIALIZED.swap(false, Ordering::SeqCst) {
        log::debug!("Cleaned up transfer engine");
    } else {
        log::warn!("httpchain::cleanup called without a matching init");
    }
}

pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::SeqCst)
}

/// Initialize now and clean up when the returned guard is dropped.
///
/// ```
/// fn main() {
///     let _http = httpchain::scoped();
///     assert!(httpchain::is_initialized());
///     // requests...
/// }
/// ```
pub fn scoped() -> Scoped<'static> {
    Scoped::enter_exit(init, cleanup)
}
