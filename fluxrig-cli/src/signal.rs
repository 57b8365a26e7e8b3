//! Operator Interrupt
//!
//! SIGINT raises the abort flag of the running campaign. The handler is
//! async-signal-safe: it only stores into an atomic.

use fluxrig_core::AbortFlag;
use std::sync::OnceLock;

/// Flag raised by the SIGINT handler. Set once per process.
static INTERRUPT_FLAG: OnceLock<AbortFlag> = OnceLock::new();

/// Install a SIGINT handler that raises `flag`.
///
/// Only the first installed flag is ever raised; later calls keep the
/// existing handler.
#[cfg(unix)]
pub fn install_interrupt_handler(flag: AbortFlag) {
    if INTERRUPT_FLAG.set(flag).is_err() {
        tracing::debug!("interrupt handler already installed");
        return;
    }
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = sigint_handler as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut sa.sa_mask);
        libc::sigaction(libc::SIGINT, &sa, std::ptr::null_mut());
    }
}

#[cfg(unix)]
extern "C" fn sigint_handler(_sig: libc::c_int) {
    if let Some(flag) = INTERRUPT_FLAG.get() {
        flag.raise();
    }
}

/// No-op on non-Unix (Ctrl-C terminates the process).
#[cfg(not(unix))]
pub fn install_interrupt_handler(flag: AbortFlag) {
    let _ = INTERRUPT_FLAG.set(flag);
}
