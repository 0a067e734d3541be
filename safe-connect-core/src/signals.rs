//! Fatal fault diagnostics and signal naming.
//!
//! `install_fault_handlers` hooks SIGSEGV, SIGFPE and SIGILL for the life of
//! the process. The handler prints a labelled backtrace to stderr and then
//! lets the default disposition terminate the process. It never attempts
//! recovery.
//!
//! Child termination is not handled here: each child is reaped by the
//! `Supervisor` that owns it.

#![allow(unsafe_code)]

use crate::error::{Result, SafeConnectError};
use nix::libc::c_int;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, raise, sigaction};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

/// Signals that get a backtrace before the process dies.
pub const FAULT_SIGNALS: [Signal; 3] = [Signal::SIGSEGV, Signal::SIGFPE, Signal::SIGILL];

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Human-readable label for a hardware/arithmetic fault signal.
///
/// Returns `None` for signals that are not faults.
pub fn fault_label(signal: c_int) -> Option<&'static str> {
    match Signal::try_from(signal).ok()? {
        Signal::SIGSEGV => Some("Segmentation fault"),
        Signal::SIGFPE => Some("Floating point error"),
        Signal::SIGILL => Some("Illegal instruction"),
        _ => None,
    }
}

/// Symbolic name of a signal number (`SIGSEGV`), or `UNKNOWN`.
pub fn signal_name(signal: c_int) -> &'static str {
    Signal::try_from(signal).map_or("UNKNOWN", Signal::as_str)
}

extern "C" fn report_fault(signo: c_int) {
    // Best effort: allocation and stderr locking are not async-signal-safe,
    // but the process is about to die either way.
    let label = fault_label(signo).unwrap_or("Fatal signal");
    let backtrace = std::backtrace::Backtrace::force_capture();
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{}:\n{}", label, backtrace);
    let _ = stderr.flush();
    drop(stderr);

    // SA_RESETHAND restored the default disposition on entry; the re-raised
    // signal stays pending until this handler returns, then terminates.
    if let Ok(signal) = Signal::try_from(signo) {
        let _ = raise(signal);
    }
}

/// Installs the fault handlers once for the whole process.
///
/// Subsequent calls are no-ops.
///
/// # Errors
/// Returns a configuration error if the kernel rejects a handler
pub fn install_fault_handlers() -> Result<()> {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let action = SigAction::new(
        SigHandler::Handler(report_fault),
        SaFlags::SA_RESETHAND,
        SigSet::empty(),
    );

    for signal in FAULT_SIGNALS {
        // SAFETY: `report_fault` only touches process-global state that is
        // valid at any point (stderr, backtrace capture) and is installed for
        // signals that terminate the process afterwards.
        unsafe { sigaction(signal, &action) }.map_err(|e| {
            INSTALLED.store(false, Ordering::SeqCst);
            SafeConnectError::configuration(format!(
                "could not set up {} handler: {}",
                signal.as_str(),
                e
            ))
        })?;
    }

    tracing::debug!("Fault handlers installed for SIGSEGV, SIGFPE, SIGILL");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_labels() {
        assert_eq!(fault_label(nix::libc::SIGSEGV), Some("Segmentation fault"));
        assert_eq!(fault_label(nix::libc::SIGFPE), Some("Floating point error"));
        assert_eq!(fault_label(nix::libc::SIGILL), Some("Illegal instruction"));
        assert_eq!(fault_label(nix::libc::SIGTERM), None);
        assert_eq!(fault_label(-1), None);
    }

    #[test]
    fn test_signal_names() {
        assert_eq!(signal_name(nix::libc::SIGSEGV), "SIGSEGV");
        assert_eq!(signal_name(nix::libc::SIGKILL), "SIGKILL");
        assert_eq!(signal_name(9999), "UNKNOWN");
    }

    /// Set in the re-executed test binary that actually takes the fault.
    const FAULT_CHILD_ENV: &str = "SAFE_CONNECT_FAULT_CHILD";

    #[test]
    fn test_fault_handler_reports_then_terminates() {
        use std::os::unix::process::ExitStatusExt;

        if std::env::var_os(FAULT_CHILD_ENV).is_some() {
            install_fault_handlers().unwrap();
            let _ = raise(Signal::SIGSEGV);
            std::process::exit(0);
        }

        let output = std::process::Command::new(std::env::current_exe().unwrap())
            .args([
                "--exact",
                "signals::tests::test_fault_handler_reports_then_terminates",
                "--nocapture",
                "--test-threads=1",
            ])
            .env(FAULT_CHILD_ENV, "1")
            .output()
            .unwrap();

        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(
            stderr.contains("Segmentation fault:"),
            "missing fault report: {}",
            stderr
        );
        assert_eq!(output.status.signal(), Some(nix::libc::SIGSEGV));
    }

    #[test]
    fn test_fault_handler_install_is_idempotent() {
        install_fault_handlers().unwrap();
        install_fault_handlers().unwrap();
        assert!(INSTALLED.load(Ordering::SeqCst));
    }
}
