//! Asynchronous stop flag raised by SIGINT/SIGTERM.
//!
//! The handler only stores into an atomic; the ingest loop observes the
//! flag between datagrams and between recovery rounds. No in-flight
//! syscall is aborted — receive timeouts bound how long a quiet feed can
//! delay the observation.

use std::sync::atomic::{AtomicBool, Ordering};

static STOP: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_signum: libc::c_int) {
    STOP.store(true, Ordering::SeqCst);
}

/// Install the handlers. Call once at startup.
pub fn install() {
    let handler = on_signal as extern "C" fn(libc::c_int);
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
    }
}

pub fn stop_requested() -> bool {
    STOP.load(Ordering::SeqCst)
}
