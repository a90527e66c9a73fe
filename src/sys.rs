//! Process-level helpers: fd and environment manipulation, thread joins.
//!
//! Every `unsafe` block in the crate lives here.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Run a closure with stderr temporarily redirected to `/dev/null`.
///
/// cpal prints ALSA/JACK/PipeWire probe noise on stderr while enumerating
/// backends; this keeps it off the terminal.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2.
/// Safe as long as no other thread is concurrently manipulating fd 2.
pub fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    // SAFETY: no other thread manipulates fd 2 while devices are probed.
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Set an environment variable.
///
/// # Safety
/// Caller must ensure no other threads are reading environment variables concurrently.
pub fn set_env(key: &str, value: &str) {
    // SAFETY: see above.
    unsafe {
        std::env::set_var(key, value);
    }
}

/// Remove an environment variable.
///
/// # Safety
/// Caller must ensure no other threads are reading environment variables concurrently.
pub fn remove_env(key: &str) {
    // SAFETY: see above.
    unsafe {
        std::env::remove_var(key);
    }
}

/// Quiet JACK/ALSA/PipeWire during backend probing. Call before spawning threads.
pub fn suppress_audio_warnings() {
    set_env("JACK_NO_START_SERVER", "1");
    set_env("JACK_NO_AUDIO_RESERVATION", "1");
    set_env("PIPEWIRE_DEBUG", "0");
    set_env("ALSA_DEBUG", "0");
    set_env("PW_LOG", "0");
}

/// Join `handle`, waiting at most `timeout`.
///
/// Returns false if the thread was still running at the deadline; it is
/// then left detached. A panicked thread is logged and counts as joined.
pub fn join_with_deadline(handle: JoinHandle<()>, timeout: Duration, name: &str) -> bool {
    let deadline = Instant::now() + timeout;
    let poll_interval = Duration::from_millis(10);

    while !handle.is_finished() {
        if Instant::now() >= deadline {
            tracing::warn!(thread = name, "thread did not exit in time, detaching");
            return false;
        }
        std::thread::sleep(poll_interval);
    }

    if let Err(panic_info) = handle.join() {
        tracing::error!(thread = name, "thread panicked: {}", panic_message(&*panic_info));
    }
    true
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(|s| s.as_str()))
        .unwrap_or("unknown panic")
}
