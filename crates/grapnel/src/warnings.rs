use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashSet;

/// Whether user-facing warnings are enabled. Off by default so that `--quiet`
/// and library-style callers stay silent.
pub(crate) static ENABLED: AtomicBool = AtomicBool::new(false);

pub(crate) fn enable() {
    ENABLED.store(true, Ordering::SeqCst);
}

pub(crate) fn disable() {
    ENABLED.store(false, Ordering::SeqCst);
}

/// Warnings that have already been emitted through `warn_user_once!`.
pub(crate) static WARNED: Mutex<Option<FxHashSet<String>>> = Mutex::new(None);

/// Emit a warning unless the exact same message was emitted before.
pub(crate) fn warn_once(message: &str) {
    let mut warned = WARNED.lock().unwrap();
    let set = warned.get_or_insert_with(FxHashSet::default);
    if set.insert(message.to_string()) {
        use owo_colors::OwoColorize;
        anstream::eprintln!("{}{} {message}", "warning".yellow().bold(), ":".bold());
    }
}

#[macro_export]
macro_rules! warn_user {
    ($($arg:tt)*) => {{
        if $crate::warnings::ENABLED.load(std::sync::atomic::Ordering::SeqCst) {
            use owo_colors::OwoColorize;
            let message = format!($($arg)*);
            anstream::eprintln!("{}{} {message}", "warning".yellow().bold(), ":".bold());
        }
    }};
}

#[macro_export]
macro_rules! warn_user_once {
    ($($arg:tt)*) => {{
        if $crate::warnings::ENABLED.load(std::sync::atomic::Ordering::SeqCst) {
            let message = format!($($arg)*);
            $crate::warnings::warn_once(&message);
        }
    }};
}
