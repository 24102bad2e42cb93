use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

type CleanupFn = Box<dyn FnOnce() + Send>;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);
static CLEANUPS: Mutex<Vec<(u64, CleanupFn)>> = Mutex::new(Vec::new());

/// Register work that must happen even if the process is interrupted,
/// e.g. restoring a stashed working tree. Returns a handle for
/// [`unregister`] once the normal code path has done the work itself.
pub(crate) fn register(f: impl FnOnce() + Send + 'static) -> u64 {
    let id = NEXT_ID.fetch_add(1, Ordering::SeqCst);
    CLEANUPS.lock().unwrap().push((id, Box::new(f)));
    id
}

pub(crate) fn unregister(id: u64) {
    CLEANUPS.lock().unwrap().retain(|(entry, _)| *entry != id);
}

/// Run all registered cleanups. Called from the Ctrl-C handler.
pub(crate) fn cleanup() {
    let cleanups = std::mem::take(&mut *CLEANUPS.lock().unwrap());
    for (_, f) in cleanups {
        f();
    }
}
