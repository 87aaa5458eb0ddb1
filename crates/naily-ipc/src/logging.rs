//! Logger injection point for the host layer.
//!
//! Every connection the server handles runs inside this dispatcher, so the
//! agent and the host write to the same sink once the process logger has
//! been installed here.

use parking_lot::RwLock;
use tracing::Dispatch;

static HOST_LOGGER: RwLock<Option<Dispatch>> = parking_lot::const_rwlock(None);

/// Replace the dispatcher used for connection handling
pub fn set_logger(dispatch: Dispatch) {
    *HOST_LOGGER.write() = Some(dispatch);
}

/// The injected dispatcher, or the thread's current default if none was set
pub fn logger() -> Dispatch {
    if let Some(dispatch) = HOST_LOGGER.read().as_ref() {
        return dispatch.clone();
    }
    tracing::dispatcher::get_default(|current| current.clone())
}

/// Run `f` with the host dispatcher as the default
pub fn in_scope<T>(f: impl FnOnce() -> T) -> T {
    tracing::dispatcher::with_default(&logger(), f)
}
