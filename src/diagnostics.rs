//! Last-error diagnostic slot.
//!
//! Every scoring call through [`Scorer`](crate::Scorer) leaves its outcome
//! here: a failure stores the error's detailed text, a success clears it.
//! The slot is thread-local, so a reader only ever sees failures triggered
//! on its own thread. Introspection calls never touch it.
//!
//! Rust callers get the same text from [`Error::details`] on the returned
//! error and rarely need this module; it exists for the C ABI, where the
//! result code and the detail text travel through separate calls.

use std::cell::RefCell;

use crate::error::Error;

thread_local! {
    static LAST_ERROR: RefCell<String> = const { RefCell::new(String::new()) };
}

/// Store the details of a failed call.
pub fn record(err: &Error) {
    record_text(err.details());
}

/// Store free-form detail text.
pub fn record_text(details: impl Into<String>) {
    let details = details.into();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = details);
}

/// Reset the slot after a successful call.
pub fn clear() {
    LAST_ERROR.with(|slot| slot.borrow_mut().clear());
}

/// Details of the most recent failure on this thread; empty if none.
#[must_use]
pub fn last_error_details() -> String {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}
