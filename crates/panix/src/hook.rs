//! Process-wide panic hook.
//!
//! Guards only see a panic after it has unwound to them, which is too late
//! to capture a useful backtrace. The hook installed here runs at the panic
//! site, logs the panic via `tracing` and stashes its backtrace in a
//! thread-local slot that the guard on the same thread picks up.

use std::{
    backtrace::Backtrace,
    cell::RefCell,
    panic::{PanicHookInfo, take_hook},
    sync::OnceLock,
    thread,
};

use crate::capture::Fault;

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicRecord>> = const { RefCell::new(None) };
}

/// Where a panic happened and the stack that led there.
#[derive(Debug, Clone)]
pub(crate) struct PanicRecord {
    /// The payload rendered the way [`Fault`] renders it.
    pub(crate) cause: String,
    pub(crate) location: String,
    pub(crate) thread: String,
    pub(crate) backtrace: String,
}

impl PanicRecord {
    pub(crate) fn stack_trace(&self) -> String {
        format!(
            "thread '{}' panicked at {}\n{}",
            self.thread, self.location, self.backtrace
        )
    }
}

/// Installs the capturing hook, chained in front of the previously installed
/// one so default panic output is preserved. Subsequent calls are no-ops.
pub fn install() {
    static INSTALLED: OnceLock<()> = OnceLock::new();

    INSTALLED.get_or_init(|| {
        let previous_hook = take_hook();

        std::panic::set_hook(Box::new(move |panic_info: &PanicHookInfo<'_>| {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let record = record_panic(panic_info);

                tracing::error!(
                    target: "panix::panic",
                    thread = %record.thread,
                    location = %record.location,
                    "{}",
                    record.cause
                );

                let _ = LAST_PANIC.try_with(|slot| *slot.borrow_mut() = Some(record));
            }));

            previous_hook(panic_info);
        }));
    });
}

/// Takes the record of the most recent panic on the current thread.
pub(crate) fn take_last_panic() -> Option<PanicRecord> {
    LAST_PANIC
        .try_with(|slot| slot.borrow_mut().take())
        .ok()
        .flatten()
}

/// Takes the record of the most recent panic on the current thread, but only
/// if it was raised with `cause`.
///
/// `resume_unwind` does not run the hook, so a re-raised payload can reach a
/// guard while the slot still holds an unrelated earlier panic.
pub(crate) fn take_panic_matching(cause: &str) -> Option<PanicRecord> {
    take_last_panic().filter(|record| record.cause == cause)
}

/// Drops any record left on the current thread.
pub(crate) fn clear_last_panic() {
    let _ = take_last_panic();
}

fn record_panic(panic_info: &PanicHookInfo<'_>) -> PanicRecord {
    let location = panic_info
        .location()
        .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
        .unwrap_or_else(|| "<unknown>".to_string());

    let thread = thread::current()
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| "<unnamed>".to_string());

    PanicRecord {
        cause: Fault::describe(panic_info.payload()),
        location,
        thread,
        backtrace: Backtrace::force_capture().to_string(),
    }
}
