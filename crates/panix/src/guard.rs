//! Capture entry points.
//!
//! Two flavours wrap a unit of work and absorb any panic it raises:
//!
//! - *deployment* guards are meant for a process's top-level routine. The
//!   report is delivered before the guard returns.
//! - *operation* guards are meant for one request or job. The report is
//!   delivered on a detached task and the guard returns immediately.
//!
//! Neither flavour re-raises the panic. A guarded call that panicked returns
//! `None`, whether or not a report was sent.

use std::{
    any::Any,
    future::Future,
    panic::{self, AssertUnwindSafe},
    thread::{self, JoinHandle},
};

use futures::FutureExt;
use tokio::runtime::{Builder, Handle};
use tracing::{debug, error};

use crate::capture::Capture;
use crate::hook;
use crate::notifier::{ContextMap, SlackNotifier};
use crate::reporter::Reporter;

impl Reporter {
    /// Runs `f`, reporting a panic synchronously.
    ///
    /// The report goes out on a dedicated thread with its own runtime, so
    /// this is safe to call from inside or outside an async context. The
    /// calling thread is blocked until the delivery attempt finishes.
    pub fn guard_deployment<F, T>(&self, f: F) -> Option<T>
    where
        F: FnOnce() -> T,
    {
        hook::clear_last_panic();
        let payload = match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => return Some(value),
            Err(payload) => payload,
        };

        if let Some((notifier, capture)) = self.recover(payload) {
            let title = self.title(None);
            let delivery = thread::Builder::new()
                .name("panix-deployment".to_string())
                .spawn(move || {
                    run_detached_report(notifier, title, capture, ContextMap::new());
                });

            match delivery {
                Ok(handle) => wait_for_delivery(handle),
                Err(e) => error!(error = %e, "Failed to spawn panic report thread"),
            }
        }
        None
    }

    /// Async form of [`Reporter::guard_deployment`]: awaits `fut` and, on
    /// panic, awaits the delivery attempt before returning.
    pub async fn guard_deployment_async<Fut, T>(&self, fut: Fut) -> Option<T>
    where
        Fut: Future<Output = T>,
    {
        hook::clear_last_panic();
        let payload = match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(value) => return Some(value),
            Err(payload) => payload,
        };

        if let Some((notifier, capture)) = self.recover(payload) {
            notifier
                .report(&self.title(None), &capture, &ContextMap::new())
                .await;
        }
        None
    }

    /// Awaits `fut`, reporting a panic in the background.
    ///
    /// `title` and `context` are usually produced by
    /// [`Reporter::extract_title_and_context`]. The report is fire-and-forget:
    /// it is lost if the process exits before delivery completes.
    pub async fn guard_operation<Fut, T>(
        &self,
        title: impl Into<String>,
        context: ContextMap,
        fut: Fut,
    ) -> Option<T>
    where
        Fut: Future<Output = T>,
    {
        hook::clear_last_panic();
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(value) => Some(value),
            Err(payload) => {
                self.spawn_report(title.into(), context, payload);
                None
            }
        }
    }

    /// Runs `f`, reporting a panic in the background.
    pub fn guard_operation_sync<F, T>(
        &self,
        title: impl Into<String>,
        context: ContextMap,
        f: F,
    ) -> Option<T>
    where
        F: FnOnce() -> T,
    {
        hook::clear_last_panic();
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => Some(value),
            Err(payload) => {
                self.spawn_report(title.into(), context, payload);
                None
            }
        }
    }

    /// Turns a payload into a capture and decides whether it is reported.
    fn recover(&self, payload: Box<dyn Any + Send>) -> Option<(SlackNotifier, Capture)> {
        let capture = Capture::from_payload(payload);

        match self.active_notifier() {
            Some(notifier) => Some((notifier.clone(), capture)),
            None => {
                debug!(
                    environment = %self.environment(),
                    cause = %capture.cause,
                    "Recovered panic, reporting disabled"
                );
                None
            }
        }
    }

    fn spawn_report(&self, title: String, context: ContextMap, payload: Box<dyn Any + Send>) {
        let Some((notifier, capture)) = self.recover(payload) else {
            return;
        };

        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    notifier.report(&title, &capture, &context).await;
                });
            }
            Err(_) => {
                let spawned = thread::Builder::new()
                    .name("panix-operation".to_string())
                    .spawn(move || run_detached_report(notifier, title, capture, context));
                if let Err(e) = spawned {
                    error!(error = %e, "Failed to spawn panic report thread");
                }
            }
        }
    }
}

fn wait_for_delivery(handle: JoinHandle<()>) {
    if let Err(payload) = handle.join() {
        error!(
            cause = %Capture::from_payload(payload).cause,
            "Panic report thread panicked"
        );
    }
}

/// Delivers one report on a fresh current-thread runtime.
fn run_detached_report(
    notifier: SlackNotifier,
    title: String,
    capture: Capture,
    context: ContextMap,
) {
    match Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime.block_on(notifier.report(&title, &capture, &context)),
        Err(e) => error!(
            error = %e,
            title = %title,
            cause = %capture.cause,
            stack_trace = %capture.stack_trace,
            "Failed to build runtime for panic report"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SlackConfig;
    use crate::identity::HostIdentity;
    use chrono::Utc;
    use std::net::{IpAddr, Ipv4Addr};

    fn disabled_reporter() -> Reporter {
        let identity =
            HostIdentity::new("api-1", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)), Utc::now());
        Reporter::with_identity("qa", Some(SlackConfig::default()), identity)
    }

    fn boom() -> u8 {
        panic!("boom")
    }

    async fn boom_async() -> u8 {
        panic!("boom")
    }

    #[test]
    fn test_deployment_guard_passes_value_through() {
        assert_eq!(disabled_reporter().guard_deployment(|| 42), Some(42));
    }

    #[test]
    fn test_deployment_guard_absorbs_panic() {
        assert_eq!(disabled_reporter().guard_deployment(boom), None);
    }

    #[test]
    fn test_operation_sync_guard_absorbs_panic() {
        let reporter = disabled_reporter();
        assert_eq!(
            reporter.guard_operation_sync("title", ContextMap::new(), boom),
            None
        );
        assert_eq!(
            reporter.guard_operation_sync("title", ContextMap::new(), || 7),
            Some(7)
        );
    }

    #[tokio::test]
    async fn test_async_guards_absorb_panic() {
        let reporter = disabled_reporter();

        assert_eq!(reporter.guard_deployment_async(boom_async()).await, None);
        assert_eq!(
            reporter
                .guard_operation("title", ContextMap::new(), boom_async())
                .await,
            None
        );

        let ok = reporter
            .guard_operation("title", ContextMap::new(), async { "done" })
            .await;
        assert_eq!(ok, Some("done"));
    }

    #[test]
    fn test_guard_drops_stale_panic_record() {
        hook::install();
        let _ = panic::catch_unwind(|| -> u8 { panic!("stale") });

        assert_eq!(disabled_reporter().guard_deployment(|| 1), Some(1));
        assert!(hook::take_last_panic().is_none());
    }

    #[test]
    fn test_panicking_delivery_thread_is_absorbed() {
        let handle: JoinHandle<()> = thread::spawn(|| panic!("delivery blew up"));
        wait_for_delivery(handle);
    }
}
