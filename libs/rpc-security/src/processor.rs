//! Pluggable conversion of call metadata into an [`AuthContext`].
//!
//! A server registers one [`AuthMetadataProcessor`] during setup. For every
//! call the transport hands the processor its own context (the connection's
//! identity, if any), the call metadata and a [`ProcessingDone`] completion.
//! The processor resolves the completion exactly once, either before
//! `process` returns or later from any thread; the transport awaits the
//! matching [`ProcessingOutcome`].
//!
//! Exactly-once delivery is enforced by ownership: resolving consumes the
//! completion, and a completion dropped unresolved reports
//! [`ProcessingError::Abandoned`].
//!
//! No deadline is applied here. Callers that need bounded latency wrap the
//! outcome in their own timeout; processors that observe cancellation should
//! still resolve with a failure.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, LazyLock};
use std::task::{Context, Poll};

use arc_swap::ArcSwapOption;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::auth_context::AuthContext;
use crate::error::ProcessingError;
use crate::metadata::Metadata;

type ProcessingResult = Result<AuthContext, ProcessingError>;

/// Converts transport metadata into the call's authenticated context.
pub trait AuthMetadataProcessor: Send + Sync {
    /// Process the metadata of one call.
    ///
    /// `transport_ctx` is borrowed for the duration of this call only:
    /// acquire a handle (`clone`) to keep it, e.g. to chain onto it from
    /// another task.
    ///
    /// On success `done` receives the call's context: `transport_ctx`
    /// itself, a fresh context, or one chained onto `transport_ctx`.
    fn process(
        &self,
        transport_ctx: Option<&AuthContext>,
        metadata: &Metadata,
        done: ProcessingDone,
    );
}

/// One-shot completion handed to a processor.
#[must_use = "dropping an unresolved completion fails the call"]
pub struct ProcessingDone {
    tx: Option<oneshot::Sender<ProcessingResult>>,
}

impl ProcessingDone {
    /// Resolve successfully with the call's authenticated context.
    pub fn succeed(mut self, ctx: AuthContext) {
        self.complete(Ok(ctx));
    }

    /// Resolve with a failure. The call will be rejected.
    pub fn fail(mut self, reason: impl Into<String>) {
        self.complete(Err(ProcessingError::Rejected(reason.into())));
    }

    fn complete(&mut self, result: ProcessingResult) {
        if let Some(tx) = self.tx.take()
            && tx.send(result).is_err()
        {
            // The caller stopped waiting (deadline, cancelled call); the
            // returned result is dropped here, releasing its context.
            debug!("metadata processing outcome no longer awaited");
        }
    }
}

impl Drop for ProcessingDone {
    fn drop(&mut self) {
        if self.tx.is_some() {
            warn!("auth metadata processor dropped its completion without resolving it");
            self.complete(Err(ProcessingError::Abandoned));
        }
    }
}

impl fmt::Debug for ProcessingDone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingDone")
            .field("resolved", &self.tx.is_none())
            .finish()
    }
}

/// Future resolving to the processor's result.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct ProcessingOutcome {
    rx: oneshot::Receiver<ProcessingResult>,
}

impl Future for ProcessingOutcome {
    type Output = ProcessingResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(ProcessingError::Abandoned)))
    }
}

/// Create a linked completion and outcome.
#[must_use]
pub fn completion() -> (ProcessingDone, ProcessingOutcome) {
    let (tx, rx) = oneshot::channel();
    (ProcessingDone { tx: Some(tx) }, ProcessingOutcome { rx })
}

/// Adapter registering a plain function or closure as a processor.
struct FnProcessor<F>(F);

impl<F> AuthMetadataProcessor for FnProcessor<F>
where
    F: Fn(Option<&AuthContext>, &Metadata, ProcessingDone) + Send + Sync,
{
    fn process(
        &self,
        transport_ctx: Option<&AuthContext>,
        metadata: &Metadata,
        done: ProcessingDone,
    ) {
        (self.0)(transport_ctx, metadata, done);
    }
}

// `ArcSwapOption` needs a sized payload.
struct Registered {
    processor: Arc<dyn AuthMetadataProcessor>,
}

/// Slot holding at most one metadata processor.
///
/// Written during server setup, read for every call. Reads are lock-free;
/// registering again replaces the previous processor for calls that start
/// afterwards.
pub struct MetadataProcessorRegistry {
    slot: ArcSwapOption<Registered>,
}

impl Default for MetadataProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MetadataProcessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataProcessorRegistry")
            .field("registered", &self.is_registered())
            .finish()
    }
}

impl MetadataProcessorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: ArcSwapOption::from(None),
        }
    }

    /// Register `processor`, replacing any previous one.
    pub fn register(&self, processor: Arc<dyn AuthMetadataProcessor>) {
        let previous = self.slot.swap(Some(Arc::new(Registered { processor })));
        if previous.is_some() {
            warn!("replaced previously registered auth metadata processor");
        } else {
            info!("registered auth metadata processor");
        }
    }

    /// Register a function as the processor.
    pub fn register_fn<F>(&self, func: F)
    where
        F: Fn(Option<&AuthContext>, &Metadata, ProcessingDone) + Send + Sync + 'static,
    {
        self.register(Arc::new(FnProcessor(func)));
    }

    /// Remove the registered processor. Returns whether one was registered.
    pub fn clear(&self) -> bool {
        self.slot.swap(None).is_some()
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.slot.load().is_some()
    }

    /// The registered processor, if any.
    #[must_use]
    pub fn current(&self) -> Option<Arc<dyn AuthMetadataProcessor>> {
        self.slot
            .load()
            .as_ref()
            .map(|registered| Arc::clone(&registered.processor))
    }

    /// Start processing the metadata of one call.
    ///
    /// Returns `None` when no processor is registered.
    #[must_use]
    pub fn process(
        &self,
        transport_ctx: Option<&AuthContext>,
        metadata: &Metadata,
    ) -> Option<ProcessingOutcome> {
        let processor = self.current()?;
        let (done, outcome) = completion();
        processor.process(transport_ctx, metadata, done);
        Some(outcome)
    }

    /// Authenticate one call and wait for the processor's decision.
    ///
    /// With no processor registered the transport context is passed
    /// through unchanged.
    ///
    /// # Errors
    ///
    /// - `Rejected` if the processor failed the call
    /// - `Abandoned` if the processor dropped its completion
    pub async fn authenticate(
        &self,
        transport_ctx: Option<&AuthContext>,
        metadata: &Metadata,
    ) -> Result<Option<AuthContext>, ProcessingError> {
        match self.process(transport_ctx, metadata) {
            Some(outcome) => outcome.await.map(Some),
            None => Ok(transport_ctx.cloned()),
        }
    }
}

static GLOBAL_REGISTRY: LazyLock<MetadataProcessorRegistry> =
    LazyLock::new(MetadataProcessorRegistry::new);

/// The process-wide registry consulted by server transports.
#[must_use]
pub fn global_registry() -> &'static MetadataProcessorRegistry {
    &GLOBAL_REGISTRY
}

/// Register the process-wide auth metadata processor.
///
/// Call during server setup, before the server starts accepting calls.
/// A later registration replaces the earlier one.
pub fn register_auth_metadata_processor(processor: Arc<dyn AuthMetadataProcessor>) {
    global_registry().register(processor);
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::FutureExt;
    use tracing_test::traced_test;

    use super::*;

    fn transport() -> AuthContext {
        AuthContext::builder()
            .string_property("transport_security_type", "tls")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn no_processor_passes_transport_through() {
        let registry = MetadataProcessorRegistry::new();
        let t = transport();

        let result = registry.authenticate(Some(&t), &Metadata::new()).await;
        assert!(result.unwrap().unwrap().ptr_eq(&t));

        let result = registry.authenticate(None, &Metadata::new()).await;
        assert!(result.unwrap().is_none());
        assert!(registry.process(None, &Metadata::new()).is_none());
    }

    #[tokio::test]
    async fn synchronous_success() {
        let registry = MetadataProcessorRegistry::new();
        registry.register_fn(|t, _md, done| {
            done.succeed(t.expect("transport context").clone());
        });

        let t = transport();
        let ctx = registry
            .authenticate(Some(&t), &Metadata::new())
            .await
            .unwrap()
            .unwrap();
        assert!(ctx.ptr_eq(&t));
    }

    #[tokio::test]
    async fn failure_carries_reason_only() {
        let registry = MetadataProcessorRegistry::new();
        registry.register_fn(|_t, _md, done| done.fail("bad token"));

        let err = registry
            .authenticate(None, &Metadata::new())
            .await
            .unwrap_err();
        assert_eq!(err, ProcessingError::Rejected("bad token".to_owned()));
    }

    #[tokio::test]
    #[traced_test]
    async fn dropped_completion_is_abandoned() {
        let registry = MetadataProcessorRegistry::new();
        registry.register_fn(|_t, _md, done| drop(done));

        let err = registry
            .authenticate(None, &Metadata::new())
            .await
            .unwrap_err();
        assert_eq!(err, ProcessingError::Abandoned);
        assert!(logs_contain("without resolving"));
    }

    #[tokio::test]
    async fn completion_from_another_thread_after_return() {
        let registry = MetadataProcessorRegistry::new();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let release_rx = std::sync::Mutex::new(Some(release_rx));

        registry.register_fn(move |t, _md, done| {
            let parent = t.cloned();
            let gate = release_rx.lock().unwrap().take().unwrap();
            std::thread::spawn(move || {
                gate.recv().unwrap();
                let builder = parent
                    .as_ref()
                    .map_or_else(AuthContext::builder, AuthContext::chained_to);
                done.succeed(builder.string_property("user", "alice").build().unwrap());
            });
        });

        let t = transport();
        let mut outcome = registry.process(Some(&t), &Metadata::new()).unwrap();

        // `process` has returned; the processor has not completed yet.
        assert!((&mut outcome).now_or_never().is_none());

        release_tx.send(()).unwrap();
        let ctx = tokio::time::timeout(Duration::from_secs(5), outcome)
            .await
            .unwrap()
            .unwrap();
        assert!(ctx.parent().unwrap().ptr_eq(&t));
        assert_eq!(ctx.property_iter().count(), 2);
    }

    #[tokio::test]
    async fn completion_from_spawned_task() {
        let registry = MetadataProcessorRegistry::new();
        registry.register_fn(|t, _md, done| {
            let t = t.cloned();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                match t {
                    Some(t) => done.succeed(t),
                    None => done.fail("no transport identity"),
                }
            });
        });

        let t = transport();
        let ctx = registry
            .authenticate(Some(&t), &Metadata::new())
            .await
            .unwrap();
        assert!(ctx.unwrap().ptr_eq(&t));

        let err = registry.authenticate(None, &Metadata::new()).await;
        assert!(matches!(err, Err(ProcessingError::Rejected(_))));
    }

    #[test]
    fn late_completion_after_caller_gave_up_releases_context() {
        let (done, outcome) = completion();
        drop(outcome);

        let ctx = transport();
        let handle = ctx.acquire();
        done.succeed(handle);
        assert_eq!(ctx.ref_count(), 1);
    }

    #[test]
    fn register_replaces_previous() {
        let registry = MetadataProcessorRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        registry.register_fn(move |_t, _md, done| {
            counter.fetch_add(1, Ordering::SeqCst);
            done.fail("first");
        });
        let counter = second.clone();
        registry.register_fn(move |_t, _md, done| {
            counter.fetch_add(1, Ordering::SeqCst);
            done.fail("second");
        });

        let outcome = registry.process(None, &Metadata::new()).unwrap();
        let result = outcome.now_or_never().unwrap();
        assert_eq!(result.unwrap_err(), ProcessingError::Rejected("second".to_owned()));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        assert!(registry.clear());
        assert!(!registry.is_registered());
        assert!(!registry.clear());
    }
}
