use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Decides when an open window closes.
///
/// `defer` is awaited once per window, right after the first key of the
/// window has been registered. Every key registered before it returns is
/// dispatched in the same batch.
#[async_trait::async_trait]
pub trait Scheduler: Send + Sync + 'static {
    async fn defer(&self);
}

/// Yields once to the runtime, so that loads issued in the same turn share a
/// batch.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tick;

#[async_trait::async_trait]
impl Scheduler for Tick {
    async fn defer(&self) {
        tokio::task::yield_now().await;
    }
}

/// Waits a fixed delay, trading latency for bigger batches.
#[derive(Clone, Copy, Debug)]
pub struct Delay(pub Duration);

#[async_trait::async_trait]
impl Scheduler for Delay {
    async fn defer(&self) {
        tokio::time::sleep(self.0).await;
    }
}

/// Scheduler backed by a closure. See [scheduler_fn].
#[derive(Clone)]
pub struct SchedulerFn<F>(F);

impl<F> fmt::Debug for SchedulerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SchedulerFn")
    }
}

/// Builds a scheduler from a closure returning the future to await.
pub fn scheduler_fn<F, Fut>(f: F) -> SchedulerFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    SchedulerFn(f)
}

#[async_trait::async_trait]
impl<F, Fut> Scheduler for SchedulerFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn defer(&self) {
        (self.0)().await;
    }
}
