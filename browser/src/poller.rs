use futures::{
    future::BoxFuture,
    FutureExt as _,
};
use parking_lot::Mutex;
use std::{
    future::Future,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::Duration,
};
use tokio_util::sync::CancellationToken;

/// Delay between the end of one tick and the start of the next.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// One poll cycle, resolving to whether polling should go on.
pub type Tick = Arc<dyn Fn() -> BoxFuture<'static, eyre::Result<bool>> + Send + Sync>;

pub fn tick_fn<F, Fut>(tick: F) -> Tick
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = eyre::Result<bool>> + Send + 'static,
{
    Arc::new(move || tick().boxed())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum PollerState {
    Running,
    Stopped,
}

#[derive(Default)]
struct Run {
    generation: u64,
    cancel: Option<CancellationToken>,
}

/// Restartable fixed-interval loop.
///
/// The next tick is only scheduled once the previous one resolved, and ticks
/// of consecutive runs never overlap: a tick already in flight when the loop
/// is stopped still completes, a restarted loop waits for it.
#[derive(Clone)]
pub struct Poller {
    tick: Tick,
    interval: Duration,
    run: Arc<Mutex<Run>>,
    in_flight: Arc<tokio::sync::Mutex<()>>,
}

impl Poller {
    pub fn new(tick: Tick) -> Self {
        Self::with_interval(tick, POLL_INTERVAL)
    }

    pub fn with_interval(tick: Tick, interval: Duration) -> Self {
        Self {
            tick,
            interval,
            run: Default::default(),
            in_flight: Default::default(),
        }
    }

    pub fn state(&self) -> PollerState {
        match &self.run.lock().cancel {
            Some(token) if !token.is_cancelled() => PollerState::Running,
            _ => PollerState::Stopped,
        }
    }

    /// Starts polling with an immediate first tick, replacing a running loop.
    pub fn start(&self) {
        let mut run = self.run.lock();
        if let Some(previous) = run.cancel.take() {
            previous.cancel();
        }
        run.generation += 1;
        let token = CancellationToken::new();
        run.cancel = Some(token.clone());
        debug!(generation = run.generation, "Polling started");

        tokio::spawn(self.clone().run(run.generation, token));
    }

    pub fn stop(&self) {
        if let Some(token) = self.run.lock().cancel.take() {
            token.cancel();
            debug!("Polling stopped");
        }
    }

    async fn run(self, generation: u64, token: CancellationToken) {
        loop {
            let outcome = {
                let _in_flight = self.in_flight.lock().await;
                if token.is_cancelled() {
                    return;
                }
                AssertUnwindSafe((self.tick)()).catch_unwind().await
            };

            match outcome {
                Ok(Ok(true)) => {}
                Ok(Ok(false)) => break,
                Ok(Err(err)) => {
                    warn!("Poll tick failed, polling stopped: {err:?}");
                    break;
                }
                Err(_) => {
                    error!("Poll tick panicked, polling stopped");
                    break;
                }
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        let mut run = self.run.lock();
        if run.generation == generation {
            if let Some(token) = run.cancel.take() {
                token.cancel();
            }
            debug!(generation, "Polling finished");
        }
    }
}
