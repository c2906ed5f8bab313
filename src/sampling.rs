use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::session::Sample;
use crate::simulation;

/// Receives the output of a sampling task.
///
/// `epoch` identifies the run that produced the tick; sinks drop ticks from
/// runs that are no longer current.
#[async_trait]
pub trait TickSink: Send + Sync + 'static {
    /// Deliver one sample. Returning `false` stops the task.
    async fn on_tick(&self, epoch: u64, sample: Sample) -> bool;

    /// Called once after the final tick. Not called on cancel.
    async fn on_complete(&self, epoch: u64);
}

#[derive(Debug, Clone)]
pub struct RunPlan {
    pub epoch: u64,
    pub total_ticks: u64,
    pub target_concurrency: u32,
    pub period: Duration,
    pub seed: Option<u64>,
}

/// A running simulated load test. Owns its tick counter and stops itself
/// after `total_ticks`.
pub struct SamplingTask {
    epoch: u64,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SamplingTask {
    pub fn spawn(plan: RunPlan, sink: Arc<dyn TickSink>) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let epoch = plan.epoch;
        let handle = tokio::spawn(run_sampler(plan, sink, stop_rx));
        Self {
            epoch,
            stop_tx,
            handle,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the task. No tick is delivered after this returns.
    pub fn cancel(self) {
        let _ = self.stop_tx.send(true);
        self.handle.abort();
        debug!("Sampling task for run {} cancelled", self.epoch);
    }
}

async fn run_sampler(plan: RunPlan, sink: Arc<dyn TickSink>, mut stop_rx: watch::Receiver<bool>) {
    let mut rng = match plan.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut ticker = interval_at(Instant::now() + plan.period, plan.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    for elapsed in 1..=plan.total_ticks {
        loop {
            tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        return;
                    }
                }
                _ = ticker.tick() => break,
            }
        }
        if *stop_rx.borrow() {
            return;
        }

        let sample = simulation::sample(
            elapsed,
            plan.total_ticks,
            plan.target_concurrency,
            &mut rng,
        );
        if !sink.on_tick(plan.epoch, sample).await {
            debug!("Run {} rejected tick {}, stopping", plan.epoch, elapsed);
            return;
        }
    }

    sink.on_complete(plan.epoch).await;
}
