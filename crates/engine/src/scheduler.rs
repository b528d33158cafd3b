//! Periodic auto-check task.
//!
//! One task per armed timer, spawned by
//! [`WarningEngine::start_auto_check`](crate::WarningEngine::start_auto_check)
//! and cancelled by abort. The task holds only a [`Weak`] engine
//! reference, so it cannot keep a dropped engine alive and exits on its
//! own at the next tick if the engine is gone.

use std::sync::Weak;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use citysense_store::KvStore;

use crate::engine::WarningEngine;
use crate::source::DataSource;

pub(crate) async fn run<S, D>(engine: Weak<WarningEngine<S, D>>, period: Duration)
where
    S: KvStore + Send + Sync + 'static,
    D: DataSource + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval(period);
    // A delayed runtime must not burst-fire several checks back to back.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The interval's first tick completes immediately and the caller
    // already ran an immediate check; skip it.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(engine) = engine.upgrade() else {
            break;
        };
        engine.check_now();
    }
}
