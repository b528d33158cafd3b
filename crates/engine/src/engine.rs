//! The warning lifecycle manager.
//!
//! All mutating operations are serialized behind one state mutex: the
//! engine is the single logical owner of the warning collection, and a
//! detector pass must never read a half-updated live list. The
//! auto-check timer is owned per instance, so engines in tests do not
//! interfere with each other.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;

use citysense_core::cluster::detect_event_clusters;
use citysense_core::config::{ConfigPatch, WarningConfig};
use citysense_core::correlation::detect_correlations;
use citysense_core::dedup::dedupe_warnings;
use citysense_core::error::CoreError;
use citysense_core::streak::detect_sensor_streaks;
use citysense_core::types::{Warning, WarningLevel, WarningStatus};
use citysense_store::{keys, KvStore};

use crate::scheduler;
use crate::source::DataSource;

#[derive(Debug, Default)]
struct EngineState {
    /// Live warnings, shown to operators.
    warnings: Vec<Warning>,
    /// Append-only record of every warning ever raised.
    history: Vec<Warning>,
    config: WarningConfig,
    /// Warning ids whose UI notification was dismissed.
    suppressed: HashSet<String>,
}

/// Owns warning state, runs the detection rules on demand or on a
/// timer, and persists through a [`KvStore`].
///
/// Wrap in an [`Arc`] to use the scheduler operations
/// ([`start_auto_check`](Self::start_auto_check),
/// [`update_config`](Self::update_config)); everything else works on a
/// plain reference.
pub struct WarningEngine<S, D> {
    state: Mutex<EngineState>,
    store: S,
    source: D,
    /// Re-entrancy guard: a timer-driven check that finds one already
    /// running skips its cycle instead of double-inserting.
    check_in_flight: AtomicBool,
    /// Handle of the armed auto-check task, `None` when inactive.
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl<S, D> WarningEngine<S, D>
where
    S: KvStore + Send + Sync + 'static,
    D: DataSource + Send + Sync + 'static,
{
    /// Engine with default config and empty state. Call
    /// [`load_persisted`](Self::load_persisted) to restore a previous
    /// session.
    pub fn new(store: S, source: D) -> Self {
        Self::with_config(WarningConfig::default(), store, source)
    }

    pub fn with_config(config: WarningConfig, store: S, source: D) -> Self {
        Self {
            state: Mutex::new(EngineState {
                config,
                ..EngineState::default()
            }),
            store,
            source,
            check_in_flight: AtomicBool::new(false),
            timer: Mutex::new(None),
        }
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        // A poisoned lock means a detector panicked mid-update; the
        // state itself is still usable, so recover rather than spread
        // the panic.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn timer_guard(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------
    // Check cycle
    // -----------------------------------------------------------------

    /// Run one detection cycle over the current snapshot.
    ///
    /// No-op when the snapshot holds neither events nor readings, and
    /// when another check is already in flight.
    pub fn check_now(&self) {
        if self.check_in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!("Warning check already in flight; skipping this pass");
            return;
        }
        // The flag must clear even if a detector panics mid-pass, or
        // every later check would be skipped forever.
        struct InFlight<'a>(&'a AtomicBool);
        impl Drop for InFlight<'_> {
            fn drop(&mut self) {
                self.0.store(false, Ordering::SeqCst);
            }
        }
        let _in_flight = InFlight(&self.check_in_flight);
        self.run_check();
    }

    fn run_check(&self) {
        let snapshot = self.source.snapshot();
        if snapshot.events.is_empty() && snapshot.readings.is_empty() {
            return;
        }

        let mut state = self.state();
        let config = state.config.clone();

        let mut candidates = detect_event_clusters(
            &snapshot.events,
            config.event_cluster_time_window_hours,
            config.event_cluster_threshold,
        );
        candidates.extend(detect_sensor_streaks(
            &snapshot.readings,
            config.sensor_consecutive_count,
        ));
        candidates.extend(detect_correlations(
            &snapshot.events,
            &snapshot.readings,
            Utc::now(),
        ));

        let mut added = 0usize;
        for candidate in dedupe_warnings(&candidates) {
            // A warning already live under the same id or identity key
            // is the same anomaly still firing, not news.
            let exists = state
                .warnings
                .iter()
                .any(|w| w.id == candidate.id || w.matches_identity(&candidate));
            if !exists {
                state.history.push(candidate.clone());
                state.warnings.push(candidate);
                added += 1;
            }
        }

        // Suppressed ids for warnings that no longer exist are stale.
        let live_ids: HashSet<String> = state.warnings.iter().map(|w| w.id.clone()).collect();
        state.suppressed.retain(|id| live_ids.contains(id));

        if added > 0 {
            tracing::info!(
                added,
                live = state.warnings.len(),
                "Warning check raised new warnings"
            );
        }
        self.persist(&state);
    }

    // -----------------------------------------------------------------
    // Operator actions
    // -----------------------------------------------------------------

    /// Set the status of a live warning. Unknown ids are a silent no-op:
    /// the UI may race background pruning.
    pub fn set_status(&self, id: &str, status: WarningStatus) {
        let mut state = self.state();
        let Some(warning) = state.warnings.iter_mut().find(|w| w.id == id) else {
            return;
        };
        warning.status = status;
        self.persist(&state);
    }

    /// Attach an AI-generated handling suggestion to a live warning.
    /// Unknown ids are a silent no-op.
    pub fn attach_suggestion(&self, id: &str, suggestion: &str) {
        let mut state = self.state();
        let Some(warning) = state.warnings.iter_mut().find(|w| w.id == id) else {
            return;
        };
        warning.ai_suggestion = Some(suggestion.to_string());
        self.persist(&state);
    }

    /// Remove a warning from the live list. Its history entry stays.
    pub fn delete(&self, id: &str) {
        let mut state = self.state();
        state.warnings.retain(|w| w.id != id);
        self.persist(&state);
    }

    /// Empty live warnings, history, and the suppressed set, and stop
    /// the auto-check scheduler.
    pub fn clear_all(&self) {
        self.stop_auto_check();
        let mut state = self.state();
        state.warnings.clear();
        state.history.clear();
        state.suppressed.clear();
        self.persist(&state);
    }

    // -----------------------------------------------------------------
    // Configuration & scheduler
    // -----------------------------------------------------------------

    /// Merge a partial config update, persist it, and restart or stop
    /// the scheduler to match `auto_check_enabled`.
    ///
    /// Rejects out-of-range values without touching state.
    pub fn update_config(self: &Arc<Self>, patch: &ConfigPatch) -> Result<(), CoreError> {
        // Merge and assign under one lock acquisition so concurrent
        // patches of disjoint fields cannot lose an update.
        let auto_check_enabled;
        {
            let mut state = self.state();
            let merged = patch.apply(&state.config);
            merged.validate()?;
            auto_check_enabled = merged.auto_check_enabled;
            state.config = merged;
            self.persist(&state);
        }

        if auto_check_enabled {
            self.start_auto_check();
        } else {
            self.stop_auto_check();
        }
        Ok(())
    }

    /// Arm the periodic re-check: cancel any existing timer, run one
    /// immediate check, then tick at `check_interval_ms`. The timer slot
    /// stays locked for the whole arm sequence, so concurrent starts
    /// serialize and exactly one timer survives.
    pub fn start_auto_check(self: &Arc<Self>) {
        let mut timer = self.timer_guard();
        if let Some(handle) = timer.take() {
            handle.abort();
        }

        let period_ms = self.state().config.check_interval_ms;
        tracing::info!(period_ms, "Starting auto-check scheduler");
        self.check_now();

        // The task holds a Weak so a dropped engine ends its scheduler.
        // Config validation keeps the interval nonzero, but a zero
        // period would panic tokio's interval, so clamp anyway.
        *timer = Some(tokio::spawn(scheduler::run(
            Arc::downgrade(self),
            Duration::from_millis(period_ms.max(1)),
        )));
    }

    /// Cancel the timer if armed. Safe to call at any time, including
    /// before any start.
    pub fn stop_auto_check(&self) {
        if let Some(handle) = self.timer_guard().take() {
            handle.abort();
            tracing::debug!("Auto-check scheduler stopped");
        }
    }

    /// Whether the auto-check timer is currently armed.
    pub fn auto_check_active(&self) -> bool {
        self.timer_guard().is_some()
    }

    // -----------------------------------------------------------------
    // Notification suppression
    // -----------------------------------------------------------------

    /// Mark a warning's UI notification as dismissed.
    pub fn suppress(&self, id: &str) {
        let mut state = self.state();
        state.suppressed.insert(id.to_string());
        self.persist(&state);
    }

    pub fn is_suppressed(&self, id: &str) -> bool {
        self.state().suppressed.contains(id)
    }

    // -----------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------

    pub fn warnings(&self) -> Vec<Warning> {
        self.state().warnings.clone()
    }

    pub fn history(&self) -> Vec<Warning> {
        self.state().history.clone()
    }

    pub fn config(&self) -> WarningConfig {
        self.state().config.clone()
    }

    pub fn pending_warnings(&self) -> Vec<Warning> {
        self.warnings_with_status(WarningStatus::Pending)
    }

    pub fn processing_warnings(&self) -> Vec<Warning> {
        self.warnings_with_status(WarningStatus::Processing)
    }

    pub fn resolved_warnings(&self) -> Vec<Warning> {
        self.warnings_with_status(WarningStatus::Resolved)
    }

    pub fn high_level_warnings(&self) -> Vec<Warning> {
        self.state()
            .warnings
            .iter()
            .filter(|w| w.level == WarningLevel::High)
            .cloned()
            .collect()
    }

    fn warnings_with_status(&self, status: WarningStatus) -> Vec<Warning> {
        self.state()
            .warnings
            .iter()
            .filter(|w| w.status == status)
            .cloned()
            .collect()
    }

    // -----------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------

    /// Restore state from the store. Missing or corrupt documents leave
    /// the corresponding in-memory structure at its default; nothing
    /// here can fail the caller.
    pub fn load_persisted(&self) {
        let mut state = self.state();

        if let Some(warnings) = self.load_doc::<Vec<Warning>>(keys::WARNINGS) {
            state.warnings = warnings;
        }
        if let Some(history) = self.load_doc::<Vec<Warning>>(keys::WARNING_HISTORY) {
            state.history = history;
        }
        if let Some(config) = self.load_doc::<WarningConfig>(keys::WARNING_CONFIG) {
            match config.validate() {
                Ok(()) => state.config = config,
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring persisted config with invalid values");
                }
            }
        }
        if let Some(ids) = self.load_doc::<Vec<String>>(keys::SUPPRESSED_NOTIFICATIONS) {
            state.suppressed = ids.into_iter().collect();
        }
    }

    fn load_doc<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.load(key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(key, error = %e, "Discarding corrupt persisted document");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to load persisted document");
                None
            }
        }
    }

    fn persist(&self, state: &EngineState) {
        self.save_doc(keys::WARNINGS, &state.warnings);
        self.save_doc(keys::WARNING_HISTORY, &state.history);
        self.save_doc(keys::WARNING_CONFIG, &state.config);
        // The set round-trips as an array.
        let suppressed: Vec<&String> = state.suppressed.iter().collect();
        self.save_doc(keys::SUPPRESSED_NOTIFICATIONS, &suppressed);
    }

    fn save_doc<T: Serialize>(&self, key: &str, value: &T) {
        let serialized = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to serialize document");
                return;
            }
        };
        if let Err(e) = self.store.save(key, &serialized) {
            tracing::warn!(key, error = %e, "Failed to persist document");
        }
    }
}

impl<S, D> Drop for WarningEngine<S, D> {
    fn drop(&mut self) {
        if let Some(handle) = self
            .timer
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}
