//! Read-only snapshot access to the current dataset.

use std::sync::{Mutex, PoisonError};

use citysense_core::stats::{self, Statistics};
use citysense_core::types::{CityEvent, SensorReading, Timestamp};

/// A point-in-time copy of the dataset the engine detects over.
#[derive(Debug, Clone, Default)]
pub struct DataSnapshot {
    pub events: Vec<CityEvent>,
    pub readings: Vec<SensorReading>,
}

/// Supplies the current events and sensor readings. The engine only
/// ever reads; uploads and edits happen on the other side of this seam.
pub trait DataSource {
    fn snapshot(&self) -> DataSnapshot;
}

impl<T: DataSource + ?Sized> DataSource for std::sync::Arc<T> {
    fn snapshot(&self) -> DataSnapshot {
        (**self).snapshot()
    }
}

/// In-memory [`DataSource`] holding the bounded dataset uploaded by the
/// application. Replace-all and append mirror the upload flows.
#[derive(Debug, Default)]
pub struct MemoryDataSource {
    inner: Mutex<DataSnapshot>,
}

impl MemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, DataSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace all events.
    pub fn set_events(&self, events: Vec<CityEvent>) {
        self.inner().events = events;
    }

    /// Replace all sensor readings.
    pub fn set_readings(&self, readings: Vec<SensorReading>) {
        self.inner().readings = readings;
    }

    /// Append events to the existing dataset.
    pub fn add_events(&self, events: Vec<CityEvent>) {
        self.inner().events.extend(events);
    }

    /// Append sensor readings to the existing dataset.
    pub fn add_readings(&self, readings: Vec<SensorReading>) {
        self.inner().readings.extend(readings);
    }

    /// Drop all data.
    pub fn clear(&self) {
        *self.inner() = DataSnapshot::default();
    }

    /// Aggregate dashboard statistics over the current dataset.
    pub fn statistics(&self, now: Timestamp) -> Statistics {
        let snapshot = self.inner();
        stats::compute(&snapshot.events, &snapshot.readings, now)
    }
}

impl DataSource for MemoryDataSource {
    fn snapshot(&self) -> DataSnapshot {
        self.inner().clone()
    }
}
