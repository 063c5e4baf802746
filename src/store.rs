//! In-memory, per-field bounded history of sensor samples.
//!
//! Each field owns its own mutex. The outer map lock is only held long enough
//! to find or create a field's slot, so appends for different fields never
//! contend, and an append plus its truncation pass is atomic with respect to
//! every other operation on the same field.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use uuid::Uuid;

use crate::models::{Reading, SensorSample};

// ---

/// Maximum number of samples retained per field.
pub const MAX_SAMPLES_PER_FIELD: usize = 1000;

type FieldHistory = Arc<Mutex<Vec<SensorSample>>>;

#[derive(Debug)]
pub struct TimeSeriesStore {
    fields: RwLock<HashMap<Uuid, FieldHistory>>,
    capacity: usize,
}

impl Default for TimeSeriesStore {
    fn default() -> Self {
        Self::with_capacity(MAX_SAMPLES_PER_FIELD)
    }
}

impl TimeSeriesStore {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a custom per-field bound (at least 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Record a reading under `field_id`.
    ///
    /// Legacy readings expand into one sample per populated legacy field. If
    /// the history grows past the bound it is replaced by the most recent
    /// samples, sorted by timestamp descending.
    pub fn append(&self, field_id: Uuid, reading: &Reading) {
        // ---
        let samples = reading.samples();
        if samples.is_empty() {
            tracing::debug!(%field_id, "reading carries no sensor data; nothing stored");
        }

        let slot = self.slot(field_id);
        let mut history = slot.lock().unwrap_or_else(PoisonError::into_inner);
        history.extend(samples);

        if history.len() > self.capacity {
            let before = history.len();
            // Stable sort keeps append order among equal timestamps
            history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            history.truncate(self.capacity);
            tracing::debug!(
                %field_id,
                evicted = before - history.len(),
                "history bound reached; kept most recent samples"
            );
        }
    }

    /// Snapshot of a field's samples whose sensor type matches
    /// case-insensitively, in storage order.
    pub fn query(&self, field_id: Uuid, sensor_type: &str) -> Vec<SensorSample> {
        // ---
        let Some(slot) = self.existing_slot(field_id) else {
            return Vec::new();
        };
        let history = slot.lock().unwrap_or_else(PoisonError::into_inner);
        history
            .iter()
            .filter(|s| s.sensor_type.eq_ignore_ascii_case(sensor_type))
            .cloned()
            .collect()
    }

    /// Number of samples held for a field.
    pub fn len(&self, field_id: Uuid) -> usize {
        self.existing_slot(field_id)
            .map(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }

    /// Number of fields with history.
    pub fn field_count(&self) -> usize {
        self.fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn existing_slot(&self, field_id: Uuid) -> Option<FieldHistory> {
        self.fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&field_id)
            .cloned()
    }

    fn slot(&self, field_id: Uuid) -> FieldHistory {
        // ---
        if let Some(slot) = self.existing_slot(field_id) {
            return slot;
        }
        let mut fields = self.fields.write().unwrap_or_else(PoisonError::into_inner);
        fields.entry(field_id).or_default().clone()
    }
}
