// Shared state management for the caption model
use crate::models::blip::BlipCaptioner;
use crate::settings::Settings;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A lazily-populated, exclusively-locked slot for a loaded model. The slot
/// starts empty; the first request to hold the guard constructs the model via
/// [`get_or_init`], and once populated it is never reset for the life of the
/// process.
pub struct ModelSlot<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for ModelSlot<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> ModelSlot<T> {
    pub fn empty() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Waits up to `wait` for exclusive access to the slot. Returns `None` if
    /// the lock could not be acquired in time, so callers can shed load
    /// instead of queuing without bound.
    pub async fn acquire(&self, wait: Duration) -> Option<OwnedMutexGuard<Option<T>>> {
        tokio::time::timeout(wait, Arc::clone(&self.slot).lock_owned())
            .await
            .ok()
    }
}

/// Get-or-create for the slot contents. Must be called while holding the
/// guard; there is no concurrency control here. A failed `init` leaves the
/// slot empty, so the next caller attempts construction again.
pub fn get_or_init<T, F>(slot: &mut Option<T>, init: F) -> anyhow::Result<&mut T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    if slot.is_none() {
        *slot = Some(init()?);
    }
    slot.as_mut()
        .ok_or_else(|| anyhow::anyhow!("model slot empty after initialization"))
}

pub struct AppState {
    pub captioner: ModelSlot<BlipCaptioner>,
    pub settings: Settings,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            captioner: ModelSlot::empty(),
            settings,
            started_at: Utc::now(),
        }
    }
}
