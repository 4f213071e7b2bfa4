//! Failure injection shared by the mock providers.

use parking_lot::Mutex;

/// Holds an optional failure reason consumed by the next call.
#[derive(Default)]
pub struct Toggle(Mutex<Option<String>>);

impl Toggle {
    /// Arm the toggle with a failure reason.
    pub fn set(&self, reason: impl Into<String>) {
        *self.0.lock() = Some(reason.into());
    }

    /// Take the armed reason, disarming the toggle.
    pub fn take(&self) -> Option<String> {
        self.0.lock().take()
    }
}
