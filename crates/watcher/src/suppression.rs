//! Intake muting while an action is in flight

/// Process-wide suppression flag
///
/// Lives inside the scheduler state and is only touched under its mutex.
#[derive(Debug, Default)]
pub struct SuppressionGate {
    active: bool,
}

impl SuppressionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start dropping notifications
    pub fn engage(&mut self) {
        self.active = true;
    }

    /// Resume intake; safe to call when already released
    pub fn release(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}
