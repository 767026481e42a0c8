//! Pauses a transport should respect when talking to a device.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-device delays. The codec never sleeps; transports read these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimingHints {
    /// Before sending anything after a patch change.
    pub after_patch_change: Duration,
    /// After a full dump has been sent.
    pub after_dump: Duration,
    /// Between consecutive messages of one operation.
    pub between_messages: Duration,
}

impl TimingHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn after_patch_change(mut self, ms: u64) -> Self {
        self.after_patch_change = Duration::from_millis(ms);
        self
    }

    pub fn after_dump(mut self, ms: u64) -> Self {
        self.after_dump = Duration::from_millis(ms);
        self
    }

    pub fn between_messages(mut self, ms: u64) -> Self {
        self.between_messages = Duration::from_millis(ms);
        self
    }
}
