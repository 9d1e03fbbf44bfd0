//! The intent queue: the single path into the control service.
//!
//! Intents are produced by:
//! - the panel input thread (debounced button presses)
//! - the remote command reader (parsed command lines)
//! - the sensor sampler (a sensor crossed its error limit)
//!
//! and consumed by the control loop, which applies them one at a time in
//! arrival order.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌────────────────┐
//! │ Panel input │────▶│              │     │                │
//! │ Remote cmds │────▶│ IntentQueue  │────▶│  Control loop  │
//! │ Sampler     │────▶│  (bounded)   │     │ (sole writer)  │
//! └─────────────┘     └──────────────┘     └────────────────┘
//! ```
//!
//! Producers never block: a full queue drops the intent and reports
//! [`Error::QueueFull`] to the caller.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::app::commands::Intent;
use crate::error::{Error, Result};

/// Maximum number of pending intents.
pub const INTENT_QUEUE_CAP: usize = 16;

/// Bounded MPMC intent channel.  Share it behind an `Arc`.
pub struct IntentQueue {
    channel: Channel<CriticalSectionRawMutex, Intent, INTENT_QUEUE_CAP>,
}

impl Default for IntentQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Enqueue without blocking.
    pub fn submit(&self, intent: Intent) -> Result<()> {
        self.channel.try_send(intent).map_err(|_| {
            warn!("QUEUE | full, dropped {:?}", intent);
            Error::QueueFull
        })
    }

    /// Next pending intent, if any.
    pub fn next(&self) -> Option<Intent> {
        self.channel.try_receive().ok()
    }

    /// Hand every pending intent to `handler` in FIFO order.  Stops early
    /// when the handler returns `false`; the rest stay queued.
    pub fn drain(&self, mut handler: impl FnMut(Intent) -> bool) {
        while let Some(intent) = self.next() {
            if !handler(intent) {
                break;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }
}
