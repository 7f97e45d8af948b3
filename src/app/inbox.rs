//! Command inbox between host-link tasks and the control loop.
//!
//! Uses an `embassy-sync` bounded channel so an async link task can post
//! commands without heap allocation while the synchronous loop drains
//! them at tick boundaries.
//!
//! ```text
//! ┌──────────────┐  AppCommand  ┌──────────────┐
//! │  Host link   │─────────────▶│ Control loop │
//! │  (any task)  │              │ (tick edge)  │
//! └──────────────┘              └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::channel::Channel;

use super::commands::AppCommand;
use crate::error::CommandError;

/// Default inbox depth.
pub const INBOX_DEPTH: usize = 16;

/// Bounded multi-producer command queue.
pub struct CommandInbox<M: RawMutex = CriticalSectionRawMutex, const N: usize = INBOX_DEPTH> {
    channel: Channel<M, AppCommand, N>,
}

impl<M: RawMutex, const N: usize> CommandInbox<M, N> {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Queue a command without blocking. A full inbox rejects it.
    pub fn post(&self, cmd: AppCommand) -> Result<(), CommandError> {
        self.channel
            .try_send(cmd)
            .map_err(|_| CommandError::InboxFull)
    }

    /// Take the oldest queued command, if any.
    pub fn take(&self) -> Option<AppCommand> {
        self.channel.try_receive().ok()
    }
}

impl<M: RawMutex, const N: usize> Default for CommandInbox<M, N> {
    fn default() -> Self {
        Self::new()
    }
}
