//! Channel directory and lifecycle
//!
//! Channels are created on first join and retired when their last member
//! leaves, except for the default channels seeded at startup, which exist
//! for the lifetime of the server regardless of occupancy.

use tracing::info;

use super::registry::Registry;

/// Ordered set of known channel names
#[derive(Debug)]
pub struct ChannelDirectory {
    /// Known channels: defaults first, then creation order
    channels: Vec<String>,
    /// Names that are never retired
    defaults: Vec<String>,
}

impl ChannelDirectory {
    /// Create a directory seeded with the given default channels
    pub fn new(defaults: Vec<String>) -> Self {
        Self {
            channels: defaults.clone(),
            defaults,
        }
    }

    /// True iff the channel is one of the permanent defaults
    pub fn is_default(&self, name: &str) -> bool {
        self.defaults.iter().any(|d| d == name)
    }

    /// True iff the channel currently exists
    pub fn contains(&self, name: &str) -> bool {
        self.channels.iter().any(|c| c == name)
    }

    /// Add the channel if absent. Returns true iff it was created.
    pub fn ensure_exists(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.channels.push(name.to_string());
        info!("Channel {} created", name);
        true
    }

    /// Retire the channel iff it has no members and is not a default.
    /// Returns true iff it was removed.
    pub fn remove_if_empty(&mut self, name: &str, registry: &Registry) -> bool {
        if self.is_default(name) {
            return false;
        }
        if registry.members_of(Some(name)).next().is_some() {
            return false;
        }
        let Some(index) = self.channels.iter().position(|c| c == name) else {
            return false;
        };
        self.channels.remove(index);
        info!("Empty channel {} retired", name);
        true
    }

    /// Snapshot of the current channel names, in directory order
    pub fn list(&self) -> Vec<String> {
        self.channels.clone()
    }
}
