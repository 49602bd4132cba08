//! Ordered record of what a sync did

use std::fmt;

use repo_tree::ChefPath;

/// One line of sync output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Created(ChefPath),
    Updated(ChefPath),
    /// Removed from the destination because `purge` is on
    Deleted(ChefPath),
    WouldCreate(ChefPath),
    WouldUpdate(ChefPath),
    WouldDelete(ChefPath),
    Warning(String),
    Error(String),
}

impl SyncEvent {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created(path) => write!(f, "Created {}", path),
            Self::Updated(path) => write!(f, "Updated {}", path),
            Self::Deleted(path) => write!(f, "Deleted extra entry {} (purge is on)", path),
            Self::WouldCreate(path) => write!(f, "Would create {}", path),
            Self::WouldUpdate(path) => write!(f, "Would update {}", path),
            Self::WouldDelete(path) => {
                write!(f, "Would delete extra entry {} (purge is on)", path)
            }
            Self::Warning(message) | Self::Error(message) => write!(f, "{}", message),
        }
    }
}

/// Report from an upload or download
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub events: Vec<SyncEvent>,
}

impl SyncReport {
    pub fn push(&mut self, event: SyncEvent) {
        if let SyncEvent::Error(message) = &event {
            tracing::debug!(message = %message, "sync error");
        }
        self.events.push(event);
    }

    /// True when no path failed.
    pub fn success(&self) -> bool {
        !self.events.iter().any(SyncEvent::is_error)
    }

    /// Events that changed (or would change) the destination.
    pub fn changes(&self) -> impl Iterator<Item = &SyncEvent> {
        self.events
            .iter()
            .filter(|event| !matches!(event, SyncEvent::Warning(_) | SyncEvent::Error(_)))
    }
}
