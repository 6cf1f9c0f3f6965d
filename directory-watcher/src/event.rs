//! File events from directory watching.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A file system event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// The kind of event.
    pub kind: FileEventKind,

    /// Path to the affected file or directory.
    pub path: PathBuf,
}

impl FileEvent {
    /// Create a new file event.
    pub fn new(kind: FileEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// The directory whose statistics this event affects.
    ///
    /// Watches are non-recursive, so an event reports either a change to the
    /// watched directory itself or to one of its children. `is_watched`
    /// tells the two apart; anything else maps to the parent.
    pub fn directory(&self, is_watched: impl Fn(&Path) -> bool) -> &Path {
        if is_watched(&self.path) {
            return &self.path;
        }
        self.path.parent().unwrap_or(&self.path)
    }
}

/// Kind of file event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    /// File was created.
    Created,

    /// File was modified.
    Modified,

    /// File was deleted.
    Deleted,

    /// File was renamed (old path).
    RenamedFrom,

    /// File was renamed (new path).
    RenamedTo,

    /// File metadata changed.
    MetadataChanged,

    /// Access time changed.
    Accessed,

    /// Unknown event type.
    Unknown,
}

impl From<notify::EventKind> for FileEventKind {
    fn from(kind: notify::EventKind) -> Self {
        match kind {
            notify::EventKind::Create(_) => Self::Created,
            notify::EventKind::Modify(modify_kind) => match modify_kind {
                notify::event::ModifyKind::Name(rename) => match rename {
                    notify::event::RenameMode::From => Self::RenamedFrom,
                    notify::event::RenameMode::To => Self::RenamedTo,
                    _ => Self::Modified,
                },
                notify::event::ModifyKind::Metadata(_) => Self::MetadataChanged,
                _ => Self::Modified,
            },
            notify::EventKind::Remove(_) => Self::Deleted,
            notify::EventKind::Access(_) => Self::Accessed,
            _ => Self::Unknown,
        }
    }
}

/// Message delivered by the watch subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchMessage {
    /// A change under a watched directory.
    Event(FileEvent),

    /// The watch backend reported an error.
    Error(String),
}

/// Events drained from the watch channel in one go.
#[derive(Debug, Clone, Default)]
pub struct EventBatch {
    /// Events in this batch, in arrival order.
    pub events: Vec<FileEvent>,
}

impl EventBatch {
    /// Create a new empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event to the batch.
    pub fn push(&mut self, event: FileEvent) {
        self.events.push(event);
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Affected directories, each once, in first-seen order.
    ///
    /// See [`FileEvent::directory`] for `is_watched`.
    pub fn directories(&self, is_watched: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        self.events
            .iter()
            .map(|event| event.directory(&is_watched))
            .filter(|dir| seen.insert(dir.to_path_buf()))
            .map(Path::to_path_buf)
            .collect()
    }
}
