//! Filesystem watch subscription.

use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::event::{FileEvent, FileEventKind, WatchMessage};

/// Capacity of the channel between the notify thread and the event loop.
const CHANNEL_CAPACITY: usize = 1000;

/// Forwards notify events for subscribed directories into a channel.
pub struct DirectoryWatcher {
    /// Internal notify watcher.
    watcher: RecommendedWatcher,

    /// Subscribed directories.
    watched: Vec<PathBuf>,
}

impl DirectoryWatcher {
    /// Create a watcher and the receiving end of its message channel.
    pub fn new() -> Result<(Self, mpsc::Receiver<WatchMessage>)> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| {
                let messages: Vec<WatchMessage> = match res {
                    Ok(event) => {
                        let kind = FileEventKind::from(event.kind);
                        event
                            .paths
                            .into_iter()
                            .map(|path| WatchMessage::Event(FileEvent::new(kind, path)))
                            .collect()
                    }
                    Err(e) => vec![WatchMessage::Error(e.to_string())],
                };

                for message in messages {
                    if let Err(e) = tx.blocking_send(message) {
                        error!("Failed to send watch message: {e}");
                    }
                }
            },
        )?;

        Ok((
            Self {
                watcher,
                watched: Vec::new(),
            },
            rx,
        ))
    }

    /// Subscribe to changes directly inside `path`.
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        self.watcher.watch(path, RecursiveMode::NonRecursive)?;
        self.watched.push(path.to_path_buf());
        debug!("Started watching: {}", path.display());
        Ok(())
    }

    #[cfg(test)]
    fn watched(&self) -> &[PathBuf] {
        &self.watched
    }

    /// Release every subscription.
    pub fn unwatch_all(&mut self) {
        for path in self.watched.drain(..) {
            if let Err(e) = self.watcher.unwatch(&path) {
                warn!("Failed to unwatch {}: {e}", path.display());
            }
        }
        info!("Directory watcher stopped");
    }
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("watched", &self.watched)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_watch_directory() {
        let temp_dir = TempDir::new().unwrap();
        let (mut watcher, _rx) = DirectoryWatcher::new().unwrap();

        watcher.watch(temp_dir.path()).unwrap();
        assert_eq!(watcher.watched(), &[temp_dir.path().to_path_buf()]);

        watcher.unwatch_all();
        assert!(watcher.watched().is_empty());
    }

    #[tokio::test]
    async fn test_watch_nonexistent_directory() {
        let (mut watcher, _rx) = DirectoryWatcher::new().unwrap();
        let result = watcher.watch(Path::new("/nonexistent/path/12345"));
        assert!(result.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_file_creation_is_delivered() {
        let temp_dir = TempDir::new().unwrap();
        let (mut watcher, mut rx) = DirectoryWatcher::new().unwrap();
        watcher.watch(temp_dir.path()).unwrap();

        std::fs::write(temp_dir.path().join("new.txt"), b"hello").unwrap();

        let message = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("no watch message within timeout")
            .expect("channel closed");
        match message {
            WatchMessage::Event(event) => {
                assert_eq!(event.path.file_name().unwrap(), "new.txt");
            }
            WatchMessage::Error(e) => panic!("unexpected watch error: {e}"),
        }
    }
}
