//! Change notifications fed into the scheduler

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use std::fmt;
use std::path::{Path, PathBuf};

/// A single filesystem change, live or synthesized by the poll loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    /// Path that changed
    pub path: PathBuf,
    /// Type of change
    pub kind: EventKind,
    /// Whether the subject is a directory
    pub is_directory: bool,
}

impl ChangeNotification {
    pub fn new(path: impl Into<PathBuf>, kind: EventKind, is_directory: bool) -> Self {
        Self {
            path: path.into(),
            kind,
            is_directory,
        }
    }

    /// Synthetic file modification used by the poll loop
    pub fn synthetic(poll_path: &Path) -> Self {
        Self::new(poll_path, EventKind::Modified, false)
    }

    /// Split a notify event into one notification per affected path
    pub fn from_notify(event: &notify::Event) -> Vec<Self> {
        let kind = EventKind::from(&event.kind);
        let dir_hint = match event.kind {
            notify::EventKind::Create(CreateKind::Folder)
            | notify::EventKind::Remove(RemoveKind::Folder) => Some(true),
            notify::EventKind::Create(CreateKind::File)
            | notify::EventKind::Remove(RemoveKind::File) => Some(false),
            _ => None,
        };

        // The source of a completed rename is gone; the destination tells
        // whether a directory moved
        let dir_hint = match (&event.kind, event.paths.as_slice()) {
            (notify::EventKind::Modify(ModifyKind::Name(RenameMode::Both)), [_, to]) => {
                Some(to.is_dir())
            }
            _ => dir_hint,
        };

        event
            .paths
            .iter()
            .map(|path| {
                let is_directory = dir_hint.unwrap_or_else(|| path.is_dir());
                Self::new(path.clone(), kind, is_directory)
            })
            .collect()
    }
}

/// Anything that accepts change notifications
///
/// Implemented by the scheduler; the poll loop and the live watcher only
/// see this trait.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: ChangeNotification);
}

/// Type of filesystem event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// File created
    Created,
    /// File contents or metadata modified
    Modified,
    /// File renamed
    Moved,
    /// File deleted
    Deleted,
    /// Anything else (access, open, close-without-write)
    Other,
}

impl EventKind {
    /// Kinds that may schedule a sync
    pub fn schedules_sync(self) -> bool {
        matches!(
            self,
            EventKind::Created | EventKind::Modified | EventKind::Moved | EventKind::Deleted
        )
    }
}

impl From<&notify::EventKind> for EventKind {
    fn from(kind: &notify::EventKind) -> Self {
        match kind {
            notify::EventKind::Create(_) => EventKind::Created,
            notify::EventKind::Modify(ModifyKind::Name(_)) => EventKind::Moved,
            notify::EventKind::Modify(_) => EventKind::Modified,
            notify::EventKind::Remove(_) => EventKind::Deleted,
            notify::EventKind::Access(_) | notify::EventKind::Any | notify::EventKind::Other => {
                EventKind::Other
            }
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Created => "created",
            EventKind::Modified => "modified",
            EventKind::Moved => "moved",
            EventKind::Deleted => "deleted",
            EventKind::Other => "other",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, DataChange};

    #[test]
    fn test_notify_kind_mapping() {
        use notify::EventKind as N;

        assert_eq!(EventKind::from(&N::Create(CreateKind::File)), EventKind::Created);
        assert_eq!(
            EventKind::from(&N::Modify(ModifyKind::Data(DataChange::Content))),
            EventKind::Modified
        );
        assert_eq!(
            EventKind::from(&N::Modify(ModifyKind::Name(RenameMode::Both))),
            EventKind::Moved
        );
        assert_eq!(EventKind::from(&N::Remove(RemoveKind::File)), EventKind::Deleted);
        assert_eq!(EventKind::from(&N::Access(AccessKind::Read)), EventKind::Other);
        assert_eq!(EventKind::from(&N::Any), EventKind::Other);
    }

    #[test]
    fn test_only_mutations_schedule_sync() {
        assert!(EventKind::Created.schedules_sync());
        assert!(EventKind::Modified.schedules_sync());
        assert!(EventKind::Moved.schedules_sync());
        assert!(EventKind::Deleted.schedules_sync());
        assert!(!EventKind::Other.schedules_sync());
    }

    #[test]
    fn test_multi_path_event_splits() {
        let event = notify::Event::new(notify::EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/photos/a.jpg"))
            .add_path(PathBuf::from("/photos/b.jpg"));

        let notifications = ChangeNotification::from_notify(&event);
        assert_eq!(notifications.len(), 2);
        assert!(notifications.iter().all(|n| n.kind == EventKind::Moved));
        assert!(notifications.iter().all(|n| !n.is_directory));
    }

    #[test]
    fn test_directory_rename_takes_flag_from_destination() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let from = temp_dir.path().join("album");
        let to = temp_dir.path().join("album-2024");
        std::fs::create_dir(&to).unwrap();

        let event = notify::Event::new(notify::EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(from)
            .add_path(to);

        let notifications = ChangeNotification::from_notify(&event);
        assert_eq!(notifications.len(), 2);
        assert!(notifications.iter().all(|n| n.is_directory));
    }

    #[test]
    fn test_folder_kind_marks_directory() {
        let event = notify::Event::new(notify::EventKind::Create(CreateKind::Folder))
            .add_path(PathBuf::from("/photos/2024"));

        let notifications = ChangeNotification::from_notify(&event);
        assert!(notifications[0].is_directory);
    }
}
