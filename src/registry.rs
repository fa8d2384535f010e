use std::collections::HashMap;

use dbus::Path;

use crate::drive::Drive;
use crate::event::Event;
use crate::utils::clone_props;
use crate::Error;

const DRIVES_PREFIX: &str = "/org/freedesktop/UDisks2/drives";
const BLOCK_DEVICES_PREFIX: &str = "/org/freedesktop/UDisks2/block_devices";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PathKind {
    Drive,
    Block,
    Unhandled,
}

pub(crate) fn path_kind(path: &str) -> PathKind {
    if path.starts_with(DRIVES_PREFIX) {
        PathKind::Drive
    } else if path.starts_with(BLOCK_DEVICES_PREFIX) {
        PathKind::Block
    } else {
        PathKind::Unhandled
    }
}

/// The drives table: every drive the watcher has seen, keyed by object
/// path, with the block devices merged into their parents.
#[derive(Debug, Default)]
pub(crate) struct DriveMap(HashMap<Path<'static>, Drive>);

impl DriveMap {
    /// Absorbs one addition event. Returns whether the event described a
    /// block device.
    pub(crate) fn add_interface(&mut self, event: &Event) -> Result<bool, Error> {
        match path_kind(&event.path) {
            PathKind::Drive => {
                if self.0.contains_key(&event.path) {
                    log::warn!("replacing {} with new drive event", event.path);
                }
                self.0.insert(event.path.clone(), Drive::from_event(event));
                Ok(false)
            }
            PathKind::Block => {
                let drive_object_path = event.drive_object_path()?;
                match self.0.get_mut(&drive_object_path) {
                    None => {
                        // Placeholder for a block whose parent has not been
                        // seen yet. Keyed by the block's own path, not the
                        // referenced drive path; a later drive event replaces
                        // nothing and registers under its real path.
                        self.0.insert(event.path.clone(), Drive::from_event(event));
                    }
                    Some(drive) => {
                        drive
                            .block_devices
                            .insert(event.path.clone(), clone_props(&event.props));
                        drive.mounted = event.is_mounted();
                    }
                }
                Ok(true)
            }
            PathKind::Unhandled => {
                log::trace!("unhandled object path {}", event.path);
                Ok(false)
            }
        }
    }

    pub(crate) fn remove(&mut self, path: &Path<'static>) {
        self.0.remove(path);
    }

    pub(crate) fn get(&self, path: &Path<'static>) -> Option<&Drive> {
        self.0.get(path)
    }

    pub(crate) fn get_mut(&mut self, path: &Path<'static>) -> Option<&mut Drive> {
        self.0.get_mut(path)
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut Drive> {
        self.0.values_mut()
    }

    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&Path<'static>, &Drive)> {
        self.0.iter()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

/// Everything the orchestrator mutates, behind one coarse lock: the drives
/// table, the block-path to mountpoint table, and the block paths awaiting
/// a remount after a reformat.
#[derive(Debug, Default)]
pub(crate) struct WatcherState {
    pub drives: DriveMap,
    pub mountpoints: HashMap<String, String>,
    pub pending_mounts: Vec<String>,
}

impl WatcherState {
    /// Records a path awaiting remount, keeping `pending_mounts` sorted.
    pub(crate) fn insert_pending(&mut self, path: String) {
        if let Err(pos) = self.pending_mounts.binary_search(&path) {
            self.pending_mounts.insert(pos, path);
        }
    }

    /// Consumes the pending entry matching a filesystem addition event, if
    /// any. One reformat buys exactly one remount cycle.
    pub(crate) fn take_pending(&mut self, path: &str) -> bool {
        match self.pending_mounts.binary_search_by(|p| p.as_str().cmp(path)) {
            Ok(pos) => {
                self.pending_mounts.remove(pos);
                true
            }
            Err(_) => false,
        }
    }
}
