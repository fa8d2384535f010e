//! Watches the `org.freedesktop.UDisks2` service for removable block
//! devices and coordinates their mount, unmount and reformat lifecycle.
//!
//! You probably want to look at [`StorageWatcher`]: subscribe to the event
//! streams you care about, then call [`StorageWatcher::init`] to arm the
//! signal subscriptions and enumerate already-present devices.

use std::collections::HashMap;

use dbus::arg::{RefArg, Variant};
use thiserror::Error as ThisError;

pub use drive::Drive;
pub use event::Event;
pub use watcher::{MountEvent, StorageWatcher};

mod dispatcher;
mod drive;
mod event;
mod jobs;
mod registry;
#[cfg(test)]
pub(crate) mod testutil;
mod utils;
mod watcher;

pub const DEST: &str = "org.freedesktop.UDisks2";
pub const PATH: &str = "/org/freedesktop/UDisks2";

pub const BLOCK_IFACE: &str = "org.freedesktop.UDisks2.Block";
pub const DRIVE_IFACE: &str = "org.freedesktop.UDisks2.Drive";
pub const FILESYSTEM_IFACE: &str = "org.freedesktop.UDisks2.Filesystem";
pub const PARTITION_IFACE: &str = "org.freedesktop.UDisks2.Partition";
pub const PARTITION_TABLE_IFACE: &str = "org.freedesktop.UDisks2.PartitionTable";
pub const JOB_IFACE: &str = "org.freedesktop.UDisks2.Job";

/// Bound on the bootstrap retry delays: enumeration gives up once the next
/// Fibonacci delay reaches this many seconds.
pub(crate) const DEFAULT_MAXIMUM_WAIT_TIME: u64 = 64;

/// A property dictionary keyed by `K`, holding dynamically-typed values.
pub type KeyVariant<K> = HashMap<K, Variant<Box<dyn RefArg + 'static>>>;

/// Property-name to variant mapping, as carried by a single interface.
pub type VariantMap = KeyVariant<String>;

/// Interface-name to property-map mapping: the set of interfaces a bus
/// object exports and their state.
pub type InterfacesAndProperties = HashMap<String, VariantMap>;

/// The interface names listed by an `InterfacesRemoved` signal.
pub type Interfaces = Vec<String>;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("dbus call failed: {0}")]
    DBus(#[from] dbus::Error),
    #[error("interface {0} not found")]
    MissingInterface(&'static str),
    #[error("property {0} not found")]
    MissingProperty(&'static str),
    #[error("drive {0} is not mounted")]
    DriveNotMounted(String),
    #[error("{0} is mounted but does not remove the filesystem interface")]
    MountedWithoutFilesystem(String),
    #[error("initial device enumeration timed out")]
    BootstrapTimeout,
}
