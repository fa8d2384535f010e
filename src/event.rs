use dbus::Path;

use crate::utils::{clone_props, get_array_of_byte_arrays, get_bool, get_string};
use crate::{
    Error, Interfaces, InterfacesAndProperties, BLOCK_IFACE, FILESYSTEM_IFACE,
};

/// A decoded ObjectManager signal, or a synthesized entry from the initial
/// `GetManagedObjects` enumeration.
///
/// An event with a non-empty [`interfaces`](Event::interfaces) list is a
/// removal (the listed interfaces were lost on `path`); otherwise it is an
/// addition or state update carrying the object's current `props`.
#[derive(Debug)]
pub struct Event {
    pub path: Path<'static>,
    pub props: InterfacesAndProperties,
    pub interfaces: Interfaces,
}

impl Clone for Event {
    fn clone(&self) -> Self {
        Event {
            path: self.path.clone(),
            props: clone_props(&self.props),
            interfaces: self.interfaces.clone(),
        }
    }
}

impl Event {
    pub(crate) fn added(path: Path<'static>, props: InterfacesAndProperties) -> Self {
        Event {
            path,
            props,
            interfaces: Interfaces::new(),
        }
    }

    pub(crate) fn removed(path: Path<'static>, interfaces: Interfaces) -> Self {
        Event {
            path,
            props: InterfacesAndProperties::new(),
            interfaces,
        }
    }

    /// Whether this event represents an `InterfacesRemoved` signal.
    pub fn is_removal_event(&self) -> bool {
        !self.interfaces.is_empty()
    }

    pub fn has_interface(&self, name: &str) -> bool {
        self.props.contains_key(name)
    }

    /// The drive object path referenced by this block device's
    /// `Block.Drive` property.
    pub(crate) fn drive_object_path(&self) -> Result<Path<'static>, Error> {
        let block = self
            .props
            .get(BLOCK_IFACE)
            .ok_or(Error::MissingInterface(BLOCK_IFACE))?;
        let drive = block.get("Drive").ok_or(Error::MissingProperty("Drive"))?;
        let path = drive.0.as_str().ok_or(Error::MissingProperty("Drive"))?;
        Ok(Path::from(path.to_owned()))
    }

    pub(crate) fn is_filesystem(&self) -> bool {
        self.has_interface(FILESYSTEM_IFACE)
    }

    pub(crate) fn is_mounted(&self) -> bool {
        props_have_mountpoints(&self.props)
    }

    pub(crate) fn is_block_ignored(&self) -> bool {
        self.props
            .get(BLOCK_IFACE)
            .and_then(|block| block.get("HintIgnore"))
            .map(get_bool)
            .unwrap_or(false)
    }

    pub(crate) fn is_hint_system(&self) -> bool {
        self.props
            .get(BLOCK_IFACE)
            .and_then(|block| block.get("HintSystem"))
            .map(get_bool)
            .unwrap_or(false)
    }

    pub(crate) fn id_type(&self) -> Option<String> {
        self.props
            .get(BLOCK_IFACE)
            .and_then(|block| block.get("IdType"))
            .and_then(get_string)
    }

    pub(crate) fn has_id_type(&self) -> bool {
        self.id_type().is_some()
    }
}

/// Whether an object's `Filesystem.MountPoints` property reports at least
/// one mountpoint.
pub(crate) fn props_have_mountpoints(props: &InterfacesAndProperties) -> bool {
    props
        .get(FILESYSTEM_IFACE)
        .and_then(|filesystem| filesystem.get("MountPoints"))
        .map(|points| !get_array_of_byte_arrays(points).is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{block_event, drive_event, mounted_block_event};

    #[test]
    fn removal_events_carry_lost_interfaces() {
        let added = drive_event("/org/freedesktop/UDisks2/drives/usb1");
        assert!(!added.is_removal_event());

        let removed = Event::removed(
            "/org/freedesktop/UDisks2/drives/usb1".into(),
            vec![crate::DRIVE_IFACE.to_owned()],
        );
        assert!(removed.is_removal_event());
    }

    #[test]
    fn drive_object_path_reads_the_block_reference() {
        let event = block_event(
            "/org/freedesktop/UDisks2/block_devices/sdb1",
            "/org/freedesktop/UDisks2/drives/usb1",
        );
        let path = event.drive_object_path().unwrap();
        assert_eq!(&*path, "/org/freedesktop/UDisks2/drives/usb1");
    }

    #[test]
    fn drive_object_path_requires_the_block_interface() {
        let event = drive_event("/org/freedesktop/UDisks2/drives/usb1");
        assert!(matches!(
            event.drive_object_path(),
            Err(Error::MissingInterface(_))
        ));
    }

    #[test]
    fn mounted_state_follows_the_mountpoints_array() {
        let unmounted = block_event(
            "/org/freedesktop/UDisks2/block_devices/sdb1",
            "/org/freedesktop/UDisks2/drives/usb1",
        );
        assert!(!unmounted.is_mounted());

        let mounted = mounted_block_event(
            "/org/freedesktop/UDisks2/block_devices/sdb1",
            "/org/freedesktop/UDisks2/drives/usb1",
            "/media/usb0",
        );
        assert!(mounted.is_mounted());
    }

    #[test]
    fn id_type_must_be_non_empty() {
        let event = block_event(
            "/org/freedesktop/UDisks2/block_devices/sdb1",
            "/org/freedesktop/UDisks2/drives/usb1",
        );
        assert!(event.has_id_type());
        assert_eq!(event.id_type(), Some("vfat".to_owned()));
    }
}
