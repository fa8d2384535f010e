use std::collections::HashMap;

use dbus::Path;

use crate::event::Event;
use crate::utils::{clone_props, get_bool, get_string, get_string_array};
use crate::{InterfacesAndProperties, BLOCK_IFACE, DRIVE_IFACE};

/// A physical storage device and the block devices that belong to it.
///
/// `drive_info` holds the interfaces and properties of the drive object
/// itself; `block_devices` maps each child block's object path to its own
/// interface state.
#[derive(Debug)]
pub struct Drive {
    pub path: Path<'static>,
    pub block_devices: HashMap<Path<'static>, InterfacesAndProperties>,
    pub drive_info: InterfacesAndProperties,
    pub mounted: bool,
}

impl Clone for Drive {
    fn clone(&self) -> Self {
        Drive {
            path: self.path.clone(),
            block_devices: self
                .block_devices
                .iter()
                .map(|(path, props)| (path.clone(), clone_props(props)))
                .collect(),
            drive_info: clone_props(&self.drive_info),
            mounted: self.mounted,
        }
    }
}

impl Drive {
    pub(crate) fn from_event(event: &Event) -> Self {
        Drive {
            path: event.path.clone(),
            block_devices: HashMap::new(),
            drive_info: clone_props(&event.props),
            mounted: event.is_mounted(),
        }
    }

    /// Whether the drive reports removable hardware.
    ///
    /// Some USB thumb devices report removable media where they have none;
    /// when both `Removable` and `MediaRemovable` are present either one
    /// being true is accepted. A drive exposing neither is not removable.
    pub fn is_removable(&self) -> bool {
        let props = match self.drive_info.get(DRIVE_IFACE) {
            Some(props) => props,
            None => return false,
        };

        match (props.get("Removable"), props.get("MediaRemovable")) {
            (Some(removable), Some(media_removable)) => {
                get_bool(removable) || get_bool(media_removable)
            }
            (Some(removable), None) => get_bool(removable),
            (None, Some(media_removable)) => get_bool(media_removable),
            (None, None) => false,
        }
    }

    /// True when any child block device hints that it backs the system.
    pub fn has_system_block_devices(&self) -> bool {
        self.block_devices.values().any(|block_device| {
            block_device
                .get(BLOCK_IFACE)
                .and_then(|block| block.get("HintSystem"))
                .map(get_bool)
                .unwrap_or(false)
        })
    }

    /// The drive's model string, empty when not advertised.
    pub fn model(&self) -> String {
        self.drive_info
            .get(DRIVE_IFACE)
            .and_then(|props| props.get("Model"))
            .and_then(get_string)
            .unwrap_or_default()
    }

    pub(crate) fn removable(&self) -> bool {
        self.drive_property("Removable")
    }

    pub(crate) fn media_removable(&self) -> bool {
        self.drive_property("MediaRemovable")
    }

    fn drive_property(&self, name: &str) -> bool {
        self.drive_info
            .get(DRIVE_IFACE)
            .and_then(|props| props.get(name))
            .map(get_bool)
            .unwrap_or(false)
    }

    pub(crate) fn media_compatibility(&self) -> Vec<String> {
        self.drive_info
            .get(DRIVE_IFACE)
            .and_then(|props| props.get("MediaCompatibility"))
            .map(get_string_array)
            .unwrap_or_default()
    }

    /// Marks the drive mounted when `path` is one of its block devices.
    /// Returns whether the path was found.
    pub(crate) fn set_mounted(&mut self, path: &str) -> bool {
        if self.block_devices.keys().any(|block| &**block == path) {
            self.mounted = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{drive_event_with, empty_drive, vbool, vstr, vstrs};

    fn removable_drive(props: &[(&str, bool)]) -> Drive {
        let mut drive_props = crate::VariantMap::new();
        for (name, value) in props {
            drive_props.insert((*name).to_owned(), vbool(*value));
        }
        let event = drive_event_with("/org/freedesktop/UDisks2/drives/usb1", drive_props);
        Drive::from_event(&event)
    }

    #[test]
    fn empty_drive_has_no_system_devices() {
        assert!(!empty_drive("/org/freedesktop/UDisks2/drives/usb1")
            .has_system_block_devices());
    }

    #[test]
    fn system_hint_on_any_block_marks_the_drive() {
        let mut drive = empty_drive("/org/freedesktop/UDisks2/drives/usb1");
        let mut block = crate::VariantMap::new();
        block.insert("HintSystem".to_owned(), vbool(true));
        let mut props = crate::InterfacesAndProperties::new();
        props.insert(crate::BLOCK_IFACE.to_owned(), block);
        drive.block_devices.insert("/foo/bar".into(), props);
        assert!(drive.has_system_block_devices());
    }

    #[test]
    fn unhinted_blocks_do_not_mark_the_drive() {
        let mut drive = empty_drive("/org/freedesktop/UDisks2/drives/usb1");
        let mut block = crate::VariantMap::new();
        block.insert("HintSystem".to_owned(), vbool(false));
        let mut props = crate::InterfacesAndProperties::new();
        props.insert(crate::BLOCK_IFACE.to_owned(), block);
        drive.block_devices.insert("/foo/bar".into(), props);
        assert!(!drive.has_system_block_devices());
    }

    #[test]
    fn drive_is_not_removable() {
        assert!(!empty_drive("/org/freedesktop/UDisks2/drives/usb1").is_removable());
        assert!(!removable_drive(&[("Removable", false), ("MediaRemovable", false)])
            .is_removable());
        assert!(!removable_drive(&[("Removable", false)]).is_removable());
        assert!(!removable_drive(&[("MediaRemovable", false)]).is_removable());
    }

    #[test]
    fn drive_is_removable() {
        assert!(removable_drive(&[("Removable", true), ("MediaRemovable", false)])
            .is_removable());
        assert!(removable_drive(&[("Removable", true), ("MediaRemovable", true)])
            .is_removable());
        assert!(removable_drive(&[("Removable", false), ("MediaRemovable", true)])
            .is_removable());
        assert!(removable_drive(&[("Removable", true)]).is_removable());
        assert!(removable_drive(&[("MediaRemovable", true)]).is_removable());
    }

    #[test]
    fn model_reads_the_drive_interface() {
        let mut props = crate::VariantMap::new();
        props.insert("Model".to_owned(), vstr("Kingston DataTraveler"));
        let event = drive_event_with("/org/freedesktop/UDisks2/drives/usb1", props);
        assert_eq!(Drive::from_event(&event).model(), "Kingston DataTraveler");
        assert_eq!(
            empty_drive("/org/freedesktop/UDisks2/drives/usb1").model(),
            ""
        );
    }

    #[test]
    fn media_compatibility_lists_the_advertised_media() {
        let mut props = crate::VariantMap::new();
        props.insert("MediaCompatibility".to_owned(), vstrs(&["thumb", "flash_sd"]));
        let event = drive_event_with("/org/freedesktop/UDisks2/drives/usb1", props);
        assert_eq!(
            Drive::from_event(&event).media_compatibility(),
            vec!["thumb".to_owned(), "flash_sd".to_owned()]
        );
    }

    #[test]
    fn set_mounted_only_matches_owned_blocks() {
        let mut drive = empty_drive("/org/freedesktop/UDisks2/drives/usb1");
        drive.block_devices.insert(
            "/org/freedesktop/UDisks2/block_devices/sdb1".into(),
            crate::InterfacesAndProperties::new(),
        );

        assert!(!drive.set_mounted("/org/freedesktop/UDisks2/block_devices/sdc1"));
        assert!(!drive.mounted);
        assert!(drive.set_mounted("/org/freedesktop/UDisks2/block_devices/sdb1"));
        assert!(drive.mounted);
    }
}
