//! Fixture builders shared by the unit tests.

use dbus::arg::{RefArg, Variant};
use dbus::Path;

use crate::drive::Drive;
use crate::event::Event;
use crate::{
    InterfacesAndProperties, VariantMap, BLOCK_IFACE, DRIVE_IFACE, FILESYSTEM_IFACE,
};

pub(crate) fn vbool(value: bool) -> Variant<Box<dyn RefArg>> {
    Variant(Box::new(value))
}

pub(crate) fn vstr(value: &str) -> Variant<Box<dyn RefArg>> {
    Variant(Box::new(value.to_owned()))
}

pub(crate) fn vstrs(values: &[&str]) -> Variant<Box<dyn RefArg>> {
    Variant(Box::new(
        values.iter().map(|v| (*v).to_owned()).collect::<Vec<String>>(),
    ))
}

pub(crate) fn vpath(value: &str) -> Variant<Box<dyn RefArg>> {
    Variant(Box::new(Path::from(value.to_owned())))
}

pub(crate) fn vpaths(values: &[&str]) -> Variant<Box<dyn RefArg>> {
    Variant(Box::new(
        values
            .iter()
            .map(|v| Path::from((*v).to_owned()))
            .collect::<Vec<Path<'static>>>(),
    ))
}

pub(crate) fn vbyte_arrays(values: &[&str]) -> Variant<Box<dyn RefArg>> {
    Variant(Box::new(
        values
            .iter()
            .map(|v| v.as_bytes().to_vec())
            .collect::<Vec<Vec<u8>>>(),
    ))
}

/// An addition event for a removable drive (`Removable = true`).
pub(crate) fn drive_event(path: &str) -> Event {
    let mut props = VariantMap::new();
    props.insert("Removable".to_owned(), vbool(true));
    props.insert("MediaRemovable".to_owned(), vbool(false));
    drive_event_with(path, props)
}

pub(crate) fn drive_event_with(path: &str, drive_props: VariantMap) -> Event {
    let mut props = InterfacesAndProperties::new();
    props.insert(DRIVE_IFACE.to_owned(), drive_props);
    Event::added(path.to_owned().into(), props)
}

/// An unmounted vfat block event referencing `drive_path`, carrying the
/// `Block` and `Filesystem` interfaces.
pub(crate) fn block_event(path: &str, drive_path: &str) -> Event {
    block_event_with(path, drive_path, &[], |_| {})
}

/// A mounted variant of [`block_event`].
pub(crate) fn mounted_block_event(path: &str, drive_path: &str, mountpoint: &str) -> Event {
    let terminated = format!("{mountpoint}\0");
    block_event_with(path, drive_path, &[&terminated], |_| {})
}

/// Builds a block event and lets the caller tweak the `Block` interface
/// properties before it is sealed.
pub(crate) fn block_event_with(
    path: &str,
    drive_path: &str,
    mountpoints: &[&str],
    tweak: impl FnOnce(&mut VariantMap),
) -> Event {
    let mut block = VariantMap::new();
    block.insert("Drive".to_owned(), vpath(drive_path));
    block.insert("IdType".to_owned(), vstr("vfat"));
    block.insert("HintIgnore".to_owned(), vbool(false));
    block.insert("HintSystem".to_owned(), vbool(false));
    tweak(&mut block);

    let mut filesystem = VariantMap::new();
    filesystem.insert("MountPoints".to_owned(), vbyte_arrays(mountpoints));

    let mut props = InterfacesAndProperties::new();
    props.insert(BLOCK_IFACE.to_owned(), block);
    props.insert(FILESYSTEM_IFACE.to_owned(), filesystem);
    Event::added(path.to_owned().into(), props)
}

pub(crate) fn empty_drive(path: &str) -> Drive {
    Drive {
        path: path.to_owned().into(),
        block_devices: std::collections::HashMap::new(),
        drive_info: InterfacesAndProperties::new(),
        mounted: false,
    }
}
