use std::collections::HashMap;

use dbus::arg::{RefArg, Variant};

use crate::{InterfacesAndProperties, VariantMap};

pub(crate) fn get_bool(arg: &Variant<Box<dyn RefArg>>) -> bool {
    arg.0.as_u64().unwrap_or(0) != 0
}

pub(crate) fn get_string(arg: &Variant<Box<dyn RefArg>>) -> Option<String> {
    arg.0
        .as_str()
        .and_then(|x| if x.is_empty() { None } else { Some(x.to_owned()) })
}

pub(crate) fn get_string_array(arg: &Variant<Box<dyn RefArg>>) -> Vec<String> {
    arg.0
        .as_iter()
        .map(|items| {
            items
                .filter_map(|item| item.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Object-path arrays coerce through `as_str` the same way string arrays do.
pub(crate) fn get_path_array(arg: &Variant<Box<dyn RefArg>>) -> Vec<String> {
    get_string_array(arg)
}

/// Decodes a NUL-terminated byte array into a string, dropping the
/// terminator when present.
pub(crate) fn bytes_to_string(bytes: &[u8]) -> Option<String> {
    let mut bytes = bytes.to_vec();
    if bytes.last() == Some(&0) {
        bytes.pop();
    }
    String::from_utf8(bytes).ok()
}

fn string_from_iter<'a>(
    array: Option<Box<dyn Iterator<Item = &'a dyn RefArg> + 'a>>,
) -> Option<String> {
    array.and_then(|bytes| {
        let collected = bytes
            .filter_map(|byte| byte.as_u64().map(|x| x as u8))
            .collect::<Vec<u8>>();
        bytes_to_string(&collected)
    })
}

/// Reads an array-of-byte-arrays property (e.g. `Filesystem.MountPoints`)
/// into the decoded strings.
pub(crate) fn get_array_of_byte_arrays(arg: &Variant<Box<dyn RefArg>>) -> Vec<String> {
    arg.0
        .as_iter()
        .map(|items| {
            items
                .filter_map(|item| string_from_iter(item.as_iter()))
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn clone_variant(value: &Variant<Box<dyn RefArg>>) -> Variant<Box<dyn RefArg>> {
    Variant(value.0.box_clone())
}

pub(crate) fn clone_variant_map(map: &VariantMap) -> VariantMap {
    map.iter()
        .map(|(key, value)| (key.clone(), clone_variant(value)))
        .collect()
}

pub(crate) fn clone_props(props: &InterfacesAndProperties) -> InterfacesAndProperties {
    props
        .iter()
        .map(|(iface, map)| (iface.clone(), clone_variant_map(map)))
        .collect::<HashMap<_, _>>()
}

/// Returns a generator over the Fibonacci sequence starting from 1.
pub(crate) fn fibonacci() -> impl FnMut() -> u64 {
    let (mut a, mut b) = (1u64, 1u64);
    move || {
        let retval = a;
        let next = a + b;
        a = b;
        b = next;
        retval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{vbool, vbyte_arrays, vstr, vstrs};

    #[test]
    fn fibonacci_starts_from_one() {
        let mut fib = fibonacci();
        let head: Vec<u64> = (0..11).map(|_| fib()).collect();
        assert_eq!(head, [1, 1, 2, 3, 5, 8, 13, 21, 34, 55, 89]);
    }

    #[test]
    fn bytes_to_string_strips_trailing_nul() {
        assert_eq!(bytes_to_string(b"/media/x\0"), Some("/media/x".into()));
        assert_eq!(bytes_to_string(b"/media/x"), Some("/media/x".into()));
        assert_eq!(bytes_to_string(b""), Some(String::new()));
    }

    #[test]
    fn get_string_treats_empty_as_absent() {
        assert_eq!(get_string(&vstr("vfat")), Some("vfat".into()));
        assert_eq!(get_string(&vstr("")), None);
        assert_eq!(get_string(&vbool(true)), None);
    }

    #[test]
    fn get_bool_coerces_missing_to_false() {
        assert!(get_bool(&vbool(true)));
        assert!(!get_bool(&vbool(false)));
        assert!(!get_bool(&vstr("true")));
    }

    #[test]
    fn array_of_byte_arrays_decodes_each_mountpoint() {
        let arg = vbyte_arrays(&["/media/usb0\0", "/media/usb1\0"]);
        assert_eq!(
            get_array_of_byte_arrays(&arg),
            vec!["/media/usb0".to_owned(), "/media/usb1".to_owned()]
        );
        assert!(get_array_of_byte_arrays(&vbyte_arrays(&[])).is_empty());
    }

    #[test]
    fn string_arrays_skip_non_string_items() {
        assert_eq!(
            get_string_array(&vstrs(&["thumb", "flash_sd"])),
            vec!["thumb".to_owned(), "flash_sd".to_owned()]
        );
        assert!(get_string_array(&vbool(true)).is_empty());
    }
}
