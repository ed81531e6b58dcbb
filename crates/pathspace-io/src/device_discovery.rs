// SPDX-License-Identifier: Apache-2.0
//! Device discovery: a read-only sink serving textual listings of
//! registered device classes, ids, metadata, and capabilities.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use pathspace_core::{Context, Error, InsertReturn, Layer, LayerValue, Out, OutSlot};

#[derive(Debug, Default, Clone)]
struct DeviceInfo {
    meta: Vec<(String, String)>,
    capabilities: Vec<String>,
}

/// Normalizes a device class name using the canonical synonym map
/// (`mouse`→`mice`, `keyboard`→`keyboards`, `gamepad`→`gamepads`,
/// `touchscreen`→`touch`); any other class is lowercased and passed through.
#[must_use]
pub fn normalize_class(class: &str) -> String {
    match class {
        "mouse" => "mice".to_string(),
        "keyboard" => "keyboards".to_string(),
        "gamepad" => "gamepads".to_string(),
        "touchscreen" => "touch".to_string(),
        other => other.to_lowercase(),
    }
}

/// A mountable, read-only device discovery sink.
///
/// Devices are registered through [`DeviceDiscovery::register_device`] and
/// friends, not through `insert` (which this layer rejects outright).
#[derive(Default)]
pub struct DeviceDiscovery {
    classes: Mutex<BTreeMap<String, BTreeMap<String, DeviceInfo>>>,
}

impl DeviceDiscovery {
    /// Creates a discovery sink with no registered devices.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `device_id` under `class` (normalized), creating the class
    /// if this is its first device.
    pub fn register_device(&self, class: &str, device_id: &str) {
        self.classes
            .lock()
            .entry(normalize_class(class))
            .or_default()
            .entry(device_id.to_string())
            .or_default();
    }

    /// Sets a `key=value` metadata entry for a registered device.
    ///
    /// `key` and `value` must not themselves contain `=` or a newline; this
    /// is a documented caller responsibility, not validated here (matching
    /// the original provider's unescaped `key=value` line format).
    pub fn set_meta(&self, class: &str, device_id: &str, key: &str, value: &str) {
        if let Some(device) = self.classes.lock().entry(normalize_class(class)).or_default().get_mut(device_id)
        {
            device.meta.retain(|(k, _)| k != key);
            device.meta.push((key.to_string(), value.to_string()));
        }
    }

    /// Adds a capability name to a registered device's capability list.
    pub fn add_capability(&self, class: &str, device_id: &str, capability: &str) {
        if let Some(device) = self.classes.lock().entry(normalize_class(class)).or_default().get_mut(device_id)
        {
            device.capabilities.push(capability.to_string());
        }
    }

    fn list(&self, tail: &str) -> Result<String, Error> {
        let parts: Vec<&str> = tail.trim_start_matches('/').split('/').filter(|s| !s.is_empty()).collect();
        let classes = self.classes.lock();
        match parts.as_slice() {
            [] => Ok(classes.keys().cloned().collect::<Vec<_>>().join("\n")),
            [class] => {
                let normalized = normalize_class(class);
                let devices = classes.get(&normalized).ok_or(Error::NoObjectFound)?;
                Ok(devices.keys().cloned().collect::<Vec<_>>().join("\n"))
            }
            [class, id, "meta"] => {
                let normalized = normalize_class(class);
                let device =
                    classes.get(&normalized).and_then(|devices| devices.get(*id)).ok_or(Error::NoObjectFound)?;
                Ok(device.meta.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("\n"))
            }
            [class, id, "capabilities"] => {
                let normalized = normalize_class(class);
                let device =
                    classes.get(&normalized).and_then(|devices| devices.get(*id)).ok_or(Error::NoObjectFound)?;
                Ok(device.capabilities.join("\n"))
            }
            _ => Err(Error::NoSuchPath(tail.to_string())),
        }
    }
}

impl Layer for DeviceDiscovery {
    fn insert(&self, tail: &str, _value: LayerValue) -> InsertReturn {
        let mut result = InsertReturn::new();
        result.errors.push((
            tail.to_string(),
            Error::InvalidPermissions("device discovery is read-only".to_string()),
        ));
        result
    }

    fn out(&self, tail: &str, _options: &Out, slot: &mut OutSlot<'_>) -> Option<Error> {
        match self.list(tail) {
            Ok(listing) => match slot.write(listing) {
                Ok(()) => None,
                Err(_) => Some(Error::TypeMismatch { expected: "String", found: "other" }),
            },
            Err(err) => Some(err),
        }
    }

    fn shutdown(&self) {
        tracing::info!("device discovery shut down");
    }

    fn adopt_context_and_prefix(&self, _context: Arc<Context>, _prefix: String) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_known_synonyms() {
        assert_eq!(normalize_class("mouse"), "mice");
        assert_eq!(normalize_class("keyboard"), "keyboards");
        assert_eq!(normalize_class("gamepad"), "gamepads");
        assert_eq!(normalize_class("touchscreen"), "touch");
    }

    #[test]
    fn unknown_class_passes_through_lowercased() {
        assert_eq!(normalize_class("Stylus"), "stylus");
    }

    #[test]
    fn lists_class_names_at_root() {
        let discovery = DeviceDiscovery::new();
        discovery.register_device("mouse", "0");
        discovery.register_device("keyboard", "0");
        let mut slot: Option<String> = None;
        discovery.out("/", &Out::new(), &mut OutSlot::new(&mut slot));
        let listing = slot.unwrap();
        let mut lines: Vec<&str> = listing.lines().collect();
        lines.sort_unstable();
        assert_eq!(lines, vec!["keyboards", "mice"]);
    }

    #[test]
    fn lists_device_ids_under_class() {
        let discovery = DeviceDiscovery::new();
        discovery.register_device("mouse", "0");
        discovery.register_device("mouse", "1");
        let mut slot: Option<String> = None;
        discovery.out("/mouse", &Out::new(), &mut OutSlot::new(&mut slot));
        assert_eq!(slot.unwrap(), "0\n1");
    }

    #[test]
    fn lists_meta_as_key_value_lines() {
        let discovery = DeviceDiscovery::new();
        discovery.register_device("mouse", "0");
        discovery.set_meta("mouse", "0", "vendor", "Acme");
        let mut slot: Option<String> = None;
        discovery.out("/mouse/0/meta", &Out::new(), &mut OutSlot::new(&mut slot));
        assert_eq!(slot.unwrap(), "vendor=Acme");
    }

    #[test]
    fn lists_capabilities() {
        let discovery = DeviceDiscovery::new();
        discovery.register_device("gamepad", "0");
        discovery.add_capability("gamepad", "0", "rumble");
        let mut slot: Option<String> = None;
        discovery.out("/gamepad/0/capabilities", &Out::new(), &mut OutSlot::new(&mut slot));
        assert_eq!(slot.unwrap(), "rumble");
    }

    #[test]
    fn unknown_class_listing_is_no_object_found() {
        let discovery = DeviceDiscovery::new();
        let mut slot: Option<String> = None;
        let err = discovery.out("/stylus", &Out::new(), &mut OutSlot::new(&mut slot));
        assert!(matches!(err, Some(Error::NoObjectFound)));
    }

    #[test]
    fn insert_is_rejected() {
        let discovery = DeviceDiscovery::new();
        let result = discovery.insert("/", LayerValue::new(1_i32));
        assert_eq!(result.nbr_values_inserted, 0);
    }
}
