//! Human-facing device labels.
//!
//! A label is the only identity the caller keeps between detection and
//! launch, so it has to round-trip back to a canonical key:
//!
//! ```text
//! "NVIDIA GeForce RTX 3090 (GPU 1)"  ⇄  name = "NVIDIA GeForce RTX 3090", index = 1
//! "AMD Radeon RX 6800"               ⇄  name = "AMD Radeon RX 6800",      index = none
//! ```

use tracing::{debug, warn};

use crate::gpu::device::Device;
use crate::gpu::map::DeviceMap;

const LABEL_MARKER: &str = " (GPU ";

/// Extract the bus number of a PCI address as a device ordinal.
///
/// `"00000000:0A:00.0"` → 10. Anything unparseable yields 0.
pub fn index_from_pci_bus_id(pci_bus_id: &str) -> u32 {
    let Some(bus) = pci_bus_id.split(':').nth(1) else {
        if !pci_bus_id.is_empty() {
            warn!(pci_bus_id, "PCI bus id has no bus field, using ordinal 0");
        }
        return 0;
    };

    match u32::from_str_radix(bus.trim(), 16) {
        Ok(ordinal) => ordinal,
        Err(e) => {
            warn!(pci_bus_id, error = %e, "Cannot parse PCI bus field, using ordinal 0");
            0
        }
    }
}

/// Render the label for a device. Only devices with a bus id get an index.
pub fn display_label(device: &Device, index: u32) -> String {
    if device.bus_id().is_some() {
        format!("{}{LABEL_MARKER}{index})", device.name)
    } else {
        device.name.clone()
    }
}

/// Split a label into `(name, index)`.
pub fn parse_display_label(label: &str) -> (String, Option<usize>) {
    let parsed = label
        .strip_suffix(')')
        .and_then(|rest| rest.rsplit_once(LABEL_MARKER))
        .and_then(|(name, digits)| {
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse::<usize>().ok().map(|index| (name.to_string(), index))
        });

    match parsed {
        Some((name, index)) => (name, Some(index)),
        None => (label.to_string(), None),
    }
}

/// Find the canonical key a label refers to.
///
/// A label that is itself a key wins. Otherwise devices are matched by name
/// in detection order and the parsed index picks among them, falling back to
/// the first match. Same-named devices without bus ids can only be told
/// apart by that position.
pub fn resolve_key(label: &str, devices: &DeviceMap) -> Option<String> {
    if devices.contains_key(label) {
        return Some(label.to_string());
    }

    let (name, index) = parse_display_label(label);
    let matches: Vec<&str> = devices
        .iter()
        .filter(|(_, d)| d.name == name)
        .map(|(k, _)| k.as_str())
        .collect();

    let key = match index {
        Some(i) if i < matches.len() => matches[i],
        _ => *matches.first()?,
    };
    debug!(label, key, candidates = matches.len(), "Resolved device label");
    Some(key.to_string())
}

/// True when `target` occurs in the name part of `label`.
pub fn matches_name(label: &str, target: &str) -> bool {
    let (name, _) = parse_display_label(label);
    name.contains(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::device::{Vendor, GIB};

    fn rtx(bus: &str) -> Device {
        Device::new("NVIDIA GeForce RTX 3090", Vendor::Nvidia, 24 * GIB).with_pci_bus_id(bus)
    }

    #[test]
    fn test_index_from_pci_bus_id() {
        assert_eq!(index_from_pci_bus_id("00000000:01:00.0"), 1);
        assert_eq!(index_from_pci_bus_id("0000:0A:00.0"), 10);
        assert_eq!(index_from_pci_bus_id("0000:ff:00.0"), 255);
    }

    #[test]
    fn test_index_from_pci_bus_id_is_total() {
        for input in ["", ":", "garbage", "0000:zz:00.0", "0000::00.0", "::::", "0000:-1:00.0"] {
            assert_eq!(index_from_pci_bus_id(input), 0, "input {input:?}");
        }
    }

    #[test]
    fn test_display_label() {
        assert_eq!(display_label(&rtx("00000000:01:00.0"), 1), "NVIDIA GeForce RTX 3090 (GPU 1)");

        let bare = Device::new("AMD Radeon RX 6800", Vendor::Amd, 16 * GIB);
        assert_eq!(display_label(&bare, 3), "AMD Radeon RX 6800");
    }

    #[test]
    fn test_label_round_trip() {
        let dev = rtx("00000000:02:00.0");
        for i in [0, 2, 17, 255] {
            let label = display_label(&dev, i);
            assert_eq!(parse_display_label(&label), (dev.name.clone(), Some(i as usize)));
        }
    }

    #[test]
    fn test_parse_rejects_near_misses() {
        for label in [
            "RTX (GPU x)",
            "RTX (GPU )",
            "RTX (GPU 1",
            "RTX (GPU -1)",
            "RTX GPU 1)",
            "plain name",
        ] {
            assert_eq!(parse_display_label(label), (label.to_string(), None), "label {label:?}");
        }
    }

    #[test]
    fn test_resolve_key_order() {
        let mut map = DeviceMap::new();
        let a = rtx("00000000:01:00.0");
        let b = rtx("00000000:02:00.0");
        map.insert(a.key(), a);
        map.insert(b.key(), b);

        // Key itself.
        assert_eq!(resolve_key("00000000:02:00.0", &map).as_deref(), Some("00000000:02:00.0"));
        // Index picks among same-named matches.
        assert_eq!(
            resolve_key("NVIDIA GeForce RTX 3090 (GPU 1)", &map).as_deref(),
            Some("00000000:02:00.0")
        );
        // Out-of-range index falls back to the first match.
        assert_eq!(
            resolve_key("NVIDIA GeForce RTX 3090 (GPU 7)", &map).as_deref(),
            Some("00000000:01:00.0")
        );
        // Bare name resolves to the first match.
        assert_eq!(
            resolve_key("NVIDIA GeForce RTX 3090", &map).as_deref(),
            Some("00000000:01:00.0")
        );
        assert_eq!(resolve_key("Phantom GPU", &map), None);
    }

    #[test]
    fn test_matches_name() {
        assert!(matches_name("NVIDIA GeForce RTX 3090 (GPU 1)", "RTX 3090"));
        assert!(!matches_name("NVIDIA GeForce RTX 3090 (GPU 1)", "GPU 1"));
    }
}
