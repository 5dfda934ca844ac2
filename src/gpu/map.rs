//! Insertion-ordered `key → Device` map.
//!
//! Label resolution picks among same-named devices by position, so the
//! map must iterate in the order devices were first detected.

use indexmap::IndexMap;

use crate::gpu::device::Device;

/// Canonical device map, in detection order.
pub type DeviceMap = IndexMap<String, Device>;

/// Move the entry under `old` to `new`, keeping its position.
///
/// Fails when `old` is absent or `new` is already taken.
pub fn rekey(map: &mut DeviceMap, old: &str, new: String) -> bool {
    if map.contains_key(&new) {
        return false;
    }
    let Some((index, _, device)) = map.shift_remove_full(old) else {
        return false;
    };
    map.shift_insert(index, new, device);
    true
}
