//! Minimal little-endian encoding of an action index.
//!
//! Resource ids are derived from `blake2b128(prev_change_set_bytes ||
//! le_index(action_index))`. The index is encoded as the shortest
//! little-endian byte string that represents it, with at least one byte
//! (so index 0 encodes as `[0x00]`, not the empty string).

/// Encodes `index` as the shortest little-endian byte sequence, at least
/// one byte long.
#[must_use]
pub fn encode_action_index(index: u64) -> Vec<u8> {
    if index == 0 {
        return vec![0];
    }
    let mut bytes = index.to_le_bytes().to_vec();
    while bytes.len() > 1 && *bytes.last().expect("non-empty") == 0 {
        bytes.pop();
    }
    bytes
}
