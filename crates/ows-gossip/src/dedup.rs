//! Bounded recent-gossip dedup.

use std::collections::{HashSet, VecDeque};

use ows_codec::blake2b128;

const CAPACITY: usize = 100;

/// A bounded FIFO of recently seen gossip digests. Lets a node drop
/// duplicate re-broadcasts of the same payload without forwarding them
/// again, while bounding memory to the last [`CAPACITY`] entries.
#[derive(Debug, Default)]
pub struct GossipDedup {
    order: VecDeque<[u8; 16]>,
    seen: HashSet<[u8; 16]>,
}

impl GossipDedup {
    /// Builds an empty dedup window.
    #[must_use]
    pub fn new() -> Self {
        Self { order: VecDeque::with_capacity(CAPACITY), seen: HashSet::with_capacity(CAPACITY) }
    }

    /// Records the digest of `raw_bytes` and returns `true` if it had not
    /// been seen before (the caller should process and forward it), or
    /// `false` if it is a duplicate within the current window (the
    /// caller should drop it silently).
    pub fn insert_if_new(&mut self, raw_bytes: &[u8]) -> bool {
        let digest = blake2b128(raw_bytes);
        if self.seen.contains(&digest) {
            return false;
        }
        if self.order.len() >= CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(digest);
        self.seen.insert(digest);
        true
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn first_sighting_is_new_second_is_duplicate() {
        let mut dedup = GossipDedup::new();
        assert!(dedup.insert_if_new(b"payload-a"));
        assert!(!dedup.insert_if_new(b"payload-a"));
    }

    #[test]
    fn distinct_payloads_are_each_new() {
        let mut dedup = GossipDedup::new();
        assert!(dedup.insert_if_new(b"payload-a"));
        assert!(dedup.insert_if_new(b"payload-b"));
    }

    #[test]
    fn window_evicts_oldest_entry_past_capacity() {
        let mut dedup = GossipDedup::new();
        for i in 0..CAPACITY {
            assert!(dedup.insert_if_new(format!("payload-{i}").as_bytes()));
        }
        // The window is now full; a fresh payload evicts "payload-0",
        // which should then be treated as new again.
        assert!(dedup.insert_if_new(b"payload-new"));
        assert!(dedup.insert_if_new(b"payload-0"));
    }
}
