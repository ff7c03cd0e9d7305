//! ARP cache and pending-request queue. A target IP is in exactly one of
//! the two maps at a time: resolved (cache) or awaiting a reply (pending),
//! with the reply handler moving it from the latter to the former.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use super::wire::MacAddr;

const ENTRY_TTL: Duration = Duration::from_secs(60);

pub const RETRY_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_RETRIES: u32 = 5;

struct CacheEntry {
    mac: MacAddr,
    inserted_at: Instant,
}

#[derive(Default)]
pub struct ArpCache {
    entries: HashMap<Ipv4Addr, CacheEntry>,
}

impl ArpCache {
    pub fn new() -> Self {
        ArpCache { entries: HashMap::new() }
    }

    pub fn insert(&mut self, ip: Ipv4Addr, mac: MacAddr) {
        self.entries.insert(ip, CacheEntry { mac, inserted_at: Instant::now() });
    }

    /// Live lookup: an entry older than `ENTRY_TTL` is treated as absent
    /// and evicted.
    pub fn lookup(&mut self, ip: Ipv4Addr) -> Option<MacAddr> {
        match self.entries.get(&ip) {
            Some(e) if e.inserted_at.elapsed() < ENTRY_TTL => Some(e.mac),
            Some(_) => {
                self.entries.remove(&ip);
                None
            }
            None => None,
        }
    }
}

/// A frame withheld while `target` is being ARP-resolved: the deep-copied
/// raw Ethernet frame bytes plus the outbound interface they'll be sent on.
pub struct WithheldFrame {
    pub bytes: Vec<u8>,
    pub iface: String,
}

pub struct PendingEntry {
    pub withheld: Vec<WithheldFrame>,
    pub iface: String,
    pub sent_at: Instant,
    pub retries: u32,
}

/// Per-target-IP queue of frames withheld awaiting an ARP reply. At most
/// one entry per target IP; `insert` appends to an existing entry's
/// withheld list instead of creating a second one.
#[derive(Default)]
pub struct PendingArpQueue {
    entries: HashMap<Ipv4Addr, PendingEntry>,
}

impl PendingArpQueue {
    pub fn new() -> Self {
        PendingArpQueue { entries: HashMap::new() }
    }

    /// Withhold `frame` for `target`, creating a fresh pending entry (and
    /// thus triggering a new ARP request) if none exists yet. Returns
    /// `true` when a request should be (re-)sent for `target`.
    pub fn enqueue(&mut self, target: Ipv4Addr, iface: String, frame: Vec<u8>) -> bool {
        if let Some(entry) = self.entries.get_mut(&target) {
            entry.withheld.push(WithheldFrame { bytes: frame, iface });
            false
        } else {
            self.entries.insert(
                target,
                PendingEntry {
                    withheld: vec![WithheldFrame { bytes: frame, iface: iface.clone() }],
                    iface,
                    sent_at: Instant::now(),
                    retries: 0,
                },
            );
            true
        }
    }

    pub fn take(&mut self, target: Ipv4Addr) -> Option<PendingEntry> {
        self.entries.remove(&target)
    }

    /// Targets whose pending entry has waited past `RETRY_INTERVAL` since
    /// its last send, for the retry sweep to act on.
    pub fn due_for_retry(&self) -> Vec<Ipv4Addr> {
        self.entries
            .iter()
            .filter(|(_, e)| e.sent_at.elapsed() >= RETRY_INTERVAL)
            .map(|(ip, _)| *ip)
            .collect()
    }

    pub fn mark_retried(&mut self, target: Ipv4Addr) -> Option<u32> {
        let entry = self.entries.get_mut(&target)?;
        entry.retries += 1;
        entry.sent_at = Instant::now();
        Some(entry.retries)
    }

    pub fn iface_for(&self, target: Ipv4Addr) -> Option<String> {
        self.entries.get(&target).map(|e| e.iface.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_roundtrip() {
        let mut cache = ArpCache::new();
        let ip = Ipv4Addr::new(10, 0, 0, 1);
        assert!(cache.lookup(ip).is_none());
        cache.insert(ip, [1, 2, 3, 4, 5, 6]);
        assert_eq!(cache.lookup(ip), Some([1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn pending_queue_single_entry_per_target() {
        let mut queue = PendingArpQueue::new();
        let ip = Ipv4Addr::new(10, 0, 0, 2);
        assert!(queue.enqueue(ip, "eth0".into(), vec![1]));
        assert!(!queue.enqueue(ip, "eth0".into(), vec![2]));

        let entry = queue.take(ip).unwrap();
        assert_eq!(entry.withheld.len(), 2);
    }
}
