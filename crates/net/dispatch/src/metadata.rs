//! Bounded per-peer metadata store.

use std::collections::HashMap;

use hashlink::LruCache;
use parking_lot::Mutex;
use weft_primitives::PeerId;

use crate::PeerMetadata;

/// Default number of peers whose metadata is retained.
pub const DEFAULT_METADATA_PEERS: usize = 4096;

/// Metadata keyed by peer.
///
/// Peers with a live connection are [pinned](Self::pin) and never evicted.
/// Once the last connection is released the entry moves into a bounded LRU, so
/// a disconnection processed after the network layer forgot the peer can
/// still be classified.
#[derive(Debug)]
pub struct MetadataStore {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    /// Peers with live connections: connection count and entries.
    live: HashMap<PeerId, (usize, Entries)>,
    /// Disconnected peers, least recently used evicted first.
    retained: LruCache<PeerId, Entries>,
}

type Entries = HashMap<String, String>;

impl Default for MetadataStore {
    fn default() -> Self {
        Self::new(DEFAULT_METADATA_PEERS)
    }
}

impl MetadataStore {
    /// `max_peers` bounds the disconnected peers retained; pinned peers are
    /// not counted against it.
    pub fn new(max_peers: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                live: HashMap::new(),
                retained: LruCache::new(max_peers.max(1)),
            }),
        }
    }

    /// Record `value` under `key` for `peer`.
    pub fn set(&self, peer: PeerId, key: impl Into<String>, value: impl Into<String>) {
        let mut inner = self.inner.lock();
        if let Some((_, entries)) = inner.live.get_mut(&peer) {
            entries.insert(key.into(), value.into());
            return;
        }

        match inner.retained.get_mut(&peer) {
            Some(entries) => {
                entries.insert(key.into(), value.into());
            }
            None => {
                inner
                    .retained
                    .insert(peer, HashMap::from([(key.into(), value.into())]));
            }
        }
    }

    /// Keep the entries of `peer` for one more live connection.
    pub fn pin(&self, peer: PeerId) {
        let mut inner = self.inner.lock();
        if let Some((connections, _)) = inner.live.get_mut(&peer) {
            *connections += 1;
            return;
        }

        let entries = inner.retained.remove(&peer).unwrap_or_default();
        inner.live.insert(peer, (1, entries));
    }

    /// Release one live connection of `peer`. After the last one the entries
    /// become eligible for eviction.
    pub fn unpin(&self, peer: &PeerId) {
        let mut inner = self.inner.lock();
        let Some((connections, _)) = inner.live.get_mut(peer) else {
            return;
        };

        *connections -= 1;
        if *connections > 0 {
            return;
        }
        if let Some((_, entries)) = inner.live.remove(peer) {
            inner.retained.insert(*peer, entries);
        }
    }

    /// Number of peers with metadata, pinned or retained.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock();
        inner.live.len() + inner.retained.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PeerMetadata for MetadataStore {
    fn get(&self, peer: &PeerId, key: &str) -> Option<String> {
        let mut inner = self.inner.lock();
        if let Some((_, entries)) = inner.live.get(peer) {
            return entries.get(key).cloned();
        }
        inner.retained.get(peer)?.get(key).cloned()
    }
}
