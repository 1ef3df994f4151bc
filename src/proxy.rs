use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::codec::EncodedKey;

/// Total number of `RecordProxy` comparisons performed by the tournament
/// since process start, exposed for `--diagnostics`-style reporting (an
/// out-of-scope concern; the counter itself is core per §4.2).
static COMPARISON_COUNT: AtomicU64 = AtomicU64::new(0);

pub fn comparison_count() -> u64 {
    COMPARISON_COUNT.load(AtomicOrdering::Relaxed)
}

/// Fixed-shape handle the tournament actually moves around: the encoded
/// key (so comparisons never touch the original record bytes), plus
/// enough bookkeeping to recover the record itself from whichever segment
/// produced it, and to break ties the way the duplicate-disposition policy
/// requires.
///
/// `ordinal`'s sign carries the tie-break direction: when two proxies
/// compare equal on `key`, the tournament falls back to comparing
/// `ordinal`, and whoever acquires the proxy flips its sign when the
/// active `DuplicateDisposition` requires it (see
/// `DuplicateDisposition::negates_ordinal` in `dedup.rs`) rather than
/// threading a separate comparator through the tree.
#[derive(Clone, Debug)]
pub struct RecordProxy {
    pub key: EncodedKey,
    pub size: u32,
    pub position: u64,
    pub source_index: u32,
    pub ordinal: i64,
}

impl RecordProxy {
    pub fn new(key: EncodedKey, size: u32, position: u64, source_index: u32, ordinal: i64) -> Self {
        RecordProxy {
            key,
            size,
            position,
            source_index,
            ordinal,
        }
    }
}

impl PartialEq for RecordProxy {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.ordinal == other.ordinal
    }
}
impl Eq for RecordProxy {}

impl PartialOrd for RecordProxy {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RecordProxy {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        COMPARISON_COUNT.fetch_add(1, AtomicOrdering::Relaxed);
        self.key.cmp(&other.key).then(self.ordinal.cmp(&other.ordinal))
    }
}

/// Free-list allocator for `RecordProxy` slots. The tournament tree holds
/// `node_count()` proxies live at any one time; churn is return-then-take,
/// never grow-without-bound, so a plain `Vec`-backed free list avoids an
/// allocation per record without needing a general-purpose pool crate.
#[derive(Default)]
pub struct ProxyPool {
    free: Vec<RecordProxy>,
}

impl ProxyPool {
    pub fn new() -> Self {
        ProxyPool { free: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        ProxyPool {
            free: Vec::with_capacity(cap),
        }
    }

    /// Take a proxy from the free list if one is available, otherwise
    /// build a fresh one. Either way the caller gets an owned `RecordProxy`
    /// initialized to the given fields.
    pub fn take(
        &mut self,
        key: EncodedKey,
        size: u32,
        position: u64,
        source_index: u32,
        ordinal: i64,
    ) -> RecordProxy {
        match self.free.pop() {
            Some(mut proxy) => {
                proxy.key = key;
                proxy.size = size;
                proxy.position = position;
                proxy.source_index = source_index;
                proxy.ordinal = ordinal;
                proxy
            }
            None => RecordProxy::new(key, size, position, source_index, ordinal),
        }
    }

    /// Return a proxy to the pool once the tournament has emitted it and
    /// its record bytes have been copied to the output.
    pub fn release(&mut self, proxy: RecordProxy) {
        self.free.push(proxy);
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}
