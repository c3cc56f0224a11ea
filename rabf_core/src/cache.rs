use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Identity of one decompressed block in a process-wide cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockKey {
    pub file_id: u64,
    pub block: u64,
}

/// Process-wide cache of decompressed blocks, shared by cache-backed readers
/// of many files.
///
/// Implementations synchronize internally; readers call `get`/`put` through
/// a shared handle from multiple threads. A cache only qualifies for a file
/// whose block size equals `block_size()` — the reader factory checks this
/// and falls back to buffered reads on a mismatch.
pub trait BlockCache: Send + Sync {
    fn get(&self, key: &BlockKey) -> Option<Arc<[u8]>>;

    fn put(&self, key: BlockKey, block: Arc<[u8]>);

    fn block_size(&self) -> u64;
}

/// Bundled LRU block cache.
///
/// HashMap for lookup plus a VecDeque recording recency; `get` promotes to
/// the MRU end, `put` evicts from the LRU end once over capacity. The linear
/// scan in `promote` is fine for the tens-of-blocks capacities this is used
/// with.
pub struct LruBlockCache {
    inner: Mutex<LruInner>,
    block_size: u64,
}

struct LruInner {
    blocks: HashMap<BlockKey, Arc<[u8]>>,
    order: VecDeque<BlockKey>,
    capacity: usize,
}

impl LruBlockCache {
    pub fn new(block_size: u64, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruInner {
                blocks: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
                capacity: capacity.max(1),
            }),
            block_size,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LruInner {
    fn promote(&mut self, key: &BlockKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
            self.order.push_back(*key);
        }
    }
}

impl BlockCache for LruBlockCache {
    fn get(&self, key: &BlockKey) -> Option<Arc<[u8]>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.blocks.contains_key(key) {
            inner.promote(key);
            inner.blocks.get(key).map(Arc::clone)
        } else {
            None
        }
    }

    fn put(&self, key: BlockKey, block: Arc<[u8]>) {
        let mut inner = self.inner.lock().unwrap();
        if inner.blocks.insert(key, block).is_some() {
            inner.promote(&key);
            return;
        }
        inner.order.push_back(key);
        while inner.blocks.len() > inner.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.blocks.remove(&evicted);
            } else {
                break;
            }
        }
    }

    fn block_size(&self) -> u64 {
        self.block_size
    }
}
