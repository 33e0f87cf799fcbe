use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use lru::LruCache;
use parking_lot::Mutex;
use crate::core::error::Result;
use crate::query::ast::{BooleanOperator, QueryAst};

/// Cache of parsed and optimized trees, so repeated query text skips the front-end
pub struct QueryCache {
    cache: Mutex<LruCache<QueryKey, QueryAst>>,
    pub size_limit: usize,
    hit_count: AtomicUsize,
    miss_count: AtomicUsize,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct QueryKey {
    pub query: String,
    pub operator: BooleanOperator,
}

impl QueryCache {
    pub fn new(size_limit: usize) -> Self {
        let cap = NonZeroUsize::new(size_limit).unwrap_or(NonZeroUsize::MIN);
        QueryCache {
            cache: Mutex::new(LruCache::new(cap)),
            size_limit,
            hit_count: AtomicUsize::new(0),
            miss_count: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, key: &QueryKey) -> Option<QueryAst> {
        let mut cache = self.cache.lock();
        if let Some(ast) = cache.get(key) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            Some(ast.clone())
        } else {
            self.miss_count.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    pub fn put(&self, key: QueryKey, ast: QueryAst) {
        self.cache.lock().put(key, ast);
    }

    /// Cached tree for the key, compiling and caching it on a miss.
    /// Failures are not cached.
    pub fn get_or_compile<F>(&self, key: QueryKey, compile: F) -> Result<QueryAst>
    where
        F: FnOnce(&QueryKey) -> Result<QueryAst>,
    {
        if let Some(ast) = self.get(&key) {
            return Ok(ast);
        }
        let ast = compile(&key)?;
        self.put(key, ast.clone());
        Ok(ast)
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            size: self.cache.lock().len(),
            capacity: self.size_limit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hit_count: usize,
    pub miss_count: usize,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}
