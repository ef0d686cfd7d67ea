//! Class-of-service registry
//!
//! Owns every class: its name, dispatch queue, and buffer pool binding.
//! Lookups on the packet path are lock-free reads; creation and destroy
//! are registry-internal writes that the engine serializes.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use steer_common::{ClassId, PoolId, SteerError, SteerResult, DEFAULT_POOL};

use crate::queue::DispatchQueue;

/// Optional knobs for class creation
#[derive(Debug, Clone, Default)]
pub struct CosParams {
    /// Bound for the class's dispatch queue; `None` means unbounded
    pub queue_capacity: Option<usize>,
    /// Buffer pool the class draws from; `None` means the default pool
    pub pool: Option<PoolId>,
}

#[derive(Debug)]
struct CosEntry {
    name: String,
    queue: Arc<DispatchQueue>,
    pool: PoolId,
    /// Rules and interface bindings pointing at this class
    refs: AtomicUsize,
    /// Whether destroy should close the queue
    owns_queue: bool,
}

/// Registry of classes of service
///
/// Class ids are monotonic and never reused; a stale id after destroy
/// fails with [`SteerError::InvalidClass`] instead of aliasing.
#[derive(Debug)]
pub struct CosRegistry {
    by_id: DashMap<ClassId, CosEntry>,
    by_name: DashMap<String, ClassId>,
    next_id: AtomicU32,
    default_pool: PoolId,
}

impl CosRegistry {
    /// Empty registry with the default buffer pool
    pub fn new() -> Self {
        Self::with_default_pool(DEFAULT_POOL)
    }

    /// Empty registry; classes without an explicit pool bind to `pool`
    pub fn with_default_pool(pool: PoolId) -> Self {
        Self {
            by_id: DashMap::new(),
            by_name: DashMap::new(),
            next_id: AtomicU32::new(0),
            default_pool: pool,
        }
    }

    /// Create a class with an owned unbounded queue
    pub fn create_class(&self, name: &str) -> SteerResult<ClassId> {
        self.create_class_with(name, CosParams::default())
    }

    /// Create a class with explicit queue and pool parameters
    pub fn create_class_with(&self, name: &str, params: CosParams) -> SteerResult<ClassId> {
        let queue = Arc::new(match params.queue_capacity {
            Some(cap) => DispatchQueue::bounded(cap),
            None => DispatchQueue::unbounded(),
        });
        self.insert_class(name, queue, params.pool, true)
    }

    /// Create a class dispatching into an existing queue
    ///
    /// The registry does not take ownership: destroying the class leaves
    /// the queue open for its other users.
    pub fn create_class_with_queue(
        &self,
        name: &str,
        queue: Arc<DispatchQueue>,
    ) -> SteerResult<ClassId> {
        self.insert_class(name, queue, None, false)
    }

    fn insert_class(
        &self,
        name: &str,
        queue: Arc<DispatchQueue>,
        pool: Option<PoolId>,
        owns_queue: bool,
    ) -> SteerResult<ClassId> {
        match self.by_name.entry(name.to_string()) {
            Entry::Occupied(_) => Err(SteerError::DuplicateName(name.to_string())),
            Entry::Vacant(slot) => {
                let id = ClassId(self.next_id.fetch_add(1, Ordering::Relaxed));
                self.by_id.insert(
                    id,
                    CosEntry {
                        name: name.to_string(),
                        queue,
                        pool: pool.unwrap_or(self.default_pool),
                        refs: AtomicUsize::new(0),
                        owns_queue,
                    },
                );
                slot.insert(id);
                tracing::debug!("created class {} ({})", name, id);
                Ok(id)
            }
        }
    }

    /// Resolve a class name to its id
    pub fn lookup(&self, name: &str) -> SteerResult<ClassId> {
        self.by_name
            .get(name)
            .map(|id| *id)
            .ok_or_else(|| SteerError::NotFound(format!("class {name}")))
    }

    /// Name of a live class
    pub fn name_of(&self, id: ClassId) -> SteerResult<String> {
        self.by_id
            .get(&id)
            .map(|entry| entry.name.clone())
            .ok_or(SteerError::InvalidClass(id))
    }

    /// Dispatch queue of a live class
    #[inline]
    pub fn queue_of(&self, id: ClassId) -> SteerResult<Arc<DispatchQueue>> {
        self.by_id
            .get(&id)
            .map(|entry| Arc::clone(&entry.queue))
            .ok_or(SteerError::InvalidClass(id))
    }

    /// Buffer pool bound to a live class
    pub fn pool_of(&self, id: ClassId) -> SteerResult<PoolId> {
        self.by_id
            .get(&id)
            .map(|entry| entry.pool)
            .ok_or(SteerError::InvalidClass(id))
    }

    /// Whether `id` refers to a live class
    pub fn contains(&self, id: ClassId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Record one rule or binding reference to the class
    pub(crate) fn retain(&self, id: ClassId) -> SteerResult<()> {
        let entry = self.by_id.get(&id).ok_or(SteerError::InvalidClass(id))?;
        entry.refs.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Drop one reference; a no-op for an already-destroyed class
    pub(crate) fn release(&self, id: ClassId) {
        if let Some(entry) = self.by_id.get(&id) {
            entry.refs.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Destroy a class
    ///
    /// Refused with [`SteerError::InUse`] while rules or interface
    /// bindings still reference it. An owned queue is closed, waking any
    /// blocked consumers; a shared queue is left open.
    pub fn destroy_class(&self, id: ClassId) -> SteerResult<()> {
        {
            let entry = self.by_id.get(&id).ok_or(SteerError::InvalidClass(id))?;
            let refs = entry.refs.load(Ordering::Acquire);
            if refs > 0 {
                return Err(SteerError::InUse {
                    name: entry.name.clone(),
                    refs,
                });
            }
        }
        if let Some((_, entry)) = self.by_id.remove(&id) {
            self.by_name.remove(&entry.name);
            if entry.owns_queue {
                entry.queue.close();
            }
            tracing::debug!("destroyed class {} ({})", entry.name, id);
        }
        Ok(())
    }

    /// Close every class's queue, waking all blocked consumers
    ///
    /// Part of engine shutdown. Closing is idempotent, so queues shared
    /// between classes are fine.
    pub fn close_all(&self) {
        for entry in self.by_id.iter() {
            entry.queue.close();
        }
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True when no classes are registered
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl Default for CosRegistry {
    fn default() -> Self {
        Self::new()
    }
}
