//! Recycling pool for snapshot buffers
//!
//! Every [`Snapshot`](super::entry::Snapshot) owns its text through a
//! [`SharedBuffer`], a reference-counted handle over a pooled [`LogBuffer`].
//! Two resource classes are recycled independently:
//!
//! - **pool nodes**: the buffer storage itself
//! - **control slots**: the reference count plus the back-reference to the
//!   owning pool
//!
//! Each class sits on its own intrusive free list behind its own lock. When
//! the last handle drops, the node (cleared) and the slot are pushed back onto
//! their respective lists, so steady-state logging never touches the global
//! allocator.
//!
//! # Example
//!
//! ```
//! use ldgr::core::pool::{BufferFactory, BufferPool};
//!
//! let pool = BufferPool::new();
//! for _ in 0..100 {
//!     let mut buffer = pool.acquire();
//!     buffer.get_mut().unwrap().extend_from_slice(b"hello");
//! }
//! assert_eq!(pool.stats().nodes_allocated(), 1);
//! assert_eq!(pool.stats().slots_allocated(), 1);
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::atomic::{fence, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Bytes a [`LogBuffer`] holds before spilling to the heap.
pub const LOG_BUFFER_INLINE: usize = 1024;

/// Growable byte buffer with a fixed inline capacity.
pub type LogBuffer = SmallVec<[u8; LOG_BUFFER_INLINE]>;

const MAX_REFCOUNT: usize = isize::MAX as usize;

/// Source of buffers for the entry copy step.
pub trait BufferFactory: Send + Sync {
    fn acquire(&self) -> SharedBuffer;
}

/// Factory that allocates a fresh buffer per call and frees it on release.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapBufferFactory;

impl BufferFactory for HeapBufferFactory {
    fn acquire(&self) -> SharedBuffer {
        SharedBuffer::unpooled()
    }
}

trait Linked: Sized {
    fn next_mut(&mut self) -> &mut Option<Box<Self>>;
}

struct PoolNode {
    next: Option<Box<PoolNode>>,
    buffer: LogBuffer,
}

impl PoolNode {
    fn new() -> Self {
        Self {
            next: None,
            buffer: LogBuffer::new(),
        }
    }
}

impl Linked for PoolNode {
    fn next_mut(&mut self) -> &mut Option<Box<Self>> {
        &mut self.next
    }
}

struct ControlSlot {
    next: Option<Box<ControlSlot>>,
    refs: AtomicUsize,
    /// `None` for unpooled buffers and for slots parked on the free list.
    pool: Option<Arc<PoolShared>>,
}

impl ControlSlot {
    fn new() -> Self {
        Self {
            next: None,
            refs: AtomicUsize::new(0),
            pool: None,
        }
    }
}

impl Linked for ControlSlot {
    fn next_mut(&mut self) -> &mut Option<Box<Self>> {
        &mut self.next
    }
}

/// Intrusive singly-linked stack of boxed items.
struct FreeList<T: Linked> {
    head: Option<Box<T>>,
    len: usize,
}

impl<T: Linked> FreeList<T> {
    const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    fn pop(&mut self) -> Option<Box<T>> {
        let mut item = self.head.take()?;
        self.head = item.next_mut().take();
        self.len -= 1;
        Some(item)
    }

    /// Push `item`, or hand it back if the list already holds `cap` items.
    fn push(&mut self, mut item: Box<T>, cap: Option<usize>) -> Result<(), Box<T>> {
        if cap.is_some_and(|cap| self.len >= cap) {
            return Err(item);
        }
        *item.next_mut() = self.head.take();
        self.head = Some(item);
        self.len += 1;
        Ok(())
    }
}

impl<T: Linked> Drop for FreeList<T> {
    fn drop(&mut self) {
        // Unlink iteratively; the default recursive drop would overflow the
        // stack on long lists.
        while let Some(mut item) = self.head.take() {
            self.head = item.next_mut().take();
        }
    }
}

/// Retention limits for the free lists. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolLimits {
    #[serde(default)]
    pub max_free_nodes: Option<usize>,
    #[serde(default)]
    pub max_free_slots: Option<usize>,
}

/// Allocation and recycling counters for a [`BufferPool`].
#[derive(Debug, Default)]
pub struct PoolStats {
    nodes_allocated: AtomicU64,
    slots_allocated: AtomicU64,
    nodes_reused: AtomicU64,
    slots_reused: AtomicU64,
    nodes_freed: AtomicU64,
    slots_freed: AtomicU64,
}

impl PoolStats {
    /// Nodes obtained from the global allocator
    #[inline]
    pub fn nodes_allocated(&self) -> u64 {
        self.nodes_allocated.load(Ordering::Relaxed)
    }

    /// Control slots obtained from the global allocator
    #[inline]
    pub fn slots_allocated(&self) -> u64 {
        self.slots_allocated.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn nodes_reused(&self) -> u64 {
        self.nodes_reused.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn slots_reused(&self) -> u64 {
        self.slots_reused.load(Ordering::Relaxed)
    }

    /// Nodes returned to the global allocator because the free list was full
    #[inline]
    pub fn nodes_freed(&self) -> u64 {
        self.nodes_freed.load(Ordering::Relaxed)
    }

    /// Control slots returned to the global allocator because the free list was full
    #[inline]
    pub fn slots_freed(&self) -> u64 {
        self.slots_freed.load(Ordering::Relaxed)
    }
}

struct PoolShared {
    nodes: Mutex<FreeList<PoolNode>>,
    slots: Mutex<FreeList<ControlSlot>>,
    limits: PoolLimits,
    stats: PoolStats,
}

impl PoolShared {
    fn recycle(&self, mut node: Box<PoolNode>, slot: Box<ControlSlot>) {
        node.buffer.clear();

        let rejected = self.nodes.lock().push(node, self.limits.max_free_nodes);
        if rejected.is_err() {
            self.stats.nodes_freed.fetch_add(1, Ordering::Relaxed);
        }

        let rejected = self.slots.lock().push(slot, self.limits.max_free_slots);
        if rejected.is_err() {
            self.stats.slots_freed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Thread-safe recycling pool of [`LogBuffer`]s.
///
/// The pool starts empty and allocates nodes and control slots only on
/// demand. Cloning a `BufferPool` yields another handle to the same free
/// lists. Outstanding [`SharedBuffer`]s keep the free lists alive, so buffers
/// may outlive every `BufferPool` handle; the last one to drop tears the
/// lists down.
#[derive(Clone)]
pub struct BufferPool {
    shared: Arc<PoolShared>,
}

impl BufferPool {
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(PoolLimits::default())
    }

    #[must_use]
    pub fn with_limits(limits: PoolLimits) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                nodes: Mutex::new(FreeList::new()),
                slots: Mutex::new(FreeList::new()),
                limits,
                stats: PoolStats::default(),
            }),
        }
    }

    pub fn limits(&self) -> PoolLimits {
        self.shared.limits
    }

    pub fn stats(&self) -> &PoolStats {
        &self.shared.stats
    }

    /// Nodes currently parked on the free list
    pub fn free_nodes(&self) -> usize {
        self.shared.nodes.lock().len
    }

    /// Control slots currently parked on the free list
    pub fn free_slots(&self) -> usize {
        self.shared.slots.lock().len
    }

    /// Borrow an empty buffer, recycling a released one when available.
    pub fn acquire(&self) -> SharedBuffer {
        let stats = &self.shared.stats;

        let recycled = self.shared.nodes.lock().pop();
        let node = match recycled {
            Some(node) => {
                stats.nodes_reused.fetch_add(1, Ordering::Relaxed);
                node
            }
            None => {
                stats.nodes_allocated.fetch_add(1, Ordering::Relaxed);
                Box::new(PoolNode::new())
            }
        };

        let recycled = self.shared.slots.lock().pop();
        let mut slot = match recycled {
            Some(slot) => {
                stats.slots_reused.fetch_add(1, Ordering::Relaxed);
                slot
            }
            None => {
                stats.slots_allocated.fetch_add(1, Ordering::Relaxed);
                Box::new(ControlSlot::new())
            }
        };
        *slot.refs.get_mut() = 1;
        slot.pool = Some(Arc::clone(&self.shared));

        SharedBuffer::from_parts(slot, node)
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferFactory for BufferPool {
    fn acquire(&self) -> SharedBuffer {
        BufferPool::acquire(self)
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("limits", &self.shared.limits)
            .field("stats", &self.shared.stats)
            .finish()
    }
}

/// Reference-counted handle over a pooled [`LogBuffer`].
///
/// Cloning bumps the count. The buffer is readable through `Deref<[u8]>` by
/// every clone and writable through [`get_mut`](Self::get_mut) only while the
/// handle is unique. Dropping the last clone clears the buffer and returns it
/// (and its control slot) to the owning pool; unpooled buffers are freed.
pub struct SharedBuffer {
    slot: NonNull<ControlSlot>,
    node: NonNull<PoolNode>,
    _owns: PhantomData<(Box<ControlSlot>, Box<PoolNode>)>,
}

// SAFETY: the count is atomic, the buffer is only mutated through `get_mut`
// while the count is one, and the pool back-reference is an `Arc` over
// `Sync` state.
unsafe impl Send for SharedBuffer {}
unsafe impl Sync for SharedBuffer {}

impl SharedBuffer {
    fn from_parts(slot: Box<ControlSlot>, node: Box<PoolNode>) -> Self {
        Self {
            slot: NonNull::from(Box::leak(slot)),
            node: NonNull::from(Box::leak(node)),
            _owns: PhantomData,
        }
    }

    /// A buffer that belongs to no pool and is freed on last release.
    pub fn unpooled() -> Self {
        let slot = Box::new(ControlSlot {
            next: None,
            refs: AtomicUsize::new(1),
            pool: None,
        });
        Self::from_parts(slot, Box::new(PoolNode::new()))
    }

    #[inline]
    fn control(&self) -> &ControlSlot {
        // SAFETY: the slot stays allocated while any handle exists.
        unsafe { self.slot.as_ref() }
    }

    #[inline]
    fn buffer(&self) -> &LogBuffer {
        // SAFETY: the node stays allocated while any handle exists and is
        // only mutated through `get_mut` on a unique handle.
        unsafe { &self.node.as_ref().buffer }
    }

    /// Mutable access to the buffer, only while this is the sole handle.
    pub fn get_mut(&mut self) -> Option<&mut LogBuffer> {
        if self.control().refs.load(Ordering::Acquire) == 1 {
            // SAFETY: unique handle, taken by `&mut self`.
            Some(unsafe { &mut self.node.as_mut().buffer })
        } else {
            None
        }
    }

    pub fn ref_count(&self) -> usize {
        self.control().refs.load(Ordering::Acquire)
    }

    pub fn is_pooled(&self) -> bool {
        self.control().pool.is_some()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buffer().as_slice()
    }

    pub fn capacity(&self) -> usize {
        self.buffer().capacity()
    }

    /// True when both handles refer to the same underlying buffer
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.node == other.node
    }
}

impl Deref for SharedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for SharedBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl Clone for SharedBuffer {
    fn clone(&self) -> Self {
        let old = self.control().refs.fetch_add(1, Ordering::Relaxed);
        if old > MAX_REFCOUNT {
            std::process::abort();
        }
        Self {
            slot: self.slot,
            node: self.node,
            _owns: PhantomData,
        }
    }
}

impl Drop for SharedBuffer {
    fn drop(&mut self) {
        if self.control().refs.fetch_sub(1, Ordering::Release) != 1 {
            return;
        }
        fence(Ordering::Acquire);

        // SAFETY: this was the last handle; both boxes were leaked in
        // `from_parts` and nothing else can reach them any more.
        let (mut slot, node) = unsafe {
            (
                Box::from_raw(self.slot.as_ptr()),
                Box::from_raw(self.node.as_ptr()),
            )
        };

        if let Some(pool) = slot.pool.take() {
            pool.recycle(node, slot);
        }
    }
}

impl fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("len", &self.len())
            .field("refs", &self.ref_count())
            .field("pooled", &self.is_pooled())
            .finish()
    }
}
