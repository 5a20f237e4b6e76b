//! SegmentedVector: dense append/pop storage over a growing list of segments.

use crate::config::StorageConfig;
use crate::error::ConfigError;
use crate::memory::{default_resource, SharedResource};
use crate::segment::{Layout, Segment, Segments};
use crate::sync::{FullSync, Guarded, SyncPolicy, Tier};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Unsynchronized vector state. Slots at `len..capacity` hold `None`.
#[derive(Clone)]
pub(crate) struct VectorStore<T> {
    segments: Segments<Option<T>>,
    len: usize,
    shrink: bool,
}

impl<T> VectorStore<T> {
    pub(crate) fn new(layout: Layout, shrink: bool, resource: SharedResource) -> Self {
        Self {
            segments: Segments::new(layout, resource, || None),
            len: 0,
            shrink,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn capacity(&self) -> usize {
        self.segments.capacity()
    }

    pub(crate) fn segment_count(&self) -> usize {
        self.segments.count()
    }

    pub(crate) fn segment_len(&self) -> usize {
        self.segments.layout().len()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        self.segments.slot(index).as_ref()
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len {
            return None;
        }
        self.segments.slot_mut(index).as_mut()
    }

    pub(crate) fn last(&self) -> Option<&T> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    /// A segment the next push will need, built without touching `self`.
    pub(crate) fn prepare_push(&self) -> Option<Segment<Option<T>>> {
        (self.len == self.segments.capacity()).then(|| self.segments.fresh())
    }

    pub(crate) fn push(&mut self, fresh: Option<Segment<Option<T>>>, value: T) -> usize {
        if let Some(segment) = fresh {
            self.segments.attach(segment);
        }
        if self.len == self.segments.capacity() {
            self.segments.grow();
        }
        let index = self.len;
        *self.segments.slot_mut(index) = Some(value);
        self.segments.mark_live(index);
        self.len += 1;
        index
    }

    pub(crate) fn pop(&mut self) -> Option<T> {
        let last = self.len.checked_sub(1)?;
        let value = self.segments.slot_mut(last).take();
        self.segments.mark_dead(last);
        self.len = last;
        self.shrink_tail();
        value
    }

    /// Move the last element into `index` and return what was there.
    pub(crate) fn swap_remove(&mut self, index: usize) -> Option<T> {
        if index >= self.len {
            return None;
        }
        self.segments.swap_slots(index, self.len - 1);
        self.pop()
    }

    pub(crate) fn swap(&mut self, a: usize, b: usize) -> bool {
        if a >= self.len || b >= self.len {
            return false;
        }
        self.segments.swap_slots(a, b);
        true
    }

    pub(crate) fn reserve(&mut self, total: usize) {
        self.segments.reserve(total);
    }

    pub(crate) fn clear(&mut self) {
        self.segments.reset(self.len);
        self.len = 0;
        if self.shrink {
            self.segments.release_all();
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        (0..self.len).filter_map(move |i| self.segments.slot(i).as_ref().map(|v| (i, v)))
    }

    pub(crate) fn live_counts(&self) -> Vec<usize> {
        self.segments.live_counts()
    }

    // Keep one spare segment so a push right after a pop does not reallocate.
    fn shrink_tail(&mut self) {
        if !self.shrink {
            return;
        }
        let n = self.segments.layout().len();
        while self.segments.count() > 0 && self.len < (self.segments.count() - 1) * n {
            self.segments.release_last();
        }
    }
}

/// An append/pop container addressed by dense index.
///
/// Indices never move because of growth: new segments are added behind the
/// existing ones. [`SegmentedVector::erase`] fills the hole with the last
/// element, so the index of the last element is invalidated by any erase.
///
/// ```
/// use segtable::{SegmentedVector, StorageConfig};
///
/// let v: SegmentedVector<&str> =
///     SegmentedVector::with_config(StorageConfig::new().with_segment_bits(1)).unwrap();
/// let a = v.push_back("a").unwrap();
/// v.push_back("b");
/// v.push_back("c");
/// assert_eq!(v.segment_count(), 2);
///
/// assert_eq!(v.erase(a), Some("a"));
/// assert_eq!(v.at(a), Some("c"));
/// assert_eq!(v.at(2), None);
/// ```
pub struct SegmentedVector<T, P: SyncPolicy = FullSync> {
    store: P::Lock<VectorStore<T>>,
    len: AtomicUsize,
    read_only: AtomicBool,
}

impl<T, P: SyncPolicy> SegmentedVector<T, P> {
    pub fn new() -> Self {
        Self::build(StorageConfig::new(), default_resource())
    }

    pub fn with_config(config: StorageConfig) -> Result<Self, ConfigError> {
        Self::with_config_in(config, default_resource())
    }

    pub fn with_config_in(
        config: StorageConfig,
        resource: SharedResource,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        log::debug!(
            "segmented vector: {} slots/segment, shrink={}, tier={:?}",
            config.segment_len(),
            config.shrink,
            P::TIER
        );
        Ok(Self::build(config, resource))
    }

    fn build(config: StorageConfig, resource: SharedResource) -> Self {
        let layout = Layout::new(config.segment_bits);
        Self {
            store: Guarded::new(VectorStore::new(layout, config.shrink, resource)),
            len: AtomicUsize::new(0),
            read_only: AtomicBool::new(config.read_only),
        }
    }

    pub fn tier(&self) -> Tier {
        P::TIER
    }

    /// Number of elements. Reads an atomic counter and never takes the lock.
    #[inline]
    pub fn size(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Slots available without allocating another segment.
    pub fn capacity(&self) -> usize {
        self.store.read(|s| s.capacity())
    }

    pub fn segment_count(&self) -> usize {
        self.store.read(|s| s.segment_count())
    }

    pub fn segment_len(&self) -> usize {
        self.store.read(|s| s.segment_len())
    }

    /// Live element count of each segment, in order.
    pub fn segment_live_counts(&self) -> Vec<usize> {
        self.store.read(|s| s.live_counts())
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    /// While read-only, every mutating call is refused and reports failure.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Release);
    }

    fn writable(&self, op: &str) -> bool {
        let ok = !self.is_read_only();
        if !ok {
            log::warn!("segmented vector: {op} refused, container is read-only");
        }
        ok
    }

    /// Append `value` and return its index, or `None` when read-only.
    pub fn push_back(&self, value: T) -> Option<usize> {
        if !self.writable("push_back") {
            return None;
        }
        let index = self.store.append(
            |s| s.prepare_push(),
            |s, fresh| {
                let index = s.push(fresh, value);
                self.len.store(s.len(), Ordering::Release);
                index
            },
        );
        Some(index)
    }

    /// A copy of the element at `index`, or `None` if out of range.
    pub fn at(&self, index: usize) -> Option<T>
    where
        T: Clone,
    {
        self.store.read(|s| s.get(index).cloned())
    }

    /// Run `f` on the element at `index` under shared access.
    pub fn with<R>(&self, index: usize, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.store.read(|s| s.get(index).map(f))
    }

    /// Run `f` on the element at `index` under exclusive access.
    pub fn update<R>(&self, index: usize, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        if !self.writable("update") {
            return None;
        }
        self.store.write(|s| s.get_mut(index).map(f))
    }

    /// Overwrite the element at `index`. Returns `false` if out of range.
    pub fn set(&self, index: usize, value: T) -> bool {
        self.update(index, |slot| *slot = value).is_some()
    }

    pub fn pop_back(&self) -> Option<T> {
        if !self.writable("pop_back") {
            return None;
        }
        self.store.write(|s| {
            let value = s.pop();
            self.len.store(s.len(), Ordering::Release);
            value
        })
    }

    /// Remove the element at `index` by moving the last element into its place.
    ///
    /// O(1). Order is not preserved and whatever was last now lives at `index`.
    pub fn erase(&self, index: usize) -> Option<T> {
        if !self.writable("erase") {
            return None;
        }
        self.store.write(|s| {
            let value = s.swap_remove(index);
            self.len.store(s.len(), Ordering::Release);
            value
        })
    }

    /// Exchange two elements. Returns `false` if either index is out of range.
    pub fn swap(&self, a: usize, b: usize) -> bool {
        if !self.writable("swap") {
            return false;
        }
        self.store.write(|s| s.swap(a, b))
    }

    /// Allocate segments so that `total` elements fit without further growth.
    pub fn reserve(&self, total: usize) {
        if !self.writable("reserve") {
            return;
        }
        self.store.write(|s| s.reserve(total));
    }

    pub fn clear(&self) {
        if !self.writable("clear") {
            return;
        }
        self.store.write(|s| {
            s.clear();
            self.len.store(0, Ordering::Release);
        });
    }

    /// Visit every element in index order under one shared acquisition.
    pub fn for_each(&self, mut f: impl FnMut(usize, &T)) {
        self.store.read(|s| s.iter().for_each(|(i, v)| f(i, v)));
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.store.read(|s| s.iter().map(|(_, v)| v.clone()).collect())
    }

    /// Lock-free access through an exclusive borrow. Ignores read-only mode.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.store.get_mut().get_mut(index)
    }

    pub fn last(&self) -> Option<T>
    where
        T: Clone,
    {
        self.store.read(|s| s.last().cloned())
    }
}

impl<T, P: SyncPolicy> Default for SegmentedVector<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: core::fmt::Debug, P: SyncPolicy> core::fmt::Debug for SegmentedVector<T, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.store.read(|s| f.debug_list().entries(s.iter().map(|(_, v)| v)).finish())
    }
}
