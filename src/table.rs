//! SlottedTable: segmented storage with an embedded free list for O(1) erase and reuse.

use crate::config::StorageConfig;
use crate::error::ConfigError;
use crate::memory::{default_resource, SharedResource};
use crate::segment::{Layout, Segment, Segments};
use crate::sync::{FullSync, Guarded, SyncPolicy, Tier};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// One table slot. Erased slots carry the free-list link in place of a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Slot<T> {
    Unused,
    Live(T),
    Free { next: Option<usize> },
}

/// Unsynchronized table state.
///
/// `high` is the number of slots ever handed out (live or free); slots at
/// `high..capacity` are `Unused`. `first_free` heads a singly linked list
/// threaded through `Slot::Free` entries, most recently erased first.
#[derive(Clone)]
pub(crate) struct TableStore<T> {
    segments: Segments<Slot<T>>,
    high: usize,
    live: usize,
    free: usize,
    first_free: Option<usize>,
    shrink: bool,
}

impl<T> TableStore<T> {
    pub(crate) fn new(layout: Layout, shrink: bool, resource: SharedResource) -> Self {
        Self {
            segments: Segments::new(layout, resource, || Slot::Unused),
            high: 0,
            live: 0,
            free: 0,
            first_free: None,
            shrink,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.live
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.high
    }

    pub(crate) fn free_count(&self) -> usize {
        self.free
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

    pub(crate) fn live_counts(&self) -> Vec<usize> {
        self.segments.live_counts()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&T> {
        if index >= self.high {
            return None;
        }
        match self.segments.slot(index) {
            Slot::Live(value) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.high {
            return None;
        }
        match self.segments.slot_mut(index) {
            Slot::Live(value) => Some(value),
            _ => None,
        }
    }

    /// The index the next `add` will return.
    pub(crate) fn next_index(&self) -> usize {
        self.first_free.unwrap_or(self.high)
    }

    pub(crate) fn prepare_add(&self) -> Option<Segment<Slot<T>>> {
        (self.first_free.is_none() && self.high == self.segments.capacity())
            .then(|| self.segments.fresh())
    }

    pub(crate) fn add(&mut self, fresh: Option<Segment<Slot<T>>>, value: T) -> usize {
        if let Some(segment) = fresh {
            self.segments.attach(segment);
        }
        let index = match self.first_free {
            Some(index) => {
                let slot = self.segments.slot_mut(index);
                debug_assert!(matches!(slot, Slot::Free { .. }));
                if let Slot::Free { next } = *slot {
                    self.first_free = next;
                }
                *slot = Slot::Live(value);
                self.free -= 1;
                log::trace!("slotted table: reused free slot {index}");
                index
            }
            None => {
                if self.high == self.segments.capacity() {
                    self.segments.grow();
                }
                let index = self.high;
                *self.segments.slot_mut(index) = Slot::Live(value);
                self.high += 1;
                index
            }
        };
        self.segments.mark_live(index);
        self.live += 1;
        index
    }

    /// Free a live slot and push it onto the head of the free list.
    pub(crate) fn erase(&mut self, index: usize) -> Option<T> {
        if index >= self.high {
            return None;
        }
        let slot = self.segments.slot_mut(index);
        if !matches!(slot, Slot::Live(_)) {
            return None;
        }
        let previous = core::mem::replace(
            slot,
            Slot::Free {
                next: self.first_free,
            },
        );
        self.first_free = Some(index);
        self.free += 1;
        self.live -= 1;
        self.segments.mark_dead(index);
        self.shrink_tail();
        match previous {
            Slot::Live(value) => Some(value),
            _ => None,
        }
    }

    /// Exchange the values of two live slots.
    pub(crate) fn swap(&mut self, a: usize, b: usize) -> bool {
        if self.get(a).is_none() || self.get(b).is_none() {
            return false;
        }
        self.segments.swap_slots(a, b);
        true
    }

    pub(crate) fn reserve(&mut self, total: usize) {
        self.segments.reserve(total);
    }

    pub(crate) fn clear(&mut self) {
        self.segments.reset(self.high);
        self.high = 0;
        self.live = 0;
        self.free = 0;
        self.first_free = None;
        if self.shrink {
            self.segments.release_all();
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        (0..self.high).filter_map(move |i| match self.segments.slot(i) {
            Slot::Live(value) => Some((i, value)),
            _ => None,
        })
    }

    /// Free-list indices from head to tail.
    pub(crate) fn free_list(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.free);
        let mut cursor = self.first_free;
        while let Some(index) = cursor {
            out.push(index);
            cursor = match self.segments.slot(index) {
                Slot::Free { next } => *next,
                _ => None,
            };
        }
        out
    }

    // Release trailing segments holding no live slot, except the one holding
    // the free-list head: the next `add` must get the slot freed last. Free
    // links into the released range are dropped from the list first.
    fn shrink_tail(&mut self) {
        if !self.shrink {
            return;
        }
        let layout = self.segments.layout();
        let n = layout.len();
        let mut keep = self.segments.count();
        let counts = self.segments.live_counts();
        while keep > 0 && counts[keep - 1] == 0 {
            keep -= 1;
        }
        if let Some(head) = self.first_free {
            keep = keep.max(layout.segment(head) + 1);
        }
        if keep == self.segments.count() {
            return;
        }
        let bound = keep * n;
        self.relink_free_below(bound);
        while self.segments.count() > keep {
            self.segments.release_last();
        }
        self.high = self.high.min(bound);
    }

    fn relink_free_below(&mut self, bound: usize) {
        let kept: Vec<usize> = self
            .free_list()
            .into_iter()
            .filter(|&index| index < bound)
            .collect();
        self.first_free = kept.first().copied();
        for (pos, &index) in kept.iter().enumerate() {
            *self.segments.slot_mut(index) = Slot::Free {
                next: kept.get(pos + 1).copied(),
            };
        }
        self.free = kept.len();
    }
}

/// A table of slots addressed by stable index, reusing erased slots before growing.
///
/// Erase pushes the slot onto an embedded free list; the next `add` takes the
/// most recently freed slot. The table keeps no generation counter: an index
/// that was erased and then reused resolves to the new occupant. Wrap the
/// table in a [`SlotMap`](crate::SlotMap) when stale handles must be rejected.
///
/// ```
/// use segtable::{SlottedTable, StorageConfig};
///
/// let t: SlottedTable<char> =
///     SlottedTable::with_config(StorageConfig::new().with_segment_bits(2)).unwrap();
/// for c in ['a', 'b', 'c', 'd', 'e'] {
///     t.add(c);
/// }
/// assert_eq!(t.segment_count(), 2);
/// assert_eq!(t.erase(1), Some('b'));
/// assert_eq!(t.at(1), None);
/// assert_eq!(t.add('z'), Some(1));
/// assert_eq!(t.size(), 5);
/// ```
pub struct SlottedTable<T, P: SyncPolicy = FullSync> {
    store: P::Lock<TableStore<T>>,
    live: AtomicUsize,
    read_only: AtomicBool,
}

impl<T, P: SyncPolicy> SlottedTable<T, P> {
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
            "slotted table: {} slots/segment, shrink={}, tier={:?}",
            config.segment_len(),
            config.shrink,
            P::TIER
        );
        Ok(Self::build(config, resource))
    }

    fn build(config: StorageConfig, resource: SharedResource) -> Self {
        let layout = Layout::new(config.segment_bits);
        Self {
            store: Guarded::new(TableStore::new(layout, config.shrink, resource)),
            live: AtomicUsize::new(0),
            read_only: AtomicBool::new(config.read_only),
        }
    }

    pub fn tier(&self) -> Tier {
        P::TIER
    }

    /// Number of live slots. Lock-free.
    #[inline]
    pub fn size(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Slots handed out so far, live or free.
    pub fn slot_count(&self) -> usize {
        self.store.read(|s| s.slot_count())
    }

    /// Erased slots waiting on the free list.
    pub fn free_count(&self) -> usize {
        self.store.read(|s| s.free_count())
    }

    pub fn capacity(&self) -> usize {
        self.store.read(|s| s.capacity())
    }

    pub fn segment_count(&self) -> usize {
        self.store.read(|s| s.segment_count())
    }

    pub fn segment_len(&self) -> usize {
        self.store.read(|s| s.segment_len())
    }

    pub fn segment_live_counts(&self) -> Vec<usize> {
        self.store.read(|s| s.live_counts())
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Release);
    }

    fn writable(&self, op: &str) -> bool {
        let ok = !self.is_read_only();
        if !ok {
            log::warn!("slotted table: {op} refused, container is read-only");
        }
        ok
    }

    /// Store `value` in the most recently freed slot, or a new one.
    pub fn add(&self, value: T) -> Option<usize> {
        if !self.writable("add") {
            return None;
        }
        let index = self.store.append(
            |s| s.prepare_add(),
            |s, fresh| {
                let index = s.add(fresh, value);
                self.live.store(s.len(), Ordering::Release);
                index
            },
        );
        Some(index)
    }

    pub fn at(&self, index: usize) -> Option<T>
    where
        T: Clone,
    {
        self.store.read(|s| s.get(index).cloned())
    }

    pub fn is_live(&self, index: usize) -> bool {
        self.store.read(|s| s.get(index).is_some())
    }

    pub fn with<R>(&self, index: usize, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.store.read(|s| s.get(index).map(f))
    }

    pub fn update<R>(&self, index: usize, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        if !self.writable("update") {
            return None;
        }
        self.store.write(|s| s.get_mut(index).map(f))
    }

    /// Overwrite a live slot. Returns `false` for free or out-of-range slots.
    pub fn set(&self, index: usize, value: T) -> bool {
        self.update(index, |slot| *slot = value).is_some()
    }

    /// Free a live slot and return its value.
    pub fn erase(&self, index: usize) -> Option<T> {
        if !self.writable("erase") {
            return None;
        }
        self.store.write(|s| {
            let value = s.erase(index);
            self.live.store(s.len(), Ordering::Release);
            value
        })
    }

    pub fn swap(&self, a: usize, b: usize) -> bool {
        if !self.writable("swap") {
            return false;
        }
        self.store.write(|s| s.swap(a, b))
    }

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
            self.live.store(0, Ordering::Release);
        });
    }

    /// Visit live slots in index order.
    pub fn for_each(&self, mut f: impl FnMut(usize, &T)) {
        self.store.read(|s| s.iter().for_each(|(i, v)| f(i, v)));
    }

    /// Free-list indices from head (next reused) to tail.
    pub fn free_list(&self) -> Vec<usize> {
        self.store.read(|s| s.free_list())
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.store.get_mut().get_mut(index)
    }
}

impl<T, P: SyncPolicy> Default for SlottedTable<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: core::fmt::Debug, P: SyncPolicy> core::fmt::Debug for SlottedTable<T, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.store.read(|s| f.debug_map().entries(s.iter()).finish())
    }
}
