//! SlotMap: stable `{index, id}` keys over dense payload storage.
//!
//! Payloads live contiguously in a [`VectorStore`]; a [`TableStore`] maps each
//! handle to the payload's current position plus the caller's id. Erase
//! swap-removes the payload and re-points the map entry of the payload that
//! moved, so handles survive compaction.

use crate::config::StorageConfig;
use crate::error::ConfigError;
use crate::memory::{default_resource, SharedResource};
use crate::segment::{Layout, Segment};
use crate::sync::{FullSync, Guarded, SyncPolicy, Tier};
use crate::table::{Slot, TableStore};
use crate::vector::VectorStore;
use core::cmp::Ordering;
use core::sync::atomic::{self, AtomicBool, AtomicUsize};

/// Composite handle: the table slot plus the caller-supplied id stored with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey<Id> {
    pub index: usize,
    pub id: Id,
}

impl<Id> SlotKey<Id> {
    pub const fn new(index: usize, id: Id) -> Self {
        Self { index, id }
    }
}

impl SlotKey<u32> {
    /// Pack as `id << 32 | index`. `None` if the index does not fit in 32 bits.
    pub fn to_bits(self) -> Option<u64> {
        let index = u32::try_from(self.index).ok()?;
        Some((u64::from(self.id) << 32) | u64::from(index))
    }

    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: (bits & u64::from(u32::MAX)) as usize,
            id: (bits >> 32) as u32,
        }
    }
}

#[derive(Clone)]
struct Entry<T> {
    slot: usize,
    value: T,
}

#[derive(Clone, Copy)]
struct MapEntry<Id> {
    entry: usize,
    id: Id,
}

#[derive(Clone)]
struct MapStore<T, Id> {
    entries: VectorStore<Entry<T>>,
    map: TableStore<MapEntry<Id>>,
}

type Prepared<T, Id> = (
    Option<Segment<Option<Entry<T>>>>,
    Option<Segment<Slot<MapEntry<Id>>>>,
);

impl<T, Id: PartialEq> MapStore<T, Id> {
    fn resolve(&self, handle: usize, id: &Id) -> Option<usize> {
        self.map
            .get(handle)
            .filter(|m| m.id == *id)
            .map(|m| m.entry)
    }

    fn get(&self, handle: usize, id: &Id) -> Option<&T> {
        let entry = self.resolve(handle, id)?;
        self.entries.get(entry).map(|e| &e.value)
    }

    fn get_mut(&mut self, handle: usize, id: &Id) -> Option<&mut T> {
        let entry = self.resolve(handle, id)?;
        self.entries.get_mut(entry).map(|e| &mut e.value)
    }

    fn prepare_add(&self) -> Prepared<T, Id> {
        (self.entries.prepare_push(), self.map.prepare_add())
    }

    fn add(&mut self, (entry_seg, map_seg): Prepared<T, Id>, id: Id, value: T) -> usize {
        let slot = self.map.next_index();
        let entry = self.entries.push(entry_seg, Entry { slot, value });
        let handle = self.map.add(map_seg, MapEntry { entry, id });
        debug_assert_eq!(handle, slot);
        handle
    }

    fn erase(&mut self, handle: usize, id: &Id) -> Option<T> {
        let entry = self.resolve(handle, id)?;
        self.map.erase(handle);
        let last = self.entries.len() - 1;
        if entry != last {
            // the last payload is about to move into `entry`
            let moved = self.entries.last().map(|e| e.slot);
            if let Some(m) = moved.and_then(|slot| self.map.get_mut(slot)) {
                m.entry = entry;
            }
        }
        self.entries.swap_remove(entry).map(|e| e.value)
    }

    fn swap(&mut self, (ha, ia): (usize, &Id), (hb, ib): (usize, &Id)) -> bool {
        let (Some(ea), Some(eb)) = (self.resolve(ha, ia), self.resolve(hb, ib)) else {
            return false;
        };
        self.swap_dense(ea, eb);
        true
    }

    // Exchange two payload positions and re-point both owners' map entries.
    fn swap_dense(&mut self, a: usize, b: usize) {
        if a == b || !self.entries.swap(a, b) {
            return;
        }
        for entry in [a, b] {
            let slot = self.entries.get(entry).map(|e| e.slot);
            if let Some(m) = slot.and_then(|slot| self.map.get_mut(slot)) {
                m.entry = entry;
            }
        }
    }

    /// Reorder payloads so that `order[i]` (a current dense position) ends up at `i`.
    fn permute(&mut self, order: &[usize]) {
        // owners are fixed up front; their positions change as we swap
        let owners: Vec<usize> = order
            .iter()
            .filter_map(|&entry| self.entries.get(entry).map(|e| e.slot))
            .collect();
        for (target, slot) in owners.into_iter().enumerate() {
            if let Some(current) = self.map.get(slot).map(|m| m.entry) {
                self.swap_dense(target, current);
            }
        }
    }

    fn sort_by(&mut self, mut compare: impl FnMut(&T, &T) -> Ordering) {
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        {
            let entries = &self.entries;
            order.sort_by(|&a, &b| match (entries.get(a), entries.get(b)) {
                (Some(x), Some(y)) => compare(&x.value, &y.value),
                _ => Ordering::Equal,
            });
        }
        self.permute(&order);
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.map.clear();
    }
}

/// A map from stable handles to values, validated by a caller-supplied id.
///
/// Handles are table indices. The table recycles erased indices, so every
/// lookup also compares the id stored at `add` time: a handle whose slot was
/// freed and reused under another id resolves to nothing. The map never
/// invents ids itself.
///
/// ```
/// use segtable::SlotMap;
///
/// let m: SlotMap<&str, u64> = SlotMap::new();
/// let h = m.add(7, "first").unwrap();
/// assert_eq!(m.erase(h, &7), Some("first"));
///
/// let h2 = m.add(8, "second").unwrap();
/// assert_eq!(h, h2);
/// assert_eq!(m.at(h, &7), None);
/// assert_eq!(m.at(h2, &8), Some("second"));
/// ```
pub struct SlotMap<T, Id, P: SyncPolicy = FullSync> {
    store: P::Lock<MapStore<T, Id>>,
    len: AtomicUsize,
    read_only: AtomicBool,
}

impl<T, Id: PartialEq, P: SyncPolicy> SlotMap<T, Id, P> {
    pub fn new() -> Self {
        Self::build(StorageConfig::new(), default_resource())
    }

    pub fn with_config(config: StorageConfig) -> Result<Self, ConfigError> {
        Self::with_config_in(config, default_resource())
    }

    /// Both the payload vector and the index table draw from `resource`.
    pub fn with_config_in(
        config: StorageConfig,
        resource: SharedResource,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        log::debug!(
            "slot map: {} slots/segment, shrink={}, tier={:?}",
            config.segment_len(),
            config.shrink,
            P::TIER
        );
        Ok(Self::build(config, resource))
    }

    fn build(config: StorageConfig, resource: SharedResource) -> Self {
        let layout = Layout::new(config.segment_bits);
        let store = MapStore {
            entries: VectorStore::new(layout, config.shrink, resource.clone()),
            map: TableStore::new(layout, config.shrink, resource),
        };
        Self {
            store: Guarded::new(store),
            len: AtomicUsize::new(0),
            read_only: AtomicBool::new(config.read_only),
        }
    }

    pub fn tier(&self) -> Tier {
        P::TIER
    }

    /// Number of live payloads. Lock-free.
    #[inline]
    pub fn size(&self) -> usize {
        self.len.load(atomic::Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(atomic::Ordering::Acquire)
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, atomic::Ordering::Release);
    }

    fn writable(&self, op: &str) -> bool {
        let ok = !self.is_read_only();
        if !ok {
            log::warn!("slot map: {op} refused, container is read-only");
        }
        ok
    }

    /// Store `value` under `id` and return its handle (a table index).
    pub fn add(&self, id: Id, value: T) -> Option<usize> {
        if !self.writable("add") {
            return None;
        }
        let handle = self.store.append(
            |s| s.prepare_add(),
            |s, prepared| {
                let handle = s.add(prepared, id, value);
                self.len.store(s.entries.len(), atomic::Ordering::Release);
                handle
            },
        );
        Some(handle)
    }

    /// [`SlotMap::add`] returning the full key.
    pub fn insert(&self, id: Id, value: T) -> Option<SlotKey<Id>>
    where
        Id: Clone,
    {
        let index = self.add(id.clone(), value)?;
        Some(SlotKey { index, id })
    }

    pub fn at(&self, handle: usize, id: &Id) -> Option<T>
    where
        T: Clone,
    {
        self.store.read(|s| s.get(handle, id).cloned())
    }

    pub fn get(&self, key: &SlotKey<Id>) -> Option<T>
    where
        T: Clone,
    {
        self.at(key.index, &key.id)
    }

    pub fn contains(&self, handle: usize, id: &Id) -> bool {
        self.store.read(|s| s.resolve(handle, id).is_some())
    }

    /// Dense payload position currently backing `handle`.
    pub fn entry_index(&self, handle: usize, id: &Id) -> Option<usize> {
        self.store.read(|s| s.resolve(handle, id))
    }

    pub fn with<R>(&self, handle: usize, id: &Id, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.store.read(|s| s.get(handle, id).map(f))
    }

    pub fn update<R>(&self, handle: usize, id: &Id, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        if !self.writable("update") {
            return None;
        }
        self.store.write(|s| s.get_mut(handle, id).map(f))
    }

    /// Overwrite the payload of `handle` if `id` matches.
    pub fn set(&self, handle: usize, id: &Id, value: T) -> bool {
        self.update(handle, id, |slot| *slot = value).is_some()
    }

    /// [`SlotMap::set`] by key, returning the previous value.
    pub fn replace(&self, key: &SlotKey<Id>, value: T) -> Option<T> {
        self.update(key.index, &key.id, |slot| core::mem::replace(slot, value))
    }

    /// Remove the entry for `handle` if `id` matches.
    ///
    /// The payload is swap-removed; the entry that owned the last payload is
    /// re-pointed to its new position, so its handle keeps resolving.
    pub fn erase(&self, handle: usize, id: &Id) -> Option<T> {
        if !self.writable("erase") {
            return None;
        }
        self.store.write(|s| {
            let value = s.erase(handle, id);
            self.len.store(s.entries.len(), atomic::Ordering::Release);
            value
        })
    }

    pub fn remove(&self, key: &SlotKey<Id>) -> Option<T> {
        self.erase(key.index, &key.id)
    }

    /// Exchange the payload positions of two live entries.
    ///
    /// Each handle still resolves to its own value afterwards; only the dense
    /// order changes.
    pub fn swap(&self, a: usize, id_a: &Id, b: usize, id_b: &Id) -> bool {
        if !self.writable("swap") {
            return false;
        }
        self.store.write(|s| s.swap((a, id_a), (b, id_b)))
    }

    /// Reorder the dense payloads by `compare`, keeping every handle valid.
    ///
    /// Afterwards [`SlotMap::for_each`] visits values in sorted order. The
    /// sort is stable. Refused on a read-only map.
    pub fn sort_by(&self, compare: impl FnMut(&T, &T) -> Ordering) -> bool {
        if !self.writable("sort") {
            return false;
        }
        self.store.write(|s| s.sort_by(compare));
        true
    }

    pub fn sort_by_key<K: Ord>(&self, mut key: impl FnMut(&T) -> K) -> bool {
        self.sort_by(|a, b| key(a).cmp(&key(b)))
    }

    /// Key of the entry whose payload sits at dense position `dense`.
    pub fn key_at(&self, dense: usize) -> Option<SlotKey<Id>>
    where
        Id: Clone,
    {
        self.store.read(|s| {
            let slot = s.entries.get(dense)?.slot;
            let m = s.map.get(slot)?;
            Some(SlotKey::new(slot, m.id.clone()))
        })
    }

    /// Replace this map's contents with a copy of `other`, handles included.
    ///
    /// Handles valid in `other` resolve to the same values here afterwards.
    /// The copy draws its segments from `other`'s memory resource.
    pub fn copy_from(&self, other: &Self) -> bool
    where
        T: Clone,
        Id: Clone,
    {
        if core::ptr::eq(self, other) {
            return true;
        }
        if !self.writable("copy_from") {
            return false;
        }
        let copy = other.store.read(|s| s.clone());
        self.store.write(|s| {
            *s = copy;
            self.len.store(s.entries.len(), atomic::Ordering::Release);
        });
        true
    }

    /// Pre-allocate both the payload vector and the index table for `total` entries.
    pub fn reserve(&self, total: usize) {
        if !self.writable("reserve") {
            return;
        }
        self.store.write(|s| {
            s.entries.reserve(total);
            s.map.reserve(total);
        });
    }

    pub fn clear(&self) {
        if !self.writable("clear") {
            return;
        }
        self.store.write(|s| {
            s.clear();
            self.len.store(0, atomic::Ordering::Release);
        });
    }

    /// Visit live entries in dense payload order as `(handle, id, value)`.
    pub fn for_each(&self, mut f: impl FnMut(usize, &Id, &T)) {
        self.store.read(|s| {
            for (_, entry) in s.entries.iter() {
                if let Some(m) = s.map.get(entry.slot) {
                    f(entry.slot, &m.id, &entry.value);
                }
            }
        });
    }

    /// All live keys in dense payload order.
    pub fn keys(&self) -> Vec<SlotKey<Id>>
    where
        Id: Clone,
    {
        let mut out = Vec::with_capacity(self.size());
        self.for_each(|index, id, _| out.push(SlotKey::new(index, id.clone())));
        out
    }

    pub fn get_mut(&mut self, handle: usize, id: &Id) -> Option<&mut T> {
        self.store.get_mut().get_mut(handle, id)
    }
}

impl<T, Id: PartialEq, P: SyncPolicy> Default for SlotMap<T, Id, P> {
    fn default() -> Self {
        Self::new()
    }
}
