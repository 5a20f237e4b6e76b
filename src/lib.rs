//! segtable: segmented, handle-addressed storage for entity/component data,
//! with a per-instance choice of concurrency tier.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: containers whose elements never move because of growth, whose
//!   erase is O(1), and whose locking cost is chosen per instance.
//! - Layers:
//!   - `segment`: fixed blocks of `N = 2^L` slots with a live count each; a
//!     flat index `n` lives in block `n >> L` at offset `n & (N - 1)`.
//!   - SegmentedVector<T, P>: dense append/pop; erase swaps the last element
//!     into the hole.
//!   - SlottedTable<T, P>: stable indices; erase threads the slot onto an
//!     embedded free list that `add` pops before growing.
//!   - SlotMap<T, Id, P>: a SlottedTable of `{payload index, id}` in front of
//!     a dense payload vector; lookups check the caller's id so reused
//!     handles are rejected. Payloads can be sorted in place without
//!     invalidating handles.
//!   - BufferedSlotMap<T, Id, P>: a read-only front SlotMap and a writable
//!     back one, exchanged at frame boundaries.
//!   - ComponentRegistry: one SlotMap column per component type, keyed by
//!     `TypeId`, with generational `Entity` keys as the column ids.
//!
//! Constraints
//! - Growth appends a segment; existing slots are never relocated by it.
//! - Shrinking only ever pops trailing segments, and only when the
//!   container's `shrink` flag is set.
//! - Misses (out of range, freed slot, wrong id, read-only container) come
//!   back as `None`/`false`. Only construction and the registry return errors.
//! - `size()` is an atomic read and never takes the lock.
//!
//! Concurrency tiers (see [`sync`])
//! - `NoSync`: single-threaded; the container is `!Sync` and nested mutable
//!   entry panics.
//! - `AppendSync`: appends serialize among themselves and build any new
//!   segment while readers continue; readers wait only for the commit.
//! - `FullSync` (default): shared lock for reads, exclusive for every
//!   mutation.
//!
//! Memory
//! - Every segment reports its bytes to the container's [`MemoryResource`]
//!   when built and again when dropped. [`TrackingResource`] counts them and
//!   can enforce a byte budget; running past it is an allocation failure and
//!   panics.
//!
//! Notes and non-goals
//! - No persistence, no iteration order guarantees beyond "dense order" for
//!   vectors and slot maps, and no automatic compaction of tables.
//! - SlottedTable keeps no generation counter; use SlotMap (or the
//!   registry) when stale handles must be detected.

mod buffered;
pub mod config;
pub mod error;
pub mod memory;
mod registry;
mod segment;
mod slot_map;
mod storage_proptest;
pub mod sync;
mod table;
mod vector;

// Public surface
pub use buffered::BufferedSlotMap;
pub use config::StorageConfig;
pub use error::{ConfigError, RegistryError};
pub use memory::{HeapResource, MemoryResource, MemoryStats, SharedResource, TrackingResource};
pub use registry::{Column, ComponentRegistry, Entity};
pub use slot_map::{SlotKey, SlotMap};
pub use sync::{AppendSync, FullSync, NoSync, SyncPolicy, Tier};
pub use table::SlottedTable;
pub use vector::SegmentedVector;
