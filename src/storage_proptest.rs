#![cfg(test)]

// Property tests over the segmented containers, kept in the crate so they can
// also check internal bookkeeping (per-segment live counts, free list).

use crate::config::StorageConfig;
use crate::memory::TrackingResource;
use crate::slot_map::SlotMap;
use crate::sync::{FullSync, NoSync};
use crate::table::SlottedTable;
use crate::vector::SegmentedVector;
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Clone, Debug)]
enum VecOp {
    Push(i32),
    Pop,
    Erase(usize),
    Swap(usize, usize),
    Set(usize, i32),
    Reserve(usize),
    Clear,
}

fn arb_vec_ops() -> impl Strategy<Value = Vec<VecOp>> {
    // Indices are drawn past the expected length so misses are exercised too.
    let op = prop_oneof![
        6 => any::<i32>().prop_map(VecOp::Push),
        2 => Just(VecOp::Pop),
        3 => (0usize..40).prop_map(VecOp::Erase),
        2 => (0usize..40, 0usize..40).prop_map(|(a, b)| VecOp::Swap(a, b)),
        2 => (0usize..40, any::<i32>()).prop_map(|(i, v)| VecOp::Set(i, v)),
        1 => (0usize..48).prop_map(VecOp::Reserve),
        1 => Just(VecOp::Clear),
    ];
    proptest::collection::vec(op, 1..120)
}

// Property: SegmentedVector matches a Vec model under swap-remove erase.
// - contents, size and capacity >= size after every op
// - per-segment live counts sum to size
// - with shrink enabled, (segments - 1) * N <= size unless a reserve grew it
// - every segment is returned to the resource when the vector drops
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_vector_matches_model(bits in 1u32..=3, shrink in any::<bool>(), ops in arb_vec_ops()) {
        let tracker = Arc::new(TrackingResource::new());
        let config = StorageConfig::new().with_segment_bits(bits).with_shrink(shrink);
        let sut: SegmentedVector<i32, NoSync> =
            SegmentedVector::with_config_in(config, tracker.clone()).unwrap();
        let n = 1usize << bits;
        let mut model: Vec<i32> = Vec::new();
        let mut reserved = false;

        for op in ops {
            match op {
                VecOp::Push(v) => {
                    prop_assert_eq!(sut.push_back(v), Some(model.len()));
                    model.push(v);
                }
                VecOp::Pop => {
                    let expected = model.pop();
                    prop_assert_eq!(sut.pop_back(), expected);
                    if expected.is_some() {
                        reserved = false;
                    }
                }
                VecOp::Erase(i) => {
                    let expected = (i < model.len()).then(|| model.swap_remove(i));
                    prop_assert_eq!(sut.erase(i), expected);
                    if expected.is_some() {
                        reserved = false;
                    }
                }
                VecOp::Swap(a, b) => {
                    let ok = a < model.len() && b < model.len();
                    prop_assert_eq!(sut.swap(a, b), ok);
                    if ok {
                        model.swap(a, b);
                    }
                }
                VecOp::Set(i, v) => {
                    let ok = i < model.len();
                    prop_assert_eq!(sut.set(i, v), ok);
                    if ok {
                        model[i] = v;
                    }
                }
                VecOp::Reserve(total) => {
                    sut.reserve(total);
                    prop_assert!(sut.capacity() >= total);
                    reserved = true;
                }
                VecOp::Clear => {
                    sut.clear();
                    model.clear();
                    reserved = false;
                }
            }
            prop_assert_eq!(sut.size(), model.len());
            prop_assert_eq!(sut.to_vec(), model.clone());
            prop_assert!(sut.capacity() >= sut.size());
            prop_assert_eq!(sut.segment_live_counts().iter().sum::<usize>(), model.len());
            let segments = sut.segment_count();
            if shrink && !reserved && segments > 0 {
                prop_assert!((segments - 1) * n <= model.len());
            }
        }
        drop(sut);
        prop_assert_eq!(tracker.current_bytes(), 0);
        prop_assert_eq!(tracker.live_segments(), 0);
    }
}

#[derive(Clone, Debug)]
enum TableOp {
    Add(u16),
    Erase(usize),
    Swap(usize, usize),
    Set(usize, u16),
    EraseThenAdd(usize, u16),
    Clear,
}

fn arb_table_ops() -> impl Strategy<Value = Vec<TableOp>> {
    let op = prop_oneof![
        5 => any::<u16>().prop_map(TableOp::Add),
        4 => (0usize..32).prop_map(TableOp::Erase),
        1 => (0usize..32, 0usize..32).prop_map(|(a, b)| TableOp::Swap(a, b)),
        2 => (0usize..32, any::<u16>()).prop_map(|(i, v)| TableOp::Set(i, v)),
        2 => (0usize..32, any::<u16>()).prop_map(|(i, v)| TableOp::EraseThenAdd(i, v)),
        1 => Just(TableOp::Clear),
    ];
    proptest::collection::vec(op, 1..120)
}

// Property: SlottedTable matches an index -> value model with LIFO reuse.
// - add returns the most recently erased index, else the next fresh index,
//   whether or not shrinking released segments in between
// - erased indices read as absent until reused
// - free_list has no duplicates, holds only non-live indices below slot_count
// - per-segment live counts sum to size
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_table_matches_model(bits in 1u32..=3, shrink in any::<bool>(), ops in arb_table_ops()) {
        let config = StorageConfig::new().with_segment_bits(bits).with_shrink(shrink);
        let sut: SlottedTable<u16, FullSync> = SlottedTable::with_config(config).unwrap();
        let mut model: BTreeMap<usize, u16> = BTreeMap::new();

        for op in ops {
            match op {
                TableOp::Add(v) => {
                    let free = sut.free_list();
                    let expected = free.first().copied().unwrap_or(sut.slot_count());
                    let index = sut.add(v).unwrap();
                    prop_assert_eq!(index, expected);
                    prop_assert!(model.insert(index, v).is_none());
                }
                TableOp::Erase(i) => {
                    prop_assert_eq!(sut.erase(i), model.remove(&i));
                    prop_assert_eq!(sut.at(i), None);
                }
                TableOp::Swap(a, b) => {
                    let ok = model.contains_key(&a) && model.contains_key(&b);
                    prop_assert_eq!(sut.swap(a, b), ok);
                    if ok {
                        let (va, vb) = (model[&a], model[&b]);
                        model.insert(a, vb);
                        model.insert(b, va);
                    }
                }
                TableOp::Set(i, v) => {
                    let ok = model.contains_key(&i);
                    prop_assert_eq!(sut.set(i, v), ok);
                    if ok {
                        model.insert(i, v);
                    }
                }
                TableOp::EraseThenAdd(i, v) => {
                    if let Some(old) = model.remove(&i) {
                        prop_assert_eq!(sut.erase(i), Some(old));
                        prop_assert_eq!(sut.add(v), Some(i));
                        model.insert(i, v);
                    }
                }
                TableOp::Clear => {
                    sut.clear();
                    model.clear();
                    prop_assert_eq!(sut.slot_count(), 0);
                }
            }
            prop_assert_eq!(sut.size(), model.len());
            let mut seen = BTreeMap::new();
            sut.for_each(|i, v| {
                seen.insert(i, *v);
            });
            prop_assert_eq!(&seen, &model);

            let free = sut.free_list();
            prop_assert_eq!(free.len(), sut.free_count());
            let mut dedup = free.clone();
            dedup.sort_unstable();
            dedup.dedup();
            prop_assert_eq!(dedup.len(), free.len());
            for i in &free {
                prop_assert!(*i < sut.slot_count());
                prop_assert!(!model.contains_key(i));
            }
            prop_assert_eq!(sut.free_count() + sut.size(), sut.slot_count());
            prop_assert_eq!(sut.segment_live_counts().iter().sum::<usize>(), model.len());
        }
    }
}

#[derive(Clone, Debug)]
enum MapOp {
    Add(u8),
    Erase(usize),
    EraseStale(usize),
    Swap(usize, usize),
}

// Property: SlotMap keys stay valid across erase and swap, and retired keys never
// resolve even after their slot is reused under a fresh id.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_slot_map_keys(bits in 1u32..=3, ops in proptest::collection::vec(prop_oneof![
        4 => any::<u8>().prop_map(MapOp::Add),
        3 => (0usize..64).prop_map(MapOp::Erase),
        1 => (0usize..64).prop_map(MapOp::EraseStale),
        2 => (0usize..64, 0usize..64).prop_map(|(a, b)| MapOp::Swap(a, b)),
    ], 1..100)) {
        let config = StorageConfig::new().with_segment_bits(bits).with_shrink(true);
        let sut: SlotMap<u8, u64, NoSync> = SlotMap::with_config(config).unwrap();
        let mut next_id = 0u64;
        let mut live: Vec<(usize, u64)> = Vec::new();
        let mut values: HashMap<u64, u8> = HashMap::new();
        let mut retired: Vec<(usize, u64)> = Vec::new();

        for op in ops {
            match op {
                MapOp::Add(v) => {
                    next_id += 1;
                    let h = sut.add(next_id, v).unwrap();
                    live.push((h, next_id));
                    values.insert(next_id, v);
                }
                MapOp::Erase(i) if !live.is_empty() => {
                    let (h, id) = live.swap_remove(i % live.len());
                    prop_assert_eq!(sut.erase(h, &id), values.remove(&id));
                    retired.push((h, id));
                }
                MapOp::EraseStale(i) if !retired.is_empty() => {
                    let (h, id) = retired[i % retired.len()];
                    prop_assert_eq!(sut.erase(h, &id), None);
                }
                MapOp::Swap(a, b) if !live.is_empty() => {
                    let (ha, ia) = live[a % live.len()];
                    let (hb, ib) = live[b % live.len()];
                    prop_assert!(sut.swap(ha, &ia, hb, &ib));
                }
                _ => {}
            }
            prop_assert_eq!(sut.size(), live.len());
            for &(h, id) in &live {
                prop_assert_eq!(sut.at(h, &id), values.get(&id).copied());
            }
            for &(h, id) in &retired {
                prop_assert_eq!(sut.at(h, &id), None);
            }
        }
    }
}
