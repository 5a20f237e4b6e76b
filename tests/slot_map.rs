use segtable::{SlotKey, SlotMap, StorageConfig, TrackingResource};
use std::sync::Arc;

fn small() -> SlotMap<&'static str, u32> {
    SlotMap::with_config(StorageConfig::new().with_segment_bits(2)).unwrap()
}

#[test]
fn add_at_erase_roundtrip() {
    let m = small();
    let h = m.add(42, "answer").unwrap();
    assert_eq!(m.size(), 1);
    assert!(m.contains(h, &42));
    assert_eq!(m.at(h, &42), Some("answer"));
    assert_eq!(m.erase(h, &42), Some("answer"));
    assert!(m.is_empty());
    assert_eq!(m.at(h, &42), None);
}

#[test]
fn handles_survive_many_erases() {
    let m = small();
    let keys: Vec<SlotKey<u32>> = (0..20).map(|i| m.insert(i, "x").unwrap()).collect();
    // erase every third, from the front, forcing repeated payload moves
    for k in keys.iter().step_by(3) {
        assert_eq!(m.remove(k), Some("x"));
    }
    for (i, k) in keys.iter().enumerate() {
        assert_eq!(m.get(k).is_some(), i % 3 != 0, "key {i}");
    }
    assert_eq!(m.size(), 13);
    assert_eq!(m.keys().len(), 13);
}

#[test]
fn update_and_with() {
    let m: SlotMap<Vec<u8>, u32> = SlotMap::new();
    let h = m.add(1, vec![1]).unwrap();
    assert_eq!(m.update(h, &1, |v| v.push(2)), Some(()));
    assert_eq!(m.with(h, &1, |v| v.len()), Some(2));
    assert_eq!(m.update(h, &2, |v| v.push(3)), None);
}

#[test]
fn packed_key_roundtrip_through_map() {
    let m = small();
    let k = m.insert(0xabcd, "packed").unwrap();
    let bits = k.to_bits().unwrap();
    let back = SlotKey::from_bits(bits);
    assert_eq!(m.get(&back), Some("packed"));
}

#[test]
fn memory_is_returned_on_drop() {
    let tracker = Arc::new(TrackingResource::new());
    {
        let m: SlotMap<u64, u32> = SlotMap::with_config_in(
            StorageConfig::new().with_segment_bits(2).with_shrink(true),
            tracker.clone(),
        )
        .unwrap();
        for i in 0..10 {
            m.add(i, u64::from(i)).unwrap();
        }
        // payload vector and index table each hold three segments of four
        assert_eq!(tracker.live_segments(), 6);
        for h in (0..10).rev() {
            m.erase(h, &(h as u32)).unwrap();
        }
        // each half keeps one segment: the vector a spare, the table the free-list head
        assert_eq!(tracker.live_segments(), 2);
        assert_eq!(m.add(99, 99), Some(0));
        assert_eq!(tracker.live_segments(), 2);
    }
    assert_eq!(tracker.current_bytes(), 0);
    assert_eq!(tracker.stats().total_allocations, tracker.stats().total_releases);
}
