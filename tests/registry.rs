use segtable::{ComponentRegistry, Entity, RegistryError, StorageConfig, TrackingResource};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct Label(String);

fn spawn_many(reg: &mut ComponentRegistry, n: usize) -> Vec<Entity> {
    (0..n)
        .map(|i| {
            let e = reg.spawn();
            reg.insert(e, Velocity { dx: i as f32, dy: 0.0 }).unwrap();
            if i % 2 == 0 {
                reg.insert(e, Label(format!("e{i}"))).unwrap();
            }
            e
        })
        .collect()
}

#[test]
fn despawn_half_keeps_the_rest_addressable() {
    let mut reg = ComponentRegistry::new();
    let entities = spawn_many(&mut reg, 40);
    assert_eq!(reg.len_of::<Velocity>(), 40);
    assert_eq!(reg.len_of::<Label>(), 20);

    for e in entities.iter().step_by(2) {
        assert!(reg.despawn(*e));
    }
    assert_eq!(reg.len_of::<Velocity>(), 20);
    assert_eq!(reg.len_of::<Label>(), 0);
    for (i, e) in entities.iter().enumerate() {
        let v = reg.get::<Velocity>(*e);
        if i % 2 == 0 {
            assert_eq!(v, None);
        } else {
            assert_eq!(v, Some(Velocity { dx: i as f32, dy: 0.0 }));
        }
    }
}

#[test]
fn set_and_remove_through_the_registry() {
    let mut reg = ComponentRegistry::new();
    let e = reg.spawn();
    reg.insert(e, Label("before".into())).unwrap();
    assert!(reg.set(e, Label("after".into())));
    assert_eq!(reg.get::<Label>(e), Some(Label("after".into())));
    assert_eq!(reg.remove::<Label>(e), Some(Label("after".into())));
    assert!(!reg.has::<Label>(e));
    // re-inserting after removal allocates a fresh entry
    assert_eq!(reg.insert(e, Label("again".into())), Ok(None));
    assert_eq!(reg.len_of::<Label>(), 1);
}

#[test]
fn dead_entity_is_an_error() {
    let mut reg = ComponentRegistry::new();
    let e = reg.spawn();
    reg.despawn(e);
    let err = reg.insert(e, 1u8).unwrap_err();
    assert_eq!(err, RegistryError::DeadEntity);
    assert_eq!(err.to_string(), "entity is not alive");
}

#[test]
fn columns_share_the_registry_resource() {
    let tracker = Arc::new(TrackingResource::new());
    {
        let mut reg = ComponentRegistry::with_config_in(
            StorageConfig::new().with_segment_bits(4),
            tracker.clone(),
        )
        .unwrap();
        spawn_many(&mut reg, 10);
        assert!(tracker.current_bytes() > 0);
        assert_eq!(reg.component_types().len(), 2);
    }
    assert_eq!(tracker.current_bytes(), 0);
}

#[test]
fn column_iteration_yields_owning_entities() {
    let mut reg = ComponentRegistry::new();
    let entities = spawn_many(&mut reg, 6);
    let mut owners = Vec::new();
    reg.column::<Label>()
        .unwrap()
        .for_each(|_, entity, _| owners.push(*entity));
    let expected: Vec<Entity> = entities.iter().step_by(2).copied().collect();
    assert_eq!(owners, expected);
}
