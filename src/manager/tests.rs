use super::*;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Cvec(u32);
impl Component for Cvec {}

#[derive(Clone, Debug, Default, PartialEq)]
struct Pos {
    x: f32,
    y: f32,
}
impl Component for Pos {}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Health(u32);
impl Component for Health {}

#[test]
fn stores_are_created_lazily() {
    let mut manager = ComponentManager::new();
    assert_eq!(manager.store_count(), 0);
    assert!(manager.store::<Cvec>().is_none());

    manager.create_component::<Cvec>(1);
    assert_eq!(manager.store_count(), 1);
    assert_eq!(manager.store::<Cvec>().unwrap().len(), 1);

    // A second creation of the same type reuses the store.
    manager.create_component::<Cvec>(2);
    assert_eq!(manager.store_count(), 1);
    assert_eq!(manager.store::<Cvec>().unwrap().len(), 2);
}

#[test]
fn register_with_config_sizes_the_store() {
    let mut manager = ComponentManager::new();
    manager.register_with_config::<Cvec>(StoreConfig {
        initial_size: 7,
        ..StoreConfig::default()
    });

    assert_eq!(manager.store::<Cvec>().unwrap().capacity(), 7);

    // Registration is idempotent; the existing store keeps its config.
    manager.register_with_config::<Cvec>(StoreConfig {
        initial_size: 99,
        ..StoreConfig::default()
    });
    assert_eq!(manager.store::<Cvec>().unwrap().capacity(), 7);
}

#[test]
fn typed_and_dynamic_lookup_share_one_store() {
    let mut manager = ComponentManager::new();
    manager.create_component::<Cvec>(1);

    let dynamic = manager.store_dyn(TypeId::of::<Cvec>()).unwrap();
    assert_eq!(dynamic.len(), 1);
    assert_eq!(dynamic.component_type(), TypeId::of::<Cvec>());
    assert_eq!(manager.store_count(), 1);

    assert!(manager.store_dyn(TypeId::of::<Pos>()).is_none());
}

#[test]
fn created_components_are_reachable_through_their_handles() {
    let mut manager = ComponentManager::new();
    let pos = manager.create_component_with(1, Pos { x: 15.0, y: 25.0 });

    assert!(pos.is_alive());
    assert_eq!(pos.entity(), 1);
    assert_eq!(pos.read(|p| (p.x, p.y)), Some((15.0, 25.0)));
}

#[test]
fn destroy_component_invalidates_the_handle() {
    let mut manager = ComponentManager::new();
    let handle = manager.create_component_with(1, Cvec(5)).untyped();

    manager.destroy_component(&handle).unwrap();
    assert!(!handle.is_alive());
    assert_eq!(manager.store::<Cvec>().unwrap().pending_cleanup(), 1);

    manager.cleanup_components();
    assert_eq!(manager.total_components(), 0);
}

#[test]
fn destroy_component_rejects_dead_handles() {
    let mut manager = ComponentManager::new();
    let handle = manager.create_component::<Cvec>(1).untyped();

    manager.destroy_component(&handle).unwrap();
    match manager.destroy_component(&handle) {
        Err(Error::DeadHandle(dead)) => assert_eq!(dead.action, "destroy component"),
        other => panic!("expected a dead handle error, got {:?}", other),
    }
}

#[test]
fn untyped_handles_round_trip_through_their_type() {
    let mut manager = ComponentManager::new();
    let typed = manager.create_component_with(1, Cvec(9));
    let untyped = typed.untyped();

    assert_eq!(untyped.component_type(), Some(TypeId::of::<Cvec>()));
    assert!(untyped.is_type::<Cvec>());
    assert!(!untyped.is_type::<Pos>());
    assert!(untyped.typed::<Pos>().is_none());

    let back = untyped.typed::<Cvec>().unwrap();
    assert_eq!(back.read(|c| c.0), Some(9));
    assert!(std::rc::Rc::ptr_eq(back.core(), typed.core()));
}

#[test]
fn events_arrive_in_operation_order() {
    let mut manager = ComponentManager::new();
    let mut reader = manager.track();

    let a = manager.create_component_with(1, Cvec(1));
    let b = manager.create_component_with(2, Cvec(2));
    let a_offset = a.core().offset();
    let a_version = a.core().version();
    manager.destroy_component(&a.untyped()).unwrap();

    let events: Vec<ComponentEvent> = manager.events(&mut reader).copied().collect();
    assert_eq!(
        events,
        vec![
            ComponentEvent::Created {
                entity: 1,
                component_type: TypeId::of::<Cvec>(),
                offset: a_offset,
                version: a_version,
            },
            ComponentEvent::Created {
                entity: 2,
                component_type: TypeId::of::<Cvec>(),
                offset: b.core().offset(),
                version: b.core().version(),
            },
            ComponentEvent::Removed {
                entity: 1,
                component_type: TypeId::of::<Cvec>(),
                offset: a_offset,
                version: a_version,
            },
        ]
    );
}

#[test]
fn removed_events_keep_the_pre_invalidation_identity() {
    let mut manager = ComponentManager::new();
    let mut reader = manager.track();

    let handle = manager.create_component_with(3, Cvec(3)).untyped();
    let offset = handle.core().offset();
    let version = handle.core().version();
    manager.destroy_component(&handle).unwrap();

    let removed = manager
        .events(&mut reader)
        .copied()
        .find(|event| matches!(event, ComponentEvent::Removed { .. }))
        .unwrap();
    assert_eq!(
        removed,
        ComponentEvent::Removed {
            entity: 3,
            component_type: TypeId::of::<Cvec>(),
            offset,
            version,
        }
    );
}

#[test]
fn cleanup_components_compacts_every_store() {
    let mut manager = ComponentManager::new();
    let cvec = manager.create_component_with(1, Cvec(1)).untyped();
    let pos = manager.create_component_with(1, Pos::default()).untyped();
    manager.create_component_with(2, Cvec(2));
    manager.create_component_with(2, Pos::default());

    manager.destroy_component(&cvec).unwrap();
    manager.destroy_component(&pos).unwrap();
    assert_eq!(manager.total_components(), 4);

    manager.cleanup_components();
    assert_eq!(manager.total_components(), 2);
    assert_eq!(manager.store::<Cvec>().unwrap().len(), 1);
    assert_eq!(manager.store::<Pos>().unwrap().len(), 1);
}

#[test]
fn create_destroy_cycle_restores_pool_balance() {
    let mut manager = ComponentManager::new();

    let handles: Vec<UntypedRef> = (1..=50)
        .map(|entity| manager.create_component::<Cvec>(entity).untyped())
        .collect();
    assert_eq!(manager.pool().idle(), 0);

    for handle in &handles {
        manager.destroy_component(handle).unwrap();
    }
    manager.cleanup_components();

    assert_eq!(manager.total_components(), 0);
    assert_eq!(manager.store::<Cvec>().unwrap().len(), 0);
    assert_eq!(manager.pool().idle(), 50);
}

#[test]
fn stores_share_the_manager_pool() {
    let mut manager = ComponentManager::new();
    let cvec = manager.create_component_with(1, Cvec(1)).untyped();
    manager.destroy_component(&cvec).unwrap();
    assert_eq!(manager.pool().idle(), 1);

    // The pooled body is reused by the next creation, of any type.
    manager.create_component_with(2, Pos::default());
    assert_eq!(manager.pool().idle(), 0);
}

#[test]
fn mixed_component_types_keep_separate_stores() {
    let mut manager = ComponentManager::new();

    manager.create_component_with(1, Pos { x: 1.0, y: 1.0 });
    manager.create_component_with(1, Cvec(1));
    manager.create_component_with(2, Pos { x: 2.0, y: 2.0 });
    manager.create_component_with(2, Health(50));

    assert_eq!(manager.store_count(), 3);
    let positions = manager.store::<Pos>().unwrap();
    assert!(positions.find(1).is_some());
    assert!(positions.find(2).is_some());
    let cvecs = manager.store::<Cvec>().unwrap();
    assert!(cvecs.find(1).is_some());
    assert!(cvecs.find(2).is_none());
    let healths = manager.store::<Health>().unwrap();
    assert!(healths.find(1).is_none());
    assert!(healths.find(2).is_some());
}
