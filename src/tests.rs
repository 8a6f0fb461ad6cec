use crate::{Bundle, Entity, EntityError, Registry, RegistryConfig};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Eq, PartialEq)]
struct Comp1 {
    a: u32,
    b: [u32; 4],
}

impl Comp1 {
    fn new() -> Self {
        let mut rng = rand::thread_rng();
        Comp1 {
            a: rng.gen(),
            b: [rng.gen(), rng.gen(), rng.gen(), rng.gen()],
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
struct Comp2 {
    a: Vec<Comp1>,
    c: [u32; 4],
}

impl Comp2 {
    fn new() -> Self {
        let mut rng = rand::thread_rng();
        Comp2 {
            a: (0..rng.gen_range(0..20)).map(|_| Comp1::new()).collect(),
            c: [rng.gen(), rng.gen(), rng.gen(), rng.gen()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position(f32, f32);

#[derive(Debug, Clone, Copy, PartialEq)]
struct Velocity(f32, f32);

#[derive(Debug, Clone, Copy, PartialEq)]
struct A(u32);

#[derive(Debug, Clone, Copy, PartialEq)]
struct B(u32);

#[derive(Debug, Clone, Copy, PartialEq)]
struct C(u32);

#[test]
fn it_works() {
    let mut registry = Registry::new();

    let e00v = Comp1::new();
    let e01v = Comp2::new();
    let e1v = Comp1::new();
    let e2v = Comp2::new();

    let _e0 = registry.create((e00v.clone(), e01v.clone())).unwrap();
    let e0 = registry.create((e00v.clone(), e01v.clone())).unwrap();
    let _e1 = registry.create((e1v.clone(),)).unwrap();
    let e1 = registry.create((e1v.clone(),)).unwrap();
    let _e2 = registry.create((e2v.clone(),)).unwrap();
    let e2 = registry.create((e2v.clone(),)).unwrap();

    assert_eq!(registry.len(), 6);

    let (v00, v01) = registry.get::<(&Comp1, &Comp2)>(e0).unwrap();
    assert_eq!(v00, &e00v);
    assert_eq!(v01, &e01v);
    assert_eq!(registry.get::<&Comp1>(e1).unwrap(), &e1v);
    assert_eq!(registry.get::<&Comp2>(e2).unwrap(), &e2v);

    registry.destroy(e0).unwrap();
    assert_eq!(registry.destroy(e0), Err(EntityError::Stale(e0)));
    assert_eq!(registry.len(), 5);
}

#[test]
fn alive_handles_are_unique() {
    let mut rng = rand::thread_rng();
    let mut registry = Registry::new();
    let mut alive: Vec<Entity> = Vec::new();

    for _ in 0..5000 {
        if alive.is_empty() || rng.gen_bool(0.6) {
            let entity = match rng.gen_range(0..3) {
                0 => registry.create((A(0),)),
                1 => registry.create((A(0), B(0))),
                _ => registry.create_empty(),
            }
            .unwrap();
            alive.push(entity);
        } else {
            let entity = alive.swap_remove(rng.gen_range(0..alive.len()));
            registry.destroy(entity).unwrap();
        }

        let distinct: HashSet<_> = alive.iter().map(|e| (e.index(), e.generation())).collect();
        assert_eq!(distinct.len(), alive.len());
    }

    assert_eq!(registry.len(), alive.len());
    assert!(alive.iter().all(|&e| registry.is_alive(e)));
    let listed: HashSet<_> = registry.entities().collect();
    assert_eq!(listed, alive.into_iter().collect::<HashSet<_>>());
}

#[test]
fn added_component_round_trips() {
    let mut registry = Registry::new();
    let entity = registry.create((A(1),)).unwrap();
    let value = Comp2::new();

    registry.add_component(entity, value.clone()).unwrap();
    assert_eq!(registry.get::<&Comp2>(entity).unwrap(), &value);
    assert_eq!(registry.get::<&A>(entity).unwrap(), &A(1));
}

#[test]
fn removed_component_leaves_view() {
    let mut registry = Registry::new();
    let entity = registry.create((A(1), B(2))).unwrap();
    let other = registry.create((B(3),)).unwrap();

    assert_eq!(registry.remove_component::<B>(entity), Ok(B(2)));
    let view = registry.view::<&B>();
    assert!(matches!(view.get(entity), Err(EntityError::MissingComponent { .. })));
    assert!(!view.contains(entity));
    assert!(view.contains(other));
    assert_eq!(view.count(), 1);
    assert_eq!(registry.has::<B>(entity), Ok(false));
}

#[test]
fn reused_index_gets_newer_generation() {
    let mut registry = Registry::new();
    let old = registry.create((A(1),)).unwrap();
    registry.destroy(old).unwrap();

    let new = registry.create((A(2),)).unwrap();
    assert_eq!(new.index(), old.index());
    assert!(new.generation() > old.generation());

    assert!(!registry.is_alive(old));
    assert_eq!(registry.get::<&A>(old), Err(EntityError::Stale(old)));
    assert_eq!(registry.add_component(old, B(0)), Err(EntityError::Stale(old)));
    assert_eq!(registry.remove_component::<A>(old), Err(EntityError::Stale(old)));
    assert_eq!(registry.destroy(old), Err(EntityError::Stale(old)));
    assert!(registry.entry(old).is_err());

    // The live entity is untouched by operations through the stale handle.
    assert_eq!(registry.get::<&A>(new).unwrap(), &A(2));
}

#[test]
fn swap_remove_keeps_chunks_dense() {
    let mut rng = rand::thread_rng();
    // Three rows per chunk.
    let config = RegistryConfig::new().with_chunk_size(3 * (4 + 8));
    let mut registry = Registry::with_config(config);

    let mut entities: Vec<_> = (0..50).map(|i| registry.create((A(i),)).unwrap()).collect();
    entities.shuffle(&mut rng);

    while let Some(entity) = entities.pop() {
        registry.destroy(entity).unwrap();

        let archetype = registry.archetype(registry_archetype_of_a(&registry)).unwrap();
        assert_eq!(archetype.chunk_capacity(), 3);
        let live: usize = archetype.chunks().iter().map(|chunk| chunk.len()).sum();
        assert_eq!(live, entities.len());

        // Only the last occupied chunk may be partially filled.
        let occupied: Vec<_> = archetype.chunks().iter().filter(|c| !c.is_empty()).collect();
        if let Some((_, full)) = occupied.split_last() {
            assert!(full.iter().all(|c| c.is_full()));
        }

        let mut seen: Vec<_> = registry.view::<&A>().iter().map(|a| a.0).collect();
        seen.sort_unstable();
        let mut expected: Vec<_> = entities
            .iter()
            .map(|&e| registry.get::<&A>(e).unwrap().0)
            .collect();
        expected.sort_unstable();
        assert_eq!(seen, expected);
    }
}

fn registry_archetype_of_a(registry: &Registry) -> crate::ArchetypeId {
    registry
        .archetypes()
        .iter()
        .find(|archetype| archetype.has::<A>())
        .map(|archetype| archetype.id())
        .unwrap()
}

#[test]
fn view_counts_match_population() {
    let mut rng = rand::thread_rng();
    let mut registry = Registry::with_config(RegistryConfig::new().with_chunk_size(256));
    let mut sets = Vec::new();

    for _ in 0..2000 {
        let (has_a, has_b, has_c) = (rng.gen_bool(0.5), rng.gen_bool(0.5), rng.gen_bool(0.5));
        let entity = registry.create_empty().unwrap();
        if has_a {
            registry.add_component(entity, A(1)).unwrap();
        }
        if has_b {
            registry.add_component(entity, B(2)).unwrap();
        }
        if has_c {
            registry.add_component(entity, C(3)).unwrap();
        }
        sets.push((entity, has_a, has_b, has_c));
    }

    for _ in 0..500 {
        let (entity, ..) = sets.swap_remove(rng.gen_range(0..sets.len()));
        registry.destroy(entity).unwrap();
    }

    let expected = |f: fn(&(Entity, bool, bool, bool)) -> bool| sets.iter().filter(|s| f(s)).count();

    assert_eq!(registry.view::<(&A, &B)>().count(), expected(|s| s.1 && s.2));
    assert_eq!(registry.view::<(&B, &C)>().count(), expected(|s| s.2 && s.3));
    assert_eq!(registry.view::<(&A, &B, &C)>().count(), expected(|s| s.1 && s.2 && s.3));
    assert_eq!(registry.view::<&C>().count(), expected(|s| s.3));
    assert_eq!(registry.view::<(&A, &B)>().iter().count(), expected(|s| s.1 && s.2));
    assert_eq!(registry.view::<Entity>().count(), sets.len());
}

#[test]
fn adding_velocity_preserves_position() {
    let mut registry = Registry::new();
    let entity = registry.create((Position(1.0, 2.0),)).unwrap();

    registry.add_component(entity, Velocity(0.5, 0.0)).unwrap();

    let (pos, vel) = registry.view::<(&Position, &Velocity)>().get(entity).unwrap();
    assert_eq!(pos, &Position(1.0, 2.0));
    assert_eq!(vel, &Velocity(0.5, 0.0));
    assert_eq!(registry.view::<&Position>().get(entity).unwrap(), &Position(1.0, 2.0));
    assert_eq!(registry.view::<(&Position, &Velocity)>().count(), 1);
    assert_eq!(registry.view::<&Position>().count(), 1);
}

#[test]
fn alternating_signatures_partition() {
    let mut registry = Registry::with_config(RegistryConfig::new().with_chunk_size(1024));
    let entities: Vec<_> = (0..1000)
        .map(|i| {
            if i % 2 == 0 {
                registry.create((A(i),)).unwrap()
            } else {
                registry.create((A(i), B(i))).unwrap()
            }
        })
        .collect();

    let with_b: Vec<_> = entities.iter().skip(1).step_by(2).copied().collect();
    for entity in with_b.iter().step_by(2) {
        assert_eq!(registry.remove_component::<B>(*entity).unwrap().0, entity.index());
    }

    assert_eq!(registry.view::<&A>().count(), 1000);
    assert_eq!(registry.view::<(&A, &B)>().count(), 250);
    assert_eq!(registry.view::<&B>().count(), 250);

    // Values survive the migrations.
    for (i, entity) in entities.iter().enumerate() {
        assert_eq!(registry.get::<&A>(*entity).unwrap(), &A(i as u32));
    }
}

#[derive(Bundle)]
struct Body {
    position: Position,
    velocity: Velocity,
}

#[derive(Bundle)]
struct Tagged<T: Send + Sync + 'static>(T, A);

#[test]
fn derived_bundles() {
    let mut registry = Registry::new();
    let body = registry
        .create(Body {
            position: Position(0.0, 1.0),
            velocity: Velocity(1.0, 0.0),
        })
        .unwrap();
    let tuple = registry.create((Velocity(0.0, 0.0), Position(5.0, 5.0))).unwrap();
    assert_eq!(
        registry.location(body).unwrap().archetype(),
        registry.location(tuple).unwrap().archetype()
    );

    let tagged = registry.create(Tagged(String::from("tag"), A(9))).unwrap();
    let (name, a) = registry.get::<(&String, &A)>(tagged).unwrap();
    assert_eq!((name.as_str(), a), ("tag", &A(9)));
}

#[test]
fn mutable_view_updates() {
    let mut registry = Registry::with_config(RegistryConfig::new().with_chunk_size(128));
    for i in 0..100 {
        registry.create((Position(i as f32, 0.0), Velocity(1.0, 2.0))).unwrap();
        registry.create((Position(i as f32, 0.0),)).unwrap();
    }

    registry
        .view_mut::<(&mut Position, &Velocity)>()
        .each(|(pos, vel)| {
            pos.0 += vel.0;
            pos.1 += vel.1;
        });

    let moved = registry
        .view::<(&Position, Option<&Velocity>)>()
        .iter()
        .filter(|(pos, vel)| vel.is_some() && pos.1 == 2.0)
        .count();
    assert_eq!(moved, 100);

    let mut view = registry.view_mut::<(Entity, Option<&mut Velocity>)>();
    for (_, vel) in view.iter() {
        if let Some(vel) = vel {
            vel.0 = 0.0;
        }
    }
    assert!(registry.view::<&Velocity>().iter().all(|v| v.0 == 0.0));
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn components_are_dropped_exactly_once() {
    let drops = Arc::new(AtomicUsize::new(0));
    let counter = || DropCounter(drops.clone());

    let mut registry = Registry::new();
    let a = registry.create((counter(), A(0))).unwrap();
    let b = registry.create((counter(),)).unwrap();
    let c = registry.create((counter(), B(0))).unwrap();
    let d = registry.create((A(1),)).unwrap();

    // Migrations move values without dropping them.
    registry.add_component(a, B(1)).unwrap();
    registry.remove_component::<A>(a).unwrap();
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    // Replacing drops the previous value.
    registry.add_component(b, counter()).unwrap();
    assert_eq!(drops.load(Ordering::SeqCst), 1);

    // Removing hands the value out.
    let removed = registry.remove_component::<DropCounter>(c).unwrap();
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    drop(removed);
    assert_eq!(drops.load(Ordering::SeqCst), 2);

    registry.add_component(d, counter()).unwrap();
    registry.destroy(b).unwrap();
    assert_eq!(drops.load(Ordering::SeqCst), 3);

    drop(registry);
    // `a` and `d` still held one each.
    assert_eq!(drops.load(Ordering::SeqCst), 5);
}

#[test]
fn failed_operations_drop_their_values() {
    let drops = Arc::new(AtomicUsize::new(0));
    let mut registry = Registry::new();

    let stale = registry.create_empty().unwrap();
    registry.destroy(stale).unwrap();

    assert!(registry.add_component(stale, DropCounter(drops.clone())).is_err());
    assert_eq!(drops.load(Ordering::SeqCst), 1);

    let duplicate = registry.create((DropCounter(drops.clone()), DropCounter(drops.clone())));
    assert!(matches!(duplicate, Err(EntityError::DuplicateComponent(_))));
    assert_eq!(drops.load(Ordering::SeqCst), 3);
}

#[test]
fn exhausted_capacity_rejects_create() {
    let drops = Arc::new(AtomicUsize::new(0));
    // No chunk of this size can ever be allocated.
    let mut registry = Registry::with_config(RegistryConfig::new().with_chunk_size(usize::MAX));

    let result = registry.create((A(1), DropCounter(drops.clone())));
    assert!(matches!(result, Err(EntityError::Capacity(_))));
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(registry.len(), 0);
    assert_eq!(registry.entities().count(), 0);

    // The index was handed back with a bumped generation.
    assert_eq!(registry.location(Entity::new(0, 0)), Err(EntityError::Stale(Entity::new(0, 0))));
    assert!(matches!(registry.create_empty(), Err(EntityError::Capacity(_))));
    assert_eq!(registry.location(Entity::new(1, 0)), Err(EntityError::NotFound(Entity::new(1, 0))));
    assert_eq!(registry.location(Entity::new(0, 2)), Err(EntityError::Stale(Entity::new(0, 2))));
    assert!(registry.is_empty());
}

#[test]
fn chunk_capacity_follows_config() {
    let mut registry = Registry::with_config(RegistryConfig::new().with_chunk_size(1));
    let entities: Vec<_> = (0..4).map(|i| registry.create((A(i),)).unwrap()).collect();

    let archetype = registry.archetype(registry_archetype_of_a(&registry)).unwrap();
    assert_eq!(archetype.chunk_capacity(), 1);
    assert_eq!(archetype.chunks().len(), 4);

    for entity in entities {
        registry.destroy(entity).unwrap();
    }
    let id = registry_archetype_of_a(&registry);
    assert_eq!(registry.archetype(id).unwrap().chunks().len(), 4);
    registry.shrink_to_fit();
    assert!(registry.archetype(id).unwrap().chunks().is_empty());
}

#[test]
fn zero_sized_components() {
    struct Marker;

    let mut registry = Registry::new();
    let marked: Vec<_> = (0..10).map(|i| registry.create((Marker, A(i))).unwrap()).collect();
    let _plain = registry.create((A(100),)).unwrap();

    assert_eq!(registry.view::<(&Marker, &A)>().count(), 10);
    registry.remove_component::<Marker>(marked[3]).unwrap();
    assert_eq!(registry.view::<&Marker>().count(), 9);
    assert_eq!(registry.has::<Marker>(marked[3]), Ok(false));
}

#[test]
fn registries_share_component_ids() {
    let mut first = Registry::new();
    let mut second = Registry::new();
    let a = first.create((Comp1::new(), A(0))).unwrap();
    let b = second.create((A(0), Comp1::new())).unwrap();

    assert_eq!(first.component_set(a).unwrap(), second.component_set(b).unwrap());
    let mut names = first.components_of(a).unwrap();
    names.sort_unstable();
    assert_eq!(names, [std::any::type_name::<A>(), std::any::type_name::<Comp1>()]);
}
