//! Property tests for the double-buffered state model.
//!
//! These tests use `proptest` to generate random frames of staged operations
//! and verify that the current generation only ever changes at a commit, and
//! that the committed layer index stays a partition of the population.

use std::collections::{BTreeMap, HashMap};

use proptest::prelude::*;
use strata_ecs::prelude::*;

/// Operations staged within a frame.
#[derive(Debug, Clone)]
enum FrameOp {
    Create(u8),
    Destroy(usize),
    Move(usize, u8),
    AddHealth(usize),
    RemoveHealth(usize),
    SetHp(usize, i64),
}

const LAYERS: [&str; 3] = ["alive", "dead", "limbo"];

fn frame_op_strategy() -> impl Strategy<Value = FrameOp> {
    prop_oneof![
        (0..3u8).prop_map(FrameOp::Create),
        (0..50usize).prop_map(FrameOp::Destroy),
        (0..50usize, 0..3u8).prop_map(|(i, l)| FrameOp::Move(i, l)),
        (0..50usize).prop_map(FrameOp::AddHealth),
        (0..50usize).prop_map(FrameOp::RemoveHealth),
        (0..50usize, -1_000i64..1_000).prop_map(|(i, v)| FrameOp::SetHp(i, v)),
    ]
}

fn new_world() -> World {
    let schema = ComponentSchema::builder()
        .component("health", [("hp", Value::from(100))])
        .build()
        .unwrap();
    World::new(schema)
}

/// Everything observable through the read side of the world.
#[derive(Debug, PartialEq)]
struct Observed {
    order: Vec<EntityId>,
    layers: BTreeMap<String, Vec<EntityId>>,
    hp: HashMap<EntityId, Option<Value>>,
    entity_count: usize,
}

fn observe(world: &World) -> Observed {
    let mut order = Vec::new();
    let mut hp = HashMap::new();
    world.for_each_entity(|e| {
        order.push(e.id());
        hp.insert(e.id(), e.get("health", "hp").ok().cloned());
    });
    let layers = LAYERS
        .iter()
        .map(|&l| {
            let mut ids = Vec::new();
            world.for_each_entity_in(&[l], |e| ids.push(e.id()));
            (l.to_owned(), ids)
        })
        .collect();
    Observed {
        order,
        layers,
        hp,
        entity_count: world.entity_count(),
    }
}

fn pick(known: &[EntityId], i: usize) -> Option<EntityId> {
    (!known.is_empty()).then(|| known[i % known.len()])
}

/// Stage `op`, ignoring precondition failures. Returns `true` if it was
/// accepted.
fn stage_op(world: &mut World, known: &mut Vec<EntityId>, op: &FrameOp) -> bool {
    match *op {
        FrameOp::Create(l) => {
            known.push(world.create_entity(LAYERS[l as usize]));
            true
        }
        FrameOp::Destroy(i) => pick(known, i).is_some_and(|e| world.destroy_entity(e).is_ok()),
        FrameOp::Move(i, l) => {
            pick(known, i).is_some_and(|e| world.move_entity(e, LAYERS[l as usize]).is_ok())
        }
        FrameOp::AddHealth(i) => pick(known, i).is_some_and(|e| {
            world
                .entity_mut(e)
                .and_then(|mut m| m.add(["health"]))
                .is_ok()
        }),
        FrameOp::RemoveHealth(i) => pick(known, i).is_some_and(|e| {
            world
                .entity_mut(e)
                .and_then(|mut m| m.remove(["health"]))
                .is_ok()
        }),
        FrameOp::SetHp(i, v) => pick(known, i).is_some_and(|e| {
            world
                .entity_mut(e)
                .and_then(|mut m| m.set("health", "hp", v))
                .is_ok()
        }),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    /// No staged operation is observable before the commit, and after every
    /// commit the layer index partitions the population.
    #[test]
    fn staged_ops_invisible_until_commit(
        frames in prop::collection::vec(prop::collection::vec(frame_op_strategy(), 0..25), 1..6)
    ) {
        let mut world = new_world();
        let mut known: Vec<EntityId> = Vec::new();

        for frame in &frames {
            let before = observe(&world);
            for op in frame {
                stage_op(&mut world, &mut known, op);
                prop_assert_eq!(&observe(&world), &before);
            }

            let report = world.apply_changes().unwrap();
            prop_assert_eq!(report.entity_count, world.entity_count());

            // Layer partition.
            let after = observe(&world);
            let layered: usize = after.layers.values().map(Vec::len).sum();
            prop_assert_eq!(layered, world.entity_count());
            let mut unique = after.order.clone();
            unique.sort_by_key(|e| e.to_raw());
            unique.dedup();
            prop_assert_eq!(unique.len(), after.order.len());
            for id in &after.order {
                prop_assert!(world.is_alive(*id));
            }

            known.retain(|e| world.is_alive(*e));
        }
    }

    /// A value set once keeps reading back across any number of later
    /// commits in which the entity is not touched.
    #[test]
    fn set_values_carry_forward(value in any::<i64>(), idle_frames in 1..8usize) {
        let mut world = new_world();
        let e = world.create_entity("alive");
        world.entity_mut(e).unwrap().add(["health"]).unwrap();
        world.apply_changes().unwrap();
        world.entity_mut(e).unwrap().set("health", "hp", value).unwrap();
        world.apply_changes().unwrap();

        for _ in 0..idle_frames {
            world.create_entity("noise");
            world.apply_changes().unwrap();
        }
        let entity = world.entity(e).unwrap();
        prop_assert_eq!(entity.get("health", "hp").unwrap(), &Value::Int(value));
    }

    /// Destroying an entity any number of times in a frame decrements the
    /// staged count exactly once.
    #[test]
    fn repeated_destroy_decrements_once(population in 1..20usize, repeats in 1..5usize) {
        let mut world = new_world();
        let ids: Vec<_> = (0..population).map(|_| world.create_entity("alive")).collect();
        world.apply_changes().unwrap();

        let target = ids[population / 2];
        prop_assert!(world.destroy_entity(target).is_ok());
        for _ in 1..repeats {
            prop_assert_eq!(
                world.destroy_entity(target),
                Err(EcsError::EntityNotStaged { entity: target })
            );
        }
        prop_assert_eq!(world.staged_count(), population - 1);
        let report = world.apply_changes().unwrap();
        prop_assert_eq!(report.destroyed, 1);
        prop_assert_eq!(world.entity_count(), population - 1);
    }
}
