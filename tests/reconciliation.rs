mod common;

use arena_netcode::config::SimulationConfig;
use arena_netcode::game::ClientSimulation;
use arena_netcode::protocol::{Command, PlayerSnapshot, Snapshot, Timestamp};
use arena_netcode::world::arena::resting_height;
use arena_netcode::world::{Entity, Intent, PlayerState, World};
use arena_netcode::NetError;
use common::{Harness, Link};
use glam::{DQuat, DVec3};

const LEAD: u32 = 3;

fn assert_close(a: DVec3, b: DVec3, tolerance: f64) {
    assert!(
        a.distance(b) <= tolerance,
        "{a:?} and {b:?} differ by {}",
        a.distance(b)
    );
}

fn issue(harness: &mut Harness, peer: usize, on: u8, off: u8) {
    let entity = harness.entity(peer);
    let peer = &mut harness.peers[peer];
    peer.client
        .issue_command(Command::input(entity, on, off), &mut peer.connection);
}

/// Let the authority catch up with the client's tick.
fn settle_authority(harness: &mut Harness) {
    for _ in 0..LEAD {
        harness.server_tick();
    }
}

#[test]
fn prediction_matches_authority_under_input() {
    let mut harness = Harness::new(7);
    harness.join(1, LEAD, Link::perfect(), Link::perfect());
    let entity = harness.entity(0);

    let script: &[(usize, u8, u8)] = &[
        (60, Intent::RIGHT, 0),
        (75, Intent::UP, 0),
        (90, 0, Intent::RIGHT),
        (95, Intent::JUMP, 0),
        (96, 0, Intent::JUMP),
        (110, Intent::LEFT | Intent::JUMP, Intent::UP),
        (111, 0, Intent::JUMP),
        (130, 0, Intent::LEFT),
    ];

    for step in 0..180 {
        for &(at, on, off) in script {
            if at == step {
                issue(&mut harness, 0, on, off);
            }
        }
        harness.step();
    }

    let client = &harness.peers[0].client;
    assert_eq!(client.last_correction(), 0.0);
    assert!(client.resimulated_ticks() > 0);
    assert!(client.confirmed().is_some());

    settle_authority(&mut harness);
    assert_eq!(harness.server.timestamp(), harness.peers[0].client.timestamp());
    let authority = harness.authority(entity);
    let predicted = harness.predicted(0, entity);
    assert_close(predicted.translation, authority.translation, 1e-9);
    assert_eq!(predicted.input, authority.input);
    assert_eq!(predicted.grounded, authority.grounded);
}

#[test]
fn authority_correction_overrides_prediction() {
    let mut harness = Harness::new(11);
    harness.join(1, LEAD, Link::perfect(), Link::perfect());
    let entity = harness.entity(0);
    harness.run(90);

    // Something the client could not predict moves its player.
    let target = DVec3::new(-60.0, resting_height(), -60.0);
    let moved = PlayerState {
        translation: target,
        force: DVec3::ZERO,
        grounded: true,
        ..harness.authority(entity)
    };
    harness.server.world_mut().set_player(entity, moved).unwrap();

    let mut worst = 0.0f64;
    for _ in 0..4 {
        harness.step();
        worst = worst.max(harness.peers[0].client.last_correction());
    }
    assert!(worst > 40.0, "correction of {worst} too small");

    harness.run(10);
    assert_eq!(harness.peers[0].client.last_correction(), 0.0);
    settle_authority(&mut harness);
    assert_close(harness.predicted(0, entity).translation, target, 1e-9);
    assert_close(
        harness.predicted(0, entity).translation,
        harness.authority(entity).translation,
        1e-9,
    );
}

#[test]
fn jump_edge_applies_once_on_both_sides() {
    let mut harness = Harness::new(3);
    harness.join(1, LEAD, Link::perfect(), Link::perfect());
    let entity = harness.entity(0);
    harness.run(120);
    let floor = harness.authority(entity).translation.y;
    assert!(harness.authority(entity).grounded);

    // Jump held down for many ticks still yields a single impulse.
    issue(&mut harness, 0, Intent::JUMP, 0);
    let mut apex = floor;
    for _ in 0..90 {
        harness.step();
        apex = apex.max(harness.authority(entity).translation.y);
    }
    issue(&mut harness, 0, 0, Intent::JUMP);
    harness.run(5);

    assert!(apex > floor + 1.0);
    settle_authority(&mut harness);
    let authority = harness.authority(entity);
    assert!(authority.grounded);
    assert!((authority.translation.y - floor).abs() < 0.05);
    assert_close(harness.predicted(0, entity).translation, authority.translation, 1e-9);
}

#[test]
fn disconnected_client_keeps_predicting() {
    let mut harness = Harness::new(5);
    harness.join(1, LEAD, Link::perfect(), Link::perfect());
    let entity = harness.entity(0);
    harness.run(120);

    harness.drop_connection(0);
    assert!(harness.server.entity_of(1).is_none());
    assert!(harness.server.world().is_empty());

    let before = harness.predicted(0, entity).translation;
    issue(&mut harness, 0, Intent::LEFT, 0);
    harness.run(30);

    let peer = &harness.peers[0];
    assert!(!peer.connection.is_open());
    assert_eq!(peer.client.pending_commands(), 1);
    let after = harness.predicted(0, entity).translation;
    assert!(after.x < before.x - 1.0, "no local movement: {before:?} -> {after:?}");
}

#[test]
fn late_joiner_sees_existing_players() {
    let mut harness = Harness::new(9);
    harness.join(1, LEAD, Link::perfect(), Link::perfect());
    harness.run(30);
    harness.join(2, LEAD, Link::perfect(), Link::perfect());
    harness.run(30);

    let first = harness.entity(0);
    let second = harness.entity(1);
    assert_ne!(first, second);
    for peer in 0..2 {
        let world = harness.peers[peer].client.world();
        assert!(world.contains(first));
        assert!(world.contains(second));
    }

    harness.drop_connection(1);
    harness.run(4);
    assert!(!harness.peers[0].client.world().contains(second));
}

#[test]
fn reconnect_into_a_reused_slot_reaches_other_clients() {
    let mut harness = Harness::new(13);
    harness.join(1, LEAD, Link::perfect(), Link::perfect());
    harness.join(2, LEAD, Link::perfect(), Link::perfect());
    harness.run(30);
    let departed = harness.entity(0);
    assert!(harness.peers[1].client.world().contains(departed));

    // Leave and rejoin before the authority ticks again.
    harness.drop_connection(0);
    let rejoined = harness.join(3, LEAD, Link::perfect(), Link::perfect());
    let replacement = harness.entity(rejoined);
    assert_eq!(replacement.index(), departed.index());
    assert_ne!(replacement, departed);

    harness.run(4);
    for peer in [1, rejoined] {
        let world = harness.peers[peer].client.world();
        assert!(world.contains(replacement));
        assert!(!world.contains(departed));
        assert_eq!(world.len(), 2);
    }
}

#[test]
fn stale_snapshot_is_rejected_without_side_effects() {
    let mut client = ClientSimulation::with_default_level(SimulationConfig::default());
    let entity = Entity::new(0, 0);
    let snapshot = |ts: i16, x: f64| Snapshot {
        timestamp: Timestamp::new(ts),
        players: vec![PlayerSnapshot {
            entity,
            translation: DVec3::new(x, 10.0, 0.0),
            rotation: DQuat::IDENTITY,
            force: DVec3::ZERO,
            grounded: false,
            input: 0,
        }],
    };

    client.reconcile(snapshot(100, -40.0)).unwrap();
    let held = client.world().player(entity).unwrap();
    let replayed = client.resimulated_ticks();

    assert_eq!(
        client.reconcile(snapshot(90, 40.0)),
        Err(NetError::StaleSnapshot {
            held: Timestamp::new(100),
            received: Timestamp::new(90),
        })
    );
    assert_eq!(
        client.reconcile(snapshot(100, 40.0)),
        Err(NetError::StaleSnapshot {
            held: Timestamp::new(100),
            received: Timestamp::new(100),
        })
    );
    assert_eq!(client.confirmed(), Some(Timestamp::new(100)));
    assert_eq!(client.world().player(entity).unwrap(), held);
    assert_eq!(client.resimulated_ticks(), replayed);
}

#[test]
fn snapshot_across_timestamp_wrap_is_newer() {
    let mut client = ClientSimulation::with_default_level(SimulationConfig::default());
    let mut authority = World::with_default_level();
    let entity = authority
        .spawn_player(DVec3::new(-50.0, resting_height(), -50.0))
        .unwrap();

    client
        .reconcile(authority.snapshot(Timestamp::new(i16::MAX)))
        .unwrap();
    client
        .reconcile(authority.snapshot(Timestamp::new(i16::MIN)))
        .unwrap();
    assert_eq!(client.confirmed(), Some(Timestamp::new(i16::MIN)));
    assert!(client.world().contains(entity));
}
