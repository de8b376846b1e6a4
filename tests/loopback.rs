mod common;

use std::sync::Arc;
use std::time::Duration;

use arena_netcode::clock::UNASSIGNED_PEER;
use arena_netcode::config::SimulationConfig;
use arena_netcode::game::{ServerSimulation, ServerStats};
use arena_netcode::net::{LoopbackTransport, TransportEvent};
use arena_netcode::protocol::{decode_frame, encode, ClockSyncMessage, Command, Message};
use arena_netcode::world::Intent;
use common::{Harness, Link};
use parking_lot::RwLock;
use tokio::sync::mpsc;

/// Key edges per client, as (step offset, key code, pressed).
const SCRIPT: &[(u64, &str, bool)] = &[
    (0, "KeyD", true),
    (30, "KeyS", true),
    (45, "KeyD", false),
    (50, "Space", true),
    (51, "Space", true),
    (53, "Space", false),
    (70, "KeyA", true),
    (90, "KeyS", false),
    (100, "KeyA", false),
];

#[test]
fn clients_converge_over_a_lossy_reordering_network() {
    let mut harness = Harness::new(42);
    for id in 1..=3 {
        harness.join(id, 0, Link::lossy(2, 2, 4), Link::lossy(2, 2, 0));
    }

    // Clock sync hands every client its player.
    for _ in 0..60 {
        harness.step_realtime();
    }
    for peer in 0..3 {
        assert_eq!(
            harness.peers[peer].client.controlled_entity(),
            Some(harness.entity(peer))
        );
        assert!(harness.peers[peer].client.clock().latency().is_some());
    }

    // Input while frames are lost, delayed and reordered.
    for step in 0..140u64 {
        for (peer, p) in harness.peers.iter_mut().enumerate() {
            let offset = peer as u64 * 7;
            for &(at, code, pressed) in SCRIPT {
                if at + offset != step {
                    continue;
                }
                if pressed {
                    p.client.key_down(code, at == 51, &mut p.connection);
                } else {
                    p.client.key_up(code, &mut p.connection);
                }
            }
        }
        harness.step_realtime();
    }

    // Heal the network, let in-flight frames land, then release every key
    // so lost key-ups cannot leave the authority walking.
    for peer in &mut harness.peers {
        peer.uplink.drop_every = 0;
        peer.uplink.jitter = 0;
        peer.downlink.jitter = 0;
    }
    for _ in 0..20 {
        harness.step_realtime();
    }
    for peer in 0..3 {
        let entity = harness.entity(peer);
        let p = &mut harness.peers[peer];
        p.client
            .issue_command(Command::input(entity, 0, Intent::MASK), &mut p.connection);
    }
    for _ in 0..400 {
        harness.step_realtime();
    }

    let entities: Vec<_> = harness.server.world().entities().collect();
    assert_eq!(entities.len(), 3);
    for peer in 0..3 {
        let world = harness.peers[peer].client.world();
        assert_eq!(world.len(), 3);
        for &entity in &entities {
            let authority = harness.authority(entity);
            let predicted = world.player(entity).expect("mirrored");
            assert_eq!(predicted.input, 0);
            assert!(
                predicted.translation.distance(authority.translation) < 1e-6,
                "peer {peer} sees {entity:?} at {:?}, authority at {:?}",
                predicted.translation,
                authority.translation
            );
        }
    }
}

#[test]
fn clock_estimate_tracks_link_latency() {
    let mut harness = Harness::new(1);
    harness.join(1, 0, Link::lossy(3, 0, 0), Link::lossy(3, 0, 0));
    for _ in 0..300 {
        harness.step_realtime();
    }

    let dt = harness.config.timestep;
    let client = &harness.peers[0].client;
    let rtt = client.clock().latency().expect("samples taken");
    // Three steps each way, plus the step the reply waits in the lane.
    assert!(rtt >= 6.0 * dt - 1e-9 && rtt <= 8.0 * dt + 1e-9, "rtt {rtt}");
    let lead = client.timestamp().ticks_since(harness.server.timestamp());
    assert!(lead > 0, "client trails the authority by {}", -lead);
}

#[tokio::test]
async fn tick_loop_serves_peers_until_senders_drop() {
    let (tx, rx) = mpsc::channel(64);
    let stats = Arc::new(RwLock::new(ServerStats::default()));
    let server = ServerSimulation::with_default_level(SimulationConfig::default(), 1);
    let handle = tokio::spawn(server.run(rx, stats.clone()));

    let (server_end, client_end) = LoopbackTransport::pair();
    tx.send(TransportEvent::Opened {
        peer: 9,
        transport: Box::new(server_end),
    })
    .await
    .unwrap();
    let request = ClockSyncMessage {
        peer_id: UNASSIGNED_PEER,
        peer_elapsed: 0.5,
        authority_elapsed: 0.0,
    };
    tx.send(TransportEvent::Frame {
        peer: 9,
        bytes: encode(&Message::ClockSync(request)),
    })
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;

    let seen = stats.read().clone();
    assert_eq!(seen.connections, 1);
    assert_eq!(seen.entities, 1);
    assert!(seen.tick > 0);
    assert!(seen.snapshots.total_snapshots > 0);

    let messages: Vec<Message> = client_end
        .take_inbound()
        .iter()
        .map(|frame| decode_frame(frame).unwrap())
        .collect();
    let reply = messages
        .iter()
        .find_map(|m| match m {
            Message::ClockSync(reply) => Some(*reply),
            _ => None,
        })
        .expect("clock sync answered");
    assert_eq!(reply.peer_elapsed, 0.5);
    assert_ne!(reply.peer_id, UNASSIGNED_PEER);
    assert!(messages
        .iter()
        .any(|m| matches!(m, Message::Snapshot(s) if s.players.len() == 1)));

    drop(tx);
    let joined = tokio_test::assert_ok!(tokio::time::timeout(Duration::from_secs(1), handle).await);
    tokio_test::assert_ok!(joined);
}
