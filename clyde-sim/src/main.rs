//! Clyde simulator — several devices sharing one AR scene in-process.
//!
//! Runs a `SessionTracker` per simulated device over the loopback hub and
//! walks through a session: peers join (one too many), content is placed
//! and shared, a device resets its tracking session, another leaves.
//!
//! Set `RUST_LOG=debug` for routing details. `CLYDE_CONFIG` may hold a
//! `TrackerConfig` as JSON.

use std::sync::Arc;
use std::time::Duration;

use clyde_collab::{
    ArEngine, LoopbackHub, PeerId, SceneEngine, SessionTracker, TrackerConfig, Transform,
};
use log::info;
use tokio::sync::mpsc;

struct Device {
    name: &'static str,
    id: PeerId,
    engine: Arc<SceneEngine>,
    tracker: Arc<SessionTracker>,
}

fn spawn_device(hub: &Arc<LoopbackHub>, name: &'static str, config: &TrackerConfig) -> Device {
    let id = PeerId::new();
    let (network, network_rx) = hub.register(id, config.event_capacity);
    let engine = Arc::new(SceneEngine::new());
    let (engine_tx, engine_rx) = mpsc::channel(config.event_capacity);
    engine.attach(engine_tx);

    let tracker = Arc::new(SessionTracker::new(
        config.clone(),
        Arc::new(network),
        engine.clone(),
        Default::default(),
    ));

    // Drain placements the way a renderer would.
    if let Some(mut placements) = tracker.take_placement_rx() {
        tokio::spawn(async move {
            while let Some(request) = placements.recv().await {
                info!(
                    "[{name}] render {} (scale {}) on anchor {}",
                    request.model.asset_file(),
                    request.model.scale_compensation,
                    request.anchor_id
                );
            }
        });
    }

    // The UI side repaints the status dot whenever it changes.
    let mut status = tracker.status_rx();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            let [r, g, b, _] = current.color();
            info!("[{name}] status dot {current:?} rgb({r:.2}, {g:.2}, {b:.2})");
        }
    });

    let runner = tracker.clone();
    tokio::spawn(async move {
        runner.run(network_rx, engine_rx).await;
    });

    info!("[{name}] online as {id}, session {}", engine.session_id());
    Device { name, id, engine, tracker }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

fn report(device: &Device) {
    let stats = device.tracker.stats();
    info!(
        "[{}] anchors={} status={:?} sent={} dropped={} merged={} announced={} removed={} ignored={} rejected={}",
        device.name,
        device.engine.anchors().len(),
        device.tracker.connection_status(),
        stats.blobs_sent,
        stats.blobs_dropped,
        stats.blobs_merged,
        stats.announcements_sent,
        stats.anchors_removed,
        stats.payloads_ignored,
        stats.peers_rejected,
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::var("CLYDE_CONFIG") {
        Ok(json) => TrackerConfig::from_json(&json)?,
        Err(_) => TrackerConfig::default(),
    };
    let hub = LoopbackHub::new();
    let host = spawn_device(&hub, "host", &config);
    let guests: Vec<Device> = ["anna", "ben", "cleo", "dan", "eve"]
        .into_iter()
        .map(|name| spawn_device(&hub, name, &config))
        .collect();

    // Tracking data with nobody to receive it is dropped.
    host.engine.share_tracking(vec![0u8; 64]);
    settle().await;

    for guest in &guests {
        let admitted = hub.connect(host.id, guest.id).await;
        info!("[host] {} -> {}", guest.name, if admitted { "admitted" } else { "rejected" });
    }
    settle().await;
    info!("[host] {} peers in directory", host.tracker.peer_count().await);

    for guest in &guests[..2] {
        guest.engine.share_presence();
    }
    host.tracker.place_model("earth", Transform::from_translation(0.0, 0.0, -1.0))?;
    guests[0].tracker.place_model("lamp", Transform::from_translation(0.5, 0.0, -1.0))?;
    guests[1].tracker.place_model("conch", Transform::from_translation(-0.5, 0.0, -1.0))?;
    settle().await;
    report(&host);

    let reset = guests[0].engine.reset_session();
    info!("[{}] tracking reset, new session {reset}", guests[0].name);
    settle().await;
    report(&host);

    info!("[{}] leaving", guests[1].name);
    hub.remove(guests[1].id).await;
    settle().await;

    report(&host);
    for guest in &guests {
        report(guest);
    }
    Ok(())
}
