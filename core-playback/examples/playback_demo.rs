//! # Playback Engine Walkthrough
//!
//! Drives the engine against the headless desktop output: load a queue,
//! play, survive a notification chime, skip ahead and shut down, printing
//! every event the engine publishes.
//!
//! Run with: `cargo run --example playback_demo --package core-playback`

use bridge_desktop::{FocusKind, HeadlessOutput, LocalFocusArbiter, SqliteSettingsStore};
use bridge_traits::focus::AudioFocusProvider;
use core_library::catalog::InMemoryCatalog;
use core_library::models::Track;
use core_playback::{EngineParts, PlaybackEngine, PlayerConfig};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use std::sync::Arc;
use std::time::Duration;

fn demo_tracks() -> Vec<Track> {
    [
        (1, "Opening", "/music/opening.flac"),
        (2, "Interlude", "/music/interlude.flac"),
        (3, "Finale", "/music/finale.flac"),
    ]
    .into_iter()
    .map(|(id, title, path)| {
        Track::new(id, title, path)
            .with_artist("Demo Ensemble", Some(1))
            .with_album("Walkthrough", Some(1))
    })
    .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(LoggingConfig::default().with_format(LogFormat::Compact))?;

    // Every track lasts two seconds; nothing is read from disk.
    let output = HeadlessOutput::with_fixed_duration(Duration::from_secs(2));
    let arbiter = LocalFocusArbiter::new();
    let events = EventBus::new(256);
    let mut stream = events.stream().filter(|event| {
        !matches!(
            event,
            CoreEvent::Playback(PlaybackEvent::PositionChanged { .. })
        )
    });

    tokio::spawn(async move {
        while let Ok(event) = stream.recv().await {
            println!("[{:?}] {}", event.severity(), event.description());
        }
    });

    let (player, task) = PlaybackEngine::spawn(EngineParts {
        output: Box::new(output),
        focus: Arc::new(arbiter.client(FocusKind::Permanent)),
        settings: Arc::new(SqliteSettingsStore::in_memory().await?),
        catalog: Arc::new(InMemoryCatalog::new(demo_tracks())),
        events,
        config: PlayerConfig::default(),
    });

    println!("Loading queue");
    player.load_queue(demo_tracks(), 0).await?;
    player.play().await?;
    tokio::time::sleep(Duration::from_millis(800)).await;

    println!("Notification chime takes focus");
    let chime = arbiter.client(FocusKind::Transient);
    chime.request().await?;
    tokio::time::sleep(Duration::from_millis(300)).await;
    chime.abandon().await?;
    tokio::time::sleep(Duration::from_millis(300)).await;

    println!("Skipping ahead");
    player.dispatch_action("SKIP_NEXT").await?;
    tokio::time::sleep(Duration::from_secs(3)).await;

    let state = player.state().await?;
    println!(
        "Now on {:?} ({}), {} ms in",
        state.current_track.map(|track| track.title),
        state.status,
        state.position_ms
    );

    player.shutdown().await?;
    task.await?;
    Ok(())
}
