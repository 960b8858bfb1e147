//! Subtitle engine demo
//!
//! Runs the timing engine against a wall clock and the headless renderer,
//! scripting a short playback session: an OSD banner, subtitles from a
//! demuxed SubRip stream, a delay change, a pause and a seek.
//!
//! Usage: `subtitle-engine [config.toml]` or
//! `subtitle-engine --generate-config [path]`.

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use subtitle_engine::config_file::{generate_default_config, ConfigFile};
use subtitle_engine::{
    Cue, EngineConfig, HeadlessRenderer, Result, SubtitleCodec, SubtitleController,
    SubtitleError, SubtitlePacket, WallClock,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "subtitle-engine";

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "config.toml".to_string());

    if config_path == "--generate-config" {
        let path = args.next().unwrap_or_else(|| "config.toml".to_string());
        generate_default_config(&path).map_err(|e| SubtitleError::Config(e.to_string()))?;
        println!("Wrote default configuration to {}", path);
        return Ok(());
    }

    // Load configuration
    let mut load_error = None;
    let config = if std::path::Path::new(&config_path).exists() {
        match ConfigFile::from_file(&config_path) {
            Ok(cf) => cf.into_engine_config(),
            Err(e) => {
                load_error = Some(e.to_string());
                EngineConfig::default()
            }
        }
    } else {
        EngineConfig::default()
    };

    // Initialize logging
    init_logging(&config.log_level, &config.log_format);

    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    if let Some(e) = load_error {
        tracing::warn!(
            "Failed to load config file {}: {}. Using defaults.",
            config_path,
            e
        );
    }
    tracing::info!("Configuration loaded: {:?}", config);

    let clock = Arc::new(WallClock::new(0));
    let renderer = Box::new(HeadlessRenderer::new(&config.renderer));
    let controller = SubtitleController::new(config, renderer, clock.clone())?;

    run_session(&controller, &clock).await?;

    tokio::task::spawn_blocking(move || {
        let mut controller = controller;
        controller.shutdown()
    })
    .await
    .map_err(|e| SubtitleError::Runtime(e.to_string()))??;

    tracing::info!("{} finished", APP_NAME);
    Ok(())
}

/// Scripted playback against the wall clock
async fn run_session(controller: &SubtitleController, clock: &WallClock) -> Result<()> {
    controller.open(1, Vec::<Cue>::new());
    controller.display_text_long(&format!("{} v{}", APP_NAME, VERSION));

    let packets = [
        (500, 1500, "<i>Previously...</i>"),
        (1800, 1200, "{\\c&H00FFFF&}Who's there?"),
        (3200, 1500, "Nobody.\\NJust the <b>wind</b>."),
        (5000, 1000, "..."),
    ];
    for (start_ms, duration_ms, text) in packets {
        let packet = SubtitlePacket::text(
            SubtitleCodec::SubRip,
            start_ms * 1000,
            duration_ms * 1000,
            text.as_bytes().to_vec(),
        );
        controller.add_packet(&packet, 0)?;
    }

    sleep_ms(2500).await;
    controller.adjust_delay(1);

    sleep_ms(1000).await;
    clock.pause();
    controller.pause();
    tracing::info!("Paused at {} ms", clock_ms(clock));

    sleep_ms(1000).await;
    clock.resume();
    controller.resume();

    sleep_ms(500).await;
    clock.seek(1000);
    controller.flush();
    for (start_ms, duration_ms, text) in packets.iter().skip(1) {
        let packet = SubtitlePacket::text(
            SubtitleCodec::SubRip,
            start_ms * 1000,
            duration_ms * 1000,
            text.as_bytes().to_vec(),
        );
        controller.add_packet(&packet, 0)?;
    }

    sleep_ms(3000).await;
    controller.clear();
    Ok(())
}

fn clock_ms(clock: &WallClock) -> i64 {
    use subtitle_engine::PlaybackClock;
    clock.media_time_ms()
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Initialize logging with tracing
fn init_logging(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("subtitle_engine={}", level).into());

    if format.eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
