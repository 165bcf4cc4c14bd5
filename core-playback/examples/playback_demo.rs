//! # Playback Engine Demo
//!
//! Drives a player over the simulated native player: builds a playlist with
//! an unavailable entry, seeks, skips and lets items play to their end.
//!
//! Run with: `cargo run --example playback_demo --package core-playback`

use bridge_traits::{MediaTime, NativeError};
use core_playback::simulation::{SimulatedMedia, SimulatedPlayer};
use core_playback::{Player, PlayerConfiguration, PlayerItem, PlayerProperties, Result, SeekPosition};
use core_runtime::config::CoreConfig;
use core_runtime::logging::{init_logging, LoggingConfig};
use std::sync::Arc;
use std::time::Duration;

fn describe(properties: &PlayerProperties) {
    println!(
        "  current={:<10} index={:?} state={:<8} stream={:<9} time={}",
        properties
            .current_item
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string()),
        properties.current_index,
        properties.playback_state.as_str(),
        properties.stream_type.as_str(),
        properties.time,
    );
}

async fn settle(player: &Player) -> PlayerProperties {
    tokio::time::sleep(Duration::from_millis(20)).await;
    player.properties()
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(LoggingConfig::default().with_filter("core_playback=debug"))?;

    let native = Arc::new(SimulatedPlayer::new());
    native.register_media("https://cdn.example.com/intro.m3u8", SimulatedMedia::on_demand(30.0));
    native.register_media("https://cdn.example.com/feature.m3u8", SimulatedMedia::on_demand(5400.0));
    native.register_media("https://cdn.example.com/live.m3u8", SimulatedMedia::dvr(7200.0));

    let core = CoreConfig::builder().native_player(native.clone()).build()?;
    let player = Player::new(core, PlayerConfiguration::default())?;

    println!("Loading playlist");
    player
        .set_items(vec![
            PlayerItem::from_url("intro", "https://cdn.example.com/intro.m3u8"),
            PlayerItem::from_url("feature", "https://cdn.example.com/feature.m3u8"),
            PlayerItem::unavailable("geo-blocked", NativeError::new("ContentDomain", 451)),
            PlayerItem::from_url("live", "https://cdn.example.com/live.m3u8"),
        ])
        .await?;
    player.play().await?;
    describe(&player.properties());

    println!("Seeking past the end of the intro");
    let finished = player
        .seek(SeekPosition::to(MediaTime::from_seconds(600.0)), false)
        .await?;
    println!("  finished={finished}");
    describe(&player.properties());

    println!("Intro plays to its end");
    native.play_to_end();
    describe(&settle(&player).await);

    println!("Skipping forward");
    player.skip_forward().await?;
    describe(&settle(&player).await);

    println!("Feature plays to its end");
    native.play_to_end();
    describe(&settle(&player).await);

    println!("Advancing past the unavailable item");
    player.advance_to_next_item().await?;
    describe(&settle(&player).await);

    player.shutdown().await?;
    println!("Done");
    Ok(())
}
