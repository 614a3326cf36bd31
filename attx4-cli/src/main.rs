//! Demo harness driving the ambient module driver against the simulated
//! module, with a synthetic light/sound stimulus.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use attx4_lib::sim::SimulatedModule;
use attx4_lib::{Ambient, AmbientConfig};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

#[derive(Parser)]
#[command(name = "attx4-cli", about = "Ambient module demo harness")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the module firmware version
    Version,
    /// Read one light and one sound level
    Levels {
        /// Emit JSON instead of plain text
        #[arg(long)]
        json: bool,
    },
    /// Stream reading buffers at the polling cadence
    Stream {
        /// How many buffers to print per channel before exiting
        #[arg(long, default_value_t = 5)]
        count: usize,
    },
    /// Arm both triggers and print crossings as the module signals them
    Triggers {
        /// Light threshold fraction
        #[arg(long, default_value_t = 0.5)]
        light: f64,
        /// Sound threshold fraction
        #[arg(long, default_value_t = 0.1)]
        sound: f64,
    },
}

/// Feed the simulated module a deterministic stimulus: a slow triangle wave
/// on light, mostly-quiet sound with a periodic spike.
fn spawn_stimulus(module: Arc<SimulatedModule>) {
    tokio::spawn(async move {
        let mut tick: u32 = 0;
        loop {
            let phase = tick % 128;
            let light = if phase < 64 { phase * 16 } else { (128 - phase) * 16 };
            let sound = if tick % 40 == 0 { 700 } else { 30 + (tick % 7) * 4 };
            module.push_light_sample(light.min(1023) as u16);
            module.push_sound_sample(sound as u16);
            tick += 1;
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let module = Arc::new(SimulatedModule::new());
    spawn_stimulus(module.clone());

    let config = AmbientConfig {
        polling_frequency: Duration::from_millis(500),
        ..AmbientConfig::default()
    };
    let ambient = Ambient::with_config(module.hardware(), config).await?;
    info!(version = ambient.firmware_version(), "connected to module");

    match cli.command {
        Cmd::Version => {
            println!("firmware version: {}", ambient.firmware_version());
        }
        Cmd::Levels { json } => {
            // Let the stimulus produce a few samples first.
            tokio::time::sleep(Duration::from_millis(200)).await;
            let light = ambient.get_light_level().await?;
            let sound = ambient.get_sound_level().await?;
            if json {
                println!("{}", json!({ "light": light, "sound": sound }));
            } else {
                println!("light: {light:.3}");
                println!("sound: {sound:.3}");
            }
        }
        Cmd::Stream { count } => {
            let mut light = ambient.subscribe_light();
            let mut sound = ambient.subscribe_sound();
            for _ in 0..count {
                if let Some(buffer) = light.recv().await {
                    println!("light: {buffer:.3?}");
                }
                if let Some(buffer) = sound.recv().await {
                    println!("sound: {buffer:.3?}");
                }
            }
            ambient.disable();
        }
        Cmd::Triggers { light, sound } => {
            let confirmed_light = ambient.set_light_trigger(light).await?;
            let confirmed_sound = ambient.set_sound_trigger(sound).await?;
            println!("armed: light >= {confirmed_light:.3}, sound >= {confirmed_sound:.3}");

            let mut light_events = ambient.subscribe_light_trigger();
            let mut sound_events = ambient.subscribe_sound_trigger();
            for _ in 0..5 {
                tokio::select! {
                    Some(value) = light_events.recv() => println!("light trigger hit: {value:.3}"),
                    Some(value) = sound_events.recv() => println!("sound trigger hit: {value:.3}"),
                    else => break,
                }
            }
        }
    }

    Ok(())
}
