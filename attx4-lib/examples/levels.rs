//! Example: connect to the module and read single levels plus the full
//! ring buffer of each channel.
//!
//! Runs against the simulated module so it works without hardware; swap
//! [`SimulatedModule::hardware`] for your platform's pins and bus to drive
//! a real one.

use std::sync::Arc;
use std::time::Duration;

use attx4_lib::Ambient;
use attx4_lib::sim::SimulatedModule;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let module = Arc::new(SimulatedModule::new());

    // Stand-in for the firmware's ADC sampling timer.
    {
        let module = module.clone();
        tokio::spawn(async move {
            let mut tick: u32 = 0;
            loop {
                module.push_light_sample(((tick * 37) % 1024) as u16);
                module.push_sound_sample(((tick * 11) % 1024) as u16);
                tick = tick.wrapping_add(1);
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        });
    }

    let ambient = Ambient::new(module.hardware()).await?;
    println!("Connected, firmware version {}", ambient.firmware_version());

    // Give the stimulus a moment to fill the rings.
    tokio::time::sleep(Duration::from_millis(250)).await;

    println!("light level: {:.3}", ambient.get_light_level().await?);
    println!("sound level: {:.3}", ambient.get_sound_level().await?);
    println!("light buffer (newest first): {:.3?}", ambient.get_light_buffer().await?);
    println!("sound buffer (newest first): {:.3?}", ambient.get_sound_buffer().await?);

    Ok(())
}
