//! Example: arm a sound trigger, clear it on each hit so it stops firing,
//! and re-arm after a pause. This is the intended pattern for sparse event
//! detection without flooding the host.

use std::sync::Arc;
use std::time::Duration;

use attx4_lib::Ambient;
use attx4_lib::sim::SimulatedModule;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let module = Arc::new(SimulatedModule::new());

    // Quiet background with an occasional loud spike.
    {
        let module = module.clone();
        tokio::spawn(async move {
            let mut tick: u32 = 0;
            loop {
                let sound = if tick % 50 == 0 { 800 } else { 40 };
                module.push_sound_sample(sound as u16);
                module.push_light_sample(200);
                tick += 1;
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        });
    }

    let ambient = Ambient::new(module.hardware()).await?;

    let armed = ambient.set_sound_trigger(0.1).await?;
    println!("Waiting for a sound above {armed:.3}...");

    let mut hits = ambient.subscribe_sound_trigger();
    for _ in 0..3 {
        let Some(value) = hits.recv().await else {
            break;
        };
        println!("sound trigger hit: {value:.3}");

        // Clear so the same spike cannot re-fire, then re-arm shortly after.
        ambient.clear_sound_trigger().await?;
        tokio::time::sleep(Duration::from_millis(1500)).await;
        ambient.set_sound_trigger(0.1).await?;
    }

    Ok(())
}
