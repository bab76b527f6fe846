//! Basic usage of the vitals simulator
//!
//! Streams readings to a callback for a few seconds, then prints the
//! retained history and the plot view.

use std::time::Duration;
use vitals_simulation::{MedicalDeviceSimulator, SimulatorConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== Vitals Simulator Example ===\n");

    // Example 1: Stream readings to a callback
    let config = SimulatorConfig {
        max_history: Some(5),
        tick_interval_ms: 250,
        ..Default::default()
    };
    let simulator = MedicalDeviceSimulator::new(config)?;
    simulator.set_callback(|reading| {
        println!("Received: {}", reading.to_json()?);
        Ok(())
    });

    println!("1. Streaming for 2 seconds...");
    simulator.start()?;
    tokio::time::sleep(Duration::from_secs(2)).await;
    simulator.stop().await?;

    // Example 2: Inspect the bounded history
    println!("\n2. History (last {} readings):", simulator.history().len());
    for reading in simulator.history() {
        println!(
            "   t={:.3}  HR={}  BP={}  SpO2={}",
            reading.timestamp, reading.heart_rate, reading.blood_pressure, reading.spo2
        );
    }

    // Example 3: Plot view for a charting front end
    let plot = simulator.plot();
    println!("\n3. Plot panels:");
    for panel in &plot.panels {
        println!("   {} ({} points)", panel.title, panel.series[0].len());
    }

    println!("\n{:?}", simulator.stats());
    Ok(())
}
