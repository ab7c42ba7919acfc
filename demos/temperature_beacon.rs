//! Simulated temperature beacon
//!
//! Runs the publisher against a simulated sensor and a logging radio, so the
//! advertise/refresh cycle can be watched without hardware.
//!
//! Run with: cargo run --example temperature_beacon
//!
//! Intervals can be overridden with BTHOME_DEVICE_NAME,
//! BTHOME_ADVERTISING_INTERVAL_MS and BTHOME_SAMPLING_INTERVAL_MS.

use bthome_advertiser::{
    decode, AdvertisementPublisher, LoggingRadio, PublishEvent, PublisherConfig, PublisherRunner,
    Result, SimulatedSensor,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bthome_advertiser=debug".parse().unwrap()),
        )
        .init();

    let config = PublisherConfig::from_env()?;

    println!("BTHome Temperature Beacon (simulated)");
    println!("=====================================\n");
    println!("Device name: {}", config.device_name);
    println!(
        "Advertising interval: {} ms ({} units)",
        config.advertising_interval_ms,
        config.advertising_interval_units()
    );
    println!("Sampling interval: {} ms\n", config.sampling_interval_ms);

    // Every seventh read fails to show the retry behaviour.
    let sensor = SimulatedSensor::new(22.0)
        .with_wave(1.5, 12)
        .with_failures(7);
    let publisher = AdvertisementPublisher::new(config, sensor, LoggingRadio::new())?;
    let runner = PublisherRunner::new(publisher);

    let mut rx = runner.subscribe();
    runner.start()?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nExiting...");
                break;
            }
            Ok(event) = rx.recv() => match event {
                PublishEvent::Published { outcome, payload } => {
                    let temperature = decode(payload.as_bytes())
                        .ok()
                        .and_then(|p| p.temperature());
                    println!(
                        "{:?}: {} -> {:.2}°C",
                        outcome,
                        payload,
                        temperature.unwrap_or(f64::NAN)
                    );
                }
                PublishEvent::Failed { error } => {
                    println!("Cycle skipped: {}", error);
                }
            }
        }
    }

    runner.stop().await?;

    let cycles = runner.with_publisher(|p| p.radio().events().len());
    println!("Radio transitions: {}", cycles);

    Ok(())
}
