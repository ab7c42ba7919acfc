//! BTHome logger: scan for BTHome devices and print every decoded packet
//!
//! Run with: cargo run --example bthome_logger [name-prefix]
//!
//! Only devices whose name starts with the prefix (default "MAKE") are shown.
//! Matching devices that send other manufacturer data get a one-line hex dump.

use bthome_advertiser::{AdvertisedData, BthomeObservation, BthomePacket, BthomeScanner, Result};
use crossterm::style::Stylize;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bthome_advertiser=info".parse().unwrap()),
        )
        .init();

    let prefix = std::env::args().nth(1).unwrap_or_else(|| "MAKE".to_string());

    println!("{}", "=".repeat(70).cyan().bold());
    println!("{}", "BTHome Logger".cyan().bold());
    println!("{}", "=".repeat(70).cyan().bold());
    println!("{}", format!("Filter: devices named '{}*'", prefix).yellow());
    println!("{}\n", "Press Ctrl+C to exit".dark_grey());

    let scanner = BthomeScanner::new().await?.with_name_prefix(prefix);
    let mut rx = scanner.subscribe();
    scanner.start_scanning().await?;

    println!("{}\n", "Scanner started...".green());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\n{}", "Stopping scanner...".yellow());
                break;
            }
            Ok(observation) = rx.recv() => {
                print_observation(&observation);
            }
        }
    }

    scanner.stop_scanning().await?;
    println!("{}", "Scanner stopped".green());

    Ok(())
}

fn print_observation(observation: &BthomeObservation) {
    match &observation.data {
        AdvertisedData::Bthome(packet) => print_bthome(observation, packet),
        AdvertisedData::Other(manufacturer_data) => {
            for (company_id, data) in manufacturer_data {
                println!(
                    "{} {} ({}) | Company ID: 0x{:04X} | Data: {} | RSSI: {}",
                    format!("[{}]", observation.received_at.format("%H:%M:%S%.3f")).dark_grey(),
                    observation.local_name.as_deref().unwrap_or("<unnamed>").blue(),
                    observation.identifier.as_str().dark_grey(),
                    company_id,
                    hex(data),
                    observation
                        .rssi
                        .map(|rssi| format!("{} dBm", rssi))
                        .unwrap_or_else(|| "n/a".to_string())
                );
            }
        }
    }
}

fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_bthome(observation: &BthomeObservation, packet: &BthomePacket) {
    println!("{}", "-".repeat(70).dark_grey());
    println!(
        "{} {} ({})",
        format!("[{}]", observation.received_at.format("%H:%M:%S%.3f")).dark_grey(),
        observation
            .local_name
            .as_deref()
            .unwrap_or("<unnamed>")
            .green()
            .bold(),
        observation.identifier.as_str().dark_grey()
    );

    if let Some(rssi) = observation.rssi {
        let text = format!("{} dBm", rssi);
        let text = if rssi > -70 {
            text.green()
        } else if rssi > -85 {
            text.yellow()
        } else {
            text.red()
        };
        println!("  RSSI: {}", text);
    }

    let encryption = if packet.is_encrypted() {
        "encrypted".red()
    } else {
        "unencrypted".green()
    };
    println!(
        "  BTHome: v{} ({})",
        packet.device_info.version, encryption
    );

    if packet.measurements.is_empty() {
        println!("    {}", "(no decoded values)".dark_grey());
    }
    for measurement in &packet.measurements {
        println!("    • {}", measurement.to_string().magenta());
    }
    if let Some(id) = packet.unknown_object {
        println!("    {}", format!("unknown object 0x{:02X}", id).dark_grey());
    }

    println!();
}
