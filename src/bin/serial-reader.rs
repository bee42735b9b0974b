//! serial reader: prints every json line a sensor node writes to the serial port.

use anyhow::Result;
use std::io::BufReader;
use zone_ingest::{config::AppConfig, logging, serial};

fn main() -> Result<()> {
    let (config, source) = AppConfig::load_or_default();
    logging::init(&config.logging.level);
    if let Some(path) = source {
        tracing::info!("[CONFIG] Loaded from {}", path.display());
    }

    let port = serial::open_port(&config.serial)?;
    tracing::info!("[SERIAL] Receiver listening...");

    let stdout = std::io::stdout();
    let mut reader = serial::SerialReader::new(BufReader::new(port), stdout.lock());
    reader.run()
}
