//! ==============================================================================
//! main.rs - udp sensor ingestor entry point
//! ==============================================================================
//!
//! purpose:
//!     field nodes push json readings over udp. each reading names its zone
//!     (`zone_id`) and replaces that zone's previous entry in a json file that
//!     the dashboard reads.
//!
//! responsibilities:
//!     - load configuration (config/zone-ingest.toml or defaults)
//!     - set up logging
//!     - optionally serve the read-only store view over http
//!     - run the udp receive loop until the process is killed
//!
//! architecture:
//!
//!     ┌──────────────┐   udp :5000    ┌──────────────────┐
//!     │ sensor nodes │ ─────────────> │ ingest loop      │
//!     └──────────────┘  json packets  │ (one at a time)  │
//!                                     └────────┬─────────┘
//!                                              │ load / upsert / save
//!                                     ┌────────┴─────────┐    GET /api/zones
//!                                     │ sensor_data.json │ <── (optional view)
//!                                     └──────────────────┘
//!
//! ==============================================================================

use anyhow::Result;
use zone_ingest::{api, config::AppConfig, ingest::Ingestor, logging};

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: configuration and logging
    let (config, source) = AppConfig::load_or_default();
    logging::init(&config.logging.level);
    config.log_summary(source.as_deref());

    // step 2: socket owned for the whole process lifetime
    let ingestor = Ingestor::bind(&config.ingest).await?;

    // step 3: optional http view in background
    if config.api.enabled {
        let bind = config.api.bind;
        let store_path = config.ingest.store_path.clone();
        tokio::spawn(async move {
            if let Err(e) = api::run_server(bind, store_path).await {
                tracing::error!("[API] server error: {:#}", e);
            }
        });
    }

    // step 4: receive loop, only returns on a fatal io error
    ingestor.run().await
}
