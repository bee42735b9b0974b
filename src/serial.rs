//! ==============================================================================
//! serial.rs - line-delimited json reader for a serial port
//! ==============================================================================
//!
//! purpose:
//!     reads newline-terminated json from a sensor node on a serial port and
//!     prints every decoded object. nothing is stored or forwarded.
//!
//! design:
//!     - the port is opened once (`open_port`) and owned for the process lifetime
//!     - `SerialReader` is generic over any `BufRead` source and `Write` sink,
//!       so the loop runs the same on a real port and on an in-memory buffer
//!     - a read timeout is not an error: whatever arrived so far is the line
//!     - bad lines print a warning and the loop keeps going
//!
//! ==============================================================================

use crate::config::SerialConfig;

use anyhow::Result;
use serde_json::Value;
use std::io::{BufRead, ErrorKind, Read, Write};

/// classification of one received line
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Empty,
    Json(Value),
    /// raw line text (lossy) that did not decode or parse
    Invalid(String),
}

/// decode one raw line as strict utf-8, trim it, and parse it as json
pub fn classify_line(raw: &[u8]) -> LineOutcome {
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text.trim(),
        Err(_) => {
            let lossy = String::from_utf8_lossy(raw).trim().to_string();
            return if lossy.is_empty() {
                LineOutcome::Empty
            } else {
                LineOutcome::Invalid(lossy)
            };
        }
    };

    if text.is_empty() {
        return LineOutcome::Empty;
    }

    match serde_json::from_str(text) {
        Ok(value) => LineOutcome::Json(value),
        Err(_) => LineOutcome::Invalid(text.to_string()),
    }
}

pub struct SerialReader<R, W> {
    source: R,
    sink: W,
    line: Vec<u8>,
}

impl<R: BufRead, W: Write> SerialReader<R, W> {
    pub fn new(source: R, sink: W) -> Self {
        Self {
            source,
            sink,
            line: Vec::new(),
        }
    }

    /// read and classify the next line; `None` once the source is exhausted
    pub fn read_next(&mut self) -> Result<Option<LineOutcome>> {
        self.line.clear();
        match self.source.read_until(b'\n', &mut self.line) {
            Ok(0) => return Ok(None),
            Ok(_) => {}
            // partial data (if any) is already in `line`
            Err(e) if e.kind() == ErrorKind::TimedOut => {}
            Err(e) => return Err(e.into()),
        }
        Ok(Some(classify_line(&self.line)))
    }

    /// print one outcome to the sink
    pub fn report(&mut self, outcome: &LineOutcome) -> Result<()> {
        match outcome {
            LineOutcome::Empty => return Ok(()),
            LineOutcome::Json(value) => writeln!(self.sink, "Received JSON: {}", value)?,
            LineOutcome::Invalid(raw) => writeln!(self.sink, "Invalid JSON: {}", raw)?,
        }
        self.sink.flush()?;
        Ok(())
    }

    /// loop until the source ends or a non-timeout read error occurs
    pub fn run(&mut self) -> Result<()> {
        while let Some(outcome) = self.read_next()? {
            if let LineOutcome::Invalid(raw) = &outcome {
                tracing::debug!(raw = %raw, "[SERIAL] dropped unparsable line");
            }
            self.report(&outcome)?;
        }
        tracing::info!("[SERIAL] source closed");
        Ok(())
    }

    pub fn into_sink(self) -> W {
        self.sink
    }
}

/// open the configured serial port (8N1, fixed read timeout)
#[cfg(feature = "serial")]
pub fn open_port(config: &SerialConfig) -> Result<Box<dyn Read + Send>> {
    use anyhow::Context;

    let port = serialport::new(&config.port, config.baud_rate)
        .timeout(config.timeout())
        .data_bits(serialport::DataBits::Eight)
        .stop_bits(serialport::StopBits::One)
        .parity(serialport::Parity::None)
        .open()
        .with_context(|| format!("Failed to open serial port {}", config.port))?;
    tracing::info!(port = %config.port, baud = config.baud_rate, "[SERIAL] port open");
    Ok(Box::new(port))
}

#[cfg(not(feature = "serial"))]
pub fn open_port(config: &SerialConfig) -> Result<Box<dyn Read + Send>> {
    anyhow::bail!(
        "cannot open {}: built without the `serial` feature",
        config.port
    )
}
