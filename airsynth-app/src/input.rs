//! Input lines: landmark frames and control commands, one JSON object per line.

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use tracing::warn;

use airsynth_core::TrackedHand;

#[derive(Debug, Clone, Deserialize)]
pub struct FrameMessage {
    /// Capture time; wall-clock arrival time is used when missing.
    #[serde(default)]
    pub timestamp_ms: Option<f64>,
    /// Required, so a misspelled command is rejected instead of being read
    /// as a frame with no hands.
    pub hands: Vec<TrackedHand>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum ControlCommand {
    SetInstrument { id: String },
    SetVolume { percent: u8 },
    Idle,
    ClearHistory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InputLine {
    Command(ControlCommand),
    Frame(FrameMessage),
}

pub fn parse_line(line: &str) -> Result<Option<InputLine>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let parsed = serde_json::from_str(line)?;
    Ok(Some(parsed))
}

pub fn open(source: &str) -> Result<Box<dyn BufRead + Send>> {
    if source == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(source).with_context(|| format!("opening frame file {}", source))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Sends every parsable line until input ends or the receiver goes away.
/// Returns the number of lines forwarded.
pub fn forward_lines(reader: impl BufRead, tx: &Sender<InputLine>) -> usize {
    let mut forwarded = 0;
    for (number, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Stopped reading input: {}", e);
                break;
            }
        };
        match parse_line(&line) {
            Ok(Some(msg)) => {
                if tx.send(msg).is_err() {
                    break;
                }
                forwarded += 1;
            }
            Ok(None) => {}
            Err(e) => warn!("Skipping line {}: {}", number + 1, e),
        }
    }
    forwarded
}
