//! Newline-delimited JSON messages exchanged with an engine process.
//!
//! The engine announces itself with a single [`READY_LINE`] on stdout, then
//! answers every request written to its stdin with exactly one reply line.

use serde::{Deserialize, Serialize};

use crate::defines::ScreenFormat;
use crate::link::EngineVariables;

/// First stdout line of an engine that is ready for requests.
pub const READY_LINE: &str = "engine ready";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EngineRequest {
    NewEpisode { seed: Option<u32> },
    SetButtons { values: Vec<i32> },
    Advance { tics: u32, render: bool },
    Command { text: String },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EngineReply {
    Ok,
    State {
        variables: EngineVariables,
        #[serde(default)]
        frame: Option<FramePayload>,
    },
    Error { message: String },
}

/// Pixels of a rendered frame as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramePayload {
    pub width: usize,
    pub height: usize,
    pub format: ScreenFormat,
    pub data: Vec<u8>,
}

/// Serialize a message as a single line, newline included.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}
