//! The contract between [`DoomGame`](crate::DoomGame) and whatever owns the
//! engine process.
//!
//! An Engine Link starts and stops the engine, accepts a full button buffer,
//! advances simulated time by whole tics and exposes the engine-side variable
//! block and the latest rendered frame.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::defines::{GameVariable, ScreenFormat};
use crate::error::EngineResult;
use crate::registry::ButtonBuffer;

/// Raw variable block published by the engine after each advance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineVariables {
    /// Engine map tic at the time of the read.
    pub tic: u32,
    /// Set once the engine has left the current map.
    #[serde(default)]
    pub map_ended: bool,
    pub(crate) values: Vec<i32>,
}

impl Default for EngineVariables {
    fn default() -> Self {
        Self {
            tic: 0,
            map_ended: false,
            values: vec![0; GameVariable::COUNT],
        }
    }
}

impl EngineVariables {
    pub fn get(&self, variable: GameVariable) -> i32 {
        self.values.get(variable.index()).copied().unwrap_or(0)
    }

    pub fn set(&mut self, variable: GameVariable, value: i32) {
        if self.values.len() < GameVariable::COUNT {
            self.values.resize(GameVariable::COUNT, 0);
        }
        self.values[variable.index()] = value;
    }

    pub fn player_dead(&self) -> bool {
        self.get(GameVariable::Dead) != 0
    }
}

/// An immutable rendered frame.
///
/// Links hand out a fresh buffer for every refresh, so a `Frame` never changes
/// after it is produced and may be kept across later advances. `generation`
/// identifies which refresh produced it.
#[derive(Clone)]
pub struct Frame {
    data: Arc<[u8]>,
    width: usize,
    height: usize,
    format: ScreenFormat,
    generation: u64,
}

impl Frame {
    pub fn new(
        data: impl Into<Arc<[u8]>>,
        width: usize,
        height: usize,
        format: ScreenFormat,
        generation: u64,
    ) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            format,
            generation,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn format(&self) -> ScreenFormat {
        self.format
    }

    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    pub fn pitch(&self) -> usize {
        self.format.pitch(self.width)
    }

    /// Total number of bytes a well-formed frame of this geometry occupies.
    pub fn size(&self) -> usize {
        self.width * self.height * self.channels()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Copy the pixels into a caller-owned buffer.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Whether both frames share the same underlying buffer.
    pub fn same_buffer(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("generation", &self.generation)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Lower-level controller that owns the engine process.
///
/// Calls are blocking. Implementations enforce their own watchdog and report
/// an unresponsive engine as an error instead of hanging the caller.
pub trait EngineLink {
    /// Launch the engine with the resolved configuration.
    fn start(&mut self, config: &GameConfig) -> EngineResult<()>;

    /// Restart the current map and discard any buffered input.
    fn new_episode(&mut self, seed: Option<u32>) -> EngineResult<()>;

    /// Publish the button buffer applied on every following tic.
    fn write_action(&mut self, buttons: &ButtonBuffer) -> EngineResult<()>;

    /// Run `tics` engine tics. When `render` is false the link may skip
    /// producing a new frame.
    fn advance(&mut self, tics: u32, render: bool) -> EngineResult<()>;

    /// Variable block from the most recent advance or reset.
    fn read_variables(&self) -> EngineVariables;

    /// Most recently rendered frame, if any.
    fn read_frame(&self) -> Option<Frame>;

    /// Forward a console command to the engine.
    fn send_command(&mut self, command: &str) -> EngineResult<()>;

    /// Whether the engine process is still reachable.
    fn is_alive(&mut self) -> bool;

    /// Stop the engine. Safe to call repeatedly or before `start`.
    fn shutdown(&mut self);
}

impl<L: EngineLink + ?Sized> EngineLink for Box<L> {
    fn start(&mut self, config: &GameConfig) -> EngineResult<()> {
        (**self).start(config)
    }

    fn new_episode(&mut self, seed: Option<u32>) -> EngineResult<()> {
        (**self).new_episode(seed)
    }

    fn write_action(&mut self, buttons: &ButtonBuffer) -> EngineResult<()> {
        (**self).write_action(buttons)
    }

    fn advance(&mut self, tics: u32, render: bool) -> EngineResult<()> {
        (**self).advance(tics, render)
    }

    fn read_variables(&self) -> EngineVariables {
        (**self).read_variables()
    }

    fn read_frame(&self) -> Option<Frame> {
        (**self).read_frame()
    }

    fn send_command(&mut self, command: &str) -> EngineResult<()> {
        (**self).send_command(command)
    }

    fn is_alive(&mut self) -> bool {
        (**self).is_alive()
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}
