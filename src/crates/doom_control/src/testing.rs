//! Deterministic in-memory Engine Link for tests.
//!
//! `ScriptedLink` simulates just enough of an engine to exercise the
//! synchronization contract: a map tic counter, a handful of variables driven
//! by the button buffer, a frame whose bytes encode the tic, and scriptable
//! death, map end, shaping reward and link failure.

use crate::config::GameConfig;
use crate::defines::{Button, GameVariable, ScreenFormat};
use crate::error::{EngineError, EngineResult};
use crate::link::{EngineLink, EngineVariables, Frame};
use crate::registry::ButtonBuffer;

const START_HEALTH: i32 = 100;
const START_AMMO: i32 = 50;

#[derive(Debug, Clone)]
pub struct ScriptedLink {
    started: bool,
    alive: bool,
    asynchronous: bool,
    die_at: Option<u32>,
    map_end_at: Option<u32>,
    fail_at: Option<u32>,
    shaping_per_tic: i32,
    async_drift: u32,
    buttons: ButtonBuffer,
    variables: EngineVariables,
    frame: Option<Frame>,
    generation: u64,
    width: usize,
    height: usize,
    format: ScreenFormat,
    written: Vec<ButtonBuffer>,
    commands: Vec<String>,
    seeds: Vec<Option<u32>>,
    starts: u32,
    advanced_tics: u64,
}

impl Default for ScriptedLink {
    fn default() -> Self {
        Self {
            started: false,
            alive: false,
            asynchronous: false,
            die_at: None,
            map_end_at: None,
            fail_at: None,
            shaping_per_tic: 0,
            async_drift: 0,
            buttons: [0; Button::COUNT],
            variables: EngineVariables::default(),
            frame: None,
            generation: 0,
            width: 0,
            height: 0,
            format: ScreenFormat::default(),
            written: Vec::new(),
            commands: Vec::new(),
            seeds: Vec::new(),
            starts: 0,
            advanced_tics: 0,
        }
    }
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the player when the map tic reaches `tic`.
    pub fn with_death_at(mut self, tic: u32) -> Self {
        self.die_at = Some(tic);
        self
    }

    /// Leave the map when the map tic reaches `tic`.
    pub fn with_map_end_at(mut self, tic: u32) -> Self {
        self.map_end_at = Some(tic);
        self
    }

    /// Drop the connection while simulating map tic `tic`.
    pub fn with_failure_at(mut self, tic: u32) -> Self {
        self.fail_at = Some(tic);
        self
    }

    /// Add `reward` (in 16.16 fixed point) to `USER1` every tic.
    pub fn with_shaping_per_tic(mut self, reward: i32) -> Self {
        self.shaping_per_tic = reward;
        self
    }

    /// Extra tics simulated per advance in asynchronous modes.
    pub fn with_async_drift(mut self, tics: u32) -> Self {
        self.async_drift = tics;
        self
    }

    /// Every button buffer written so far.
    pub fn written_actions(&self) -> &[ButtonBuffer] {
        &self.written
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Seeds passed to each episode reset.
    pub fn episode_seeds(&self) -> &[Option<u32>] {
        &self.seeds
    }

    pub fn start_count(&self) -> u32 {
        self.starts
    }

    /// Total tics simulated across all episodes.
    pub fn advanced_tics(&self) -> u64 {
        self.advanced_tics
    }

    fn reset_map(&mut self) {
        self.buttons = [0; Button::COUNT];
        self.variables = EngineVariables::default();
        self.variables.set(GameVariable::Health, START_HEALTH);
        self.variables.set(GameVariable::Ammo2, START_AMMO);
        self.variables.set(GameVariable::SelectedWeapon, 2);
        self.variables.set(GameVariable::OnGround, 1);
        self.render();
    }

    fn render(&mut self) {
        self.generation += 1;
        let fill = (self.variables.tic % 256) as u8;
        let bytes = vec![fill; self.width * self.height * self.format.channels()];
        self.frame = Some(Frame::new(
            bytes,
            self.width,
            self.height,
            self.format,
            self.generation,
        ));
    }

    fn run_tic(&mut self) -> EngineResult<()> {
        let tic = self.variables.tic + 1;
        if self.fail_at == Some(tic) {
            self.fail_at = None;
            self.alive = false;
            return Err(EngineError::ConnectionClosed);
        }
        self.variables.tic = tic;
        self.advanced_tics += 1;

        if self.variables.player_dead() {
            return Ok(());
        }

        let forward = self.buttons[Button::MoveForward.index()]
            - self.buttons[Button::MoveBackward.index()]
            + self.buttons[Button::MoveForwardBackwardDelta.index()];
        let x = self.variables.get(GameVariable::PositionX);
        self.variables.set(GameVariable::PositionX, x + forward);

        if self.buttons[Button::Attack.index()] != 0 {
            let ammo = self.variables.get(GameVariable::Ammo2);
            self.variables.set(GameVariable::Ammo2, (ammo - 1).max(0));
        }

        if self.shaping_per_tic != 0 {
            let total = self.variables.get(GameVariable::User1);
            self.variables
                .set(GameVariable::User1, total.wrapping_add(self.shaping_per_tic));
        }

        if self.die_at.is_some_and(|at| tic >= at) {
            self.variables.set(GameVariable::Health, 0);
            self.variables.set(GameVariable::Dead, 1);
        }
        if self.map_end_at.is_some_and(|at| tic >= at) {
            self.variables.map_ended = true;
        }
        Ok(())
    }
}

impl EngineLink for ScriptedLink {
    fn start(&mut self, config: &GameConfig) -> EngineResult<()> {
        if config.doom_game_path.to_string_lossy().contains("missing") {
            return Err(EngineError::start("engine binary not found"));
        }
        let (width, height) = config.screen_dimensions();
        self.width = width;
        self.height = height;
        self.format = config.screen_format;
        self.asynchronous = !config.mode.is_synchronous();
        self.started = true;
        self.alive = true;
        self.starts += 1;
        self.reset_map();
        Ok(())
    }

    fn new_episode(&mut self, seed: Option<u32>) -> EngineResult<()> {
        if !self.alive {
            return Err(EngineError::NotStarted);
        }
        self.seeds.push(seed);
        self.reset_map();
        Ok(())
    }

    fn write_action(&mut self, buttons: &ButtonBuffer) -> EngineResult<()> {
        if !self.alive {
            return Err(EngineError::NotStarted);
        }
        self.buttons = *buttons;
        self.written.push(*buttons);
        Ok(())
    }

    fn advance(&mut self, tics: u32, render: bool) -> EngineResult<()> {
        if !self.alive {
            return Err(EngineError::NotStarted);
        }
        let total = if self.asynchronous {
            tics + self.async_drift
        } else {
            tics
        };
        for _ in 0..total {
            self.run_tic()?;
        }
        if render {
            self.render();
        }
        Ok(())
    }

    fn read_variables(&self) -> EngineVariables {
        self.variables.clone()
    }

    fn read_frame(&self) -> Option<Frame> {
        self.frame.clone()
    }

    fn send_command(&mut self, command: &str) -> EngineResult<()> {
        if !self.alive {
            return Err(EngineError::NotStarted);
        }
        self.commands.push(command.to_string());
        Ok(())
    }

    fn is_alive(&mut self) -> bool {
        self.started && self.alive
    }

    fn shutdown(&mut self) {
        self.started = false;
        self.alive = false;
    }
}
