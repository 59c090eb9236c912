use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::defines::{Button, GameVariable, Mode, ScreenFormat, ScreenResolution};
use crate::error::ConfigError;
use crate::registry::ButtonBinding;

/// Resolved options consumed by [`DoomGame::init`](crate::DoomGame::init).
///
/// Fields left out of a config file fall back to [`GameConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Engine binary to launch.
    pub doom_game_path: PathBuf,
    /// Base game resources.
    pub doom_iwad_path: PathBuf,
    /// Optional scenario wad loaded on top of the IWAD.
    pub doom_file_path: Option<PathBuf>,
    /// Optional engine configuration file.
    pub doom_config_path: Option<PathBuf>,
    pub doom_map: String,
    /// Difficulty, 1 (easiest) to 5.
    pub doom_skill: u8,
    pub seed: Option<u32>,
    pub screen_resolution: ScreenResolution,
    pub screen_format: ScreenFormat,
    pub render: RenderOptions,
    pub window_visible: bool,
    pub console_enabled: bool,
    pub mode: Mode,
    pub episode: EpisodeRules,
    pub reward: RewardRules,
    pub available_buttons: Vec<ButtonBinding>,
    pub available_game_variables: Vec<GameVariable>,
    /// Passthrough arguments appended to the engine command line.
    pub custom_args: Vec<String>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            doom_game_path: PathBuf::new(),
            doom_iwad_path: PathBuf::new(),
            doom_file_path: None,
            doom_config_path: None,
            doom_map: "map01".to_string(),
            doom_skill: 3,
            seed: None,
            screen_resolution: ScreenResolution::default(),
            screen_format: ScreenFormat::default(),
            render: RenderOptions::default(),
            window_visible: false,
            console_enabled: false,
            mode: Mode::default(),
            episode: EpisodeRules::default(),
            reward: RewardRules::default(),
            available_buttons: Vec::new(),
            available_game_variables: Vec::new(),
            custom_args: Vec::new(),
        }
    }
}

impl GameConfig {
    /// Create a config targeting an engine binary and IWAD.
    pub fn new(game_path: impl Into<PathBuf>, iwad_path: impl Into<PathBuf>) -> Self {
        Self {
            doom_game_path: game_path.into(),
            doom_iwad_path: iwad_path.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON config document.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn with_scenario_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.doom_file_path = Some(path.into());
        self
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.doom_config_path = Some(path.into());
        self
    }

    pub fn with_map(mut self, map: impl Into<String>) -> Self {
        self.doom_map = map.into();
        self
    }

    pub fn with_skill(mut self, skill: u8) -> Self {
        self.doom_skill = skill;
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_screen(mut self, resolution: ScreenResolution, format: ScreenFormat) -> Self {
        self.screen_resolution = resolution;
        self.screen_format = format;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_button(mut self, button: Button) -> Self {
        self.available_buttons.push(ButtonBinding::new(button));
        self
    }

    pub fn with_capped_button(mut self, button: Button, max_value: u32) -> Self {
        self.available_buttons
            .push(ButtonBinding::new(button).with_max_value(max_value));
        self
    }

    pub fn with_game_variable(mut self, variable: GameVariable) -> Self {
        self.available_game_variables.push(variable);
        self
    }

    pub fn with_episode_rules(mut self, episode: EpisodeRules) -> Self {
        self.episode = episode;
        self
    }

    pub fn with_reward_rules(mut self, reward: RewardRules) -> Self {
        self.reward = reward;
        self
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.custom_args.push(arg.into());
        self
    }

    /// Frame width and height implied by the resolution.
    pub fn screen_dimensions(&self) -> (usize, usize) {
        self.screen_resolution.dimensions()
    }

    /// Reject configurations the engine cannot be started with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.doom_game_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingPath("doom_game_path"));
        }
        if self.doom_iwad_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingPath("doom_iwad_path"));
        }
        if self.doom_map.trim().is_empty() {
            return Err(ConfigError::invalid("doom_map", "map name is empty"));
        }
        if !(1..=5).contains(&self.doom_skill) {
            return Err(ConfigError::invalid(
                "doom_skill",
                format!("{} is outside 1..=5", self.doom_skill),
            ));
        }
        self.reward.validate()
    }
}

/// Optional parts of the rendered view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub hud: bool,
    pub weapon: bool,
    pub crosshair: bool,
    pub decals: bool,
    pub particles: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            hud: true,
            weapon: true,
            crosshair: false,
            decals: true,
            particles: true,
        }
    }
}

/// When an episode ends and what happens next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeRules {
    /// Tics the engine runs on its own after a reset before control is handed over.
    pub start_time: u32,
    /// Episode length limit in tics; `0` disables it.
    pub timeout: u32,
    pub new_episode_on_timeout: bool,
    pub new_episode_on_player_death: bool,
    pub new_episode_on_map_end: bool,
    /// Start the next episode as soon as one finishes.
    pub auto_new_episode: bool,
}

impl Default for EpisodeRules {
    fn default() -> Self {
        Self {
            start_time: 0,
            timeout: 0,
            new_episode_on_timeout: true,
            new_episode_on_player_death: true,
            new_episode_on_map_end: true,
            auto_new_episode: false,
        }
    }
}

impl EpisodeRules {
    pub fn with_timeout(mut self, tics: u32) -> Self {
        self.timeout = tics;
        self
    }

    pub fn with_start_time(mut self, tics: u32) -> Self {
        self.start_time = tics;
        self
    }

    pub fn with_auto_new_episode(mut self, enabled: bool) -> Self {
        self.auto_new_episode = enabled;
        self
    }

    pub fn with_triggers(mut self, on_timeout: bool, on_death: bool, on_map_end: bool) -> Self {
        self.new_episode_on_timeout = on_timeout;
        self.new_episode_on_player_death = on_death;
        self.new_episode_on_map_end = on_map_end;
        self
    }

    /// Whether the timeout trigger can fire at all.
    pub fn timeout_enabled(&self) -> bool {
        self.timeout > 0 && self.new_episode_on_timeout
    }
}

/// Reward credited by the episode state machine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardRules {
    /// Credited on every tic the player is alive.
    pub living_reward: f64,
    /// Credited once, on the tic death is detected.
    pub death_penalty: f64,
    /// Engine variable holding a 16.16 fixed-point running reward total set by
    /// the scenario. Only its per-tic change is credited.
    pub shaping_variable: Option<GameVariable>,
}

impl Default for RewardRules {
    fn default() -> Self {
        Self {
            living_reward: 0.0,
            death_penalty: 0.0,
            shaping_variable: None,
        }
    }
}

impl RewardRules {
    pub fn new(living_reward: f64, death_penalty: f64) -> Self {
        Self {
            living_reward,
            death_penalty,
            shaping_variable: None,
        }
    }

    pub fn with_shaping_variable(mut self, variable: GameVariable) -> Self {
        self.shaping_variable = Some(variable);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.living_reward.is_finite() {
            return Err(ConfigError::invalid("living_reward", "must be finite"));
        }
        if !self.death_penalty.is_finite() {
            return Err(ConfigError::invalid("death_penalty", "must be finite"));
        }
        Ok(())
    }
}
