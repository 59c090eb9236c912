//! Tic-synchronous control of a Doom engine for agents.
//!
//! [`DoomGame`] submits actions, advances engine time by whole tics, builds
//! numbered state snapshots and keeps episode and reward bookkeeping. The
//! engine itself sits behind an [`EngineLink`]; [`ProcessLink`] runs it as a
//! child process.
//!
//! Typical usage:
//! ```no_run
//! use doom_control::{Button, DoomGame, GameConfig, GameVariable, ProcessLink, ProcessLinkConfig};
//!
//! let config = GameConfig::new("/opt/doom/engine", "/opt/doom/freedoom2.wad")
//!     .with_button(Button::MoveForward)
//!     .with_button(Button::Attack)
//!     .with_game_variable(GameVariable::Health);
//!
//! let mut game = DoomGame::new(config, ProcessLink::new(ProcessLinkConfig::default()));
//! game.init().expect("engine should launch");
//! while !game.is_episode_finished() {
//!     let reward = game.make_action_for(&[1, 0], 4).unwrap();
//!     let state = game.get_state();
//!     println!("state {} reward {reward} vars {:?}", state.number(), state.game_variables());
//! }
//! game.close();
//! ```

mod config;
mod defines;
mod episode;
mod error;
mod game;
mod link;
mod process;
pub mod protocol;
mod registry;
mod snapshot;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::{EpisodeRules, GameConfig, RenderOptions, RewardRules};
pub use defines::{
    doom_fixed_to_float, doom_tics_to_ms, ms_to_doom_tics, Button, GameVariable, Mode,
    ScreenFormat, ScreenResolution, TICRATE,
};
pub use episode::{EpisodePhase, EpisodeState, FinishReason};
pub use error::{ConfigError, EngineError, EngineResult, GameError, GameResult};
pub use game::DoomGame;
pub use link::{EngineLink, EngineVariables, Frame};
pub use process::{engine_args, LogLine, LogStream, ProcessLink, ProcessLinkConfig};
pub use registry::{ButtonBinding, ButtonBuffer, ButtonRegistry, VariableRegistry};
pub use snapshot::StateSnapshot;
