use tracing::{debug, info, warn};

use crate::config::{EpisodeRules, GameConfig};
use crate::defines::{Button, GameVariable, Mode, ScreenFormat};
use crate::episode::{EpisodeMachine, EpisodeState, FinishReason};
use crate::error::{EngineError, GameError, GameResult};
use crate::link::{EngineLink, EngineVariables, Frame};
use crate::registry::{ButtonBinding, ButtonBuffer, ButtonRegistry, VariableRegistry};
use crate::snapshot::{SnapshotBuilder, StateSnapshot};

/// Agent-facing façade over an Engine Link.
///
/// All calls are blocking and the type is not synchronized; share it across
/// threads only behind external serialization.
pub struct DoomGame<L: EngineLink> {
    link: L,
    config: GameConfig,
    initialized: bool,
    buttons: ButtonRegistry,
    variables: VariableRegistry,
    pending: Option<ButtonBuffer>,
    last_action: Vec<i32>,
    engine_vars: EngineVariables,
    snapshots: SnapshotBuilder,
    episode: EpisodeMachine,
    last_observed_tics: u32,
}

impl<L: EngineLink> DoomGame<L> {
    /// Create a game from resolved options. The registries start out with the
    /// configured buttons and variables.
    pub fn new(config: GameConfig, link: L) -> Self {
        let mut buttons = ButtonRegistry::new();
        for binding in &config.available_buttons {
            buttons.add(binding.button, binding.max_value);
        }
        let mut variables = VariableRegistry::new();
        for variable in &config.available_game_variables {
            variables.add(*variable);
        }
        let episode = EpisodeMachine::new(config.episode, config.reward);

        Self {
            link,
            config,
            initialized: false,
            buttons,
            variables,
            pending: None,
            last_action: Vec::new(),
            engine_vars: EngineVariables::default(),
            snapshots: SnapshotBuilder::default(),
            episode,
            last_observed_tics: 0,
        }
    }

    /// Validate the configuration, start the engine and begin the first episode.
    pub fn init(&mut self) -> GameResult<()> {
        if self.initialized {
            debug!("init_ignored_already_initialized");
            return Ok(());
        }
        self.config.validate()?;

        self.link
            .start(&self.config)
            .map_err(GameError::Initialization)?;
        self.initialized = true;
        info!(
            map = %self.config.doom_map,
            mode = ?self.config.mode,
            buttons = self.buttons.len(),
            variables = self.variables.len(),
            "engine_started"
        );

        if let Err(err) = self.begin_episode() {
            self.close();
            return Err(match err {
                GameError::EngineLink(inner) => GameError::Initialization(inner),
                other => other,
            });
        }
        Ok(())
    }

    /// Stop the engine. Safe to call repeatedly and without a prior `init`.
    pub fn close(&mut self) {
        if self.initialized {
            info!(
                summary_reward = self.episode.state().summary_reward,
                "engine_closed"
            );
        }
        self.link.shutdown();
        self.initialized = false;
        self.pending = None;
        self.episode.close();
    }

    /// Reset episode bookkeeping and restart the map, relaunching the engine
    /// if the link reports it dead.
    pub fn new_episode(&mut self) -> GameResult<()> {
        self.ensure_initialized()?;

        if self.link.is_alive() {
            if let Err(err) = self.link.new_episode(self.config.seed) {
                return Err(self.link_failure(err));
            }
        } else {
            warn!("engine_restarting");
            self.link
                .start(&self.config)
                .map_err(GameError::Initialization)?;
        }
        self.begin_episode()
    }

    /// Whether an episode is active and the engine is alive.
    pub fn is_running(&mut self) -> bool {
        self.initialized && self.episode.state().is_active() && self.link.is_alive()
    }

    /// Store an action applied by the next advance. Does not advance time.
    pub fn set_action(&mut self, action: &[i32]) -> GameResult<()> {
        if !self.config.mode.accepts_actions() {
            return Err(GameError::ModeViolation(format!(
                "{:?} mode does not accept actions",
                self.config.mode
            )));
        }
        let mapped = self.buttons.map_action(action)?;
        self.pending = Some(mapped);
        self.last_action = action.to_vec();
        Ok(())
    }

    /// Advance one tic and refresh the state.
    pub fn advance_action(&mut self) -> GameResult<()> {
        self.advance_action_with(1, true, false)
    }

    /// Advance `tics` tics with the pending action held down.
    ///
    /// With `update_state` the snapshot is rebuilt once the tics complete.
    /// `render_only` runs the engine and refreshes the frame without crediting
    /// reward or evaluating episode transitions, which is how spectating is
    /// kept in step.
    ///
    /// In synchronous modes the episode is evaluated after every tic and the
    /// call stops early if the episode finishes. In asynchronous modes the
    /// engine free-runs and is credited with however many tics it reports;
    /// see [`DoomGame::last_observed_tics`].
    pub fn advance_action_with(
        &mut self,
        tics: u32,
        update_state: bool,
        render_only: bool,
    ) -> GameResult<()> {
        self.ensure_initialized()?;
        if !render_only && !self.episode.state().is_active() {
            return Err(GameError::ModeViolation(
                "episode is not active; call new_episode".to_string(),
            ));
        }

        self.episode.begin_advance();
        self.last_observed_tics = 0;

        if let Some(buttons) = self.pending.take() {
            if self.config.mode.accepts_actions() {
                if let Err(err) = self.link.write_action(&buttons) {
                    return Err(self.link_failure(err));
                }
            }
        }

        if render_only {
            if let Err(err) = self.link.advance(tics, true) {
                return Err(self.link_failure(err));
            }
            self.engine_vars = self.link.read_variables();
            self.last_observed_tics = tics;
            if update_state {
                self.refresh_state();
            }
            return Ok(());
        }

        let finished = if self.config.mode.is_synchronous() {
            self.advance_synchronous(tics, update_state)?
        } else {
            self.advance_asynchronous(tics, update_state)?
        };

        if let Some(reason) = finished {
            let state = self.episode.state();
            info!(
                reason = ?reason,
                elapsed = state.elapsed,
                summary_reward = state.summary_reward,
                "episode_finished"
            );
            if self.episode.rules().auto_new_episode {
                let carried = state.last_reward;
                self.new_episode()?;
                self.episode.restore_last_reward(carried);
                return Ok(());
            }
        }

        if update_state {
            self.refresh_state();
        }
        Ok(())
    }

    fn advance_synchronous(
        &mut self,
        tics: u32,
        update_state: bool,
    ) -> GameResult<Option<FinishReason>> {
        // Only the frame of the last simulated tic is ever observed.
        for tic in 1..=tics {
            let render = update_state && tic == tics;
            if let Err(err) = self.link.advance(1, render) {
                return Err(self.link_failure(err));
            }
            self.engine_vars = self.link.read_variables();
            self.last_observed_tics += 1;
            let outcome = self.episode.step(&self.engine_vars, 1);
            if outcome.finished.is_some() {
                if update_state && !render {
                    if let Err(err) = self.link.advance(0, true) {
                        return Err(self.link_failure(err));
                    }
                }
                return Ok(outcome.finished);
            }
        }
        Ok(None)
    }

    fn advance_asynchronous(
        &mut self,
        tics: u32,
        update_state: bool,
    ) -> GameResult<Option<FinishReason>> {
        let before = self.engine_vars.tic;
        if let Err(err) = self.link.advance(tics, update_state) {
            return Err(self.link_failure(err));
        }
        self.engine_vars = self.link.read_variables();
        let observed = self.engine_vars.tic.saturating_sub(before);
        if observed != tics {
            debug!(requested = tics, observed, "async_tic_drift");
        }
        self.last_observed_tics = observed;
        Ok(self.episode.step(&self.engine_vars, observed).finished)
    }

    /// Set the action, advance one tic and return the reward it earned.
    pub fn make_action(&mut self, action: &[i32]) -> GameResult<f64> {
        self.make_action_for(action, 1)
    }

    /// Set the action, advance `tics` tics and return the reward they earned.
    pub fn make_action_for(&mut self, action: &[i32], tics: u32) -> GameResult<f64> {
        self.set_action(action)?;
        self.advance_action_with(tics, true, false)?;
        Ok(self.get_last_reward())
    }

    /// Current snapshot. Variables are copied; the frame is shared and immutable.
    pub fn get_state(&self) -> StateSnapshot {
        self.snapshots.current().clone()
    }

    /// Borrow the current snapshot without copying its variables.
    pub fn state(&self) -> &StateSnapshot {
        self.snapshots.current()
    }

    /// Action vector most recently accepted by `set_action`.
    pub fn get_last_action(&self) -> &[i32] {
        &self.last_action
    }

    /// True from a reset until the next advance.
    pub fn is_new_episode(&self) -> bool {
        self.episode.state().new_episode
    }

    /// True once a trigger or a link failure has ended the episode.
    pub fn is_episode_finished(&self) -> bool {
        self.episode.state().is_finished()
    }

    /// Copy of the episode bookkeeping.
    pub fn episode_state(&self) -> EpisodeState {
        *self.episode.state()
    }

    /// Tics the engine actually ran during the last advance call.
    pub fn last_observed_tics(&self) -> u32 {
        self.last_observed_tics
    }

    /// Append an uncapped button, or clear the cap of an existing one.
    pub fn add_available_button(&mut self, button: Button) {
        self.buttons.add(button, None);
    }

    /// Append a capped button, or update the cap of an existing one.
    pub fn add_available_button_with_max(&mut self, button: Button, max_value: u32) {
        self.buttons.add(button, Some(max_value));
    }

    /// Remove every button. Any pending action is dropped.
    pub fn clear_available_buttons(&mut self) {
        self.buttons.clear();
        self.pending = None;
        self.last_action.clear();
    }

    /// Available buttons in action-vector order.
    pub fn available_buttons(&self) -> &[ButtonBinding] {
        self.buttons.bindings()
    }

    /// Length every action vector must have.
    pub fn available_buttons_size(&self) -> usize {
        self.buttons.len()
    }

    /// Fails with `NotFound` if the button is not available.
    pub fn set_button_max_value(&mut self, button: Button, max_value: Option<u32>) -> GameResult<()> {
        self.buttons.set_max_value(button, max_value)
    }

    /// Fails with `NotFound` if the button is not available.
    pub fn get_button_max_value(&self, button: Button) -> GameResult<Option<u32>> {
        self.buttons.max_value(button)
    }

    /// Append a variable to every following snapshot. Duplicates are ignored.
    pub fn add_available_game_variable(&mut self, variable: GameVariable) {
        self.variables.add(variable);
    }

    /// Remove every variable; snapshots carry no values until more are added.
    pub fn clear_available_game_variables(&mut self) {
        self.variables.clear();
    }

    /// Available variables in snapshot order.
    pub fn available_game_variables(&self) -> &[GameVariable] {
        self.variables.variables()
    }

    /// Length of every snapshot variable vector.
    pub fn available_game_variables_size(&self) -> usize {
        self.variables.len()
    }

    /// Any engine variable from the last synchronization, available or not.
    pub fn get_game_variable(&self, variable: GameVariable) -> i32 {
        self.engine_vars.get(variable)
    }

    /// Takes effect on the next `init`.
    pub fn add_custom_game_arg(&mut self, arg: impl Into<String>) {
        self.config.custom_args.push(arg.into());
    }

    /// Takes effect on the next `init`.
    pub fn clear_custom_game_args(&mut self) {
        self.config.custom_args.clear();
    }

    /// Forward a console command to the running engine.
    pub fn send_game_command(&mut self, command: &str) -> GameResult<()> {
        self.ensure_initialized()?;
        self.link
            .send_command(command)
            .map_err(GameError::EngineLink)
    }

    /// Latest frame published by the engine, which may be newer than the one
    /// in the current snapshot after a stateless advance.
    pub fn get_game_screen(&self) -> Option<Frame> {
        self.link.read_frame()
    }

    /// Control mode used by the next advance.
    pub fn get_mode(&self) -> Mode {
        self.config.mode
    }

    /// Only permitted while the engine is not running.
    pub fn set_mode(&mut self, mode: Mode) -> GameResult<()> {
        if self.initialized {
            return Err(GameError::ModeViolation(
                "mode can only change before init or after close".to_string(),
            ));
        }
        debug!(from = ?self.config.mode, to = ?mode, "mode_changed");
        self.config.mode = mode;
        Ok(())
    }

    /// Edit engine options; only permitted while the engine is not running.
    pub fn configure(&mut self, edit: impl FnOnce(&mut GameConfig)) -> GameResult<()> {
        if self.initialized {
            return Err(GameError::ModeViolation(
                "engine options can only change before init or after close".to_string(),
            ));
        }
        edit(&mut self.config);
        *self.episode.rules_mut() = self.config.episode;
        *self.episode.reward_rules_mut() = self.config.reward;
        Ok(())
    }

    /// Resolved options, including runtime edits.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Reward credited on every tic the player is alive.
    pub fn get_living_reward(&self) -> f64 {
        self.episode.reward_rules().living_reward
    }

    /// Takes effect from the next tic.
    pub fn set_living_reward(&mut self, reward: f64) {
        self.config.reward.living_reward = reward;
        self.episode.reward_rules_mut().living_reward = reward;
    }

    /// Reward credited once on the tic the player dies.
    pub fn get_death_penalty(&self) -> f64 {
        self.episode.reward_rules().death_penalty
    }

    /// Takes effect from the next tic.
    pub fn set_death_penalty(&mut self, penalty: f64) {
        self.config.reward.death_penalty = penalty;
        self.episode.reward_rules_mut().death_penalty = penalty;
    }

    /// Reward earned by the last advance call, summed over its tics.
    pub fn get_last_reward(&self) -> f64 {
        self.episode.state().last_reward
    }

    /// Reward accumulated since the last `new_episode`.
    pub fn get_summary_reward(&self) -> f64 {
        self.episode.state().summary_reward
    }

    /// Seed passed to the engine on every reset.
    pub fn get_seed(&self) -> Option<u32> {
        self.config.seed
    }

    /// Used by the next `new_episode`.
    pub fn set_seed(&mut self, seed: u32) {
        self.config.seed = Some(seed);
    }

    /// Start a new episode as soon as one finishes.
    pub fn set_auto_new_episode(&mut self, enabled: bool) {
        self.update_rules(|rules| rules.auto_new_episode = enabled);
    }

    /// Whether reaching the timeout finishes the episode.
    pub fn set_new_episode_on_timeout(&mut self, enabled: bool) {
        self.update_rules(|rules| rules.new_episode_on_timeout = enabled);
    }

    /// Whether player death finishes the episode.
    pub fn set_new_episode_on_player_death(&mut self, enabled: bool) {
        self.update_rules(|rules| rules.new_episode_on_player_death = enabled);
    }

    /// Whether leaving the map finishes the episode.
    pub fn set_new_episode_on_map_end(&mut self, enabled: bool) {
        self.update_rules(|rules| rules.new_episode_on_map_end = enabled);
    }

    /// Tics the engine runs after a reset before control is handed over.
    pub fn get_episode_start_time(&self) -> u32 {
        self.episode.rules().start_time
    }

    /// Takes effect on the next `new_episode`.
    pub fn set_episode_start_time(&mut self, tics: u32) {
        self.update_rules(|rules| rules.start_time = tics);
    }

    /// Episode length limit in tics; `0` when disabled.
    pub fn get_episode_timeout(&self) -> u32 {
        self.episode.rules().timeout
    }

    /// `0` disables the timeout.
    pub fn set_episode_timeout(&mut self, tics: u32) {
        self.update_rules(|rules| rules.timeout = tics);
    }

    /// Tics elapsed since the current episode started.
    pub fn get_episode_time(&self) -> u32 {
        self.episode.state().elapsed
    }

    /// Frame width in pixels.
    pub fn get_screen_width(&self) -> usize {
        self.config.screen_dimensions().0
    }

    /// Frame height in pixels.
    pub fn get_screen_height(&self) -> usize {
        self.config.screen_dimensions().1
    }

    /// Bytes per pixel, or planes for planar formats.
    pub fn get_screen_channels(&self) -> usize {
        self.config.screen_format.channels()
    }

    /// Bytes between the starts of two consecutive rows.
    pub fn get_screen_pitch(&self) -> usize {
        self.config.screen_format.pitch(self.get_screen_width())
    }

    /// Bytes in a full frame.
    pub fn get_screen_size(&self) -> usize {
        self.get_screen_width() * self.get_screen_height() * self.get_screen_channels()
    }

    /// Pixel layout of rendered frames.
    pub fn get_screen_format(&self) -> ScreenFormat {
        self.config.screen_format
    }

    /// The underlying Engine Link.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// The underlying Engine Link, mutably.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    fn update_rules(&mut self, edit: impl FnOnce(&mut EpisodeRules)) {
        edit(self.episode.rules_mut());
        self.config.episode = *self.episode.rules();
    }

    fn ensure_initialized(&self) -> GameResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(GameError::NotInitialized)
        }
    }

    fn begin_episode(&mut self) -> GameResult<()> {
        self.pending = None;
        let start_time = self.episode.rules().start_time;
        if start_time > 0 {
            if let Err(err) = self.link.advance(start_time, false) {
                return Err(self.link_failure(err));
            }
        }

        self.engine_vars = self.link.read_variables();
        self.episode.begin(&self.engine_vars);
        self.snapshots.reset();
        self.refresh_state();
        info!(start_tic = self.engine_vars.tic, seed = ?self.config.seed, "episode_started");
        Ok(())
    }

    fn refresh_state(&mut self) {
        let frame = self.link.read_frame();
        self.snapshots
            .refresh(&self.variables, &self.engine_vars, frame);
    }

    fn link_failure(&mut self, err: EngineError) -> GameError {
        warn!(error = %err, tic = self.engine_vars.tic, "engine_link_failed");
        self.episode.finish(FinishReason::EngineFailure);
        GameError::EngineLink(err)
    }
}

impl<L: EngineLink> Drop for DoomGame<L> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RewardRules;
    use crate::testing::ScriptedLink;

    fn base_config() -> GameConfig {
        GameConfig::new("/opt/doom/engine", "/opt/doom/doom2.wad")
            .with_button(Button::MoveForward)
            .with_button(Button::TurnLeft)
            .with_game_variable(GameVariable::Health)
            .with_game_variable(GameVariable::PositionX)
            .with_reward_rules(RewardRules::new(1.0, -50.0))
    }

    fn started(config: GameConfig, link: ScriptedLink) -> DoomGame<ScriptedLink> {
        let mut game = DoomGame::new(config, link);
        game.init().expect("game should start");
        game
    }

    #[test]
    fn make_action_on_fresh_episode_returns_living_reward() {
        let mut game = started(base_config(), ScriptedLink::new());
        game.new_episode().unwrap();

        let reward = game.make_action(&[1, 0]).unwrap();
        assert_eq!(reward, 1.0);
        assert_eq!(game.get_episode_time(), 1);
        assert_eq!(game.get_state().number(), 1);
        assert_eq!(game.get_state().game_variables(), &[100, 1]);
    }

    #[test]
    fn every_advance_bumps_sequence_by_one() {
        let mut game = started(base_config(), ScriptedLink::new());
        for expected in 1..=5 {
            game.set_action(&[0, 1]).unwrap();
            game.advance_action().unwrap();
            assert_eq!(game.get_state().number(), expected);
        }
        game.advance_action_with(4, true, false).unwrap();
        assert_eq!(game.get_state().number(), 6);
    }

    #[test]
    fn wrong_action_length_is_rejected_and_nothing_advances() {
        let mut game = started(base_config(), ScriptedLink::new());
        let err = game.set_action(&[1]).unwrap_err();
        assert!(matches!(err, GameError::InvalidAction { expected: 2, got: 1 }));
        assert_eq!(game.link().advanced_tics(), 0);
        assert_eq!(game.get_state().number(), 0);
    }

    #[test]
    fn new_episode_resets_reward_and_flags() {
        let mut game = started(base_config(), ScriptedLink::new());
        game.make_action_for(&[1, 0], 3).unwrap();
        assert!(!game.is_new_episode());
        assert_eq!(game.get_summary_reward(), 3.0);

        game.new_episode().unwrap();
        assert_eq!(game.get_summary_reward(), 0.0);
        assert!(game.is_new_episode());
        assert_eq!(game.get_state().number(), 0);

        game.advance_action().unwrap();
        assert!(!game.is_new_episode());
    }

    #[test]
    fn summary_reward_is_tics_times_living_reward() {
        let mut game = started(base_config(), ScriptedLink::new());
        game.set_living_reward(0.25);
        for _ in 0..8 {
            game.make_action(&[0, 0]).unwrap();
        }
        game.make_action_for(&[0, 0], 4).unwrap();
        assert_eq!(game.get_summary_reward(), 3.0);
        assert_eq!(game.get_episode_time(), 12);
    }

    #[test]
    fn multi_tic_last_reward_is_summed() {
        let mut game = started(base_config(), ScriptedLink::new());
        assert_eq!(game.make_action_for(&[1, 0], 5).unwrap(), 5.0);
        assert_eq!(game.get_game_variable(GameVariable::PositionX), 5);
    }

    #[test]
    fn timeout_finishes_episode_without_auto_restart() {
        let config = base_config().with_episode_rules(EpisodeRules::default().with_timeout(5));
        let mut game = started(config, ScriptedLink::new());

        game.advance_action_with(5, true, false).unwrap();
        assert!(game.is_episode_finished());
        assert!(!game.is_running());
        assert_eq!(
            game.episode_state().finish_reason,
            Some(FinishReason::Timeout)
        );

        let err = game.advance_action().unwrap_err();
        assert!(matches!(err, GameError::ModeViolation(_)));
    }

    #[test]
    fn timeout_stops_multi_tic_advance_early() {
        let config = base_config().with_episode_rules(EpisodeRules::default().with_timeout(3));
        let mut game = started(config, ScriptedLink::new());
        game.advance_action_with(10, true, false).unwrap();
        assert_eq!(game.link().advanced_tics(), 3);
        assert_eq!(game.get_last_reward(), 3.0);
    }

    #[test]
    fn auto_new_episode_restarts_immediately() {
        let rules = EpisodeRules::default()
            .with_timeout(2)
            .with_auto_new_episode(true);
        let mut game = started(base_config().with_episode_rules(rules), ScriptedLink::new());

        let reward = game.make_action_for(&[0, 0], 2).unwrap();
        assert_eq!(reward, 2.0);
        assert!(game.is_running());
        assert!(game.is_new_episode());
        assert!(!game.is_episode_finished());
        assert_eq!(game.get_summary_reward(), 0.0);
        assert_eq!(game.get_state().number(), 0);
    }

    #[test]
    fn death_applies_penalty_and_finishes() {
        let mut game = started(base_config(), ScriptedLink::new().with_death_at(3));
        let reward = game.make_action_for(&[1, 0], 5).unwrap();
        assert_eq!(reward, 2.0 - 50.0);
        assert!(game.is_episode_finished());
        assert_eq!(
            game.episode_state().finish_reason,
            Some(FinishReason::PlayerDeath)
        );
        assert_eq!(game.get_state().game_variables()[0], 0);
    }

    #[test]
    fn map_end_finishes_episode() {
        let mut game = started(base_config(), ScriptedLink::new().with_map_end_at(2));
        game.advance_action_with(4, true, false).unwrap();
        assert_eq!(
            game.episode_state().finish_reason,
            Some(FinishReason::MapEnd)
        );
    }

    #[test]
    fn shaping_reward_comes_from_designated_variable() {
        let config = base_config().with_reward_rules(
            RewardRules::new(0.0, 0.0).with_shaping_variable(GameVariable::User1),
        );
        let mut game = started(config, ScriptedLink::new().with_shaping_per_tic(1 << 15));
        assert_eq!(game.make_action_for(&[0, 0], 4).unwrap(), 2.0);
        assert_eq!(game.make_action(&[0, 0]).unwrap(), 0.5);
    }

    #[test]
    fn link_failure_is_fatal_for_episode_and_recoverable_by_new_episode() {
        let mut game = started(base_config(), ScriptedLink::new().with_failure_at(3));
        game.make_action(&[1, 0]).unwrap();
        let before = game.get_state();

        let err = game.make_action_for(&[1, 0], 5).unwrap_err();
        assert!(matches!(err, GameError::EngineLink(_)));
        assert!(!game.is_running());
        assert!(game.is_episode_finished());
        assert_eq!(game.get_state().number(), before.number());
        assert_eq!(game.get_summary_reward(), 2.0);

        game.new_episode().unwrap();
        assert!(game.is_running());
        assert_eq!(game.link().start_count(), 2);
    }

    #[test]
    fn snapshot_frame_survives_later_advances() {
        let mut game = started(base_config(), ScriptedLink::new());
        game.advance_action().unwrap();
        let held = game.get_state();
        let held_bytes = held.image_buffer().unwrap().to_vec();

        game.advance_action_with(3, true, false).unwrap();
        assert_eq!(held.image_buffer().unwrap(), held_bytes.as_slice());
        assert_ne!(
            game.get_state().frame().unwrap().generation(),
            held.frame().unwrap().generation()
        );
    }

    #[test]
    fn multi_tic_advance_renders_one_frame() {
        let mut game = started(base_config(), ScriptedLink::new());
        let before = game.get_state().frame().unwrap().generation();

        game.advance_action_with(10, true, false).unwrap();
        let frame = game.get_state().frame().unwrap().clone();
        assert_eq!(frame.generation(), before + 1);
        assert!(frame.data().iter().all(|byte| *byte == 10));
    }

    #[test]
    fn early_finish_renders_the_finishing_tic() {
        let mut game = started(base_config(), ScriptedLink::new().with_death_at(3));
        let before = game.get_state().frame().unwrap().generation();

        game.advance_action_with(10, true, false).unwrap();
        assert!(game.is_episode_finished());
        let frame = game.get_state().frame().unwrap().clone();
        assert_eq!(frame.generation(), before + 1);
        assert!(frame.data().iter().all(|byte| *byte == 3));
    }

    #[test]
    fn advance_without_state_update_renders_nothing() {
        let mut game = started(base_config(), ScriptedLink::new());
        let before = game.get_game_screen().unwrap().generation();
        game.advance_action_with(4, false, false).unwrap();
        assert_eq!(game.get_game_screen().unwrap().generation(), before);
    }

    #[test]
    fn stateless_advance_keeps_snapshot() {
        let mut game = started(base_config(), ScriptedLink::new());
        game.advance_action_with(2, false, false).unwrap();
        assert_eq!(game.get_state().number(), 0);
        assert_eq!(game.get_episode_time(), 2);
    }

    #[test]
    fn render_only_advance_skips_reward() {
        let mut game = started(base_config(), ScriptedLink::new());
        game.advance_action_with(3, true, true).unwrap();
        assert_eq!(game.get_last_reward(), 0.0);
        assert_eq!(game.get_summary_reward(), 0.0);
        assert_eq!(game.get_episode_time(), 0);
        assert_eq!(game.get_state().number(), 1);
    }

    #[test]
    fn spectator_mode_refuses_actions() {
        let config = base_config().with_mode(Mode::Spectator);
        let mut game = started(config, ScriptedLink::new());
        assert!(matches!(
            game.set_action(&[1, 0]),
            Err(GameError::ModeViolation(_))
        ));
        game.advance_action().unwrap();
        assert!(game.link().written_actions().is_empty());
    }

    #[test]
    fn async_mode_credits_observed_tics() {
        let config = base_config().with_mode(Mode::AsyncPlayer);
        let mut game = started(config, ScriptedLink::new().with_async_drift(2));
        let reward = game.make_action(&[0, 0]).unwrap();
        assert_eq!(game.last_observed_tics(), 3);
        assert_eq!(reward, 3.0);
    }

    #[test]
    fn mode_change_rejected_while_initialized() {
        let mut game = started(base_config(), ScriptedLink::new());
        assert!(game.set_mode(Mode::AsyncPlayer).is_err());
        game.close();
        game.set_mode(Mode::AsyncPlayer).unwrap();
        assert_eq!(game.get_mode(), Mode::AsyncPlayer);
    }

    #[test]
    fn init_requires_paths() {
        let mut game = DoomGame::new(GameConfig::default(), ScriptedLink::new());
        assert!(matches!(game.init(), Err(GameError::Config(_))));
        assert_eq!(game.link().start_count(), 0);
    }

    #[test]
    fn init_surfaces_engine_start_failure() {
        let config = GameConfig::new("/opt/missing/engine", "doom2.wad");
        let mut game = DoomGame::new(config, ScriptedLink::new());
        assert!(matches!(game.init(), Err(GameError::Initialization(_))));
        assert!(!game.is_running());
    }

    #[test]
    fn close_is_idempotent_and_safe_before_init() {
        let mut game = DoomGame::new(base_config(), ScriptedLink::new());
        game.close();
        game.close();
        assert!(matches!(game.new_episode(), Err(GameError::NotInitialized)));
    }

    #[test]
    fn episode_start_time_runs_engine_before_handover() {
        let rules = EpisodeRules::default().with_start_time(10).with_timeout(5);
        let mut game = started(base_config().with_episode_rules(rules), ScriptedLink::new());
        assert_eq!(game.episode_state().start_tic, 10);
        game.advance_action_with(5, true, false).unwrap();
        assert!(game.is_episode_finished());
        assert_eq!(game.get_summary_reward(), 5.0);
    }

    #[test]
    fn registry_changes_mid_episode_are_legal() {
        let mut game = started(base_config(), ScriptedLink::new());
        game.add_available_button_with_max(Button::TurnLeftRightDelta, 10);
        game.add_available_game_variable(GameVariable::Ammo2);
        game.make_action(&[0, 0, -30]).unwrap();

        let written = game.link().written_actions().last().copied().unwrap();
        assert_eq!(written[Button::TurnLeftRightDelta.index()], -10);
        assert_eq!(game.get_state().game_variables().len(), 3);
        assert_eq!(game.get_last_action(), &[0, 0, -30]);

        game.clear_available_buttons();
        assert_eq!(game.available_buttons_size(), 0);
        assert!(game.get_last_action().is_empty());
    }

    #[test]
    fn button_cap_queries() {
        let mut game = DoomGame::new(base_config(), ScriptedLink::new());
        game.set_button_max_value(Button::MoveForward, Some(3)).unwrap();
        assert_eq!(game.get_button_max_value(Button::MoveForward).unwrap(), Some(3));
        assert!(matches!(
            game.get_button_max_value(Button::Jump),
            Err(GameError::NotFound(Button::Jump))
        ));
    }

    #[test]
    fn seed_is_passed_to_each_episode() {
        let mut game = started(base_config(), ScriptedLink::new());
        game.set_seed(77);
        game.new_episode().unwrap();
        assert_eq!(game.link().episode_seeds(), &[Some(77)]);
    }

    #[test]
    fn commands_are_forwarded() {
        let mut game = started(base_config(), ScriptedLink::new());
        game.send_game_command("give weapons").unwrap();
        assert_eq!(game.link().commands(), &["give weapons".to_string()]);
    }

    #[test]
    fn screen_queries_follow_config() {
        let game = DoomGame::new(base_config(), ScriptedLink::new());
        assert_eq!(game.get_screen_width(), 320);
        assert_eq!(game.get_screen_height(), 240);
        assert_eq!(game.get_screen_channels(), 3);
        assert_eq!(game.get_screen_pitch(), 960);
        assert_eq!(game.get_screen_size(), 320 * 240 * 3);
    }
}
