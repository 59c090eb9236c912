//! Episode lifecycle and reward bookkeeping.
//!
//! The machine is fed the engine variable block after every advanced tic (or
//! every observed chunk of tics in asynchronous modes) and decides how much
//! reward was earned and whether the episode is over.

use serde::{Deserialize, Serialize};

use crate::config::{EpisodeRules, RewardRules};
use crate::defines::doom_fixed_to_float;
use crate::link::EngineVariables;

/// Lifecycle phase of the current episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EpisodePhase {
    /// Before `init` or after `close`.
    #[default]
    Idle,
    Active,
    Finished,
}

/// Why an episode stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FinishReason {
    Timeout,
    PlayerDeath,
    MapEnd,
    /// The Engine Link failed mid-advance.
    EngineFailure,
}

/// Read-only view of the episode bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EpisodeState {
    pub phase: EpisodePhase,
    /// Engine tic at which control was handed to the caller.
    pub start_tic: u32,
    /// Tics elapsed since `start_tic`.
    pub elapsed: u32,
    /// True from a reset until the next advance.
    pub new_episode: bool,
    pub finish_reason: Option<FinishReason>,
    /// Reward accumulated since the last reset.
    pub summary_reward: f64,
    /// Reward earned by the most recent advance call.
    pub last_reward: f64,
}

impl EpisodeState {
    pub fn is_finished(&self) -> bool {
        self.phase == EpisodePhase::Finished
    }

    pub fn is_active(&self) -> bool {
        self.phase == EpisodePhase::Active
    }
}

/// What one evaluation step produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TicOutcome {
    pub(crate) reward: f64,
    pub(crate) finished: Option<FinishReason>,
}

#[derive(Debug, Default)]
pub(crate) struct EpisodeMachine {
    rules: EpisodeRules,
    reward: RewardRules,
    state: EpisodeState,
    player_dead: bool,
    last_shaping: i32,
}

impl EpisodeMachine {
    pub(crate) fn new(rules: EpisodeRules, reward: RewardRules) -> Self {
        Self {
            rules,
            reward,
            ..Self::default()
        }
    }

    pub(crate) fn rules(&self) -> &EpisodeRules {
        &self.rules
    }

    pub(crate) fn rules_mut(&mut self) -> &mut EpisodeRules {
        &mut self.rules
    }

    pub(crate) fn reward_rules(&self) -> &RewardRules {
        &self.reward
    }

    pub(crate) fn reward_rules_mut(&mut self) -> &mut RewardRules {
        &mut self.reward
    }

    pub(crate) fn state(&self) -> &EpisodeState {
        &self.state
    }

    /// Enter `Active` with fresh bookkeeping, using `raw` as the baseline for
    /// death and shaping-reward deltas.
    pub(crate) fn begin(&mut self, raw: &EngineVariables) {
        self.state = EpisodeState {
            phase: EpisodePhase::Active,
            start_tic: raw.tic,
            elapsed: 0,
            new_episode: true,
            finish_reason: None,
            summary_reward: 0.0,
            last_reward: 0.0,
        };
        self.player_dead = raw.player_dead();
        self.last_shaping = self.shaping_value(raw);
    }

    /// Start accounting for a new advance call.
    pub(crate) fn begin_advance(&mut self) {
        self.state.new_episode = false;
        self.state.last_reward = 0.0;
    }

    pub(crate) fn restore_last_reward(&mut self, reward: f64) {
        self.state.last_reward = reward;
    }

    /// Credit `tics` elapsed tics ending in the engine state `raw`.
    pub(crate) fn step(&mut self, raw: &EngineVariables, tics: u32) -> TicOutcome {
        if self.state.phase != EpisodePhase::Active || tics == 0 {
            return TicOutcome {
                reward: 0.0,
                finished: None,
            };
        }

        self.state.elapsed = self.state.elapsed.saturating_add(tics);

        let dead_now = raw.player_dead();
        let newly_dead = dead_now && !self.player_dead;
        self.player_dead = dead_now;

        let mut reward = 0.0;
        if newly_dead {
            reward += self.reward.living_reward * f64::from(tics - 1);
            reward += self.reward.death_penalty;
        } else if !dead_now {
            reward += self.reward.living_reward * f64::from(tics);
        }

        let shaping = self.shaping_value(raw);
        reward += doom_fixed_to_float(shaping.wrapping_sub(self.last_shaping));
        self.last_shaping = shaping;

        self.state.summary_reward += reward;
        self.state.last_reward += reward;

        let finished = if newly_dead && self.rules.new_episode_on_player_death {
            Some(FinishReason::PlayerDeath)
        } else if raw.map_ended && self.rules.new_episode_on_map_end {
            Some(FinishReason::MapEnd)
        } else if self.rules.timeout_enabled() && self.state.elapsed >= self.rules.timeout {
            Some(FinishReason::Timeout)
        } else {
            None
        };

        if let Some(reason) = finished {
            self.finish(reason);
        }

        TicOutcome { reward, finished }
    }

    pub(crate) fn finish(&mut self, reason: FinishReason) {
        self.state.phase = EpisodePhase::Finished;
        self.state.finish_reason = Some(reason);
    }

    pub(crate) fn close(&mut self) {
        self.state = EpisodeState::default();
        self.player_dead = false;
        self.last_shaping = 0;
    }

    fn shaping_value(&self, raw: &EngineVariables) -> i32 {
        self.reward
            .shaping_variable
            .map(|var| raw.get(var))
            .unwrap_or(0)
    }
}
