//! Ordered button and variable selections.
//!
//! Registry order is the public contract for action vectors and state
//! variable vectors: value `i` of an action drives the `i`-th available
//! button, and value `i` of a snapshot belongs to the `i`-th available variable.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::defines::{Button, GameVariable};
use crate::error::{GameError, GameResult};
use crate::link::EngineVariables;

/// Full engine-side button buffer, indexed by [`Button::index`].
pub type ButtonBuffer = [i32; Button::COUNT];

/// An available button and its optional magnitude cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonBinding {
    pub button: Button,
    #[serde(default)]
    pub max_value: Option<u32>,
}

impl ButtonBinding {
    pub fn new(button: Button) -> Self {
        Self {
            button,
            max_value: None,
        }
    }

    pub fn with_max_value(mut self, max_value: u32) -> Self {
        self.max_value = Some(max_value);
        self
    }

    /// Map a caller-supplied value onto what the engine receives for this button.
    ///
    /// Binary buttons are pressed/released unless capped, in which case they
    /// clamp to `[0, cap]`. Delta buttons keep their sign and clamp to
    /// `[-cap, cap]` when capped.
    pub fn normalize(&self, value: i32) -> i32 {
        let cap = self.max_value.map(|cap| i32::try_from(cap).unwrap_or(i32::MAX));
        match (self.button.is_delta(), cap) {
            (true, Some(cap)) => value.clamp(-cap, cap),
            (true, None) => value,
            (false, Some(cap)) => value.clamp(0, cap),
            (false, None) => i32::from(value != 0),
        }
    }
}

/// Buttons the caller drives, in action-vector order.
#[derive(Debug, Clone, Default)]
pub struct ButtonRegistry {
    bindings: Vec<ButtonBinding>,
}

impl ButtonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a button, or update its cap if it is already available.
    pub fn add(&mut self, button: Button, max_value: Option<u32>) {
        if let Some(binding) = self.bindings.iter_mut().find(|b| b.button == button) {
            debug!(%button, ?max_value, "button_cap_updated");
            binding.max_value = max_value;
            return;
        }
        self.bindings.push(ButtonBinding { button, max_value });
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn bindings(&self) -> &[ButtonBinding] {
        &self.bindings
    }

    pub fn position(&self, button: Button) -> Option<usize> {
        self.bindings.iter().position(|b| b.button == button)
    }

    pub fn set_max_value(&mut self, button: Button, max_value: Option<u32>) -> GameResult<()> {
        let binding = self
            .bindings
            .iter_mut()
            .find(|b| b.button == button)
            .ok_or(GameError::NotFound(button))?;
        binding.max_value = max_value;
        Ok(())
    }

    pub fn max_value(&self, button: Button) -> GameResult<Option<u32>> {
        self.bindings
            .iter()
            .find(|b| b.button == button)
            .map(|b| b.max_value)
            .ok_or(GameError::NotFound(button))
    }

    /// Check an action vector's shape against the available buttons.
    pub fn validate(&self, action: &[i32]) -> GameResult<()> {
        if action.len() != self.bindings.len() {
            return Err(GameError::InvalidAction {
                expected: self.bindings.len(),
                got: action.len(),
            });
        }
        Ok(())
    }

    /// Scatter an action vector into a full engine button buffer.
    pub fn map_action(&self, action: &[i32]) -> GameResult<ButtonBuffer> {
        self.validate(action)?;
        let mut buffer = [0; Button::COUNT];
        for (binding, value) in self.bindings.iter().zip(action) {
            buffer[binding.button.index()] = binding.normalize(*value);
        }
        Ok(buffer)
    }
}

/// Variables copied into every state snapshot, in snapshot order.
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    variables: Vec<GameVariable>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a variable. Returns `false` if it was already available.
    pub fn add(&mut self, variable: GameVariable) -> bool {
        if self.variables.contains(&variable) {
            debug!(%variable, "duplicate_game_variable_ignored");
            return false;
        }
        self.variables.push(variable);
        true
    }

    pub fn clear(&mut self) {
        self.variables.clear();
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn variables(&self) -> &[GameVariable] {
        &self.variables
    }

    /// Pick the available variables out of a raw engine block, in registry order.
    pub fn select(&self, raw: &EngineVariables) -> Vec<i32> {
        self.variables.iter().map(|var| raw.get(*var)).collect()
    }
}
