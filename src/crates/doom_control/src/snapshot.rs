//! Immutable observations handed to the caller at each synchronization point.

use crate::link::{EngineVariables, Frame};
use crate::registry::VariableRegistry;

/// Variables and frame captured at one synchronization point.
///
/// The frame is shared with the Engine Link, never mutated after capture, and
/// stays valid for as long as the snapshot is held.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    number: u32,
    game_variables: Vec<i32>,
    frame: Option<Frame>,
}

impl StateSnapshot {
    /// Position of this snapshot within the current episode, starting at 0.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Values of the available game variables, in registry order.
    pub fn game_variables(&self) -> &[i32] {
        &self.game_variables
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    pub fn image_buffer(&self) -> Option<&[u8]> {
        self.frame.as_ref().map(Frame::data)
    }
}

/// Produces numbered snapshots from raw engine reads.
#[derive(Debug, Default)]
pub(crate) struct SnapshotBuilder {
    next_number: u32,
    current: StateSnapshot,
}

impl SnapshotBuilder {
    /// Restart numbering so the next refresh yields snapshot 0.
    pub(crate) fn reset(&mut self) {
        self.next_number = 0;
    }

    pub(crate) fn refresh(
        &mut self,
        registry: &VariableRegistry,
        raw: &EngineVariables,
        frame: Option<Frame>,
    ) -> &StateSnapshot {
        self.current = StateSnapshot {
            number: self.next_number,
            game_variables: registry.select(raw),
            frame,
        };
        self.next_number = self.next_number.wrapping_add(1);
        &self.current
    }

    pub(crate) fn current(&self) -> &StateSnapshot {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defines::{GameVariable, ScreenFormat};

    #[test]
    fn numbers_increase_by_one_and_restart_on_reset() {
        let registry = VariableRegistry::new();
        let raw = EngineVariables::default();
        let mut builder = SnapshotBuilder::default();

        assert_eq!(builder.refresh(&registry, &raw, None).number(), 0);
        assert_eq!(builder.refresh(&registry, &raw, None).number(), 1);
        builder.reset();
        assert_eq!(builder.refresh(&registry, &raw, None).number(), 0);
    }

    #[test]
    fn refresh_copies_selected_variables() {
        let mut registry = VariableRegistry::new();
        registry.add(GameVariable::Health);
        let mut raw = EngineVariables::default();
        raw.set(GameVariable::Health, 42);

        let mut builder = SnapshotBuilder::default();
        builder.refresh(&registry, &raw, None);
        raw.set(GameVariable::Health, 7);

        assert_eq!(builder.current().game_variables(), &[42]);
    }

    #[test]
    fn held_snapshot_keeps_its_frame() {
        let registry = VariableRegistry::new();
        let raw = EngineVariables::default();
        let mut builder = SnapshotBuilder::default();

        let first = builder
            .refresh(&registry, &raw, Some(Frame::new(vec![1u8; 3], 1, 1, ScreenFormat::Rgb24, 1)))
            .clone();
        builder.refresh(&registry, &raw, Some(Frame::new(vec![9u8; 3], 1, 1, ScreenFormat::Rgb24, 2)));

        assert_eq!(first.image_buffer(), Some(&[1u8, 1, 1][..]));
        assert_eq!(builder.current().image_buffer(), Some(&[9u8, 9, 9][..]));
    }
}
