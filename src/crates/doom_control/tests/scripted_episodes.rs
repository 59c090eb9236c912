#![cfg(feature = "test-support")]

use doom_control::testing::ScriptedLink;
use doom_control::{
    Button, DoomGame, EngineLink, EpisodeRules, FinishReason, GameConfig, GameError,
    GameVariable, Mode, RewardRules,
};

fn config() -> GameConfig {
    GameConfig::new("/opt/doom/engine", "/opt/doom/freedoom2.wad")
        .with_button(Button::MoveForward)
        .with_button(Button::Attack)
        .with_game_variable(GameVariable::Health)
        .with_game_variable(GameVariable::PositionX)
        .with_reward_rules(RewardRules::new(0.5, -20.0))
}

#[test]
fn boxed_link_runs_a_full_episode() {
    let link: Box<dyn EngineLink> = Box::new(ScriptedLink::new().with_death_at(6));
    let mut game: DoomGame<Box<dyn EngineLink>> = DoomGame::new(config(), link);
    game.init().expect("scripted engine should start");

    let mut steps = 0;
    let mut total = 0.0;
    while !game.is_episode_finished() {
        total += game.make_action_for(&[1, 0], 2).expect("advance should work");
        steps += 1;
    }

    assert_eq!(steps, 3);
    assert_eq!(total, 2.5 - 20.0);
    assert_eq!(game.get_summary_reward(), total);
    assert_eq!(
        game.episode_state().finish_reason,
        Some(FinishReason::PlayerDeath)
    );
    assert_eq!(game.get_state().number(), 3);
    game.close();
}

#[test]
fn auto_new_episode_restarts_transparently() {
    let rules = EpisodeRules::default()
        .with_timeout(4)
        .with_auto_new_episode(true);
    let mut game = DoomGame::new(config().with_episode_rules(rules), ScriptedLink::new());
    game.init().unwrap();

    assert_eq!(game.make_action_for(&[1, 0], 10).unwrap(), 2.0);
    assert!(!game.is_episode_finished());
    assert!(game.is_new_episode());
    assert_eq!(game.get_summary_reward(), 0.0);
    assert_eq!(game.get_state().number(), 0);
    assert_eq!(game.link().episode_seeds().len(), 1);
}

#[test]
fn action_width_must_match_available_buttons() {
    let mut game = DoomGame::new(config(), ScriptedLink::new());
    game.init().unwrap();

    let err = game.make_action(&[1]).unwrap_err();
    assert!(matches!(
        err,
        GameError::InvalidAction {
            expected: 2,
            got: 1
        }
    ));
    assert!(game.link().written_actions().is_empty());
}

#[test]
fn spectator_mode_follows_the_engine() {
    let mut game = DoomGame::new(config().with_mode(Mode::Spectator), ScriptedLink::new());
    game.init().unwrap();

    assert!(matches!(
        game.set_action(&[1, 0]),
        Err(GameError::ModeViolation(_))
    ));
    game.advance_action_with(3, true, false).unwrap();
    assert_eq!(game.get_episode_time(), 3);
    assert!(game.link().written_actions().is_empty());
}

#[test]
fn options_are_frozen_while_running() {
    let mut game = DoomGame::new(config(), ScriptedLink::new());
    game.init().unwrap();
    assert!(game.set_mode(Mode::AsyncPlayer).is_err());
    assert!(game.configure(|config| config.doom_skill = 5).is_err());

    game.close();
    game.set_mode(Mode::AsyncPlayer).unwrap();
    game.configure(|config| config.doom_skill = 5).unwrap();
    assert_eq!(game.config().doom_skill, 5);
    assert_eq!(game.get_mode(), Mode::AsyncPlayer);
}

#[test]
fn seed_reaches_the_engine_on_reset() {
    let mut game = DoomGame::new(config().with_seed(1234), ScriptedLink::new());
    game.init().unwrap();
    game.make_action(&[0, 0]).unwrap();
    game.set_seed(99);
    game.new_episode().unwrap();

    assert_eq!(game.get_seed(), Some(99));
    assert_eq!(game.link().episode_seeds(), &[Some(99)]);
}
