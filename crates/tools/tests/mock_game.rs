//! Full game-loop tests against scripted mock engines.

#![cfg(unix)]

mod common;

use common::{with_moves, write_mock_engine, MockBehavior};

use rgomoku_core::{Color, Outcome};
use tools::gomocup::{
    EngineAdapter, EngineOptions, Game, GameState, Options, SampleFormat, SampleParams, Worker,
};
use tools::output::sample;

fn engine_options(cmd: String) -> EngineOptions {
    EngineOptions {
        cmd,
        ..EngineOptions::default()
    }
}

#[test]
fn adapter_discovers_name_and_answers_start() {
    let dir = tempfile::tempdir().unwrap();
    let cmd = write_mock_engine(dir.path(), "mock.sh", "mock-engine", MockBehavior::Normal);
    let mut w = Worker::new(0, None).unwrap();

    let eo = engine_options(cmd);
    let mut engine = EngineAdapter::start(&eo, &mut w).unwrap();
    assert_eq!(engine.name, "mock-engine");
    assert!(!engine.is_crashed());

    engine.writeln(&mut w, "START 15").unwrap();
    assert!(engine.wait_for_ok(&mut w));
    engine.stop(&mut w);
}

#[test]
fn name_override_beats_about() {
    let dir = tempfile::tempdir().unwrap();
    let cmd = write_mock_engine(dir.path(), "mock.sh", "mock-engine", MockBehavior::Normal);
    let mut w = Worker::new(0, None).unwrap();

    let eo = EngineOptions {
        cmd,
        name: Some("custom".to_string()),
        ..EngineOptions::default()
    };
    let engine = EngineAdapter::start(&eo, &mut w).unwrap();
    assert_eq!(engine.name, "custom");
}

/// FreeStyle 15x15, opening "h8": Black extends h9..h12 while White
/// fills the bottom edge. Black's 5th collinear stone ends the game.
#[test]
fn five_connect_game_with_sampling() {
    let dir = tempfile::tempdir().unwrap();
    let white_cmd = write_mock_engine(dir.path(), "white.sh", "white-mock", MockBehavior::Normal);
    let black_cmd = write_mock_engine(dir.path(), "black.sh", "black-mock", MockBehavior::Normal);

    // positions[0] has one black stone, so engines[0] plays White first
    let eo0 = engine_options(with_moves(&white_cmd, &["0,0", "1,0", "2,0", "3,0", "4,0"]));
    let eo1 = engine_options(with_moves(&black_cmd, &["7,8", "7,9", "7,10", "7,11"]));

    let mut o = Options::default();
    o.opening_type = rgomoku_core::OpeningType::Pos;
    o.sample = Some(SampleParams {
        file_name: dir.path().join("samples.bin"),
        freq: 1.0,
        format: SampleFormat::Bin,
        compress: false,
    });

    let mut w = Worker::new(0, None).unwrap();
    let mut e0 = EngineAdapter::start(&eo0, &mut w).unwrap();
    let mut e1 = EngineAdapter::start(&eo1, &mut w).unwrap();

    let mut game = Game::new(0, 0);
    game.load_opening("h8", &o).unwrap();
    let outcome = game.play(&o, [&eo0, &eo1], (&mut e0, &mut e1), false, &mut w);

    // Black (engines[1]) wins by five connection
    assert_eq!(outcome, Outcome::Loss);
    assert_eq!(game.state, GameState::FiveConnect);
    assert_eq!(game.ply, 8);
    assert_eq!(game.names[Color::Black.index()], "black-mock");
    assert_eq!(game.names[Color::White.index()], "white-mock");

    let (result, reason) = game.decode_state("0-1", "1/2-1/2", "1-0");
    assert_eq!(result, "1-0");
    assert_eq!(reason, "Black win by five connection");

    // freq 1.0 samples every ply; labels follow the side to move
    assert_eq!(game.samples.len(), 8);
    for s in &game.samples {
        let expect = if s.pos.turn() == Color::Black {
            Outcome::Win
        } else {
            Outcome::Loss
        };
        assert_eq!(s.result, Some(expect));
    }

    // the BIN export of this game survives a decode round-trip
    let bytes = sample::encode_bin(&game);
    let records = sample::decode_bin(&bytes).unwrap();
    assert_eq!(records.len(), 8);
    assert!(records.iter().all(|r| r.board_size == 15));

    e0.stop(&mut w);
    e1.stop(&mut w);
}

/// An engine that answers after its whole match budget is a soft
/// timeout: the move arrived, but time_left went negative.
#[test]
fn soft_timeout_forfeits_and_discards_samples() {
    let dir = tempfile::tempdir().unwrap();
    let slow_cmd = write_mock_engine(dir.path(), "slow.sh", "slow-mock", MockBehavior::Slow("1.3"));
    let fast_cmd = write_mock_engine(dir.path(), "fast.sh", "fast-mock", MockBehavior::Normal);

    let mut eo0 = engine_options(with_moves(&slow_cmd, &["0,0"]));
    eo0.timeout_match_ms = 1000;
    let mut eo1 = engine_options(with_moves(&fast_cmd, &["7,8"]));
    eo1.timeout_match_ms = 1000;

    let mut o = Options::default();
    o.opening_type = rgomoku_core::OpeningType::Pos;
    o.sample = Some(SampleParams {
        file_name: dir.path().join("samples.bin"),
        freq: 1.0,
        format: SampleFormat::Bin,
        compress: false,
    });

    let mut w = Worker::new(0, None).unwrap();
    let mut e0 = EngineAdapter::start(&eo0, &mut w).unwrap();
    let mut e1 = EngineAdapter::start(&eo1, &mut w).unwrap();

    let mut game = Game::new(0, 0);
    game.load_opening("h8", &o).unwrap();
    let outcome = game.play(&o, [&eo0, &eo1], (&mut e0, &mut e1), false, &mut w);

    assert_eq!(game.state, GameState::TimeLoss);
    assert_eq!(outcome, Outcome::Loss);
    assert!(game.samples.is_empty());
    assert!(!e0.is_crashed(), "soft timeout must not mark the engine crashed");

    e0.stop(&mut w);
    e1.stop(&mut w);
}

/// An engine that exits instead of answering loses by crash.
#[test]
fn crashed_engine_loses() {
    let dir = tempfile::tempdir().unwrap();
    let crash_cmd =
        write_mock_engine(dir.path(), "crash.sh", "crash-mock", MockBehavior::CrashOnThink);
    let fast_cmd = write_mock_engine(dir.path(), "fast.sh", "fast-mock", MockBehavior::Normal);

    let eo0 = engine_options(with_moves(&crash_cmd, &[]));
    let eo1 = engine_options(with_moves(&fast_cmd, &["7,8"]));

    let o = Options {
        opening_type: rgomoku_core::OpeningType::Pos,
        ..Options::default()
    };

    let mut w = Worker::new(0, None).unwrap();
    let mut e0 = EngineAdapter::start(&eo0, &mut w).unwrap();
    let mut e1 = EngineAdapter::start(&eo1, &mut w).unwrap();

    let mut game = Game::new(0, 0);
    game.load_opening("h8", &o).unwrap();
    let outcome = game.play(&o, [&eo0, &eo1], (&mut e0, &mut e1), false, &mut w);

    assert_eq!(game.state, GameState::Crashed);
    assert_eq!(outcome, Outcome::Loss);
    assert!(e0.is_crashed());

    let (_, reason) = game.decode_state("0-1", "1/2-1/2", "1-0");
    assert_eq!(reason, "Black win by opponent crash");

    e1.stop(&mut w);
}

/// An engine that answers with an occupied cell loses by illegal move.
#[test]
fn illegal_move_loses() {
    let dir = tempfile::tempdir().unwrap();
    let bad_cmd = write_mock_engine(dir.path(), "bad.sh", "bad-mock", MockBehavior::Normal);
    let fast_cmd = write_mock_engine(dir.path(), "fast.sh", "fast-mock", MockBehavior::Normal);

    // 7,7 is the opening stone: occupied
    let eo0 = engine_options(with_moves(&bad_cmd, &["7,7"]));
    let eo1 = engine_options(with_moves(&fast_cmd, &["7,8"]));

    let o = Options {
        opening_type: rgomoku_core::OpeningType::Pos,
        ..Options::default()
    };

    let mut w = Worker::new(0, None).unwrap();
    let mut e0 = EngineAdapter::start(&eo0, &mut w).unwrap();
    let mut e1 = EngineAdapter::start(&eo1, &mut w).unwrap();

    let mut game = Game::new(0, 0);
    game.load_opening("h8", &o).unwrap();
    let outcome = game.play(&o, [&eo0, &eo1], (&mut e0, &mut e1), false, &mut w);

    assert_eq!(game.state, GameState::IllegalMove);
    assert_eq!(outcome, Outcome::Loss);
    assert!(!e0.is_crashed());

    e0.stop(&mut w);
    e1.stop(&mut w);
}
