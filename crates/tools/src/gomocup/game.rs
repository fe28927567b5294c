//! 1局分の状態機械
//!
//! 開局適用 → 手番ループ（ルール適用・時間管理・裁定・サンプリング）
//! → 終局分類、の順で進む。局面はコピーオンムーブで `positions` に
//! 積まれ、`positions[ply]` が現局面になる。

use anyhow::Result;

use super::engine::EngineAdapter;
use super::options::{EngineOptions, Options};
use super::types::{GameState, Info, Sample};
use super::worker::Worker;
use rgomoku_core::{
    Color, ForbiddenKind, GameRule, Move, OpeningError, Outcome, Position, Transform,
};

pub struct Game {
    pub round: usize,
    /// ラウンド内の対局番号
    pub game_idx: usize,
    rule: GameRule,
    pub ply: usize,
    pub state: GameState,
    pub forbidden: Option<ForbiddenKind>,
    /// `positions[0]` が開局適用後、`positions[ply]` が現局面
    pub positions: Vec<Position>,
    /// 1手ごとの探索情報
    pub infos: Vec<Info>,
    pub samples: Vec<Sample>,
    /// 石色で引く対局者名
    pub names: [String; Color::NUM],
}

impl Game {
    pub fn new(round: usize, game_idx: usize) -> Game {
        Game {
            round,
            game_idx,
            rule: GameRule::FreeStyle,
            ply: 0,
            state: GameState::None,
            forbidden: None,
            positions: Vec::new(),
            infos: Vec::new(),
            samples: Vec::new(),
            names: Default::default(),
        }
    }

    #[inline]
    pub fn rule(&self) -> GameRule {
        self.rule
    }

    /// 開局適用後の局面（対局全体の起点）
    pub fn start_position(&self) -> &Position {
        &self.positions[0]
    }

    pub fn current_position(&self) -> &Position {
        self.positions.last().expect("opening not loaded")
    }

    /// 開局に含まれる着手数（`ply` には数えない）
    pub fn opening_move_count(&self) -> usize {
        self.current_position().move_count() - self.ply
    }

    /// 開局文字列から `positions[0]` を作る。
    /// `transform` が有効ならラウンド番号で決まる対称変換を掛ける。
    pub fn load_opening(&mut self, opening: &str, o: &Options) -> Result<(), OpeningError> {
        let mut pos = Position::new(o.board_size);
        pos.apply_opening(opening, o.opening_type)?;
        if o.transform {
            pos.transform(Transform::from_round(self.round));
        }
        self.positions.push(pos);
        Ok(())
    }

    /// 現局面に勝敗ルールを適用する
    fn apply_rules(&self) -> GameState {
        let cur = self.current_position();
        if let Some(last) = cur.last_move() {
            if cur.five_from_last(self.rule.allow_long_connection(last.color)) {
                return GameState::FiveConnect;
            }
        }
        if cur.moves_left() == 0 {
            return GameState::DrawInsufficientSpace;
        }
        GameState::None
    }

    /// 手番開始時に持ち時間を準備する
    fn compute_time_left(eo: &EngineOptions, time_left: &mut i64) {
        if eo.timeout_match_ms > 0 {
            if eo.increment_ms > 0 {
                *time_left += eo.increment_ms;
            }
        } else {
            // nodes/depth 制限だけの対局でも困らない十分大きな値
            *time_left = i32::MAX as i64;
        }
    }

    fn send_game_info(
        engine: &mut EngineAdapter,
        w: &mut Worker,
        o: &Options,
        eo: &EngineOptions,
    ) -> Result<()> {
        engine.writeln(w, &format!("INFO rule {}", o.rule.wire_value()))?;
        if eo.timeout_turn_ms > 0 {
            engine.writeln(w, &format!("INFO timeout_turn {}", eo.timeout_turn_ms))?;
        }
        // 0 は持ち時間無制限の意味でそのまま送る
        engine.writeln(w, &format!("INFO timeout_match {}", eo.timeout_match_ms))?;
        if let Some(depth) = eo.max_depth {
            engine.writeln(w, &format!("INFO max_depth {depth}"))?;
        }
        if let Some(nodes) = eo.max_nodes {
            engine.writeln(w, &format!("INFO max_node {nodes}"))?;
        }
        engine.writeln(w, &format!("INFO max_memory {}", eo.max_memory))?;
        if let Some(threads) = eo.num_threads {
            engine.writeln(w, &format!("INFO thread_num {threads}"))?;
        }
        for opt in &eo.options {
            if let Some((k, v)) = opt.split_once('=') {
                engine.writeln(w, &format!("INFO {} {}", k.trim(), v.trim()))?;
            }
        }
        Ok(())
    }

    /// 1局を実行する。
    ///
    /// - `engines.1` が先に指すのは `reverse` のとき
    /// - 戻り値は engines.0 から見た結果
    /// - 終局種別は `self.state`（禁手種別は `self.forbidden`）に残る
    pub fn play(
        &mut self,
        o: &Options,
        eo: [&EngineOptions; 2],
        engines: (&mut EngineAdapter, &mut EngineAdapter),
        reverse: bool,
        w: &mut Worker,
    ) -> Outcome {
        let (e0, e1) = engines;
        self.rule = o.rule;

        // positions[0] の手番の色を先に指すエンジンへ割り当てる
        let first_turn = self.start_position().turn().index();
        let rev = reverse as usize;
        for color in 0..Color::NUM {
            let engine_idx = color ^ first_turn ^ rev;
            self.names[color] = if engine_idx == 0 {
                e0.name.clone()
            } else {
                e1.name.clone()
            };
        }

        // START とゲーム情報の送信
        for i in 0..2 {
            let engine = if i == 0 { &mut *e0 } else { &mut *e1 };
            let started = engine
                .writeln(w, &format!("START {}", o.board_size))
                .is_ok()
                && engine.wait_for_ok(w);
            if !started || Game::send_game_info(engine, w, o, eo[i]).is_err() {
                self.state = if engine.is_crashed() {
                    GameState::Crashed
                } else {
                    GameState::TimeLoss
                };
                println!(
                    "[{}] engine {} {} at start",
                    w.id,
                    engine.name,
                    if engine.is_crashed() { "crashed" } else { "timeout" }
                );
                return if i == 0 { Outcome::Loss } else { Outcome::Win };
            }
        }

        let mut time_left = [eo[0].timeout_match_ms, eo[1].timeout_match_ms];
        let mut can_use_turn = [false, false];
        let mut draw_ply_count = 0u32;
        let mut resign_counts = [0u32, 0u32];
        let mut played: Option<Move> = None;
        let mut ei = rev;

        loop {
            if let Some(mv) = played {
                let next = self.current_position().play(mv);
                self.positions.push(next);
                self.ply += 1;
            }

            if o.debug {
                println!("{}", self.current_position().render());
            }

            self.state = self.apply_rules();
            if self.state != GameState::None {
                break;
            }

            if o.force_draw_after > 0
                && self.current_position().move_count() >= o.force_draw_after
            {
                self.state = GameState::DrawAdjudication;
                break;
            }

            Game::compute_time_left(eo[ei], &mut time_left[ei]);

            let engine = if ei == 0 { &mut *e0 } else { &mut *e1 };
            let sent = engine
                .writeln(w, &format!("INFO time_left {}", time_left[ei]))
                .and_then(|_| {
                    // 思考開始の合図
                    if self.positions[self.ply].move_count() == 0 {
                        can_use_turn[ei] = true;
                        engine.writeln(w, "BEGIN")
                    } else if o.use_turn && can_use_turn[ei] {
                        let last = played.expect("TURN requires a previous move");
                        engine.writeln(w, &format!("TURN {}", Position::move_to_gomostr(last)))
                    } else {
                        can_use_turn[ei] = true;
                        engine.send_board(w, &self.positions[self.ply])
                    }
                });
            if sent.is_err() {
                self.state = GameState::Crashed;
                println!(
                    "[{}] engine {} crashed at {} moves after opening",
                    w.id, engine.name, self.ply
                );
                break;
            }

            let outcome = engine.think(w, &mut time_left[ei], eo[ei].timeout_turn_ms);
            self.infos.push(outcome.info.clone());

            let Some(move_str) = outcome.bestmove else {
                // クラッシュまたは硬いタイムアウト
                self.state = if engine.is_crashed() {
                    GameState::Crashed
                } else {
                    GameState::TimeLoss
                };
                println!(
                    "[{}] engine {} {} at {} moves after opening",
                    w.id,
                    engine.name,
                    if engine.is_crashed() { "crashed" } else { "timeout" },
                    self.ply
                );
                break;
            };

            if eo[ei].time_control_enabled() && time_left[ei] < 0 {
                // 応答は返ったが持ち時間を使い切った（ソフトタイムアウト）
                self.state = GameState::TimeLoss;
                println!(
                    "[{}] engine {} timeout at {} moves after opening",
                    w.id, engine.name, self.ply
                );
                break;
            }

            let cur = &self.positions[self.ply];
            let mv = match cur.move_from_gomostr(&move_str) {
                Some(mv) if cur.is_legal_move(mv) => mv,
                _ => {
                    self.state = GameState::IllegalMove;
                    println!(
                        "[{}] engine {} output illegal move at {} moves after opening: {}",
                        w.id, engine.name, self.ply, move_str
                    );
                    break;
                }
            };

            if self.rule == GameRule::Renju {
                if let Some(kind) = cur.forbidden_kind(mv) {
                    self.forbidden = Some(kind);
                    self.state = GameState::ForbiddenMove;
                    break;
                }
            }

            let info = &outcome.info;
            if o.draw_count > 0 && info.score.abs() <= o.draw_score {
                draw_ply_count += 1;
                if draw_ply_count >= 2 * o.draw_count {
                    self.state = GameState::DrawAdjudication;
                    break;
                }
            } else {
                draw_ply_count = 0;
            }

            if o.resign_count > 0 && info.score <= -o.resign_score {
                resign_counts[ei] += 1;
                if resign_counts[ei] >= o.resign_count {
                    self.state = GameState::Resign;
                    break;
                }
            } else {
                resign_counts[ei] = 0;
            }

            if let Some(sp) = &o.sample {
                if w.sample_unit() <= sp.freq {
                    self.samples.push(Sample {
                        pos: cur.clone(),
                        mv,
                        result: None,
                        eval: info.eval_i16(),
                    });
                }
            }

            played = Some(mv);
            ei = 1 - ei;
        }

        debug_assert!(self.state != GameState::None);
        self.fill_sample_results();

        if self.state.is_decisive() {
            // 手番側（ei）が負け
            if ei == 0 {
                Outcome::Loss
            } else {
                Outcome::Win
            }
        } else {
            Outcome::Draw
        }
    }

    /// 終局状態からサンプルの結果ラベルを埋める。
    /// 時間切れ・クラッシュ・非合法手の対局のサンプルは破棄する。
    fn fill_sample_results(&mut self) {
        if !self.state.keeps_samples() {
            self.samples.clear();
            return;
        }
        // 白視点の結果: 勝敗付き終局では終局時の手番側が負けている
        let white_pov = if self.state.is_decisive() {
            if self.current_position().turn() == Color::White {
                Outcome::Loss
            } else {
                Outcome::Win
            }
        } else {
            Outcome::Draw
        };
        for s in &mut self.samples {
            s.result = Some(if s.pos.turn() == Color::White {
                white_pov
            } else {
                white_pov.flip()
            });
        }
    }

    /// 終局状態を結果表記と理由へ変換する。
    ///
    /// `white_win`/`black_win` は勝った側に応じて返す表記。
    /// 黒が先に並ぶ棋譜なので PGN は白勝ち "0-1"・黒勝ち "1-0"、
    /// SGF は "W+1"/"B+1" を渡す。
    pub fn decode_state(
        &self,
        white_win: &str,
        draw: &str,
        black_win: &str,
    ) -> (String, String) {
        // 終局局面の手番は次に指すはずだった側。勝敗付き終局では
        // その相手（直前に指した側）が勝っている。
        let black_to_move = self.current_position().turn() == Color::Black;
        let winner_txt = || {
            if black_to_move {
                white_win.to_string()
            } else {
                black_win.to_string()
            }
        };
        let win_reason = |what: &str| {
            if black_to_move {
                format!("White win by {what}")
            } else {
                format!("Black win by {what}")
            }
        };

        match self.state {
            GameState::None => ("*".to_string(), "Unterminated".to_string()),
            GameState::FiveConnect => (winner_txt(), win_reason("five connection")),
            GameState::DrawInsufficientSpace => {
                (draw.to_string(), "Draw by fullfilled board".to_string())
            }
            GameState::IllegalMove => (winner_txt(), win_reason("opponent illegal move")),
            GameState::ForbiddenMove => {
                debug_assert!(black_to_move);
                let kind = self.forbidden.expect("forbidden kind recorded");
                (
                    white_win.to_string(),
                    format!("Black play forbidden move - {}", kind.label()),
                )
            }
            GameState::DrawAdjudication => {
                (draw.to_string(), "Draw by adjudication".to_string())
            }
            GameState::Resign => (winner_txt(), win_reason("adjudication")),
            GameState::TimeLoss => (winner_txt(), win_reason("time forfeit")),
            GameState::Crashed => (winner_txt(), win_reason("opponent crash")),
        }
    }
}
