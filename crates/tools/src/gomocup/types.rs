//! 対局まわりの共有型

use rgomoku_core::{Move, Outcome, Position};

/// エンジンが MESSAGE 行で報告する探索情報のスナップショット。
/// 例: `MESSAGE DEPTH 12-20 EV -54 N 3300K TM 220 PV h8 i9`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Info {
    pub depth: i32,
    /// centi 単位の評価値（手番視点）
    pub score: i32,
    pub time_ms: i64,
    pub nodes: i64,
    pub pv: Option<String>,
}

impl Info {
    /// `MESSAGE` の後続トークンを読み取って上書きする。
    /// 解釈できないトークンは無視する。
    pub fn update_from_message(&mut self, rest: &str) {
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let mut i = 0;
        while i < tokens.len() {
            match tokens[i] {
                "DEPTH" => {
                    if let Some(v) = tokens.get(i + 1).and_then(|t| parse_int_prefix(t)) {
                        self.depth = v as i32;
                        i += 1;
                    }
                }
                "EV" => {
                    if let Some(v) = tokens.get(i + 1).and_then(|t| parse_int_prefix(t)) {
                        self.score = v as i32;
                        i += 1;
                    }
                }
                "N" => {
                    if let Some(v) = tokens.get(i + 1).and_then(|t| parse_scaled_int(t)) {
                        self.nodes = v;
                        i += 1;
                    }
                }
                "TM" => {
                    if let Some(v) = tokens.get(i + 1).and_then(|t| parse_int_prefix(t)) {
                        self.time_ms = v;
                        i += 1;
                    }
                }
                "PV" => {
                    let pv = tokens[i + 1..].join(" ");
                    if !pv.is_empty() {
                        self.pv = Some(pv);
                    }
                    break;
                }
                _ => {}
            }
            i += 1;
        }
    }

    /// 永続化用に i16 へ飽和させた評価値
    pub fn eval_i16(&self) -> i16 {
        self.score.clamp(i16::MIN as i32, i16::MAX as i32) as i16
    }
}

/// `"12-20"` や `"-54"` の先頭の符号付き整数を読む
fn parse_int_prefix(tok: &str) -> Option<i64> {
    let rest = tok.strip_prefix('+').unwrap_or(tok);
    let (neg, digits) = match rest.strip_prefix('-') {
        Some(d) => (true, d),
        None => (false, rest),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let v: i64 = digits[..end].parse().ok()?;
    Some(if neg { -v } else { v })
}

/// `"3300K"` / `"4M"` のような桁スケール付き整数
fn parse_scaled_int(tok: &str) -> Option<i64> {
    let v = parse_int_prefix(tok)?;
    let scale = match tok.chars().last() {
        Some('K' | 'k') => 1_000,
        Some('M' | 'm') => 1_000_000,
        Some('G' | 'g') => 1_000_000_000,
        _ => 1,
    };
    Some(v * scale)
}

/// 対局の終局状態。
/// 勝敗が付く状態と引き分けの状態に分かれ、`None` は進行中。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    None,
    FiveConnect,
    IllegalMove,
    ForbiddenMove,
    TimeLoss,
    Crashed,
    Resign,
    DrawInsufficientSpace,
    DrawAdjudication,
}

impl GameState {
    /// 勝敗の付く終局か
    #[inline]
    pub fn is_decisive(self) -> bool {
        matches!(
            self,
            GameState::FiveConnect
                | GameState::IllegalMove
                | GameState::ForbiddenMove
                | GameState::TimeLoss
                | GameState::Crashed
                | GameState::Resign
        )
    }

    #[inline]
    pub fn is_draw(self) -> bool {
        matches!(
            self,
            GameState::DrawInsufficientSpace | GameState::DrawAdjudication
        )
    }

    /// この終局状態の対局から学習サンプルを残してよいか。
    /// 時間切れ・クラッシュ・非合法手の対局は学習データにしない。
    #[inline]
    pub fn keeps_samples(self) -> bool {
        !matches!(
            self,
            GameState::TimeLoss | GameState::Crashed | GameState::IllegalMove
        )
    }
}

/// 学習サンプル: 局面と、そこでエンジンが選んだ手。
/// `result` は終局後に埋められる。
#[derive(Clone)]
pub struct Sample {
    pub pos: Position,
    pub mv: Move,
    /// 手番側から見た結果。終局処理前は `None`
    pub result: Option<Outcome>,
    /// 飽和済み評価値
    pub eval: i16,
}
