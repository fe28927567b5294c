//! 学習サンプルのエンコード
//!
//! 3形式をサポートする。ビットレイアウトは契約であり、ネイティブの
//! ビットフィールド表現には依存せず、リトルエンディアンの語へ
//! 下位ビットから詰める。
//!
//! ## BIN (サンプルごとに可変長)
//!
//! | フィールド | ビット | 語 |
//! |---|---|---|
//! | result    | 2  | w0[0..2]   |
//! | ply       | 9  | w0[2..11]  |
//! | boardsize | 5  | w0[11..16] |
//! | rule      | 3  | w1[0..3]   |
//! | move      | 13 | w1[3..16]  |
//!
//! ヘッダ 4 バイト（u16 LE ×2）に続き、`ply` 個の u16 LE
//! （`y * size + x` の生エンコーディング）で局面の着手列が並ぶ。
//!
//! ## BINPACK (グループごとに可変長)
//!
//! 同一対局の連続サンプルを差分で1グループにまとめる。ヘッダ 8 バイト
//! （u32 LE ×2）: w0 = boardSize:5 | rule:3 | result:4 | totalPly:10 |
//! initPly:10、w1 = gameTag:14 | moveCount:18。続いて `initPly` 個の
//! u16 開局着手、`moveCount` 個の 4 バイト着手レコード
//! （u16 = isFirst:1 | isLast:1 | isNoEval:1 | isPass:1 | 予約:2 |
//! move:10、続けて i16 eval）。

use rgomoku_core::{OpeningType, Position};

use crate::gomocup::{Game, Sample};

fn outcome_index(s: &Sample) -> u16 {
    s.result.expect("sample result filled after game end").index() as u16
}

/// CSV: `<局面の着手列>,<次の手>,<結果>` を1サンプル1行で
pub fn encode_csv(game: &Game) -> String {
    let mut out = String::new();
    for s in &game.samples {
        let pos_str = s.pos.to_opening_str(OpeningType::Pos);
        let move_str = s.pos.move_to_opening_str(s.mv, OpeningType::Pos);
        out.push_str(&format!("{},{},{}\n", pos_str, move_str, outcome_index(s)));
    }
    out
}

pub fn encode_bin(game: &Game) -> Vec<u8> {
    let mut out = Vec::new();
    let rule = game.rule().wire_value() as u16;
    for s in &game.samples {
        let size = s.pos.size();
        let ply = s.pos.move_count() as u16;
        let w0 = outcome_index(s) | (ply << 2) | ((size as u16) << 11);
        let w1 = rule | (s.mv.pos.raw(size) << 3);
        out.extend_from_slice(&w0.to_le_bytes());
        out.extend_from_slice(&w1.to_le_bytes());
        for m in s.pos.history() {
            out.extend_from_slice(&m.pos.raw(size).to_le_bytes());
        }
    }
    out
}

/// BIN 形式の1レコード（復号結果）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinRecord {
    pub result: u8,
    pub board_size: u8,
    pub rule: u8,
    pub mv: u16,
    pub position: Vec<u16>,
}

pub fn decode_bin(bytes: &[u8]) -> Option<Vec<BinRecord>> {
    let mut records = Vec::new();
    let mut at = 0;
    while at < bytes.len() {
        if bytes.len() - at < 4 {
            return None;
        }
        let w0 = u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let w1 = u16::from_le_bytes([bytes[at + 2], bytes[at + 3]]);
        at += 4;
        let ply = ((w0 >> 2) & 0x1ff) as usize;
        if bytes.len() - at < 2 * ply {
            return None;
        }
        let mut position = Vec::with_capacity(ply);
        for _ in 0..ply {
            position.push(u16::from_le_bytes([bytes[at], bytes[at + 1]]));
            at += 2;
        }
        records.push(BinRecord {
            result: (w0 & 0x3) as u8,
            board_size: (w0 >> 11) as u8,
            rule: (w1 & 0x7) as u8,
            mv: w1 >> 3,
            position,
        });
    }
    Some(records)
}

/// BINPACK の着手レコード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinpackMove {
    pub is_first: bool,
    pub is_last: bool,
    pub is_no_eval: bool,
    pub is_pass: bool,
    pub mv: u16,
    pub eval: i16,
}

/// BINPACK のグループ（復号結果）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinpackGroup {
    pub board_size: u8,
    pub rule: u8,
    pub result: u8,
    pub game_tag: u16,
    pub opening: Vec<u16>,
    pub moves: Vec<BinpackMove>,
}

struct GroupBuilder {
    result: u16,
    opening: Vec<u16>,
    moves: Vec<BinpackMove>,
    /// opening + moves の生エンコーディング列（継続判定用）
    seq: Vec<u16>,
}

impl GroupBuilder {
    fn start(s: &Sample) -> GroupBuilder {
        let size = s.pos.size();
        let opening: Vec<u16> = s.pos.history().iter().map(|m| m.pos.raw(size)).collect();
        GroupBuilder {
            result: outcome_index(s),
            seq: opening.clone(),
            opening,
            moves: Vec::new(),
        }
    }

    /// このサンプルの局面が現在の列の継続か
    fn continues(&self, s: &Sample) -> bool {
        let size = s.pos.size();
        let hist = s.pos.history();
        hist.len() >= self.seq.len()
            && self
                .seq
                .iter()
                .zip(hist)
                .all(|(raw, m)| *raw == m.pos.raw(size))
    }

    /// 履歴の未出力分を評価なしの埋め草として足し、サンプルの
    /// 着手を評価付きで足す。
    fn push_sample(&mut self, s: &Sample) {
        let size = s.pos.size();
        for m in &s.pos.history()[self.seq.len()..] {
            let raw = m.pos.raw(size);
            self.moves.push(BinpackMove {
                is_first: true,
                is_last: true,
                is_no_eval: true,
                is_pass: false,
                mv: raw,
                eval: 0,
            });
            self.seq.push(raw);
        }
        let raw = s.mv.pos.raw(size);
        self.moves.push(BinpackMove {
            is_first: true,
            is_last: true,
            is_no_eval: false,
            is_pass: false,
            mv: raw,
            eval: s.eval,
        });
        self.seq.push(raw);
    }

    fn flush(&self, out: &mut Vec<u8>, board_size: u8, rule: u8) {
        let total_ply = (self.opening.len() + self.moves.len()) as u32;
        let init_ply = self.opening.len() as u32;
        let move_count = self.moves.len() as u32;
        let w0 = board_size as u32
            | (rule as u32) << 5
            | (self.result as u32) << 8
            | total_ply << 12
            | init_ply << 22;
        let game_tag = 0u32;
        let w1 = game_tag | move_count << 14;
        out.extend_from_slice(&w0.to_le_bytes());
        out.extend_from_slice(&w1.to_le_bytes());
        for raw in &self.opening {
            out.extend_from_slice(&raw.to_le_bytes());
        }
        for m in &self.moves {
            let flags = m.is_first as u16
                | (m.is_last as u16) << 1
                | (m.is_no_eval as u16) << 2
                | (m.is_pass as u16) << 3
                | m.mv << 6;
            out.extend_from_slice(&flags.to_le_bytes());
            out.extend_from_slice(&m.eval.to_le_bytes());
        }
    }
}

pub fn encode_binpack(game: &Game) -> Vec<u8> {
    let mut out = Vec::new();
    if game.samples.is_empty() {
        return out;
    }
    let board_size = game.start_position().size();
    let rule = game.rule().wire_value();

    let mut group: Option<GroupBuilder> = None;
    for s in &game.samples {
        match group.take() {
            Some(mut g) if g.continues(s) => {
                g.push_sample(s);
                group = Some(g);
            }
            prev => {
                if let Some(g) = prev {
                    g.flush(&mut out, board_size, rule);
                }
                let mut g = GroupBuilder::start(s);
                g.push_sample(s);
                group = Some(g);
            }
        }
    }
    if let Some(g) = group {
        g.flush(&mut out, board_size, rule);
    }
    out
}

pub fn decode_binpack(bytes: &[u8]) -> Option<Vec<BinpackGroup>> {
    let mut groups = Vec::new();
    let mut at = 0;
    while at < bytes.len() {
        if bytes.len() - at < 8 {
            return None;
        }
        let w0 = u32::from_le_bytes(bytes[at..at + 4].try_into().ok()?);
        let w1 = u32::from_le_bytes(bytes[at + 4..at + 8].try_into().ok()?);
        at += 8;
        let init_ply = ((w0 >> 22) & 0x3ff) as usize;
        let move_count = (w1 >> 14) as usize;
        if bytes.len() - at < 2 * init_ply + 4 * move_count {
            return None;
        }
        let mut opening = Vec::with_capacity(init_ply);
        for _ in 0..init_ply {
            opening.push(u16::from_le_bytes([bytes[at], bytes[at + 1]]));
            at += 2;
        }
        let mut moves = Vec::with_capacity(move_count);
        for _ in 0..move_count {
            let flags = u16::from_le_bytes([bytes[at], bytes[at + 1]]);
            let eval = i16::from_le_bytes([bytes[at + 2], bytes[at + 3]]);
            at += 4;
            moves.push(BinpackMove {
                is_first: flags & 1 != 0,
                is_last: flags & 2 != 0,
                is_no_eval: flags & 4 != 0,
                is_pass: flags & 8 != 0,
                mv: flags >> 6,
                eval,
            });
        }
        let total_ply = ((w0 >> 12) & 0x3ff) as usize;
        if total_ply != init_ply + move_count {
            return None;
        }
        groups.push(BinpackGroup {
            board_size: (w0 & 0x1f) as u8,
            rule: ((w0 >> 5) & 0x7) as u8,
            result: ((w0 >> 8) & 0xf) as u8,
            game_tag: (w1 & 0x3fff) as u16,
            opening,
            moves,
        });
    }
    Some(groups)
}

/// 復号した BIN レコードから局面を再構築する（検証用）
pub fn rebuild_position(record: &BinRecord) -> Option<Position> {
    let mut pos = Position::new(record.board_size);
    for raw in &record.position {
        let p = rgomoku_core::Pos::from_raw(*raw, record.board_size);
        let mv = rgomoku_core::Move::new(p, pos.turn());
        if !pos.is_legal_move(mv) {
            return None;
        }
        pos = pos.play(mv);
    }
    Some(pos)
}
