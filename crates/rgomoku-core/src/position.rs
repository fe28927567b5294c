//! 局面表現
//!
//! `Position` は値型で、着手のたびに複製して前進する（copy-on-advance）。
//! 盤面配列・石数・手番・着手履歴は `place` を通じてのみ更新され、
//! 常に次の不変条件を満たす:
//!
//! - 黒石数 == 白石数、または黒石数 == 白石数 + 1
//! - 手番が黒 ⟺ 黒石数 == 白石数
//! - 履歴の各着手は、その時点で合法だった

use std::fmt;

use crate::rules;
use crate::types::{Color, ForbiddenKind, Move, OpeningType, Pos, Transform};

/// 開局文字列の解析エラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpeningError {
    /// トークンが座標として解釈できない
    Malformed(String),
    /// 盤外のマスを指している
    OffBoard(i32, i32),
    /// 既に石のあるマスを指している
    Occupied(Pos),
}

impl fmt::Display for OpeningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpeningError::Malformed(tok) => write!(f, "malformed opening token '{tok}'"),
            OpeningError::OffBoard(x, y) => write!(f, "opening cell ({x},{y}) is off board"),
            OpeningError::Occupied(p) => write!(f, "opening cell ({},{}) is occupied", p.x, p.y),
        }
    }
}

impl std::error::Error for OpeningError {}

#[derive(Clone)]
pub struct Position {
    size: u8,
    board: Vec<Option<Color>>,
    counts: [u16; Color::NUM],
    turn: Color,
    hist: Vec<Move>,
}

impl Position {
    pub const MIN_SIZE: u8 = 5;
    pub const MAX_SIZE: u8 = 22;

    /// 空の盤面を作る。`size` は [5, 22]。
    pub fn new(size: u8) -> Position {
        debug_assert!((Position::MIN_SIZE..=Position::MAX_SIZE).contains(&size));
        Position {
            size,
            board: vec![None; size as usize * size as usize],
            counts: [0; Color::NUM],
            turn: Color::Black,
            hist: Vec::new(),
        }
    }

    #[inline]
    pub fn size(&self) -> u8 {
        self.size
    }

    #[inline]
    pub fn turn(&self) -> Color {
        self.turn
    }

    /// 開局を含む総着手数
    #[inline]
    pub fn move_count(&self) -> usize {
        self.hist.len()
    }

    /// 着手履歴（先頭が最古、末尾が直前の手）
    #[inline]
    pub fn history(&self) -> &[Move] {
        &self.hist
    }

    #[inline]
    pub fn last_move(&self) -> Option<Move> {
        self.hist.last().copied()
    }

    /// 残りの空きマス数
    #[inline]
    pub fn moves_left(&self) -> usize {
        self.board.len() - (self.counts[0] + self.counts[1]) as usize
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.size as i32 && y < self.size as i32
    }

    #[inline]
    pub fn cell(&self, p: Pos) -> Option<Color> {
        self.board[p.raw(self.size) as usize]
    }

    /// 盤内・空きマス・手番一致のとき合法
    pub fn is_legal_move(&self, mv: Move) -> bool {
        mv.pos.x < self.size
            && mv.pos.y < self.size
            && self.cell(mv.pos).is_none()
            && mv.color == self.turn
    }

    fn place(&mut self, mv: Move) {
        debug_assert!(self.is_legal_move(mv));
        self.board[mv.pos.raw(self.size) as usize] = Some(mv.color);
        self.counts[mv.color.index()] += 1;
        self.turn = !mv.color;
        self.hist.push(mv);
    }

    /// 着手を適用した新しい局面を返す。呼び出し側が合法性を保証する。
    pub fn play(&self, mv: Move) -> Position {
        let mut next = self.clone();
        next.place(mv);
        next
    }

    /// 開局文字列を空の盤面に適用する。
    ///
    /// 石色は黒から交互。適用後の手番は石数のパリティで決まる
    /// （交互適用なのでここでは自動的に成立する）。
    pub fn apply_opening(&mut self, s: &str, kind: OpeningType) -> Result<(), OpeningError> {
        debug_assert!(self.hist.is_empty());
        let cells = match kind {
            OpeningType::Offset => parse_offset_opening(s, self.size)?,
            OpeningType::Pos => parse_pos_opening(s)?,
        };
        let mut color = Color::Black;
        for (x, y) in cells {
            if !self.contains(x, y) {
                return Err(OpeningError::OffBoard(x, y));
            }
            let p = Pos::new(x as u8, y as u8);
            if self.cell(p).is_some() {
                return Err(OpeningError::Occupied(p));
            }
            self.place(Move::new(p, color));
            color = !color;
        }
        Ok(())
    }

    /// D4 対称変換を適用する。履歴を写して盤を作り直す。
    pub fn transform(&mut self, t: Transform) {
        if t == Transform::Identity {
            return;
        }
        let moves: Vec<Move> = self
            .hist
            .iter()
            .map(|m| Move::new(t.apply(m.pos, self.size), m.color))
            .collect();
        let mut next = Position::new(self.size);
        for mv in moves {
            next.place(mv);
        }
        *self = next;
    }

    /// Gomocup 形式の `x,y` を手番の着手として読む。
    /// 盤外や構文エラーは `None`（合法性の最終判断は `is_legal_move`）。
    pub fn move_from_gomostr(&self, s: &str) -> Option<Move> {
        let (xs, ys) = s.trim().split_once(',')?;
        let x: u8 = xs.trim().parse().ok()?;
        let y: u8 = ys.trim().parse().ok()?;
        if x >= self.size || y >= self.size {
            return None;
        }
        Some(Move::new(Pos::new(x, y), self.turn))
    }

    /// Gomocup 形式の `x,y` 表記
    pub fn move_to_gomostr(mv: Move) -> String {
        format!("{},{}", mv.pos.x, mv.pos.y)
    }

    /// 局面の履歴を開局文字列として書き出す
    pub fn to_opening_str(&self, kind: OpeningType) -> String {
        match kind {
            OpeningType::Pos => {
                let mut out = String::new();
                for m in &self.hist {
                    out.push_str(&pos_token(m.pos));
                }
                out
            }
            OpeningType::Offset => {
                let c = (self.size / 2) as i32;
                self.hist
                    .iter()
                    .map(|m| format!("{},{}", m.pos.x as i32 - c, m.pos.y as i32 - c))
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        }
    }

    /// 単一の着手を開局文字列の1トークンとして書き出す
    pub fn move_to_opening_str(&self, mv: Move, kind: OpeningType) -> String {
        match kind {
            OpeningType::Pos => pos_token(mv.pos),
            OpeningType::Offset => {
                let c = (self.size / 2) as i32;
                format!("{},{}", mv.pos.x as i32 - c, mv.pos.y as i32 - c)
            }
        }
    }

    /// 直前の手を通る五連（または長連）を判定する。
    ///
    /// 走査は直前の手を通る4方向の並びに限定される。途中局面で
    /// 五連が直前手を含まずに現れることはない、という前提が
    /// ゲームループ側の毎手チェックで保証される。
    pub fn five_from_last(&self, allow_long: bool) -> bool {
        rules::win::five_from_last(self, allow_long)
    }

    /// 連珠で黒が `mv` を打った場合の禁手種別。禁手でなければ `None`。
    /// 白の手に対しては常に `None`。
    pub fn forbidden_kind(&self, mv: Move) -> Option<ForbiddenKind> {
        if mv.color != Color::Black {
            return None;
        }
        rules::forbidden::check(self, mv.pos)
    }

    /// デバッグ出力用の盤面図
    pub fn render(&self) -> String {
        let mut out = String::new();
        for y in (0..self.size).rev() {
            for x in 0..self.size {
                out.push(match self.cell(Pos::new(x, y)) {
                    Some(Color::Black) => 'X',
                    Some(Color::White) => 'O',
                    None => '.',
                });
                out.push(' ');
            }
            out.push('\n');
        }
        out
    }
}

fn pos_token(p: Pos) -> String {
    format!("{}{}", (b'a' + p.x) as char, p.y as u16 + 1)
}

/// `"0,0 -1,1"` 形式（盤中心からのオフセット）を絶対座標列へ
fn parse_offset_opening(s: &str, size: u8) -> Result<Vec<(i32, i32)>, OpeningError> {
    let center = (size / 2) as i32;
    let mut cells = Vec::new();
    for tok in s.split_whitespace() {
        let (xs, ys) = tok
            .split_once(',')
            .ok_or_else(|| OpeningError::Malformed(tok.to_string()))?;
        let dx: i32 = xs.parse().map_err(|_| OpeningError::Malformed(tok.to_string()))?;
        let dy: i32 = ys.parse().map_err(|_| OpeningError::Malformed(tok.to_string()))?;
        cells.push((center + dx, center + dy));
    }
    Ok(cells)
}

/// `"h8h9j10"` 形式（列文字 + 1始まりの行番号）を絶対座標列へ
fn parse_pos_opening(s: &str) -> Result<Vec<(i32, i32)>, OpeningError> {
    let mut cells = Vec::new();
    let mut chars = s.trim().chars().peekable();
    while let Some(ch) = chars.next() {
        if ch.is_whitespace() {
            continue;
        }
        if !ch.is_ascii_lowercase() {
            return Err(OpeningError::Malformed(ch.to_string()));
        }
        let x = (ch as u8 - b'a') as i32;
        let mut digits = String::new();
        while let Some(d) = chars.peek() {
            if d.is_ascii_digit() {
                digits.push(*d);
                chars.next();
            } else {
                break;
            }
        }
        let row: i32 = digits
            .parse()
            .map_err(|_| OpeningError::Malformed(format!("{ch}{digits}")))?;
        cells.push((x, row - 1));
    }
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GameRule;

    fn pos15() -> Position {
        Position::new(15)
    }

    #[test]
    fn test_legality_basics() {
        let p = pos15();
        assert!(p.is_legal_move(Move::new(Pos::new(7, 7), Color::Black)));
        // 手番違い
        assert!(!p.is_legal_move(Move::new(Pos::new(7, 7), Color::White)));
        // 盤外
        assert!(!p.is_legal_move(Move::new(Pos::new(15, 0), Color::Black)));

        let p2 = p.play(Move::new(Pos::new(7, 7), Color::Black));
        // 着手済みマス
        assert!(!p2.is_legal_move(Move::new(Pos::new(7, 7), Color::White)));
        assert!(p2.is_legal_move(Move::new(Pos::new(8, 8), Color::White)));
        // 元の局面は不変
        assert_eq!(p.move_count(), 0);
    }

    #[test]
    fn test_turn_parity_invariant() {
        let mut p = pos15();
        let cells = [(7, 7), (8, 8), (6, 6), (9, 9), (5, 5)];
        for (i, (x, y)) in cells.iter().enumerate() {
            let color = if i % 2 == 0 { Color::Black } else { Color::White };
            assert_eq!(p.turn(), color);
            p = p.play(Move::new(Pos::new(*x, *y), color));
            assert_eq!(p.move_count(), i + 1);
        }
        assert_eq!(p.turn(), Color::White);
        assert_eq!(p.moves_left(), 15 * 15 - 5);
    }

    #[test]
    fn test_apply_opening_pos_format() {
        let mut p = pos15();
        p.apply_opening("h8h9j10", OpeningType::Pos).unwrap();
        assert_eq!(p.move_count(), 3);
        assert_eq!(p.cell(Pos::new(7, 7)), Some(Color::Black));
        assert_eq!(p.cell(Pos::new(7, 8)), Some(Color::White));
        assert_eq!(p.cell(Pos::new(9, 9)), Some(Color::Black));
        // 黒2白1 → 白番
        assert_eq!(p.turn(), Color::White);
    }

    #[test]
    fn test_apply_opening_offset_format() {
        let mut p = pos15();
        p.apply_opening("0,0 -1,1 2,0", OpeningType::Offset).unwrap();
        assert_eq!(p.cell(Pos::new(7, 7)), Some(Color::Black));
        assert_eq!(p.cell(Pos::new(6, 8)), Some(Color::White));
        assert_eq!(p.cell(Pos::new(9, 7)), Some(Color::Black));
    }

    #[test]
    fn test_apply_opening_rejects_bad_input() {
        let mut p = pos15();
        assert!(matches!(
            p.apply_opening("zz", OpeningType::Pos),
            Err(OpeningError::Malformed(_))
        ));

        let mut p = pos15();
        assert!(matches!(
            p.apply_opening("h8h8", OpeningType::Pos),
            Err(OpeningError::Occupied(_))
        ));

        let mut p = pos15();
        assert!(matches!(
            p.apply_opening("9,9", OpeningType::Offset),
            Err(OpeningError::OffBoard(..))
        ));
    }

    #[test]
    fn test_empty_opening_is_empty_board() {
        let mut p = pos15();
        p.apply_opening("", OpeningType::Pos).unwrap();
        assert_eq!(p.move_count(), 0);
        assert_eq!(p.turn(), Color::Black);
    }

    #[test]
    fn test_gomostr_round_trip() {
        let p = pos15();
        for (x, y) in [(0u8, 0u8), (7, 7), (14, 14), (3, 12)] {
            let mv = Move::new(Pos::new(x, y), Color::Black);
            let s = Position::move_to_gomostr(mv);
            assert_eq!(p.move_from_gomostr(&s), Some(mv));
        }
        assert_eq!(p.move_from_gomostr("15,0"), None);
        assert_eq!(p.move_from_gomostr("a,b"), None);
        assert_eq!(p.move_from_gomostr("7"), None);
    }

    #[test]
    fn test_opening_str_round_trip() {
        let mut p = pos15();
        p.apply_opening("h8i9j10k11", OpeningType::Pos).unwrap();
        let s = p.to_opening_str(OpeningType::Pos);
        assert_eq!(s, "h8i9j10k11");

        let mut q = pos15();
        q.apply_opening(&s, OpeningType::Pos).unwrap();
        assert_eq!(q.history(), p.history());
    }

    #[test]
    fn test_transform_maps_history() {
        let mut p = pos15();
        p.apply_opening("h8h9", OpeningType::Pos).unwrap();
        let mut q = p.clone();
        q.transform(Transform::Rotate180);
        assert_eq!(q.move_count(), 2);
        assert_eq!(q.cell(Pos::new(7, 7)), Some(Color::Black));
        assert_eq!(q.cell(Pos::new(7, 6)), Some(Color::White));
        assert_eq!(q.turn(), p.turn());
    }

    #[test]
    fn test_transform_equivariance_for_verdicts() {
        // 横に黒4連を作った局面で、五連完成手と禁手判定が
        // 8変換すべてで保存されることを確認する
        let mut base = pos15();
        for i in 0..4u8 {
            base = base.play(Move::new(Pos::new(3 + i, 7), Color::Black));
            base = base.play(Move::new(Pos::new(3 + i, 1), Color::White));
        }
        let win_move = Pos::new(7, 7);

        for t in Transform::ALL {
            let mut tp = base.clone();
            tp.transform(t);
            let mv = Move::new(t.apply(win_move, 15), Color::Black);
            assert!(tp.is_legal_move(mv), "{t:?}");
            let after = tp.play(mv);
            assert!(
                after.five_from_last(GameRule::FreeStyle.allow_long_connection(Color::Black)),
                "five verdict must survive {t:?}"
            );
        }
    }

    #[test]
    fn test_min_and_max_board_sizes() {
        let mut p5 = Position::new(5);
        p5.apply_opening("a1e5", OpeningType::Pos).unwrap();
        assert_eq!(p5.moves_left(), 23);

        let mut p22 = Position::new(22);
        p22.apply_opening("v22", OpeningType::Pos).unwrap();
        assert_eq!(p22.cell(Pos::new(21, 21)), Some(Color::Black));
        assert_eq!(p22.moves_left(), 22 * 22 - 1);
    }
}
