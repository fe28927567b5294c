//! 連珠の禁手判定（黒のみ）
//!
//! 黒が空きマス `p` に打つと仮定して、次を優先順に判定する:
//!
//! 1. ちょうど五連が完成するなら勝ち（禁手ではない）
//! 2. 六連以上 → 長連
//! 3. 異なる「四」が2つ以上 → 四々
//! 4. 異なる「達四になりうる三」が2つ以上 → 三々
//!
//! 「四」は空きマス1つを埋めるとちょうど五連になる形。同一ライン上の
//! 2つの四も、構成石が異なれば別個に数える。「三」はもう1手で達四
//! （両端が空いた四連）になる形。達四を作るマス自体の禁手再帰は
//! 行わない（1段判定）。

use super::DIRECTIONS;
use crate::position::Position;
use crate::types::{Color, ForbiddenKind, Pos};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Cell {
    /// 黒石（仮置きの石を含む）
    Own,
    /// 白石
    Foe,
    Empty,
    /// 盤外
    Wall,
}

/// 仮置き後のラインを読むためのビュー。
/// `probe` のマスは常に黒石として見える。
struct LineView<'a> {
    pos: &'a Position,
    probe: Pos,
    dx: i32,
    dy: i32,
}

impl LineView<'_> {
    fn at(&self, off: i32) -> Cell {
        let x = self.probe.x as i32 + self.dx * off;
        let y = self.probe.y as i32 + self.dy * off;
        if !self.pos.contains(x, y) {
            return Cell::Wall;
        }
        let p = Pos::new(x as u8, y as u8);
        if p == self.probe {
            return Cell::Own;
        }
        match self.pos.cell(p) {
            Some(Color::Black) => Cell::Own,
            Some(Color::White) => Cell::Foe,
            None => Cell::Empty,
        }
    }

    /// 仮置きの石を含む連続黒石数
    fn run_through(&self) -> usize {
        let mut len = 1;
        for sign in [1i32, -1] {
            let mut i = 1;
            while self.at(i * sign) == Cell::Own {
                len += 1;
                i += 1;
            }
        }
        len
    }

    /// このライン上で仮置きが作る「四」の数。
    ///
    /// 仮置き石を含む5マス窓のうち、黒4・空き1で白/盤外を含まず、
    /// かつ空きを埋めてもちょうど五連に留まる（窓の外側に黒が続かない）
    /// ものを数える。構成石が同じ窓は1つの四（達四は窓2つ分だが四は1つ）。
    fn count_fours(&self) -> usize {
        let mut seen: Vec<u16> = Vec::new();
        for s in -4..=0i32 {
            let mut own_mask = 0u16;
            let mut own = 0;
            let mut empty = 0;
            let mut blocked = false;
            for i in 0..5i32 {
                match self.at(s + i) {
                    Cell::Own => {
                        own += 1;
                        own_mask |= 1 << (s + i + 4);
                    }
                    Cell::Empty => empty += 1,
                    Cell::Foe | Cell::Wall => blocked = true,
                }
            }
            if blocked || own != 4 || empty != 1 {
                continue;
            }
            // 窓の外側に黒が続くと、完成形が五連ではなく長連になる
            if self.at(s - 1) == Cell::Own || self.at(s + 5) == Cell::Own {
                continue;
            }
            if !seen.contains(&own_mask) {
                seen.push(own_mask);
            }
        }
        seen.len()
    }

    /// このライン上で仮置きが作る、達四になりうる三の数。
    ///
    /// 仮置き石を含む4マス窓のうち、黒3・空き1で白/盤外を含まず、
    /// 窓の両外側がともに空きのものを数える（空きを埋めると両端の
    /// 開いた四連 = 達四になる）。構成石が同じ窓は1つの三。
    fn count_free_threes(&self) -> usize {
        let mut seen: Vec<u16> = Vec::new();
        for s in -3..=0i32 {
            let mut own_mask = 0u16;
            let mut own = 0;
            let mut empty = 0;
            let mut blocked = false;
            for i in 0..4i32 {
                match self.at(s + i) {
                    Cell::Own => {
                        own += 1;
                        own_mask |= 1 << (s + i + 3);
                    }
                    Cell::Empty => empty += 1,
                    Cell::Foe | Cell::Wall => blocked = true,
                }
            }
            if blocked || own != 3 || empty != 1 {
                continue;
            }
            if self.at(s - 1) != Cell::Empty || self.at(s + 4) != Cell::Empty {
                continue;
            }
            if !seen.contains(&own_mask) {
                seen.push(own_mask);
            }
        }
        seen.len()
    }
}

/// 黒が空きマス `p` に打った場合の禁手種別を返す。
pub(crate) fn check(pos: &Position, p: Pos) -> Option<ForbiddenKind> {
    debug_assert!(pos.cell(p).is_none());

    let lines: Vec<LineView<'_>> = DIRECTIONS
        .iter()
        .map(|&(dx, dy)| LineView {
            pos,
            probe: p,
            dx,
            dy,
        })
        .collect();

    let mut overline = false;
    for line in &lines {
        match line.run_through() {
            5 => return None, // 五連完成は禁手に優先して勝ち
            n if n >= 6 => overline = true,
            _ => {}
        }
    }
    if overline {
        return Some(ForbiddenKind::Overline);
    }

    let fours: usize = lines.iter().map(LineView::count_fours).sum();
    if fours >= 2 {
        return Some(ForbiddenKind::DoubleFour);
    }

    let threes: usize = lines.iter().map(LineView::count_free_threes).sum();
    if threes >= 2 {
        return Some(ForbiddenKind::DoubleThree);
    }

    None
}
