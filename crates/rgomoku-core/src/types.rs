//! 盤面の基本値型

/// 石色（黒/白）。黒が先手。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    White = 1,
}

impl Color {
    /// 石色の数
    pub const NUM: usize = 2;

    /// 相手色を返す
    #[inline]
    pub const fn opponent(self) -> Color {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    /// 配列アクセス用インデックス
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl std::ops::Not for Color {
    type Output = Color;

    #[inline]
    fn not(self) -> Color {
        self.opponent()
    }
}

/// 盤上のマス。`0 <= x, y < size`（size は [5, 22]）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pos {
    pub x: u8,
    pub y: u8,
}

impl Pos {
    #[inline]
    pub const fn new(x: u8, y: u8) -> Pos {
        Pos { x, y }
    }

    /// 永続フォーマットで使う 10bit 生エンコーディング: `y * size + x`
    #[inline]
    pub const fn raw(self, size: u8) -> u16 {
        self.y as u16 * size as u16 + self.x as u16
    }

    /// `raw` の逆変換
    #[inline]
    pub const fn from_raw(raw: u16, size: u8) -> Pos {
        Pos {
            x: (raw % size as u16) as u8,
            y: (raw / size as u16) as u8,
        }
    }
}

/// 着手: マスと打った石色の組
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub pos: Pos,
    pub color: Color,
}

impl Move {
    #[inline]
    pub const fn new(pos: Pos, color: Color) -> Move {
        Move { pos, color }
    }
}

/// 対局ルール。判別値は Gomocup の `INFO rule` にそのまま流れる。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GameRule {
    /// 五連以上で勝ち
    FreeStyle = 0,
    /// FreeStyle と同じ（長連も勝ち）
    Standard = 1,
    /// ちょうど五連のみ勝ち
    ExactFive = 2,
    /// 黒に禁手（長連・三々・四々）。白は五連以上で勝ち
    Renju = 4,
}

impl GameRule {
    /// `INFO rule` で送る数値
    #[inline]
    pub const fn wire_value(self) -> u8 {
        self as u8
    }

    /// 直前に `color` が打った場合に長連を勝ちとして扱うか
    #[inline]
    pub const fn allow_long_connection(self, last_color: Color) -> bool {
        match self {
            GameRule::FreeStyle | GameRule::Standard => true,
            GameRule::ExactFive => false,
            GameRule::Renju => !matches!(last_color, Color::Black),
        }
    }

    pub fn from_wire(v: u8) -> Option<GameRule> {
        match v {
            0 => Some(GameRule::FreeStyle),
            1 => Some(GameRule::Standard),
            2 => Some(GameRule::ExactFive),
            4 => Some(GameRule::Renju),
            _ => None,
        }
    }
}

/// 連珠の禁手種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenKind {
    DoubleThree,
    DoubleFour,
    Overline,
}

impl ForbiddenKind {
    /// 棋譜の終局理由に埋め込む表記
    pub const fn label(self) -> &'static str {
        match self {
            ForbiddenKind::DoubleThree => "double three",
            ForbiddenKind::DoubleFour => "double four",
            ForbiddenKind::Overline => "overline",
        }
    }
}

/// 開局文字列のフォーマット種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpeningType {
    /// 盤中心からの符号付きオフセット列: `"0,0 -1,1 2,0"`
    Offset,
    /// 連結した座標表記: `"h8h9j10"`（列 = 'a'+x, 行 = y+1）
    Pos,
}

/// 1局の結果（視点付き）。`Loss=0, Draw=1, Win=2` は集計配列の添字を兼ねる。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Outcome {
    Loss = 0,
    Draw = 1,
    Win = 2,
}

impl Outcome {
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// 相手視点の結果
    #[inline]
    pub const fn flip(self) -> Outcome {
        match self {
            Outcome::Loss => Outcome::Win,
            Outcome::Draw => Outcome::Draw,
            Outcome::Win => Outcome::Loss,
        }
    }

    pub fn from_index(i: u8) -> Option<Outcome> {
        match i {
            0 => Some(Outcome::Loss),
            1 => Some(Outcome::Draw),
            2 => Some(Outcome::Win),
            _ => None,
        }
    }
}

/// 盤の D4 対称変換（恒等・回転3種・鏡映4種）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Transform {
    Identity = 0,
    Rotate90 = 1,
    Rotate180 = 2,
    Rotate270 = 3,
    FlipX = 4,
    FlipY = 5,
    FlipDiag = 6,
    FlipAntiDiag = 7,
}

impl Transform {
    pub const NUM: usize = 8;

    pub const ALL: [Transform; Transform::NUM] = [
        Transform::Identity,
        Transform::Rotate90,
        Transform::Rotate180,
        Transform::Rotate270,
        Transform::FlipX,
        Transform::FlipY,
        Transform::FlipDiag,
        Transform::FlipAntiDiag,
    ];

    /// ラウンド番号から変換を選ぶ（`round % 8`）
    #[inline]
    pub const fn from_round(round: usize) -> Transform {
        Transform::ALL[round % Transform::NUM]
    }

    /// マスを変換する。`size` は盤の一辺。
    #[inline]
    pub const fn apply(self, p: Pos, size: u8) -> Pos {
        let n = size - 1;
        let (x, y) = (p.x, p.y);
        let (nx, ny) = match self {
            Transform::Identity => (x, y),
            Transform::Rotate90 => (y, n - x),
            Transform::Rotate180 => (n - x, n - y),
            Transform::Rotate270 => (n - y, x),
            Transform::FlipX => (n - x, y),
            Transform::FlipY => (x, n - y),
            Transform::FlipDiag => (y, x),
            Transform::FlipAntiDiag => (n - y, n - x),
        };
        Pos::new(nx, ny)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_opponent() {
        assert_eq!(Color::Black.opponent(), Color::White);
        assert_eq!(!Color::White, Color::Black);
        assert_eq!(Color::Black.index(), 0);
        assert_eq!(Color::White.index(), 1);
    }

    #[test]
    fn test_pos_raw_round_trip() {
        for size in [5u8, 15, 22] {
            for y in 0..size {
                for x in 0..size {
                    let p = Pos::new(x, y);
                    assert_eq!(Pos::from_raw(p.raw(size), size), p);
                }
            }
        }
        // 22x22 の最大値も 10bit に収まる
        assert!(Pos::new(21, 21).raw(22) < 1 << 10);
    }

    #[test]
    fn test_rule_long_connection() {
        assert!(GameRule::FreeStyle.allow_long_connection(Color::Black));
        assert!(GameRule::Standard.allow_long_connection(Color::White));
        assert!(!GameRule::ExactFive.allow_long_connection(Color::Black));
        assert!(!GameRule::ExactFive.allow_long_connection(Color::White));
        assert!(!GameRule::Renju.allow_long_connection(Color::Black));
        assert!(GameRule::Renju.allow_long_connection(Color::White));
    }

    #[test]
    fn test_rule_wire_values() {
        assert_eq!(GameRule::FreeStyle.wire_value(), 0);
        assert_eq!(GameRule::Standard.wire_value(), 1);
        assert_eq!(GameRule::ExactFive.wire_value(), 2);
        assert_eq!(GameRule::Renju.wire_value(), 4);
        assert_eq!(GameRule::from_wire(4), Some(GameRule::Renju));
        assert_eq!(GameRule::from_wire(3), None);
    }

    #[test]
    fn test_outcome_flip() {
        assert_eq!(Outcome::Loss.flip(), Outcome::Win);
        assert_eq!(Outcome::Draw.flip(), Outcome::Draw);
        assert_eq!(Outcome::Win.flip(), Outcome::Loss);
    }

    #[test]
    fn test_transform_is_permutation() {
        let size = 9u8;
        for t in Transform::ALL {
            let mut seen = vec![false; size as usize * size as usize];
            for y in 0..size {
                for x in 0..size {
                    let q = t.apply(Pos::new(x, y), size);
                    assert!(q.x < size && q.y < size);
                    let idx = q.raw(size) as usize;
                    assert!(!seen[idx], "{t:?} maps two cells onto {q:?}");
                    seen[idx] = true;
                }
            }
        }
    }

    #[test]
    fn test_transform_rotations_compose() {
        let size = 15u8;
        let p = Pos::new(3, 11);
        let r1 = Transform::Rotate90.apply(p, size);
        let r2 = Transform::Rotate90.apply(r1, size);
        assert_eq!(r2, Transform::Rotate180.apply(p, size));
        let r3 = Transform::Rotate90.apply(r2, size);
        assert_eq!(r3, Transform::Rotate270.apply(p, size));
        let r4 = Transform::Rotate90.apply(r3, size);
        assert_eq!(r4, p);
    }
}
