//! Gomoku/Renju の盤面セマンティクスを提供するライブラリ。
//!
//! - `types`: 石色・座標・着手・ルール種別などの値型
//! - `Position`: コピーオンムーブの局面表現（開局適用・合法性・履歴）
//! - `rules`: 直前手を通る五連/長連の判定と、連珠の禁手判定
//!
//! I/O やプロセス制御は一切含まない。トーナメントドライバ側
//! （`tools` クレート）がこのクレートの上に構築される。

pub mod position;
pub mod rules;
pub mod types;

pub use position::{OpeningError, Position};
pub use types::{Color, ForbiddenKind, GameRule, Move, OpeningType, Outcome, Pos, Transform};
