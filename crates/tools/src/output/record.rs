//! PGN / SGF 棋譜ブロックの生成

use chrono::Local;

use crate::gomocup::Game;
use rgomoku_core::Color;

const SGF_MOVES_PER_LINE: usize = 8;

/// 1局分の PGN ブロック（ヘッダ + 結果、末尾は空行区切り）
pub fn pgn(game: &Game, game_idx: usize) -> String {
    let (result, reason) = game.decode_state("0-1", "1/2-1/2", "1-0");

    let mut out = format!("[Event \"{game_idx}\"]\n");
    out.push_str(&format!(
        "[Date \"{}\"]\n",
        Local::now().format("%Y.%m.%d %H:%M:%S")
    ));
    out.push_str(&format!("[Round \"{}.{}\"]\n", game.round + 1, game.game_idx + 1));
    out.push_str(&format!("[Black \"{}\"]\n", game.names[Color::Black.index()]));
    out.push_str(&format!("[White \"{}\"]\n", game.names[Color::White.index()]));
    out.push_str(&format!("[Result \"{result}\"]\n"));
    out.push_str(&format!("[Termination \"{reason}\"]\n"));
    out.push_str(&format!("[PlyCount \"{}\"]\n", game.ply));
    out.push_str(&result);
    out.push_str("\n\n");
    out
}

/// 1局分の SGF ブロック。
/// 開局の着手は `C[opening move]`、対局中の着手は思考時間を注記する。
pub fn sgf(game: &Game, game_idx: usize) -> String {
    let (result, reason) = game.decode_state("W+1", "0", "B+1");
    let black = &game.names[Color::Black.index()];
    let white = &game.names[Color::White.index()];

    let mut out = String::from("(;FF[4]GM[4]");
    out.push_str(&format!("GN[{game_idx}]"));
    out.push_str(&format!("EV[{black} x {white}]"));
    out.push_str(&format!("DT[{}]", Local::now().format("%Y.%m.%d %H:%M:%S")));
    out.push_str(&format!("RO[{}.{}]", game.round + 1, game.game_idx + 1));
    out.push_str(&format!("RU[{}]", game.rule().wire_value()));
    out.push_str(&format!("SZ[{}]", game.current_position().size()));
    out.push_str(&format!("PB[{black}]"));
    out.push_str(&format!("PW[{white}]"));
    out.push_str(&format!("RE[{result}]"));
    out.push_str(&format!("TE[{reason}]"));
    out.push('\n');

    let last = game.current_position();
    let opening_cnt = game.opening_move_count();
    let mut per_line = 0;
    for (j, m) in last.history().iter().enumerate() {
        if opening_cnt > 0 && j == opening_cnt {
            out.push('\n');
        }
        if per_line >= SGF_MOVES_PER_LINE {
            out.push('\n');
            per_line = 0;
        }
        out.push(';');
        let coord = format!("{}{}", (b'a' + m.pos.x) as char, (b'a' + m.pos.y) as char);
        out.push_str(&format!(
            "{}[{}]",
            if m.color == Color::Black { 'B' } else { 'W' },
            coord
        ));
        if j < opening_cnt {
            out.push_str("C[opening move]");
        } else {
            let time_ms = game.infos[j - opening_cnt].time_ms;
            out.push_str(&format!("C[{time_ms}ms]"));
            per_line += 1;
        }
    }

    out.push_str(")\n\n");
    out
}
