//! トーナメントとエンジンの設定

use std::path::PathBuf;

use rgomoku_core::{GameRule, OpeningType};

/// 学習サンプル出力の形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    Csv,
    Bin,
    Binpack,
}

/// 学習サンプル出力の設定
#[derive(Debug, Clone)]
pub struct SampleParams {
    pub file_name: PathBuf,
    /// 1手あたりの採取確率 [0,1]
    pub freq: f64,
    pub format: SampleFormat,
    /// LZ4 フレームで圧縮して書くか
    pub compress: bool,
}

/// エンジン1本あたりの起動・時間設定
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// 起動コマンド（空白区切りで引数を含められる）
    pub cmd: String,
    /// 表示名の上書き。None なら ABOUT の応答から取る
    pub name: Option<String>,
    pub working_dir: Option<PathBuf>,
    /// 1手あたりの制限時間 (ms)。0 で無制限
    pub timeout_turn_ms: i64,
    /// 持ち時間 (ms)。0 で無制限
    pub timeout_match_ms: i64,
    /// 1手ごとの加算時間 (ms)
    pub increment_ms: i64,
    pub max_depth: Option<i32>,
    pub max_nodes: Option<i64>,
    /// `INFO max_memory` で通知するメモリ上限 (bytes)。0 は無制限の意
    pub max_memory: i64,
    pub num_threads: Option<i32>,
    /// 追加の `INFO <key> <value>`（`key=value` 形式）
    pub options: Vec<String>,
}

impl EngineOptions {
    /// いずれかの時間制御が有効か
    pub fn time_control_enabled(&self) -> bool {
        self.timeout_turn_ms > 0 || self.timeout_match_ms > 0 || self.increment_ms > 0
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            cmd: String::new(),
            name: None,
            working_dir: None,
            timeout_turn_ms: 0,
            timeout_match_ms: 0,
            increment_ms: 0,
            max_depth: None,
            max_nodes: None,
            max_memory: 0,
            num_threads: None,
            options: Vec::new(),
        }
    }
}

/// トーナメント全体の設定
#[derive(Debug, Clone)]
pub struct Options {
    pub board_size: u8,
    pub rule: GameRule,
    /// ラウンドごとに開局へ D4 変換を掛けるか
    pub transform: bool,
    pub opening_type: OpeningType,
    /// この手数に達したら引き分け打ち切り（0 で無効）
    pub force_draw_after: usize,
    /// 2手目以降を BOARD ではなく TURN で渡すか
    pub use_turn: bool,
    pub debug: bool,
    /// 引き分け裁定: 両者の |score| <= draw_score が 2*draw_count 手続いたら
    pub draw_count: u32,
    pub draw_score: i32,
    /// 投了裁定: score <= -resign_score が resign_count 手続いたら
    pub resign_count: u32,
    pub resign_score: i32,
    /// エンジンのクラッシュ/時間切れを致命的エラーとして扱うか
    pub fatal_error: bool,
    pub sample: Option<SampleParams>,
    pub concurrency: usize,
    pub rounds: usize,
    pub games_per_pair: usize,
    /// engines[0] 対 その他 の総当たりにするか
    pub gauntlet: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            board_size: 15,
            rule: GameRule::FreeStyle,
            transform: false,
            opening_type: OpeningType::Pos,
            force_draw_after: 0,
            use_turn: false,
            debug: false,
            draw_count: 0,
            draw_score: 0,
            resign_count: 0,
            resign_score: 0,
            fatal_error: false,
            sample: None,
            concurrency: 1,
            rounds: 1,
            games_per_pair: 1,
            gauntlet: false,
        }
    }
}
