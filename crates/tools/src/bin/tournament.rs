//! Gomocup エンジンの並列トーナメントドライバ。
//!
//! ワーカースレッドがジョブキューから対局を取り出し、エンジンを
//! サブプロセスとして起動して対局させる。成績はペア単位で集計し、
//! PGN/SGF 棋譜と学習サンプルをオプションで出力する。
//!
//! # 使用例
//!
//! ```shell
//! cargo run -p tools --release --bin tournament -- \
//!   --engine ./pbrain-rapfi --engine ./pbrain-other \
//!   --rule 0 --board-size 15 \
//!   --rounds 2 --games 2 --concurrency 4 \
//!   --timeout-turn 5000 --timeout-match 180000 \
//!   --openings openings.txt --opening-type pos --transform \
//!   --pgn out/games.pgn --sample-file out/samples.bin --sample-format bin
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser as _;
use log::{error, info};
use serde::Serialize;

use rgomoku_core::{GameRule, OpeningType, Outcome};
use tools::gomocup::{
    spawn_supervisor, EngineAdapter, EngineOptions, Game, GameState, JobQueue, Openings, Options,
    SampleFormat, SampleParams, Worker,
};
use tools::output::{record, sample, SampleSink, SeqWriter};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(clap::Parser, Debug)]
#[command(about = "parallel tournament driver for Gomocup engines")]
struct Cli {
    /// Engine command lines (2 or more required)
    #[arg(long = "engine", required = true, num_args = 1)]
    engines: Vec<String>,

    /// Engine display names (must match --engine count if specified;
    /// discovered via ABOUT otherwise)
    #[arg(long = "engine-name", num_args = 1)]
    engine_names: Vec<String>,

    /// Per-engine INFO options (format: "INDEX:key=value", can be repeated)
    #[arg(long = "engine-option", num_args = 1)]
    engine_options: Vec<String>,

    /// Board size in [5, 22]
    #[arg(long, default_value_t = 15)]
    board_size: u8,

    /// Game rule: 0=freestyle, 1=standard, 2=exact-five, 4=renju
    #[arg(long, default_value_t = 0)]
    rule: u8,

    /// Rounds to play
    #[arg(long, default_value_t = 1)]
    rounds: usize,

    /// Games per pair in each round (reverse alternates)
    #[arg(long, default_value_t = 2)]
    games: usize,

    /// Play engines[0] against every other engine only
    #[arg(long)]
    gauntlet: bool,

    /// Number of concurrent workers
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Turn time limit per engine in milliseconds (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    timeout_turn: i64,

    /// Match time limit per engine in milliseconds (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    timeout_match: i64,

    /// Time increment per move in milliseconds
    #[arg(long, default_value_t = 0)]
    increment: i64,

    /// Max search depth forwarded to engines
    #[arg(long)]
    depth: Option<i32>,

    /// Max node count forwarded to engines
    #[arg(long)]
    nodes: Option<i64>,

    /// Memory limit per engine in bytes (0 = unlimited)
    #[arg(long, default_value_t = 350 * 1024 * 1024)]
    max_memory: i64,

    /// Threads per engine
    #[arg(long)]
    threads: Option<i32>,

    /// Opening file (one opening per line, '#' comments allowed)
    #[arg(long)]
    openings: Option<PathBuf>,

    /// Opening format: "offset" or "pos"
    #[arg(long, default_value = "offset")]
    opening_type: String,

    /// Transform the opening by round number (8 symmetries)
    #[arg(long)]
    transform: bool,

    /// Use TURN instead of BOARD once an engine is in sync
    #[arg(long = "use-turn")]
    use_turn: bool,

    /// Adjudicate a draw once the move count reaches this (0 = off)
    #[arg(long, default_value_t = 0)]
    force_draw_after: usize,

    /// Draw adjudication: both sides report |score| <= draw-score
    /// for draw-count consecutive own moves
    #[arg(long, default_value_t = 0)]
    draw_count: u32,
    #[arg(long, default_value_t = 0)]
    draw_score: i32,

    /// Resign adjudication: one side reports score <= -resign-score
    /// for resign-count consecutive own moves
    #[arg(long, default_value_t = 0)]
    resign_count: u32,
    #[arg(long, default_value_t = 0)]
    resign_score: i32,

    /// Treat engine crashes and timeouts as fatal (non-zero exit)
    #[arg(long)]
    fatal_error: bool,

    /// Print the board after every move
    #[arg(long)]
    debug: bool,

    /// PGN output file
    #[arg(long)]
    pgn: Option<PathBuf>,

    /// SGF output file
    #[arg(long)]
    sgf: Option<PathBuf>,

    /// JSONL summary output file
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Training sample output file
    #[arg(long)]
    sample_file: Option<PathBuf>,

    /// Sampling probability per move in [0, 1]
    #[arg(long, default_value_t = 1.0)]
    sample_freq: f64,

    /// Sample format: "csv", "bin" or "binpack"
    #[arg(long, default_value = "bin")]
    sample_format: String,

    /// Compress sample output with an LZ4 frame
    #[arg(long)]
    sample_compress: bool,

    /// Per-worker protocol log prefix (writes <prefix>-<id>.log)
    #[arg(long)]
    log_prefix: Option<PathBuf>,

    /// Report standings every N games
    #[arg(long, default_value_t = 10)]
    report_interval: usize,
}

// ---------------------------------------------------------------------------
// JSONL サマリ
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct GameLogEntry<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    event: usize,
    round: usize,
    game: usize,
    black: &'a str,
    white: &'a str,
    result: &'a str,
    reason: &'a str,
    ply: usize,
}

#[derive(Serialize)]
struct StandingsEntry<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    first: &'a str,
    second: &'a str,
    wins: usize,
    losses: usize,
    draws: usize,
    score: f64,
}

// ---------------------------------------------------------------------------
// 共有出力
// ---------------------------------------------------------------------------

struct Outputs {
    pgn: Option<Mutex<SeqWriter>>,
    sgf: Option<Mutex<SeqWriter>>,
    samples: Option<Mutex<SampleSink>>,
    summary: Option<Mutex<BufWriter<File>>>,
}

impl Outputs {
    fn open(cli: &Cli) -> Result<Outputs> {
        let pgn = match &cli.pgn {
            Some(p) => Some(Mutex::new(SeqWriter::create(p)?)),
            None => None,
        };
        let sgf = match &cli.sgf {
            Some(p) => Some(Mutex::new(SeqWriter::create(p)?)),
            None => None,
        };
        let samples = match &cli.sample_file {
            Some(p) => Some(Mutex::new(SampleSink::create(p, cli.sample_compress)?)),
            None => None,
        };
        let summary = match &cli.summary {
            Some(p) => {
                let file = File::create(p)
                    .with_context(|| format!("failed to create {}", p.display()))?;
                Some(Mutex::new(BufWriter::new(file)))
            }
            None => None,
        };
        Ok(Outputs {
            pgn,
            sgf,
            samples,
            summary,
        })
    }

    /// 1局分の出力をまとめて書く。サンプルは1局分がロック1回で
    /// 連続して書かれる。
    fn write_game(&self, game: &Game, global_idx: usize, format: SampleFormat) -> Result<()> {
        if let Some(pgn) = &self.pgn {
            pgn.lock().unwrap().push(global_idx, record::pgn(game, global_idx))?;
        }
        if let Some(sgf) = &self.sgf {
            sgf.lock().unwrap().push(global_idx, record::sgf(game, global_idx))?;
        }
        if let Some(sink) = &self.samples {
            if !game.samples.is_empty() {
                let mut sink = sink.lock().unwrap();
                match format {
                    SampleFormat::Csv => sink.write_all(sample::encode_csv(game).as_bytes())?,
                    SampleFormat::Bin => sink.write_all(&sample::encode_bin(game))?,
                    SampleFormat::Binpack => sink.write_all(&sample::encode_binpack(game))?,
                }
                sink.flush()?;
            }
        }
        if let Some(summary) = &self.summary {
            let (result, reason) = game.decode_state("0-1", "1/2-1/2", "1-0");
            let entry = GameLogEntry {
                kind: "game",
                event: global_idx,
                round: game.round,
                game: game.game_idx,
                black: &game.names[0],
                white: &game.names[1],
                result: &result,
                reason: &reason,
                ply: game.ply,
            };
            let mut out = summary.lock().unwrap();
            serde_json::to_writer(&mut *out, &entry)?;
            out.write_all(b"\n")?;
            out.flush()?;
        }
        Ok(())
    }

    fn finish(self, queue: &JobQueue) -> Result<()> {
        if let Some(pgn) = self.pgn {
            pgn.into_inner().unwrap().drain()?;
        }
        if let Some(sgf) = self.sgf {
            sgf.into_inner().unwrap().drain()?;
        }
        if let Some(sink) = self.samples {
            sink.into_inner().unwrap().close()?;
        }
        if let Some(summary) = self.summary {
            let mut out = summary.into_inner().unwrap();
            for r in queue.results() {
                let [l, d, wn] = r.count;
                let n = l + d + wn;
                if n == 0 {
                    continue;
                }
                let first = queue.name(r.ei[0]);
                let second = queue.name(r.ei[1]);
                let entry = StandingsEntry {
                    kind: "standings",
                    first: first.as_str(),
                    second: second.as_str(),
                    wins: wn,
                    losses: l,
                    draws: d,
                    score: (wn as f64 + 0.5 * d as f64) / n as f64,
                };
                serde_json::to_writer(&mut out, &entry)?;
                out.write_all(b"\n")?;
            }
            out.flush()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ワーカー
// ---------------------------------------------------------------------------

struct WorkerCtx {
    options: Options,
    engine_opts: Vec<EngineOptions>,
    queue: Arc<JobQueue>,
    openings: Arc<Openings>,
    outputs: Arc<Outputs>,
    shutdown: Arc<AtomicBool>,
    fatal_hit: Arc<AtomicBool>,
    report_interval: usize,
    sample_format: SampleFormat,
}

fn worker_main(ctx: &WorkerCtx, mut w: Worker) {
    // エンジンはワーカー内でキャッシュし、クラッシュ時だけ作り直す
    let mut cache: Vec<Option<EngineAdapter>> = Vec::new();
    cache.resize_with(ctx.engine_opts.len(), || None);

    while let Some((job, idx, total)) = ctx.queue.pop() {
        if ctx.shutdown.load(Ordering::Relaxed) {
            break;
        }

        // 対戦する2本のエンジンを準備
        let mut spawn_failed = false;
        for &e in &job.ei {
            let dead = match &cache[e] {
                Some(adapter) => adapter.is_crashed(),
                None => true,
            };
            if dead {
                match EngineAdapter::start(&ctx.engine_opts[e], &mut w) {
                    Ok(adapter) => {
                        ctx.queue.set_name(e, &adapter.name);
                        cache[e] = Some(adapter);
                    }
                    Err(err) => {
                        error!("[{}] failed to start engine {e}: {err:#}", w.id);
                        spawn_failed = true;
                        break;
                    }
                }
            }
        }
        if spawn_failed {
            // 起動すらできないエンジンは続行不能
            ctx.fatal_hit.store(true, Ordering::Relaxed);
            ctx.shutdown.store(true, Ordering::Relaxed);
            ctx.queue.stop();
            break;
        }

        let mut game = Game::new(job.round, job.game);
        if let Err(err) = game.load_opening(ctx.openings.get(job.round), &ctx.options) {
            // 開局はロード時に検証済みなのでここには来ないはず
            error!("[{}] opening rejected: {err}", w.id);
            ctx.queue.stop();
            break;
        }

        let outcome = {
            let (e0, e1) = two_slots(&mut cache, job.ei[0], job.ei[1]);
            game.play(
                &ctx.options,
                [&ctx.engine_opts[job.ei[0]], &ctx.engine_opts[job.ei[1]]],
                (e0, e1),
                job.reverse,
                &mut w,
            )
        };

        // クラッシュしたエンジンは破棄して次回作り直す
        for &e in &job.ei {
            if cache[e].as_ref().is_some_and(|a| a.is_crashed()) {
                cache[e] = None;
            }
        }

        let counts = ctx.queue.add_result(job.pair, outcome);
        info!(
            "[{}] finished game {} of {} ({} vs {}: {}-{}-{})",
            w.id,
            idx + 1,
            total,
            ctx.queue.name(job.ei[0]),
            ctx.queue.name(job.ei[1]),
            counts[Outcome::Win.index()],
            counts[Outcome::Loss.index()],
            counts[Outcome::Draw.index()],
        );
        if let Some(update) = ctx.queue.format_results(ctx.report_interval) {
            print!("{update}");
        }

        if let Err(err) = ctx.outputs.write_game(&game, idx, ctx.sample_format) {
            // 出力先の I/O エラーは続行しても壊れたデータを増やすだけ
            error!("[{}] output failed: {err:#}", w.id);
            ctx.fatal_hit.store(true, Ordering::Relaxed);
            ctx.shutdown.store(true, Ordering::Relaxed);
            ctx.queue.stop();
            break;
        }

        if ctx.options.fatal_error
            && matches!(game.state, GameState::Crashed | GameState::TimeLoss)
        {
            ctx.fatal_hit.store(true, Ordering::Relaxed);
            ctx.queue.stop();
            break;
        }

        w.flush_log();
    }

    // キャッシュ中のエンジンへ END を送って片付ける
    for slot in cache.iter_mut() {
        if let Some(mut adapter) = slot.take() {
            adapter.stop(&mut w);
        }
    }
    w.flush_log();
}

/// 同一 Vec 内の異なる2スロットへの可変参照
fn two_slots(
    cache: &mut [Option<EngineAdapter>],
    a: usize,
    b: usize,
) -> (&mut EngineAdapter, &mut EngineAdapter) {
    assert_ne!(a, b);
    if a < b {
        let (left, right) = cache.split_at_mut(b);
        (
            left[a].as_mut().expect("engine spawned"),
            right[0].as_mut().expect("engine spawned"),
        )
    } else {
        let (left, right) = cache.split_at_mut(a);
        (
            right[0].as_mut().expect("engine spawned"),
            left[b].as_mut().expect("engine spawned"),
        )
    }
}

// ---------------------------------------------------------------------------
// メイン
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let n = cli.engines.len();

    if n < 2 {
        bail!("at least 2 engines are required");
    }
    if cli.concurrency == 0 {
        bail!("--concurrency must be at least 1");
    }
    if !(5..=22).contains(&cli.board_size) {
        bail!("--board-size must be in [5, 22]");
    }
    if !(0.0..=1.0).contains(&cli.sample_freq) {
        bail!("--sample-freq must be in [0, 1]");
    }
    let rule = GameRule::from_wire(cli.rule)
        .with_context(|| format!("invalid --rule {} (use 0, 1, 2 or 4)", cli.rule))?;
    let opening_type = match cli.opening_type.as_str() {
        "offset" => OpeningType::Offset,
        "pos" => OpeningType::Pos,
        other => bail!("invalid --opening-type '{other}' (use offset or pos)"),
    };
    let sample_format = match cli.sample_format.as_str() {
        "csv" => SampleFormat::Csv,
        "bin" => SampleFormat::Bin,
        "binpack" => SampleFormat::Binpack,
        other => bail!("invalid --sample-format '{other}' (use csv, bin or binpack)"),
    };
    if !cli.engine_names.is_empty() && cli.engine_names.len() != n {
        bail!(
            "--engine-name count ({}) does not match --engine count ({n})",
            cli.engine_names.len()
        );
    }

    // per-engine オプションの解析: "INDEX:key=value"
    let mut per_engine: HashMap<usize, Vec<String>> = HashMap::new();
    for opt in &cli.engine_options {
        let (idx_str, kv) = opt
            .split_once(':')
            .with_context(|| format!("invalid --engine-option format: {opt}"))?;
        let idx: usize = idx_str
            .parse()
            .with_context(|| format!("invalid engine index: {idx_str}"))?;
        if idx >= n {
            bail!("--engine-option index {idx} out of range (0..{n})");
        }
        per_engine.entry(idx).or_default().push(kv.to_string());
    }

    let engine_opts: Vec<EngineOptions> = (0..n)
        .map(|i| EngineOptions {
            cmd: cli.engines[i].clone(),
            name: cli.engine_names.get(i).cloned(),
            working_dir: None,
            timeout_turn_ms: cli.timeout_turn,
            timeout_match_ms: cli.timeout_match,
            increment_ms: cli.increment,
            max_depth: cli.depth,
            max_nodes: cli.nodes,
            max_memory: cli.max_memory,
            num_threads: cli.threads,
            options: per_engine.remove(&i).unwrap_or_default(),
        })
        .collect();

    let options = Options {
        board_size: cli.board_size,
        rule,
        transform: cli.transform,
        opening_type,
        force_draw_after: cli.force_draw_after,
        use_turn: cli.use_turn,
        debug: cli.debug,
        draw_count: cli.draw_count,
        draw_score: cli.draw_score,
        resign_count: cli.resign_count,
        resign_score: cli.resign_score,
        fatal_error: cli.fatal_error,
        sample: cli.sample_file.as_ref().map(|p| SampleParams {
            file_name: p.clone(),
            freq: cli.sample_freq,
            format: sample_format,
            compress: cli.sample_compress,
        }),
        concurrency: cli.concurrency,
        rounds: cli.rounds,
        games_per_pair: cli.games,
        gauntlet: cli.gauntlet,
    };

    let openings = Arc::new(match &cli.openings {
        Some(path) => Openings::load(path, opening_type, cli.board_size)?,
        None => Openings::empty(),
    });

    let queue = Arc::new(JobQueue::new(n, cli.rounds, cli.games, cli.gauntlet));
    let outputs = Arc::new(Outputs::open(&cli)?);
    let shutdown = Arc::new(AtomicBool::new(false));
    let fatal_hit = Arc::new(AtomicBool::new(false));

    {
        let queue = queue.clone();
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nStopping tournament, letting games finish...");
            shutdown.store(true, Ordering::Relaxed);
            queue.stop();
        })
        .ok();
    }

    let start_time = Instant::now();

    // ワーカーと監視スレッドの起動
    let mut workers = Vec::new();
    let mut deadlines = Vec::new();
    for i in 0..cli.concurrency {
        let worker = Worker::new(i, cli.log_prefix.as_deref())?;
        deadlines.push(worker.deadline.clone());
        workers.push(worker);
    }
    let supervisor_stop = Arc::new(AtomicBool::new(false));
    let supervisor = spawn_supervisor(deadlines, supervisor_stop.clone());

    let mut handles = Vec::new();
    for w in workers {
        let ctx = WorkerCtx {
            options: options.clone(),
            engine_opts: engine_opts.clone(),
            queue: queue.clone(),
            openings: openings.clone(),
            outputs: outputs.clone(),
            shutdown: shutdown.clone(),
            fatal_hit: fatal_hit.clone(),
            report_interval: cli.report_interval,
            sample_format,
        };
        handles.push(thread::spawn(move || worker_main(&ctx, w)));
    }
    for h in handles {
        let _ = h.join();
    }

    supervisor_stop.store(true, Ordering::Relaxed);
    let _ = supervisor.join();

    let completed = queue.completed();
    println!();
    println!("=== Tournament Complete ===");
    println!(
        "Total: {} games in {:.1}s",
        completed,
        start_time.elapsed().as_secs_f64()
    );
    print_final_table(&queue);

    let outputs =
        Arc::try_unwrap(outputs).map_err(|_| anyhow!("worker still holds an output handle"))?;
    outputs.finish(&queue)?;

    if options.fatal_error && fatal_hit.load(Ordering::Relaxed) {
        bail!("an engine crashed or lost on time with --fatal-error set");
    }
    Ok(())
}

fn print_final_table(queue: &JobQueue) {
    for r in queue.results() {
        let [l, d, wn] = r.count;
        let n = l + d + wn;
        if n == 0 {
            continue;
        }
        let first = queue.name(r.ei[0]);
        let second = queue.name(r.ei[1]);
        let score = (wn as f64 + 0.5 * d as f64) / n as f64;
        let elo = if score > 0.0 && score < 1.0 {
            format!("{:+.0}", -400.0 * (1.0 / score - 1.0).log10())
        } else {
            "N/A".to_string()
        };
        println!(
            "  {} vs {}: {}W-{}L-{}D | score: {:.3} | Elo: {}",
            first, second, wn, l, d, score, elo
        );
    }
}
