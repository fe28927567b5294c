//! ワーカーごとの状態と、ハングしたエンジンを強制終了する監視スレッド

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::warn;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::SplitMix64;

/// 監視スレッドの起床間隔
pub const SUPERVISOR_PERIOD: Duration = Duration::from_millis(100);

#[derive(Default)]
struct DeadlineState {
    armed: bool,
    engine_name: String,
    expires_at: Option<Instant>,
    pid: Option<u32>,
}

/// ワーカー1つにつき1スロットの応答期限。
///
/// ゲームループ側が書き、監視スレッドが読む。ロックは常に末端で、
/// 保持したまま他のロックを取ることはない。
#[derive(Default)]
pub struct Deadline {
    state: Mutex<DeadlineState>,
}

impl Deadline {
    pub fn new() -> Deadline {
        Deadline::default()
    }

    /// エンジンが `limit` 以内に応答しなければ強制終了の対象になる
    pub fn arm(&self, engine_name: &str, pid: u32, limit: Duration) {
        let mut st = self.state.lock().unwrap();
        st.armed = true;
        st.engine_name.clear();
        st.engine_name.push_str(engine_name);
        st.expires_at = Some(Instant::now() + limit);
        st.pid = Some(pid);
    }

    pub fn clear(&self) {
        let mut st = self.state.lock().unwrap();
        st.armed = false;
        st.expires_at = None;
        st.pid = None;
    }

    /// 期限超過なら (エンジン名, pid) を返してスロットを空にする。
    /// ロックが取れないときは今回は見送る。
    fn take_overdue(&self, now: Instant) -> Option<(String, u32)> {
        let mut st = self.state.try_lock().ok()?;
        if !st.armed || now < st.expires_at? {
            return None;
        }
        st.armed = false;
        st.expires_at = None;
        let pid = st.pid.take()?;
        Some((std::mem::take(&mut st.engine_name), pid))
    }
}

#[cfg(unix)]
fn kill_process(pid: u32) {
    // SIGKILL。後始末は EngineAdapter 側の wait が行う
    unsafe {
        libc::kill(pid as i32, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process(_pid: u32) {}

/// 全ワーカーの期限を定期巡回し、超過したエンジンを SIGKILL する
/// 監視スレッドを起動する。
pub fn spawn_supervisor(
    deadlines: Vec<Arc<Deadline>>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            let now = Instant::now();
            for (i, d) in deadlines.iter().enumerate() {
                if let Some((name, pid)) = d.take_overdue(now) {
                    warn!("[{}] engine {} unresponsive, killing pid {}", i + 1, name, pid);
                    kill_process(pid);
                }
            }
            thread::sleep(SUPERVISOR_PERIOD);
        }
    })
}

/// ワーカースレッドごとの文脈: id、サンプリング用 PRNG、
/// プロトコルログ、応答期限スロット。
pub struct Worker {
    /// 1始まり（0 はメインスレッド）
    pub id: usize,
    rng: SplitMix64,
    log: Option<BufWriter<File>>,
    pub deadline: Arc<Deadline>,
}

impl Worker {
    /// `index` は 0 始まり。PRNG は index をシードにするので
    /// 同じ構成での再実行はサンプリング判断まで再現される。
    pub fn new(index: usize, log_prefix: Option<&Path>) -> Result<Worker> {
        let log = match log_prefix {
            Some(prefix) => {
                let path = format!("{}-{}.log", prefix.display(), index + 1);
                let file =
                    File::create(&path).with_context(|| format!("failed to create {path}"))?;
                Some(BufWriter::new(file))
            }
            None => None,
        };
        Ok(Worker {
            id: index + 1,
            rng: SplitMix64::seed_from_u64(index as u64),
            log,
            deadline: Arc::new(Deadline::new()),
        })
    }

    /// サンプリング判定用の一様乱数 [0, 1)
    pub fn sample_unit(&mut self) -> f64 {
        self.rng.random()
    }

    /// プロトコルログへ1行書く（未設定なら何もしない）
    pub fn log_line(&mut self, line: &str) {
        if let Some(log) = &mut self.log {
            let _ = writeln!(log, "{line}");
        }
    }

    pub fn flush_log(&mut self) {
        if let Some(log) = &mut self.log {
            let _ = log.flush();
        }
    }
}
