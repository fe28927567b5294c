//! 外部 Gomocup エンジン1本との行単位の対話
//!
//! 標準入出力をパイプで接続し、受信は専用スレッドが mpsc チャネルへ
//! 流し込む。応答期限はワーカーの `Deadline` スロットに武装し、
//! 期限超過したプロセスは監視スレッドが SIGKILL する。

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};

use super::options::EngineOptions;
use super::types::Info;
use super::worker::Worker;
use rgomoku_core::{Color, Position};

/// ABOUT / START 応答の待ち時間
pub const ENGINE_START_TIMEOUT: Duration = Duration::from_secs(30);
/// 硬い期限に足す猶予。応答自体は間に合ったが配送が遅れた場合の保険
pub const BESTMOVE_GRACE: Duration = Duration::from_millis(1000);
/// END 送信後にプロセス終了を待つ時間
pub const TERMINATE_GRACE: Duration = Duration::from_millis(1000);
const TERMINATE_POLL: Duration = Duration::from_millis(10);

/// bestmove 待ちの結果
pub struct ThinkOutcome {
    /// エンジンが返した生の着手文字列（`x,y`）。失敗時は `None`
    pub bestmove: Option<String>,
    /// MESSAGE 行から集めた探索情報
    pub info: Info,
}

pub struct EngineAdapter {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    rx: Receiver<String>,
    pid: u32,
    crashed: bool,
    /// ABOUT 応答（または設定の上書き）から決まる表示名
    pub name: String,
}

impl EngineAdapter {
    /// エンジンを起動して ABOUT で名前を取得する。
    pub fn start(eo: &EngineOptions, w: &mut Worker) -> Result<EngineAdapter> {
        let mut parts = eo.cmd.split_whitespace();
        let program = parts.next().ok_or_else(|| anyhow!("empty engine command"))?;
        let mut cmd = Command::new(program);
        cmd.args(parts);
        if let Some(dir) = &eo.working_dir {
            cmd.current_dir(dir);
        }
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn engine '{}'", eo.cmd))?;
        let pid = child.id();
        let stdin = child.stdin.take().ok_or_else(|| anyhow!("no stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow!("no stdout"))?;

        let (tx, rx) = mpsc::channel::<String>();
        std::thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines().map_while(Result::ok) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        let mut adapter = EngineAdapter {
            child,
            stdin: BufWriter::new(stdin),
            rx,
            pid,
            crashed: false,
            name: String::new(),
        };
        adapter.name = adapter.discover_name(eo, w)?;
        Ok(adapter)
    }

    fn discover_name(&mut self, eo: &EngineOptions, w: &mut Worker) -> Result<String> {
        self.writeln(w, "ABOUT")?;
        let line = self
            .rx
            .recv_timeout(ENGINE_START_TIMEOUT)
            .map_err(|_| anyhow!("engine '{}' did not answer ABOUT", eo.cmd))?;
        w.log_line(&format!("<< {line}"));
        let about_name = parse_about_name(&line);
        Ok(match &eo.name {
            Some(name) => name.clone(),
            None => about_name.unwrap_or_else(|| default_name(&eo.cmd)),
        })
    }

    #[inline]
    pub fn is_crashed(&self) -> bool {
        self.crashed
    }

    /// 1行送信してフラッシュする。失敗はクラッシュ扱い。
    pub fn writeln(&mut self, w: &mut Worker, line: &str) -> Result<()> {
        w.log_line(&format!(">> {line}"));
        let sent = self
            .stdin
            .write_all(line.as_bytes())
            .and_then(|_| self.stdin.write_all(b"\n"))
            .and_then(|_| self.stdin.flush());
        if let Err(e) = sent {
            self.crashed = true;
            bail!("{}: write failed: {e}", self.name);
        }
        Ok(())
    }

    /// `OK` が来るまで読む。MESSAGE/DEBUG/ERROR/UNKNOWN はログに
    /// 流すだけで終端扱いにしない。タイムアウトで `false`（crashed は
    /// 立たない）、EOF で `false`（crashed が立つ）。
    pub fn wait_for_ok(&mut self, w: &mut Worker) -> bool {
        w.deadline.arm(&self.name, self.pid, ENGINE_START_TIMEOUT);
        w.log_line(&format!(
            "deadline: {} must answer within {}ms",
            self.name,
            ENGINE_START_TIMEOUT.as_millis()
        ));
        let deadline = Instant::now() + ENGINE_START_TIMEOUT;
        let ok = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(line) => {
                    w.log_line(&format!("<< {line}"));
                    let line = line.trim();
                    if line == "OK" {
                        break true;
                    }
                    if !is_engine_chatter(line) {
                        log::warn!("{}: unexpected line before OK: {line}", self.name);
                    }
                }
                Err(RecvTimeoutError::Timeout) => break false,
                Err(RecvTimeoutError::Disconnected) => {
                    self.crashed = true;
                    break false;
                }
            }
        };
        w.deadline.clear();
        w.log_line(&format!("deadline: {} cleared", self.name));
        ok
    }

    /// 思考結果を1手分読む。
    ///
    /// 応答期限は `min(time_left, timeout_turn) + 猶予` で武装する
    /// （どちらも 0 以下なら無期限）。復帰時に経過時間を
    /// `time_left_ms` から差し引く。負になった場合の扱い（ソフト
    /// タイムアウト）は呼び出し側が決める。
    ///
    /// `bestmove` が `None` のときはクラッシュか硬いタイムアウトで、
    /// `is_crashed` で区別できる。
    pub fn think(
        &mut self,
        w: &mut Worker,
        time_left_ms: &mut i64,
        timeout_turn_ms: i64,
    ) -> ThinkOutcome {
        let limit_ms = match (*time_left_ms > 0, timeout_turn_ms > 0) {
            (true, true) => Some((*time_left_ms).min(timeout_turn_ms)),
            (true, false) => Some(*time_left_ms),
            (false, true) => Some(timeout_turn_ms),
            (false, false) => None,
        };
        let hard_deadline = limit_ms.map(|ms| {
            let limit = Duration::from_millis(ms.max(0) as u64) + BESTMOVE_GRACE;
            w.deadline.arm(&self.name, self.pid, limit);
            w.log_line(&format!(
                "deadline: {} must move within {}ms",
                self.name,
                limit.as_millis()
            ));
            Instant::now() + limit
        });

        let start = Instant::now();
        let mut info = Info::default();
        let bestmove = loop {
            let received = match hard_deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    self.rx.recv_timeout(remaining)
                }
                None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(line) => {
                    w.log_line(&format!("<< {line}"));
                    let line = line.trim();
                    if let Some(rest) = line.strip_prefix("MESSAGE") {
                        info.update_from_message(rest);
                        continue;
                    }
                    if is_engine_chatter(line) || line.is_empty() {
                        continue;
                    }
                    // 既知のプレフィックス以外の最初の行が着手
                    break Some(line.to_string());
                }
                Err(RecvTimeoutError::Timeout) => break None,
                Err(RecvTimeoutError::Disconnected) => {
                    self.crashed = true;
                    break None;
                }
            }
        };
        if hard_deadline.is_some() {
            w.deadline.clear();
        }
        *time_left_ms -= start.elapsed().as_millis() as i64;
        ThinkOutcome { bestmove, info }
    }

    /// 盤面全体を BOARD コマンドで送る。
    ///
    /// piskvork 互換の所有者エンコーディング: 次に指す側の石を 1、
    /// 相手（直前に指した側）の石を 2 として送る。
    pub fn send_board(&mut self, w: &mut Worker, pos: &Position) -> Result<()> {
        let Some(last) = pos.last_move() else {
            bail!("BOARD requires at least one stone");
        };
        self.writeln(w, "BOARD")?;
        for m in pos.history() {
            let owner = if m.color == last.color { 2 } else { 1 };
            let line = format!("{},{},{}", m.pos.x, m.pos.y, owner);
            self.writeln(w, &line)?;
        }
        self.writeln(w, "DONE")
    }

    /// END を送って猶予内の自発終了を待ち、だめなら kill する。
    pub fn stop(&mut self, w: &mut Worker) {
        let _ = self.writeln(w, "END");
        let deadline = Instant::now() + TERMINATE_GRACE;
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                return;
            }
            std::thread::sleep(TERMINATE_POLL);
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for EngineAdapter {
    fn drop(&mut self) {
        let _ = self.stdin.write_all(b"END\n");
        let _ = self.stdin.flush();
        let deadline = Instant::now() + TERMINATE_GRACE;
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                return;
            }
            std::thread::sleep(TERMINATE_POLL);
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// 応答として読み流してよい行か
fn is_engine_chatter(line: &str) -> bool {
    line.starts_with("MESSAGE")
        || line.starts_with("DEBUG")
        || line.starts_with("ERROR")
        || line.starts_with("UNKNOWN")
}

/// ABOUT 応答の `name="..."` を取り出す
fn parse_about_name(line: &str) -> Option<String> {
    let start = line.find("name=\"")? + "name=\"".len();
    let rest = &line[start..];
    let end = rest.find('"')?;
    let name = rest[..end].trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// コマンド文字列からのフォールバック表示名
fn default_name(cmd: &str) -> String {
    let program = cmd.split_whitespace().next().unwrap_or(cmd);
    Path::new(program)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(program)
        .to_string()
}

/// 黒番として盤を見たときの色に対応する所有者番号（テスト用の補助）
pub fn owner_for(color: Color, last_color: Color) -> u8 {
    if color == last_color {
        2
    } else {
        1
    }
}
