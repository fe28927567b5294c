//! ジョブキューとペア別成績の集計
//!
//! ワーカーは `pop` でジョブを取り、終局後に `add_result` で成績を
//! 返す。内部状態はひとつの Mutex で守り、ロックは末端でのみ持つ。

use std::sync::Mutex;

use rgomoku_core::Outcome;

/// 1対局分のジョブ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
    /// 対戦するエンジンのインデックス
    pub ei: [usize; 2],
    /// 成績集計先のペア番号
    pub pair: usize,
    pub round: usize,
    /// ラウンド内の対局番号
    pub game: usize,
    /// true なら ei[1] が先に指す
    pub reverse: bool,
}

/// ペアごとの成績。`count` は ei[0] 視点で [負, 分, 勝]。
#[derive(Debug, Clone, Copy)]
pub struct PairResult {
    pub ei: [usize; 2],
    pub count: [usize; 3],
}

struct QueueInner {
    jobs: Vec<Job>,
    idx: usize,
    completed: usize,
    results: Vec<PairResult>,
    names: Vec<String>,
}

pub struct JobQueue {
    inner: Mutex<QueueInner>,
}

fn push_pair_jobs(
    jobs: &mut Vec<Job>,
    games: usize,
    e1: usize,
    e2: usize,
    pair: usize,
    added: &mut usize,
    round: usize,
) {
    for g in 0..games {
        jobs.push(Job {
            ei: [e1, e2],
            pair,
            round,
            game: *added,
            reverse: g % 2 == 1,
        });
        *added += 1;
    }
}

impl JobQueue {
    /// 全ラウンド分のジョブ列を構築する。
    ///
    /// - 総当たり: ラウンドごとに `e1 < e2` の全ペア
    /// - ガントレット: engines[0] 対 その他
    ///
    /// 同一ペアの連続する対局は `reverse` を交互に立てる。
    pub fn new(engines: usize, rounds: usize, games: usize, gauntlet: bool) -> JobQueue {
        assert!(engines >= 2 && rounds >= 1 && games >= 1);

        let mut jobs = Vec::new();
        let mut results = Vec::new();

        if gauntlet {
            for e2 in 1..engines {
                results.push(PairResult {
                    ei: [0, e2],
                    count: [0; 3],
                });
            }
            for round in 0..rounds {
                let mut added = 0;
                for e2 in 1..engines {
                    push_pair_jobs(&mut jobs, games, 0, e2, e2 - 1, &mut added, round);
                }
            }
        } else {
            for e1 in 0..engines - 1 {
                for e2 in e1 + 1..engines {
                    results.push(PairResult {
                        ei: [e1, e2],
                        count: [0; 3],
                    });
                }
            }
            for round in 0..rounds {
                let mut pair = 0;
                let mut added = 0;
                for e1 in 0..engines - 1 {
                    for e2 in e1 + 1..engines {
                        push_pair_jobs(&mut jobs, games, e1, e2, pair, &mut added, round);
                        pair += 1;
                    }
                }
            }
        }

        JobQueue {
            inner: Mutex::new(QueueInner {
                jobs,
                idx: 0,
                completed: 0,
                results,
                // 実行時に ABOUT から並行発見されるまで空
                names: vec![String::new(); engines],
            }),
        }
    }

    /// 次のジョブと (実行中の通し番号, 総ジョブ数) を返す。
    /// 尽きていれば `None`。
    pub fn pop(&self) -> Option<(Job, usize, usize)> {
        let mut q = self.inner.lock().unwrap();
        if q.idx < q.jobs.len() {
            let job = q.jobs[q.idx];
            let idx = q.idx;
            q.idx += 1;
            Some((job, idx, q.jobs.len()))
        } else {
            None
        }
    }

    /// 対局結果を集計し、そのペアの最新の [負, 分, 勝] を返す。
    pub fn add_result(&self, pair: usize, outcome: Outcome) -> [usize; 3] {
        let mut q = self.inner.lock().unwrap();
        q.results[pair].count[outcome.index()] += 1;
        q.completed += 1;
        q.results[pair].count
    }

    pub fn completed(&self) -> usize {
        self.inner.lock().unwrap().completed
    }

    pub fn done(&self) -> bool {
        let q = self.inner.lock().unwrap();
        q.idx >= q.jobs.len()
    }

    /// 以後の `pop` を空にする。実行中の対局はそのまま終局まで進む。
    pub fn stop(&self) {
        let mut q = self.inner.lock().unwrap();
        q.idx = q.jobs.len();
    }

    /// エンジン名を一度だけ設定する（ワーカー間の競合は先勝ち）。
    pub fn set_name(&self, ei: usize, name: &str) {
        let mut q = self.inner.lock().unwrap();
        if q.names[ei].is_empty() {
            q.names[ei] = name.to_string();
        }
    }

    pub fn name(&self, ei: usize) -> String {
        self.inner.lock().unwrap().names[ei].clone()
    }

    /// `frequency` 局ごとに全ペアの途中経過を文字列で返す。
    /// 出力タイミングでなければ `None`。
    pub fn format_results(&self, frequency: usize) -> Option<String> {
        let q = self.inner.lock().unwrap();
        if q.completed == 0 || frequency == 0 || q.completed % frequency != 0 {
            return None;
        }
        let mut out = String::from("Tournament update:\n");
        for r in &q.results {
            let [l, d, wn] = r.count;
            let n = l + d + wn;
            if n == 0 {
                continue;
            }
            let score = (wn as f64 + 0.5 * d as f64) / n as f64;
            out.push_str(&format!(
                "{} vs {}: {} - {} - {}  [{:.3}] {}\n",
                q.names[r.ei[0]], q.names[r.ei[1]], wn, l, d, score, n
            ));
        }
        Some(out)
    }

    /// 最終結果の一覧（ペアごとの成績スナップショット）
    pub fn results(&self) -> Vec<PairResult> {
        self.inner.lock().unwrap().results.clone()
    }
}
