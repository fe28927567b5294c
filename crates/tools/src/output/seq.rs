//! 共有出力ファイルへの書き込み
//!
//! - `SeqWriter`: 対局は完了順がばらけるため、棋譜ブロックを
//!   対局番号順に並べ直してから書く。先行して完了した分は
//!   バッファに保持し、連続した先頭から順に吐き出す。
//! - `SampleSink`: サンプル列のバイト出力。LZ4 フレーム圧縮を
//!   選べる。圧縮時はフレームを閉じるため `close` が必須。

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use lz4_flex::frame::FrameEncoder;

pub struct SeqWriter {
    out: BufWriter<File>,
    next_idx: usize,
    pending: Vec<(usize, String)>,
}

impl SeqWriter {
    pub fn create(path: &Path) -> Result<SeqWriter> {
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        Ok(SeqWriter {
            out: BufWriter::new(file),
            next_idx: 0,
            pending: Vec::new(),
        })
    }

    /// `idx` 番の対局のブロックを登録し、書ける分まで書き出す
    pub fn push(&mut self, idx: usize, block: String) -> Result<()> {
        self.pending.push((idx, block));
        loop {
            let Some(at) = self.pending.iter().position(|(i, _)| *i == self.next_idx) else {
                break;
            };
            let (_, block) = self.pending.swap_remove(at);
            self.out.write_all(block.as_bytes())?;
            self.next_idx += 1;
        }
        self.out.flush()?;
        Ok(())
    }

    /// まだ書けていないブロック数（順序の穴の分）
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// 残りを番号順で強制的に書き切る（停止時の後始末）
    pub fn drain(&mut self) -> Result<()> {
        self.pending.sort_by_key(|(i, _)| *i);
        for (_, block) in self.pending.drain(..) {
            self.out.write_all(block.as_bytes())?;
        }
        self.out.flush()?;
        Ok(())
    }
}

pub enum SampleSink {
    Plain(BufWriter<File>),
    Lz4(Box<FrameEncoder<BufWriter<File>>>),
}

impl SampleSink {
    pub fn create(path: &Path, compress: bool) -> Result<SampleSink> {
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        let buf = BufWriter::new(file);
        Ok(if compress {
            SampleSink::Lz4(Box::new(FrameEncoder::new(buf)))
        } else {
            SampleSink::Plain(buf)
        })
    }

    /// ストリームを完結させる。LZ4 はここでフレーム終端が書かれる。
    pub fn close(self) -> Result<()> {
        match self {
            SampleSink::Plain(mut w) => w.flush()?,
            SampleSink::Lz4(enc) => {
                let mut inner = enc.finish()?;
                inner.flush()?;
            }
        }
        Ok(())
    }
}

impl Write for SampleSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            SampleSink::Plain(w) => w.write(buf),
            SampleSink::Lz4(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            SampleSink::Plain(w) => w.flush(),
            SampleSink::Lz4(w) => w.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn seq_writer_orders_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games.pgn");
        let mut w = SeqWriter::create(&path).unwrap();

        w.push(2, "two\n".to_string()).unwrap();
        w.push(1, "one\n".to_string()).unwrap();
        assert_eq!(w.pending_len(), 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        w.push(0, "zero\n".to_string()).unwrap();
        assert_eq!(w.pending_len(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "zero\none\ntwo\n");

        w.push(3, "three\n".to_string()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "zero\none\ntwo\nthree\n");
    }

    #[test]
    fn seq_writer_drain_writes_remainder_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games.pgn");
        let mut w = SeqWriter::create(&path).unwrap();
        w.push(5, "five\n".to_string()).unwrap();
        w.push(3, "three\n".to_string()).unwrap();
        w.drain().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "three\nfive\n");
    }

    #[test]
    fn sample_sink_plain_writes_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.bin");
        let mut sink = SampleSink::create(&path, false).unwrap();
        sink.write_all(&[1, 2, 3, 4]).unwrap();
        sink.close().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn sample_sink_lz4_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.bin.lz4");
        let payload: Vec<u8> = (0..200u8).cycle().take(4096).collect();

        let mut sink = SampleSink::create(&path, true).unwrap();
        sink.write_all(&payload).unwrap();
        sink.close().unwrap();

        let file = File::open(&path).unwrap();
        let mut dec = lz4_flex::frame::FrameDecoder::new(file);
        let mut back = Vec::new();
        dec.read_to_end(&mut back).unwrap();
        assert_eq!(back, payload);
    }
}
