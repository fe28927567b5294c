//! 開局ソース
//!
//! 開局ファイル（1行1開局、`#` 始まりと空行は無視）を読み込み、
//! 読み込み時に全行を盤へ適用して検証する。対局はインデックスで
//! 開局を引き、行数を超えたら折り返す。

use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};

use rgomoku_core::{OpeningType, Position};

pub struct Openings {
    lines: Vec<String>,
}

impl Openings {
    /// ファイルなしの場合は空盤のみを出す
    pub fn empty() -> Openings {
        Openings {
            lines: vec![String::new()],
        }
    }

    pub fn load(path: &Path, kind: OpeningType, board_size: u8) -> Result<Openings> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let reader = BufReader::new(file);
        let mut lines = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut probe = Position::new(board_size);
            probe.apply_opening(trimmed, kind).with_context(|| {
                format!("invalid opening on line {} of {}: {trimmed}", idx + 1, path.display())
            })?;
            lines.push(trimmed.to_string());
        }
        if lines.is_empty() {
            bail!("no usable openings found in {}", path.display());
        }
        Ok(Openings { lines })
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// `idx` 番目の開局（折り返しあり）
    pub fn get(&self, idx: usize) -> &str {
        &self.lines[idx % self.lines.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_source_serves_blank_opening() {
        let op = Openings::empty();
        assert_eq!(op.len(), 1);
        assert_eq!(op.get(0), "");
        assert_eq!(op.get(7), "");
    }

    #[test]
    fn load_skips_comments_and_wraps() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "# sample openings").unwrap();
        writeln!(f, "h8").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "h8i9j10").unwrap();
        f.flush().unwrap();

        let op = Openings::load(f.path(), OpeningType::Pos, 15).unwrap();
        assert_eq!(op.len(), 2);
        assert_eq!(op.get(0), "h8");
        assert_eq!(op.get(1), "h8i9j10");
        assert_eq!(op.get(2), "h8");
    }

    #[test]
    fn load_rejects_invalid_line() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "h8").unwrap();
        writeln!(f, "h8h8").unwrap();
        f.flush().unwrap();
        assert!(Openings::load(f.path(), OpeningType::Pos, 15).is_err());
    }

    #[test]
    fn load_rejects_empty_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "# only comments").unwrap();
        f.flush().unwrap();
        assert!(Openings::load(f.path(), OpeningType::Pos, 15).is_err());
    }
}
