//! Common helpers for tests that drive mock Gomocup engines.

#![allow(dead_code)] // not every test file uses every helper

use std::io::Write;
use std::path::Path;

/// How the mock engine behaves when asked to think.
pub enum MockBehavior {
    /// Answer immediately with the next move from its list.
    Normal,
    /// Sleep before answering (seconds, passed to `sleep`).
    Slow(&'static str),
    /// Exit instead of answering.
    CrashOnThink,
}

/// Write a POSIX shell script that speaks just enough of the Gomocup
/// protocol: ABOUT, START -> OK, and a scripted move list played in
/// order on BEGIN / BOARD..DONE / TURN. Returns the engine command.
pub fn write_mock_engine(
    dir: &Path,
    file_name: &str,
    name: &str,
    behavior: MockBehavior,
) -> String {
    let think = match behavior {
        MockBehavior::Normal => "i=$((i+1)); pick \"$i\"".to_string(),
        MockBehavior::Slow(secs) => format!("sleep {secs}; i=$((i+1)); pick \"$i\""),
        MockBehavior::CrashOnThink => "exit 7".to_string(),
    };
    let script = format!(
        r#"#!/bin/sh
moves="$*"
i=0
pick() {{
  j=0
  for m in $moves; do
    j=$((j+1))
    if [ "$j" -eq "$1" ]; then echo "$m"; return; fi
  done
  echo ERROR out of scripted moves
}}
while IFS= read -r line; do
  case "$line" in
    ABOUT*) echo 'name="{name}", version="1.0"' ;;
    START*) echo OK ;;
    BEGIN*|DONE*|TURN*) {think} ;;
    END*) exit 0 ;;
  esac
done
"#
    );
    let path = dir.join(file_name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(script.as_bytes()).unwrap();
    f.flush().unwrap();
    format!("sh {}", path.display())
}

/// Engine command with its scripted moves appended as arguments.
pub fn with_moves(cmd: &str, moves: &[&str]) -> String {
    let mut out = cmd.to_string();
    for m in moves {
        out.push(' ');
        out.push_str(m);
    }
    out
}
