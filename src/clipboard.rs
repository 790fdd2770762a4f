//! External-integration ports: clipboard, shell pipe, and file picker.
//!
//! The engine only sees the narrow traits; the real implementations live
//! behind them so headless tests can substitute in-memory fakes.

use crate::{Row, RowpickError, RowpickResult};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Clipboard port: `copy(text)` and `paste() -> text`.
pub trait Clipboard {
    fn copy(&mut self, text: &str) -> RowpickResult<()>;
    fn paste(&mut self) -> RowpickResult<String>;
}

/// System clipboard backed by arboard. The handle is created lazily so a
/// missing display server only fails the first clipboard operation, not
/// startup.
#[derive(Default)]
pub struct SystemClipboard {
    handle: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    fn handle(&mut self) -> RowpickResult<&mut arboard::Clipboard> {
        if self.handle.is_none() {
            let clipboard =
                arboard::Clipboard::new().map_err(|e| RowpickError::Clipboard(e.to_string()))?;
            self.handle = Some(clipboard);
        }
        self.handle
            .as_mut()
            .ok_or_else(|| RowpickError::Clipboard("clipboard unavailable".into()))
    }
}

impl Clipboard for SystemClipboard {
    fn copy(&mut self, text: &str) -> RowpickResult<()> {
        self.handle()?
            .set_text(text.to_string())
            .map_err(|e| RowpickError::Clipboard(e.to_string()))
    }

    fn paste(&mut self) -> RowpickResult<String> {
        self.handle()?
            .get_text()
            .map_err(|e| RowpickError::Clipboard(e.to_string()))
    }
}

/// In-memory clipboard for tests and displays without a clipboard.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    pub contents: String,
}

impl Clipboard for MemoryClipboard {
    fn copy(&mut self, text: &str) -> RowpickResult<()> {
        self.contents = text.to_string();
        Ok(())
    }

    fn paste(&mut self) -> RowpickResult<String> {
        Ok(self.contents.clone())
    }
}

/// File/dir picker port. May shell out to an external picker.
pub trait FilePicker {
    fn pick_file(&mut self) -> Option<PathBuf>;
    fn pick_dir(&mut self) -> Option<PathBuf>;
}

/// Runs an external chooser (yazi by default) and reads the picked path
/// from a temp file.
#[derive(Debug)]
pub struct ExternalFilePicker {
    pub program: String,
}

impl Default for ExternalFilePicker {
    fn default() -> Self {
        ExternalFilePicker {
            program: "yazi".to_string(),
        }
    }
}

impl ExternalFilePicker {
    fn run(&self, flag: &str) -> Option<PathBuf> {
        let tmp = tempdir_file()?;
        let status = Command::new(&self.program)
            .arg(format!("{flag}={}", tmp.display()))
            .status()
            .ok()?;
        if !status.success() {
            return None;
        }
        let contents = std::fs::read_to_string(&tmp).ok()?;
        let _ = std::fs::remove_file(&tmp);
        let line = contents.lines().next()?.trim();
        if line.is_empty() {
            None
        } else {
            Some(PathBuf::from(line))
        }
    }
}

fn tempdir_file() -> Option<PathBuf> {
    let dir = std::env::temp_dir();
    let name = format!("rowpick-pick-{}", std::process::id());
    Some(dir.join(name))
}

impl FilePicker for ExternalFilePicker {
    fn pick_file(&mut self) -> Option<PathBuf> {
        self.run("--chooser-file")
    }

    fn pick_dir(&mut self) -> Option<PathBuf> {
        self.run("--cwd-file")
    }
}

/// A picker that never picks, for headless runs and tests.
#[derive(Debug, Default)]
pub struct NoFilePicker;

impl FilePicker for NoFilePicker {
    fn pick_file(&mut self) -> Option<PathBuf> {
        None
    }

    fn pick_dir(&mut self) -> Option<PathBuf> {
        None
    }
}

/// Spawns `argv` with the given lines written to its stdin; stdout and
/// stderr are discarded. Returns the number of lines piped.
pub fn spawn_with_stdin(argv: &[String], lines: &[String]) -> RowpickResult<usize> {
    let Some((program, args)) = argv.split_first() else {
        return Err(RowpickError::Other("empty command".into()));
    };
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    if let Some(stdin) = child.stdin.as_mut() {
        for line in lines {
            stdin.write_all(line.as_bytes())?;
            stdin.write_all(b"\n")?;
        }
    }
    drop(child.stdin.take());
    child.wait()?;
    Ok(lines.len())
}

/// Joins rows into clipboard text with the given cell separator, keeping
/// only the listed columns.
pub fn rows_to_text(rows: &[&Row], columns: &[usize], separator: &str) -> String {
    rows.iter()
        .map(|row| {
            columns
                .iter()
                .map(|&c| row.get(c).map(String::as_str).unwrap_or(""))
                .collect::<Vec<_>>()
                .join(separator)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parses clipboard text back into rows (inverse of [`rows_to_text`]).
pub fn text_to_rows(text: &str, separator: char) -> Vec<Row> {
    text.lines()
        .map(|line| line.split(separator).map(str::to_string).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_clipboard_roundtrip() {
        let mut clipboard = MemoryClipboard::default();
        clipboard.copy("hello").expect("copy");
        assert_eq!(clipboard.paste().expect("paste"), "hello");
    }

    #[test]
    fn rows_to_text_respects_columns() {
        let rows = vec![
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec!["d".to_string(), "e".to_string(), "f".to_string()],
        ];
        let refs: Vec<&Row> = rows.iter().collect();
        assert_eq!(rows_to_text(&refs, &[0, 2], "\t"), "a\tc\nd\tf");
        assert_eq!(rows_to_text(&refs, &[1], ","), "b\ne");
    }

    #[test]
    fn text_to_rows_roundtrips() {
        let rows = text_to_rows("a\tb\nc\td", '\t');
        assert_eq!(rows, vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn spawn_pipes_lines() {
        let piped = spawn_with_stdin(
            &["cat".to_string()],
            &["one".to_string(), "two".to_string()],
        )
        .expect("spawn");
        assert_eq!(piped, 2);
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(spawn_with_stdin(&[], &[]).is_err());
    }
}
