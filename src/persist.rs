//! Persistence: engine-state snapshots, tabular data export, and the
//! input-history file.
//!
//! The snapshot is a named-field binary object (msgpack written in
//! struct-map mode) so restores tolerate unknown fields and default the
//! missing ones; function-valued state (refresh callback, option
//! callbacks) is never part of it. Tabular exports go through the polars
//! writers.

use crate::{
    Row, RowpickResult,
    highlight::Highlight,
    sort::SortMethod,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Everything the engine can restore from disk. Every field defaults so a
/// snapshot written by an older or newer build still installs cleanly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub items: Vec<Row>,
    #[serde(default)]
    pub header: Vec<String>,
    #[serde(default)]
    pub cursor: usize,
    #[serde(default)]
    pub filter_query: String,
    #[serde(default)]
    pub search_query: String,
    #[serde(default)]
    pub user_opts: String,
    #[serde(default)]
    pub user_settings: String,
    #[serde(default)]
    pub selected_column: usize,
    #[serde(default)]
    pub sort_column: usize,
    #[serde(default)]
    pub sort_method: Vec<SortMethod>,
    #[serde(default)]
    pub sort_reverse: Vec<bool>,
    #[serde(default)]
    pub editable_columns: Vec<bool>,
    #[serde(default)]
    pub hidden_columns: HashSet<usize>,
    #[serde(default)]
    pub column_order: Vec<usize>,
    #[serde(default)]
    pub row_selected: HashMap<usize, bool>,
    #[serde(default)]
    pub cell_selected: HashMap<(usize, usize), bool>,
    #[serde(default)]
    pub unselectable: HashSet<usize>,
    #[serde(default)]
    pub highlights: Vec<Highlight>,
    #[serde(default)]
    pub highlights_hide: bool,
    #[serde(default)]
    pub modes: Vec<crate::picker::Mode>,
    #[serde(default)]
    pub mode_index: usize,
    #[serde(default)]
    pub theme_number: usize,
    #[serde(default)]
    pub footer_style: usize,
    #[serde(default)]
    pub footer_string: String,
    #[serde(default = "default_true")]
    pub show_header: bool,
    #[serde(default)]
    pub show_row_header: bool,
    #[serde(default = "default_true")]
    pub show_footer: bool,
    #[serde(default)]
    pub display_modes: bool,
    #[serde(default)]
    pub centre_in_terminal: bool,
    #[serde(default)]
    pub centre_in_cols: bool,
    #[serde(default)]
    pub centre_in_terminal_vertical: bool,
    #[serde(default)]
    pub cell_cursor: bool,
    #[serde(default)]
    pub highlight_full_row: bool,
    #[serde(default)]
    pub paginate: bool,
    #[serde(default = "default_true")]
    pub scroll_bar: bool,
    #[serde(default = "default_true")]
    pub number_columns: bool,
    #[serde(default)]
    pub auto_refresh: bool,
    #[serde(default = "default_max_column_width")]
    pub max_column_width: usize,
    #[serde(default)]
    pub leftmost_char: usize,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub history_filter_and_search: Vec<String>,
    #[serde(default)]
    pub history_pipes: Vec<String>,
    #[serde(default)]
    pub history_opts: Vec<String>,
    #[serde(default)]
    pub history_edits: Vec<String>,
    #[serde(default)]
    pub history_settings: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_max_column_width() -> usize {
    70
}

/// Writes a snapshot as a named-field msgpack object.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> RowpickResult<()> {
    let mut file = File::create(path)?;
    let mut serializer = rmp_serde::Serializer::new(&mut file).with_struct_map();
    snapshot.serialize(&mut serializer)?;
    Ok(())
}

/// Reads a snapshot. Unknown fields are ignored, missing fields keep their
/// defaults.
pub fn load_snapshot(path: &Path) -> RowpickResult<Snapshot> {
    let file = File::open(path)?;
    Ok(rmp_serde::from_read(file)?)
}

/// Command-history layout stored in the user config directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Histories {
    #[serde(default)]
    pub history_filter_and_search: Vec<String>,
    #[serde(default)]
    pub history_pipes: Vec<String>,
    #[serde(default)]
    pub history_opts: Vec<String>,
    #[serde(default)]
    pub history_edits: Vec<String>,
    #[serde(default)]
    pub history_settings: Vec<String>,
}

/// `~/.config/rowpick/input_history.json` (platform equivalent).
pub fn default_history_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rowpick").join("input_history.json"))
}

pub fn save_history(path: &Path, histories: &Histories) -> RowpickResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    serde_json::to_writer(file, histories)?;
    Ok(())
}

pub fn load_history(path: &Path) -> RowpickResult<Histories> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}

/// Data export targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Tsv,
    Json,
    Feather,
    Parquet,
    Msgpack,
}

impl ExportFormat {
    pub fn label(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
            ExportFormat::Json => "json",
            ExportFormat::Feather => "feather",
            ExportFormat::Parquet => "parquet",
            ExportFormat::Msgpack => "msgpack",
        }
    }
}

/// Column names for the writers: header cells where present, generated
/// names elsewhere, deduplicated because polars requires unique names.
fn column_names(header: &[String], arity: usize) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    (0..arity)
        .map(|c| {
            let base = match header.get(c) {
                Some(name) if !name.trim().is_empty() => name.trim().to_string(),
                _ => format!("column_{c}"),
            };
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            if *count > 1 {
                format!("{base}_{count}")
            } else {
                base
            }
        })
        .collect()
}

fn to_dataframe(rows: &[Row], header: &[String]) -> RowpickResult<DataFrame> {
    let arity = rows.iter().map(Vec::len).max().unwrap_or(header.len());
    let names = column_names(header, arity);
    let columns: Vec<Column> = names
        .iter()
        .enumerate()
        .map(|(c, name)| {
            let values: Vec<&str> = rows
                .iter()
                .map(|row| row.get(c).map(String::as_str).unwrap_or(""))
                .collect();
            Column::new(name.as_str().into(), values)
        })
        .collect();
    Ok(DataFrame::new(rows.len(), columns)?)
}

/// Writes the 2-D table to `path` in the chosen format. The caller has
/// already restricted the rows (selected-only) and columns (hidden) as
/// requested.
pub fn export_rows(
    path: &Path,
    format: ExportFormat,
    rows: &[Row],
    header: &[String],
) -> RowpickResult<()> {
    tracing::debug!(
        "export_rows: {} rows to {:?} as {}",
        rows.len(),
        path,
        format.label()
    );
    match format {
        ExportFormat::Csv => write_separated(path, rows, header, b','),
        ExportFormat::Tsv => write_separated(path, rows, header, b'\t'),
        ExportFormat::Json => {
            let mut df = to_dataframe(rows, header)?;
            let mut file = File::create(path)?;
            JsonWriter::new(&mut file)
                .with_json_format(JsonFormat::Json)
                .finish(&mut df)?;
            Ok(())
        }
        ExportFormat::Feather => {
            let mut df = to_dataframe(rows, header)?;
            let file = File::create(path)?;
            IpcWriter::new(file).finish(&mut df)?;
            Ok(())
        }
        ExportFormat::Parquet => {
            let mut df = to_dataframe(rows, header)?;
            let file = File::create(path)?;
            ParquetWriter::new(file).finish(&mut df)?;
            Ok(())
        }
        ExportFormat::Msgpack => {
            let mut file = File::create(path)?;
            let table = (header.to_vec(), rows.to_vec());
            let encoded = rmp_serde::to_vec(&table)?;
            file.write_all(&encoded)?;
            Ok(())
        }
    }
}

fn write_separated(path: &Path, rows: &[Row], header: &[String], separator: u8) -> RowpickResult<()> {
    let mut df = to_dataframe(rows, header)?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .with_separator(separator)
        .include_header(!header.is_empty())
        .finish(&mut df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::HighlightField;

    #[test]
    fn snapshot_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.rps");

        let snapshot = Snapshot {
            items: vec![vec!["a".into(), "b".into()]],
            header: vec!["x".into(), "y".into()],
            cursor: 0,
            filter_query: "--0 a".into(),
            theme_number: 2,
            highlights: vec![Highlight {
                pattern: "a".into(),
                field: HighlightField::Col(0),
                color: 10,
                kind: Default::default(),
                row: None,
                level: 0,
            }],
            ..Default::default()
        };
        save_snapshot(&path, &snapshot).expect("save");
        let restored = load_snapshot(&path).expect("load");

        assert_eq!(restored.items, snapshot.items);
        assert_eq!(restored.filter_query, "--0 a");
        assert_eq!(restored.theme_number, 2);
        assert_eq!(restored.highlights.len(), 1);
        // Missing fields keep their defaults.
        assert!(restored.show_header);
        assert_eq!(restored.max_column_width, 70);
    }

    #[test]
    fn snapshot_ignores_unknown_fields() {
        #[derive(Serialize)]
        struct Future {
            items: Vec<Vec<String>>,
            some_future_field: String,
            another: u64,
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("future.rps");

        let future = Future {
            items: vec![vec!["kept".into()]],
            some_future_field: "ignored".into(),
            another: 7,
        };
        let mut file = File::create(&path).expect("create");
        let mut serializer = rmp_serde::Serializer::new(&mut file).with_struct_map();
        future.serialize(&mut serializer).expect("serialize");

        let restored = load_snapshot(&path).expect("load");
        assert_eq!(restored.items, vec![vec!["kept".to_string()]]);
        assert!(restored.show_footer);
    }

    #[test]
    fn history_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("input_history.json");

        let histories = Histories {
            history_filter_and_search: vec!["Alice".into()],
            history_settings: vec!["ct".into()],
            ..Default::default()
        };
        save_history(&path, &histories).expect("save");
        let restored = load_history(&path).expect("load");
        assert_eq!(restored.history_filter_and_search, vec!["Alice"]);
        assert_eq!(restored.history_settings, vec!["ct"]);

        // The on-disk layout is a JSON object with the five history keys.
        let raw = std::fs::read_to_string(&path).expect("read");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert!(value.get("history_filter_and_search").is_some());
        assert!(value.get("history_pipes").is_some());
    }

    #[test]
    fn csv_and_tsv_exports() {
        let dir = tempfile::tempdir().expect("tempdir");
        let rows = vec![
            vec!["Alice".to_string(), "30".to_string()],
            vec!["Bob".to_string(), "25".to_string()],
        ];
        let header = vec!["name".to_string(), "age".to_string()];

        let csv_path = dir.path().join("out.csv");
        export_rows(&csv_path, ExportFormat::Csv, &rows, &header).expect("csv");
        let text = std::fs::read_to_string(&csv_path).expect("read");
        assert!(text.starts_with("name,age"));
        assert!(text.contains("Alice,30"));

        let tsv_path = dir.path().join("out.tsv");
        export_rows(&tsv_path, ExportFormat::Tsv, &rows, &header).expect("tsv");
        let text = std::fs::read_to_string(&tsv_path).expect("read");
        assert!(text.contains("Alice\t30"));
    }

    #[test]
    fn json_export_is_an_array_of_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let rows = vec![vec!["Alice".to_string(), "30".to_string()]];
        let header = vec!["name".to_string(), "age".to_string()];

        let path = dir.path().join("out.json");
        export_rows(&path, ExportFormat::Json, &rows, &header).expect("json");
        let text = std::fs::read_to_string(&path).expect("read");
        let value: serde_json::Value = serde_json::from_str(&text).expect("parse");
        assert_eq!(value[0]["name"], "Alice");
    }

    #[test]
    fn msgpack_export_roundtrips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let rows = vec![vec!["x".to_string()]];
        let header = vec!["h".to_string()];

        let path = dir.path().join("out.msgpack");
        export_rows(&path, ExportFormat::Msgpack, &rows, &header).expect("msgpack");
        let bytes = std::fs::read(&path).expect("read");
        let (decoded_header, decoded_rows): (Vec<String>, Vec<Row>) =
            rmp_serde::from_slice(&bytes).expect("decode");
        assert_eq!(decoded_header, header);
        assert_eq!(decoded_rows, rows);
    }

    #[test]
    fn generated_column_names_are_unique() {
        let names = column_names(&["a".into(), "".into(), "a".into()], 4);
        assert_eq!(names[0], "a");
        assert_eq!(names[1], "column_1");
        assert_eq!(names[2], "a_2");
        assert_eq!(names[3], "column_3");
    }
}
