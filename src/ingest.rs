//! Ingestion: turns a delimited or columnar file into string rows plus a
//! header. Everything is coerced to strings before it enters the engine;
//! numeric and temporal meaning is reconstructed by the sort and filter
//! predicates when needed.

use crate::{Row, RowpickError, RowpickResult};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// File types the CLI can name. Spreadsheet and pickle inputs are
/// recognised so they can be reported as unsupported instead of being
/// mis-parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileType {
    Csv,
    Tsv,
    Json,
    NDJson,
    Parquet,
    Xlsx,
    Ods,
    Pkl,
    Unknown(String),
    Missing,
}

impl FileType {
    /// Guesses the file type from the path extension.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .as_deref()
        {
            Some("csv") => FileType::Csv,
            Some("tsv") => FileType::Tsv,
            Some("json") => FileType::Json,
            Some("ndjson") => FileType::NDJson,
            Some("parquet") => FileType::Parquet,
            Some("xlsx") => FileType::Xlsx,
            Some("ods") => FileType::Ods,
            Some("pkl") => FileType::Pkl,
            Some(ext) => FileType::Unknown(ext.to_owned()),
            None => FileType::Missing,
        }
    }

    /// Parses the CLI `-t` override.
    pub fn from_cli_name(name: &str) -> Self {
        match name {
            "csv" => FileType::Csv,
            "tsv" => FileType::Tsv,
            "json" => FileType::Json,
            "xlsx" => FileType::Xlsx,
            "ods" => FileType::Ods,
            "pkl" => FileType::Pkl,
            other => FileType::Unknown(other.to_owned()),
        }
    }
}

/// Set values that will be interpreted as missing/empty.
static NULL_VALUES: &[&str] = &["", " "];

/// Loads `path` as `filetype`, returning `(rows, header)`. All cells are
/// strings.
pub fn load(
    path: &Path,
    delimiter: Option<char>,
    filetype: FileType,
) -> RowpickResult<(Vec<Row>, Vec<String>)> {
    if !path.exists() {
        return Err(RowpickError::FileNotFound(path.to_path_buf()));
    }
    tracing::debug!("load: {:?} as {:?}", path, filetype);

    let df = match filetype {
        FileType::Csv => read_csv(path, delimiter)?,
        FileType::Tsv => read_csv(path, Some('\t'))?,
        FileType::Json => read_json(path)?,
        FileType::NDJson => read_ndjson(path)?,
        FileType::Parquet => read_parquet(path)?,
        FileType::Xlsx => return Err(RowpickError::UnsupportedFileType("xlsx".into())),
        FileType::Ods => return Err(RowpickError::UnsupportedFileType("ods".into())),
        FileType::Pkl => return Err(RowpickError::UnsupportedFileType("pkl".into())),
        FileType::Unknown(ext) => return Err(RowpickError::UnsupportedFileType(ext)),
        FileType::Missing => {
            // No extension to go by: try the CSV reader, which also covers
            // other single-character delimiters.
            read_csv(path, delimiter)?
        }
    };

    Ok(df_to_rows(&df))
}

/// Reads a CSV, trying the given delimiter first and then the common ones
/// until a read yields more than one column.
fn read_csv(path: &Path, delimiter: Option<char>) -> RowpickResult<DataFrame> {
    let mut candidates: Vec<u8> = Vec::new();
    if let Some(ch) = delimiter {
        if !ch.is_ascii() {
            return Err(RowpickError::InvalidDelimiter(ch.to_string()));
        }
        candidates.push(ch as u8);
    }
    for &d in &[b',', b';', b'|', b'\t'] {
        if !candidates.contains(&d) {
            candidates.push(d);
        }
    }

    let mut single_column: Option<DataFrame> = None;
    let mut last_err: Option<RowpickError> = None;
    for &separator in &candidates {
        match attempt_read_csv(path, separator) {
            // More than one column means the delimiter actually split.
            Ok(df) if df.width() > 1 => return Ok(df),
            // A single column may simply be single-column data; keep the
            // first such result as a fallback.
            Ok(df) => {
                if single_column.is_none() {
                    single_column = Some(df);
                }
            }
            Err(err) => last_err = Some(err),
        }
    }
    if let Some(df) = single_column {
        return Ok(df);
    }
    Err(last_err
        .unwrap_or_else(|| RowpickError::Other("failed to read CSV with common delimiters".into())))
}

fn attempt_read_csv(path: &Path, separator: u8) -> RowpickResult<DataFrame> {
    let null_values: Vec<PlSmallStr> = NULL_VALUES.iter().map(|&s| s.into()).collect();

    let csv_parse_options = CsvParseOptions::default()
        .with_encoding(CsvEncoding::LossyUtf8) // Handle potentially non-strict UTF8
        .with_missing_is_null(true) // Treat empty fields as nulls
        .with_null_values(Some(NullValues::AllColumns(null_values)))
        .with_separator(separator);

    let df = CsvReadOptions::default()
        .with_parse_options(csv_parse_options)
        .with_has_header(true)
        .with_infer_schema_length(Some(200))
        .with_ignore_errors(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

fn read_json(path: &Path) -> RowpickResult<DataFrame> {
    let file = File::open(path)?;
    Ok(JsonReader::new(file).finish()?)
}

fn read_ndjson(path: &Path) -> RowpickResult<DataFrame> {
    let file = File::open(path)?;
    Ok(JsonReader::new(file)
        .with_json_format(JsonFormat::JsonLines)
        .finish()?)
}

fn read_parquet(path: &Path) -> RowpickResult<DataFrame> {
    let file = File::open(path)?;
    Ok(ParquetReader::new(file).finish()?)
}

/// Flattens a DataFrame into string rows plus the column-name header.
pub fn df_to_rows(df: &DataFrame) -> (Vec<Row>, Vec<String>) {
    let header: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    let columns = df.columns();
    let mut rows: Vec<Row> = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let row = columns
            .iter()
            .map(|column| match column.get(i) {
                Ok(AnyValue::Null) => String::new(),
                Ok(AnyValue::String(s)) => s.to_string(),
                Ok(AnyValue::StringOwned(s)) => s.to_string(),
                Ok(other) => other.to_string(),
                Err(_) => String::new(),
            })
            .collect();
        rows.push(row);
    }
    (rows, header)
}

/// Parses piped stdin text: one row per line, cells split on `delimiter`.
pub fn stdin_to_rows(text: &str, delimiter: Option<char>) -> Vec<Row> {
    let delimiter = delimiter.unwrap_or('\t');
    text.lines()
        .map(|line| line.split(delimiter).map(|cell| cell.to_string()).collect())
        .collect()
}

/// Parses the `--stdin2` framing: a leading line count N, then N lines.
pub fn stdin2_to_rows(text: &str, delimiter: Option<char>) -> Vec<Row> {
    let mut lines = text.lines();
    let count: usize = lines
        .next()
        .and_then(|line| line.trim().parse().ok())
        .unwrap_or(0);
    let body: Vec<&str> = lines.take(count).collect();
    stdin_to_rows(&body.join("\n"), delimiter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).expect("create");
        file.write_all(contents.as_bytes()).expect("write");
        path
    }

    #[test]
    fn filetype_guessing() {
        assert_eq!(FileType::from_path(Path::new("a.csv")), FileType::Csv);
        assert_eq!(FileType::from_path(Path::new("a.TSV")), FileType::Tsv);
        assert_eq!(FileType::from_path(Path::new("a.parquet")), FileType::Parquet);
        assert_eq!(
            FileType::from_path(Path::new("a.weird")),
            FileType::Unknown("weird".into())
        );
        assert_eq!(FileType::from_path(Path::new("noext")), FileType::Missing);
        assert_eq!(FileType::from_cli_name("pkl"), FileType::Pkl);
    }

    #[test]
    fn loads_csv_with_header() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(&dir, "people.csv", "name,age\nAlice,30\nBob,25\n");

        let (rows, header) = load(&path, None, FileType::Csv).expect("load");
        assert_eq!(header, vec!["name", "age"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["Alice", "30"]);
    }

    #[test]
    fn loads_tsv() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(&dir, "data.tsv", "a\tb\n1\t2\n");

        let (rows, header) = load(&path, None, FileType::Tsv).expect("load");
        assert_eq!(header, vec!["a", "b"]);
        assert_eq!(rows, vec![vec!["1", "2"]]);
    }

    #[test]
    fn null_cells_become_empty_strings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(&dir, "gaps.csv", "x,y\n1,\n,2\n");

        let (rows, _) = load(&path, None, FileType::Csv).expect("load");
        assert_eq!(rows[0], vec!["1", ""]);
        assert_eq!(rows[1], vec!["", "2"]);
    }

    #[test]
    fn unsupported_types_are_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(&dir, "book.xlsx", "not really a workbook");

        let err = load(&path, None, FileType::Xlsx).expect_err("should fail");
        assert!(matches!(err, RowpickError::UnsupportedFileType(_)));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load(Path::new("/no/such/file.csv"), None, FileType::Csv)
            .expect_err("should fail");
        assert!(matches!(err, RowpickError::FileNotFound(_)));
    }

    #[test]
    fn stdin_rows_split_on_delimiter() {
        let rows = stdin_to_rows("a\tb\nc\td", None);
        assert_eq!(rows, vec![vec!["a", "b"], vec!["c", "d"]]);
        let rows = stdin_to_rows("a,b", Some(','));
        assert_eq!(rows, vec![vec!["a", "b"]]);
    }

    #[test]
    fn stdin2_reads_a_count_then_n_lines() {
        let rows = stdin2_to_rows("2\nfirst\nsecond\nthird\n", None);
        assert_eq!(rows, vec![vec!["first"], vec!["second"]]);
        assert!(stdin2_to_rows("garbage\nx\n", None).is_empty());
    }
}
