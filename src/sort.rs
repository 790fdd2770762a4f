//! Sort modes for the indexed view.
//!
//! All cells are strings; each mode derives a comparison key from the cell
//! text. Unparseable keys fall back to a benign value (positive infinity,
//! or the sentinel date) instead of raising. Empty and whitespace-only
//! cells are treated as missing and always sort to the end, regardless of
//! direction.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::LazyLock;

/// The eight ways a column can be ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum SortMethod {
    /// Original row-store order.
    #[default]
    Original = 0,
    /// Case-insensitive string compare.
    Lexical = 1,
    /// Case-sensitive string compare.
    CaseLexical = 2,
    /// Natural sort: digit runs compared as integers, case-insensitive.
    Alphanum = 3,
    /// Natural sort, case-sensitive.
    CaseAlphanum = 4,
    /// Date/time heuristic.
    Temporal = 5,
    /// First number in the cell.
    Numeric = 6,
    /// First `<num><unit>` size in the cell, base 1024.
    Size = 7,
}

impl SortMethod {
    pub const COUNT: u8 = 8;

    /// Short label shown in the footer.
    pub fn label(self) -> &'static str {
        match self {
            SortMethod::Original => "Orig",
            SortMethod::Lexical => "lex",
            SortMethod::CaseLexical => "LEX",
            SortMethod::Alphanum => "alnum",
            SortMethod::CaseAlphanum => "ALNUM",
            SortMethod::Temporal => "time",
            SortMethod::Numeric => "num",
            SortMethod::Size => "size",
        }
    }

    pub fn from_u8(n: u8) -> Self {
        match n % Self::COUNT {
            1 => SortMethod::Lexical,
            2 => SortMethod::CaseLexical,
            3 => SortMethod::Alphanum,
            4 => SortMethod::CaseAlphanum,
            5 => SortMethod::Temporal,
            6 => SortMethod::Numeric,
            7 => SortMethod::Size,
            _ => SortMethod::Original,
        }
    }

    /// Next method in the cycle (wraps).
    pub fn cycle_next(self) -> Self {
        Self::from_u8(self as u8 + 1)
    }

    /// Previous method in the cycle (wraps).
    pub fn cycle_prev(self) -> Self {
        Self::from_u8((self as u8 + Self::COUNT - 1) % Self::COUNT)
    }
}

static NUMERICAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+(\.[0-9]+)?").expect("static regex"));

static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([0-9]+(?:\.[0-9]+)?) ?([KMGTPEZY]B|[KMGTPEZY]|B)").expect("static regex")
});

/// The fixed date unparseable temporal cells sort as.
pub fn sentinel_datetime() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1900, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

/// Extracts the first number in `text`, or +∞ when there is none.
pub fn parse_numerical(text: &str) -> f64 {
    NUMERICAL_RE
        .find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(f64::INFINITY)
}

/// Parses the first `<num>[ ]?<unit>` in `text` as a byte count with
/// 1024-based units (B, KB, MB, ... YB), or +∞ when there is none.
pub fn parse_size(text: &str) -> f64 {
    let Some(caps) = SIZE_RE.captures(text) else {
        return f64::INFINITY;
    };
    let Ok(value) = caps[1].parse::<f64>() else {
        return f64::INFINITY;
    };
    let exponent = match caps[2].to_ascii_uppercase().chars().next() {
        Some('B') => 0,
        Some('K') => 1,
        Some('M') => 2,
        Some('G') => 3,
        Some('T') => 4,
        Some('P') => 5,
        Some('E') => 6,
        Some('Z') => 7,
        Some('Y') => 8,
        _ => return f64::INFINITY,
    };
    value * 1024f64.powi(exponent)
}

/// Parses `text` with the date/time heuristic.
///
/// Tries, in order: ISO `YYYY-MM-DD[ HH:MM[:SS]]`, slash forms `Y/M/D` and
/// `D/M/Y` with two- or four-digit years, abbreviated and full
/// weekday+day+month+year+time, and time-only `HH:MM[:SS]` anchored to the
/// sentinel date. Unparseable inputs return the sentinel.
pub fn parse_temporal(text: &str) -> NaiveDateTime {
    let text = text.trim();

    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
        "%a %d %b %Y %H:%M:%S",
        "%a %d %b %Y %H:%M",
        "%A %d %B %Y %H:%M:%S",
        "%A %d %B %Y %H:%M",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return dt;
        }
    }

    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%d/%m/%Y",
        "%d/%m/%y",
        "%y/%m/%d",
        "%a %d %b %Y",
        "%A %d %B %Y",
    ];
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return dt;
            }
        }
    }

    const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];
    for format in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(text, format) {
            return sentinel_datetime().date().and_time(time);
        }
    }

    sentinel_datetime()
}

/// One chunk of a natural-sort key: a digit run or a text run.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AlnumChunk {
    /// Digit run, leading zeros stripped. Compared by length then digits.
    Num(String),
    /// Non-digit run.
    Text(String),
}

impl Ord for AlnumChunk {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (AlnumChunk::Num(a), AlnumChunk::Num(b)) => {
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            }
            (AlnumChunk::Text(a), AlnumChunk::Text(b)) => a.cmp(b),
            // Numbers sort before text.
            (AlnumChunk::Num(_), AlnumChunk::Text(_)) => Ordering::Less,
            (AlnumChunk::Text(_), AlnumChunk::Num(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for AlnumChunk {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Splits `text` into digit and non-digit runs for natural comparison.
fn alnum_key(text: &str, case_sensitive: bool) -> Vec<AlnumChunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_is_digit = None;

    let push = |chunks: &mut Vec<AlnumChunk>, run: &str, is_digit: bool| {
        if is_digit {
            let stripped = run.trim_start_matches('0');
            // All-zero runs keep a single zero so "0" and "00" compare equal.
            let digits = if stripped.is_empty() { "0" } else { stripped };
            chunks.push(AlnumChunk::Num(digits.to_string()));
        } else if case_sensitive {
            chunks.push(AlnumChunk::Text(run.to_string()));
        } else {
            chunks.push(AlnumChunk::Text(run.to_lowercase()));
        }
    };

    for ch in text.chars() {
        let is_digit = ch.is_ascii_digit();
        if current_is_digit == Some(is_digit) {
            current.push(ch);
        } else {
            if let Some(prev) = current_is_digit {
                push(&mut chunks, &current, prev);
            }
            current = ch.to_string();
            current_is_digit = Some(is_digit);
        }
    }
    if let Some(prev) = current_is_digit {
        push(&mut chunks, &current, prev);
    }
    chunks
}

fn total_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Stable-sorts the indexed view by `column` with the given method.
///
/// Only the view is reordered; the row store is untouched. `reverse`
/// inverts the order but missing cells (empty or whitespace-only) stay at
/// the end either way. Equal keys retain their prior relative order.
pub fn sort_view(
    view: &mut Vec<usize>,
    rows: &[Vec<String>],
    column: usize,
    method: SortMethod,
    reverse: bool,
) {
    let cell = |original: usize| -> &str {
        rows.get(original)
            .and_then(|row| row.get(column))
            .map(String::as_str)
            .unwrap_or("")
    };

    if method == SortMethod::Original {
        // Restore store order; the missing-to-end rule does not apply here,
        // otherwise mode 0 could not restore the original order.
        view.sort_by(|&a, &b| if reverse { b.cmp(&a) } else { a.cmp(&b) });
        return;
    }

    let (mut present, missing): (Vec<usize>, Vec<usize>) = view
        .iter()
        .copied()
        .partition(|&original| !cell(original).trim().is_empty());

    // Reversal happens inside the comparator so that equal keys keep their
    // prior order (reversing the sorted vector afterwards would not).
    let directed = |ord: Ordering| if reverse { ord.reverse() } else { ord };

    match method {
        SortMethod::Original => unreachable!("handled above"),
        SortMethod::Lexical => {
            present.sort_by(|&a, &b| {
                directed(cell(a).to_lowercase().cmp(&cell(b).to_lowercase()))
            });
        }
        SortMethod::CaseLexical => {
            present.sort_by(|&a, &b| directed(cell(a).cmp(cell(b))));
        }
        SortMethod::Alphanum => {
            present.sort_by(|&a, &b| {
                directed(alnum_key(cell(a), false).cmp(&alnum_key(cell(b), false)))
            });
        }
        SortMethod::CaseAlphanum => {
            present.sort_by(|&a, &b| {
                directed(alnum_key(cell(a), true).cmp(&alnum_key(cell(b), true)))
            });
        }
        SortMethod::Temporal => {
            present.sort_by(|&a, &b| {
                directed(parse_temporal(cell(a)).cmp(&parse_temporal(cell(b))))
            });
        }
        SortMethod::Numeric => {
            present.sort_by(|&a, &b| {
                directed(total_f64(parse_numerical(cell(a)), parse_numerical(cell(b))))
            });
        }
        SortMethod::Size => {
            present.sort_by(|&a, &b| {
                directed(total_f64(parse_size(cell(a)), parse_size(cell(b))))
            });
        }
    }

    present.extend(missing);
    *view = present;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows_of(cells: &[&str]) -> Vec<Vec<String>> {
        cells.iter().map(|c| vec![c.to_string()]).collect()
    }

    fn sorted_cells(cells: &[&str], method: SortMethod, reverse: bool) -> Vec<String> {
        let rows = rows_of(cells);
        let mut view: Vec<usize> = (0..rows.len()).collect();
        sort_view(&mut view, &rows, 0, method, reverse);
        view.iter().map(|&i| rows[i][0].clone()).collect()
    }

    #[test]
    fn parse_numerical_examples() {
        assert_eq!(parse_numerical("abc123def"), 123.0);
        assert_eq!(parse_numerical("3.25 MiB"), 3.25);
        assert_eq!(parse_numerical("no digits"), f64::INFINITY);
        assert_eq!(parse_numerical(""), f64::INFINITY);
    }

    #[test]
    fn parse_size_examples() {
        assert_eq!(parse_size("1KB"), 1024.0);
        assert_eq!(parse_size("1.5GB"), 1.5 * 1024f64.powi(3));
        assert_eq!(parse_size("2 MB"), 2.0 * 1024.0 * 1024.0);
        assert_eq!(parse_size("10B"), 10.0);
        assert_eq!(parse_size(""), f64::INFINITY);
        assert_eq!(parse_size("weightless"), f64::INFINITY);
    }

    #[test]
    fn parse_temporal_formats() {
        let sentinel = sentinel_datetime();
        assert_eq!(
            parse_temporal("2023-04-05 06:07:08"),
            NaiveDate::from_ymd_opt(2023, 4, 5)
                .unwrap()
                .and_hms_opt(6, 7, 8)
                .unwrap()
        );
        assert_eq!(
            parse_temporal("2023-04-05"),
            NaiveDate::from_ymd_opt(2023, 4, 5)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert_eq!(
            parse_temporal("05/04/2023"),
            NaiveDate::from_ymd_opt(2023, 4, 5)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        // Time-only anchors to the sentinel date.
        assert_eq!(
            parse_temporal("10:30"),
            sentinel.date().and_hms_opt(10, 30, 0).unwrap()
        );
        assert_eq!(parse_temporal("not a date"), sentinel);
        assert_eq!(parse_temporal(""), sentinel);
    }

    #[test]
    fn size_sort_scenario() {
        let ascending = sorted_cells(
            &["1.5GB", "500MB", "2.1GB", "750MB"],
            SortMethod::Size,
            false,
        );
        assert_eq!(ascending, vec!["500MB", "750MB", "1.5GB", "2.1GB"]);

        let descending = sorted_cells(
            &["1.5GB", "500MB", "2.1GB", "750MB"],
            SortMethod::Size,
            true,
        );
        assert_eq!(descending, vec!["2.1GB", "1.5GB", "750MB", "500MB"]);
    }

    #[test]
    fn lexical_and_case_lexical() {
        assert_eq!(
            sorted_cells(&["banana", "Apple", "cherry"], SortMethod::Lexical, false),
            vec!["Apple", "banana", "cherry"]
        );
        // Case-sensitive: uppercase sorts before lowercase.
        assert_eq!(
            sorted_cells(&["banana", "Apple", "cherry"], SortMethod::CaseLexical, false),
            vec!["Apple", "banana", "cherry"]
        );
        assert_eq!(
            sorted_cells(&["a", "B"], SortMethod::CaseLexical, false),
            vec!["B", "a"]
        );
    }

    #[test]
    fn alphanum_orders_digit_runs_numerically() {
        assert_eq!(
            sorted_cells(
                &["file10", "file2", "file1"],
                SortMethod::Alphanum,
                false
            ),
            vec!["file1", "file2", "file10"]
        );
        // Leading zeros compare by value.
        assert_eq!(
            sorted_cells(&["a002", "a1", "a10"], SortMethod::Alphanum, false),
            vec!["a1", "a002", "a10"]
        );
    }

    #[test]
    fn numeric_sort_with_unparseable_at_end() {
        assert_eq!(
            sorted_cells(&["x9", "x100", "none", "x23"], SortMethod::Numeric, false),
            vec!["x9", "x23", "x100", "none"]
        );
    }

    #[test]
    fn missing_cells_sort_to_end_regardless_of_direction() {
        assert_eq!(
            sorted_cells(&["b", "", "a", "  "], SortMethod::Lexical, false),
            vec!["a", "b", "", "  "]
        );
        assert_eq!(
            sorted_cells(&["b", "", "a", "  "], SortMethod::Lexical, true),
            vec!["b", "a", "", "  "]
        );
    }

    #[test]
    fn original_mode_restores_store_order() {
        let rows = rows_of(&["c", "a", "b"]);
        let mut view = vec![2, 0, 1];
        sort_view(&mut view, &rows, 0, SortMethod::Original, false);
        assert_eq!(view, vec![0, 1, 2]);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let rows: Vec<Vec<String>> = [("a", "1"), ("b", "1"), ("c", "0"), ("d", "1")]
            .iter()
            .map(|(name, key)| vec![name.to_string(), key.to_string()])
            .collect();
        let mut view: Vec<usize> = (0..rows.len()).collect();
        sort_view(&mut view, &rows, 1, SortMethod::Numeric, false);
        // The three "1" rows keep their relative order.
        assert_eq!(view, vec![2, 0, 1, 3]);
    }

    #[test]
    fn double_reverse_round_trips() {
        let cells = ["pear", "apple", "quince", "fig"];
        let once = sorted_cells(&cells, SortMethod::Lexical, false);
        let rows = rows_of(&cells);
        let mut view: Vec<usize> = (0..rows.len()).collect();
        sort_view(&mut view, &rows, 0, SortMethod::Lexical, true);
        sort_view(&mut view, &rows, 0, SortMethod::Lexical, false);
        let twice: Vec<String> = view.iter().map(|&i| rows[i][0].clone()).collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn temporal_sort() {
        assert_eq!(
            sorted_cells(
                &["2024-01-02", "2023-12-31", "garbage", "2024-01-01 08:00"],
                SortMethod::Temporal,
                false
            ),
            // Garbage parses as the sentinel (1900) and sorts first.
            vec!["garbage", "2023-12-31", "2024-01-01 08:00", "2024-01-02"]
        );
    }

    #[test]
    fn method_cycling_wraps() {
        assert_eq!(SortMethod::Original.cycle_next(), SortMethod::Lexical);
        assert_eq!(SortMethod::Size.cycle_next(), SortMethod::Original);
        assert_eq!(SortMethod::Original.cycle_prev(), SortMethod::Size);
        assert_eq!(SortMethod::from_u8(200), SortMethod::Original);
    }
}
