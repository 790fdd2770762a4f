use regex::RegexBuilder;
use std::collections::HashMap;

/// Key used for patterns that apply to any column.
pub const ANY_COLUMN: i64 = -1;

/// A parsed filter query.
///
/// The query language is a whitespace-separated sequence of tokens:
/// - `--i` makes patterns case-sensitive (default is case-insensitive,
///   unless a pattern contains an uppercase character);
/// - `--v` inverts the final match;
/// - `--<N>` scopes the next token to column N (zero-indexed);
/// - any other token is a regex pattern applied to every column.
///
/// A row matches when, for every column key in the parsed map, at least one
/// of the patterns for that key matches the scoped cell (or any cell for the
/// any-column key). `--v` flips that result.
#[derive(Debug, Clone, Default)]
pub struct FilterQuery {
    /// Patterns grouped by column key (`ANY_COLUMN` for unscoped tokens).
    pub groups: HashMap<i64, Vec<String>>,
    /// Whether the final result is inverted (`--v`).
    pub invert: bool,
    /// Whether all patterns are forced case-sensitive (`--i`).
    pub case_sensitive: bool,
}

impl FilterQuery {
    /// Tokenizes a query string into a `FilterQuery`.
    ///
    /// A trailing `--<N>` with no following pattern is dropped silently.
    pub fn parse(query: &str) -> Self {
        let mut parsed = FilterQuery::default();
        let tokens: Vec<&str> = query.split_whitespace().collect();

        let mut i = 0;
        while i < tokens.len() {
            let token = tokens[i];
            match token {
                "--v" => {
                    parsed.invert = true;
                    i += 1;
                }
                "--i" => {
                    parsed.case_sensitive = true;
                    i += 1;
                }
                _ if token.starts_with("--") && token[2..].parse::<i64>().is_ok() => {
                    // Column selector: the next token is its pattern.
                    let col = token[2..].parse::<i64>().unwrap_or(ANY_COLUMN);
                    match tokens.get(i + 1) {
                        Some(pattern) => {
                            parsed
                                .groups
                                .entry(col)
                                .or_default()
                                .push((*pattern).to_string());
                            i += 2;
                        }
                        None => {
                            tracing::debug!("FilterQuery::parse: dangling column selector {token:?}");
                            break;
                        }
                    }
                }
                _ => {
                    parsed
                        .groups
                        .entry(ANY_COLUMN)
                        .or_default()
                        .push(token.to_string());
                    i += 1;
                }
            }
        }
        parsed
    }

    /// Returns true when the query contains no patterns at all.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Checks whether a single pattern matches `text`, honouring the case
    /// rules. An invalid regex matches nothing.
    fn pattern_matches(&self, pattern: &str, text: &str) -> bool {
        // Heuristic: an uppercase character in the pattern makes it
        // case-sensitive even without `--i`.
        let sensitive = self.case_sensitive || pattern != pattern.to_lowercase();
        match RegexBuilder::new(pattern)
            .case_insensitive(!sensitive)
            .build()
        {
            Ok(re) => re.is_match(text),
            Err(err) => {
                tracing::debug!("FilterQuery: invalid pattern {pattern:?}: {err}");
                false
            }
        }
    }

    /// Checks whether `row` matches the query.
    pub fn matches(&self, row: &[String]) -> bool {
        if self.is_empty() {
            return true;
        }

        let mut matched = true;
        'groups: for (&col, patterns) in &self.groups {
            if col == ANY_COLUMN {
                // At least one pattern must match at least one cell.
                let hit = patterns
                    .iter()
                    .any(|p| row.iter().any(|cell| self.pattern_matches(p, cell)));
                if !hit {
                    matched = false;
                    break 'groups;
                }
            } else if col < 0 || col as usize >= row.len() {
                // Out-of-range column selector: the row cannot satisfy it.
                matched = false;
                break 'groups;
            } else {
                let cell = &row[col as usize];
                if !patterns.iter().any(|p| self.pattern_matches(p, cell)) {
                    matched = false;
                    break 'groups;
                }
            }
        }

        if self.invert { !matched } else { matched }
    }
}

/// Filters `rows` with `query`, returning the original indices of the
/// matching rows in input order.
///
/// An empty query returns the full view. Invalid patterns never raise: they
/// simply match nothing.
pub fn filter_rows(rows: &[Vec<String>], query: &str) -> Vec<usize> {
    let parsed = FilterQuery::parse(query);
    rows.iter()
        .enumerate()
        .filter(|(_, row)| parsed.matches(row))
        .map(|(i, _)| i)
        .collect()
}
