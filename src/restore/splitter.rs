// sqlbackup/src/restore/splitter.rs
//! Turns a dump into the statements the restore executes.
//!
//! The default [`SplitMode::Naive`] splitter works line by line: it skips
//! blank lines and lines starting with `--`, and ends a statement at any line
//! whose trimmed text ends with `;`. It has no notion of quoting, block
//! comments or `DELIMITER`, so a string literal that contains a newline right
//! after a `;` is cut in two. Dumps written by this crate never put a literal
//! across lines. [`SplitMode::QuoteAware`] lifts that limitation for foreign
//! dumps.
use serde::Deserialize;

pub const LINE_COMMENT: &str = "--";
pub const TERMINATOR: char = ';';
pub const BYTE_ORDER_MARK: char = '\u{feff}';

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    #[default]
    Naive,
    QuoteAware,
}

/// Statements in source order plus whatever followed the last terminator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    pub statements: Vec<String>,
    pub trailing: Option<String>,
}

pub fn split_statements(sql: &str, mode: SplitMode) -> Split {
    let sql = strip_byte_order_mark(sql);
    match mode {
        SplitMode::Naive => split_naive(sql),
        SplitMode::QuoteAware => split_quote_aware(sql),
    }
}

/// Text editors on Windows like to start dumps with a BOM.
pub fn strip_byte_order_mark(sql: &str) -> &str {
    sql.strip_prefix(BYTE_ORDER_MARK).unwrap_or(sql)
}

fn split_naive(sql: &str) -> Split {
    let mut statements = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(LINE_COMMENT) {
            continue;
        }
        pending.push(line);
        if trimmed.ends_with(TERMINATOR) {
            statements.push(pending.join("\n"));
            pending.clear();
        }
    }

    let trailing = (!pending.is_empty()).then(|| pending.join("\n"));
    Split {
        statements,
        trailing,
    }
}

fn split_quote_aware(sql: &str) -> Split {
    // Every delimiter is ASCII, so byte offsets found here are always char
    // boundaries of `sql`.
    let bytes = sql.as_bytes();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut copied_from = 0;
    let mut has_code = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                has_code = true;
                i = skip_quoted(bytes, i, quote);
            }
            b'#' => {
                current.push_str(&sql[copied_from..i]);
                i = end_of_line(bytes, i);
                copied_from = i;
            }
            b'-' if starts_line_comment(bytes, i) => {
                current.push_str(&sql[copied_from..i]);
                i = end_of_line(bytes, i);
                copied_from = i;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                // /*! ... */ is executed by MySQL; plain block comments are not.
                if bytes.get(i + 2) == Some(&b'!') {
                    has_code = true;
                }
                i = end_of_block_comment(bytes, i);
            }
            b';' => {
                current.push_str(&sql[copied_from..=i]);
                if has_code {
                    statements.push(current.trim().to_string());
                }
                current.clear();
                has_code = false;
                i += 1;
                copied_from = i;
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                has_code = true;
                i += 1;
            }
        }
    }

    current.push_str(&sql[copied_from..]);
    let trailing = has_code.then(|| current.trim().to_string());
    Split {
        statements,
        trailing,
    }
}

/// Index just past the closing quote, honoring backslash and doubled-quote
/// escapes. Unterminated quotes run to the end of input.
fn skip_quoted(bytes: &[u8], open: usize, quote: u8) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        if bytes[i] == b'\\' && quote != b'`' {
            i += 2;
            continue;
        }
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// MySQL only treats `--` as a comment when whitespace or end of input follows.
fn starts_line_comment(bytes: &[u8], i: usize) -> bool {
    bytes.get(i + 1) == Some(&b'-')
        && bytes.get(i + 2).is_none_or(|b| b.is_ascii_whitespace())
}

fn end_of_line(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |offset| from + offset)
}

fn end_of_block_comment(bytes: &[u8], open: usize) -> usize {
    let body = open + 2;
    if body >= bytes.len() {
        return bytes.len();
    }
    bytes[body..]
        .windows(2)
        .position(|w| w == b"*/")
        .map_or(bytes.len(), |offset| body + offset + 2)
}
