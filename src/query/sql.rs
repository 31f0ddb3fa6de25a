//! SQL text helpers: identifier escaping, preview statements, database switches.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Row cap written into data preview statements.
pub const PREVIEW_ROW_LIMIT: u32 = 1000;

static PLAIN_IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("identifier pattern is valid"));

static DB_SWITCH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(use|drop database)\s").expect("switch pattern is valid"));

/// Words that must be quoted even though they look like plain identifiers.
const RESERVED: &[&str] = &[
    "ALL", "ALTER", "AND", "AS", "BY", "CASE", "CREATE", "DATABASE", "DEFAULT", "DELETE", "DESC",
    "DESCRIBE", "DROP", "FROM", "GROUP", "HAVING", "IN", "INDEX", "INSERT", "INTO", "JOIN", "KEY",
    "LIMIT", "NOT", "NULL", "OR", "ORDER", "SELECT", "SET", "TABLE", "UPDATE", "USE", "VALUES",
    "WHERE",
];

/// Which preview slot a preview request fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviewMode {
    /// `SELECT * FROM <target> LIMIT 1000`
    Data,
    /// `DESCRIBE <target>`
    DataDetails,
}

impl PreviewMode {
    /// Builds the preview statement for an already escaped target.
    pub fn sql(&self, escaped_target: &str) -> String {
        match self {
            Self::Data => format!("SELECT * FROM {escaped_target} LIMIT {PREVIEW_ROW_LIMIT}"),
            Self::DataDetails => format!("DESCRIBE {escaped_target}"),
        }
    }

    /// Name shown for the preview in the query log.
    pub fn log_name(&self, escaped_target: &str) -> String {
        match self {
            Self::Data => format!("Preview {escaped_target} data"),
            Self::DataDetails => format!("View {escaped_target} details"),
        }
    }
}

impl fmt::Display for PreviewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data => write!(f, "data"),
            Self::DataDetails => write!(f, "details"),
        }
    }
}

/// Escapes every part of a dotted name like `db.table`.
///
/// Plain, non-reserved identifiers stay bare; anything else is wrapped in
/// backticks with embedded backticks doubled. Parts that are already quoted
/// are kept as they are.
pub fn escape_identifiers(qualified: &str) -> String {
    split_qualified(qualified)
        .iter()
        .map(|part| quote_identifier(part))
        .collect::<Vec<_>>()
        .join(".")
}

fn split_qualified(qualified: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in qualified.chars() {
        match c {
            '`' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '.' if !in_quotes => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

fn quote_identifier(part: &str) -> String {
    let already_quoted = part.len() >= 2 && part.starts_with('`') && part.ends_with('`');
    if already_quoted {
        return part.to_string();
    }
    let reserved = RESERVED.iter().any(|w| w.eq_ignore_ascii_case(part));
    if PLAIN_IDENT.is_match(part) && !reserved {
        part.to_string()
    } else {
        format!("`{}`", part.replace('`', "``"))
    }
}

/// True for statements that change the connection's active database.
pub fn is_db_switch(sql: &str) -> bool {
    DB_SWITCH.is_match(sql)
}
