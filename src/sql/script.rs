//! Script preprocessing: comment removal and statement splitting.
//!
//! Both passes track single and double quotes (with backslash escapes) so
//! that `--` and `;` inside string literals are left alone.

/// Quote-tracking state shared by both passes
#[derive(Default)]
struct QuoteState {
    quote: Option<char>,
    escaped: bool,
}

impl QuoteState {
    /// Feed one character; returns true if it is inside a string literal
    fn feed(&mut self, ch: char) -> bool {
        match self.quote {
            Some(q) => {
                if self.escaped {
                    self.escaped = false;
                } else if ch == '\\' {
                    self.escaped = true;
                } else if ch == q {
                    self.quote = None;
                }
                true
            }
            None => {
                if ch == '\'' || ch == '"' {
                    self.quote = Some(ch);
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// Remove `--` line comments that are outside string literals
pub fn strip_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut state = QuoteState::default();
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        if state.quote.is_none() && ch == '-' && chars.peek() == Some(&'-') {
            for skipped in chars.by_ref() {
                if skipped == '\n' {
                    out.push('\n');
                    break;
                }
            }
            continue;
        }

        state.feed(ch);
        out.push(ch);
    }

    out
}

/// Split a script on `;` outside string literals. Blank pieces are dropped.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = QuoteState::default();

    for ch in sql.chars() {
        let quoted = state.feed(ch);
        if ch == ';' && !quoted {
            push_statement(&mut statements, &mut current);
        } else {
            current.push(ch);
        }
    }
    push_statement(&mut statements, &mut current);

    statements
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comments() {
        let sql = "SELECT * FROM t -- all rows\nWHERE a = '--not a comment'";
        assert_eq!(
            strip_comments(sql),
            "SELECT * FROM t \nWHERE a = '--not a comment'"
        );
    }

    #[test]
    fn test_split_respects_quotes() {
        let parts = split_statements("INSERT INTO t VALUES ('a;b'); SELECT * FROM t;  ;");
        assert_eq!(
            parts,
            vec!["INSERT INTO t VALUES ('a;b')", "SELECT * FROM t"]
        );
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        let parts = split_statements(r"INSERT INTO t VALUES ('it\'s;ok'); COMMIT");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1], "COMMIT");
    }
}
