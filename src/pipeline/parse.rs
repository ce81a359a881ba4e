// src/pipeline/parse.rs

//! Delimited text → header + rows.
//!
//! The format is the spreadsheet CSV export: one record per line, `,`
//! between fields, `"` for quoting and `""` for a literal quote. Parsing
//! never fails; malformed quoting yields best-effort fields.

/// A parsed sheet: the header line and every non-blank data line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parse a whole CSV document.
///
/// Lines are trimmed (dropping `\r`) and blank lines are skipped. The first
/// non-blank line is the header.
pub fn parse_table(text: &str) -> Table {
    let mut lines = text.split('\n').map(str::trim).filter(|l| !l.is_empty());

    let header = lines.next().map(parse_line).unwrap_or_default();
    let rows: Vec<Vec<String>> = lines.map(parse_line).collect();

    log::debug!("Parsed {} row(s), {} header column(s)", rows.len(), header.len());
    Table { header, rows }
}

/// Split one line into fields.
pub fn parse_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_comma_and_escaped_quote() {
        assert_eq!(
            parse_line(r#"Ms. Smith,"Doe, John","He said ""hi""",,x"#),
            vec!["Ms. Smith", "Doe, John", r#"He said "hi""#, "", "x"]
        );
    }

    #[test]
    fn test_row_count_skips_blank_lines() {
        let text = "Teacher,Student\r\nA,one\r\n\r\n   \nB,two\nC,three\n";
        let table = parse_table(text);

        assert_eq!(table.header, vec!["Teacher", "Student"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[2], vec!["C", "three"]);
    }

    #[test]
    fn test_empty_input() {
        let table = parse_table("");
        assert!(table.header.is_empty());
        assert!(table.is_empty());

        let header_only = parse_table("a,b,c\n");
        assert_eq!(header_only.header.len(), 3);
        assert!(header_only.is_empty());
    }

    #[test]
    fn test_unterminated_quote_is_best_effort() {
        assert_eq!(parse_line(r#"a,"b,c"#), vec!["a", "b,c"]);
    }

    #[test]
    fn test_activity_list_survives_quoting() {
        let line = r#"T,S,Preply,B1,"https://x.com/a.html, https://x.com/b.html",Acme"#;
        let fields = parse_line(line);
        assert_eq!(fields.len(), 6);
        assert_eq!(fields[4], "https://x.com/a.html, https://x.com/b.html");
    }
}
