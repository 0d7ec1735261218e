use std::fmt;

/// Selects the input column that carries the email address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailColumn {
    /// Matched against the header, ignoring ASCII case and surrounding spaces.
    Name(String),
    /// 0-based column position.
    Index(usize),
}

impl EmailColumn {
    /// Numeric values select a position, anything else a header name.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        match value.parse::<usize>() {
            Ok(index) => EmailColumn::Index(index),
            Err(_) => EmailColumn::Name(value.to_string()),
        }
    }
}

impl Default for EmailColumn {
    fn default() -> Self {
        EmailColumn::Name("Email".to_string())
    }
}

impl fmt::Display for EmailColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmailColumn::Name(name) => write!(f, "{:?}", name),
            EmailColumn::Index(index) => write!(f, "#{}", index),
        }
    }
}

/// Input header plus the position of the email column within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    headers: Vec<String>,
    email_index: usize,
}

impl Schema {
    /// Returns `None` when the header has no column matching `column`.
    pub fn new(headers: Vec<String>, column: &EmailColumn) -> Option<Self> {
        let email_index = match column {
            EmailColumn::Name(name) => headers
                .iter()
                .position(|header| header.trim().eq_ignore_ascii_case(name.trim()))?,
            EmailColumn::Index(index) if *index < headers.len() => *index,
            EmailColumn::Index(_) => return None,
        };

        Some(Self {
            headers,
            email_index,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn email_index(&self) -> usize {
        self.email_index
    }
}

/// One data record of the input table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Position among data rows, starting at 0. Output order follows it.
    pub index: u64,
    /// Source line of the record, starting at 1 for the header.
    pub line: u64,
    pub fields: Vec<String>,
    /// Set when the record could not be read faithfully.
    pub fault: Option<String>,
}

impl Row {
    pub fn new(index: u64, line: u64, fields: Vec<String>) -> Self {
        Self {
            index,
            line,
            fields,
            fault: None,
        }
    }

    pub fn faulted(index: u64, line: u64, fields: Vec<String>, reason: impl Into<String>) -> Self {
        Self {
            index,
            line,
            fields,
            fault: Some(reason.into()),
        }
    }

    pub fn field(&self, position: usize) -> Option<&str> {
        self.fields.get(position).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<String> {
        vec!["Name".to_string(), " email ".to_string(), "Company".to_string()]
    }

    #[test]
    fn test_email_column_parse() {
        assert_eq!(EmailColumn::parse("1"), EmailColumn::Index(1));
        assert_eq!(EmailColumn::parse(" 0 "), EmailColumn::Index(0));
        assert_eq!(
            EmailColumn::parse("Email"),
            EmailColumn::Name("Email".to_string())
        );
    }

    #[test]
    fn test_schema_matches_header_case_insensitively() {
        let schema = Schema::new(headers(), &EmailColumn::default()).unwrap();
        assert_eq!(schema.email_index(), 1);
    }

    #[test]
    fn test_schema_by_index() {
        let schema = Schema::new(headers(), &EmailColumn::Index(2)).unwrap();
        assert_eq!(schema.email_index(), 2);
        assert!(Schema::new(headers(), &EmailColumn::Index(3)).is_none());
    }

    #[test]
    fn test_schema_missing_column() {
        let column = EmailColumn::Name("Mail".to_string());
        assert!(Schema::new(headers(), &column).is_none());
    }

    #[test]
    fn test_row_field_by_schema_position() {
        let schema = Schema::new(headers(), &EmailColumn::default()).unwrap();
        let row = Row::new(
            0,
            2,
            vec!["John".to_string(), "john@example.com".to_string()],
        );

        assert_eq!(row.field(schema.email_index()), Some("john@example.com"));
        assert_eq!(row.field(0), Some("John"));
        // Ragged row: the column exists in the header but not in the record
        assert_eq!(row.field(2), None);
        assert_eq!(schema.headers().len(), 3);
    }
}
