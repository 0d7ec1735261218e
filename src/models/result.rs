use super::row::Row;
use serde::Serialize;
use std::fmt;

/// Column names appended to the input header in both output tables.
pub const APPENDED_COLUMNS: [&str; 4] = ["syntax_ok", "mx_ok", "status", "invalid_email_echo"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Status {
    Valid,
    InvalidSyntax,
    InvalidDomain,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Valid => "Valid",
            Status::InvalidSyntax => "InvalidSyntax",
            Status::InvalidDomain => "InvalidDomain",
            Status::Error => "Error",
        }
    }

    pub fn destination(&self) -> Destination {
        match self {
            Status::Valid => Destination::Accepted,
            Status::InvalidSyntax | Status::InvalidDomain | Status::Error => Destination::Rejected,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output table a row is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Accepted,
    Rejected,
}

/// Outcome of checking one address, before it is attached to its row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub syntax_ok: bool,
    pub mx_ok: bool,
    pub status: Status,
    pub invalid_email_echo: Option<String>,
    /// Cause of an `Error` status. Logged, never written.
    pub detail: Option<String>,
}

impl Classification {
    pub fn valid() -> Self {
        Self {
            syntax_ok: true,
            mx_ok: true,
            status: Status::Valid,
            invalid_email_echo: None,
            detail: None,
        }
    }

    pub fn invalid_syntax(email: impl Into<String>) -> Self {
        Self {
            syntax_ok: false,
            mx_ok: false,
            status: Status::InvalidSyntax,
            invalid_email_echo: Some(email.into()),
            detail: None,
        }
    }

    pub fn invalid_domain() -> Self {
        Self {
            syntax_ok: true,
            mx_ok: false,
            status: Status::InvalidDomain,
            invalid_email_echo: None,
            detail: None,
        }
    }

    pub fn error(syntax_ok: bool, detail: impl Into<String>) -> Self {
        Self {
            syntax_ok,
            mx_ok: false,
            status: Status::Error,
            invalid_email_echo: None,
            detail: Some(detail.into()),
        }
    }
}

/// A row together with its classification. Consumed once, by the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub row: Row,
    pub syntax_ok: bool,
    pub mx_ok: bool,
    pub status: Status,
    pub invalid_email_echo: Option<String>,
    pub detail: Option<String>,
}

impl ValidationResult {
    pub fn new(row: Row, classification: Classification) -> Self {
        let Classification {
            syntax_ok,
            mx_ok,
            status,
            invalid_email_echo,
            detail,
        } = classification;

        Self {
            row,
            syntax_ok,
            mx_ok,
            status,
            invalid_email_echo,
            detail,
        }
    }

    pub fn index(&self) -> u64 {
        self.row.index
    }

    pub fn destination(&self) -> Destination {
        self.status.destination()
    }

    /// Values for [`APPENDED_COLUMNS`], in order.
    pub fn appended_values(&self) -> [&str; 4] {
        [
            bool_cell(self.syntax_ok),
            bool_cell(self.mx_ok),
            self.status.as_str(),
            self.invalid_email_echo.as_deref().unwrap_or(""),
        ]
    }
}

fn bool_cell(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}
