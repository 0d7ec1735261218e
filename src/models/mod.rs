/// # Input Rows
///
/// A [`row::Row`] is one data record of the input table: its field values in
/// header order, the 0-based sequence index used to restore input order after
/// concurrent processing, and the 1-based source line for diagnostics.
///
/// [`row::Schema`] pairs the input header with the resolved position of the
/// email column.
pub mod row;

/// # Validation Results
///
/// The classification a worker produces for a row, and the output columns the
/// writer appends to it.
///
/// ## Output columns
/// - `syntax_ok`: `True` / `False`
/// - `mx_ok`: `True` / `False`
/// - `status`: `Valid`, `InvalidSyntax`, `InvalidDomain` or `Error`
/// - `invalid_email_echo`: the raw address when `status` is `InvalidSyntax`
pub mod result;
