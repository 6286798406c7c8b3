use thiserror::Error;

/// Fatal problems in the textual dumps.
///
/// The dumps are machine generated, so any of these means the producer is
/// broken and the run is aborted instead of comparing partial data.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// An `FDE` header without the `pc=BEGIN..END` shape.
    #[error("malformed FDE header `{0}`")]
    BadHeader(String),

    /// A data row with fewer tokens than the column header declares.
    #[error("row `{line}` has {found} fields, expected at least {expected}")]
    ShortRow {
        line: String,
        found: usize,
        expected: usize,
    },

    /// The column header does not declare a return-address column.
    #[error("column header `{0}` has no `ra` column")]
    MissingReturnAddress(String),

    /// A value that should have been a number.
    #[error("invalid {what} `{value}`")]
    BadNumber { what: &'static str, value: String },

    /// A symbol table line that could not be decoded.
    #[error("malformed symbol line `{0}`")]
    BadSymbol(String),
}
