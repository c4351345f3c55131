use thiserror::Error;

#[derive(Error, Debug)]
pub enum StampError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Document has no pages")]
    NoPages,

    #[error("PDF operation failed: {0}")]
    OperationError(String),
}
