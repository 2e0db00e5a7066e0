use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("failed to read the chains info file")]
    Read,
    #[error("invalid chains info file")]
    Parse,
    #[error("failed to serialize the chains info")]
    Serialize,
    #[error("failed to write the chains info file")]
    Write,
    #[error("unsupported deployment method {0}")]
    UnsupportedMethod(String),
}
