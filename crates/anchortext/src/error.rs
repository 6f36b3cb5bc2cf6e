#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Pages are 1-indexed; page 0 does not exist")]
    ZeroPage,

    #[error("Unknown prompt template: {0} (expected one of: {1})")]
    UnknownTemplate(String, String),
}
