#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    #[error("Invalid warehouse configuration: {0}")]
    Config(String),

    #[error("Statement '{statement}' failed: {message}")]
    Execution {
        statement: &'static str,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, WarehouseError>;
