//! Statement execution seam

use crate::error::Result;
use crate::statements::Statement;
use async_trait::async_trait;

/// Something that runs SQL against a warehouse. A real client wraps a
/// database connection; [`ScriptClient`] only collects the text.
#[async_trait]
pub trait WarehouseClient: Send {
    async fn execute(&mut self, statement: &Statement) -> Result<()>;
}

/// Renders statements into one SQL script instead of running them.
#[derive(Debug, Default)]
pub struct ScriptClient {
    statements: Vec<Statement>,
}

impl ScriptClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    #[must_use]
    pub fn render(&self) -> String {
        crate::statements::render(&self.statements)
    }
}

#[async_trait]
impl WarehouseClient for ScriptClient {
    async fn execute(&mut self, statement: &Statement) -> Result<()> {
        self.statements.push(statement.clone());
        Ok(())
    }
}
