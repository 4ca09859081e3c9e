pub mod pipeline;
pub mod query;
pub mod warehouse;

pub use pipeline::{PipelineStage, format_summary, pipeline_command};
pub use query::{OutputFormat, query_command, register_tables, run_query, write_results};
pub use warehouse::{WarehouseAction, render_action, warehouse_command};
