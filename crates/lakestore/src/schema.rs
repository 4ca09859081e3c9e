//! Arrow schemas for row types

use arrow_schema::{FieldRef, Schema, SchemaRef};
use std::sync::Arc;

/// Row types that know their Arrow layout.
///
/// The field list drives both serialization through `serde_arrow` and the
/// typing of Hive partition columns recovered from object paths, so field
/// names must match the serde names of the row type.
pub trait ForArrow {
    /// Define the Arrow fields for this type, in column order
    fn for_arrow() -> Vec<FieldRef>;

    #[must_use]
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(Self::for_arrow()))
    }
}
