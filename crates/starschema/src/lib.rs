//! Star schema for song play analytics
//!
//! Reads a song catalog and user activity logs from a [`lakestore::Lake`]
//! and writes five tables back as partitioned Parquet:
//!
//! - `songs` partitioned by year and artist_id
//! - `artists`
//! - `users`
//! - `time` partitioned by year and month
//! - `songplays` partitioned by year and month

pub mod calendar;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod quality;
pub mod records;
pub mod schema_check;
pub mod songplays;
pub mod tables;

pub use config::{JoinPolicy, PipelineConfig, TimestampPrecision};
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, RunSummary, run_all, run_catalog, run_events};
pub use quality::DataQuality;
pub use records::{CatalogRecord, EventRecord};
pub use tables::{ALL_TABLES, fields_for, ARTISTS, Artist, SONGPLAYS, SONGS, Song, SongPlay, TIME, Time, USERS, User};
