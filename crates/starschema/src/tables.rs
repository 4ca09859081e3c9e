//! Output table rows and their Arrow layouts

use arrow_schema::{DataType, Field, FieldRef, TimeUnit};
use lakestore::{ForArrow, TableSpec};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const SONGS: TableSpec = TableSpec {
    name: "songs",
    partition_by: &["year", "artist_id"],
};

pub const ARTISTS: TableSpec = TableSpec {
    name: "artists",
    partition_by: &[],
};

pub const USERS: TableSpec = TableSpec {
    name: "users",
    partition_by: &[],
};

pub const TIME: TableSpec = TableSpec {
    name: "time",
    partition_by: &["year", "month"],
};

pub const SONGPLAYS: TableSpec = TableSpec {
    name: "songplays",
    partition_by: &["year", "month"],
};

/// Every output table, in write order.
pub const ALL_TABLES: [TableSpec; 5] = [SONGS, ARTISTS, USERS, TIME, SONGPLAYS];

/// Column layout of an output table by name.
#[must_use]
pub fn fields_for(table: &str) -> Option<Vec<FieldRef>> {
    match table {
        "songs" => Some(Song::for_arrow()),
        "artists" => Some(Artist::for_arrow()),
        "users" => Some(User::for_arrow()),
        "time" => Some(Time::for_arrow()),
        "songplays" => Some(SongPlay::for_arrow()),
        _ => None,
    }
}

fn utc_millis() -> DataType {
    DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub song_id: String,
    pub title: String,
    pub artist_id: Option<String>,
    pub year: Option<i32>,
    pub duration: f64,
}

impl ForArrow for Song {
    fn for_arrow() -> Vec<FieldRef> {
        vec![
            Arc::new(Field::new("song_id", DataType::Utf8, false)),
            Arc::new(Field::new("title", DataType::Utf8, false)),
            Arc::new(Field::new("artist_id", DataType::Utf8, true)),
            Arc::new(Field::new("year", DataType::Int32, true)),
            Arc::new(Field::new("duration", DataType::Float64, false)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub artist_id: String,
    pub name: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ForArrow for Artist {
    fn for_arrow() -> Vec<FieldRef> {
        vec![
            Arc::new(Field::new("artist_id", DataType::Utf8, false)),
            Arc::new(Field::new("name", DataType::Utf8, false)),
            Arc::new(Field::new("location", DataType::Utf8, true)),
            Arc::new(Field::new("latitude", DataType::Float64, true)),
            Arc::new(Field::new("longitude", DataType::Float64, true)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
}

impl ForArrow for User {
    fn for_arrow() -> Vec<FieldRef> {
        vec![
            Arc::new(Field::new("user_id", DataType::Int64, false)),
            Arc::new(Field::new("first_name", DataType::Utf8, true)),
            Arc::new(Field::new("last_name", DataType::Utf8, true)),
            Arc::new(Field::new("gender", DataType::Utf8, true)),
            Arc::new(Field::new("level", DataType::Utf8, true)),
        ]
    }
}

/// One distinct play instant broken into calendar parts (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Time {
    /// Milliseconds since the Unix epoch
    pub start_time: i64,
    pub hour: i32,
    pub day: i32,
    pub week: i32,
    pub month: i32,
    pub year: i32,
    /// 0 = Sunday through 6 = Saturday
    pub weekday: i32,
}

impl ForArrow for Time {
    fn for_arrow() -> Vec<FieldRef> {
        vec![
            Arc::new(Field::new("start_time", utc_millis(), false)),
            Arc::new(Field::new("hour", DataType::Int32, false)),
            Arc::new(Field::new("day", DataType::Int32, false)),
            Arc::new(Field::new("week", DataType::Int32, false)),
            Arc::new(Field::new("month", DataType::Int32, false)),
            Arc::new(Field::new("year", DataType::Int32, false)),
            Arc::new(Field::new("weekday", DataType::Int32, false)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongPlay {
    pub songplay_id: i64,
    pub start_time: i64,
    pub user_id: Option<i64>,
    pub level: Option<String>,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
    pub year: i32,
    pub month: i32,
}

impl ForArrow for SongPlay {
    fn for_arrow() -> Vec<FieldRef> {
        vec![
            Arc::new(Field::new("songplay_id", DataType::Int64, false)),
            Arc::new(Field::new("start_time", utc_millis(), false)),
            Arc::new(Field::new("user_id", DataType::Int64, true)),
            Arc::new(Field::new("level", DataType::Utf8, true)),
            Arc::new(Field::new("song_id", DataType::Utf8, true)),
            Arc::new(Field::new("artist_id", DataType::Utf8, true)),
            Arc::new(Field::new("session_id", DataType::Int64, true)),
            Arc::new(Field::new("location", DataType::Utf8, true)),
            Arc::new(Field::new("user_agent", DataType::Utf8, true)),
            Arc::new(Field::new("year", DataType::Int32, false)),
            Arc::new(Field::new("month", DataType::Int32, false)),
        ]
    }
}
