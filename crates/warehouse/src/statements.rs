//! Warehouse DDL and DML
//!
//! The final tables mirror the lake outputs. Users and artists carry no
//! primary key because a user can appear once per level and an artist once
//! per distinct metadata row. Event times are floored to whole seconds
//! (`ts / 1000` in integer arithmetic).

use crate::config::WarehouseConfig;
use starschema::JoinPolicy;

/// One named SQL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub name: &'static str,
    pub sql: String,
}

impl Statement {
    fn new(name: &'static str, sql: impl Into<String>) -> Self {
        Statement {
            name,
            sql: sql.into(),
        }
    }
}

const TABLES: [&str; 7] = [
    "staging_events",
    "staging_songs",
    "songplays",
    "users",
    "songs",
    "artists",
    "time",
];

const STAGING_EVENTS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS staging_events (
    artist        VARCHAR,
    auth          VARCHAR,
    firstName     VARCHAR,
    gender        VARCHAR,
    itemInSession INT,
    lastName      VARCHAR,
    length        FLOAT,
    level         VARCHAR,
    location      VARCHAR,
    method        VARCHAR,
    page          VARCHAR,
    registration  FLOAT,
    sessionId     INT,
    song          VARCHAR,
    status        INT,
    ts            BIGINT,
    userAgent     VARCHAR,
    userId        INT
);";

const STAGING_SONGS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS staging_songs (
    artist_id        VARCHAR,
    artist_latitude  FLOAT,
    artist_location  VARCHAR,
    artist_longitude FLOAT,
    artist_name      VARCHAR,
    duration         FLOAT,
    num_songs        INT,
    song_id          VARCHAR,
    title            VARCHAR,
    year             INT
);";

const SONGPLAYS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS songplays (
    songplay_id  BIGINT IDENTITY(0,1) PRIMARY KEY,
    start_time   TIMESTAMP NOT NULL,
    user_id      INT,
    level        VARCHAR,
    song_id      VARCHAR,
    artist_id    VARCHAR,
    session_id   INT,
    location     VARCHAR,
    user_agent   VARCHAR
);";

const USERS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS users (
    user_id     INT NOT NULL,
    first_name  VARCHAR,
    last_name   VARCHAR,
    gender      VARCHAR,
    level       VARCHAR
);";

const SONGS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS songs (
    song_id    VARCHAR PRIMARY KEY,
    title      VARCHAR NOT NULL,
    artist_id  VARCHAR,
    year       INT,
    duration   FLOAT NOT NULL
);";

const ARTISTS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS artists (
    artist_id  VARCHAR NOT NULL,
    name       VARCHAR NOT NULL,
    location   VARCHAR,
    latitude   FLOAT,
    longitude  FLOAT
);";

const TIME_CREATE: &str = "
CREATE TABLE IF NOT EXISTS time (
    start_time  TIMESTAMP PRIMARY KEY,
    hour        INT,
    day         INT,
    week        INT,
    month       INT,
    year        INT,
    weekday     INT
);";

/// Drop every table, staging included.
#[must_use]
pub fn drop_tables() -> Vec<Statement> {
    TABLES
        .iter()
        .map(|&table| Statement::new(table, format!("DROP TABLE IF EXISTS {};", table)))
        .collect()
}

#[must_use]
pub fn create_tables() -> Vec<Statement> {
    vec![
        Statement::new("staging_events", STAGING_EVENTS_CREATE),
        Statement::new("staging_songs", STAGING_SONGS_CREATE),
        Statement::new("songplays", SONGPLAYS_CREATE),
        Statement::new("users", USERS_CREATE),
        Statement::new("songs", SONGS_CREATE),
        Statement::new("artists", ARTISTS_CREATE),
        Statement::new("time", TIME_CREATE),
    ]
}

/// Bulk loads of the raw JSON into the staging tables.
#[must_use]
pub fn copy_staging(config: &WarehouseConfig) -> Vec<Statement> {
    vec![
        Statement::new(
            "staging_events",
            format!(
                "
COPY staging_events FROM '{}'
CREDENTIALS 'aws_iam_role={}'
JSON '{}'
REGION '{}';",
                config.log_data, config.iam_role_arn, config.log_jsonpath, config.region
            ),
        ),
        Statement::new(
            "staging_songs",
            format!(
                "
COPY staging_songs FROM '{}'
CREDENTIALS 'aws_iam_role={}'
JSON 'auto'
REGION '{}';",
                config.song_data, config.iam_role_arn, config.region
            ),
        ),
    ]
}

/// Insert-selects from staging into the final tables. Songplays resolve
/// against the final songs and artists tables, so those load first; time is
/// derived from songplays last.
#[must_use]
pub fn insert_final(join: JoinPolicy) -> Vec<Statement> {
    vec![
        Statement::new("songs", SONGS_INSERT),
        Statement::new("artists", ARTISTS_INSERT),
        Statement::new("users", USERS_INSERT),
        Statement::new("songplays", songplays_insert(join)),
        Statement::new("time", TIME_INSERT),
    ]
}

// One row per song_id; conflicting rows resolve to the first by
// (title, artist_id, year, duration).
const SONGS_INSERT: &str = "
INSERT INTO songs (song_id, title, artist_id, year, duration)
SELECT song_id, title, artist_id, year, duration
FROM (
    SELECT song_id, title, artist_id, year, duration,
           ROW_NUMBER() OVER (
               PARTITION BY song_id
               ORDER BY title, artist_id, year, duration
           ) AS pick
    FROM staging_songs
    WHERE song_id IS NOT NULL AND title IS NOT NULL AND duration IS NOT NULL
) ranked
WHERE pick = 1;";

const ARTISTS_INSERT: &str = "
INSERT INTO artists (artist_id, name, location, latitude, longitude)
SELECT DISTINCT artist_id, artist_name, artist_location, artist_latitude, artist_longitude
FROM staging_songs
WHERE artist_id IS NOT NULL AND artist_name IS NOT NULL;";

const USERS_INSERT: &str = "
INSERT INTO users (user_id, first_name, last_name, gender, level)
SELECT DISTINCT userId, firstName, lastName, gender, level
FROM staging_events
WHERE page = 'NextSong' AND userId IS NOT NULL;";

fn songplays_insert(join: JoinPolicy) -> String {
    let join = match join {
        JoinPolicy::Left => "LEFT JOIN",
        JoinPolicy::Inner => "JOIN",
    };
    format!(
        "
INSERT INTO songplays (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)
SELECT TIMESTAMP 'epoch' + (e.ts / 1000) * INTERVAL '1 second',
       e.userId,
       e.level,
       m.song_id,
       m.artist_id,
       e.sessionId,
       e.location,
       e.userAgent
FROM staging_events e
{join} (
    SELECT title, duration, artist_name, song_id, artist_id
    FROM (
        SELECT s.title, s.duration, a.name AS artist_name, s.song_id, s.artist_id,
               ROW_NUMBER() OVER (
                   PARTITION BY s.title, s.duration, a.name
                   ORDER BY s.song_id, s.artist_id
               ) AS pick
        FROM songs s
        JOIN (SELECT DISTINCT artist_id, name FROM artists) a
          ON a.artist_id = s.artist_id
    ) pairs
    WHERE pick = 1
) m
  ON m.title = e.song
 AND m.duration = e.length
 AND m.artist_name = e.artist
WHERE e.page = 'NextSong' AND e.ts IS NOT NULL;"
    )
}

const TIME_INSERT: &str = "
INSERT INTO time (start_time, hour, day, week, month, year, weekday)
SELECT DISTINCT start_time,
       EXTRACT(HOUR FROM start_time),
       EXTRACT(DAY FROM start_time),
       EXTRACT(WEEK FROM start_time),
       EXTRACT(MONTH FROM start_time),
       EXTRACT(YEAR FROM start_time),
       EXTRACT(DOW FROM start_time)
FROM songplays;";

/// Statements as one script, each preceded by a comment naming its table.
#[must_use]
pub fn render(statements: &[Statement]) -> String {
    let mut out = String::new();
    for statement in statements {
        out.push_str(&format!("-- {}\n", statement.name));
        out.push_str(statement.sql.trim());
        out.push_str("\n\n");
    }
    out
}

/// Full ordered sequence: drop, create, copy, insert.
#[must_use]
pub fn script(config: &WarehouseConfig) -> Vec<Statement> {
    let mut all = drop_tables();
    all.extend(create_tables());
    all.extend(copy_staging(config));
    all.extend(insert_final(config.join));
    all
}
