//! The SongPlays fact table
//!
//! A play matches a catalog pair when its song equals the song title, its
//! length equals the song duration exactly, and its artist equals the name
//! of the song's artist. Matching is exact: 210.5 and 210.6 are different
//! lengths and no normalization is applied to any string.

use crate::calendar::to_datetime;
use crate::config::JoinPolicy;
use crate::error::{PipelineError, Result};
use crate::events::{Play, PlayPartition};
use crate::quality::DataQuality;
use crate::tables::{Artist, Song, SongPlay};
use chrono::Datelike;
use std::collections::{BTreeSet, HashMap, HashSet};

const ROW_BITS: u32 = 33;
const PARTITION_LIMIT: usize = 1 << 30;
const ROW_LIMIT: usize = 1 << ROW_BITS;

/// Id of the `row`-th songplay produced from source partition `partition`.
/// Ids from different partitions never collide, so partitions can be
/// numbered independently.
pub fn songplay_id(partition: usize, row: usize) -> Result<i64> {
    if partition >= PARTITION_LIMIT || row >= ROW_LIMIT {
        return Err(PipelineError::IdSpaceExhausted { partition, row });
    }
    Ok(((partition as i64) << ROW_BITS) | row as i64)
}

fn duration_key(value: f64) -> Option<u64> {
    if value.is_nan() {
        None
    } else if value == 0.0 {
        // +0.0 and -0.0 compare equal
        Some(0.0f64.to_bits())
    } else {
        Some(value.to_bits())
    }
}

/// Catalog lookups used by the join.
pub struct CatalogIndex<'a> {
    songs: HashMap<(&'a str, u64), Vec<&'a Song>>,
    artists: HashSet<(&'a str, &'a str)>,
}

impl<'a> CatalogIndex<'a> {
    #[must_use]
    pub fn new(songs: &'a [Song], artists: &'a [Artist]) -> Self {
        let mut by_title: HashMap<(&'a str, u64), Vec<&'a Song>> = HashMap::new();
        for song in songs {
            if let Some(key) = duration_key(song.duration) {
                by_title
                    .entry((song.title.as_str(), key))
                    .or_default()
                    .push(song);
            }
        }
        let artists = artists
            .iter()
            .map(|a| (a.artist_id.as_str(), a.name.as_str()))
            .collect();
        CatalogIndex {
            songs: by_title,
            artists,
        }
    }

    /// Distinct (song_id, artist_id) pairs matching a play, in order.
    #[must_use]
    pub fn candidates(&self, play: &Play) -> BTreeSet<(&'a str, &'a str)> {
        let event = &play.event;
        let (Some(title), Some(length), Some(artist)) =
            (event.song.as_deref(), event.length, event.artist.as_deref())
        else {
            return BTreeSet::new();
        };
        let Some(key) = duration_key(length) else {
            return BTreeSet::new();
        };

        self.songs
            .get(&(title, key))
            .into_iter()
            .flatten()
            .copied()
            .filter_map(|song: &'a Song| {
                let artist_id = song.artist_id.as_deref()?;
                self.artists
                    .contains(&(artist_id, artist))
                    .then_some((song.song_id.as_str(), artist_id))
            })
            .collect()
    }
}

/// Join plays against the catalog and assign ids.
pub fn build_songplays(
    partitions: &[PlayPartition],
    catalog: &CatalogIndex<'_>,
    policy: JoinPolicy,
    quality: &mut DataQuality,
) -> Result<Vec<SongPlay>> {
    let mut rows = Vec::new();
    for partition in partitions {
        let mut row = 0usize;
        for play in &partition.plays {
            let candidates = catalog.candidates(play);
            let matched = candidates.first().copied();
            if candidates.len() > 1 {
                quality.ambiguous_matches += 1;
            }
            if matched.is_none() {
                quality.unmatched_plays += 1;
                if policy == JoinPolicy::Inner {
                    continue;
                }
            }

            let at = to_datetime(play.start_time)?;
            let event = &play.event;
            rows.push(SongPlay {
                songplay_id: songplay_id(partition.index, row)?,
                start_time: play.start_time,
                user_id: event.user_id,
                level: event.level.clone(),
                song_id: matched.map(|(song_id, _)| song_id.to_string()),
                artist_id: matched.map(|(_, artist_id)| artist_id.to_string()),
                session_id: event.session_id,
                location: event.location.clone(),
                user_agent: event.user_agent.clone(),
                year: at.year(),
                month: at.month() as i32,
            });
            row += 1;
        }
    }
    Ok(rows)
}
