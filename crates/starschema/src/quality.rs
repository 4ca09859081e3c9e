//! Counters for records that were dropped, merged or left unmatched

use diagnostics::*;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataQuality {
    /// Source lines that were not valid JSON records
    pub malformed_lines: usize,
    /// Catalog records lacking song_id, title or duration
    pub rejected_songs: usize,
    /// Song ids that appeared with more than one distinct row
    pub conflicting_song_ids: usize,
    /// Catalog records lacking artist_id or artist_name
    pub rejected_artists: usize,
    /// Artist ids that appeared with more than one distinct row
    pub conflicting_artist_ids: usize,
    /// Events whose page is not a play
    pub non_play_events: usize,
    /// Plays without a user id (kept in songplays, absent from users)
    pub plays_without_user: usize,
    /// Plays without a usable timestamp (dropped)
    pub plays_without_timestamp: usize,
    /// Plays that matched no catalog entry
    pub unmatched_plays: usize,
    /// Plays that matched several (song, artist) pairs
    pub ambiguous_matches: usize,
}

impl DataQuality {
    pub fn merge(&mut self, other: &DataQuality) {
        self.malformed_lines += other.malformed_lines;
        self.rejected_songs += other.rejected_songs;
        self.conflicting_song_ids += other.conflicting_song_ids;
        self.rejected_artists += other.rejected_artists;
        self.conflicting_artist_ids += other.conflicting_artist_ids;
        self.non_play_events += other.non_play_events;
        self.plays_without_user += other.plays_without_user;
        self.plays_without_timestamp += other.plays_without_timestamp;
        self.unmatched_plays += other.unmatched_plays;
        self.ambiguous_matches += other.ambiguous_matches;
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self == &DataQuality::default()
    }

    pub fn log(&self, stage: &str) {
        if self.is_clean() {
            debug!("{stage}: no data quality findings", stage: stage);
            return;
        }
        warn!("{stage}: malformed={malformed} rejected_songs={rejected_songs} song_conflicts={song_conflicts} rejected_artists={rejected_artists} artist_conflicts={artist_conflicts}",
            stage: stage,
            malformed: self.malformed_lines,
            rejected_songs: self.rejected_songs,
            song_conflicts: self.conflicting_song_ids,
            rejected_artists: self.rejected_artists,
            artist_conflicts: self.conflicting_artist_ids);
        warn!("{stage}: non_play={non_play} no_user={no_user} no_ts={no_ts} unmatched={unmatched} ambiguous={ambiguous}",
            stage: stage,
            non_play: self.non_play_events,
            no_user: self.plays_without_user,
            no_ts: self.plays_without_timestamp,
            unmatched: self.unmatched_plays,
            ambiguous: self.ambiguous_matches);
    }
}
