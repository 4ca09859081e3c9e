//! Plays, Users and Time from event records

use crate::calendar::start_time;
use crate::config::TimestampPrecision;
use crate::error::Result;
use crate::quality::DataQuality;
use crate::records::EventRecord;
use crate::tables::{Time, User};
use lakestore::SourcePartition;
use std::collections::BTreeSet;

/// The page value that marks a song play.
pub const PLAY_PAGE: &str = "NextSong";

#[must_use]
pub fn is_play(event: &EventRecord) -> bool {
    event.page.as_deref() == Some(PLAY_PAGE)
}

/// A play event with its derived start time.
#[derive(Debug, Clone, PartialEq)]
pub struct Play {
    pub start_time: i64,
    pub event: EventRecord,
}

/// The plays of one source object. `index` is the object's position in
/// path order and seeds the songplay id range.
#[derive(Debug, Clone)]
pub struct PlayPartition {
    pub index: usize,
    pub location: String,
    pub plays: Vec<Play>,
}

/// Keep play events and derive their start times. Non-play events and
/// plays without a timestamp are counted and dropped.
#[must_use]
pub fn select_plays(
    partition: SourcePartition<EventRecord>,
    precision: TimestampPrecision,
    quality: &mut DataQuality,
) -> PlayPartition {
    let mut plays = Vec::new();
    for event in partition.records {
        if !is_play(&event) {
            quality.non_play_events += 1;
            continue;
        }
        let Some(ts) = event.ts else {
            quality.plays_without_timestamp += 1;
            continue;
        };
        plays.push(Play {
            start_time: start_time(ts, precision),
            event,
        });
    }
    PlayPartition {
        index: partition.index,
        location: partition.location,
        plays,
    }
}

/// Distinct users seen in plays. Plays without a user id contribute no row.
pub fn extract_users<'a>(
    plays: impl IntoIterator<Item = &'a Play>,
    quality: &mut DataQuality,
) -> Vec<User> {
    let mut users = BTreeSet::new();
    for play in plays {
        let event = &play.event;
        let Some(user_id) = event.user_id else {
            quality.plays_without_user += 1;
            continue;
        };
        let _ = users.insert(User {
            user_id,
            first_name: event.first_name.clone(),
            last_name: event.last_name.clone(),
            gender: event.gender.clone(),
            level: event.level.clone(),
        });
    }
    users.into_iter().collect()
}

/// One row per distinct start time.
pub fn extract_time<'a>(plays: impl IntoIterator<Item = &'a Play>) -> Result<Vec<Time>> {
    let instants: BTreeSet<i64> = plays.into_iter().map(|p| p.start_time).collect();
    instants.into_iter().map(Time::from_start_time).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(page: &str, user_id: Option<i64>, level: &str, ts: Option<i64>) -> EventRecord {
        EventRecord {
            page: Some(page.into()),
            user_id,
            first_name: Some("Lily".into()),
            last_name: Some("Koch".into()),
            gender: Some("F".into()),
            level: Some(level.into()),
            ts,
            song: Some("Song".into()),
            artist: Some("Artist".into()),
            length: Some(200.0),
            ..Default::default()
        }
    }

    fn partition(records: Vec<EventRecord>) -> SourcePartition<EventRecord> {
        SourcePartition {
            index: 0,
            location: "log_data/2018/11/2018-11-01-events.json".into(),
            records,
            malformed: 0,
        }
    }

    #[test]
    fn test_only_next_song_events_are_plays() {
        let mut quality = DataQuality::default();
        let plays = select_plays(
            partition(vec![
                event("NextSong", Some(15), "paid", Some(1000)),
                event("Home", Some(15), "paid", Some(2000)),
                event("Logout", Some(15), "paid", Some(3000)),
                event("NextSong", Some(15), "paid", None),
            ]),
            TimestampPrecision::Millisecond,
            &mut quality,
        );
        assert_eq!(plays.plays.len(), 1);
        assert_eq!(plays.plays[0].start_time, 1000);
        assert_eq!(quality.non_play_events, 2);
        assert_eq!(quality.plays_without_timestamp, 1);
    }

    #[test]
    fn test_users_are_distinct_rows() {
        let mut quality = DataQuality::default();
        let part = select_plays(
            partition(vec![
                event("NextSong", Some(15), "free", Some(1000)),
                event("NextSong", Some(15), "free", Some(2000)),
                event("NextSong", Some(15), "paid", Some(3000)),
                event("NextSong", None, "free", Some(4000)),
            ]),
            TimestampPrecision::Millisecond,
            &mut quality,
        );
        let users = extract_users(&part.plays, &mut quality);
        // a level change yields a second row for the same user
        assert_eq!(users.len(), 2);
        assert!(users.iter().all(|u| u.user_id == 15));
        assert_eq!(quality.plays_without_user, 1);
    }

    #[test]
    fn test_time_rows_per_distinct_instant() -> Result<()> {
        let mut quality = DataQuality::default();
        let part = select_plays(
            partition(vec![
                event("NextSong", Some(1), "free", Some(1542241826796)),
                event("NextSong", Some(2), "free", Some(1542241826796)),
                event("NextSong", Some(3), "free", Some(1542241826999)),
            ]),
            TimestampPrecision::Second,
            &mut quality,
        );
        let time = extract_time(&part.plays)?;
        assert_eq!(time.len(), 1);
        assert_eq!(time[0].start_time, 1542241826000);
        Ok(())
    }

    #[test]
    fn test_default_precision_floors_to_seconds() {
        let mut quality = DataQuality::default();
        let part = select_plays(
            partition(vec![event("NextSong", Some(1), "free", Some(1542241826796))]),
            TimestampPrecision::default(),
            &mut quality,
        );
        assert_eq!(part.plays[0].start_time, 1542241826000);
    }

    #[test]
    fn test_time_rows_ignore_play_order() -> Result<()> {
        let instants = [1546300799999, -1, 1542241826796, 0, 1546300800000, 1542241826796];
        let mut quality = DataQuality::default();
        let forward = select_plays(
            partition(
                instants
                    .iter()
                    .map(|ts| event("NextSong", Some(1), "free", Some(*ts)))
                    .collect(),
            ),
            TimestampPrecision::Millisecond,
            &mut quality,
        );
        let mut reversed = forward.plays.clone();
        reversed.reverse();

        let a = extract_time(&forward.plays)?;
        let b = extract_time(&reversed)?;
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
        Ok(())
    }
}
