//! Songs and Artists from catalog records

use crate::quality::DataQuality;
use crate::records::CatalogRecord;
use crate::tables::{Artist, Song};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, btree_map::Entry};

/// Project songs, dropping records without an id, title or duration.
/// Identical rows collapse to one. When a song id carries different rows,
/// the row that sorts first by (title, artist_id, year, duration) wins.
pub fn extract_songs<'a>(
    records: impl IntoIterator<Item = &'a CatalogRecord>,
    quality: &mut DataQuality,
) -> Vec<Song> {
    let mut by_id: BTreeMap<String, Song> = BTreeMap::new();
    let mut conflicted: BTreeSet<String> = BTreeSet::new();

    for record in records {
        let (Some(song_id), Some(title), Some(duration)) =
            (&record.song_id, &record.title, record.duration)
        else {
            quality.rejected_songs += 1;
            continue;
        };
        let song = Song {
            song_id: song_id.clone(),
            title: title.clone(),
            artist_id: record.artist_id.clone(),
            year: record.year,
            duration,
        };

        match by_id.entry(song.song_id.clone()) {
            Entry::Vacant(slot) => {
                let _ = slot.insert(song);
            }
            Entry::Occupied(mut slot) => {
                match song_order(&song, slot.get()) {
                    Ordering::Equal => {}
                    Ordering::Less => {
                        let _ = conflicted.insert(song.song_id.clone());
                        let _ = slot.insert(song);
                    }
                    Ordering::Greater => {
                        let _ = conflicted.insert(song.song_id.clone());
                    }
                }
            }
        }
    }

    quality.conflicting_song_ids += conflicted.len();
    by_id.into_values().collect()
}

fn song_order(a: &Song, b: &Song) -> Ordering {
    a.title
        .cmp(&b.title)
        .then_with(|| a.artist_id.cmp(&b.artist_id))
        .then_with(|| a.year.cmp(&b.year))
        .then_with(|| a.duration.total_cmp(&b.duration))
}

/// Project artists, dropping records without an id or name. Identical rows
/// collapse to one; differing rows for one artist id are all kept.
pub fn extract_artists<'a>(
    records: impl IntoIterator<Item = &'a CatalogRecord>,
    quality: &mut DataQuality,
) -> Vec<Artist> {
    let mut rows: Vec<Artist> = Vec::new();
    for record in records {
        let (Some(artist_id), Some(name)) = (&record.artist_id, &record.artist_name) else {
            quality.rejected_artists += 1;
            continue;
        };
        rows.push(Artist {
            artist_id: artist_id.clone(),
            name: name.clone(),
            location: record.artist_location.clone(),
            latitude: record.artist_latitude,
            longitude: record.artist_longitude,
        });
    }

    rows.sort_by(artist_order);
    rows.dedup_by(|a, b| artist_order(a, b) == Ordering::Equal);

    let conflicted: BTreeSet<&str> = rows
        .windows(2)
        .filter(|pair| pair[0].artist_id == pair[1].artist_id)
        .map(|pair| pair[0].artist_id.as_str())
        .collect();
    quality.conflicting_artist_ids += conflicted.len();

    rows
}

fn artist_order(a: &Artist, b: &Artist) -> Ordering {
    a.artist_id
        .cmp(&b.artist_id)
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.location.cmp(&b.location))
        .then_with(|| opt_f64_order(a.latitude, b.latitude))
        .then_with(|| opt_f64_order(a.longitude, b.longitude))
}

fn opt_f64_order(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.total_cmp(&y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(song_id: &str, title: &str, artist_id: &str, name: &str, duration: f64) -> CatalogRecord {
        CatalogRecord {
            song_id: Some(song_id.into()),
            title: Some(title.into()),
            artist_id: Some(artist_id.into()),
            artist_name: Some(name.into()),
            year: Some(2004),
            duration: Some(duration),
            num_songs: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_songs_are_distinct() {
        let records = vec![
            record("S1", "Intro", "A1", "Band", 120.0),
            record("S1", "Intro", "A1", "Band", 120.0),
            record("S2", "Outro", "A1", "Band", 60.5),
        ];
        let mut quality = DataQuality::default();
        let songs = extract_songs(&records, &mut quality);
        assert_eq!(songs.len(), 2);
        assert_eq!(songs[0].song_id, "S1");
        assert!(quality.is_clean());
    }

    #[test]
    fn test_song_id_conflict_keeps_first_in_order() {
        let records = vec![
            record("S1", "Zebra", "A1", "Band", 120.0),
            record("S1", "Alpha", "A1", "Band", 120.0),
            record("S1", "Alpha", "A1", "Band", 121.0),
        ];
        let mut quality = DataQuality::default();
        let songs = extract_songs(&records, &mut quality);
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "Alpha");
        assert_eq!(songs[0].duration, 120.0);
        assert_eq!(quality.conflicting_song_ids, 1);
    }

    #[test]
    fn test_records_without_required_fields_are_rejected() {
        let mut no_title = record("S1", "x", "A1", "Band", 1.0);
        no_title.title = None;
        let mut no_artist = record("S2", "y", "A2", "Other", 2.0);
        no_artist.artist_id = None;

        let mut quality = DataQuality::default();
        let songs = extract_songs(&[no_title.clone(), no_artist.clone()], &mut quality);
        let artists = extract_artists(&[no_title, no_artist], &mut quality);

        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].artist_id, None);
        assert_eq!(artists.len(), 1);
        assert_eq!(quality.rejected_songs, 1);
        assert_eq!(quality.rejected_artists, 1);
    }

    #[test]
    fn test_artist_conflicts_are_kept_and_counted() {
        let mut moved = record("S2", "b", "A1", "Band", 1.0);
        moved.artist_location = Some("Berlin".into());
        let records = vec![
            record("S1", "a", "A1", "Band", 1.0),
            record("S3", "c", "A1", "Band", 2.0),
            moved,
            record("S4", "d", "A2", "Solo", 1.0),
        ];
        let mut quality = DataQuality::default();
        let artists = extract_artists(&records, &mut quality);
        assert_eq!(artists.len(), 3);
        assert_eq!(quality.conflicting_artist_ids, 1);
    }
}
