//! Source schema sanity checks
//!
//! A required field that is absent from most records means the input does
//! not have the expected shape at all (wrong prefix, renamed keys), which is
//! fatal. Sporadic gaps are left to the per-record rules of the extractors.

use crate::error::{PipelineError, Result};
use crate::records::{CatalogRecord, EventRecord};

pub type Presence<T> = (&'static str, fn(&T) -> bool);

pub const CATALOG_REQUIRED: &[Presence<CatalogRecord>] = &[
    ("song_id", |r| r.song_id.is_some()),
    ("title", |r| r.title.is_some()),
    ("duration", |r| r.duration.is_some()),
    ("artist_id", |r| r.artist_id.is_some()),
    ("artist_name", |r| r.artist_name.is_some()),
];

/// Checked over every event.
pub const EVENT_REQUIRED: &[Presence<EventRecord>] = &[
    ("page", |r| r.page.is_some()),
    ("ts", |r| r.ts.is_some()),
];

/// Checked over play events only.
pub const PLAY_REQUIRED: &[Presence<EventRecord>] = &[
    ("song", |r| r.song.is_some()),
    ("length", |r| r.length.is_some()),
    ("artist", |r| r.artist.is_some()),
];

/// Fail if any field is missing from more than half of `records`.
pub fn check_required<'a, T: 'a>(
    stage: &'static str,
    records: impl IntoIterator<Item = &'a T>,
    fields: &[Presence<T>],
) -> Result<()> {
    let mut missing = vec![0usize; fields.len()];
    let mut total = 0usize;
    for record in records {
        total += 1;
        for (count, (_, present)) in missing.iter_mut().zip(fields) {
            if !present(record) {
                *count += 1;
            }
        }
    }

    for (&missing, &(field, _)) in missing.iter().zip(fields) {
        if missing * 2 > total {
            return Err(PipelineError::Schema {
                stage,
                field,
                missing,
                total,
            });
        }
    }
    Ok(())
}
