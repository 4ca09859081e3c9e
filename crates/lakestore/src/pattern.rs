//! Object selection by glob pattern
//!
//! `song_data/*/*/*/*.json` is split into the literal prefix `song_data`,
//! which bounds the listing, and the glob `*/*/*/*.json`, which is matched
//! against each listed key relative to that prefix.

use crate::error::{Result, StoreError};
use crate::location::Lake;
use futures::TryStreamExt;
use object_store::ObjectMeta;
use object_store::path::Path;
use wax::{CandidatePath, Glob, Pattern};

const GLOB_META: &[char] = &['*', '?', '[', '{', '<'];

#[derive(Debug)]
pub struct ObjectPattern {
    text: String,
    prefix: String,
    glob: Option<Glob<'static>>,
}

impl ObjectPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let text = pattern.trim().trim_start_matches('/').to_string();
        if text.is_empty() {
            return Err(StoreError::Pattern {
                pattern: pattern.to_string(),
                reason: "empty pattern".to_string(),
            });
        }

        if !text.contains(GLOB_META) {
            return Ok(ObjectPattern {
                prefix: text.clone(),
                text,
                glob: None,
            });
        }

        let (prefix, glob) = Glob::new(&text)
            .map_err(|e| StoreError::Pattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?
            .into_owned()
            .partition();

        let prefix = prefix
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/");

        Ok(ObjectPattern {
            text,
            prefix,
            glob: Some(glob),
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The literal leading directories of the pattern.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Match a key given relative to [`Self::prefix`].
    #[must_use]
    pub fn matches_relative(&self, relative: &str) -> bool {
        match &self.glob {
            Some(glob) => glob.is_match(CandidatePath::from(relative)),
            None => relative.is_empty(),
        }
    }

    /// List matching objects, sorted by location.
    pub async fn list(&self, lake: &Lake) -> Result<Vec<ObjectMeta>> {
        let prefix = lake.path(&self.prefix);

        if self.glob.is_none() {
            return match lake.store().head(&prefix).await {
                Ok(meta) => Ok(vec![meta]),
                Err(object_store::Error::NotFound { .. }) => Ok(Vec::new()),
                Err(e) => Err(e.into()),
            };
        }

        let listed: Vec<ObjectMeta> = lake.store().list(Some(&prefix)).try_collect().await?;

        let mut matched: Vec<ObjectMeta> = listed
            .into_iter()
            .filter(|meta| {
                relative_key(&prefix, &meta.location)
                    .is_some_and(|rel| self.matches_relative(&rel))
            })
            .collect();
        matched.sort_by(|a, b| a.location.cmp(&b.location));
        Ok(matched)
    }
}

fn relative_key(prefix: &Path, location: &Path) -> Option<String> {
    let parts = location.prefix_match(prefix)?;
    Some(
        parts
            .map(|p| p.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("/"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::PutPayload;

    #[test]
    fn test_prefix_split() -> Result<()> {
        let p = ObjectPattern::parse("log_data/2018/11/*.json")?;
        assert_eq!(p.prefix(), "log_data/2018/11");
        assert!(p.matches_relative("2018-11-01-events.json"));
        assert!(!p.matches_relative("2018-11-01-events.csv"));
        assert!(!p.matches_relative("nested/2018-11-01-events.json"));
        Ok(())
    }

    #[test]
    fn test_literal_pattern() -> Result<()> {
        let p = ObjectPattern::parse("/song_data/A/A/A/TRAAAAW128F429D538.json")?;
        assert_eq!(p.prefix(), "song_data/A/A/A/TRAAAAW128F429D538.json");
        assert!(p.matches_relative(""));
        Ok(())
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(ObjectPattern::parse("  ").is_err());
    }

    #[tokio::test]
    async fn test_list_sorted_matches() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let lake = Lake::in_memory();
        for key in [
            "song_data/B/A/A/two.json",
            "song_data/A/A/A/one.json",
            "song_data/A/A/readme.txt",
            "other/A/A/A/three.json",
        ] {
            let _ = lake
                .store()
                .put(&lake.path(key), PutPayload::from_static(b"{}"))
                .await?;
        }

        let p = ObjectPattern::parse("song_data/*/*/*/*.json")?;
        let found: Vec<String> = p
            .list(&lake)
            .await?
            .into_iter()
            .map(|m| m.location.to_string())
            .collect();
        assert_eq!(
            found,
            vec!["song_data/A/A/A/one.json", "song_data/B/A/A/two.json"]
        );
        Ok(())
    }
}
