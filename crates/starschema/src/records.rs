//! Source record shapes
//!
//! Catalog objects hold one song per line, event objects one user event per
//! line. Every field is optional: missing keys and JSON nulls both become
//! `None`, and required-field policy is applied later by the extractors.
//! Numeric fields accept either JSON numbers or numeric strings, with the
//! empty string treated as null.

use serde::{Deserialize, Serialize};

/// One song catalog line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    #[serde(default)]
    pub song_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i32")]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub duration: Option<f64>,
    #[serde(default)]
    pub artist_name: Option<String>,
    #[serde(default)]
    pub artist_location: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub artist_latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub artist_longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub num_songs: Option<i64>,
}

/// One user activity event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub item_in_session: Option<i64>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub length: Option<f64>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub registration: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub session_id: Option<i64>,
    #[serde(default)]
    pub song: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub status: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub ts: Option<i64>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub user_id: Option<i64>,
}

mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Int(i64),
        Float(f64),
        Text(String),
    }

    pub fn opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        match Option::<Scalar>::deserialize(d)? {
            None => Ok(None),
            Some(Scalar::Int(v)) => Ok(Some(v)),
            Some(Scalar::Float(v)) if v.is_finite() && v.fract() == 0.0 => Ok(Some(v as i64)),
            Some(Scalar::Float(v)) => Err(D::Error::custom(format!("expected an integer, got {v}"))),
            Some(Scalar::Text(s)) => {
                let s = s.trim();
                if s.is_empty() {
                    Ok(None)
                } else {
                    s.parse::<i64>().map(Some).map_err(D::Error::custom)
                }
            }
        }
    }

    pub fn opt_i32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i32>, D::Error> {
        opt_i64(d)?
            .map(|v| i32::try_from(v).map_err(D::Error::custom))
            .transpose()
    }

    pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        match Option::<Scalar>::deserialize(d)? {
            None => Ok(None),
            Some(Scalar::Int(v)) => Ok(Some(v as f64)),
            Some(Scalar::Float(v)) => Ok(Some(v)),
            Some(Scalar::Text(s)) => {
                let s = s.trim();
                if s.is_empty() {
                    Ok(None)
                } else {
                    s.parse::<f64>().map(Some).map_err(D::Error::custom)
                }
            }
        }
    }
}
