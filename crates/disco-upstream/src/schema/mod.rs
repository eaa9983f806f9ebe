// SPDX-License-Identifier: GPL-3.0-or-later

//! Wire formats of the supported upstreams.

pub mod musicbrainz;
pub mod spotify;

use crate::normalize::SkipReason;
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Schema family a client decodes, fixed when the client is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamSchema {
    /// Spotify Web API, bearer token required.
    Spotify,
    /// MusicBrainz web service with Cover Art Archive artwork, anonymous.
    MusicBrainz,
}

impl UpstreamSchema {
    pub fn requires_bearer_auth(self) -> bool {
        matches!(self, Self::Spotify)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spotify => "spotify",
            Self::MusicBrainz => "musicbrainz",
        }
    }
}

/// Field deserializer that reads `null` as the type's default, like an absent field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode one record of a list on its own.
pub fn decode_record<T: DeserializeOwned>(record: Value) -> Result<T, SkipReason> {
    serde_json::from_value(record).map_err(|error| {
        debug!(target: "normalize", error = %error, "malformed record");
        SkipReason::Malformed
    })
}

/// Decode every record of a list; a malformed entry never sinks its neighbours.
pub fn decode_records<T: DeserializeOwned>(records: Vec<Value>) -> Vec<Result<T, SkipReason>> {
    records.into_iter().map(decode_record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, Default, PartialEq)]
    struct Sample {
        id: Option<String>,
        #[serde(default, deserialize_with = "null_as_default")]
        tags: Vec<String>,
    }

    #[test]
    fn test_null_list_reads_as_empty() {
        let sample: Sample = serde_json::from_str(r#"{"id":"a","tags":null}"#).unwrap();
        assert_eq!(sample.tags, Vec::<String>::new());

        let sample: Sample = serde_json::from_str(r#"{"id":"a"}"#).unwrap();
        assert!(sample.tags.is_empty());
    }

    #[test]
    fn test_bad_records_are_skipped_individually() {
        let records = vec![
            serde_json::json!({ "id": "good" }),
            Value::Null,
            serde_json::json!({ "id": 42 }),
            serde_json::json!({ "id": "also-good", "tags": ["x"] }),
        ];

        let decoded: Vec<Result<Sample, SkipReason>> = decode_records(records);

        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded[0].as_ref().unwrap().id.as_deref(), Some("good"));
        assert_eq!(decoded[1], Err(SkipReason::Malformed));
        assert_eq!(decoded[2], Err(SkipReason::Malformed));
        assert_eq!(decoded[3].as_ref().unwrap().tags, vec!["x".to_string()]);
    }
}
