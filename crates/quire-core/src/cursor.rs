//! Opaque keyset pagination cursors.
//!
//! A cursor captures the sort key of the last row on a page: creation time,
//! note id, and for relevance ordering the score. The next page resumes
//! strictly after that key, so rows inserted concurrently never shift earlier
//! pages and no row is returned twice.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Decoded position of the last row on a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageCursor {
    /// `created_at` of the last row, microseconds since the Unix epoch
    #[serde(rename = "c")]
    pub created_at_micros: i64,
    #[serde(rename = "i")]
    pub id: Uuid,
    /// Score of the last row for relevance-ordered pages
    #[serde(rename = "r", default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<f32>,
}

impl PageCursor {
    pub fn new(created_at_micros: i64, id: Uuid) -> Self {
        Self {
            created_at_micros,
            id,
            rank: None,
        }
    }

    pub fn with_rank(mut self, rank: f32) -> Self {
        self.rank = Some(rank);
        self
    }

    /// Encode as URL-safe base64 JSON.
    pub fn encode(&self) -> String {
        // Serializing a struct of plain numbers and a uuid cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode a cursor string produced by [`PageCursor::encode`].
    pub fn decode(raw: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(raw.trim())
            .map_err(|_| Error::Validation("malformed pagination cursor".to_string()))?;
        serde_json::from_slice(&bytes)
            .map_err(|_| Error::Validation("malformed pagination cursor".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_decodes_what_it_encodes() {
        let cursor = PageCursor::new(1_760_000_000_123_456, Uuid::now_v7()).with_rank(3.5);
        let decoded = PageCursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn test_cursor_without_rank_omits_field() {
        let cursor = PageCursor::new(42, Uuid::nil());
        let bytes = URL_SAFE_NO_PAD.decode(cursor.encode()).unwrap();
        let json = String::from_utf8(bytes).unwrap();
        assert!(!json.contains("\"r\""));
    }

    #[test]
    fn test_garbage_cursor_is_validation_error() {
        let err = PageCursor::decode("%%not-base64%%").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let not_json = URL_SAFE_NO_PAD.encode(b"hello");
        let err = PageCursor::decode(&not_json).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
