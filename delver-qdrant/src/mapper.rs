use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use delver_core::ChunkHit;

pub const TEXT_PAYLOAD_KEY: &str = "text";
pub const SOURCE_PAYLOAD_KEY: &str = "source";
pub const CHUNK_INDEX_PAYLOAD_KEY: &str = "chunk_index";
pub const PAGE_PAYLOAD_KEY: &str = "page";

#[derive(Debug, Clone, Serialize)]
pub struct SearchPointsRequest {
    pub vector: Vec<f32>,
    pub limit: usize,
    pub with_payload: bool,
}

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub result: T,
}

#[derive(Debug, Deserialize)]
pub struct ScoredPoint {
    pub score: f32,
    #[serde(default)]
    pub payload: JsonMap<String, JsonValue>,
}

/// Maps a scored point's payload onto a [`ChunkHit`]. Points without a text
/// payload carry nothing citable and map to `None`.
pub fn scored_point_to_chunk(collection: &str, point: ScoredPoint) -> Option<ChunkHit> {
    let text = point
        .payload
        .get(TEXT_PAYLOAD_KEY)
        .and_then(JsonValue::as_str)?
        .to_string();
    let source = point
        .payload
        .get(SOURCE_PAYLOAD_KEY)
        .and_then(JsonValue::as_str)
        .unwrap_or(collection)
        .to_string();
    let chunk_index = point
        .payload
        .get(CHUNK_INDEX_PAYLOAD_KEY)
        .and_then(JsonValue::as_u64)
        .unwrap_or(0) as usize;
    let page = point
        .payload
        .get(PAGE_PAYLOAD_KEY)
        .and_then(JsonValue::as_u64)
        .map(|page| page as u32);

    Some(ChunkHit {
        text,
        source,
        chunk_index,
        page,
        score: point.score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(payload: JsonValue) -> ScoredPoint {
        ScoredPoint {
            score: 0.9,
            payload: payload.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn maps_full_payload() {
        let hit = scored_point_to_chunk(
            "tariffs",
            point(json!({
                "text": "duty rates",
                "source": "hts.pdf",
                "chunk_index": 4,
                "page": 12
            })),
        )
        .unwrap();
        assert_eq!(hit.source, "hts.pdf");
        assert_eq!(hit.chunk_index, 4);
        assert_eq!(hit.page, Some(12));
    }

    #[test]
    fn missing_text_yields_none() {
        assert!(scored_point_to_chunk("c", point(json!({"source": "x"}))).is_none());
    }

    #[test]
    fn source_falls_back_to_collection() {
        let hit = scored_point_to_chunk("tariffs", point(json!({"text": "t"}))).unwrap();
        assert_eq!(hit.source, "tariffs");
        assert_eq!(hit.chunk_index, 0);
        assert_eq!(hit.page, None);
    }
}
