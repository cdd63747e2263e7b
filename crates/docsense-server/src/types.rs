//! Request and response bodies for the HTTP surface.

use docsense_core::{OutlineEntry, SearchMatch};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct OutlineResponse {
    #[serde(rename = "docId")]
    pub doc_id: String,
    pub title: String,
    pub outline: Vec<OutlineEntry>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub text: String,
    #[serde(default)]
    pub k: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct MatchesResponse {
    pub matches: Vec<SearchMatch>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub ingested: usize,
}

#[derive(Debug, Serialize)]
pub struct ReingestResponse {
    pub message: String,
    pub files_processed: usize,
    pub ingested: usize,
}

#[derive(Debug, Deserialize)]
pub struct DocIdsRequest {
    #[serde(rename = "docIds")]
    pub doc_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MigrateResponse {
    pub message: String,
    pub migrated: usize,
}

#[derive(Debug, Deserialize)]
pub struct InsightsRequest {
    #[serde(default)]
    pub selection: String,
}

#[derive(Debug, Serialize)]
pub struct InsightsResponse {
    pub enabled: bool,
    pub source: String,
    pub insights: Vec<String>,
}
