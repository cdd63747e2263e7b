//! HTTP request handlers.
//!
//! Handlers convert typed core errors into status codes at this boundary;
//! nothing below it sees HTTP. CPU-heavy work (extraction, ingest,
//! reset) runs on the blocking pool so the async workers stay responsive.

use std::path::PathBuf;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Form, Json,
};
use tracing::{info, warn};

use docsense_core::{
    analyze_pdf, extract_outline, DebugReport, HealthReport, Partition, ResetReport,
    StorageStatus, StoredFile,
};

use crate::types::{
    DeletedResponse, DocIdsRequest, HealthResponse, IngestResponse, InsightsRequest,
    InsightsResponse, MatchesResponse, MigrateResponse, OutlineResponse, QueryRequest,
    ReingestResponse,
};
use crate::ApiState;

/// The public query endpoint always serves exactly this many results.
const QUERY_K: usize = 5;

type ApiError = (StatusCode, String);

fn bad_request(msg: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, msg.into())
}

fn not_found(msg: impl Into<String>) -> ApiError {
    (StatusCode::NOT_FOUND, msg.into())
}

fn internal<E: std::fmt::Display>(err: E) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

fn parse_partition(name: &str) -> Result<Partition, ApiError> {
    Partition::parse(name).ok_or_else(|| {
        bad_request(format!(
            "Invalid storage_type '{name}'. Must be one of: bulk, fresh, viewer"
        ))
    })
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Extract the outline of an uploaded file or an already-stored document.
pub async fn outline(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<Json<OutlineResponse>, ApiError> {
    let mut upload: Option<(Vec<u8>, Option<String>)> = None;
    let mut doc_id: Option<String> = None;
    let mut storage_type = "fresh".to_string();

    while let Some(field) = multipart.next_field().await.map_err(|e| bad_request(e.to_string()))? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                let name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| bad_request(e.to_string()))?;
                upload = Some((bytes.to_vec(), name));
            }
            "docId" => doc_id = Some(field.text().await.map_err(|e| bad_request(e.to_string()))?),
            "storage_type" => {
                storage_type = field.text().await.map_err(|e| bad_request(e.to_string()))?;
            }
            _ => {}
        }
    }

    let partition = parse_partition(&storage_type)?;
    let (doc_id, path) = match (upload, doc_id) {
        (Some((bytes, name)), _) => {
            let id = state
                .controller
                .store()
                .put(&bytes, name.as_deref(), partition)
                .map_err(internal)?;
            let path = state.controller.store().get(&id, Some(partition));
            (id, path)
        }
        (None, Some(id)) => {
            let path = state.controller.store().get(&id, None);
            if !path.exists() {
                return Err(not_found("docId not found"));
            }
            (id, path)
        }
        (None, None) => return Err(bad_request("Provide either file or docId")),
    };

    let extraction = tokio::task::spawn_blocking(move || match analyze_pdf(&path) {
        Ok(analysis) => extract_outline(&analysis),
        Err(e) => {
            warn!(error = %e, "outline extraction failed, returning empty outline");
            docsense_core::OutlineExtraction::default()
        }
    })
    .await
    .map_err(internal)?;

    Ok(Json(OutlineResponse {
        doc_id,
        title: extraction.title,
        outline: extraction.entries,
    }))
}

/// Ingest uploaded files and/or stored documents into the semantic index.
pub async fn search_ingest(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, ApiError> {
    let mut uploads: Vec<(Vec<u8>, Option<String>)> = Vec::new();
    let mut doc_ids: Vec<String> = Vec::new();
    let mut storage_type = "fresh".to_string();

    while let Some(field) = multipart.next_field().await.map_err(|e| bad_request(e.to_string()))? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "files" | "file" => {
                let name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| bad_request(e.to_string()))?;
                uploads.push((bytes.to_vec(), name));
            }
            "docIds" | "docId" => {
                doc_ids.push(field.text().await.map_err(|e| bad_request(e.to_string()))?);
            }
            "storage_type" => {
                storage_type = field.text().await.map_err(|e| bad_request(e.to_string()))?;
            }
            _ => {}
        }
    }

    let partition = parse_partition(&storage_type)?;
    let mut items: Vec<(String, PathBuf)> = Vec::new();

    for (bytes, name) in uploads {
        let id = state
            .controller
            .store()
            .put(&bytes, name.as_deref(), partition)
            .map_err(internal)?;
        let path = state.controller.store().get(&id, Some(partition));
        items.push((id, path));
    }
    for id in doc_ids {
        // The hinted partition first, then everywhere.
        let mut path = state.controller.store().get(&id, Some(partition));
        if !path.exists() {
            path = state.controller.store().get(&id, None);
        }
        if !path.exists() {
            return Err(not_found(format!("docId not found in any storage: {id}")));
        }
        items.push((id, path));
    }
    if items.is_empty() {
        return Err(bad_request("No inputs (files or docIds)"));
    }

    info!(items = items.len(), "ingest requested");
    let controller = state.controller.clone();
    let stats = tokio::task::spawn_blocking(move || controller.ingest(&items))
        .await
        .map_err(internal)?
        .map_err(internal)?;

    Ok(Json(IngestResponse {
        ingested: stats.ingested,
    }))
}

/// Query the semantic index. `k` is clamped to the public fixed value.
pub async fn search_query(
    State(state): State<ApiState>,
    Form(request): Form<QueryRequest>,
) -> Result<Json<MatchesResponse>, ApiError> {
    let k = QUERY_K;
    if request.k.is_some_and(|requested| requested as usize != k) {
        info!(requested = ?request.k, "query k clamped to {k}");
    }

    let controller = state.controller.clone();
    let matches = tokio::task::spawn_blocking(move || controller.query(&request.text, k))
        .await
        .map_err(internal)?
        .map_err(internal)?;
    Ok(Json(MatchesResponse { matches }))
}

/// Re-ingest every PDF currently in any partition.
pub async fn force_reingest(
    State(state): State<ApiState>,
) -> Result<Json<ReingestResponse>, ApiError> {
    let files = state.controller.store().list(None);
    let items: Vec<(String, PathBuf)> = files
        .into_iter()
        .filter(|f| !f.doc_id.is_empty())
        .map(|f| (f.doc_id, f.path))
        .collect();

    if items.is_empty() {
        return Ok(Json(ReingestResponse {
            message: "No files found to ingest".to_string(),
            files_processed: 0,
            ingested: 0,
        }));
    }

    let count = items.len();
    let controller = state.controller.clone();
    let stats = tokio::task::spawn_blocking(move || controller.ingest(&items))
        .await
        .map_err(internal)?
        .map_err(internal)?;

    Ok(Json(ReingestResponse {
        message: format!("Force reingested {count} files"),
        files_processed: count,
        ingested: stats.ingested,
    }))
}

/// Overview of files across partitions.
pub async fn storage_status(State(state): State<ApiState>) -> Json<StorageStatus> {
    Json(state.controller.status())
}

/// Listing for a single partition.
pub async fn storage_files(
    State(state): State<ApiState>,
    Path(storage_type): Path<String>,
) -> Result<Json<Vec<StoredFile>>, ApiError> {
    let partition = parse_partition(&storage_type)?;
    Ok(Json(state.controller.store().list(Some(partition))))
}

/// Move legacy flat-layout files into the viewer partition.
pub async fn storage_migrate(State(state): State<ApiState>) -> Json<MigrateResponse> {
    let migrated = state.controller.migrate();
    Json(MigrateResponse {
        message: "Migration completed successfully".to_string(),
        migrated,
    })
}

/// Per-partition existence and writability probe.
pub async fn storage_health(State(state): State<ApiState>) -> Json<HealthReport> {
    Json(state.controller.health())
}

/// The nuclear clear: wipe storage and index, verify, report.
pub async fn storage_clear(State(state): State<ApiState>) -> Result<Json<ResetReport>, ApiError> {
    let controller = state.controller.clone();
    let report = tokio::task::spawn_blocking(move || controller.nuclear_clear())
        .await
        .map_err(internal)?;
    Ok(Json(report))
}

/// Storage and index introspection.
pub async fn storage_debug(State(state): State<ApiState>) -> Json<DebugReport> {
    Json(state.controller.debug_snapshot())
}

/// Serve a stored PDF by document id.
pub async fn serve_pdf(
    State(state): State<ApiState>,
    Path(doc_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let path = state.controller.store().get(&doc_id, None);
    if !path.exists() {
        return Err(not_found("PDF not found"));
    }
    let bytes = tokio::fs::read(&path).await.map_err(internal)?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{doc_id}.pdf\""),
            ),
        ],
        bytes,
    ))
}

/// Delete one stored PDF.
pub async fn delete_pdf(
    State(state): State<ApiState>,
    Path(doc_id): Path<String>,
) -> Json<DeletedResponse> {
    let deleted = if state.controller.store().delete(&doc_id, None) {
        vec![doc_id]
    } else {
        Vec::new()
    };
    Json(DeletedResponse { deleted })
}

/// Delete a batch of PDFs, best-effort per file.
pub async fn delete_pdfs(
    State(state): State<ApiState>,
    Json(request): Json<DocIdsRequest>,
) -> Json<DeletedResponse> {
    let mut deleted = Vec::new();
    for doc_id in request.doc_ids {
        if state.controller.store().delete(&doc_id, None) {
            deleted.push(doc_id);
        }
    }
    Json(DeletedResponse { deleted })
}

/// Beacon-friendly batch deletion (sendBeacon only supports POST).
pub async fn delete_pdfs_post(
    state: State<ApiState>,
    request: Json<DocIdsRequest>,
) -> Json<DeletedResponse> {
    delete_pdfs(state, request).await
}

/// Generative insights, or a structured disabled response without a
/// provider.
pub async fn insights(
    State(state): State<ApiState>,
    Json(request): Json<InsightsRequest>,
) -> Json<InsightsResponse> {
    match state.insights.insights(&request.selection) {
        Some(insights) => Json(InsightsResponse {
            enabled: true,
            source: state.insights.name().to_string(),
            insights,
        }),
        None => Json(InsightsResponse {
            enabled: false,
            source: state.insights.name().to_string(),
            insights: Vec::new(),
        }),
    }
}
