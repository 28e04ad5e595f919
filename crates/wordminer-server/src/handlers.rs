use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info};
use wordminer_analysis::{
    ArticleCatalog, DEFAULT_TOP_WORDS, MemoryStore, OverlapEngine, StatsStore, StoreError,
    VocabularyLedger, annotate, build_report, import_article,
};
use wordminer_dict::{Dictionary, normalize_headword};
use wordminer_morph::lemmatize;
use wordminer_types::{ArticleId, VocabLabel};

#[derive(Clone)]
pub struct AppState {
    pub dictionary: Arc<Dictionary>,
    pub store: Arc<MemoryStore>,
    pub ledger: VocabularyLedger<MemoryStore>,
    pub overlap: OverlapEngine<MemoryStore>,
    /// Snapshot file rewritten after every mutation; `None` keeps state in memory only.
    pub store_path: Option<PathBuf>,
    pub max_top_words: usize,
    /// Held across snapshot-and-rename so writes land on disk in the order they were taken.
    snapshot_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        dictionary: Arc<Dictionary>,
        store: Arc<MemoryStore>,
        store_path: Option<PathBuf>,
        max_top_words: usize,
    ) -> Self {
        Self {
            ledger: VocabularyLedger::new(Arc::clone(&store)),
            overlap: OverlapEngine::new(Arc::clone(&store)),
            dictionary,
            store,
            store_path,
            max_top_words,
            snapshot_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[derive(Deserialize)]
pub struct ImportRequest {
    pub title: String,
    pub path: Option<String>,
    #[serde(default)]
    pub content: String,
}

#[derive(Deserialize)]
pub struct ReportQuery {
    pub top: Option<usize>,
}

#[derive(Deserialize)]
pub struct OverlapQuery {
    pub ids: Option<String>,
}

#[derive(Deserialize)]
pub struct VocabQuery {
    pub label: Option<String>,
}

#[derive(Deserialize)]
pub struct LabelRequest {
    pub label: String,
}

#[derive(Serialize)]
pub struct OverlapResponse {
    ids: Vec<ArticleId>,
    unique: usize,
    shared: usize,
    shared_lemmas: Vec<String>,
}

#[derive(Serialize)]
pub struct LabelResponse {
    lemma: String,
    label: Option<VocabLabel>,
}

#[derive(Serialize)]
pub struct BackupResponse {
    path: String,
    articles: usize,
    labels: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/dictionary/{word}", get(dictionary_entry))
        .route("/v1/articles", get(list_articles).post(create_article))
        .route("/v1/articles/{id}", get(article).delete(delete_article))
        .route("/v1/articles/{id}/report", get(article_report))
        .route("/v1/articles/{id}/annotate", get(article_annotations))
        .route("/v1/overlap", get(overlap))
        .route("/v1/vocab", get(vocabulary))
        .route("/v1/vocab/export", get(export_vocabulary))
        .route("/v1/vocab/{lemma}", get(vocab_label).put(set_vocab_label))
        .route("/v1/backup", post(backup))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

async fn dictionary_entry(
    State(state): State<AppState>,
    Path(word): Path<String>,
) -> Result<Response, ApiError> {
    let entry = state
        .dictionary
        .lookup(&word)
        .or_else(|| state.dictionary.get(&lemmatize(&word)))
        .ok_or_else(|| ApiError::not_found(format!("{word:?} is not in the dictionary")))?;
    Ok(Json(entry).into_response())
}

async fn create_article(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> Result<Response, ApiError> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(ApiError::bad_request("title is required"));
    }
    let summary = import_article(
        state.store.as_ref(),
        title,
        request.path.as_deref(),
        &request.content,
        &state.dictionary,
    )?;
    persist(&state).await;
    Ok((StatusCode::CREATED, Json(summary)).into_response())
}

async fn list_articles(State(state): State<AppState>) -> Result<Response, ApiError> {
    Ok(Json(state.store.list_articles()?).into_response())
}

async fn article(
    State(state): State<AppState>,
    Path(id): Path<ArticleId>,
) -> Result<Response, ApiError> {
    let article = state
        .store
        .get_article(id)?
        .ok_or_else(|| ApiError::article_not_found(id))?;
    Ok(Json(article).into_response())
}

async fn delete_article(
    State(state): State<AppState>,
    Path(id): Path<ArticleId>,
) -> Result<Response, ApiError> {
    if !state.store.delete_article(id)? {
        return Err(ApiError::article_not_found(id));
    }
    info!("deleted article {id}");
    persist(&state).await;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn article_report(
    State(state): State<AppState>,
    Path(id): Path<ArticleId>,
    Query(params): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let mut top = params.top.unwrap_or(DEFAULT_TOP_WORDS);
    if top == 0 {
        return Err(ApiError::bad_request("top must be >= 1"));
    }
    if top > state.max_top_words {
        top = state.max_top_words;
    }
    if state.store.get_article(id)?.is_none() {
        return Err(ApiError::article_not_found(id));
    }

    let rows = state.store.query_by_article(id)?;
    let labels = state.ledger.get_all()?;
    Ok(Json(build_report(id, &rows, &labels, top)).into_response())
}

async fn article_annotations(
    State(state): State<AppState>,
    Path(id): Path<ArticleId>,
) -> Result<Response, ApiError> {
    let article = state
        .store
        .get_article(id)?
        .ok_or_else(|| ApiError::article_not_found(id))?;
    let labels = state.ledger.get_all()?;
    let tokens = annotate(&article.content, &state.dictionary, &labels);
    Ok(Json(json!({ "article_id": id, "tokens": tokens })).into_response())
}

async fn overlap(
    State(state): State<AppState>,
    Query(params): Query<OverlapQuery>,
) -> Result<Response, ApiError> {
    let ids = parse_ids(params.ids.as_deref().unwrap_or_default())?;
    let (result, shared_lemmas) = state
        .overlap
        .overlap_with_shared(&ids)?
        .ok_or_else(|| ApiError::bad_request("ids is required"))?;
    Ok(Json(OverlapResponse {
        ids,
        unique: result.unique,
        shared: result.shared,
        shared_lemmas,
    })
    .into_response())
}

async fn vocabulary(
    State(state): State<AppState>,
    Query(params): Query<VocabQuery>,
) -> Result<Response, ApiError> {
    match params.label.as_deref() {
        Some(raw) => {
            let label = parse_label(raw)?;
            let lemmas = state.ledger.list_by_label(label)?;
            Ok(Json(json!({ "label": label, "lemmas": lemmas })).into_response())
        }
        None => {
            let all: BTreeMap<String, VocabLabel> = state.ledger.get_all()?.into_iter().collect();
            Ok(Json(all).into_response())
        }
    }
}

async fn export_vocabulary(State(state): State<AppState>) -> Result<Response, ApiError> {
    let mut csv = Vec::new();
    state.ledger.export_csv(&mut csv)?;
    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            ),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_static("attachment; filename=\"vocabulary.csv\""),
            ),
        ],
        csv,
    )
        .into_response())
}

async fn vocab_label(
    State(state): State<AppState>,
    Path(lemma): Path<String>,
) -> Result<Response, ApiError> {
    let lemma = parse_lemma(&lemma)?;
    let label = state.ledger.get_label(&lemma)?;
    Ok(Json(LabelResponse { lemma, label }).into_response())
}

async fn set_vocab_label(
    State(state): State<AppState>,
    Path(lemma): Path<String>,
    Json(request): Json<LabelRequest>,
) -> Result<Response, ApiError> {
    let lemma = parse_lemma(&lemma)?;
    let label = parse_label(&request.label)?;
    state.ledger.set_label(&lemma, label)?;
    persist(&state).await;
    Ok(Json(LabelResponse {
        lemma,
        label: Some(label),
    })
    .into_response())
}

async fn backup(State(state): State<AppState>) -> Result<Response, ApiError> {
    let store_path = state
        .store_path
        .as_ref()
        .ok_or_else(|| ApiError::bad_request("persistence is disabled"))?;
    let mut backup_path = OsString::from(store_path.as_os_str());
    backup_path.push(".bak");
    let backup_path = PathBuf::from(backup_path);

    write_snapshot(&state, backup_path.clone()).await?;
    info!("wrote backup to {}", backup_path.display());

    Ok(Json(BackupResponse {
        path: backup_path.display().to_string(),
        articles: state.store.list_articles()?.len(),
        labels: state.ledger.get_all()?.len(),
    })
    .into_response())
}

/// Rewrite the snapshot file, if one is configured.
///
/// The in-memory mutation is already committed when this runs, so a failed
/// write is logged and the request still succeeds; the next successful
/// write carries the change.
async fn persist(state: &AppState) {
    let Some(path) = state.store_path.clone() else {
        return;
    };
    if let Err(err) = write_snapshot(state, path.clone()).await {
        error!("failed to persist snapshot to {}: {err}", path.display());
    }
}

/// Snapshot the store and rename it into place while holding the snapshot lock.
async fn write_snapshot(state: &AppState, path: PathBuf) -> Result<(), StoreError> {
    let guard = Arc::clone(&state.snapshot_lock).lock_owned().await;
    let store = Arc::clone(&state.store);
    // The guard moves into the blocking task so a dropped request cannot
    // release it while the rename is still pending.
    tokio::task::spawn_blocking(move || {
        let _guard = guard;
        store.save_to(&path)
    })
    .await
    .map_err(|err| StoreError::Backend(err.to_string()))?
}

fn parse_ids(raw: &str) -> Result<Vec<ArticleId>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<ArticleId>()
                .map_err(|_| ApiError::bad_request(format!("invalid article id {part:?}")))
        })
        .collect()
}

fn parse_label(raw: &str) -> Result<VocabLabel, ApiError> {
    raw.parse::<VocabLabel>()
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

fn parse_lemma(raw: &str) -> Result<String, ApiError> {
    let lemma = normalize_headword(raw);
    if lemma.is_empty() {
        return Err(ApiError::bad_request("lemma is required"));
    }
    Ok(lemma)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        ApiError::BadRequest(msg.into())
    }

    fn not_found<T: Into<String>>(msg: T) -> Self {
        ApiError::NotFound(msg.into())
    }

    fn article_not_found(id: ArticleId) -> Self {
        ApiError::NotFound(format!("article {id} not found"))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        error!("store error: {err}");
        ApiError::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => {
                let body = Json(ErrorResponse { error: msg });
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            ApiError::NotFound(msg) => {
                let body = Json(ErrorResponse { error: msg });
                (StatusCode::NOT_FOUND, body).into_response()
            }
            ApiError::Internal => {
                let body = Json(json!({ "error": "internal server error" }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}
