//! HTTP intake server.
//!
//! Wires the database, embedding provider, content storage and notifier into
//! an axum router. The handlers are thin glue: field validation mirrors the
//! original intake form, and everything of substance happens in
//! [`crate::submission::orchestrate`].

use std::sync::{Arc, Mutex};

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::config::IntakeConfig;
use crate::db;
use crate::embedding;
use crate::error::SubmissionError;
use crate::notify::{self, Notifier};
use crate::storage::FileStorage;
use crate::submission::orchestrate::{process_submission, NewSubmission, SubmissionReceipt};
use crate::submission::store;
use crate::submission::types::SubmitterIdentity;
use anyhow::Result;

/// Uploads larger than this are rejected outright (matches the original
/// form's 2 MB cap).
const MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<rusqlite::Connection>>,
    embedding: Arc<dyn embedding::EmbeddingProvider>,
    storage: Arc<FileStorage>,
    notifier: Arc<dyn Notifier>,
    config: Arc<IntakeConfig>,
}

/// Shared setup: open DB, create embedding provider and storage.
fn setup_shared_state(config: IntakeConfig) -> Result<AppState> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    // Check for embedding model mismatch
    if let Ok(Some(stored_model)) = db::migrations::get_embedding_model(&conn) {
        if stored_model != config.embedding.model {
            tracing::warn!(
                stored = %stored_model,
                configured = %config.embedding.model,
                "embedding model changed — existing gallery vectors are not comparable"
            );
        }
    }

    let provider = embedding::create_provider(&config.embedding)?;
    tracing::info!("embedding provider ready");

    let storage = FileStorage::new(config.resolved_upload_dir())?;
    tracing::info!(dir = %storage.root().display(), "upload storage ready");

    Ok(AppState {
        db: Arc::new(Mutex::new(conn)),
        embedding: Arc::from(provider),
        storage: Arc::new(storage),
        notifier: Arc::from(notify::create_notifier()),
        config: Arc::new(config),
    })
}

/// Start the intake HTTP server.
pub async fn serve(config: IntakeConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %bind_addr, "starting intake server");

    let state = setup_shared_state(config)?;

    let router = Router::new()
        .route("/api/apply", post(apply))
        .route("/api/submissions", get(list_submissions))
        .route("/api/stats", get(stats))
        .route("/uploads/{filename}", get(photo))
        .route("/admin/clear", post(admin_clear))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "intake server listening at http://{bind_addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for ctrl-c");
            tracing::info!("shutting down intake server");
        })
        .await?;

    Ok(())
}

// ── Error plumbing ────────────────────────────────────────────────────────────

/// HTTP-facing error wrapper around the submission taxonomy.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        let status = match &err {
            SubmissionError::UnsupportedFormat(_) | SubmissionError::CorruptImage(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            SubmissionError::DuplicateSubmitter(_) => StatusCode::CONFLICT,
            // Matching failures are recovered into error-verdict records by
            // the orchestrator; seeing one here means something deeper broke.
            SubmissionError::Detection(_)
            | SubmissionError::Timeout
            | SubmissionError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// Accept one application: multipart form with name, email, age, phone,
/// address and a `photo` file field.
async fn apply(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<SubmissionReceipt>, ApiError> {
    let form = ApplyForm::parse(multipart).await?;
    let (identity, photo_filename, photo_bytes) = form.validate()?;

    let application_id = generate_application_id();
    tracing::info!(application_id = %application_id, email = %identity.email, "application received");

    let receipt = process_submission(
        Arc::clone(&state.db),
        Arc::clone(&state.embedding),
        Arc::clone(&state.storage),
        Arc::clone(&state.notifier),
        state.config.matching.clone(),
        NewSubmission {
            application_id,
            identity,
            photo_filename,
            photo_bytes,
        },
    )
    .await?;

    Ok(Json(receipt))
}

/// All records ordered by insertion time, with match results.
async fn list_submissions(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let db = Arc::clone(&state.db);
    let submissions = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
        store::list_all(&conn)
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))?
    .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(json!({
        "total": submissions.len(),
        "submissions": submissions,
    })))
}

/// Aggregate verdict counts for the results view.
async fn stats(State(state): State<AppState>) -> Result<Json<store::StatsResponse>, ApiError> {
    let db = Arc::clone(&state.db);
    let db_path = state.config.resolved_db_path();
    let response = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
        store::submission_stats(&conn, Some(&db_path))
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))?
    .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(response))
}

/// Serve a stored photo by filename.
async fn photo(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    // Stored names never contain separators; anything else is a traversal
    // attempt.
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(ApiError::bad_request("invalid filename"));
    }

    let storage = Arc::clone(&state.storage);
    let name = filename.clone();
    let bytes = tokio::task::spawn_blocking(move || storage.read(&name))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .map_err(|_| ApiError {
            status: StatusCode::NOT_FOUND,
            message: format!("no stored photo named {filename}"),
        })?;

    let content_type = if filename.to_ascii_lowercase().ends_with(".png") {
        "image/png"
    } else {
        "image/jpeg"
    };

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

/// Administrative reset: drop every record and stored photo.
async fn admin_clear(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let db = Arc::clone(&state.db);
    let storage = Arc::clone(&state.storage);

    let (records, files) = tokio::task::spawn_blocking(move || -> anyhow::Result<(usize, usize)> {
        let conn = db
            .lock()
            .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
        let records = store::delete_all(&conn)?;
        let files = storage.purge()?;
        Ok((records, files))
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))?
    .map_err(|e| ApiError::internal(e.to_string()))?;

    tracing::info!(records, files, "administrative reset");
    Ok(Json(json!({ "cleared": records, "files_removed": files })))
}

async fn healthz() -> &'static str {
    "ok"
}

// ── Form parsing and validation ───────────────────────────────────────────────

/// Raw fields pulled from the multipart body.
#[derive(Default)]
struct ApplyForm {
    name: Option<String>,
    email: Option<String>,
    age: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    photo_filename: Option<String>,
    photo_bytes: Option<Vec<u8>>,
}

impl ApplyForm {
    async fn parse(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to parse multipart: {e}")))?
        {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "photo" => {
                    form.photo_filename = field.file_name().map(|s| s.to_string());
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("failed to read photo: {e}")))?;
                    form.photo_bytes = Some(data.to_vec());
                }
                "name" => form.name = Some(read_text(field).await?),
                "email" => form.email = Some(read_text(field).await?),
                "age" => form.age = Some(read_text(field).await?),
                "phone" => form.phone = Some(read_text(field).await?),
                "address" => form.address = Some(read_text(field).await?),
                other => {
                    tracing::debug!(field = %other, "ignoring unknown form field");
                }
            }
        }

        Ok(form)
    }

    /// Apply the intake form rules: all fields required, age ≥ 18, phone
    /// exactly 10 digits, email must look like an address.
    fn validate(self) -> Result<(SubmitterIdentity, String, Vec<u8>), ApiError> {
        let name = required_text(self.name, "name")?;
        let email = required_text(self.email, "email")?;
        let age_raw = required_text(self.age, "age")?;
        let phone = required_text(self.phone, "phone")?;
        let address = required_text(self.address, "address")?;

        if !looks_like_email(&email) {
            return Err(ApiError::bad_request("invalid email address"));
        }

        let age: u32 = age_raw
            .parse()
            .map_err(|_| ApiError::bad_request("age must be a number"))?;
        if age < 18 {
            return Err(ApiError::bad_request("age must be 18 or older"));
        }

        if phone.len() != 10 || !phone.chars().all(|c| c.is_ascii_digit()) {
            return Err(ApiError::bad_request("phone must be exactly 10 digits"));
        }

        let photo_filename = self
            .photo_filename
            .ok_or_else(|| ApiError::bad_request("photograph is required"))?;
        let photo_bytes = self
            .photo_bytes
            .filter(|b| !b.is_empty())
            .ok_or_else(|| ApiError::bad_request("photograph is required"))?;

        Ok((
            SubmitterIdentity {
                name,
                email,
                age,
                phone,
                address,
            },
            photo_filename,
            photo_bytes,
        ))
    }
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    let name = field.name().unwrap_or("").to_string();
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("failed to read field '{name}': {e}")))
}

fn required_text(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{field} is required")))
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

/// `APP{YYYYMMDD}_{8 uppercase hex}`, assigned once per intake session.
fn generate_application_id() -> String {
    let date = chrono::Utc::now().format("%Y%m%d");
    let suffix = uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("APP{date}_{suffix}")
}
