//! Identity application intake with passport-photo duplicate screening.
//!
//! Intake accepts identity-application submissions (personal data plus a
//! passport-style photograph), persists them, and decides whether a newly
//! submitted photograph is a near-duplicate of a previously submitted one.
//! Each photo is embedded into a fixed-length vector; the gallery of prior
//! embeddings is searched for nearest neighbors under cosine distance, and a
//! per-candidate threshold turns the ranked list into a verdict with a
//! numeric confidence.
//!
//! # Architecture
//!
//! - **Storage**: SQLite for submission records (embeddings stored as
//!   BLOBs), plain files for photo bytes under
//!   `{application_id}_{timestamp}{ext}` names
//! - **Embeddings**: Local ONNX Runtime face encoder (512 dimensions,
//!   L2-normalized), behind a provider trait
//! - **Search**: Brute-force cosine scan over an explicitly materialized
//!   gallery snapshot — a pure function, so an index can replace it without
//!   touching callers
//! - **Transport**: HTTP (axum) with a multipart intake form
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`db`] — SQLite database initialization, schema, and migrations
//! - [`embedding`] — Photo-to-vector embedding pipeline via ONNX Runtime
//! - [`error`] — The submission error taxonomy
//! - [`notify`] — Best-effort submitter notification boundary
//! - [`storage`] — Content storage for uploaded photographs
//! - [`submission`] — Core pipeline: ingest, search, classify, persist, orchestrate

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod notify;
pub mod storage;
pub mod submission;
