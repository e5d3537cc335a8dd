//! Dataset loading: resolve a location, fetch its text, parse and index it.

use tracing::{debug, info, warn};

use crate::analyzers::mastery::MasteryIndex;
use crate::analyzers::submissions::SubmissionIndex;
use crate::error::LoadError;
use crate::fetch::{HttpClient, fetch_bytes};
use crate::ingest::{SubmissionColumns, parse_mastery_table, parse_submission_table};

/// Where a dataset lives.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Url(reqwest::Url),
    Path(String),
}

impl Location {
    /// Strings starting with `http://` or `https://` are URLs, anything else a file path.
    pub fn parse(s: &str) -> Result<Self, LoadError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(LoadError::InvalidLocation(s.to_string()));
        }
        if s.starts_with("http://") || s.starts_with("https://") {
            let url = s
                .parse()
                .map_err(|_| LoadError::InvalidLocation(s.to_string()))?;
            Ok(Location::Url(url))
        } else {
            Ok(Location::Path(s.to_string()))
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Url(url) => write!(f, "{url}"),
            Location::Path(path) => write!(f, "{path}"),
        }
    }
}

/// Reads the whole dataset as text. Invalid UTF-8 is replaced, not rejected.
#[tracing::instrument(skip(client, location), fields(location = %location))]
pub async fn read_text<C: HttpClient>(client: &C, location: &Location) -> Result<String, LoadError> {
    let bytes = match location {
        Location::Url(url) => fetch_bytes(client, url)
            .await
            .map_err(|source| LoadError::Http {
                url: url.to_string(),
                source,
            })?,
        Location::Path(path) => tokio::fs::read(path)
            .await
            .map_err(|source| LoadError::Io {
                path: path.clone(),
                source,
            })?,
    };
    debug!(bytes = bytes.len(), "Dataset bytes received");
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn read_location<C: HttpClient>(client: &C, location: &str) -> Result<String, LoadError> {
    let location = Location::parse(location)?;
    read_text(client, &location).await
}

/// Reads `primary`, trying `fallback` once if the primary cannot be fetched.
pub async fn read_with_fallback<C: HttpClient>(
    client: &C,
    primary: &str,
    fallback: Option<&str>,
) -> Result<String, LoadError> {
    match read_location(client, primary).await {
        Ok(text) => Ok(text),
        Err(primary_err) => {
            let Some(fallback) = fallback else {
                return Err(primary_err);
            };
            warn!(primary, fallback, error = %primary_err, "Primary dataset unavailable, trying fallback");
            read_location(client, fallback)
                .await
                .map_err(|fallback_err| LoadError::Exhausted {
                    primary: Box::new(primary_err),
                    fallback: Box::new(fallback_err),
                })
        }
    }
}

/// Fetches and aggregates the mastery dataset.
#[tracing::instrument(skip(client))]
pub async fn load_mastery<C: HttpClient>(
    client: &C,
    primary: &str,
    fallback: Option<&str>,
) -> Result<MasteryIndex, LoadError> {
    let text = read_with_fallback(client, primary, fallback).await?;
    let rows = parse_mastery_table(&text);
    let index = MasteryIndex::build(&rows);
    info!(rows = rows.len(), students = index.len(), "Mastery dataset loaded");
    Ok(index)
}

/// Fetches and indexes the submission dataset.
#[tracing::instrument(skip(client, columns))]
pub async fn load_submissions<C: HttpClient>(
    client: &C,
    location: &str,
    columns: &SubmissionColumns,
) -> Result<SubmissionIndex, LoadError> {
    let text = read_location(client, location).await?;
    let index = SubmissionIndex::build(parse_submission_table(&text, columns));
    info!(
        records = index.total_records(),
        students = index.student_count(),
        "Submission dataset loaded"
    );
    Ok(index)
}
