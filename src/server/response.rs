//! JSON response envelopes
//!
//! Failures become `{"code": "400"|"500", "message": ..., "contextN": ...}`
//! and successful builds `{"binary": <base64>, ...}`. Outside debug mode
//! error bodies carry only a generic message per class.

use crate::build::BuildOutcome;
use crate::error::BuildBotError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A failure rendered as an error envelope
#[derive(Debug)]
pub struct ApiError {
    error: BuildBotError,
    debug: bool,
}

impl ApiError {
    pub fn new(error: BuildBotError, debug: bool) -> Self {
        Self { error, debug }
    }

    pub fn status(&self) -> StatusCode {
        if self.error.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    /// The envelope body; `BTreeMap` keeps the key order stable
    pub fn body(&self) -> BTreeMap<String, String> {
        let status = self.status();
        let mut body = BTreeMap::new();
        body.insert("code".to_string(), status.as_str().to_string());

        if self.debug {
            body.insert("message".to_string(), self.error.to_string());
            for (i, context) in self.error.context().into_iter().enumerate() {
                body.insert(format!("context{}", i), context);
            }
        } else {
            let generic = status.canonical_reason().unwrap_or("Error");
            body.insert("message".to_string(), generic.to_string());
        }

        body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// Successful build envelope
#[derive(Debug, Serialize)]
pub struct BuildSuccess {
    /// Artifact bytes, encoded as named by `encoding`
    pub binary: String,
    pub encoding: &'static str,
    /// Hex SHA-256 of the decoded artifact
    pub sha256: String,
    #[serde(flatten)]
    pub diagnostics: Option<BuildDiagnostics>,
}

/// Debug-mode extras for diagnosing a build
#[derive(Debug, Serialize)]
pub struct BuildDiagnostics {
    #[serde(rename = "reqID")]
    pub request_id: String,
    #[serde(rename = "buildLocation")]
    pub build_location: String,
    /// Raw request body
    #[serde(rename = "reqDat")]
    pub request: String,
    #[serde(rename = "cmake-output")]
    pub configure_output: String,
    #[serde(rename = "make-output")]
    pub build_output: String,
}

impl BuildSuccess {
    pub fn new(outcome: BuildOutcome, debug: bool) -> Self {
        let sha256 = hex::encode(Sha256::digest(&outcome.artifact));
        let binary = STANDARD.encode(&outcome.artifact);
        let diagnostics = debug.then(|| BuildDiagnostics {
            request_id: outcome.request_id.to_string(),
            build_location: outcome.workspace.display().to_string(),
            request: outcome.request,
            configure_output: outcome.configure_output,
            build_output: outcome.build_output,
        });

        Self {
            binary,
            encoding: "base64",
            sha256,
            diagnostics,
        }
    }
}
