//! Remote text-to-shape generation.
//!
//! A description such as "a coffee mug" is posted to a JSON endpoint which
//! answers with `{"points": [{"x":..,"y":..,"z":..}, ...]}` normalised to the
//! `[-1.5, 1.5]` box.  The call is blocking; [`spawn_request`] moves it onto
//! its own thread so a frame loop can poll for the result.
//!
//! Failures are reported, never swallowed: a missing credential is detected
//! before any network traffic and is distinguishable from a failed call.

use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::Point3;

/// Per-axis bound of a remotely generated point cloud.
pub const REMOTE_EXTENT: f32 = 1.5;

// ════════════════════════════════════════════════════════════════════════════
// Errors
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum ShapeGenError {
    #[error("no API key: set the {0} environment variable")]
    MissingCredential(String),

    #[error("shape description is empty")]
    EmptyDescription,

    #[error("request failed: {0}")]
    Transport(String),

    #[error("shape service returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed shape response: {0}")]
    Malformed(String),
}

impl ShapeGenError {
    /// True when re-submitting the same request might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ShapeGenError::Transport(_) | ShapeGenError::Api { .. } | ShapeGenError::Malformed(_))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Configuration
// ════════════════════════════════════════════════════════════════════════════

/// Where and how to reach the shape service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeClientConfig {
    pub endpoint:     String,
    /// Name of the environment variable holding the bearer token.
    pub api_key_env:  String,
    pub model:        String,
    pub timeout_secs: u64,
}

impl Default for ShapeClientConfig {
    fn default() -> Self {
        ShapeClientConfig {
            endpoint:     "http://127.0.0.1:8787/v1/shapes".to_string(),
            api_key_env:  "MORPH_SHAPE_API_KEY".to_string(),
            model:        "point-cloud-1".to_string(),
            timeout_secs: 60,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Wire format
// ════════════════════════════════════════════════════════════════════════════

#[derive(Serialize, Debug)]
struct ShapeRequest<'a> {
    model:       &'a str,
    description: &'a str,
    count:       usize,
    instructions: String,
}

#[derive(Deserialize, Debug)]
struct ShapeResponse {
    points: Vec<WirePoint>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
struct WirePoint {
    x: f32,
    y: f32,
    z: f32,
}

/// Parse a shape-service body into clamped points.
///
/// Accepts the bare JSON object or one wrapped in a Markdown code fence, which
/// language-model backends tend to emit.
pub fn parse_points(body: &str) -> Result<Vec<Point3>, ShapeGenError> {
    let json = strip_code_fence(body);
    let resp: ShapeResponse = serde_json::from_str(json)
        .map_err(|e| ShapeGenError::Malformed(e.to_string()))?;

    if resp.points.is_empty() {
        return Err(ShapeGenError::Malformed("no points".to_string()));
    }

    resp.points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
                return Err(ShapeGenError::Malformed(format!("point {} is not finite", i)));
            }
            Ok(Point3::new(p.x, p.y, p.z).clamp(
                Point3::splat(-REMOTE_EXTENT),
                Point3::splat(REMOTE_EXTENT),
            ))
        })
        .collect()
}

fn strip_code_fence(body: &str) -> &str {
    let trimmed = body.trim();
    let Some(rest) = trimmed.strip_prefix("```") else { return trimmed };
    // Drop the optional language tag on the opening fence line.
    let rest = rest.split_once('\n').map(|(_, r)| r).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

// ════════════════════════════════════════════════════════════════════════════
// ShapeClient
// ════════════════════════════════════════════════════════════════════════════

/// Blocking client for the shape service.
#[derive(Clone, Debug)]
pub struct ShapeClient {
    config:  ShapeClientConfig,
    api_key: Option<String>,
    http:    reqwest::blocking::Client,
}

impl ShapeClient {
    /// Build a client, reading the API key from `config.api_key_env`.
    ///
    /// A missing key is not an error here; it surfaces from
    /// [`ShapeClient::generate`] so the rest of the program can start.
    pub fn new(config: ShapeClientConfig) -> Result<Self, ShapeGenError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(
        config: ShapeClientConfig,
        api_key: Option<String>,
    ) -> Result<Self, ShapeGenError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| ShapeGenError::Transport(e.to_string()))?;
        Ok(ShapeClient { config, api_key, http })
    }

    pub fn has_credential(&self) -> bool { self.api_key.is_some() }

    pub fn config(&self) -> &ShapeClientConfig { &self.config }

    /// Ask the service for `count` points approximating `description`.
    pub fn generate(&self, description: &str, count: usize) -> Result<Vec<Point3>, ShapeGenError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(ShapeGenError::EmptyDescription);
        }
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ShapeGenError::MissingCredential(self.config.api_key_env.clone()))?;

        let request = ShapeRequest {
            model: &self.config.model,
            description,
            count,
            instructions: format!(
                "Return JSON {{\"points\":[{{\"x\":..,\"y\":..,\"z\":..}}]}} with exactly {} \
                 points sampled on the surface of the described object, every coordinate \
                 normalised to [-{e}, {e}].",
                count,
                e = REMOTE_EXTENT,
            ),
        };

        info!(endpoint = %self.config.endpoint, %description, count, "requesting remote shape");

        let resp = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(key)
            .json(&request)
            .send()
            .map_err(|e| ShapeGenError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().map_err(|e| ShapeGenError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(ShapeGenError::Api { status: status.as_u16(), body });
        }

        let points = parse_points(&body)?;
        if points.len() != count {
            debug!(requested = count, received = points.len(), "shape service changed point count");
        }
        Ok(points)
    }
}

/// Run [`ShapeClient::generate`] on a background thread.
///
/// The receiver yields exactly one result.
pub fn spawn_request(
    client: ShapeClient,
    description: String,
    count: usize,
) -> Receiver<Result<Vec<Point3>, ShapeGenError>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = client.generate(&description, count);
        if let Err(ref e) = result {
            warn!("remote shape \"{}\" failed: {}", description, e);
        }
        let _ = tx.send(result);
    });
    rx
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
