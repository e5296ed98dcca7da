use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::GatewayError;
use crate::models::{BackendFailure, BackendName, BackendOutcome};
use crate::utils::duration_to_millis;

const UNKNOWN: &str = "unknown";

/// Inbound body of the combined-analysis operation
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    /// Base64 encoded image, optionally as a data URL
    pub image: String,
    pub session_id: String,
    pub student_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysisRequest {
    image: Option<String>,
    session_id: Option<String>,
    student_id: Option<String>,
}

impl AnalysisRequest {
    pub fn new(
        image: impl Into<String>,
        session_id: impl Into<String>,
        student_id: impl Into<String>,
    ) -> Self {
        Self {
            image: image.into(),
            session_id: session_id.into(),
            student_id: student_id.into(),
        }
    }

    /// Parse and validate a JSON request body
    pub fn from_json(body: &[u8]) -> Result<Self, GatewayError> {
        let raw: RawAnalysisRequest = serde_json::from_slice(body)
            .map_err(|_| GatewayError::ValidationError("Missing required fields".to_string()))?;

        let image = match raw.image {
            Some(image) if !image.trim().is_empty() => image,
            _ => return Err(GatewayError::ValidationError("Missing required fields".to_string())),
        };

        let request = Self {
            image,
            session_id: raw.session_id.unwrap_or_else(|| UNKNOWN.to_string()),
            student_id: raw.student_id.unwrap_or_else(|| UNKNOWN.to_string()),
        };
        request.validate()?;

        Ok(request)
    }

    /// The image must decode as base64; a `data:<mime>;base64,` prefix is tolerated
    pub fn validate(&self) -> Result<(), GatewayError> {
        let encoded = match self.image.split_once(";base64,") {
            Some((prefix, data)) if prefix.starts_with("data:") => data,
            _ => self.image.as_str(),
        };

        if encoded.is_empty() {
            return Err(GatewayError::ValidationError("Image payload is empty".to_string()));
        }

        BASE64
            .decode(encoded.trim())
            .map(|_| ())
            .map_err(|_| GatewayError::ValidationError("Image is not valid base64".to_string()))
    }
}

/// One analysis performed by the combined operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    Face,
    IdCard,
    Phone,
    Sentiment,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 4] = [
        AnalysisKind::Face,
        AnalysisKind::IdCard,
        AnalysisKind::Phone,
        AnalysisKind::Sentiment,
    ];

    pub fn backend(&self) -> BackendName {
        match self {
            AnalysisKind::Face => BackendName::FaceRecognition,
            AnalysisKind::IdCard | AnalysisKind::Phone => BackendName::ObjectDetection,
            AnalysisKind::Sentiment => BackendName::SentimentAnalysis,
        }
    }

    /// Upstream path on the owning backend
    pub fn path(&self) -> &'static str {
        match self {
            AnalysisKind::Face => "/api/face/verify",
            AnalysisKind::IdCard => "/api/object-detection/idcard",
            AnalysisKind::Phone => "/api/object-detection/phone",
            AnalysisKind::Sentiment => "/api/sentiment/analyze",
        }
    }

    /// Backend-specific view of the request
    pub fn payload(&self, request: &AnalysisRequest) -> Value {
        match self {
            AnalysisKind::Face | AnalysisKind::Sentiment => json!({
                "image": request.image,
                "sessionId": request.session_id,
                "studentId": request.student_id,
            }),
            AnalysisKind::IdCard | AnalysisKind::Phone => json!({
                "image": request.image,
                "sessionId": request.session_id,
            }),
        }
    }

    /// Distinct backends touched by a set of analyses, in lock order
    pub fn backends(kinds: &[AnalysisKind]) -> Vec<BackendName> {
        let mut backends: Vec<BackendName> = kinds.iter().map(AnalysisKind::backend).collect();
        backends.sort();
        backends.dedup();
        backends
    }
}

/// Derived per-field view of a combined analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub face_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_error: Option<String>,

    pub id_card_visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_card_error: Option<String>,

    pub phone_detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_error: Option<String>,

    pub sentiment_analyzed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment_error: Option<String>,

    pub engagement: f64,
    pub attention: f64,
}

/// Raw backend bodies, keyed the way the monitoring client reads them
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisPayloads {
    pub face: Option<Value>,
    pub idcard: Option<Value>,
    pub phone: Option<Value>,
    pub sentiment: Option<Value>,
}

/// Per-analysis record of what happened
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeReport {
    pub analysis: AnalysisKind,
    pub backend: BackendName,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Merged response of the combined-analysis operation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedResult {
    pub success: bool,
    pub message: String,
    pub student_id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub summary: AnalysisSummary,
    pub analyses: AnalysisPayloads,
    pub outcomes: Vec<OutcomeReport>,
}

impl CombinedResult {
    /// Merge outcomes keyed by analysis. Every expected analysis gets exactly
    /// one slot; an analysis with no recorded outcome is reported as failed.
    pub fn assemble(
        request: &AnalysisRequest,
        expected: &[AnalysisKind],
        mut outcomes: BTreeMap<AnalysisKind, BackendOutcome>,
    ) -> Self {
        let mut summary = AnalysisSummary::default();
        let mut analyses = AnalysisPayloads::default();
        let mut reports = Vec::with_capacity(expected.len());

        let mut kinds = expected.to_vec();
        kinds.sort();
        kinds.dedup();

        for kind in kinds {
            let outcome = outcomes.remove(&kind).unwrap_or_else(|| {
                BackendOutcome::failure(
                    kind.backend(),
                    BackendFailure::TaskFailed("no outcome recorded".to_string()),
                    std::time::Duration::ZERO,
                )
            });

            let interpreted = outcome.interpret();
            let body = outcome.body().cloned();
            let error = interpreted.as_ref().err().map(ToString::to_string);

            match kind {
                AnalysisKind::Face => {
                    summary.face_verified = interpreted
                        .as_ref()
                        .map(|v| v.get("verified").and_then(Value::as_bool) != Some(false))
                        .unwrap_or(false);
                    summary.face_error = error.clone();
                    analyses.face = body;
                }
                AnalysisKind::IdCard => {
                    summary.id_card_visible = flag(&interpreted, "idCardVisible");
                    summary.id_card_error = error.clone();
                    analyses.idcard = body;
                }
                AnalysisKind::Phone => {
                    summary.phone_detected = flag(&interpreted, "phoneDetected");
                    summary.phone_error = error.clone();
                    analyses.phone = body;
                }
                AnalysisKind::Sentiment => {
                    summary.sentiment_analyzed = interpreted.is_ok();
                    summary.engagement = score(&interpreted, "average_engagement");
                    summary.attention = score(&interpreted, "average_attention");
                    summary.sentiment_error = error.clone();
                    analyses.sentiment = body;
                }
            }

            reports.push(OutcomeReport {
                analysis: kind,
                backend: outcome.backend,
                succeeded: interpreted.is_ok(),
                status: outcome.status,
                latency_ms: duration_to_millis(outcome.latency),
                error,
            });
        }

        Self {
            success: true,
            message: "Combined analysis completed".to_string(),
            student_id: request.student_id.clone(),
            session_id: request.session_id.clone(),
            timestamp: Utc::now(),
            summary,
            analyses,
            outcomes: reports,
        }
    }
}

fn flag(payload: &Result<&Value, BackendFailure>, field: &str) -> bool {
    payload
        .as_ref()
        .ok()
        .and_then(|v| v.get(field))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn score(payload: &Result<&Value, BackendFailure>, field: &str) -> f64 {
    payload
        .as_ref()
        .ok()
        .and_then(|v| v.get(field))
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}
