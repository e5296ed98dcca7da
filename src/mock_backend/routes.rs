use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::Extension,
    http::StatusCode,
    response::Json as JsonResponse,
};
use rand::Rng;
use serde_json::{json, Value};
use tokio::time::sleep;

use crate::mock_backend::MockConfig;

type MockResponse = (StatusCode, JsonResponse<Value>);

/// Health check endpoint
pub async fn health_check(Extension(config): Extension<Arc<MockConfig>>) -> MockResponse {
    (
        StatusCode::OK,
        JsonResponse(json!({
            "status": "UP",
            "service": config.kind.backend(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

pub async fn face_register(
    Extension(config): Extension<Arc<MockConfig>>,
    body: Bytes,
) -> MockResponse {
    respond(&config, &body, |request, _rng| {
        json!({
            "success": true,
            "message": "Face registered successfully",
            "studentId": request.get("studentId").cloned().unwrap_or(Value::Null),
        })
    })
    .await
}

pub async fn face_verify(
    Extension(config): Extension<Arc<MockConfig>>,
    body: Bytes,
) -> MockResponse {
    respond(&config, &body, |request, rng| {
        let verified = rng.gen::<f64>() > 0.1;
        json!({
            "success": true,
            "verified": verified,
            "confidence": if verified { rng.gen_range(0.7..1.0) } else { rng.gen_range(0.0..0.5) },
            "studentId": request.get("studentId").cloned().unwrap_or(Value::Null),
        })
    })
    .await
}

pub async fn face_analyze(
    Extension(config): Extension<Arc<MockConfig>>,
    body: Bytes,
) -> MockResponse {
    respond(&config, &body, |_request, rng| {
        let emotions = ["neutral", "happy", "sad", "angry", "surprised"];
        json!({
            "success": true,
            "analysis": {
                "attention": rng.gen_range(0.7..1.0),
                "engagement": rng.gen_range(0.7..1.0),
                "emotion": emotions[rng.gen_range(0..emotions.len())],
            }
        })
    })
    .await
}

pub async fn detect_idcard(
    Extension(config): Extension<Arc<MockConfig>>,
    body: Bytes,
) -> MockResponse {
    respond(&config, &body, |_request, rng| {
        let visible = rng.gen::<f64>() > 0.2;
        json!({
            "success": true,
            "idCardVisible": visible,
            "confidence": if visible { rng.gen_range(0.7..1.0) } else { 0.0 },
        })
    })
    .await
}

pub async fn detect_phone(
    Extension(config): Extension<Arc<MockConfig>>,
    body: Bytes,
) -> MockResponse {
    respond(&config, &body, |_request, rng| {
        let detected = rng.gen::<f64>() > 0.7;
        json!({
            "success": true,
            "phoneDetected": detected,
            "confidence": if detected { rng.gen_range(0.7..1.0) } else { 0.0 },
        })
    })
    .await
}

pub async fn sentiment_analyze(
    Extension(config): Extension<Arc<MockConfig>>,
    body: Bytes,
) -> MockResponse {
    respond(&config, &body, |_request, rng| {
        let emotions = ["neutral", "happy", "sad", "confused", "bored"];
        json!({
            "success": true,
            "dominant_emotion": emotions[rng.gen_range(0..emotions.len())],
            "average_engagement": rng.gen_range(0.4..1.0),
            "average_attention": rng.gen_range(0.4..1.0),
        })
    })
    .await
}

enum Plan {
    Fail,
    Reply(Value),
}

/// Validate, decide the outcome and delay, then answer. The RNG is never
/// held across the sleep.
async fn respond<F>(config: &MockConfig, body: &[u8], build: F) -> MockResponse
where
    F: FnOnce(&Value, &mut rand::rngs::ThreadRng) -> Value,
{
    let request = match serde_json::from_slice::<Value>(body) {
        Ok(request) if has_image(&request) => request,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                JsonResponse(json!({"success": false, "message": "Missing required fields"})),
            )
        }
    };

    let (plan, delay) = {
        let mut rng = rand::thread_rng();
        let plan = if should_fail(config, &mut rng) {
            Plan::Fail
        } else {
            Plan::Reply(build(&request, &mut rng))
        };
        (plan, pick_delay(config, &mut rng))
    };

    if !delay.is_zero() {
        sleep(delay).await;
    }

    match plan {
        Plan::Fail => (
            StatusCode::INTERNAL_SERVER_ERROR,
            JsonResponse(json!({
                "success": false,
                "message": "Random failure occurred",
                "service": config.kind.backend(),
            })),
        ),
        Plan::Reply(body) => (StatusCode::OK, JsonResponse(body)),
    }
}

fn has_image(request: &Value) -> bool {
    request
        .get("image")
        .and_then(Value::as_str)
        .map_or(false, |image| !image.is_empty())
}

fn should_fail(config: &MockConfig, rng: &mut impl Rng) -> bool {
    config.failure_rate > 0.0 && rng.gen::<f64>() < config.failure_rate
}

fn pick_delay(config: &MockConfig, rng: &mut impl Rng) -> Duration {
    let delay_ms = if config.min_delay_ms >= config.max_delay_ms {
        config.min_delay_ms
    } else {
        rng.gen_range(config.min_delay_ms..=config.max_delay_ms)
    };
    Duration::from_millis(delay_ms)
}
