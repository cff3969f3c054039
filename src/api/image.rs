/// Image upload and token-addressed serving endpoints
use crate::{
    access::{AccessOutcome, DenyReason},
    context::AppContext,
    error::{ErrorResponse, PixResult},
    upload::UploadReceipt,
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

/// Build image routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/image", post(upload_image))
        .route("/image/:token", get(serve_image))
}

/// Upload response carrying the relative access URL
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    token: String,
    expires_at_epoch_ms: i64,
    url: String,
}

/// Upload an image
///
/// Accepts raw binary data in the request body with the declared type
/// in the Content-Type header and an optional X-Filename header.
async fn upload_image(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    body: Bytes,
) -> PixResult<impl IntoResponse> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(strip_type_parameters);
    let filename = headers
        .get("x-filename")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let receipt = ctx
        .uploader
        .upload(body.to_vec(), content_type.as_deref(), filename.as_deref())
        .await?;

    let url = format!("/image/{}", receipt.token);
    let UploadReceipt {
        token,
        expires_at_epoch_ms,
    } = receipt;

    Ok((
        StatusCode::OK,
        Json(UploadResponse {
            token,
            expires_at_epoch_ms,
            url,
        }),
    ))
}

/// Serve an image by token
async fn serve_image(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
) -> PixResult<Response> {
    match ctx.arbiter.fetch(&token).await? {
        AccessOutcome::Allowed { bytes, record } => {
            let content_type = record
                .content_type
                .unwrap_or_else(|| "application/octet-stream".to_string());

            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, bytes.len().to_string())
                .header(header::CACHE_CONTROL, "no-store")
                .body(axum::body::Body::from(bytes))
                .unwrap())
        }
        AccessOutcome::Denied(reason) => Ok(denied_response(reason)),
    }
}

/// Declared media types may carry parameters ("image/png; charset=x");
/// only the essence participates in the accepted-set check.
fn strip_type_parameters(raw: &str) -> String {
    raw.split(';').next().unwrap_or(raw).trim().to_string()
}

/// One response for every denial
///
/// Missing, expired, and malformed tokens are indistinguishable from
/// the outside; the reason survives only in logs.
fn denied_response(reason: DenyReason) -> Response {
    tracing::debug!("Access denied: {:?}", reason);

    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "NotFound".to_string(),
            message: "URL is invalid or has expired".to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_created() {
        let _router = routes();
        // Just verify it compiles
    }

    #[test]
    fn test_strip_type_parameters() {
        assert_eq!(strip_type_parameters("image/png"), "image/png");
        assert_eq!(
            strip_type_parameters("image/jpeg; charset=binary"),
            "image/jpeg"
        );
        assert_eq!(strip_type_parameters(" image/webp "), "image/webp");
    }

    #[tokio::test]
    async fn test_denials_are_indistinguishable() {
        let mut bodies = Vec::new();
        for reason in [DenyReason::Missing, DenyReason::Expired, DenyReason::Invalid] {
            let response = denied_response(reason);
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            bodies.push(body);
        }
        assert_eq!(bodies[0], bodies[1]);
        assert_eq!(bodies[1], bodies[2]);
    }
}
