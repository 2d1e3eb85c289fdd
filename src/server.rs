//! HTTP upload front end.
//!
//! Serves an upload form, accepts a `.jsonl` file as multipart field `file`,
//! and answers with the rendered workbook as an attachment. Failures
//! re-render the form with a message so the user can try again.

use crate::config::Config;
use crate::error::ProcessingError;
use crate::report::{build_report, ReportStyle, REPORT_FILENAME, XLSX_MIME_TYPE};
use anyhow::{Context, Result};
use axum::{
    body::{Body, Bytes},
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

const TOTAL_SOLD_HEADER: HeaderName = HeaderName::from_static("x-total-sold");
const NULL_SKU_TOTAL_HEADER: HeaderName = HeaderName::from_static("x-null-sku-total");

#[derive(Clone)]
struct AppState {
    style: Arc<ReportStyle>,
    allowed_extensions: Arc<Vec<String>>,
}

/// Errors surfaced to the uploader. Each one re-renders the form.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file selected")]
    NoFileSelected,

    #[error("Only files with the {0} extension are allowed")]
    DisallowedExtension(String),

    #[error("Failed to read upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Error processing file: {0}")]
    Processing(#[from] ProcessingError),

    #[error("Error processing file: worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl UploadError {
    fn status(&self) -> StatusCode {
        match self {
            UploadError::NoFileSelected | UploadError::DisallowedExtension(_) => {
                StatusCode::BAD_REQUEST
            }
            UploadError::Multipart(e) => e.status(),
            UploadError::Processing(_) | UploadError::Worker(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Upload failed: {}", self);
        }
        (status, Html(render_form(Some(&self.to_string())))).into_response()
    }
}

/// Build the application router.
pub fn router(config: &Config) -> Result<Router, ProcessingError> {
    let state = AppState {
        style: Arc::new(ReportStyle::try_from(&config.report)?),
        allowed_extensions: Arc::new(config.server.allowed_extensions.clone()),
    };

    Ok(Router::new()
        .route("/", get(upload_form).post(upload_report))
        .route("/api/health", get(health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes())))
}

/// Bind and serve until the process is stopped.
pub async fn run(config: &Config) -> Result<()> {
    let app = router(config).context("Invalid report settings")?;

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let local_addr = listener.local_addr()?;
    info!("serve listening on http://{local_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"ok": true}))
}

async fn upload_form() -> Html<String> {
    Html(render_form(None))
}

async fn upload_report(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, UploadError> {
    let (filename, bytes) = read_file_field(&mut multipart)
        .await?
        .ok_or(UploadError::NoFileSelected)?;

    if !is_allowed_file(&filename, &state.allowed_extensions) {
        return Err(UploadError::DisallowedExtension(describe_extensions(
            &state.allowed_extensions,
        )));
    }

    info!("Processing upload '{}' ({} bytes)", filename, bytes.len());

    let style = Arc::clone(&state.style);
    let report = tokio::task::spawn_blocking(move || {
        build_report(bytes.split_inclusive(|&b| b == b'\n'), &style)
    })
    .await??;

    info!(
        "Report for '{}': total {} ({} without SKU)",
        filename, report.grand_total, report.null_sku_total
    );

    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static(XLSX_MIME_TYPE)),
        (
            header::CONTENT_DISPOSITION,
            HeaderValue::from_str(&format!("attachment; filename=\"{}\"", REPORT_FILENAME))
                .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
        ),
        (TOTAL_SOLD_HEADER, HeaderValue::from(report.grand_total)),
        (NULL_SKU_TOTAL_HEADER, HeaderValue::from(report.null_sku_total)),
    ];

    Ok((StatusCode::OK, headers, Body::from(report.workbook)).into_response())
}

/// Find the `file` field. Returns `None` when it is missing or has no filename.
async fn read_file_field(
    multipart: &mut Multipart,
) -> Result<Option<(String, Bytes)>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Ok(None),
        };

        let bytes = field.bytes().await?;
        return Ok(Some((filename, bytes)));
    }

    Ok(None)
}

/// Case-insensitive extension check against the allow-list.
pub fn is_allowed_file(filename: &str, allowed: &[String]) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

fn describe_extensions(allowed: &[String]) -> String {
    allowed
        .iter()
        .map(|ext| format!(".{}", ext))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_form(message: Option<&str>) -> String {
    let flash = message
        .map(|m| format!("    <p class=\"flash\">{}</p>\n", escape_html(m)))
        .unwrap_or_default();

    format!(
        r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8">
    <title>Sales Report</title>
  </head>
  <body>
    <h1>Upload a JSONL sales export</h1>
{flash}    <form method="post" enctype="multipart/form-data">
      <input type="file" name="file" accept=".jsonl">
      <input type="submit" value="Build report">
    </form>
  </body>
</html>
"#
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const BOUNDARY: &str = "salesreport-test-boundary";

    fn multipart_request(field: &str, filename: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\
             \r\n\
             {content}\r\n\
             --{BOUNDARY}--\r\n"
        );

        Request::builder()
            .method("POST")
            .uri("/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Bytes) {
        let app = router(&Config::default()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, body)
    }

    #[test]
    fn test_is_allowed_file() {
        let allowed = vec!["jsonl".to_string()];
        assert!(is_allowed_file("sales.jsonl", &allowed));
        assert!(is_allowed_file("SALES.JSONL", &allowed));
        assert!(is_allowed_file("archive.2024.jsonl", &allowed));
        assert!(!is_allowed_file("sales.json", &allowed));
        assert!(!is_allowed_file("jsonl", &allowed));
        assert!(!is_allowed_file("sales.jsonl.csv", &allowed));
    }

    #[test]
    fn test_form_escapes_message() {
        let html = render_form(Some("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(!render_form(None).contains("flash"));
    }

    #[tokio::test]
    async fn test_upload_returns_workbook() {
        let content = "{\"product_variant_sku\":\"A1\",\"net_items_sold\":3}\n\
                       {\"product_variant_sku\":\"A1\",\"net_items_sold\":2}\n\
                       {\"net_items_sold\":5}";
        let (status, headers, body) = send(multipart_request("file", "sales.jsonl", content)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], XLSX_MIME_TYPE);
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"sales_report.xlsx\""
        );
        assert_eq!(headers["x-total-sold"], "10");
        assert_eq!(headers["x-null-sku-total"], "5");
        assert!(body.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn test_upload_rejects_other_extensions() {
        let (status, _, body) = send(multipart_request("file", "sales.csv", "a,b")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("Only files with the .jsonl extension are allowed"));
        assert!(html.contains("<form"));
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let (status, _, body) = send(multipart_request("other", "sales.jsonl", "{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(String::from_utf8_lossy(&body).contains("No file selected"));

        let (status, _, _) = send(multipart_request("file", "", "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_form_and_health() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let (status, _, body) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8_lossy(&body).contains("name=\"file\""));

        let request = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_router_rejects_bad_style() {
        let mut config = Config::default();
        config.report.header_color = "nope".to_string();
        assert!(router(&config).is_err());
    }
}
