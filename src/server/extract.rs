use crate::error::AppError;
use crate::server::error::ApiError;
use crate::service::ActivityInput;
use axum::Json;
use axum::extract::{FromRequest, Multipart, Query, Request};
use axum::http::{StatusCode, header};
use serde::Deserialize;
use tracing::debug;

/// Activity export plus optional question, read from a multipart form,
/// a JSON body or a raw HTML body.
pub struct ActivityPayload(pub ActivityInput);

#[derive(Debug, Default, Deserialize)]
struct ActivityFields {
    #[serde(default, alias = "html", alias = "content")]
    html_content: Option<String>,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    timeframe: Option<String>,
}

impl<S: Send + Sync> FromRequest<S> for ActivityPayload {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        // Query-string values apply to every body type; body fields take precedence.
        let params = Query::<ActivityFields>::try_from_uri(req.uri())
            .map(|Query(p)| p)
            .unwrap_or_default();

        let mut input = if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| body_rejection(e.status(), e.body_text()))?;
            read_multipart(multipart).await?
        } else if content_type.starts_with("application/json") {
            let Json(fields) = Json::<ActivityFields>::from_request(req, state)
                .await
                .map_err(|e| body_rejection(e.status(), e.body_text()))?;
            ActivityInput {
                html: fields.html_content,
                query: fields.query,
                timeframe: fields.timeframe,
            }
        } else if content_type.is_empty()
            || content_type.starts_with("text/html")
            || content_type.starts_with("text/plain")
        {
            let body = String::from_request(req, state)
                .await
                .map_err(|e| body_rejection(e.status(), e.body_text()))?;
            ActivityInput {
                html: Some(body),
                ..Default::default()
            }
        } else {
            return Err(AppError::validation(format!(
                "unsupported content type '{content_type}'; send multipart/form-data, application/json or text/html"
            ))
            .into());
        };

        input.html = input.html.or(params.html_content);
        input.query = input.query.or(params.query);
        input.timeframe = input.timeframe.or(params.timeframe);

        Ok(ActivityPayload(input))
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<ActivityInput, ApiError> {
    let mut input = ActivityInput::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| body_rejection(e.status(), e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" | "html_content" => {
                if let Some(file_name) = field.file_name() {
                    if !is_html_file_name(file_name) {
                        return Err(AppError::validation("Please upload an HTML file").into());
                    }
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| body_rejection(e.status(), e.body_text()))?;
                let html = String::from_utf8(bytes.to_vec())
                    .map_err(|_| AppError::validation("uploaded file is not valid UTF-8"))?;
                input.html = Some(html);
            }
            "query" | "timeframe" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| body_rejection(e.status(), e.body_text()))?;
                if name == "query" {
                    input.query = Some(value);
                } else {
                    input.timeframe = Some(value);
                }
            }
            other => debug!("Ignoring multipart field '{}'", other),
        }
    }

    Ok(input)
}

/// Body-limit rejections keep their 413; every other extractor rejection is a bad request.
fn body_rejection(status: StatusCode, message: String) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(message)
    } else {
        AppError::validation(message)
    }
}

/// Blank names are accepted; some clients omit them.
fn is_html_file_name(name: &str) -> bool {
    let lower = name.trim().to_ascii_lowercase();
    lower.is_empty() || lower.ends_with(".html") || lower.ends_with(".htm")
}
