//! Centralized error handling
//!
//! Handlers fail with [`AppError`]. Its response carries an [`ErrorReport`]
//! extension; the [`render_errors`] middleware logs every error response and
//! renders the final body, JSON or an HTML page depending on `Accept`.
//!
//! Response body:
//!
//! ```json
//! { "success": false, "status": 404, "message": "Article not found", "errorName": "NotFoundError" }
//! ```
//!
//! `errorName` is only sent in development. In production every 5xx message
//! is replaced by "Internal server error".

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use sqlx::error::ErrorKind;
use std::any::Any;

use crate::api::middleware::{client_ip, AppState, AuthenticatedUser};
use crate::services::summary::html_escape;
use crate::services::{
    ArticleServiceError, BillingServiceError, CollectionServiceError, CrossrefError,
    DoiReferenceServiceError, FieldError, HomeButtonServiceError, PublisherServiceError,
    TagServiceError, TokenError, UserServiceError,
};

/// Retry hint sent with 429 responses when the limiter gives none
const DEFAULT_RETRY_AFTER: u64 = 60;

/// Largest non-JSON error body read back to use as a message
const MAX_ERROR_BODY: usize = 16 * 1024;

/// Error returned by handlers
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{}", join_messages(.0))]
    Validation(Vec<FieldError>),

    /// Field errors reported under a fixed "Validation failed" message
    #[error("Validation failed")]
    ValidationFailed(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    /// Missing credentials
    #[error("{0}")]
    Unauthorized(String),

    #[error("Invalid token. Please log in again")]
    InvalidToken,

    #[error("Your token has expired. Please log in again")]
    TokenExpired,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Too many requests. Please try again later")]
    RateLimited { retry_after: u64 },

    /// A third-party API failed
    #[error("{0}")]
    Upstream(String),

    /// A feature is used without the settings it needs
    #[error("{0}")]
    Misconfigured(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

fn join_messages(errors: &[FieldError]) -> String {
    if errors.is_empty() {
        return "Validation failed".to_string();
    }
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Database failure classes recognised inside an `anyhow` chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DatabaseFailure {
    Unique,
    ForeignKey,
    Constraint,
    Other,
}

impl DatabaseFailure {
    fn find(err: &anyhow::Error) -> Option<Self> {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<sqlx::Error>())
            .map(|sql_err| match sql_err {
                sqlx::Error::Database(db_err) => match db_err.kind() {
                    ErrorKind::UniqueViolation => DatabaseFailure::Unique,
                    ErrorKind::ForeignKeyViolation => DatabaseFailure::ForeignKey,
                    ErrorKind::NotNullViolation | ErrorKind::CheckViolation => DatabaseFailure::Constraint,
                    _ => DatabaseFailure::Other,
                },
                _ => DatabaseFailure::Other,
            })
    }

    fn status(self) -> StatusCode {
        match self {
            DatabaseFailure::Unique | DatabaseFailure::ForeignKey => StatusCode::CONFLICT,
            DatabaseFailure::Constraint => StatusCode::BAD_REQUEST,
            DatabaseFailure::Other => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(self) -> &'static str {
        match self {
            DatabaseFailure::Unique => "Duplicate value violates unique constraint",
            DatabaseFailure::ForeignKey => "Related resource not found (foreign key constraint)",
            DatabaseFailure::Constraint => "Validation error",
            DatabaseFailure::Other => "Database error",
        }
    }

    fn name(self) -> &'static str {
        match self {
            DatabaseFailure::Unique => "UniqueConstraintError",
            DatabaseFailure::ForeignKey => "ForeignKeyConstraintError",
            DatabaseFailure::Constraint => "ConstraintError",
            DatabaseFailure::Other => "DatabaseError",
        }
    }
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::ValidationFailed(_) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) | AppError::InvalidToken | AppError::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Misconfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(err) => DatabaseFailure::find(err)
                .map(DatabaseFailure::status)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NotFoundError",
            AppError::Validation(_) | AppError::ValidationFailed(_) => "ValidationError",
            AppError::BadRequest(_) => "BadRequestError",
            AppError::Unauthorized(_) => "UnauthorizedError",
            AppError::InvalidToken => "JsonWebTokenError",
            AppError::TokenExpired => "TokenExpiredError",
            AppError::Forbidden(_) => "ForbiddenError",
            AppError::Conflict(_) => "ConflictError",
            AppError::RateLimited { .. } => "RateLimitError",
            AppError::Upstream(_) => "UpstreamError",
            AppError::Misconfigured(_) => "ConfigurationError",
            AppError::Internal(err) => DatabaseFailure::find(err)
                .map(DatabaseFailure::name)
                .unwrap_or("InternalError"),
        }
    }

    /// Raised on purpose by a handler or service, as opposed to an
    /// unexpected failure
    pub fn is_trusted(&self) -> bool {
        !matches!(self, AppError::Internal(_))
    }

    pub fn report(&self) -> ErrorReport {
        let (message, detail) = match self {
            AppError::Internal(err) => {
                let message = DatabaseFailure::find(err)
                    .map(|failure| failure.message().to_string())
                    .unwrap_or_else(|| err.to_string());
                (message, Some(format!("{:#}", err)))
            }
            other => (other.to_string(), None),
        };

        ErrorReport {
            status: self.status(),
            message,
            name: self.name().to_string(),
            trusted: self.is_trusted(),
            errors: match self {
                AppError::Validation(errors) | AppError::ValidationFailed(errors) => errors.clone(),
                _ => Vec::new(),
            },
            retry_after: match self {
                AppError::RateLimited { retry_after } => Some(*retry_after),
                _ => None,
            },
            detail,
        }
    }
}

/// Everything `render_errors` needs to log and render one error
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub message: String,
    pub name: String,
    pub trusted: bool,
    pub errors: Vec<FieldError>,
    pub retry_after: Option<u64>,
    /// Full cause chain; logged, never sent
    pub detail: Option<String>,
}

impl ErrorReport {
    /// Report for an error response that did not come from `AppError`
    /// (extractor rejections, unmatched methods, static file misses)
    pub fn from_status(status: StatusCode, message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Error").to_string());
        Self {
            status,
            message,
            name: if status.is_server_error() { "InternalError" } else { "HttpError" }.to_string(),
            trusted: !status.is_server_error(),
            errors: Vec::new(),
            retry_after: None,
            detail: None,
        }
    }

    /// Message as shown to the client
    pub fn public_message(&self, production: bool) -> String {
        if self.status == StatusCode::TOO_MANY_REQUESTS {
            "Too many requests. Please try again later".to_string()
        } else if production && self.status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.message.clone()
        }
    }

    pub fn to_json(&self, production: bool) -> Value {
        let mut body = json!({
            "success": false,
            "status": self.status.as_u16(),
            "message": self.public_message(production),
        });
        if !production {
            body["errorName"] = json!(self.name);
        }
        if !self.errors.is_empty() {
            body["errors"] = json!(self.errors);
        }
        if self.status == StatusCode::TOO_MANY_REQUESTS {
            body["retryAfter"] = json!(self.retry_after.unwrap_or(DEFAULT_RETRY_AFTER));
        }
        body
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let report = self.report();
        let mut response = (report.status, Json(report.to_json(false))).into_response();
        if let Some(retry_after) = report.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }
        response.extensions_mut().insert(report);
        response
    }
}

impl From<UserServiceError> for AppError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::ValidationError(errors) => AppError::Validation(errors),
            UserServiceError::EmailInUse
            | UserServiceError::InvalidCredentials
            | UserServiceError::InvalidResetToken => AppError::BadRequest(err.to_string()),
            UserServiceError::NotFound => AppError::NotFound(err.to_string()),
            UserServiceError::Token(token_err) => token_err.into(),
            UserServiceError::InternalError(e) => AppError::Internal(e),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AppError::TokenExpired,
            TokenError::Invalid(_) => AppError::InvalidToken,
            TokenError::Issue(_) => AppError::Internal(anyhow::Error::new(err)),
        }
    }
}

impl From<ArticleServiceError> for AppError {
    fn from(err: ArticleServiceError) -> Self {
        match err {
            ArticleServiceError::NotFound | ArticleServiceError::UserNotFound => {
                AppError::NotFound(err.to_string())
            }
            ArticleServiceError::ValidationError(errors) => AppError::Validation(errors),
            ArticleServiceError::LimitReached(_) => AppError::Forbidden(err.to_string()),
            ArticleServiceError::InternalError(e) => AppError::Internal(e),
        }
    }
}

impl From<TagServiceError> for AppError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::NotFound => AppError::NotFound(err.to_string()),
            TagServiceError::InternalError(e) => AppError::Internal(e),
        }
    }
}

impl From<CollectionServiceError> for AppError {
    fn from(err: CollectionServiceError) -> Self {
        match err {
            CollectionServiceError::NotFound | CollectionServiceError::NotAssigned => {
                AppError::NotFound(err.to_string())
            }
            CollectionServiceError::ValidationError(errors) => AppError::ValidationFailed(errors),
            CollectionServiceError::DuplicateName | CollectionServiceError::ArticlesNotOwned => {
                AppError::BadRequest(err.to_string())
            }
            CollectionServiceError::InternalError(e) => AppError::Internal(e),
        }
    }
}

impl From<PublisherServiceError> for AppError {
    fn from(err: PublisherServiceError) -> Self {
        match err {
            PublisherServiceError::NotFound
            | PublisherServiceError::ArticleNotFound
            | PublisherServiceError::AssociationNotFound => AppError::NotFound(err.to_string()),
            PublisherServiceError::ValidationError(errors) => AppError::Validation(errors),
            PublisherServiceError::DuplicateName => AppError::BadRequest(err.to_string()),
            PublisherServiceError::InternalError(e) => AppError::Internal(e),
        }
    }
}

impl From<CrossrefError> for AppError {
    fn from(err: CrossrefError) -> Self {
        match err {
            CrossrefError::NotFound => AppError::NotFound(err.to_string()),
            CrossrefError::Upstream(_) => AppError::Upstream("Failed to fetch DOI metadata".to_string()),
        }
    }
}

impl From<DoiReferenceServiceError> for AppError {
    fn from(err: DoiReferenceServiceError) -> Self {
        match err {
            DoiReferenceServiceError::DoiRequired => AppError::BadRequest(err.to_string()),
            DoiReferenceServiceError::NotFound => AppError::NotFound(err.to_string()),
            DoiReferenceServiceError::Crossref(e) => e.into(),
            DoiReferenceServiceError::InternalError(e) => AppError::Internal(e),
        }
    }
}

impl From<BillingServiceError> for AppError {
    fn from(err: BillingServiceError) -> Self {
        match err {
            BillingServiceError::NotConfigured => AppError::Misconfigured(err.to_string()),
            BillingServiceError::OrderIdRequired => AppError::BadRequest(err.to_string()),
            BillingServiceError::OrderNotFound => AppError::NotFound(err.to_string()),
            BillingServiceError::AlreadyCaptured => AppError::Conflict(err.to_string()),
            BillingServiceError::Upstream(message) => AppError::Upstream(message),
            BillingServiceError::InternalError(e) => AppError::Internal(e),
        }
    }
}

impl From<HomeButtonServiceError> for AppError {
    fn from(err: HomeButtonServiceError) -> Self {
        match err {
            HomeButtonServiceError::NotFound => AppError::NotFound(err.to_string()),
            HomeButtonServiceError::ValidationError(errors) => AppError::Validation(errors),
            HomeButtonServiceError::InternalError(e) => AppError::Internal(e),
        }
    }
}

/// Response for a panic caught by `CatchPanicLayer`
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    AppError::Internal(anyhow::anyhow!("Handler panicked: {}", detail)).into_response()
}

/// Request facts captured before the handler consumes the request
struct RequestContext {
    method: String,
    /// Path with query string
    path: String,
    ip: String,
    correlation_id: String,
    wants_html: bool,
    home_url: String,
}

impl RequestContext {
    fn capture(request: &Request, frontend_url: Option<&str>) -> Self {
        let headers = request.headers();
        Self {
            method: request.method().to_string(),
            path: request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or_else(|| request.uri().path())
                .to_string(),
            ip: client_ip(request),
            correlation_id: header_str(headers, "x-correlation-id")
                .unwrap_or("not-set")
                .to_string(),
            wants_html: prefers_html(header_str(headers, header::ACCEPT.as_str())),
            home_url: home_url(frontend_url, headers),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Log and render every 4xx/5xx response
pub async fn render_errors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let context = RequestContext::capture(&request, state.config.server.frontend_url.as_deref());
    let response = next.run(request).await;

    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let report = match parts.extensions.remove::<ErrorReport>() {
        Some(report) => report,
        None => {
            let message = plain_body_message(&parts.headers, body).await;
            ErrorReport::from_status(status, message)
        }
    };
    let user_id = parts
        .extensions
        .get::<AuthenticatedUser>()
        .map(|user| user.id.to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    log_report(&report, &context, &user_id);

    let production = state.config.server.environment.is_production();
    let (content_type, body) = if context.wants_html {
        let page = render_html_page(
            report.status,
            &report.public_message(production),
            &context.method,
            &context.path,
            &context.home_url,
        );
        ("text/html; charset=utf-8", Body::from(page))
    } else {
        ("application/json", Body::from(report.to_json(production).to_string()))
    };

    parts.status = report.status;
    parts.headers.remove(header::CONTENT_LENGTH);
    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if report.status == StatusCode::TOO_MANY_REQUESTS && !parts.headers.contains_key(header::RETRY_AFTER) {
        parts.headers.insert(
            header::RETRY_AFTER,
            HeaderValue::from(report.retry_after.unwrap_or(DEFAULT_RETRY_AFTER)),
        );
    }
    Response::from_parts(parts, body)
}

/// Text of a plain-text error body, as produced by extractor rejections
async fn plain_body_message(headers: &HeaderMap, body: Body) -> Option<String> {
    let is_text = header_str(headers, header::CONTENT_TYPE.as_str())
        .map(|ct| ct.starts_with("text/plain"))
        .unwrap_or(false);
    if !is_text {
        return None;
    }
    let bytes = axum::body::to_bytes(body, MAX_ERROR_BODY).await.ok()?;
    Some(String::from_utf8_lossy(&bytes).trim().to_string())
}

fn log_report(report: &ErrorReport, context: &RequestContext, user_id: &str) {
    let detail = report.detail.as_deref().unwrap_or("");
    if report.status.is_server_error() {
        tracing::error!(
            status = report.status.as_u16(),
            method = %context.method,
            path = %context.path,
            ip = %context.ip,
            correlation_id = %context.correlation_id,
            user_id = %user_id,
            error_name = %report.name,
            trusted = report.trusted,
            detail = %detail,
            "{}",
            report.message
        );
    } else {
        tracing::warn!(
            status = report.status.as_u16(),
            method = %context.method,
            path = %context.path,
            ip = %context.ip,
            correlation_id = %context.correlation_id,
            user_id = %user_id,
            error_name = %report.name,
            trusted = report.trusted,
            "{}",
            report.message
        );
    }
}

/// Whether an `Accept` header ranks HTML above JSON. A missing or empty
/// header means JSON; equal weights also mean JSON.
pub fn prefers_html(accept: Option<&str>) -> bool {
    let Some(accept) = accept.map(str::trim).filter(|a| !a.is_empty()) else {
        return false;
    };
    let ranges: Vec<(String, f32)> = accept.split(',').filter_map(parse_media_range).collect();
    quality(&ranges, "text", "html") > quality(&ranges, "application", "json")
}

fn parse_media_range(item: &str) -> Option<(String, f32)> {
    let mut parts = item.split(';');
    let media = parts.next()?.trim().to_ascii_lowercase();
    if media.is_empty() {
        return None;
    }
    let q = parts
        .filter_map(|param| {
            let (key, value) = param.split_once('=')?;
            if key.trim().eq_ignore_ascii_case("q") {
                value.trim().parse::<f32>().ok()
            } else {
                None
            }
        })
        .next()
        .unwrap_or(1.0);
    Some((media, q.clamp(0.0, 1.0)))
}

/// Weight of the most specific range matching `kind/subtype`
fn quality(ranges: &[(String, f32)], kind: &str, subtype: &str) -> f32 {
    let exact = format!("{}/{}", kind, subtype);
    let family = format!("{}/*", kind);
    [exact.as_str(), family.as_str(), "*/*"]
        .iter()
        .find_map(|candidate| ranges.iter().find(|(media, _)| media == candidate).map(|(_, q)| *q))
        .unwrap_or(0.0)
}

/// Target of the error page's "Go Home" link
fn home_url(frontend_url: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(url) = frontend_url.map(str::trim).filter(|u| !u.is_empty()) {
        return url.to_string();
    }
    [header::REFERER.as_str(), header::ORIGIN.as_str()]
        .iter()
        .filter_map(|name| header_str(headers, name))
        .find_map(origin_of)
        .unwrap_or_else(|| "/".to_string())
}

fn origin_of(raw: &str) -> Option<String> {
    let url = reqwest::Url::parse(raw).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

fn render_html_page(status: StatusCode, message: &str, method: &str, path: &str, home: &str) -> String {
    let code = status.as_u16();
    let reason = status.canonical_reason().unwrap_or("Error");
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{code} {reason}</title>
<style>
body {{ font-family: system-ui, sans-serif; background: #f5f6f8; color: #1f2933; display: flex; min-height: 100vh; align-items: center; justify-content: center; margin: 0; }}
main {{ background: #fff; padding: 2.5rem 3rem; border-radius: 12px; box-shadow: 0 4px 24px rgba(0,0,0,.08); max-width: 32rem; }}
h1 {{ margin: 0 0 .5rem; font-size: 3rem; }}
.request {{ color: #6b7280; font-family: monospace; }}
a {{ display: inline-block; margin-top: 1rem; color: #2563eb; }}
</style>
</head>
<body>
<main>
<h1>{code}</h1>
<p>{message}</p>
<p class="request">{method} {path}</p>
<a href="{home}">Go Home</a>
</main>
</body>
</html>
"#,
        code = code,
        reason = html_escape(reason),
        message = html_escape(message),
        method = html_escape(method),
        path = html_escape(path),
        home = html_escape(home),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use anyhow::Context;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::TokenExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::RateLimited { retry_after: 5 }.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(AppError::Upstream("down".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_message_joins_fields() {
        let err = AppError::Validation(vec![
            FieldError::new("title", "Title is required"),
            FieldError::new("url", "Valid URL is required"),
        ]);
        let report = err.report();
        assert_eq!(report.message, "Title is required, Valid URL is required");
        assert_eq!(report.errors.len(), 2);
        assert!(report.trusted);
    }

    #[test]
    fn test_collection_validation_uses_fixed_message() {
        let err: AppError = CollectionServiceError::ValidationError(vec![FieldError::new(
            "name",
            "Collection name is required",
        )])
        .into();
        let report = err.report();
        assert_eq!(report.status, StatusCode::BAD_REQUEST);
        assert_eq!(report.message, "Validation failed");
        assert_eq!(report.name, "ValidationError");
        assert_eq!(report.errors[0].message, "Collection name is required");
    }

    #[test]
    fn test_token_errors() {
        let expired: AppError = UserServiceError::Token(TokenError::Expired).into();
        assert_eq!(expired.to_string(), "Your token has expired. Please log in again");
        let invalid: AppError = TokenError::Invalid("bad signature".into()).into();
        assert_eq!(invalid.to_string(), "Invalid token. Please log in again");
        assert_eq!(invalid.name(), "JsonWebTokenError");
    }

    #[test]
    fn test_service_error_mapping() {
        let limit: AppError = ArticleServiceError::LimitReached(10).into();
        assert_eq!(limit.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            limit.to_string(),
            "Article limit reached. Free accounts can save up to 10 articles."
        );

        let duplicate: AppError = CollectionServiceError::DuplicateName.into();
        assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);

        let not_configured: AppError = BillingServiceError::NotConfigured.into();
        assert_eq!(not_configured.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(not_configured.is_trusted());

        let missing_doi: AppError = DoiReferenceServiceError::Crossref(CrossrefError::NotFound).into();
        assert_eq!(missing_doi.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unique_violation_through_context_chain() {
        let pool = setup_pool().await;
        insert_user(&pool, "dup@example.com").await;

        let result = sqlx::query("INSERT INTO users (name, email, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind("Again")
            .bind("dup@example.com")
            .bind(chrono::Utc::now())
            .bind(chrono::Utc::now())
            .execute(pool.sqlite().unwrap())
            .await
            .context("Failed to create user");

        let err = AppError::from(result.unwrap_err());
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert!(!err.is_trusted());
        let report = err.report();
        assert_eq!(report.message, "Duplicate value violates unique constraint");
        assert!(report.detail.unwrap().contains("Failed to create user"));
    }

    #[tokio::test]
    async fn test_foreign_key_violation() {
        let pool = setup_pool().await;
        let result = sqlx::query("INSERT INTO articles (user_id, title, url, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
            .bind(9999_i64)
            .bind("Orphan")
            .bind("https://example.com")
            .bind(chrono::Utc::now())
            .bind(chrono::Utc::now())
            .execute(pool.sqlite().unwrap())
            .await
            .context("Failed to create article");

        let err = AppError::from(result.unwrap_err());
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.report().message, "Related resource not found (foreign key constraint)");
    }

    #[test]
    fn test_non_database_internal_error() {
        let err = AppError::Internal(anyhow::anyhow!("disk full"));
        assert_eq!(err.name(), "InternalError");
        assert_eq!(err.report().message, "disk full");
    }

    #[test]
    fn test_production_masking() {
        let report = AppError::Internal(anyhow::anyhow!("secret detail")).report();
        let body = report.to_json(true);
        assert_eq!(body["message"], "Internal server error");
        assert_eq!(body["status"], 500);
        assert!(body.get("errorName").is_none());

        let dev = report.to_json(false);
        assert_eq!(dev["message"], "secret detail");
        assert_eq!(dev["errorName"], "InternalError");

        // 4xx messages survive in production
        let not_found = AppError::not_found("Article not found").report().to_json(true);
        assert_eq!(not_found["message"], "Article not found");
    }

    #[test]
    fn test_rate_limited_body() {
        let body = AppError::RateLimited { retry_after: 42 }.report().to_json(true);
        assert_eq!(body["message"], "Too many requests. Please try again later");
        assert_eq!(body["retryAfter"], 42);

        let fallback = ErrorReport::from_status(StatusCode::TOO_MANY_REQUESTS, None).to_json(false);
        assert_eq!(fallback["retryAfter"], 60);
    }

    #[test]
    fn test_prefers_html() {
        assert!(!prefers_html(None));
        assert!(!prefers_html(Some("")));
        assert!(!prefers_html(Some("application/json")));
        assert!(!prefers_html(Some("*/*")));
        assert!(prefers_html(Some("text/html")));
        assert!(prefers_html(Some(
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
        )));
        assert!(!prefers_html(Some("text/html;q=0.5, application/json")));
        assert!(prefers_html(Some("application/json;q=0.2, text/*;q=0.7")));
    }

    #[test]
    fn test_home_url() {
        let mut headers = HeaderMap::new();
        assert_eq!(home_url(None, &headers), "/");

        headers.insert(header::REFERER, HeaderValue::from_static("https://app.example.com:8443/library?x=1"));
        assert_eq!(home_url(None, &headers), "https://app.example.com:8443");
        assert_eq!(home_url(Some("https://researchlocker.co"), &headers), "https://researchlocker.co");

        let mut origin_only = HeaderMap::new();
        origin_only.insert(header::ORIGIN, HeaderValue::from_static("javascript:alert(1)"));
        assert_eq!(home_url(None, &origin_only), "/");
    }

    #[test]
    fn test_html_page_escapes_values() {
        let page = render_html_page(
            StatusCode::NOT_FOUND,
            "Route <script>alert(1)</script> not found",
            "GET",
            "/v1/<img src=x onerror=alert(1)>",
            "https://example.com/?a=\"b\"",
        );
        assert!(!page.contains("<script>alert"));
        assert!(!page.contains("<img"));
        assert!(page.contains("&lt;script&gt;"));
        assert!(page.contains("Go Home"));
        assert!(page.contains("<h1>404</h1>"));
    }

    #[test]
    fn test_panic_response() {
        let response = panic_response(Box::new("kaboom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert!(!report.trusted);
        assert!(report.message.contains("kaboom"));
    }
}
