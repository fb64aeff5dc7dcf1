//! API middleware
//!
//! Contains middleware for:
//! - Authentication (bearer access token)
//! - Per-IP request rate limiting
//! - Security response headers and CORS

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::error::AppError;
use crate::config::{Config, ServerConfig};
use crate::cache::MemoryCache;
use crate::db::repositories::{
    SqlxArticleRepository, SqlxBillingRepository, SqlxCollectionRepository,
    SqlxDoiReferenceRepository, SqlxHomeButtonRepository, SqlxPasswordResetRepository,
    SqlxPublisherRepository, SqlxTagRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::services::{
    ArticleService, AuthorService, BillingService, CollectionService, CrossrefClient,
    DoiReferenceService, EmailService, HomeButtonService, Mailer, PublisherService,
    RequestRateLimiter, TagService, TokenService, UserService,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub user_service: Arc<UserService>,
    pub article_service: Arc<ArticleService>,
    pub tag_service: Arc<TagService>,
    pub author_service: Arc<AuthorService>,
    pub collection_service: Arc<CollectionService>,
    pub publisher_service: Arc<PublisherService>,
    pub doi_reference_service: Arc<DoiReferenceService>,
    pub crossref: Arc<CrossrefClient>,
    pub billing_service: Arc<BillingService>,
    pub home_button_service: Arc<HomeButtonService>,
    pub rate_limiter: Arc<RequestRateLimiter>,
}

impl AppState {
    /// Wire repositories and services over a migrated pool
    pub fn new(pool: DynDatabasePool, config: Config) -> anyhow::Result<Self> {
        let mailer: Arc<dyn Mailer> = Arc::new(EmailService::new(config.email.clone()));
        Self::with_mailer(pool, config, mailer)
    }

    pub fn with_mailer(
        pool: DynDatabasePool,
        config: Config,
        mailer: Arc<dyn Mailer>,
    ) -> anyhow::Result<Self> {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let reset_repo = SqlxPasswordResetRepository::boxed(pool.clone());
        let article_repo = SqlxArticleRepository::boxed(pool.clone());
        let tag_repo = SqlxTagRepository::boxed(pool.clone());
        let billing_repo = SqlxBillingRepository::boxed(pool.clone());

        let frontend_url = config.server.frontend_base_url();
        let user_service = Arc::new(UserService::new(
            user_repo.clone(),
            reset_repo,
            TokenService::new(&config.auth.jwt_secret, config.auth.token_ttl_days),
            mailer,
            frontend_url.clone(),
            config.auth.reset_token_ttl_minutes,
        ));
        let article_service = Arc::new(ArticleService::new(
            article_repo.clone(),
            tag_repo.clone(),
            user_repo,
            billing_repo.clone(),
            config.plans.free_article_limit,
        ));
        let tag_service = Arc::new(TagService::new(
            tag_repo,
            article_repo.clone(),
            article_service.clone(),
        ));
        let crossref = Arc::new(CrossrefClient::new(
            &config.crossref,
            Arc::new(MemoryCache::new()),
        )?);
        let rate_limiter = Arc::new(RequestRateLimiter::new(
            u32::try_from(config.rate_limit.max_requests).unwrap_or(u32::MAX),
            config.rate_limit.window_seconds,
        ));

        Ok(Self {
            author_service: Arc::new(AuthorService::new(article_repo.clone())),
            collection_service: Arc::new(CollectionService::new(
                SqlxCollectionRepository::boxed(pool.clone()),
                article_repo.clone(),
            )),
            publisher_service: Arc::new(PublisherService::new(
                SqlxPublisherRepository::boxed(pool.clone()),
                article_repo,
            )),
            doi_reference_service: Arc::new(DoiReferenceService::new(
                SqlxDoiReferenceRepository::boxed(pool.clone()),
                crossref.clone(),
            )),
            billing_service: Arc::new(BillingService::new(
                billing_repo,
                config.paypal.clone(),
                frontend_url,
            )?),
            home_button_service: Arc::new(HomeButtonService::new(SqlxHomeButtonRepository::boxed(
                pool.clone(),
            ))),
            user_service,
            article_service,
            tag_service,
            crossref,
            rate_limiter,
            config: Arc::new(config),
            pool,
        })
    }
}

/// Id of the user a valid access token was issued to
///
/// Inserted into request extensions by [`require_auth`], and into the
/// response extensions so error logs can name the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: i64,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .copied()
            .ok_or_else(|| AppError::Unauthorized("No token".to_string()))
    }
}

static RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
static RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
static RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Token from `Authorization: Bearer <token>`
fn extract_bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(&request)
        .ok_or_else(|| AppError::Unauthorized("No token".to_string()))?;
    let claims = state.user_service.verify_token(token)?;

    let user = AuthenticatedUser { id: claims.id };
    request.extensions_mut().insert(user);
    let mut response = next.run(request).await;
    response.extensions_mut().insert(user);
    Ok(response)
}

/// Client address: first `X-Forwarded-For` entry, else the peer address
pub fn client_ip(request: &Request) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Global rate limit with `RateLimit-*` headers on every response
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let ip = client_ip(&request);
    let decision = state.rate_limiter.check(&ip).await;

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        tracing::debug!(ip = %ip, "Rate limit exceeded");
        AppError::RateLimited {
            retry_after: decision.reset_seconds.max(1),
        }
        .into_response()
    };

    let headers = response.headers_mut();
    headers.insert(RATE_LIMIT_LIMIT.clone(), HeaderValue::from(decision.limit));
    headers.insert(RATE_LIMIT_REMAINING.clone(), HeaderValue::from(decision.remaining));
    headers.insert(RATE_LIMIT_RESET.clone(), HeaderValue::from(decision.reset_seconds));
    response
}

/// Unmatched routes
pub async fn route_not_found(State(state): State<AppState>, request: Request) -> AppError {
    if state.config.server.environment.is_production() {
        AppError::not_found("Not found")
    } else {
        let target = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| request.uri().path());
        AppError::not_found(format!("Route {} not found", target))
    }
}

/// Content-Security-Policy for API responses and served uploads
pub fn content_security_policy(server: &ServerConfig) -> String {
    let mut connect_src = vec!["'self'".to_string()];
    connect_src.extend(server.connect_src.iter().cloned());
    [
        "default-src 'self'".to_string(),
        "base-uri 'self'".to_string(),
        format!("connect-src {}", connect_src.join(" ")),
        "img-src 'self' data: https:".to_string(),
        "font-src 'self' https: data:".to_string(),
        "style-src 'self' 'unsafe-inline'".to_string(),
        "script-src 'self'".to_string(),
        "object-src 'none'".to_string(),
        "frame-ancestors 'self'".to_string(),
    ]
    .join("; ")
}

/// Apply the headers set on every response
pub fn with_security_headers<S>(router: Router<S>, server: &ServerConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let csp = HeaderValue::from_str(&content_security_policy(server)).unwrap_or_else(|_| {
        tracing::warn!("connect_src produced an invalid header, using the default policy");
        HeaderValue::from_static("default-src 'self'")
    });

    router
        .layer(SetResponseHeaderLayer::overriding(header::CONTENT_SECURITY_POLICY, csp))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("cross-origin-resource-policy"),
            HeaderValue::from_static("cross-origin"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
}

/// Whether a browser origin may call the API with credentials
pub fn is_allowed_origin(origin: &str, allowed: &[String]) -> bool {
    origin.starts_with("chrome-extension://")
        || allowed
            .iter()
            .any(|candidate| candidate.trim_end_matches('/') == origin)
}

/// CORS for the SPA and the browser extension
pub fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let allowed = server.cors_origins.clone();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .map(|origin| is_allowed_origin(origin, &allowed))
                .unwrap_or(false)
        }))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static("x-correlation-id"),
        ])
        .expose_headers([
            RATE_LIMIT_LIMIT.clone(),
            RATE_LIMIT_REMAINING.clone(),
            RATE_LIMIT_RESET.clone(),
        ])
        .allow_credentials(true)
}
