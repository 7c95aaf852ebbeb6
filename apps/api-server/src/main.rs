//! api-server: HTTP adapter for the URL shortener.
//!
//! Exposes the shortener core over a small form-based API:
//! - `GET /` reports the site name and whether the admin API is enabled.
//! - `GET /:short` redirects to the stored long URL.
//! - `POST /` with `long` (and optional `short`) creates or finds a mapping;
//!   with `api=<command>` and HTTP Basic credentials it runs an admin command
//!   (`list`, `listshort`, `listlong`, `delete`).
//!
//! Storage: SQLite (default, `sqlite` feature) or in-memory.
//!
//! Run:
//! ```bash
//! ADMIN_PASSWORD=change-me SITE_DOMAIN=sho.rt cargo run -p api-server
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use admin_auth::PasswordAuthenticator;
use axum::http::header::{AUTHORIZATION, CACHE_CONTROL, HOST, LOCATION, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use domain::adapters::memory_repo::InMemoryRepo;
use domain::service::{AdminOutcome, ShortenerService, SubmitStatus};
use domain::validate::extract_host;
use domain::{CoreError, Credentials, Mapping, SystemClock, UrlStore};
use serde::Deserialize;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const NO_STORE: &str = "no-store, must-revalidate";
const NOTICE_HEADER: &str = "x-shortener-notice";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

// Local store abstraction supporting memory or sqlite (feature-gated).
enum AnyStore {
    Memory(InMemoryRepo),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite_adapter::SqliteRepo),
}

impl UrlStore for AnyStore {
    fn ensure_schema(&self) -> Result<(), CoreError> {
        match self {
            AnyStore::Memory(r) => r.ensure_schema(),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(r) => r.ensure_schema(),
        }
    }

    fn find_by_short(&self, short: &str) -> Result<Option<Mapping>, CoreError> {
        match self {
            AnyStore::Memory(r) => r.find_by_short(short),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(r) => r.find_by_short(short),
        }
    }

    fn find_by_long(&self, long: &str) -> Result<Vec<Mapping>, CoreError> {
        match self {
            AnyStore::Memory(r) => r.find_by_long(long),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(r) => r.find_by_long(long),
        }
    }

    fn find_by_long_substring(&self, fragment: &str) -> Result<Vec<Mapping>, CoreError> {
        match self {
            AnyStore::Memory(r) => r.find_by_long_substring(fragment),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(r) => r.find_by_long_substring(fragment),
        }
    }

    fn insert(&self, mapping: &Mapping) -> Result<(), CoreError> {
        match self {
            AnyStore::Memory(r) => r.insert(mapping),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(r) => r.insert(mapping),
        }
    }

    fn update(&self, short: &str, long: &str) -> Result<(), CoreError> {
        match self {
            AnyStore::Memory(r) => r.update(short, long),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(r) => r.update(short, long),
        }
    }

    fn delete(&self, short: &str) -> Result<usize, CoreError> {
        match self {
            AnyStore::Memory(r) => r.delete(short),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(r) => r.delete(short),
        }
    }

    fn delete_matching(&self, fragment: &str) -> Result<usize, CoreError> {
        match self {
            AnyStore::Memory(r) => r.delete_matching(fragment),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(r) => r.delete_matching(fragment),
        }
    }

    fn list_all(&self) -> Result<Vec<Mapping>, CoreError> {
        match self {
            AnyStore::Memory(r) => r.list_all(),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(r) => r.list_all(),
        }
    }
}

type Service = ShortenerService<AnyStore, Option<PasswordAuthenticator>, SystemClock>;

#[derive(Clone)]
struct AppState {
    service: Arc<Service>,
    site_name: String,
    site_domain: Option<String>,
    api_enabled: bool,
}

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);
    cfg.warn_if_insecure();

    let state = match build_state(&cfg) {
        Ok(s) => s,
        Err(msg) => {
            error!(%msg, "startup failed");
            std::process::exit(1);
        }
    };

    // Request ID header name
    let x_request_id = HeaderName::from_static("x-request-id");

    let app = router(state)
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid));

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, err = %e, "failed to bind");
            std::process::exit(1);
        }
    };
    info!(%addr, "api-server listening");
    if let Err(e) = axum::serve(listener, app).await {
        error!(err = %e, "server error");
        std::process::exit(1);
    }
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

// Construct the store based on config and feature flags.
fn build_store(cfg: &config::Config) -> Result<AnyStore, CoreError> {
    match cfg.storage_provider {
        #[cfg(feature = "sqlite")]
        config::StorageProvider::Sqlite => {
            info!(path = %cfg.db_path.display(), "opening sqlite store");
            Ok(AnyStore::Sqlite(sqlite_adapter::SqliteRepo::new(&cfg.db_path)?))
        }
        _ => Ok(AnyStore::Memory(InMemoryRepo::new())),
    }
}

fn build_state(cfg: &config::Config) -> Result<AppState, String> {
    let store = build_store(cfg).map_err(|e| format!("store: {e}"))?;
    let auth = cfg
        .admin
        .clone()
        .map(PasswordAuthenticator::new)
        .transpose()
        .map_err(|e| format!("admin credential: {e}"))?;
    Ok(AppState {
        service: Arc::new(ShortenerService::new(
            store,
            auth,
            SystemClock,
            cfg.shortener.clone(),
        )),
        site_name: cfg.site_name.clone(),
        site_domain: cfg.site_domain.clone(),
        api_enabled: cfg.api_enabled(),
    })
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home).post(post_root))
        .route("/:short", get(redirect_short))
        .with_state(state)
}

/// Run a blocking core call off the async executor.
async fn run_blocking<T, F>(f: F) -> Result<T, CoreError>
where
    F: FnOnce() -> Result<T, CoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .unwrap_or_else(|e| Err(CoreError::Repository(format!("worker failed: {e}"))))
}

fn error_status(e: &CoreError) -> (StatusCode, &'static str) {
    match e {
        CoreError::InvalidLongUrl => (StatusCode::BAD_REQUEST, "invalid_long_url"),
        CoreError::InvalidShort(_) => (StatusCode::BAD_REQUEST, "invalid_short"),
        CoreError::ShortTaken | CoreError::DuplicateKey => (StatusCode::CONFLICT, "short_taken"),
        CoreError::GenerationTimeout => (StatusCode::SERVICE_UNAVAILABLE, "generation_timeout"),
        CoreError::LinkBlocked => (StatusCode::FORBIDDEN, "link_blocked"),
        CoreError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        CoreError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
        CoreError::UnknownCommand(_) => (StatusCode::BAD_REQUEST, "unknown_command"),
        CoreError::MissingArgs => (StatusCode::BAD_REQUEST, "missing_args"),
        CoreError::Repository(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    }
}

fn error_response(e: &CoreError) -> Response {
    let (status, code) = error_status(e);
    let message = match e {
        CoreError::Repository(_) => {
            error!(err = %e, "storage failure");
            "Internal server error".to_string()
        }
        _ => e.to_string(),
    };
    let mut resp = (status, Json(http_common::json_fail(code, &message))).into_response();
    if status == StatusCode::UNAUTHORIZED {
        resp.headers_mut().insert(
            WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"admin\""),
        );
    }
    resp
}

fn fail(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(http_common::json_fail(code, message))).into_response()
}

/// Base URL this request is served under: the configured domain when set,
/// else the request scheme and host. Falls back to the configured base when
/// the request carries no host.
fn request_base(state: &AppState, headers: &HeaderMap) -> String {
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if state.site_domain.is_some() || host.is_empty() {
        return state.service.config().base_url.clone();
    }
    let scheme = http_common::request_scheme(
        headers
            .get(X_FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok()),
    );
    http_common::base_url(None, scheme, host)
}

async fn home(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "site_name": state.site_name,
        "api_enabled": state.api_enabled,
    }))
}

async fn redirect_short(State(state): State<AppState>, Path(short): Path<String>) -> Response {
    let svc = state.service.clone();
    let lookup = short.clone();
    match run_blocking(move || svc.resolve(&lookup)).await {
        Ok(long) => match HeaderValue::from_str(&long) {
            Ok(location) => {
                info!(short = %short, redirect_to = %long, "resolve ok");
                let mut resp = StatusCode::MOVED_PERMANENTLY.into_response();
                resp.headers_mut().insert(LOCATION, location);
                resp.headers_mut()
                    .insert(CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
                resp
            }
            Err(_) => {
                error!(short = %short, "stored long url is not a valid header value");
                fail(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal server error",
                )
            }
        },
        Err(CoreError::NotFound) => {
            warn!(short = %short, "resolve miss");
            let mut resp = StatusCode::FOUND.into_response();
            let headers = resp.headers_mut();
            headers.insert(LOCATION, HeaderValue::from_static("/"));
            headers.insert(CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
            if let Ok(notice) =
                HeaderValue::from_str(&format!("Short URL \"{}\" doesn't exist", short))
            {
                headers.insert(HeaderName::from_static(NOTICE_HEADER), notice);
            }
            resp
        }
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize, Default)]
struct PostForm {
    #[serde(default)]
    long: Option<String>,
    #[serde(default)]
    short: Option<String>,
    #[serde(default)]
    api: Option<String>,
}

async fn post_root(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<PostForm>,
) -> Response {
    if let Some(command) = form.api.filter(|c| !c.is_empty()) {
        return admin_command(state, &headers, command, form.short, form.long).await;
    }

    let Some(long) = form.long.filter(|l| !l.is_empty()) else {
        return fail(StatusCode::BAD_REQUEST, "missing_long", "Long URL required");
    };
    let custom = form.short;
    let base = request_base(&state, &headers);
    let base_host = extract_host(&base).to_string();
    let svc = state.service.clone();
    let outcome =
        run_blocking(move || svc.submit_with_base(&long, custom.as_deref(), &base_host)).await;
    match outcome {
        Ok(sub) => {
            let status = match sub.status {
                SubmitStatus::Created => StatusCode::CREATED,
                SubmitStatus::PreExisting => StatusCode::OK,
            };
            let mut body = http_common::json_ok(serde_json::json!(
                http_common::build_short_url(&base, &sub.short)
            ));
            body["short"] = serde_json::json!(sub.short);
            body["status"] = serde_json::json!(sub.status);
            (status, Json(body)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

async fn admin_command(
    state: AppState,
    headers: &HeaderMap,
    command: String,
    short: Option<String>,
    long: Option<String>,
) -> Response {
    if !state.api_enabled {
        return fail(StatusCode::FORBIDDEN, "api_disabled", "API is disabled.");
    }
    let credentials = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(http_common::parse_basic_auth)
        .map(|(user, pass)| Credentials::new(user, pass))
        .unwrap_or_default();

    let svc = state.service.clone();
    let outcome =
        run_blocking(move || svc.admin_command(&command, short, long, &credentials)).await;
    match outcome {
        Ok(AdminOutcome::Listing(map)) => {
            (StatusCode::OK, Json(http_common::json_ok(serde_json::json!(map)))).into_response()
        }
        Ok(AdminOutcome::Deleted(n)) => (
            StatusCode::OK,
            Json(http_common::json_ok(serde_json::json!(
                http_common::deleted_message(n)
            ))),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}
