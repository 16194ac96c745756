//! Purpose: Provide the HTTP/JSON normalization server for fieldalias.
//! Exports: `ServeConfig`, `serve`, `router`, `validate_config`, `init_tracing`.
//! Role: Axum-based loopback server that applies a configured rule set to posted documents.
//! Invariants: Error envelopes come from `http::error_response`; kinds remain stable.
//! Invariants: Loopback-only unless explicitly allowed.
//! Notes: Bodies are buffered up to `max_body_bytes` before any transform runs.

use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::json;
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::api::{
    DeprecationNotice, DuplicateOptions, Error, ErrorKind, NoticeSource, RewriteOptions, RuleSet,
    duplicate_document, normalize_json, rewrite_query_pairs,
};
use crate::http::{body_error, error_response, json_bytes_response, log_deprecation};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub rules: RuleSet,
    pub allow_non_loopback: bool,
    pub max_body_bytes: u64,
    pub max_depth: Option<usize>,
    pub compact: bool,
}

#[derive(Clone)]
struct AppState {
    rules: Arc<RuleSet>,
    rewrite: RewriteOptions,
    duplicate: DuplicateOptions,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    init_tracing("info");

    let bind = config.bind;
    let rule_count = config.rules.len();
    let app = router(config)?;

    let listener = tokio::net::TcpListener::bind(bind).await.map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to bind server")
            .with_source(err)
    })?;
    tracing::info!(%bind, rules = rule_count, "fieldalias server listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

/// Builds the application router; `config` must already be validated.
pub fn router(config: ServeConfig) -> Result<Router, Error> {
    let max_body_bytes: usize = config
        .max_body_bytes
        .try_into()
        .map_err(|_| Error::new(ErrorKind::Usage).with_message("--max-body-bytes is too large"))?;

    let state = Arc::new(AppState {
        rules: Arc::new(config.rules),
        rewrite: RewriteOptions {
            max_depth: config.max_depth,
        },
        duplicate: DuplicateOptions {
            compact: config.compact,
            max_depth: config.max_depth,
        },
    });

    Ok(Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/rules", get(list_rules))
        .route("/v1/normalize", post(normalize))
        .route("/v1/duplicate", post(duplicate))
        .route("/v1/query", get(query))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

pub fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }

    if config.max_body_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes must be greater than zero")
            .with_hint("Use a positive value like 1048576."));
    }

    if config.max_body_bytes > usize::MAX as u64 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes exceeds platform limits")
            .with_hint("Use a smaller value that fits in memory."));
    }

    if config.max_depth == Some(0) {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-depth must be greater than zero")
            .with_hint("Omit the flag for unbounded nesting or use a value like 64."));
    }

    if config.rules.is_empty() {
        tracing::warn!("serving with an empty rule set; documents pass through unchanged");
    }
    Ok(())
}

/// Installs the global subscriber once; later calls are no-ops.
/// Events go to stderr so filter commands keep stdout clean.
pub fn init_tracing(default_directive: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

async fn healthz(State(state): State<Arc<AppState>>) -> Response {
    Json(json!({ "ok": true, "rules": state.rules.len() })).into_response()
}

async fn list_rules(State(state): State<Arc<AppState>>) -> Response {
    Json(json!({ "rules": state.rules.as_ref() })).into_response()
}

async fn normalize(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(body_error(rejection)),
    };
    match normalize_json(&body, &state.rules, state.rewrite) {
        Ok(normalized) => {
            if let Some(notice) = &normalized.deprecation {
                log_deprecation(notice);
            }
            json_bytes_response(StatusCode::OK, normalized.bytes)
        }
        Err(err) => error_response(err),
    }
}

async fn duplicate(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(body_error(rejection)),
    };
    match duplicate_document(&body, &state.rules, state.duplicate) {
        Ok(bytes) => json_bytes_response(StatusCode::OK, bytes),
        Err(err) => error_response(err),
    }
}

async fn query(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    let raw = match Query::<Vec<(String, String)>>::try_from_uri(&uri) {
        Ok(Query(raw)) => raw,
        Err(rejection) => {
            return error_response(
                Error::new(ErrorKind::Usage)
                    .with_message("invalid query string")
                    .with_source(rejection),
            );
        }
    };
    match rewrite_query_pairs(raw, &state.rules) {
        Ok(rewrite) => {
            let notice = DeprecationNotice::from_usage(
                NoticeSource::Query,
                &rewrite.deprecated,
                &state.rules,
            );
            if let Some(notice) = &notice {
                log_deprecation(notice);
            }
            Json(json!({
                "params": rewrite.pairs,
                "deprecated": rewrite.deprecated,
            }))
            .into_response()
        }
        Err(err) => error_response(err),
    }
}
