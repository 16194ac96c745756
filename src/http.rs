//! Purpose: Plug field aliasing into axum handlers.
//! Exports: `AliasedJson`, `AliasedJsonResponse`, `AliasedQuery`, `ApiError`, `error_response`, `body_error`.
//! Role: Request extractors and a response wrapper driven by each shape's derived rule set.
//! Invariants: Error bodies use the `{"error": {...}}` envelope; kinds remain stable.
//! Invariants: Deprecated usage is logged at warn level once per request, never rejected.
//! Notes: Bodies are buffered by axum before rewriting; the body limit applies first.
use std::marker::PhantomData;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::api::{
    AliasShape, DeprecationNotice, EncodeOptions, Error, ErrorKind, NoticeSource, decode_shape,
    encode_shape, rewrite_query_pairs, rules_for,
};

/// JSON request body decoded through the shape's alias rules.
#[derive(Debug)]
pub struct AliasedJson<T> {
    pub value: T,
    pub deprecation: Option<DeprecationNotice>,
}

#[axum::async_trait]
impl<T, S> FromRequest<S> for AliasedJson<T>
where
    T: DeserializeOwned + AliasShape,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state).await.map_err(body_error)?;
        let decoded = decode_shape::<T, _>(&body[..])?;
        if let Some(notice) = &decoded.deprecation {
            log_deprecation(notice);
        }
        Ok(Self {
            value: decoded.value,
            deprecation: decoded.deprecation,
        })
    }
}

/// Query parameters with deprecated names renamed per `T`'s alias rules.
#[derive(Debug)]
pub struct AliasedQuery<T> {
    pub pairs: Vec<(String, String)>,
    pub deprecation: Option<DeprecationNotice>,
    shape: PhantomData<fn() -> T>,
}

impl<T> AliasedQuery<T> {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for AliasedQuery<T>
where
    T: AliasShape,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(raw) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri).map_err(
            |rejection| {
                Error::new(ErrorKind::Usage)
                    .with_message("invalid query string")
                    .with_source(rejection)
            },
        )?;
        let rules = rules_for::<T>();
        let rewrite = rewrite_query_pairs(raw, &rules)?;
        let deprecation =
            DeprecationNotice::from_usage(NoticeSource::Query, &rewrite.deprecated, &rules);
        if let Some(notice) = &deprecation {
            log_deprecation(notice);
        }
        Ok(Self {
            pairs: rewrite.pairs,
            deprecation,
            shape: PhantomData,
        })
    }
}

/// Response body serialized with deprecated aliases duplicated next to
/// their canonical keys.
pub struct AliasedJsonResponse<T>(pub T);

impl<T> IntoResponse for AliasedJsonResponse<T>
where
    T: Serialize + AliasShape,
{
    fn into_response(self) -> Response {
        match encode_shape(&self.0, EncodeOptions::compact()) {
            Ok(bytes) => json_bytes_response(StatusCode::OK, bytes),
            Err(err) => error_response(err),
        }
    }
}

/// Maps a failed body read; an exceeded body limit is a `Limit` error.
pub fn body_error(rejection: BytesRejection) -> Error {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return Error::new(ErrorKind::Limit)
            .with_message("request body exceeds size limit")
            .with_hint("Send a smaller body or raise --max-body-bytes.");
    }
    Error::new(ErrorKind::Io)
        .with_message("failed to read request body")
        .with_source(rejection)
}

pub fn json_bytes_response(status: StatusCode, bytes: Vec<u8>) -> Response {
    let mut response = (status, bytes).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

pub fn log_deprecation(notice: &DeprecationNotice) {
    let [(_, fields), (_, warning)] = notice.key_values();
    tracing::warn!(
        deprecated_fields = %fields,
        deprecation_warning = %warning,
        "deprecated field names used"
    );
}

#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error_response(self.0)
    }
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<u64>,
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Usage | ErrorKind::Conflict => StatusCode::BAD_REQUEST,
        ErrorKind::Limit => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::Io | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(err: Error) -> Response {
    let status = status_for(err.kind());
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    let body = ErrorEnvelope {
        error: ErrorBody {
            kind: format!("{:?}", err.kind()),
            message: err.message().unwrap_or("error").to_string(),
            hint: err.hint().map(str::to_string),
            offset: err.offset(),
        },
    };
    (status, Json(body)).into_response()
}
