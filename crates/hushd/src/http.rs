//! HTTP adapter: JSON in, JSON or raw bytes out
//!
//!   POST /new                  store a secret, answer with its link
//!   GET  /get/{id}[/{key}]     describe a secret without consuming it
//!   POST /reveal/{id}[/{key}]  consume a secret

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};
use zeroize::Zeroize;

use hush_core::{HushError, KeyMode, NewSecret, Outcome, RevealRequest, SecretKind};
use hush_store::AtomicRecordStore;
use hush_vault::Vault;

use crate::disposition;
use crate::metrics::HushMetrics;

/// Slack on top of the payload limit for base64 inflation and JSON framing
const BODY_OVERHEAD: usize = 64 * 1024;

pub struct AppState<S> {
    pub vault: Arc<Vault<S>>,
    pub metrics: HushMetrics,
    /// Overrides the link base otherwise taken from request headers
    pub public_url: Option<String>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            vault: self.vault.clone(),
            metrics: self.metrics.clone(),
            public_url: self.public_url.clone(),
        }
    }
}

pub fn router<S: AtomicRecordStore + 'static>(state: AppState<S>) -> Router {
    let max_payload = state.vault.settings().max_payload_bytes;
    let body_limit = max_payload
        .saturating_add(max_payload / 3)
        .saturating_add(BODY_OVERHEAD);

    Router::new()
        .route("/new", post(create_secret::<S>))
        .route("/get/{id}", get(probe_server::<S>))
        .route("/get/{id}/{key}", get(probe_link::<S>))
        .route("/reveal/{id}", post(reveal_server::<S>))
        .route("/reveal/{id}/{key}", post(reveal_link::<S>))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Why an inbound request could not be turned into a secret
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("malformed JSON body: {0}")]
    Json(String),

    #[error("no data supplied")]
    MissingPayload,

    #[error("supply either data or data_base64, not both")]
    AmbiguousPayload,

    #[error("file upload without filename")]
    MissingFilename,

    #[error("data_base64 is not valid base64")]
    Base64(#[from] base64::DecodeError),

    #[error("no Host header and no public_url configured")]
    MissingHost,
}

impl From<JsonRejection> for RequestError {
    fn from(e: JsonRejection) -> Self {
        RequestError::Json(e.body_text())
    }
}

impl From<RequestError> for HushError {
    fn from(e: RequestError) -> Self {
        HushError::InvalidRequest(e.to_string())
    }
}

#[derive(Deserialize)]
struct NewSecretBody {
    data: Option<String>,
    data_base64: Option<String>,
    filename: Option<String>,
    password: Option<String>,
}

impl Drop for NewSecretBody {
    fn drop(&mut self) {
        self.data.zeroize();
        self.data_base64.zeroize();
        self.password.zeroize();
    }
}

impl TryFrom<NewSecretBody> for NewSecret {
    type Error = RequestError;

    fn try_from(mut body: NewSecretBody) -> Result<Self, RequestError> {
        let secret = match (body.data.take(), body.data_base64.as_deref()) {
            (Some(_), Some(_)) => return Err(RequestError::AmbiguousPayload),
            (None, None) => return Err(RequestError::MissingPayload),
            (Some(text), None) => NewSecret::text(text),
            (None, Some(encoded)) => {
                let filename = body
                    .filename
                    .take()
                    .filter(|name| !name.trim().is_empty())
                    .ok_or(RequestError::MissingFilename)?;
                NewSecret::file(STANDARD.decode(encoded.trim())?, filename)
            }
        };

        Ok(match body.password.take() {
            Some(password) => secret.with_password(password),
            None => secret,
        })
    }
}

#[derive(Deserialize, Default)]
struct RevealBody {
    password: Option<String>,
}

impl Drop for RevealBody {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

/// Error response with a JSON `{"status":"error","msg":...}` body
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    msg: String,
}

impl ApiError {
    fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            msg: msg.into(),
        }
    }

    fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "status": "error", "msg": self.msg }));
        (self.status, no_store(), body).into_response()
    }
}

impl From<HushError> for ApiError {
    fn from(e: HushError) -> Self {
        if e.is_client_error() {
            debug!(error = %e, "rejected request");
            Self::new(StatusCode::BAD_REQUEST, e.to_string())
        } else {
            error!(error = %e, "request failed");
            Self::internal()
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(e: RequestError) -> Self {
        HushError::from(e).into()
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        error!(error = %e, "blocking task failed");
        Self::internal()
    }
}

fn no_store() -> [(header::HeaderName, HeaderValue); 1] {
    [(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))]
}

fn not_found(msg: &str) -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, msg)
}

const GONE_MSG: &str = "secret does not exist or was already revealed";
const WRONG_CREDENTIAL_MSG: &str = "wrong password or key, the secret has been destroyed";

async fn create_secret<S: AtomicRecordStore + 'static>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    body: Result<Json<NewSecretBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(RequestError::from)?;
    let secret = NewSecret::try_from(body)?;
    let base = link_base(state.public_url.as_deref(), &headers)?;

    let vault = state.vault.clone();
    let created = tokio::task::spawn_blocking(move || vault.create(secret)).await??;
    state.metrics.record_created();

    let link = format!("{base}/get/{}", created.link_path());
    let body = Json(json!({ "status": "ok", "secret_link": link }));
    Ok((StatusCode::CREATED, no_store(), body).into_response())
}

async fn probe_link<S: AtomicRecordStore + 'static>(
    State(state): State<AppState<S>>,
    Path((id, key)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    probe(state, id, Some(key)).await
}

async fn probe_server<S: AtomicRecordStore + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    probe(state, id, None).await
}

async fn probe<S: AtomicRecordStore + 'static>(
    state: AppState<S>,
    id: String,
    key: Option<String>,
) -> Result<Response, ApiError> {
    if !key_shape_matches(state.vault.settings().mode, key.as_deref()) {
        return Err(not_found(GONE_MSG));
    }

    let vault = state.vault.clone();
    let kind = tokio::task::spawn_blocking(move || vault.probe(&id)).await??;
    match kind {
        Some(SecretKind { is_file, password }) => {
            let body = Json(json!({ "status": "ok", "file": is_file, "password": password }));
            Ok((StatusCode::OK, no_store(), body).into_response())
        }
        None => Err(not_found(GONE_MSG)),
    }
}

/// Link mode wants a well-formed key in the URL, server mode wants none.
fn key_shape_matches(mode: KeyMode, key: Option<&str>) -> bool {
    match (mode, key) {
        (KeyMode::Link, Some(key)) => hush_crypto::decode_link_key(key).is_ok(),
        (KeyMode::Server, None) => true,
        _ => false,
    }
}

async fn reveal_link<S: AtomicRecordStore + 'static>(
    State(state): State<AppState<S>>,
    Path((id, key)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, ApiError> {
    reveal(state, RevealRequest::new(id, Some(key)), body).await
}

async fn reveal_server<S: AtomicRecordStore + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    reveal(state, RevealRequest::new(id, None), body).await
}

async fn reveal<S: AtomicRecordStore + 'static>(
    state: AppState<S>,
    request: RevealRequest,
    body: Bytes,
) -> Result<Response, ApiError> {
    let mut body: RevealBody = if body.iter().all(u8::is_ascii_whitespace) {
        RevealBody::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| RequestError::Json(e.to_string()))?
    };
    let request = match body.password.take().filter(|pw| !pw.is_empty()) {
        Some(password) => request.with_password(password),
        None => request,
    };

    // The blocking task finishes even if the client goes away, so a claimed
    // record is always destroyed.
    let vault = state.vault.clone();
    let outcome = match tokio::task::spawn_blocking(move || vault.reveal(request)).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            state.metrics.record_reveal_error();
            return Err(e.into());
        }
        Err(e) => {
            state.metrics.record_reveal_error();
            return Err(e.into());
        }
    };
    state.metrics.record_reveal(&outcome);

    match outcome {
        Outcome::Delivered(mut revealed) => {
            let bytes = std::mem::take(&mut *revealed.plaintext);
            let response = match revealed.filename.as_deref() {
                None => (
                    StatusCode::GONE,
                    no_store(),
                    [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                    Body::from(bytes),
                )
                    .into_response(),
                Some(name) => {
                    let disposition = HeaderValue::from_str(&disposition::attachment(name))
                        .map_err(|_| ApiError::internal())?;
                    (
                        StatusCode::OK,
                        no_store(),
                        [
                            (
                                header::CONTENT_TYPE,
                                HeaderValue::from_static("application/octet-stream"),
                            ),
                            (header::CONTENT_DISPOSITION, disposition),
                        ],
                        Body::from(bytes),
                    )
                        .into_response()
                }
            };
            Ok(response)
        }
        Outcome::AlreadyRevealedOrInvalid => Err(not_found(GONE_MSG)),
        Outcome::WrongCredential => Err(not_found(WRONG_CREDENTIAL_MSG)),
    }
}

/// `<scheme>://<host>` for share links.
fn link_base(public_url: Option<&str>, headers: &HeaderMap) -> Result<String, RequestError> {
    if let Some(url) = public_url {
        return Ok(url.trim_end_matches('/').to_string());
    }

    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or(v).trim())
            .filter(|v| !v.is_empty())
    };

    let scheme = match header_str("x-forwarded-proto") {
        Some("https") => "https",
        _ => "http",
    };
    let host = header_str("x-forwarded-host")
        .or_else(|| header_str("host"))
        .ok_or(RequestError::MissingHost)?;
    Ok(format!("{scheme}://{host}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use hush_crypto::{KdfParams, SecretKey};
    use hush_store::MemoryRecordStore;
    use hush_vault::VaultSettings;
    use tower::ServiceExt;

    fn fast_kdf() -> KdfParams {
        KdfParams {
            mem_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn app_with(settings: VaultSettings) -> (Router, Arc<Vault<MemoryRecordStore>>) {
        let vault = Arc::new(Vault::new(MemoryRecordStore::new(8), settings).unwrap());
        let state = AppState {
            vault: vault.clone(),
            metrics: HushMetrics::default(),
            public_url: None,
        };
        (router(state), vault)
    }

    fn app() -> (Router, Arc<Vault<MemoryRecordStore>>) {
        app_with(VaultSettings::link().with_kdf(fast_kdf()))
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, bytes.to_vec())
    }

    fn post_json(path: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(path)
            .header("host", "secrets.example")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn create(app: &Router, body: serde_json::Value) -> String {
        let (status, _, bytes) = send(app, post_json("/new", body)).await;
        assert_eq!(status, StatusCode::CREATED);
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let link = json["secret_link"].as_str().unwrap();
        link.strip_prefix("http://secrets.example/get/")
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_text_secret_is_gone_after_reveal() {
        let (app, _) = app();
        let path = create(&app, json!({ "data": "hello" })).await;

        let (status, headers, body) = send(
            &app,
            Request::get(format!("/get/{path}")).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CACHE_CONTROL], "no-store");
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["file"], false);
        assert_eq!(json["password"], false);

        let reveal = || {
            Request::post(format!("/reveal/{path}"))
                .body(Body::empty())
                .unwrap()
        };
        let (status, headers, body) = send(&app, reveal()).await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(body, b"hello");

        let (status, _, _) = send(&app, reveal()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_password_secret() {
        let (app, vault) = app();
        let path = create(&app, json!({ "data": "secret", "password": "pw" })).await;

        let (_, _, body) = send(
            &app,
            Request::get(format!("/get/{path}")).body(Body::empty()).unwrap(),
        )
        .await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["password"], true);

        let (status, _, body) = send(
            &app,
            post_json(&format!("/reveal/{path}"), json!({ "password": "pw" })),
        )
        .await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body, b"secret");
        assert!(vault.store().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_password_destroys() {
        let (app, vault) = app();
        let path = create(&app, json!({ "data": "secret", "password": "pw" })).await;

        let (status, _, body) = send(
            &app,
            post_json(&format!("/reveal/{path}"), json!({ "password": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["msg"], WRONG_CREDENTIAL_MSG);
        assert!(vault.store().is_empty());
    }

    #[tokio::test]
    async fn test_file_download_headers() {
        let (app, _) = app();
        let payload = STANDARD.encode(b"\x00\x01binary");
        let path = create(
            &app,
            json!({ "data_base64": payload, "filename": "Bericht für Müller.pdf" }),
        )
        .await;

        let (status, headers, body) = send(
            &app,
            Request::post(format!("/reveal/{path}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/octet-stream");
        let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.contains("filename=\"Bericht fur Muller.pdf\""));
        assert!(disposition.contains("filename*=UTF-8''Bericht%20f%C3%BCr%20M%C3%BCller.pdf"));
        assert_eq!(body, b"\x00\x01binary");
    }

    #[tokio::test]
    async fn test_rejects_garbage_before_storing() {
        let (app, vault) = app();
        for body in [
            json!({}),
            json!({ "data": "   " }),
            json!({ "data_base64": "!!!", "filename": "a.bin" }),
            json!({ "data_base64": "AAAA" }),
            json!({ "data": "a", "data_base64": "AAAA", "filename": "a.bin" }),
        ] {
            let (status, _, bytes) = send(&app, post_json("/new", body.clone())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(json["status"], "error");
        }
        assert!(vault.store().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_key_leaves_record() {
        let (app, vault) = app();
        let path = create(&app, json!({ "data": "hello" })).await;
        let id = path.split('/').next().unwrap();

        let (status, _, _) = send(
            &app,
            Request::post(format!("/reveal/{id}/short"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(vault.store().len(), 1);
    }

    #[tokio::test]
    async fn test_server_mode_links_have_no_key() {
        let settings = VaultSettings::server(SecretKey::generate()).with_kdf(fast_kdf());
        let (app, _) = app_with(settings);
        let path = create(&app, json!({ "data": "hello" })).await;
        assert!(!path.contains('/'));

        let (status, _, body) = send(
            &app,
            Request::post(format!("/reveal/{path}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body, b"hello");
    }

    #[test]
    fn test_link_base_prefers_forwarded_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("10.0.0.5:8080"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        headers.insert(
            "x-forwarded-host",
            HeaderValue::from_static("secrets.example, proxy.internal"),
        );
        assert_eq!(
            link_base(None, &headers).unwrap(),
            "https://secrets.example"
        );
        assert_eq!(
            link_base(Some("https://hush.example/"), &HeaderMap::new()).unwrap(),
            "https://hush.example"
        );
        assert!(matches!(
            link_base(None, &HeaderMap::new()),
            Err(RequestError::MissingHost)
        ));
    }
}
