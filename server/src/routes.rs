//! HTTP surface of the relay

use axum::{
    body::Bytes,
    extract::{ws::WebSocketUpgrade, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use beacon_core::{DistributionService, Error};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error};

use crate::transport;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const JAVASCRIPT: &str = "application/javascript; charset=utf-8";

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DistributionService>,
    pub redirect_main_page: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(main_page))
        .route("/newcenter", post(new_center))
        .route("/notify", post(notify))
        .route("/removecenter", post(remove_center))
        .route("/test", post(test_auth))
        .route("/ping", get(ping))
        .route("/listen", get(listen))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Publisher query parameters; missing values fail authentication
#[derive(Debug, Deserialize)]
struct PublisherQuery {
    #[serde(default)]
    mail: String,
    #[serde(default)]
    center: String,
}

#[derive(Debug, Deserialize)]
struct CenterQuery {
    #[serde(default)]
    center: String,
    callback: Option<String>,
}

/// Maps service errors onto status codes
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self.0 {
            Error::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            Error::CenterNotFound(_) => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            e @ (Error::InvalidCenterName(_) | Error::InvalidPayload | Error::InvalidCallback(_)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            e => {
                error!(error = %e, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };
        (status, [(header::CONTENT_TYPE, TEXT_PLAIN)], body).into_response()
    }
}

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

async fn main_page(State(state): State<AppState>) -> Response {
    match &state.redirect_main_page {
        Some(url) => Redirect::temporary(url).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn new_center(
    State(state): State<AppState>,
    Query(query): Query<PublisherQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let id = state
        .service
        .publish(&query.mail, authorization(&headers), &body)
        .await?;
    Ok((StatusCode::CREATED, [(header::CONTENT_TYPE, TEXT_PLAIN)], id.to_string()).into_response())
}

async fn notify(
    State(state): State<AppState>,
    Query(query): Query<PublisherQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .send(&query.mail, authorization(&headers), &query.center, &body)
        .await?;
    Ok(StatusCode::OK)
}

async fn remove_center(
    State(state): State<AppState>,
    Query(query): Query<PublisherQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .unpublish(&query.mail, authorization(&headers), &body)
        .await?;
    Ok(StatusCode::OK)
}

/// Echoes the body back once its signature checks out
async fn test_auth(
    State(state): State<AppState>,
    Query(query): Query<PublisherQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    state
        .service
        .authenticate(&query.mail, authorization(&headers), &body)?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, TEXT_PLAIN)], body).into_response())
}

async fn ping(State(state): State<AppState>, Query(query): Query<CenterQuery>) -> Result<Response, ApiError> {
    match query.callback.as_deref().filter(|cb| !cb.is_empty()) {
        Some(callback) => {
            let script = state.service.poll_jsonp(&query.center, callback).await?;
            Ok((StatusCode::OK, [(header::CONTENT_TYPE, JAVASCRIPT)], script).into_response())
        }
        None => {
            let message = state.service.poll(&query.center).await?;
            Ok((StatusCode::OK, [(header::CONTENT_TYPE, TEXT_PLAIN)], message).into_response())
        }
    }
}

async fn listen(
    State(state): State<AppState>,
    Query(query): Query<CenterQuery>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    if !state.service.contains(&query.center).await {
        return ApiError(Error::CenterNotFound(query.center)).into_response();
    }
    let Some(ws) = ws else {
        return (StatusCode::BAD_REQUEST, "Expected a WebSocket upgrade").into_response();
    };

    let center = query.center;
    ws.on_upgrade(move |socket| async move {
        let (outbound, inbound) = transport::split(socket);
        match state.service.attach(&center, outbound, inbound).await {
            Ok(end) => debug!(center = %center, end = ?end, "Subscriber disconnected"),
            Err(e) => debug!(center = %center, error = %e, "Subscriber rejected after upgrade"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use beacon_core::crypto::{authorization_header, Keypair};
    use beacon_core::{Identity, IdentityRecord, KeyDirectory, MemoryDirectory, SessionConfig};
    use tower::ServiceExt;

    const ALICE: &str = "alice@example.com";

    fn build_app(redirect: Option<&str>) -> (Router, Keypair) {
        let directory = Arc::new(MemoryDirectory::new());
        let (record, keypair) = IdentityRecord::mint(Identity::new(ALICE).unwrap());
        directory.add(record).unwrap();

        let state = AppState {
            service: Arc::new(DistributionService::new(directory, None, SessionConfig::default())),
            redirect_main_page: redirect.map(str::to_string),
        };
        (router(state), keypair)
    }

    fn signed(uri: &str, keypair: &Keypair, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, authorization_header(&keypair.sign_request(body.as_bytes())))
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_alice_inbox_over_http() {
        let (app, key) = build_app(None);

        let response = app
            .clone()
            .oneshot(signed("/newcenter?mail=alice@example.com", &key, "inbox"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_text(response).await, "alice@example.com____inbox");

        let response = app.clone().oneshot(get_request("/ping?center=alice@example.com____inbox")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "");

        let response = app
            .clone()
            .oneshot(signed("/notify?mail=alice@example.com&center=inbox", &key, "X"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.clone().oneshot(get_request("/ping?center=alice@example.com____inbox")).await.unwrap();
        assert_eq!(body_text(response).await, "X");

        let response = app
            .clone()
            .oneshot(signed("/removecenter?mail=alice@example.com", &key, "inbox"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.clone().oneshot(get_request("/ping?center=alice@example.com____inbox")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(signed("/notify?mail=alice@example.com&center=inbox", &key, "Y"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unauthorized_requests() {
        let (app, key) = build_app(None);
        let stranger = Keypair::generate();

        let response = app
            .clone()
            .oneshot(signed("/newcenter?mail=alice@example.com", &stranger, "inbox"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(signed("/newcenter", &key, "inbox"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let unsigned = Request::builder()
            .method("POST")
            .uri("/newcenter?mail=alice@example.com")
            .body(Body::from("inbox"))
            .unwrap();
        let response = app.oneshot(unsigned).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invalid_center_name() {
        let (app, key) = build_app(None);
        let response = app
            .oneshot(signed("/newcenter?mail=alice@example.com", &key, "a____b"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_jsonp_ping() {
        let (app, key) = build_app(None);
        app.clone()
            .oneshot(signed("/newcenter?mail=alice@example.com", &key, "inbox"))
            .await
            .unwrap();
        app.clone()
            .oneshot(signed("/notify?mail=alice@example.com&center=inbox", &key, "hi"))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(get_request("/ping?center=alice@example.com____inbox&callback=onPing"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], JAVASCRIPT);
        assert_eq!(body_text(response).await, r#"onPing("hi");"#);

        let response = app
            .oneshot(get_request("/ping?center=alice@example.com____inbox&callback=x%3Balert(1)"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_signed_echo() {
        let (app, key) = build_app(None);
        let response = app
            .oneshot(signed("/test?mail=alice@example.com", &key, "echo me"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "echo me");
    }

    #[tokio::test]
    async fn test_listen_unknown_center_is_404() {
        let (app, key) = build_app(None);
        let response = app.clone().oneshot(get_request("/listen?center=nobody____inbox")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        app.clone()
            .oneshot(signed("/newcenter?mail=alice@example.com", &key, "inbox"))
            .await
            .unwrap();
        let response = app.oneshot(get_request("/listen?center=alice@example.com____inbox")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_main_page() {
        let (app, _) = build_app(Some("https://example.com/"));
        let response = app.oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "https://example.com/");

        let (app, _) = build_app(None);
        let response = app.oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
