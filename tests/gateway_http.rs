//! Integration tests for the request gateway over real HTTP.
//!
//! Each test spins up an Axum server on a random port and drives it through
//! the `reqwest` transport, the libSQL session cache and the sync layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use farrin_session::client::TravelClient;
use farrin_session::config::ClientConfig;
use farrin_session::gateway::{FailureKind, NETWORK_FAILURE_MESSAGE, ReqwestTransport, RetryPolicy};
use farrin_session::model::{Credential, Identity, LoginRequest};
use farrin_session::session::{LibSqlSlotBackend, SessionEvent};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const ISSUED_TOKEN: &str = "srv-token-7";
const PASSWORD: &str = "Secret1!";

/// Requests the fake backend saw: route plus the bearer token, if any.
#[derive(Default)]
struct Seen(Mutex<Vec<(String, Option<String>)>>);

impl Seen {
    fn record(&self, route: &str, headers: &HeaderMap) -> Option<String> {
        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);
        self.0.lock().unwrap().push((route.to_string(), bearer.clone()));
        bearer
    }

    fn all(&self) -> Vec<(String, Option<String>)> {
        self.0.lock().unwrap().clone()
    }
}

fn expired() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "errorMessage": "Session expired" })),
    )
        .into_response()
}

async fn login(State(seen): State<Arc<Seen>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    seen.record("POST /auth/login", &headers);
    if body["password"] != PASSWORD {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Invalid email or password" })),
        )
            .into_response();
    }
    (
        [(AUTHORIZATION, format!("Bearer {ISSUED_TOKEN}"))],
        Json(json!({
            "id": 7,
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "isVerified": true,
            "loginCount": 3
        })),
    )
        .into_response()
}

async fn profile(
    State(seen): State<Arc<Seen>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if seen.record("GET /profile", &headers).as_deref() != Some(ISSUED_TOKEN) {
        return expired();
    }
    assert_eq!(query.get("userId").map(String::as_str), Some("7"));
    Json(json!({
        "id": 7,
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": "ada@example.com",
        "dateOfBirth": "1990-12-10",
        "createdAt": "2025-03-01T10:00:00",
        "citizenshipIds": [1, 44]
    }))
    .into_response()
}

async fn preferences(State(seen): State<Arc<Seen>>, headers: HeaderMap) -> Response {
    if seen.record("GET /profile/preferences", &headers).as_deref() != Some(ISSUED_TOKEN) {
        return expired();
    }
    Json(Value::Null).into_response()
}

async fn countries(State(seen): State<Arc<Seen>>, headers: HeaderMap) -> Response {
    seen.record("GET /trips/countries", &headers);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "Database unavailable" })),
    )
        .into_response()
}

/// Start an Axum server on a random port, return (base url, request log).
async fn start_server() -> (String, Arc<Seen>) {
    let seen = Arc::new(Seen::default());
    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/profile", get(profile))
        .route("/profile/preferences", get(preferences))
        .route("/trips/countries", get(countries))
        .with_state(Arc::clone(&seen));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{port}"), seen)
}

async fn client_for(base_url: &str) -> TravelClient {
    let config = ClientConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
        },
        ..ClientConfig::with_base_url(base_url)
    };
    let transport = ReqwestTransport::new(&config).unwrap();
    let backend = LibSqlSlotBackend::new_memory().await.unwrap();
    TravelClient::with_parts(config, Arc::new(transport), Arc::new(backend))
}

fn cached_identity() -> Identity {
    serde_json::from_value(json!({
        "id": 7,
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": "ada@example.com",
        "createdAt": "2025-03-01T10:00:00Z"
    }))
    .unwrap()
}

#[tokio::test]
async fn login_takes_header_token_and_refresh_sends_it() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, seen) = start_server().await;
        let client = client_for(&base_url).await;

        let response = client
            .api()
            .login(&LoginRequest {
                email: "ada@example.com".into(),
                password: PASSWORD.into(),
            })
            .await;
        assert!(response.success, "{:?}", response.message);
        let grant = response.data.unwrap();
        assert_eq!(grant.credential.expose(), ISSUED_TOKEN);

        let refresh = client.sync().sign_in(&grant).await.unwrap();
        let outcome = refresh.await.unwrap().expect("signed in");
        assert!(outcome.is_complete());

        let identity = client.session().identity().await.unwrap();
        assert_eq!(identity.citizenship_ids, vec![1, 44]);
        assert_eq!(identity.date_of_birth.as_deref(), Some("1990-12-10"));
        assert!(client.session().snapshot().await.preferences.is_none());

        let log = seen.all();
        assert_eq!(log[0], ("POST /auth/login".to_string(), None));
        assert!(
            log[1..]
                .iter()
                .all(|(_, bearer)| bearer.as_deref() == Some(ISSUED_TOKEN)),
            "{log:?}"
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rejected_login_surfaces_server_message() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, _seen) = start_server().await;
        let client = client_for(&base_url).await;

        let response = client
            .api()
            .login(&LoginRequest {
                email: "ada@example.com".into(),
                password: "wrong".into(),
            })
            .await;
        assert!(!response.success);
        assert_eq!(response.status_code, 400);
        assert_eq!(response.message.as_deref(), Some("Invalid email or password"));
        assert!(!client.session().is_authenticated().await);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn expired_credential_is_evicted_and_each_401_requires_login() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, seen) = start_server().await;
        let client = client_for(&base_url).await;
        client
            .session()
            .establish(cached_identity(), Credential::new("stale").unwrap())
            .await
            .unwrap();
        let mut events = client.session().subscribe();

        let outcome = client.sync().refresh().await.unwrap();
        assert_eq!(outcome.identity.status_code, 401);
        assert_eq!(outcome.identity.message.as_deref(), Some("Session expired"));
        assert_eq!(outcome.identity.failure_kind(), Some(FailureKind::Authorization));

        assert!(client.session().credential().await.is_none());
        // Identity stays cached so the login screen can prefill the email.
        assert_eq!(client.session().identity_id().await, Some(7));

        // One signal per rejected response: identity and preferences.
        assert_eq!(events.recv().await.unwrap(), SessionEvent::LoginRequired);
        assert_eq!(events.recv().await.unwrap(), SessionEvent::LoginRequired);
        assert!(events.try_recv().is_err());

        // Once evicted, later calls go out without a bearer and still signal.
        let response = client.api().fetch_identity(7).await;
        assert_eq!(response.status_code, 401);
        let (route, bearer) = seen.all().pop().unwrap();
        assert_eq!(route, "GET /profile");
        assert_eq!(bearer, None);
        assert_eq!(events.recv().await.unwrap(), SessionEvent::LoginRequired);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn server_error_is_normalized_without_retry() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, seen) = start_server().await;
        let client = client_for(&base_url).await;

        let response = client.api().list_countries().await;
        assert!(!response.success);
        assert_eq!(response.status_code, 500);
        assert_eq!(response.message.as_deref(), Some("Database unavailable"));
        assert_eq!(response.failure_kind(), Some(FailureKind::Server));
        assert_eq!(seen.all().len(), 1);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn refused_connection_becomes_network_failure() {
    timeout(TEST_TIMEOUT, async {
        // Reserve a port, then close it so nothing is listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = client_for(&format!("http://127.0.0.1:{port}")).await;
        let response = client.api().list_countries().await;

        assert!(!response.success);
        assert_eq!(response.status_code, 0);
        assert_eq!(response.message.as_deref(), Some(NETWORK_FAILURE_MESSAGE));
        assert_eq!(response.failure_kind(), Some(FailureKind::Connection));
    })
    .await
    .expect("test timed out");
}
