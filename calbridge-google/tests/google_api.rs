//! Exercises the Google adapters against an in-process stand-in for the
//! Calendar API and the OAuth token endpoint.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use axum::extract::{Form, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, post};
use axum::{Json, Router};
use calbridge_core::credential::CALENDAR_SCOPE;
use calbridge_core::{
    Backing, BackendError, CalendarBackend, CalendarClient, CredentialError, CredentialManager,
    CredentialRecord, CredentialStore, FileStore, GrantKind, NewEvent, TokenSource,
};
use calbridge_google::{GoogleCalendarApi, GoogleTokenSource};
use chrono::{Duration, Utc};
use serde_json::{Value, json};

#[derive(Default)]
struct FakeGoogle {
    token_requests: usize,
    inserted: Vec<Value>,
    auth_headers: Vec<String>,
    /// (id, summary, start)
    events: Vec<(String, String, String)>,
}

type Shared = Arc<Mutex<FakeGoogle>>;

fn google_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({"error": {"code": status.as_u16(), "message": message}})),
    )
        .into_response()
}

fn record_auth(state: &Shared, headers: &HeaderMap) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.lock().unwrap().auth_headers.push(auth);
}

async fn token(State(state): State<Shared>, Form(form): Form<HashMap<String, String>>) -> Response {
    state.lock().unwrap().token_requests += 1;

    let ok = form.get("grant_type").map(String::as_str) == Some("refresh_token")
        && form.get("refresh_token").map(String::as_str) == Some("good-refresh")
        && form.get("client_id").map(String::as_str) == Some("client-id");

    if ok {
        Json(json!({"access_token": "fresh-token", "expires_in": 3599, "token_type": "Bearer"}))
            .into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant", "error_description": "Bad Request"})),
        )
            .into_response()
    }
}

async fn insert(
    State(state): State<Shared>,
    Path(_calendar): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record_auth(&state, &headers);

    let start = body["start"]["dateTime"].as_str().unwrap_or_default().to_string();
    let end = body["end"]["dateTime"].as_str().unwrap_or_default().to_string();
    if end <= start {
        return google_error(StatusCode::BAD_REQUEST, "The specified time range is empty.");
    }

    let mut google = state.lock().unwrap();
    google.inserted.push(body);
    let id = format!("evt{}", google.inserted.len());
    Json(json!({"id": id, "htmlLink": format!("https://calendar.google.com/event?eid={id}")}))
        .into_response()
}

async fn list(
    State(state): State<Shared>,
    Path(_calendar): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    record_auth(&state, &headers);

    if query.get("singleEvents").map(String::as_str) != Some("true")
        || query.get("orderBy").map(String::as_str) != Some("startTime")
        || !query.contains_key("timeMin")
    {
        return google_error(StatusCode::BAD_REQUEST, "missing list parameters");
    }
    let max: usize = query
        .get("maxResults")
        .and_then(|m| m.parse().ok())
        .unwrap_or(250);

    let mut events = state.lock().unwrap().events.clone();
    events.sort_by(|a, b| a.2.cmp(&b.2));
    let items: Vec<Value> = events
        .into_iter()
        .take(max)
        .map(|(id, summary, start)| {
            json!({
                "id": id,
                "status": "confirmed",
                "summary": summary,
                "start": {"dateTime": start},
                "htmlLink": format!("https://calendar.google.com/event?eid={id}"),
            })
        })
        .collect();

    Json(json!({"kind": "calendar#events", "items": items})).into_response()
}

async fn remove(
    State(state): State<Shared>,
    Path((_calendar, event_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    record_auth(&state, &headers);

    let mut google = state.lock().unwrap();
    let before = google.events.len();
    google.events.retain(|(id, _, _)| id != &event_id);
    if google.events.len() == before {
        google_error(StatusCode::NOT_FOUND, "Not Found")
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

struct Harness {
    state: Shared,
    base: String,
}

impl Harness {
    async fn start() -> Self {
        let state: Shared = Arc::default();
        let app = Router::new()
            .route("/token", post(token))
            .route(
                "/calendar/v3/calendars/{calendar}/events",
                post(insert).get(list),
            )
            .route(
                "/calendar/v3/calendars/{calendar}/events/{event_id}",
                delete(remove),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Harness {
            state,
            base: format!("http://{addr}"),
        }
    }

    fn api(&self) -> GoogleCalendarApi {
        GoogleCalendarApi::new(
            reqwest::Client::new(),
            &format!("{}/calendar/v3", self.base),
            "primary",
        )
        .unwrap()
    }

    fn record(&self, refresh_token: &str, expires_in: Duration) -> CredentialRecord {
        CredentialRecord {
            access_token: "stale-token".to_string(),
            refresh_token: Some(refresh_token.to_string()),
            expiry: Some(Utc::now() + expires_in),
            scopes: BTreeSet::from([CALENDAR_SCOPE.to_string()]),
            kind: GrantKind::UserConsent,
            origin: Backing::File,
            token_uri: format!("{}/token", self.base),
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
        }
    }
}

#[tokio::test]
async fn refresh_exchanges_refresh_token() {
    let harness = Harness::start().await;
    let source = GoogleTokenSource::new(reqwest::Client::new(), None);

    let grant = source
        .refresh(&harness.record("good-refresh", -Duration::minutes(1)))
        .await
        .unwrap();

    assert_eq!(grant.access_token, "fresh-token");
    assert_eq!(grant.expires_in, 3599);
    assert_eq!(grant.refresh_token, None);
}

#[tokio::test]
async fn revoked_refresh_token_is_refresh_failure() {
    let harness = Harness::start().await;
    let source = GoogleTokenSource::new(reqwest::Client::new(), None);

    let err = source
        .refresh(&harness.record("revoked", -Duration::minutes(1)))
        .await
        .unwrap_err();

    match err {
        CredentialError::RefreshFailed(detail) => assert!(detail.contains("invalid_grant")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn manager_refreshes_and_persists_to_file() {
    let harness = Harness::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path().join("token.json")));
    let record = harness.record("good-refresh", -Duration::minutes(1));
    store.save(&record).unwrap();

    let manager = CredentialManager::new(
        record,
        store.clone(),
        Arc::new(GoogleTokenSource::new(reqwest::Client::new(), None)),
    )
    .unwrap();

    let acquired = manager.acquire().await.unwrap();
    assert_eq!(acquired.access_token, "fresh-token");
    assert_eq!(store.load().unwrap().unwrap().access_token, "fresh-token");

    // Second call uses the cached token
    manager.acquire().await.unwrap();
    assert_eq!(harness.state.lock().unwrap().token_requests, 1);
}

#[tokio::test]
async fn create_event_forwards_literal_times_and_bearer() {
    let harness = Harness::start().await;
    let credential = harness.record("good-refresh", Duration::hours(1));

    let created = harness
        .api()
        .insert_event(
            &credential,
            &NewEvent {
                summary: "Ping".to_string(),
                start: "2024-01-15T14:00:00".to_string(),
                end: "2024-01-15T15:00:00".to_string(),
                time_zone: "America/Los_Angeles".to_string(),
            },
        )
        .await
        .unwrap();

    assert!(!created.event_id.is_empty());
    assert!(created.link.is_some());

    let google = harness.state.lock().unwrap();
    assert_eq!(google.auth_headers, vec!["Bearer stale-token".to_string()]);
    assert_eq!(
        google.inserted[0],
        json!({
            "summary": "Ping",
            "start": {"dateTime": "2024-01-15T14:00:00", "timeZone": "America/Los_Angeles"},
            "end": {"dateTime": "2024-01-15T15:00:00", "timeZone": "America/Los_Angeles"},
        })
    );
}

#[tokio::test]
async fn create_event_rejected_by_backend_is_invalid_argument() {
    let harness = Harness::start().await;
    let credential = harness.record("good-refresh", Duration::hours(1));

    let err = harness
        .api()
        .insert_event(
            &credential,
            &NewEvent {
                summary: "Backwards".to_string(),
                start: "2024-01-15T15:00:00".to_string(),
                end: "2024-01-15T14:00:00".to_string(),
                time_zone: "America/Los_Angeles".to_string(),
            },
        )
        .await
        .unwrap_err();

    match err {
        BackendError::InvalidArgument(message) => {
            assert_eq!(message, "The specified time range is empty.")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn list_events_returns_bounded_ascending_entries() {
    let harness = Harness::start().await;
    {
        let mut google = harness.state.lock().unwrap();
        for (id, start) in [
            ("e3", "2030-03-03T10:00:00Z"),
            ("e1", "2030-03-01T10:00:00Z"),
            ("e5", "2030-03-05T10:00:00Z"),
            ("e2", "2030-03-02T10:00:00Z"),
            ("e4", "2030-03-04T10:00:00Z"),
        ] {
            google
                .events
                .push((id.to_string(), format!("Event {id}"), start.to_string()));
        }
    }
    let credential = harness.record("good-refresh", Duration::hours(1));
    let client = CalendarClient::new(Arc::new(harness.api()));

    let events = client.list_events(&credential, 2, None).await.unwrap();

    let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["e1", "e2"]);
    assert_eq!(events[0].summary, "Event e1");
    assert_eq!(events[0].start, "2030-03-01T10:00:00Z");
}

#[tokio::test]
async fn delete_missing_event_is_not_found() {
    let harness = Harness::start().await;
    harness.state.lock().unwrap().events.push((
        "real-id".to_string(),
        "Keep".to_string(),
        "2030-01-01T00:00:00Z".to_string(),
    ));
    let credential = harness.record("good-refresh", Duration::hours(1));
    let api = harness.api();

    let err = api
        .delete_event(&credential, "nonexistent-id")
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::NotFound(ref id) if id == "nonexistent-id"));

    api.delete_event(&credential, "real-id").await.unwrap();
    assert!(harness.state.lock().unwrap().events.is_empty());
}
