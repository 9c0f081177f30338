//! In-memory token source and calendar backend for dispatcher and route tests.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use calbridge_core::credential::{CALENDAR_SCOPE, DEFAULT_TOKEN_URI};
use calbridge_core::store::TOKEN_ENV_VAR;
use calbridge_core::{
    BackendError, Backing, CalendarBackend, CalendarClient, CreatedEvent, CredentialError,
    CredentialManager, CredentialRecord, EnvStore, EventSummary, GrantKind, ListQuery, NewEvent,
    TokenGrant, TokenSource,
};
use chrono::{Duration, Utc};

use crate::dispatch::ToolDispatcher;

#[derive(Default)]
pub struct FakeTokens {
    pub refreshes: AtomicUsize,
}

impl FakeTokens {
    pub fn count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenSource for FakeTokens {
    async fn refresh(&self, _record: &CredentialRecord) -> Result<TokenGrant, CredentialError> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(StdDuration::from_millis(25)).await;
        Ok(TokenGrant {
            access_token: format!("refreshed-{n}"),
            expires_in: 3600,
            refresh_token: None,
        })
    }

    async fn mint(&self, record: &CredentialRecord) -> Result<TokenGrant, CredentialError> {
        self.refresh(record).await
    }
}

#[derive(Default)]
pub struct FakeCalendar {
    pub calls: AtomicUsize,
    pub inserted: Mutex<Vec<NewEvent>>,
    pub tokens_seen: Mutex<Vec<String>>,
    /// (id, summary, start); listed in start order like `orderBy=startTime`
    pub events: Mutex<Vec<(String, String, String)>>,
}

impl FakeCalendar {
    pub fn with_events(events: &[(&str, &str)]) -> Self {
        let calendar = FakeCalendar::default();
        *calendar.events.lock().unwrap() = events
            .iter()
            .map(|(id, start)| (id.to_string(), format!("Event {id}"), start.to_string()))
            .collect();
        calendar
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self, credential: &CredentialRecord) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens_seen
            .lock()
            .unwrap()
            .push(credential.access_token.clone());
    }
}

#[async_trait]
impl CalendarBackend for FakeCalendar {
    async fn insert_event(
        &self,
        credential: &CredentialRecord,
        event: &NewEvent,
    ) -> Result<CreatedEvent, BackendError> {
        self.touch(credential);
        if event.end <= event.start {
            return Err(BackendError::InvalidArgument(
                "The specified time range is empty.".to_string(),
            ));
        }
        let mut inserted = self.inserted.lock().unwrap();
        inserted.push(event.clone());
        let id = format!("evt{}", inserted.len());
        Ok(CreatedEvent {
            link: Some(format!("https://calendar.google.com/event?eid={id}")),
            event_id: id,
        })
    }

    async fn list_events(
        &self,
        credential: &CredentialRecord,
        query: &ListQuery,
    ) -> Result<Vec<EventSummary>, BackendError> {
        self.touch(credential);
        let mut events = self.events.lock().unwrap().clone();
        events.sort_by(|a, b| a.2.cmp(&b.2));
        Ok(events
            .iter()
            .take(query.max_results as usize)
            .map(|(id, summary, start)| EventSummary {
                id: id.clone(),
                summary: summary.clone(),
                start: start.clone(),
                link: None,
            })
            .collect())
    }

    async fn delete_event(
        &self,
        credential: &CredentialRecord,
        event_id: &str,
    ) -> Result<(), BackendError> {
        self.touch(credential);
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|(id, _, _)| id != event_id);
        if events.len() == before {
            Err(BackendError::NotFound(event_id.to_string()))
        } else {
            Ok(())
        }
    }
}

pub fn record(expires_in: Duration, refresh_token: Option<&str>) -> CredentialRecord {
    CredentialRecord {
        access_token: "initial-token".to_string(),
        refresh_token: refresh_token.map(str::to_string),
        expiry: Some(Utc::now() + expires_in),
        scopes: BTreeSet::from([CALENDAR_SCOPE.to_string()]),
        kind: GrantKind::UserConsent,
        origin: Backing::Environment,
        token_uri: DEFAULT_TOKEN_URI.to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
    }
}

pub struct Fixture {
    pub tokens: Arc<FakeTokens>,
    pub calendar: Arc<FakeCalendar>,
    pub dispatcher: ToolDispatcher,
}

pub fn fixture(record: CredentialRecord, calendar: FakeCalendar) -> Fixture {
    let tokens = Arc::new(FakeTokens::default());
    let calendar = Arc::new(calendar);
    let store = Arc::new(EnvStore::with_value(TOKEN_ENV_VAR, None));
    let manager = CredentialManager::new(record, store, tokens.clone())
        .expect("record origin matches store");

    Fixture {
        tokens,
        calendar: calendar.clone(),
        dispatcher: ToolDispatcher::new(Arc::new(manager), CalendarClient::new(calendar)),
    }
}

/// A valid, unexpired credential and an empty calendar.
pub fn fresh_fixture() -> Fixture {
    fixture(
        record(Duration::hours(1), Some("1//refresh")),
        FakeCalendar::default(),
    )
}
