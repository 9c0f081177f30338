//! Calendar operations on top of a remote calendar backend.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::credential::CredentialRecord;
use crate::error::BackendError;

/// An event to create. Times and timezone are passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewEvent {
    pub summary: String,
    pub start: String,
    pub end: String,
    pub time_zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedEvent {
    pub event_id: String,
    pub link: Option<String>,
}

/// One entry of an event listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: String,
    pub summary: String,
    /// `dateTime` for timed events, `date` for all-day events.
    pub start: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub max_results: u32,
    /// Lower bound on event end time, RFC 3339.
    pub time_min: String,
}

/// The remote calendar API. Implementations perform exactly one request per
/// call and never retry.
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    async fn insert_event(
        &self,
        credential: &CredentialRecord,
        event: &NewEvent,
    ) -> Result<CreatedEvent, BackendError>;

    /// Recurring events expanded into single occurrences, ordered by start.
    async fn list_events(
        &self,
        credential: &CredentialRecord,
        query: &ListQuery,
    ) -> Result<Vec<EventSummary>, BackendError>;

    async fn delete_event(
        &self,
        credential: &CredentialRecord,
        event_id: &str,
    ) -> Result<(), BackendError>;
}

/// Checks arguments, then forwards to the backend.
#[derive(Clone)]
pub struct CalendarClient {
    backend: Arc<dyn CalendarBackend>,
}

impl CalendarClient {
    pub fn new(backend: Arc<dyn CalendarBackend>) -> Self {
        CalendarClient { backend }
    }

    pub async fn create_event(
        &self,
        credential: &CredentialRecord,
        summary: &str,
        start: &str,
        end: &str,
        time_zone: &str,
    ) -> Result<CreatedEvent, BackendError> {
        check_date_time("start_time", start)?;
        check_date_time("end_time", end)?;

        let event = NewEvent {
            summary: summary.to_string(),
            start: start.to_string(),
            end: end.to_string(),
            time_zone: time_zone.to_string(),
        };

        self.backend.insert_event(credential, &event).await
    }

    pub async fn list_events(
        &self,
        credential: &CredentialRecord,
        max_results: u32,
        time_min: Option<&str>,
    ) -> Result<Vec<EventSummary>, BackendError> {
        let time_min = match time_min {
            Some(t) => {
                check_date_time("time_min", t)?;
                t.to_string()
            }
            None => Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        };

        let query = ListQuery {
            max_results,
            time_min,
        };
        // Kept in backend order, which places all-day events by the
        // calendar's own timezone
        let mut events = self.backend.list_events(credential, &query).await?;
        events.truncate(max_results as usize);

        Ok(events)
    }

    pub async fn delete_event(
        &self,
        credential: &CredentialRecord,
        event_id: &str,
    ) -> Result<(), BackendError> {
        if event_id.trim().is_empty() {
            return Err(BackendError::InvalidArgument(
                "event_id must not be empty".to_string(),
            ));
        }
        self.backend.delete_event(credential, event_id).await
    }
}

/// Accepts RFC 3339 (`2024-01-15T14:00:00-08:00`) and offset-less local
/// times (`2024-01-15T14:00:00`, optional fractional seconds).
pub fn parse_date_time(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

fn check_date_time(field: &str, value: &str) -> Result<(), BackendError> {
    match parse_date_time(value) {
        Some(_) => Ok(()),
        None => Err(BackendError::InvalidArgument(format!(
            "{field} is not a valid date-time: {value:?}"
        ))),
    }
}
