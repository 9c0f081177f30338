//! Google Calendar v3 REST calls.

use async_trait::async_trait;
use calbridge_core::{
    BackendError, CalendarBackend, CreatedEvent, CredentialRecord, EventSummary, ListQuery,
    NewEvent,
};
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Google's alias for the user's main calendar
pub const DEFAULT_CALENDAR_ID: &str = "primary";

pub struct GoogleCalendarApi {
    http: reqwest::Client,
    base: Url,
    calendar_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventDateTimeBody<'a> {
    date_time: &'a str,
    time_zone: &'a str,
}

#[derive(Serialize)]
struct InsertEventBody<'a> {
    summary: &'a str,
    start: EventDateTimeBody<'a>,
    end: EventDateTimeBody<'a>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEvent {
    #[serde(default)]
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    start: Option<GoogleEventTime>,
    #[serde(default)]
    html_link: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventTime {
    #[serde(default)]
    date_time: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<GoogleEvent>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

impl GoogleCalendarApi {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        calendar_id: impl Into<String>,
    ) -> Result<Self, url::ParseError> {
        let base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase);
        }

        Ok(GoogleCalendarApi {
            http,
            base,
            calendar_id: calendar_id.into(),
        })
    }

    /// `.../calendars/{calendar_id}/events[/{event_id}]`, segments percent-encoded.
    fn events_url(&self, event_id: Option<&str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["calendars", self.calendar_id.as_str(), "events"]);
            if let Some(id) = event_id {
                segments.push(id);
            }
        }
        url
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        credential: &CredentialRecord,
        subject: &str,
    ) -> Result<reqwest::Response, BackendError> {
        let response = request
            .bearer_auth(&credential.access_token)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response, subject).await)
        }
    }
}

async fn error_from_response(response: reqwest::Response, subject: &str) -> BackendError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .ok()
        .map(|e| e.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });

    match status.as_u16() {
        404 | 410 => BackendError::NotFound(subject.to_string()),
        400 => BackendError::InvalidArgument(message),
        code => BackendError::Rejected {
            status: code,
            message,
        },
    }
}

fn to_summary(event: GoogleEvent) -> Option<EventSummary> {
    if event.id.is_empty() || event.status == "cancelled" {
        return None;
    }

    let start = event
        .start
        .and_then(|s| s.date_time.or(s.date))
        .unwrap_or_default();

    Some(EventSummary {
        id: event.id,
        summary: event
            .summary
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "No Title".to_string()),
        start,
        link: event.html_link,
    })
}

#[async_trait]
impl CalendarBackend for GoogleCalendarApi {
    async fn insert_event(
        &self,
        credential: &CredentialRecord,
        event: &NewEvent,
    ) -> Result<CreatedEvent, BackendError> {
        let body = InsertEventBody {
            summary: &event.summary,
            start: EventDateTimeBody {
                date_time: &event.start,
                time_zone: &event.time_zone,
            },
            end: EventDateTimeBody {
                date_time: &event.end,
                time_zone: &event.time_zone,
            },
        };

        let request = self.http.post(self.events_url(None)).json(&body);
        let response = self
            .send(request, credential, &format!("calendar {}", self.calendar_id))
            .await?;

        let created: GoogleEvent = response
            .json()
            .await
            .map_err(|e| BackendError::Transport(format!("unreadable insert response: {e}")))?;

        if created.id.is_empty() {
            return Err(BackendError::Transport(
                "insert response carried no event id".to_string(),
            ));
        }

        tracing::debug!(event_id = %created.id, "Created event");

        Ok(CreatedEvent {
            event_id: created.id,
            link: created.html_link,
        })
    }

    async fn list_events(
        &self,
        credential: &CredentialRecord,
        query: &ListQuery,
    ) -> Result<Vec<EventSummary>, BackendError> {
        let max_results = query.max_results.to_string();
        let request = self.http.get(self.events_url(None)).query(&[
            ("timeMin", query.time_min.as_str()),
            ("maxResults", max_results.as_str()),
            ("singleEvents", "true"),
            ("orderBy", "startTime"),
        ]);

        let response = self
            .send(request, credential, &format!("calendar {}", self.calendar_id))
            .await?;

        let list: EventList = response
            .json()
            .await
            .map_err(|e| BackendError::Transport(format!("unreadable event list: {e}")))?;

        Ok(list.items.into_iter().filter_map(to_summary).collect())
    }

    async fn delete_event(
        &self,
        credential: &CredentialRecord,
        event_id: &str,
    ) -> Result<(), BackendError> {
        let request = self.http.delete(self.events_url(Some(event_id)));
        self.send(request, credential, event_id).await?;

        tracing::debug!(event_id, "Deleted event");
        Ok(())
    }
}
