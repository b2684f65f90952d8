//! Google Calendar API v3 client.
//!
//! Low-level HTTP calls and the mapping between the API's JSON event
//! resource and [`CalendarEvent`]. The access token is supplied per call by
//! [`GoogleStore`](super::GoogleStore), which owns refreshing it.

use std::time::Duration;

use calsweep_core::{
    CalendarEvent, EventInstant, EventReminders, EventSource, EventSpan, ReminderOverride,
    TimeWindow,
};
use chrono::{DateTime, NaiveDate, SecondsFormat};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult, StoreOperation};
use crate::store::{EventPage, EventPatch};

/// Largest page the events.list endpoint serves.
const MAX_RESULTS: &str = "250";

/// Google Calendar API client.
#[derive(Debug)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    api_base: String,
}

impl GoogleCalendarClient {
    pub fn new(
        api_base: impl Into<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ProviderError::internal("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            http_client,
            api_base: api_base.into(),
        })
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(calendar_id)
        )
    }

    fn event_url(&self, calendar_id: &str, event_id: &str) -> String {
        format!(
            "{}/{}",
            self.events_url(calendar_id),
            urlencoding::encode(event_id)
        )
    }

    /// Fetches one page of single (expanded) events overlapping `window`,
    /// ordered by start time.
    pub async fn list_events_page(
        &self,
        access_token: &str,
        calendar_id: &str,
        window: TimeWindow,
        page_token: Option<&str>,
    ) -> ProviderResult<EventPage> {
        let mut request = self
            .http_client
            .get(self.events_url(calendar_id))
            .bearer_auth(access_token)
            .query(&[
                ("timeMin", window.start.to_rfc3339_opts(SecondsFormat::Secs, true).as_str()),
                ("timeMax", window.end.to_rfc3339_opts(SecondsFormat::Secs, true).as_str()),
                ("singleEvents", "true"),
                ("showDeleted", "false"),
                ("orderBy", "startTime"),
                ("maxResults", MAX_RESULTS),
            ]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = send(request, StoreOperation::List).await?;
        let body = read_body(response, StoreOperation::List).await?;
        let list: EventListResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse event list: {e}"))
                .during(StoreOperation::List)
        })?;

        let received = list.items.len();
        let events: Vec<CalendarEvent> = list.items.into_iter().filter_map(ApiEvent::into_event).collect();
        debug!(calendar = calendar_id, received, kept = events.len(), "listed page");

        Ok(EventPage {
            events,
            next_page_token: list.next_page_token,
        })
    }

    /// Sends only the fields set in `patch`.
    pub async fn patch_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
        patch: &EventPatch,
    ) -> ProviderResult<()> {
        let request = self
            .http_client
            .patch(self.event_url(calendar_id, event_id))
            .bearer_auth(access_token)
            .json(&PatchBody::from(patch));
        send(request, StoreOperation::Update).await?;
        Ok(())
    }

    pub async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> ProviderResult<()> {
        let request = self
            .http_client
            .delete(self.event_url(calendar_id, event_id))
            .bearer_auth(access_token);
        send(request, StoreOperation::Delete).await?;
        Ok(())
    }

    /// Creates `event` and returns it as Google stored it.
    pub async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> ProviderResult<CalendarEvent> {
        let request = self
            .http_client
            .post(self.events_url(calendar_id))
            .bearer_auth(access_token)
            .json(&ApiEvent::for_insert(event));

        let response = send(request, StoreOperation::Insert).await?;
        let body = read_body(response, StoreOperation::Insert).await?;
        let created: ApiEvent = serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse created event: {e}"))
                .during(StoreOperation::Insert)
        })?;
        created.into_event().ok_or_else(|| {
            ProviderError::invalid_response("created event has no usable start/end")
                .during(StoreOperation::Insert)
        })
    }
}

async fn send(request: RequestBuilder, operation: StoreOperation) -> ProviderResult<Response> {
    let response = request.send().await.map_err(|e| {
        let message = if e.is_timeout() {
            "request timed out".to_string()
        } else if e.is_connect() {
            format!("connection failed: {e}")
        } else {
            format!("request failed: {e}")
        };
        ProviderError::network(message).with_source(e).during(operation)
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body, retry_after).during(operation))
}

async fn read_body(response: Response, operation: StoreOperation) -> ProviderResult<String> {
    response.text().await.map_err(|e| {
        ProviderError::network(format!("failed to read response: {e}")).during(operation)
    })
}

/// Maps a non-success status to an error, keeping Google's own message.
fn status_error(status: StatusCode, body: &str, retry_after: Option<u64>) -> ProviderError {
    let detail = serde_json::from_str::<ApiErrorResponse>(body)
        .map(|r| r.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    let detail = if detail.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {detail}")
    };

    match status {
        StatusCode::UNAUTHORIZED => ProviderError::authentication(format!(
            "access token rejected ({detail}); run 'calsweep auth google'"
        )),
        StatusCode::FORBIDDEN => ProviderError::authorization(detail),
        StatusCode::NOT_FOUND | StatusCode::GONE => ProviderError::not_found(detail),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited(match retry_after {
            Some(secs) => format!("{detail}, retry after {secs} seconds"),
            None => detail,
        }),
        StatusCode::BAD_REQUEST => ProviderError::bad_request(detail),
        s if s.is_server_error() => ProviderError::server(detail),
        _ => ProviderError::invalid_response(format!("unexpected status {detail}")),
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PatchBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    color_id: Option<&'a str>,
}

impl<'a> From<&'a EventPatch> for PatchBody<'a> {
    fn from(patch: &'a EventPatch) -> Self {
        Self {
            color_id: patch.color_id.as_deref(),
        }
    }
}

/// The API's event resource, restricted to the fields this tool reads or writes.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing)]
    status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    visibility: Option<String>,
    start: Option<ApiEventTime>,
    end: Option<ApiEventTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reminders: Option<ApiReminders>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<ApiSource>,
    #[serde(skip_serializing)]
    recurring_event_id: Option<String>,
}

/// Either `date` (all-day) or `dateTime` (timed) is set.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiReminders {
    #[serde(default)]
    use_default: bool,
    // Google rejects overrides next to useDefault=true
    #[serde(default, skip_serializing_if = "Option::is_none")]
    overrides: Option<Vec<ApiReminder>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiReminder {
    method: String,
    minutes: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

enum Boundary {
    Date(NaiveDate),
    Instant(EventInstant),
}

impl ApiEventTime {
    fn parse(&self) -> Option<Boundary> {
        if let Some(date_time) = &self.date_time {
            let at = DateTime::parse_from_rfc3339(date_time).ok()?;
            let mut instant = EventInstant::new(at);
            instant.time_zone = self.time_zone.clone();
            return Some(Boundary::Instant(instant));
        }
        let date = self.date.as_deref()?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .ok()
            .map(Boundary::Date)
    }

    fn from_date(date: NaiveDate) -> Self {
        Self {
            date: Some(date.format("%Y-%m-%d").to_string()),
            ..Self::default()
        }
    }

    fn from_instant(instant: &EventInstant) -> Self {
        Self {
            date_time: Some(instant.at.to_rfc3339_opts(SecondsFormat::AutoSi, false)),
            time_zone: instant.time_zone.clone(),
            ..Self::default()
        }
    }
}

impl ApiEvent {
    /// Converts a listed event. Cancelled events and events whose start and
    /// end cannot be read as one consistent span are dropped.
    fn into_event(self) -> Option<CalendarEvent> {
        let label = self.id.as_deref().unwrap_or("<no id>").to_string();
        if self.status.as_deref() == Some("cancelled") {
            debug!(event = %label, "skipping cancelled event");
            return None;
        }

        let start = self.start.as_ref().and_then(ApiEventTime::parse);
        let end = self.end.as_ref().and_then(ApiEventTime::parse);
        let span = match (start, end) {
            (Some(Boundary::Date(start)), Some(Boundary::Date(end))) => EventSpan::all_day(start, end),
            (Some(Boundary::Instant(start)), Some(Boundary::Instant(end))) => {
                EventSpan::timed(start, end)
            }
            (Some(_), Some(_)) => {
                warn!(event = %label, "skipping event mixing an all-day and a timed boundary");
                return None;
            }
            _ => {
                warn!(event = %label, "skipping event without a readable start and end");
                return None;
            }
        };

        Some(CalendarEvent {
            id: self.id,
            summary: self.summary,
            span,
            color_id: self.color_id,
            description: self.description,
            location: self.location,
            visibility: self.visibility,
            reminders: self.reminders.map(|r| EventReminders {
                use_default: r.use_default,
                overrides: r
                    .overrides
                    .unwrap_or_default()
                    .into_iter()
                    .map(|o| ReminderOverride {
                        method: o.method,
                        minutes: o.minutes,
                    })
                    .collect(),
            }),
            source: self.source.map(|s| EventSource {
                title: s.title,
                url: s.url,
            }),
            recurring_event_id: self.recurring_event_id,
        })
    }

    /// Request body creating a copy of `event`. Ids are never sent.
    fn for_insert(event: &CalendarEvent) -> Self {
        let (start, end) = match &event.span {
            EventSpan::AllDay { start, end } => {
                (ApiEventTime::from_date(*start), ApiEventTime::from_date(*end))
            }
            EventSpan::Timed { start, end } => {
                (ApiEventTime::from_instant(start), ApiEventTime::from_instant(end))
            }
        };

        Self {
            summary: event.summary.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            color_id: event.color_id.clone(),
            visibility: event.visibility.clone(),
            start: Some(start),
            end: Some(end),
            reminders: event.reminders.as_ref().map(|r| ApiReminders {
                use_default: r.use_default,
                overrides: (!r.use_default && !r.overrides.is_empty()).then(|| {
                    r.overrides
                        .iter()
                        .map(|o| ApiReminder {
                            method: o.method.clone(),
                            minutes: o.minutes,
                        })
                        .collect()
                }),
            }),
            source: event.source.as_ref().map(|s| ApiSource {
                title: s.title.clone(),
                url: s.url.clone(),
            }),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;

    fn parse(json: &str) -> Option<CalendarEvent> {
        serde_json::from_str::<ApiEvent>(json).unwrap().into_event()
    }

    #[test]
    fn parse_event_list_response() {
        let json = r#"{
            "kind": "calendar#events",
            "nextPageToken": "CigKGjR",
            "items": [
                {
                    "id": "evt1",
                    "status": "confirmed",
                    "summary": "Standup",
                    "colorId": "5",
                    "start": {"dateTime": "2025-09-01T09:00:00+01:00", "timeZone": "Europe/London"},
                    "end": {"dateTime": "2025-09-01T09:15:00+01:00", "timeZone": "Europe/London"},
                    "recurringEventId": "series1"
                }
            ]
        }"#;

        let response: EventListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.next_page_token.as_deref(), Some("CigKGjR"));
        let event = response.items.into_iter().next().unwrap().into_event().unwrap();
        assert_eq!(event.id.as_deref(), Some("evt1"));
        assert_eq!(event.color_id.as_deref(), Some("5"));
        assert_eq!(event.recurring_event_id.as_deref(), Some("series1"));
        let EventSpan::Timed { start, .. } = &event.span else {
            panic!("expected timed span");
        };
        assert_eq!(start.time_zone.as_deref(), Some("Europe/London"));
        assert_eq!(start.canonical(), "2025-09-01T08:00:00.000000000Z");
    }

    #[test]
    fn empty_list_has_no_items() {
        let response: EventListResponse = serde_json::from_str(r#"{"kind": "calendar#events"}"#).unwrap();
        assert!(response.items.is_empty());
        assert!(response.next_page_token.is_none());
    }

    #[test]
    fn all_day_event() {
        let event = parse(
            r#"{"id": "e", "summary": "Holiday", "start": {"date": "2025-09-14"}, "end": {"date": "2025-09-15"}}"#,
        )
        .unwrap();
        assert_eq!(
            event.span,
            EventSpan::all_day(
                NaiveDate::from_ymd_opt(2025, 9, 14).unwrap(),
                NaiveDate::from_ymd_opt(2025, 9, 15).unwrap()
            )
        );
    }

    #[test]
    fn cancelled_events_are_dropped() {
        assert!(
            parse(r#"{"id": "e", "status": "cancelled", "start": {"date": "2025-09-14"}, "end": {"date": "2025-09-15"}}"#)
                .is_none()
        );
    }

    #[test]
    fn mixed_or_missing_boundaries_are_dropped() {
        assert!(
            parse(r#"{"id": "e", "start": {"date": "2025-09-14"}, "end": {"dateTime": "2025-09-14T10:00:00Z"}}"#)
                .is_none()
        );
        assert!(parse(r#"{"id": "e", "start": {"date": "2025-09-14"}}"#).is_none());
        assert!(
            parse(r#"{"id": "e", "start": {"dateTime": "yesterday"}, "end": {"dateTime": "2025-09-14T10:00:00Z"}}"#)
                .is_none()
        );
    }

    #[test]
    fn reminders_and_source_are_read() {
        let event = parse(
            r#"{
                "id": "e",
                "start": {"date": "2025-09-14"},
                "end": {"date": "2025-09-15"},
                "reminders": {"useDefault": false, "overrides": [{"method": "popup", "minutes": 10}]},
                "source": {"title": "Ticket", "url": "https://example.com/t/1"}
            }"#,
        )
        .unwrap();
        let reminders = event.reminders.unwrap();
        assert!(!reminders.use_default);
        assert_eq!(reminders.overrides[0].minutes, 10);
        assert_eq!(event.source.unwrap().title.as_deref(), Some("Ticket"));
    }

    #[test]
    fn insert_body_for_timed_event() {
        let at = DateTime::parse_from_rfc3339("2025-09-08T09:00:00+01:00").unwrap();
        let end = DateTime::parse_from_rfc3339("2025-09-08T09:15:00+01:00").unwrap();
        let mut event = CalendarEvent::new(EventSpan::timed(
            EventInstant::new(at),
            EventInstant::new(end).with_time_zone("Europe/London"),
        ))
        .with_id("must-not-be-sent")
        .with_summary("Standup")
        .with_color("5")
        .with_location("Room 4");
        event.recurring_event_id = Some("series1".to_string());
        event.reminders = Some(EventReminders {
            use_default: false,
            overrides: vec![ReminderOverride {
                method: "popup".to_string(),
                minutes: 5,
            }],
        });

        let body = ApiEvent::for_insert(&event);
        insta::assert_json_snapshot!(body, @r#"
        {
          "summary": "Standup",
          "location": "Room 4",
          "colorId": "5",
          "start": {
            "dateTime": "2025-09-08T09:00:00+01:00"
          },
          "end": {
            "dateTime": "2025-09-08T09:15:00+01:00",
            "timeZone": "Europe/London"
          },
          "reminders": {
            "useDefault": false,
            "overrides": [
              {
                "method": "popup",
                "minutes": 5
              }
            ]
          }
        }
        "#);
    }

    #[test]
    fn insert_body_for_all_day_event() {
        let mut event = CalendarEvent::new(EventSpan::all_day(
            NaiveDate::from_ymd_opt(2025, 9, 28).unwrap(),
            NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(),
        ))
        .with_summary("Offsite");
        event.reminders = Some(EventReminders {
            use_default: true,
            overrides: vec![],
        });
        event.source = Some(EventSource {
            title: None,
            url: Some("https://example.com/offsite".to_string()),
        });

        insta::assert_json_snapshot!(ApiEvent::for_insert(&event), @r#"
        {
          "summary": "Offsite",
          "start": {
            "date": "2025-09-28"
          },
          "end": {
            "date": "2025-10-01"
          },
          "reminders": {
            "useDefault": true
          },
          "source": {
            "url": "https://example.com/offsite"
          }
        }
        "#);
    }

    #[test]
    fn patch_body_only_carries_color() {
        let body = serde_json::to_value(PatchBody::from(&EventPatch::color("11"))).unwrap();
        assert_eq!(body, serde_json::json!({"colorId": "11"}));
    }

    #[test]
    fn urls_encode_ids() {
        let client = GoogleCalendarClient::new(
            "https://www.googleapis.com/calendar/v3",
            Duration::from_secs(5),
            "calsweep-test",
        )
        .unwrap();
        assert_eq!(
            client.event_url("team@group.calendar.google.com", "abc_123"),
            "https://www.googleapis.com/calendar/v3/calendars/team%40group.calendar.google.com/events/abc_123"
        );
    }

    #[test]
    fn status_mapping() {
        let cases = [
            (StatusCode::UNAUTHORIZED, ProviderErrorCode::AuthenticationFailed),
            (StatusCode::FORBIDDEN, ProviderErrorCode::AuthorizationFailed),
            (StatusCode::NOT_FOUND, ProviderErrorCode::NotFound),
            (StatusCode::GONE, ProviderErrorCode::NotFound),
            (StatusCode::TOO_MANY_REQUESTS, ProviderErrorCode::RateLimited),
            (StatusCode::BAD_REQUEST, ProviderErrorCode::BadRequest),
            (StatusCode::INTERNAL_SERVER_ERROR, ProviderErrorCode::ServerError),
            (StatusCode::SERVICE_UNAVAILABLE, ProviderErrorCode::ServerError),
            (StatusCode::IM_A_TEAPOT, ProviderErrorCode::InvalidResponse),
        ];
        for (status, code) in cases {
            assert_eq!(status_error(status, "", None).code(), code, "{status}");
        }
    }

    #[test]
    fn status_error_keeps_google_message() {
        let body = r#"{"error": {"code": 403, "message": "Insufficient Permission", "errors": []}}"#;
        let err = status_error(StatusCode::FORBIDDEN, body, None);
        assert_eq!(err.message(), "403 Forbidden: Insufficient Permission");

        let err = status_error(StatusCode::TOO_MANY_REQUESTS, "", Some(30));
        assert!(err.message().ends_with("retry after 30 seconds"));
    }
}
