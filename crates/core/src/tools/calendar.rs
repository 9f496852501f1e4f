//! Google Calendar adapter.
//!
//! Read-only access to the user's primary calendar using a long-lived refresh
//! token. The adapter never fails outward: every outcome is a sentence the
//! orchestrator can hand to the model.

use crate::error::ToolError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const CALENDAR_UNAVAILABLE: &str = "Calendar service not available.";
pub const NO_UPCOMING_EVENTS: &str = "No upcoming events found.";
pub const DEFAULT_MAX_RESULTS: usize = 5;

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const UNTITLED_EVENT: &str = "(No title)";

/// Source of the user's upcoming events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CalendarTool: Send + Sync {
    /// A line-per-event digest (`<start>: <summary>`), oldest first, or a
    /// fixed sentence when there is nothing to list or the provider failed.
    async fn fetch_upcoming_events(&self, max_results: usize) -> String;
}

/// OAuth client credentials plus the user's refresh token.
#[derive(Debug, Clone)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub refresh_token: SecretString,
}

/// Provider URLs; overridable so tests can point at a local server.
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub token_url: String,
    pub api_base: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            token_url: GOOGLE_TOKEN_URL.to_string(),
            api_base: GOOGLE_CALENDAR_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: Option<String>,
    pub date: Option<String>,
}

impl EventTime {
    fn display(&self) -> &str {
        self.date_time
            .as_deref()
            .or(self.date.as_deref())
            .unwrap_or("unknown time")
    }

    /// All-day events sort as midnight UTC of their date.
    fn sort_key(&self) -> Option<DateTime<Utc>> {
        if let Some(date_time) = &self.date_time {
            return DateTime::parse_from_rfc3339(date_time)
                .ok()
                .map(|dt| dt.with_timezone(&Utc));
        }
        let date = NaiveDate::parse_from_str(self.date.as_deref()?, "%Y-%m-%d").ok()?;
        Some(date.and_hms_opt(0, 0, 0)?.and_utc())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CalendarEvent {
    pub summary: Option<String>,
    #[serde(default)]
    pub start: EventTime,
}

/// Renders events as `<start>: <summary>` lines, ordered by start time.
///
/// Events whose start cannot be parsed keep their relative order after the
/// parseable ones.
pub fn format_digest(events: &[CalendarEvent]) -> String {
    if events.is_empty() {
        return NO_UPCOMING_EVENTS.to_string();
    }
    let mut ordered: Vec<&CalendarEvent> = events.iter().collect();
    ordered.sort_by_key(|event| match event.start.sort_key() {
        Some(at) => (0, Some(at)),
        None => (1, None),
    });
    ordered
        .iter()
        .map(|event| {
            format!(
                "{}: {}",
                event.start.display(),
                event.summary.as_deref().unwrap_or(UNTITLED_EVENT)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Calendar adapter backed by the Google Calendar REST API.
///
/// Without credentials the adapter stays in an explicit unconfigured state
/// and answers with [`CALENDAR_UNAVAILABLE`].
pub struct GoogleCalendar {
    http: reqwest::Client,
    endpoints: GoogleEndpoints,
    credentials: Option<GoogleCredentials>,
    /// Cached access token. Concurrent refreshes race; the last write wins.
    access_token: RwLock<Option<String>>,
}

impl GoogleCalendar {
    pub fn new(http: reqwest::Client, credentials: Option<GoogleCredentials>) -> Self {
        if credentials.is_none() {
            warn!("Google Calendar credentials missing; calendar lookups are disabled.");
        }
        Self {
            http,
            endpoints: GoogleEndpoints::default(),
            credentials,
            access_token: RwLock::new(None),
        }
    }

    pub fn with_endpoints(mut self, endpoints: GoogleEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    async fn refresh_access_token(&self, credentials: &GoogleCredentials) -> Result<String, ToolError> {
        debug!("Refreshing Google access token");
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", credentials.refresh_token.expose_secret()),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.expose_secret()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Err(ToolError::AuthExpired);
        }
        if !status.is_success() {
            return Err(ToolError::ProviderRequestFailed { status });
        }

        let token: TokenResponse = response.json().await?;
        *self.access_token.write().await = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    async fn current_token(&self, credentials: &GoogleCredentials) -> Result<String, ToolError> {
        if let Some(token) = self.access_token.read().await.clone() {
            return Ok(token);
        }
        self.refresh_access_token(credentials).await
    }

    async fn request_events(
        &self,
        token: &str,
        max_results: usize,
    ) -> Result<reqwest::Response, ToolError> {
        let time_min = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let max_results = max_results.to_string();
        let response = self
            .http
            .get(format!("{}/calendars/primary/events", self.endpoints.api_base))
            .bearer_auth(token)
            .query(&[
                ("timeMin", time_min.as_str()),
                ("maxResults", max_results.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
            ])
            .send()
            .await?;
        Ok(response)
    }

    /// Lists upcoming events, refreshing the access token at most once.
    pub async fn list_events(&self, max_results: usize) -> Result<Vec<CalendarEvent>, ToolError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(ToolError::ProviderUnavailable)?;

        let token = self.current_token(credentials).await?;
        let mut response = self.request_events(&token, max_results).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            info!("Calendar access token rejected; refreshing once and retrying");
            let token = self.refresh_access_token(credentials).await?;
            response = self.request_events(&token, max_results).await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(ToolError::AuthExpired);
            }
        }

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::ProviderRequestFailed { status });
        }

        let list: EventList = response.json().await?;
        Ok(list.items)
    }
}

#[async_trait]
impl CalendarTool for GoogleCalendar {
    async fn fetch_upcoming_events(&self, max_results: usize) -> String {
        match self.list_events(max_results).await {
            Ok(events) => {
                info!(count = events.len(), "Fetched upcoming calendar events");
                format_digest(&events)
            }
            Err(ToolError::ProviderUnavailable) => CALENDAR_UNAVAILABLE.to_string(),
            Err(e) => {
                warn!(error = %e, "Calendar lookup failed");
                format!("Error fetching events: {}", e.spoken())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{Hits, spawn_server};
    use axum::{
        Json, Router,
        extract::Query,
        http::{HeaderMap, StatusCode as AxumStatus},
        response::IntoResponse,
        routing::{get, post},
    };
    use serde_json::json;
    use std::collections::HashMap;

    fn credentials() -> GoogleCredentials {
        GoogleCredentials {
            client_id: "client".to_string(),
            client_secret: SecretString::from("secret".to_string()),
            refresh_token: SecretString::from("refresh".to_string()),
        }
    }

    fn event(start: EventTime, summary: Option<&str>) -> CalendarEvent {
        CalendarEvent {
            summary: summary.map(str::to_string),
            start,
        }
    }

    fn at(date_time: &str) -> EventTime {
        EventTime {
            date_time: Some(date_time.to_string()),
            date: None,
        }
    }

    fn on(date: &str) -> EventTime {
        EventTime {
            date_time: None,
            date: Some(date.to_string()),
        }
    }

    /// A fake Google API whose events endpoint answers 401 for the first
    /// `reject_first` requests, then `events_body`.
    async fn fake_google(
        reject_first: usize,
        events_status: AxumStatus,
        events_body: serde_json::Value,
    ) -> (GoogleEndpoints, Hits, Hits) {
        let token_hits = Hits::default();
        let event_hits = Hits::default();

        let token_counter = token_hits.clone();
        let event_counter = event_hits.clone();
        let router = Router::new()
            .route(
                "/token",
                post(move || async move {
                    let n = token_counter.hit();
                    Json(json!({ "access_token": format!("token-{n}"), "expires_in": 3600 }))
                }),
            )
            .route(
                "/calendars/primary/events",
                get(
                    move |headers: HeaderMap, Query(query): Query<HashMap<String, String>>| async move {
                        let n = event_counter.hit();
                        assert!(headers.get("authorization").is_some());
                        assert_eq!(query.get("singleEvents").map(String::as_str), Some("true"));
                        assert_eq!(query.get("orderBy").map(String::as_str), Some("startTime"));
                        assert!(query.contains_key("timeMin"));
                        if n <= reject_first {
                            return (AxumStatus::UNAUTHORIZED, Json(json!({}))).into_response();
                        }
                        (events_status, Json(events_body.clone())).into_response()
                    },
                ),
            );

        let base = spawn_server(router).await;
        let endpoints = GoogleEndpoints {
            token_url: format!("{base}/token"),
            api_base: base,
        };
        (endpoints, token_hits, event_hits)
    }

    #[test]
    fn digest_orders_by_start_and_fills_gaps() {
        let events = vec![
            event(at("2026-10-20T15:00:00+05:00"), Some("Dentist")),
            event(on("2026-10-19"), Some("Holiday")),
            event(at("2026-10-19T09:30:00Z"), None),
        ];
        assert_eq!(
            format_digest(&events),
            "2026-10-19: Holiday\n2026-10-19T09:30:00Z: (No title)\n2026-10-20T15:00:00+05:00: Dentist"
        );
    }

    #[test]
    fn empty_digest_is_the_fixed_sentence() {
        assert_eq!(format_digest(&[]), "No upcoming events found.");
    }

    #[tokio::test]
    async fn unconfigured_adapter_reports_unavailable() {
        let calendar = GoogleCalendar::new(reqwest::Client::new(), None);
        assert!(!calendar.is_configured());
        assert_eq!(
            calendar.fetch_upcoming_events(DEFAULT_MAX_RESULTS).await,
            CALENDAR_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn empty_result_set_is_reported() {
        let (endpoints, _, _) = fake_google(0, AxumStatus::OK, json!({ "items": [] })).await;
        let calendar =
            GoogleCalendar::new(reqwest::Client::new(), Some(credentials())).with_endpoints(endpoints);

        assert_eq!(calendar.fetch_upcoming_events(5).await, "No upcoming events found.");
    }

    #[tokio::test]
    async fn events_are_rendered_line_per_event() {
        let body = json!({
            "items": [
                { "summary": "Standup", "start": { "dateTime": "2026-10-19T09:00:00Z" } },
                { "summary": "Flight to Karachi", "start": { "date": "2026-10-21" } }
            ]
        });
        let (endpoints, token_hits, _) = fake_google(0, AxumStatus::OK, body).await;
        let calendar =
            GoogleCalendar::new(reqwest::Client::new(), Some(credentials())).with_endpoints(endpoints);

        assert_eq!(
            calendar.fetch_upcoming_events(5).await,
            "2026-10-19T09:00:00Z: Standup\n2026-10-21: Flight to Karachi"
        );
        // The cached token is reused on the next call.
        calendar.fetch_upcoming_events(5).await;
        assert_eq!(token_hits.count(), 1);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_exactly_once() {
        let body = json!({ "items": [{ "summary": "Gym", "start": { "date": "2026-10-19" } }] });
        let (endpoints, token_hits, event_hits) = fake_google(1, AxumStatus::OK, body).await;
        let calendar =
            GoogleCalendar::new(reqwest::Client::new(), Some(credentials())).with_endpoints(endpoints);

        assert_eq!(calendar.fetch_upcoming_events(5).await, "2026-10-19: Gym");
        assert_eq!(token_hits.count(), 2);
        assert_eq!(event_hits.count(), 2);
    }

    #[tokio::test]
    async fn persistent_rejection_gives_up_after_one_retry() {
        let (endpoints, _, event_hits) = fake_google(usize::MAX, AxumStatus::OK, json!({})).await;
        let calendar =
            GoogleCalendar::new(reqwest::Client::new(), Some(credentials())).with_endpoints(endpoints);

        let result = calendar.list_events(5).await;
        assert_eq!(result, Err(ToolError::AuthExpired));
        assert_eq!(event_hits.count(), 2);
    }

    #[tokio::test]
    async fn provider_errors_do_not_leak_payloads() {
        let (endpoints, _, _) = fake_google(
            0,
            AxumStatus::INTERNAL_SERVER_ERROR,
            json!({ "error": "backend exploded: api_key=AIzaSECRET" }),
        )
        .await;
        let calendar =
            GoogleCalendar::new(reqwest::Client::new(), Some(credentials())).with_endpoints(endpoints);

        let text = calendar.fetch_upcoming_events(5).await;
        assert!(!text.is_empty());
        assert!(!text.contains("AIzaSECRET"));
        assert!(!text.contains("exploded"));
        assert!(text.starts_with("Error fetching events:"));
    }

    #[tokio::test]
    async fn unreachable_provider_degrades_to_a_sentence() {
        let endpoints = GoogleEndpoints {
            token_url: "http://127.0.0.1:1/token".to_string(),
            api_base: "http://127.0.0.1:1".to_string(),
        };
        let calendar =
            GoogleCalendar::new(reqwest::Client::new(), Some(credentials())).with_endpoints(endpoints);

        let text = calendar.fetch_upcoming_events(5).await;
        assert_eq!(text, "Error fetching events: I couldn't reach that service right now.");
    }
}
