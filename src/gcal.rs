//! Google Calendar client: OAuth flow, event listing, and the calendar
//! side of the reconciliation (the `EventSink` implementation).

use crate::config::{self, AccountTokens, Config};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use google_calendar::types::{
    Event, EventDateTime, EventReminder, MinAccessRole, OrderBy, Reminders, SendUpdates,
};
use google_calendar::Client;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use taskmirror_core::{EventPayload, EventSink, MirrorError, MirrorResult, RawEvent};

const REDIRECT_PORT: u16 = 8085;
const REDIRECT_URI: &str = "http://localhost:8085/callback";
const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/spreadsheets",
];

pub struct GcalClient {
    client: Client,
    calendar_id: String,
}

fn create_client(config: &Config, tokens: &AccountTokens) -> Client {
    Client::new(
        config.google.client_id.clone(),
        config.google.client_secret.clone(),
        REDIRECT_URI.to_string(),
        tokens.access_token.clone(),
        tokens.refresh_token.clone(),
    )
}

/// Start a local HTTP server to receive the OAuth callback
fn wait_for_callback() -> Result<(String, String)> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", REDIRECT_PORT))
        .with_context(|| format!("Failed to bind to port {}", REDIRECT_PORT))?;

    eprintln!("Waiting for OAuth callback on port {}...", REDIRECT_PORT);

    let (mut stream, _) = listener.accept().context("Failed to accept connection")?;

    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    // Parse the request to get the code and state
    let url_part = request_line
        .split_whitespace()
        .nth(1)
        .context("Invalid request")?;

    let url = url::Url::parse(&format!("http://localhost{}", url_part))?;

    let code = url
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.to_string())
        .context("No code in callback")?;

    let state = url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.to_string())
        .context("No state in callback")?;

    // Send a response to the browser
    let response = "HTTP/1.1 200 OK\r\n\
        Content-Type: text/html\r\n\
        Connection: close\r\n\
        \r\n\
        <html><body>\
        <h1>Authentication successful!</h1>\
        <p>You can close this window and return to the terminal.</p>\
        </body></html>";

    stream.write_all(response.as_bytes())?;
    stream.flush()?;

    Ok((code, state))
}

/// Run the full OAuth authentication flow and store the tokens.
/// Returns the account email/identifier.
pub async fn authenticate(config: &Config) -> Result<String> {
    let empty = AccountTokens {
        access_token: String::new(),
        refresh_token: String::new(),
        expires_at: None,
    };
    let mut client = create_client(config, &empty);

    let scopes: Vec<String> = SCOPES.iter().map(|s| s.to_string()).collect();
    let auth_url = client.user_consent_url(&scopes);

    eprintln!("\nOpen this URL in your browser to authenticate:\n");
    eprintln!("{}\n", auth_url);

    // Try to open the browser automatically
    if open::that(&auth_url).is_err() {
        eprintln!("(Could not open browser automatically, please copy the URL above)");
    }

    let (code, state) = wait_for_callback()?;

    eprintln!("\nReceived authorization code, exchanging for tokens...");

    let access_token = client
        .get_access_token(&code, &state)
        .await
        .context("Failed to exchange code for tokens")?;

    let expires_at = if access_token.expires_in > 0 {
        Some(Utc::now() + chrono::Duration::seconds(access_token.expires_in))
    } else {
        None
    };

    let tokens = AccountTokens {
        access_token: access_token.access_token,
        refresh_token: access_token.refresh_token,
        expires_at,
    };
    config::save_tokens(&tokens)?;

    // Discover the account email for the confirmation message
    let client = create_client(config, &tokens);
    let response = client
        .calendar_list()
        .list_all(MinAccessRole::default(), false, false)
        .await?;

    let email = response
        .body
        .iter()
        .find(|cal| cal.primary)
        .map(|cal| cal.id.clone())
        .unwrap_or_else(|| "(unknown)".to_string());

    eprintln!("Authentication successful!");

    Ok(email)
}

/// Internal token refresh
async fn refresh_tokens(config: &Config, tokens: &AccountTokens) -> Result<AccountTokens> {
    let client = create_client(config, tokens);

    let access_token = client
        .refresh_access_token()
        .await
        .context("Failed to refresh token")?;

    let expires_at = if access_token.expires_in > 0 {
        Some(Utc::now() + chrono::Duration::seconds(access_token.expires_in))
    } else {
        None
    };

    // Google typically doesn't return a new refresh_token on refresh
    let refresh_token = if access_token.refresh_token.is_empty() {
        tokens.refresh_token.clone()
    } else {
        access_token.refresh_token
    };

    Ok(AccountTokens {
        access_token: access_token.access_token,
        refresh_token,
        expires_at,
    })
}

impl GcalClient {
    /// Build a client from stored tokens, refreshing them when expired.
    pub async fn connect(config: &Config) -> Result<Self> {
        let mut tokens = config::load_tokens()?;

        if config::tokens_need_refresh(&tokens) {
            eprintln!("Access token expired, refreshing...");
            tokens = refresh_tokens(config, &tokens).await?;
            config::save_tokens(&tokens)?;
        }

        Ok(GcalClient {
            client: create_client(config, &tokens),
            calendar_id: config.google.calendar_id.clone(),
        })
    }

    /// Fetch raw events with an end time after `not_before`.
    pub async fn list_events(&self, not_before: DateTime<Utc>) -> Result<Vec<RawEvent>> {
        let response = self
            .client
            .events()
            .list_all(
                &self.calendar_id,
                "",                      // i_cal_uid
                0,                       // max_attendees
                OrderBy::default(),      // order_by
                &[],                     // private_extended_property
                "",                      // q (search query)
                &[],                     // shared_extended_property
                false,                   // show_deleted
                false,                   // show_hidden_invitations
                false,                   // single_events
                "",                      // time_max
                &not_before.to_rfc3339(),
                "",                      // time_zone
                "",                      // updated_min
            )
            .await
            .context("Failed to fetch events")?;

        Ok(response.body.into_iter().filter_map(to_raw_event).collect())
    }
}

/// Reduce an SDK event to the slice the mapper consumes.
/// Cancelled events, events without an id, and all-day events (no end
/// instant) cannot have been written by the mirror and are dropped.
fn to_raw_event(event: Event) -> Option<RawEvent> {
    if event.status == "cancelled" || event.id.is_empty() {
        return None;
    }

    Some(RawEvent {
        id: event.id,
        summary: event.summary,
        description: event.description,
        end: event.end.as_ref().and_then(|e| e.date_time),
    })
}

/// Convert a payload into the SDK event body for insert/update calls.
fn to_google_event(payload: &EventPayload) -> Event {
    let timezone = payload.start.timezone().name().to_string();

    Event {
        summary: payload.summary.clone(),
        description: payload.description.clone(),
        start: Some(EventDateTime {
            date: None,
            date_time: Some(payload.start.with_timezone(&Utc)),
            time_zone: timezone.clone(),
        }),
        end: Some(EventDateTime {
            date: None,
            date_time: Some(payload.end.with_timezone(&Utc)),
            time_zone: timezone,
        }),
        reminders: Some(Reminders {
            use_default: false,
            overrides: payload
                .reminder_minutes
                .iter()
                .map(|&minutes| EventReminder {
                    method: "popup".to_string(),
                    minutes,
                })
                .collect(),
        }),
        ..Default::default()
    }
}

impl EventSink for GcalClient {
    async fn create(&self, payload: &EventPayload) -> MirrorResult<String> {
        let event = to_google_event(payload);

        let response = self
            .client
            .events()
            .insert(
                &self.calendar_id,
                0,                 // conference_data_version
                0,                 // max_attendees
                false,             // send_notifications
                SendUpdates::None,
                false,             // supports_attachments
                &event,
            )
            .await
            .map_err(|e| MirrorError::Sink(e.to_string()))?;

        Ok(response.body.id)
    }

    async fn delete(&self, event_id: &str) -> MirrorResult<()> {
        let result = self
            .client
            .events()
            .delete(&self.calendar_id, event_id, false, SendUpdates::None)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                // Already gone counts as deleted
                let error_str = e.to_string();
                if error_str.contains("410") || error_str.contains("Gone") {
                    Ok(())
                } else {
                    Err(MirrorError::Sink(error_str))
                }
            }
        }
    }

    async fn update(&self, event_id: &str, payload: &EventPayload) -> MirrorResult<()> {
        let event = to_google_event(payload);

        self.client
            .events()
            .update(
                &self.calendar_id,
                event_id,
                0,                 // conference_data_version
                0,                 // max_attendees
                false,             // send_notifications
                SendUpdates::None,
                false,             // supports_attachments
                &event,
            )
            .await
            .map_err(|e| MirrorError::Sink(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Tz;

    fn sample_payload() -> EventPayload {
        let tz: Tz = "Europe/Istanbul".parse().unwrap();
        let start = tz.with_ymd_and_hms(2024, 3, 1, 8, 15, 0).unwrap();
        EventPayload {
            summary: "7:Write report".to_string(),
            description: "<p>x</p>Parent=No parent\nAlice\n2024-02-01T10:00:00Z".to_string(),
            start,
            end: start + chrono::Duration::hours(1),
            reminder_minutes: vec![1440, 30],
        }
    }

    #[test]
    fn test_to_google_event_fields() {
        let event = to_google_event(&sample_payload());

        assert_eq!(event.summary, "7:Write report");
        let start = event.start.unwrap();
        assert_eq!(start.time_zone, "Europe/Istanbul");
        assert_eq!(
            start.date_time.unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 5, 15, 0).unwrap()
        );
        assert_eq!(
            event.end.unwrap().date_time.unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 6, 15, 0).unwrap()
        );

        let reminders = event.reminders.unwrap();
        assert!(!reminders.use_default);
        let offsets: Vec<i64> = reminders.overrides.iter().map(|r| r.minutes).collect();
        assert_eq!(offsets, vec![1440, 30]);
        assert!(reminders.overrides.iter().all(|r| r.method == "popup"));
    }

    #[test]
    fn test_to_raw_event_skips_cancelled_and_all_day() {
        let mut cancelled = Event::default();
        cancelled.id = "evt-1".to_string();
        cancelled.status = "cancelled".to_string();
        assert!(to_raw_event(cancelled).is_none());

        let mut no_id = Event::default();
        no_id.status = "confirmed".to_string();
        assert!(to_raw_event(no_id).is_none());

        let mut all_day = Event::default();
        all_day.id = "evt-2".to_string();
        all_day.status = "confirmed".to_string();
        all_day.end = Some(EventDateTime {
            date: chrono::NaiveDate::from_ymd_opt(2024, 3, 1),
            date_time: None,
            time_zone: String::new(),
        });
        let raw = to_raw_event(all_day).unwrap();
        assert_eq!(raw.end, None);
    }
}
