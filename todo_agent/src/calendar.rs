// src/calendar.rs -------------------------------------------------------------
use async_trait::async_trait;
use chrono::Utc;
use google_calendar3::api::{Event, Scope as CalScope};

use crate::{
    config::CalendarConfig,
    credentials::Credential,
    error::FetchError,
    google::{calendar_hub, HttpClient},
    models::CalendarEntry,
};

const NO_TITLE: &str = "(No Title)";

#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Events starting from now, earliest first, recurring series expanded
    /// into single instances.
    async fn fetch_upcoming(
        &self,
        credential: &Credential,
        limit: u32,
    ) -> Result<Vec<CalendarEntry>, FetchError>;
}

pub struct GoogleCalendar {
    client:      HttpClient,
    calendar_id: String,
}

impl GoogleCalendar {
    pub fn new(client: HttpClient, config: &CalendarConfig) -> Self {
        Self {
            client,
            calendar_id: config.calendar_id.clone(),
        }
    }
}

#[async_trait]
impl CalendarSource for GoogleCalendar {
    async fn fetch_upcoming(
        &self,
        credential: &Credential,
        limit: u32,
    ) -> Result<Vec<CalendarEntry>, FetchError> {
        let (_, events) = calendar_hub(&self.client, credential)
            .events()
            .list(&self.calendar_id)
            .time_min(Utc::now())
            .max_results(i32::try_from(limit).unwrap_or(i32::MAX))
            .single_events(true)
            .order_by("startTime")
            .add_scope(CalScope::Readonly)
            .doit()
            .await
            .map_err(FetchError::Calendar)?;

        let entries: Vec<CalendarEntry> = events
            .items
            .unwrap_or_default()
            .iter()
            .map(entry)
            .collect();

        tracing::info!(count = entries.len(), "fetched calendar events");
        Ok(entries)
    }
}

/// All-day events only carry a date; everything else has a timestamp.
pub fn entry(event: &Event) -> CalendarEntry {
    let start = event
        .start
        .as_ref()
        .and_then(|s| {
            s.date_time
                .map(|dt| dt.to_rfc3339())
                .or_else(|| s.date.map(|d| d.format("%Y-%m-%d").to_string()))
        })
        .unwrap_or_default();

    CalendarEntry {
        title: event.summary.clone().unwrap_or_else(|| NO_TITLE.to_string()),
        start,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use google_calendar3::api::EventDateTime;

    #[test]
    fn timed_event_uses_timestamp() {
        let event = Event {
            summary: Some("Standup".into()),
            start: Some(EventDateTime {
                date_time: Some(Utc.with_ymd_and_hms(2026, 10, 20, 9, 30, 0).unwrap()),
                date: NaiveDate::from_ymd_opt(2026, 10, 20),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            entry(&event),
            CalendarEntry {
                title: "Standup".into(),
                start: "2026-10-20T09:30:00+00:00".into(),
            }
        );
    }

    #[test]
    fn all_day_event_falls_back_to_date() {
        let event = Event {
            summary: Some("Offsite".into()),
            start: Some(EventDateTime {
                date: NaiveDate::from_ymd_opt(2026, 10, 21),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(entry(&event).start, "2026-10-21");
    }

    #[test]
    fn untitled_event_gets_placeholder() {
        let got = entry(&Event::default());
        assert_eq!(got.title, NO_TITLE);
        assert_eq!(got.start, "");
    }
}
