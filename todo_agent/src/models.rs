// src/models.rs ---------------------------------------------------------------
use serde::{Deserialize, Serialize};

/// One unread message, reduced to what the prompt needs.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct EmailSummary {
    pub sender:  String,
    pub subject: String,
    pub body:    String,
}

/// An upcoming event. `start` is RFC 3339, or `YYYY-MM-DD` for all-day events.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CalendarEntry {
    pub title: String,
    pub start: String,
}

/// Tasks in the order the model emitted them.
pub type TaskList = Vec<String>;
