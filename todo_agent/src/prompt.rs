// src/prompt.rs ---------------------------------------------------------------
use std::fmt;

use crate::models::{CalendarEntry, EmailSummary};

const INSTRUCTION: &str = "\
First, briefly summarize the unread emails above.
Then produce a concise to-do list for today based on the emails and calendar events.
Return the to-do list strictly as a JSON array of strings, one task per string, \
with no surrounding prose.";

/// The single text block sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn build(emails: &[EmailSummary], events: &[CalendarEntry]) -> Prompt {
    let mut text = String::from("Unread Emails:\n");
    if emails.is_empty() {
        text.push_str("(none)\n");
    }
    for (idx, email) in emails.iter().enumerate() {
        if idx > 0 {
            text.push('\n');
        }
        text.push_str(&format!(
            "From: {}\nSubject: {}\nBody: {}\n",
            email.sender, email.subject, email.body
        ));
    }

    text.push_str("\nCalendar Events:\n");
    if events.is_empty() {
        text.push_str("(none)\n");
    }
    for event in events {
        text.push_str(&format!("{} at {}\n", event.title, event.start));
    }

    text.push('\n');
    text.push_str(INSTRUCTION);
    Prompt(text)
}
