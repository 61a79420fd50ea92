// src/mail.rs -----------------------------------------------------------------
use async_trait::async_trait;
use google_gmail1::api::{Message, MessagePart, Scope as GmailScope};

use crate::{
    config::MailConfig,
    credentials::Credential,
    error::FetchError,
    google::{gmail_hub, HttpClient},
    models::EmailSummary,
};

const NO_SUBJECT: &str = "(No Subject)";
const NO_SENDER:  &str = "(Unknown Sender)";

#[async_trait]
pub trait MailSource: Send + Sync {
    /// First page only: at most `limit` messages, more may exist.
    async fn fetch_unread(
        &self,
        credential: &Credential,
        limit: u32,
    ) -> Result<Vec<EmailSummary>, FetchError>;
}

pub struct GmailSource {
    client:          HttpClient,
    query:           String,
    body_char_limit: usize,
}

impl GmailSource {
    pub fn new(client: HttpClient, config: &MailConfig) -> Self {
        Self {
            client,
            query:           config.query.clone(),
            body_char_limit: config.body_char_limit,
        }
    }
}

#[async_trait]
impl MailSource for GmailSource {
    async fn fetch_unread(
        &self,
        credential: &Credential,
        limit: u32,
    ) -> Result<Vec<EmailSummary>, FetchError> {
        let hub = gmail_hub(&self.client, credential);

        // a. list
        let mut list = hub.users().messages_list("me").max_results(limit);
        if !self.query.is_empty() {
            list = list.q(&self.query);
        }
        let (_, list_resp) = list
            .add_scope(GmailScope::Readonly)
            .doit()
            .await
            .map_err(FetchError::Mail)?;

        // b. full messages
        let mut out = Vec::new();
        for id in list_resp.messages.unwrap_or_default().into_iter().filter_map(|m| m.id) {
            let (_, msg) = hub.users()
                .messages_get("me", &id)
                .format("full")
                .add_scope(GmailScope::Readonly)
                .doit()
                .await
                .map_err(FetchError::Mail)?;

            out.push(summarize(&msg, self.body_char_limit));
        }

        tracing::info!(count = out.len(), "fetched mail");
        Ok(out)
    }
}

// -----------------------------------------------------------------------------
// extraction
pub fn summarize(msg: &Message, body_char_limit: usize) -> EmailSummary {
    let payload = msg.payload.as_ref();
    EmailSummary {
        sender:  header(payload, "From").unwrap_or_else(|| NO_SENDER.to_string()),
        subject: header(payload, "Subject").unwrap_or_else(|| NO_SUBJECT.to_string()),
        body:    truncate_chars(&payload.map(body_text).unwrap_or_default(), body_char_limit),
    }
}

fn header(payload: Option<&MessagePart>, name: &str) -> Option<String> {
    payload?
        .headers
        .as_ref()?
        .iter()
        .find(|h| h.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(name)))
        .and_then(|h| h.value.clone())
}

/// A non-multipart message carries its text in the top-level body; otherwise
/// the first `text/plain` part wins, searched depth-first.
pub fn body_text(payload: &MessagePart) -> String {
    let data = match payload.parts.as_deref() {
        None | Some([]) => part_data(payload),
        Some(parts)     => parts.iter().find_map(first_plain_part),
    };
    data.map(lossy_utf8).unwrap_or_default()
}

fn first_plain_part(part: &MessagePart) -> Option<&[u8]> {
    if part.mime_type.as_deref() == Some("text/plain") {
        return part_data(part);
    }
    part.parts.as_deref()?.iter().find_map(first_plain_part)
}

fn part_data(part: &MessagePart) -> Option<&[u8]> {
    part.body.as_ref()?.data.as_deref()
}

/// Undecodable byte sequences are dropped.
pub fn lossy_utf8(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return text.to_string();
    }
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None           => text.to_string(),
    }
}
