// src/engine.rs ---------------------------------------------------------------
use std::sync::Arc;

use crate::{
    calendar::CalendarSource,
    credentials::CredentialStore,
    error::AppError,
    generation::Generator,
    mail::MailSource,
    models::TaskList,
    normalize::normalize,
    prompt,
};

/// Runs one to-do request end to end. Every step waits for the previous one.
pub struct TodoEngine {
    pub credentials: CredentialStore,
    pub mail:        Arc<dyn MailSource>,
    pub calendar:    Arc<dyn CalendarSource>,
    pub generator:   Arc<dyn Generator>,
    pub mail_limit:  u32,
    pub event_limit: u32,
}

impl TodoEngine {
    pub async fn run(&self) -> Result<TaskList, AppError> {
        let credential = self.credentials.obtain().await?;

        let emails = self.mail.fetch_unread(&credential, self.mail_limit).await?;
        let events = self.calendar.fetch_upcoming(&credential, self.event_limit).await?;

        let prompt = prompt::build(&emails, &events);
        let raw    = self.generator.generate(&prompt).await?;

        let tasks = normalize(&raw);
        tracing::info!(emails = emails.len(), events = events.len(), tasks = tasks.len(), "to-do list ready");
        Ok(tasks)
    }
}
