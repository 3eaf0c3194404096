//! Personalize / translate toggles over one chapter body.

use super::chat::TRANSLATION_LANGUAGE;
use super::session::Session;
use super::{Outcome, Ticket, TicketCounter};
use crate::error::ApiError;
use crate::models::{
    ChapterEntry, PersonalizeRequest, PersonalizeResponse, TranslateRequest, TranslateResponse,
};
use crate::services::backend::{Backend, check_transform_content};
use crate::utils::text::html_to_text;
use thiserror::Error;

pub const DEFAULT_USER_LEVEL: &str = "intermediate";

/// Reading level sent with personalize requests, taken from the profile.
pub fn user_level(session: Option<&Session>) -> &str {
    match session.map(|s| s.user.programming_experience.as_str()) {
        Some(level @ ("beginner" | "intermediate" | "advanced")) => level,
        _ => DEFAULT_USER_LEVEL,
    }
}

/// Which version of the body is on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Display {
    Original,
    Personalized(String),
    /// `personalized` is what the translation was made from, if anything,
    /// and what comes back when translation is switched off.
    Translated {
        text: String,
        personalized: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InFlight {
    Idle,
    Personalizing(Ticket),
    Translating(Ticket),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViewError {
    #[error("Please wait for the current request to finish.")]
    Busy,
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct PendingPersonalize {
    pub ticket: Ticket,
    pub request: PersonalizeRequest,
}

#[derive(Debug, Clone)]
pub struct PendingTranslate {
    pub ticket: Ticket,
    pub request: TranslateRequest,
}

#[derive(Debug, Clone)]
pub enum TranslateStep {
    /// Translation switched off locally.
    Reverted,
    Requested(PendingTranslate),
}

pub struct ChapterView {
    entry: &'static ChapterEntry,
    original: String,
    display: Display,
    in_flight: InFlight,
    tickets: TicketCounter,
    notice: Option<String>,
}

impl ChapterView {
    pub fn new(entry: &'static ChapterEntry) -> Self {
        ChapterView {
            entry,
            original: html_to_text(entry.body),
            display: Display::Original,
            in_flight: InFlight::Idle,
            tickets: TicketCounter::default(),
            notice: None,
        }
    }

    pub fn entry(&self) -> &'static ChapterEntry {
        self.entry
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn original_text(&self) -> &str {
        &self.original
    }

    pub fn displayed_text(&self) -> &str {
        match &self.display {
            Display::Original => &self.original,
            Display::Personalized(text) => text,
            Display::Translated { text, .. } => text,
        }
    }

    pub fn is_personalizing(&self) -> bool {
        matches!(self.in_flight, InFlight::Personalizing(_))
    }

    pub fn is_translating(&self) -> bool {
        matches!(self.in_flight, InFlight::Translating(_))
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Personalization always starts from the original body.
    pub fn begin_personalize(&mut self, user_level: &str) -> Result<PendingPersonalize, ViewError> {
        if self.in_flight != InFlight::Idle {
            return Err(ViewError::Busy);
        }
        check_transform_content(&self.original).map_err(validation)?;

        let ticket = self.tickets.issue();
        self.in_flight = InFlight::Personalizing(ticket);
        self.notice = None;
        Ok(PendingPersonalize {
            ticket,
            request: PersonalizeRequest {
                content: self.original.clone(),
                chapter_id: self.entry.chapter_id.to_string(),
                user_level: user_level.to_string(),
            },
        })
    }

    pub fn complete_personalize(
        &mut self,
        ticket: Ticket,
        result: Result<PersonalizeResponse, ApiError>,
    ) -> Outcome {
        if self.in_flight != InFlight::Personalizing(ticket) {
            tracing::debug!(?ticket, "ignoring stale personalization");
            return Outcome::Stale;
        }
        self.in_flight = InFlight::Idle;
        match result {
            Ok(response) => {
                self.display = Display::Personalized(response.personalized_content);
                Outcome::Applied
            }
            Err(err) => self.fail(err),
        }
    }

    /// Switches translation off when it is on; otherwise asks for a
    /// translation of whatever is on screen.
    pub fn begin_translate(&mut self) -> Result<TranslateStep, ViewError> {
        if self.in_flight != InFlight::Idle {
            return Err(ViewError::Busy);
        }
        let source = match &self.display {
            Display::Translated { personalized, .. } => {
                let restored = match personalized {
                    Some(text) => Display::Personalized(text.clone()),
                    None => Display::Original,
                };
                self.display = restored;
                return Ok(TranslateStep::Reverted);
            }
            Display::Personalized(text) => text.clone(),
            Display::Original => self.original.clone(),
        };
        check_transform_content(&source).map_err(validation)?;

        let ticket = self.tickets.issue();
        self.in_flight = InFlight::Translating(ticket);
        self.notice = None;
        Ok(TranslateStep::Requested(PendingTranslate {
            ticket,
            request: TranslateRequest {
                content: source,
                chapter_id: Some(self.entry.chapter_id.to_string()),
                target_language: TRANSLATION_LANGUAGE.to_string(),
            },
        }))
    }

    pub fn complete_translate(
        &mut self,
        ticket: Ticket,
        result: Result<TranslateResponse, ApiError>,
    ) -> Outcome {
        if self.in_flight != InFlight::Translating(ticket) {
            tracing::debug!(?ticket, "ignoring stale translation");
            return Outcome::Stale;
        }
        self.in_flight = InFlight::Idle;
        match result {
            Ok(response) => {
                let personalized = match std::mem::replace(&mut self.display, Display::Original) {
                    Display::Personalized(text) => Some(text),
                    Display::Translated { personalized, .. } => personalized,
                    Display::Original => None,
                };
                self.display = Display::Translated {
                    text: response.translated_content,
                    personalized,
                };
                Outcome::Applied
            }
            Err(err) => self.fail(err),
        }
    }

    /// Back to the static body; anything in flight is abandoned.
    pub fn reset(&mut self) {
        self.display = Display::Original;
        self.in_flight = InFlight::Idle;
        self.notice = None;
    }

    pub async fn personalize<B: Backend>(
        &mut self,
        backend: &B,
        user_level: &str,
    ) -> Result<Outcome, ViewError> {
        let pending = self.begin_personalize(user_level)?;
        let result = backend.personalize(&pending.request).await;
        Ok(self.complete_personalize(pending.ticket, result))
    }

    pub async fn toggle_translation<B: Backend>(&mut self, backend: &B) -> Result<Outcome, ViewError> {
        match self.begin_translate()? {
            TranslateStep::Reverted => Ok(Outcome::Applied),
            TranslateStep::Requested(pending) => {
                let result = backend.translate(&pending.request).await;
                Ok(self.complete_translate(pending.ticket, result))
            }
        }
    }

    fn fail(&mut self, err: ApiError) -> Outcome {
        tracing::warn!(error = %err, chapter = self.entry.slug, "transform request failed");
        self.notice = Some(err.user_message());
        Outcome::Failed
    }
}

fn validation(err: ApiError) -> ViewError {
    ViewError::Invalid(err.user_message())
}
