//! The floating assistant panel: transcript, gating, selection context and
//! per-message translation.

use super::session::SessionReceiver;
use super::{Outcome, Ticket, TicketCounter};
use crate::error::ApiError;
use crate::models::{ChatRequest, ChatResponse, Source, TranslateRequest, TranslateResponse};
use crate::services::backend::{Backend, check_question, check_transform_content};
use crate::utils::text::excerpt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const WELCOME_ID: &str = "welcome";
const WELCOME_TEXT: &str = "Hi! I'm your Physical AI textbook assistant. Ask me any questions about ROS 2, Gazebo, NVIDIA Isaac, or humanoid robotics. You can also select text on the page and ask questions about it!";
pub const TRANSLATION_LANGUAGE: &str = "urdu";
const CONTEXT_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    id: String,
    role: Role,
    content: String,
    translated_content: Option<String>,
    sources: Vec<Source>,
    showing_translation: bool,
    translating: Option<Ticket>,
}

impl ChatMessage {
    fn new(id: String, role: Role, content: String, sources: Vec<Source>) -> Self {
        ChatMessage {
            id,
            role,
            content,
            translated_content: None,
            sources,
            showing_translation: false,
            translating: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn translated_content(&self) -> Option<&str> {
        self.translated_content.as_deref()
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn is_translatable(&self) -> bool {
        self.role == Role::Assistant && self.id != WELCOME_ID
    }

    pub fn is_translating(&self) -> bool {
        self.translating.is_some()
    }

    pub fn is_showing_translation(&self) -> bool {
        self.showing_translation && self.translated_content.is_some()
    }

    /// Text currently on screen for this message.
    pub fn displayed(&self) -> &str {
        match (&self.translated_content, self.showing_translation) {
            (Some(translated), true) => translated,
            _ => &self.content,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PanelError {
    #[error("Please sign in to chat with the assistant.")]
    SignedOut,
    #[error("A request is already in progress.")]
    Busy,
    #[error("{0}")]
    Invalid(String),
    #[error("No message with id {0}.")]
    UnknownMessage(String),
    #[error("This message cannot be translated.")]
    NotTranslatable,
}

impl PanelError {
    fn from_validation(err: ApiError) -> Self {
        PanelError::Invalid(err.user_message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    SignedOut,
    Idle,
    AwaitingAnswer,
}

#[derive(Debug, Clone)]
pub struct PendingQuestion {
    pub ticket: Ticket,
    pub request: ChatRequest,
}

#[derive(Debug, Clone)]
pub struct PendingTranslation {
    pub ticket: Ticket,
    pub message_id: String,
    pub request: TranslateRequest,
}

#[derive(Debug, Clone)]
pub enum TranslationToggle {
    /// Cached translation is now displayed.
    Shown,
    /// Back to the original text.
    Hidden,
    /// No translation yet; this request must be sent.
    Requested(PendingTranslation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn is_mobile(&self) -> bool {
        self.width < 768
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelSize {
    pub width: u32,
    pub height: u32,
}

impl PanelSize {
    pub const COMPACT: PanelSize = PanelSize {
        width: 384,
        height: 500,
    };
    pub const EXPANDED: PanelSize = PanelSize {
        width: 600,
        height: 700,
    };
    const MIN_WIDTH: u32 = 300;
    const MAX_WIDTH: u32 = 800;
    const MIN_HEIGHT: u32 = 400;

    pub fn preset(expanded: bool, viewport: Viewport) -> PanelSize {
        match (viewport.is_mobile(), expanded) {
            (false, false) => Self::COMPACT,
            (false, true) => Self::EXPANDED,
            (true, false) => PanelSize {
                width: viewport.width.saturating_sub(48),
                // Three fifths never exceeds the original height.
                height: (u64::from(viewport.height) * 3 / 5) as u32,
            },
            (true, true) => PanelSize {
                width: viewport.width.saturating_sub(24),
                height: viewport.height.saturating_sub(100),
            },
        }
    }

    /// Grows (or shrinks, for negative deltas) from the top-left corner,
    /// clamped to the allowed range.
    pub fn resized(self, dx: i32, dy: i32, viewport: Viewport) -> PanelSize {
        let max_height = viewport.height.saturating_sub(100).max(Self::MIN_HEIGHT);
        let width = (i64::from(self.width) + i64::from(dx))
            .clamp(i64::from(Self::MIN_WIDTH), i64::from(Self::MAX_WIDTH));
        let height = (i64::from(self.height) + i64::from(dy))
            .clamp(i64::from(Self::MIN_HEIGHT), i64::from(max_height));
        PanelSize {
            width: width as u32,
            height: height as u32,
        }
    }
}

pub struct ChatPanel {
    session: SessionReceiver,
    messages: Vec<ChatMessage>,
    selection: Option<String>,
    tickets: TicketCounter,
    answer: Option<Ticket>,
    notice: Option<String>,
    open: bool,
    expanded: bool,
    size: PanelSize,
}

impl ChatPanel {
    pub fn new(session: SessionReceiver) -> Self {
        ChatPanel {
            session,
            messages: vec![ChatMessage::new(
                WELCOME_ID.to_string(),
                Role::Assistant,
                WELCOME_TEXT.to_string(),
                Vec::new(),
            )],
            selection: None,
            tickets: TicketCounter::default(),
            answer: None,
            notice: None,
            open: false,
            expanded: false,
            size: PanelSize::COMPACT,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.borrow().is_some()
    }

    pub fn state(&self) -> PanelState {
        if !self.is_signed_in() {
            PanelState::SignedOut
        } else if self.answer.is_some() {
            PanelState::AwaitingAnswer
        } else {
            PanelState::Idle
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn message(&self, id: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    /// Remembers a page selection for the next question. Blank selections
    /// are ignored and leave any earlier one in place.
    pub fn capture_selection(&mut self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.selection = Some(trimmed.to_string());
        true
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    /// Hides the panel; the transcript stays.
    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn toggle_open(&mut self) {
        self.open = !self.open;
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn size(&self) -> PanelSize {
        self.size
    }

    pub fn toggle_expanded(&mut self, viewport: Viewport) {
        self.expanded = !self.expanded;
        self.size = PanelSize::preset(self.expanded, viewport);
    }

    pub fn resize_by(&mut self, dx: i32, dy: i32, viewport: Viewport) {
        if viewport.is_mobile() {
            return;
        }
        self.size = self.size.resized(dx, dy, viewport);
    }

    /// Drops every outstanding request once the reader is signed out.
    fn sync_session(&mut self) {
        if self.is_signed_in() {
            return;
        }
        if self.answer.take().is_some() {
            tracing::debug!("abandoning answer request after sign-out");
        }
        for message in &mut self.messages {
            message.translating = None;
        }
    }

    pub fn begin_send(&mut self, input: &str) -> Result<PendingQuestion, PanelError> {
        self.sync_session();
        if !self.is_signed_in() {
            return Err(PanelError::SignedOut);
        }
        if self.answer.is_some() {
            return Err(PanelError::Busy);
        }
        check_question(input).map_err(PanelError::from_validation)?;

        let question = input.trim().to_string();
        let context = self.selection.clone();
        let shown = match &context {
            Some(selected) => format!(
                "{question}\n\n[Selected text: \"{}\"]",
                excerpt(selected, CONTEXT_PREVIEW_CHARS)
            ),
            None => question.clone(),
        };
        self.messages.push(ChatMessage::new(
            uuid::Uuid::new_v4().to_string(),
            Role::User,
            shown,
            Vec::new(),
        ));
        self.notice = None;

        let ticket = self.tickets.issue();
        self.answer = Some(ticket);
        Ok(PendingQuestion {
            ticket,
            request: ChatRequest { question, context },
        })
    }

    pub fn complete_send(
        &mut self,
        ticket: Ticket,
        result: Result<ChatResponse, ApiError>,
    ) -> Outcome {
        self.sync_session();
        if self.answer != Some(ticket) {
            tracing::debug!(?ticket, "ignoring stale answer");
            return Outcome::Stale;
        }
        self.answer = None;

        match result {
            Ok(response) => {
                let id = response
                    .message_id
                    .filter(|id| !id.is_empty() && self.message(id).is_none())
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                self.messages.push(ChatMessage::new(
                    id,
                    Role::Assistant,
                    response.answer,
                    response.sources.unwrap_or_default(),
                ));
                self.selection = None;
                Outcome::Applied
            }
            Err(err) => {
                tracing::warn!(error = %err, "chat request failed");
                self.notice = Some(err.user_message());
                Outcome::Failed
            }
        }
    }

    /// Asks one question and applies the answer.
    pub async fn send<B: Backend>(
        &mut self,
        backend: &B,
        input: &str,
    ) -> Result<Outcome, PanelError> {
        let pending = self.begin_send(input)?;
        let result = backend.ask(&pending.request).await;
        Ok(self.complete_send(pending.ticket, result))
    }

    pub fn toggle_translation(&mut self, id: &str) -> Result<TranslationToggle, PanelError> {
        self.sync_session();
        if !self.is_signed_in() {
            return Err(PanelError::SignedOut);
        }
        let ticket = self.tickets.issue();
        let message = self
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| PanelError::UnknownMessage(id.to_string()))?;
        if !message.is_translatable() {
            return Err(PanelError::NotTranslatable);
        }
        if message.translating.is_some() {
            return Err(PanelError::Busy);
        }
        if message.translated_content.is_some() {
            message.showing_translation = !message.showing_translation;
            return Ok(if message.showing_translation {
                TranslationToggle::Shown
            } else {
                TranslationToggle::Hidden
            });
        }

        check_transform_content(&message.content).map_err(PanelError::from_validation)?;
        message.translating = Some(ticket);
        Ok(TranslationToggle::Requested(PendingTranslation {
            ticket,
            message_id: message.id.clone(),
            request: TranslateRequest {
                content: message.content.clone(),
                chapter_id: None,
                target_language: TRANSLATION_LANGUAGE.to_string(),
            },
        }))
    }

    pub fn complete_translation(
        &mut self,
        ticket: Ticket,
        message_id: &str,
        result: Result<TranslateResponse, ApiError>,
    ) -> Outcome {
        self.sync_session();
        let Some(message) = self.messages.iter_mut().find(|m| m.id == message_id) else {
            return Outcome::Stale;
        };
        if message.translating != Some(ticket) {
            tracing::debug!(?ticket, message_id, "ignoring stale translation");
            return Outcome::Stale;
        }
        message.translating = None;

        match result {
            Ok(response) => {
                message.translated_content = Some(response.translated_content);
                message.showing_translation = true;
                Outcome::Applied
            }
            Err(err) => {
                tracing::warn!(error = %err, message_id, "translation failed");
                self.notice = Some(err.user_message());
                Outcome::Failed
            }
        }
    }

    /// Flips a message between languages, fetching the translation the
    /// first time only.
    pub async fn translate<B: Backend>(
        &mut self,
        backend: &B,
        id: &str,
    ) -> Result<Outcome, PanelError> {
        match self.toggle_translation(id)? {
            TranslationToggle::Shown | TranslationToggle::Hidden => Ok(Outcome::Applied),
            TranslationToggle::Requested(pending) => {
                let result = backend.translate(&pending.request).await;
                Ok(self.complete_translation(pending.ticket, &pending.message_id, result))
            }
        }
    }

    /// Forgets a cached translation so the next toggle fetches it again.
    pub fn reset_translation(&mut self, id: &str) -> Result<(), PanelError> {
        let message = self
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| PanelError::UnknownMessage(id.to_string()))?;
        message.translated_content = None;
        message.showing_translation = false;
        message.translating = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::session::tests::{session, signed_in_store};
    use crate::client::session::{MemoryStorage, SessionStore};
    use crate::client::testing::{Failure, RecordingBackend};

    const LONG_ANSWER_QUESTION: &str =
        "How do ROS 2 topics differ from services when streaming camera frames?";

    fn signed_in_panel() -> (SessionStore<MemoryStorage>, ChatPanel) {
        let store = signed_in_store();
        let panel = ChatPanel::new(store.subscribe());
        (store, panel)
    }

    #[test]
    fn starts_with_untranslatable_welcome() {
        let (_store, panel) = signed_in_panel();
        assert_eq!(panel.messages().len(), 1);
        let welcome = &panel.messages()[0];
        assert_eq!(welcome.id(), WELCOME_ID);
        assert!(!welcome.is_translatable());
        assert_eq!(panel.state(), PanelState::Idle);
    }

    #[tokio::test]
    async fn signed_out_panel_sends_nothing() {
        let store = SessionStore::open(MemoryStorage::default());
        let mut panel = ChatPanel::new(store.subscribe());
        let backend = RecordingBackend::default();

        assert_eq!(panel.state(), PanelState::SignedOut);
        let err = panel.send(&backend, "hello").await.unwrap_err();
        assert_eq!(err, PanelError::SignedOut);
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn gating_follows_sign_in_without_polling() {
        let mut store = SessionStore::open(MemoryStorage::default());
        let panel = ChatPanel::new(store.subscribe());
        assert_eq!(panel.state(), PanelState::SignedOut);

        store.set(session()).unwrap();
        assert_eq!(panel.state(), PanelState::Idle);
    }

    #[tokio::test]
    async fn successful_round_trip_appends_one_answer() {
        let (_store, mut panel) = signed_in_panel();
        let backend = RecordingBackend::default();

        let outcome = panel.send(&backend, "  What is a node?  ").await.unwrap();
        assert_eq!(outcome, Outcome::Applied);
        let messages = panel.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role(), Role::User);
        assert_eq!(messages[1].content(), "What is a node?");
        assert_eq!(messages[2].role(), Role::Assistant);
        assert_eq!(messages[2].id(), "a-1");
        assert_eq!(messages[2].sources().len(), 1);
        assert_eq!(backend.asks.lock().unwrap()[0].question, "What is a node?");
        assert_eq!(panel.state(), PanelState::Idle);
    }

    #[tokio::test]
    async fn blank_question_is_rejected_locally() {
        let (_store, mut panel) = signed_in_panel();
        let backend = RecordingBackend::default();
        let err = panel.send(&backend, "   ").await.unwrap_err();
        assert!(matches!(err, PanelError::Invalid(_)));
        assert_eq!(backend.calls(), 0);
        assert_eq!(panel.messages().len(), 1);
    }

    #[tokio::test]
    async fn upstream_error_keeps_only_the_user_message() {
        let (_store, mut panel) = signed_in_panel();
        let backend = RecordingBackend::failing(Failure::Status(503));

        let outcome = panel.send(&backend, "What is Nav2?").await.unwrap();
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(panel.messages().len(), 2);
        assert_eq!(panel.messages()[1].role(), Role::User);
        assert!(panel.notice().unwrap().contains("503"));
        assert_eq!(panel.state(), PanelState::Idle);
    }

    #[tokio::test]
    async fn connection_error_has_its_own_notice() {
        let (_store, mut panel) = signed_in_panel();
        let backend = RecordingBackend::failing(Failure::Offline);

        panel.send(&backend, "What is Nav2?").await.unwrap();
        assert!(panel.notice().unwrap().contains("connection"));
    }

    #[tokio::test]
    async fn selection_rides_along_once() {
        let (_store, mut panel) = signed_in_panel();
        let backend = RecordingBackend::default();

        assert!(!panel.capture_selection("   "));
        assert!(panel.capture_selection("  Costmaps represent the environment  "));
        panel.send(&backend, "Explain this").await.unwrap();
        panel.send(&backend, "And now?").await.unwrap();

        let asks = backend.asks.lock().unwrap();
        assert_eq!(
            asks[0].context.as_deref(),
            Some("Costmaps represent the environment")
        );
        assert!(asks[1].context.is_none());
        assert!(
            panel.messages()[1]
                .content()
                .contains("[Selected text: \"Costmaps represent the environment\"]")
        );
        assert!(panel.selection().is_none());
    }

    #[tokio::test]
    async fn selection_survives_a_failed_question() {
        let (_store, mut panel) = signed_in_panel();
        let backend = RecordingBackend::failing(Failure::Status(500));
        panel.capture_selection("Domain randomization");
        panel.send(&backend, "Why?").await.unwrap();
        assert_eq!(panel.selection(), Some("Domain randomization"));
    }

    #[test]
    fn second_send_while_waiting_is_busy() {
        let (_store, mut panel) = signed_in_panel();
        let first = panel.begin_send("first").unwrap();
        assert_eq!(panel.state(), PanelState::AwaitingAnswer);
        assert_eq!(panel.begin_send("second").unwrap_err(), PanelError::Busy);

        let outcome = panel.complete_send(
            first.ticket,
            Ok(ChatResponse {
                message_id: None,
                answer: "done".into(),
                sources: None,
            }),
        );
        assert_eq!(outcome, Outcome::Applied);
        assert!(panel.begin_send("second").is_ok());
    }

    #[test]
    fn late_answer_after_sign_out_is_dropped() {
        let (mut store, mut panel) = signed_in_panel();
        let pending = panel.begin_send("question").unwrap();
        store.clear().unwrap();
        assert_eq!(panel.state(), PanelState::SignedOut);

        let outcome = panel.complete_send(
            pending.ticket,
            Ok(ChatResponse {
                message_id: Some("late".into()),
                answer: "too late".into(),
                sources: None,
            }),
        );
        assert_eq!(outcome, Outcome::Stale);
        assert!(panel.message("late").is_none());
    }

    #[tokio::test]
    async fn translation_is_fetched_once_and_toggled_locally() {
        let (_store, mut panel) = signed_in_panel();
        let backend = RecordingBackend::default();
        panel.send(&backend, LONG_ANSWER_QUESTION).await.unwrap();
        let id = panel.messages()[2].id().to_string();
        let original = panel.messages()[2].content().to_string();

        assert_eq!(panel.translate(&backend, &id).await.unwrap(), Outcome::Applied);
        let message = panel.message(&id).unwrap();
        assert!(message.is_showing_translation());
        assert_eq!(message.displayed(), format!("[urdu] {original}"));

        assert_eq!(panel.translate(&backend, &id).await.unwrap(), Outcome::Applied);
        let message = panel.message(&id).unwrap();
        assert_eq!(message.displayed(), original);
        assert!(message.translated_content().is_some());
        assert_eq!(backend.translations.lock().unwrap().len(), 1);

        assert!(matches!(
            panel.toggle_translation(&id).unwrap(),
            TranslationToggle::Shown
        ));
        assert_eq!(backend.translations.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn short_answer_translation_is_rejected_locally() {
        let (_store, mut panel) = signed_in_panel();
        let backend = RecordingBackend::default();
        panel.send(&backend, "Hi").await.unwrap();
        let id = panel.messages()[2].id().to_string();

        let err = panel.translate(&backend, &id).await.unwrap_err();
        assert!(matches!(err, PanelError::Invalid(_)));
        assert!(backend.translations.lock().unwrap().is_empty());
    }

    #[test]
    fn welcome_and_user_messages_are_not_translatable() {
        let (_store, mut panel) = signed_in_panel();
        assert_eq!(
            panel.toggle_translation(WELCOME_ID).unwrap_err(),
            PanelError::NotTranslatable
        );
        let pending = panel.begin_send(LONG_ANSWER_QUESTION).unwrap();
        let user_id = panel.messages()[1].id().to_string();
        assert_eq!(
            panel.toggle_translation(&user_id).unwrap_err(),
            PanelError::NotTranslatable
        );
        drop(pending);
    }

    #[tokio::test]
    async fn reset_translation_forces_a_new_request() {
        let (_store, mut panel) = signed_in_panel();
        let backend = RecordingBackend::default();
        panel.send(&backend, LONG_ANSWER_QUESTION).await.unwrap();
        let id = panel.messages()[2].id().to_string();

        panel.translate(&backend, &id).await.unwrap();
        panel.reset_translation(&id).unwrap();
        assert!(panel.message(&id).unwrap().translated_content().is_none());
        panel.translate(&backend, &id).await.unwrap();
        assert_eq!(backend.translations.lock().unwrap().len(), 2);
    }

    #[test]
    fn closing_keeps_the_transcript() {
        let (_store, mut panel) = signed_in_panel();
        panel.open();
        let pending = panel.begin_send("keep me").unwrap();
        panel.complete_send(
            pending.ticket,
            Err(ApiError::Connection("refused".into())),
        );
        panel.close();
        assert!(!panel.is_open());
        panel.toggle_open();
        assert_eq!(panel.messages().len(), 2);
    }

    #[test]
    fn tall_phone_viewport_does_not_overflow() {
        let viewport = Viewport {
            width: 390,
            height: 2_000_000_000,
        };
        assert_eq!(
            PanelSize::preset(false, viewport),
            PanelSize {
                width: 342,
                height: 1_200_000_000
            }
        );
        assert_eq!(PanelSize::preset(false, Viewport { width: 390, height: u32::MAX }).height, 2_576_980_377);
    }

    #[test]
    fn panel_size_presets_and_clamping() {
        let desktop = Viewport {
            width: 1440,
            height: 900,
        };
        let mut panel = ChatPanel::new(signed_in_store().subscribe());
        assert_eq!(panel.size(), PanelSize::COMPACT);
        panel.toggle_expanded(desktop);
        assert_eq!(panel.size(), PanelSize::EXPANDED);

        panel.resize_by(1000, 1000, desktop);
        assert_eq!(
            panel.size(),
            PanelSize {
                width: 800,
                height: 800
            }
        );
        panel.resize_by(-2000, -2000, desktop);
        assert_eq!(
            panel.size(),
            PanelSize {
                width: 300,
                height: 400
            }
        );

        let phone = Viewport {
            width: 390,
            height: 800,
        };
        panel.toggle_expanded(phone);
        assert_eq!(
            panel.size(),
            PanelSize {
                width: 342,
                height: 480
            }
        );
    }
}
