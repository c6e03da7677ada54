// src/session.rs

use std::sync::Arc;

use chrono::{Local, TimeZone};
use futures::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chat_log::ChatLogRepository;
use crate::engine::{CompletionEngine, CompletionStreamItem};
use crate::error::ChatLogError;
use crate::types::{AIModel, ChatEntry, ChatMessage, ChatRole};

/// Notifications emitted while a turn runs.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    Progress(String),
    Delta(String),
    FunctionInvoked(ChatEntry),
    Failed(String),
    /// Non-fatal problem, e.g. a skipped save.
    Warning(String),
    /// The assistant entry as finalized at the end of the turn.
    Completed(ChatEntry),
}

/// The live transcript of one logical day, and the driver for its turns.
///
/// `send_message` takes `&mut self`, so turns on one session never overlap.
pub struct ChatSession<Tz: TimeZone = Local> {
    engine: Arc<dyn CompletionEngine>,
    store: Arc<ChatLogRepository<Tz>>,
    model: AIModel,
    system_prompt: String,
    conversation: Vec<ChatEntry>,
    events: Option<UnboundedSender<SessionEvent>>,
}

impl<Tz: TimeZone> ChatSession<Tz> {
    /// Start a session on today's log.
    pub fn new(
        engine: Arc<dyn CompletionEngine>,
        store: Arc<ChatLogRepository<Tz>>,
        model: AIModel,
        system_prompt: impl Into<String>,
    ) -> Self {
        let conversation = store.load_today().logs;
        info!(entries = conversation.len(), model = model.name(), "Loaded conversation");
        Self {
            engine,
            store,
            model,
            system_prompt: system_prompt.into(),
            conversation,
            events: None,
        }
    }

    pub fn with_events(mut self, events: UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn conversation(&self) -> &[ChatEntry] {
        &self.conversation
    }

    pub fn model(&self) -> &AIModel {
        &self.model
    }

    pub fn set_model(&mut self, model: AIModel) {
        info!(model = model.name(), "Switched model");
        self.model = model;
    }

    /// Run one turn and return the finalized assistant entry.
    ///
    /// Every failure ends up in the transcript. Cancelling `cancel` stops the
    /// turn and keeps what was received so far.
    pub async fn send_message(&mut self, text: &str, cancel: &CancellationToken) -> ChatEntry {
        self.conversation.push(ChatEntry::user(text));
        let history: Vec<ChatMessage> = self
            .conversation
            .iter()
            .filter_map(ChatEntry::to_chat_message)
            .collect();

        let mut current = ChatEntry::pending_assistant();
        self.conversation.push(current.clone());
        self.persist();

        let events = self.events.clone();
        let progress = move |line: &str| {
            debug!(progress = %line);
            if let Some(tx) = &events {
                let _ = tx.send(SessionEvent::Progress(line.to_string()));
            }
        };

        let stream = tokio::select! {
            stream = self.engine.generate(&self.model, &self.system_prompt, &history, &progress) => Some(stream),
            _ = cancel.cancelled() => None,
        };

        if let Some(mut stream) = stream {
            loop {
                let item = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    item = stream.next() => item,
                };
                let Some(item) = item else { break };
                current = self.apply(current, item);
                self.persist();
            }
        }
        if cancel.is_cancelled() {
            info!("Turn cancelled");
        }

        current = current.appended("", current.role, false);
        self.replace(&current);
        self.persist();
        self.emit(SessionEvent::Completed(current.clone()));
        current
    }

    fn apply(&mut self, current: ChatEntry, item: CompletionStreamItem) -> ChatEntry {
        match item {
            CompletionStreamItem::TextDelta(delta) => {
                let next = current.appended(&delta, ChatRole::Assistant, true);
                self.replace(&next);
                self.emit(SessionEvent::Delta(delta));
                next
            }
            CompletionStreamItem::FunctionInvoked(entry) => {
                let at = self
                    .position(&current.id)
                    .unwrap_or(self.conversation.len());
                self.conversation.insert(at, entry.clone());
                self.emit(SessionEvent::FunctionInvoked(entry));
                current
            }
            CompletionStreamItem::Error(message) => {
                warn!(error = %message, "Turn failed");
                let next = current.appended(&message, ChatRole::Error, true);
                self.replace(&next);
                self.emit(SessionEvent::Failed(message));
                next
            }
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.conversation.iter().position(|e| e.id == id)
    }

    fn replace(&mut self, entry: &ChatEntry) {
        match self.position(&entry.id) {
            Some(idx) => self.conversation[idx] = entry.clone(),
            None => self.conversation.push(entry.clone()),
        }
    }

    fn persist(&self) {
        match self.store.save_conversations(&self.conversation) {
            Ok(()) => {}
            Err(e @ ChatLogError::SizeAnomaly { .. }) => self.emit(SessionEvent::Warning(e.to_string())),
            Err(e) => {
                error!(error = %e, "Failed to save conversation");
                self.emit(SessionEvent::Warning(e.to_string()));
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::stream;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    use crate::engine::{CompletionStream, Progress};
    use crate::tokenizer::CharCounter;
    use crate::types::{ChatLog, OpenAIModel, WireRole};

    /// Engine replaying one canned turn per call.
    struct ScriptedEngine {
        turns: Mutex<Vec<Vec<CompletionStreamItem>>>,
        hang_after: bool,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedEngine {
        fn new(turns: Vec<Vec<CompletionStreamItem>>) -> Arc<Self> {
            Arc::new(Self {
                turns: Mutex::new(turns.into_iter().rev().collect()),
                hang_after: false,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn hanging(items: Vec<CompletionStreamItem>) -> Arc<Self> {
            Arc::new(Self {
                turns: Mutex::new(vec![items]),
                hang_after: true,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionEngine for ScriptedEngine {
        async fn generate(
            &self,
            _: &AIModel,
            _: &str,
            messages: &[ChatMessage],
            progress: Progress<'_>,
        ) -> CompletionStream {
            self.seen.lock().unwrap().push(messages.to_vec());
            progress("Calling scripted engine");
            let items = self.turns.lock().unwrap().pop().unwrap_or_default();
            if self.hang_after {
                stream::iter(items).chain(stream::pending()).boxed()
            } else {
                stream::iter(items).boxed()
            }
        }
    }

    fn model() -> AIModel {
        AIModel::OpenAI(OpenAIModel::with_counter("gpt-test", 1000, Arc::new(CharCounter)))
    }

    fn session(
        engine: Arc<ScriptedEngine>,
        dir: &std::path::Path,
    ) -> (ChatSession, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Arc::new(ChatLogRepository::new(dir));
        (ChatSession::new(engine, store, model(), "SYS").with_events(tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn text(s: &str) -> CompletionStreamItem {
        CompletionStreamItem::TextDelta(s.to_string())
    }

    fn roles(session: &ChatSession) -> Vec<ChatRole> {
        session.conversation().iter().map(|e| e.role).collect()
    }

    #[tokio::test]
    async fn test_text_turn_builds_and_persists_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine::new(vec![vec![text("Hel"), text("lo")]]);
        let (mut session, mut rx) = session(engine.clone(), dir.path());

        let done = session.send_message("hi", &CancellationToken::new()).await;

        assert_eq!(done.content, "Hello");
        assert_eq!(done.role, ChatRole::Assistant);
        assert!(!done.in_progress);
        assert_eq!(roles(&session), vec![ChatRole::User, ChatRole::Assistant]);
        assert_eq!(session.conversation()[1], done);

        // the engine never sees the pending assistant entry
        assert_eq!(engine.seen.lock().unwrap()[0], vec![ChatMessage::user("hi")]);

        let events = drain(&mut rx);
        assert_eq!(events[0], SessionEvent::Progress("Calling scripted engine".to_string()));
        assert_eq!(events[1], SessionEvent::Delta("Hel".to_string()));
        assert_eq!(events[2], SessionEvent::Delta("lo".to_string()));
        assert_eq!(events[3], SessionEvent::Completed(done.clone()));

        let store = ChatLogRepository::new(dir.path());
        let saved: ChatLog = serde_json::from_slice(&fs::read(store.path_for(store.today())).unwrap()).unwrap();
        assert_eq!(saved.logs, session.conversation().to_vec());
    }

    #[tokio::test]
    async fn test_function_entry_precedes_assistant_reply() {
        let dir = tempfile::tempdir().unwrap();
        let function = ChatEntry::function("fetch_url", "page text");
        let engine = ScriptedEngine::new(vec![
            vec![CompletionStreamItem::FunctionInvoked(function.clone()), text("Summary")],
            vec![text("ok")],
        ]);
        let (mut session, _rx) = session(engine.clone(), dir.path());

        session.send_message("read it", &CancellationToken::new()).await;

        assert_eq!(
            roles(&session),
            vec![ChatRole::User, ChatRole::Function, ChatRole::Assistant]
        );
        assert_eq!(session.conversation()[1], function);
        assert_eq!(session.conversation()[2].content, "Summary");

        // next turn sends the function result back with its name
        session.send_message("thanks", &CancellationToken::new()).await;
        let second = engine.seen.lock().unwrap()[1].clone();
        assert_eq!(second.len(), 4);
        assert_eq!(second[1].role, WireRole::Function);
        assert_eq!(second[1].name.as_deref(), Some("fetch_url"));
    }

    #[tokio::test]
    async fn test_error_item_turns_entry_into_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine::new(vec![
            vec![text("partial "), CompletionStreamItem::Error("boom".to_string())],
            vec![text("fine")],
        ]);
        let (mut session, mut rx) = session(engine.clone(), dir.path());

        let done = session.send_message("first", &CancellationToken::new()).await;

        assert_eq!(done.role, ChatRole::Error);
        assert_eq!(done.content, "partial boom");
        assert!(!done.in_progress);
        assert!(drain(&mut rx).contains(&SessionEvent::Failed("boom".to_string())));

        // error entries are never sent to the model
        session.send_message("second", &CancellationToken::new()).await;
        let history = engine.seen.lock().unwrap()[1].clone();
        assert_eq!(history, vec![ChatMessage::user("first"), ChatMessage::user("second")]);
    }

    #[tokio::test]
    async fn test_cancel_keeps_partial_reply() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine::hanging(vec![text("so far")]);
        let (mut session, _rx) = session(engine, dir.path());

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let done = session.send_message("hi", &cancel).await;

        assert_eq!(done.content, "so far");
        assert!(!done.in_progress);
        let store = ChatLogRepository::new(dir.path());
        let saved = store.load_today();
        assert_eq!(saved.logs.last(), Some(&done));
    }

    #[tokio::test]
    async fn test_loads_todays_log() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatLogRepository::new(dir.path());
        let earlier = ChatEntry::user("from this morning");
        store.save_conversations(std::slice::from_ref(&earlier)).unwrap();

        let (session, _rx) = session(ScriptedEngine::new(vec![]), dir.path());

        assert_eq!(session.conversation(), &[earlier]);
    }

    #[tokio::test]
    async fn test_size_anomaly_is_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatLogRepository::new(dir.path());
        let path = store.path_for(store.today());
        // Unparseable, so the session starts empty, but large.
        let junk = "x".repeat(64 * 1024);
        fs::write(&path, &junk).unwrap();

        let engine = ScriptedEngine::new(vec![vec![text("hello")]]);
        let (mut session, mut rx) = session(engine, dir.path());
        let done = session.send_message("hi", &CancellationToken::new()).await;

        assert_eq!(done.content, "hello");
        assert_eq!(fs::read_to_string(&path).unwrap(), junk);
        let warnings: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::Warning(_)))
            .collect();
        assert!(!warnings.is_empty());
    }
}
