use std::time::Duration;

use futures_util::stream::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::api::{ByteStream, ChatTransport};
use crate::chat::reasoning::finalize_answer;
use crate::error::{ChatError, FrameError, TransportError};
use crate::models::{ChatMessage, ChatRequest, Proposal};
use crate::stream::{parse_event, Event, FrameDecoder};

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Streaming,
    Erred,
}

/// Change notifications for whatever renders the conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Submitted { generation: u64 },
    Proposals(Vec<Proposal>),
    Delta(String),
    Finished(ChatMessage),
    Failed(String),
}

/// Effect of one admitted event on the running exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Continue,
    Finished(ChatMessage),
    /// The event belonged to an exchange that is no longer current
    Ignored,
}

/// One conversation: its transcript plus at most one in-flight exchange.
pub struct ChatSession {
    id: Uuid,
    transcript: Vec<ChatMessage>,
    pending: String,
    proposals: Vec<Proposal>,
    status: SessionStatus,
    generation: u64,
    last_error: Option<String>,
    idle_timeout: Duration,
    updates: Option<mpsc::UnboundedSender<SessionUpdate>>,
    shutdown: CancellationToken,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            transcript: Vec::new(),
            pending: String::new(),
            proposals: Vec::new(),
            status: SessionStatus::Idle,
            generation: 0,
            last_error: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            updates: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// A session that reports every state change on the returned channel.
    pub fn with_updates() -> (Self, mpsc::UnboundedReceiver<SessionUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut session = Self::new();
        session.updates = Some(tx);
        (session, rx)
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Text received so far for the running exchange. Only ever grows until
    /// the exchange ends.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn proposals(&self) -> &[Proposal] {
        &self.proposals
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_streaming(&self) -> bool {
        self.status == SessionStatus::Streaming
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Token that tears the session down when cancelled, stopping any read
    /// loop that is still running.
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn close(&mut self) {
        self.shutdown.cancel();
        if self.is_streaming() {
            self.pending.clear();
            self.status = SessionStatus::Idle;
        }
    }

    /// Start a new exchange for `prompt` and return its generation.
    ///
    /// The user turn is recorded right away. Rejected while another exchange
    /// is streaming.
    pub fn submit(&mut self, prompt: &str) -> Result<u64, ChatError> {
        if self.shutdown.is_cancelled() {
            return Err(ChatError::Cancelled);
        }
        if self.is_streaming() {
            tracing::debug!(session = %self.id, "Rejecting submit while streaming");
            return Err(ChatError::Busy);
        }
        if prompt.trim().is_empty() {
            return Err(ChatError::EmptyPrompt);
        }

        self.transcript.push(ChatMessage::user(prompt));
        self.pending.clear();
        self.last_error = None;
        self.generation += 1;
        self.status = SessionStatus::Streaming;
        self.notify(SessionUpdate::Submitted {
            generation: self.generation,
        });
        Ok(self.generation)
    }

    /// Apply one event of exchange `generation`.
    pub fn apply(&mut self, generation: u64, event: Event) -> Result<Step, ChatError> {
        if generation != self.generation || !self.is_streaming() {
            tracing::debug!(
                session = %self.id,
                generation,
                current = self.generation,
                "Ignoring event for inactive exchange"
            );
            return Ok(Step::Ignored);
        }

        match event {
            Event::Proposals(items) => {
                self.proposals = items;
                self.notify(SessionUpdate::Proposals(self.proposals.clone()));
                Ok(Step::Continue)
            }
            Event::Chunk(delta) => {
                self.pending.push_str(&delta);
                self.notify(SessionUpdate::Delta(delta));
                Ok(Step::Continue)
            }
            Event::Complete { elapsed_seconds } => {
                let content = finalize_answer(&self.pending);
                let message = ChatMessage::model(content, elapsed_seconds);
                self.transcript.push(message.clone());
                self.pending.clear();
                self.status = SessionStatus::Idle;
                tracing::info!(
                    session = %self.id,
                    generation,
                    elapsed = ?elapsed_seconds,
                    chars = message.content.chars().count(),
                    "Chat exchange complete"
                );
                self.notify(SessionUpdate::Finished(message.clone()));
                Ok(Step::Finished(message))
            }
            Event::Error(message) => Err(self.fail(generation, ChatError::Protocol(message))),
            Event::Unknown(kind) => {
                tracing::debug!(session = %self.id, kind = %kind, "Skipping unknown event");
                Ok(Step::Continue)
            }
        }
    }

    /// End exchange `generation` with `err` and hand the error back.
    ///
    /// Recoverable outcomes return the session to idle, anything else marks
    /// it erred. Either way nothing is added to the transcript.
    pub fn fail(&mut self, generation: u64, err: ChatError) -> ChatError {
        if generation != self.generation || !self.is_streaming() {
            return err;
        }
        self.pending.clear();
        self.status = if err.is_recoverable() {
            SessionStatus::Idle
        } else {
            SessionStatus::Erred
        };
        let message = err.user_message();
        tracing::warn!(session = %self.id, generation, error = %err, "Chat exchange aborted");
        self.last_error = Some(message.clone());
        self.notify(SessionUpdate::Failed(message));
        err
    }

    /// Run one full exchange over `transport`.
    pub async fn exchange<T>(
        &mut self,
        transport: &T,
        request: &ChatRequest,
    ) -> Result<ChatMessage, ChatError>
    where
        T: ChatTransport + ?Sized,
    {
        let cancel = self.shutdown.child_token();
        self.exchange_with_cancel(transport, request, cancel).await
    }

    /// Like [`exchange`](Self::exchange), also stopping when `cancel` fires.
    pub async fn exchange_with_cancel<T>(
        &mut self,
        transport: &T,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChatMessage, ChatError>
    where
        T: ChatTransport + ?Sized,
    {
        let generation = self.submit(&request.prompt)?;
        tracing::info!(
            session = %self.id,
            generation,
            model = %request.model,
            indexer = %request.indexer,
            k = request.k,
            "Starting chat exchange"
        );

        let shutdown = self.shutdown.clone();
        let opened = tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            _ = cancel.cancelled() => None,
            opened = transport.open_chat(request) => Some(opened),
        };
        let stream = match opened {
            None => return Err(self.fail(generation, ChatError::Cancelled)),
            Some(Err(e)) => return Err(self.fail(generation, e.into())),
            Some(Ok(stream)) => stream,
        };

        self.drive(generation, stream, cancel).await
    }

    /// Consume `stream` until the exchange completes, fails or is cancelled.
    /// The stream is dropped on return.
    pub async fn drive(
        &mut self,
        generation: u64,
        mut stream: ByteStream,
        cancel: CancellationToken,
    ) -> Result<ChatMessage, ChatError> {
        let shutdown = self.shutdown.clone();
        let idle = self.idle_timeout;
        let mut decoder = FrameDecoder::new();

        loop {
            let read = tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                _ = cancel.cancelled() => None,
                read = tokio::time::timeout(idle, stream.next()) => Some(read),
            };

            let chunk = match read {
                None => return Err(self.fail(generation, ChatError::Cancelled)),
                Some(Err(_)) => {
                    return Err(self.fail(generation, TransportError::IdleTimeout(idle).into()))
                }
                Some(Ok(None)) => return Err(self.end_of_stream(generation, &mut decoder)),
                Some(Ok(Some(Err(e)))) => return Err(self.fail(generation, e.into())),
                Some(Ok(Some(Ok(bytes)))) => bytes,
            };

            for frame in decoder.push(&chunk) {
                if frame.is_blank() {
                    continue;
                }
                let event = match parse_event(&frame) {
                    Ok(event) => event,
                    Err(e) => return Err(self.fail(generation, e.into())),
                };
                if let Step::Finished(message) = self.apply(generation, event)? {
                    return Ok(message);
                }
            }
        }
    }

    fn end_of_stream(&mut self, generation: u64, decoder: &mut FrameDecoder) -> ChatError {
        let unterminated = match decoder.flush() {
            Ok(()) => 0,
            Err(FrameError::Truncated { pending }) => pending,
        };
        let partial = if generation == self.generation {
            std::mem::take(&mut self.pending)
        } else {
            String::new()
        };
        self.fail(
            generation,
            ChatError::Interrupted {
                partial,
                unterminated,
            },
        )
    }

    fn notify(&self, update: SessionUpdate) {
        if let Some(tx) = &self.updates {
            // Receiver gone means nobody is rendering; not an error
            let _ = tx.send(update);
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
