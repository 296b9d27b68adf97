
use std::pin::Pin;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::select;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::Instrument;
use tutor_core::{
    ChatTurn, MemoryStorage, PendingRequest, Reconciler, Storage, StreamCursor,
    TranscriptStore, UiMode,
};
use tutor_protocol::TutorRequest;

use crate::endpoint::{EndpointError, ReplyStream, TutorEndpoint};

type SendResult = Result<ReplyStream, EndpointError>;
type BoxedSendFuture = Pin<Box<dyn Future<Output = SendResult> + Send>>;
type SendFn = Arc<dyn Fn(TutorRequest) -> BoxedSendFuture + Send + Sync>;

type TranscriptFn = Box<dyn Fn(&[ChatTurn]) + Send + Sync>;
type ModeFn = Box<dyn Fn(UiMode) + Send + Sync>;
type ErrorFn = Box<dyn Fn(&str) + Send + Sync>;
type IdleFn = Box<dyn Fn() + Send + Sync>;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    send_fn: SendFn,
    store: Option<TranscriptStore>,
    on_transcript: Option<TranscriptFn>,
    on_mode: Option<ModeFn>,
    on_error: Option<ErrorFn>,
    on_idle: Option<IdleFn>,
}

impl SessionBuilder {
    /// Creates a session builder talking to the specified endpoint.
    pub fn with_endpoint<E: TutorEndpoint>(endpoint: E) -> Self {
        // Erase `E`, so `Session` doesn't need a type parameter.
        let send_fn: SendFn = Arc::new(move |request| {
            Box::pin(endpoint.send(request)) as BoxedSendFuture
        });
        Self {
            send_fn,
            store: None,
            on_transcript: None,
            on_mode: None,
            on_error: None,
            on_idle: None,
        }
    }

    /// Persists the transcript to `storage`, resuming the conversation
    /// stored there. Without storage the transcript only lives in memory.
    #[inline]
    pub fn with_storage<S: Storage>(mut self, storage: S) -> Self {
        self.store = Some(TranscriptStore::load(storage));
        self
    }

    /// Attaches a callback to be invoked whenever the transcript changes.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(&[ChatTurn]) + Send + Sync + 'static,
    ) -> Self {
        self.on_transcript = Some(Box::new(on_transcript));
        self
    }

    /// Attaches a callback to be invoked when the UI mode changes.
    #[inline]
    pub fn on_mode(
        mut self,
        on_mode: impl Fn(UiMode) + Send + Sync + 'static,
    ) -> Self {
        self.on_mode = Some(Box::new(on_mode));
        self
    }

    /// Attaches a callback to be invoked with a displayable message when a
    /// reply fails or the transcript can't be saved.
    #[inline]
    pub fn on_error(
        mut self,
        on_error: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }

    /// Attaches a callback to be invoked when the session is ready for the
    /// next input.
    #[inline]
    pub fn on_idle(
        mut self,
        on_idle: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        self.on_idle = Some(Box::new(on_idle));
        self
    }

    /// Builds the session and starts its event loop.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn build(self) -> Session {
        let store = self
            .store
            .unwrap_or_else(|| TranscriptStore::load(MemoryStorage::new()));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (stream_tx, stream_rx) = mpsc::unbounded_channel();
        let state = SessionState {
            reconciler: Reconciler::new(store),
            send_fn: self.send_fn,
            stream_tx,
            running_task: None,
            on_transcript: self.on_transcript,
            on_mode: self.on_mode,
            on_error: self.on_error,
            on_idle: self.on_idle,
        };
        tokio::spawn(
            run_session(state, cmd_rx, stream_rx)
                .instrument(debug_span!("session")),
        );
        Session { cmd_tx }
    }
}

/// What the learner currently sees.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    /// The transcript.
    pub transcript: Vec<ChatTurn>,
    /// The UI mode.
    pub mode: UiMode,
    /// Whether a reply is in flight.
    pub streaming: bool,
    /// The error of the last failed reply.
    pub last_error: Option<String>,
}

/// A tutoring session, like a chat window with an input box.
///
/// All state lives in a background task, which applies commands and reply
/// events one at a time. Dropping the session stops the task.
pub struct Session {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl Session {
    /// Submits a learner answer.
    ///
    /// Blank answers, and answers submitted while a reply is in flight, are
    /// ignored.
    #[inline]
    pub fn submit(&self, text: &str) {
        self.send(Command::Submit(text.to_owned()));
    }

    /// Discards the conversation and starts over.
    #[inline]
    pub fn reset(&self) {
        self.send(Command::Reset);
    }

    /// Returns what the learner currently sees, or `None` if the session
    /// task is gone.
    pub async fn snapshot(&self) -> Option<Snapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx));
        rx.await.ok()
    }

    #[inline]
    fn send(&self, cmd: Command) {
        if self.cmd_tx.send(cmd).is_err() {
            warn!("session task has terminated");
        }
    }
}

enum Command {
    Submit(String),
    Reset,
    Snapshot(oneshot::Sender<Snapshot>),
}

/// Reply events, tagged with the cursor they were started with.
enum StreamEvent {
    Started(StreamCursor),
    Chunk(StreamCursor, String),
    Finished(StreamCursor, Result<(), String>),
}

struct SessionState {
    reconciler: Reconciler,
    send_fn: SendFn,
    stream_tx: mpsc::UnboundedSender<StreamEvent>,
    running_task: Option<JoinHandle<()>>,

    on_transcript: Option<TranscriptFn>,
    on_mode: Option<ModeFn>,
    on_error: Option<ErrorFn>,
    on_idle: Option<IdleFn>,
}

async fn run_session(
    mut state: SessionState,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    mut stream_rx: mpsc::UnboundedReceiver<StreamEvent>,
) {
    debug!("started");
    loop {
        select! {
            biased;

            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    break;
                };
                state.handle_command(cmd);
            }
            // `state` keeps a sender, so this never yields `None`.
            Some(event) = stream_rx.recv() => {
                state.handle_stream_event(event);
            }
        }
    }
    if let Some(task) = state.running_task.take() {
        task.abort();
    }
    debug!("will terminate");
}

impl SessionState {
    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Submit(text) => self.submit(&text),
            Command::Reset => self.reset(),
            Command::Snapshot(tx) => {
                tx.send(self.snapshot()).ok();
            }
        }
    }

    fn handle_stream_event(&mut self, event: StreamEvent) {
        let mode = self.reconciler.mode();
        match event {
            StreamEvent::Started(cursor) => {
                self.reconciler.response_started(cursor);
            }
            StreamEvent::Chunk(cursor, text) => {
                match self.reconciler.apply_chunk(cursor, &text) {
                    Ok(true) => self.notify_transcript(),
                    Ok(false) => {}
                    Err(err) => self.notify_error(&err.to_string()),
                }
            }
            StreamEvent::Finished(cursor, outcome) => {
                if self.reconciler.finish(cursor, outcome) {
                    self.running_task = None;
                    if let Some(message) = self.reconciler.last_error() {
                        let message = message.to_owned();
                        self.notify_error(&message);
                    }
                    self.notify_idle();
                }
            }
        }
        if self.reconciler.mode() != mode {
            self.notify_mode();
        }
    }

    fn submit(&mut self, text: &str) {
        let was_streaming = self.reconciler.is_streaming();
        match self.reconciler.submit(text) {
            Ok(Some(pending)) => {
                self.notify_transcript();
                self.spawn_reply(pending);
            }
            Ok(None) => {
                trace!("submission ignored");
                if !was_streaming {
                    self.notify_idle();
                }
            }
            Err(err) => {
                error!("failed to submit: {err}");
                self.notify_error(&err.to_string());
                self.notify_idle();
            }
        }
    }

    fn reset(&mut self) {
        if let Some(task) = self.running_task.take() {
            task.abort();
        }
        let mode = self.reconciler.mode();
        self.reconciler.reset();
        self.notify_transcript();
        if self.reconciler.mode() != mode {
            self.notify_mode();
        }
        self.notify_idle();
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            transcript: self.reconciler.transcript().to_vec(),
            mode: self.reconciler.mode(),
            streaming: self.reconciler.is_streaming(),
            last_error: self.reconciler.last_error().map(str::to_owned),
        }
    }

    fn spawn_reply(&mut self, pending: PendingRequest) {
        let PendingRequest { cursor, request } = pending;
        let fut = (self.send_fn)(request);
        let stream_tx = self.stream_tx.clone();
        let span = debug_span!("reply", generation = cursor.generation());
        let task =
            tokio::spawn(stream_reply(cursor, fut, stream_tx).instrument(span));
        self.running_task = Some(task);
    }

    fn notify_transcript(&self) {
        if let Some(on_transcript) = &self.on_transcript {
            on_transcript(self.reconciler.transcript());
        }
    }

    fn notify_mode(&self) {
        if let Some(on_mode) = &self.on_mode {
            on_mode(self.reconciler.mode());
        }
    }

    fn notify_error(&self, message: &str) {
        if let Some(on_error) = &self.on_error {
            on_error(message);
        }
    }

    fn notify_idle(&self) {
        if let Some(on_idle) = &self.on_idle {
            on_idle();
        }
    }
}

/// Accumulates the reply and reports it to the session loop.
async fn stream_reply(
    cursor: StreamCursor,
    fut: BoxedSendFuture,
    stream_tx: mpsc::UnboundedSender<StreamEvent>,
) {
    let mut reply = match fut.await {
        Ok(reply) => reply,
        Err(err) => {
            warn!("request failed: {err}");
            let outcome = Err(err.to_string());
            stream_tx.send(StreamEvent::Finished(cursor, outcome)).ok();
            return;
        }
    };
    stream_tx.send(StreamEvent::Started(cursor)).ok();

    let mut cumulative = String::new();
    let mut outcome = Ok(());
    while let Some(piece) = reply.next().await {
        match piece {
            Ok(text) => {
                cumulative.push_str(&text);
                let chunk = StreamEvent::Chunk(cursor, cumulative.clone());
                stream_tx.send(chunk).ok();
            }
            Err(err) => {
                outcome = Err(err.to_string());
                break;
            }
        }
    }
    trace!("reply ended after {} chars", cumulative.chars().count());
    stream_tx.send(StreamEvent::Finished(cursor, outcome)).ok();
}
