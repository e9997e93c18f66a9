//! Async driver for [`SyncEngine`].
//!
//! Owns the engine and a [`Transport`], keeps at most one fetch running and
//! wakes for engine timers. Hosts talk to it through a [`DriverHandle`] and
//! receive [`DriverEvent`]s on a channel.

use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use futures::FutureExt;
use mirror_core::{Composition, PromptRequest, Response};
use tokio::sync::mpsc;

use crate::engine::{Dispatch, EngineEvent, SyncEngine};
use crate::error::{SyncError, SyncResult, TransportError};
use crate::pointer::PointerEvent;
use crate::transport::Transport;

/// Capacity of the command and event channels.
pub const CHANNEL_CAPACITY: usize = 64;

/// Input for a running driver.
#[derive(Debug, Clone)]
pub enum Command {
    /// Pointer input in logical coordinates.
    Pointer(PointerEvent),
    /// Text entered for a prompt.
    SubmitPrompt {
        /// Prompt being answered.
        request: PromptRequest,
        /// Entered text.
        text: String,
    },
    /// Remove an inserted drawing and its descendants.
    RemoveDrawing(String),
    /// Refresh every drawing now.
    RefreshAll,
    /// Stop the driver.
    Shutdown,
}

/// Output of a running driver.
#[derive(Debug, Clone)]
pub enum DriverEvent {
    /// A new frame to paint.
    Frame(Composition),
    /// A text prompt to show.
    Prompt(PromptRequest),
    /// The main drawing failed.
    Fatal {
        /// Drawing that failed.
        drawing: String,
        /// User-visible message.
        message: String,
    },
}

/// Cloneable sender of [`Command`]s.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    commands: mpsc::Sender<Command>,
}

impl DriverHandle {
    /// Send a command.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Stopped`] once the driver has exited.
    pub async fn send(&self, command: Command) -> SyncResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SyncError::Stopped)
    }

    /// Forward pointer input.
    ///
    /// # Errors
    ///
    /// See [`DriverHandle::send`].
    pub async fn pointer(&self, event: PointerEvent) -> SyncResult<()> {
        self.send(Command::Pointer(event)).await
    }

    /// Answer a prompt.
    ///
    /// # Errors
    ///
    /// See [`DriverHandle::send`].
    pub async fn submit_prompt(&self, request: PromptRequest, text: impl Into<String>) -> SyncResult<()> {
        self.send(Command::SubmitPrompt {
            request,
            text: text.into(),
        })
        .await
    }

    /// Ask the driver to stop.
    ///
    /// # Errors
    ///
    /// See [`DriverHandle::send`].
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.send(Command::Shutdown).await
    }
}

type PendingFetch = (u64, BoxFuture<'static, Result<Response, TransportError>>);

/// Runs a [`SyncEngine`] against a [`Transport`].
pub struct Driver {
    engine: SyncEngine,
    transport: Arc<dyn Transport>,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<DriverEvent>,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl Driver {
    /// Wrap `engine`. Returns the driver, a handle for commands and the
    /// event receiver.
    #[must_use]
    pub fn new(
        engine: SyncEngine,
        transport: Arc<dyn Transport>,
    ) -> (Self, DriverHandle, mpsc::Receiver<DriverEvent>) {
        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let driver = Self {
            engine,
            transport,
            commands: command_rx,
            events: event_tx,
        };
        (driver, DriverHandle { commands: command_tx }, event_rx)
    }

    /// Engine being driven.
    #[must_use]
    pub const fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Run until shutdown or until the main drawing fails.
    ///
    /// Returns the engine on shutdown, or when every handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Fatal`] when the main drawing cannot be loaded.
    pub async fn run(mut self) -> SyncResult<SyncEngine> {
        let mut pending: Option<PendingFetch> = None;

        loop {
            let now = Instant::now();
            self.engine.tick(now);

            if pending
                .as_ref()
                .is_some_and(|(id, _)| !self.engine.is_in_flight(*id))
            {
                pending = None;
            }
            if pending.is_none() {
                if let Some(Dispatch { id, request }) = self.engine.next_request(now) {
                    let transport = Arc::clone(&self.transport);
                    let fetch = async move { transport.fetch(&request).await }.boxed();
                    pending = Some((id, fetch));
                }
            }

            self.forward_events().await?;

            let deadline = self.engine.next_deadline();
            tokio::select! {
                result = async {
                    match pending.as_mut() {
                        Some((_, fetch)) => fetch.await,
                        None => std::future::pending().await,
                    }
                } => {
                    if let Some((id, _)) = pending.take() {
                        self.engine.complete(id, result, Instant::now());
                    }
                }
                command = self.commands.recv() => {
                    match command {
                        Some(Command::Shutdown) | None => {
                            tracing::info!("Sync driver shutting down");
                            self.forward_events().await?;
                            return Ok(self.engine);
                        }
                        Some(command) => self.handle(command),
                    }
                }
                () = sleep_until(deadline) => {}
            }
        }
    }

    fn handle(&mut self, command: Command) {
        let now = Instant::now();
        match command {
            Command::Pointer(event) => self.engine.pointer(event, now),
            Command::SubmitPrompt { request, text } => {
                if let Err(e) = self.engine.submit_prompt(&request, &text) {
                    tracing::warn!("Prompt for {} dropped: {e}", request.cmd);
                }
            }
            Command::RemoveDrawing(name) => {
                self.engine.remove_drawing(&name);
            }
            Command::RefreshAll => self.engine.refresh_all(),
            Command::Shutdown => {}
        }
    }

    async fn forward_events(&mut self) -> SyncResult<()> {
        for event in self.engine.drain_events() {
            let event = match event {
                EngineEvent::Redraw => match self.engine.composition() {
                    Some(composition) => DriverEvent::Frame(composition),
                    None => continue,
                },
                EngineEvent::Prompt(request) => DriverEvent::Prompt(request),
                EngineEvent::Fatal { drawing, message } => {
                    // Ignore send errors (no receiver is okay)
                    let _ = self
                        .events
                        .send(DriverEvent::Fatal {
                            drawing: drawing.clone(),
                            message: message.clone(),
                        })
                        .await;
                    return Err(SyncError::Fatal { drawing, message });
                }
            };
            if self.events.send(event).await.is_err() {
                tracing::debug!("Event receiver dropped");
            }
        }
        Ok(())
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}
