use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::common::{CallSignal, ClientRef, SessionCommand, SessionEvent};
use crate::error::{ChatError, Result};
use crate::network::ChatClient;
use crate::network::transport::{self, FrameStream};

const COMMAND_BUFFER: usize = 100;
const EVENT_BUFFER: usize = 100;

/// Connection parameters for one chat session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ws_url: String,
    pub token: String,
    /// Client heart-beat interval; `None` disables heart-beats.
    pub heartbeat: Option<Duration>,
    /// How long a text send may wait for its receipt.
    pub ack_timeout: Duration,
    pub connect_timeout: Duration,
}

impl SessionConfig {
    pub fn new(ws_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            token: token.into(),
            heartbeat: Some(Duration::from_secs(10)),
            ack_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn host(&self) -> String {
        reqwest::Url::parse(&self.ws_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| "localhost".to_string())
    }
}

/// One authenticated connection to the broker, owned by whoever opened it.
///
/// Dropping the handle tears the connection down; `close` does the same and
/// waits for the network task to finish.
pub struct ChatSession {
    command_sender: mpsc::Sender<SessionCommand>,
    event_receiver: mpsc::Receiver<SessionEvent>,
    task: JoinHandle<Result<()>>,
}

impl ChatSession {
    pub async fn open(config: SessionConfig) -> Result<Self> {
        let stream = match transport::connect(&config).await {
            Ok(stream) => stream,
            Err(err) => {
                log::error!("Chat connection to {} failed: {err}", config.ws_url);
                return Err(err);
            }
        };
        Self::attach(stream, config).await
    }

    /// Runs the STOMP handshake on an already-open socket and starts the
    /// network task.
    pub async fn attach<S: FrameStream>(mut stream: S, mut config: SessionConfig) -> Result<Self> {
        let connected = transport::handshake(&mut stream, &config).await?;
        config.heartbeat = transport::negotiate_heartbeat(config.heartbeat, &connected);
        log::info!(
            "STOMP session established (version {}, heart-beat {:?})",
            connected.get("version").unwrap_or("unknown"),
            config.heartbeat
        );

        let (command_sender, command_receiver) = mpsc::channel(COMMAND_BUFFER);
        let (event_sender, event_receiver) = mpsc::channel(EVENT_BUFFER);

        let client = ChatClient::new(stream, event_sender, command_receiver, &config);
        let task = tokio::spawn(async move {
            let outcome = client.run().await;
            if let Err(err) = &outcome {
                log::error!("Chat session terminated: {err}");
            }
            outcome
        });

        Ok(Self {
            command_sender,
            event_receiver,
            task,
        })
    }

    /// Sends a text message and waits for the broker's receipt.
    pub async fn send_text(&self, receiver: &str, content: &str, client_ref: ClientRef) -> Result<()> {
        let (reply, outcome) = oneshot::channel();
        self.command(SessionCommand::SendText {
            receiver: receiver.to_string(),
            content: content.to_string(),
            client_ref,
            reply,
        })
        .await?;
        outcome.await.map_err(|_| ChatError::ConnectionClosed)?
    }

    pub async fn send_typing(&self, receiver: Option<&str>, group_id: Option<i64>) -> Result<()> {
        self.command(SessionCommand::Typing {
            receiver: receiver.map(str::to_string),
            group_id,
        })
        .await
    }

    pub async fn send_read(
        &self,
        receiver: &str,
        message_id: Option<i64>,
        group_id: Option<i64>,
    ) -> Result<()> {
        self.command(SessionCommand::Read {
            receiver: receiver.to_string(),
            message_id,
            group_id,
        })
        .await
    }

    pub async fn send_call_signal(&self, signal: CallSignal) -> Result<()> {
        self.command(SessionCommand::CallSignal(signal)).await
    }

    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.event_receiver.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        self.event_receiver.try_recv().ok()
    }

    pub async fn close(self) -> Result<()> {
        let Self {
            command_sender,
            event_receiver,
            task,
        } = self;
        // Unblock a network task that is waiting on a full event buffer.
        drop(event_receiver);
        if command_sender.send(SessionCommand::Close).await.is_err() {
            log::debug!("Network task already stopped");
        }
        match task.await {
            Ok(outcome) => outcome,
            Err(err) => {
                log::error!("Network task panicked: {err}");
                Err(ChatError::ConnectionClosed)
            }
        }
    }

    async fn command(&self, command: SessionCommand) -> Result<()> {
        self.command_sender
            .send(command)
            .await
            .map_err(|_| ChatError::ConnectionClosed)
    }
}
