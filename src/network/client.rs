use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_tungstenite::tungstenite::Message;

use crate::common::{SessionCommand, SessionEvent};
use crate::error::ChatError;
use crate::session::SessionConfig;

use super::dispatcher::InboundDispatcher;
use super::stomp::{Command, Frame, HEARTBEAT};
use super::transport::FrameStream;

pub const SEND_DESTINATION: &str = "/app/chat.send";
pub const TYPING_DESTINATION: &str = "/app/chat.typing";
pub const READ_DESTINATION: &str = "/app/chat.read";
pub const CALL_DESTINATION: &str = "/app/call/signal";

const RECEIPT_SWEEP: Duration = Duration::from_millis(100);
const IDLE_HEARTBEAT: Duration = Duration::from_secs(3600);

struct PendingSend {
    reply: oneshot::Sender<Result<(), ChatError>>,
    deadline: Instant,
}

/// Network side of a chat session: owns the socket and turns commands into
/// SEND frames and inbound frames into events.
pub struct ChatClient<S> {
    stream: S,
    event_sender: mpsc::Sender<SessionEvent>,
    command_receiver: mpsc::Receiver<SessionCommand>,
    dispatcher: InboundDispatcher,
    pending: HashMap<String, PendingSend>,
    /// Events the UI has not made room for yet, oldest first.
    backlog: VecDeque<SessionEvent>,
    heartbeat: Option<Duration>,
    ack_timeout: Duration,
}

impl<S: FrameStream> ChatClient<S> {
    pub fn new(
        stream: S,
        event_sender: mpsc::Sender<SessionEvent>,
        command_receiver: mpsc::Receiver<SessionCommand>,
        config: &SessionConfig,
    ) -> Self {
        Self {
            stream,
            event_sender,
            command_receiver,
            dispatcher: InboundDispatcher::new(),
            pending: HashMap::new(),
            backlog: VecDeque::new(),
            heartbeat: config.heartbeat,
            ack_timeout: config.ack_timeout,
        }
    }

    pub async fn run(mut self) -> Result<(), ChatError> {
        let mut heartbeat = interval(self.heartbeat.unwrap_or(IDLE_HEARTBEAT));
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sweep = interval(RECEIPT_SWEEP);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let events = self.event_sender.clone();

        log::info!("Session event loop started");

        let outcome = loop {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(SessionCommand::Close) | None => {
                            self.disconnect().await;
                            break Ok(());
                        }
                        Some(command) => {
                            if let Err(err) = self.handle_command(command).await {
                                break Err(err);
                            }
                        }
                    }
                }
                inbound = self.stream.next() => {
                    match inbound {
                        Some(Ok(message)) => {
                            if !self.handle_inbound(message) {
                                break Ok(());
                            }
                        }
                        Some(Err(err)) => {
                            log::warn!("WebSocket error: {err}");
                            break Err(err.into());
                        }
                        None => {
                            log::info!("Broker closed the connection");
                            break Ok(());
                        }
                    }
                }
                _ = heartbeat.tick(), if self.heartbeat.is_some() => {
                    if let Err(err) = self.stream.send(Message::Text(HEARTBEAT.to_string().into())).await {
                        log::warn!("Heart-beat failed: {err}");
                        break Err(err.into());
                    }
                }
                _ = sweep.tick(), if !self.pending.is_empty() => {
                    self.expire_pending(Instant::now());
                }
                permit = events.reserve(), if !self.backlog.is_empty() => {
                    match permit {
                        Ok(permit) => {
                            if let Some(event) = self.backlog.pop_front() {
                                permit.send(event);
                            }
                        }
                        Err(_) => {
                            log::debug!("UI gone; dropping {} queued events", self.backlog.len());
                            self.backlog.clear();
                        }
                    }
                }
            }
        };

        self.fail_pending();
        self.backlog.push_back(SessionEvent::Disconnected);
        while let Some(event) = self.backlog.pop_front() {
            if self.event_sender.send(event).await.is_err() {
                log::debug!("UI gone before disconnect notice");
                break;
            }
        }
        outcome
    }

    /// Errors returned here mean the socket is unusable.
    async fn handle_command(&mut self, command: SessionCommand) -> Result<(), ChatError> {
        match command {
            SessionCommand::SendText {
                receiver,
                content,
                client_ref,
                reply,
            } => {
                let body = json!({
                    "receiver": receiver,
                    "content": content,
                    "clientRef": client_ref,
                });
                let frame = send_frame(SEND_DESTINATION, body.to_string())
                    .header("receipt", client_ref.as_str());
                if let Err(err) = self.write(frame).await {
                    let _ = reply.send(Err(ChatError::ConnectionClosed));
                    return Err(err);
                }
                self.pending.insert(
                    client_ref.to_string(),
                    PendingSend {
                        reply,
                        deadline: Instant::now() + self.ack_timeout,
                    },
                );
            }
            SessionCommand::Typing { receiver, group_id } => {
                let body = json!({ "receiver": receiver, "groupId": group_id });
                self.write(send_frame(TYPING_DESTINATION, body.to_string()))
                    .await?;
            }
            SessionCommand::Read {
                receiver,
                message_id,
                group_id,
            } => {
                let body = json!({
                    "receiver": receiver,
                    "messageId": message_id,
                    "groupId": group_id,
                });
                self.write(send_frame(READ_DESTINATION, body.to_string()))
                    .await?;
            }
            SessionCommand::CallSignal(signal) => match serde_json::to_string(&signal) {
                Ok(body) => self.write(send_frame(CALL_DESTINATION, body)).await?,
                Err(err) => log::warn!("Failed to serialize call signal: {err}"),
            },
            SessionCommand::Close => {}
        }
        Ok(())
    }

    /// Returns `false` once the broker has closed the socket.
    fn handle_inbound(&mut self, message: Message) -> bool {
        let text = match &message {
            Message::Text(text) => text.as_str(),
            Message::Binary(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => text,
                Err(err) => {
                    log::error!("Dropping non UTF-8 binary frame: {err}");
                    return true;
                }
            },
            Message::Close(reason) => {
                log::info!("Broker sent close: {reason:?}");
                return false;
            }
            _ => return true,
        };

        match Frame::decode_all(text) {
            Ok(frames) => {
                for frame in frames {
                    self.handle_frame(frame);
                }
            }
            Err(err) => log::error!("Dropping undecodable frame: {err}"),
        }
        true
    }

    fn handle_frame(&mut self, frame: Frame) {
        match frame.command {
            Command::Message => {
                if let Some(event) = self.dispatcher.dispatch(&frame) {
                    self.emit(event);
                }
            }
            Command::Receipt => {
                let Some(receipt_id) = frame.get("receipt-id") else {
                    return;
                };
                match self.pending.remove(receipt_id) {
                    Some(pending) => {
                        log::debug!("Message {receipt_id} acknowledged");
                        let _ = pending.reply.send(Ok(()));
                    }
                    None => log::debug!("Receipt {receipt_id} for no pending send"),
                }
            }
            Command::Error => {
                let reason = frame
                    .get("message")
                    .map(str::to_string)
                    .unwrap_or_else(|| frame.body.clone());
                let pending = frame
                    .get("receipt-id")
                    .and_then(|id| self.pending.remove_entry(id));
                match pending {
                    Some((client_ref, pending)) => {
                        log::warn!("Broker rejected message {client_ref}: {reason}");
                        let _ = pending
                            .reply
                            .send(Err(ChatError::SendRejected { client_ref, reason }));
                    }
                    None => {
                        log::error!("Broker error: {reason}");
                        self.emit(SessionEvent::BrokerError(reason));
                    }
                }
            }
            other => log::debug!("Ignoring {other} frame"),
        }
    }

    fn expire_pending(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();

        for id in expired {
            if let Some(pending) = self.pending.remove(&id) {
                log::warn!("No receipt for message {id} within {:?}", self.ack_timeout);
                let _ = pending.reply.send(Err(ChatError::AckTimeout(id)));
            }
        }
    }

    fn fail_pending(&mut self) {
        for (id, pending) in self.pending.drain() {
            log::debug!("Abandoning message {id}: connection closed");
            let _ = pending.reply.send(Err(ChatError::ConnectionClosed));
        }
    }

    async fn disconnect(&mut self) {
        if let Err(err) = self.write(Frame::new(Command::Disconnect)).await {
            log::debug!("DISCONNECT not delivered: {err}");
        }
        if let Err(err) = self.stream.close().await {
            log::debug!("Socket close failed: {err}");
        }
        log::info!("Session closed");
    }

    async fn write(&mut self, frame: Frame) -> Result<(), ChatError> {
        self.stream
            .send(Message::Text(frame.encode().into()))
            .await
            .map_err(ChatError::from)
    }

    /// Never waits on the UI: a full buffer parks the event in the backlog
    /// so receipts and timeouts keep flowing.
    fn emit(&mut self, event: SessionEvent) {
        if !self.backlog.is_empty() {
            self.backlog.push_back(event);
            return;
        }
        match self.event_sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                log::debug!("UI is behind; queueing session events");
                self.backlog.push_back(event);
            }
            Err(TrySendError::Closed(_)) => log::debug!("UI gone; dropping session event"),
        }
    }
}

fn send_frame(destination: &str, body: String) -> Frame {
    Frame::new(Command::Send)
        .header("destination", destination)
        .header("content-type", "application/json")
        .with_body(body)
}

#[cfg(test)]
mod tests {
    use tokio::task::JoinHandle;

    use super::*;
    use crate::network::transport::WsStream;

    fn spawn_on_runtime<S: FrameStream>(client: ChatClient<S>) -> JoinHandle<Result<(), ChatError>> {
        tokio::spawn(client.run())
    }

    #[test]
    fn run_loop_is_spawnable_for_any_stream() {
        let _spawn: fn(ChatClient<WsStream>) -> JoinHandle<Result<(), ChatError>> = spawn_on_runtime;
    }
}
