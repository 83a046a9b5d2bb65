use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;

use crate::api::{ImageUpload, RestClient};
use crate::common::{ClientRef, SessionEvent};
use crate::error::Result;
use crate::session::ChatSession;

use super::components::{chat_area, input_bar};
use super::components::input_bar::InputAction;
use super::notifications::NotificationFeed;
use super::state::{ConversationTarget, ConversationView};
use super::typing::TypingThrottle;

/// Terminal front end for one direct conversation.
pub struct ChatApp {
    peer: String,
    session: ChatSession,
    rest: RestClient,
    view: ConversationView,
    throttle: TypingThrottle,
    notifications: NotificationFeed,
}

impl ChatApp {
    pub fn new(session: ChatSession, rest: RestClient, me: &str, peer: &str) -> Self {
        Self {
            peer: peer.to_string(),
            session,
            rest,
            view: ConversationView::new(me, ConversationTarget::Direct(peer.to_string())),
            throttle: TypingThrottle::new(),
            notifications: NotificationFeed::new(),
        }
    }

    pub fn view(&self) -> &ConversationView {
        &self.view
    }

    pub fn notifications(&self) -> &NotificationFeed {
        &self.notifications
    }

    /// Loads history and notifications, then acknowledges what was read.
    pub async fn load(&mut self) -> Result<()> {
        let history = self.rest.conversation(&self.peer).await?;
        self.view.replace_history(history);

        match self.rest.notifications().await {
            Ok(items) => self.notifications.replace_all(items),
            Err(err) => log::warn!("Could not load notifications: {err}"),
        }

        self.send_read_receipt().await
    }

    /// Returns false once the session is gone.
    pub async fn handle_session_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::MessageReceived(message) => {
                let from_peer = message.sender != self.view.me();
                if self.view.push_inbound(message) {
                    if let Some(entry) = self.view.entries().last() {
                        println!("{}", chat_area::render_entry(entry, self.view.me()));
                    }
                    if from_peer {
                        if let Err(err) = self.send_read_receipt().await {
                            log::warn!("Failed to send read receipt: {err}");
                        }
                    }
                }
            }
            SessionEvent::Typing(payload) => {
                let now = Instant::now();
                let was_typing = self.view.typing_user(now).is_some();
                self.view.on_typing(&payload, now);
                if !was_typing {
                    if let Some(user) = self.view.typing_user(now) {
                        println!("{user} is typing...");
                    }
                }
            }
            SessionEvent::Read(payload) => {
                let marked = self.view.apply_read(&payload);
                if marked > 0 {
                    log::debug!("{marked} messages marked read by {}", self.peer);
                }
            }
            SessionEvent::Notification(notification) => {
                println!("* {}", notification.message);
                self.notifications.push(notification);
            }
            SessionEvent::CallSignal(signal) => {
                log::info!(
                    "Ignoring {:?} call signal from {}",
                    signal.kind,
                    signal.sender_username.as_deref().unwrap_or("unknown")
                );
            }
            SessionEvent::BrokerError(message) => {
                log::warn!("Broker error: {message}");
                eprintln!("! {message}");
            }
            SessionEvent::Disconnected => {
                log::warn!("Chat session disconnected");
                return false;
            }
        }
        true
    }

    /// Sends a text message optimistically and settles its entry with the
    /// broker's verdict.
    pub async fn submit(&mut self, content: &str) -> Result<()> {
        let (client_ref, _) = self.stage_text(content);
        self.deliver_text(&client_ref, content).await
    }

    /// Appends the pending entry and returns its correlation id with the
    /// line to show before the network answers.
    pub fn stage_text(&mut self, content: &str) -> (ClientRef, String) {
        let client_ref = self.view.begin_send(content);
        let line = self.rendered(&client_ref).unwrap_or_default();
        (client_ref, line)
    }

    pub async fn deliver_text(&mut self, client_ref: &ClientRef, content: &str) -> Result<()> {
        match self
            .session
            .send_text(&self.peer, content, client_ref.clone())
            .await
        {
            Ok(()) => {
                self.view.mark_sent(client_ref);
                Ok(())
            }
            Err(err) => {
                log::warn!("Message {client_ref} was not delivered: {err}");
                self.view.mark_failed(client_ref, err.to_string());
                Err(err)
            }
        }
    }

    /// Current rendering of the entry carrying `client_ref`.
    pub fn rendered(&self, client_ref: &ClientRef) -> Option<String> {
        self.view
            .entries()
            .iter()
            .find(|e| e.client_ref.as_ref() == Some(client_ref))
            .map(|entry| chat_area::render_entry(entry, self.view.me()))
    }

    /// Image messages skip the optimistic path: upload, then reload history.
    pub async fn submit_image(&mut self, path: &Path, caption: Option<&str>) -> Result<()> {
        let upload = ImageUpload::from_path(path).await?;
        self.rest
            .send_message_with_image(&self.peer, caption, upload)
            .await?;
        let history = self.rest.conversation(&self.peer).await?;
        self.view.replace_history(history);
        Ok(())
    }

    pub async fn note_typing(&mut self) -> Result<()> {
        if self.throttle.should_send(Instant::now()) {
            self.session.send_typing(Some(&self.peer), None).await?;
        }
        Ok(())
    }

    async fn send_read_receipt(&mut self) -> Result<()> {
        if let Some(receipt) = self.view.take_read_receipt() {
            self.session
                .send_read(&receipt.receiver, receipt.message_id, receipt.group_id)
                .await?;
        }
        Ok(())
    }

    /// Reads stdin and socket events until `/quit`, EOF or disconnect.
    pub async fn run(mut self) -> Result<()> {
        println!("{}", chat_area::render(&self.view, Instant::now()));

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    match input_bar::parse(&line) {
                        InputAction::Quit => break,
                        InputAction::Empty => {}
                        InputAction::Invalid(usage) => eprintln!("{usage}"),
                        InputAction::Text(content) => {
                            if let Err(err) = self.note_typing().await {
                                log::warn!("Typing signal failed: {err}");
                            }
                            let (client_ref, pending) = self.stage_text(&content);
                            println!("{pending}");
                            let outcome = self.deliver_text(&client_ref, &content).await;
                            if let Some(line) = self.rendered(&client_ref) {
                                println!("{line}");
                            }
                            if let Err(err) = outcome {
                                eprintln!("Message not delivered: {err}");
                            }
                        }
                        InputAction::Image { path, caption } => {
                            match self.submit_image(&path, caption.as_deref()).await {
                                Ok(()) => println!("{}", chat_area::render(&self.view, Instant::now())),
                                Err(err) => eprintln!("Failed to send image: {err}"),
                            }
                        }
                    }
                }
                event = self.session.next_event() => {
                    let Some(event) = event else { break };
                    if !self.handle_session_event(event).await {
                        break;
                    }
                }
            }
        }

        self.session.close().await
    }
}
