use tokio::time::Instant;

use crate::ui::state::{ConversationView, Delivery, ViewEntry};

pub fn render_entry(entry: &ViewEntry, me: &str) -> String {
    let message = &entry.message;
    let time = message.created_at.format("%H:%M");
    let mut line = format!("[{time}] {}: {}", message.sender, message.content_str());
    if let Some(url) = &message.image_url {
        line.push_str(&format!(" <image {url}>"));
    }

    if message.sender == me {
        let status = match &entry.delivery {
            Delivery::Pending => "…".to_string(),
            Delivery::Failed(reason) => format!("failed: {reason}"),
            Delivery::Sent if message.is_read => "read".to_string(),
            Delivery::Sent => "sent".to_string(),
        };
        line.push_str(&format!(" ({status})"));
    }
    line
}

pub fn render(view: &ConversationView, now: Instant) -> String {
    let mut lines: Vec<String> = view
        .entries()
        .iter()
        .map(|entry| render_entry(entry, view.me()))
        .collect();
    if let Some(user) = view.typing_user(now) {
        lines.push(format!("{user} is typing..."));
    }
    lines.join("\n")
}
