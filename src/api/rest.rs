use std::path::Path;

use reqwest::header::{CACHE_CONTROL, EXPIRES, IF_MODIFIED_SINCE, PRAGMA};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::common::{ChatMessage, ClientRef, Comment, ConversationSummary, Listing, Notification};
use crate::error::{ChatError, Result};

/// Image attached to a chat message.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("image")
            .to_string();
        let mime = guess_mime(&file_name).to_string();
        Ok(Self {
            file_name,
            mime,
            bytes,
        })
    }
}

fn guess_mime(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

/// Thin wrapper over the backend's REST API. Every request carries the
/// bearer token and cache-busting headers.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token,
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let request = self
            .request(Method::POST, &["auth", "login"])?
            .json(&json!({ "username": username, "password": password }));
        let response: LoginResponse = fetch_json(request).await?;
        Ok(response.token)
    }

    /// Conversation history with `username`, oldest first.
    pub async fn conversation(&self, username: &str) -> Result<Vec<ChatMessage>> {
        let request = self.request(Method::GET, &["chat", "conversation", username])?;
        let listing: Listing<ChatMessage> = fetch_json(request).await?;
        Ok(listing.into_chronological())
    }

    pub async fn inbox(&self) -> Result<Vec<ConversationSummary>> {
        fetch_json(self.request(Method::GET, &["chat", "inbox"])?).await
    }

    /// REST fallback for text messages.
    pub async fn send_message(&self, username: &str, content: &str) -> Result<()> {
        let request = self
            .request(Method::POST, &["chat", "send", username])?
            .json(&json!({ "content": content }));
        fetch_empty(request).await
    }

    pub async fn send_message_with_image(
        &self,
        username: &str,
        content: Option<&str>,
        image: ImageUpload,
    ) -> Result<()> {
        let mut form = Form::new();
        if let Some(content) = content.filter(|c| !c.is_empty()) {
            form = form.text("content", content.to_string());
        }
        let part = Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(&image.mime)?;
        form = form.part("image", part);

        let request = self
            .request(Method::POST, &["chat", "send", username, "image"])?
            .multipart(form);
        fetch_empty(request).await
    }

    pub async fn comments(&self, post_id: i64) -> Result<Vec<Comment>> {
        let post_id = post_id.to_string();
        let request = self.request(Method::GET, &["posts", &post_id, "comments"])?;
        let listing: Listing<Comment> = fetch_json(request).await?;
        Ok(listing.into_items())
    }

    pub async fn add_comment(&self, post_id: i64, content: &str, client_ref: &ClientRef) -> Result<Comment> {
        let post_id = post_id.to_string();
        let request = self
            .request(Method::POST, &["posts", &post_id, "comments"])?
            .json(&json!({ "content": content, "clientRef": client_ref }));
        fetch_json(request).await
    }

    pub async fn notifications(&self) -> Result<Vec<Notification>> {
        let listing: Listing<Notification> =
            fetch_json(self.request(Method::GET, &["notifications"])?).await?;
        Ok(listing.into_items())
    }

    pub async fn mark_all_notifications_read(&self) -> Result<()> {
        fetch_empty(self.request(Method::POST, &["notifications", "mark-all-read"])?).await
    }

    pub(crate) fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.url(segments)?;
        let mut builder = self
            .http
            .request(method, url)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .header(EXPIRES, "0")
            .header(IF_MODIFIED_SINCE, "0");
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url =
            Url::parse(&self.base_url).map_err(|err| ChatError::InvalidUrl(format!("{}: {err}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| ChatError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn checked(request: RequestBuilder) -> Result<reqwest::Response> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    log::warn!("Request failed with {status}: {body}");
    Err(ChatError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    Ok(checked(request).await?.json::<T>().await?)
}

async fn fetch_empty(request: RequestBuilder) -> Result<()> {
    checked(request).await.map(|_| ())
}
