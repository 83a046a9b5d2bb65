use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::{ChatError, Result};
use crate::session::SessionConfig;

use super::dispatcher::Channel;
use super::stomp::{Command, Frame};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Anything that moves WebSocket messages both ways: a live socket in
/// production, an accepted server-side socket in tests.
pub trait FrameStream:
    Stream<Item = std::result::Result<Message, tungstenite::Error>>
    + Sink<Message, Error = tungstenite::Error>
    + Unpin
    + Send
    + 'static
{
}

impl<T> FrameStream for T where
    T: Stream<Item = std::result::Result<Message, tungstenite::Error>>
        + Sink<Message, Error = tungstenite::Error>
        + Unpin
        + Send
        + 'static
{
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Opens the WebSocket, presenting the bearer token on the upgrade request.
pub async fn connect(config: &SessionConfig) -> Result<WsStream> {
    let mut request = config.ws_url.as_str().into_client_request()?;
    let header = HeaderValue::from_str(&bearer(&config.token)).map_err(|_| ChatError::InvalidToken)?;
    request.headers_mut().insert(AUTHORIZATION, header);

    let (stream, response) = timeout(config.connect_timeout, connect_async(request))
        .await
        .map_err(|_| ChatError::Timeout("websocket upgrade"))??;
    log::info!(
        "WebSocket connected to {} (HTTP {})",
        config.ws_url,
        response.status()
    );
    Ok(stream)
}

/// Sends CONNECT, waits for CONNECTED and subscribes every private channel.
pub async fn handshake<S: FrameStream>(stream: &mut S, config: &SessionConfig) -> Result<Frame> {
    let heartbeat_ms = config.heartbeat.map(|d| d.as_millis()).unwrap_or(0);
    let connect = Frame::new(Command::Connect)
        .header("accept-version", "1.2,1.1")
        .header("host", config.host())
        .header("heart-beat", format!("{heartbeat_ms},0"))
        .header("Authorization", bearer(&config.token));
    stream.send(Message::Text(connect.encode().into())).await?;

    let connected = timeout(config.connect_timeout, await_connected(stream))
        .await
        .map_err(|_| ChatError::Timeout("CONNECTED frame"))??;

    for channel in Channel::ALL {
        stream
            .send(Message::Text(channel.subscribe_frame().encode().into()))
            .await?;
        log::debug!("Subscribed to {}", channel.destination());
    }

    Ok(connected)
}

/// Client-to-server heart-beat interval agreed with the broker: the larger
/// of what we offer and what CONNECTED asks for, or none if either side
/// declines. A missing header counts as `0,0`.
pub fn negotiate_heartbeat(offered: Option<Duration>, connected: &Frame) -> Option<Duration> {
    let offered = offered.filter(|d| !d.is_zero())?;
    let wanted_ms = connected
        .get("heart-beat")
        .and_then(|value| value.split_once(','))
        .and_then(|(_, wanted)| wanted.trim().parse::<u64>().ok())
        .unwrap_or(0);
    if wanted_ms == 0 {
        return None;
    }
    Some(offered.max(Duration::from_millis(wanted_ms)))
}

async fn await_connected<S: FrameStream>(stream: &mut S) -> Result<Frame> {
    while let Some(message) = stream.next().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Close(_) => return Err(ChatError::ConnectionClosed),
            _ => continue,
        };
        for frame in Frame::decode_all(text.as_str())? {
            match frame.command {
                Command::Connected => return Ok(frame),
                Command::Error => {
                    let reason = frame
                        .get("message")
                        .map(str::to_string)
                        .unwrap_or_else(|| frame.body.clone());
                    return Err(ChatError::ConnectRefused(reason));
                }
                other => log::debug!("Ignoring {other} frame before CONNECTED"),
            }
        }
    }
    Err(ChatError::ConnectionClosed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected(heart_beat: Option<&str>) -> Frame {
        let frame = Frame::new(Command::Connected).header("version", "1.2");
        match heart_beat {
            Some(value) => frame.header("heart-beat", value),
            None => frame,
        }
    }

    #[test]
    fn heartbeat_takes_the_larger_interval() {
        let offered = Some(Duration::from_secs(10));
        assert_eq!(
            negotiate_heartbeat(offered, &connected(Some("0,25000"))),
            Some(Duration::from_secs(25))
        );
        assert_eq!(
            negotiate_heartbeat(offered, &connected(Some("10000,4000"))),
            Some(Duration::from_secs(10))
        );
    }

    #[test]
    fn heartbeat_is_off_when_either_side_declines() {
        assert_eq!(negotiate_heartbeat(None, &connected(Some("0,5000"))), None);
        assert_eq!(
            negotiate_heartbeat(Some(Duration::from_secs(10)), &connected(Some("10000,0"))),
            None
        );
        assert_eq!(negotiate_heartbeat(Some(Duration::from_secs(10)), &connected(None)), None);
        assert_eq!(
            negotiate_heartbeat(Some(Duration::from_secs(10)), &connected(Some("garbage"))),
            None
        );
    }
}
