use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_util::sync::CancellationToken;

use super::error::{ApiError, EventHandlerError, Result};

const SUBPROTOCOL: &str = "graphql-transport-ws";
const SUBSCRIPTION_ID: &str = "1";

/// Run one GraphQL subscription over a WebSocket in sync mode.
///
/// The handler sees each `next` payload's `data` in the order the server
/// sent it; a handler error stops the subscription before the next frame
/// is observed. Cancelling the ambient token closes the socket and
/// returns `ApiError::Cancelled`. The server signals the natural end of
/// the stream with `complete`.
pub async fn subscribe<F>(
    ws_url: &str,
    bearer: Option<&str>,
    query: &str,
    variables: Value,
    cancel: &CancellationToken,
    mut handler: F,
) -> Result<()>
where
    F: FnMut(&Value) -> std::result::Result<(), EventHandlerError>,
{
    let mut request = ws_url.into_client_request()?;
    request
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", SUBPROTOCOL.parse().expect("static header value"));
    if let Some(token) = bearer {
        let value = format!("Bearer {}", token)
            .parse()
            .map_err(|_| ApiError::Shape("bearer token is not a valid header value".to_string()))?;
        request.headers_mut().insert("Authorization", value);
    }

    let (ws, _) = connect_async(request).await?;
    let (mut tx, mut rx) = ws.split();

    let init = json!({
        "type": "connection_init",
        "payload": bearer
            .map(|token| json!({ "Authorization": format!("Bearer {}", token) }))
            .unwrap_or_else(|| json!({})),
    });
    tx.send(Message::Text(init.to_string().into())).await?;

    wait_for_ack(&mut rx, cancel).await?;

    let subscribe_frame = json!({
        "type": "subscribe",
        "id": SUBSCRIPTION_ID,
        "payload": { "query": query, "variables": variables },
    });
    tx.send(Message::Text(subscribe_frame.to_string().into()))
        .await?;

    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = tx.send(Message::Close(None)).await;
                return Err(ApiError::Cancelled);
            }
            message = rx.next() => message,
        };

        let frame = match message {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<Value>(&text) {
                Ok(frame) => frame,
                Err(err) => return Err(ApiError::Decode(err)),
            },
            Some(Ok(Message::Ping(payload))) => {
                tx.send(Message::Pong(payload)).await?;
                continue;
            }
            Some(Ok(Message::Close(_))) | None => return Ok(()),
            Some(Ok(_)) => continue,
            Some(Err(err)) => return Err(err.into()),
        };

        match frame.get("type").and_then(Value::as_str) {
            Some("next") => {
                let data = frame
                    .pointer("/payload/data")
                    .cloned()
                    .unwrap_or(Value::Null);
                if let Err(err) = handler(&data) {
                    let _ = tx
                        .send(Message::Text(
                            json!({ "type": "complete", "id": SUBSCRIPTION_ID })
                                .to_string()
                                .into(),
                        ))
                        .await;
                    let _ = tx.send(Message::Close(None)).await;
                    return Err(ApiError::EventHandler(err));
                }
            }
            Some("error") => {
                let message = frame
                    .pointer("/payload/0/message")
                    .and_then(Value::as_str)
                    .unwrap_or("subscription error");
                return Err(ApiError::from_server_message(message));
            }
            Some("complete") => {
                let _ = tx.send(Message::Close(None)).await;
                return Ok(());
            }
            Some("ping") => {
                tx.send(Message::Text(json!({ "type": "pong" }).to_string().into()))
                    .await?;
            }
            // connection_ack duplicates, pong, keep-alive: ignore.
            _ => {}
        }
    }
}

async fn wait_for_ack<S>(rx: &mut S, cancel: &CancellationToken) -> Result<()>
where
    S: StreamExt<
            Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>,
        > + Unpin,
{
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => return Err(ApiError::Cancelled),
            message = rx.next() => message,
        };

        match message {
            Some(Ok(Message::Text(text))) => {
                let frame: Value = serde_json::from_str(&text)?;
                match frame.get("type").and_then(Value::as_str) {
                    Some("connection_ack") => return Ok(()),
                    Some("connection_error") => {
                        return Err(ApiError::Server(format!(
                            "subscription handshake rejected: {}",
                            frame.get("payload").cloned().unwrap_or(Value::Null)
                        )));
                    }
                    _ => continue,
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(ApiError::Server(
                    "connection closed during subscription handshake".to_string(),
                ));
            }
            Some(Ok(_)) => continue,
            Some(Err(err)) => return Err(err.into()),
        }
    }
}
