//! `PushReceiver` (§4.13): a persistent WebSocket client to the server's
//! push channel. Reconnects on a fixed 5 second delay (no backoff) per
//! spec, sends an app-level keepalive every 30 s, and surfaces ALERT
//! notifications as OS notifications.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
const READ_DEADLINE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PushNotification {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub level: String,
}

/// Runs the receive loop forever, reconnecting on any failure. `on_notify`
/// is invoked for every notification delivered over the channel; OS
/// notification dispatch for ALERT-level messages happens here regardless
/// of what the callback does.
pub async fn run(
    ws_url: &str,
    client_id: &str,
    api_key: Option<&str>,
    mut on_notify: impl FnMut(PushNotification) + Send,
) -> ! {
    loop {
        match connect_and_receive(ws_url, client_id, api_key, &mut on_notify).await {
            Ok(()) => info!("push channel closed cleanly, reconnecting"),
            Err(err) => warn!(error = %err, "push channel error, reconnecting"),
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn connect_and_receive(
    ws_url: &str,
    client_id: &str,
    api_key: Option<&str>,
    on_notify: &mut impl FnMut(PushNotification),
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let mut url = format!("{}?client_id={}", ws_url, client_id);
    if let Some(key) = api_key {
        url.push_str(&format!("&api_key={}", key));
    }

    let (stream, _) = tokio_tungstenite::connect_async(&url).await?;
    info!(%client_id, "push channel connected");
    let (mut write, mut read) = stream.split();

    let mut keepalive = tokio::time::interval(KEEPALIVE_INTERVAL);
    keepalive.tick().await;

    loop {
        tokio::select! {
            _ = keepalive.tick() => {
                if write.send(Message::Ping(Vec::new())).await.is_err() {
                    return Ok(());
                }
            }
            msg = timeout(READ_DEADLINE, read.next()) => {
                match msg {
                    Ok(Some(Ok(Message::Text(text)))) => {
                        match serde_json::from_str::<PushNotification>(&text) {
                            Ok(notification) => {
                                if notification.level.eq_ignore_ascii_case("critical")
                                    || notification.kind.eq_ignore_ascii_case("alert")
                                {
                                    dispatch_os_notification(&notification);
                                }
                                on_notify(notification);
                            }
                            Err(err) => debug!(error = %err, "ignoring malformed push message"),
                        }
                    }
                    Ok(Some(Ok(Message::Close(_)))) | Ok(None) => return Ok(()),
                    Ok(Some(Ok(_))) => {}
                    Ok(Some(Err(err))) => return Err(err),
                    Err(_) => {
                        warn!("push channel read timed out");
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn dispatch_os_notification(notification: &PushNotification) {
    let result = notify_rust::Notification::new()
        .summary(&notification.kind)
        .body(&notification.message)
        .show();
    if let Err(err) = result {
        error!(error = %err, "failed to show OS notification");
    }
}
