use axum::extract::ws::Message;

use crate::ws::events::ServerEvent;
use crate::ws::ConnectionHandle;

/// Encode a server event as a JSON text frame.
pub fn encode(event: &ServerEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode server event");
            None
        }
    }
}

/// Encode once and queue the frame on every handle.
/// Returns how many connections accepted it.
pub fn fan_out<'a, I>(handles: I, event: &ServerEvent) -> usize
where
    I: IntoIterator<Item = &'a ConnectionHandle>,
{
    let Some(msg) = encode(event) else {
        return 0;
    };

    handles
        .into_iter()
        .filter(|handle| handle.send_raw(msg.clone()))
        .count()
}
