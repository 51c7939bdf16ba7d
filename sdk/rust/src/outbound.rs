//! Outbound frame encoding. Every frame carries the session token.

use serde::Serialize;
use serde_json::Value;

use crate::error::SessionError;

#[derive(Serialize)]
struct ChatFrame<'a> {
    message: &'a str,
    session_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_id: Option<&'a str>,
}

/// `{"message", "session_token", "reply_to_id"?}`
pub fn chat_frame(
    message: &str,
    session_token: &str,
    reply_to_id: Option<&str>,
) -> Result<String, SessionError> {
    Ok(serde_json::to_string(&ChatFrame {
        message,
        session_token,
        reply_to_id,
    })?)
}

/// The action object with `session_token` merged in.
pub fn action_frame(action: Value, session_token: &str) -> Result<String, SessionError> {
    let Value::Object(mut map) = action else {
        return Err(SessionError::InvalidAction);
    };
    map.insert(
        "session_token".to_owned(),
        Value::String(session_token.to_owned()),
    );
    Ok(serde_json::to_string(&map)?)
}
