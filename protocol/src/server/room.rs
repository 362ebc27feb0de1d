use super::{RoomType, ServerMessage};
use crate::ParseError;
use anyhow::Result;

/// |init|ROOMTYPE
pub fn parse_init(parts: &[&str]) -> Result<ServerMessage> {
    if parts.len() < 3 {
        return Err(ParseError::MissingField("init fields".to_string()).into());
    }

    let room_type = match parts[2] {
        "chat" => RoomType::Chat,
        "battle" => RoomType::Battle,
        other => {
            return Err(ParseError::InvalidFormat(format!("unknown room type: {}", other)).into());
        }
    };

    Ok(ServerMessage::Init(room_type))
}

/// |noinit|REASON|MESSAGE, sent when joining a room that no longer exists
pub fn parse_noinit(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::NoInit {
        reason: parts.get(2).unwrap_or(&"").to_string(),
        message: parts.get(3..).map(|m| m.join("|")).unwrap_or_default(),
    })
}

pub fn parse_title(parts: &[&str]) -> Result<ServerMessage> {
    if parts.len() < 3 {
        return Err(ParseError::MissingField("title field".to_string()).into());
    }

    Ok(ServerMessage::Title(parts[2..].join("|")))
}
