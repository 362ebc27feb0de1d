use super::{ChallengeState, ServerMessage, User};
use crate::ParseError;
use anyhow::Result;

pub fn parse_challstr(parts: &[&str]) -> Result<ServerMessage> {
    if parts.len() < 3 {
        return Err(ParseError::MissingField("challstr value".to_string()).into());
    }

    // CHALLSTR contains a | between key id and challenge
    let challstr = parts[2..].join("|");
    if challstr.is_empty() {
        return Err(ParseError::InvalidFormat("challstr cannot be empty".to_string()).into());
    }

    Ok(ServerMessage::Challstr(challstr))
}

/// |updateuser|USER|NAMED|AVATAR|SETTINGS
pub fn parse_updateuser(parts: &[&str]) -> Result<ServerMessage> {
    if parts.len() < 4 {
        return Err(ParseError::MissingField("updateuser fields".to_string()).into());
    }

    let user = User::parse(parts[2])
        .ok_or_else(|| ParseError::InvalidFormat("invalid user format".to_string()))?;

    Ok(ServerMessage::UpdateUser {
        user,
        named: parts[3] == "1",
        avatar: parts.get(4).unwrap_or(&"").to_string(),
    })
}

/// |nametaken|USERNAME|MESSAGE
pub fn parse_nametaken(parts: &[&str]) -> Result<ServerMessage> {
    if parts.len() < 4 {
        return Err(ParseError::MissingField("nametaken fields".to_string()).into());
    }

    Ok(ServerMessage::NameTaken {
        username: parts[2].to_string(),
        message: parts[3..].join("|"),
    })
}

pub fn parse_popup(parts: &[&str]) -> Result<ServerMessage> {
    if parts.len() < 3 {
        return Err(ParseError::MissingField("popup message".to_string()).into());
    }

    Ok(ServerMessage::Popup(parts[2..].join("|")))
}

/// |updatechallenges|JSON
pub fn parse_updatechallenges(parts: &[&str]) -> Result<ServerMessage> {
    if parts.len() < 3 {
        return Err(ParseError::MissingField("updatechallenges json".to_string()).into());
    }

    let json = parts[2..].join("|");
    let state: ChallengeState = serde_json::from_str(&json)
        .map_err(|e| ParseError::InvalidFormat(format!("invalid updatechallenges json: {}", e)))?;

    Ok(ServerMessage::UpdateChallenges(state))
}
