/// Commands that clients can send to server
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    /// /trn USERNAME,0,ASSERTION
    TrustedLogin { username: String, assertion: String },

    /// /join ROOMID
    JoinRoom(String),

    /// /leave ROOMID
    LeaveRoom(String),

    /// /search FORMAT
    Search(String),

    /// /accept USERNAME
    AcceptChallenge(String),

    /// /utm TEAM (`null` for random formats)
    UpdateTeam(Option<String>),

    /// /choose CHOICE|RQID
    Choose { choice: String, rqid: Option<u64> },
}

impl ClientCommand {
    /// Serialize command to protocol format
    pub fn to_protocol_string(&self) -> String {
        match self {
            Self::TrustedLogin {
                username,
                assertion,
            } => format!("/trn {},0,{}", username, assertion),
            Self::JoinRoom(room) => format!("/join {}", room),
            Self::LeaveRoom(room) => format!("/leave {}", room),
            Self::Search(format) => format!("/search {}", format),
            Self::AcceptChallenge(username) => format!("/accept {}", username),
            Self::UpdateTeam(Some(team)) => format!("/utm {}", team),
            Self::UpdateTeam(None) => "/utm null".to_string(),
            Self::Choose {
                choice,
                rqid: Some(rqid),
            } => format!("/choose {}|{}", choice, rqid),
            Self::Choose { choice, rqid: None } => format!("/choose {}", choice),
        }
    }
}

/// Client message with optional room context
#[derive(Debug, Clone, PartialEq)]
pub struct ClientMessage {
    pub room_id: Option<String>,
    pub command: ClientCommand,
}

impl ClientMessage {
    /// A command with no room context
    pub fn global(command: ClientCommand) -> Self {
        Self {
            room_id: None,
            command,
        }
    }

    /// A command scoped to a room
    pub fn in_room(room: impl Into<String>, command: ClientCommand) -> Self {
        Self {
            room_id: Some(room.into()),
            command,
        }
    }

    /// Serialize to wire format: ROOMID|TEXT or |TEXT
    pub fn to_wire_format(&self) -> String {
        let text = self.command.to_protocol_string();
        match &self.room_id {
            Some(room) => format!("{}|{}", room, text),
            None => format!("|{}", text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choose_with_rqid() {
        let msg = ClientMessage::in_room(
            "battle-gen9randombattle-1",
            ClientCommand::Choose {
                choice: "move 2".to_string(),
                rqid: Some(7),
            },
        );
        assert_eq!(
            msg.to_wire_format(),
            "battle-gen9randombattle-1|/choose move 2|7"
        );
    }

    #[test]
    fn test_global_commands() {
        assert_eq!(
            ClientMessage::global(ClientCommand::Search("gen9randombattle".into())).to_wire_format(),
            "|/search gen9randombattle"
        );
        assert_eq!(
            ClientMessage::global(ClientCommand::UpdateTeam(None)).to_wire_format(),
            "|/utm null"
        );
    }

    #[test]
    fn test_trusted_login() {
        let cmd = ClientCommand::TrustedLogin {
            username: "bot".into(),
            assertion: "abc;def".into(),
        };
        assert_eq!(cmd.to_protocol_string(), "/trn bot,0,abc;def");
    }
}
