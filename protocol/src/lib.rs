use thiserror::Error;

pub mod client;
pub mod server;

pub use client::{ClientCommand, ClientMessage};
pub use server::{
    ActivePokemon, BattleRequest, ChallengeState, GameType, HpStatus, MoveSlot, Player, Pokemon,
    PokemonDetails, PokemonStats, RoomType, ServerFrame, ServerMessage, Side, SideInfo,
    SidePokemon, Stat, User, parse_server_frame, parse_server_message, to_id,
};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Invalid message format: {0}")]
    InvalidFormat(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}
