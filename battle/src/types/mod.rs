//! Domain types for tracked battle state

mod conditions;
mod field;
mod pokemon;
mod side;
mod stats;
mod status;

pub use conditions::{SideCondition, Terrain, Weather};
pub use field::FieldState;
pub use pokemon::PokemonState;
pub use side::SideState;
pub use stats::StatStages;
pub use status::{Status, Volatile};
