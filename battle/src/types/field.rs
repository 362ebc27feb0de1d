//! Global field state

use super::conditions::{Terrain, Weather};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldState {
    pub weather: Option<Weather>,
    pub terrain: Option<Terrain>,
    pub trick_room: bool,
    pub magic_room: bool,
    pub wonder_room: bool,
    pub gravity: bool,
    pub fairy_lock: bool,
}

impl FieldState {
    /// Apply `-weather`; upkeep lines restate the current weather and are ignored
    pub fn apply_weather(&mut self, weather: &str, upkeep: bool) {
        if !upkeep {
            self.weather = Weather::from_protocol(weather);
        }
    }

    pub fn apply_field_start(&mut self, condition: &str) {
        if let Some(terrain) = Terrain::from_protocol(condition) {
            self.terrain = Some(terrain);
        } else if let Some(flag) = self.room_flag(condition) {
            *flag = true;
        }
    }

    pub fn apply_field_end(&mut self, condition: &str) {
        if Terrain::from_protocol(condition).is_some() {
            self.terrain = None;
        } else if let Some(flag) = self.room_flag(condition) {
            *flag = false;
        }
    }

    fn room_flag(&mut self, condition: &str) -> Option<&mut bool> {
        let clean = condition.strip_prefix("move: ").unwrap_or(condition);
        match clean {
            "Trick Room" => Some(&mut self.trick_room),
            "Magic Room" => Some(&mut self.magic_room),
            "Wonder Room" => Some(&mut self.wonder_room),
            "Gravity" => Some(&mut self.gravity),
            "Fairy Lock" => Some(&mut self.fairy_lock),
            _ => None,
        }
    }

    /// Names of the active whole-field effects other than weather and terrain
    pub fn effects(&self) -> Vec<&'static str> {
        [
            (self.trick_room, "Trick Room"),
            (self.magic_room, "Magic Room"),
            (self.wonder_room, "Wonder Room"),
            (self.gravity, "Gravity"),
            (self.fairy_lock, "Fairy Lock"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect()
    }
}
