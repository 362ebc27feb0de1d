//! Weather, terrain, and side conditions

use std::fmt;

fn normalize(s: &str) -> String {
    let clean = s.strip_prefix("move: ").unwrap_or(s);
    clean
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Weather {
    Sun,
    Rain,
    Sand,
    Hail,
    Snow,
    HarshSun,
    HeavyRain,
    StrongWinds,
}

impl Weather {
    /// Parse a `-weather` argument; "none" clears the weather
    pub fn from_protocol(s: &str) -> Option<Self> {
        match normalize(s).as_str() {
            "sunnyday" => Some(Weather::Sun),
            "raindance" => Some(Weather::Rain),
            "sandstorm" => Some(Weather::Sand),
            "hail" => Some(Weather::Hail),
            "snow" | "snowscape" => Some(Weather::Snow),
            "desolateland" => Some(Weather::HarshSun),
            "primordialsea" => Some(Weather::HeavyRain),
            "deltastream" => Some(Weather::StrongWinds),
            _ => None,
        }
    }

    pub fn is_sunny(&self) -> bool {
        matches!(self, Weather::Sun | Weather::HarshSun)
    }

    pub fn is_rainy(&self) -> bool {
        matches!(self, Weather::Rain | Weather::HeavyRain)
    }

    pub fn is_icy(&self) -> bool {
        matches!(self, Weather::Hail | Weather::Snow)
    }
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Weather::Sun => "harsh sunlight",
            Weather::Rain => "rain",
            Weather::Sand => "sandstorm",
            Weather::Hail => "hail",
            Weather::Snow => "snow",
            Weather::HarshSun => "extremely harsh sunlight",
            Weather::HeavyRain => "heavy rain",
            Weather::StrongWinds => "strong winds",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Terrain {
    Electric,
    Grassy,
    Misty,
    Psychic,
}

impl Terrain {
    pub fn from_protocol(s: &str) -> Option<Self> {
        match normalize(s).as_str() {
            "electricterrain" => Some(Terrain::Electric),
            "grassyterrain" => Some(Terrain::Grassy),
            "mistyterrain" => Some(Terrain::Misty),
            "psychicterrain" => Some(Terrain::Psychic),
            _ => None,
        }
    }
}

impl fmt::Display for Terrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Terrain::Electric => "Electric Terrain",
            Terrain::Grassy => "Grassy Terrain",
            Terrain::Misty => "Misty Terrain",
            Terrain::Psychic => "Psychic Terrain",
        })
    }
}

/// Condition attached to one side of the field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SideCondition {
    Reflect,
    LightScreen,
    AuroraVeil,
    Spikes,
    ToxicSpikes,
    StealthRock,
    StickyWeb,
    Tailwind,
    Safeguard,
    Mist,
}

impl SideCondition {
    pub fn from_protocol(s: &str) -> Option<Self> {
        match normalize(s).as_str() {
            "reflect" => Some(SideCondition::Reflect),
            "lightscreen" => Some(SideCondition::LightScreen),
            "auroraveil" => Some(SideCondition::AuroraVeil),
            "spikes" => Some(SideCondition::Spikes),
            "toxicspikes" => Some(SideCondition::ToxicSpikes),
            "stealthrock" => Some(SideCondition::StealthRock),
            "stickyweb" => Some(SideCondition::StickyWeb),
            "tailwind" => Some(SideCondition::Tailwind),
            "safeguard" => Some(SideCondition::Safeguard),
            "mist" => Some(SideCondition::Mist),
            _ => None,
        }
    }

    /// The move id that sets this condition
    pub fn move_id(&self) -> &'static str {
        match self {
            SideCondition::Reflect => "reflect",
            SideCondition::LightScreen => "lightscreen",
            SideCondition::AuroraVeil => "auroraveil",
            SideCondition::Spikes => "spikes",
            SideCondition::ToxicSpikes => "toxicspikes",
            SideCondition::StealthRock => "stealthrock",
            SideCondition::StickyWeb => "stickyweb",
            SideCondition::Tailwind => "tailwind",
            SideCondition::Safeguard => "safeguard",
            SideCondition::Mist => "mist",
        }
    }

    pub fn max_layers(&self) -> u8 {
        match self {
            SideCondition::Spikes => 3,
            SideCondition::ToxicSpikes => 2,
            _ => 1,
        }
    }

    pub fn is_hazard(&self) -> bool {
        matches!(
            self,
            SideCondition::Spikes
                | SideCondition::ToxicSpikes
                | SideCondition::StealthRock
                | SideCondition::StickyWeb
        )
    }
}

impl fmt::Display for SideCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SideCondition::Reflect => "Reflect",
            SideCondition::LightScreen => "Light Screen",
            SideCondition::AuroraVeil => "Aurora Veil",
            SideCondition::Spikes => "Spikes",
            SideCondition::ToxicSpikes => "Toxic Spikes",
            SideCondition::StealthRock => "Stealth Rock",
            SideCondition::StickyWeb => "Sticky Web",
            SideCondition::Tailwind => "Tailwind",
            SideCondition::Safeguard => "Safeguard",
            SideCondition::Mist => "Mist",
        })
    }
}
