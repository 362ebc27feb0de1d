//! Major status and volatile conditions

use std::fmt;

/// Non-volatile status, survives switching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Burn,
    Freeze,
    Paralysis,
    Poison,
    Toxic,
    Sleep,
}

impl Status {
    /// "brn", "frz", "par", "psn", "tox", "slp"
    pub fn from_protocol(s: &str) -> Option<Self> {
        match s {
            "brn" => Some(Status::Burn),
            "frz" => Some(Status::Freeze),
            "par" => Some(Status::Paralysis),
            "psn" => Some(Status::Poison),
            "tox" => Some(Status::Toxic),
            "slp" => Some(Status::Sleep),
            _ => None,
        }
    }

    pub fn as_protocol(&self) -> &'static str {
        match self {
            Status::Burn => "brn",
            Status::Freeze => "frz",
            Status::Paralysis => "par",
            Status::Poison => "psn",
            Status::Toxic => "tox",
            Status::Sleep => "slp",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Burn => "burned",
            Status::Freeze => "frozen",
            Status::Paralysis => "paralyzed",
            Status::Poison => "poisoned",
            Status::Toxic => "badly poisoned",
            Status::Sleep => "asleep",
        })
    }
}

/// Volatile condition, cleared when the Pokemon leaves the field
///
/// Only conditions that change which moves are sensible are named;
/// everything else is kept verbatim in [`Volatile::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Volatile {
    Confusion,
    Taunt,
    Encore,
    Disable,
    Torment,
    Attract,
    LeechSeed,
    Curse,
    PerishSong,
    Substitute,
    Yawn,
    MustRecharge,
    Charging,
    LockedMove,
    Trapped,
    PartialTrap,
    Transformed,
    Other(String),
}

impl Volatile {
    /// Parse an effect name such as "move: Leech Seed" or "confusion"
    pub fn from_protocol(s: &str) -> Self {
        let clean = s
            .strip_prefix("move: ")
            .or_else(|| s.strip_prefix("ability: "))
            .unwrap_or(s);
        let normalized: String = clean
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "confusion" => Volatile::Confusion,
            "taunt" => Volatile::Taunt,
            "encore" => Volatile::Encore,
            "disable" => Volatile::Disable,
            "torment" => Volatile::Torment,
            "attract" => Volatile::Attract,
            "leechseed" => Volatile::LeechSeed,
            "curse" => Volatile::Curse,
            "perish0" | "perish1" | "perish2" | "perish3" | "perishsong" => Volatile::PerishSong,
            "substitute" => Volatile::Substitute,
            "yawn" => Volatile::Yawn,
            "mustrecharge" => Volatile::MustRecharge,
            "twoturnmove" => Volatile::Charging,
            "lockedmove" => Volatile::LockedMove,
            "trapped" => Volatile::Trapped,
            "partiallytrapped" | "bind" | "wrap" | "firespin" | "whirlpool" | "sandtomb"
            | "magmastorm" | "infestation" | "clamp" | "snaptrap" | "thundercage" => {
                Volatile::PartialTrap
            }
            "transform" => Volatile::Transformed,
            _ => Volatile::Other(clean.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Volatile::Confusion => "confused",
            Volatile::Taunt => "taunted",
            Volatile::Encore => "encored",
            Volatile::Disable => "move disabled",
            Volatile::Torment => "tormented",
            Volatile::Attract => "infatuated",
            Volatile::LeechSeed => "seeded",
            Volatile::Curse => "cursed",
            Volatile::PerishSong => "perish song",
            Volatile::Substitute => "behind a substitute",
            Volatile::Yawn => "drowsy",
            Volatile::MustRecharge => "must recharge",
            Volatile::Charging => "charging a move",
            Volatile::LockedMove => "locked into a move",
            Volatile::Trapped => "trapped",
            Volatile::PartialTrap => "partially trapped",
            Volatile::Transformed => "transformed",
            Volatile::Other(name) => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_protocol() {
        assert_eq!(Status::from_protocol("tox"), Some(Status::Toxic));
        assert_eq!(Status::from_protocol("fnt"), None);
        assert_eq!(Status::Toxic.as_protocol(), "tox");
    }

    #[test]
    fn test_volatile_from_protocol() {
        assert_eq!(Volatile::from_protocol("move: Leech Seed"), Volatile::LeechSeed);
        assert_eq!(Volatile::from_protocol("Substitute"), Volatile::Substitute);
        assert_eq!(Volatile::from_protocol("perish3"), Volatile::PerishSong);
        assert_eq!(
            Volatile::from_protocol("ability: Flash Fire"),
            Volatile::Other("Flash Fire".to_string())
        );
    }
}
