//! Stat stage modifiers

use pokellm_protocol::Stat;

const MIN_STAGE: i8 = -6;
const MAX_STAGE: i8 = 6;

/// Stat stages in the order of [`Stat::ALL`], each clamped to -6..=+6
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatStages([i8; 7]);

fn index(stat: Stat) -> usize {
    match stat {
        Stat::Atk => 0,
        Stat::Def => 1,
        Stat::Spa => 2,
        Stat::Spd => 3,
        Stat::Spe => 4,
        Stat::Accuracy => 5,
        Stat::Evasion => 6,
    }
}

impl StatStages {
    pub fn get(&self, stat: Stat) -> i8 {
        self.0[index(stat)]
    }

    pub fn set(&mut self, stat: Stat, value: i8) {
        self.0[index(stat)] = value.clamp(MIN_STAGE, MAX_STAGE);
    }

    /// Apply a relative change, returning the change actually applied
    pub fn boost(&mut self, stat: Stat, amount: i8) -> i8 {
        let current = self.get(stat);
        self.set(stat, current.saturating_add(amount));
        self.get(stat) - current
    }

    pub fn clear(&mut self) {
        self.0 = [0; 7];
    }

    pub fn clear_positive(&mut self) {
        self.0.iter_mut().filter(|s| **s > 0).for_each(|s| *s = 0);
    }

    pub fn clear_negative(&mut self) {
        self.0.iter_mut().filter(|s| **s < 0).for_each(|s| *s = 0);
    }

    /// Topsy-Turvy
    pub fn invert(&mut self) {
        self.0.iter_mut().for_each(|s| *s = -*s);
    }

    pub fn is_clear(&self) -> bool {
        self.0.iter().all(|s| *s == 0)
    }

    /// Non-zero stages, in stat order
    pub fn changed(&self) -> impl Iterator<Item = (Stat, i8)> + '_ {
        Stat::ALL
            .iter()
            .map(|&stat| (stat, self.get(stat)))
            .filter(|(_, stage)| *stage != 0)
    }
}
