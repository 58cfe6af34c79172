//! Elemental affinities and the advantage cycle used by combat.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{ELEMENT_ADVANTAGE, ELEMENT_DISADVANTAGE};
use crate::resource::ResourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Element {
    Fire,
    Water,
    Earth,
    Wind,
    #[default]
    Neutral,
}

impl Element {
    /// The four elements that carry a talent and a mana pool.
    pub const MAGICAL: [Self; 4] = [Self::Fire, Self::Water, Self::Earth, Self::Wind];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fire => "fire",
            Self::Water => "water",
            Self::Earth => "earth",
            Self::Wind => "wind",
            Self::Neutral => "neutral",
        }
    }

    /// Fire beats wind, wind beats earth, earth beats water, water beats fire.
    #[must_use]
    pub const fn beats(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::Fire, Self::Wind)
                | (Self::Wind, Self::Earth)
                | (Self::Earth, Self::Water)
                | (Self::Water, Self::Fire)
        )
    }

    /// Damage multiplier for an attack of this element against `defender`.
    #[must_use]
    pub const fn multiplier_against(self, defender: Self) -> f64 {
        if self.beats(defender) {
            ELEMENT_ADVANTAGE
        } else if defender.beats(self) {
            ELEMENT_DISADVANTAGE
        } else {
            1.0
        }
    }

    #[must_use]
    pub const fn is_magical(self) -> bool {
        !matches!(self, Self::Neutral)
    }

    /// Mana pool fed by this element, if any.
    #[must_use]
    pub const fn mana_resource(self) -> Option<ResourceId> {
        match self {
            Self::Fire => Some(ResourceId::ManaFire),
            Self::Water => Some(ResourceId::ManaWater),
            Self::Earth => Some(ResourceId::ManaEarth),
            Self::Wind => Some(ResourceId::ManaWind),
            Self::Neutral => None,
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Element {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fire" => Ok(Self::Fire),
            "water" => Ok(Self::Water),
            "earth" => Ok(Self::Earth),
            "wind" | "air" => Ok(Self::Wind),
            "neutral" => Ok(Self::Neutral),
            _ => Err(()),
        }
    }
}
