//! Elemental talent profile and the multipliers derived from it.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{
    TALENT_CAPACITY_DIVISOR, TALENT_DURATION_DIVISOR, TALENT_LEARNING_DIVISOR, TALENT_MAX,
    TALENT_MIN,
};
use crate::element::Element;

/// Starting talent distributions offered at character creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TalentPreset {
    Fire,
    Water,
    Earth,
    Wind,
}

impl TalentPreset {
    pub const ALL: [Self; 4] = [Self::Fire, Self::Water, Self::Earth, Self::Wind];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.element().as_str()
    }

    #[must_use]
    pub const fn element(self) -> Element {
        match self {
            Self::Fire => Element::Fire,
            Self::Water => Element::Water,
            Self::Earth => Element::Earth,
            Self::Wind => Element::Wind,
        }
    }
}

impl fmt::Display for TalentPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TalentPreset {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<Element>()? {
            Element::Fire => Ok(Self::Fire),
            Element::Water => Ok(Self::Water),
            Element::Earth => Ok(Self::Earth),
            Element::Wind => Ok(Self::Wind),
            Element::Neutral => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Talent {
    #[serde(default)]
    fire: f64,
    #[serde(default)]
    water: f64,
    #[serde(default)]
    earth: f64,
    #[serde(default)]
    wind: f64,
}

impl Talent {
    #[must_use]
    pub fn new(fire: f64, water: f64, earth: f64, wind: f64) -> Self {
        let mut talent = Self::default();
        talent.set(Element::Fire, fire);
        talent.set(Element::Water, water);
        talent.set(Element::Earth, earth);
        talent.set(Element::Wind, wind);
        talent
    }

    #[must_use]
    pub fn from_preset(preset: TalentPreset) -> Self {
        match preset {
            TalentPreset::Fire => Self::new(70.0, 20.0, 25.0, 30.0),
            TalentPreset::Water => Self::new(25.0, 70.0, 30.0, 20.0),
            TalentPreset::Earth => Self::new(20.0, 30.0, 70.0, 25.0),
            TalentPreset::Wind => Self::new(30.0, 25.0, 20.0, 70.0),
        }
    }

    /// Talent for an element; neutral has none.
    #[must_use]
    pub const fn get(&self, element: Element) -> f64 {
        match element {
            Element::Fire => self.fire,
            Element::Water => self.water,
            Element::Earth => self.earth,
            Element::Wind => self.wind,
            Element::Neutral => 0.0,
        }
    }

    pub fn set(&mut self, element: Element, value: f64) {
        let clamped = if value.is_nan() {
            TALENT_MIN
        } else {
            value.clamp(TALENT_MIN, TALENT_MAX)
        };
        match element {
            Element::Fire => self.fire = clamped,
            Element::Water => self.water = clamped,
            Element::Earth => self.earth = clamped,
            Element::Wind => self.wind = clamped,
            Element::Neutral => {}
        }
    }

    pub fn add(&mut self, element: Element, amount: f64) {
        self.set(element, self.get(element) + amount);
    }

    /// `1 + talent / 200`
    #[must_use]
    pub fn mana_capacity_multiplier(&self, element: Element) -> f64 {
        1.0 + self.get(element) / TALENT_CAPACITY_DIVISOR
    }

    /// `1 + talent / 100`
    #[must_use]
    pub fn learning_speed_multiplier(&self, element: Element) -> f64 {
        1.0 + self.get(element) / TALENT_LEARNING_DIVISOR
    }

    /// Highest-talent element, ties resolved in fire/water/earth/wind order.
    #[must_use]
    pub fn primary(&self) -> Element {
        Element::MAGICAL
            .into_iter()
            .fold(Element::Fire, |best, el| {
                if self.get(el) > self.get(best) { el } else { best }
            })
    }
}

/// `max(floor, base * (1 - talent / 200))`
#[must_use]
pub fn scaled_duration(base_seconds: f64, floor_seconds: f64, talent: f64) -> f64 {
    (base_seconds * (1.0 - talent / TALENT_DURATION_DIVISOR)).max(floor_seconds)
}
