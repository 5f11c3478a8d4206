//! Categorical labels derived from a single numeric or raw input.
//!
//! All thresholds are inclusive on the lower bound and checked from the top band down.

use std::fmt::Display;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PopularityTier {
    High,
    Medium,
    Low,
    Unknown,
}

impl PopularityTier {
    pub fn from_popularity(popularity: Option<f64>) -> Self {
        match popularity {
            None => Self::Unknown,
            Some(p) if p >= 70.0 => Self::High,
            Some(p) if p >= 40.0 => Self::Medium,
            Some(_) => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DanceabilityLabel {
    #[serde(rename = "Very Danceable")]
    VeryDanceable,
    Danceable,
    Low,
    Unknown,
}

impl DanceabilityLabel {
    pub fn from_danceability(danceability: Option<f64>) -> Self {
        match danceability {
            None => Self::Unknown,
            Some(d) if d >= 75.0 => Self::VeryDanceable,
            Some(d) if d >= 50.0 => Self::Danceable,
            Some(_) => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryDanceable => "Very Danceable",
            Self::Danceable => "Danceable",
            Self::Low => "Low",
            Self::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EnergyLabel {
    High,
    Medium,
    Low,
    Unknown,
}

impl EnergyLabel {
    pub fn from_energy(energy: Option<f64>) -> Self {
        match energy {
            None => Self::Unknown,
            Some(e) if e >= 70.0 => Self::High,
            Some(e) if e >= 40.0 => Self::Medium,
            Some(_) => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Unknown => "Unknown",
        }
    }
}

/// Raw explicit-content flag, as found in the input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlagValue<'a> {
    Number(f64),
    Text(&'a str),
}

impl From<f64> for FlagValue<'_> {
    fn from(n: f64) -> Self {
        FlagValue::Number(n)
    }
}

impl<'a> From<&'a str> for FlagValue<'a> {
    fn from(s: &'a str) -> Self {
        FlagValue::Text(s)
    }
}

const EXPLICIT_WORDS: &[&str] = &["true", "t", "yes", "y", "1", "explicit"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExplicitLabel {
    Explicit,
    Clean,
}

impl ExplicitLabel {
    /// Anything that is not clearly explicit is labelled clean.
    ///
    /// Words like `false`, `no` or `clean` land on `Clean` the same way an
    /// unrecognised word does.
    pub fn from_flag(flag: Option<FlagValue<'_>>) -> Self {
        match flag {
            None => Self::Clean,
            Some(FlagValue::Number(n)) if n != 0.0 => Self::Explicit,
            Some(FlagValue::Number(_)) => Self::Clean,
            Some(FlagValue::Text(text)) => {
                let word = text.trim().to_lowercase();
                if EXPLICIT_WORDS.contains(&word.as_str()) {
                    Self::Explicit
                } else {
                    Self::Clean
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explicit => "Explicit",
            Self::Clean => "Clean",
        }
    }
}

impl Display for PopularityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for DanceabilityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for EnergyLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for ExplicitLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
