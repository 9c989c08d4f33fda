//! Design styles and top-level modes

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Design category driving prompt construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Style {
    Modern,
    Minimalist,
    Bohemian,
    Coastal,
    Industrial,
    Farmhouse,
}

impl Style {
    /// All styles in display order
    pub const ALL: [Style; 6] = [
        Style::Modern,
        Style::Minimalist,
        Style::Bohemian,
        Style::Coastal,
        Style::Industrial,
        Style::Farmhouse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Modern => "Modern",
            Style::Minimalist => "Minimalist",
            Style::Bohemian => "Bohemian",
            Style::Coastal => "Coastal",
            Style::Industrial => "Industrial",
            Style::Farmhouse => "Farmhouse",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).unwrap_or(0)
    }

    /// Rotate to the next style, wrapping around
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    /// Rotate to the previous style, wrapping around
    pub fn previous(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// Pick a style at random
    pub fn random() -> Self {
        use rand::seq::SliceRandom;
        *Self::ALL
            .choose(&mut rand::thread_rng())
            .unwrap_or(&Style::Modern)
    }
}

impl std::fmt::Display for Style {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|style| style.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|s| s.as_str()).collect();
                format!("unknown style '{}' (expected one of {})", s, names.join(", "))
            })
    }
}

impl TryFrom<String> for Style {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Style> for &'static str {
    fn from(style: Style) -> Self {
        style.as_str()
    }
}

/// User-selected top-level intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Generate a new room from a prompt
    #[default]
    Generate,
    /// Photograph a room and restyle it
    Redesign,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Generate => f.write_str("generate"),
            Mode::Redesign => f.write_str("redesign"),
        }
    }
}
