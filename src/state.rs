// MIT License - Copyright (c) 2026 Peter Wright
// Panel states and sensor readings

use std::fmt;

/// The authoritative state of the alarm panel.
///
/// `Arming` is transitional: it is entered only on the way to `ArmedHome`
/// or `ArmedAway` and resolves to a resting state when the arming delay
/// elapses or the armed sensor confirms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelState {
    Disarmed,
    Arming,
    ArmedHome,
    ArmedAway,
    Triggered,
}

impl PanelState {
    /// Lowercase wire/display name (e.g., "armed_home").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disarmed => "disarmed",
            Self::Arming => "arming",
            Self::ArmedHome => "armed_home",
            Self::ArmedAway => "armed_away",
            Self::Triggered => "triggered",
        }
    }

    /// Whether the panel counts as armed in this state.
    ///
    /// Drives the armed indicator: only the two armed resting states
    /// qualify, not the transitional `Arming` state.
    pub fn is_armed(&self) -> bool {
        matches!(self, Self::ArmedHome | Self::ArmedAway)
    }

    /// Whether the alarm is currently going off.
    pub fn is_triggered(&self) -> bool {
        matches!(self, Self::Triggered)
    }
}

impl fmt::Display for PanelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An "on"/"off" reading reported by an external binary sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryState {
    On,
    Off,
}

impl BinaryState {
    /// Parse a raw sensor state string. Case-insensitive; anything other
    /// than "on"/"off" (e.g., "unavailable") yields `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Some(Self::On),
            "off" => Some(Self::Off),
            _ => None,
        }
    }

    pub fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }
}

impl fmt::Display for BinaryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::On => "on",
            Self::Off => "off",
        })
    }
}
