//! Mode permissions, vehicle classes, and the kind of thing being moved.
//!
//! `ModeSet` doubles as an edge/lane permission mask and as the set of modes
//! a trip request may combine, so "may this trip use this lane" is a single
//! bitwise intersection.

use std::fmt;
use std::str::FromStr;

use crate::TpError;

// ── ModeSet ───────────────────────────────────────────────────────────────────

/// Bitmask of transport modes.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModeSet(pub u8);

impl ModeSet {
    pub const NONE:    ModeSet = ModeSet(0);
    /// On foot (persons) or hand-carried (containers).
    pub const WALK:    ModeSet = ModeSet(1 << 0);
    pub const BICYCLE: ModeSet = ModeSet(1 << 1);
    /// Private motorised vehicle.
    pub const CAR:     ModeSet = ModeSet(1 << 2);
    /// Scheduled public transport (bus, tram, rail).
    pub const PUBLIC:  ModeSet = ModeSet(1 << 3);
    pub const ALL:     ModeSet = ModeSet(0b1111);

    const NAMES: [(ModeSet, &'static str); 4] = [
        (ModeSet::WALK, "walk"),
        (ModeSet::BICYCLE, "bicycle"),
        (ModeSet::CAR, "car"),
        (ModeSet::PUBLIC, "public"),
    ];

    #[inline]
    pub fn contains(self, other: ModeSet) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn intersects(self, other: ModeSet) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for ModeSet {
    type Output = ModeSet;
    #[inline]
    fn bitor(self, rhs: ModeSet) -> ModeSet {
        ModeSet(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ModeSet {
    #[inline]
    fn bitor_assign(&mut self, rhs: ModeSet) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ModeSet {
    /// Space-separated mode names, e.g. `"walk public"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (mode, name) in ModeSet::NAMES {
            if self.contains(mode) {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl FromStr for ModeSet {
    type Err = TpError;

    /// Parse a space- or comma-separated list of mode names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = ModeSet::NONE;
        for token in s.split([' ', ',']).filter(|t| !t.is_empty()) {
            let mode = ModeSet::NAMES
                .iter()
                .find(|(_, name)| *name == token)
                .map(|(mode, _)| *mode)
                .ok_or_else(|| TpError::UnknownMode(token.to_owned()))?;
            set |= mode;
        }
        Ok(set)
    }
}

// ── VehicleClass ──────────────────────────────────────────────────────────────

/// Abstract vehicle class, cached by a ride for output after the vehicle is
/// gone.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VehicleClass {
    /// Unknown or not yet determined.
    #[default]
    Ignoring,
    Passenger,
    Taxi,
    Bus,
    Tram,
    Rail,
    Bicycle,
    Pedestrian,
}

impl VehicleClass {
    /// The mode permission a vehicle of this class needs on a lane.
    pub fn mode(self) -> ModeSet {
        match self {
            VehicleClass::Passenger | VehicleClass::Taxi => ModeSet::CAR,
            VehicleClass::Bus | VehicleClass::Tram | VehicleClass::Rail => ModeSet::PUBLIC,
            VehicleClass::Bicycle => ModeSet::BICYCLE,
            VehicleClass::Pedestrian => ModeSet::WALK,
            VehicleClass::Ignoring => ModeSet::ALL,
        }
    }

    /// Human-readable label, used as the CSV column value.
    pub fn as_str(self) -> &'static str {
        match self {
            VehicleClass::Ignoring   => "ignoring",
            VehicleClass::Passenger  => "passenger",
            VehicleClass::Taxi       => "taxi",
            VehicleClass::Bus        => "bus",
            VehicleClass::Tram       => "tram",
            VehicleClass::Rail       => "rail",
            VehicleClass::Bicycle    => "bicycle",
            VehicleClass::Pedestrian => "pedestrian",
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleClass {
    type Err = TpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ignoring"   => VehicleClass::Ignoring,
            "passenger"  => VehicleClass::Passenger,
            "taxi"       => VehicleClass::Taxi,
            "bus"        => VehicleClass::Bus,
            "tram"       => VehicleClass::Tram,
            "rail"       => VehicleClass::Rail,
            "bicycle"    => VehicleClass::Bicycle,
            "pedestrian" => VehicleClass::Pedestrian,
            other        => return Err(TpError::UnknownVehicleClass(other.to_owned())),
        })
    }
}

// ── TransportableKind ─────────────────────────────────────────────────────────

/// Whether the itinerary belongs to a person or to a freight item.
///
/// Containers cannot walk; their foot legs become tranship stages.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransportableKind {
    #[default]
    Person,
    Container,
}

impl TransportableKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportableKind::Person    => "person",
            TransportableKind::Container => "container",
        }
    }
}

impl fmt::Display for TransportableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
