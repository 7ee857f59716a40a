//! Strongly typed, zero-cost identifier wrappers.
//!
//! All IDs are `Copy + Ord + Hash` so they can be used as map keys and sorted
//! collection elements without ceremony.  The inner integer is `pub` so the
//! network and fleet can index their `Vec`s directly via `id.index()`.
//!
//! Ordering matters beyond bookkeeping: the driver iterates vehicles and
//! waiting agents in ascending id order, which is what makes boarding
//! deterministic.

use std::fmt;

/// Generate a typed ID wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name(pub $inner);

        impl $name {
            /// Sentinel meaning "no valid ID" (`u32::MAX`).
            pub const INVALID: $name = $name(<$inner>::MAX);

            /// Cast to `usize` for direct use as a `Vec` index.
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl Default for $name {
            /// Returns the `INVALID` sentinel so uninitialized IDs are visibly invalid.
            #[inline(always)]
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl TryFrom<usize> for $name {
            type Error = std::num::TryFromIntError;
            fn try_from(n: usize) -> Result<$name, Self::Error> {
                <$inner>::try_from(n).map($name)
            }
        }
    };
}

typed_id! {
    /// Index of a person or container in the driver's population.
    pub struct AgentId(u32);
}

typed_id! {
    /// Index of a network junction.
    pub struct NodeId(u32);
}

typed_id! {
    /// Index of a directed network edge.
    pub struct EdgeId(u32);
}

typed_id! {
    /// Index of a lane.  Lanes belong to exactly one edge.
    pub struct LaneId(u32);
}

typed_id! {
    /// Index of a stopping place (bus stop, container stop, …).
    pub struct StopId(u32);
}

typed_id! {
    /// Handle of a vehicle in the fleet.  Handles are never reused, so a
    /// handle that outlives its vehicle simply stops resolving.
    pub struct VehicleId(u32);
}
