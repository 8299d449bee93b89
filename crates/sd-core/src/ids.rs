//! Strongly typed, zero-cost identifier wrappers.
//!
//! All IDs are `Copy + Ord + Hash` so they can be used as map keys and in
//! ordered collections.  Ordered collections matter here: facilities, sites
//! and agents are always visited in ascending id order so that contested
//! claims resolve the same way on every run.
//!
//! "No target" / "no region" is modelled with `Option<…>` rather than a
//! sentinel value.

use std::fmt;

/// Generate a typed ID wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[derive(serde::Serialize, serde::Deserialize)]
        $vis struct $name(pub $inner);

        impl $name {
            /// Cast to `usize` for direct use as a `Vec` index.
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<$name> for usize {
            #[inline(always)]
            fn from(id: $name) -> usize {
                id.0 as usize
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
    /// A mobile collection agent.
    pub struct AgentId(u32);
}

typed_id! {
    /// A stationary demand site accumulating load.
    pub struct SiteId(u32);
}

typed_id! {
    /// A dispatching facility owning a service area.
    pub struct FacilityId(u32);
}

typed_id! {
    /// An administrative region (district).
    pub struct RegionId(u16);
}

typed_id! {
    /// Handle to a movement plan issued by the path service.
    pub struct PathHandle(u32);
}

typed_id! {
    /// An active emergency swarm.
    pub struct SwarmId(u32);
}

typed_id! {
    /// Index of a road-network node.
    pub struct NodeId(u32);
}

typed_id! {
    /// Index of a directed road-network edge.
    pub struct EdgeId(u32);
}
