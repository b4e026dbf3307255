use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Document version. Incremented once per applied operation.
pub type Version = u64;

/// Identifier of the client/session an operation originates from.
///
/// The byte-wise order of replica ids is the stable tie-break used by the OT engine when
/// two operations compete for the same place.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReplicaId(pub Vec<u8>);

impl ReplicaId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Name of a document root. Roots are addressed by name so positions stay meaningful
/// across serialization and across replicas.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RootName(pub String);

impl RootName {
    pub const GRAVEYARD: &'static str = "$graveyard";
    pub const MAIN: &'static str = "main";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn main() -> Self {
        Self(Self::MAIN.to_string())
    }

    pub fn graveyard() -> Self {
        Self(Self::GRAVEYARD.to_string())
    }

    pub fn is_graveyard(&self) -> bool {
        self.0 == Self::GRAVEYARD
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RootName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RootName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Index of a node slot inside the document arena.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle returned by `Document::subscribe`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle of a live range registered in a document.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct LiveRangeId(pub u64);
