use serde::{Deserialize, Serialize};

/// Position of an action in the frame's index-aligned arrays. Cheap to copy
/// and compare.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct ActionIndex(pub u32);

impl ActionIndex {
    /// The index as a `usize` for slice access.
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for ActionIndex {
    fn from(index: usize) -> Self {
        Self(index as u32)
    }
}

impl std::fmt::Display for ActionIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position of a transition in the compiled graph's transition list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransitionIndex(pub u32);

impl TransitionIndex {
    /// The index as a `usize` for slice access.
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for TransitionIndex {
    fn from(index: usize) -> Self {
        Self(index as u32)
    }
}

/// Opaque scene-binding handle. Only the host knows what it refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SceneHandle(pub u64);
