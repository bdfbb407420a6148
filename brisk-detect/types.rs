#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Position of a layer within its octave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LayerKind {
    /// Even layers: the source image and its successive half-samples
    Octave,
    /// Odd layers: two-thirds samples sitting between octaves
    Intra,
}

impl LayerKind {
    pub fn of_index(index: usize) -> Self {
        if index % 2 == 0 {
            LayerKind::Octave
        } else {
            LayerKind::Intra
        }
    }
}

/// Geometry of one scale-space layer
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LayerInfo {
    pub index: usize,
    pub kind: LayerKind,
    pub width: usize,
    pub height: usize,
    pub scale: f32,
    pub offset: f32,
}

/// Integer-pixel maximum found while scanning a neighbouring layer,
/// with its sub-pixel offset mapped into the querying layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LayerMaximum {
    pub score: f32,
    pub dx: f32,
    pub dy: f32,
}
