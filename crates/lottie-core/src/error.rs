use crate::context::TransformChannel;
use crate::layers::LayerId;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum KeyframeError {
    #[error("a keyframe group needs at least one keyframe")]
    Empty,
    #[error("keyframe {index} at time {time} does not come after time {previous}")]
    NonIncreasing { index: usize, previous: f32, time: f32 },
}

/// Failure to install a layer's animations into the animation backend.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SetupError {
    #[error("layer {layer} cannot animate the {channel} channel")]
    UnsupportedChannel {
        layer: LayerId,
        channel: TransformChannel,
    },
    #[error("the {channel} channel of layer {layer} is already bound")]
    AlreadyBound {
        layer: LayerId,
        channel: TransformChannel,
    },
    #[error("layer {layer} was rejected by the animation backend: {reason}")]
    Rejected { layer: LayerId, reason: String },
}

impl SetupError {
    pub fn layer(&self) -> LayerId {
        match self {
            SetupError::UnsupportedChannel { layer, .. }
            | SetupError::AlreadyBound { layer, .. }
            | SetupError::Rejected { layer, .. } => *layer,
        }
    }
}

/// Failure to turn a decoded document into a layer tree.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("invalid frame rate {0}")]
    InvalidFrameRate(f32),
    #[error("precomposition asset `{0}` not found")]
    MissingAsset(String),
    #[error("precomposition `{0}` contains itself")]
    RecursivePrecomp(String),
    #[error("layer {0} has a cyclic parent chain")]
    ParentCycle(u32),
    #[error("composition needs more than {0} layers")]
    LayerLimit(usize),
}

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Setup(#[from] SetupError),
}
