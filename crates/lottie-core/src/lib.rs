//! Animation core: keyframed values, transform models, the layer composition tree
//! and its repeater copies, and animation setup against a render backend.

pub mod animatable;
pub mod builder;
pub mod config;
pub mod context;
pub mod error;
pub mod layers;
pub mod renderer;
pub mod time;
pub mod transform;
pub mod tree;

pub use animatable::{InterpolationCurve, Keyframe, KeyframeGroup};
pub use builder::CompositionBuilder;
pub use config::{BuildOptions, FallbackPolicy};
pub use context::{AnimationBackend, LayerAnimationContext, RecordingBackend, TransformChannel};
pub use error::{BuildError, KeyframeError, PlayerError, SetupError};
pub use layers::{AnimationLayer, Animating, Constructed, LayerId, LayerSetup, ShadowCopy};
pub use renderer::{NodeContent, RenderNode, RenderTree};
pub use transform::{resolve_transform, TransformModel};
pub use tree::LayerTree;

use lottie_data::model::LottieJson;
use tracing::debug;

/// Loads documents into an animated layer tree and drives playback.
pub struct LottiePlayer<B: AnimationBackend = RecordingBackend> {
    tree: Option<LayerTree<Animating>>,
    backend: B,
    options: BuildOptions,
    pub current_frame: f32,
}

impl LottiePlayer {
    pub fn new() -> Self {
        Self::with_backend(RecordingBackend::new(), BuildOptions::default())
    }
}

impl Default for LottiePlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: AnimationBackend> LottiePlayer<B> {
    pub fn with_backend(backend: B, options: BuildOptions) -> Self {
        Self {
            tree: None,
            backend,
            options,
            current_frame: 0.0,
        }
    }

    /// Builds `model` and installs its animations, replacing any loaded tree.
    ///
    /// A document that fails to build leaves the current tree in place. A failed
    /// setup leaves the player empty.
    pub fn load(&mut self, model: &LottieJson) -> Result<(), PlayerError> {
        let tree = CompositionBuilder::new(model, &self.options).build()?;

        if let Some(previous) = self.tree.take() {
            for id in previous.layer_ids() {
                self.backend.unbind_layer(id);
            }
        }

        let mut ctx = LayerAnimationContext::new(
            &mut self.backend,
            tree.frame_rate(),
            tree.in_frame(),
            tree.out_frame(),
        );
        let tree = tree.setup_animations(&mut ctx, self.options.fallback)?;
        debug!(layers = tree.layer_count(), "loaded composition");

        self.current_frame = tree.in_frame();
        self.tree = Some(tree);
        Ok(())
    }

    /// Moves playback forward by `dt` seconds, looping back to the in frame.
    pub fn advance(&mut self, dt: f32) {
        let Some(tree) = &self.tree else {
            return;
        };
        self.current_frame += dt * tree.frame_rate();

        let (in_frame, out_frame) = (tree.in_frame(), tree.out_frame());
        if self.current_frame >= out_frame {
            let duration = out_frame - in_frame;
            self.current_frame = if duration > 0.0 {
                in_frame + (self.current_frame - out_frame) % duration
            } else {
                in_frame
            };
        }
    }

    pub fn render_tree(&self) -> Option<RenderTree> {
        self.tree.as_ref().map(|tree| tree.render_tree(self.current_frame))
    }

    pub fn tree(&self) -> Option<&LayerTree<Animating>> {
        self.tree.as_ref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }
}
