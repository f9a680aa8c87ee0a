//! The root of a built composition.

use crate::config::FallbackPolicy;
use crate::context::LayerAnimationContext;
use crate::error::SetupError;
use crate::layers::{AnimationLayer, Animating, Constructed, LayerId, LayerSetup, LayerState};
use crate::renderer::{NodeContent, RenderNode, RenderTree};
use crate::transform::resolve_transform;
use glam::Mat4;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct LayerTree<S: LayerState = Constructed> {
    layers: Vec<AnimationLayer<S>>,
    width: u32,
    height: u32,
    frame_rate: f32,
    in_frame: f32,
    out_frame: f32,
}

impl<S: LayerState> LayerTree<S> {
    /// Top-level layers, bottom-most first.
    pub fn layers(&self) -> &[AnimationLayer<S>] {
        &self.layers
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    pub fn in_frame(&self) -> f32 {
        self.in_frame
    }

    pub fn out_frame(&self) -> f32 {
        self.out_frame
    }

    pub fn layer_count(&self) -> usize {
        self.layers.iter().map(AnimationLayer::layer_count).sum()
    }

    pub fn layer_ids(&self) -> Vec<LayerId> {
        self.layers.iter().flat_map(AnimationLayer::subtree_ids).collect()
    }
}

impl LayerTree<Constructed> {
    pub fn new(
        layers: Vec<AnimationLayer>,
        width: u32,
        height: u32,
        frame_rate: f32,
        in_frame: f32,
        out_frame: f32,
    ) -> Self {
        Self {
            layers,
            width,
            height,
            frame_rate,
            in_frame,
            out_frame,
        }
    }

    /// Installs animations branch by branch.
    ///
    /// A failed branch never stays partially bound. With [`FallbackPolicy::Abort`]
    /// every branch installed so far is rolled back too and the error returned;
    /// with [`FallbackPolicy::StaticFallback`] the branch is kept, frozen at the
    /// context's start frame.
    pub fn setup_animations(
        self,
        ctx: &mut LayerAnimationContext<'_>,
        policy: FallbackPolicy,
    ) -> Result<LayerTree<Animating>, SetupError> {
        let mut installed: Vec<LayerId> = Vec::new();
        let mut layers = Vec::with_capacity(self.layers.len());

        for layer in self.layers {
            match layer.install(ctx) {
                Ok(()) => {
                    installed.extend(layer.subtree_ids());
                    layers.push(layer.into_animating());
                }
                Err(err) => {
                    ctx.rollback(layer.subtree_ids());
                    match policy {
                        FallbackPolicy::Abort => {
                            ctx.rollback(installed);
                            return Err(err);
                        }
                        FallbackPolicy::StaticFallback => {
                            warn!(layer = %layer.id(), error = %err, "animations unavailable, rendering branch statically");
                            layers.push(layer.into_static(ctx.start_frame));
                        }
                    }
                }
            }
        }

        debug!(layers = installed.len(), "installed layer animations");
        Ok(LayerTree {
            layers,
            width: self.width,
            height: self.height,
            frame_rate: self.frame_rate,
            in_frame: self.in_frame,
            out_frame: self.out_frame,
        })
    }
}

impl LayerTree<Animating> {
    /// Samples every layer at composition `frame`.
    pub fn render_tree(&self, frame: f32) -> RenderTree {
        let nodes = self
            .layers
            .iter()
            .filter_map(|layer| {
                let frozen = layer.base().frozen_at();
                render_layer(layer, frozen.unwrap_or(frame), frozen.is_some())
            })
            .collect();

        RenderTree {
            width: self.width,
            height: self.height,
            frame,
            root: RenderNode {
                id: None,
                name: None,
                transform: Mat4::IDENTITY,
                opacity: 1.0,
                content: NodeContent::Group(nodes),
                is_static: false,
            },
        }
    }
}

/// `frame` is in the time of the layer's parent.
fn render_layer(layer: &AnimationLayer<Animating>, frame: f32, is_static: bool) -> Option<RenderNode> {
    let base = layer.base();
    if !base.is_visible_at(frame) {
        return None;
    }
    let resolved = resolve_transform(base.transform().as_ref(), frame);

    let content = match layer {
        AnimationLayer::Shape(shape) if !shape.items().is_empty() => NodeContent::Shapes {
            items: shape.items().clone(),
            frame,
        },
        _ => {
            let child_frame = match layer {
                AnimationLayer::PreComp(precomp) => precomp.time_step().apply(frame),
                _ => frame,
            };
            NodeContent::Group(
                base.children()
                    .iter()
                    .filter_map(|child| render_layer(child, child_frame, is_static))
                    .collect(),
            )
        }
    };

    Some(RenderNode {
        id: Some(base.id()),
        name: base.name().map(str::to_string),
        transform: resolved.to_mat4(),
        opacity: resolved.opacity,
        content,
        is_static,
    })
}
