//! The layer composition tree.
//!
//! Layers are built in the [`Constructed`] state and become [`Animating`] by
//! consuming themselves in [`LayerSetup::setup_animations`]. A layer can therefore
//! not install its animations twice.

mod precomp;
mod repeater;
mod shape;

pub use precomp::PreCompLayer;
pub use repeater::{Repeater, RepeaterLayer, RepeaterTransform};
pub use shape::ShapeLayer;

use crate::context::LayerAnimationContext;
use crate::error::SetupError;
use crate::transform::TransformModel;
use std::any::{self, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

mod private {
    pub trait Sealed {}
}

pub trait LayerState: private::Sealed + fmt::Debug + Send + Sync + 'static {}

/// Built from the document; no animations installed.
#[derive(Debug, Clone, Copy)]
pub struct Constructed;

/// Animations installed (or frozen as a static fallback).
#[derive(Debug, Clone, Copy)]
pub struct Animating;

impl private::Sealed for Constructed {}
impl private::Sealed for Animating {}
impl LayerState for Constructed {}
impl LayerState for Animating {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u32);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Animation setup shared by every layer kind.
pub trait LayerSetup: Sized {
    type Animating;

    /// Installs this layer's and its descendants' animations, children first.
    /// May leave partial bindings behind on error; callers go through
    /// [`setup_animations`](LayerSetup::setup_animations).
    fn install(&self, ctx: &mut LayerAnimationContext<'_>) -> Result<(), SetupError>;

    fn layer_ids(&self) -> Vec<LayerId>;

    fn into_animating(self) -> Self::Animating;

    /// Installs every animation of the subtree, or none of them.
    fn setup_animations(self, ctx: &mut LayerAnimationContext<'_>) -> Result<Self::Animating, SetupError> {
        if let Err(err) = self.install(ctx) {
            ctx.rollback(self.layer_ids());
            return Err(err);
        }
        Ok(self.into_animating())
    }
}

/// Platform-driven duplication of a layer object.
///
/// The copy shares the source's transform model. The source arrives untyped;
/// handing in an object of another type is a caller bug and panics.
pub trait ShadowCopy: Sized + Any {
    fn shadow_copy(source: &dyn Any) -> Self;
}

pub(crate) fn expect_source<T: Any>(source: &dyn Any) -> &T {
    source.downcast_ref::<T>().unwrap_or_else(|| {
        panic!(
            "{}::shadow_copy incorrectly called with {:?}",
            any::type_name::<T>(),
            source.type_id()
        )
    })
}

/// State every layer kind carries: identity, transform, visibility and children.
#[derive(Debug)]
pub struct BaseLayer<S: LayerState = Constructed> {
    id: LayerId,
    name: Option<String>,
    transform: Arc<dyn TransformModel>,
    visibility: Option<(f32, f32)>,
    children: Vec<AnimationLayer<S>>,
    frozen_at: Option<f32>,
    state: PhantomData<S>,
}

impl<S: LayerState> BaseLayer<S> {
    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn transform(&self) -> &Arc<dyn TransformModel> {
        &self.transform
    }

    pub fn children(&self) -> &[AnimationLayer<S>] {
        &self.children
    }

    /// `[in, out)` range in the parent's time, if the layer is not always visible.
    pub fn visibility(&self) -> Option<(f32, f32)> {
        self.visibility
    }

    pub fn is_visible_at(&self, frame: f32) -> bool {
        self.visibility
            .map_or(true, |(in_frame, out_frame)| frame >= in_frame && frame < out_frame)
    }

    /// Composition frame a static fallback branch is pinned to.
    pub fn frozen_at(&self) -> Option<f32> {
        self.frozen_at
    }

    /// Ids of this layer and every descendant, depth first.
    pub fn subtree_ids(&self) -> Vec<LayerId> {
        let mut ids = Vec::new();
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids(&self, out: &mut Vec<LayerId>) {
        out.push(self.id);
        for child in &self.children {
            child.base().collect_ids(out);
        }
    }

    pub(crate) fn transition<T: LayerState>(self, frozen_at: Option<f32>) -> BaseLayer<T> {
        BaseLayer {
            id: self.id,
            name: self.name,
            transform: self.transform,
            visibility: self.visibility,
            children: self
                .children
                .into_iter()
                .map(|child| child.transition(frozen_at))
                .collect(),
            frozen_at: frozen_at.or(self.frozen_at),
            state: PhantomData,
        }
    }
}

impl BaseLayer<Constructed> {
    pub fn new(id: LayerId, transform: Arc<dyn TransformModel>) -> Self {
        Self {
            id,
            name: None,
            transform,
            visibility: None,
            children: Vec::new(),
            frozen_at: None,
            state: PhantomData,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_visibility(mut self, in_frame: f32, out_frame: f32) -> Self {
        self.visibility = Some((in_frame, out_frame));
        self
    }

    pub fn with_child(mut self, child: impl Into<AnimationLayer>) -> Self {
        self.add_child(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = AnimationLayer>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn add_child(&mut self, child: impl Into<AnimationLayer>) {
        self.children.push(child.into());
    }

    pub(crate) fn install_children(&self, ctx: &mut LayerAnimationContext<'_>) -> Result<(), SetupError> {
        for child in &self.children {
            child.install(ctx)?;
        }
        Ok(())
    }

    pub(crate) fn install_own(&self, ctx: &mut LayerAnimationContext<'_>) -> Result<(), SetupError> {
        ctx.add_transform_animations(self.id, self.transform.as_ref())
    }
}

impl LayerSetup for BaseLayer<Constructed> {
    type Animating = BaseLayer<Animating>;

    fn install(&self, ctx: &mut LayerAnimationContext<'_>) -> Result<(), SetupError> {
        self.install_children(ctx)?;
        self.install_own(ctx)
    }

    fn layer_ids(&self) -> Vec<LayerId> {
        self.subtree_ids()
    }

    fn into_animating(self) -> BaseLayer<Animating> {
        self.transition(None)
    }
}

impl<S: LayerState> ShadowCopy for BaseLayer<S> {
    fn shadow_copy(source: &dyn Any) -> Self {
        let typed = expect_source::<Self>(source);
        Self {
            id: typed.id,
            name: typed.name.clone(),
            transform: Arc::clone(&typed.transform),
            visibility: typed.visibility,
            children: typed
                .children
                .iter()
                .map(|child| AnimationLayer::shadow_copy(child))
                .collect(),
            frozen_at: typed.frozen_at,
            state: PhantomData,
        }
    }
}

/// Any node of the composition tree.
#[derive(Debug)]
pub enum AnimationLayer<S: LayerState = Constructed> {
    /// Null layers and parent wrappers: a transform with children, no content.
    Transform(BaseLayer<S>),
    Shape(ShapeLayer<S>),
    PreComp(PreCompLayer<S>),
    Repeater(RepeaterLayer<S>),
}

impl<S: LayerState> AnimationLayer<S> {
    pub fn base(&self) -> &BaseLayer<S> {
        match self {
            AnimationLayer::Transform(base) => base,
            AnimationLayer::Shape(layer) => layer.base(),
            AnimationLayer::PreComp(layer) => layer.base(),
            AnimationLayer::Repeater(layer) => layer.base(),
        }
    }

    pub fn id(&self) -> LayerId {
        self.base().id()
    }

    pub fn name(&self) -> Option<&str> {
        self.base().name()
    }

    pub fn children(&self) -> &[AnimationLayer<S>] {
        self.base().children()
    }

    /// Number of layers in this subtree, including this one.
    pub fn layer_count(&self) -> usize {
        1 + self.children().iter().map(AnimationLayer::layer_count).sum::<usize>()
    }

    pub fn subtree_ids(&self) -> Vec<LayerId> {
        self.base().subtree_ids()
    }

    pub(crate) fn transition<T: LayerState>(self, frozen_at: Option<f32>) -> AnimationLayer<T> {
        match self {
            AnimationLayer::Transform(base) => AnimationLayer::Transform(base.transition(frozen_at)),
            AnimationLayer::Shape(layer) => AnimationLayer::Shape(layer.transition(frozen_at)),
            AnimationLayer::PreComp(layer) => AnimationLayer::PreComp(layer.transition(frozen_at)),
            AnimationLayer::Repeater(layer) => AnimationLayer::Repeater(layer.transition(frozen_at)),
        }
    }
}

impl AnimationLayer<Constructed> {
    /// Skips animation setup and pins the subtree to `frame`.
    pub fn into_static(self, frame: f32) -> AnimationLayer<Animating> {
        self.transition(Some(frame))
    }
}

impl LayerSetup for AnimationLayer<Constructed> {
    type Animating = AnimationLayer<Animating>;

    fn install(&self, ctx: &mut LayerAnimationContext<'_>) -> Result<(), SetupError> {
        match self {
            AnimationLayer::Transform(base) => base.install(ctx),
            AnimationLayer::Shape(layer) => layer.install(ctx),
            AnimationLayer::PreComp(layer) => layer.install(ctx),
            AnimationLayer::Repeater(layer) => layer.install(ctx),
        }
    }

    fn layer_ids(&self) -> Vec<LayerId> {
        self.subtree_ids()
    }

    fn into_animating(self) -> AnimationLayer<Animating> {
        self.transition(None)
    }
}

impl<S: LayerState> ShadowCopy for AnimationLayer<S> {
    fn shadow_copy(source: &dyn Any) -> Self {
        match expect_source::<Self>(source) {
            AnimationLayer::Transform(base) => AnimationLayer::Transform(BaseLayer::shadow_copy(base)),
            AnimationLayer::Shape(layer) => AnimationLayer::Shape(ShapeLayer::shadow_copy(layer)),
            AnimationLayer::PreComp(layer) => AnimationLayer::PreComp(PreCompLayer::shadow_copy(layer)),
            AnimationLayer::Repeater(layer) => AnimationLayer::Repeater(RepeaterLayer::shadow_copy(layer)),
        }
    }
}

impl<S: LayerState> From<BaseLayer<S>> for AnimationLayer<S> {
    fn from(layer: BaseLayer<S>) -> Self {
        AnimationLayer::Transform(layer)
    }
}

impl<S: LayerState> From<ShapeLayer<S>> for AnimationLayer<S> {
    fn from(layer: ShapeLayer<S>) -> Self {
        AnimationLayer::Shape(layer)
    }
}

impl<S: LayerState> From<PreCompLayer<S>> for AnimationLayer<S> {
    fn from(layer: PreCompLayer<S>) -> Self {
        AnimationLayer::PreComp(layer)
    }
}

impl<S: LayerState> From<RepeaterLayer<S>> for AnimationLayer<S> {
    fn from(layer: RepeaterLayer<S>) -> Self {
        AnimationLayer::Repeater(layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animatable::{Keyframe, KeyframeGroup};
    use crate::context::{RecordingBackend, TransformChannel};
    use crate::transform::LayerTransform;

    fn transform_layer(id: u32) -> BaseLayer {
        BaseLayer::new(LayerId(id), Arc::new(LayerTransform::identity()))
    }

    fn spinning(id: u32) -> BaseLayer {
        let rotation = KeyframeGroup::new(vec![Keyframe::new(0.0, 0.0), Keyframe::new(10.0, 360.0)]).unwrap();
        BaseLayer::new(LayerId(id), Arc::new(LayerTransform::identity().with_rotation(rotation)))
    }

    #[test]
    fn test_setup_binds_children_and_self() {
        let root = transform_layer(1).with_child(transform_layer(2)).with_child(spinning(3));
        let mut backend = RecordingBackend::new();
        let animating = {
            let mut ctx = LayerAnimationContext::new(&mut backend, 30.0, 0.0, 10.0);
            root.setup_animations(&mut ctx).unwrap()
        };

        assert_eq!(animating.children().len(), 2);
        assert_eq!(backend.bound_layer_count(), 3);
        assert!(backend.binding(LayerId(3), TransformChannel::Rotation).is_some());
        assert!(backend.binding(LayerId(2), TransformChannel::Rotation).is_none());
    }

    #[test]
    fn test_failed_setup_rolls_back_whole_subtree() {
        let root = transform_layer(1).with_child(transform_layer(2)).with_child(spinning(3));
        let mut backend = RecordingBackend::new().with_unsupported_channel(TransformChannel::Rotation);
        let result = {
            let mut ctx = LayerAnimationContext::new(&mut backend, 30.0, 0.0, 10.0);
            root.setup_animations(&mut ctx)
        };

        assert!(matches!(
            result,
            Err(SetupError::UnsupportedChannel { layer: LayerId(3), .. })
        ));
        assert_eq!(backend.bound_layer_count(), 0);
    }

    #[test]
    fn test_shadow_copy_shares_transform() {
        let layer: AnimationLayer = transform_layer(1).with_child(spinning(2)).into();
        let copy: AnimationLayer = AnimationLayer::shadow_copy(&layer);

        assert_eq!(copy.id(), layer.id());
        assert_eq!(copy.layer_count(), 2);
        assert!(Arc::ptr_eq(copy.base().transform(), layer.base().transform()));
        assert!(Arc::ptr_eq(
            copy.children()[0].base().transform(),
            layer.children()[0].base().transform()
        ));
    }

    #[test]
    #[should_panic(expected = "shadow_copy incorrectly called")]
    fn test_shadow_copy_panics_on_foreign_source() {
        let _ = BaseLayer::<Constructed>::shadow_copy(&"not a layer");
    }

    #[test]
    fn test_into_static_freezes_subtree() {
        let layer: AnimationLayer = transform_layer(1).with_child(spinning(2)).into();
        let frozen = layer.into_static(12.0);
        assert_eq!(frozen.base().frozen_at(), Some(12.0));
        assert_eq!(frozen.children()[0].base().frozen_at(), Some(12.0));
    }

    #[test]
    fn test_visibility_is_half_open() {
        let layer = transform_layer(1).with_visibility(10.0, 20.0);
        assert!(!layer.is_visible_at(9.9));
        assert!(layer.is_visible_at(10.0));
        assert!(layer.is_visible_at(19.9));
        assert!(!layer.is_visible_at(20.0));
    }
}
