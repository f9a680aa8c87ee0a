//! Repeated copies of shape content.
//!
//! A repeater with `n` copies becomes `n` [`RepeaterLayer`]s. Copy `i` carries a
//! [`RepeaterTransform`] whose position and rotation are the repeater's offsets
//! multiplied by `i`, so copy 0 is left untransformed.

use super::{expect_source, AnimationLayer, Animating, BaseLayer, Constructed, LayerId, LayerSetup, LayerState, ShadowCopy};
use crate::animatable::KeyframeGroup;
use crate::context::LayerAnimationContext;
use crate::error::SetupError;
use crate::transform::{optional_scalar, TransformModel};
use glam::Vec3;
use lottie_data::model::{self as data, Value};
use std::any::Any;
use std::sync::Arc;

/// Repeater settings decoded from a repeater shape item.
#[derive(Debug, Clone, PartialEq)]
pub struct Repeater {
    pub copies: usize,
    pub anchor_point: KeyframeGroup<Vec3>,
    pub position: Option<KeyframeGroup<Vec3>>,
    pub rotation: Option<KeyframeGroup<f32>>,
    pub scale: KeyframeGroup<Vec3>,
    /// Percent.
    pub start_opacity: f32,
    /// Percent.
    pub end_opacity: f32,
    /// Later copies are drawn below earlier ones.
    pub composite_below: bool,
}

impl Repeater {
    pub fn new(copies: usize) -> Self {
        Self {
            copies,
            anchor_point: KeyframeGroup::constant(Vec3::ZERO),
            position: None,
            rotation: None,
            scale: KeyframeGroup::constant(Vec3::splat(100.0)),
            start_opacity: 100.0,
            end_opacity: 100.0,
            composite_below: false,
        }
    }

    pub fn with_position(mut self, position: KeyframeGroup<Vec3>) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_rotation(mut self, rotation: KeyframeGroup<f32>) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn with_opacity(mut self, start: f32, end: f32) -> Self {
        self.start_opacity = start;
        self.end_opacity = end;
        self
    }

    /// Decodes a repeater shape item, clamping the copy count to `max_copies`.
    pub fn from_shape(shape: &data::RepeaterShape, max_copies: usize) -> Self {
        let t = &shape.tr.t;

        let position = match &t.p {
            data::PositionProperty::Unified(p) if p.is_default() => None,
            data::PositionProperty::Unified(p) => Some(KeyframeGroup::from_property(
                p,
                |v| Vec3::from(v.0),
                Vec3::ZERO,
            )),
            data::PositionProperty::Split { x, y, .. } => {
                let x = KeyframeGroup::from_property(x, |v| *v, 0.0);
                let y = KeyframeGroup::from_property(y, |v| *v, 0.0);
                Some(KeyframeGroup::from_axes(&x, &y, None))
            }
        };

        let copies = first_scalar(&shape.c).unwrap_or(1.0).round().max(0.0) as usize;

        Self {
            copies: copies.min(max_copies),
            anchor_point: KeyframeGroup::from_property(&t.a, |v| Vec3::from(v.0), Vec3::ZERO),
            position,
            rotation: optional_scalar(&t.rz),
            scale: KeyframeGroup::from_property(&t.s, |v| Vec3::from(v.0), Vec3::splat(100.0)),
            start_opacity: first_scalar(&shape.tr.so).unwrap_or(100.0),
            end_opacity: first_scalar(&shape.tr.eo).unwrap_or(100.0),
            composite_below: shape.m == 2,
        }
    }

    /// Opacity of copy `index` in percent, interpolated from start to end across
    /// the copies.
    pub fn opacity_for_copy(&self, index: usize) -> f32 {
        if self.copies <= 1 {
            return self.start_opacity;
        }
        let t = index as f32 / (self.copies - 1) as f32;
        self.start_opacity + (self.end_opacity - self.start_opacity) * t
    }
}

fn first_scalar(prop: &data::Property<f32>) -> Option<f32> {
    match &prop.k {
        Value::Default => None,
        Value::Static(v) => Some(*v),
        Value::Animated(keyframes) => keyframes.first().and_then(|kf| kf.s),
    }
}

/// The transform of one repeated copy.
#[derive(Debug, Clone, PartialEq)]
pub struct RepeaterTransform {
    anchor_point: KeyframeGroup<Vec3>,
    position: Option<KeyframeGroup<Vec3>>,
    rotation: Option<KeyframeGroup<f32>>,
    scale: KeyframeGroup<Vec3>,
    opacity: KeyframeGroup<f32>,
}

impl RepeaterTransform {
    /// Derives the transform of copy `index` (0-based).
    pub fn new(repeater: &Repeater, index: usize) -> Self {
        let factor = index as f32;
        Self {
            anchor_point: repeater.anchor_point.clone(),
            position: repeater.position.as_ref().map(|p| p.scaled(factor)),
            rotation: repeater.rotation.as_ref().map(|r| r.scaled(factor)),
            scale: repeater.scale.clone(),
            opacity: KeyframeGroup::constant(repeater.opacity_for_copy(index)),
        }
    }
}

impl TransformModel for RepeaterTransform {
    fn anchor_point(&self) -> &KeyframeGroup<Vec3> {
        &self.anchor_point
    }

    fn position(&self) -> Option<&KeyframeGroup<Vec3>> {
        self.position.as_ref()
    }

    fn position_x(&self) -> Option<&KeyframeGroup<f32>> {
        None
    }

    fn position_y(&self) -> Option<&KeyframeGroup<f32>> {
        None
    }

    fn scale(&self) -> &KeyframeGroup<Vec3> {
        &self.scale
    }

    fn rotation(&self) -> Option<&KeyframeGroup<f32>> {
        self.rotation.as_ref()
    }

    fn opacity(&self) -> Option<&KeyframeGroup<f32>> {
        Some(&self.opacity)
    }
}

/// One copy of repeated content. Always has exactly one child.
#[derive(Debug)]
pub struct RepeaterLayer<S: LayerState = Constructed> {
    base: BaseLayer<S>,
    repeater_transform: Arc<RepeaterTransform>,
    index: usize,
}

impl<S: LayerState> RepeaterLayer<S> {
    pub fn base(&self) -> &BaseLayer<S> {
        &self.base
    }

    pub fn repeater_transform(&self) -> &Arc<RepeaterTransform> {
        &self.repeater_transform
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn child(&self) -> &AnimationLayer<S> {
        &self.base.children()[0]
    }

    pub(crate) fn transition<T: LayerState>(self, frozen_at: Option<f32>) -> RepeaterLayer<T> {
        RepeaterLayer {
            base: self.base.transition(frozen_at),
            repeater_transform: self.repeater_transform,
            index: self.index,
        }
    }
}

impl RepeaterLayer<Constructed> {
    pub fn new(id: LayerId, repeater: &Repeater, child: impl Into<AnimationLayer>, index: usize) -> Self {
        let repeater_transform = Arc::new(RepeaterTransform::new(repeater, index));
        let shared: Arc<dyn TransformModel> = repeater_transform.clone();
        Self {
            base: BaseLayer::new(id, shared).with_child(child),
            repeater_transform,
            index,
        }
    }
}

impl LayerSetup for RepeaterLayer<Constructed> {
    type Animating = RepeaterLayer<Animating>;

    fn install(&self, ctx: &mut LayerAnimationContext<'_>) -> Result<(), SetupError> {
        self.base.install_children(ctx)?;
        ctx.add_transform_animations(self.base.id(), self.repeater_transform.as_ref())
    }

    fn layer_ids(&self) -> Vec<LayerId> {
        self.base.subtree_ids()
    }

    fn into_animating(self) -> Self::Animating {
        self.transition(None)
    }
}

impl<S: LayerState> ShadowCopy for RepeaterLayer<S> {
    fn shadow_copy(source: &dyn Any) -> Self {
        let typed = expect_source::<Self>(source);
        Self {
            base: BaseLayer::shadow_copy(&typed.base),
            repeater_transform: Arc::clone(&typed.repeater_transform),
            index: typed.index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animatable::Keyframe;
    use crate::context::{RecordingBackend, TransformChannel};
    use crate::layers::ShapeLayer;
    use crate::transform::{resolve_transform, LayerTransform};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    }

    fn leaf(id: u32) -> ShapeLayer {
        ShapeLayer::new(BaseLayer::new(LayerId(id), Arc::new(LayerTransform::identity())), Vec::new())
    }

    fn spinner() -> Repeater {
        let rotation = KeyframeGroup::new(vec![Keyframe::new(0.0, 0.0), Keyframe::new(20.0, 45.0)]).unwrap();
        Repeater::new(4)
            .with_position(KeyframeGroup::constant(Vec3::new(10.0, -4.0, 0.0)))
            .with_rotation(rotation)
    }

    #[test]
    fn test_copies_are_offset_by_index() {
        let repeater = Repeater::new(3).with_position(KeyframeGroup::constant(Vec3::new(10.0, 0.0, 0.0)));
        let xs: Vec<f32> = (0..repeater.copies)
            .map(|i| resolve_transform(&RepeaterTransform::new(&repeater, i), 0.0).position.x)
            .collect();
        assert_eq!(xs, vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn test_rotation_scales_every_keyframe() {
        let repeater = spinner();
        let derived = RepeaterTransform::new(&repeater, 3);
        let source = repeater.rotation.as_ref().unwrap();
        let rotation = derived.rotation().unwrap();

        assert_eq!(rotation.len(), source.len());
        for (derived_kf, source_kf) in rotation.keyframes().iter().zip(source.keyframes()) {
            assert_eq!(derived_kf.time, source_kf.time);
            assert_eq!(derived_kf.value, source_kf.value * 3.0);
        }
    }

    #[test]
    fn test_anchor_and_scale_do_not_depend_on_index() {
        let mut repeater = spinner();
        repeater.anchor_point = KeyframeGroup::constant(Vec3::new(5.0, 5.0, 0.0));
        repeater.scale = KeyframeGroup::constant(Vec3::new(80.0, 120.0, 100.0));

        let first = RepeaterTransform::new(&repeater, 0);
        for index in 1..repeater.copies {
            let copy = RepeaterTransform::new(&repeater, index);
            assert_eq!(copy.anchor_point(), first.anchor_point());
            assert_eq!(copy.scale(), first.scale());
        }
    }

    #[test]
    fn test_first_copy_is_identity_offset() {
        let derived = RepeaterTransform::new(&spinner(), 0);
        for frame in [0.0, 7.5, 20.0] {
            let resolved = resolve_transform(&derived, frame);
            assert_eq!(resolved.position, Vec3::ZERO);
            assert_eq!(resolved.rotation, 0.0);
        }
        assert!(derived.position_x().is_none());
        assert!(derived.position_y().is_none());
    }

    #[test]
    fn test_missing_offsets_stay_absent() {
        let derived = RepeaterTransform::new(&Repeater::new(2), 1);
        assert!(derived.position().is_none());
        assert!(derived.rotation().is_none());
    }

    #[test]
    fn test_opacity_interpolates_across_copies() {
        let repeater = Repeater::new(5).with_opacity(100.0, 20.0);
        assert_eq!(repeater.opacity_for_copy(0), 100.0);
        assert_eq!(repeater.opacity_for_copy(2), 60.0);
        assert_eq!(repeater.opacity_for_copy(4), 20.0);
        assert_eq!(Repeater::new(1).with_opacity(70.0, 0.0).opacity_for_copy(0), 70.0);
    }

    #[test]
    fn test_setup_binds_child_then_copy_channels() {
        init_tracing();
        let layer = RepeaterLayer::new(LayerId(10), &spinner(), leaf(11), 2);
        let mut backend = RecordingBackend::new();
        let animating = {
            let mut ctx = LayerAnimationContext::new(&mut backend, 30.0, 0.0, 20.0);
            layer.setup_animations(&mut ctx).unwrap()
        };

        assert_eq!(animating.index(), 2);
        assert!(backend.is_bound(LayerId(11)));
        let rotation = backend.binding(LayerId(10), TransformChannel::Rotation).unwrap();
        assert_eq!(rotation.scalar_at(20.0), Some(90.0));
        let position = backend.binding(LayerId(10), TransformChannel::Position).unwrap();
        assert_eq!(position.vector_at(0.0), Some(Vec3::new(20.0, -8.0, 0.0)));
        assert!(backend.binding(LayerId(10), TransformChannel::Opacity).is_some());
    }

    #[test]
    fn test_child_failure_leaves_nothing_bound() {
        let layer = RepeaterLayer::new(LayerId(10), &spinner(), leaf(11), 1);
        let mut backend = RecordingBackend::new().with_rejected_layer(LayerId(11));
        let result = {
            let mut ctx = LayerAnimationContext::new(&mut backend, 30.0, 0.0, 20.0);
            layer.setup_animations(&mut ctx)
        };

        let err = result.unwrap_err();
        assert_eq!(err.layer(), LayerId(11));
        assert_eq!(backend.bound_layer_count(), 0);
    }

    #[test]
    fn test_copy_failure_rolls_back_child() {
        let layer = RepeaterLayer::new(LayerId(10), &spinner(), leaf(11), 1);
        let mut backend = RecordingBackend::new().with_rejected_layer(LayerId(10));
        let result = {
            let mut ctx = LayerAnimationContext::new(&mut backend, 30.0, 0.0, 20.0);
            layer.setup_animations(&mut ctx)
        };

        assert!(result.is_err());
        assert!(!backend.is_bound(LayerId(11)));
    }

    #[test]
    fn test_shadow_copy_shares_repeater_transform() {
        let layer = RepeaterLayer::new(LayerId(10), &spinner(), leaf(11), 3);
        let copy = RepeaterLayer::<Constructed>::shadow_copy(&layer);

        assert!(Arc::ptr_eq(copy.repeater_transform(), layer.repeater_transform()));
        assert_eq!(copy.index(), 3);
        assert_eq!(copy.child().id(), LayerId(11));
    }

    #[test]
    #[should_panic(expected = "RepeaterLayer")]
    fn test_shadow_copy_of_other_layer_type_panics() {
        let other = leaf(1);
        let _ = RepeaterLayer::<Constructed>::shadow_copy(&other);
    }

    #[test]
    fn test_from_shape_reads_document_values() {
        let shape: data::RepeaterShape = serde_json::from_value(serde_json::json!({
            "c": { "a": 0, "k": 3.6 },
            "o": { "a": 0, "k": 0 },
            "m": 2,
            "tr": {
                "p": { "a": 0, "k": [12, 0] },
                "r": { "a": 0, "k": 30 },
                "so": { "a": 0, "k": 100 },
                "eo": { "a": 0, "k": 40 }
            }
        }))
        .unwrap();

        let repeater = Repeater::from_shape(&shape, 256);
        assert_eq!(repeater.copies, 4);
        assert!(repeater.composite_below);
        assert_eq!(repeater.position.as_ref().unwrap().value_at(0.0), Vec3::new(12.0, 0.0, 0.0));
        assert_eq!(repeater.rotation.as_ref().unwrap().value_at(0.0), 30.0);
        assert_eq!(repeater.opacity_for_copy(3), 40.0);

        assert_eq!(Repeater::from_shape(&shape, 2).copies, 2);
    }
}
