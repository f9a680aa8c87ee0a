//! The transform capability shared by layers, shape groups and repeater copies,
//! and its resolution to a concrete affine transform.

use crate::animatable::KeyframeGroup;
use glam::{Mat4, Vec3, Vec4};
use lottie_data::model::{self as data, Property};
use std::fmt;
use std::sync::Arc;

/// Anything that describes anchor, position, scale and rotation as animated
/// properties.
///
/// Exactly one position representation is populated: either combined
/// [`position`](TransformModel::position) or split
/// [`position_x`](TransformModel::position_x) / [`position_y`](TransformModel::position_y).
/// Consumers check combined first and fall back to split.
///
/// Units follow the document: scale and opacity in percent, angles in degrees.
pub trait TransformModel: fmt::Debug + Send + Sync {
    fn anchor_point(&self) -> &KeyframeGroup<Vec3>;
    fn position(&self) -> Option<&KeyframeGroup<Vec3>>;
    fn position_x(&self) -> Option<&KeyframeGroup<f32>>;
    fn position_y(&self) -> Option<&KeyframeGroup<f32>>;
    fn scale(&self) -> &KeyframeGroup<Vec3>;
    fn rotation(&self) -> Option<&KeyframeGroup<f32>>;

    fn skew(&self) -> Option<&KeyframeGroup<f32>> {
        None
    }

    fn skew_axis(&self) -> Option<&KeyframeGroup<f32>> {
        None
    }

    fn opacity(&self) -> Option<&KeyframeGroup<f32>> {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PositionModel {
    Combined(KeyframeGroup<Vec3>),
    Split {
        x: KeyframeGroup<f32>,
        y: KeyframeGroup<f32>,
    },
}

/// Full layer or shape-group transform.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerTransform {
    anchor_point: KeyframeGroup<Vec3>,
    position: PositionModel,
    scale: KeyframeGroup<Vec3>,
    rotation: Option<KeyframeGroup<f32>>,
    skew: Option<KeyframeGroup<f32>>,
    skew_axis: Option<KeyframeGroup<f32>>,
    opacity: Option<KeyframeGroup<f32>>,
}

impl LayerTransform {
    pub fn new(
        anchor_point: KeyframeGroup<Vec3>,
        position: PositionModel,
        scale: KeyframeGroup<Vec3>,
    ) -> Self {
        Self {
            anchor_point,
            position,
            scale,
            rotation: None,
            skew: None,
            skew_axis: None,
            opacity: None,
        }
    }

    pub fn identity() -> Self {
        Self::new(
            KeyframeGroup::constant(Vec3::ZERO),
            PositionModel::Combined(KeyframeGroup::constant(Vec3::ZERO)),
            KeyframeGroup::constant(Vec3::splat(100.0)),
        )
    }

    pub fn with_rotation(mut self, rotation: KeyframeGroup<f32>) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn with_skew(mut self, skew: KeyframeGroup<f32>, axis: KeyframeGroup<f32>) -> Self {
        self.skew = Some(skew);
        self.skew_axis = Some(axis);
        self
    }

    pub fn with_opacity(mut self, opacity: KeyframeGroup<f32>) -> Self {
        self.opacity = Some(opacity);
        self
    }

    /// Builds the transform of a layer (`ks`) or shape group (`tr`).
    ///
    /// Properties the document leaves out are treated as absent rather than
    /// defaulted, so they bind no animation channel. A split position's z axis is
    /// not carried.
    pub fn from_data(t: &data::Transform) -> Self {
        let position = match &t.p {
            data::PositionProperty::Unified(p) => {
                PositionModel::Combined(KeyframeGroup::from_property(p, |v| Vec3::from(v.0), Vec3::ZERO))
            }
            data::PositionProperty::Split { x, y, .. } => PositionModel::Split {
                x: KeyframeGroup::from_property(x, |v| *v, 0.0),
                y: KeyframeGroup::from_property(y, |v| *v, 0.0),
            },
        };

        let skew = optional_scalar(&t.sk);
        let skew_axis = skew
            .as_ref()
            .map(|_| KeyframeGroup::from_property(&t.sa, |v| *v, 0.0));

        Self {
            anchor_point: KeyframeGroup::from_property(&t.a, |v| Vec3::from(v.0), Vec3::ZERO),
            position,
            scale: KeyframeGroup::from_property(&t.s, |v| Vec3::from(v.0), Vec3::splat(100.0)),
            rotation: optional_scalar(&t.rz),
            skew,
            skew_axis,
            opacity: optional_scalar(&t.o),
        }
    }
}

pub(crate) fn optional_scalar(prop: &Property<f32>) -> Option<KeyframeGroup<f32>> {
    if prop.is_default() {
        None
    } else {
        Some(KeyframeGroup::from_property(prop, |v| *v, 0.0))
    }
}

impl TransformModel for LayerTransform {
    fn anchor_point(&self) -> &KeyframeGroup<Vec3> {
        &self.anchor_point
    }

    fn position(&self) -> Option<&KeyframeGroup<Vec3>> {
        match &self.position {
            PositionModel::Combined(p) => Some(p),
            PositionModel::Split { .. } => None,
        }
    }

    fn position_x(&self) -> Option<&KeyframeGroup<f32>> {
        match &self.position {
            PositionModel::Split { x, .. } => Some(x),
            PositionModel::Combined(_) => None,
        }
    }

    fn position_y(&self) -> Option<&KeyframeGroup<f32>> {
        match &self.position {
            PositionModel::Split { y, .. } => Some(y),
            PositionModel::Combined(_) => None,
        }
    }

    fn scale(&self) -> &KeyframeGroup<Vec3> {
        &self.scale
    }

    fn rotation(&self) -> Option<&KeyframeGroup<f32>> {
        self.rotation.as_ref()
    }

    fn skew(&self) -> Option<&KeyframeGroup<f32>> {
        self.skew.as_ref()
    }

    fn skew_axis(&self) -> Option<&KeyframeGroup<f32>> {
        self.skew_axis.as_ref()
    }

    fn opacity(&self) -> Option<&KeyframeGroup<f32>> {
        self.opacity.as_ref()
    }
}

/// A parent layer's transform as its children inherit it: everything but
/// opacity, which stays on the parent itself.
#[derive(Debug, Clone)]
pub struct ParentTransform(Arc<dyn TransformModel>);

impl ParentTransform {
    pub fn new(parent: Arc<dyn TransformModel>) -> Self {
        Self(parent)
    }

    pub fn parent(&self) -> &Arc<dyn TransformModel> {
        &self.0
    }
}

impl TransformModel for ParentTransform {
    fn anchor_point(&self) -> &KeyframeGroup<Vec3> {
        self.0.anchor_point()
    }

    fn position(&self) -> Option<&KeyframeGroup<Vec3>> {
        self.0.position()
    }

    fn position_x(&self) -> Option<&KeyframeGroup<f32>> {
        self.0.position_x()
    }

    fn position_y(&self) -> Option<&KeyframeGroup<f32>> {
        self.0.position_y()
    }

    fn scale(&self) -> &KeyframeGroup<Vec3> {
        self.0.scale()
    }

    fn rotation(&self) -> Option<&KeyframeGroup<f32>> {
        self.0.rotation()
    }

    fn skew(&self) -> Option<&KeyframeGroup<f32>> {
        self.0.skew()
    }

    fn skew_axis(&self) -> Option<&KeyframeGroup<f32>> {
        self.0.skew_axis()
    }
}

/// A transform model sampled at one frame. Scale and opacity are fractions,
/// angles are radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTransform {
    pub anchor: Vec3,
    pub position: Vec3,
    pub scale: Vec3,
    pub rotation: f32,
    pub skew: f32,
    pub skew_axis: f32,
    pub opacity: f32,
}

impl Default for ResolvedTransform {
    fn default() -> Self {
        Self {
            anchor: Vec3::ZERO,
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: 0.0,
            skew: 0.0,
            skew_axis: 0.0,
            opacity: 1.0,
        }
    }
}

impl ResolvedTransform {
    pub fn to_mat4(&self) -> Mat4 {
        let mat_t = Mat4::from_translation(self.position);
        // Lottie rotates clockwise for positive angles
        let mat_r = Mat4::from_rotation_z(-self.rotation);
        let mat_s = Mat4::from_scale(self.scale);
        let mat_a = Mat4::from_translation(-self.anchor);

        mat_t * mat_r * self.skew_matrix() * mat_s * mat_a
    }

    fn skew_matrix(&self) -> Mat4 {
        if self.skew == 0.0 {
            return Mat4::IDENTITY;
        }
        let shear = Mat4::from_cols(
            Vec4::new(1.0, 0.0, 0.0, 0.0),
            Vec4::new(self.skew.tan(), 1.0, 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0, 0.0),
            Vec4::new(0.0, 0.0, 0.0, 1.0),
        );
        if self.skew_axis == 0.0 {
            return shear;
        }
        Mat4::from_rotation_z(self.skew_axis) * shear * Mat4::from_rotation_z(-self.skew_axis)
    }
}

/// Samples `model` at `frame`.
///
/// Combined position wins; otherwise the split axes are used with zero for any
/// missing axis. A missing rotation is the identity rotation.
pub fn resolve_transform(model: &dyn TransformModel, frame: f32) -> ResolvedTransform {
    let position = match model.position() {
        Some(p) => p.value_at(frame),
        None => Vec3::new(
            model.position_x().map_or(0.0, |x| x.value_at(frame)),
            model.position_y().map_or(0.0, |y| y.value_at(frame)),
            0.0,
        ),
    };

    ResolvedTransform {
        anchor: model.anchor_point().value_at(frame),
        position,
        scale: model.scale().value_at(frame) / 100.0,
        rotation: model
            .rotation()
            .map_or(0.0, |r| r.value_at(frame).to_radians()),
        skew: model.skew().map_or(0.0, |s| s.value_at(frame).to_radians()),
        skew_axis: model
            .skew_axis()
            .map_or(0.0, |s| s.value_at(frame).to_radians()),
        opacity: model.opacity().map_or(1.0, |o| o.value_at(frame) / 100.0),
    }
}
