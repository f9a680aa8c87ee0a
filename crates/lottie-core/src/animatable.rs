//! Typed keyframe groups and the interpolation that samples them.

use crate::error::KeyframeError;
use glam::{Vec2, Vec3, Vec4};
use lottie_data::model::{self as data, Property, Value};
use std::sync::Arc;
use tracing::debug;

pub trait Interpolatable: Sized + Clone {
    fn lerp(&self, other: &Self, t: f32) -> Self;

    fn lerp_spatial(&self, other: &Self, t: f32, _tangents: Option<&SpatialTangents>) -> Self {
        self.lerp(other, t)
    }
}

/// Values that a repeater can multiply by a copy index.
pub trait Scalable {
    fn scaled_by(&self, factor: f32) -> Self;
}

impl Interpolatable for f32 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Scalable for f32 {
    fn scaled_by(&self, factor: f32) -> Self {
        self * factor
    }
}

impl Interpolatable for Vec2 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Vec2::lerp(*self, *other, t)
    }

    fn lerp_spatial(&self, other: &Self, t: f32, tangents: Option<&SpatialTangents>) -> Self {
        match tangents {
            Some(tan) => {
                let p = cubic_point(
                    self.extend(0.0),
                    other.extend(0.0),
                    tan.out_tangent,
                    tan.in_tangent,
                    t,
                );
                p.truncate()
            }
            None => self.lerp(other, t),
        }
    }
}

impl Interpolatable for Vec3 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Vec3::lerp(*self, *other, t)
    }

    fn lerp_spatial(&self, other: &Self, t: f32, tangents: Option<&SpatialTangents>) -> Self {
        match tangents {
            Some(tan) => cubic_point(*self, *other, tan.out_tangent, tan.in_tangent, t),
            None => self.lerp(other, t),
        }
    }
}

impl Scalable for Vec3 {
    fn scaled_by(&self, factor: f32) -> Self {
        Vec3::new(self.x * factor, self.y * factor, self.z * factor)
    }
}

impl Interpolatable for Vec4 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Vec4::lerp(*self, *other, t)
    }
}

// Point on the cubic running from `p0` to `p3` with control points offset by the
// keyframe's spatial tangents.
fn cubic_point(p0: Vec3, p3: Vec3, tan_out: Vec3, tan_in: Vec3, t: f32) -> Vec3 {
    let p1 = p0 + tan_out;
    let p2 = p3 + tan_in;

    let one_minus_t = 1.0 - t;
    let one_minus_t_sq = one_minus_t * one_minus_t;
    let one_minus_t_cub = one_minus_t_sq * one_minus_t;

    let t_sq = t * t;
    let t_cub = t_sq * t;

    p0 * one_minus_t_cub + p1 * 3.0 * one_minus_t_sq * t + p2 * 3.0 * one_minus_t * t_sq + p3 * t_cub
}

// Cubic Bezier Easing
pub fn solve_cubic_bezier(p1: Vec2, p2: Vec2, x: f32) -> f32 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    // Newton-Raphson on x(t), then evaluate y(t)
    let mut t = x;
    for _ in 0..8 {
        let one_minus_t = 1.0 - t;
        let x_est = 3.0 * one_minus_t * one_minus_t * t * p1.x
            + 3.0 * one_minus_t * t * t * p2.x
            + t * t * t;

        let err = x_est - x;
        if err.abs() < 1e-4 {
            break;
        }

        let dx_dt = 3.0 * one_minus_t * one_minus_t * p1.x
            + 6.0 * one_minus_t * t * (p2.x - p1.x)
            + 3.0 * t * t * (1.0 - p2.x);

        if dx_dt.abs() < 1e-6 {
            break;
        }
        t = (t - err / dx_dt).clamp(0.0, 1.0);
    }

    let one_minus_t = 1.0 - t;
    3.0 * one_minus_t * one_minus_t * t * p1.y + 3.0 * one_minus_t * t * t * p2.y + t * t * t
}

/// Easing of the segment that starts at a keyframe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InterpolationCurve {
    Linear,
    /// Keep the start value until the next keyframe is reached.
    Hold,
    CubicBezier { out_tangent: Vec2, in_tangent: Vec2 },
}

impl InterpolationCurve {
    /// Maps linear segment progress `x` to eased progress.
    pub fn progress(&self, x: f32) -> f32 {
        match self {
            InterpolationCurve::Linear => x.clamp(0.0, 1.0),
            InterpolationCurve::Hold => 0.0,
            InterpolationCurve::CubicBezier {
                out_tangent,
                in_tangent,
            } => solve_cubic_bezier(*out_tangent, *in_tangent, x),
        }
    }
}

/// Spatial bezier handles of a motion-path segment, relative to its end points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialTangents {
    pub out_tangent: Vec3,
    pub in_tangent: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe<V> {
    pub time: f32,
    pub value: V,
    /// Easing towards the following keyframe; unused on the last one.
    pub easing: InterpolationCurve,
    pub spatial: Option<SpatialTangents>,
}

impl<V> Keyframe<V> {
    pub fn new(time: f32, value: V) -> Self {
        Self {
            time,
            value,
            easing: InterpolationCurve::Linear,
            spatial: None,
        }
    }

    pub fn with_easing(mut self, easing: InterpolationCurve) -> Self {
        self.easing = easing;
        self
    }

    pub fn with_spatial(mut self, spatial: SpatialTangents) -> Self {
        self.spatial = Some(spatial);
        self
    }
}

/// A non-empty run of keyframes with strictly increasing times.
///
/// The keyframes live behind an `Arc`, so clones share storage. Groups are never
/// mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeGroup<V> {
    keyframes: Arc<[Keyframe<V>]>,
}

impl<V> KeyframeGroup<V> {
    pub fn new(keyframes: Vec<Keyframe<V>>) -> Result<Self, KeyframeError> {
        if keyframes.is_empty() {
            return Err(KeyframeError::Empty);
        }
        for (index, pair) in keyframes.windows(2).enumerate() {
            // Written as a negation so NaN times are rejected too.
            if !(pair[1].time > pair[0].time) {
                return Err(KeyframeError::NonIncreasing {
                    index: index + 1,
                    previous: pair[0].time,
                    time: pair[1].time,
                });
            }
        }
        Ok(Self {
            keyframes: keyframes.into(),
        })
    }

    pub fn constant(value: V) -> Self {
        Self {
            keyframes: Arc::from(vec![Keyframe::new(0.0, value)]),
        }
    }

    pub fn keyframes(&self) -> &[Keyframe<V>] {
        &self.keyframes
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_animated(&self) -> bool {
        self.keyframes.len() > 1
    }

    pub fn first_value(&self) -> &V {
        &self.keyframes[0].value
    }

    /// `true` when both groups point at the same keyframe storage.
    pub fn shares_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.keyframes, &other.keyframes)
    }

    /// Transforms every value, keeping times, easing and tangents.
    pub fn map<U>(&self, f: impl Fn(&V) -> U) -> KeyframeGroup<U> {
        let keyframes: Vec<Keyframe<U>> = self
            .keyframes
            .iter()
            .map(|kf| Keyframe {
                time: kf.time,
                value: f(&kf.value),
                easing: kf.easing,
                spatial: kf.spatial,
            })
            .collect();
        KeyframeGroup {
            keyframes: keyframes.into(),
        }
    }
}

impl<V: Scalable> KeyframeGroup<V> {
    /// Multiplies every value, and every spatial tangent, by `factor`.
    pub fn scaled(&self, factor: f32) -> Self {
        let keyframes: Vec<Keyframe<V>> = self
            .keyframes
            .iter()
            .map(|kf| Keyframe {
                time: kf.time,
                value: kf.value.scaled_by(factor),
                easing: kf.easing,
                spatial: kf.spatial.map(|tan| SpatialTangents {
                    out_tangent: tan.out_tangent * factor,
                    in_tangent: tan.in_tangent * factor,
                }),
            })
            .collect();
        Self {
            keyframes: keyframes.into(),
        }
    }
}

impl<V: Interpolatable> KeyframeGroup<V> {
    /// Samples the group at `frame`, clamping outside the keyframe range.
    pub fn value_at(&self, frame: f32) -> V {
        let keyframes = &self.keyframes;

        // First keyframe strictly after `frame`; the segment is [idx - 1, idx].
        let idx = keyframes.partition_point(|kf| kf.time <= frame);
        if idx == 0 {
            return keyframes[0].value.clone();
        }
        let len = keyframes.len();
        if idx >= len {
            return keyframes[len - 1].value.clone();
        }

        let start = &keyframes[idx - 1];
        let end = &keyframes[idx];
        let local_t = (frame - start.time) / (end.time - start.time);
        let progress = start.easing.progress(local_t);

        start
            .value
            .lerp_spatial(&end.value, progress, start.spatial.as_ref())
    }

    /// Converts a decoded property into a keyframe group.
    ///
    /// Keyframes without a start value fall back to the previous keyframe's end
    /// value. Keyframes whose time does not advance are dropped.
    pub fn from_property<T>(prop: &Property<T>, converter: impl Fn(&T) -> V, default: V) -> Self {
        match &prop.k {
            Value::Default => Self::constant(default),
            Value::Static(v) => Self::constant(converter(v)),
            Value::Animated(raw) => {
                let mut accepted: Vec<(&data::Keyframe<T>, V)> = Vec::with_capacity(raw.len());
                let mut previous_end: Option<V> = None;

                for kf in raw {
                    let value = kf
                        .s
                        .as_ref()
                        .map(&converter)
                        .or_else(|| previous_end.clone())
                        .or_else(|| accepted.last().map(|(_, v)| v.clone()))
                        .unwrap_or_else(|| default.clone());
                    previous_end = kf.e.as_ref().map(&converter);

                    if let Some((last, _)) = accepted.last() {
                        if !(kf.t > last.t) {
                            debug!(time = kf.t, previous = last.t, "dropping keyframe that does not advance time");
                            continue;
                        }
                    }
                    accepted.push((kf, value));
                }

                if accepted.is_empty() {
                    return Self::constant(default);
                }

                let keyframes: Vec<Keyframe<V>> = accepted
                    .iter()
                    .enumerate()
                    .map(|(index, (kf, value))| {
                        let next = accepted.get(index + 1).map(|(next, _)| *next);
                        Keyframe {
                            time: kf.t,
                            value: value.clone(),
                            easing: segment_easing(kf, next),
                            spatial: next.and_then(|next| segment_tangents(kf, next)),
                        }
                    })
                    .collect();

                Self {
                    keyframes: keyframes.into(),
                }
            }
        }
    }
}

impl KeyframeGroup<Vec3> {
    /// Joins split x/y(/z) groups into one vector group keyed at the union of their
    /// keyframe times. Segments between merged keys interpolate linearly.
    pub fn from_axes(
        x: &KeyframeGroup<f32>,
        y: &KeyframeGroup<f32>,
        z: Option<&KeyframeGroup<f32>>,
    ) -> Self {
        let mut times: Vec<f32> = x
            .keyframes()
            .iter()
            .chain(y.keyframes())
            .chain(z.map(|z| z.keyframes()).unwrap_or_default())
            .map(|kf| kf.time)
            .collect();
        times.sort_by(f32::total_cmp);
        times.dedup();

        let keyframes: Vec<Keyframe<Vec3>> = times
            .into_iter()
            .map(|t| {
                let value = Vec3::new(
                    x.value_at(t),
                    y.value_at(t),
                    z.map_or(0.0, |z| z.value_at(t)),
                );
                Keyframe::new(t, value)
            })
            .collect();

        Self {
            keyframes: keyframes.into(),
        }
    }
}

fn segment_easing<T>(start: &data::Keyframe<T>, end: Option<&data::Keyframe<T>>) -> InterpolationCurve {
    if start.h == Some(1) {
        return InterpolationCurve::Hold;
    }
    let Some(end) = end else {
        return InterpolationCurve::Linear;
    };
    if start.o.is_none() && end.i.is_none() {
        return InterpolationCurve::Linear;
    }

    let out_tangent = start
        .o
        .as_ref()
        .map(|o| {
            Vec2::new(
                o.x.first().copied().unwrap_or(0.0),
                o.y.first().copied().unwrap_or(0.0),
            )
        })
        .unwrap_or(Vec2::ZERO);
    let in_tangent = end
        .i
        .as_ref()
        .map(|i| {
            Vec2::new(
                i.x.first().copied().unwrap_or(1.0),
                i.y.first().copied().unwrap_or(1.0),
            )
        })
        .unwrap_or(Vec2::ONE);

    InterpolationCurve::CubicBezier {
        out_tangent,
        in_tangent,
    }
}

fn segment_tangents<T>(start: &data::Keyframe<T>, end: &data::Keyframe<T>) -> Option<SpatialTangents> {
    let out_tangent = tangent_vector(start.to.as_deref());
    let in_tangent = tangent_vector(end.ti.as_deref());
    if out_tangent == Vec3::ZERO && in_tangent == Vec3::ZERO {
        return None;
    }
    Some(SpatialTangents {
        out_tangent,
        in_tangent,
    })
}

fn tangent_vector(raw: Option<&[f32]>) -> Vec3 {
    match raw {
        Some([x, y, z, ..]) => Vec3::new(*x, *y, *z),
        Some([x, y]) => Vec3::new(*x, *y, 0.0),
        _ => Vec3::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lottie_data::model::BezierTangent;

    fn linear_group() -> KeyframeGroup<f32> {
        KeyframeGroup::new(vec![
            Keyframe::new(0.0, 0.0),
            Keyframe::new(10.0, 10.0),
            Keyframe::new(20.0, 30.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_value_at_binary_search() {
        let group = linear_group();

        assert_eq!(group.value_at(0.0), 0.0);
        assert_eq!(group.value_at(10.0), 10.0);
        assert_eq!(group.value_at(20.0), 30.0);
        assert_eq!(group.value_at(5.0), 5.0);
        assert_eq!(group.value_at(15.0), 20.0);
    }

    #[test]
    fn test_value_at_clamps_to_boundaries() {
        let group = linear_group();

        assert_eq!(group.value_at(-5.0), 0.0);
        assert_eq!(group.value_at(f32::NEG_INFINITY), 0.0);
        assert_eq!(group.value_at(25.0), 30.0);
        assert_eq!(group.value_at(1.0e9), 30.0);
    }

    #[test]
    fn test_constant_group_is_defined_everywhere() {
        let group = KeyframeGroup::constant(Vec3::new(1.0, 2.0, 3.0));
        assert!(!group.is_animated());
        assert_eq!(group.value_at(-100.0), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(group.value_at(100.0), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_new_rejects_empty_and_unordered() {
        assert!(matches!(
            KeyframeGroup::<f32>::new(vec![]),
            Err(KeyframeError::Empty)
        ));

        let err = KeyframeGroup::new(vec![
            Keyframe::new(0.0, 1.0),
            Keyframe::new(5.0, 2.0),
            Keyframe::new(5.0, 3.0),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            KeyframeError::NonIncreasing { index: 2, .. }
        ));

        assert!(KeyframeGroup::new(vec![Keyframe::new(f32::NAN, 1.0), Keyframe::new(1.0, 2.0)]).is_err());
    }

    #[test]
    fn test_hold_keeps_start_value_until_next_keyframe() {
        let group = KeyframeGroup::new(vec![
            Keyframe::new(0.0, 0.0).with_easing(InterpolationCurve::Hold),
            Keyframe::new(10.0, 100.0),
        ])
        .unwrap();

        assert_eq!(group.value_at(9.99), 0.0);
        assert_eq!(group.value_at(10.0), 100.0);
    }

    #[test]
    fn test_cubic_easing_is_symmetric_for_ease_in_out() {
        let easing = InterpolationCurve::CubicBezier {
            out_tangent: Vec2::new(0.42, 0.0),
            in_tangent: Vec2::new(0.58, 1.0),
        };
        let group = KeyframeGroup::new(vec![
            Keyframe::new(0.0, 0.0).with_easing(easing),
            Keyframe::new(10.0, 100.0),
        ])
        .unwrap();

        assert!((group.value_at(5.0) - 50.0).abs() < 0.5);
        assert!(group.value_at(2.0) < 20.0);
        assert!(group.value_at(8.0) > 80.0);
    }

    #[test]
    fn test_spatial_tangents_bend_the_motion_path() {
        let group = KeyframeGroup::new(vec![
            Keyframe::new(0.0, Vec3::ZERO).with_spatial(SpatialTangents {
                out_tangent: Vec3::new(0.0, 40.0, 0.0),
                in_tangent: Vec3::new(0.0, 40.0, 0.0),
            }),
            Keyframe::new(10.0, Vec3::new(100.0, 0.0, 0.0)),
        ])
        .unwrap();

        let mid = group.value_at(5.0);
        assert!((mid.x - 50.0).abs() < 1e-3);
        assert!((mid.y - 30.0).abs() < 1e-3);
        assert_eq!(group.value_at(10.0), Vec3::new(100.0, 0.0, 0.0));
    }

    #[test]
    fn test_scaled_multiplies_values_exactly() {
        let group = linear_group().scaled(3.0);
        let values: Vec<f32> = group.keyframes().iter().map(|kf| kf.value).collect();
        assert_eq!(values, vec![0.0, 30.0, 90.0]);

        let zero = linear_group().scaled(0.0);
        assert!(zero.keyframes().iter().all(|kf| kf.value == 0.0));
    }

    #[test]
    fn test_clones_share_storage() {
        let group = linear_group();
        let copy = group.clone();
        assert!(group.shares_storage(&copy));
        assert!(!group.shares_storage(&group.scaled(1.0)));
    }

    #[test]
    fn test_from_property_converts_easing_and_hold() {
        let mut first = data::Keyframe::at(0.0, 0.0_f32);
        first.o = Some(BezierTangent {
            x: vec![0.42],
            y: vec![0.0],
        });
        let mut second = data::Keyframe::at(10.0, 100.0_f32);
        second.i = Some(BezierTangent {
            x: vec![0.58],
            y: vec![1.0],
        });
        second.h = Some(1);
        let third = data::Keyframe::at(20.0, 50.0_f32);

        let prop = Property::animated(vec![first, second, third]);
        let group = KeyframeGroup::from_property(&prop, |v| *v, 0.0);

        assert_eq!(group.len(), 3);
        assert!(matches!(
            group.keyframes()[0].easing,
            InterpolationCurve::CubicBezier { .. }
        ));
        assert_eq!(group.keyframes()[1].easing, InterpolationCurve::Hold);
        assert_eq!(group.value_at(15.0), 100.0);
    }

    #[test]
    fn test_from_property_drops_non_advancing_keyframes() {
        let prop = Property::animated(vec![
            data::Keyframe::at(0.0, 1.0_f32),
            data::Keyframe::at(0.0, 2.0_f32),
            data::Keyframe::at(10.0, 3.0_f32),
        ]);
        let group = KeyframeGroup::from_property(&prop, |v| *v, 0.0);

        assert_eq!(group.len(), 2);
        assert_eq!(group.value_at(0.0), 1.0);
        assert_eq!(group.value_at(10.0), 3.0);
    }

    #[test]
    fn test_from_property_uses_previous_end_value() {
        let mut first = data::Keyframe::at(0.0, 0.0_f32);
        first.e = Some(40.0);
        let last = data::Keyframe::<f32> {
            s: None,
            ..data::Keyframe::at(10.0, 0.0)
        };

        let prop = Property::animated(vec![first, last]);
        let group = KeyframeGroup::from_property(&prop, |v| *v, -1.0);
        assert_eq!(group.value_at(10.0), 40.0);
    }

    #[test]
    fn test_from_property_default_and_static() {
        let default: Property<f32> = Property::default();
        assert_eq!(*KeyframeGroup::from_property(&default, |v| *v, 7.0).first_value(), 7.0);

        let fixed = Property::fixed(3.0_f32);
        assert_eq!(*KeyframeGroup::from_property(&fixed, |v| *v * 2.0, 0.0).first_value(), 6.0);
    }

    #[test]
    fn test_from_axes_merges_keyframe_times() {
        let x = KeyframeGroup::new(vec![Keyframe::new(0.0, 0.0), Keyframe::new(10.0, 10.0)]).unwrap();
        let y = KeyframeGroup::new(vec![Keyframe::new(5.0, 5.0), Keyframe::new(10.0, 20.0)]).unwrap();

        let merged = KeyframeGroup::from_axes(&x, &y, None);
        let times: Vec<f32> = merged.keyframes().iter().map(|kf| kf.time).collect();
        assert_eq!(times, vec![0.0, 5.0, 10.0]);
        assert_eq!(merged.value_at(10.0), Vec3::new(10.0, 20.0, 0.0));
        assert_eq!(merged.value_at(0.0), Vec3::new(0.0, 5.0, 0.0));
    }
}
