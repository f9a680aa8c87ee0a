use serde::{de::DeserializeOwned, de::SeqAccess, Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LottieJson {
    pub v: Option<String>,
    #[serde(default)]
    pub nm: Option<String>,
    pub ip: f32,
    pub op: f32,
    pub fr: f32,
    pub w: u32,
    pub h: u32,
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// Layer type codes used by the `ty` field.
pub mod layer_type {
    pub const PRECOMP: u8 = 0;
    pub const SOLID: u8 = 1;
    pub const IMAGE: u8 = 2;
    pub const NULL: u8 = 3;
    pub const SHAPE: u8 = 4;
    pub const TEXT: u8 = 5;
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Layer {
    #[serde(default)]
    pub ty: u8,
    #[serde(default)]
    pub ind: Option<u32>,
    #[serde(default)]
    pub parent: Option<u32>,
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub ip: f32,
    #[serde(default)]
    pub op: f32,
    #[serde(default)]
    pub st: f32, // Start time
    #[serde(default = "default_one")]
    pub sr: f32, // Time stretch (1.0 = normal, >1 = slower, <1 = faster)
    #[serde(default)]
    pub ks: Transform,
    #[serde(default)]
    pub tm: Option<Property<f32>>, // Time remapping, in seconds
    #[serde(default)]
    pub hd: Option<bool>,

    #[serde(default, rename = "refId")]
    pub ref_id: Option<String>, // PreComp
    #[serde(default)]
    pub w: Option<u32>,
    #[serde(default)]
    pub h: Option<u32>,
    #[serde(default)]
    pub shapes: Option<Vec<Shape>>,
}

fn default_one() -> f32 {
    1.0
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "ty")]
pub enum Shape {
    #[serde(rename = "gr")]
    Group(GroupShape),
    #[serde(rename = "rc")]
    Rect(RectShape),
    #[serde(rename = "el")]
    Ellipse(EllipseShape),
    #[serde(rename = "sh")]
    Path(PathShape),
    #[serde(rename = "fl")]
    Fill(FillShape),
    #[serde(rename = "st")]
    Stroke(StrokeShape),
    #[serde(rename = "tr")]
    Transform(TransformShape),
    #[serde(rename = "rp")]
    Repeater(RepeaterShape),
    #[serde(other)]
    Unknown,
}

impl Shape {
    /// Shapes that produce or paint geometry, as opposed to structural items.
    pub fn is_drawable(&self) -> bool {
        matches!(
            self,
            Shape::Rect(_) | Shape::Ellipse(_) | Shape::Path(_) | Shape::Fill(_) | Shape::Stroke(_)
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GroupShape {
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub hd: Option<bool>,
    pub it: Vec<Shape>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RectShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub s: Property<Vec2>,
    pub p: Property<Vec2>,
    #[serde(default)]
    pub r: Property<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EllipseShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub s: Property<Vec2>,
    pub p: Property<Vec2>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PathShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub ks: Property<BezierPath>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FillShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub c: Property<Vec4>,
    pub o: Property<f32>,
    #[serde(default)]
    pub r: Option<u8>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StrokeShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub c: Property<Vec4>,
    pub w: Property<f32>,
    pub o: Property<f32>,
    #[serde(default)]
    pub lc: u8,
    #[serde(default)]
    pub lj: u8,
    #[serde(default)]
    pub ml: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransformShape {
    #[serde(flatten)]
    pub t: Transform,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RepeaterShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub c: Property<f32>, // Copies
    #[serde(default)]
    pub o: Property<f32>, // Offset
    #[serde(default)]
    pub m: u8, // Composite: 1 = above, 2 = below
    pub tr: RepeaterTransform,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RepeaterTransform {
    #[serde(flatten)]
    pub t: Transform,
    #[serde(default)]
    pub so: Property<f32>, // Start opacity
    #[serde(default)]
    pub eo: Property<f32>, // End opacity
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Transform {
    #[serde(default)]
    pub a: Property<Vec3DefaultZero>, // Anchor
    #[serde(default)]
    pub p: PositionProperty,
    #[serde(default)]
    pub s: Property<Vec3Scale>, // Scale, percent
    #[serde(default, alias = "r")]
    pub rz: Property<f32>, // Rotation Z, degrees
    #[serde(default)]
    pub sk: Property<f32>, // Skew amount in degrees
    #[serde(default)]
    pub sa: Property<f32>, // Skew axis in degrees (0 = X axis, 90 = Y axis)
    #[serde(default)]
    pub o: Property<f32>, // Opacity, percent
}

#[derive(Debug, Serialize, Clone)]
#[serde(untagged)]
pub enum PositionProperty {
    Unified(Property<Vec3DefaultZero>),
    Split {
        x: Property<f32>,
        y: Property<f32>,
        z: Option<Property<f32>>,
    },
}

#[derive(Deserialize)]
struct SplitPosition {
    x: Property<f32>,
    y: Property<f32>,
    #[serde(default)]
    z: Option<Property<f32>>,
}

// Every field of `Property` has a default, so an untagged derive would read any
// object as `Unified`. Split position is flagged with `"s": true` or carries
// `x`/`y` without `k`.
impl<'de> Deserialize<'de> for PositionProperty {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        let is_split = v.get("s").and_then(serde_json::Value::as_bool) == Some(true)
            || (v.get("k").is_none() && v.get("x").is_some() && v.get("y").is_some());

        if is_split {
            let SplitPosition { x, y, z } =
                serde_json::from_value(v).map_err(serde::de::Error::custom)?;
            return Ok(PositionProperty::Split { x, y, z });
        }

        serde_json::from_value(v)
            .map(PositionProperty::Unified)
            .map_err(serde::de::Error::custom)
    }
}

impl Default for PositionProperty {
    fn default() -> Self {
        PositionProperty::Unified(Property::default())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Property<T> {
    #[serde(default)]
    pub a: u8,
    #[serde(default)]
    #[serde(bound(deserialize = "T: DeserializeOwned"))]
    pub k: Value<T>,
    #[serde(default)]
    pub ix: Option<u32>,
}

impl<T> Property<T> {
    pub fn fixed(value: T) -> Self {
        Property {
            a: 0,
            k: Value::Static(value),
            ix: None,
        }
    }

    pub fn animated(keyframes: Vec<Keyframe<T>>) -> Self {
        Property {
            a: 1,
            k: Value::Animated(keyframes),
            ix: None,
        }
    }

    /// `true` when the document supplied nothing for this property.
    pub fn is_default(&self) -> bool {
        matches!(self.k, Value::Default)
    }
}

impl<T> Default for Property<T> {
    fn default() -> Self {
        Property {
            a: 0,
            k: Value::Default,
            ix: None,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub enum Value<T> {
    Default,
    Static(T),
    Animated(Vec<Keyframe<T>>),
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Value<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;

        if v.is_null() {
            return Ok(Value::Default);
        }

        if let Ok(keyframes) = serde_json::from_value::<Vec<Keyframe<T>>>(v.clone()) {
            return Ok(Value::Animated(keyframes));
        }

        if let Ok(val) = serde_json::from_value::<T>(v.clone()) {
            return Ok(Value::Static(val));
        }

        if let Ok(vec) = serde_json::from_value::<Vec<T>>(v) {
            if let Some(first) = vec.into_iter().next() {
                return Ok(Value::Static(first));
            }
        }

        Ok(Value::Default)
    }
}

impl<T> Default for Value<T> {
    fn default() -> Self {
        Value::Default
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct Keyframe<T> {
    pub t: f32,
    #[serde(default, deserialize_with = "deserialize_keyframe_value")]
    pub s: Option<T>,
    #[serde(default, deserialize_with = "deserialize_keyframe_value")]
    pub e: Option<T>,
    #[serde(default)]
    pub i: Option<BezierTangent>,
    #[serde(default)]
    pub o: Option<BezierTangent>,
    #[serde(default)]
    pub to: Option<Vec<f32>>,
    #[serde(default)]
    pub ti: Option<Vec<f32>>,
    #[serde(default)]
    pub h: Option<u8>,
}

impl<T> Keyframe<T> {
    /// A linear keyframe holding `value` at time `t`.
    pub fn at(t: f32, value: T) -> Self {
        Keyframe {
            t,
            s: Some(value),
            e: None,
            i: None,
            o: None,
            to: None,
            ti: None,
            h: None,
        }
    }
}

fn deserialize_keyframe_value<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    if v.is_null() {
        return Ok(None);
    }

    if let Ok(val) = serde_json::from_value(v.clone()) {
        return Ok(Some(val));
    }

    // Scalars are frequently wrapped in a one-element array.
    if let Ok(vec) = serde_json::from_value::<Vec<T>>(v) {
        if let Some(first) = vec.into_iter().next() {
            return Ok(Some(first));
        }
    }

    Ok(None)
}

pub type Vec2 = [f32; 2];
pub type Vec3 = [f32; 3];
pub type Vec4 = [f32; 4];

/// Bezier easing handle of a keyframe, as `{"x": [0.48], "y": [1]}`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BezierTangent {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
}

// Vec3 with a missing z read as 0.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vec3DefaultZero(pub Vec3);

impl Default for Vec3DefaultZero {
    fn default() -> Self {
        Vec3DefaultZero([0.0, 0.0, 0.0])
    }
}

impl<'de> Deserialize<'de> for Vec3DefaultZero {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer
            .deserialize_seq(Vec3Visitor { default_z: 0.0 })
            .map(Vec3DefaultZero)
    }
}

// Vec3 with a missing z read as 100.0 (scale percent)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vec3Scale(pub Vec3);

impl Default for Vec3Scale {
    fn default() -> Self {
        Vec3Scale([100.0, 100.0, 100.0])
    }
}

impl<'de> Deserialize<'de> for Vec3Scale {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer
            .deserialize_seq(Vec3Visitor { default_z: 100.0 })
            .map(Vec3Scale)
    }
}

struct Vec3Visitor {
    default_z: f32,
}

impl<'de> serde::de::Visitor<'de> for Vec3Visitor {
    type Value = Vec3;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence of 2 or 3 floats")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let x = seq.next_element()?.unwrap_or(0.0);
        let y = seq.next_element()?.unwrap_or(0.0);
        let z = seq.next_element()?.unwrap_or(self.default_z);
        while seq.next_element::<f32>()?.is_some() {}
        Ok([x, y, z])
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct BezierPath {
    #[serde(default)]
    pub c: bool,
    #[serde(default)]
    pub i: Vec<Vec2>,
    #[serde(default)]
    pub o: Vec<Vec2>,
    #[serde(default)]
    pub v: Vec<Vec2>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Asset {
    pub id: String,
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub layers: Option<Vec<Layer>>,
    #[serde(default)]
    pub w: Option<u32>,
    #[serde(default)]
    pub h: Option<u32>,
    #[serde(default)]
    pub fr: Option<f32>, // Asset-local framerate (precomposition)
}
