//! Installing time-driven property animations into a render backend.

use crate::animatable::KeyframeGroup;
use crate::error::SetupError;
use crate::layers::LayerId;
use crate::time::{TimeRemapping, TimeStep};
use crate::transform::{ResolvedTransform, TransformModel};
use glam::Vec3;
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformChannel {
    Anchor,
    Position,
    PositionX,
    PositionY,
    Scale,
    Rotation,
    Skew,
    SkewAxis,
    Opacity,
}

impl TransformChannel {
    /// Key path a compositor would animate for this channel.
    pub fn key_path(&self) -> &'static str {
        match self {
            TransformChannel::Anchor => "anchorPoint",
            TransformChannel::Position => "transform.translation",
            TransformChannel::PositionX => "transform.translation.x",
            TransformChannel::PositionY => "transform.translation.y",
            TransformChannel::Scale => "transform.scale",
            TransformChannel::Rotation => "transform.rotation.z",
            TransformChannel::Skew => "transform.skew",
            TransformChannel::SkewAxis => "transform.skewAxis",
            TransformChannel::Opacity => "opacity",
        }
    }
}

impl fmt::Display for TransformChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key_path())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelValue {
    Vector(KeyframeGroup<Vec3>),
    Scalar(KeyframeGroup<f32>),
}

/// Keyframes bound to one channel of a layer, with the timing that maps
/// composition frames onto the keyframes' local frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub channel: TransformChannel,
    pub value: ChannelValue,
    pub timing: TimeRemapping,
}

impl Binding {
    pub fn local_frame(&self, frame: f32) -> f32 {
        self.timing.local_frame(frame)
    }

    pub fn vector_at(&self, frame: f32) -> Option<Vec3> {
        match &self.value {
            ChannelValue::Vector(group) => Some(group.value_at(self.local_frame(frame))),
            ChannelValue::Scalar(_) => None,
        }
    }

    pub fn scalar_at(&self, frame: f32) -> Option<f32> {
        match &self.value {
            ChannelValue::Scalar(group) => Some(group.value_at(self.local_frame(frame))),
            ChannelValue::Vector(_) => None,
        }
    }
}

/// The platform side that owns render layers and runs their animations.
pub trait AnimationBackend {
    fn bind(&mut self, layer: LayerId, binding: Binding) -> Result<(), SetupError>;

    /// Removes the binding of `channel` on `layer`, if any.
    fn unbind(&mut self, layer: LayerId, channel: TransformChannel);

    /// Removes every binding of `layer`. Unknown layers are ignored.
    fn unbind_layer(&mut self, layer: LayerId);
}

/// In-memory backend that records bindings and can play them back.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    bindings: HashMap<LayerId, Vec<Binding>>,
    unsupported: HashSet<TransformChannel>,
    rejected: HashSet<LayerId>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every binding of `channel`.
    pub fn with_unsupported_channel(mut self, channel: TransformChannel) -> Self {
        self.unsupported.insert(channel);
        self
    }

    /// Refuse every binding on `layer`.
    pub fn with_rejected_layer(mut self, layer: LayerId) -> Self {
        self.rejected.insert(layer);
        self
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    pub fn is_bound(&self, layer: LayerId) -> bool {
        self.bindings.contains_key(&layer)
    }

    pub fn bound_layer_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn bindings(&self, layer: LayerId) -> &[Binding] {
        self.bindings.get(&layer).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn binding(&self, layer: LayerId, channel: TransformChannel) -> Option<&Binding> {
        self.bindings(layer).iter().find(|b| b.channel == channel)
    }

    /// Plays back the bound transform channels of `layer` at composition `frame`.
    pub fn resolved_transform(&self, layer: LayerId, frame: f32) -> Option<ResolvedTransform> {
        let bindings = self.bindings.get(&layer)?;
        let mut resolved = ResolvedTransform::default();

        for binding in bindings {
            match binding.channel {
                TransformChannel::Anchor => {
                    resolved.anchor = binding.vector_at(frame).unwrap_or(resolved.anchor)
                }
                TransformChannel::Position => {
                    resolved.position = binding.vector_at(frame).unwrap_or(resolved.position)
                }
                TransformChannel::PositionX => {
                    resolved.position.x = binding.scalar_at(frame).unwrap_or(resolved.position.x)
                }
                TransformChannel::PositionY => {
                    resolved.position.y = binding.scalar_at(frame).unwrap_or(resolved.position.y)
                }
                TransformChannel::Scale => {
                    if let Some(scale) = binding.vector_at(frame) {
                        resolved.scale = scale / 100.0;
                    }
                }
                TransformChannel::Rotation => {
                    if let Some(r) = binding.scalar_at(frame) {
                        resolved.rotation = r.to_radians();
                    }
                }
                TransformChannel::Skew => {
                    if let Some(s) = binding.scalar_at(frame) {
                        resolved.skew = s.to_radians();
                    }
                }
                TransformChannel::SkewAxis => {
                    if let Some(s) = binding.scalar_at(frame) {
                        resolved.skew_axis = s.to_radians();
                    }
                }
                TransformChannel::Opacity => {
                    if let Some(o) = binding.scalar_at(frame) {
                        resolved.opacity = o / 100.0;
                    }
                }
            }
        }

        Some(resolved)
    }
}

impl AnimationBackend for RecordingBackend {
    fn bind(&mut self, layer: LayerId, binding: Binding) -> Result<(), SetupError> {
        if self.rejected.contains(&layer) {
            return Err(SetupError::Rejected {
                layer,
                reason: "layer is not animatable".to_string(),
            });
        }
        if self.unsupported.contains(&binding.channel) {
            return Err(SetupError::UnsupportedChannel {
                layer,
                channel: binding.channel,
            });
        }

        let bound = self.bindings.entry(layer).or_default();
        if bound.iter().any(|b| b.channel == binding.channel) {
            return Err(SetupError::AlreadyBound {
                layer,
                channel: binding.channel,
            });
        }
        bound.push(binding);
        Ok(())
    }

    fn unbind(&mut self, layer: LayerId, channel: TransformChannel) {
        if let Some(bound) = self.bindings.get_mut(&layer) {
            bound.retain(|b| b.channel != channel);
            if bound.is_empty() {
                self.bindings.remove(&layer);
            }
        }
    }

    fn unbind_layer(&mut self, layer: LayerId) {
        self.bindings.remove(&layer);
    }
}

/// State threaded through animation setup of a layer tree.
pub struct LayerAnimationContext<'a> {
    backend: &'a mut dyn AnimationBackend,
    pub frame_rate: f32,
    pub start_frame: f32,
    pub end_frame: f32,
    time_remapping: TimeRemapping,
}

impl<'a> LayerAnimationContext<'a> {
    pub fn new(
        backend: &'a mut dyn AnimationBackend,
        frame_rate: f32,
        start_frame: f32,
        end_frame: f32,
    ) -> Self {
        Self {
            backend,
            frame_rate,
            start_frame,
            end_frame,
            time_remapping: TimeRemapping::identity(),
        }
    }

    pub fn time_remapping(&self) -> &TimeRemapping {
        &self.time_remapping
    }

    /// Runs `f` with `step` appended to the time remapping.
    pub fn with_time_step<R>(&mut self, step: TimeStep, f: impl FnOnce(&mut Self) -> R) -> R {
        self.time_remapping.push(step);
        let result = f(self);
        self.time_remapping.pop();
        result
    }

    pub fn add_animation(
        &mut self,
        layer: LayerId,
        channel: TransformChannel,
        value: ChannelValue,
    ) -> Result<(), SetupError> {
        let binding = Binding {
            channel,
            value,
            timing: self.time_remapping.clone(),
        };
        self.backend.bind(layer, binding)
    }

    /// Binds every channel `model` provides. Either all of them end up bound or,
    /// on the first failure, the ones bound by this call are removed again.
    /// Bindings the layer held before the call are left alone.
    pub fn add_transform_animations(
        &mut self,
        layer: LayerId,
        model: &dyn TransformModel,
    ) -> Result<(), SetupError> {
        let mut bound = Vec::new();
        for (channel, value) in transform_channels(model) {
            if let Err(err) = self.add_animation(layer, channel, value) {
                for channel in bound {
                    self.backend.unbind(layer, channel);
                }
                return Err(err);
            }
            bound.push(channel);
        }
        Ok(())
    }

    /// Drops whatever `layers` have bound so far.
    pub fn rollback(&mut self, layers: impl IntoIterator<Item = LayerId>) {
        for layer in layers {
            self.backend.unbind_layer(layer);
        }
    }
}

fn transform_channels(model: &dyn TransformModel) -> Vec<(TransformChannel, ChannelValue)> {
    use ChannelValue::{Scalar, Vector};

    let mut channels = vec![(TransformChannel::Anchor, Vector(model.anchor_point().clone()))];

    if let Some(position) = model.position() {
        channels.push((TransformChannel::Position, Vector(position.clone())));
    } else {
        if let Some(x) = model.position_x() {
            channels.push((TransformChannel::PositionX, Scalar(x.clone())));
        }
        if let Some(y) = model.position_y() {
            channels.push((TransformChannel::PositionY, Scalar(y.clone())));
        }
    }

    channels.push((TransformChannel::Scale, Vector(model.scale().clone())));

    let optional = [
        (TransformChannel::Rotation, model.rotation()),
        (TransformChannel::Skew, model.skew()),
        (TransformChannel::SkewAxis, model.skew_axis()),
        (TransformChannel::Opacity, model.opacity()),
    ];
    for (channel, group) in optional {
        if let Some(group) = group {
            channels.push((channel, Scalar(group.clone())));
        }
    }

    channels
}

impl fmt::Debug for LayerAnimationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerAnimationContext")
            .field("frame_rate", &self.frame_rate)
            .field("start_frame", &self.start_frame)
            .field("end_frame", &self.end_frame)
            .field("time_remapping", &self.time_remapping)
            .finish_non_exhaustive()
    }
}
