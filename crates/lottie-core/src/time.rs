//! Mapping from composition frames to layer-local frames.

use crate::animatable::KeyframeGroup;

/// One level of time remapping, introduced by a precomposition layer.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeStep {
    /// `(frame - start) / stretch`, from a layer's start time and time stretch.
    Offset { start: f32, stretch: f32 },
    /// A time-remap curve sampled at the parent frame, in seconds.
    Remap {
        curve: KeyframeGroup<f32>,
        frame_rate: f32,
    },
}

impl TimeStep {
    pub fn offset(start: f32, stretch: f32) -> Self {
        TimeStep::Offset { start, stretch }
    }

    pub fn apply(&self, frame: f32) -> f32 {
        match self {
            TimeStep::Offset { start, stretch } => {
                if *stretch == 0.0 {
                    frame - start
                } else {
                    (frame - start) / stretch
                }
            }
            TimeStep::Remap { curve, frame_rate } => curve.value_at(frame) * frame_rate,
        }
    }
}

/// Ordered outer-to-inner stack of [`TimeStep`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeRemapping {
    steps: Vec<TimeStep>,
}

impl TimeRemapping {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn is_identity(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[TimeStep] {
        &self.steps
    }

    pub fn push(&mut self, step: TimeStep) {
        self.steps.push(step);
    }

    pub fn pop(&mut self) -> Option<TimeStep> {
        self.steps.pop()
    }

    pub fn then(&self, step: TimeStep) -> Self {
        let mut next = self.clone();
        next.push(step);
        next
    }

    pub fn local_frame(&self, frame: f32) -> f32 {
        self.steps.iter().fold(frame, |f, step| step.apply(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animatable::Keyframe;

    #[test]
    fn test_identity_passes_frames_through() {
        assert_eq!(TimeRemapping::identity().local_frame(12.5), 12.5);
    }

    #[test]
    fn test_offset_and_stretch() {
        let remap = TimeRemapping::identity().then(TimeStep::offset(10.0, 2.0));
        assert_eq!(remap.local_frame(10.0), 0.0);
        assert_eq!(remap.local_frame(30.0), 10.0);
    }

    #[test]
    fn test_zero_stretch_only_offsets() {
        assert_eq!(TimeStep::offset(5.0, 0.0).apply(8.0), 3.0);
    }

    #[test]
    fn test_steps_apply_outer_to_inner() {
        let curve = KeyframeGroup::new(vec![Keyframe::new(0.0, 0.0), Keyframe::new(30.0, 1.0)]).unwrap();
        let remap = TimeRemapping::identity()
            .then(TimeStep::offset(10.0, 1.0))
            .then(TimeStep::Remap {
                curve,
                frame_rate: 30.0,
            });

        // 25 -> 15 (offset) -> 0.5s -> 15 frames
        assert_eq!(remap.local_frame(25.0), 15.0);
        assert_eq!(remap.steps().len(), 2);
    }
}
