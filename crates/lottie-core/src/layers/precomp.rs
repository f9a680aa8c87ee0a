use super::{expect_source, Animating, BaseLayer, Constructed, LayerId, LayerSetup, LayerState, ShadowCopy};
use crate::context::LayerAnimationContext;
use crate::error::SetupError;
use crate::time::TimeStep;
use std::any::Any;

/// A layer hosting a nested composition.
///
/// The layer's own transform runs in the parent's time; its children run in
/// the time produced by `time_step`.
#[derive(Debug)]
pub struct PreCompLayer<S: LayerState = Constructed> {
    base: BaseLayer<S>,
    time_step: TimeStep,
}

impl<S: LayerState> PreCompLayer<S> {
    pub fn base(&self) -> &BaseLayer<S> {
        &self.base
    }

    pub fn time_step(&self) -> &TimeStep {
        &self.time_step
    }

    pub(crate) fn transition<T: LayerState>(self, frozen_at: Option<f32>) -> PreCompLayer<T> {
        PreCompLayer {
            base: self.base.transition(frozen_at),
            time_step: self.time_step,
        }
    }
}

impl PreCompLayer<Constructed> {
    pub fn new(base: BaseLayer<Constructed>, time_step: TimeStep) -> Self {
        Self { base, time_step }
    }
}

impl LayerSetup for PreCompLayer<Constructed> {
    type Animating = PreCompLayer<Animating>;

    fn install(&self, ctx: &mut LayerAnimationContext<'_>) -> Result<(), SetupError> {
        ctx.with_time_step(self.time_step.clone(), |ctx| self.base.install_children(ctx))?;
        self.base.install_own(ctx)
    }

    fn layer_ids(&self) -> Vec<LayerId> {
        self.base.subtree_ids()
    }

    fn into_animating(self) -> Self::Animating {
        self.transition(None)
    }
}

impl<S: LayerState> ShadowCopy for PreCompLayer<S> {
    fn shadow_copy(source: &dyn Any) -> Self {
        let typed = expect_source::<Self>(source);
        Self {
            base: BaseLayer::shadow_copy(&typed.base),
            time_step: typed.time_step.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animatable::{Keyframe, KeyframeGroup};
    use crate::context::{RecordingBackend, TransformChannel};
    use crate::layers::LayerId;
    use crate::transform::LayerTransform;
    use std::sync::Arc;

    #[test]
    fn test_children_bind_with_precomp_timing() {
        let rotation = KeyframeGroup::new(vec![Keyframe::new(0.0, 0.0), Keyframe::new(10.0, 100.0)]).unwrap();
        let child = BaseLayer::new(LayerId(2), Arc::new(LayerTransform::identity().with_rotation(rotation)));
        let base = BaseLayer::new(LayerId(1), Arc::new(LayerTransform::identity())).with_child(child);
        let precomp = PreCompLayer::new(base, TimeStep::offset(5.0, 1.0));

        let mut backend = RecordingBackend::new();
        {
            let mut ctx = LayerAnimationContext::new(&mut backend, 30.0, 0.0, 30.0);
            precomp.setup_animations(&mut ctx).unwrap();
        }

        let own = backend.binding(LayerId(1), TransformChannel::Anchor).unwrap();
        assert!(own.timing.is_identity());

        let child = backend.binding(LayerId(2), TransformChannel::Rotation).unwrap();
        assert_eq!(child.local_frame(10.0), 5.0);
        assert_eq!(child.scalar_at(10.0), Some(50.0));
    }
}
