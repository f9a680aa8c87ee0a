use super::{expect_source, BaseLayer, Constructed, LayerId, LayerSetup, LayerState, ShadowCopy};
use crate::context::LayerAnimationContext;
use crate::error::SetupError;
use lottie_data::model as data;
use std::any::Any;
use std::sync::Arc;

/// A layer drawing shape items. Groups are shape layers with children and no
/// items of their own.
#[derive(Debug)]
pub struct ShapeLayer<S: LayerState = Constructed> {
    base: BaseLayer<S>,
    items: Arc<[data::Shape]>,
}

impl<S: LayerState> ShapeLayer<S> {
    pub fn base(&self) -> &BaseLayer<S> {
        &self.base
    }

    /// Drawable items, in document order.
    pub fn items(&self) -> &Arc<[data::Shape]> {
        &self.items
    }

    pub(crate) fn transition<T: LayerState>(self, frozen_at: Option<f32>) -> ShapeLayer<T> {
        ShapeLayer {
            base: self.base.transition(frozen_at),
            items: self.items,
        }
    }
}

impl ShapeLayer<Constructed> {
    pub fn new(base: BaseLayer<Constructed>, items: impl Into<Arc<[data::Shape]>>) -> Self {
        Self {
            base,
            items: items.into(),
        }
    }
}

impl LayerSetup for ShapeLayer<Constructed> {
    type Animating = ShapeLayer<super::Animating>;

    fn install(&self, ctx: &mut LayerAnimationContext<'_>) -> Result<(), SetupError> {
        self.base.install(ctx)
    }

    fn layer_ids(&self) -> Vec<LayerId> {
        self.base.subtree_ids()
    }

    fn into_animating(self) -> Self::Animating {
        self.transition(None)
    }
}

impl<S: LayerState> ShadowCopy for ShapeLayer<S> {
    fn shadow_copy(source: &dyn Any) -> Self {
        let typed = expect_source::<Self>(source);
        Self {
            base: BaseLayer::shadow_copy(&typed.base),
            items: Arc::clone(&typed.items),
        }
    }
}
