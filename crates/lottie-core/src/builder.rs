//! Turns a decoded document into a [`LayerTree`].

use crate::animatable::KeyframeGroup;
use crate::config::BuildOptions;
use crate::error::BuildError;
use crate::layers::{
    AnimationLayer, BaseLayer, LayerId, PreCompLayer, Repeater, RepeaterLayer, ShapeLayer,
};
use crate::time::TimeStep;
use crate::transform::{LayerTransform, ParentTransform, TransformModel};
use crate::tree::LayerTree;
use lottie_data::model::{self as data, layer_type, LottieJson};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, warn};

fn log_unsupported_layer_once(ty: u8, name: Option<&str>) {
    static UNSUPPORTED_LAYERS: OnceLock<Mutex<HashSet<u8>>> = OnceLock::new();
    let store = UNSUPPORTED_LAYERS.get_or_init(|| Mutex::new(HashSet::new()));
    if let Ok(mut seen) = store.lock() {
        if seen.insert(ty) {
            warn!(
                layer_type = ty,
                name = name.unwrap_or("unnamed"),
                "layer type is not animated and will be skipped"
            );
        }
    }
}

pub struct CompositionBuilder<'a> {
    model: &'a LottieJson,
    options: &'a BuildOptions,
    assets: HashMap<&'a str, &'a data::Asset>,
    precomp_stack: Vec<&'a str>,
    next_id: u32,
}

impl<'a> CompositionBuilder<'a> {
    pub fn new(model: &'a LottieJson, options: &'a BuildOptions) -> Self {
        let assets = model
            .assets
            .iter()
            .map(|asset| (asset.id.as_str(), asset))
            .collect();
        Self {
            model,
            options,
            assets,
            precomp_stack: Vec::new(),
            next_id: 1,
        }
    }

    pub fn build(mut self) -> Result<LayerTree, BuildError> {
        let frame_rate = self.options.frame_rate_override.unwrap_or(self.model.fr);
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(BuildError::InvalidFrameRate(frame_rate));
        }

        let model = self.model;
        let layers = self.build_composition(&model.layers, frame_rate)?;
        debug!(
            top_level = layers.len(),
            total = self.next_id - 1,
            "built layer tree"
        );

        Ok(LayerTree::new(layers, model.w, model.h, frame_rate, model.ip, model.op))
    }

    fn next_id(&mut self) -> Result<LayerId, BuildError> {
        let built = self.next_id as usize - 1;
        if built >= self.options.max_layers {
            return Err(BuildError::LayerLimit(self.options.max_layers));
        }
        let id = LayerId(self.next_id);
        self.next_id += 1;
        Ok(id)
    }

    /// Builds one composition's layers, bottom-most first.
    fn build_composition(
        &mut self,
        layers: &'a [data::Layer],
        frame_rate: f32,
    ) -> Result<Vec<AnimationLayer>, BuildError> {
        let by_index: HashMap<u32, &'a data::Layer> = layers
            .iter()
            .filter_map(|layer| layer.ind.map(|ind| (ind, layer)))
            .collect();
        let mut transforms: HashMap<u32, Arc<dyn TransformModel>> = HashMap::new();

        let mut built = Vec::with_capacity(layers.len());
        for layer in layers.iter().rev() {
            if layer.hd == Some(true) {
                continue;
            }

            let transform = shared_transform(layer, &mut transforms);
            let Some(mut node) = self.build_layer(layer, transform, frame_rate)? else {
                continue;
            };

            let mut visited: HashSet<u32> = layer.ind.into_iter().collect();
            let mut parent = layer.parent;
            while let Some(parent_ind) = parent {
                if !visited.insert(parent_ind) {
                    return Err(BuildError::ParentCycle(parent_ind));
                }
                let Some(parent_layer) = by_index.get(&parent_ind) else {
                    debug!(parent = parent_ind, "parent layer not found, ignoring");
                    break;
                };
                let inherited =
                    ParentTransform::new(shared_transform(parent_layer, &mut transforms));
                let mut wrapper = BaseLayer::new(self.next_id()?, Arc::new(inherited));
                if let Some(name) = &parent_layer.nm {
                    wrapper = wrapper.with_name(name.as_str());
                }
                node = wrapper.with_child(node).into();
                parent = parent_layer.parent;
            }

            built.push(node);
        }
        Ok(built)
    }

    fn build_layer(
        &mut self,
        layer: &'a data::Layer,
        transform: Arc<dyn TransformModel>,
        frame_rate: f32,
    ) -> Result<Option<AnimationLayer>, BuildError> {
        let mut base = BaseLayer::new(self.next_id()?, transform);
        if let Some(name) = &layer.nm {
            base = base.with_name(name.as_str());
        }
        if layer.op > layer.ip {
            base = base.with_visibility(layer.ip, layer.op);
        }

        let node = match layer.ty {
            layer_type::SHAPE => {
                let items = layer.shapes.as_deref().unwrap_or_default();
                let children = self.build_shape_items(items)?;
                ShapeLayer::new(base.with_children(children), Vec::new()).into()
            }
            layer_type::PRECOMP => {
                let ref_id = layer.ref_id.as_deref().unwrap_or_default();
                let asset_layers = self
                    .assets
                    .get(ref_id)
                    .copied()
                    .and_then(|asset: &'a data::Asset| asset.layers.as_deref())
                    .ok_or_else(|| BuildError::MissingAsset(ref_id.to_string()))?;
                if self.precomp_stack.contains(&ref_id) {
                    return Err(BuildError::RecursivePrecomp(ref_id.to_string()));
                }

                self.precomp_stack.push(ref_id);
                let children = self.build_composition(asset_layers, frame_rate);
                self.precomp_stack.pop();

                let time_step = match &layer.tm {
                    Some(tm) => TimeStep::Remap {
                        curve: KeyframeGroup::from_property(tm, |v| *v, 0.0),
                        frame_rate,
                    },
                    None => TimeStep::offset(layer.st, layer.sr),
                };
                PreCompLayer::new(base.with_children(children?), time_step).into()
            }
            layer_type::NULL => AnimationLayer::Transform(base),
            ty => {
                log_unsupported_layer_once(ty, layer.nm.as_deref());
                return Ok(None);
            }
        };
        Ok(Some(node))
    }

    /// Builds the content of a shape list, bottom-most first.
    ///
    /// The last repeater in the list repeats every item before it; items after it
    /// are drawn once, below the copies.
    fn build_shape_items(&mut self, items: &'a [data::Shape]) -> Result<Vec<AnimationLayer>, BuildError> {
        let last_repeater = items
            .iter()
            .enumerate()
            .rev()
            .find_map(|(pos, item)| match item {
                data::Shape::Repeater(shape) => Some((pos, shape)),
                _ => None,
            });

        let Some((pos, shape)) = last_repeater else {
            return self.build_plain_items(items);
        };

        let repeater = Repeater::from_shape(shape, self.options.max_repeater_copies);
        let mut layers = self.build_plain_items(&items[pos + 1..])?;

        let mut copies = Vec::with_capacity(repeater.copies);
        for index in 0..repeater.copies {
            let content = self.build_shape_items(&items[..pos])?;
            let child = ShapeLayer::new(
                BaseLayer::new(self.next_id()?, Arc::new(LayerTransform::identity())).with_children(content),
                Vec::new(),
            );
            copies.push(RepeaterLayer::new(self.next_id()?, &repeater, child, index).into());
        }
        if repeater.composite_below {
            copies.reverse();
        }
        debug!(copies = repeater.copies, "expanded repeater");

        layers.extend(copies);
        Ok(layers)
    }

    fn build_plain_items(&mut self, items: &'a [data::Shape]) -> Result<Vec<AnimationLayer>, BuildError> {
        let mut layers = Vec::new();
        let mut pending: Vec<data::Shape> = Vec::new();

        for item in items.iter().rev() {
            match item {
                data::Shape::Group(group) => {
                    if group.hd == Some(true) {
                        continue;
                    }
                    self.flush_drawables(&mut pending, &mut layers)?;
                    layers.push(self.build_group(group)?);
                }
                item if item.is_drawable() => pending.push(item.clone()),
                _ => {}
            }
        }
        self.flush_drawables(&mut pending, &mut layers)?;
        Ok(layers)
    }

    fn build_group(&mut self, group: &'a data::GroupShape) -> Result<AnimationLayer, BuildError> {
        let transform = group
            .it
            .iter()
            .find_map(|item| match item {
                data::Shape::Transform(t) => Some(LayerTransform::from_data(&t.t)),
                _ => None,
            })
            .unwrap_or_else(LayerTransform::identity);

        let mut base = BaseLayer::new(self.next_id()?, Arc::new(transform));
        if let Some(name) = &group.nm {
            base = base.with_name(name.as_str());
        }
        let children = self.build_shape_items(&group.it)?;
        Ok(ShapeLayer::new(base.with_children(children), Vec::new()).into())
    }

    fn flush_drawables(
        &mut self,
        pending: &mut Vec<data::Shape>,
        layers: &mut Vec<AnimationLayer>,
    ) -> Result<(), BuildError> {
        if pending.is_empty() {
            return Ok(());
        }
        // Collected back to front; restore document order.
        let mut items = std::mem::take(pending);
        items.reverse();
        let base = BaseLayer::new(self.next_id()?, Arc::new(LayerTransform::identity()));
        layers.push(ShapeLayer::new(base, items).into());
        Ok(())
    }
}

fn shared_transform(
    layer: &data::Layer,
    cache: &mut HashMap<u32, Arc<dyn TransformModel>>,
) -> Arc<dyn TransformModel> {
    let build = || -> Arc<dyn TransformModel> { Arc::new(LayerTransform::from_data(&layer.ks)) };
    match layer.ind {
        Some(ind) => Arc::clone(cache.entry(ind).or_insert_with(build)),
        None => build(),
    }
}
