use crate::layers::LayerId;
use glam::Mat4;
use lottie_data::model as data;
use std::sync::Arc;

/// A snapshot of the layer tree at one composition frame.
#[derive(Debug, Clone)]
pub struct RenderTree {
    pub width: u32,
    pub height: u32,
    pub frame: f32,
    pub root: RenderNode,
}

impl RenderTree {
    pub fn find(&self, id: LayerId) -> Option<&RenderNode> {
        self.root.find(id)
    }

    /// Node count, excluding the root.
    pub fn node_count(&self) -> usize {
        self.root.descendant_count()
    }
}

#[derive(Debug, Clone)]
pub struct RenderNode {
    /// `None` for the composition root.
    pub id: Option<LayerId>,
    pub name: Option<String>,
    /// Local transform relative to the parent node.
    pub transform: Mat4,
    pub opacity: f32,
    pub content: NodeContent,
    /// Rendered from a static fallback branch.
    pub is_static: bool,
}

#[derive(Debug, Clone)]
pub enum NodeContent {
    /// Child nodes, bottom-most first.
    Group(Vec<RenderNode>),
    /// Shape items to draw, with the layer-local frame to sample them at.
    Shapes {
        items: Arc<[data::Shape]>,
        frame: f32,
    },
}

impl RenderNode {
    pub fn children(&self) -> &[RenderNode] {
        match &self.content {
            NodeContent::Group(children) => children,
            NodeContent::Shapes { .. } => &[],
        }
    }

    pub fn find(&self, id: LayerId) -> Option<&RenderNode> {
        if self.id == Some(id) {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(id))
    }

    pub fn descendant_count(&self) -> usize {
        self.children()
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }
}
