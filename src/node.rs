use crate::error::PipeError;
use crate::node_id::StageId;
use crate::type_token::{Element, SourceOps, TypeTag};
use std::any::Any;
use std::sync::Arc;

/// What an element-wise stage does, for explanations and logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageKind {
    Map,
    PassThrough,
    Filter,
}

/// An element-wise stage: one element in, zero or one element out.
pub trait DynOp: Send + Sync {
    /// Apply the stage. `Ok(None)` means the element was dropped by a filter.
    fn apply(&self, input: Element) -> Result<Option<Element>, PipeError>;

    fn kind(&self) -> StageKind;
    fn in_tag(&self) -> TypeTag;
    fn out_tag(&self) -> TypeTag;
}

/// A whole-sequence stage (sort, reverse, deduplicate). Its parent is
/// materialized in source order before it runs.
pub trait ReshapeOp: Send + Sync {
    fn apply(&self, input: Vec<Element>) -> Result<Vec<Element>, PipeError>;

    fn name(&self) -> &'static str;
}

/// One node of an immutable, backward-linked stage chain.
///
/// A root node owns its source data; every other node owns its parent.
/// Nodes are never mutated after construction, so a chain can be shared
/// by any number of workers and by any number of derived chains.
#[derive(Clone)]
pub enum Node {
    Source {
        id: StageId,
        payload: Arc<dyn Any + Send + Sync>,
        source_ops: Arc<dyn SourceOps>,
        elem_tag: TypeTag,
    },
    Transform {
        id: StageId,
        /// Always `Some` outside of `drop`.
        parent: Option<Arc<Node>>,
        op: Arc<dyn DynOp>,
    },

    /// Barrier node: materializes `parent`, then rewrites the whole sequence.
    Reshape {
        id: StageId,
        /// Always `Some` outside of `drop`.
        parent: Option<Arc<Node>>,
        op: Arc<dyn ReshapeOp>,
        elem_tag: TypeTag,
    },
}

impl Node {
    #[must_use]
    pub fn id(&self) -> StageId {
        match self {
            Self::Source { id, .. } | Self::Transform { id, .. } | Self::Reshape { id, .. } => *id,
        }
    }

    /// Element type produced by this node.
    #[must_use]
    pub fn out_tag(&self) -> TypeTag {
        match self {
            Self::Source { elem_tag, .. } | Self::Reshape { elem_tag, .. } => *elem_tag,
            Self::Transform { op, .. } => op.out_tag(),
        }
    }

    #[must_use]
    pub fn parent(&self) -> Option<&Arc<Node>> {
        match self {
            Self::Source { .. } => None,
            Self::Transform { parent, .. } | Self::Reshape { parent, .. } => parent.as_ref(),
        }
    }

    fn take_parent(&mut self) -> Option<Arc<Node>> {
        match self {
            Self::Source { .. } => None,
            Self::Transform { parent, .. } | Self::Reshape { parent, .. } => parent.take(),
        }
    }
}

// Unlink ancestors one at a time; the derived drop would recurse once per stage.
impl Drop for Node {
    fn drop(&mut self) {
        let mut next = self.take_parent();
        while let Some(parent) = next {
            next = Arc::into_inner(parent).and_then(|mut node| node.take_parent());
        }
    }
}
