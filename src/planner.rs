//! Plan construction and explanation.
//!
//! The planner turns a backward-linked stage chain into a forward **execution plan**
//! without recursing over parent pointers, so arbitrarily long chains are planned
//! in constant stack space.
//!
//! A plan is a list of [`Segment`]s:
//!
//! 1. exactly one **source segment**, reading from the chain's root, followed by
//! 2. zero or more **reshape segments**, each headed by a barrier (sort, reverse,
//!    deduplicate) that needs its upstream fully materialized in source order.
//!
//! Every segment carries the element-wise stages (map, filter, pass-through) that run
//! on its elements. Only the last segment is evaluated with the terminal's
//! execution mode; earlier segments are materialized in order.

use crate::node::{DynOp, Node, ReshapeOp, StageKind};
use crate::node_id::StageId;
use crate::type_token::{SourceOps, TypeTag};
use std::any::Any;
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::sync::Arc;
use tracing::trace;

/// Where a segment's elements come from.
#[derive(Clone)]
pub enum SegmentHead {
    Source {
        id: StageId,
        payload: Arc<dyn Any + Send + Sync>,
        source_ops: Arc<dyn SourceOps>,
        elem_tag: TypeTag,
    },
    Reshape {
        id: StageId,
        op: Arc<dyn ReshapeOp>,
        elem_tag: TypeTag,
    },
}

/// One run of element-wise stages over a single input.
#[derive(Clone)]
pub struct Segment {
    pub head: SegmentHead,
    pub stages: Vec<(StageId, Arc<dyn DynOp>)>,
}

impl Segment {
    fn new(head: SegmentHead) -> Self {
        Self {
            head,
            stages: Vec::new(),
        }
    }

    /// Stage operations in application order.
    pub(crate) fn ops(&self) -> Vec<Arc<dyn DynOp>> {
        self.stages.iter().map(|(_, op)| Arc::clone(op)).collect()
    }
}

/// A finalized execution plan, source first.
#[derive(Clone)]
pub struct Plan {
    pub segments: Vec<Segment>,
}

impl Plan {
    /// Linearize the chain ending at `head`.
    #[must_use]
    pub fn build(head: &Arc<Node>) -> Self {
        // Walk back to the root, then replay forward.
        let mut chain: Vec<&Arc<Node>> = Vec::new();
        let mut cursor = Some(head);
        while let Some(node) = cursor {
            chain.push(node);
            cursor = node.parent();
        }
        chain.reverse();

        let mut segments: Vec<Segment> = Vec::new();
        for node in chain {
            match node.as_ref() {
                Node::Source {
                    id,
                    payload,
                    source_ops,
                    elem_tag,
                } => segments.push(Segment::new(SegmentHead::Source {
                    id: *id,
                    payload: Arc::clone(payload),
                    source_ops: Arc::clone(source_ops),
                    elem_tag: *elem_tag,
                })),
                Node::Reshape {
                    id, op, elem_tag, ..
                } => segments.push(Segment::new(SegmentHead::Reshape {
                    id: *id,
                    op: Arc::clone(op),
                    elem_tag: *elem_tag,
                })),
                Node::Transform { id, op, .. } => {
                    // The root is always a source, so a segment exists here.
                    if let Some(last) = segments.last_mut() {
                        last.stages.push((*id, Arc::clone(op)));
                    }
                }
            }
        }
        trace!(segments = segments.len(), "plan built");
        Self { segments }
    }

    /// Number of element-wise stages across all segments.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.segments.iter().map(|s| s.stages.len()).sum()
    }

    /// Number of reshape barriers.
    #[must_use]
    pub fn barrier_count(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }

    /// Describe the plan step by step.
    #[must_use]
    pub fn explain(&self) -> Explanation {
        let mut steps = Vec::new();
        let mut source_size = None;

        for segment in &self.segments {
            match &segment.head {
                SegmentHead::Source {
                    id,
                    payload,
                    source_ops,
                    elem_tag,
                } => {
                    source_size = source_ops.len(&**payload);
                    let size = source_size
                        .map_or_else(|| "unknown size".to_string(), |n| format!("{n} elements"));
                    steps.push(ExplainStep {
                        step: steps.len(),
                        stage: *id,
                        kind: "Source".to_string(),
                        description: format!("Read {elem_tag} ({size})"),
                        is_barrier: false,
                    });
                }
                SegmentHead::Reshape { id, op, elem_tag } => steps.push(ExplainStep {
                    step: steps.len(),
                    stage: *id,
                    kind: op.name().to_string(),
                    description: format!("Materialize and {} {elem_tag}", op.name()),
                    is_barrier: true,
                }),
            }
            for (id, op) in &segment.stages {
                let kind = match op.kind() {
                    StageKind::Map => "Map",
                    StageKind::PassThrough => "PassThrough",
                    StageKind::Filter => "Filter",
                };
                steps.push(ExplainStep {
                    step: steps.len(),
                    stage: *id,
                    kind: kind.to_string(),
                    description: format!("{} -> {}", op.in_tag(), op.out_tag()),
                    is_barrier: false,
                });
            }
        }

        Explanation {
            steps,
            source_size,
            stages: self.stage_count(),
            barriers: self.barrier_count(),
        }
    }
}

/// Human-readable description of a plan.
#[derive(Debug, Clone)]
pub struct Explanation {
    pub steps: Vec<ExplainStep>,
    /// Length of the root source, if its payload is readable.
    pub source_size: Option<usize>,
    /// Number of element-wise stages.
    pub stages: usize,
    /// Number of reshape barriers.
    pub barriers: usize,
}

/// A single step of an [`Explanation`].
#[derive(Debug, Clone)]
pub struct ExplainStep {
    /// Position in execution order.
    pub step: usize,
    pub stage: StageId,
    /// `Source`, `Map`, `PassThrough`, `Filter`, or the reshape name.
    pub kind: String,
    pub description: String,
    /// Whether this step materializes everything upstream of it.
    pub is_barrier: bool,
}

impl Display for Explanation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        writeln!(f, "┌─ EXECUTION PLAN ─────────────────────────────────────────────┐")?;
        writeln!(
            f,
            "│ Source Size:  {:>10}",
            self.source_size
                .map_or_else(|| "Unknown".to_string(), |s| s.to_string())
        )?;
        writeln!(f, "│ Stages:       {:>10}", self.stages)?;
        writeln!(f, "│ Barriers:     {:>10}", self.barriers)?;
        writeln!(f, "├──────────────────────────────────────────────────────────────┤")?;
        for step in &self.steps {
            let marker = if step.is_barrier { " [BARRIER]" } else { "" };
            writeln!(
                f,
                "│ Step {} {}: {}{}",
                step.step, step.stage, step.kind, marker
            )?;
            writeln!(f, "│   {}", step.description)?;
        }
        write!(f, "└──────────────────────────────────────────────────────────────┘")
    }
}
