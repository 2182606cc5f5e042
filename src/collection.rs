use crate::contract::{check_filter, check_map, BoundFn};
use crate::error::PipeError;
use crate::node::{DynOp, Node, StageKind};
use crate::node_id::StageId;
use crate::pipeline::Pipeline;
use crate::planner::{Explanation, Plan};
use crate::runner::{ExecMode, Runner};
use crate::type_token::{downcast_elem, Element, TypeTag};
use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;

/// Bound every element type flowing through a [`Pipe`] must satisfy.
pub trait PipeBound: 'static + Send + Sync + Clone + Serialize + DeserializeOwned {}
impl<T> PipeBound for T where T: 'static + Send + Sync + Clone + Serialize + DeserializeOwned {}

/// Typed handle on an immutable stage chain.
///
/// Building stages is lazy: `map`, `filter` and friends only allocate a new node
/// pointing at the current one. Work happens when a terminal runs. Handles are cheap
/// to clone, and the same chain can be evaluated any number of times in any mode.
#[derive(Clone)]
pub struct Pipe<T> {
    pub(crate) pipeline: Pipeline,
    pub(crate) head: Arc<Node>,
    _t: PhantomData<fn() -> T>,
}

impl<T> Pipe<T> {
    pub(crate) fn from_node(pipeline: Pipeline, node: Node) -> Self {
        Self {
            pipeline,
            head: Arc::new(node),
            _t: PhantomData,
        }
    }
}

/// ---- Element-wise DynOps ----
struct MapOp<I, O, F>(F, PhantomData<fn(I) -> O>);
impl<I, O, F> DynOp for MapOp<I, O, F>
where
    I: PipeBound,
    O: PipeBound,
    F: Send + Sync + Fn(&I) -> O + 'static,
{
    fn apply(&self, input: Element) -> Result<Option<Element>, PipeError> {
        let value = downcast_elem::<I>(&input, "map")?;
        Ok(Some(Arc::new(self.0(value)) as Element))
    }
    fn kind(&self) -> StageKind {
        StageKind::Map
    }
    fn in_tag(&self) -> TypeTag {
        TypeTag::of::<I>()
    }
    fn out_tag(&self) -> TypeTag {
        TypeTag::of::<O>()
    }
}

struct FilterOp<T, P>(P, PhantomData<fn(T)>);
impl<T, P> DynOp for FilterOp<T, P>
where
    T: PipeBound,
    P: Send + Sync + Fn(&T) -> bool + 'static,
{
    fn apply(&self, input: Element) -> Result<Option<Element>, PipeError> {
        let keep = self.0(downcast_elem::<T>(&input, "filter")?);
        Ok(keep.then_some(input))
    }
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }
    fn in_tag(&self) -> TypeTag {
        TypeTag::of::<T>()
    }
    fn out_tag(&self) -> TypeTag {
        TypeTag::of::<T>()
    }
}

struct PassThroughOp(TypeTag);
impl DynOp for PassThroughOp {
    fn apply(&self, input: Element) -> Result<Option<Element>, PipeError> {
        Ok(Some(input))
    }
    fn kind(&self) -> StageKind {
        StageKind::PassThrough
    }
    fn in_tag(&self) -> TypeTag {
        self.0
    }
    fn out_tag(&self) -> TypeTag {
        self.0
    }
}

/// A map or filter stage backed by a dynamically bound function.
struct BoundOp {
    func: BoundFn,
    kind: StageKind,
    in_tag: TypeTag,
    out_tag: TypeTag,
}

impl BoundOp {
    fn stage(&self) -> &'static str {
        match self.kind {
            StageKind::Filter => "filter",
            StageKind::Map | StageKind::PassThrough => "map",
        }
    }
}

impl DynOp for BoundOp {
    fn apply(&self, input: Element) -> Result<Option<Element>, PipeError> {
        let stage = self.stage();
        let args = self
            .func
            .adapt_args(stage, &[self.in_tag], vec![Arc::clone(&input)])?;
        let mut out = self.func.invoke(stage, &args)?;
        let first = out
            .pop()
            .ok_or_else(|| PipeError::contract(stage, "function returned no value"))?;
        match self.kind {
            StageKind::Filter => {
                let keep = *downcast_elem::<bool>(&first, stage)?;
                Ok(keep.then_some(input))
            }
            StageKind::Map | StageKind::PassThrough => Ok(Some(first)),
        }
    }
    fn kind(&self) -> StageKind {
        self.kind
    }
    fn in_tag(&self) -> TypeTag {
        self.in_tag
    }
    fn out_tag(&self) -> TypeTag {
        self.out_tag
    }
}

impl<T: PipeBound> Pipe<T> {
    fn push(self, op: Arc<dyn DynOp>) -> Node {
        Node::Transform {
            id: self.pipeline.next_stage_id(),
            parent: Some(self.head),
            op,
        }
    }

    /// Transform every element.
    pub fn map<O, F>(self, f: F) -> Pipe<O>
    where
        O: PipeBound,
        F: 'static + Send + Sync + Fn(&T) -> O,
    {
        let pipeline = self.pipeline.clone();
        let node = self.push(Arc::new(MapOp::<T, O, F>(f, PhantomData)));
        Pipe::from_node(pipeline, node)
    }

    /// Keep only elements matching `pred`. Elements are not copied.
    pub fn filter<F>(self, pred: F) -> Pipe<T>
    where
        F: 'static + Send + Sync + Fn(&T) -> bool,
    {
        let pipeline = self.pipeline.clone();
        let node = self.push(Arc::new(FilterOp::<T, F>(pred, PhantomData)));
        Pipe::from_node(pipeline, node)
    }

    /// A map stage without a function: values pass through unchanged.
    pub fn pass_through(self) -> Pipe<T> {
        let pipeline = self.pipeline.clone();
        let node = self.push(Arc::new(PassThroughOp(TypeTag::of::<T>())));
        Pipe::from_node(pipeline, node)
    }

    /// Bind a runtime function as a map stage producing `O`.
    ///
    /// # Errors
    /// [`PipeError::Contract`] if the function does not take exactly one parameter
    /// accepting `T` and return exactly one `O`.
    pub fn map_fn<O: PipeBound>(self, func: BoundFn) -> Result<Pipe<O>> {
        let in_tag = TypeTag::of::<T>();
        let declared = check_map(in_tag, func.signature())?;
        let out_tag = TypeTag::of::<O>();
        if declared != out_tag {
            return Err(PipeError::contract(
                "map",
                format!("function returns {declared}, stage expects {out_tag}"),
            )
            .into());
        }
        let pipeline = self.pipeline.clone();
        let node = self.push(Arc::new(BoundOp {
            func,
            kind: StageKind::Map,
            in_tag,
            out_tag,
        }));
        Ok(Pipe::from_node(pipeline, node))
    }

    /// Bind a runtime predicate as a filter stage.
    ///
    /// # Errors
    /// [`PipeError::Contract`] unless the function takes one parameter accepting `T`
    /// and returns one `bool`.
    pub fn filter_fn(self, func: BoundFn) -> Result<Pipe<T>> {
        let tag = TypeTag::of::<T>();
        check_filter(tag, func.signature())?;
        let pipeline = self.pipeline.clone();
        let node = self.push(Arc::new(BoundOp {
            func,
            kind: StageKind::Filter,
            in_tag: tag,
            out_tag: tag,
        }));
        Ok(Pipe::from_node(pipeline, node))
    }

    /// Id of the last stage in this chain.
    #[must_use]
    pub fn stage_id(&self) -> StageId {
        self.head.id()
    }

    /// Element type at the end of the chain.
    #[must_use]
    pub fn out_tag(&self) -> TypeTag {
        self.head.out_tag()
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// A runner for custom terminals in the given mode.
    #[must_use]
    pub fn runner(&self, mode: ExecMode) -> Runner {
        self.pipeline.runner(mode)
    }

    /// Describe how this chain would be executed.
    #[must_use]
    pub fn explain(&self) -> Explanation {
        Plan::build(&self.head).explain()
    }
}
