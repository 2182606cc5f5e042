//! Type tags, erased elements, and type-erased source helpers.
//!
//! This module provides:
//! - [`Element`]: the erased value flowing between stages at runtime.
//! - [`TypeTag`]: a lightweight runtime type identifier attached to every node so
//!   the planner, the contract checker and error messages can reason about element
//!   types without carrying generic parameters.
//! - [`SourceOps`]: a type-erased interface for indexable sources (length and
//!   random access by index). Concrete implementations for `Vec<T>` are produced
//!   via [`source_ops_for`].
//!
//! The runner relies on `SourceOps` to read the root of a chain without knowing `T`
//! at compile time. Evaluation is per index, so a source only needs to answer
//! "how many elements" and "give me element `i`". All operations return `None` if
//! the dynamic payload does not match what the implementor expects.

use crate::contract::struct_fields;
use crate::error::PipeError;
use crate::PipeBound;
use serde_json::Value;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

/// A single erased element carried between stages.
///
/// Elements are reference counted so filters and reshape barriers can pass them
/// along without cloning the underlying value.
pub type Element = Arc<dyn Any + Send + Sync>;

type ToValueFn = fn(&(dyn Any + Send + Sync)) -> Option<Value>;

/// A lightweight runtime type tag.
///
/// `TypeTag` carries the `TypeId`, a readable type name, the serde field names of
/// the type (when it deserializes as a struct) and a hook producing the
/// element's `serde_json::Value` view. Equality and hashing only consider the
/// `TypeId`.
///
/// ```
/// use ironpipe::type_token::TypeTag;
/// let tag = TypeTag::of::<u32>();
/// assert_eq!(tag.name, "u32");
/// assert!(tag.fields().is_none());
/// ```
#[derive(Clone, Copy)]
pub struct TypeTag {
    /// Stable Rust type identifier.
    pub id: TypeId,
    /// Human-readable type name (best-effort).
    pub name: &'static str,
    fields: Option<&'static [&'static str]>,
    to_value: ToValueFn,
}

fn value_of<T: PipeBound>(data: &(dyn Any + Send + Sync)) -> Option<Value> {
    data.downcast_ref::<T>()
        .and_then(|t| serde_json::to_value(t).ok())
}

impl TypeTag {
    /// Construct a tag for `T`.
    pub fn of<T: PipeBound>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            fields: struct_fields::<T>(),
            to_value: value_of::<T>,
        }
    }

    /// Serde field names of the type, if it is a struct.
    #[must_use]
    pub fn fields(&self) -> Option<&'static [&'static str]> {
        self.fields
    }

    /// Whether this tag describes `T`.
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// Whether the tag describes the untyped `serde_json::Value` element type.
    #[must_use]
    pub fn is_untyped(&self) -> bool {
        self.is::<Value>()
    }

    /// The `serde_json::Value` view of an element of this type.
    pub(crate) fn to_value(&self, element: &Element) -> Option<Value> {
        (self.to_value)(&**element)
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Borrow the concrete value behind an element, or report which stage rejected it.
pub(crate) fn downcast_elem<'a, T: 'static>(
    element: &'a Element,
    stage: &str,
) -> Result<&'a T, PipeError> {
    (**element)
        .downcast_ref::<T>()
        .ok_or_else(|| PipeError::type_mismatch(stage, type_name::<T>()))
}

/// Take the concrete value out of an element, cloning only if it is still shared.
pub(crate) fn take_elem<T: PipeBound>(element: Element, stage: &str) -> Result<T, PipeError> {
    let typed = element
        .downcast::<T>()
        .map_err(|_| PipeError::type_mismatch(stage, type_name::<T>()))?;
    Ok(Arc::try_unwrap(typed).unwrap_or_else(|shared| (*shared).clone()))
}

/// Type-erased access to an indexable source.
///
/// The runner uses `SourceOps` to:
/// - compute the logical size of the source (`len`)
/// - read the element at a given index (`get`), once per index and per run
///
/// Implementations must return `None` when the provided `data` does not match
/// the payload they expect.
pub trait SourceOps: Send + Sync {
    /// Return the number of elements, or `None` if `data` is not the expected payload.
    fn len(&self, data: &dyn Any) -> Option<usize>;

    /// Return the element at `index` as an [`Element`].
    fn get(&self, data: &dyn Any, index: usize) -> Option<Element>;
}

/// Concrete `SourceOps` for a `Vec<T>` payload.
pub struct VecSourceOps<T: PipeBound>(PhantomData<T>);

impl<T: PipeBound> SourceOps for VecSourceOps<T> {
    fn len(&self, data: &dyn Any) -> Option<usize> {
        data.downcast_ref::<Vec<T>>().map(Vec::len)
    }

    fn get(&self, data: &dyn Any, index: usize) -> Option<Element> {
        let v = data.downcast_ref::<Vec<T>>()?;
        v.get(index).map(|t| Arc::new(t.clone()) as Element)
    }
}

/// Create a type-erased `SourceOps` for `Vec<T>`.
///
/// ```
/// use ironpipe::type_token::{source_ops_for, SourceOps};
/// use std::any::Any;
///
/// let ops = source_ops_for::<i64>();
/// let data: Box<dyn Any + Send + Sync> = Box::new(vec![1i64, 2, 3]);
/// assert_eq!(ops.len(data.as_ref()), Some(3));
/// ```
pub fn source_ops_for<T: PipeBound>() -> Arc<dyn SourceOps> {
    Arc::new(VecSourceOps::<T>(PhantomData))
}
