//! Type contracts for dynamically bound functions.
//!
//! Closures handed to [`Pipe::map`](crate::Pipe::map) and friends are checked by the
//! compiler. This module covers the other path: functions bound at runtime as a
//! [`BoundFn`], whose [`Signature`] is verified against the chain *when the stage is
//! constructed*, never when it is evaluated.
//!
//! # Parameter kinds
//!
//! - [`ParamType::Exact`] - the element type must be exactly the declared type.
//! - [`ParamType::Untyped`] - the universal placeholder. Any element type is accepted
//!   and the function receives the element's `serde_json::Value` view.
//! - [`ParamType::Capability`] - structural (duck-typed) satisfaction. The concrete
//!   element type must expose every field the capability requires. Field names are
//!   introspected from the type's `Deserialize` impl, so no instance is needed.
//!   When the element type is itself `serde_json::Value` nothing is known up front
//!   and the fields are checked per element during evaluation.
//!
//! # Example
//!
//! ```
//! use ironpipe::*;
//! use ironpipe::contract::{BoundFn, Capability};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct User { id: u32, name: String }
//!
//! const HAS_ID: Capability = Capability::new("HasId", &["id"]);
//!
//! # fn main() -> anyhow::Result<()> {
//! let p = Pipeline::default();
//! let users = from_vec(&p, vec![User { id: 7, name: "ada".into() }]);
//!
//! let ids = users
//!     .map_fn::<u64>(BoundFn::capability(HAS_ID, |v| v["id"].as_u64().unwrap_or(0)))?
//!     .collect_seq()?;
//! assert_eq!(ids, vec![7]);
//!
//! // Two parameters cannot be bound as a map transform.
//! let p = Pipeline::default();
//! let bad = from_vec(&p, vec![1u32]).map_fn::<u32>(BoundFn::binary(|a: &u32, b: &u32| a + b));
//! assert!(bad.is_err());
//! # Ok(())
//! # }
//! ```

use crate::error::PipeError;
use crate::type_token::{downcast_elem, Element, TypeTag};
use crate::PipeBound;
use serde::de::{self, DeserializeOwned, Visitor};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A named set of fields an element type must expose.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capability {
    /// Name used in error messages.
    pub name: &'static str,
    /// Field names that must all be present.
    pub required: &'static [&'static str],
}

impl Capability {
    /// Declare a capability.
    #[must_use]
    pub const fn new(name: &'static str, required: &'static [&'static str]) -> Self {
        Self { name, required }
    }

    /// Whether a concrete element type structurally satisfies this capability.
    #[must_use]
    pub fn satisfied_by(&self, tag: &TypeTag) -> bool {
        tag.fields()
            .is_some_and(|fields| self.required.iter().all(|r| fields.contains(r)))
    }

    fn check_value(&self, stage: &str, value: &Value) -> Result<(), PipeError> {
        let ok = value
            .as_object()
            .is_some_and(|obj| self.required.iter().all(|r| obj.contains_key(*r)));
        if ok {
            Ok(())
        } else {
            Err(PipeError::type_mismatch(
                stage,
                &format!("value with fields {:?} ({})", self.required, self.name),
            ))
        }
    }
}

/// How a bound function declares one of its parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamType {
    /// Exactly this element type.
    Exact(TypeTag),
    /// Any element type, delivered as `serde_json::Value`.
    Untyped,
    /// Any element type exposing the capability's fields, delivered as `serde_json::Value`.
    Capability(Capability),
}

impl ParamType {
    /// Exact parameter of type `T`.
    #[must_use]
    pub fn of<T: PipeBound>() -> Self {
        Self::Exact(TypeTag::of::<T>())
    }

    /// Whether an element of type `actual` may be passed for this parameter.
    #[must_use]
    pub fn accepts(&self, actual: &TypeTag) -> bool {
        match self {
            Self::Exact(declared) => declared == actual,
            Self::Untyped => true,
            Self::Capability(cap) => actual.is_untyped() || cap.satisfied_by(actual),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(tag) => write!(f, "{tag}"),
            Self::Untyped => f.write_str("<untyped>"),
            Self::Capability(cap) => write!(f, "impl {}", cap.name),
        }
    }
}

/// Declared parameter and return types of a bound function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<ParamType>,
    pub returns: Vec<TypeTag>,
}

impl Signature {
    #[must_use]
    pub fn new(params: Vec<ParamType>, returns: Vec<TypeTag>) -> Self {
        Self { params, returns }
    }
}

type ErasedCall = dyn Fn(&[Element]) -> Result<Vec<Element>, PipeError> + Send + Sync;

/// A function bound at runtime, carrying its own [`Signature`].
#[derive(Clone)]
pub struct BoundFn {
    signature: Signature,
    call: Arc<ErasedCall>,
}

fn arg<'a, T: 'static>(args: &'a [Element], index: usize) -> Result<&'a T, PipeError> {
    let element = args
        .get(index)
        .ok_or_else(|| PipeError::contract("call", format!("missing argument {index}")))?;
    downcast_elem::<T>(element, "bound function argument")
}

impl BoundFn {
    /// `fn(&I) -> O`.
    pub fn unary<I, O, F>(f: F) -> Self
    where
        I: PipeBound,
        O: PipeBound,
        F: Fn(&I) -> O + Send + Sync + 'static,
    {
        Self {
            signature: Signature::new(vec![ParamType::of::<I>()], vec![TypeTag::of::<O>()]),
            call: Arc::new(move |args| Ok(vec![Arc::new(f(arg::<I>(args, 0)?)) as Element])),
        }
    }

    /// `fn(&A, &B) -> O`.
    pub fn binary<A, B, O, F>(f: F) -> Self
    where
        A: PipeBound,
        B: PipeBound,
        O: PipeBound,
        F: Fn(&A, &B) -> O + Send + Sync + 'static,
    {
        Self {
            signature: Signature::new(
                vec![ParamType::of::<A>(), ParamType::of::<B>()],
                vec![TypeTag::of::<O>()],
            ),
            call: Arc::new(move |args| {
                let out = f(arg::<A>(args, 0)?, arg::<B>(args, 1)?);
                Ok(vec![Arc::new(out) as Element])
            }),
        }
    }

    /// `fn(&I) -> (K, V)`, a function with two return values.
    pub fn pair<I, K, V, F>(f: F) -> Self
    where
        I: PipeBound,
        K: PipeBound,
        V: PipeBound,
        F: Fn(&I) -> (K, V) + Send + Sync + 'static,
    {
        Self {
            signature: Signature::new(
                vec![ParamType::of::<I>()],
                vec![TypeTag::of::<K>(), TypeTag::of::<V>()],
            ),
            call: Arc::new(move |args| {
                let (k, v) = f(arg::<I>(args, 0)?);
                Ok(vec![Arc::new(k) as Element, Arc::new(v) as Element])
            }),
        }
    }

    /// `fn(&Value) -> O` accepting any element type.
    pub fn untyped<O, F>(f: F) -> Self
    where
        O: PipeBound,
        F: Fn(&Value) -> O + Send + Sync + 'static,
    {
        Self::from_value_fn(ParamType::Untyped, f)
    }

    /// `fn(&Value) -> O` accepting element types that satisfy `cap`.
    pub fn capability<O, F>(cap: Capability, f: F) -> Self
    where
        O: PipeBound,
        F: Fn(&Value) -> O + Send + Sync + 'static,
    {
        Self::from_value_fn(ParamType::Capability(cap), f)
    }

    fn from_value_fn<O, F>(param: ParamType, f: F) -> Self
    where
        O: PipeBound,
        F: Fn(&Value) -> O + Send + Sync + 'static,
    {
        Self {
            signature: Signature::new(vec![param], vec![TypeTag::of::<O>()]),
            call: Arc::new(move |args| Ok(vec![Arc::new(f(arg::<Value>(args, 0)?)) as Element])),
        }
    }

    /// Bind an arbitrary erased callable under an explicit signature.
    ///
    /// Arguments declared `Untyped` or `Capability` arrive as `serde_json::Value`
    /// elements; `Exact` arguments arrive as the declared type.
    pub fn from_parts<F>(signature: Signature, call: F) -> Self
    where
        F: Fn(&[Element]) -> Result<Vec<Element>, PipeError> + Send + Sync + 'static,
    {
        Self {
            signature,
            call: Arc::new(call),
        }
    }

    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Call with already adapted arguments; the result has one element per declared return.
    pub(crate) fn invoke(&self, stage: &str, args: &[Element]) -> Result<Vec<Element>, PipeError> {
        let out = (self.call)(args)?;
        if out.len() == self.signature.returns.len() {
            Ok(out)
        } else {
            Err(PipeError::contract(
                stage,
                format!(
                    "function declared {} return value(s) but produced {}",
                    self.signature.returns.len(),
                    out.len()
                ),
            ))
        }
    }

    /// Convert raw elements into the argument forms this function expects.
    pub(crate) fn adapt_args(
        &self,
        stage: &str,
        tags: &[TypeTag],
        args: Vec<Element>,
    ) -> Result<Vec<Element>, PipeError> {
        self.signature
            .params
            .iter()
            .zip(tags)
            .zip(args)
            .map(|((param, tag), element)| match param {
                ParamType::Exact(_) => Ok(element),
                ParamType::Untyped => Ok(Arc::new(value_view(stage, tag, &element)?) as Element),
                ParamType::Capability(cap) => {
                    let value = value_view(stage, tag, &element)?;
                    if tag.is_untyped() {
                        cap.check_value(stage, &value)?;
                    }
                    Ok(Arc::new(value) as Element)
                }
            })
            .collect()
    }
}

fn value_view(stage: &str, tag: &TypeTag, element: &Element) -> Result<Value, PipeError> {
    tag.to_value(element)
        .ok_or_else(|| PipeError::type_mismatch(stage, tag.name))
}

/// Verify a signature against the parameter types a stage will pass and the
/// return types it needs (`None` accepts any type).
pub fn check_signature(
    stage: &str,
    sig: &Signature,
    params: &[TypeTag],
    returns: &[Option<TypeTag>],
) -> Result<(), PipeError> {
    if sig.params.len() != params.len() {
        return Err(PipeError::contract(
            stage,
            format!(
                "expected {} parameter(s), found {}",
                params.len(),
                sig.params.len()
            ),
        ));
    }
    for (i, (declared, actual)) in sig.params.iter().zip(params).enumerate() {
        if !declared.accepts(actual) {
            let reason = match declared {
                ParamType::Capability(cap) => format!(
                    "parameter {i}: {actual} does not expose fields {:?} required by {}",
                    cap.required, cap.name
                ),
                _ => format!("parameter {i}: declared {declared}, chain provides {actual}"),
            };
            return Err(PipeError::contract(stage, reason));
        }
    }
    if sig.returns.len() != returns.len() {
        return Err(PipeError::contract(
            stage,
            format!(
                "expected {} return value(s), found {}",
                returns.len(),
                sig.returns.len()
            ),
        ));
    }
    for (i, (declared, wanted)) in sig.returns.iter().zip(returns).enumerate() {
        if let Some(wanted) = wanted.filter(|w| w != declared) {
            return Err(PipeError::contract(
                stage,
                format!("return {i}: declared {declared}, stage requires {wanted}"),
            ));
        }
    }
    Ok(())
}

/// Map transform: one parameter accepting `input`, one return which becomes the new output type.
pub fn check_map(input: TypeTag, sig: &Signature) -> Result<TypeTag, PipeError> {
    check_signature("map", sig, &[input], &[None])?;
    Ok(sig.returns[0])
}

/// Filter predicate: one parameter accepting `input`, one `bool` return.
pub fn check_filter(input: TypeTag, sig: &Signature) -> Result<(), PipeError> {
    check_signature("filter", sig, &[input], &[Some(TypeTag::of::<bool>())])
}

/// Sort comparator: two parameters accepting `input`, one `bool` return.
pub fn check_less(input: TypeTag, sig: &Signature) -> Result<(), PipeError> {
    check_signature("sort", sig, &[input, input], &[Some(TypeTag::of::<bool>())])
}

/// Reduce combiner: `(acc, input) -> acc`.
pub fn check_reduce(acc: TypeTag, input: TypeTag, sig: &Signature) -> Result<(), PipeError> {
    check_signature("reduce", sig, &[acc, input], &[Some(acc)])
}

/// A deserializer that records the field list a struct asks for, then bails.
struct FieldProbe<'a> {
    fields: &'a mut Option<&'static [&'static str]>,
}

impl<'de> de::Deserializer<'de> for FieldProbe<'_> {
    type Error = de::value::Error;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        Err(de::Error::custom("not a struct"))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        *self.fields = Some(fields);
        Err(de::Error::custom("field probe"))
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map enum identifier ignored_any
    }
}

/// Serde field names of `T` when it deserializes as a struct.
pub(crate) fn struct_fields<T: DeserializeOwned>() -> Option<&'static [&'static str]> {
    let mut fields = None;
    let _ = T::deserialize(FieldProbe { fields: &mut fields });
    fields
}
