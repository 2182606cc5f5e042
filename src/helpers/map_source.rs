//! Associative-container adapter.
//!
//! [`from_map`] snapshots the entries of a key/value container once. The entries
//! are shared by every chain derived from the returned [`MapSource`]; [`keys`],
//! [`values`] and [`entries`] each expose them as a sequence feeding the same engine.
//!
//! Entry order is the container's iteration order at snapshot time. Use a
//! `BTreeMap` when that order must be deterministic.
//!
//! [`keys`]: MapSource::keys
//! [`values`]: MapSource::values
//! [`entries`]: MapSource::entries

use crate::helpers::stdlib::from_custom_source;
use crate::type_token::{Element, SourceOps};
use crate::{Pipe, PipeBound, Pipeline};
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

type Entries<K, V> = Arc<Vec<(K, V)>>;

/// Which half of each entry a source yields.
#[derive(Clone, Copy)]
enum Projection {
    Key,
    Value,
    Entry,
}

struct EntryOps<K, V> {
    projection: Projection,
    _kv: PhantomData<fn() -> (K, V)>,
}

impl<K: PipeBound, V: PipeBound> SourceOps for EntryOps<K, V> {
    fn len(&self, data: &dyn Any) -> Option<usize> {
        data.downcast_ref::<Entries<K, V>>().map(|e| e.len())
    }

    fn get(&self, data: &dyn Any, index: usize) -> Option<Element> {
        let (k, v) = data.downcast_ref::<Entries<K, V>>()?.get(index)?;
        Some(match self.projection {
            Projection::Key => Arc::new(k.clone()) as Element,
            Projection::Value => Arc::new(v.clone()) as Element,
            Projection::Entry => Arc::new((k.clone(), v.clone())) as Element,
        })
    }
}

/// Key/value snapshot that can be read as keys, values or pairs.
///
/// ```
/// use ironpipe::*;
/// use std::collections::BTreeMap;
///
/// # fn main() -> anyhow::Result<()> {
/// let p = Pipeline::default();
/// let ages = from_map(&p, BTreeMap::from([("ann".to_string(), 31), ("bob".to_string(), 27)]));
///
/// assert_eq!(ages.keys().collect_seq()?, vec!["ann".to_string(), "bob".to_string()]);
/// assert_eq!(ages.values().sort(|a: &i32, b: &i32| a < b).collect_seq()?, vec![27, 31]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MapSource<K, V> {
    pipeline: Pipeline,
    entries: Entries<K, V>,
}

impl<K: PipeBound, V: PipeBound> MapSource<K, V> {
    fn project<T: PipeBound>(&self, projection: Projection) -> Pipe<T> {
        from_custom_source(
            &self.pipeline,
            Arc::clone(&self.entries),
            Arc::new(EntryOps::<K, V> {
                projection,
                _kv: PhantomData,
            }),
        )
    }

    /// A chain over the keys.
    #[must_use]
    pub fn keys(&self) -> Pipe<K> {
        self.project(Projection::Key)
    }

    /// A chain over the values, in key iteration order.
    #[must_use]
    pub fn values(&self) -> Pipe<V> {
        self.project(Projection::Value)
    }

    /// A chain over `(key, value)` pairs.
    #[must_use]
    pub fn entries(&self) -> Pipe<(K, V)> {
        self.project(Projection::Entry)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Snapshot any key/value container (`HashMap`, `BTreeMap`, or an iterator of pairs).
pub fn from_map<K, V, M>(p: &Pipeline, map: M) -> MapSource<K, V>
where
    K: PipeBound,
    V: PipeBound,
    M: IntoIterator<Item = (K, V)>,
{
    MapSource {
        pipeline: p.clone(),
        entries: Arc::new(map.into_iter().collect()),
    }
}
