pub(crate) mod collect;
pub(crate) mod fold;
pub(crate) mod keyed;
pub(crate) mod map_source;
pub(crate) mod predicates;
pub(crate) mod range;
pub(crate) mod reshape;
pub(crate) mod stdlib;

// Only re-export files with top-level functions
pub use map_source::*;
pub use range::*;
pub use stdlib::*;
