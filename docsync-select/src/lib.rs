//! Read-path selectors for docsync.
//!
//! Turns raw remote payloads into the views consumers render:
//! - [`EntitySelector`]: validated list, detail, dated, reference and
//!   paginated projections for one entity type
//! - [`ReferenceTransformer`]: `{value, label}` pairs with id fallback labels
//! - [`SelectorRegistry`]: entity type → selector lookup, isolated or global
//!
//! Selectors never fail. Unrecognized payload shapes project to empty
//! results, and items the validator rejects are dropped one by one.

mod error;
pub mod normalize;
mod reference;
mod registry;
mod selector;

pub use error::{SelectError, SelectResult};
pub use reference::{
    default_label, ExtraFn, LabelFn, Reference, ReferenceOption, ReferenceTransformer,
    DEFAULT_LABEL_FIELDS,
};
pub use registry::{DuplicatePolicy, RegistryConfig, SelectorRegistry};
pub use selector::EntitySelector;
