//! Document model for docsync.
//!
//! Defines the types every cache subsystem shares when it looks inside a
//! cached payload:
//! - [`Document`] and [`DocumentExt`]: raw JSON documents plus pointer helpers
//! - [`EntitySchema`]: declares an entity type's fields and label fields
//! - [`Validator`]: the schema validation collaborator (`value -> value | None`)
//! - [`DatedValue`]: documents with date-like strings lifted into real dates
//!
//! The engine never interprets documents beyond ids, these helpers, and the
//! schema; everything else is opaque domain data.

mod dates;
mod document;
mod schema;
mod validator;

pub use dates::{parse_date, DatedValue};
pub use document::{Document, DocumentExt};
pub use schema::{EntitySchema, FieldSpec, FieldType};
pub use validator::{AcceptAll, SchemaValidator, Validator};
