//! Schema registry and bidirectional feature codec.
//!
//! Converts between a human-readable attribute record and the fixed-order
//! numeric feature vector consumed by classifiers. The vector layout is fixed
//! by a [`TranslationTable`] built once from the [`Schema`].

mod attributes;
mod codec;
mod error;
mod schema;
mod translation;

pub use attributes::{AttributeValue, StudentAttributes};
pub use codec::{FeatureCodec, FeatureInput};
pub use error::CodecError;
pub use schema::{CategoryValue, FeatureSpec, Schema, VariableType, STATIC_CATEGORY};
pub use translation::TranslationTable;
