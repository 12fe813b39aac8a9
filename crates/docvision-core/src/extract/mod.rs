//! Turning free-form model replies into structured data.
//!
//! [`json`] finds the JSON object in a reply, [`normalize`] coerces its loosely
//! typed values, and [`schema`] discovers the field names a caller asked for.

pub mod json;
pub mod normalize;
pub mod schema;

pub use json::extract_json_object;
pub use normalize::{coerce_value, normalize_confidence, normalize_key, normalize_status};
pub use schema::expected_fields;
