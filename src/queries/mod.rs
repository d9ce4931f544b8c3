//! Record access: one remote round trip per operation, no caching,
//! batching, or retries.

mod conversation;
mod profile;
mod usage;

pub use conversation::ConversationQueries;
pub use profile::ProfileQueries;
pub use usage::UsageQueries;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

/// Decode the object PostgREST returned for a single-row write.
///
/// Some proxies ignore the single-object `Accept` header; a one-element
/// array is accepted as well.
pub(crate) fn decode_row<T: DeserializeOwned>(value: Value) -> Result<T> {
    let value = match value {
        Value::Array(mut rows) if rows.len() == 1 => rows.remove(0),
        Value::Array(rows) => {
            return Err(Error::invalid_record(format!(
                "expected one row, backend returned {}",
                rows.len()
            )))
        }
        Value::Null => return Err(Error::invalid_record("backend returned no row")),
        other => other,
    };
    Ok(serde_json::from_value(value)?)
}
