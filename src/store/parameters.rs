use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, StorageError};

/// Metadata section holding the parameters a run was started with.
pub const INITIAL_PARAMETERS: &str = "initial_parameters";

/// Parameter field that selects which run to load; never overwritten.
pub const LOAD_DATA_ID: &str = "load_data_id";

/// Overwrite the fields of `parameters` with the values stored in the run
/// metadata under `initial_parameters`.
///
/// Only fields `parameters` already has are touched, and `load_data_id`
/// keeps the caller's value.
///
/// A field is known only if `P` serializes it. Fields behind
/// `#[serde(skip_serializing_if = ...)]` are restored only while they are
/// being serialized, so a `None` hidden that way stays `None`, and
/// `#[serde(skip)]` fields come back as `Default`. Parameter types should
/// serialize every field unconditionally.
pub fn overlay_initial_parameters<P>(parameters: P, metadata: &Value) -> Result<P>
where
    P: Serialize + DeserializeOwned,
{
    let stored = metadata
        .get(INITIAL_PARAMETERS)
        .and_then(Value::as_object)
        .ok_or(StorageError::MissingMetadata(INITIAL_PARAMETERS))?;

    let mut current = serde_json::to_value(parameters)?;
    let fields = current.as_object_mut().ok_or_else(|| {
        StorageError::InvalidParameters("must serialize to a JSON object".to_string())
    })?;

    for (name, value) in fields.iter_mut() {
        if name == LOAD_DATA_ID {
            continue;
        }
        if let Some(stored_value) = stored.get(name) {
            log::debug!("parameter '{name}': {value} -> {stored_value}");
            *value = stored_value.clone();
        }
    }

    Ok(serde_json::from_value(current)?)
}
