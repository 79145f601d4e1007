//! Message batch codec.
//!
//! A message task's `data` is a JSON array of strings. Decoding takes two
//! passes: the outer array, then each string into the job's message type.
//! When the message type is `String` the second pass is skipped.

use std::any::Any;

use serde::de::DeserializeOwned;

/// Decode the outer string array. Anything else yields no items.
pub fn decode_batch(data: Option<&str>) -> Vec<String> {
    let Some(data) = data.filter(|d| !d.trim().is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<String>>(data) {
        Ok(items) => items,
        Err(err) => {
            tracing::warn!(error = %err, "Message batch is not a JSON string array");
            Vec::new()
        }
    }
}

/// Decode each raw message into `M`, skipping the ones that fail.
pub fn decode_items<M>(mut raw: Vec<String>) -> Vec<M>
where
    M: DeserializeOwned + 'static,
{
    if let Some(items) = (&mut raw as &mut dyn Any).downcast_mut::<Vec<M>>() {
        return std::mem::take(items);
    }

    raw.iter()
        .enumerate()
        .filter_map(|(index, s)| match serde_json::from_str::<M>(s) {
            Ok(item) => Some(item),
            Err(err) => {
                tracing::warn!(index, error = %err, "Skipping undecodable message");
                None
            }
        })
        .collect()
}
