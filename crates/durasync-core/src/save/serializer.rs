//! Model ⇄ text conversion.
//!
//! Serializers operate on `serde_json::Value` so they can sit behind
//! `Arc<dyn SaveSerializer>`; services convert typed models at the edge with
//! [`to_value`] and [`from_value`].

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

pub trait SaveSerializer: Send + Sync {
    fn serialize(&self, value: &Value) -> CoreResult<String>;

    /// `Err` carries a human-readable reason; it is never propagated as a
    /// hard failure by the services.
    fn try_deserialize(&self, text: &str) -> Result<Value, String>;
}

/// Plain JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSaveSerializer {
    pretty: bool,
}

impl JsonSaveSerializer {
    pub fn new() -> Self {
        Self { pretty: false }
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl SaveSerializer for JsonSaveSerializer {
    fn serialize(&self, value: &Value) -> CoreResult<String> {
        let text =
            if self.pretty { serde_json::to_string_pretty(value)? } else { serde_json::to_string(value)? };
        Ok(text)
    }

    fn try_deserialize(&self, text: &str) -> Result<Value, String> {
        if text.trim().is_empty() {
            return Err("Payload is empty".to_string());
        }
        serde_json::from_str(text).map_err(|e| format!("Invalid JSON payload: {}", e))
    }
}

pub(crate) fn to_value<T: Serialize + ?Sized>(model: &T) -> CoreResult<Value> {
    serde_json::to_value(model).map_err(|e| CoreError::Serialization(e.to_string()))
}

pub(crate) fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, String> {
    serde_json::from_value(value).map_err(|e| format!("Payload does not match model: {}", e))
}

/// Serialize a typed model straight to payload text.
pub fn serialize_model<T: Serialize + ?Sized>(
    serializer: &dyn SaveSerializer,
    model: &T,
) -> CoreResult<String> {
    serializer.serialize(&to_value(model)?)
}

/// Deserialize payload text into a typed model.
pub fn deserialize_model<T: DeserializeOwned>(
    serializer: &dyn SaveSerializer,
    text: &str,
) -> Result<T, String> {
    from_value(serializer.try_deserialize(text)?)
}
