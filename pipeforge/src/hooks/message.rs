//! Inbound job notification messages.

use crate::errors::PipeforgeError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the forwarded user credential.
const CREDENTIAL_FIELD: &str = "authJWT";

/// A job notification delivered by the executor's workers.
///
/// The payload is an arbitrary JSON object; only the discriminant field and
/// a handful of well-known keys are interpreted here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobMessage(Map<String, Value>);

impl JobMessage {
    /// Wraps an already-parsed JSON object.
    #[must_use]
    pub fn new(payload: Map<String, Value>) -> Self {
        Self(payload)
    }

    /// Parses a message from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`PipeforgeError::Serialization`] unless the value is an object.
    pub fn from_value(value: Value) -> Result<Self, PipeforgeError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Parses a message from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`PipeforgeError::Serialization`] on malformed input.
    pub fn from_json(json: &str) -> Result<Self, PipeforgeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Returns the string value of the discriminant field, if present.
    #[must_use]
    pub fn discriminant(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Returns the experiment the message belongs to.
    ///
    /// Workers put it at the top level; older messages only carry it in
    /// their `input` echo.
    #[must_use]
    pub fn experiment_id(&self) -> Option<&str> {
        self.0
            .get("experimentId")
            .or_else(|| self.input().and_then(|input| input.get("experimentId")))
            .and_then(Value::as_str)
    }

    /// Returns the echoed task input, if any.
    #[must_use]
    pub fn input(&self) -> Option<&Map<String, Value>> {
        self.0.get("input").and_then(Value::as_object)
    }

    /// Returns a field of the payload.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns the raw payload.
    #[must_use]
    pub fn payload(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Returns a copy safe to forward to clients.
    ///
    /// Strips the credential at the top level and under `input`.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut payload = self.0.clone();
        payload.remove(CREDENTIAL_FIELD);
        if let Some(Value::Object(input)) = payload.get_mut("input") {
            input.remove(CREDENTIAL_FIELD);
        }
        Self(payload)
    }

    /// Consumes the message, returning it as a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for JobMessage {
    fn from(payload: Map<String, Value>) -> Self {
        Self(payload)
    }
}
