//! NewType wrappers for step and artifact identifiers (v0.1)
//!
//! Both ids share the same token grammar: lowercase start, then lowercase
//! alphanumerics, `-` or `_`, max 64 chars. Validation happens once at
//! construction; everything downstream clones ids for free via Arc<str>.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::StratumError;

/// Shared token grammar for step ids and artifact type ids
static ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_-]{0,63}$").unwrap());

/// Unique identifier of a registered step
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(Arc<str>);

impl StepId {
    /// Validate and wrap a step id
    pub fn new(id: impl AsRef<str>) -> Result<Self, StratumError> {
        let id = id.as_ref();
        if !ID_RE.is_match(id) {
            return Err(StratumError::InvalidStepId { id: id.to_string() });
        }
        Ok(Self(Arc::from(id)))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StepId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for StepId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for StepId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        StepId::new(&raw).map_err(serde::de::Error::custom)
    }
}

/// Type tag identifying a kind of artifact exchanged between steps
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactTypeId(Arc<str>);

impl ArtifactTypeId {
    /// Validate and wrap an artifact type id
    pub fn new(id: impl AsRef<str>) -> Result<Self, StratumError> {
        let id = id.as_ref();
        if !ID_RE.is_match(id) {
            return Err(StratumError::InvalidArtifactType { id: id.to_string() });
        }
        Ok(Self(Arc::from(id)))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArtifactTypeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for ArtifactTypeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ArtifactTypeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ArtifactTypeId::new(&raw).map_err(serde::de::Error::custom)
    }
}
