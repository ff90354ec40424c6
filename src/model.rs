//! Sample data model
//!
//! Records are immutable once created: they are inserted or deleted, never
//! updated. Identity is stable across the local cache and the remote store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// mg/dL per mmol/L for glucose.
pub const MG_PER_DL_PER_MMOL_PER_L: f64 = 18.01559;

/// Opaque identity of a sample, shared by both storage tiers
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleId(pub String);

impl SampleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identity
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SampleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlucoseUnit {
    MgPerDl,
    MmolPerL,
}

impl GlucoseUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlucoseUnit::MgPerDl => "mg/dL",
            GlucoseUnit::MmolPerL => "mmol/L",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mg/dL" => Some(GlucoseUnit::MgPerDl),
            "mmol/L" => Some(GlucoseUnit::MmolPerL),
            _ => None,
        }
    }
}

impl fmt::Display for GlucoseUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric value with its unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: GlucoseUnit,
}

impl Quantity {
    pub fn new(value: f64, unit: GlucoseUnit) -> Self {
        Self { value, unit }
    }

    pub fn mg_per_dl(value: f64) -> Self {
        Self::new(value, GlucoseUnit::MgPerDl)
    }

    /// Value expressed in `unit`
    pub fn value_in(&self, unit: GlucoseUnit) -> f64 {
        match (self.unit, unit) {
            (a, b) if a == b => self.value,
            (GlucoseUnit::MmolPerL, GlucoseUnit::MgPerDl) => self.value * MG_PER_DL_PER_MMOL_PER_L,
            (GlucoseUnit::MgPerDl, GlucoseUnit::MmolPerL) => self.value / MG_PER_DL_PER_MMOL_PER_L,
            _ => self.value,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// Device that produced a sample
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Device {
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub software_version: Option<String>,
}

/// Sync metadata supplied by the writer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncVersion {
    pub sync_identifier: String,
    pub version: i64,
}

/// A single time-stamped glucose measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub id: SampleId,
    pub quantity: Quantity,
    pub start: DateTime<Utc>,
    /// Display-only samples are calibration points, not trend data
    #[serde(default)]
    pub is_display_only: bool,
    #[serde(default)]
    pub device: Option<Device>,
    /// Source application/process that created the sample
    pub provenance: String,
    #[serde(default)]
    pub sync_version: Option<SyncVersion>,
}

impl SampleRecord {
    /// New record with a freshly generated identity
    pub fn new(quantity: Quantity, start: DateTime<Utc>, provenance: impl Into<String>) -> Self {
        Self {
            id: SampleId::generate(),
            quantity,
            start,
            is_display_only: false,
            device: None,
            provenance: provenance.into(),
            sync_version: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<SampleId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn display_only(mut self) -> Self {
        self.is_display_only = true;
        self
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_sync_version(mut self, sync_identifier: impl Into<String>, version: i64) -> Self {
        self.sync_version = Some(SyncVersion {
            sync_identifier: sync_identifier.into(),
            version,
        });
        self
    }

    pub fn mg_per_dl(&self) -> f64 {
        self.quantity.value_in(GlucoseUnit::MgPerDl)
    }
}

impl From<String> for SampleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A projected glucose effect at a point in time (mg/dL)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectPoint {
    pub start: DateTime<Utc>,
    pub value: f64,
}

impl EffectPoint {
    pub fn new(start: DateTime<Utc>, value: f64) -> Self {
        Self { start, value }
    }
}

/// Rate of glucose change over an interval (mg/dL per minute)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocityPoint {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub value: f64,
}
