//! Domain types for the Lightkeep registry.
//!
//! A `ServiceRecord` is the sole persisted entity. Older registries wrote
//! only the legacy `address`/`port` pair; both shapes deserialize into the
//! same optional-field struct, and the health crate decides which field to
//! probe.

use serde::{Deserialize, Deserializer, Serialize};

/// Unique identifier for a registered service.
pub type ServiceId = u64;

/// One tracked service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceRecord {
    pub id: ServiceId,
    /// Display label.
    pub name: String,
    /// Canonical address to open and probe (e.g. `http://host:port`).
    #[serde(default)]
    pub url: Option<String>,
    /// Overrides `url` for probing only.
    #[serde(default)]
    pub health_check_url: Option<String>,
    /// Legacy host field, superseded by `url` once migrated.
    #[serde(default)]
    pub address: Option<String>,
    /// Legacy port field, kept alongside `address` for older registries.
    #[serde(default)]
    pub port: Option<u16>,
    /// Client-visible sort key; need not be contiguous or unique.
    #[serde(default)]
    pub display_order: u32,
    /// Mutated only by probe results.
    #[serde(default)]
    pub status: HealthStatus,
    /// `%Y-%m-%d %H:%M:%S`, refreshed on every probe write.
    #[serde(default)]
    pub last_checked: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Health status as determined by reachability probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    #[default]
    Unknown,
}

/// Fields accepted when creating a service.
///
/// Everything except `name` is optional; legacy `address`/`port` are stored
/// as given so older clients keep working.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewService {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub health_check_url: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

/// Partial update: only fields present in the input are applied.
///
/// `health_check_url` is the one clearable field — an explicit JSON `null`
/// (or empty string) removes the override, while an absent key leaves it
/// unchanged. The double `Option` keeps that distinction through serde.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub health_check_url: Option<Option<String>>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

/// One `(id, display_order)` mapping inside a reorder batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReorderEntry {
    pub id: ServiceId,
    pub display_order: u32,
}

/// On-disk document shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryDocument {
    #[serde(default)]
    pub services: Vec<ServiceRecord>,
}

/// Distinguishes a present-but-null value from an absent key.
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}
