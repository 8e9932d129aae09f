//! Probe target resolution and legacy record migration.
//!
//! A record has at most one effective probe target, chosen by a fixed
//! precedence over its optional fields. Records written before the `url`
//! field existed carry only `address`/`port`; the first time such a record
//! passes through a check path its synthesized URL is persisted, while the
//! legacy fields stay in place for older clients.

use tracing::info;

use lightkeep_registry::{
    RegistryResult, RegistryStore, ServiceRecord, ServiceUpdate,
};

/// Pick the effective probe target for a record.
///
/// Precedence: `health_check_url`, then `url`, then a URL synthesized from
/// the legacy `address`/`port` pair. `None` means the record cannot be
/// probed and its status stays as it is.
pub fn resolve_target(record: &ServiceRecord) -> Option<String> {
    if let Some(hc) = non_empty(&record.health_check_url) {
        return Some(hc.to_string());
    }
    if let Some(url) = non_empty(&record.url) {
        return Some(url.to_string());
    }
    non_empty(&record.address).map(|address| synthesize_url(address, record.port))
}

/// Build a canonical URL from a legacy address/port pair.
///
/// An address that already carries a scheme is taken as complete; port 80
/// is implied when the port is absent.
pub fn synthesize_url(address: &str, port: Option<u16>) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        return address.to_string();
    }
    match port {
        Some(port) => format!("http://{address}:{port}"),
        None => format!("http://{address}"),
    }
}

/// Upgrade a legacy record in place by persisting a synthesized `url`.
///
/// Idempotent: a record that already has a `url` comes back untouched with
/// no store write. Returns the record as the check path should see it.
pub fn migrate_legacy_url(
    store: &RegistryStore,
    record: &ServiceRecord,
) -> RegistryResult<ServiceRecord> {
    if non_empty(&record.url).is_some() {
        return Ok(record.clone());
    }
    let Some(address) = non_empty(&record.address) else {
        return Ok(record.clone());
    };
    let url = synthesize_url(address, record.port);
    info!(id = record.id, %url, "migrating legacy address/port to url");
    store.update(
        record.id,
        ServiceUpdate {
            url: Some(url.clone()),
            ..Default::default()
        },
    )?;
    let mut migrated = record.clone();
    migrated.url = Some(url);
    Ok(migrated)
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
