//! lightkeep-health — reachability checking for registered services.
//!
//! Provides the bounded-time HTTP probe, the target resolution rules
//! (including legacy address/port migration), and the background scheduler
//! that sweeps every record on a fixed interval.
//!
//! # Architecture
//!
//! ```text
//! HealthScheduler
//!   ├── Background sweep task (one loop for the whole registry)
//!   │   ├── resolve_target() → health_check_url | url | legacy address
//!   │   ├── migrate_legacy_url() → persist synthesized url once
//!   │   ├── http_probe() → ProbeOutcome (never fails)
//!   │   └── RegistryStore::update_health()
//!   └── check_service() / check_by_id() — same path, on demand
//! ```
//!
//! Probing is best-effort by construction: the probe type has exactly two
//! values and transport failures never surface as errors. Records with no
//! resolvable target are skipped without a network call, leaving their
//! status untouched.

pub mod probe;
pub mod scheduler;
pub mod target;

pub use probe::{ProbeOutcome, http_probe, probe_client, resolve_probe_url};
pub use scheduler::{CheckOutcome, HealthScheduler};
pub use target::{migrate_legacy_url, resolve_target, synthesize_url};
