//! Snapshot persistence for the alarm core.
//!
//! Client activity and the report log are written to a single binary file
//! in the status directory, prefixed with a format version byte. Snapshots
//! carry state only; limit configuration always comes from the running
//! process, so config changes between restarts take effect immediately.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::activity::{ClientActivity, ClientActivityStore, ClientKey};
use crate::prelude::*;
use crate::registry::ServiceRegistry;
use crate::report::{AlarmReport, ReportLog};

pub const SNAPSHOT_FILE: &str = "guardpost-state.bin";
const SNAPSHOT_VERSION: u8 = 1;

#[derive(Debug, Deserialize, Serialize)]
struct ServiceState {
	service: Box<str>,
	clients: Vec<(ClientKey, ClientActivity)>,
}

#[derive(Debug, Deserialize, Serialize)]
struct SnapshotState {
	services: Vec<ServiceState>,
	reports: Vec<AlarmReport>,
}

fn snapshot_path(dir: &str) -> PathBuf {
	Path::new(dir).join(SNAPSHOT_FILE)
}

/// Write the current state atomically (temp file + rename). An empty
/// status directory means persistence is disabled.
pub async fn save(dir: &str, registry: &ServiceRegistry, reports: &ReportLog) -> GpResult<()> {
	if dir.is_empty() {
		debug!("No status directory configured, skipping state save");
		return Ok(());
	}

	let mut services = Vec::with_capacity(registry.len());
	registry.for_each(|entry| {
		services.push(ServiceState {
			service: entry.service.clone(),
			clients: entry.clients.snapshot_entries(),
		});
	});
	let state = SnapshotState { services, reports: reports.snapshot() };

	let mut bytes = vec![SNAPSHOT_VERSION];
	bytes.extend(bincode::serialize(&state).map_err(|err| Error::Serialization(err.to_string()))?);

	let path = snapshot_path(dir);
	let tmp = path.with_extension("bin.tmp");
	tokio::fs::write(&tmp, &bytes).await?;
	tokio::fs::rename(&tmp, &path).await?;
	info!(
		path = %path.display(),
		services = state.services.len(),
		reports = state.reports.len(),
		"Saved state snapshot"
	);
	Ok(())
}

/// Restore a snapshot into the registry and report log. A missing file is
/// a normal first start; a zero-length file (crash during a previous save)
/// is tolerated with a warning.
pub async fn load(dir: &str, registry: &ServiceRegistry, reports: &ReportLog) -> GpResult<()> {
	if dir.is_empty() {
		debug!("No status directory configured, skipping state load");
		return Ok(());
	}

	let path = snapshot_path(dir);
	let bytes = match tokio::fs::read(&path).await {
		Ok(bytes) => bytes,
		Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
			info!(path = %path.display(), "No state snapshot found, starting clean");
			return Ok(());
		}
		Err(err) => return Err(err.into()),
	};
	if bytes.is_empty() {
		warn!(path = %path.display(), "State snapshot is empty, starting clean");
		return Ok(());
	}
	if bytes[0] != SNAPSHOT_VERSION {
		return Err(Error::Serialization(format!(
			"unsupported state snapshot version {}",
			bytes[0]
		)));
	}

	let state: SnapshotState =
		bincode::deserialize(&bytes[1..]).map_err(|err| Error::Serialization(err.to_string()))?;
	let n_services = state.services.len();
	for service in state.services {
		registry.restore_clients(&service.service, ClientActivityStore::from_entries(service.clients));
	}
	let n_reports = state.reports.len();
	reports.replace_all(state.reports);
	info!(
		path = %path.display(),
		services = n_services,
		reports = n_reports,
		"Restored state snapshot"
	);
	Ok(())
}


// vim: ts=4
