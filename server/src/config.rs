//! YAML server configuration.

use serde::Deserialize;
use std::path::Path;

use guardpost_alarm::{Limit, LimitingConf};
use guardpost_types::notify_adapter::NotifyConf;

use crate::prelude::*;

/// One watched backend service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
	pub name: String,
	/// Alarm notification recipients
	#[serde(default)]
	pub recipients: Vec<String>,
	#[serde(default)]
	pub cleanup_probability: f64,
	pub limits: Vec<Limit>,
	/// User IDs exempt from counting for this service
	#[serde(default)]
	pub allow_list: Vec<i64>,
}

/// A gateway user known to the in-memory directory.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
	pub id: i64,
	pub username: String,
	pub first_name: Option<String>,
	pub last_name: Option<String>,
	pub affiliation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
	/// Listen address, e.g. "0.0.0.0:8080"
	#[serde(default = "dflt_listen")]
	pub listen: String,
	#[serde(default)]
	pub limiting: LimitingConf,
	pub notify: NotifyConf,
	/// When false, notifications are logged instead of sent over SMTP
	#[serde(default)]
	pub smtp_enabled: bool,
	pub services: Vec<ServiceConfig>,
	#[serde(default)]
	pub users: Vec<UserConfig>,
}

fn dflt_listen() -> String {
	"0.0.0.0:8080".to_string()
}

impl ServerConfig {
	pub async fn load(path: impl AsRef<Path>) -> GpResult<Self> {
		let path = path.as_ref();
		let raw = tokio::fs::read_to_string(path).await.map_err(|err| {
			Error::Internal(format!("cannot read config file {}: {err}", path.display()))
		})?;
		let config: Self = serde_yaml::from_str(&raw)
			.map_err(|err| Error::ValidationError(format!("invalid config: {err}")))?;
		if config.services.is_empty() {
			return Err(Error::ValidationError("no services configured".into()));
		}
		info!(path = %path.display(), services = config.services.len(), "Loaded configuration");
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE: &str = r"
listen: 127.0.0.1:9090
limiting:
  statusDataDir: ''
  exceedingThreshold: 0.1
notify:
  sender: guard@example.com
  smtpServer: smtp.example.com
  confirmationBaseUrl: https://gateway.example.com
services:
  - name: demo
    recipients: [ops@example.com]
    cleanupProbability: 0.3
    limits:
      - reqPerTimeThreshold: 10
        reqCheckingIntervalSecs: 60
      - reqPerTimeThreshold: 1000
        reqCheckingIntervalSecs: 3600
    allowList: [5, 8]
users:
  - id: 7
    username: mallory
";

	#[test]
	fn test_parse_sample() {
		let config: ServerConfig = serde_yaml::from_str(SAMPLE).unwrap();
		assert_eq!(config.listen, "127.0.0.1:9090");
		assert!((config.limiting.exceeding_threshold - 0.1).abs() < 1e-9);
		assert!(!config.smtp_enabled);
		assert_eq!(config.services.len(), 1);
		let service = &config.services[0];
		assert_eq!(service.name, "demo");
		assert_eq!(service.limits.len(), 2);
		assert_eq!(service.limits[0].threshold, 10);
		assert_eq!(service.allow_list, vec![5, 8]);
		assert_eq!(config.users[0].username, "mallory");
	}
}

// vim: ts=4
