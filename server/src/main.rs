//! Guardpost server: loads the YAML configuration, wires the in-memory
//! collaborators into the alarm engine and serves the HTTP surface.
//!
//! The gateway's request path reports activity through `POST /activity`;
//! everything else is the operator-facing alarm API.

mod adapters;
mod config;
mod notify;
mod prelude;

use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	routing::post,
};
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use guardpost_alarm::{AlarmEngine, Collaborators, EventSender, ServiceAlarmConf, api};
use guardpost_types::notify_adapter::NotifyTransport;
use guardpost_types::worker::WorkerPool;

use crate::config::ServerConfig;
use crate::prelude::*;

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_target(false)
		.init();

	if let Err(err) = run().await {
		error!(error = %err, "Guardpost failed to start");
		std::process::exit(1);
	}
}

fn config_path() -> String {
	std::env::args()
		.nth(1)
		.or_else(|| std::env::var("GUARDPOST_CONFIG").ok())
		.unwrap_or_else(|| "guardpost.yaml".to_string())
}

async fn run() -> GpResult<()> {
	let config = ServerConfig::load(config_path()).await?;

	let notify: Arc<dyn NotifyTransport> = if config.smtp_enabled {
		Arc::new(notify::SmtpNotifyTransport)
	} else {
		Arc::new(notify::LogNotifyTransport)
	};
	let collab = Collaborators {
		allow_list: Arc::new(adapters::ConfigAllowList::from_services(&config.services)),
		bans: Arc::new(adapters::MemBanStore::new()),
		users: Arc::new(adapters::ConfigUserDirectory::from_users(&config.users)),
		notify,
		reporting: Arc::new(adapters::LogReportingWriter),
	};
	let workers = Arc::new(WorkerPool::new(2, 2));

	let engine = AlarmEngine::new(config.limiting.clone(), config.notify.clone(), collab, workers)?;
	for service in &config.services {
		engine.register_service(
			&service.name,
			ServiceAlarmConf {
				recipients: service.recipients.clone(),
				cleanup_probability: service.cleanup_probability,
			},
			&service.limits,
		);
	}
	engine.load_state().await?;

	let dispatcher = tokio::spawn(Arc::clone(&engine).run());

	let router = Router::new()
		.route("/activity", post(post_activity))
		.with_state(engine.sender())
		.merge(api::routes(Arc::clone(&engine)));

	let listener = tokio::net::TcpListener::bind(&config.listen).await?;
	info!(listen = %config.listen, "Guardpost listening");
	axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

	info!("Shutting down");
	engine.shutdown(SHUTDOWN_DEADLINE).await?;
	let _stopped = dispatcher.await;
	Ok(())
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		error!(error = %err, "Failed to listen for shutdown signal");
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityBody {
	service: String,
	user_id: i64,
	client_ip: IpAddr,
}

/// Activity ingestion for the gateway's request path. Waits for queue
/// room instead of dropping events when the dispatcher is behind.
async fn post_activity(
	State(sender): State<EventSender>,
	Json(body): Json<ActivityBody>,
) -> GpResult<StatusCode> {
	sender.send(&body.service, UserId(body.user_id), body.client_ip).await?;
	Ok(StatusCode::ACCEPTED)
}

// vim: ts=4
