//! The alarm decision engine: a single dispatcher task that consumes
//! activity events from a bounded queue, updates per-client counters,
//! evaluates limits and opens alarm reports. Slow side effects
//! (notification sends, idle-client sweeps) are offloaded to the worker
//! pool so the dispatcher never blocks on I/O.

use rand::RngExt;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use guardpost_types::guard_adapter::{AllowListAdapter, BanAdapter, User, UserDirectory};
use guardpost_types::notify_adapter::{Notification, NotifyConf, NotifyTransport};
use guardpost_types::reporting_adapter::ReportingWriter;
use guardpost_types::worker::WorkerPool;

use crate::activity::ClientKey;
use crate::allow_list::AllowListCache;
use crate::conf::LimitingConf;
use crate::monitoring;
use crate::prelude::*;
use crate::registry::{Limit, ServiceAlarmConf, ServiceEntry, ServiceRegistry};
use crate::report::{AlarmReport, ReportLog, RequestSnapshot};
use crate::state;

const ALLOW_LIST_RELOAD_SECS: u64 = 60;

const STATE_IDLE: u8 = 0;
const STATE_STARTING: u8 = 1;
const STATE_RUNNING: u8 = 2;
const STATE_SHUTTING_DOWN: u8 = 3;
const STATE_STOPPED: u8 = 4;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EngineState {
	Idle,
	Starting,
	Running,
	ShuttingDown,
	Stopped,
}

impl EngineState {
	fn from_u8(v: u8) -> Self {
		match v {
			STATE_STARTING => Self::Starting,
			STATE_RUNNING => Self::Running,
			STATE_SHUTTING_DOWN => Self::ShuttingDown,
			STATE_STOPPED => Self::Stopped,
			_ => Self::Idle,
		}
	}
}

/// One observed client request against a watched service.
#[derive(Clone, Debug)]
pub struct ActivityEvent {
	pub service: Box<str>,
	pub user_id: UserId,
	pub client_ip: IpAddr,
	pub at: Timestamp,
}

/// Producer-side handle for the engine's event queue. The queue is
/// bounded; when the dispatcher falls behind, `send` waits (async) for
/// room instead of dropping the event, so abuse traffic is never the
/// traffic that gets lost.
#[derive(Clone, Debug)]
pub struct EventSender {
	tx: flume::Sender<ActivityEvent>,
}

impl EventSender {
	pub async fn send(&self, service: &str, user_id: UserId, client_ip: IpAddr) -> GpResult<()> {
		self.send_event(ActivityEvent { service: service.into(), user_id, client_ip, at: now() })
			.await
	}

	pub async fn send_event(&self, event: ActivityEvent) -> GpResult<()> {
		self.tx
			.send_async(event)
			.await
			.map_err(|_| Error::Internal("alarm engine is not accepting events".into()))
	}
}

/// External stores and transports the engine works against.
#[derive(Clone, Debug)]
pub struct Collaborators {
	pub allow_list: Arc<dyn AllowListAdapter>,
	pub bans: Arc<dyn BanAdapter>,
	pub users: Arc<dyn UserDirectory>,
	pub notify: Arc<dyn NotifyTransport>,
	pub reporting: Arc<dyn ReportingWriter>,
}

#[derive(Debug)]
pub struct AlarmEngine {
	conf: LimitingConf,
	notify_conf: NotifyConf,
	registry: ServiceRegistry,
	allow_cache: AllowListCache,
	reports: Arc<ReportLog>,
	collab: Collaborators,
	workers: Arc<WorkerPool>,
	tx: flume::Sender<ActivityEvent>,
	rx: flume::Receiver<ActivityEvent>,
	reload_tx: flume::Sender<()>,
	reload_rx: flume::Receiver<()>,
	state: AtomicU8,
	cancel: CancellationToken,
	finished: CancellationToken,
}

impl AlarmEngine {
	/// Validates the configuration and builds an idle engine; call
	/// [`run`](Self::run) to start dispatching.
	pub fn new(
		mut conf: LimitingConf,
		notify_conf: NotifyConf,
		collab: Collaborators,
		workers: Arc<WorkerPool>,
	) -> GpResult<Arc<Self>> {
		conf.validate_and_defaults()?;
		let (tx, rx) = flume::bounded(conf.event_queue_capacity);
		let (reload_tx, reload_rx) = flume::bounded(1);
		Ok(Arc::new(Self {
			conf,
			notify_conf,
			registry: ServiceRegistry::new(),
			allow_cache: AllowListCache::new(),
			reports: Arc::new(ReportLog::new()),
			collab,
			workers,
			tx,
			rx,
			reload_tx,
			reload_rx,
			state: AtomicU8::new(STATE_IDLE),
			cancel: CancellationToken::new(),
			finished: CancellationToken::new(),
		}))
	}

	pub fn register_service(&self, service: &str, conf: ServiceAlarmConf, limits: &[Limit]) {
		self.registry.register(service, conf, limits);
	}

	pub fn sender(&self) -> EventSender {
		EventSender { tx: self.tx.clone() }
	}

	pub fn reports(&self) -> Arc<ReportLog> {
		Arc::clone(&self.reports)
	}

	pub fn bans(&self) -> Arc<dyn BanAdapter> {
		Arc::clone(&self.collab.bans)
	}

	pub fn engine_state(&self) -> EngineState {
		EngineState::from_u8(self.state.load(Ordering::Acquire))
	}

	/// Ask the dispatcher for an out-of-band allow-list reload (e.g. after
	/// an allow list changed in the backing store). Coalesces when one is
	/// already pending.
	pub fn request_allow_list_reload(&self) {
		let _pending = self.reload_tx.try_send(());
	}

	/// Dispatcher loop. Runs until [`shutdown`](Self::shutdown) cancels it,
	/// then drains the events already queued before reporting finished.
	pub async fn run(self: Arc<Self>) {
		if self
			.state
			.compare_exchange(STATE_IDLE, STATE_STARTING, Ordering::AcqRel, Ordering::Acquire)
			.is_err()
		{
			warn!("Alarm engine started more than once, ignoring");
			return;
		}

		// events are evaluated against the allow list, so it must be
		// populated before the first one is taken off the queue
		self.allow_cache.reload(&self.registry, &self.collab.allow_list).await;
		// a shutdown requested during the initial load wins
		let _started = self.state.compare_exchange(
			STATE_STARTING,
			STATE_RUNNING,
			Ordering::AcqRel,
			Ordering::Acquire,
		);
		info!(
			services = self.registry.len(),
			queue_capacity = self.conf.event_queue_capacity,
			"Alarm engine running"
		);

		let mut summary = tokio::time::interval(Duration::from_secs(self.conf.summary_interval_secs));
		summary.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
		let mut allow_reload = tokio::time::interval(Duration::from_secs(ALLOW_LIST_RELOAD_SECS));
		allow_reload.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
		// both intervals fire immediately once; the startup reload above
		// already covered the allow list and an empty summary is harmless
		summary.reset();
		allow_reload.reset();

		loop {
			tokio::select! {
				() = self.cancel.cancelled() => break,
				event = self.rx.recv_async() => match event {
					Ok(event) => self.handle_event(event).await,
					Err(_) => break,
				},
				_ = summary.tick() => {
					monitoring::emit_summaries(&self.registry, &*self.collab.reporting);
				}
				_ = allow_reload.tick() => {
					self.allow_cache.reload(&self.registry, &self.collab.allow_list).await;
				}
				signal = self.reload_rx.recv_async() => {
					if signal.is_ok() {
						self.allow_cache.reload(&self.registry, &self.collab.allow_list).await;
					}
				}
			}
		}

		// events accepted before the shutdown request still get processed
		let mut drained = 0usize;
		while let Ok(event) = self.rx.try_recv() {
			self.handle_event(event).await;
			drained += 1;
		}
		if drained > 0 {
			info!(drained, "Processed queued events during shutdown");
		}

		self.state.store(STATE_STOPPED, Ordering::Release);
		self.finished.cancel();
		info!("Alarm engine stopped");
	}

	/// Request shutdown, wait for the dispatcher to drain (at most
	/// `deadline`) and snapshot the final state. The snapshot is written
	/// whether or not the drain finishes in time; a missed deadline
	/// surfaces as [`Error::Timeout`] to the caller.
	pub async fn shutdown(&self, deadline: Duration) -> GpResult<()> {
		self.state.store(STATE_SHUTTING_DOWN, Ordering::Release);
		self.cancel.cancel();
		let drained = tokio::time::timeout(deadline, self.finished.cancelled()).await;
		let saved = self.save_state().await;
		match drained {
			Ok(()) => saved,
			Err(_) => Err(Error::Timeout),
		}
	}

	/// Persist client activity and the report log to the status directory.
	pub async fn save_state(&self) -> GpResult<()> {
		state::save(&self.conf.status_data_dir, &self.registry, &self.reports).await
	}

	/// Restore a previously saved snapshot. Only meaningful before `run`;
	/// missing or empty snapshot files are not an error.
	pub async fn load_state(&self) -> GpResult<()> {
		state::load(&self.conf.status_data_dir, &self.registry, &self.reports).await
	}

	async fn handle_event(&self, event: ActivityEvent) {
		if self.allow_cache.is_ignorable(&event.service, event.user_id) {
			debug!(service = %event.service, user_id = %event.user_id, "Ignoring allow-listed client");
			return;
		}
		let Some(entry) = self.registry.get(&event.service) else {
			debug!(service = %event.service, "Activity for unregistered service, ignoring");
			return;
		};

		let key = ClientKey::new(event.user_id, event.client_ip);
		let threshold = self.conf.exceeding_threshold;
		let cooldown = i64::from(self.conf.report_cooldown_secs);

		let triggered = entry.clients.with_entry(
			key,
			self.conf.user_req_counter_buffer_size,
			self.conf.exceedings_buffer_size,
			|activity| {
				activity.requests.push(event.at);
				let mut triggered: Option<(Limit, usize)> = None;
				for (&interval, &limit) in &entry.limits {
					let observed = activity.num_req_since(event.at, interval);
					activity.exceedance.register_measurement(event.at, interval, observed, limit);
					if triggered.is_some() {
						continue;
					}
					let relative =
						activity.exceedance.relative_exceedance(event.at, interval, limit);
					if relative >= threshold {
						let in_cooldown = activity
							.last_report_at
							.is_some_and(|last| event.at.secs_since(last) < cooldown);
						if in_cooldown {
							debug!(
								service = %entry.service,
								client = %key,
								"Limit exceeded again within report cooldown, suppressing"
							);
						} else {
							activity.last_report_at = Some(event.at);
							triggered =
								Some((Limit { threshold: limit, check_interval: interval }, observed));
						}
					}
				}
				triggered
			},
		);

		if let Some((limit, observed)) = triggered {
			self.open_report(&entry, &key, limit, observed, event.at).await;
		}

		self.maybe_schedule_sweep(&entry, event.at);
	}

	async fn open_report(
		&self,
		entry: &Arc<ServiceEntry>,
		key: &ClientKey,
		limit: Limit,
		observed: usize,
		at: Timestamp,
	) {
		let snapshot = RequestSnapshot {
			service: entry.service.clone(),
			num_requests: observed,
			user_id: key.user_id,
			client_ip: key.client_ip,
			created: at,
		};
		let mut report = AlarmReport::new(snapshot, limit, at);
		report.user_info = Some(match self.collab.users.user_info(key.user_id).await {
			Ok(Some(user)) => user,
			Ok(None) => User::invalid(),
			Err(err) => {
				warn!(user_id = %key.user_id, error = %err, "User lookup failed, reporting with placeholder");
				User::invalid()
			}
		});
		warn!(
			service = %entry.service,
			client = %key,
			num_requests = observed,
			threshold = limit.threshold,
			interval = %limit.check_interval,
			"Request limit exceeded, alarm report created"
		);

		self.dispatch_notification(entry, &report);
		self.reports.push(report);
	}

	fn dispatch_notification(&self, entry: &Arc<ServiceEntry>, report: &AlarmReport) {
		if entry.conf.recipients.is_empty() {
			warn!(service = %entry.service, "No alarm recipients configured, skipping notification");
			return;
		}
		// each recipient gets their own confirmation link with the
		// reviewer identity pre-filled
		let jobs: Vec<(String, Notification)> = entry
			.conf
			.recipients
			.iter()
			.map(|recipient| {
				let notification = build_notification(
					&self.notify_conf.confirmation_base_url,
					report,
					recipient,
				);
				(recipient.clone(), notification)
			})
			.collect();
		let notify = Arc::clone(&self.collab.notify);
		let conf = self.notify_conf.clone();
		self.workers.detach("alarm notification", move || {
			for (recipient, notification) in &jobs {
				if let Err(err) =
					notify.send_notification(&conf, std::slice::from_ref(recipient), notification)
				{
					warn!(recipient = %recipient, error = %err, "Failed to send alarm notification");
				}
			}
			Ok(())
		});
	}

	/// With the service's configured probability, offload a sweep that
	/// evicts clients idle for longer than the service's longest check
	/// interval.
	fn maybe_schedule_sweep(&self, entry: &Arc<ServiceEntry>, at: Timestamp) {
		let Some(longest) = entry.longest_interval() else { return };
		if !rand::rng().random_bool(entry.conf.cleanup_probability.clamp(0.0, 1.0)) {
			return;
		}
		let entry = Arc::clone(entry);
		let edge = at.sub_secs(i64::from(longest.as_secs()));
		self.workers.detach_slow("idle client sweep", move || {
			let evicted = entry.clients.evict_idle_since(edge);
			if evicted > 0 {
				debug!(service = %entry.service, evicted, "Swept idle clients");
			}
			Ok(())
		});
	}
}

fn build_notification(base_url: &str, report: &AlarmReport, reviewer: &str) -> Notification {
	let info = &report.request_info;
	let user = report
		.user_info
		.as_ref()
		.map_or_else(|| "unknown".to_string(), |user| user.username.to_string());
	let query = serde_urlencoded::to_string([("id", &*report.review_code), ("reviewer", reviewer)])
		.unwrap_or_else(|_| format!("id={}", report.review_code));
	Notification {
		subject: format!("Request limit exceeded on service {}", info.service),
		paragraphs: vec![
			format!(
				"User {} (id {}) from {} sent {} requests to service {} within {}, exceeding the configured limit of {} by {:.0}%.",
				user,
				info.user_id,
				info.client_ip,
				info.num_requests,
				info.service,
				report.rules.check_interval,
				report.rules.threshold,
				report.exceed_percent()
			),
			format!(
				"Please review the alarm and decide whether to ban the user: {}/alarm-confirmation?{}",
				base_url.trim_end_matches('/'),
				query
			),
		],
	}
}


// vim: ts=4
