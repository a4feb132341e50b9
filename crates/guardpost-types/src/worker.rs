//! Worker pool for offloaded alarm work (notification sends, idle-client
//! sweeps). Two lanes: normal and slow; slow jobs never starve normal ones
//! because some workers are dedicated to the normal lane.

use flume::{Receiver, Sender};
use futures::channel::oneshot;
use std::{sync::Arc, thread};

use crate::prelude::*;

#[derive(Debug)]
pub struct WorkerPool {
	normal: Sender<Box<dyn FnOnce() + Send>>,
	slow: Sender<Box<dyn FnOnce() + Send>>,
}

impl WorkerPool {
	/// `n_normal` workers drain the normal lane only; `n_shared` workers
	/// drain both lanes, preferring normal.
	pub fn new(n_normal: usize, n_shared: usize) -> Self {
		let (normal, rx_normal) = flume::unbounded();
		let (slow, rx_slow) = flume::unbounded();

		let rx_normal = Arc::new(rx_normal);
		let rx_slow = Arc::new(rx_slow);

		for _ in 0..n_normal.max(1) {
			let rx_normal = Arc::clone(&rx_normal);
			thread::spawn(move || worker_loop(&[rx_normal]));
		}

		for _ in 0..n_shared.max(1) {
			let rx_normal = Arc::clone(&rx_normal);
			let rx_slow = Arc::clone(&rx_slow);
			thread::spawn(move || worker_loop(&[rx_normal, rx_slow]));
		}

		Self { normal, slow }
	}

	/// Submit a closure → returns a Future for the result
	pub fn run<F, T>(&self, f: F) -> impl std::future::Future<Output = GpResult<T>>
	where
		F: FnOnce() -> T + Send + 'static,
		T: Send + 'static,
	{
		Self::submit(&self.normal, f)
	}

	pub fn run_slow<F, T>(&self, f: F) -> impl std::future::Future<Output = GpResult<T>>
	where
		F: FnOnce() -> T + Send + 'static,
		T: Send + 'static,
	{
		Self::submit(&self.slow, f)
	}

	/// Fire-and-forget submission. A failing job is logged under `label`
	/// and never reaches the caller.
	pub fn detach<F>(&self, label: &'static str, f: F)
	where
		F: FnOnce() -> GpResult<()> + Send + 'static,
	{
		Self::detach_to(&self.normal, label, f);
	}

	pub fn detach_slow<F>(&self, label: &'static str, f: F)
	where
		F: FnOnce() -> GpResult<()> + Send + 'static,
	{
		Self::detach_to(&self.slow, label, f);
	}

	fn submit<F, T>(
		lane: &Sender<Box<dyn FnOnce() + Send>>,
		f: F,
	) -> impl std::future::Future<Output = GpResult<T>>
	where
		F: FnOnce() -> T + Send + 'static,
		T: Send + 'static,
	{
		let (res_tx, res_rx) = oneshot::channel();

		let job = Box::new(move || {
			let result = f();
			let _ignore = res_tx.send(result);
		});

		if lane.send(job).is_err() {
			error!("Failed to send job to worker queue");
		}

		async move {
			res_rx.await.map_err(|_| {
				error!("Worker dropped result channel (task may have panicked)");
				Error::Internal("worker task failed".into())
			})
		}
	}

	fn detach_to<F>(lane: &Sender<Box<dyn FnOnce() + Send>>, label: &'static str, f: F)
	where
		F: FnOnce() -> GpResult<()> + Send + 'static,
	{
		let job = Box::new(move || {
			if let Err(err) = f() {
				error!(task = label, error = %err, "Detached worker task failed");
			}
		});
		if lane.send(job).is_err() {
			error!(task = label, "Failed to send job to worker queue");
		}
	}
}

type JobQueue = Arc<Receiver<Box<dyn FnOnce() + Send>>>;

fn worker_loop(queues: &[JobQueue]) {
	loop {
		// Try higher-priority queues first (non-blocking)
		let mut job = None;
		for rx in queues {
			if let Ok(j) = rx.try_recv() {
				job = Some(j);
				break;
			}
		}

		if let Some(job) = job {
			if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
				error!("Worker thread caught panic: {:?}", e);
			}
			continue;
		}

		// Wait for next job
		let mut selector = flume::Selector::new();
		for rx in queues {
			selector = selector.recv(rx, |res| res);
		}

		let job: Result<Box<dyn FnOnce() + Send>, flume::RecvError> = selector.wait();
		if let Ok(job) = job {
			if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
				error!("Worker thread caught panic: {:?}", e);
			}
		}
	}
}


// vim: ts=4
