use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, trace};

use crate::consts::{IN_REPORT_SIZE, OUT_REPORT_SIZE, REQUEST_TIMEOUT};
use crate::error::{Error, Result};

/// Raw send primitive for 63-byte outbound reports.
pub trait OutputPipe {
	fn send_report(&self, data: &[u8]) -> Result<()>;
}

impl OutputPipe for hidapi::HidDevice {
	fn send_report(&self, data: &[u8]) -> Result<()> {
		self.write(data).map_err(|e| Error::Send(e.to_string()))?;
		Ok(())
	}
}

impl<P: OutputPipe> OutputPipe for Arc<P> {
	fn send_report(&self, data: &[u8]) -> Result<()> {
		(**self).send_report(data)
	}
}

struct Slot {
	data: [u8; IN_REPORT_SIZE],
	pending: bool,
}

/// Single-slot rendezvous between the inbound-report path and a blocked
/// `execute`. The PSU sends no correlation IDs, so the pending flag is the
/// sole arbiter of whether an incoming report belongs to anyone.
pub struct ReportGate {
	slot: Mutex<Slot>,
	arrived: Condvar,
}

impl ReportGate {
	fn new() -> Self {
		ReportGate {
			slot: Mutex::new(Slot {
				data: [0; IN_REPORT_SIZE],
				pending: false,
			}),
			arrived: Condvar::new(),
		}
	}

	fn arm(&self) {
		self.slot.lock().unwrap().pending = true;
	}

	fn disarm(&self) {
		self.slot.lock().unwrap().pending = false;
	}

	/// Inbound delivery, called from the reader's execution context. Reports
	/// arriving while nothing is pending are dropped so they cannot clobber a
	/// buffer a woken caller is about to read.
	pub fn deliver(&self, data: &[u8]) {
		let mut slot = self.slot.lock().unwrap();
		if !slot.pending {
			trace!("dropping unsolicited {}-byte report", data.len());
			return;
		}
		let n = data.len().min(IN_REPORT_SIZE);
		slot.data[..n].copy_from_slice(&data[..n]);
		slot.pending = false;
		self.arrived.notify_one();
	}

	fn wait(&self, timeout: Duration) -> Result<[u8; IN_REPORT_SIZE]> {
		let slot = self.slot.lock().unwrap();
		let (mut slot, result) = self
			.arrived
			.wait_timeout_while(slot, timeout, |s| s.pending)
			.unwrap();
		if result.timed_out() && slot.pending {
			// disarm so a late report is dropped instead of landing in a
			// buffer nobody reads
			slot.pending = false;
			return Err(Error::Timeout);
		}
		Ok(slot.data)
	}

	#[cfg(test)]
	fn armed(&self) -> bool {
		self.slot.lock().unwrap().pending
	}
}

/// One command/response session per attached PSU. The session mutex owns the
/// outbound buffer and serializes `execute` calls; responses are matched to
/// requests purely by ordering.
pub struct Transport<P> {
	pipe: P,
	gate: Arc<ReportGate>,
	session: Mutex<[u8; OUT_REPORT_SIZE]>,
}

impl<P: OutputPipe> Transport<P> {
	pub fn new(pipe: P) -> Self {
		Transport {
			pipe,
			gate: Arc::new(ReportGate::new()),
			session: Mutex::new([0; OUT_REPORT_SIZE]),
		}
	}

	/// Delivery handle for the inbound-report path.
	pub fn gate(&self) -> Arc<ReportGate> {
		self.gate.clone()
	}

	/// Hold the session across several commands. Rail-switched reads need the
	/// select and the read to go out back to back, with no other caller's
	/// select in between.
	pub fn lock(&self) -> TransportGuard<'_, P> {
		TransportGuard {
			buffer: self.session.lock().unwrap(),
			pipe: &self.pipe,
			gate: &self.gate,
		}
	}

	pub fn execute(&self, command: u8, b1: u8, b2: u8) -> Result<[u8; IN_REPORT_SIZE]> {
		self.lock().execute(command, b1, b2)
	}
}

pub struct TransportGuard<'a, P: OutputPipe> {
	buffer: MutexGuard<'a, [u8; OUT_REPORT_SIZE]>,
	pipe: &'a P,
	gate: &'a ReportGate,
}

impl<P: OutputPipe> TransportGuard<'_, P> {
	pub fn execute(&mut self, command: u8, b1: u8, b2: u8) -> Result<[u8; IN_REPORT_SIZE]> {
		self.buffer.fill(0);
		self.buffer[0] = command;
		self.buffer[1] = b1;
		self.buffer[2] = b2;

		// arm before sending so a fast response cannot beat the wait
		self.gate.arm();
		if let Err(e) = self.pipe.send_report(&self.buffer[..]) {
			self.gate.disarm();
			debug!("output report {command:#04x} failed: {e}");
			return Err(e);
		}
		self.gate.wait(REQUEST_TIMEOUT)
	}
}
