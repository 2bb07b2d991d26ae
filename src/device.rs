use anyhow::{bail, Context, Result};
use hidapi::{HidApi, HidDevice};
use log::{debug, info};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::consts::*;
use crate::error::Error;
use crate::protocol::commands::*;
use crate::protocol::linear;
use crate::transport::{OutputPipe, ReportGate, Transport};
use crate::types::{rail, Rail, Sensor, Snapshot};

pub fn model_name(pid: u16) -> &'static str {
	match pid {
		HX750I_PID => "HX750i",
		HX850I_PID => "HX850i",
		HX1000I_PID => "HX1000i",
		HX1200I_PID => "HX1200i",
		_ => "unknown HXi",
	}
}

#[derive(Debug)]
pub struct PsuInfo {
	pub product: String,
	pub serial: String,
	pub pid: u16,
}

/// All attached HXi supplies, in enumeration order.
pub fn enumerate(api: &HidApi) -> Vec<&hidapi::DeviceInfo> {
	api.device_list()
		.filter(|d| d.vendor_id() == CORSAIR_VID && PRODUCT_IDS.contains(&d.product_id()))
		.collect()
}

fn detect<'a>(api: &'a HidApi, serial: Option<&str>) -> Result<&'a hidapi::DeviceInfo> {
	let matches = enumerate(api);
	if matches.is_empty() {
		bail!("no HXi power supply found (VID:{CORSAIR_VID:#06x}). Is it plugged in?");
	}
	match serial {
		None => Ok(matches[0]),
		Some(sn) => match matches.into_iter().find(|d| d.serial_number() == Some(sn)) {
			Some(found) => Ok(found),
			None => bail!("no HXi power supply with serial {sn}"),
		},
	}
}

pub struct Psu<P = Arc<HidDevice>> {
	transport: Transport<P>,
	pub info: PsuInfo,
	stop: Option<Arc<AtomicBool>>,
	reader: Option<JoinHandle<()>>,
}

impl Psu<Arc<HidDevice>> {
	pub fn open(api: &HidApi, serial: Option<&str>) -> Result<Self> {
		let found = detect(api, serial)?;
		let info = PsuInfo {
			product: found
				.product_string()
				.unwrap_or(model_name(found.product_id()))
				.to_string(),
			serial: found.serial_number().unwrap_or("").to_string(),
			pid: found.product_id(),
		};

		let dev = Arc::new(
			found
				.open_device(api)
				.with_context(|| format!("opening {}", info.product))?,
		);
		let transport = Transport::new(dev.clone());
		let stop = Arc::new(AtomicBool::new(false));
		let reader = {
			let gate = transport.gate();
			let stop = stop.clone();
			let dev = dev.clone();
			thread::spawn(move || reader_loop(dev, gate, stop))
		};
		info!("opened {} (serial {:?})", info.product, info.serial);

		Ok(Psu {
			transport,
			info,
			stop: Some(stop),
			reader: Some(reader),
		})
	}
}

/// Blocking read loop feeding the transport's delivery hook. Runs until the
/// stop flag is raised or the device disappears.
fn reader_loop(dev: Arc<HidDevice>, gate: Arc<ReportGate>, stop: Arc<AtomicBool>) {
	let mut buf = [0u8; IN_REPORT_SIZE];
	while !stop.load(Ordering::Relaxed) {
		match dev.read_timeout(&mut buf, READ_POLL_INTERVAL.as_millis() as i32) {
			Ok(0) => {} // poll tick, nothing arrived
			Ok(n) => gate.deliver(&buf[..n]),
			Err(e) => {
				// device gone; any waiter will run into its timeout
				debug!("input report read failed: {e}");
				break;
			}
		}
	}
}

impl<P> Drop for Psu<P> {
	fn drop(&mut self) {
		if let Some(stop) = self.stop.take() {
			stop.store(true, Ordering::Relaxed);
		}
		if let Some(reader) = self.reader.take() {
			let _ = reader.join();
		}
	}
}

impl<P: OutputPipe> Psu<P> {
	fn get_temperature(&self, channel: usize) -> Result<i64, Error> {
		let sig = if channel == 0 { SIG_TEMP_1 } else { SIG_TEMP_2 };
		let resp = self
			.transport
			.execute(CMD_READ_SIGNAL, sig, 0x00)
			.map_err(|_| Error::NoData)?;
		Ok(raw_temperature(&resp) as i64)
	}

	/// Selects the rail (when switched) and reads one signal. The two
	/// commands go out under a single transport lock so a concurrent caller
	/// cannot slip its own select in between.
	fn get_data(&self, rail: &Rail, sig: u8) -> Result<i64, Error> {
		let mut guard = self.transport.lock();
		if let Some(selector) = rail.id.selector() {
			guard
				.execute(CMD_SELECT_RAIL, 0x00, selector)
				.map_err(|_| Error::NoData)?;
		}
		let resp = guard
			.execute(CMD_READ_SIGNAL, sig, 0x00)
			.map_err(|_| Error::NoData)?;
		Ok(linear::decode(raw_sample(&resp)) as i64)
	}

	/// Reads one sensor channel. Values are milli-units, except power which
	/// carries an extra x1000 and temperatures which are the device's raw
	/// integer.
	pub fn read(&self, sensor: Sensor, channel: usize) -> Result<i64, Error> {
		if channel >= sensor.channels() {
			return Err(Error::NotSupported);
		}
		match sensor {
			Sensor::Temp => self.get_temperature(channel),
			Sensor::Voltage => {
				let rail = rail(channel).ok_or(Error::NotSupported)?;
				self.get_data(rail, rail.volt_cmd)
			}
			Sensor::Current => {
				let rail = rail(channel).ok_or(Error::NotSupported)?;
				let sig = rail.amp_cmd.ok_or(Error::NotSupported)?;
				self.get_data(rail, sig)
			}
			Sensor::Power => {
				let rail = rail(channel).ok_or(Error::NotSupported)?;
				Ok(self.get_data(rail, rail.power_cmd)? * 1000)
			}
		}
	}

	pub fn label(&self, sensor: Sensor, channel: usize) -> Result<&'static str, Error> {
		if channel >= sensor.channels() {
			return Err(Error::NotSupported);
		}
		match sensor {
			Sensor::Temp => Err(Error::NotSupported),
			_ => rail(channel).map(|r| r.label).ok_or(Error::NotSupported),
		}
	}

	/// Every channel is read-only.
	pub fn write(&self, _sensor: Sensor, _channel: usize, _value: i64) -> Result<(), Error> {
		Err(Error::NotSupported)
	}

	pub fn snapshot(&self) -> Snapshot {
		Snapshot {
			temps: std::array::from_fn(|i| self.read(Sensor::Temp, i).ok()),
			volts: std::array::from_fn(|i| self.read(Sensor::Voltage, i).ok()),
			amps: std::array::from_fn(|i| self.read(Sensor::Current, i).ok()),
			power: std::array::from_fn(|i| self.read(Sensor::Power, i).ok()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::{Mutex, OnceLock};

	/// Answers every send in-line with a fixed 16-byte report whose sample
	/// bytes are 0x01 0x00: raw LE 0x0001 (decodes to 2000), raw BE 0x0100.
	struct EchoPipe {
		gate: OnceLock<Arc<ReportGate>>,
		sent: Mutex<Vec<Vec<u8>>>,
		fail: bool,
	}

	impl OutputPipe for EchoPipe {
		fn send_report(&self, data: &[u8]) -> crate::error::Result<()> {
			if self.fail {
				return Err(Error::Send("mock send failure".into()));
			}
			self.sent.lock().unwrap().push(data.to_vec());
			let mut resp = [0u8; IN_REPORT_SIZE];
			resp[2] = 0x01;
			resp[3] = 0x00;
			if let Some(gate) = self.gate.get() {
				gate.deliver(&resp);
			}
			Ok(())
		}
	}

	fn test_psu(fail: bool) -> (Arc<EchoPipe>, Psu<Arc<EchoPipe>>) {
		let pipe = Arc::new(EchoPipe {
			gate: OnceLock::new(),
			sent: Mutex::new(Vec::new()),
			fail,
		});
		let transport = Transport::new(pipe.clone());
		let _ = pipe.gate.set(transport.gate());
		let psu = Psu {
			transport,
			info: PsuInfo {
				product: "HX850i".into(),
				serial: "TEST".into(),
				pid: HX850I_PID,
			},
			stop: None,
			reader: None,
		};
		(pipe, psu)
	}

	#[test]
	fn voltage_read_selects_then_reads() {
		let (pipe, psu) = test_psu(false);
		let value = psu.read(Sensor::Voltage, 0).unwrap();
		assert_eq!(value, 2000);

		let sent = pipe.sent.lock().unwrap();
		assert_eq!(sent.len(), 2);
		assert_eq!(&sent[0][..3], &[CMD_SELECT_RAIL, 0x00, 0x00]);
		assert_eq!(&sent[1][..3], &[CMD_READ_SIGNAL, SIG_VOLTS, 0x00]);
	}

	#[test]
	fn wall_voltage_skips_the_select() {
		let (pipe, psu) = test_psu(false);
		psu.read(Sensor::Voltage, 3).unwrap();

		let sent = pipe.sent.lock().unwrap();
		assert_eq!(sent.len(), 1);
		assert_eq!(&sent[0][..3], &[CMD_READ_SIGNAL, SIG_WALL_VOLTS, 0x00]);
	}

	#[test]
	fn power_gets_the_extra_scaling() {
		let (_, psu) = test_psu(false);
		assert_eq!(psu.read(Sensor::Power, 0).unwrap(), 2_000_000);
		assert_eq!(psu.read(Sensor::Voltage, 0).unwrap(), 2000);
	}

	#[test]
	fn temperature_is_raw_big_endian() {
		let (pipe, psu) = test_psu(false);
		assert_eq!(psu.read(Sensor::Temp, 0).unwrap(), 0x0100);
		assert_eq!(psu.read(Sensor::Temp, 1).unwrap(), 0x0100);

		let sent = pipe.sent.lock().unwrap();
		assert_eq!(&sent[0][..3], &[CMD_READ_SIGNAL, SIG_TEMP_1, 0x00]);
		assert_eq!(&sent[1][..3], &[CMD_READ_SIGNAL, SIG_TEMP_2, 0x00]);
	}

	#[test]
	fn unsupported_channels_are_rejected() {
		let (_, psu) = test_psu(false);
		assert!(matches!(
			psu.read(Sensor::Current, 3),
			Err(Error::NotSupported)
		));
		assert!(matches!(psu.read(Sensor::Temp, 2), Err(Error::NotSupported)));
		assert!(matches!(
			psu.read(Sensor::Voltage, 4),
			Err(Error::NotSupported)
		));
	}

	#[test]
	fn writes_are_rejected() {
		let (_, psu) = test_psu(false);
		assert!(matches!(
			psu.write(Sensor::Voltage, 0, 12_000),
			Err(Error::NotSupported)
		));
	}

	#[test]
	fn labels_follow_the_rail_table() {
		let (_, psu) = test_psu(false);
		assert_eq!(psu.label(Sensor::Voltage, 0).unwrap(), "12V");
		assert_eq!(psu.label(Sensor::Power, 3).unwrap(), "Wall");
		assert_eq!(psu.label(Sensor::Current, 2).unwrap(), "3V");
		assert!(psu.label(Sensor::Current, 3).is_err());
		assert!(psu.label(Sensor::Temp, 0).is_err());
	}

	#[test]
	fn transport_failures_collapse_to_no_data() {
		let (_, psu) = test_psu(true);
		assert!(matches!(psu.read(Sensor::Voltage, 0), Err(Error::NoData)));
		assert!(matches!(psu.read(Sensor::Temp, 0), Err(Error::NoData)));
	}

	#[test]
	fn snapshot_marks_failed_channels() {
		let (_, psu) = test_psu(true);
		let snap = psu.snapshot();
		assert!(snap.temps.iter().all(Option::is_none));
		assert!(snap.volts.iter().all(Option::is_none));

		let (_, psu) = test_psu(false);
		let snap = psu.snapshot();
		assert_eq!(snap.volts[0], Some(2000));
		assert_eq!(snap.amps.len(), 3);
		assert_eq!(snap.power[3], Some(2_000_000));
	}
}
