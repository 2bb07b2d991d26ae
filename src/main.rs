mod cli;
mod consts;
mod device;
mod error;
mod protocol;
mod transport;
mod types;

use anyhow::Result;
use clap::Parser;
use hidapi::HidApi;
use std::thread;
use std::time::Duration;

use cli::{Cli, Commands, Kind};
use device::Psu;
use types::{Sensor, RAILS};

fn main() -> Result<()> {
	env_logger::init();
	let cli = Cli::parse();
	let api = HidApi::new()?;

	match cli.command {
		Commands::List => cmd_list(&api),
		Commands::Info => cmd_info(&api, cli.serial.as_deref()),
		Commands::Sensors => cmd_sensors(&api, cli.serial.as_deref()),
		Commands::Read { kind, channel } => cmd_read(&api, cli.serial.as_deref(), kind, channel),
		Commands::Monitor { interval } => cmd_monitor(&api, cli.serial.as_deref(), interval),
	}
}

fn cmd_list(api: &HidApi) -> Result<()> {
	let found = device::enumerate(api);
	if found.is_empty() {
		println!("No HXi power supply found.");
		return Ok(());
	}
	for d in found {
		println!(
			"{}  serial {}  ({})",
			device::model_name(d.product_id()),
			d.serial_number().unwrap_or("unknown"),
			d.path().to_string_lossy(),
		);
	}
	Ok(())
}

fn cmd_info(api: &HidApi, serial: Option<&str>) -> Result<()> {
	let psu = Psu::open(api, serial)?;
	println!("Corsair {} power supply", device::model_name(psu.info.pid));
	println!("  Product:  {}", psu.info.product);
	println!("  Serial:   {}", psu.info.serial);
	Ok(())
}

fn fmt_value(value: Option<i64>, scale: f64, unit: &str) -> String {
	match value {
		Some(v) => format!("{:.2} {unit}", v as f64 / scale),
		None => "n/a".to_string(),
	}
}

fn cmd_sensors(api: &HidApi, serial: Option<&str>) -> Result<()> {
	let psu = Psu::open(api, serial)?;
	let snap = psu.snapshot();

	for (i, t) in snap.temps.iter().enumerate() {
		println!("Temp {}: {:>12}", i + 1, fmt_value(*t, 1000.0, "C"));
	}
	for i in 0..Sensor::Voltage.channels() {
		let amps = match snap.amps.get(i) {
			Some(a) => fmt_value(*a, 1000.0, "A"),
			None => "-".to_string(),
		};
		println!(
			"{:<6} {:>11} {:>11} {:>11}",
			psu.label(Sensor::Voltage, i).unwrap_or("?"),
			fmt_value(snap.volts[i], 1000.0, "V"),
			amps,
			fmt_value(snap.power[i], 1_000_000.0, "W"),
		);
	}
	Ok(())
}

fn cmd_read(api: &HidApi, serial: Option<&str>, kind: Kind, channel: usize) -> Result<()> {
	let sensor = match kind {
		Kind::Temp => Sensor::Temp,
		Kind::Volts => Sensor::Voltage,
		Kind::Amps => Sensor::Current,
		Kind::Watts => Sensor::Power,
	};
	let psu = Psu::open(api, serial)?;
	let value = psu.read(sensor, channel)?;
	println!("{value}");
	Ok(())
}

fn cmd_monitor(api: &HidApi, serial: Option<&str>, interval: u64) -> Result<()> {
	let psu = Psu::open(api, serial)?;
	eprintln!("Monitoring {} (Ctrl+C to stop)...", psu.info.product);

	loop {
		let snap = psu.snapshot();
		let mut parts = Vec::new();
		for (i, rail) in RAILS.iter().enumerate() {
			parts.push(format!(
				"{} {}",
				rail.label,
				fmt_value(snap.volts[i], 1000.0, "V")
			));
		}
		for (i, t) in snap.temps.iter().enumerate() {
			parts.push(format!("T{} {}", i + 1, fmt_value(*t, 1000.0, "C")));
		}
		parts.push(format!("In {}", fmt_value(snap.power[3], 1_000_000.0, "W")));
		eprint!("\r{}   ", parts.join(" | "));
		thread::sleep(Duration::from_millis(interval));
	}
}
