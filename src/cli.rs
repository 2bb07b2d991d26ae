use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "hxi-psu", about = "Telemetry monitor for Corsair HXi power supplies")]
pub struct Cli {
	#[arg(
		short,
		long,
		help = "Device serial number (auto-detects if not specified)"
	)]
	pub serial: Option<String>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
	#[command(about = "List attached HXi power supplies")]
	List,
	#[command(about = "Show device info (model, product, serial)")]
	Info,
	#[command(about = "Read every sensor channel once")]
	Sensors,
	#[command(about = "Read a single sensor channel, raw value on stdout")]
	Read {
		#[arg(value_enum)]
		kind: Kind,

		#[arg(help = "Channel index (rail order: 12V, 5V, 3V, Wall)")]
		channel: usize,
	},
	#[command(about = "Continuously refresh all sensor readings")]
	Monitor {
		#[arg(long, default_value_t = 1000, help = "Milliseconds between polls")]
		interval: u64,
	},
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Kind {
	Temp,
	Volts,
	Amps,
	Watts,
}
