use crate::consts::NUM_RAILS;
use crate::protocol::commands::*;

/// Which device-internal rail a channel-select must name before a signal
/// read. The wall input is unswitched: its readings come straight off
/// standard PMBus codes with no select beforehand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RailId {
	Rail12v,
	Rail5v,
	Rail3v,
	Unswitched,
}

impl RailId {
	/// Selector byte for the channel-select command, `None` when unswitched.
	pub fn selector(self) -> Option<u8> {
		match self {
			RailId::Rail12v => Some(0x00),
			RailId::Rail5v => Some(0x01),
			RailId::Rail3v => Some(0x02),
			RailId::Unswitched => None,
		}
	}
}

pub struct Rail {
	pub id: RailId,
	pub volt_cmd: u8,
	pub amp_cmd: Option<u8>,
	pub power_cmd: u8,
	pub label: &'static str,
}

/// Channel order is the external numbering contract; do not reorder.
pub const RAILS: [Rail; NUM_RAILS] = [
	Rail {
		id: RailId::Rail12v,
		volt_cmd: SIG_VOLTS,
		amp_cmd: Some(SIG_AMPS),
		power_cmd: SIG_WATTS,
		label: "12V",
	},
	Rail {
		id: RailId::Rail5v,
		volt_cmd: SIG_VOLTS,
		amp_cmd: Some(SIG_AMPS),
		power_cmd: SIG_WATTS,
		label: "5V",
	},
	Rail {
		id: RailId::Rail3v,
		volt_cmd: SIG_VOLTS,
		amp_cmd: Some(SIG_AMPS),
		power_cmd: SIG_WATTS,
		label: "3V",
	},
	Rail {
		id: RailId::Unswitched,
		volt_cmd: SIG_WALL_VOLTS,
		amp_cmd: None,
		power_cmd: SIG_TOTAL_WATTS,
		label: "Wall",
	},
];

pub fn rail(channel: usize) -> Option<&'static Rail> {
	RAILS.get(channel)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn table_shape() {
		assert_eq!(RAILS.len(), 4);
		let labels: Vec<_> = RAILS.iter().map(|r| r.label).collect();
		assert_eq!(labels, ["12V", "5V", "3V", "Wall"]);
	}

	#[test]
	fn only_dc_rails_have_current() {
		assert!(RAILS[..3].iter().all(|r| r.amp_cmd.is_some()));
		assert!(RAILS[3].amp_cmd.is_none());
	}

	#[test]
	fn wall_rail_is_unswitched() {
		assert_eq!(RAILS[3].id, RailId::Unswitched);
		assert_eq!(RAILS[3].id.selector(), None);
		assert_eq!(RAILS[3].volt_cmd, SIG_WALL_VOLTS);
		assert_eq!(RAILS[3].power_cmd, SIG_TOTAL_WATTS);
	}

	#[test]
	fn dc_selectors_match_channel_order() {
		let selectors: Vec<_> = RAILS[..3].iter().map(|r| r.id.selector()).collect();
		assert_eq!(selectors, [Some(0x00), Some(0x01), Some(0x02)]);
	}

	#[test]
	fn out_of_range_channel_resolves_to_none() {
		assert!(rail(3).is_some());
		assert!(rail(4).is_none());
	}
}
