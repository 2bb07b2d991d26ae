use std::time::Duration;

pub const CORSAIR_VID: u16 = 0x1b1c;
pub const HX750I_PID: u16 = 0x1c05;
pub const HX850I_PID: u16 = 0x1c06;
pub const HX1000I_PID: u16 = 0x1c07;
pub const HX1200I_PID: u16 = 0x1c08;

pub const PRODUCT_IDS: [u16; 4] = [HX750I_PID, HX850I_PID, HX1000I_PID, HX1200I_PID];

pub const OUT_REPORT_SIZE: usize = 63;
pub const IN_REPORT_SIZE: usize = 16;

pub const NUM_RAILS: usize = 4;
pub const NUM_TEMP_CHANNELS: usize = 2;

pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(300);
pub const READ_POLL_INTERVAL: Duration = Duration::from_millis(50);
