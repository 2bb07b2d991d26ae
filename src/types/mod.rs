mod rail;
mod sensor;

pub use rail::{rail, Rail, RailId, RAILS};
pub use sensor::{Sensor, Snapshot};
