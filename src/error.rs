use thiserror::Error;

/// Driver-level errors. Transport callers see `Send`/`Timeout`; the sensor
/// surface collapses both into `NoData`.
#[derive(Debug, Error)]
pub enum Error {
	#[error("failed to send output report: {0}")]
	Send(String),

	#[error("timed out waiting for device response")]
	Timeout,

	#[error("attribute not supported")]
	NotSupported,

	#[error("no data available")]
	NoData,
}

pub type Result<T> = std::result::Result<T, Error>;
