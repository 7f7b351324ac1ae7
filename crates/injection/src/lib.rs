//! Converts imminent departures into injection records and dispatches them
//! to a passenger-information system over a REQ/REP socket.

use std::{error, fmt, result};

use config::ConfigError;
use store::StoreError;

mod injector;
mod record;

pub use injector::{select_departures, Injector, REPLY_TIMEOUT};
pub use record::{InjectionRecord, StopReference};

#[derive(Debug)]
pub enum InjectorError {
    Config(ConfigError),
    Store(StoreError),
    Serialization(serde_json::Error),
    Transport(zeromq::ZmqError),
}

impl fmt::Display for InjectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InjectorError::Config(why) => write!(f, "{why}"),
            InjectorError::Store(why) => write!(f, "{why}"),
            InjectorError::Serialization(why) => write!(f, "cannot encode injection: {why}"),
            InjectorError::Transport(why) => write!(f, "transport error: {why}"),
        }
    }
}

impl error::Error for InjectorError {}

impl From<ConfigError> for InjectorError {
    fn from(why: ConfigError) -> Self {
        InjectorError::Config(why)
    }
}

impl From<StoreError> for InjectorError {
    fn from(why: StoreError) -> Self {
        InjectorError::Store(why)
    }
}

impl From<serde_json::Error> for InjectorError {
    fn from(why: serde_json::Error) -> Self {
        InjectorError::Serialization(why)
    }
}

impl From<zeromq::ZmqError> for InjectorError {
    fn from(why: zeromq::ZmqError) -> Self {
        InjectorError::Transport(why)
    }
}

pub type Result<T> = result::Result<T, InjectorError>;
