//! Parser for realtime "ARNU" service update envelopes. One inbound XML
//! document is reconciled into a list of services, each tagged with whether
//! it should be stored or removed from the actual tier.

use std::{error, fmt, result};

use async_trait::async_trait;

mod message;
mod parser;

pub use parser::{parse_message, Action};

pub type ReferenceResult<T> =
    result::Result<T, Box<dyn error::Error + Send + Sync>>;

/// Lookup of human-readable descriptions for the codes carried by an
/// envelope. Implemented by the timetable source; tests use an in-memory
/// stub.
#[async_trait]
pub trait ReferenceData: Send + Sync {
    async fn station_name(&self, station_code: &str) -> ReferenceResult<Option<String>>;
    async fn transport_mode(&self, mode_code: &str) -> ReferenceResult<Option<String>>;
    async fn company_name(&self, company_code: &str) -> ReferenceResult<Option<String>>;
}

#[derive(Debug)]
pub enum ArnuError {
    /// The document as a whole cannot be parsed.
    Xml(String),
    /// A single service info item is unusable; the rest of the envelope is
    /// still processed.
    MalformedService(String),
    /// A description lookup failed (typically database connectivity).
    Reference(Box<dyn error::Error + Send + Sync>),
}

impl fmt::Display for ArnuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArnuError::Xml(why) => write!(f, "cannot parse ARNU message: {why}"),
            ArnuError::MalformedService(why) => {
                write!(f, "malformed service info: {why}")
            }
            ArnuError::Reference(why) => write!(f, "reference lookup failed: {why}"),
        }
    }
}

impl error::Error for ArnuError {}

pub type Result<T> = result::Result<T, ArnuError>;
