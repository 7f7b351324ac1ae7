//! Read-only access to the IFF timetable database: scheduled services for a
//! date, hydrated into the domain model, plus the reference lookups used by
//! the realtime parser.

use std::{error, fmt, result};

use arnu::{ReferenceData, ReferenceResult};
use async_trait::async_trait;

mod source;

pub use source::IffSource;

#[derive(Debug)]
pub enum IffError {
    Database(sqlx::Error),
}

impl fmt::Display for IffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IffError::Database(why) => write!(f, "timetable database error: {why}"),
        }
    }
}

impl error::Error for IffError {}

impl From<sqlx::Error> for IffError {
    fn from(why: sqlx::Error) -> Self {
        IffError::Database(why)
    }
}

pub type Result<T> = result::Result<T, IffError>;

#[async_trait]
impl ReferenceData for IffSource {
    async fn station_name(&self, station_code: &str) -> ReferenceResult<Option<String>> {
        IffSource::station_name(self, station_code)
            .await
            .map_err(|why| Box::new(why) as _)
    }

    async fn transport_mode(&self, mode_code: &str) -> ReferenceResult<Option<String>> {
        IffSource::transport_mode(self, mode_code)
            .await
            .map_err(|why| Box::new(why) as _)
    }

    async fn company_name(&self, company_code: &str) -> ReferenceResult<Option<String>> {
        IffSource::company_name(self, company_code)
            .await
            .map_err(|why| Box::new(why) as _)
    }
}
