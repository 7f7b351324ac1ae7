pub mod filter;
pub mod service;

pub use filter::{
    departure_time_window, is_service_included, match_filter, ServiceFilter, ServiceSelection,
    StoreSelector,
};
pub use service::{Attribute, AttributeProcessing, Service, ServiceSource, ServiceStop};
