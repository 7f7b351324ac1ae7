//! Wire model of an ARNU envelope. The root element wraps a
//! `ServiceInfoList` with zero or more `ServiceInfo` items; every field is
//! optional at this level, validation happens in the parser.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(rename = "ServiceInfoList")]
    pub service_info_list: ServiceInfoList,
}

#[derive(Debug, Deserialize)]
pub struct ServiceInfoList {
    #[serde(rename = "ServiceInfo", default)]
    pub items: Vec<ServiceInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceInfo {
    #[serde(rename = "ServiceCode")]
    pub service_code: Option<String>,

    /// Explicit message-level indicator; `remove` asks receivers to take a
    /// fully-cancelled service off their displays.
    #[serde(rename = "ServiceType")]
    pub service_type: Option<String>,

    #[serde(rename = "CompanyCode")]
    pub company_code: Option<String>,

    #[serde(rename = "TransportModeCode")]
    pub transport_mode_code: Option<String>,

    #[serde(rename = "StopList")]
    pub stop_list: Option<StopList>,
}

#[derive(Debug, Deserialize)]
pub struct StopList {
    #[serde(rename = "Stop", default)]
    pub stops: Vec<Stop>,
}

#[derive(Debug, Deserialize)]
pub struct Stop {
    /// `Normal-Stop`, `Cancelled-Stop` or `Diverted-Stop`; carried as an
    /// XML attribute.
    #[serde(rename = "StopType")]
    pub stop_type: Option<String>,

    #[serde(rename = "StopCode")]
    pub stop_code: Option<String>,

    /// Service number in effect at this stop; changes mid-list when wings
    /// split or the run is renumbered.
    #[serde(rename = "StopServiceCode")]
    pub stop_service_code: Option<String>,

    #[serde(rename = "Arrival")]
    pub arrival: Option<String>,

    #[serde(rename = "ArrivalTimeDelay")]
    pub arrival_time_delay: Option<String>,

    #[serde(rename = "Departure")]
    pub departure: Option<String>,

    #[serde(rename = "DepartureTimeDelay")]
    pub departure_time_delay: Option<String>,

    #[serde(rename = "ArrivalPlatform")]
    pub arrival_platform: Option<String>,

    #[serde(rename = "ActualArrivalPlatform")]
    pub actual_arrival_platform: Option<String>,

    #[serde(rename = "DeparturePlatform")]
    pub departure_platform: Option<String>,

    #[serde(rename = "ActualDeparturePlatform")]
    pub actual_departure_platform: Option<String>,
}
