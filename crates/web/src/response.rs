//! JSON response shapes. Field names are part of the public contract and
//! mirror the stored model.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use iff::IffError;
use model::{Attribute, AttributeProcessing, Service, ServiceSource, ServiceStop};
use serde::Serialize;
use serde_json::json;
use store::StoreError;
use utility::time::datetime_to_iso;

#[derive(Debug, Serialize)]
pub struct NumbersResponse {
    pub services: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ServicesResponse {
    pub services: Vec<ServiceResponse>,
}

impl ServicesResponse {
    pub fn from_services(services: &[Service]) -> Self {
        Self {
            services: services.iter().map(ServiceResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceResponse {
    pub service: String,
    pub service_id: String,
    pub servicedate: String,
    pub cancelled: bool,
    pub company: Option<String>,
    pub company_name: Option<String>,
    pub transport_mode: Option<String>,
    pub transport_mode_description: Option<String>,
    pub destination: Option<String>,
    pub source: ServiceSource,
    pub stops: Vec<StopResponse>,
}

impl From<&Service> for ServiceResponse {
    fn from(service: &Service) -> Self {
        Self {
            service: service.servicenumber.clone(),
            service_id: service.service_id.clone(),
            servicedate: service.servicedate_str(),
            cancelled: service.cancelled,
            company: service.company_code.clone(),
            company_name: service.company_name.clone(),
            transport_mode: service.transport_mode.clone(),
            transport_mode_description: service.transport_mode_description.clone(),
            destination: service.destination_str().map(str::to_owned),
            source: service.source,
            stops: service.stops.iter().map(StopResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub station: String,
    pub station_name: Option<String>,
    pub servicenumber: String,
    pub arrival_time: Option<String>,
    pub departure_time: Option<String>,
    pub scheduled_arrival_platform: Option<String>,
    pub actual_arrival_platform: Option<String>,
    pub arrival_platform: Option<String>,
    pub scheduled_departure_platform: Option<String>,
    pub actual_departure_platform: Option<String>,
    pub departure_platform: Option<String>,
    pub arrival_delay: i64,
    pub departure_delay: i64,
    pub cancelled_arrival: bool,
    pub cancelled_departure: bool,
    pub attributes: Vec<AttributeResponse>,
}

impl From<&ServiceStop> for StopResponse {
    fn from(stop: &ServiceStop) -> Self {
        Self {
            station: stop.stop_code.clone(),
            station_name: stop.stop_name.clone(),
            servicenumber: stop.servicenumber.clone(),
            arrival_time: datetime_to_iso(stop.arrival_time),
            departure_time: datetime_to_iso(stop.departure_time),
            scheduled_arrival_platform: stop.scheduled_arrival_platform.clone(),
            actual_arrival_platform: stop.actual_arrival_platform.clone(),
            arrival_platform: stop.arrival_platform().map(str::to_owned),
            scheduled_departure_platform: stop.scheduled_departure_platform.clone(),
            actual_departure_platform: stop.actual_departure_platform.clone(),
            departure_platform: stop.departure_platform().map(str::to_owned),
            arrival_delay: stop.arrival_delay,
            departure_delay: stop.departure_delay,
            cancelled_arrival: stop.cancelled_arrival,
            cancelled_departure: stop.cancelled_departure,
            attributes: stop.attributes.iter().map(AttributeResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AttributeResponse {
    pub code: String,
    pub description: String,
    pub processing_code: AttributeProcessing,
}

impl From<&Attribute> for AttributeResponse {
    fn from(attribute: &Attribute) -> Self {
        Self {
            code: attribute.code.clone(),
            description: attribute.description.clone(),
            processing_code: attribute.processing_code,
        }
    }
}

/// Error response: `{"error": "<status>", "message": "..."}` with
/// `content-type: application/json`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(why: StoreError) -> Self {
        ApiError::internal(why.to_string())
    }
}

impl From<IffError> for ApiError {
    fn from(why: IffError) -> Self {
        ApiError::internal(why.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.status.as_u16().to_string(),
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}
