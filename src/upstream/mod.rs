//! Upstream exam-booking service: wire types, the throttled client and the API adapter.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;

use crate::upstream::error::ClientError;

pub mod error;
pub mod exam_api;
pub mod throttled_client;

/// Upstream operations reachable through [`throttled_client::ThrottledClient`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ActiveRequest,
    Categories,
    Locations,
    ExamDates,
}

impl Endpoint {
    /// Path relative to the service base url.
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::ActiveRequest => "/DriverLicenseActiveRequest2",
            Endpoint::Categories => "/DrivingLicenseExamsCategories2",
            Endpoint::Locations => "/DrivingLicenseExamsCenters2",
            Endpoint::ExamDates => "/DrivingLicenseExamsDates2",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Endpoint::ActiveRequest => "check-active-request",
            Endpoint::Categories => "list-categories",
            Endpoint::Locations => "list-locations",
            Endpoint::ExamDates => "list-available-dates",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRequest {
    #[serde(default)]
    pub has_active_request: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Category {
    pub code: u32,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCenter {
    pub service_center_id: u32,
    pub service_center_name: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDate {
    pub exam_date: String,
}

/// The four logical operations of the upstream service.
///
/// Listings return an empty vector when the service answers with nothing.
#[async_trait]
pub trait ExamApi: Send + Sync {
    async fn check_active_request(&self, subject_key: &str) -> Result<bool, ClientError>;

    async fn list_categories(&self, subject_key: &str) -> Result<Vec<Category>, ClientError>;

    async fn list_locations(&self, category_code: u32) -> Result<Vec<ServiceCenter>, ClientError>;

    async fn list_available_dates(
        &self,
        category_code: u32,
        location_code: u32,
    ) -> Result<Vec<ExamDate>, ClientError>;
}
