//! [`ExamApi`] over HTTP.

use std::sync::Arc;

use async_trait::async_trait;

use crate::upstream::ActiveRequest;
use crate::upstream::Category;
use crate::upstream::Endpoint;
use crate::upstream::ExamApi;
use crate::upstream::ExamDate;
use crate::upstream::ServiceCenter;
use crate::upstream::error::ClientError;
use crate::upstream::throttled_client::ThrottledClient;

pub struct HttpExamApi {
    client: Arc<ThrottledClient>,
}

impl HttpExamApi {
    pub fn new(client: Arc<ThrottledClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExamApi for HttpExamApi {
    async fn check_active_request(&self, subject_key: &str) -> Result<bool, ClientError> {
        let resp: Option<ActiveRequest> = self
            .client
            .invoke(
                Endpoint::ActiveRequest,
                &[("PersonalNumber", subject_key.to_string())],
            )
            .await?;
        Ok(resp.is_some_and(|r| r.has_active_request))
    }

    async fn list_categories(&self, subject_key: &str) -> Result<Vec<Category>, ClientError> {
        let resp: Option<Vec<Category>> = self
            .client
            .invoke(
                Endpoint::Categories,
                &[("PersonalNumber", subject_key.to_string())],
            )
            .await?;
        Ok(resp.unwrap_or_default())
    }

    async fn list_locations(&self, category_code: u32) -> Result<Vec<ServiceCenter>, ClientError> {
        let resp: Option<Vec<ServiceCenter>> = self
            .client
            .invoke(
                Endpoint::Locations,
                &[("CategoryCode", category_code.to_string())],
            )
            .await?;
        Ok(resp.unwrap_or_default())
    }

    async fn list_available_dates(
        &self,
        category_code: u32,
        location_code: u32,
    ) -> Result<Vec<ExamDate>, ClientError> {
        let resp: Option<Vec<ExamDate>> = self
            .client
            .invoke(
                Endpoint::ExamDates,
                &[
                    ("CategoryCode", category_code.to_string()),
                    ("CenterId", location_code.to_string()),
                ],
            )
            .await?;
        Ok(resp.unwrap_or_default())
    }
}
