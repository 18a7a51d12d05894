//! Answers "is there an exam slot for this subscriber right now, and where".

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use log::warn;

use crate::entity::Subscriber;
use crate::service::availability::AvailabilityResult;
use crate::service::availability::Slot;
use crate::service::availability::UnavailableReason;
use crate::service::label_cache::TtlCache;
use crate::upstream::Category;
use crate::upstream::ExamApi;
use crate::upstream::ServiceCenter;
use crate::upstream::error::ClientError;

pub const UNKNOWN_LOCATION: &str = "Unknown center";
pub const UNKNOWN_CATEGORY: &str = "Unknown category";

pub struct AvailabilityProbe {
    api: Arc<dyn ExamApi>,
    categories: TtlCache<String, Vec<Category>>,
    locations: TtlCache<u32, Vec<ServiceCenter>>,
}

impl AvailabilityProbe {
    /// `label_cache_ttl` of zero re-queries the label listings on every probe.
    pub fn new(api: Arc<dyn ExamApi>, label_cache_ttl: Duration) -> Self {
        Self {
            api,
            categories: TtlCache::new(label_cache_ttl),
            locations: TtlCache::new(label_cache_ttl),
        }
    }

    pub async fn probe(&self, subscriber: &Subscriber) -> AvailabilityResult {
        self.check(
            &subscriber.subject_key,
            subscriber.watch_category,
            subscriber.watch_location,
        )
        .await
    }

    /// Never fails: upstream errors come back as an unavailable result.
    pub async fn check(
        &self,
        subject_key: &str,
        category_code: u32,
        location_code: u32,
    ) -> AvailabilityResult {
        match self
            .try_check(subject_key, category_code, location_code)
            .await
        {
            Ok(result) => result,
            Err(ClientError::RateLimited) => {
                warn!("Probe for category {category_code} at {location_code} was rate limited.");
                AvailabilityResult::Unavailable(UnavailableReason::RateLimited)
            }
            Err(ClientError::Upstream(e)) => {
                warn!("Probe for category {category_code} at {location_code} failed: {e}");
                AvailabilityResult::Unavailable(UnavailableReason::UpstreamError)
            }
        }
    }

    async fn try_check(
        &self,
        subject_key: &str,
        category_code: u32,
        location_code: u32,
    ) -> Result<AvailabilityResult, ClientError> {
        if self.api.check_active_request(subject_key).await? {
            debug!("Subject has an active request, skipping date lookup.");
            return Ok(AvailabilityResult::Unavailable(
                UnavailableReason::ActiveRequest,
            ));
        }

        let dates = self
            .api
            .list_available_dates(category_code, location_code)
            .await?;
        // Upstream order is authoritative.
        let Some(first) = dates.into_iter().next() else {
            return Ok(AvailabilityResult::Unavailable(UnavailableReason::NoSlots));
        };

        let location_label = self.location_label(category_code, location_code).await;
        let category_label = self.category_label(subject_key, category_code).await;

        Ok(AvailabilityResult::Available(Slot {
            date: first.exam_date,
            location_label,
            category_label,
        }))
    }

    async fn location_label(&self, category_code: u32, location_code: u32) -> String {
        let locations = match self.locations.get(&category_code) {
            Some(hit) => Ok(hit),
            None => self.api.list_locations(category_code).await.inspect(|fresh| {
                self.locations.insert(category_code, fresh.clone());
            }),
        };
        match locations {
            Ok(locations) => locations
                .into_iter()
                .find(|l| l.service_center_id == location_code)
                .map(|l| l.service_center_name)
                .unwrap_or_else(|| UNKNOWN_LOCATION.to_string()),
            Err(e) => {
                warn!("Failed to resolve location label for {location_code}: {e}");
                UNKNOWN_LOCATION.to_string()
            }
        }
    }

    async fn category_label(&self, subject_key: &str, category_code: u32) -> String {
        let categories = match self.categories.get(&subject_key.to_string()) {
            Some(hit) => Ok(hit),
            None => self.api.list_categories(subject_key).await.inspect(|fresh| {
                self.categories.insert(subject_key.to_string(), fresh.clone());
            }),
        };
        match categories {
            Ok(categories) => categories
                .into_iter()
                .find(|c| c.code == category_code)
                .map(|c| c.name)
                .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
            Err(e) => {
                warn!("Failed to resolve category label for {category_code}: {e}");
                UNKNOWN_CATEGORY.to_string()
            }
        }
    }
}
