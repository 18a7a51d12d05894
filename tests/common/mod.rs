//! Common test utilities and mock implementations.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use exam_watch::entity::ContactMethod;
use exam_watch::entity::Subscriber;
use exam_watch::notifier::DeliveryOutcome;
use exam_watch::notifier::NotificationDispatcher;
use exam_watch::repository::MemoryStore;
use exam_watch::repository::SubscriberStore;
use exam_watch::service::AvailabilityProbe;
use exam_watch::service::Slot;
use exam_watch::task::monitor_scheduler::MonitorScheduler;
use exam_watch::upstream::Category;
use exam_watch::upstream::ExamApi;
use exam_watch::upstream::ExamDate;
use exam_watch::upstream::ServiceCenter;
use exam_watch::upstream::error::ClientError;
use exam_watch::upstream::error::UpstreamError;
use tokio::sync::Notify;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Returns a unique path for a temporary store file.
#[allow(dead_code)]
pub fn temp_store_path() -> PathBuf {
    std::env::temp_dir().join(format!("exam-watch-test-{}.json", Uuid::new_v4()))
}

/// Removes a temporary store file.
#[allow(dead_code)]
pub fn teardown_store(path: PathBuf) {
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
}

// MOCK EXAM API

/// How a mocked upstream call fails.
#[derive(Clone, Copy, Debug)]
#[allow(dead_code)]
pub enum Failure {
    RateLimited,
    Upstream,
    Panic,
}

impl Failure {
    fn raise(self) -> ClientError {
        match self {
            Failure::RateLimited => ClientError::RateLimited,
            Failure::Upstream => ClientError::Upstream(UpstreamError::Http {
                status: 500,
                message: "mock failure".to_string(),
            }),
            Failure::Panic => panic!("mock upstream panic"),
        }
    }
}

/// State for the mock exam api.
#[derive(Default)]
pub struct MockExamState {
    pub active_requests: HashSet<String>,
    pub dates: HashMap<(u32, u32), Vec<String>>,
    pub locations: HashMap<u32, Vec<ServiceCenter>>,
    pub categories: HashMap<String, Vec<Category>>,
    /// Failure injected into every call made for a subject.
    pub subject_failures: HashMap<String, Failure>,
    /// Failure injected into the date listing.
    pub dates_failure: Option<Failure>,
    pub labels_failure: Option<Failure>,
}

/// In-memory exam api that records every call in order.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct MockExamApi {
    pub state: Arc<RwLock<MockExamState>>,
    pub calls: Arc<Mutex<Vec<&'static str>>>,
    /// When set, the active request check waits for a permit.
    pub gate: Option<Arc<Semaphore>>,
    /// Signalled when a gated call starts waiting.
    pub entered: Arc<Notify>,
}

#[allow(dead_code)]
impl MockExamApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let api = Self {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (api, gate)
    }

    pub fn set_dates(&self, category: u32, location: u32, dates: &[&str]) {
        self.state
            .write()
            .unwrap()
            .dates
            .insert((category, location), dates.iter().map(|d| d.to_string()).collect());
    }

    pub fn set_active_request(&self, subject_key: &str, active: bool) {
        let mut state = self.state.write().unwrap();
        if active {
            state.active_requests.insert(subject_key.to_string());
        } else {
            state.active_requests.remove(subject_key);
        }
    }

    pub fn set_location(&self, category: u32, id: u32, name: &str) {
        self.state
            .write()
            .unwrap()
            .locations
            .entry(category)
            .or_default()
            .push(ServiceCenter {
                service_center_id: id,
                service_center_name: name.to_string(),
            });
    }

    pub fn set_category(&self, subject_key: &str, code: u32, name: &str) {
        self.state
            .write()
            .unwrap()
            .categories
            .entry(subject_key.to_string())
            .or_default()
            .push(Category {
                code,
                name: name.to_string(),
            });
    }

    pub fn fail_subject(&self, subject_key: &str, failure: Failure) {
        self.state
            .write()
            .unwrap()
            .subject_failures
            .insert(subject_key.to_string(), failure);
    }

    pub fn fail_dates(&self, failure: Option<Failure>) {
        self.state.write().unwrap().dates_failure = failure;
    }

    pub fn fail_labels(&self, failure: Option<Failure>) {
        self.state.write().unwrap().labels_failure = failure;
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn subject_failure(&self, subject_key: &str) -> Option<Failure> {
        self.state
            .read()
            .unwrap()
            .subject_failures
            .get(subject_key)
            .copied()
    }
}

#[async_trait]
impl ExamApi for MockExamApi {
    async fn check_active_request(&self, subject_key: &str) -> Result<bool, ClientError> {
        self.record("active_request");
        if let Some(gate) = &self.gate {
            self.entered.notify_one();
            let _permit = gate.acquire().await;
        }
        if let Some(failure) = self.subject_failure(subject_key) {
            return Err(failure.raise());
        }
        Ok(self.state.read().unwrap().active_requests.contains(subject_key))
    }

    async fn list_categories(&self, subject_key: &str) -> Result<Vec<Category>, ClientError> {
        self.record("categories");
        if let Some(failure) = self.state.read().unwrap().labels_failure {
            return Err(failure.raise());
        }
        Ok(self
            .state
            .read()
            .unwrap()
            .categories
            .get(subject_key)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_locations(&self, category_code: u32) -> Result<Vec<ServiceCenter>, ClientError> {
        self.record("locations");
        if let Some(failure) = self.state.read().unwrap().labels_failure {
            return Err(failure.raise());
        }
        Ok(self
            .state
            .read()
            .unwrap()
            .locations
            .get(&category_code)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_available_dates(
        &self,
        category_code: u32,
        location_code: u32,
    ) -> Result<Vec<ExamDate>, ClientError> {
        self.record("dates");
        if let Some(failure) = self.state.read().unwrap().dates_failure {
            return Err(failure.raise());
        }
        Ok(self
            .state
            .read()
            .unwrap()
            .dates
            .get(&(category_code, location_code))
            .map(|dates| {
                dates
                    .iter()
                    .map(|d| ExamDate {
                        exam_date: d.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

// RECORDING DISPATCHER

/// Dispatcher that records deliveries instead of sending them.
#[derive(Default)]
#[allow(dead_code)]
pub struct RecordingDispatcher {
    pub deliveries: Mutex<Vec<(Vec<ContactMethod>, Slot)>>,
}

#[allow(dead_code)]
impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered_dates(&self) -> Vec<String> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, slot)| slot.date.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn deliver(&self, contacts: &[ContactMethod], slot: &Slot) -> Vec<DeliveryOutcome> {
        self.deliveries
            .lock()
            .unwrap()
            .push((contacts.to_vec(), slot.clone()));
        contacts
            .iter()
            .map(|c| DeliveryOutcome {
                channel: c.channel(),
                success: true,
            })
            .collect()
    }
}

// FIXTURES

pub const CATEGORY_B: u32 = 4;
pub const RUSTAVI: u32 = 2;

/// A subscriber watching category B at Rustavi, reachable by email.
#[allow(dead_code)]
pub fn subscriber(id: &str, subject_key: &str) -> Subscriber {
    Subscriber::new(id, subject_key, CATEGORY_B, RUSTAVI).with_email(format!("{id}@example.com"))
}

/// Everything a scheduler test needs to drive and inspect a run.
#[allow(dead_code)]
pub struct Harness {
    pub api: MockExamApi,
    pub store: Arc<MemoryStore>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub scheduler: Arc<MonitorScheduler>,
}

#[allow(dead_code)]
impl Harness {
    pub fn new(api: MockExamApi, subscribers: Vec<Subscriber>) -> Self {
        let store = Arc::new(MemoryStore::with_subscribers(subscribers));
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let probe = Arc::new(AvailabilityProbe::new(
            Arc::new(api.clone()),
            Duration::ZERO,
        ));
        let scheduler =
            MonitorScheduler::new(store.clone(), probe, dispatcher.clone(), Duration::ZERO);
        Self {
            api,
            store,
            dispatcher,
            scheduler,
        }
    }

    pub async fn get(&self, id: &str) -> Subscriber {
        self.store
            .get(id)
            .await
            .expect("store should not fail")
            .expect("subscriber should exist")
    }
}
