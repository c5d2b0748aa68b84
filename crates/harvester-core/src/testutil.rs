//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks with `Arc<Mutex<_>>` state so tests can assert on
//! recorded calls after the code under test has consumed a clone.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::consumer::{ConsumerEvent, ConsumerReporter};
use crate::error::AppError;
use crate::models::{
    ApartmentDetails, Listing, ListingHeader, PropertyDetails, Source, StoreOutcome,
    TypeOfProperty, TypeOfService, compute_hash,
};
use crate::task_queue::{Delivery, TaskQueue};
use crate::traits::{FetchResponse, Fetcher, ListingExtractor, ListingStore};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that replays scripted responses and records every call.
#[derive(Clone)]
pub struct MockFetcher {
    /// Each call pops the first element. When empty, answers 200 with a stub page.
    responses: Arc<Mutex<VecDeque<Result<FetchResponse, AppError>>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
    delay: Option<Duration>,
    panics: bool,
}

impl MockFetcher {
    pub fn with_responses(responses: Vec<Result<FetchResponse, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: None,
            panics: false,
        }
    }

    /// Fetcher whose every call panics.
    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::with_responses(vec![])
        }
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Recorded `(url, proxy)` pairs, in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str, proxy: &str) -> Result<FetchResponse, AppError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), proxy.to_string()));

        if self.panics {
            panic!("mock fetcher panic");
        }

        let next = self.responses.lock().unwrap().pop_front();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        next.unwrap_or_else(|| Ok(FetchResponse::new(200, "<html><body>default</body></html>")))
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum ExtractBehavior {
    Listing,
    /// Fails the first call, succeeds afterwards.
    Fail(Arc<Mutex<Option<AppError>>>),
    Panic,
}

/// Mock extractor that builds a test listing for whatever URL it is given.
#[derive(Clone)]
pub struct MockExtractor {
    behavior: ExtractBehavior,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockExtractor {
    pub fn ok() -> Self {
        Self {
            behavior: ExtractBehavior::Listing,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            behavior: ExtractBehavior::Fail(Arc::new(Mutex::new(Some(error)))),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn panicking() -> Self {
        Self {
            behavior: ExtractBehavior::Panic,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ListingExtractor for MockExtractor {
    async fn extract(&self, url: &str, html: &str) -> Result<Listing, AppError> {
        self.calls.lock().unwrap().push(url.to_string());
        if let ExtractBehavior::Panic = self.behavior {
            panic!("mock extractor panic");
        }
        if let ExtractBehavior::Fail(error) = &self.behavior
            && let Some(e) = error.lock().unwrap().take()
        {
            return Err(e);
        }
        let mut listing = make_test_listing(url);
        listing.content_hash = compute_hash(html);
        Ok(listing)
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// In-memory store keyed by `(source, external_id)`.
#[derive(Clone)]
pub struct MockStore {
    pub saved: Arc<Mutex<Vec<Listing>>>,
    keys: Arc<Mutex<HashSet<(Source, String)>>>,
    urls: Arc<Mutex<HashSet<String>>>,
    save_error: Arc<Mutex<Option<AppError>>>,
}

impl MockStore {
    pub fn empty() -> Self {
        Self {
            saved: Arc::new(Mutex::new(Vec::new())),
            keys: Arc::new(Mutex::new(HashSet::new())),
            urls: Arc::new(Mutex::new(HashSet::new())),
            save_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Store that fails the next save with `error`.
    pub fn with_save_error(error: AppError) -> Self {
        let store = Self::empty();
        *store.save_error.lock().unwrap() = Some(error);
        store
    }

    /// Store that already holds a listing for `url`.
    pub fn with_known_url(url: &str) -> Self {
        let store = Self::empty();
        store.urls.lock().unwrap().insert(url.to_string());
        store
    }

    pub fn saved_count(&self) -> usize {
        self.saved.lock().unwrap().len()
    }
}

impl ListingStore for MockStore {
    async fn store_if_absent(&self, listing: &Listing) -> Result<StoreOutcome, AppError> {
        if let Some(e) = self.save_error.lock().unwrap().take() {
            return Err(e);
        }
        let key = (listing.header.source, listing.header.external_id.clone());
        if !self.keys.lock().unwrap().insert(key) {
            return Ok(StoreOutcome::AlreadyExists);
        }
        self.urls.lock().unwrap().insert(listing.header.url.clone());
        self.saved.lock().unwrap().push(listing.clone());
        Ok(StoreOutcome::Created)
    }

    async fn contains_url(&self, url: &str) -> Result<bool, AppError> {
        Ok(self.urls.lock().unwrap().contains(url))
    }
}

// ---------------------------------------------------------------------------
// MockQueue
// ---------------------------------------------------------------------------

/// Recorded negative acknowledgment: (delivery_id, requeue).
pub type NackRecord = (Uuid, bool);

/// In-memory queue. Requeued messages go back to the tail.
#[derive(Clone)]
pub struct MockQueue {
    pending: Arc<Mutex<VecDeque<Delivery>>>,
    in_flight: Arc<Mutex<Vec<(String, Delivery)>>>,
    claim_error: Arc<Mutex<Option<AppError>>>,
    pub acked: Arc<Mutex<Vec<Uuid>>>,
    pub nacked: Arc<Mutex<Vec<NackRecord>>>,
    pub released_consumers: Arc<Mutex<Vec<String>>>,
}

impl MockQueue {
    pub fn empty() -> Self {
        Self {
            pending: Arc::new(Mutex::new(VecDeque::new())),
            in_flight: Arc::new(Mutex::new(Vec::new())),
            claim_error: Arc::new(Mutex::new(None)),
            acked: Arc::new(Mutex::new(Vec::new())),
            nacked: Arc::new(Mutex::new(Vec::new())),
            released_consumers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_bodies(bodies: &[&str]) -> Self {
        let queue = Self::empty();
        queue
            .pending
            .lock()
            .unwrap()
            .extend(bodies.iter().map(|b| make_delivery(b)));
        queue
    }

    pub fn with_claim_error(error: AppError) -> Self {
        let queue = Self::empty();
        *queue.claim_error.lock().unwrap() = Some(error);
        queue
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    fn take_in_flight(&self, delivery_id: Uuid) -> Option<Delivery> {
        let mut in_flight = self.in_flight.lock().unwrap();
        let pos = in_flight.iter().position(|(_, d)| d.id == delivery_id)?;
        Some(in_flight.remove(pos).1)
    }
}

impl TaskQueue for MockQueue {
    async fn publish(&self, body: &str) -> Result<Delivery, AppError> {
        let delivery = make_delivery(body);
        self.pending.lock().unwrap().push_back(delivery.clone());
        Ok(delivery)
    }

    async fn next_delivery(&self, consumer_id: &str) -> Result<Option<Delivery>, AppError> {
        if let Some(e) = self.claim_error.lock().unwrap().take() {
            return Err(e);
        }
        let Some(mut delivery) = self.pending.lock().unwrap().pop_front() else {
            return Ok(None);
        };
        delivery.delivery_count += 1;
        self.in_flight
            .lock()
            .unwrap()
            .push((consumer_id.to_string(), delivery.clone()));
        Ok(Some(delivery))
    }

    async fn ack(&self, delivery_id: Uuid) -> Result<(), AppError> {
        self.take_in_flight(delivery_id);
        self.acked.lock().unwrap().push(delivery_id);
        Ok(())
    }

    async fn nack(&self, delivery_id: Uuid, requeue: bool) -> Result<(), AppError> {
        self.nacked.lock().unwrap().push((delivery_id, requeue));
        if let Some(delivery) = self.take_in_flight(delivery_id)
            && requeue
        {
            self.pending.lock().unwrap().push_back(delivery);
        }
        Ok(())
    }

    async fn release_consumer(&self, consumer_id: &str) -> Result<u64, AppError> {
        self.released_consumers
            .lock()
            .unwrap()
            .push(consumer_id.to_string());

        let mut in_flight = self.in_flight.lock().unwrap();
        let mut pending = self.pending.lock().unwrap();
        let before = in_flight.len();
        in_flight.retain(|(owner, delivery)| {
            if owner == consumer_id {
                pending.push_back(delivery.clone());
                false
            } else {
                true
            }
        });
        Ok((before - in_flight.len()) as u64)
    }

    async fn depth(&self) -> Result<i64, AppError> {
        Ok(self.pending.lock().unwrap().len() as i64)
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Reporter that records event labels.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ConsumerReporter for MockReporter {
    fn report(&self, event: ConsumerEvent<'_>) {
        let label = match &event {
            ConsumerEvent::Started { .. } => "Started",
            ConsumerEvent::Polling => "Polling",
            ConsumerEvent::Received { .. } => "Received",
            ConsumerEvent::Delivered { .. } => "Delivered",
            ConsumerEvent::Dropped { .. } => "Dropped",
            ConsumerEvent::Requeued { .. } => "Requeued",
            ConsumerEvent::ShuttingDown { .. } => "ShuttingDown",
            ConsumerEvent::Stopped { .. } => "Stopped",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Apartment listing whose external id is derived from the last path segment of `url`.
pub fn make_test_listing(url: &str) -> Listing {
    let external_id = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("1")
        .to_string();
    Listing {
        header: ListingHeader {
            type_of_property: TypeOfProperty::Apartment,
            type_of_service: TypeOfService::Sale,
            source: Source::Olx,
            external_id,
            organization_url: "https://www.olx.uz/list/user/test/".to_string(),
            title: "2-комнатная квартира".to_string(),
            description: "Светлая квартира".to_string(),
            url: url.to_string(),
            polygon_id: None,
            polygon_keyword: None,
        },
        total_price_usd: 60_000,
        details: PropertyDetails::Apartment(ApartmentDetails {
            rooms: 2,
            floor: 3,
            total_floor: 9,
            total_area_sqm: 60,
            is_new_building: false,
            has_furniture: true,
            repair: None,
            building_material: None,
        }),
        content_hash: compute_hash(url),
    }
}

pub fn make_delivery(body: &str) -> Delivery {
    Delivery {
        id: Uuid::new_v4(),
        body: body.to_string(),
        delivery_count: 0,
        enqueued_at: Utc::now(),
    }
}
