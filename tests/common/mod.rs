use async_trait::async_trait;
use booking_reconciler::application::config::ReconcilerConfig;
use booking_reconciler::application::reconciler::BookingOrder;
use booking_reconciler::domain::booking::{BookingRecord, DomainName, OwnerId};
use booking_reconciler::domain::payment::{Amount, Msisdn};
use booking_reconciler::domain::ports::{Availability, BookingStore};
use booking_reconciler::error::PersistError;
use booking_reconciler::infrastructure::in_memory::InMemoryBookingStore;
use chrono::TimeDelta;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Config with short windows so paused-clock tests stay readable.
pub fn fast_config() -> ReconcilerConfig {
    ReconcilerConfig {
        initiation_timeout: Duration::from_millis(200),
        confirmation_timeout: Duration::from_secs(5),
        reconnect_base_delay: Duration::from_millis(10),
        reconnect_max_delay: Duration::from_millis(100),
        persist_attempts: 3,
        persist_retry_delay: Duration::from_millis(5),
        booking_validity: TimeDelta::days(7),
    }
}

pub fn order(domain: &str) -> BookingOrder {
    BookingOrder {
        domain: DomainName::parse(domain).unwrap(),
        owner: OwnerId::new("user-1"),
        amount: Amount::new(500).unwrap(),
        payer: Msisdn::parse("0712345678").unwrap(),
    }
}

/// Booking store wrapper that counts persist calls and can fail the first
/// N of them with an I/O error.
pub struct CountingStore {
    inner: InMemoryBookingStore,
    persist_calls: Arc<AtomicU32>,
    io_failures_remaining: Arc<AtomicU32>,
}

impl CountingStore {
    pub fn new() -> (Self, Arc<AtomicU32>) {
        Self::wrapping(InMemoryBookingStore::new(), 0)
    }

    pub fn failing_io(failures: u32) -> (Self, Arc<AtomicU32>) {
        Self::wrapping(InMemoryBookingStore::new(), failures)
    }

    pub fn wrapping(inner: InMemoryBookingStore, failures: u32) -> (Self, Arc<AtomicU32>) {
        let persist_calls = Arc::new(AtomicU32::new(0));
        (
            Self {
                inner,
                persist_calls: Arc::clone(&persist_calls),
                io_failures_remaining: Arc::new(AtomicU32::new(failures)),
            },
            persist_calls,
        )
    }
}

#[async_trait]
impl BookingStore for CountingStore {
    async fn check_availability(&self, domain: &DomainName) -> io::Result<Availability> {
        self.inner.check_availability(domain).await
    }

    async fn persist_booking(&self, booking: BookingRecord) -> Result<(), PersistError> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        if self.io_failures_remaining.load(Ordering::SeqCst) > 0 {
            self.io_failures_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(PersistError::Io(io::Error::other("simulated disk failure")));
        }
        self.inner.persist_booking(booking).await
    }

    async fn active_bookings(&self) -> io::Result<Vec<BookingRecord>> {
        self.inner.active_bookings().await
    }
}

/// Store whose advisory check always says available while the write still
/// enforces uniqueness. Reproduces the check-then-commit race window.
pub struct OptimisticStore {
    inner: InMemoryBookingStore,
}

impl OptimisticStore {
    pub fn new(inner: InMemoryBookingStore) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl BookingStore for OptimisticStore {
    async fn check_availability(&self, _domain: &DomainName) -> io::Result<Availability> {
        Ok(Availability::Available)
    }

    async fn persist_booking(&self, booking: BookingRecord) -> Result<(), PersistError> {
        self.inner.persist_booking(booking).await
    }

    async fn active_bookings(&self) -> io::Result<Vec<BookingRecord>> {
        self.inner.active_bookings().await
    }
}

pub fn seeded_booking(domain: &str, owner: &str) -> BookingRecord {
    BookingRecord::new(
        DomainName::parse(domain).unwrap(),
        OwnerId::new(owner),
        chrono::Utc::now(),
        TimeDelta::days(7),
    )
}
