use crate::domain::booking::{BookingRecord, DomainName};
use crate::domain::ports::{Availability, BookingStore};
use crate::error::PersistError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory booking store.
///
/// Uses `Arc<RwLock<HashMap<String, BookingRecord>>>` to allow shared
/// concurrent access. Enforces the single-active-booking-per-domain rule the
/// production store implements with a uniqueness constraint; expired
/// bookings are replaced on write.
#[derive(Default, Clone)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<String, BookingRecord>>>,
}

impl InMemoryBookingStore {
    /// Creates a new, empty in-memory booking store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a booking directly, bypassing the uniqueness check.
    pub async fn seed(&self, booking: BookingRecord) {
        let mut bookings = self.bookings.write().await;
        bookings.insert(booking.domain_name.as_str().to_string(), booking);
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn check_availability(&self, domain: &DomainName) -> io::Result<Availability> {
        let bookings = self.bookings.read().await;
        let taken = bookings
            .get(domain.as_str())
            .map(|b| b.is_active(Utc::now()))
            .unwrap_or(false);
        Ok(if taken {
            Availability::Unavailable
        } else {
            Availability::Available
        })
    }

    async fn persist_booking(&self, booking: BookingRecord) -> Result<(), PersistError> {
        let mut bookings = self.bookings.write().await;
        if let Some(existing) = bookings.get(booking.domain_name.as_str())
            && existing.is_active(Utc::now())
        {
            return Err(PersistError::AlreadyBooked);
        }
        bookings.insert(booking.domain_name.as_str().to_string(), booking);
        Ok(())
    }

    async fn active_bookings(&self) -> io::Result<Vec<BookingRecord>> {
        let now = Utc::now();
        let bookings = self.bookings.read().await;
        Ok(bookings
            .values()
            .filter(|b| b.is_active(now))
            .cloned()
            .collect())
    }
}
