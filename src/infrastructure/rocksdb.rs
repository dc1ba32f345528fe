use crate::domain::booking::{BookingRecord, DomainName};
use crate::domain::ports::{Availability, BookingStore};
use crate::error::PersistError;
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing booking records, keyed by domain name.
pub const CF_BOOKINGS: &str = "bookings";

/// A persistent booking store using RocksDB.
///
/// RocksDB has no constraint support, so the single-active-booking rule is
/// enforced read-before-write under `write_lock`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbBookingStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbBookingStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the bookings column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_bookings = ColumnFamilyDescriptor::new(CF_BOOKINGS, Options::default());
        let db =
            DB::open_cf_descriptors(&opts, path, vec![cf_bookings]).map_err(io::Error::other)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn booking_at(&self, domain: &DomainName) -> io::Result<Option<BookingRecord>> {
        let cf = self
            .db
            .cf_handle(CF_BOOKINGS)
            .ok_or_else(|| io::Error::other("bookings column family not found"))?;

        match self
            .db
            .get_cf(&cf, domain.as_str().as_bytes())
            .map_err(io::Error::other)?
        {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(io::Error::other)?,
            )),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl BookingStore for RocksDbBookingStore {
    async fn check_availability(&self, domain: &DomainName) -> io::Result<Availability> {
        let taken = self
            .booking_at(domain)?
            .map(|b| b.is_active(Utc::now()))
            .unwrap_or(false);
        Ok(if taken {
            Availability::Unavailable
        } else {
            Availability::Available
        })
    }

    async fn persist_booking(&self, booking: BookingRecord) -> Result<(), PersistError> {
        let _guard = self.write_lock.lock().await;

        if let Some(existing) = self.booking_at(&booking.domain_name)?
            && existing.is_active(Utc::now())
        {
            return Err(PersistError::AlreadyBooked);
        }

        let cf = self
            .db
            .cf_handle(CF_BOOKINGS)
            .ok_or_else(|| io::Error::other("bookings column family not found"))?;
        let value = serde_json::to_vec(&booking).map_err(io::Error::other)?;
        self.db
            .put_cf(&cf, booking.domain_name.as_str().as_bytes(), value)
            .map_err(io::Error::other)?;

        Ok(())
    }

    async fn active_bookings(&self) -> io::Result<Vec<BookingRecord>> {
        let cf = self
            .db
            .cf_handle(CF_BOOKINGS)
            .ok_or_else(|| io::Error::other("bookings column family not found"))?;

        let now = Utc::now();
        let mut bookings = Vec::new();
        for item in self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item.map_err(io::Error::other)?;
            let booking: BookingRecord =
                serde_json::from_slice(&value).map_err(io::Error::other)?;
            if booking.is_active(now) {
                bookings.push(booking);
            }
        }

        Ok(bookings)
    }
}
