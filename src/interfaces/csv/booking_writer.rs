use crate::domain::booking::BookingRecord;
use std::io::Write;

/// Writes booking records as CSV to any `Write` target.
pub struct BookingWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BookingWriter<W> {
    pub fn new(target: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(target),
        }
    }

    pub fn write_bookings(&mut self, bookings: Vec<BookingRecord>) -> Result<(), csv::Error> {
        self.writer
            .write_record(["domain", "owner", "booked_at", "expires_at"])?;
        for booking in bookings {
            self.writer.write_record([
                booking.domain_name.as_str(),
                booking.owner_id.as_str(),
                &booking.booked_at.to_rfc3339(),
                &booking.expires_at.to_rfc3339(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
