use crate::error::ScriptError;
use serde::Deserialize;
use std::io::Read;

/// One row of a simulation script.
///
/// `ack`/`reject` rows configure the scripted gateway (the last one wins);
/// `deliver` rows emit a frame on the current relay connection; `close` ends
/// the current connection, and subsequent rows describe the next one;
/// `silence` leaves the connection open with nothing on it.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ScriptRow {
    pub event: ScriptEvent,
    pub delay_ms: Option<u64>,
    pub correlation_id: Option<String>,
    pub result_code: Option<i32>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ScriptEvent {
    Ack,
    Reject,
    Deliver,
    Close,
    Silence,
}

/// Reads script rows from a CSV source.
///
/// Wraps `csv::Reader` and provides an iterator over `Result<ScriptRow>`,
/// with whitespace trimming and flexible record lengths. Malformed rows
/// surface as per-row errors rather than aborting the stream.
pub struct ScriptReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ScriptReader<R> {
    /// Creates a new `ScriptReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn rows(self) -> impl Iterator<Item = Result<ScriptRow, ScriptError>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(ScriptError::from))
    }
}
