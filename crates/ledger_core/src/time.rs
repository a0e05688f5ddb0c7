use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::{LedgerError, LedgerResult};

/// Microseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ValidTime(pub i64);

/// Smallest representable step between two instants. A closed interval ends
/// one tick before its successor starts.
pub const TICK_MICROS: i64 = 1;

impl ValidTime {
    pub fn now_micros() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as i64;
        Self(micros)
    }

    pub fn as_i64(self) -> i64 {
        self.0
    }

    /// The instant immediately preceding `self`.
    pub fn previous_tick(self) -> LedgerResult<Self> {
        self.0
            .checked_sub(TICK_MICROS)
            .map(Self)
            .ok_or_else(|| LedgerError::bad_request("instant is out of range"))
    }

    pub fn parse_rfc3339(value: &str) -> LedgerResult<Self> {
        let parsed = OffsetDateTime::parse(value, &Rfc3339).map_err(|err| {
            LedgerError::bad_request(format!("invalid timestamp '{value}': {err}"))
        })?;
        let micros = parsed.unix_timestamp_nanos() / 1_000;
        i64::try_from(micros)
            .map(Self)
            .map_err(|_| LedgerError::bad_request(format!("timestamp '{value}' is out of range")))
    }

    pub fn to_rfc3339(self) -> LedgerResult<String> {
        let nanos = i128::from(self.0) * 1_000;
        let datetime = OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .map_err(|err| LedgerError::internal(format!("invalid instant {}: {err}", self.0)))?;
        datetime
            .format(&Rfc3339)
            .map_err(|err| LedgerError::internal(format!("format instant {}: {err}", self.0)))
    }
}

impl fmt::Display for ValidTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "{}us", self.0),
        }
    }
}
