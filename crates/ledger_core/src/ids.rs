use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{LedgerError, LedgerResult};

/// Owner of a sequence of compensation intervals (an employee). Issued by the
/// subject registry, never by the ledger.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub Uuid);

impl SubjectId {
    /// A fresh random id, for registries that mint their own subjects.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn is_nil(self) -> bool {
        self.0.is_nil()
    }
}

impl FromStr for SubjectId {
    type Err = LedgerError;

    fn from_str(value: &str) -> LedgerResult<Self> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|err| LedgerError::bad_request(format!("invalid subject id '{value}': {err}")))
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

/// Store-assigned row id. Larger ids were inserted later.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntervalId(pub i64);

impl IntervalId {
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for IntervalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{IntervalId, SubjectId};
    use crate::LedgerError;

    #[test]
    fn subject_ids_parse_from_their_display_form() {
        let subject = SubjectId::new();
        let parsed: SubjectId = subject.to_string().parse().expect("parse");
        assert_eq!(parsed, subject);
        assert!(!subject.is_nil());
        assert!(SubjectId(Uuid::nil()).is_nil());
    }

    #[test]
    fn malformed_subject_ids_are_bad_requests() {
        let err = "not-a-uuid".parse::<SubjectId>().expect_err("invalid");
        assert!(matches!(err, LedgerError::BadRequest { .. }));
    }

    #[test]
    fn ids_serialize_as_plain_values() {
        let subject = SubjectId::new();
        let encoded = serde_json::to_string(&subject).expect("encode");
        assert_eq!(encoded, format!("\"{subject}\""));
        let decoded: SubjectId = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, subject);
        assert_eq!(serde_json::to_string(&IntervalId(7)).expect("encode"), "7");
    }
}
