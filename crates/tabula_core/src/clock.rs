use serde::{Deserialize, Serialize};

/// Store-assigned audit time, milliseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn as_millis(self) -> i64 {
        self.0
    }

    pub fn from_millis(value: i64) -> Self {
        Self(value)
    }
}
