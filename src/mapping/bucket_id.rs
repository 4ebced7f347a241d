//! Tagged bucket ids
//!
//! Normal partition cells are zero-based; the negative codes are reserved:
//! -1 for missing values, -2 for unseen categories and -3, -4, ... for
//! special groups in declaration order.

use serde::{Deserialize, Serialize};

/// Integer code of the missing bucket
pub const MISSING_CODE: i64 = -1;

/// Integer code of the unseen/other bucket
pub const OTHER_CODE: i64 = -2;

/// Integer code of the first special group
pub const FIRST_SPECIAL_CODE: i64 = -3;

/// A bucket a raw value can be assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", from = "i64")]
pub enum BucketId {
    /// Index in the normal partition
    Bin(usize),
    /// Null or NaN values
    Missing,
    /// Categories never seen while fitting
    Other,
    /// Index of a special group in declaration order
    Special(usize),
}

impl BucketId {
    /// The integer code written to transformed columns
    pub fn code(&self) -> i64 {
        match self {
            BucketId::Bin(i) => *i as i64,
            BucketId::Missing => MISSING_CODE,
            BucketId::Other => OTHER_CODE,
            BucketId::Special(i) => FIRST_SPECIAL_CODE - *i as i64,
        }
    }

    /// Inverse of [`BucketId::code`]
    pub fn from_code(code: i64) -> Self {
        match code {
            c if c >= 0 => BucketId::Bin(c as usize),
            MISSING_CODE => BucketId::Missing,
            OTHER_CODE => BucketId::Other,
            c => BucketId::Special((FIRST_SPECIAL_CODE - c) as usize),
        }
    }

    pub fn is_bin(&self) -> bool {
        matches!(self, BucketId::Bin(_))
    }
}

impl From<BucketId> for i64 {
    fn from(id: BucketId) -> Self {
        id.code()
    }
}

impl From<i64> for BucketId {
    fn from(code: i64) -> Self {
        BucketId::from_code(code)
    }
}

impl PartialOrd for BucketId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BucketId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.code().cmp(&other.code())
    }
}

impl std::fmt::Display for BucketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}
