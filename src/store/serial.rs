use std::fmt;

use serde_json::Value;

use crate::error::{Result, StorageError};

/// Numeric identifier of an experiment run (`#<serial>_…` folders).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerialNumber(pub u64);

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Values that may name a run. Anything that is not a non-negative integer,
/// including digit strings, is rejected with [`StorageError::InvalidSerialNumber`].
pub trait IntoSerialNumber {
    fn into_serial_number(self) -> Result<SerialNumber>;
}

impl IntoSerialNumber for SerialNumber {
    fn into_serial_number(self) -> Result<SerialNumber> {
        Ok(self)
    }
}

macro_rules! unsigned_serial {
    ($($t:ty),*) => {$(
        impl IntoSerialNumber for $t {
            fn into_serial_number(self) -> Result<SerialNumber> {
                Ok(SerialNumber(self as u64))
            }
        }
    )*};
}

macro_rules! signed_serial {
    ($($t:ty),*) => {$(
        impl IntoSerialNumber for $t {
            fn into_serial_number(self) -> Result<SerialNumber> {
                u64::try_from(self)
                    .map(SerialNumber)
                    .map_err(|_| StorageError::InvalidSerialNumber(self.to_string()))
            }
        }
    )*};
}

unsigned_serial!(u8, u16, u32, u64, usize);
signed_serial!(i8, i16, i32, i64, isize);

/// Text never names a run, even when it is all digits: callers parse first.
impl IntoSerialNumber for &str {
    fn into_serial_number(self) -> Result<SerialNumber> {
        Err(StorageError::InvalidSerialNumber(format!("{self:?}")))
    }
}

impl IntoSerialNumber for &String {
    fn into_serial_number(self) -> Result<SerialNumber> {
        self.as_str().into_serial_number()
    }
}

/// Only JSON integers qualify; `5.0` and `"5"` do not.
impl IntoSerialNumber for &Value {
    fn into_serial_number(self) -> Result<SerialNumber> {
        self.as_u64()
            .map(SerialNumber)
            .ok_or_else(|| StorageError::InvalidSerialNumber(self.to_string()))
    }
}
