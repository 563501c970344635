//! Field codec seam for encrypted-at-rest numeric columns.
//!
//! Balance and interest-rate columns are TEXT and pass through a
//! [`FieldCodec`] on every read and write. An encryption-at-rest
//! implementation plugs in here; the engine only ever sees decoded values.

use core::str::FromStr;

use rust_decimal::Decimal;

use crate::error::StoreError;

/// Encode/decode a fixed-point value to its stored representation.
pub trait FieldCodec: Send + Sync + 'static {
    fn encode(&self, value: Decimal) -> Result<String, StoreError>;
    fn decode(&self, raw: &str) -> Result<Decimal, StoreError>;
}

/// Identity codec: decimal text with two fractional digits.
#[derive(Debug, Default, Copy, Clone)]
pub struct PlainCodec;

impl FieldCodec for PlainCodec {
    fn encode(&self, value: Decimal) -> Result<String, StoreError> {
        Ok(value.round_dp(2).to_string())
    }

    fn decode(&self, raw: &str) -> Result<Decimal, StoreError> {
        Decimal::from_str(raw).map_err(|e| StoreError::codec(format!("{raw:?}: {e}")))
    }
}
