use alloy::primitives::Uint;
use bigdecimal::BigDecimal;
use num_bigint::{BigInt, BigUint, Sign};
use sqlx::{
    Postgres, Type,
    decode::Decode,
    encode::Encode,
    postgres::{PgTypeInfo, PgValueRef},
    types::BigDecimal as SqlxBigDecimal,
};
use std::{fmt, str::FromStr};

/// EVM uint256.
pub type U256 = Uint<256, 4>;

/// Fee amount as stored and served: a full-width uint256 that maps to
/// Postgres `NUMERIC(78,0)` and serialises as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DbU256(pub U256);

impl From<u64> for DbU256 {
    fn from(v: u64) -> Self {
        DbU256(U256::from(v))
    }
}

impl From<U256> for DbU256 {
    fn from(v: U256) -> Self {
        DbU256(v)
    }
}

impl serde::Serialize for DbU256 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // JSON numbers lose precision past 2^53
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for DbU256 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DbU256::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for DbU256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DbU256 {
    type Err = String;

    /// Accepts decimal, or hex with a `0x`/`0X` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty string".into());
        }
        if let Some(rest) =
            s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
        {
            U256::from_str_radix(rest, 16)
                .map(DbU256)
                .map_err(|e| e.to_string())
        } else {
            let big = BigUint::from_str(s).map_err(|e| e.to_string())?;
            biguint_to_u256(&big).map(DbU256)
        }
    }
}

pub fn u256_to_biguint(value: U256) -> BigUint {
    BigUint::from_bytes_be(&value.to_be_bytes::<32>())
}

pub fn biguint_to_u256(value: &BigUint) -> Result<U256, String> {
    let bytes = value.to_bytes_be();
    if bytes.len() > 32 {
        return Err("value too large for U256".into());
    }
    let mut padded = [0u8; 32];
    padded[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(U256::from_be_bytes::<32>(padded))
}

pub fn u256_to_bigdecimal(value: U256) -> BigDecimal {
    BigDecimal::from(BigInt::from(u256_to_biguint(value)))
}

impl Type<Postgres> for DbU256 {
    fn type_info() -> PgTypeInfo {
        <SqlxBigDecimal as Type<Postgres>>::type_info()
    }
}

impl<'q> Encode<'q, Postgres> for DbU256 {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>>
    {
        // scale 0 so NUMERIC(78,0) accepts it unchanged
        u256_to_bigdecimal(self.0).encode_by_ref(buf)
    }
}

impl TryFrom<&BigDecimal> for DbU256 {
    type Error = Box<dyn std::error::Error + Send + Sync>;

    fn try_from(bd: &BigDecimal) -> Result<Self, Self::Error> {
        let truncated = bd.with_scale(0);
        if &truncated != bd {
            return Err("fractional numeric not supported for U256".into());
        }
        let bi = BigInt::from_str(&truncated.to_string())?;
        match bi.to_bytes_be() {
            (Sign::Minus, _) => {
                Err("negative numeric cannot be represented as U256".into())
            }
            (_, bytes) => {
                let big = BigUint::from_bytes_be(&bytes);
                Ok(DbU256(biguint_to_u256(&big)?))
            }
        }
    }
}

impl<'r> Decode<'r, Postgres> for DbU256 {
    fn decode(
        value: PgValueRef<'r>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let big_decimal = <SqlxBigDecimal as Decode<Postgres>>::decode(value)?;
        DbU256::try_from(&big_decimal)
    }
}
