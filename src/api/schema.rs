use serde::Deserialize;
use std::{fmt, result::Result as StdResult};

#[derive(Debug, Clone)]
pub struct ValidationError(pub String);

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

/// Normalise and check a deserialized request part.
pub trait Validate: Sized {
    type Err;
    fn validate(self) -> StdResult<Self, Self::Err>;
}

/// `/events/{integrator}` path. Stored addresses are lowercase, so the
/// lookup key is lowercased before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct IntegratorPath {
    pub integrator: String,
}

impl Validate for IntegratorPath {
    type Err = ValidationError;

    fn validate(mut self) -> StdResult<Self, Self::Err> {
        self.integrator = self.integrator.trim().to_lowercase();
        let Some(hex_part) = self.integrator.strip_prefix("0x") else {
            return Err(ValidationError(format!(
                "integrator must start with 0x, got: {}",
                self.integrator
            )));
        };
        if hex_part.len() != 40
            || !hex_part.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(ValidationError(format!(
                "integrator must be a 20-byte hex address, got: {}",
                self.integrator
            )));
        }
        Ok(self)
    }
}
