use crate::Generator;
use portal_core::shortcode::MAX_LENGTH;
use portal_core::{CoreError, ShortCode};
use rand::distributions::Alphanumeric;
use rand::Rng;

pub const DEFAULT_LENGTH: usize = 8;

/// Produces fixed-length codes drawn uniformly from `[A-Za-z0-9]`.
#[derive(Debug, Clone)]
pub struct RandomGenerator {
    length: usize,
}

impl RandomGenerator {
    /// Creates a generator for codes of `length` characters.
    pub fn with_length(length: usize) -> Result<Self, CoreError> {
        if length == 0 || length > MAX_LENGTH {
            return Err(CoreError::InvalidShortCode(format!(
                "generated code length must be between 1 and {}, got {}",
                MAX_LENGTH, length
            )));
        }
        Ok(Self { length })
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self {
            length: DEFAULT_LENGTH,
        }
    }
}

impl Generator for RandomGenerator {
    type Output = ShortCode;

    fn generate(&self) -> Self::Output {
        let code: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect();
        ShortCode::new_unchecked(code)
    }
}
