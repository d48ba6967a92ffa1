//! Declarative retry configuration.
//!
//! These types describe generators, strategies and callers as plain data so
//! they can live in a config file. Durations are whole milliseconds.
//!
//! # Example
//!
//! ```rust
//! use reattempt::config::CallerConfig;
//!
//! let config = CallerConfig::from_json(r#"{
//!     "max_duration_ms": 30000,
//!     "any_error": {
//!         "generator": { "kind": "exponential", "factor": 2 },
//!         "unit_ms": 100,
//!         "jitter_ms": 50,
//!         "cap_ms": 5000,
//!         "max_retries": 8
//!     }
//! }"#).unwrap();
//!
//! let caller = config.build().unwrap();
//! assert_eq!(caller.max_duration(), Some(std::time::Duration::from_secs(30)));
//! ```

use crate::error::{ConfigError, Result};
use crate::retry::{
    BackoffStrategy, Caller, Generator, constant, exponential, fibonacci, linear, random,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which numeric progression a strategy uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum GeneratorConfig {
    /// Always `value`
    Constant {
        /// Value returned on every call
        value: i64,
    },
    /// `0, delta, 2 * delta, ...`
    Linear {
        /// Step between values
        delta: i64,
    },
    /// `1, factor, factor^2, ...`
    Exponential {
        /// Growth factor
        factor: i64,
    },
    /// `1, 1, 2, 3, 5, ...`
    Fibonacci,
    /// Uniform in `[0, max)`
    Random {
        /// Exclusive upper bound, must be positive
        max: i64,
    },
}

impl GeneratorConfig {
    /// Build a fresh generator.
    pub fn build(&self) -> Result<Box<dyn Generator>> {
        let generator: Box<dyn Generator> = match *self {
            Self::Constant { value } => Box::new(constant(value)),
            Self::Linear { delta } => Box::new(linear(delta)),
            Self::Exponential { factor } => Box::new(exponential(factor)),
            Self::Fibonacci => Box::new(fibonacci()),
            Self::Random { max } if max <= 0 => return Err(ConfigError::InvalidRandomBound(max)),
            Self::Random { max } => Box::new(random(max)),
        };
        Ok(generator)
    }
}

/// A [`BackoffStrategy`] described as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyConfig {
    /// Sequence generator
    pub generator: GeneratorConfig,

    /// Time unit each generator value is multiplied by
    pub unit_ms: u64,

    /// Jitter magnitude; `0` disables jitter
    #[serde(default)]
    pub jitter_ms: u64,

    /// Upper bound for any single delay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap_ms: Option<u64>,

    /// Retry budget (see [`BackoffStrategy::with_max_retries`])
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl StrategyConfig {
    /// Parse a strategy from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build a strategy with its own fresh counter and generator.
    pub fn build(&self) -> Result<BackoffStrategy> {
        if self.unit_ms == 0 {
            return Err(ConfigError::ZeroUnit);
        }

        let unit = Duration::from_millis(self.unit_ms);
        let mut strategy = BackoffStrategy::from_boxed(self.generator.build()?, unit)
            .with_jitter(Duration::from_millis(self.jitter_ms));
        if let Some(cap_ms) = self.cap_ms {
            strategy = strategy.with_capped_duration(Duration::from_millis(cap_ms));
        }
        if let Some(max_retries) = self.max_retries {
            strategy = strategy.with_max_retries(max_retries);
        }
        Ok(strategy)
    }
}

/// A [`Caller`] described as data.
///
/// Only the error-agnostic parts of a caller can be expressed this way;
/// register error-specific strategies on the built caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallerConfig {
    /// Total time budget for one call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_ms: Option<u64>,

    /// Strategy applied to every error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any_error: Option<StrategyConfig>,
}

impl CallerConfig {
    /// Parse a caller configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build a caller.
    pub fn build(&self) -> Result<Caller> {
        let mut caller = Caller::new();
        if let Some(max_duration_ms) = self.max_duration_ms {
            if max_duration_ms == 0 {
                return Err(ConfigError::ZeroMaxDuration);
            }
            caller = caller.with_max_duration(Duration::from_millis(max_duration_ms));
        }
        if let Some(strategy) = &self.any_error {
            caller = caller.with_retry_on_any_error(strategy.build()?);
        }
        Ok(caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_strategy_from_toml() {
        let config: StrategyConfig = toml::from_str(
            r#"
            unit_ms = 10
            cap_ms = 50
            max_retries = 4

            [generator]
            kind = "linear"
            delta = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.generator, GeneratorConfig::Linear { delta: 2 });
        assert_eq!(config.jitter_ms, 0);

        let strategy = config.build().unwrap();
        assert_eq!(strategy.cap(), 50 * MS);
        assert_eq!(strategy.delay().unwrap(), Duration::ZERO);
        assert_eq!(strategy.delay().unwrap(), 20 * MS);
        assert_eq!(strategy.delay().unwrap(), 40 * MS);
        assert!(strategy.delay().is_err());
    }

    #[test]
    fn test_every_generator_kind_parses() {
        let kinds = [
            (r#"{"kind":"constant","value":3}"#, GeneratorConfig::Constant { value: 3 }),
            (r#"{"kind":"linear","delta":4}"#, GeneratorConfig::Linear { delta: 4 }),
            (r#"{"kind":"exponential","factor":2}"#, GeneratorConfig::Exponential { factor: 2 }),
            (r#"{"kind":"fibonacci"}"#, GeneratorConfig::Fibonacci),
            (r#"{"kind":"random","max":9}"#, GeneratorConfig::Random { max: 9 }),
        ];
        for (json, expected) in kinds {
            let parsed: GeneratorConfig = serde_json::from_str(json).unwrap();
            assert_eq!(parsed, expected);
            assert!(parsed.build().is_ok());
        }
    }

    #[test]
    fn test_each_build_gets_fresh_state() {
        let config = StrategyConfig {
            generator: GeneratorConfig::Fibonacci,
            unit_ms: 1,
            jitter_ms: 0,
            cap_ms: None,
            max_retries: Some(3),
        };

        let first = config.build().unwrap();
        assert_eq!(first.delay().unwrap(), MS);
        assert_eq!(first.delay().unwrap(), MS);
        assert!(first.delay().is_err());

        let second = config.build().unwrap();
        assert_eq!(second.attempts(), 0);
        assert_eq!(second.delay().unwrap(), MS);
    }

    #[test]
    fn test_validation_errors() {
        let zero_unit = StrategyConfig {
            generator: GeneratorConfig::Constant { value: 1 },
            unit_ms: 0,
            jitter_ms: 0,
            cap_ms: None,
            max_retries: None,
        };
        assert!(matches!(zero_unit.build(), Err(ConfigError::ZeroUnit)));

        assert!(matches!(
            GeneratorConfig::Random { max: 0 }.build(),
            Err(ConfigError::InvalidRandomBound(0))
        ));

        let zero_duration = CallerConfig {
            max_duration_ms: Some(0),
            any_error: None,
        };
        assert!(matches!(
            zero_duration.build(),
            Err(ConfigError::ZeroMaxDuration)
        ));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = StrategyConfig::from_json(
            r#"{"generator":{"kind":"fibonacci"},"unit_ms":1,"retries":3}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));

        let err = StrategyConfig::from_json(
            r#"{"generator":{"kind":"linear","detla":2},"unit_ms":1}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown field `detla`"), "{err}");
    }

    #[test]
    fn test_caller_config_round_trip() {
        let config = CallerConfig {
            max_duration_ms: Some(1_000),
            any_error: Some(StrategyConfig {
                generator: GeneratorConfig::Constant { value: 10 },
                unit_ms: 1,
                jitter_ms: 0,
                cap_ms: None,
                max_retries: None,
            }),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("cap_ms"));
        assert_eq!(CallerConfig::from_json(&json).unwrap(), config);

        let empty = CallerConfig::default().build().unwrap();
        assert_eq!(empty.max_duration(), None);
    }
}
