//! Budget arithmetic
//!
//! Multipliers compose multiplicatively across tiers. Rounding happens in
//! whole cents so binary float noise (`10799.999999999998`) cannot push an
//! amount across a 50-unit boundary.

use costsync_domain::constants::{BUDGET_ROUNDING_STEP, CENTS_PER_UNIT};
use costsync_domain::{ConfigurationError, EnvironmentBudget, RoundingPolicy};

/// `size × service override × environment override`, unset overrides
/// counting as 1.0.
///
/// # Errors
/// [`ConfigurationError::InvalidMultiplier`] for any non-finite or
/// non-positive factor.
pub fn effective_multiplier(
    service: &str,
    size: f64,
    service_override: Option<f64>,
    environment_override: Option<f64>,
) -> Result<f64, ConfigurationError> {
    let size = checked_factor(service, "size", size)?;
    let service_factor = checked_factor(service, "service override", service_override.unwrap_or(1.0))?;
    let env_factor =
        checked_factor(service, "environment override", environment_override.unwrap_or(1.0))?;
    Ok(size * service_factor * env_factor)
}

/// `base × scaling × multiplier`.
///
/// # Errors
/// [`ConfigurationError::InvalidMultiplier`] when the profile's scaling
/// factor is non-finite or non-positive.
pub fn raw_budget(
    service: &str,
    budget: &EnvironmentBudget,
    multiplier: f64,
) -> Result<f64, ConfigurationError> {
    let scaling = checked_factor(service, "scaling", budget.scaling_factor)?;
    Ok(budget.base * scaling * multiplier)
}

fn checked_factor(service: &str, tier: &str, value: f64) -> Result<f64, ConfigurationError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigurationError::InvalidMultiplier {
            service: service.to_string(),
            tier: tier.to_string(),
            value,
        })
    }
}

/// Snaps `raw` onto the 50-unit grid. Non-positive or non-finite input
/// yields 0, which the validator then reports as out of range.
pub fn round_budget(raw: f64, policy: RoundingPolicy) -> u64 {
    let cents = (raw * CENTS_PER_UNIT as f64).round();
    if !cents.is_finite() || cents <= 0.0 {
        return 0;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let cents = cents as u64;
    let step = BUDGET_ROUNDING_STEP * CENTS_PER_UNIT as u64;

    let steps = match policy {
        RoundingPolicy::Ceiling => cents.div_ceil(step),
        RoundingPolicy::NearestHalfUp => cents.saturating_add(step / 2) / step,
    };

    steps.saturating_mul(step) / CENTS_PER_UNIT as u64
}
