// Field Validators - Reusable validation components
use std::fmt::Display;

use once_cell::sync::Lazy;

/// Trait for field validators
pub trait FieldValidator<T: ?Sized> {
    /// Validate a field value
    fn validate(&self, value: &T) -> Result<(), String>;

    fn is_valid(&self, value: &T) -> bool {
        self.validate(value).is_ok()
    }
}

/// Inclusive range validator for ordered types
#[derive(Debug, Clone)]
pub struct RangeValidator<T> {
    min: Option<T>,
    max: Option<T>,
}

impl<T> Default for RangeValidator<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> RangeValidator<T> {
    /// Create a new range validator with no constraints
    pub fn empty() -> Self {
        Self { min: None, max: None }
    }

    pub fn new(min: T, max: T) -> Self {
        Self { min: Some(min), max: Some(max) }
    }

    #[must_use]
    pub fn min(mut self, min: T) -> Self {
        self.min = Some(min);
        self
    }

    #[must_use]
    pub fn max(mut self, max: T) -> Self {
        self.max = Some(max);
        self
    }
}

impl<T> FieldValidator<T> for RangeValidator<T>
where
    T: PartialOrd + Display,
{
    fn validate(&self, value: &T) -> Result<(), String> {
        if let Some(ref min) = self.min {
            // NaN compares false against everything, so check "not >= min".
            if !(value >= min) {
                return Err(format!("Value must be at least {min}"));
            }
        }

        if let Some(ref max) = self.max {
            if !(value <= max) {
                return Err(format!("Value must not exceed {max}"));
            }
        }

        Ok(())
    }
}

/// String validator with various constraints
#[derive(Debug, Clone)]
pub struct StringValidator {
    max_length: Option<usize>,
    pattern: Option<regex::Regex>,
    not_empty: bool,
    trim: bool,
}

impl Default for StringValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl StringValidator {
    pub fn new() -> Self {
        Self { max_length: None, pattern: None, not_empty: false, trim: true }
    }

    /// Require non-empty string
    #[must_use]
    pub fn not_empty(mut self) -> Self {
        self.not_empty = true;
        self
    }

    #[must_use]
    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Set pattern to match
    ///
    /// # Errors
    /// Returns the regex error when `pattern` does not compile.
    pub fn pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.pattern = Some(regex::Regex::new(pattern)?);
        Ok(self)
    }

    #[must_use]
    pub fn trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }
}

impl FieldValidator<str> for StringValidator {
    fn validate(&self, value: &str) -> Result<(), String> {
        let val = if self.trim { value.trim() } else { value };

        if self.not_empty && val.is_empty() {
            return Err("Value cannot be empty".to_string());
        }

        if let Some(max) = self.max_length {
            if val.len() > max {
                return Err(format!("Length must not exceed {max} characters"));
            }
        }

        if let Some(ref pattern) = self.pattern {
            if !pattern.is_match(val) {
                return Err(format!("Value must match pattern: {}", pattern.as_str()));
            }
        }

        Ok(())
    }
}

/// Static email regex pattern compiled once at first use
static EMAIL_REGEX: Lazy<regex::Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    regex::Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("EMAIL_REGEX pattern is valid and well-formed")
});

/// Email validator
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailValidator;

impl EmailValidator {
    pub fn new() -> Self {
        Self
    }
}

impl FieldValidator<str> for EmailValidator {
    fn validate(&self, value: &str) -> Result<(), String> {
        if !EMAIL_REGEX.is_match(value) {
            return Err("Invalid email format".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_inclusive() {
        let v = RangeValidator::new(50.0, 110.0);
        assert!(v.is_valid(&50.0));
        assert!(v.is_valid(&110.0));
        assert_eq!(v.validate(&49.9).unwrap_err(), "Value must be at least 50");
        assert_eq!(v.validate(&110.5).unwrap_err(), "Value must not exceed 110");
    }

    #[test]
    fn range_rejects_nan() {
        assert!(!RangeValidator::new(0.0, 1.0).is_valid(&f64::NAN));
    }

    #[test]
    fn open_ended_range() {
        let v = RangeValidator::empty().min(2_usize);
        assert!(v.is_valid(&2));
        assert!(v.is_valid(&usize::MAX));
        assert!(!v.is_valid(&1));
    }

    #[test]
    fn string_pattern_applies_after_trim() {
        let v = StringValidator::new().not_empty().pattern(r"^CC-\d{5}$").unwrap();
        assert!(v.is_valid(" CC-12345 "));
        assert!(!v.is_valid("CC-1234"));
        assert_eq!(v.validate("   ").unwrap_err(), "Value cannot be empty");
    }

    #[test]
    fn string_without_trim_sees_whitespace() {
        let v = StringValidator::new().trim(false).pattern(r"^CC-\d{5}$").unwrap();
        assert!(!v.is_valid(" CC-12345"));
    }

    #[test]
    fn email_format() {
        let v = EmailValidator::new();
        assert!(v.is_valid("finops@example.com"));
        assert!(v.is_valid("first.last+budget@corp.example.io"));
        assert!(!v.is_valid("finops@"));
        assert!(!v.is_valid("not-an-email"));
        assert!(!v.is_valid("a@b.c"));
    }
}
