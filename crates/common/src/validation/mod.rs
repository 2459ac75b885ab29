// Validation Module - reusable field validators
//
// Validators report a single human-readable message per field. Callers that
// need every violation at once run each validator and collect the failures
// themselves.

mod validators;

pub use validators::{EmailValidator, FieldValidator, RangeValidator, StringValidator};
