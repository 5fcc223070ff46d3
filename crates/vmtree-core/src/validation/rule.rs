#![forbid(unsafe_code)]

//! Validation rules and the canned rule set.

use std::fmt;
use std::rc::Rc;

use crate::value::{FromValue, Value};

const DEFAULT_MESSAGE: &str = "Value is invalid";

/// Handle returned by [`Node::add_validation`](crate::Node::add_validation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub(crate) u64);

/// A predicate over a property value plus the message recorded on failure.
#[derive(Clone)]
pub struct ValidationRule {
    message: String,
    check: Rc<dyn Fn(&Value) -> bool>,
}

impl fmt::Debug for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRule")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl ValidationRule {
    /// A rule over the raw [`Value`]. A blank message is replaced with a
    /// generic one, so recorded errors are never empty.
    pub fn new(message: impl Into<String>, check: impl Fn(&Value) -> bool + 'static) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = DEFAULT_MESSAGE.to_owned();
        }
        Self {
            message,
            check: Rc::new(check),
        }
    }

    /// A rule over a converted value. A value that does not convert to `T`
    /// fails the rule.
    pub fn typed<T: FromValue>(
        message: impl Into<String>,
        check: impl Fn(&T) -> bool + 'static,
    ) -> Self {
        Self::new(message, move |value| {
            T::from_value(value).is_some_and(|typed| check(&typed))
        })
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn passes(&self, value: &Value) -> bool {
        (self.check)(value)
    }
}

/// Ready-made rules.
pub mod rules {
    use super::ValidationRule;
    use crate::value::Value;

    /// Non-null, and non-blank when the value is text.
    pub fn required(message: impl Into<String>) -> ValidationRule {
        ValidationRule::new(message, |value| match value {
            Value::Null => false,
            Value::Text(text) => !text.trim().is_empty(),
            _ => true,
        })
    }

    /// Numeric value within `min..=max`. Null passes; pair with
    /// [`required`] to reject it.
    ///
    /// Integers are compared against the bounds exactly, without widening.
    pub fn range(min: f64, max: f64, message: impl Into<String>) -> ValidationRule {
        ValidationRule::new(message, move |value| match value {
            Value::Null => true,
            Value::Int(i) => int_within(*i, min, max),
            Value::Float(f) => (min..=max).contains(f),
            _ => false,
        })
    }

    /// `2^63`, the first float above every `i64`.
    const I64_END: f64 = 9_223_372_036_854_775_808.0;

    fn int_within(value: i64, min: f64, max: f64) -> bool {
        if min.is_nan() || max.is_nan() {
            return false;
        }
        let low = min.ceil();
        let high = max.floor();
        if low >= I64_END || high < -I64_END {
            return false;
        }
        // Both casts are exact here, or saturate to a bound no value exceeds.
        value >= low as i64 && value <= high as i64
    }

    /// Text of at least `min` characters. Null passes.
    pub fn min_length(min: usize, message: impl Into<String>) -> ValidationRule {
        ValidationRule::new(message, move |value| match value {
            Value::Null => true,
            Value::Text(text) => text.chars().count() >= min,
            _ => false,
        })
    }

    /// Text of at most `max` characters. Null passes.
    pub fn max_length(max: usize, message: impl Into<String>) -> ValidationRule {
        ValidationRule::new(message, move |value| match value {
            Value::Null => true,
            Value::Text(text) => text.chars().count() <= max,
            _ => false,
        })
    }

    pub fn predicate(
        message: impl Into<String>,
        check: impl Fn(&Value) -> bool + 'static,
    ) -> ValidationRule {
        ValidationRule::new(message, check)
    }
}

#[cfg(test)]
mod tests {
    use super::rules::*;
    use super::*;

    #[test]
    fn blank_message_gets_default() {
        let rule = ValidationRule::new("  ", |_| false);
        assert_eq!(rule.message(), DEFAULT_MESSAGE);
    }

    #[test]
    fn typed_rule_fails_on_conversion_error() {
        let positive = ValidationRule::typed::<i64>("must be positive", |v| *v > 0);
        assert!(positive.passes(&Value::Int(3)));
        assert!(!positive.passes(&Value::Int(-1)));
        assert!(!positive.passes(&Value::from("3")));
    }

    #[test]
    fn required_rejects_null_and_blank_text() {
        let rule = required("required");
        assert!(!rule.passes(&Value::Null));
        assert!(!rule.passes(&Value::from("   ")));
        assert!(rule.passes(&Value::from("x")));
        assert!(rule.passes(&Value::Int(0)));
    }

    #[test]
    fn range_is_inclusive_and_widens_ints() {
        let rule = range(1.0, 10.0, "out of range");
        assert!(rule.passes(&Value::Int(1)));
        assert!(rule.passes(&Value::Float(10.0)));
        assert!(!rule.passes(&Value::Int(11)));
        assert!(rule.passes(&Value::Null));
        assert!(!rule.passes(&Value::from("5")));
    }

    #[test]
    fn range_compares_large_ints_exactly() {
        let limit = 9_007_199_254_740_992_i64;
        let rule = range(0.0, limit as f64, "too big");
        assert!(rule.passes(&Value::Int(limit)));
        assert!(!rule.passes(&Value::Int(limit + 1)));
        assert!(!rule.passes(&Value::Int(i64::MAX)));
        assert!(range(-1.5, 2.5, "r").passes(&Value::Int(-1)));
        assert!(!range(-1.5, 2.5, "r").passes(&Value::Int(-2)));
        assert!(range(f64::NEG_INFINITY, f64::INFINITY, "r").passes(&Value::Int(i64::MIN)));
        assert!(!range(f64::NAN, 1.0, "r").passes(&Value::Int(0)));
    }

    #[test]
    fn length_rules_count_chars() {
        assert!(min_length(2, "short").passes(&Value::from("éé")));
        assert!(!min_length(3, "short").passes(&Value::from("éé")));
        assert!(max_length(2, "long").passes(&Value::from("éé")));
        assert!(!max_length(1, "long").passes(&Value::Int(1)));
    }
}
