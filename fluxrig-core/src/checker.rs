//! Checker Library
//!
//! Checkers turn the raw value a test function produced into a [`Verdict`].
//! They are pure and never fail: an absent (null) value is always a `Fail`,
//! except for [`Checker::Ignore`].
//!
//! Bounds and expected values are [`Param`]s, which may be fixed or read
//! from the context when the check runs. This is how device-specific limits
//! (`DUT_CHECKS`) reach a checker without the test function branching on the DUT.

use crate::context::Context;
use crate::value::{as_number, display_value, is_truthy};
use crate::verdict::Verdict;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// Parameter of a checker, resolved lazily against the context
#[derive(Clone)]
pub enum Param {
    /// Constant value
    Fixed(Value),
    /// Entry of the DUT limits table
    Limit(String),
    /// Computed from the context
    Dynamic(Rc<dyn Fn(&Context) -> Option<Value>>),
}

impl Param {
    /// Constant parameter
    pub fn fixed(value: impl Into<Value>) -> Self {
        Param::Fixed(value.into())
    }

    /// Parameter read from the DUT limits table
    pub fn limit(name: impl Into<String>) -> Self {
        Param::Limit(name.into())
    }

    /// Parameter computed from the context
    pub fn dynamic(f: impl Fn(&Context) -> Option<Value> + 'static) -> Self {
        Param::Dynamic(Rc::new(f))
    }

    /// Resolve against `ctx`
    pub fn resolve(&self, ctx: &Context) -> Option<Value> {
        match self {
            Param::Fixed(v) => Some(v.clone()),
            Param::Limit(name) => ctx.limit(name).cloned(),
            Param::Dynamic(f) => f(ctx),
        }
    }

    /// Resolve as a number
    pub fn number(&self, ctx: &Context) -> Option<f64> {
        self.resolve(ctx).as_ref().and_then(as_number)
    }

    /// Resolve as text
    pub fn text(&self, ctx: &Context) -> Option<String> {
        self.resolve(ctx).as_ref().and_then(display_value)
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::fixed(v)
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::fixed(v)
    }
}

impl From<i32> for Param {
    fn from(v: i32) -> Self {
        Param::fixed(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::fixed(v)
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Fixed(v) => write!(f, "{}", v),
            Param::Limit(name) => write!(f, "limit({})", name),
            Param::Dynamic(_) => f.write_str("<dynamic>"),
        }
    }
}

/// Rule classifying a test value
#[derive(Clone, Default)]
pub enum Checker {
    /// Pass iff a value was produced
    #[default]
    Presence,
    /// Pass iff the value is truthy
    Truthy,
    /// Pass iff the value equals the expected one
    Equals(Value),
    /// Pass iff the value equals one of the listed values
    OneOf(Vec<Value>),
    /// Pass iff `min <= value <= max`
    Range {
        /// Inclusive lower bound
        min: Param,
        /// Inclusive upper bound
        max: Param,
    },
    /// Pass iff `|value| <= limit`
    AbsWithin(Param),
    /// Pass iff the value occurs as a substring of the expected text
    ContainedIn(Param),
    /// Always pass
    Ignore,
    /// Arbitrary rule
    Custom(Rc<dyn Fn(&Value, &Context) -> Verdict>),
}

impl Checker {
    /// Inclusive numeric range
    pub fn range(min: impl Into<Param>, max: impl Into<Param>) -> Self {
        Checker::Range {
            min: min.into(),
            max: max.into(),
        }
    }

    /// Absolute value within a limit
    pub fn abs_within(limit: impl Into<Param>) -> Self {
        Checker::AbsWithin(limit.into())
    }

    /// Exact match
    pub fn equals(expected: impl Into<Value>) -> Self {
        Checker::Equals(expected.into())
    }

    /// Membership in a set of values
    pub fn one_of<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Checker::OneOf(values.into_iter().map(Into::into).collect())
    }

    /// Value must be a substring of `expected`
    pub fn contained_in(expected: impl Into<Param>) -> Self {
        Checker::ContainedIn(expected.into())
    }

    /// Custom rule
    pub fn custom(f: impl Fn(&Value, &Context) -> Verdict + 'static) -> Self {
        Checker::Custom(Rc::new(f))
    }

    /// Classify `value`
    pub fn check(&self, value: &Value, ctx: &Context) -> Verdict {
        if matches!(self, Checker::Ignore) {
            return Verdict::Pass;
        }
        if value.is_null() {
            return Verdict::Fail;
        }

        match self {
            Checker::Ignore | Checker::Presence => Verdict::Pass,
            Checker::Truthy => Verdict::from_bool(is_truthy(value)),
            Checker::Equals(expected) => Verdict::from_bool(values_equal(value, expected)),
            Checker::OneOf(allowed) => {
                Verdict::from_bool(allowed.iter().any(|a| values_equal(value, a)))
            }
            Checker::Range { min, max } => {
                let ok = match (as_number(value), min.number(ctx), max.number(ctx)) {
                    (Some(v), Some(lo), Some(hi)) => lo <= v && v <= hi,
                    _ => false,
                };
                Verdict::from_bool(ok)
            }
            Checker::AbsWithin(limit) => {
                let ok = match (as_number(value), limit.number(ctx)) {
                    (Some(v), Some(lim)) => v.abs() <= lim,
                    _ => false,
                };
                Verdict::from_bool(ok)
            }
            Checker::ContainedIn(expected) => {
                let ok = match (display_value(value), expected.text(ctx)) {
                    (Some(v), Some(text)) => text.contains(&v),
                    _ => false,
                };
                Verdict::from_bool(ok)
            }
            Checker::Custom(f) => f(value, ctx),
        }
    }
}

impl fmt::Debug for Checker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checker::Presence => f.write_str("present"),
            Checker::Truthy => f.write_str("true"),
            Checker::Equals(v) => write!(f, "== {}", v),
            Checker::OneOf(vs) => write!(f, "in {:?}", vs),
            Checker::Range { min, max } => write!(f, "in [{:?}, {:?}]", min, max),
            Checker::AbsWithin(lim) => write!(f, "|x| <= {:?}", lim),
            Checker::ContainedIn(text) => write!(f, "substring of {:?}", text),
            Checker::Ignore => f.write_str("ignored"),
            Checker::Custom(_) => f.write_str("<custom>"),
        }
    }
}

/// Equality with numeric coercion between integers and floats
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AutoUi, keys};
    use crate::sink::NullSink;
    use serde_json::json;

    fn ctx() -> Context {
        let mut ctx = Context::new(Box::new(AutoUi { answer: true }), Box::new(NullSink::default()));
        ctx.set(
            keys::LIMITS,
            json!({
                "burst_power_peak_min": 5,
                "burst_power_peak_max": 24,
                "freq_error": 50,
                "hw_model": "UmSITE-TM10",
            }),
        );
        ctx
    }

    #[test]
    fn test_null_fails_except_ignore() {
        let ctx = ctx();
        for checker in [
            Checker::Presence,
            Checker::Truthy,
            Checker::equals(1),
            Checker::one_of([1, 2]),
            Checker::range(0, 10),
            Checker::abs_within(5),
            Checker::contained_in("abc"),
        ] {
            assert_eq!(checker.check(&Value::Null, &ctx), Verdict::Fail, "{:?}", checker);
        }
        assert_eq!(Checker::Ignore.check(&Value::Null, &ctx), Verdict::Pass);
    }

    #[test]
    fn test_presence_and_truthy() {
        let ctx = ctx();
        assert_eq!(Checker::Presence.check(&json!(false), &ctx), Verdict::Pass);
        assert_eq!(Checker::Truthy.check(&json!(false), &ctx), Verdict::Fail);
        assert_eq!(Checker::Truthy.check(&json!(true), &ctx), Verdict::Pass);
    }

    #[test]
    fn test_equals_and_membership() {
        let ctx = ctx();
        assert_eq!(Checker::equals("MATC").check(&json!("MATC"), &ctx), Verdict::Pass);
        assert_eq!(Checker::equals("MATC").check(&json!("NMAT"), &ctx), Verdict::Fail);
        assert_eq!(Checker::equals(15).check(&json!(15.0), &ctx), Verdict::Pass);
        assert_eq!(
            Checker::one_of(["BBCH", "BIDL"]).check(&json!("BIDL"), &ctx),
            Verdict::Pass
        );
        assert_eq!(
            Checker::one_of(["BBCH", "BIDL"]).check(&json!("ECAL"), &ctx),
            Verdict::Fail
        );
    }

    #[test]
    fn test_range_with_fixed_bounds() {
        let ctx = ctx();
        let checker = Checker::range(10, 20);
        assert_eq!(checker.check(&json!(10), &ctx), Verdict::Pass);
        assert_eq!(checker.check(&json!(15), &ctx), Verdict::Pass);
        assert_eq!(checker.check(&json!(20), &ctx), Verdict::Pass);
        assert_eq!(checker.check(&json!(20.01), &ctx), Verdict::Fail);
        assert_eq!(checker.check(&json!("12.5"), &ctx), Verdict::Pass);
        assert_eq!(checker.check(&json!("n/a"), &ctx), Verdict::Fail);
    }

    #[test]
    fn test_range_with_limits_table() {
        let ctx = ctx();
        let checker = Checker::range(
            Param::limit("burst_power_peak_min"),
            Param::limit("burst_power_peak_max"),
        );
        assert_eq!(checker.check(&json!(23.9), &ctx), Verdict::Pass);
        assert_eq!(checker.check(&json!(30), &ctx), Verdict::Fail);

        let unknown = Checker::range(Param::limit("nope"), 100);
        assert_eq!(unknown.check(&json!(1), &ctx), Verdict::Fail);
    }

    #[test]
    fn test_dynamic_bound() {
        let mut ctx = ctx();
        ctx.set("MAX", 3);
        let checker = Checker::range(0, Param::dynamic(|c| c.get("MAX").cloned()));
        assert_eq!(checker.check(&json!(3), &ctx), Verdict::Pass);
        assert_eq!(checker.check(&json!(4), &ctx), Verdict::Fail);
    }

    #[test]
    fn test_abs_within() {
        let ctx = ctx();
        let checker = Checker::abs_within(Param::limit("freq_error"));
        assert_eq!(checker.check(&json!(-49.5), &ctx), Verdict::Pass);
        assert_eq!(checker.check(&json!(-51), &ctx), Verdict::Fail);
    }

    #[test]
    fn test_contained_in() {
        let ctx = ctx();
        let checker = Checker::contained_in(Param::limit("hw_model"));
        assert_eq!(checker.check(&json!("UmSITE"), &ctx), Verdict::Pass);
        assert_eq!(checker.check(&json!("UmTRX"), &ctx), Verdict::Fail);
    }

    #[test]
    fn test_custom() {
        let ctx = ctx();
        let checker = Checker::custom(|v, _| Verdict::from_bool(v.as_array().is_some_and(|a| a.len() == 3)));
        assert_eq!(checker.check(&json!([1, 2, 3]), &ctx), Verdict::Pass);
        assert_eq!(checker.check(&json!([1]), &ctx), Verdict::Fail);
    }
}
