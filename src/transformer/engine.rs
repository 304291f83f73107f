//! Transform Engine - raw attribute value to reportable number
//!
//! A selector may carry a value expression. The engine evaluates it through a
//! pluggable [`ExpressionEvaluator`] and then insists the outcome is a plain
//! decimal number. Anything else is rejected so the caller can drop the
//! record.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ExpressionError, TransformError};

use super::expression::ArithmeticEvaluator;

/// Evaluates a value expression against one raw value
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluate `expression` with `value` bound to the raw attribute value.
    fn evaluate(&self, expression: &str, value: &str) -> Result<String, ExpressionError>;
}

static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("invalid numeric regex")
});

/// Is `s` a finite decimal number (optionally signed, optionally scientific)?
pub fn is_numeric(s: &str) -> bool {
    NUMERIC_RE.is_match(s) && s.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}

/// Format an evaluated number
///
/// - Whole numbers are formatted without decimal point
/// - Everything else uses the shortest round-trip form
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Applies value expressions and validates the numeric outcome
#[derive(Clone)]
pub struct ValueTransformer {
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl ValueTransformer {
    /// Create a transformer backed by `evaluator`
    pub fn new(evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self { evaluator }
    }

    /// Transform a raw value.
    ///
    /// An absent or blank expression passes `raw` through unchanged. The
    /// result is trimmed and must be numeric.
    pub fn transform(&self, expression: Option<&str>, raw: &str) -> Result<String, TransformError> {
        let evaluated = match expression.map(str::trim).filter(|e| !e.is_empty()) {
            Some(expr) => self
                .evaluator
                .evaluate(expr, raw)
                .map_err(|source| TransformError::Expression {
                    expression: expr.to_string(),
                    source,
                })?,
            None => raw.to_string(),
        };

        let trimmed = evaluated.trim();
        if is_numeric(trimmed) {
            Ok(trimmed.to_string())
        } else {
            Err(TransformError::NonNumeric(evaluated))
        }
    }
}

impl Default for ValueTransformer {
    fn default() -> Self {
        Self::new(Arc::new(ArithmeticEvaluator::new()))
    }
}

impl std::fmt::Debug for ValueTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueTransformer").finish_non_exhaustive()
    }
}
