//! Value transformation and output formatting
//!
//! - [`engine`]: value expressions and numeric validation
//! - [`expression`]: the built-in arithmetic evaluator
//! - [`formatter`]: text / JSON / YAML rendering of report records

pub mod engine;
pub mod expression;
pub mod formatter;

pub use engine::{format_number, is_numeric, ExpressionEvaluator, ValueTransformer};
pub use expression::ArithmeticEvaluator;
pub use formatter::ReportFormatter;
