//! Error types for jmx-reporter
//!
//! This module defines the error types used throughout the crate. Everything
//! below the orchestrator is recovered locally and only logged; these types
//! exist so that each recovery site can say precisely what went wrong.

use thiserror::Error;

/// 스냅샷 입력 파싱 에러
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// JSON 파싱 에러
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// 잘못된 ObjectName
    #[error("Invalid ObjectName: {0}")]
    InvalidObjectName(String),

    /// 입력 파일 읽기 실패
    #[error("Failed to read input '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 값 변환식 평가 에러
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    /// 예상치 못한 문자
    #[error("Unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { pos: usize, ch: char },

    /// 식이 중간에 끝남
    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    /// 알 수 없는 식별자 (허용: `value`)
    #[error("Unknown identifier '{0}'")]
    UnknownIdentifier(String),

    /// 숫자 리터럴 파싱 실패
    #[error("Invalid number literal '{0}'")]
    InvalidNumber(String),

    /// 원시 값이 숫자가 아님
    #[error("Raw value '{0}' is not numeric")]
    NonNumericInput(String),

    /// 0으로 나눔
    #[error("Division by zero")]
    DivisionByZero,
}

/// Value transformation error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// The expression evaluator rejected the input
    #[error("Expression '{expression}' failed: {source}")]
    Expression {
        expression: String,
        #[source]
        source: ExpressionError,
    },

    /// The (transformed) value is not a number
    #[error("Value '{0}' is not numeric")]
    NonNumeric(String),
}

/// 내장 JVM 메트릭 추출 에러
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    /// 산술 오버플로
    #[error("Arithmetic overflow while computing {metric}")]
    Overflow { metric: String },
}

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Snapshot/input error
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Output rendering error
    #[error("Render error: {0}")]
    Render(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;
