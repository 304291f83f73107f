//! JMX 관리 객체 스냅샷 모듈
//!
//! 외부 연결 계층이 매 주기마다 넘겨주는 MBean 스냅샷의 타입 정의입니다.
//! 동적 속성 값은 이 경계에서 [`AttributeValue`]로 고정되고, 매칭/추출 계층
//! 밖으로는 퍼지지 않습니다.
//!
//! # Example
//!
//! ```ignore
//! use jmx_reporter::snapshot::parse_jolokia_bulk;
//!
//! let snapshots = parse_jolokia_bulk(&body)?;
//! for snapshot in &snapshots {
//!     println!("{}", snapshot.object_name);
//! }
//! ```

mod parser;

pub use parser::{
    parse_attribute_value, parse_jolokia_bulk, parse_jolokia_response,
    snapshots_from_jolokia_value, AttributeValue, ObjectName, SnapshotResult,
};

use std::collections::HashMap;

/// 한 주기에 샘플링된 관리 객체 하나
#[derive(Debug, Clone, PartialEq)]
pub struct ManagementObjectSnapshot {
    /// ObjectName 문자열 (예: "java.lang:type=Memory")
    pub object_name: String,
    /// 속성명 -> 원시 값
    pub attributes: HashMap<String, AttributeValue>,
}

impl ManagementObjectSnapshot {
    /// 새 스냅샷 생성
    pub fn new(object_name: impl Into<String>, attributes: HashMap<String, AttributeValue>) -> Self {
        Self {
            object_name: object_name.into(),
            attributes,
        }
    }

    /// 속성 추가 (빌더)
    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Null이 아닌 속성 값 조회
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key).filter(|v| !v.is_null())
    }

    /// ObjectName 파싱 결과 (형식이 잘못되면 None)
    pub fn parsed_name(&self) -> Option<ObjectName> {
        ObjectName::parse(&self.object_name).ok()
    }
}

/// `java.lang.management.MemoryUsage` CompositeData
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    pub init: Option<i64>,
    pub committed: i64,
    pub used: i64,
    /// -1 means the pool is unbounded
    pub max: i64,
}

impl MemoryUsage {
    /// CompositeData 속성에서 MemoryUsage 추출
    ///
    /// `committed`, `used`, `max` 중 하나라도 없거나 정수가 아니면 None.
    pub fn from_attribute(value: &AttributeValue) -> Option<Self> {
        let map = value.as_object()?;
        let field = |key: &str| map.get(key).and_then(AttributeValue::as_i64);

        Some(Self {
            init: field("init"),
            committed: field("committed")?,
            used: field("used")?,
            max: field("max")?,
        })
    }

    pub fn is_unbounded(&self) -> bool {
        self.max == -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(committed: i64, used: i64, max: i64) -> AttributeValue {
        AttributeValue::Object(HashMap::from([
            ("init".to_string(), AttributeValue::Integer(0)),
            ("committed".to_string(), AttributeValue::Integer(committed)),
            ("used".to_string(), AttributeValue::Integer(used)),
            ("max".to_string(), AttributeValue::Integer(max)),
        ]))
    }

    #[test]
    fn test_memory_usage_from_composite() {
        let parsed = MemoryUsage::from_attribute(&usage(100, 40, 80)).unwrap();
        assert_eq!(parsed.committed, 100);
        assert_eq!(parsed.used, 40);
        assert_eq!(parsed.max, 80);
        assert!(!parsed.is_unbounded());
    }

    #[test]
    fn test_memory_usage_unbounded() {
        let parsed = MemoryUsage::from_attribute(&usage(50, 30, -1)).unwrap();
        assert!(parsed.is_unbounded());
    }

    #[test]
    fn test_memory_usage_rejects_malformed() {
        let missing_max = AttributeValue::Object(HashMap::from([
            ("committed".to_string(), AttributeValue::Integer(1)),
            ("used".to_string(), AttributeValue::Integer(1)),
        ]));
        assert!(MemoryUsage::from_attribute(&missing_max).is_none());
        assert!(MemoryUsage::from_attribute(&AttributeValue::Integer(3)).is_none());
        assert!(MemoryUsage::from_attribute(&AttributeValue::String("x".into())).is_none());
    }

    #[test]
    fn test_attribute_skips_null() {
        let snapshot = ManagementObjectSnapshot::new("a:type=B", HashMap::new())
            .with_attribute("Present", AttributeValue::Integer(1))
            .with_attribute("Missing", AttributeValue::Null);
        assert!(snapshot.attribute("Present").is_some());
        assert!(snapshot.attribute("Missing").is_none());
        assert!(snapshot.attribute("Absent").is_none());
    }
}
