//! 스냅샷 JSON 파서
//!
//! 평문 JSON 속성 맵과 Jolokia `read` 응답을 내부 스냅샷 구조로 변환합니다.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use super::ManagementObjectSnapshot;
use crate::error::SnapshotError;

/// 스냅샷 작업 결과 타입
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// 개별 속성 값
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// 정수
    Integer(i64),
    /// 실수
    Float(f64),
    /// 문자열
    String(String),
    /// 불리언
    Boolean(bool),
    /// Null
    Null,
    /// 중첩 객체 (CompositeData)
    Object(HashMap<String, AttributeValue>),
    /// 배열
    Array(Vec<AttributeValue>),
}

impl AttributeValue {
    /// 숫자로 변환 시도
    ///
    /// # Precision Warning
    /// When converting `Integer(i64)` to `f64`, precision loss may occur
    /// for values > 2^53 (9,007,199,254,740,992).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Integer(i) => Some(*i as f64),
            AttributeValue::Float(f) => Some(*f),
            AttributeValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// 정수로 변환 시도 (소수부가 있는 실수는 거부)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(i) => Some(*i),
            AttributeValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            AttributeValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// 문자열로 변환
    pub fn as_string(&self) -> Option<String> {
        match self {
            AttributeValue::String(s) => Some(s.clone()),
            AttributeValue::Integer(i) => Some(i.to_string()),
            AttributeValue::Float(f) => Some(f.to_string()),
            AttributeValue::Boolean(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// 중첩 객체 참조
    pub fn as_object(&self) -> Option<&HashMap<String, AttributeValue>> {
        match self {
            AttributeValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }
}

/// Raw textual form handed to value expressions.
///
/// Whole floats keep a trailing `.0` so that `12.0` and `12` stay
/// distinguishable in the rendered value.
impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Integer(i) => write!(f, "{}", i),
            AttributeValue::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::String(s) => f.write_str(s),
            AttributeValue::Boolean(b) => write!(f, "{}", b),
            AttributeValue::Null => f.write_str("null"),
            AttributeValue::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                f.write_str("{")?;
                for (i, key) in keys.into_iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", key, map[key])?;
                }
                f.write_str("}")
            }
            AttributeValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// JSON 값을 속성 값으로 변환
pub fn parse_attribute_value(value: Value) -> SnapshotResult<AttributeValue> {
    match value {
        Value::Null => Ok(AttributeValue::Null),
        Value::Bool(b) => Ok(AttributeValue::Boolean(b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(AttributeValue::Integer(i))
            } else {
                Ok(AttributeValue::Float(n.as_f64().ok_or_else(|| {
                    SnapshotError::JsonParse(format!("Number {} cannot be represented as f64", n))
                })?))
            }
        }
        Value::String(s) => Ok(AttributeValue::String(s)),
        Value::Array(arr) => {
            let parsed: Vec<AttributeValue> = arr
                .into_iter()
                .map(parse_attribute_value)
                .collect::<SnapshotResult<_>>()?;
            Ok(AttributeValue::Array(parsed))
        }
        Value::Object(map) => Ok(AttributeValue::Object(parse_attribute_map(map)?)),
    }
}

fn parse_attribute_map(
    map: serde_json::Map<String, Value>,
) -> SnapshotResult<HashMap<String, AttributeValue>> {
    map.into_iter()
        .map(|(k, v)| Ok((k, parse_attribute_value(v)?)))
        .collect()
}

/// Jolokia 요청 정보
#[derive(Debug, Clone, Deserialize)]
struct RequestInfo {
    mbean: String,
    #[serde(default)]
    attribute: Option<Value>,
}

/// 내부 파싱용 구조체
#[derive(Deserialize)]
struct RawJolokiaResponse {
    request: RequestInfo,
    value: Option<Value>,
    status: u16,
    error: Option<String>,
}

/// 단일 Jolokia 응답을 스냅샷 목록으로 변환
pub fn parse_jolokia_response(json: &str) -> SnapshotResult<Vec<ManagementObjectSnapshot>> {
    let raw: RawJolokiaResponse =
        serde_json::from_str(json).map_err(|e| SnapshotError::JsonParse(e.to_string()))?;

    let mut snapshots = Vec::new();
    merge_response(&mut snapshots, raw)?;
    Ok(snapshots)
}

/// Bulk 응답 파싱
///
/// 같은 MBean에 대한 여러 응답은 하나의 스냅샷으로 병합됩니다.
pub fn parse_jolokia_bulk(json: &str) -> SnapshotResult<Vec<ManagementObjectSnapshot>> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| SnapshotError::JsonParse(e.to_string()))?;
    snapshots_from_jolokia_value(value)
}

/// 이미 디코딩된 Jolokia 응답(단일 또는 배열)을 스냅샷으로 변환
pub fn snapshots_from_jolokia_value(value: Value) -> SnapshotResult<Vec<ManagementObjectSnapshot>> {
    let raw_responses: Vec<RawJolokiaResponse> = match value {
        Value::Array(_) => {
            serde_json::from_value(value).map_err(|e| SnapshotError::JsonParse(e.to_string()))?
        }
        other => vec![serde_json::from_value(other)
            .map_err(|e| SnapshotError::JsonParse(e.to_string()))?],
    };

    let mut snapshots = Vec::new();
    for raw in raw_responses {
        merge_response(&mut snapshots, raw)?;
    }
    Ok(snapshots)
}

fn merge_response(
    snapshots: &mut Vec<ManagementObjectSnapshot>,
    raw: RawJolokiaResponse,
) -> SnapshotResult<()> {
    // 에러 응답은 건너뜀
    if raw.status != 200 {
        tracing::debug!(
            mbean = %raw.request.mbean,
            status = raw.status,
            error = ?raw.error,
            "Skipping error response"
        );
        return Ok(());
    }

    let Some(value) = raw.value else {
        return Ok(());
    };

    let single_attribute = match &raw.request.attribute {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    };

    match value {
        Value::Object(map) if is_wildcard(&map) => {
            for (mbean_name, attrs) in map {
                if let Value::Object(attr_map) = attrs {
                    merge_into(snapshots, mbean_name, parse_attribute_map(attr_map)?);
                }
            }
        }
        Value::Object(map) => {
            let attributes = match single_attribute {
                // 단일 속성 조회 결과는 CompositeData 그 자체
                Some(attr) => HashMap::from([(attr, AttributeValue::Object(parse_attribute_map(map)?))]),
                None => parse_attribute_map(map)?,
            };
            merge_into(snapshots, raw.request.mbean, attributes);
        }
        scalar => match single_attribute {
            Some(attr) => {
                let parsed = parse_attribute_value(scalar)?;
                merge_into(snapshots, raw.request.mbean, HashMap::from([(attr, parsed)]));
            }
            None => {
                tracing::debug!(
                    mbean = %raw.request.mbean,
                    "Scalar response without attribute name; skipping"
                );
            }
        },
    }

    Ok(())
}

/// 와일드카드 응답인지 확인 (값이 모두 객체이고 키가 MBean ObjectName 형태)
fn is_wildcard(map: &serde_json::Map<String, Value>) -> bool {
    !map.is_empty()
        && map
            .iter()
            .all(|(k, v)| k.contains(':') && k.contains('=') && v.is_object())
}

fn merge_into(
    snapshots: &mut Vec<ManagementObjectSnapshot>,
    object_name: String,
    attributes: HashMap<String, AttributeValue>,
) {
    match snapshots.iter_mut().find(|s| s.object_name == object_name) {
        Some(existing) => existing.attributes.extend(attributes),
        None => snapshots.push(ManagementObjectSnapshot::new(object_name, attributes)),
    }
}

/// MBean ObjectName 구조
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectName {
    /// 도메인 (예: "java.lang")
    pub domain: String,
    /// 속성 (예: {"type": "Memory"})
    pub properties: HashMap<String, String>,
}

impl ObjectName {
    /// ObjectName 문자열 파싱
    ///
    /// # Limitations
    /// - Quoted keys/values are NOT fully supported
    pub fn parse(s: &str) -> SnapshotResult<Self> {
        let (domain, props) = s
            .split_once(':')
            .ok_or_else(|| SnapshotError::InvalidObjectName(s.to_string()))?;

        let mut properties = HashMap::new();
        for prop in props.split(',') {
            if let Some((k, v)) = prop.split_once('=') {
                properties.insert(k.trim().to_string(), v.to_string());
            }
        }

        if properties.is_empty() {
            return Err(SnapshotError::InvalidObjectName(s.to_string()));
        }

        Ok(Self {
            domain: domain.to_string(),
            properties,
        })
    }

    /// 키 속성 조회
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// 도메인과 키 속성이 정확히 일치하는지 확인 (속성 순서 무관)
    pub fn is(&self, domain: &str, properties: &[(&str, &str)]) -> bool {
        self.domain == domain
            && self.properties.len() == properties.len()
            && properties
                .iter()
                .all(|(k, v)| self.property(k) == Some(*v))
    }
}
