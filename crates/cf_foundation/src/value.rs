// crates/cf_foundation/src/value.rs

//! 基础值类型
//!
//! 选项、属性和参数帧共享同一组封闭的值类型：
//!
//! | 种类 | 标量 | 数组 |
//! |------|------|------|
//! | 布尔 | `Bool` | `BoolArray` |
//! | 整数 | `Int` | `IntArray` |
//! | 实数 | `Real` | `RealArray` |
//! | 字符串 | `Text` | `TextArray` |
//! | 路径 | `Uri` | `UriArray` |
//!
//! 数组在类型层面保证同构。序列化时枚举标签即类型名，因此值是自描述的。

use crate::error::{CfError, CfResult};
use crate::uri::Uri;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 值种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// 布尔
    Bool,
    /// 整数
    Integer,
    /// 实数
    Real,
    /// 字符串
    String,
    /// 路径
    Uri,
    /// 布尔数组
    BoolArray,
    /// 整数数组
    IntegerArray,
    /// 实数数组
    RealArray,
    /// 字符串数组
    StringArray,
    /// 路径数组
    UriArray,
}

impl ValueKind {
    /// 类型名
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::String => "string",
            Self::Uri => "uri",
            Self::BoolArray => "array[bool]",
            Self::IntegerArray => "array[integer]",
            Self::RealArray => "array[real]",
            Self::StringArray => "array[string]",
            Self::UriArray => "array[uri]",
        }
    }

    /// 是否为数组
    pub fn is_array(self) -> bool {
        matches!(
            self,
            Self::BoolArray
                | Self::IntegerArray
                | Self::RealArray
                | Self::StringArray
                | Self::UriArray
        )
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// 布尔
    Bool(bool),
    /// 整数
    Int(i64),
    /// 实数
    Real(f64),
    /// 字符串
    Text(String),
    /// 路径
    Uri(Uri),
    /// 布尔数组
    BoolArray(Vec<bool>),
    /// 整数数组
    IntArray(Vec<i64>),
    /// 实数数组
    RealArray(Vec<f64>),
    /// 字符串数组
    TextArray(Vec<String>),
    /// 路径数组
    UriArray(Vec<Uri>),
}

impl Value {
    /// 值种类
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Integer,
            Self::Real(_) => ValueKind::Real,
            Self::Text(_) => ValueKind::String,
            Self::Uri(_) => ValueKind::Uri,
            Self::BoolArray(_) => ValueKind::BoolArray,
            Self::IntArray(_) => ValueKind::IntegerArray,
            Self::RealArray(_) => ValueKind::RealArray,
            Self::TextArray(_) => ValueKind::StringArray,
            Self::UriArray(_) => ValueKind::UriArray,
        }
    }

    /// 转换到指定种类
    ///
    /// 只允许整数到实数的拓宽（标量与数组），其余种类必须一致。
    pub fn coerce_to(self, kind: ValueKind) -> Result<Value, Value> {
        match (self, kind) {
            (value, k) if value.kind() == k => Ok(value),
            (Self::Int(i), ValueKind::Real) => Ok(Self::Real(i as f64)),
            (Self::IntArray(v), ValueKind::RealArray) => {
                Ok(Self::RealArray(v.into_iter().map(|i| i as f64).collect()))
            }
            (value, _) => Err(value),
        }
    }

    /// 按种类解析命令行文本，数组以逗号分隔
    pub fn parse_as(kind: ValueKind, text: &str) -> CfResult<Value> {
        let text = text.trim();
        let items = || split_items(text);
        let value = match kind {
            ValueKind::Bool => Value::Bool(parse_bool(text)?),
            ValueKind::Integer => Value::Int(parse_int(text)?),
            ValueKind::Real => Value::Real(parse_real(text)?),
            ValueKind::String => Value::Text(text.to_string()),
            ValueKind::Uri => Value::Uri(Uri::parse(text)?),
            ValueKind::BoolArray => {
                Value::BoolArray(items().into_iter().map(parse_bool).collect::<CfResult<_>>()?)
            }
            ValueKind::IntegerArray => {
                Value::IntArray(items().into_iter().map(parse_int).collect::<CfResult<_>>()?)
            }
            ValueKind::RealArray => {
                Value::RealArray(items().into_iter().map(parse_real).collect::<CfResult<_>>()?)
            }
            ValueKind::StringArray => {
                Value::TextArray(items().into_iter().map(str::to_string).collect())
            }
            ValueKind::UriArray => {
                Value::UriArray(items().into_iter().map(Uri::parse).collect::<CfResult<_>>()?)
            }
        };
        Ok(value)
    }

    /// 取布尔值
    pub fn as_bool(&self) -> Option<bool> {
        bool::from_value(self)
    }

    /// 取整数值
    pub fn as_int(&self) -> Option<i64> {
        i64::from_value(self)
    }

    /// 取实数值（整数自动拓宽）
    pub fn as_real(&self) -> Option<f64> {
        f64::from_value(self)
    }

    /// 取字符串
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// 取路径
    pub fn as_uri(&self) -> Option<&Uri> {
        match self {
            Self::Uri(u) => Some(u),
            _ => None,
        }
    }
}

fn split_items(text: &str) -> Vec<&str> {
    if text.is_empty() {
        Vec::new()
    } else {
        text.split(',').map(str::trim).collect()
    }
}

fn parse_bool(text: &str) -> CfResult<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(CfError::invalid_argument(format!("无法解析为 bool: '{}'", text))),
    }
}

fn parse_int(text: &str) -> CfResult<i64> {
    text.parse()
        .map_err(|_| CfError::invalid_argument(format!("无法解析为 integer: '{}'", text)))
}

fn parse_real(text: &str) -> CfResult<f64> {
    text.parse()
        .map_err(|_| CfError::invalid_argument(format!("无法解析为 real: '{}'", text)))
}

fn join_display<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, "]")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Real(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{:?}", v),
            Self::Uri(v) => write!(f, "{}", v),
            Self::BoolArray(v) => join_display(f, v),
            Self::IntArray(v) => join_display(f, v),
            Self::RealArray(v) => join_display(f, v),
            Self::TextArray(v) => {
                let quoted: Vec<String> = v.iter().map(|s| format!("{:?}", s)).collect();
                join_display(f, &quoted)
            }
            Self::UriArray(v) => join_display(f, v),
        }
    }
}

// =============================================================================
// ValueType
// =============================================================================

/// 可与 [`Value`] 互相转换的 Rust 类型
pub trait ValueType: Sized {
    /// 对应的值种类
    const KIND: ValueKind;

    /// 从值中提取
    fn from_value(value: &Value) -> Option<Self>;

    /// 转换为值
    fn into_value(self) -> Value;
}

macro_rules! impl_value_type {
    ($ty:ty, $kind:ident, $variant:ident) => {
        impl ValueType for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    };
}

impl_value_type!(bool, Bool, Bool);
impl_value_type!(i64, Integer, Int);
impl_value_type!(String, String, Text);
impl_value_type!(Uri, Uri, Uri);
impl_value_type!(Vec<bool>, BoolArray, BoolArray);
impl_value_type!(Vec<i64>, IntegerArray, IntArray);
impl_value_type!(Vec<String>, StringArray, TextArray);
impl_value_type!(Vec<Uri>, UriArray, UriArray);

impl ValueType for f64 {
    const KIND: ValueKind = ValueKind::Real;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Real(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Real(self)
    }
}

impl ValueType for Vec<f64> {
    const KIND: ValueKind = ValueKind::RealArray;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::RealArray(v) => Some(v.clone()),
            Value::IntArray(v) => Some(v.iter().map(|i| *i as f64).collect()),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::RealArray(self)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::RealArray(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

// =============================================================================
// 测试
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind() {
        assert_eq!(Value::from(true).kind(), ValueKind::Bool);
        assert_eq!(Value::from(3).kind(), ValueKind::Integer);
        assert_eq!(Value::from(0.5).kind(), ValueKind::Real);
        assert_eq!(Value::from("x").kind(), ValueKind::String);
        assert_eq!(Value::from(vec![1.0, 2.0]).kind(), ValueKind::RealArray);
        assert!(ValueKind::UriArray.is_array());
        assert_eq!(ValueKind::IntegerArray.to_string(), "array[integer]");
    }

    #[test]
    fn test_coerce_int_to_real() {
        assert_eq!(Value::Int(2).coerce_to(ValueKind::Real), Ok(Value::Real(2.0)));
        assert_eq!(
            Value::IntArray(vec![1, 2]).coerce_to(ValueKind::RealArray),
            Ok(Value::RealArray(vec![1.0, 2.0]))
        );
        assert!(Value::Real(2.0).coerce_to(ValueKind::Integer).is_err());
        assert!(Value::from("2").coerce_to(ValueKind::Integer).is_err());
    }

    #[test]
    fn test_parse_as() {
        assert_eq!(Value::parse_as(ValueKind::Bool, "yes").unwrap(), Value::Bool(true));
        assert_eq!(Value::parse_as(ValueKind::Integer, " 42 ").unwrap(), Value::Int(42));
        assert_eq!(
            Value::parse_as(ValueKind::RealArray, "1, 2.5").unwrap(),
            Value::RealArray(vec![1.0, 2.5])
        );
        assert_eq!(
            Value::parse_as(ValueKind::StringArray, "").unwrap(),
            Value::TextArray(vec![])
        );
        assert!(Value::parse_as(ValueKind::Integer, "x").is_err());
        assert!(Value::parse_as(ValueKind::Uri, "/a b").is_err());
    }

    #[test]
    fn test_value_type_roundtrip() {
        assert_eq!(f64::from_value(&Value::Int(3)), Some(3.0));
        assert_eq!(i64::from_value(&Value::Real(3.0)), None);
        assert_eq!(String::from_value(&Value::from("abc")), Some("abc".to_string()));
        assert_eq!(Vec::<i64>::KIND, ValueKind::IntegerArray);
        assert_eq!(vec![true, false].into_value(), Value::BoolArray(vec![true, false]));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("a").to_string(), "\"a\"");
        assert_eq!(Value::IntArray(vec![1, 2]).to_string(), "[1, 2]");
        assert_eq!(Value::Bool(false).to_string(), "false");
    }

    #[test]
    fn test_serde_is_self_describing() {
        let json = serde_json::to_string(&Value::Real(1.5)).unwrap();
        assert_eq!(json, "{\"real\":1.5}");
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Value::Real(1.5));
    }
}
