// crates/cf_config/src/frame.rs

//! 参数帧（Argument Frame）
//!
//! 信号的参数与返回值都是参数帧：有序、具名、可嵌套的字段集合。
//! 每个字段由 `(name, description, entry)` 组成，`entry` 是一个 [`Value`]
//! 或一个子帧。值自带种类标签，因此帧本身就是自描述的，可以直接
//! 经由 bincode 跨线程、跨进程传输。
//!
//! # 示例
//!
//! ```
//! use cf_config::ArgumentFrame;
//!
//! let mut args = ArgumentFrame::new()
//!     .with("name", "solver1")
//!     .with("cfl", 0.5);
//! args.map_mut("options").set("scheme", "hllc");
//!
//! assert_eq!(args.value::<f64>("cfl").unwrap(), 0.5);
//! assert_eq!(args.map("options").unwrap().len(), 1);
//! ```

use cf_foundation::{CfError, CfResult, Uri, Value, ValueType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 字段内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldEntry {
    /// 单个值
    Value(Value),
    /// 嵌套子帧
    Map(ArgumentFrame),
}

/// 帧中的一个字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// 字段名
    pub name: String,
    /// 描述（签名帧用于说明参数含义）
    pub description: String,
    /// 内容
    pub entry: FieldEntry,
}

impl Field {
    /// 字段值（子帧时为 `None`）
    pub fn value(&self) -> Option<&Value> {
        match &self.entry {
            FieldEntry::Value(v) => Some(v),
            FieldEntry::Map(_) => None,
        }
    }

    /// 子帧（值字段时为 `None`）
    pub fn map(&self) -> Option<&ArgumentFrame> {
        match &self.entry {
            FieldEntry::Map(m) => Some(m),
            FieldEntry::Value(_) => None,
        }
    }
}

/// 参数帧
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArgumentFrame {
    fields: Vec<Field>,
}

impl ArgumentFrame {
    /// 创建空帧
    pub fn new() -> Self {
        Self::default()
    }

    /// 字段数量
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 按顺序访问所有字段
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// 是否包含字段
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    fn put(&mut self, name: &str, entry: FieldEntry) -> &mut Field {
        let idx = match self.position(name) {
            Some(idx) => {
                self.fields[idx].entry = entry;
                idx
            }
            None => {
                self.fields.push(Field {
                    name: name.to_string(),
                    description: String::new(),
                    entry,
                });
                self.fields.len() - 1
            }
        };
        &mut self.fields[idx]
    }

    fn put_existing(&mut self, name: &str) -> &mut Field {
        match self.position(name) {
            Some(idx) => &mut self.fields[idx],
            None => self.put(name, FieldEntry::Map(ArgumentFrame::new())),
        }
    }

    /// 设置值字段：已存在则原位替换（保留描述），否则追加
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.put(name, FieldEntry::Value(value.into()));
        self
    }

    /// 构建器形式的 [`set`](Self::set)
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// 为已存在的字段设置描述
    pub fn describe(&mut self, name: &str, text: impl Into<String>) -> &mut Self {
        if let Some(idx) = self.position(name) {
            self.fields[idx].description = text.into();
        }
        self
    }

    /// 字段描述
    pub fn description(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.description.as_str())
    }

    /// 按名访问字段
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// 取值字段
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.field(name).and_then(Field::value)
    }

    /// 取类型化的值，缺失或种类不符时返回 `InvalidArgument`
    ///
    /// 整数字段可按实数读取。
    pub fn value<T: ValueType>(&self, name: &str) -> CfResult<T> {
        let value = self
            .get(name)
            .ok_or_else(|| CfError::invalid_argument(format!("缺少参数 '{}'", name)))?;
        T::from_value(value).ok_or_else(|| {
            CfError::invalid_argument(format!(
                "参数 '{}' 类型错误: 期望 {}, 实际 {}",
                name,
                T::KIND,
                value.kind()
            ))
        })
    }

    /// 取类型化的值，缺失时使用默认值
    pub fn value_or<T: ValueType>(&self, name: &str, default: T) -> CfResult<T> {
        if self.get(name).is_none() {
            return Ok(default);
        }
        self.value(name)
    }

    /// 取 Uri 字段，允许以文本形式给出
    pub fn uri(&self, name: &str) -> CfResult<Uri> {
        match self.get(name) {
            Some(Value::Text(text)) => Uri::parse(text),
            _ => self.value::<Uri>(name),
        }
    }

    /// 取子帧
    pub fn map(&self, name: &str) -> Option<&ArgumentFrame> {
        self.field(name).and_then(Field::map)
    }

    /// 取可变子帧，不存在（或是值字段）时创建空子帧
    pub fn map_mut(&mut self, name: &str) -> &mut ArgumentFrame {
        let is_map = matches!(self.field(name).map(|f| &f.entry), Some(FieldEntry::Map(_)));
        let field = if is_map {
            self.put_existing(name)
        } else {
            self.put(name, FieldEntry::Map(ArgumentFrame::new()))
        };
        match &mut field.entry {
            FieldEntry::Map(map) => map,
            FieldEntry::Value(_) => unreachable!("map_mut: entry was just replaced by a map"),
        }
    }

    /// 插入子帧
    pub fn insert_map(&mut self, name: &str, frame: ArgumentFrame) -> &mut Self {
        self.put(name, FieldEntry::Map(frame));
        self
    }

    /// 移除字段
    pub fn remove(&mut self, name: &str) -> Option<Field> {
        self.position(name).map(|idx| self.fields.remove(idx))
    }

    /// 用签名帧中的默认值补全缺失字段，已有子帧递归补全
    pub fn complete_from(&mut self, signature: &ArgumentFrame) {
        for sig in &signature.fields {
            match self.position(&sig.name) {
                None => self.fields.push(sig.clone()),
                Some(idx) => {
                    if let (FieldEntry::Map(mine), FieldEntry::Map(theirs)) =
                        (&mut self.fields[idx].entry, &sig.entry)
                    {
                        mine.complete_from(theirs);
                    }
                }
            }
        }
    }

    /// 字段名列表
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        for field in &self.fields {
            let pad = "  ".repeat(depth);
            match &field.entry {
                FieldEntry::Value(v) => {
                    write!(f, "{}{} ({}) = {}", pad, field.name, v.kind(), v)?;
                    if !field.description.is_empty() {
                        write!(f, "  # {}", field.description)?;
                    }
                    writeln!(f)?;
                }
                FieldEntry::Map(m) => {
                    writeln!(f, "{}{}:", pad, field.name)?;
                    m.write_indented(f, depth + 1)?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for ArgumentFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

// =============================================================================
// 纯 JSON 互转
// =============================================================================

impl ArgumentFrame {
    /// 由普通 JSON 对象构造帧
    ///
    /// 布尔、整数、浮点与字符串映射为对应值，以 `cpath:` 开头的字符串
    /// 映射为 Uri，同构数组映射为数组值，嵌套对象映射为子帧。
    pub fn from_plain_json(json: &serde_json::Value) -> CfResult<Self> {
        let object = json
            .as_object()
            .ok_or_else(|| CfError::invalid_argument("参数必须是 JSON 对象"))?;
        let mut frame = ArgumentFrame::new();
        for (name, item) in object {
            match item {
                serde_json::Value::Object(_) => {
                    frame.insert_map(name, Self::from_plain_json(item)?);
                }
                other => {
                    frame.set(name, json_to_value(name, other)?);
                }
            }
        }
        Ok(frame)
    }

    /// 转换为普通 JSON 对象（丢弃描述）
    pub fn to_plain_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for field in &self.fields {
            let item = match &field.entry {
                FieldEntry::Value(v) => value_to_json(v),
                FieldEntry::Map(m) => m.to_plain_json(),
            };
            object.insert(field.name.clone(), item);
        }
        serde_json::Value::Object(object)
    }
}

fn json_scalar(name: &str, json: &serde_json::Value) -> CfResult<Value> {
    use serde_json::Value as J;
    match json {
        J::Bool(b) => Ok(Value::Bool(*b)),
        J::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Int(i)),
            None => n
                .as_f64()
                .map(Value::Real)
                .ok_or_else(|| CfError::invalid_argument(format!("参数 '{}' 数值越界", name))),
        },
        J::String(s) if s.starts_with("cpath:") => Ok(Value::Uri(Uri::parse(s)?)),
        J::String(s) => Ok(Value::Text(s.clone())),
        _ => Err(CfError::invalid_argument(format!(
            "参数 '{}' 不支持的 JSON 类型",
            name
        ))),
    }
}

fn json_to_value(name: &str, json: &serde_json::Value) -> CfResult<Value> {
    let items = match json {
        serde_json::Value::Array(items) => items,
        scalar => return json_scalar(name, scalar),
    };
    let scalars = items
        .iter()
        .map(|item| json_scalar(name, item))
        .collect::<CfResult<Vec<_>>>()?;

    let mismatch = || CfError::invalid_argument(format!("参数 '{}' 数组元素类型不一致", name));
    let value = match scalars.first() {
        None => Value::TextArray(Vec::new()),
        Some(Value::Bool(_)) => Value::BoolArray(
            scalars
                .iter()
                .map(Value::as_bool)
                .collect::<Option<_>>()
                .ok_or_else(mismatch)?,
        ),
        Some(Value::Int(_)) if scalars.iter().all(|v| matches!(v, Value::Int(_))) => {
            Value::IntArray(scalars.iter().filter_map(Value::as_int).collect())
        }
        Some(Value::Int(_)) | Some(Value::Real(_)) => Value::RealArray(
            scalars
                .iter()
                .map(Value::as_real)
                .collect::<Option<_>>()
                .ok_or_else(mismatch)?,
        ),
        Some(Value::Uri(_)) => Value::UriArray(
            scalars
                .iter()
                .map(|v| v.as_uri().cloned())
                .collect::<Option<_>>()
                .ok_or_else(mismatch)?,
        ),
        Some(_) => Value::TextArray(
            scalars
                .iter()
                .map(|v| match v {
                    Value::Text(s) => Some(s.clone()),
                    _ => None,
                })
                .collect::<Option<_>>()
                .ok_or_else(mismatch)?,
        ),
    };
    Ok(value)
}

fn value_to_json(value: &Value) -> serde_json::Value {
    use serde_json::json;
    match value {
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Real(r) => json!(r),
        Value::Text(s) => json!(s),
        Value::Uri(u) => json!(u.to_string()),
        Value::BoolArray(v) => json!(v),
        Value::IntArray(v) => json!(v),
        Value::RealArray(v) => json!(v),
        Value::TextArray(v) => json!(v),
        Value::UriArray(v) => json!(v.iter().map(|u| u.to_string()).collect::<Vec<_>>()),
    }
}

// =============================================================================
// 测试
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cf_foundation::ErrorKind;

    #[test]
    fn test_set_replaces_in_place() {
        let mut frame = ArgumentFrame::new().with("a", 1).with("b", 2);
        frame.describe("a", "first");
        frame.set("a", 10);

        assert_eq!(frame.names(), vec!["a", "b"]);
        assert_eq!(frame.get("a"), Some(&Value::Int(10)));
        assert_eq!(frame.description("a"), Some("first"));
    }

    #[test]
    fn test_typed_access() {
        let frame = ArgumentFrame::new().with("n", 3).with("name", "x");

        assert_eq!(frame.value::<i64>("n").unwrap(), 3);
        assert_eq!(frame.value::<f64>("n").unwrap(), 3.0);
        assert_eq!(frame.value::<String>("name").unwrap(), "x");

        let missing = frame.value::<i64>("absent").unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::InvalidArgument);
        let wrong = frame.value::<bool>("name").unwrap_err();
        assert_eq!(wrong.kind(), ErrorKind::InvalidArgument);
        assert!(frame.value_or("absent", 7_i64).unwrap() == 7);
    }

    #[test]
    fn test_map_mut_creates_submap() {
        let mut frame = ArgumentFrame::new().with("options", 1);
        frame.map_mut("options").set("cfl", 0.3);
        frame.map_mut("options").set("scheme", "roe");

        let options = frame.map("options").unwrap();
        assert_eq!(options.len(), 2);
        assert!(frame.get("options").is_none());
    }

    #[test]
    fn test_complete_from_signature() {
        let mut signature = ArgumentFrame::new().with("name", "").with("count", 1);
        signature.describe("count", "repeat count");
        signature.map_mut("extra").set("flag", false);

        let mut args = ArgumentFrame::new().with("name", "given");
        args.map_mut("extra");
        args.complete_from(&signature);

        assert_eq!(args.value::<String>("name").unwrap(), "given");
        assert_eq!(args.value::<i64>("count").unwrap(), 1);
        assert_eq!(args.description("count"), Some("repeat count"));
        assert_eq!(args.map("extra").unwrap().get("flag"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_remove() {
        let mut frame = ArgumentFrame::new().with("a", 1);
        assert!(frame.remove("a").is_some());
        assert!(frame.remove("a").is_none());
        assert!(frame.is_empty());
    }

    #[test]
    fn test_plain_json_conversion() {
        let json = serde_json::json!({
            "name": "solver1",
            "cfl": 0.5,
            "steps": 10,
            "weights": [1, 2.5],
            "target": "cpath:/Root/a",
            "options": { "scheme": "hllc" }
        });
        let frame = ArgumentFrame::from_plain_json(&json).unwrap();

        assert_eq!(frame.get("steps"), Some(&Value::Int(10)));
        assert_eq!(frame.get("weights"), Some(&Value::RealArray(vec![1.0, 2.5])));
        assert_eq!(frame.uri("target").unwrap().path(), "/Root/a");
        assert_eq!(
            frame.map("options").unwrap().value::<String>("scheme").unwrap(),
            "hllc"
        );

        let back = frame.to_plain_json();
        assert_eq!(back["cfl"], serde_json::json!(0.5));
        assert_eq!(back["options"]["scheme"], serde_json::json!("hllc"));
    }

    #[test]
    fn test_plain_json_rejects_mixed_array() {
        let json = serde_json::json!({ "bad": [true, "x"] });
        assert!(ArgumentFrame::from_plain_json(&json).is_err());
        assert!(ArgumentFrame::from_plain_json(&serde_json::json!([1])).is_err());
    }

    #[test]
    fn test_display_lists_nested_fields() {
        let mut frame = ArgumentFrame::new().with("a", 1);
        frame.map_mut("sub").set("b", true);
        let text = frame.to_string();

        assert!(text.contains("a (integer) = 1"));
        assert!(text.contains("sub:"));
        assert!(text.contains("  b (bool) = true"));
    }
}
