// crates/cf_config/src/option.rs

//! 类型化配置选项
//!
//! 每个 [`ConfigOption`] 在创建时由默认值确定种类，之后只接受同种类
//! （或可拓宽为该种类）的值。写入前依次检查：
//!
//! 1. 只读标记
//! 2. 种类（整数可拓宽为实数）
//! 3. 受限取值列表
//! 4. 校验器
//!
//! 任意一步失败都返回 `OptionValidation`，存储的值保持不变。
//! 写入成功后按注册顺序执行所有触发器。

use cf_foundation::{CfError, CfResult, Value, ValueKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// 校验器：返回 `Err(原因)` 拒绝候选值
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// 触发器：值提交后调用，返回 `Err(原因)` 报告失败
pub type Trigger = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// 触发器句柄，用于解除挂载
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerId(u64);

/// 选项在检查器中的可见级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// 基础选项，默认展示
    Basic,
    /// 高级选项
    #[default]
    Advanced,
}

impl Visibility {
    /// 名称
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Advanced => "advanced",
        }
    }
}

/// 配置选项
pub struct ConfigOption {
    name: String,
    pretty_name: String,
    description: String,
    value: Value,
    default: Value,
    validator: Option<Validator>,
    restricted: Vec<Value>,
    triggers: Vec<(TriggerId, Trigger)>,
    next_trigger: u64,
    visibility: Visibility,
    read_only: bool,
}

impl ConfigOption {
    pub(crate) fn new(name: &str, default: Value) -> Self {
        Self {
            name: name.to_string(),
            pretty_name: String::new(),
            description: String::new(),
            value: default.clone(),
            default,
            validator: None,
            restricted: Vec::new(),
            triggers: Vec::new(),
            next_trigger: 0,
            visibility: Visibility::default(),
            read_only: false,
        }
    }

    // =========================================================================
    // 访问器
    // =========================================================================

    /// 选项名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 显示名，未设置时等于选项名
    pub fn pretty_name(&self) -> &str {
        if self.pretty_name.is_empty() {
            &self.name
        } else {
            &self.pretty_name
        }
    }

    /// 描述
    pub fn description(&self) -> &str {
        &self.description
    }

    /// 当前值
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// 默认值
    pub fn default_value(&self) -> &Value {
        &self.default
    }

    /// 值种类
    pub fn kind(&self) -> ValueKind {
        self.default.kind()
    }

    /// 受限取值列表（空表示不受限）
    pub fn restricted_values(&self) -> &[Value] {
        &self.restricted
    }

    /// 可见级别
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// 是否只读
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// 已挂载的触发器数量
    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    // =========================================================================
    // 链式设置
    // =========================================================================

    /// 设置描述
    pub fn describe(&mut self, text: impl Into<String>) -> &mut Self {
        self.description = text.into();
        self
    }

    /// 设置显示名
    pub fn with_pretty_name(&mut self, text: impl Into<String>) -> &mut Self {
        self.pretty_name = text.into();
        self
    }

    /// 标记为基础选项
    pub fn mark_basic(&mut self) -> &mut Self {
        self.visibility = Visibility::Basic;
        self
    }

    /// 标记为只读
    pub fn read_only(&mut self) -> &mut Self {
        self.read_only = true;
        self
    }

    /// 设置校验器，当前值必须通过校验
    pub fn validator<F>(&mut self, f: F) -> CfResult<&mut Self>
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        let validator: Validator = Arc::new(f);
        validator(&self.value)
            .map_err(|reason| CfError::option_validation(&self.name, self.value.to_string(), reason))?;
        self.validator = Some(validator);
        Ok(self)
    }

    /// 限制取值范围，当前值必须在列表中
    pub fn restricted_to<I, V>(&mut self, values: I) -> CfResult<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let kind = self.kind();
        let mut list = Vec::new();
        for v in values {
            let v = v.into().coerce_to(kind).map_err(|bad| {
                CfError::type_mismatch(&self.name, kind.as_str(), bad.kind().as_str())
            })?;
            list.push(v);
        }
        if !list.is_empty() && !list.contains(&self.value) {
            return Err(CfError::option_validation(
                &self.name,
                self.value.to_string(),
                "当前值不在受限列表中",
            ));
        }
        self.restricted = list;
        Ok(self)
    }

    /// 挂载触发器
    pub fn attach_trigger<F>(&mut self, f: F) -> TriggerId
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        let id = TriggerId(self.next_trigger);
        self.next_trigger += 1;
        self.triggers.push((id, Arc::new(f)));
        id
    }

    /// 解除触发器，返回是否存在
    pub fn detach_trigger(&mut self, id: TriggerId) -> bool {
        let before = self.triggers.len();
        self.triggers.retain(|(tid, _)| *tid != id);
        self.triggers.len() != before
    }

    // =========================================================================
    // 校验与写入
    // =========================================================================

    /// 检查候选值，返回拓宽后的值，不修改选项
    pub fn check(&self, candidate: Value) -> CfResult<Value> {
        if self.read_only {
            return Err(CfError::option_validation(
                &self.name,
                candidate.to_string(),
                "选项只读",
            ));
        }
        let kind = self.kind();
        let value = candidate.coerce_to(kind).map_err(|bad| {
            CfError::option_validation(
                &self.name,
                bad.to_string(),
                format!("期望类型 {}, 实际 {}", kind, bad.kind()),
            )
        })?;
        if !self.restricted.is_empty() && !self.restricted.contains(&value) {
            return Err(CfError::option_validation(
                &self.name,
                value.to_string(),
                "不在受限取值列表中",
            ));
        }
        if let Some(validator) = &self.validator {
            validator(&value)
                .map_err(|reason| CfError::option_validation(&self.name, value.to_string(), reason))?;
        }
        Ok(value)
    }

    /// 写入新值
    ///
    /// 校验失败时旧值保持不变；校验通过后值被提交，随后所有触发器
    /// 依次执行，任意触发器失败时返回 `TriggerFailed`（值仍保持提交）。
    pub fn set(&mut self, candidate: impl Into<Value>) -> CfResult<()> {
        let value = self.check(candidate.into())?;
        self.commit(value)
    }

    /// 恢复默认值
    pub fn reset(&mut self) -> CfResult<()> {
        let default = self.default.clone();
        self.set(default)
    }

    pub(crate) fn commit(&mut self, value: Value) -> CfResult<()> {
        self.value = value;
        let failures: Vec<String> = self
            .triggers
            .iter()
            .filter_map(|(_, trigger)| trigger(&self.value).err())
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            tracing::warn!(
                option = %self.name,
                count = failures.len(),
                "option triggers failed after commit"
            );
            Err(CfError::trigger_failed(&self.name, failures))
        }
    }
}

impl fmt::Debug for ConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigOption")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("default", &self.default)
            .field("restricted", &self.restricted)
            .field("has_validator", &self.validator.is_some())
            .field("triggers", &self.triggers.len())
            .field("visibility", &self.visibility)
            .field("read_only", &self.read_only)
            .finish()
    }
}

// =============================================================================
// 测试
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cf_foundation::ErrorKind;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn positive(v: &Value) -> Result<(), String> {
        match v.as_real() {
            Some(x) if x > 0.0 => Ok(()),
            _ => Err("必须为正数".to_string()),
        }
    }

    #[test]
    fn test_set_and_widen() {
        let mut opt = ConfigOption::new("cfl", Value::Real(0.5));
        opt.set(1).unwrap();
        assert_eq!(opt.value(), &Value::Real(1.0));
        assert_eq!(opt.kind(), ValueKind::Real);
    }

    #[test]
    fn test_kind_mismatch_keeps_value() {
        let mut opt = ConfigOption::new("cfl", Value::Real(0.5));
        let err = opt.set("fast").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Option);
        assert_eq!(opt.value(), &Value::Real(0.5));
    }

    #[test]
    fn test_validator_rejects() {
        let mut opt = ConfigOption::new("cfl", Value::Real(0.5));
        opt.validator(positive).unwrap();

        assert!(opt.set(-1.0).is_err());
        assert_eq!(opt.value(), &Value::Real(0.5));
        assert!(opt.set(0.8).is_ok());
    }

    #[test]
    fn test_validator_must_accept_current_value() {
        let mut opt = ConfigOption::new("cfl", Value::Real(-0.5));
        assert!(opt.validator(positive).is_err());
    }

    #[test]
    fn test_restricted_values() {
        let mut opt = ConfigOption::new("scheme", Value::from("hllc"));
        opt.restricted_to(["hllc", "roe"]).unwrap();

        assert!(opt.set("roe").is_ok());
        assert!(opt.set("central").is_err());
        assert_eq!(opt.value(), &Value::from("roe"));

        let mut other = ConfigOption::new("scheme", Value::from("none"));
        assert!(other.restricted_to(["hllc"]).is_err());
    }

    #[test]
    fn test_read_only() {
        let mut opt = ConfigOption::new("version", Value::Int(1));
        opt.read_only();
        assert!(opt.set(2).is_err());
        assert_eq!(opt.value(), &Value::Int(1));
    }

    #[test]
    fn test_triggers_run_in_order_and_all_run() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut opt = ConfigOption::new("n", Value::Int(0));

        let log = calls.clone();
        opt.attach_trigger(move |_| {
            log.lock().push("first");
            Err("boom".to_string())
        });
        let log = calls.clone();
        opt.attach_trigger(move |v| {
            log.lock().push("second");
            assert_eq!(v, &Value::Int(3));
            Ok(())
        });

        let err = opt.set(3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Trigger);
        assert_eq!(opt.value(), &Value::Int(3));
        assert_eq!(*calls.lock(), vec!["first", "second"]);
    }

    #[test]
    fn test_detach_trigger() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut opt = ConfigOption::new("n", Value::Int(0));
        let c = counter.clone();
        let id = opt.attach_trigger(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        opt.set(1).unwrap();
        assert!(opt.detach_trigger(id));
        assert!(!opt.detach_trigger(id));
        opt.set(2).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reset() {
        let mut opt = ConfigOption::new("n", Value::Int(5));
        opt.set(9).unwrap();
        opt.reset().unwrap();
        assert_eq!(opt.value(), opt.default_value());
    }
}
