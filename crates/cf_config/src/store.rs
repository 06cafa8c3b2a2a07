// crates/cf_config/src/store.rs

//! 选项表与属性表
//!
//! 每个组件拥有一张 [`OptionList`]（用户可配置、带校验）和一张
//! [`PropertyList`]（组件自身维护的状态值，不校验也不触发）。
//! 两者都保持插入顺序，导出为参数帧时顺序稳定。

use crate::frame::ArgumentFrame;
use crate::option::ConfigOption;
use cf_foundation::uri::is_valid_name;
use cf_foundation::{CfError, CfResult, Value, ValueType};
use serde::{Deserialize, Serialize};

// =============================================================================
// OptionList
// =============================================================================

/// 组件选项表
#[derive(Debug, Default)]
pub struct OptionList {
    options: Vec<ConfigOption>,
}

impl OptionList {
    /// 创建空表
    pub fn new() -> Self {
        Self::default()
    }

    /// 选项数量
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// 是否存在选项
    pub fn contains(&self, name: &str) -> bool {
        self.options.iter().any(|o| o.name() == name)
    }

    /// 选项名列表（声明顺序）
    pub fn names(&self) -> Vec<&str> {
        self.options.iter().map(ConfigOption::name).collect()
    }

    /// 遍历选项
    pub fn iter(&self) -> impl Iterator<Item = &ConfigOption> {
        self.options.iter()
    }

    /// 声明新选项，默认值决定选项种类
    pub fn add_option(
        &mut self,
        name: &str,
        default: impl Into<Value>,
    ) -> CfResult<&mut ConfigOption> {
        if !is_valid_name(name) {
            return Err(CfError::invalid_argument(format!("非法选项名 '{}'", name)));
        }
        if self.contains(name) {
            return Err(CfError::duplicate_name("options", name));
        }
        self.options.push(ConfigOption::new(name, default.into()));
        let idx = self.options.len() - 1;
        Ok(&mut self.options[idx])
    }

    /// 声明带校验器的选项，默认值必须通过校验
    pub fn add_option_with_validator<F>(
        &mut self,
        name: &str,
        default: impl Into<Value>,
        validator: F,
    ) -> CfResult<&mut ConfigOption>
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        let default = default.into();
        validator(&default).map_err(|reason| {
            CfError::option_validation(name, default.to_string(), reason)
        })?;
        self.add_option(name, default)?.validator(validator)
    }

    /// 访问选项
    pub fn option(&self, name: &str) -> CfResult<&ConfigOption> {
        self.options
            .iter()
            .find(|o| o.name() == name)
            .ok_or_else(|| CfError::missing_option(name))
    }

    /// 可变访问选项
    pub fn option_mut(&mut self, name: &str) -> CfResult<&mut ConfigOption> {
        self.options
            .iter_mut()
            .find(|o| o.name() == name)
            .ok_or_else(|| CfError::missing_option(name))
    }

    /// 当前值
    pub fn get(&self, name: &str) -> CfResult<&Value> {
        self.option(name).map(ConfigOption::value)
    }

    /// 类型化的当前值
    pub fn value<T: ValueType>(&self, name: &str) -> CfResult<T> {
        let value = self.get(name)?;
        T::from_value(value)
            .ok_or_else(|| CfError::type_mismatch(name, T::KIND.as_str(), value.kind().as_str()))
    }

    /// 写入选项
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> CfResult<()> {
        self.option_mut(name)?.set(value)
    }

    /// 恢复默认值
    pub fn reset(&mut self, name: &str) -> CfResult<()> {
        self.option_mut(name)?.reset()
    }

    /// 批量配置
    ///
    /// 先校验帧中所有字段，全部通过后再按帧顺序提交；任一字段非法时
    /// 不修改任何选项。提交阶段的触发器失败会被合并后返回。
    pub fn configure(&mut self, frame: &ArgumentFrame) -> CfResult<()> {
        let mut staged = Vec::with_capacity(frame.len());
        for field in frame.fields() {
            let value = field.value().ok_or_else(|| {
                CfError::invalid_argument(format!("选项 '{}' 不能是子帧", field.name))
            })?;
            let option = self.option(&field.name)?;
            staged.push((field.name.as_str(), option.check(value.clone())?));
        }

        let mut failures = Vec::new();
        for (name, value) in staged {
            if let Err(CfError::TriggerFailed {
                option,
                failures: f,
            }) = self.option_mut(name)?.commit(value)
            {
                failures.extend(f.into_iter().map(|msg| format!("{}: {}", option, msg)));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CfError::trigger_failed("configure", failures))
        }
    }

    /// 导出当前值
    pub fn to_frame(&self) -> ArgumentFrame {
        let mut frame = ArgumentFrame::new();
        for option in &self.options {
            frame.set(option.name(), option.value().clone());
            frame.describe(option.name(), option.description());
        }
        frame
    }

    /// 导出完整描述，每个选项一个子帧
    pub fn describe(&self) -> ArgumentFrame {
        let mut frame = ArgumentFrame::new();
        for option in &self.options {
            let entry = frame.map_mut(option.name());
            entry
                .set("value", option.value().clone())
                .set("default", option.default_value().clone())
                .set("type", option.kind().as_str())
                .set("pretty_name", option.pretty_name())
                .set("description", option.description())
                .set("visibility", option.visibility().as_str())
                .set("read_only", option.is_read_only());
            if !option.restricted_values().is_empty() {
                let restricted: Vec<String> =
                    option.restricted_values().iter().map(|v| v.to_string()).collect();
                entry.set("restricted", restricted);
            }
        }
        frame
    }
}

// =============================================================================
// PropertyList
// =============================================================================

/// 组件属性表
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyList {
    properties: Vec<(String, Value)>,
}

impl PropertyList {
    /// 创建空表
    pub fn new() -> Self {
        Self::default()
    }

    /// 属性数量
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// 是否存在属性
    pub fn contains(&self, name: &str) -> bool {
        self.properties.iter().any(|(n, _)| n == name)
    }

    /// 设置属性（存在则替换）
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.properties.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => self.properties.push((name.to_string(), value)),
        }
    }

    /// 取属性
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// 类型化取属性
    pub fn value<T: ValueType>(&self, name: &str) -> CfResult<T> {
        let value = self
            .get(name)
            .ok_or_else(|| CfError::not_found(format!("property:{}", name)))?;
        T::from_value(value)
            .ok_or_else(|| CfError::type_mismatch(name, T::KIND.as_str(), value.kind().as_str()))
    }

    /// 移除属性
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let idx = self.properties.iter().position(|(n, _)| n == name)?;
        Some(self.properties.remove(idx).1)
    }

    /// 遍历属性
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// 导出为参数帧
    pub fn to_frame(&self) -> ArgumentFrame {
        let mut frame = ArgumentFrame::new();
        for (name, value) in &self.properties {
            frame.set(name, value.clone());
        }
        frame
    }
}

// =============================================================================
// 测试
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cf_foundation::ErrorKind;

    fn solver_options() -> OptionList {
        let mut options = OptionList::new();
        options
            .add_option_with_validator("cfl", 0.5, |v| match v.as_real() {
                Some(x) if x > 0.0 && x <= 1.0 => Ok(()),
                _ => Err("必须在 (0, 1] 范围内".to_string()),
            })
            .unwrap()
            .describe("CFL number")
            .mark_basic();
        options.add_option("max_iterations", 100_i64).unwrap();
        options
            .add_option("scheme", "hllc")
            .unwrap()
            .restricted_to(["hllc", "roe", "rusanov"])
            .unwrap();
        options
    }

    #[test]
    fn test_duplicate_option() {
        let mut options = solver_options();
        let err = options.add_option("cfl", 0.1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateName);
        assert_eq!(options.value::<f64>("cfl").unwrap(), 0.5);
    }

    #[test]
    fn test_invalid_default_rejected() {
        let mut options = OptionList::new();
        let err = options
            .add_option_with_validator("n", -1_i64, |v| match v.as_int() {
                Some(n) if n >= 0 => Ok(()),
                _ => Err("负数".to_string()),
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Option);
        assert!(!options.contains("n"));
    }

    #[test]
    fn test_rejected_set_keeps_old_value() {
        let mut options = solver_options();
        assert!(options.set("cfl", 1.5).is_err());
        assert_eq!(options.value::<f64>("cfl").unwrap(), 0.5);

        options.set("cfl", 0.9).unwrap();
        assert_eq!(options.value::<f64>("cfl").unwrap(), 0.9);
    }

    #[test]
    fn test_missing_and_typed_errors() {
        let options = solver_options();
        assert!(matches!(
            options.get("absent"),
            Err(CfError::MissingOption { .. })
        ));
        assert!(matches!(
            options.value::<bool>("cfl"),
            Err(CfError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_configure_is_all_or_nothing() {
        let mut options = solver_options();
        let frame = ArgumentFrame::new()
            .with("max_iterations", 10)
            .with("scheme", "central");

        assert!(options.configure(&frame).is_err());
        assert_eq!(options.value::<i64>("max_iterations").unwrap(), 100);

        let frame = ArgumentFrame::new()
            .with("max_iterations", 10)
            .with("scheme", "roe");
        options.configure(&frame).unwrap();
        assert_eq!(options.value::<i64>("max_iterations").unwrap(), 10);
        assert_eq!(options.value::<String>("scheme").unwrap(), "roe");
    }

    #[test]
    fn test_reset_restores_default() {
        let mut options = solver_options();
        options.set("max_iterations", 7).unwrap();
        options.reset("max_iterations").unwrap();
        assert_eq!(options.value::<i64>("max_iterations").unwrap(), 100);
    }

    #[test]
    fn test_export_frames() {
        let options = solver_options();
        let values = options.to_frame();
        assert_eq!(values.names(), vec!["cfl", "max_iterations", "scheme"]);
        assert_eq!(values.description("cfl"), Some("CFL number"));

        let described = options.describe();
        let scheme = described.map("scheme").unwrap();
        assert_eq!(scheme.value::<String>("type").unwrap(), "string");
        assert_eq!(
            scheme.value::<Vec<String>>("restricted").unwrap().len(),
            3
        );
        let cfl = described.map("cfl").unwrap();
        assert_eq!(cfl.value::<String>("visibility").unwrap(), "basic");
    }

    #[test]
    fn test_property_list() {
        let mut props = PropertyList::new();
        props.set("iterations", 3);
        props.set("iterations", 4);
        props.set("converged", false);

        assert_eq!(props.len(), 2);
        assert_eq!(props.value::<i64>("iterations").unwrap(), 4);
        assert!(props.value::<i64>("absent").unwrap_err().is_not_found());
        assert_eq!(props.remove("converged"), Some(Value::Bool(false)));
        assert_eq!(props.to_frame().names(), vec!["iterations"]);
    }
}
