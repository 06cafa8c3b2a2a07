// crates/cf_foundation/src/uri.rs

//! 寻址模块
//!
//! [`Uri`] 是组件树上的路径代数：由 scheme 标记、绝对/相对标志和有序路径段
//! 组成的不可变值类型。
//!
//! | scheme | 文本形式 | 用途 |
//! |--------|----------|------|
//! | `cpath` | `cpath:/a/b`、`/a/b`、`../d` | 组件树内路径 |
//! | `file` | `file:/tmp/mesh.msh` | 本地文件 |
//! | `http` / `https` | `http://host/a` | 远程资源定位 |
//!
//! 解析时会规约路径：`.` 段被丢弃，`name/..` 成对抵消；绝对路径越过根目录
//! 的 `..` 视为格式错误，相对路径保留开头的 `..`。
//!
//! # 示例
//!
//! ```
//! use cf_foundation::uri::Uri;
//!
//! let base = Uri::parse("/Root/mesh").unwrap();
//! let rel = Uri::parse("../solver/./cfl").unwrap();
//! let full = base.join(&rel).unwrap();
//! assert_eq!(full.to_string(), "cpath:/Root/solver/cfl");
//! ```

use crate::error::{CfError, CfResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 路径 scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scheme {
    /// 组件树内路径
    Cpath,
    /// 本地文件
    File,
    /// HTTP 资源
    Http,
    /// HTTPS 资源
    Https,
}

impl Scheme {
    /// scheme 名称
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpath => "cpath",
            Self::File => "file",
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    fn is_network(self) -> bool {
        matches!(self, Self::Http | Self::Https)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = CfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpath" => Ok(Self::Cpath),
            "file" => Ok(Self::File),
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(CfError::malformed(other, "未知的 scheme")),
        }
    }
}

/// 路径
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uri {
    scheme: Scheme,
    absolute: bool,
    segments: Vec<String>,
}

/// 组件名是否合法（`[A-Za-z0-9_.-]+`，且不是 `.` 或 `..`）
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

impl Uri {
    /// 解析路径文本
    pub fn parse(text: &str) -> CfResult<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CfError::malformed(text, "路径为空"));
        }

        let (scheme, body) = split_scheme(trimmed)?;
        let (absolute, body) = if scheme.is_network() {
            let rest = body
                .strip_prefix("//")
                .ok_or_else(|| CfError::malformed(text, "网络地址必须以 '//' 开头"))?;
            if rest.is_empty() || rest.starts_with('/') {
                return Err(CfError::malformed(text, "缺少主机名"));
            }
            (true, rest)
        } else if let Some(rest) = body.strip_prefix('/') {
            (true, rest)
        } else {
            (false, body)
        };

        let mut raw = Vec::new();
        if !body.is_empty() {
            for (i, segment) in body.split('/').enumerate() {
                if segment.is_empty() {
                    // 允许结尾的单个 '/'
                    if i + 1 == body.split('/').count() {
                        continue;
                    }
                    return Err(CfError::malformed(text, "路径中存在空段"));
                }
                if scheme == Scheme::Cpath
                    && segment != "."
                    && segment != ".."
                    && !is_valid_name(segment)
                {
                    return Err(CfError::malformed(
                        text,
                        format!("非法的组件名 '{}'", segment),
                    ));
                }
                raw.push(segment.to_string());
            }
        }

        if !absolute && raw.is_empty() {
            return Err(CfError::malformed(text, "相对路径为空"));
        }

        let segments = fold_segments(absolute, raw).map_err(|reason| CfError::malformed(text, reason))?;
        Ok(Self {
            scheme,
            absolute,
            segments,
        })
    }

    /// 指定 scheme 的根路径
    pub fn root(scheme: Scheme) -> Self {
        Self {
            scheme,
            absolute: true,
            segments: Vec::new(),
        }
    }

    /// 由名称序列构造绝对树内路径
    pub fn from_names<I, S>(names: I) -> CfResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut uri = Self::root(Scheme::Cpath);
        for name in names {
            uri = uri.child(name)?;
        }
        Ok(uri)
    }

    /// 以 `base` 为基准解析 `relative`
    pub fn resolve(base: &Uri, relative: &Uri) -> CfResult<Uri> {
        if relative.absolute {
            return Ok(relative.clone());
        }
        if base.scheme != relative.scheme {
            return Err(CfError::malformed(
                relative.to_string(),
                format!("scheme 不一致: {} 与 {}", base.scheme, relative.scheme),
            ));
        }
        let mut raw = base.segments.clone();
        raw.extend(relative.segments.iter().cloned());
        let segments = fold_segments(base.absolute, raw)
            .map_err(|reason| CfError::malformed(relative.to_string(), reason))?;
        Ok(Uri {
            scheme: base.scheme,
            absolute: base.absolute,
            segments,
        })
    }

    /// 拼接路径，等价于 `Uri::resolve(self, other)`
    pub fn join(&self, other: &Uri) -> CfResult<Uri> {
        Self::resolve(self, other)
    }

    /// 追加一个名称段
    pub fn child(&self, name: impl Into<String>) -> CfResult<Uri> {
        let name = name.into();
        if self.scheme == Scheme::Cpath && !is_valid_name(&name) {
            return Err(CfError::malformed(name, "非法的组件名"));
        }
        let mut segments = self.segments.clone();
        segments.push(name);
        Ok(Uri {
            scheme: self.scheme,
            absolute: self.absolute,
            segments,
        })
    }

    /// 上一级路径，根路径返回 `None`
    pub fn parent(&self) -> Option<Uri> {
        if self.segments.is_empty() || self.segments.last().is_some_and(|s| s == "..") {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        if !self.absolute && segments.is_empty() {
            return None;
        }
        Some(Uri {
            scheme: self.scheme,
            absolute: self.absolute,
            segments,
        })
    }

    /// 最后一段名称
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// scheme
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// 路径段
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// 是否为绝对路径
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// 是否为根路径
    pub fn is_root(&self) -> bool {
        self.absolute && self.segments.is_empty()
    }

    /// 是否为组件树内路径
    pub fn is_in_tree(&self) -> bool {
        self.scheme == Scheme::Cpath
    }

    /// 不带 scheme 前缀的路径文本
    pub fn path(&self) -> String {
        let joined = self.segments.join("/");
        match (self.scheme.is_network(), self.absolute) {
            (true, _) => format!("//{}", joined),
            (false, true) => format!("/{}", joined),
            (false, false) => joined,
        }
    }
}

fn split_scheme(text: &str) -> CfResult<(Scheme, &str)> {
    match text.find(':') {
        Some(pos) if !text[..pos].contains('/') => {
            let scheme = text[..pos]
                .parse::<Scheme>()
                .map_err(|_| CfError::malformed(text, format!("未知的 scheme '{}'", &text[..pos])))?;
            Ok((scheme, &text[pos + 1..]))
        }
        _ => Ok((Scheme::Cpath, text)),
    }
}

/// 规约 `.` 与 `..`
fn fold_segments(absolute: bool, raw: Vec<String>) -> Result<Vec<String>, String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for segment in raw {
        match segment.as_str() {
            "." => {}
            ".." => match out.last() {
                Some(last) if last != ".." => {
                    out.pop();
                }
                _ if absolute => return Err("'..' 越过了根路径".to_string()),
                _ => out.push(segment),
            },
            _ => out.push(segment),
        }
    }
    Ok(out)
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.path())
    }
}

impl FromStr for Uri {
    type Err = CfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Uri {
    type Error = CfError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Uri> for String {
    fn from(uri: Uri) -> Self {
        uri.to_string()
    }
}

// =============================================================================
// 测试
// =============================================================================
