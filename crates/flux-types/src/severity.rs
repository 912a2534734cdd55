//! 告警级别
//!
//! 参考 ITU-T M.3100 / X.736 的 perceived severity 模型（RFC 5674）。
//! 数值越小越严重，NORMAL 与 CLEAR、UNKNOWN 与 INDETERMINATE 共享同一级别。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 无法识别的级别名称
pub const NOT_VALID: &str = "Not Valid";

/// 告警级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum Severity {
    Critical,
    Major,
    Minor,
    Warning,
    Normal,
    Clear,
    Inform,
    Debug,
    Auth,
    Unknown,
    Indeterminate,
}

/// 终端颜色提示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorHint {
    Red,
    Magenta,
    Yellow,
    Cyan,
    Green,
    Grey,
    None,
}

impl ColorHint {
    /// ANSI 转义序列
    pub fn ansi(&self) -> &'static str {
        match self {
            ColorHint::Red => "\x1b[91m",
            ColorHint::Magenta => "\x1b[95m",
            ColorHint::Yellow => "\x1b[93m",
            ColorHint::Cyan => "\x1b[96m",
            ColorHint::Green => "\x1b[92m",
            ColorHint::Grey => "\x1b[90m",
            ColorHint::None => "",
        }
    }
}

impl Severity {
    /// 全部级别（按严重程度排列）
    pub const ALL: [Severity; 11] = [
        Severity::Critical,
        Severity::Major,
        Severity::Minor,
        Severity::Warning,
        Severity::Normal,
        Severity::Clear,
        Severity::Inform,
        Severity::Debug,
        Severity::Auth,
        Severity::Unknown,
        Severity::Indeterminate,
    ];

    /// 数值级别，越小越严重
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 1,
            Severity::Major => 2,
            Severity::Minor => 3,
            Severity::Warning => 4,
            Severity::Normal | Severity::Clear => 5,
            Severity::Inform => 6,
            Severity::Debug => 7,
            Severity::Auth => 8,
            Severity::Unknown | Severity::Indeterminate => 9,
        }
    }

    /// 展示名称
    pub fn name(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::Major => "Major",
            Severity::Minor => "Minor",
            Severity::Warning => "Warning",
            Severity::Normal => "Normal",
            Severity::Clear => "Clear",
            Severity::Inform => "Informational",
            Severity::Debug => "Debug",
            Severity::Auth => "Security",
            Severity::Unknown => "Unknown",
            Severity::Indeterminate => "Indeterminate",
        }
    }

    /// 线上传输使用的大写编码
    pub fn code(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Major => "MAJOR",
            Severity::Minor => "MINOR",
            Severity::Warning => "WARNING",
            Severity::Normal => "NORMAL",
            Severity::Clear => "CLEAR",
            Severity::Inform => "INFORM",
            Severity::Debug => "DEBUG",
            Severity::Auth => "AUTH",
            Severity::Unknown => "UNKNOWN",
            Severity::Indeterminate => "INDETERMINATE",
        }
    }

    /// 四字符缩写
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Severity::Critical => "Crit",
            Severity::Major => "Majr",
            Severity::Minor => "Minr",
            Severity::Warning => "Warn",
            Severity::Normal => "Norm",
            Severity::Clear => "Clr ",
            Severity::Inform => "Info",
            Severity::Debug => "Dbug",
            Severity::Auth => "Sec ",
            Severity::Unknown => "Unkn",
            Severity::Indeterminate => "Ind ",
        }
    }

    pub fn color(&self) -> ColorHint {
        match self {
            Severity::Critical => ColorHint::Red,
            Severity::Major => ColorHint::Magenta,
            Severity::Minor => ColorHint::Yellow,
            Severity::Warning => ColorHint::Cyan,
            Severity::Normal | Severity::Inform => ColorHint::Green,
            Severity::Debug => ColorHint::Grey,
            _ => ColorHint::None,
        }
    }

    /// 大小写不敏感解析，同时接受展示名称和传输编码
    pub fn parse(name: &str) -> Option<Severity> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|sev| sev.name().eq_ignore_ascii_case(name) || sev.code().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// 级别解析错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid severity: {0}")]
pub struct InvalidSeverity(pub String);

impl FromStr for Severity {
    type Err = InvalidSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::parse(s).ok_or_else(|| InvalidSeverity(s.to_string()))
    }
}

/// 宽松转换：无法识别的名称视为 UNKNOWN，反序列化时使用
impl From<String> for Severity {
    fn from(value: String) -> Self {
        Severity::parse(&value).unwrap_or(Severity::Unknown)
    }
}

impl From<Severity> for &'static str {
    fn from(sev: Severity) -> Self {
        sev.code()
    }
}

/// 名称是否为合法级别
pub fn is_valid(name: &str) -> bool {
    Severity::parse(name).is_some()
}

/// 名称对应的数值级别，无法识别时返回 UNKNOWN 的级别
pub fn code_for(name: &str) -> u8 {
    Severity::parse(name)
        .unwrap_or(Severity::Unknown)
        .rank()
}

/// 解析为规范展示名称，无法识别时返回 [`NOT_VALID`]
pub fn parse(name: &str) -> &'static str {
    Severity::parse(name).map(|s| s.name()).unwrap_or(NOT_VALID)
}
