//! CLI 配置管理
//!
//! 查找顺序: `--config` → 环境变量 `ACK_CONFIG` → `~/.config/ack/config.toml` → 默认值

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 指定配置文件路径的环境变量
pub const CONFIG_ENV: &str = "ACK_CONFIG";

/// CLI 配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// 默认日志级别 (RUST_LOG 与 --log-level 优先)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// 默认输出格式 (table/json)
    #[serde(default = "default_format")]
    pub default_format: String,

    /// 配置版本
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "table".to_string()
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            default_format: default_format(),
            version: default_version(),
        }
    }
}

impl CliConfig {
    /// 获取默认配置文件路径
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("无法获取用户主目录")?;
        Ok(home.join(".config").join("ack").join("config.toml"))
    }

    /// 按查找顺序确定要读取的配置文件，找不到时返回 `None`
    ///
    /// 显式指定 (参数或环境变量) 的文件必须存在。
    fn resolve(explicit: Option<&Path>, env: Option<PathBuf>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit.map(Path::to_path_buf).or(env) {
            if !path.exists() {
                anyhow::bail!("配置文件不存在: {:?}", path);
            }
            return Ok(Some(path));
        }

        let path = Self::config_path()?;
        Ok(path.exists().then_some(path))
    }

    /// 加载配置
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        match Self::resolve(explicit, env)? {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// 从指定文件读取
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {:?}", path))?;

        let config: Self =
            toml::from_str(&content).with_context(|| format!("解析配置文件失败: {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !matches!(self.default_format.as_str(), "table" | "json") {
            anyhow::bail!("不支持的输出格式: {}", self.default_format);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.default_format, "table");
        assert_eq!(config.version, "1.0");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "log_level = \"debug\"\n").unwrap();

        let config = CliConfig::from_file(&path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.default_format, "table");
    }

    #[test]
    fn test_invalid_format_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "default_format = \"yaml\"\n").unwrap();

        assert!(CliConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_explicit_path_wins_over_env() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("explicit.toml");
        let env = dir.path().join("env.toml");
        fs::write(&explicit, "").unwrap();
        fs::write(&env, "").unwrap();

        let resolved = CliConfig::resolve(Some(&explicit), Some(env.clone())).unwrap();
        assert_eq!(resolved, Some(explicit));

        let resolved = CliConfig::resolve(None, Some(env.clone())).unwrap();
        assert_eq!(resolved, Some(env));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(CliConfig::resolve(Some(&missing), None).is_err());
    }
}
