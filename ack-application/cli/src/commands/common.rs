//! 公共工具函数模块

use anyhow::{Context, Result};
use ack_model::{TestRun, TestSelection};

/// 打开运行文件
pub fn open_run(file: &str) -> Result<TestRun> {
    TestRun::open(file).with_context(|| format!("加载运行文件失败: {}", file))
}

/// 按完整名称查找方法，可限定设备
pub fn find_method(run: &TestRun, test: &str, device: Option<&str>) -> Result<TestSelection> {
    run.find_method_on(device, test).with_context(|| match device {
        Some(udid) => format!("设备 {} 上没有方法 {}", udid, test),
        None => format!("没有方法 {}", test),
    })
}

/// 解析 `key=value` 参数
pub fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("参数格式应为 key=value: {}", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("注解名称不能为空: {}", s));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("reason=link down").unwrap(),
            ("reason".to_string(), "link down".to_string())
        );
        assert_eq!(
            parse_key_val("expr=a=b").unwrap(),
            ("expr".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }
}
