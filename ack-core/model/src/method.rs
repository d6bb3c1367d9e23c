//! 测试方法：最小执行单元

use ack_document::Element;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{MethodStatus, ModelError, Result, TestResult};

/// 方法节点的标签名
pub const METHOD_TAG: &str = "test_method";

/// 注解值：标量文本或一组属性
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnnotationValue {
    Text(String),
    Attributes(Vec<(String, String)>),
}

impl From<&str> for AnnotationValue {
    fn from(value: &str) -> Self {
        AnnotationValue::Text(value.to_string())
    }
}

impl From<String> for AnnotationValue {
    fn from(value: String) -> Self {
        AnnotationValue::Text(value)
    }
}

impl From<MethodStatus> for AnnotationValue {
    fn from(value: MethodStatus) -> Self {
        AnnotationValue::Text(value.as_str().to_string())
    }
}

impl From<TestResult> for AnnotationValue {
    fn from(value: TestResult) -> Self {
        AnnotationValue::Text(value.as_str().to_string())
    }
}

/// 一条更新记录中的字段列表
pub type Fields = Vec<(String, AnnotationValue)>;

/// 方法上的命名注解 (status、result、control 以及任意扩展字段)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    name: String,
    value: Option<String>,
    attributes: Vec<(String, String)>,
}

impl Annotation {
    fn new(name: &str, value: &AnnotationValue) -> Self {
        let mut annotation = Self {
            name: name.to_string(),
            value: None,
            attributes: Vec::new(),
        };
        annotation.assign(value);
        annotation
    }

    fn from_element(node: &Element) -> Result<Self> {
        if node.child_elements().next().is_some() {
            return Err(ModelError::MalformedDocument(format!(
                "annotation <{}> must not contain child elements",
                node.name()
            )));
        }
        Ok(Self {
            name: node.name().to_string(),
            value: node.text(),
            attributes: node.attribute_pairs(),
        })
    }

    fn assign(&mut self, value: &AnnotationValue) {
        match value {
            AnnotationValue::Text(text) => self.value = Some(text.clone()),
            AnnotationValue::Attributes(attributes) => self.attributes = attributes.clone(),
        }
    }

    fn to_element(&self) -> Element {
        let mut node = Element::new(self.name.as_str());
        for (k, v) in &self.attributes {
            node.set_attribute(k.as_str(), v.as_str());
        }
        if let Some(value) = self.value.as_deref().filter(|v| !v.is_empty()) {
            node.set_text(value);
        }
        node
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }
}

/// 测试方法
///
/// 名称在所属设备内唯一，形如 `<class>.<method>`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestMethod {
    name: String,
    attributes: Vec<(String, String)>,
    annotations: Vec<Annotation>,
}

impl TestMethod {
    /// 从方法节点构建
    pub fn from_element(class_name: &str, node: &Element) -> Result<Self> {
        let short_name = node.attribute("name").ok_or_else(|| {
            ModelError::MalformedDocument(format!(
                "test method in class '{}' has no name attribute",
                class_name
            ))
        })?;

        let annotations = node
            .child_elements()
            .map(Annotation::from_element)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: format!("{}.{}", class_name, short_name),
            attributes: node.attribute_pairs(),
            annotations,
        })
    }

    /// 序列化为方法节点
    pub fn to_element(&self) -> Element {
        let mut node = Element::new(METHOD_TAG);
        for (k, v) in &self.attributes {
            node.set_attribute(k.as_str(), v.as_str());
        }
        for annotation in &self.annotations {
            node.push_child(annotation.to_element());
        }
        node
    }

    /// 完整名称 `<class>.<method>`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 节点上声明的短名称
    pub fn short_name(&self) -> &str {
        self.attributes
            .iter()
            .find(|(k, _)| k == "name")
            .map(|(_, v)| v.as_str())
            .unwrap_or_default()
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.name == name)
    }

    fn value_of(&self, key: &str) -> Option<&str> {
        self.annotation(key).and_then(Annotation::value)
    }

    // 注解缺失时视为不匹配
    fn matches(&self, key: &str, expected: &str) -> bool {
        self.value_of(key) == Some(expected)
    }

    /// 该方法测试的外部能力
    pub fn control(&self) -> Option<&str> {
        self.value_of("control")
    }

    pub fn status(&self) -> Option<MethodStatus> {
        self.value_of("status").and_then(|s| s.parse().ok())
    }

    pub fn result(&self) -> Option<TestResult> {
        self.value_of("result").and_then(|s| s.parse().ok())
    }

    pub fn has_passed(&self) -> bool {
        self.matches("result", TestResult::Pass.as_str())
    }

    pub fn has_failed(&self) -> bool {
        self.matches("result", TestResult::Fail.as_str())
    }

    pub fn has_skipped(&self) -> bool {
        self.matches("result", TestResult::Skip.as_str())
    }

    pub fn is_waiting(&self) -> bool {
        self.matches("status", MethodStatus::Init.as_str())
    }

    pub fn is_running(&self) -> bool {
        self.matches("status", MethodStatus::Running.as_str())
    }

    pub fn is_done(&self) -> bool {
        self.matches("status", MethodStatus::Done.as_str())
    }

    /// 用一条记录更新注解
    ///
    /// 已有同名注解时覆盖其值 (映射值覆盖其属性集)，否则追加新注解。
    /// `status` 与 `result` 必须是合法取值，校验失败时不修改任何字段。
    pub fn update(&mut self, fields: &[(String, AnnotationValue)]) -> Result<()> {
        validate(fields)?;

        for (key, value) in fields {
            match self.annotations.iter_mut().find(|a| &a.name == key) {
                Some(annotation) => annotation.assign(value),
                None => self.annotations.push(Annotation::new(key, value)),
            }
        }
        debug!(
            "方法 {} 已更新: status={:?} result={:?}",
            self.name,
            self.value_of("status"),
            self.value_of("result")
        );
        Ok(())
    }

    /// 重置为待运行状态 (status=init, result=NULL)
    pub fn reset(&mut self) -> Result<()> {
        self.update(&reset_fields())
    }
}

/// 重跑时写入的字段
pub(crate) fn reset_fields() -> Fields {
    vec![
        ("status".to_string(), MethodStatus::Init.into()),
        ("result".to_string(), TestResult::Null.into()),
    ]
}

pub(crate) fn validate(fields: &[(String, AnnotationValue)]) -> Result<()> {
    for (key, value) in fields {
        let check: fn(&str) -> Result<()> = match key.as_str() {
            "status" => |s: &str| s.parse::<MethodStatus>().map(|_| ()),
            "result" => |s: &str| s.parse::<TestResult>().map(|_| ()),
            _ => continue,
        };
        match value {
            AnnotationValue::Text(text) => check(text)?,
            AnnotationValue::Attributes(_) => {
                return Err(ModelError::InvalidStatusValue {
                    field: key.clone(),
                    value: "<attributes>".to_string(),
                })
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ack_document::Document;

    fn method(xml: &str) -> TestMethod {
        let doc = Document::parse(xml).unwrap();
        TestMethod::from_element("net", doc.root()).unwrap()
    }

    #[test]
    fn test_from_element() {
        let m = method(
            r#"<test_method name="link"><control>eth0</control><status>init</status><result>NULL</result></test_method>"#,
        );
        assert_eq!(m.name(), "net.link");
        assert_eq!(m.short_name(), "link");
        assert_eq!(m.control(), Some("eth0"));
        assert!(m.is_waiting());
        assert!(!m.is_running() && !m.is_done());
        assert_eq!(m.result(), Some(TestResult::Null));
    }

    #[test]
    fn test_missing_annotations_are_false() {
        let m = method(r#"<test_method name="bare"/>"#);
        assert!(!m.is_waiting());
        assert!(!m.has_passed());
        assert!(!m.has_failed());
        assert_eq!(m.status(), None);
        assert_eq!(m.control(), None);
    }

    #[test]
    fn test_update_overwrites_and_appends() {
        let mut m = method(
            r#"<test_method name="link"><status>init</status><result>NULL</result></test_method>"#,
        );
        m.update(&[
            ("status".to_string(), MethodStatus::Done.into()),
            ("result".to_string(), TestResult::Pass.into()),
            ("reason".to_string(), "link up".into()),
            (
                "info".to_string(),
                AnnotationValue::Attributes(vec![("speed".to_string(), "10000".to_string())]),
            ),
        ])
        .unwrap();

        assert!(m.is_done());
        assert!(m.has_passed());
        assert_eq!(m.annotations().len(), 4);
        assert_eq!(m.annotation("reason").unwrap().value(), Some("link up"));
        assert_eq!(
            m.annotation("info").unwrap().attributes(),
            &[("speed".to_string(), "10000".to_string())]
        );
    }

    #[test]
    fn test_mapping_value_replaces_attributes_only() {
        let mut m = method(r#"<test_method name="x"><info a="1">keep</info></test_method>"#);
        m.update(&[(
            "info".to_string(),
            AnnotationValue::Attributes(vec![("b".to_string(), "2".to_string())]),
        )])
        .unwrap();

        let info = m.annotation("info").unwrap();
        assert_eq!(info.value(), Some("keep"));
        assert_eq!(info.attributes(), &[("b".to_string(), "2".to_string())]);
    }

    #[test]
    fn test_invalid_status_leaves_method_untouched() {
        let mut m = method(r#"<test_method name="x"><status>init</status></test_method>"#);
        let before = m.clone();
        let err = m
            .update(&[
                ("note".to_string(), "partial".into()),
                ("status".to_string(), "finished".into()),
            ])
            .unwrap_err();

        assert!(matches!(err, ModelError::InvalidStatusValue { .. }));
        assert_eq!(m, before);
    }

    #[test]
    fn test_reset_restores_init_null() {
        let mut m = method(
            r#"<test_method name="x"><status>done</status><result>fail</result></test_method>"#,
        );
        m.reset().unwrap();
        assert!(m.is_waiting());
        assert_eq!(m.result(), Some(TestResult::Null));
    }

    #[test]
    fn test_to_element_roundtrip() {
        let xml = r#"<test_method name="link" extra="1"><control>eth0</control><status>init</status><result>NULL</result><info speed="10"/></test_method>"#;
        let m = method(xml);
        let out = Document::new(m.to_element()).to_xml().unwrap();
        assert_eq!(out, xml);
    }
}
