//! 测试类：一组测试方法及其声明的能力

use ack_document::{modify, Document, DocumentStore, Element};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::method::validate;
use crate::{AnnotationValue, Fields, MethodStatus, ModelError, Result, TestMethod, TestResult};

/// 测试类节点的标签名
pub const CLASS_TAG: &str = "test_class";

/// 设备节点的标签名
pub const DEVICE_TAG: &str = "device";

/// 标记测试类为认证必需的能力标识
pub const REQUIRED_CAPABILITY: &str = "REQ";

/// 一条方法结果记录：按 `test_name` 定位方法后应用 `fields`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub test_name: String,
    #[serde(default)]
    pub fields: Fields,
}

impl ResultRecord {
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            fields: Vec::new(),
        }
    }

    /// 一次完成的结果：result 与 status=done 在同一条记录里写入
    pub fn outcome(test_name: impl Into<String>, result: TestResult) -> Self {
        Self::new(test_name)
            .field("status", MethodStatus::Done)
            .field("result", result)
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<AnnotationValue>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }
}

/// 测试类
#[derive(Debug, Clone)]
pub struct TestClass {
    name: String,
    device_udid: String,
    attributes: Vec<(String, String)>,
    capabilities: Vec<String>,
    required: bool,
    order: Option<String>,
    methods: Vec<TestMethod>,
}

impl TestClass {
    /// 从测试类节点构建
    pub fn from_element(device_udid: &str, node: &Element) -> Result<Self> {
        let name = node
            .attribute("name")
            .ok_or_else(|| {
                ModelError::MalformedDocument(format!(
                    "test class of device '{}' has no name attribute",
                    device_udid
                ))
            })?
            .to_string();

        let declared = match node.attribute("caps") {
            Some(literal) => parse_capabilities(literal)?,
            None => Vec::new(),
        };
        let required = declared.iter().any(|c| c == REQUIRED_CAPABILITY);
        let capabilities = declared
            .into_iter()
            .filter(|c| c != REQUIRED_CAPABILITY)
            .collect();

        let methods = node
            .child_elements()
            .map(|m| TestMethod::from_element(&name, m))
            .collect::<Result<Vec<_>>>()?;

        for (i, method) in methods.iter().enumerate() {
            if methods[..i].iter().any(|m| m.name() == method.name()) {
                return Err(ModelError::MalformedDocument(format!(
                    "duplicate test method '{}' in class '{}'",
                    method.name(),
                    name
                )));
            }
        }

        Ok(Self {
            order: node.attribute("order").map(str::to_string),
            attributes: node.attribute_pairs(),
            device_udid: device_udid.to_string(),
            name,
            capabilities,
            required,
            methods,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 所属设备的 udid
    pub fn device_udid(&self) -> &str {
        &self.device_udid
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// 声明的能力 (不含必需标记)
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// 调度顺序提示，相同取值之间没有确定顺序
    pub fn order(&self) -> Option<&str> {
        self.order.as_deref()
    }

    pub fn methods(&self) -> &[TestMethod] {
        &self.methods
    }

    pub(crate) fn method_mut(&mut self, index: usize) -> Option<&mut TestMethod> {
        self.methods.get_mut(index)
    }

    /// 待运行方法，按名称升序
    pub fn methods_to_run(&self) -> Vec<&TestMethod> {
        let mut waiting: Vec<_> = self.methods.iter().filter(|m| m.is_waiting()).collect();
        waiting.sort_by(|a, b| a.name().cmp(b.name()));
        waiting
    }

    /// 名称升序下第一个待运行方法的下标
    pub(crate) fn first_ready_index(&self) -> Option<usize> {
        self.methods
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_waiting())
            .min_by(|(_, a), (_, b)| a.name().cmp(b.name()))
            .map(|(i, _)| i)
    }

    /// 挑选下一个待运行方法
    ///
    /// 给定 `name` 时返回名称包含它的第一个待运行方法，找不到则报错。
    pub fn next_method(&self, name: Option<&str>) -> Result<Option<&TestMethod>> {
        let ready = self.methods_to_run();
        match name {
            Some(name) => ready
                .into_iter()
                .find(|m| m.name().contains(name))
                .map(Some)
                .ok_or_else(|| ModelError::MethodNotFound {
                    test_name: name.to_string(),
                    class_name: self.name.clone(),
                }),
            None => Ok(ready.into_iter().next()),
        }
    }

    /// 按完整名称或短名称查找方法
    pub fn method_by_name(&self, name: &str) -> Option<&TestMethod> {
        self.method_index(name).map(|i| &self.methods[i])
    }

    pub(crate) fn method_index(&self, name: &str) -> Option<usize> {
        self.methods
            .iter()
            .position(|m| m.name() == name)
            .or_else(|| self.methods.iter().position(|m| m.short_name() == name))
    }

    /// 按状态分组：(running, waiting, failed)，各组独立过滤
    pub fn group_by_status(&self) -> (Vec<&TestMethod>, Vec<&TestMethod>, Vec<&TestMethod>) {
        let running = self.methods.iter().filter(|m| m.is_running()).collect();
        let waiting = self.methods.iter().filter(|m| m.is_waiting()).collect();
        let failed = self.methods.iter().filter(|m| m.has_failed()).collect();
        (running, waiting, failed)
    }

    /// 没有待运行方法即视为完成
    pub fn is_finished(&self) -> bool {
        !self.methods.iter().any(TestMethod::is_waiting)
    }

    /// 必需测试类要求全部方法通过；非必需测试类总是视为通过
    pub fn has_passed(&self) -> bool {
        !self.required || self.methods.iter().all(TestMethod::has_passed)
    }

    /// 批量应用方法结果
    ///
    /// 先定位并校验全部记录，任一记录无效时不修改任何方法。
    pub fn update(&mut self, results: &[ResultRecord]) -> Result<()> {
        let mut targets = Vec::with_capacity(results.len());
        for record in results {
            let index =
                self.method_index(&record.test_name)
                    .ok_or_else(|| ModelError::UnknownMethod {
                        test_name: record.test_name.clone(),
                        class_name: self.name.clone(),
                    })?;
            validate(&record.fields)?;
            targets.push(index);
        }

        for (index, record) in targets.into_iter().zip(results) {
            self.methods[index].update(&record.fields)?;
        }
        Ok(())
    }

    /// 把本测试类的全部方法写回文档
    ///
    /// 只替换匹配的测试类节点的子节点，其余部分保持不变。
    pub fn persist<S: DocumentStore + ?Sized>(&self, store: &S, resource: &str) -> Result<()> {
        modify(store, resource, |doc| self.rewrite(doc, resource))?;
        info!(
            "测试类 {} (设备 {}) 已写回 {}",
            self.name, self.device_udid, resource
        );
        Ok(())
    }

    fn rewrite(&self, doc: &mut Document, resource: &str) -> Result<()> {
        let not_found = || ModelError::DeviceOrClassNotFound {
            udid: self.device_udid.clone(),
            class_name: self.name.clone(),
            resource: resource.to_string(),
        };

        let root = doc.root_mut();
        let device_path = root
            .descendant_paths(DEVICE_TAG)
            .into_iter()
            .filter(|p| {
                root.at_path(p).and_then(|d| d.attribute("udid")) == Some(self.device_udid.as_str())
            })
            .last()
            .ok_or_else(not_found)?;

        let device = root.at_path(&device_path).ok_or_else(not_found)?;
        let class_paths: Vec<_> = device
            .descendant_paths(CLASS_TAG)
            .into_iter()
            .filter(|p| device.at_path(p).and_then(|c| c.attribute("name")) == Some(self.name.as_str()))
            .collect();

        let class_path = match class_paths.len() {
            0 => return Err(not_found()),
            1 => &class_paths[0],
            count => {
                return Err(ModelError::AmbiguousClass {
                    udid: self.device_udid.clone(),
                    class_name: self.name.clone(),
                    count,
                })
            }
        };

        let full_path: Vec<usize> = device_path.iter().chain(class_path).copied().collect();
        let node = root.at_path_mut(&full_path).ok_or_else(not_found)?;
        node.clear_children();
        for method in &self.methods {
            node.push_child(method.to_element());
        }
        debug!("测试类节点 {} 已重建 {} 个方法", self.name, self.methods.len());
        Ok(())
    }
}

/// 解析形如 `['REQ', 'GRO']` 的能力列表
pub fn parse_capabilities(literal: &str) -> Result<Vec<String>> {
    let malformed = || ModelError::MalformedDocument(format!("invalid caps literal: {}", literal));

    let inner = literal
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(malformed)?
        .trim();
    if inner.is_empty() {
        return Ok(Vec::new());
    }

    let mut items: Vec<&str> = inner.split(',').map(str::trim).collect();
    if items.last() == Some(&"") {
        items.pop();
    }

    items
        .into_iter()
        .map(|item| {
            ['\'', '"']
                .iter()
                .find_map(|q| item.strip_prefix(*q).and_then(|s| s.strip_suffix(*q)))
                .filter(|s| item.len() >= 2 && !s.contains(['\'', '"']))
                .map(str::to_string)
                .ok_or_else(malformed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLASS_XML: &str = r#"<test_class name="net" order="1" caps="['REQ', 'GRO']"><test_method name="speed"><status>init</status><result>NULL</result></test_method><test_method name="link"><status>init</status><result>NULL</result></test_method><test_method name="mtu"><status>done</status><result>fail</result></test_method></test_class>"#;

    fn class() -> TestClass {
        let doc = Document::parse(CLASS_XML).unwrap();
        TestClass::from_element("1", doc.root()).unwrap()
    }

    #[test]
    fn test_parse_capabilities() {
        assert_eq!(parse_capabilities("[]").unwrap(), Vec::<String>::new());
        assert_eq!(
            parse_capabilities(r#" ['REQ', "GRO", ] "#).unwrap(),
            vec!["REQ".to_string(), "GRO".to_string()]
        );
        assert!(parse_capabilities("REQ, GRO").is_err());
        assert!(parse_capabilities("['REQ', GRO]").is_err());
        assert!(parse_capabilities("[']").is_err());
    }

    #[test]
    fn test_required_flag_and_capabilities() {
        let c = class();
        assert!(c.is_required());
        assert_eq!(c.capabilities(), &["GRO".to_string()]);
        assert_eq!(c.order(), Some("1"));
        assert_eq!(c.device_udid(), "1");
    }

    #[test]
    fn test_methods_to_run_sorted() {
        let c = class();
        let names: Vec<_> = c.methods_to_run().iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["net.link", "net.speed"]);
        assert_eq!(c.methods()[c.first_ready_index().unwrap()].name(), "net.link");
    }

    #[test]
    fn test_next_method() {
        let c = class();
        assert_eq!(c.next_method(None).unwrap().unwrap().name(), "net.link");
        assert_eq!(c.next_method(Some("spe")).unwrap().unwrap().name(), "net.speed");
        // mtu 已完成，不在待运行队列中
        assert!(matches!(
            c.next_method(Some("mtu")),
            Err(ModelError::MethodNotFound { .. })
        ));
    }

    #[test]
    fn test_group_by_status_and_verdict() {
        let c = class();
        let (running, waiting, failed) = c.group_by_status();
        assert!(running.is_empty());
        assert_eq!(waiting.len(), 2);
        assert_eq!(failed[0].name(), "net.mtu");
        assert!(!c.is_finished());
        assert!(!c.has_passed());
    }

    #[test]
    fn test_non_required_class_passes_vacuously() {
        let xml = r#"<test_class name="opt" caps="['GRO']"><test_method name="a"><status>done</status><result>fail</result></test_method></test_class>"#;
        let doc = Document::parse(xml).unwrap();
        let c = TestClass::from_element("1", doc.root()).unwrap();
        assert!(!c.is_required());
        assert!(c.has_passed());
        assert!(c.is_finished());
    }

    #[test]
    fn test_update_unknown_method_is_atomic() {
        let mut c = class();
        let err = c
            .update(&[
                ResultRecord::outcome("net.link", TestResult::Pass),
                ResultRecord::outcome("net.ghost", TestResult::Pass),
            ])
            .unwrap_err();
        assert!(matches!(err, ModelError::UnknownMethod { .. }));
        assert!(c.method_by_name("net.link").unwrap().is_waiting());
    }

    #[test]
    fn test_update_by_short_name() {
        let mut c = class();
        c.update(&[ResultRecord::outcome("link", TestResult::Skip)])
            .unwrap();
        let link = c.method_by_name("net.link").unwrap();
        assert!(link.is_done());
        assert!(link.has_skipped());
    }

    #[test]
    fn test_update_requires_exact_name() {
        let mut c = class();
        assert!(c.method_by_name("net.li").is_none());
        assert!(matches!(
            c.update(&[ResultRecord::outcome("net.li", TestResult::Pass)]),
            Err(ModelError::UnknownMethod { .. })
        ));
        assert!(c.method_by_name("net.link").unwrap().is_waiting());
    }

    #[test]
    fn test_result_record_from_json() {
        let record: ResultRecord = serde_json::from_str(
            r#"{"test_name": "net.link", "fields": [["status", "done"], ["result", "pass"], ["info", [["speed", "10"]]]]}"#,
        )
        .unwrap();
        assert_eq!(
            record.fields[2].1,
            AnnotationValue::Attributes(vec![("speed".to_string(), "10".to_string())])
        );

        let mut c = class();
        c.update(&[record]).unwrap();
        let link = c.method_by_name("net.link").unwrap();
        assert!(link.has_passed());
        assert_eq!(link.annotation("info").unwrap().attributes().len(), 1);
    }

    #[test]
    fn test_duplicate_method_rejected() {
        let xml = r#"<test_class name="x" caps="[]"><test_method name="a"/><test_method name="a"/></test_class>"#;
        let doc = Document::parse(xml).unwrap();
        assert!(matches!(
            TestClass::from_element("1", doc.root()),
            Err(ModelError::MalformedDocument(_))
        ));
    }
}
