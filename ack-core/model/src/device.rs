//! 被认证设备

use ack_document::Element;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{error, warn};

use crate::{ModelError, Result, StatusCounts, TestClass, TestMethod};

const UNKNOWN_ID: &str = "Unknown ID";
const UNKNOWN_DEVICE: &str = "Unknown Device";

/// 设备类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceTag {
    /// 网络适配器
    #[serde(rename = "NA")]
    NetworkAdapter,

    /// CPU
    #[serde(rename = "CPU")]
    Cpu,

    /// 本地存储
    #[serde(rename = "LS")]
    LocalStorage,

    /// 平台/编排层
    #[serde(rename = "OP")]
    Platform,
}

impl DeviceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceTag::NetworkAdapter => "NA",
            DeviceTag::Cpu => "CPU",
            DeviceTag::LocalStorage => "LS",
            DeviceTag::Platform => "OP",
        }
    }
}

impl fmt::Display for DeviceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceTag {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NA" => Ok(DeviceTag::NetworkAdapter),
            "CPU" => Ok(DeviceTag::Cpu),
            "LS" => Ok(DeviceTag::LocalStorage),
            "OP" => Ok(DeviceTag::Platform),
            other => Err(ModelError::MalformedDocument(format!(
                "unknown device tag '{}'",
                other
            ))),
        }
    }
}

/// 能力 → 是否支持
pub type CapabilityMap = BTreeMap<String, bool>;

/// 设备
#[derive(Debug, Clone)]
pub struct Device {
    udid: String,
    tag: DeviceTag,
    config: Vec<(String, String)>,
    classes: Vec<TestClass>,
}

impl Device {
    /// 从设备节点构建，设备节点下必须恰好有一个测试容器子节点
    pub fn from_element(node: &Element) -> Result<Self> {
        let udid = node
            .attribute("udid")
            .ok_or_else(|| ModelError::MalformedDocument("device has no udid attribute".into()))?
            .to_string();
        let tag = node
            .attribute("tag")
            .ok_or_else(|| {
                ModelError::MalformedDocument(format!("device '{}' has no tag attribute", udid))
            })?
            .parse::<DeviceTag>()?;

        let children: Vec<_> = node.child_elements().collect();
        if children.len() != 1 {
            return Err(ModelError::MalformedDocument(format!(
                "device '{}' should have exactly one child node, found {}",
                udid,
                children.len()
            )));
        }

        let classes = children[0]
            .child_elements()
            .map(|c| TestClass::from_element(&udid, c))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            config: node.attribute_pairs(),
            udid,
            tag,
            classes,
        })
    }

    pub fn udid(&self) -> &str {
        &self.udid
    }

    pub fn tag(&self) -> DeviceTag {
        self.tag
    }

    /// 设备节点上的原始属性
    pub fn config(&self) -> &[(String, String)] {
        &self.config
    }

    fn config_value(&self, key: &str) -> Option<&str> {
        self.config
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn require(&self, key: &str) -> std::result::Result<&str, String> {
        self.config_value(key)
            .ok_or_else(|| format!("missing attribute '{}'", key))
    }

    pub fn test_classes(&self) -> &[TestClass] {
        &self.classes
    }

    pub(crate) fn test_classes_mut(&mut self) -> &mut [TestClass] {
        &mut self.classes
    }

    pub fn class(&self, name: &str) -> Option<&TestClass> {
        self.classes.iter().find(|c| c.name() == name)
    }

    pub fn class_mut(&mut self, name: &str) -> Option<&mut TestClass> {
        self.classes.iter_mut().find(|c| c.name() == name)
    }

    /// 按设备类别推导的标识，取值失败时返回 "Unknown ID"
    pub fn id(&self) -> String {
        let derived = match self.tag {
            DeviceTag::NetworkAdapter => self.require("PCI_id").map(str::to_string),
            DeviceTag::Cpu => self.require("modelname").map(cpu_id),
            DeviceTag::LocalStorage => self
                .require("vendor")
                .and_then(|vendor| Ok(format!("{}:{}", vendor, self.require("device")?))),
            DeviceTag::Platform => self
                .require("product_version")
                .map(|version| format!("XenServer {}", version)),
        };
        derived.unwrap_or_else(|e| {
            error!("获取设备 {} 的 ID 失败: {}", self.udid, e);
            UNKNOWN_ID.to_string()
        })
    }

    /// 按设备类别推导的描述，取值失败时返回 "Unknown Device"
    pub fn description(&self) -> String {
        let derived = match self.tag {
            DeviceTag::NetworkAdapter => self.require("PCI_description").map(str::to_string),
            DeviceTag::Cpu => self.require("modelname").map(str::to_string),
            DeviceTag::LocalStorage => self.require("driver").map(|driver| {
                let mut info = format!("Storage device using the {} driver", driver);
                if let Some(pci) = self.config_value("PCI_description") {
                    info.push_str("\n\t");
                    info.push_str(pci);
                }
                info
            }),
            DeviceTag::Platform => self
                .require("build_number")
                .map(|build| format!("build {}", build)),
        };
        derived.unwrap_or_else(|e| {
            error!("获取设备 {} 的描述失败: {}", self.udid, e);
            UNKNOWN_DEVICE.to_string()
        })
    }

    /// PCI 子系统信息，仅网卡与本地存储设备可能提供
    pub fn subsystem(&self) -> &str {
        match self.tag {
            DeviceTag::NetworkAdapter | DeviceTag::LocalStorage => {
                self.config_value("PCI_subsystem").unwrap_or_default()
            }
            _ => "",
        }
    }

    /// 按测试类存储顺序折叠出能力支持情况
    ///
    /// 通过的测试类只在能力尚未记录时记为支持；未通过的测试类无条件记为不支持，
    /// 会覆盖之前其它测试类记下的支持。
    pub fn capabilities(&self) -> CapabilityMap {
        let mut caps = CapabilityMap::new();
        for class in &self.classes {
            if class.has_passed() {
                for cap in class.capabilities() {
                    caps.entry(cap.clone()).or_insert(true);
                }
            } else {
                for cap in class.capabilities() {
                    caps.insert(cap.clone(), false);
                }
            }
        }
        caps
    }

    /// 展开全部方法；`Some(required)` 只保留 `is_required()` 与之相同的测试类
    pub fn test_methods(&self, filter_required: Option<bool>) -> Vec<&TestMethod> {
        self.classes
            .iter()
            .filter(|c| filter_required.map_or(true, |r| c.is_required() == r))
            .flat_map(|c| c.methods())
            .collect()
    }

    /// 尚未执行完的测试类
    pub fn test_classes_to_run(&self) -> Vec<&TestClass> {
        self.classes.iter().filter(|c| !c.is_finished()).collect()
    }

    /// 按方法状态分组测试类：(running, waiting, failed)
    ///
    /// 同一个测试类可能同时出现在多个分组中。
    pub fn group_by_status(&self) -> (Vec<&TestClass>, Vec<&TestClass>, Vec<&TestClass>) {
        let (running, waiting, failed) = self.status_buckets();
        (
            self.classes_at(&running),
            self.classes_at(&waiting),
            self.classes_at(&failed),
        )
    }

    fn classes_at(&self, indices: &[usize]) -> Vec<&TestClass> {
        indices.iter().map(|&i| &self.classes[i]).collect()
    }

    /// `group_by_status` 的下标形式，供调度器定位测试类
    pub(crate) fn status_buckets(&self) -> (Vec<usize>, Vec<usize>, Vec<usize>) {
        let mut running = Vec::new();
        let mut waiting = Vec::new();
        let mut failed = Vec::new();
        for (i, class) in self.classes.iter().enumerate() {
            let (r, w, f) = class.group_by_status();
            if !r.is_empty() {
                running.push(i);
            }
            if !w.is_empty() {
                waiting.push(i);
            }
            if !f.is_empty() {
                failed.push(i);
            }
        }
        if running.len() > 1 {
            warn!("设备 {} 有 {} 个测试类处于运行中", self.udid, running.len());
        }
        (running, waiting, failed)
    }

    /// 认证结论：全部必需测试类都通过
    pub fn has_passed(&self) -> bool {
        self.classes
            .iter()
            .filter(|c| c.is_required())
            .all(TestClass::has_passed)
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for method in self.test_methods(None) {
            counts.passed += usize::from(method.has_passed());
            counts.failed += usize::from(method.has_failed());
            counts.skipped += usize::from(method.has_skipped());
            counts.waiting += usize::from(method.is_waiting());
            counts.running += usize::from(method.is_running());
        }
        counts
    }
}

/// 由 CPU 型号名得到规范化标识
///
/// 去掉商标标记、"CPU" 字样与主频部分，并压缩空白。
/// 例如 `Intel(R) Xeon(R) CPU E5-2680 v4 @ 2.40GHz` → `Intel Xeon E5-2680 v4`。
pub fn cpu_id(model_name: &str) -> String {
    let without_freq = model_name.split('@').next().unwrap_or_default();
    let cleaned = ["(R)", "(r)", "(TM)", "(tm)"]
        .iter()
        .fold(without_freq.to_string(), |acc, mark| acc.replace(mark, " "));
    cleaned
        .split_whitespace()
        .filter(|word| *word != "CPU")
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ack_document::Document;

    fn device(xml: &str) -> Device {
        let doc = Document::parse(xml).unwrap();
        Device::from_element(doc.root()).unwrap()
    }

    #[test]
    fn test_cpu_id() {
        assert_eq!(
            cpu_id("Intel(R) Xeon(R) CPU E5-2680 v4 @ 2.40GHz"),
            "Intel Xeon E5-2680 v4"
        );
        assert_eq!(cpu_id("AMD EPYC 7763 64-Core Processor"), "AMD EPYC 7763 64-Core Processor");
    }

    #[test]
    fn test_id_and_description_per_tag() {
        let na = device(
            r#"<device tag="NA" udid="1" PCI_id="8086:10fb" PCI_description="82599ES" PCI_subsystem="X520"><tests/></device>"#,
        );
        assert_eq!(na.id(), "8086:10fb");
        assert_eq!(na.description(), "82599ES");
        assert_eq!(na.subsystem(), "X520");

        let ls = device(
            r#"<device tag="LS" udid="2" vendor="1000" device="0097" driver="mpt3sas" PCI_description="SAS3008"><tests/></device>"#,
        );
        assert_eq!(ls.id(), "1000:0097");
        assert_eq!(
            ls.description(),
            "Storage device using the mpt3sas driver\n\tSAS3008"
        );

        let op = device(
            r#"<device tag="OP" udid="3" product_version="8.2.0" build_number="b42"><tests/></device>"#,
        );
        assert_eq!(op.id(), "XenServer 8.2.0");
        assert_eq!(op.description(), "build b42");
        assert_eq!(op.subsystem(), "");
    }

    #[test]
    fn test_missing_attributes_fall_back() {
        let ls = device(r#"<device tag="LS" udid="2" vendor="1000"><tests/></device>"#);
        assert_eq!(ls.id(), "Unknown ID");
        assert_eq!(ls.description(), "Unknown Device");
    }

    #[test]
    fn test_device_structure_errors() {
        let doc = Document::parse(r#"<device tag="NA" udid="1"><a/><b/></device>"#).unwrap();
        assert!(matches!(
            Device::from_element(doc.root()),
            Err(ModelError::MalformedDocument(_))
        ));

        let doc = Document::parse(r#"<device tag="GPU" udid="1"><a/></device>"#).unwrap();
        assert!(Device::from_element(doc.root()).is_err());
    }

    #[test]
    fn test_test_methods_filter() {
        let d = device(
            r#"<device tag="NA" udid="1"><tests>
<test_class name="req" caps="['REQ']"><test_method name="a"/></test_class>
<test_class name="opt" caps="['GRO']"><test_method name="b"/><test_method name="c"/></test_class>
</tests></device>"#,
        );
        assert_eq!(d.test_methods(None).len(), 3);
        assert_eq!(d.test_methods(Some(true))[0].name(), "req.a");
        assert_eq!(d.test_methods(Some(false)).len(), 2);
    }

    #[test]
    fn test_group_by_status_and_classes_to_run() {
        let d = device(
            r#"<device tag="NA" udid="1"><tests>
<test_class name="mixed" caps="[]"><test_method name="a"><status>init</status><result>NULL</result></test_method><test_method name="b"><status>done</status><result>fail</result></test_method></test_class>
<test_class name="busy" caps="[]"><test_method name="c"><status>running</status><result>NULL</result></test_method></test_class>
<test_class name="done" caps="[]"><test_method name="d"><status>done</status><result>pass</result></test_method></test_class>
</tests></device>"#,
        );

        let names = |classes: Vec<&TestClass>| -> Vec<String> {
            classes.iter().map(|c| c.name().to_string()).collect()
        };
        let (running, waiting, failed) = d.group_by_status();
        assert_eq!(names(running), vec!["busy"]);
        // mixed 同时属于 waiting 与 failed
        assert_eq!(names(waiting), vec!["mixed"]);
        assert_eq!(names(failed), vec!["mixed"]);
        assert_eq!(d.status_buckets(), (vec![1], vec![0], vec![0]));

        assert_eq!(names(d.test_classes_to_run()), vec!["mixed"]);
    }
}
