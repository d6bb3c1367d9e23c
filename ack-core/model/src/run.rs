//! 测试运行：整棵设备树的根

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use ack_document::{modify, DocumentStore, FileStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::class::DEVICE_TAG;
use crate::{
    AnnotationValue, Device, Fields, MethodStatus, ModelError, Result, ResultRecord,
    StatusCounts, TestClass, TestMethod, TestResult,
};

/// 全局配置节点的标签名
pub const GLOBAL_CONFIG_TAG: &str = "global_config";

/// 全局配置中重跑预算的键
pub const RERUN_KEY: &str = "rerun";

/// 自动重跑失败用例的剩余轮数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerunBudget {
    /// 剩余有限轮数
    Limited(u32),

    /// 不限轮数，从不递减
    Unbounded,
}

impl RerunBudget {
    /// 解析 `rerun` 属性：缺失或负数为不限，非负整数为有限
    pub fn parse(value: Option<&str>) -> Result<Self> {
        let Some(raw) = value else {
            return Ok(RerunBudget::Unbounded);
        };
        let n: i64 = raw.trim().parse().map_err(|_| {
            ModelError::MalformedDocument(format!("invalid rerun budget '{}'", raw))
        })?;
        if n < 0 {
            return Ok(RerunBudget::Unbounded);
        }
        u32::try_from(n)
            .map(RerunBudget::Limited)
            .map_err(|_| ModelError::MalformedDocument(format!("rerun budget too large: {}", n)))
    }

    /// 是否还允许再触发一轮重跑
    pub fn permits_rerun(&self) -> bool {
        match self {
            RerunBudget::Limited(n) => *n > 0,
            RerunBudget::Unbounded => true,
        }
    }
}

impl fmt::Display for RerunBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RerunBudget::Limited(n) => write!(f, "{}", n),
            RerunBudget::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// 选中该方法的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    /// 上次中断时仍处于 running 的方法
    Resume,

    /// 待运行队列中的方法
    Ready,

    /// 重跑后重新进入待运行状态的方法
    Rerun,

    /// 调用方按名称查找
    Lookup,
}

/// 指向运行树中某个方法的句柄
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSelection {
    pub(crate) device: usize,
    pub(crate) class: usize,
    pub(crate) method: usize,
    udid: String,
    class_name: String,
    method_name: String,
    reason: SelectionReason,
}

impl TestSelection {
    pub fn udid(&self) -> &str {
        &self.udid
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn reason(&self) -> SelectionReason {
        self.reason
    }
}

impl fmt::Display for TestSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (device {})", self.method_name, self.udid)
    }
}

/// 一次认证测试运行
pub struct TestRun {
    resource: String,
    store: Arc<dyn DocumentStore>,
    config: Vec<(String, String)>,
    pub(crate) rerun: RerunBudget,
    pub(crate) devices: Vec<Device>,
}

impl fmt::Debug for TestRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestRun")
            .field("resource", &self.resource)
            .field("config", &self.config)
            .field("rerun", &self.rerun)
            .field("devices", &self.devices)
            .finish_non_exhaustive()
    }
}

impl TestRun {
    /// 从存储中加载运行文件
    pub fn load(store: Arc<dyn DocumentStore>, resource: impl Into<String>) -> Result<Self> {
        let resource = resource.into();
        let doc = store.load(&resource)?;
        let root = doc.root();

        let configs = root.descendants_by_tag(GLOBAL_CONFIG_TAG);
        if configs.len() != 1 {
            return Err(ModelError::MalformedDocument(format!(
                "expected exactly one {} node, found {}",
                GLOBAL_CONFIG_TAG,
                configs.len()
            )));
        }
        let config = configs[0].attribute_pairs();
        let rerun = RerunBudget::parse(configs[0].attribute(RERUN_KEY))?;

        let devices = root
            .descendants_by_tag(DEVICE_TAG)
            .into_iter()
            .map(Device::from_element)
            .collect::<Result<Vec<_>>>()?;

        for (i, device) in devices.iter().enumerate() {
            if devices[..i].iter().any(|d| d.udid() == device.udid()) {
                return Err(ModelError::MalformedDocument(format!(
                    "duplicate device udid '{}'",
                    device.udid()
                )));
            }
        }

        info!(
            "已加载测试运行 {}: {} 个设备, 重跑预算 {}",
            resource,
            devices.len(),
            rerun
        );

        Ok(Self {
            resource,
            store,
            config,
            rerun,
            devices,
        })
    }

    /// 从文件加载
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let resource = path.as_ref().to_string_lossy().into_owned();
        Self::load(Arc::new(FileStore::new()), resource)
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn global_config(&self) -> &[(String, String)] {
        &self.config
    }

    pub fn config_value(&self, key: &str) -> Option<&str> {
        self.config
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn rerun_budget(&self) -> RerunBudget {
        self.rerun
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device(&self, udid: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.udid() == udid)
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for device in &self.devices {
            counts += device.status_counts();
        }
        counts
    }

    /// 运行是否结束
    ///
    /// 重跑预算未耗尽 (正数或无限) 时始终未结束，否则仅当没有待运行和
    /// 运行中的方法时结束。
    pub fn is_finished(&self) -> bool {
        if self.rerun.permits_rerun() {
            return false;
        }
        let counts = self.status_counts();
        counts.waiting + counts.running == 0
    }

    pub(crate) fn selection(
        &self,
        device: usize,
        class: usize,
        method: usize,
        reason: SelectionReason,
    ) -> TestSelection {
        let d = &self.devices[device];
        let c = &d.test_classes()[class];
        TestSelection {
            device,
            class,
            method,
            udid: d.udid().to_string(),
            class_name: c.name().to_string(),
            method_name: c.methods()[method].name().to_string(),
            reason,
        }
    }

    /// 按完整方法名在全部设备中查找
    pub fn find_method(&self, name: &str) -> Option<TestSelection> {
        self.find_method_on(None, name)
    }

    /// 按完整方法名查找，可限定设备
    pub fn find_method_on(&self, udid: Option<&str>, name: &str) -> Option<TestSelection> {
        for (d, device) in self.devices.iter().enumerate() {
            if udid.is_some_and(|u| u != device.udid()) {
                continue;
            }
            for (c, class) in device.test_classes().iter().enumerate() {
                if let Some(m) = class.methods().iter().position(|m| m.name() == name) {
                    return Some(self.selection(d, c, m, SelectionReason::Lookup));
                }
            }
        }
        None
    }

    pub fn selected_class(&self, selection: &TestSelection) -> Option<&TestClass> {
        self.devices
            .get(selection.device)?
            .test_classes()
            .get(selection.class)
    }

    pub fn selected_method(&self, selection: &TestSelection) -> Option<&TestMethod> {
        self.selected_class(selection)?.methods().get(selection.method)
    }

    fn class_mut_at(&mut self, device: usize, class: usize) -> Option<&mut TestClass> {
        self.devices
            .get_mut(device)?
            .test_classes_mut()
            .get_mut(class)
    }

    /// 选中方法所属测试类的可变引用，修改后需调用 [`TestRun::persist_class`]
    pub fn class_mut(&mut self, selection: &TestSelection) -> Option<&mut TestClass> {
        self.class_mut_at(selection.device, selection.class)
    }

    fn stale(&self, selection: &TestSelection) -> ModelError {
        ModelError::UnknownMethod {
            test_name: selection.method_name.clone(),
            class_name: selection.class_name.clone(),
        }
    }

    /// 把选中方法所属测试类写回文档
    pub fn persist_class(&self, selection: &TestSelection) -> Result<()> {
        let class = self
            .selected_class(selection)
            .ok_or_else(|| self.stale(selection))?;
        class.persist(self.store.as_ref(), &self.resource)
    }

    pub(crate) fn persist_class_at(&self, device: usize, class: usize) -> Result<()> {
        self.devices[device].test_classes()[class].persist(self.store.as_ref(), &self.resource)
    }

    fn apply(&mut self, selection: &TestSelection, fields: Fields) -> Result<()> {
        let record = ResultRecord {
            test_name: selection.method_name.clone(),
            fields,
        };
        let stale = self.stale(selection);
        self.class_mut(selection)
            .ok_or(stale)?
            .update(std::slice::from_ref(&record))?;
        self.persist_class(selection)
    }

    /// 标记方法为 running 并写回
    ///
    /// 已有其它方法处于 running 时拒绝，保证全局至多一个运行中的方法。
    pub fn start(&mut self, selection: &TestSelection) -> Result<()> {
        for (d, device) in self.devices.iter().enumerate() {
            for (c, class) in device.test_classes().iter().enumerate() {
                for (m, method) in class.methods().iter().enumerate() {
                    let same = (d, c, m) == (selection.device, selection.class, selection.method);
                    if method.is_running() && !same {
                        return Err(ModelError::AlreadyRunning {
                            running: method.name().to_string(),
                            requested: selection.method_name.clone(),
                        });
                    }
                }
            }
        }

        debug!("开始执行方法 {}", selection);
        self.apply(
            selection,
            vec![("status".to_string(), MethodStatus::Running.into())],
        )
    }

    /// 记录执行结果：result 与 status=done 在同一次更新中写入并写回
    ///
    /// `extra` 只能携带附加注解，不能覆盖 status 或 result。
    pub fn record(
        &mut self,
        selection: &TestSelection,
        result: TestResult,
        extra: Fields,
    ) -> Result<()> {
        if let Some((key, value)) = extra
            .iter()
            .find(|(key, _)| key == "status" || key == "result")
        {
            let value = match value {
                AnnotationValue::Text(text) => text.clone(),
                AnnotationValue::Attributes(_) => "<attributes>".to_string(),
            };
            return Err(ModelError::InvalidStatusValue {
                field: key.clone(),
                value,
            });
        }

        let mut fields = vec![
            ("status".to_string(), MethodStatus::Done.into()),
            ("result".to_string(), result.into()),
        ];
        fields.extend(extra);
        self.apply(selection, fields)?;
        info!("方法 {} 结果: {}", selection, result);
        Ok(())
    }

    /// 把单个方法重置为待运行并写回
    pub fn reset_method(&mut self, selection: &TestSelection) -> Result<()> {
        self.apply(selection, crate::method::reset_fields())?;
        info!("方法 {} 已重置为待运行", selection);
        Ok(())
    }

    /// 把当前重跑预算写入全局配置与文档
    pub(crate) fn write_rerun_budget(&mut self) -> Result<()> {
        let value = self.rerun.to_string();
        if let Some(entry) = self.config.iter_mut().find(|(k, _)| k == RERUN_KEY) {
            entry.1 = value.clone();
        }

        modify(self.store.as_ref(), &self.resource, |doc| -> Result<()> {
            let root = doc.root_mut();
            let Some(path) = root.descendant_paths(GLOBAL_CONFIG_TAG).into_iter().next() else {
                debug!("未找到 {} 节点", GLOBAL_CONFIG_TAG);
                return Ok(());
            };
            if let Some(node) = root.at_path_mut(&path) {
                if node.attribute(RERUN_KEY).is_some() {
                    node.set_attribute(RERUN_KEY, value.as_str());
                    debug!("重跑预算已设置为 {}", value);
                }
            }
            Ok(())
        })
    }
}
