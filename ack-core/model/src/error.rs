use ack_document::DocumentError;
use thiserror::Error;

/// 模型层错误类型
///
/// 除文档 IO 外均视为不可恢复的数据/调用错误，内部不做重试。
#[derive(Error, Debug)]
pub enum ModelError {
    /// 运行文件结构不符合预期
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// 按名称挑选的待运行方法不存在
    #[error("Test '{test_name}' is not in the waiting methods of test class '{class_name}'")]
    MethodNotFound {
        test_name: String,
        class_name: String,
    },

    /// 结果记录引用了不属于该测试类的方法
    #[error("Method '{test_name}' doesn't belong to test class '{class_name}'")]
    UnknownMethod {
        test_name: String,
        class_name: String,
    },

    /// 写回时找不到设备或测试类节点
    #[error("Could not find test class '{class_name}' for device '{udid}' in '{resource}'")]
    DeviceOrClassNotFound {
        udid: String,
        class_name: String,
        resource: String,
    },

    /// 同一设备下存在多个同名测试类节点
    #[error("Expected a single test class node '{class_name}' for device '{udid}', found {count}")]
    AmbiguousClass {
        udid: String,
        class_name: String,
        count: usize,
    },

    /// status/result 字段取值不在允许范围内
    #[error("Invalid value '{value}' for field '{field}'")]
    InvalidStatusValue { field: String, value: String },

    /// 已有其它方法处于 running 状态
    #[error("Method '{running}' is already running, cannot start '{requested}'")]
    AlreadyRunning { running: String, requested: String },

    /// 文档读写错误
    #[error(transparent)]
    Document(#[from] DocumentError),
}

pub type Result<T> = std::result::Result<T, ModelError>;
