//! 文档节点模型
//!
//! 元素保留原始转义形式的属性值和文本，未修改的子树写回时与读入时逐字节一致。
//! 开始标签中的属性区 (含换行、引号风格) 在属性被修改前原样保留。

use quick_xml::escape::{escape, partial_escape};

/// 子节点在父元素 `children` 中的下标序列
pub type NodePath = Vec<usize>;

/// 元素属性
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: String,
    value: String,
    raw: String,
}

impl Attribute {
    /// 由未转义的值创建属性
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        let raw = escape(value.as_str()).into_owned();
        Self {
            name: name.into(),
            value,
            raw,
        }
    }

    /// 由读入的原始文本创建属性（`raw` 必须可直接放入双引号内）
    pub(crate) fn from_raw(name: String, value: String, raw: String) -> Self {
        if raw.contains('"') {
            return Self::new(name, value);
        }
        Self { name, value, raw }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub(crate) fn raw(&self) -> &str {
        &self.raw
    }
}

/// 文本内容 (原始转义形式 + 解码后的值)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    pub(crate) raw: String,
    pub(crate) value: String,
}

impl Text {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let raw = partial_escape(value.as_str()).into_owned();
        Self { raw, value }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// 是否只包含空白
    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }
}

/// 文档节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(Text),
    CData(String),
    Comment(String),
    Decl(String),
    PI(String),
    DocType(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }
}

/// XML 元素
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<Attribute>,
    pub(crate) children: Vec<Node>,
    pub(crate) self_closing: bool,
    /// 读入时标签名之后的原始属性区，修改属性后失效
    pub(crate) raw_attributes: Option<String>,
}

impl Element {
    /// 创建空元素
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            self_closing: true,
            raw_attributes: None,
        }
    }

    pub(crate) fn with_parsed(
        name: String,
        attributes: Vec<Attribute>,
        raw_attributes: String,
        self_closing: bool,
    ) -> Self {
        Self {
            name,
            attributes,
            children: Vec::new(),
            self_closing,
            raw_attributes: Some(raw_attributes),
        }
    }

    /// 构建器风格地追加属性
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 全部属性 (文档顺序)
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// 属性的 (名称, 值) 列表
    pub fn attribute_pairs(&self) -> Vec<(String, String)> {
        self.attributes
            .iter()
            .map(|a| (a.name.clone(), a.value.clone()))
            .collect()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// 设置属性：已存在时原位覆盖，否则追加到末尾
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let attribute = Attribute::new(name, value);
        self.raw_attributes = None;
        match self.attributes.iter_mut().find(|a| a.name == attribute.name) {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
    }

    /// 直接子节点 (含文本、注释)
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// 直接子元素
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// 直接文本内容，没有文本节点时返回 `None`
    pub fn text(&self) -> Option<String> {
        let mut found = false;
        let mut text = String::new();
        for child in &self.children {
            match child {
                Node::Text(t) => {
                    found = true;
                    text.push_str(&t.value);
                }
                Node::CData(data) => {
                    found = true;
                    text.push_str(data);
                }
                _ => {}
            }
        }
        found.then_some(text)
    }

    /// 用单个文本节点替换全部文本内容，子元素保持不变
    pub fn set_text(&mut self, value: impl Into<String>) {
        self.children
            .retain(|c| !matches!(c, Node::Text(_) | Node::CData(_)));
        self.children.insert(0, Node::Text(Text::new(value)));
        self.self_closing = false;
    }

    /// 丢弃全部子节点
    pub fn clear_children(&mut self) {
        self.children.clear();
    }

    pub fn push_child(&mut self, element: Element) {
        self.children.push(Node::Element(element));
        self.self_closing = false;
    }

    pub(crate) fn push_node(&mut self, node: Node) {
        self.children.push(node);
    }

    /// 按标签名查找全部后代元素 (文档顺序，不含自身)
    pub fn descendants_by_tag(&self, tag: &str) -> Vec<&Element> {
        self.descendant_paths(tag)
            .iter()
            .filter_map(|path| self.at_path(path))
            .collect()
    }

    /// 按标签名查找全部后代元素的路径 (文档顺序，不含自身)
    pub fn descendant_paths(&self, tag: &str) -> Vec<NodePath> {
        let mut paths = Vec::new();
        let mut prefix = Vec::new();
        self.collect_paths(tag, &mut prefix, &mut paths);
        paths
    }

    fn collect_paths(&self, tag: &str, prefix: &mut NodePath, out: &mut Vec<NodePath>) {
        for (index, child) in self.children.iter().enumerate() {
            if let Node::Element(element) = child {
                prefix.push(index);
                if element.name == tag {
                    out.push(prefix.clone());
                }
                element.collect_paths(tag, prefix, out);
                prefix.pop();
            }
        }
    }

    pub fn at_path(&self, path: &[usize]) -> Option<&Element> {
        let mut current = self;
        for &index in path {
            current = current.children.get(index)?.as_element()?;
        }
        Some(current)
    }

    pub fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut current = self;
        for &index in path {
            current = current.children.get_mut(index)?.as_element_mut()?;
        }
        Some(current)
    }
}
