//! 基于 quick-xml 事件流的文档读写

use std::borrow::Cow;
use std::str;

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::node::{Attribute, Element, Node, Text};
use crate::{DocumentError, Result};

/// 结构化文档：根元素及其前后的顶层节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    prolog: Vec<Node>,
    root: Element,
    epilog: Vec<Node>,
}

impl Document {
    /// 以给定根元素创建文档
    pub fn new(root: Element) -> Self {
        Self {
            prolog: Vec::new(),
            root,
            epilog: Vec::new(),
        }
    }

    /// 解析 XML 文本
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(false);

        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root: Option<Element> = None;
        let mut stack: Vec<Element> = Vec::new();

        loop {
            let node = match reader.read_event()? {
                Event::Eof => break,
                Event::Start(start) => {
                    stack.push(parse_start(&start, false)?);
                    continue;
                }
                Event::End(end) => {
                    let name = str::from_utf8(end.name().as_ref())?.to_string();
                    let element = stack
                        .pop()
                        .ok_or_else(|| DocumentError::MismatchedEnd(name.clone()))?;
                    if element.name() != name {
                        return Err(DocumentError::MismatchedEnd(name));
                    }
                    Node::Element(element)
                }
                Event::Empty(start) => Node::Element(parse_start(&start, true)?),
                Event::Text(text) => {
                    let raw = str::from_utf8(&text)?.to_string();
                    let value = text.unescape()?.into_owned();
                    Node::Text(Text { raw, value })
                }
                Event::CData(data) => Node::CData(str::from_utf8(&data)?.to_string()),
                Event::Comment(comment) => Node::Comment(str::from_utf8(&comment)?.to_string()),
                Event::Decl(decl) => Node::Decl(str::from_utf8(&decl)?.to_string()),
                Event::PI(pi) => Node::PI(str::from_utf8(&pi)?.to_string()),
                Event::DocType(doctype) => Node::DocType(str::from_utf8(&doctype)?.to_string()),
            };

            match stack.last_mut() {
                Some(parent) => parent.push_node(node),
                None => match node {
                    Node::Element(element) if root.is_none() => root = Some(element),
                    other if root.is_none() => prolog.push(other),
                    other => epilog.push(other),
                },
            }
        }

        if let Some(open) = stack.pop() {
            return Err(DocumentError::MismatchedEnd(open.name().to_string()));
        }

        let root = root.ok_or(DocumentError::NoRoot)?;
        Ok(Self {
            prolog,
            root,
            epilog,
        })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// 序列化为 XML 文本
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        for node in &self.prolog {
            write_node(&mut writer, node)?;
        }
        write_element(&mut writer, &self.root)?;
        for node in &self.epilog {
            write_node(&mut writer, node)?;
        }
        Ok(str::from_utf8(&writer.into_inner())?.to_string())
    }
}

fn parse_start(start: &BytesStart<'_>, self_closing: bool) -> Result<Element> {
    let name = str::from_utf8(start.name().as_ref())?.to_string();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = str::from_utf8(attr.key.as_ref())?.to_string();
        let raw = str::from_utf8(&attr.value)?.to_string();
        let value = attr.unescape_value()?.into_owned();
        attributes.push(Attribute::from_raw(key, value, raw));
    }
    let raw_attributes = str::from_utf8(start.attributes_raw())?.to_string();
    Ok(Element::with_parsed(name, attributes, raw_attributes, self_closing))
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let mut content = element.name().to_string();
    match &element.raw_attributes {
        Some(raw) => content.push_str(raw),
        None => {
            for attr in element.attributes() {
                content.push(' ');
                content.push_str(attr.name());
                content.push_str("=\"");
                content.push_str(attr.raw());
                content.push('"');
            }
        }
    }
    let start = BytesStart::from_content(content, element.name().len());

    if element.self_closing && element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name())))?;
    Ok(())
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<()> {
    match node {
        Node::Element(element) => return write_element(writer, element),
        Node::Text(text) => {
            writer.write_event(Event::Text(BytesText::from_escaped(text.raw.as_str())))?
        }
        Node::CData(data) => writer.write_event(Event::CData(BytesCData::new(data.as_str())))?,
        Node::Comment(comment) => {
            writer.write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))?
        }
        Node::Decl(decl) => {
            let start = BytesStart::from_content(Cow::Borrowed(decl.as_str()), 3);
            writer.write_event(Event::Decl(BytesDecl::from_start(start)))?
        }
        Node::PI(pi) => writer.write_event(Event::PI(BytesText::from_escaped(pi.as_str())))?,
        Node::DocType(doctype) => {
            writer.write_event(Event::DocType(BytesText::from_escaped(doctype.as_str())))?
        }
    }
    Ok(())
}
