use std::fmt;

use quick_xml::{
    Reader,
    escape::{escape, unescape},
    events::Event,
};

use crate::errors::{ConvertError, ConvertResult};

pub(crate) const BOM: char = '\u{feff}';

/// A node in the document tree.
///
/// Text and markup keep their source text, so nodes the converter never touches
/// are written back exactly as they were read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Character data, still escaped
    Text(String),
    /// Declaration, comment, processing instruction, doctype or CDATA section
    Markup(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    open: String,
    close: Option<String>,
    children: Vec<Node>,
}

impl Element {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            open: format!("<{name}>"),
            close: Some(format!("</{name}>")),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// First child element with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|node| match node {
            Node::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter_map(move |node| match node {
            Node::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    /// Unescaped value of the first child when it is a text node.
    pub fn text(&self) -> Option<String> {
        match self.children.first() {
            Some(Node::Text(raw)) => Some(
                unescape(raw)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| raw.clone()),
            ),
            _ => None,
        }
    }

    /// Overwrites the first child's text when it has any, otherwise appends a
    /// new text child.
    pub fn set_text(&mut self, value: &str) {
        let escaped = escape(value).into_owned();
        match self.children.first_mut() {
            Some(Node::Text(raw)) if !raw.is_empty() => *raw = escaped,
            _ => self.children.push(Node::Text(escaped)),
        }
    }

    /// Appends `<name>value</name>` as the last child.
    pub fn append_text_element(&mut self, name: &str, value: &str) {
        let mut el = Element::new(name);
        el.set_text(value);
        self.children.push(Node::Element(el));
    }

    fn push(&mut self, node: Node) {
        push_node(&mut self.children, node);
    }

    fn write_to(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.close, self.children.is_empty()) {
            (None, true) => f.write_str(&self.open),
            (None, false) => {
                let head = self.open.trim_end_matches('>').trim_end_matches('/').trim_end();
                write!(f, "{head}>")?;
                write_nodes(&self.children, f)?;
                write!(f, "</{}>", self.name)
            }
            (Some(close), _) => {
                f.write_str(&self.open)?;
                write_nodes(&self.children, f)?;
                f.write_str(close)
            }
        }
    }
}

fn push_node(nodes: &mut Vec<Node>, node: Node) {
    if let (Some(Node::Text(prev)), Node::Text(next)) = (nodes.last_mut(), &node) {
        prev.push_str(next);
        return;
    }
    nodes.push(node);
}

fn write_nodes(nodes: &[Node], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for node in nodes {
        match node {
            Node::Element(el) => el.write_to(f)?,
            Node::Text(raw) | Node::Markup(raw) => f.write_str(raw)?,
        }
    }
    Ok(())
}

/// An XML document held as a tree of [`Node`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Node>,
    root: usize,
    encoding: Option<String>,
}

impl Document {
    /// Parses `xml` into a tree.
    ///
    /// Failures carry the parser's message and the 1-based line and column
    /// where parsing stopped.
    pub fn parse(xml: &str) -> ConvertResult<Self> {
        let mut nodes: Vec<Node> = Vec::new();
        // the reader's offsets must line up with `xml`, so it never sees the BOM
        let xml = match xml.strip_prefix(BOM) {
            Some(rest) => {
                nodes.push(Node::Markup(BOM.to_string()));
                rest
            }
            None => xml,
        };

        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut root = None;
        let mut encoding = None;

        loop {
            let start = reader.buffer_position() as usize;
            let event = reader
                .read_event()
                .map_err(|e| parse_error(xml, reader.error_position() as usize, e.to_string()))?;
            let end = reader.buffer_position() as usize;
            let raw = &xml[start..end];

            let node = match event {
                Event::Eof => break,
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    stack.push(Element {
                        name,
                        open: raw.to_string(),
                        close: None,
                        children: Vec::new(),
                    });
                    continue;
                }
                Event::End(_) => {
                    let mut el = stack
                        .pop()
                        .ok_or_else(|| parse_error(xml, start, "unexpected end tag"))?;
                    el.close = Some(raw.to_string());
                    Node::Element(el)
                }
                Event::Empty(e) => Node::Element(Element {
                    name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    open: raw.to_string(),
                    close: None,
                    children: Vec::new(),
                }),
                Event::Decl(decl) => {
                    if let Some(Ok(value)) = decl.encoding() {
                        encoding = Some(String::from_utf8_lossy(&value).into_owned());
                    }
                    Node::Markup(raw.to_string())
                }
                _ if raw.starts_with('<') => Node::Markup(raw.to_string()),
                _ => Node::Text(raw.to_string()),
            };

            if let Some(parent) = stack.last_mut() {
                parent.push(node);
                continue;
            }

            match &node {
                Node::Element(_) if root.is_some() => {
                    return Err(parse_error(xml, start, "extra content at end of document"));
                }
                Node::Element(_) => root = Some(nodes.len()),
                Node::Text(text) if !text.trim().is_empty() => {
                    return Err(parse_error(xml, start, "text outside of the root element"));
                }
                _ => {}
            }
            push_node(&mut nodes, node);
        }

        if let Some(open) = stack.last() {
            let message = format!("unexpected end of file, <{}> is not closed", open.name);
            return Err(parse_error(xml, xml.len(), message));
        }
        let root = root.ok_or_else(|| parse_error(xml, xml.len(), "no root element"))?;

        Ok(Self {
            nodes,
            root,
            encoding,
        })
    }

    pub fn root(&self) -> &Element {
        match &self.nodes[self.root] {
            Node::Element(el) => el,
            _ => unreachable!("root index always points at an element"),
        }
    }

    pub fn root_mut(&mut self) -> &mut Element {
        match &mut self.nodes[self.root] {
            Node::Element(el) => el,
            _ => unreachable!("root index always points at an element"),
        }
    }

    /// Encoding named by the `<?xml ...?>` declaration, if any.
    pub fn declared_encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_nodes(&self.nodes, f)
    }
}

fn parse_error(src: &str, offset: usize, message: impl Into<String>) -> ConvertError {
    let before = &src.as_bytes()[..offset.min(src.len())];
    let line_start = before.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);

    ConvertError::Parse {
        message: message.into(),
        line: before.iter().filter(|&&b| b == b'\n').count() + 1,
        column: String::from_utf8_lossy(&before[line_start..]).chars().count() + 1,
    }
}
