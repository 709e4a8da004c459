//! A small owned element tree for pages and chart graphics.
//!
//! Pages are read as XHTML with a few HTML allowances: void elements such as
//! `<br>` need no closing tag, attributes may be unquoted or valueless, the
//! common named entities resolve, and stray or missing end tags are
//! tolerated. SVG graphics are plain XML and read the same way.

use std::borrow::Cow;

use indexmap::IndexMap;
use quick_xml::escape::{escape, partial_escape, resolve_html5_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};

/// Elements that never have content or an end tag in HTML.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

// ============================================================================
// Nodes
// ============================================================================

/// A node in the element tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Unescaped character data.
    Text(String),
    CData(String),
    Comment(String),
    /// Markup written back verbatim (doctype, declarations, script bodies).
    Raw(String),
}

impl Node {
    /// Returns the element if this node is one.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    fn write_markup(&self, out: &mut String) {
        match self {
            Node::Element(el) => el.write_markup(out),
            Node::Text(text) => out.push_str(&partial_escape(text.as_str())),
            Node::CData(data) => {
                out.push_str("<![CDATA[");
                out.push_str(data);
                out.push_str("]]>");
            }
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            Node::Raw(raw) => out.push_str(raw),
        }
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}

// ============================================================================
// Element
// ============================================================================

/// An element with ordered attributes and child nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attrs: IndexMap<String, String>,
    pub children: Vec<Node>,
    /// Written as `<name/>` when it has no children (set for `<name/>` input).
    self_closing: bool,
}

impl Element {
    /// Creates an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parses markup and returns its first top-level element.
    pub fn parse(markup: &str) -> Result<Self> {
        Document::parse(markup)?
            .nodes
            .into_iter()
            .find_map(|node| match node {
                Node::Element(el) => Some(el),
                _ => None,
            })
            .ok_or_else(|| Error::Markup("no element found".into()))
    }

    /// Builder: sets an attribute.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder: appends a text child.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Builder: appends a child node.
    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Returns true if the tag name matches, ignoring ASCII case.
    pub fn is(&self, tag: &str) -> bool {
        self.name.eq_ignore_ascii_case(tag)
    }

    /// Returns an attribute value. Exact names win over case-insensitive matches.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .get(name)
            .or_else(|| {
                self.attrs
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, value)| value)
            })
            .map(String::as_str)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(name.into(), value.into());
    }

    /// Removes an attribute, keeping the order of the others.
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        self.attrs.shift_remove(name)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let classes = match self.attr("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        self.set_attr("class", classes);
    }

    /// Sets or clears `style="display:none"`.
    pub fn set_hidden(&mut self, hidden: bool) {
        if hidden {
            self.set_attr("style", "display:none");
        } else if self.attr("style") == Some("display:none") {
            self.remove_attr("style");
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.attr("style")
            .is_some_and(|style| style.replace(' ', "").contains("display:none"))
    }

    /// Concatenated text of all descendant text and CDATA nodes, including
    /// the bodies of `script` and `style` elements.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(t) | Node::CData(t) => out.push_str(t),
                Node::Raw(body) if is_raw_text(&self.name) => out.push_str(body),
                Node::Element(el) => el.collect_text(out),
                _ => {}
            }
        }
    }

    /// Replaces all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![Node::Text(text.into())];
    }

    /// Direct child elements.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(Node::as_element_mut)
    }

    /// All descendant elements in document order, excluding `self`.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut found = Vec::new();
        for child in self.child_elements() {
            found.push(child);
            found.extend(child.descendants());
        }
        found
    }

    /// Calls `f` on every descendant element in document order, excluding `self`.
    pub fn visit_descendants_mut(&mut self, f: &mut dyn FnMut(&mut Element)) {
        for child in self.child_elements_mut() {
            f(child);
            child.visit_descendants_mut(f);
        }
    }

    /// Finds this element or a descendant by its `id` attribute.
    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut Element> {
        if self.attr("id") == Some(id) {
            return Some(self);
        }
        self.child_elements_mut()
            .find_map(|child| child.find_by_id_mut(id))
    }

    /// Serializes the element including its own tag.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    /// Serializes only the children.
    pub fn inner_markup(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.write_markup(&mut out);
        }
        out
    }

    fn write_markup(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }

        if self.children.is_empty() && (self.self_closing || is_void(&self.name)) {
            out.push_str("/>");
            return;
        }

        out.push('>');
        for child in &self.children {
            child.write_markup(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| name.eq_ignore_ascii_case(v))
}

// ============================================================================
// Document
// ============================================================================

/// A parsed page or fragment: the top-level nodes in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub nodes: Vec<Node>,
}

impl Document {
    /// Parses a page or fragment.
    pub fn parse(markup: &str) -> Result<Self> {
        let mut reader = lenient_reader(markup);
        // Byte offset of the reader's input within `markup`.
        let mut offset = 0;

        let mut builder = TreeBuilder::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let mut el = element_from_start(&e, false)?;
                    if is_void(&el.name) {
                        builder.push_node(Node::Element(el));
                    } else if is_raw_text(&el.name) {
                        let body_start = offset + reader.buffer_position() as usize;
                        let (body, resume) = raw_text_body(markup, body_start, &el.name);
                        if !body.is_empty() {
                            el.children.push(Node::Raw(body.to_string()));
                        }
                        builder.push_node(Node::Element(el));
                        offset = resume;
                        reader = lenient_reader(&markup[resume..]);
                    } else {
                        builder.open.push(el);
                    }
                }
                Event::Empty(e) => {
                    let el = element_from_start(&e, true)?;
                    builder.push_node(Node::Element(el));
                }
                Event::End(e) => {
                    let qname = e.name();
                    let name = utf8(qname.as_ref())?;
                    builder.close(&name);
                }
                Event::Text(e) => {
                    let raw = utf8(&e)?;
                    builder.push_node(Node::Text(unescape_lenient(&raw).into_owned()));
                }
                Event::CData(e) => builder.push_node(Node::CData(utf8(&e)?.into_owned())),
                Event::Comment(e) => builder.push_node(Node::Comment(utf8(&e)?.into_owned())),
                Event::DocType(e) => {
                    builder.push_node(Node::Raw(format!("<!DOCTYPE {}>", utf8(&e)?.trim())))
                }
                Event::Decl(e) => builder.push_node(Node::Raw(format!("<?{}?>", utf8(&e)?))),
                Event::PI(e) => builder.push_node(Node::Raw(format!("<?{}?>", utf8(&e)?))),
                Event::Eof => break,
            }
        }

        Ok(Self {
            nodes: builder.finish(),
        })
    }

    /// Top-level elements.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.nodes.iter().filter_map(Node::as_element)
    }

    /// All elements of the document in document order.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut found = Vec::new();
        for el in self.elements() {
            found.push(el);
            found.extend(el.descendants());
        }
        found
    }

    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.nodes
            .iter_mut()
            .filter_map(Node::as_element_mut)
            .find_map(|el| el.find_by_id_mut(id))
    }

    /// Calls `f` on every element in document order.
    pub fn visit_mut(&mut self, f: &mut dyn FnMut(&mut Element)) {
        for el in self.nodes.iter_mut().filter_map(Node::as_element_mut) {
            f(el);
            el.visit_descendants_mut(f);
        }
    }

    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            node.write_markup(&mut out);
        }
        out
    }
}

#[derive(Default)]
struct TreeBuilder {
    roots: Vec<Node>,
    open: Vec<Element>,
}

impl TreeBuilder {
    fn push_node(&mut self, node: Node) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }

    /// Closes the innermost open element named `name` and everything opened
    /// inside it. Unmatched end tags are dropped.
    fn close(&mut self, name: &str) {
        let Some(pos) = self.open.iter().rposition(|el| el.is(name)) else {
            tracing::debug!(tag = name, "ignoring unmatched end tag");
            return;
        };
        while self.open.len() > pos {
            if let Some(el) = self.open.pop() {
                self.push_node(Node::Element(el));
            }
        }
    }

    fn finish(mut self) -> Vec<Node> {
        if let Some(first) = self.open.first() {
            tracing::debug!(tag = %first.name, "closing unterminated elements at end of input");
        }
        while let Some(el) = self.open.pop() {
            self.push_node(Node::Element(el));
        }
        self.roots
    }
}

fn element_from_start(start: &BytesStart<'_>, self_closing: bool) -> Result<Element> {
    let mut el = Element::new(utf8(start.name().as_ref())?);
    el.self_closing = self_closing;
    for attr in start.html_attributes() {
        let attr = attr?;
        let key = utf8(attr.key.as_ref())?.into_owned();
        let raw = utf8(&attr.value)?;
        el.attrs.insert(key, unescape_lenient(&raw).into_owned());
    }
    Ok(el)
}

fn lenient_reader(markup: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(markup);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    reader
}

/// Elements whose content is script or style text rather than markup.
fn is_raw_text(name: &str) -> bool {
    name.eq_ignore_ascii_case("script") || name.eq_ignore_ascii_case("style")
}

/// The raw content of a `script`/`style` element starting at `start`, and
/// the offset just past its end tag. An unterminated element runs to the end.
fn raw_text_body<'a>(markup: &'a str, start: usize, name: &str) -> (&'a str, usize) {
    let rest = &markup[start..];
    let end_tag = format!("</{}", name.to_ascii_lowercase());
    let Some(end) = rest.to_ascii_lowercase().find(&end_tag) else {
        return (rest, markup.len());
    };
    let after = &rest[end..];
    let resume = after.find('>').map_or(markup.len(), |gt| start + end + gt + 1);
    (&rest[..end], resume)
}

fn utf8(bytes: &[u8]) -> Result<Cow<'_, str>> {
    std::str::from_utf8(bytes)
        .map(Cow::Borrowed)
        .map_err(|e| Error::Markup(e.to_string()))
}

/// Unescapes XML and HTML5 entities and character references. Text with an
/// unknown entity is kept as written.
fn unescape_lenient(raw: &str) -> Cow<'_, str> {
    unescape_with(raw, resolve_html5_entity).unwrap_or(Cow::Borrowed(raw))
}

// ============================================================================
// Selectors
// ============================================================================

/// A comma-separated list of compound selectors.
///
/// Each compound selector combines an optional tag name with any number of
/// `#id`, `.class`, `[attr]` and `[attr=value]` parts. Descendant and child
/// combinators are not supported.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selector {
    alternatives: Vec<Compound>,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Selector {
    pub fn parse(selector: &str) -> Result<Self> {
        let alternatives = selector
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Compound::parse)
            .collect::<Result<Vec<_>>>()?;
        if alternatives.is_empty() {
            return Err(Error::Markup(format!("empty selector: {selector:?}")));
        }
        Ok(Self { alternatives })
    }

    pub fn matches(&self, el: &Element) -> bool {
        self.alternatives.iter().any(|c| c.matches(el))
    }
}

impl Compound {
    fn parse(input: &str) -> Result<Self> {
        if input.contains(char::is_whitespace) || input.contains('>') {
            return Err(Error::Markup(format!("unsupported selector combinator: {input:?}")));
        }

        let mut compound = Compound::default();
        let mut rest = input;

        let tag_end = rest.find(['#', '.', '[']).unwrap_or(rest.len());
        if tag_end > 0 && &rest[..tag_end] != "*" {
            compound.tag = Some(rest[..tag_end].to_string());
        }
        rest = &rest[tag_end..];

        while let Some(marker) = rest.chars().next() {
            rest = &rest[1..];
            match marker {
                '#' | '.' => {
                    let end = rest.find(['#', '.', '[']).unwrap_or(rest.len());
                    let name = rest[..end].to_string();
                    if name.is_empty() {
                        return Err(Error::Markup(format!("invalid selector: {input:?}")));
                    }
                    if marker == '#' {
                        compound.id = Some(name);
                    } else {
                        compound.classes.push(name);
                    }
                    rest = &rest[end..];
                }
                '[' => {
                    let end = rest
                        .find(']')
                        .ok_or_else(|| Error::Markup(format!("unclosed attribute selector: {input:?}")))?;
                    let body = &rest[..end];
                    let attr = match body.split_once('=') {
                        Some((name, value)) => (
                            name.trim().to_string(),
                            Some(value.trim().trim_matches(['"', '\'']).to_string()),
                        ),
                        None => (body.trim().to_string(), None),
                    };
                    compound.attrs.push(attr);
                    rest = &rest[end + 1..];
                }
                _ => return Err(Error::Markup(format!("invalid selector: {input:?}"))),
            }
        }

        Ok(compound)
    }

    fn matches(&self, el: &Element) -> bool {
        if self.tag.as_deref().is_some_and(|tag| !el.is(tag)) {
            return false;
        }
        if self.id.as_deref().is_some_and(|id| el.attr("id") != Some(id)) {
            return false;
        }
        if !self.classes.iter().all(|class| el.has_class(class)) {
            return false;
        }
        self.attrs.iter().all(|(name, value)| match (el.attr(name), value) {
            (Some(actual), Some(expected)) => actual == expected,
            (Some(_), None) => true,
            (None, _) => false,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_attributes() {
        let el = Element::parse(r#"<table id="t" data-type="bar"><tr><td>1</td></tr></table>"#)
            .unwrap();
        assert!(el.is("table"));
        assert_eq!(el.attr("id"), Some("t"));
        assert_eq!(el.attr("data-type"), Some("bar"));
        assert_eq!(el.descendants().len(), 2);
        assert_eq!(el.text_content(), "1");
    }

    #[test]
    fn tolerates_html_void_elements_and_unquoted_attributes() {
        let doc = Document::parse("<div class=box><br><p>a&nbsp;b</p></div>").unwrap();
        let div = doc.elements().next().unwrap();
        assert_eq!(div.attr("class"), Some("box"));
        let names: Vec<_> = div.child_elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["br", "p"]);
        assert_eq!(div.text_content(), "a\u{a0}b");
    }

    #[test]
    fn tolerates_missing_end_tags() {
        let doc = Document::parse("<ul><li>one<li>two</ul><p>after</p>").unwrap();
        let roots: Vec<_> = doc.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(roots, ["ul", "p"]);
    }

    #[test]
    fn markup_round_trip_keeps_structure() {
        let source = r#"<!DOCTYPE html><html><body><svg width="10"><g/><text>a &amp; b</text></svg></body></html>"#;
        let doc = Document::parse(source).unwrap();
        assert_eq!(doc.to_markup(), source);
    }

    #[test]
    fn entities_resolve_once() {
        let doc = Document::parse("<p title=\"&quot;x&apos;\">a &amp; b &larr; c &#65;</p>").unwrap();
        let p = doc.elements().next().unwrap();
        assert_eq!(p.text_content(), "a & b \u{2190} c A");
        assert_eq!(p.attr("title"), Some("\"x'"));
        assert_eq!(doc.to_markup(), "<p title=\"&quot;x&apos;\">a &amp; b \u{2190} c A</p>");

        let again = Document::parse(&doc.to_markup()).unwrap();
        assert_eq!(again, doc);
    }

    #[test]
    fn script_and_style_bodies_stay_verbatim() {
        let source = "<div><script>if (a < b && c) { go(\"</p>\"); }</script>\
            <style>p > a { color: red }</style><p>after</p></div>";
        let doc = Document::parse(source).unwrap();
        assert_eq!(doc.to_markup(), source);

        let div = doc.elements().next().unwrap();
        let style = div.child_elements().nth(1).unwrap();
        assert_eq!(style.text_content(), "p > a { color: red }");
        let names: Vec<_> = div.child_elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["script", "style", "p"]);
        assert_eq!(div.child_elements().last().unwrap().text_content(), "after");
    }

    #[test]
    fn unterminated_script_runs_to_end() {
        let doc = Document::parse("<body><SCRIPT>x < 1").unwrap();
        assert_eq!(doc.to_markup(), "<body><SCRIPT>x < 1</SCRIPT></body>");
    }

    #[test]
    fn empty_html_elements_keep_end_tag() {
        let div = Element::new("div").with_attr("id", "chart");
        assert_eq!(div.to_markup(), r#"<div id="chart"></div>"#);
        assert_eq!(Element::new("br").to_markup(), "<br/>");
    }

    #[test]
    fn class_helpers() {
        let mut el = Element::new("table");
        assert!(!el.has_class("a"));
        el.add_class("a");
        el.add_class("b");
        el.add_class("a");
        assert_eq!(el.attr("class"), Some("a b"));
        assert!(el.has_class("b"));
    }

    #[test]
    fn hidden_style_toggles() {
        let mut el = Element::new("div");
        el.set_hidden(true);
        assert!(el.is_hidden());
        el.set_hidden(false);
        assert!(!el.is_hidden());
        assert!(!el.has_attr("style"));
    }

    #[test]
    fn find_by_id_reaches_nested_elements() {
        let mut doc = Document::parse(r#"<div><section><span id="x">hi</span></section></div>"#)
            .unwrap();
        let span = doc.find_by_id_mut("x").unwrap();
        span.set_text("bye");
        assert!(doc.to_markup().contains(r#"<span id="x">bye</span>"#));
    }

    #[test]
    fn selector_matching() {
        let el = Element::parse(r#"<table id="t" class="chart data" data-type="bar"></table>"#)
            .unwrap();
        assert!(Selector::parse("table").unwrap().matches(&el));
        assert!(Selector::parse(".chart").unwrap().matches(&el));
        assert!(Selector::parse("table.chart.data#t").unwrap().matches(&el));
        assert!(Selector::parse("[data-type=bar]").unwrap().matches(&el));
        assert!(Selector::parse("div, table[data-type]").unwrap().matches(&el));
        assert!(!Selector::parse("table.other").unwrap().matches(&el));
        assert!(!Selector::parse("[data-type='line']").unwrap().matches(&el));
    }

    #[test]
    fn selector_rejects_combinators() {
        assert!(Selector::parse("div table").is_err());
        assert!(Selector::parse(" , ").is_err());
        assert!(Selector::parse("table[data").is_err());
    }
}
