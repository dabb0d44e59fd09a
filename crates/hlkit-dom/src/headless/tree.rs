//! Arena-backed document tree
//!
//! Nodes live in a `Vec` and are never reused, so an element handle
//! (`index + 1`) stays unambiguous for the lifetime of the engine.
//! Markup goes in through html5ever's `RcDom` and comes back out through a
//! small serializer.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

use crate::event::{ElementProc, EventGroups};
use crate::selector::ElementContext;
use crate::types::{ApiResult, DomResult, ElementHandle, ElementState};

/// Index into the node arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(pub(crate) usize);

impl NodeId {
    pub(crate) fn handle(self) -> ElementHandle {
        ElementHandle::from_raw(self.0 + 1)
    }

    pub(crate) fn from_handle(he: ElementHandle) -> Option<Self> {
        he.raw().checked_sub(1).map(NodeId)
    }
}

/// Void elements (no end tag)
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Raw text elements (content not escaped)
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NodeKind {
    Element(String),
    Text(String),
}

/// Event handler registered on an element.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Attachment {
    pub proc: ElementProc,
    pub tag: usize,
    pub subscription: EventGroups,
}

impl Attachment {
    pub(crate) fn same(&self, proc: ElementProc, tag: usize) -> bool {
        std::ptr::fn_addr_eq(self.proc, proc) && self.tag == tag
    }
}

#[derive(Debug)]
pub(crate) struct Node {
    pub kind: NodeKind,
    pub attrs: Vec<(String, String)>,
    pub styles: Vec<(String, String)>,
    pub state: ElementState,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub uid: u32,
    /// Outstanding `use_element` references
    pub refs: u32,
    pub deleted: bool,
    pub attachments: Vec<Attachment>,
    /// A markup-declared behavior has been resolved for this element
    pub behavior_bound: bool,
    pub timers: Vec<usize>,
    /// Update/redraw requests received
    pub redraws: u32,
}

impl Node {
    fn new(kind: NodeKind, uid: u32) -> Self {
        Self {
            kind,
            attrs: Vec::new(),
            styles: Vec::new(),
            state: ElementState::NONE,
            parent: None,
            children: Vec::new(),
            uid,
            refs: 0,
            deleted: false,
            attachments: Vec::new(),
            behavior_bound: false,
            timers: Vec::new(),
            redraws: 0,
        }
    }

    pub(crate) fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element(_))
    }

    pub(crate) fn tag(&self) -> &str {
        match &self.kind {
            NodeKind::Element(tag) => tag,
            NodeKind::Text(_) => "",
        }
    }

    pub(crate) fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    pub(crate) fn set_attr(&mut self, name: &str, value: Option<&str>) {
        let pos = self.attrs.iter().position(|(n, _)| n == name);
        match (pos, value) {
            (Some(i), Some(v)) => self.attrs[i].1 = v.to_string(),
            (None, Some(v)) => self.attrs.push((name.to_string(), v.to_string())),
            (Some(i), None) => {
                self.attrs.remove(i);
            }
            (None, None) => {}
        }
    }

    pub(crate) fn style(&self, name: &str) -> Option<&str> {
        self.styles.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    pub(crate) fn set_style(&mut self, name: &str, value: Option<&str>) {
        self.styles.retain(|(n, _)| n != name);
        if let Some(v) = value {
            self.styles.push((name.to_string(), v.to_string()));
        }
    }
}

/// The node arena shared by every document of one engine.
#[derive(Debug, Default)]
pub(crate) struct Tree {
    nodes: Vec<Node>,
    next_uid: u32,
}

impl Tree {
    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.next_uid += 1;
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(kind, self.next_uid));
        id
    }

    pub(crate) fn new_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(tag.to_ascii_lowercase()))
    }

    pub(crate) fn new_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Any node ever created for this handle, deleted or not.
    pub(crate) fn any(&self, he: ElementHandle) -> ApiResult<NodeId> {
        NodeId::from_handle(he)
            .filter(|id| id.0 < self.nodes.len() && self.nodes[id.0].is_element())
            .ok_or(DomResult::InvalidHandle)
    }

    /// A live (not deleted) element.
    pub(crate) fn live(&self, he: ElementHandle) -> ApiResult<NodeId> {
        let id = self.any(he)?;
        if self.nodes[id.0].deleted { Err(DomResult::InvalidHandle) } else { Ok(id) }
    }

    pub(crate) fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub(crate) fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .children
            .iter()
            .copied()
            .filter(|c| self.node(*c).is_element())
            .collect()
    }

    /// Index among the parent's element children.
    pub(crate) fn element_index(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.element_children(parent).iter().position(|c| *c == id)
    }

    /// Topmost ancestor (or self).
    pub(crate) fn top(&self, mut id: NodeId) -> NodeId {
        while let Some(parent) = self.parent(id) {
            id = parent;
        }
        id
    }

    /// Is `ancestor` equal to or an ancestor of `id`?
    pub(crate) fn contains(&self, ancestor: NodeId, mut id: NodeId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.parent(id) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    /// Element descendants in document order.
    pub(crate) fn descendants(&self, id: NodeId, include_self: bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        if include_self {
            out.push(id);
        }
        let mut stack: Vec<NodeId> = self.element_children(id).into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.element_children(next).into_iter().rev());
        }
        out
    }

    /// Unlink `id` from its parent, if any.
    pub(crate) fn unlink(&mut self, id: NodeId) {
        if let Some(parent) = self.node_mut(id).parent.take() {
            self.node_mut(parent).children.retain(|c| *c != id);
        }
    }

    /// Insert `child` so it becomes element child number `index` of
    /// `parent`; past the end appends.
    pub(crate) fn insert(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.unlink(child);
        let elements = self.element_children(parent);
        let pos = match elements.get(index) {
            Some(anchor) => self.node(parent).children.iter().position(|c| c == anchor).unwrap_or(0),
            None => self.node(parent).children.len(),
        };
        self.node_mut(parent).children.insert(pos, child);
        self.node_mut(child).parent = Some(parent);
    }

    pub(crate) fn append(&mut self, parent: NodeId, child: NodeId) {
        self.unlink(child);
        self.node_mut(parent).children.push(child);
        self.node_mut(child).parent = Some(parent);
    }

    /// Swap two nodes' positions, possibly across parents.
    pub(crate) fn swap(&mut self, a: NodeId, b: NodeId) {
        let pa = self.parent(a);
        let pb = self.parent(b);
        let ia = pa.and_then(|p| self.node(p).children.iter().position(|c| *c == a));
        let ib = pb.and_then(|p| self.node(p).children.iter().position(|c| *c == b));
        if let (Some(p), Some(i)) = (pa, ia) {
            self.node_mut(p).children[i] = b;
        }
        if let (Some(p), Some(i)) = (pb, ib) {
            self.node_mut(p).children[i] = a;
        }
        self.node_mut(a).parent = pb;
        self.node_mut(b).parent = pa;
    }

    /// Replace element children `start..end` of `parent` with `sorted`.
    pub(crate) fn reorder(&mut self, parent: NodeId, start: usize, sorted: &[NodeId]) {
        let elements = self.element_children(parent);
        let slots: Vec<usize> = elements
            .iter()
            .skip(start)
            .take(sorted.len())
            .filter_map(|e| self.node(parent).children.iter().position(|c| c == e))
            .collect();
        for (slot, id) in slots.into_iter().zip(sorted) {
            self.node_mut(parent).children[slot] = *id;
        }
    }

    /// Deep copy, detached, fresh uids and no handlers.
    pub(crate) fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let kind = self.node(id).kind.clone();
        let copy = self.push(kind);
        let (attrs, styles, state) = {
            let src = self.node(id);
            (src.attrs.clone(), src.styles.clone(), src.state)
        };
        let node = self.node_mut(copy);
        node.attrs = attrs;
        node.styles = styles;
        node.state = state;
        for child in self.node(id).children.clone() {
            let child_copy = self.deep_clone(child);
            self.append(copy, child_copy);
        }
        copy
    }

    /// `(element, timer id)` for every running timer on a live element.
    pub(crate) fn running_timers(&self) -> Vec<(NodeId, usize)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| !node.deleted)
            .flat_map(|(i, node)| node.timers.iter().map(move |t| (NodeId(i), *t)))
            .collect()
    }

    pub(crate) fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.node(id).kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element(_) => {
                for child in &self.node(id).children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    // ========================================================================
    // Markup
    // ========================================================================

    /// Parse a full document; returns the `<html>` element.
    pub(crate) fn import_document(&mut self, html: &str) -> ApiResult<NodeId> {
        let dom = parse(html)?;
        let root = dom
            .document
            .children
            .borrow()
            .iter()
            .find_map(|child| match &child.data {
                RcNodeData::Element { .. } => Some(child.clone()),
                _ => None,
            })
            .ok_or(DomResult::OperationFailed)?;
        self.convert(&root).ok_or(DomResult::OperationFailed)
    }

    /// Parse a fragment; returns the top-level nodes in order.
    pub(crate) fn import_fragment(&mut self, html: &str) -> ApiResult<Vec<NodeId>> {
        let dom = parse(html)?;
        let mut out = Vec::new();
        let document = dom.document.children.borrow();
        for html_el in document.iter() {
            // <html> -> <head>, <body>; both may hold fragment content
            for section in html_el.children.borrow().iter() {
                for child in section.children.borrow().iter() {
                    if let Some(id) = self.convert(child) {
                        out.push(id);
                    }
                }
            }
        }
        Ok(out)
    }

    fn convert(&mut self, handle: &Handle) -> Option<NodeId> {
        match &handle.data {
            RcNodeData::Text { contents } => {
                let text = contents.borrow().to_string();
                if text.trim().is_empty() { None } else { Some(self.new_text(&text)) }
            }
            RcNodeData::Element { name, attrs, .. } => {
                let id = self.new_element(&name.local);
                for attr in attrs.borrow().iter() {
                    let value = attr.value.to_string();
                    self.node_mut(id).set_attr(&attr.name.local, Some(&value));
                }
                for child in handle.children.borrow().iter() {
                    if let Some(child_id) = self.convert(child) {
                        self.append(id, child_id);
                    }
                }
                Some(id)
            }
            RcNodeData::Document
            | RcNodeData::Doctype { .. }
            | RcNodeData::Comment { .. }
            | RcNodeData::ProcessingInstruction { .. } => None,
        }
    }

    pub(crate) fn serialize(&self, id: NodeId, outer: bool) -> String {
        let mut out = String::new();
        if outer {
            self.serialize_node(id, &mut out);
        } else {
            for child in &self.node(id).children {
                self.serialize_node(*child, &mut out);
            }
        }
        out
    }

    fn serialize_node(&self, id: NodeId, out: &mut String) {
        let node = self.node(id);
        match &node.kind {
            NodeKind::Text(text) => escape_text(text, out),
            NodeKind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in &node.attrs {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        escape_attribute(value, out);
                        out.push('"');
                    }
                }
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    out.push_str(" />");
                    return;
                }
                out.push('>');
                let raw = RAW_TEXT_ELEMENTS.contains(&tag.as_str());
                for child in &node.children {
                    match &self.node(*child).kind {
                        NodeKind::Text(text) if raw => out.push_str(text),
                        _ => self.serialize_node(*child, out),
                    }
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

fn parse(html: &str) -> ApiResult<RcDom> {
    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .map_err(|e| {
            tracing::warn!("markup parse failed: {}", e);
            DomResult::OperationFailed
        })
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

/// Borrowed view of an element used by the selector matcher.
#[derive(Clone, Copy)]
pub(crate) struct NodeRef<'a> {
    pub tree: &'a Tree,
    pub id: NodeId,
    /// Root element of the document, if the node is in one
    pub root: Option<NodeId>,
}

impl<'a> ElementContext for NodeRef<'a> {
    fn tag_name(&self) -> &str {
        self.tree.node(self.id).tag()
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.tree.node(self.id).attr(name)
    }

    fn state(&self) -> ElementState {
        self.tree.node(self.id).state
    }

    fn parent(&self) -> Option<Self> {
        self.tree.parent(self.id).map(|id| NodeRef { id, ..*self })
    }

    fn sibling_position(&self) -> (usize, usize) {
        match self.tree.parent(self.id) {
            Some(parent) => {
                let siblings = self.tree.element_children(parent);
                let index = siblings.iter().position(|c| *c == self.id).map_or(1, |i| i + 1);
                (index, siblings.len())
            }
            None => (1, 1),
        }
    }

    fn is_root(&self) -> bool {
        self.root == Some(self.id)
    }
}
