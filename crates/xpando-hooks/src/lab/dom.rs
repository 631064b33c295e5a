#![forbid(unsafe_code)]

//! Arena-backed DOM for deterministic tests.
//!
//! Node `0` is the document element and node `1` is `<body>`. Events bubble
//! from the target through its ancestors to the window. No borrow of the
//! arena is held while a listener runs, so listeners may freely mutate the
//! tree or (un)register listeners.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::dom::{Dom, DomEvent, DomEventKind, EventTarget, Listener, ListenerId, Signal};

/// Arena index of a [`LabDom`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabNode(usize);

impl LabNode {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

const ROOT: LabNode = LabNode(0);
const BODY: LabNode = LabNode(1);

#[derive(Debug, Default)]
struct NodeData {
    tag: String,
    attributes: BTreeMap<String, String>,
    classes: Vec<String>,
    styles: BTreeMap<String, String>,
    inner_html: Option<String>,
    parent: Option<LabNode>,
    children: Vec<LabNode>,
    offset_top: f64,
    removals: usize,
    class_additions: BTreeMap<String, usize>,
}

impl NodeData {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }
}

struct Registration {
    id: ListenerId,
    target: EventTarget<LabNode>,
    kind: DomEventKind,
    listener: Listener<LabNode>,
}

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum AttrTest {
    Exists,
    Equals(String),
    Prefix(String),
}

/// One compound selector: `tag.class[attr="v"]`.
#[derive(Debug, Clone, PartialEq, Default)]
struct Selector {
    tag: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, AttrTest)>,
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn take_ident(rest: &str) -> (&str, &str) {
    let end = rest.find(|c: char| !is_ident(c)).unwrap_or(rest.len());
    rest.split_at(end)
}

fn parse_selector(input: &str) -> Option<Selector> {
    let input = input.trim();
    let mut selector = Selector::default();
    let (tag, mut rest) = take_ident(input);
    if !tag.is_empty() {
        selector.tag = Some(tag.to_ascii_lowercase());
    } else if let Some(r) = rest.strip_prefix('*') {
        rest = r;
    }
    while let Some(first) = rest.chars().next() {
        match first {
            '.' | '#' => {
                let (name, r) = take_ident(&rest[1..]);
                if name.is_empty() {
                    return None;
                }
                if first == '.' {
                    selector.classes.push(name.to_string());
                } else {
                    selector
                        .attributes
                        .push(("id".to_string(), AttrTest::Equals(name.to_string())));
                }
                rest = r;
            }
            '[' => {
                let close = rest.find(']')?;
                let body = &rest[1..close];
                selector.attributes.push(parse_attribute(body)?);
                rest = &rest[close + 1..];
            }
            _ => return None,
        }
    }
    Some(selector)
}

fn parse_attribute(body: &str) -> Option<(String, AttrTest)> {
    let (name, rest) = take_ident(body.trim());
    if name.is_empty() {
        return None;
    }
    let rest = rest.trim();
    if rest.is_empty() {
        return Some((name.to_string(), AttrTest::Exists));
    }
    let (prefix, value) = if let Some(v) = rest.strip_prefix("^=") {
        (true, v)
    } else if let Some(v) = rest.strip_prefix('=') {
        (false, v)
    } else {
        return None;
    };
    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
        .to_string();
    let test = if prefix {
        AttrTest::Prefix(value)
    } else {
        AttrTest::Equals(value)
    };
    Some((name.to_string(), test))
}

impl Selector {
    fn matches(&self, node: &NodeData) -> bool {
        if self.tag.as_ref().is_some_and(|tag| *tag != node.tag) {
            return false;
        }
        if !self.classes.iter().all(|c| node.classes.contains(c)) {
            return false;
        }
        self.attributes.iter().all(|(name, test)| {
            let Some(value) = node.attributes.get(name) else {
                return false;
            };
            match test {
                AttrTest::Exists => true,
                AttrTest::Equals(expected) => value == expected,
                AttrTest::Prefix(prefix) => value.starts_with(prefix.as_str()),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// LabDom
// ---------------------------------------------------------------------------

/// In-memory [`Dom`] with a window, scroll position, and history fragment.
pub struct LabDom {
    nodes: RefCell<Vec<NodeData>>,
    listeners: RefCell<Vec<Registration>>,
    next_listener: Cell<u64>,
    scroll_y: Cell<f64>,
    viewport_height: Cell<f64>,
    focused: Cell<Option<LabNode>>,
    hash: RefCell<Option<String>>,
}

impl std::fmt::Debug for LabDom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabDom")
            .field("nodes", &self.nodes.borrow().len())
            .field("listeners", &self.listeners.borrow().len())
            .field("scroll_y", &self.scroll_y.get())
            .finish()
    }
}

impl Default for LabDom {
    fn default() -> Self {
        Self::new()
    }
}

impl LabDom {
    /// Empty document: `<html><body></body></html>`, 800 px viewport.
    #[must_use]
    pub fn new() -> Self {
        let mut root = NodeData::new("html");
        root.children.push(BODY);
        let mut body = NodeData::new("body");
        body.parent = Some(ROOT);
        Self {
            nodes: RefCell::new(vec![root, body]),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(1),
            scroll_y: Cell::new(0.0),
            viewport_height: Cell::new(800.0),
            focused: Cell::new(None),
            hash: RefCell::new(None),
        }
    }

    /// New detached element.
    pub fn element(&self, tag: &str) -> LabNode {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(NodeData::new(tag));
        LabNode(nodes.len() - 1)
    }

    /// New element appended to `parent`.
    pub fn append(&self, parent: &LabNode, tag: &str) -> LabNode {
        let node = self.element(tag);
        self.append_child(parent, &node);
        node
    }

    pub fn children(&self, node: &LabNode) -> Vec<LabNode> {
        self.nodes.borrow()[node.0].children.clone()
    }

    pub fn classes(&self, node: &LabNode) -> Vec<String> {
        self.nodes.borrow()[node.0].classes.clone()
    }

    pub fn style(&self, node: &LabNode, property: &str) -> Option<String> {
        self.nodes.borrow()[node.0].styles.get(property).cloned()
    }

    pub fn inner_html(&self, node: &LabNode) -> Option<String> {
        self.nodes.borrow()[node.0].inner_html.clone()
    }

    /// How many times `node` was detached from a parent.
    pub fn removal_count(&self, node: &LabNode) -> usize {
        self.nodes.borrow()[node.0].removals
    }

    /// How many times `class` went from absent to present on `node`.
    pub fn class_additions(&self, node: &LabNode, class: &str) -> usize {
        self.nodes.borrow()[node.0]
            .class_additions
            .get(class)
            .copied()
            .unwrap_or(0)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn set_viewport_height(&self, height: f64) {
        self.viewport_height.set(height);
    }

    pub fn set_offset_top(&self, node: &LabNode, top: f64) {
        self.nodes.borrow_mut()[node.0].offset_top = top;
    }

    /// User scroll: move the window and fire `scroll`.
    pub fn set_scroll(&self, y: f64) {
        self.scroll_y.set(y);
        self.dispatch(DomEvent::new(DomEventKind::Scroll, None), &EventTarget::Window);
    }

    /// Fragment last written with [`Dom::replace_hash`].
    pub fn history_hash(&self) -> Option<String> {
        self.hash.borrow().clone()
    }

    pub fn focus(&self, node: &LabNode) {
        self.focused.set(Some(*node));
    }

    pub fn is_focused(&self, node: &LabNode) -> bool {
        self.focused.get() == Some(*node)
    }

    /// Click `node`; returns whether a listener prevented the default.
    pub fn click(&self, node: &LabNode) -> bool {
        self.fire(DomEvent::new(DomEventKind::Click, Some(*node)))
    }

    pub fn double_click(&self, node: &LabNode) -> bool {
        self.fire(DomEvent::new(DomEventKind::DoubleClick, Some(*node)))
    }

    pub fn key_down(&self, node: &LabNode, key: &str) -> bool {
        self.fire(DomEvent::new(DomEventKind::KeyDown, Some(*node)).with_key(key))
    }

    pub fn wheel(&self, node: &LabNode, delta_y: f64) -> bool {
        self.fire(DomEvent::new(DomEventKind::Wheel, Some(*node)).with_delta_y(delta_y))
    }

    /// Record the detail of every `signal` that reaches the window.
    pub fn signal_log(&self, signal: Signal) -> Rc<RefCell<Vec<String>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        self.add_listener(
            &EventTarget::Window,
            DomEventKind::Signal(signal),
            Rc::new(move |event: &DomEvent<LabNode>| {
                sink.borrow_mut()
                    .push(event.detail.clone().unwrap_or_default());
            }),
        );
        log
    }

    fn fire(&self, event: DomEvent<LabNode>) -> bool {
        let target = match event.target {
            Some(node) => EventTarget::Node(node),
            None => EventTarget::Window,
        };
        self.dispatch(event, &target)
    }

    /// Target, its ancestors, then the window.
    fn propagation_path(&self, target: &EventTarget<LabNode>) -> Vec<EventTarget<LabNode>> {
        let mut path = Vec::new();
        if let EventTarget::Node(node) = target {
            let nodes = self.nodes.borrow();
            let mut cursor = Some(*node);
            while let Some(current) = cursor {
                path.push(EventTarget::Node(current));
                cursor = nodes[current.0].parent;
            }
        }
        path.push(EventTarget::Window);
        path
    }

    fn dispatch(&self, event: DomEvent<LabNode>, target: &EventTarget<LabNode>) -> bool {
        for hop in self.propagation_path(target) {
            let matching: Vec<(ListenerId, Listener<LabNode>)> = self
                .listeners
                .borrow()
                .iter()
                .filter(|r| r.kind == event.kind && r.target == hop)
                .map(|r| (r.id, Rc::clone(&r.listener)))
                .collect();
            for (id, listener) in matching {
                let still_registered = self.listeners.borrow().iter().any(|r| r.id == id);
                if still_registered {
                    listener(&event);
                }
            }
        }
        event.default_prevented()
    }

    fn matching_descendants(&self, scope: LabNode, selector: &Selector, out: &mut Vec<LabNode>) {
        let children = self.nodes.borrow()[scope.0].children.clone();
        for child in children {
            if selector.matches(&self.nodes.borrow()[child.0]) {
                out.push(child);
            }
            self.matching_descendants(child, selector, out);
        }
    }

    fn detach(&self, node: LabNode) -> bool {
        let mut nodes = self.nodes.borrow_mut();
        let Some(parent) = nodes[node.0].parent.take() else {
            return false;
        };
        nodes[parent.0].children.retain(|c| *c != node);
        true
    }
}

impl Dom for LabDom {
    type Node = LabNode;

    fn document_element(&self) -> LabNode {
        ROOT
    }

    fn body(&self) -> LabNode {
        BODY
    }

    fn element_by_id(&self, id: &str) -> Option<LabNode> {
        let selector = Selector {
            attributes: vec![("id".to_string(), AttrTest::Equals(id.to_string()))],
            ..Selector::default()
        };
        let mut found = Vec::new();
        self.matching_descendants(ROOT, &selector, &mut found);
        found.into_iter().next()
    }

    fn attribute(&self, node: &LabNode, name: &str) -> Option<String> {
        let nodes = self.nodes.borrow();
        let data = &nodes[node.0];
        if name == "class" {
            return Some(data.classes.join(" "));
        }
        data.attributes.get(name).cloned()
    }

    fn set_attribute(&self, node: &LabNode, name: &str, value: &str) {
        self.nodes.borrow_mut()[node.0]
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    fn has_class(&self, node: &LabNode, class: &str) -> bool {
        self.nodes.borrow()[node.0].classes.iter().any(|c| c == class)
    }

    fn add_class(&self, node: &LabNode, class: &str) {
        let mut nodes = self.nodes.borrow_mut();
        let data = &mut nodes[node.0];
        if !data.classes.iter().any(|c| c == class) {
            data.classes.push(class.to_string());
            *data.class_additions.entry(class.to_string()).or_default() += 1;
        }
    }

    fn remove_class(&self, node: &LabNode, class: &str) {
        self.nodes.borrow_mut()[node.0].classes.retain(|c| c != class);
    }

    fn set_style(&self, node: &LabNode, property: &str, value: &str) {
        self.nodes.borrow_mut()[node.0]
            .styles
            .insert(property.to_string(), value.to_string());
    }

    fn query_all(&self, scope: &LabNode, selector: &str) -> Vec<LabNode> {
        let Some(selector) = parse_selector(selector) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        self.matching_descendants(*scope, &selector, &mut out);
        out
    }

    fn closest(&self, node: &LabNode, selector: &str) -> Option<LabNode> {
        let selector = parse_selector(selector)?;
        let nodes = self.nodes.borrow();
        let mut cursor = Some(*node);
        while let Some(current) = cursor {
            if selector.matches(&nodes[current.0]) {
                return Some(current);
            }
            cursor = nodes[current.0].parent;
        }
        None
    }

    fn create_element(&self, tag: &str, class_name: &str) -> Option<LabNode> {
        let node = self.element(tag);
        for class in class_name.split_whitespace() {
            self.add_class(&node, class);
        }
        Some(node)
    }

    fn set_inner_html(&self, node: &LabNode, html: &str) {
        self.nodes.borrow_mut()[node.0].inner_html = Some(html.to_string());
    }

    fn append_child(&self, parent: &LabNode, child: &LabNode) {
        self.detach(*child);
        let mut nodes = self.nodes.borrow_mut();
        nodes[child.0].parent = Some(*parent);
        nodes[parent.0].children.push(*child);
    }

    fn remove(&self, node: &LabNode) {
        if self.detach(*node) {
            self.nodes.borrow_mut()[node.0].removals += 1;
        }
    }

    fn is_connected(&self, node: &LabNode) -> bool {
        let nodes = self.nodes.borrow();
        let mut cursor = *node;
        loop {
            if cursor == ROOT {
                return true;
            }
            match nodes[cursor.0].parent {
                Some(parent) => cursor = parent,
                None => return false,
            }
        }
    }

    fn blur(&self, node: &LabNode) {
        if self.focused.get() == Some(*node) {
            self.focused.set(None);
        }
    }

    fn active_element(&self) -> Option<LabNode> {
        self.focused.get()
    }

    fn add_listener(
        &self,
        target: &EventTarget<LabNode>,
        kind: DomEventKind,
        listener: Listener<LabNode>,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().push(Registration {
            id,
            target: target.clone(),
            kind,
            listener,
        });
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.borrow_mut().retain(|r| r.id != id);
    }

    fn dispatch_signal(&self, target: &EventTarget<LabNode>, signal: Signal, detail: &str) {
        let node = match target {
            EventTarget::Node(node) => Some(*node),
            EventTarget::Window => None,
        };
        let event = DomEvent::new(DomEventKind::Signal(signal), node).with_detail(detail);
        self.dispatch(event, target);
    }

    fn scroll_y(&self) -> f64 {
        self.scroll_y.get()
    }

    fn viewport_height(&self) -> f64 {
        self.viewport_height.get()
    }

    fn scroll_to(&self, y: f64) {
        self.set_scroll(y);
    }

    fn offset_top(&self, node: &LabNode) -> f64 {
        self.nodes.borrow()[node.0].offset_top
    }

    fn replace_hash(&self, hash: &str) {
        *self.hash.borrow_mut() = Some(hash.to_string());
    }
}
