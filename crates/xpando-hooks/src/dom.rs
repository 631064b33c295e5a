#![forbid(unsafe_code)]

//! DOM host seam.
//!
//! Behaviors never touch a concrete DOM. They go through [`Dom`], whose
//! associated `Node` type is an element handle (`web_sys::Element` in the
//! browser, an arena index in the lab host).
//!
//! Only the operations the behaviors need are exposed. Selectors passed to
//! [`Dom::query_all`] and [`Dom::closest`] are single compound selectors
//! (`tag`, `.class`, `[attr]`, `[attr="v"]`, `[attr^="v"]`).
//!
//! # Invariants
//!
//! 1. Listener callbacks run synchronously inside the host's dispatch and in
//!    registration order for one target.
//! 2. [`Dom::remove_listener`] takes effect before the next dispatch; an
//!    unknown id is ignored.
//! 3. Cross-component notification uses the closed [`Signal`] set only.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Handle for a registered DOM listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Where a listener is attached.
#[derive(Debug, Clone, PartialEq)]
pub enum EventTarget<N> {
    Window,
    Node(N),
}

/// Named cross-component notifications dispatched on shared ancestors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Request to switch theme; detail is the target theme.
    /// Dispatched on a theme hook's element.
    ThemeChange,
    /// A locally initiated theme change has been applied; detail is the
    /// theme. Dispatched on the window.
    ThemeApplied,
}

impl Signal {
    /// DOM event type used on the wire.
    #[must_use]
    pub const fn event_type(self) -> &'static str {
        match self {
            Self::ThemeChange => "xpando:theme-change",
            Self::ThemeApplied => "theme-applied",
        }
    }
}

/// Event kinds the behaviors listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomEventKind {
    Click,
    DoubleClick,
    KeyDown,
    Wheel,
    Scroll,
    Signal(Signal),
}

impl DomEventKind {
    #[must_use]
    pub const fn event_type(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::DoubleClick => "dblclick",
            Self::KeyDown => "keydown",
            Self::Wheel => "wheel",
            Self::Scroll => "scroll",
            Self::Signal(signal) => signal.event_type(),
        }
    }
}

/// A dispatched event as seen by a listener.
pub struct DomEvent<N> {
    pub kind: DomEventKind,
    /// Innermost element the event originated from (`None` for window events).
    pub target: Option<N>,
    /// `KeyboardEvent.key`.
    pub key: Option<String>,
    /// `WheelEvent.deltaY`.
    pub delta_y: f64,
    /// Signal payload.
    pub detail: Option<String>,
    default_prevented: Cell<bool>,
}

impl<N> DomEvent<N> {
    #[must_use]
    pub fn new(kind: DomEventKind, target: Option<N>) -> Self {
        Self {
            kind,
            target,
            key: None,
            delta_y: 0.0,
            detail: None,
            default_prevented: Cell::new(false),
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_delta_y(mut self, delta_y: f64) -> Self {
        self.delta_y = delta_y;
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    #[must_use]
    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

impl<N: fmt::Debug> fmt::Debug for DomEvent<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomEvent")
            .field("kind", &self.kind)
            .field("target", &self.target)
            .field("key", &self.key)
            .field("delta_y", &self.delta_y)
            .field("detail", &self.detail)
            .field("default_prevented", &self.default_prevented.get())
            .finish()
    }
}

pub type Listener<N> = Rc<dyn Fn(&DomEvent<N>)>;

/// The DOM operations the hook runtime needs from its host.
pub trait Dom: 'static {
    type Node: Clone + PartialEq + fmt::Debug + 'static;

    /// `document.documentElement`.
    fn document_element(&self) -> Self::Node;
    /// `document.body`.
    fn body(&self) -> Self::Node;
    /// `document.getElementById`.
    fn element_by_id(&self, id: &str) -> Option<Self::Node>;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
    fn set_attribute(&self, node: &Self::Node, name: &str, value: &str);

    fn has_class(&self, node: &Self::Node, class: &str) -> bool;
    fn add_class(&self, node: &Self::Node, class: &str);
    fn remove_class(&self, node: &Self::Node, class: &str);

    /// Set one inline style property (`style.setProperty`).
    fn set_style(&self, node: &Self::Node, property: &str, value: &str);

    /// Descendants of `scope` matching `selector`, in document order.
    fn query_all(&self, scope: &Self::Node, selector: &str) -> Vec<Self::Node>;

    fn query(&self, scope: &Self::Node, selector: &str) -> Option<Self::Node> {
        self.query_all(scope, selector).into_iter().next()
    }

    /// Nearest inclusive ancestor matching `selector`.
    fn closest(&self, node: &Self::Node, selector: &str) -> Option<Self::Node>;

    /// Create a detached element with the given class list.
    fn create_element(&self, tag: &str, class_name: &str) -> Option<Self::Node>;
    /// Replace children with static trusted markup.
    fn set_inner_html(&self, node: &Self::Node, html: &str);
    fn append_child(&self, parent: &Self::Node, child: &Self::Node);
    /// Detach `node`; no-op if already detached.
    fn remove(&self, node: &Self::Node);
    fn is_connected(&self, node: &Self::Node) -> bool;
    fn blur(&self, node: &Self::Node);
    /// Element holding keyboard focus, if any.
    fn active_element(&self) -> Option<Self::Node>;

    fn add_listener(
        &self,
        target: &EventTarget<Self::Node>,
        kind: DomEventKind,
        listener: Listener<Self::Node>,
    ) -> ListenerId;
    fn remove_listener(&self, id: ListenerId);
    /// Dispatch a [`Signal`] with a string detail.
    fn dispatch_signal(&self, target: &EventTarget<Self::Node>, signal: Signal, detail: &str);

    /// `window.scrollY`.
    fn scroll_y(&self) -> f64;
    /// `window.innerHeight`.
    fn viewport_height(&self) -> f64;
    /// Jump the window scroll position (no browser smoothing).
    fn scroll_to(&self, y: f64);
    /// Document-relative top edge of `node`.
    fn offset_top(&self, node: &Self::Node) -> f64;
    /// Replace the current history entry's fragment without scrolling.
    fn replace_hash(&self, hash: &str);
}
