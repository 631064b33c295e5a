#![forbid(unsafe_code)]

//! Server event channel: typed inbound and outbound events.
//!
//! The transport (LiveView in the browser) is an external collaborator. It
//! is reached through [`ServerChannel`], which deals in raw event names and
//! JSON payloads. Decoding into [`ServerEvent`] and encoding from
//! [`ClientEvent`] happen here so every hook speaks the same closed set.
//!
//! | dir | event | payload |
//! |-----|-------|---------|
//! | out | `sync_theme` | `{theme}` |
//! | in/out | `theme_changed` | `{theme}` |
//! | in | `network_activity` | `{type, node_id}` |
//! | in | `graph_update` | any |
//! | out | `graph_data_updated` | same as the `graph_update` it relays |
//! | out | `focus_node` | `{node_id}` |
//! | out | `clear_selection` | `{}` |
//! | in | `show_toast` | `{type, message}` |
//!
//! Delivery is at-most-once while connected and nothing is replayed.

use std::rc::Rc;

use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{HookError, Result};
use crate::hooks::toast::ToastKind;

/// Handle for an inbound handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelRef(pub u64);

pub type RawHandler = Rc<dyn Fn(Value)>;

/// Per-instance link to the remote session.
pub trait ServerChannel {
    fn push(&self, event: &str, payload: Value);

    fn handle_event(&self, event: &str, handler: RawHandler) -> ChannelRef;

    fn remove_handler(&self, handler: ChannelRef);
}

/// Inbound event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerEventKind {
    ThemeChanged,
    NetworkActivity,
    GraphUpdate,
    ShowToast,
}

impl ServerEventKind {
    #[must_use]
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::ThemeChanged => "theme_changed",
            Self::NetworkActivity => "network_activity",
            Self::GraphUpdate => "graph_update",
            Self::ShowToast => "show_toast",
        }
    }
}

/// Decoded inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    ThemeChanged {
        theme: String,
    },
    NetworkActivity {
        activity_type: String,
        node_id: Option<String>,
    },
    GraphUpdate(Value),
    ShowToast {
        kind: ToastKind,
        message: String,
    },
}

#[derive(Deserialize)]
struct ThemePayload {
    theme: String,
}

#[derive(Deserialize)]
struct NetworkActivityPayload {
    #[serde(rename = "type")]
    activity_type: String,
    #[serde(default)]
    node_id: Value,
}

#[derive(Deserialize)]
struct ToastPayload {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: String,
}

impl ServerEvent {
    /// Decode a raw payload for `kind`.
    pub fn decode(kind: ServerEventKind, payload: Value) -> Result<Self> {
        let decode_err = |source| HookError::Decode {
            event: kind.event_name().to_string(),
            source,
        };
        match kind {
            ServerEventKind::ThemeChanged => {
                let p: ThemePayload = serde_json::from_value(payload).map_err(decode_err)?;
                Ok(Self::ThemeChanged { theme: p.theme })
            }
            ServerEventKind::NetworkActivity => {
                let p: NetworkActivityPayload =
                    serde_json::from_value(payload).map_err(decode_err)?;
                let node_id = match p.node_id {
                    Value::Null => None,
                    Value::String(s) => Some(s),
                    other => Some(other.to_string()),
                };
                Ok(Self::NetworkActivity {
                    activity_type: p.activity_type,
                    node_id,
                })
            }
            ServerEventKind::GraphUpdate => Ok(Self::GraphUpdate(payload)),
            ServerEventKind::ShowToast => {
                let p: ToastPayload = serde_json::from_value(payload).map_err(decode_err)?;
                Ok(Self::ShowToast {
                    kind: ToastKind::parse(p.kind.as_deref().unwrap_or_default()),
                    message: p.message,
                })
            }
        }
    }
}

/// Outbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    SyncTheme { theme: String },
    ThemeChanged { theme: String },
    GraphDataUpdated(Value),
    FocusNode { node_id: String },
    ClearSelection,
}

impl ClientEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SyncTheme { .. } => "sync_theme",
            Self::ThemeChanged { .. } => "theme_changed",
            Self::GraphDataUpdated(_) => "graph_data_updated",
            Self::FocusNode { .. } => "focus_node",
            Self::ClearSelection => "clear_selection",
        }
    }

    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::SyncTheme { theme } | Self::ThemeChanged { theme } => json!({ "theme": theme }),
            Self::GraphDataUpdated(data) => data.clone(),
            Self::FocusNode { node_id } => json!({ "node_id": node_id }),
            Self::ClearSelection => json!({}),
        }
    }

    /// Inverse of [`ClientEvent::name`] + [`ClientEvent::payload`].
    #[must_use]
    pub fn from_parts(name: &str, payload: Value) -> Option<Self> {
        let theme = |p: &Value| p.get("theme").and_then(Value::as_str).map(str::to_string);
        match name {
            "sync_theme" => theme(&payload).map(|theme| Self::SyncTheme { theme }),
            "theme_changed" => theme(&payload).map(|theme| Self::ThemeChanged { theme }),
            "graph_data_updated" => Some(Self::GraphDataUpdated(payload)),
            "focus_node" => payload
                .get("node_id")
                .and_then(Value::as_str)
                .map(|id| Self::FocusNode {
                    node_id: id.to_string(),
                }),
            "clear_selection" => Some(Self::ClearSelection),
            _ => None,
        }
    }
}
