#![forbid(unsafe_code)]

//! Error type shared by the hook runtime and its host adapters.

use thiserror::Error;

use crate::hook::HookPhase;

pub type Result<T> = std::result::Result<T, HookError>;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("no hook registered under name: {name}")]
    UnknownHook { name: String },

    #[error("no live hook instance with id {id}")]
    UnknownInstance { id: u64 },

    #[error("hook {hook} cannot {operation} while {phase:?}")]
    InvalidTransition {
        hook: &'static str,
        operation: &'static str,
        phase: HookPhase,
    },

    #[error("preference storage error: {message}")]
    Storage { message: String },

    #[error("failed to decode {event} payload: {source}")]
    Decode {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid runtime configuration: {0}")]
    Config(#[source] serde_json::Error),

    #[error("host error: {message}")]
    Host { message: String },
}

impl HookError {
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unknown_hook(name: impl Into<String>) -> Self {
        Self::UnknownHook { name: name.into() }
    }
}
