#![forbid(unsafe_code)]

//! Hook contract and per-instance lifecycle.
//!
//! # State transitions
//!
//! ```text
//!  ┌───────────┐  mount ok   ┌─────────┐  destroy  ┌───────────┐
//!  │ Unmounted ├────────────▶│ Mounted ├──────────▶│ Destroyed │
//!  └─────┬─────┘             └──┬───▲──┘           └───────────┘
//!        │ mount err            │   │ updated                ▲
//!        └──────────────────────┼───┴──────────────────────────┘
//!                               └ (re-entry, no re-registration)
//! ```
//!
//! # Invariants
//!
//! 1. `Destroyed` is terminal; `destroy()` there is a no-op.
//! 2. `destroy()` releases the instance's [`HookScope`] synchronously, after
//!    the hook's own `destroyed()` ran.
//! 3. A failed `mounted()` is rolled back exactly like a destroy.
//! 4. `updated()` never re-runs mount-time registration.

use std::fmt;
use std::rc::Rc;

use crate::config::RuntimeConfig;
use crate::dom::Dom;
use crate::error::{HookError, Result};
use crate::prefs::PreferenceStore;
use crate::scope::HookScope;

/// Identifier the host assigns to a mounted instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    Unmounted,
    Mounted,
    Destroyed,
}

/// What a hook sees of its environment.
pub struct HookContext<D: Dom> {
    pub instance: InstanceId,
    /// The bound element.
    pub el: D::Node,
    pub dom: Rc<D>,
    pub scope: HookScope<D>,
    pub config: Rc<RuntimeConfig>,
}

impl<D: Dom> HookContext<D> {
    #[must_use]
    pub fn prefs(&self) -> &PreferenceStore {
        self.scope.prefs()
    }
}

impl<D: Dom> fmt::Debug for HookContext<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookContext")
            .field("instance", &self.instance)
            .field("el", &self.el)
            .field("scope", &self.scope)
            .finish()
    }
}

/// One behavior bound to one element.
///
/// Everything a hook registers must go through `cx.scope`; the runtime
/// releases the scope on destroy. `destroyed()` is for state the scope cannot
/// see (e.g. elements appended outside the bound element).
pub trait Hook<D: Dom> {
    fn name(&self) -> &'static str;

    fn mounted(&mut self, cx: &HookContext<D>) -> Result<()>;

    fn updated(&mut self, _cx: &HookContext<D>) {}

    fn destroyed(&mut self, _cx: &HookContext<D>) {}
}

/// A hook plus its context and lifecycle phase.
pub struct HookInstance<D: Dom> {
    phase: HookPhase,
    hook: Box<dyn Hook<D>>,
    cx: HookContext<D>,
}

impl<D: Dom> fmt::Debug for HookInstance<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookInstance")
            .field("hook", &self.hook.name())
            .field("phase", &self.phase)
            .field("cx", &self.cx)
            .finish()
    }
}

impl<D: Dom> HookInstance<D> {
    #[must_use]
    pub fn new(hook: Box<dyn Hook<D>>, cx: HookContext<D>) -> Self {
        Self {
            phase: HookPhase::Unmounted,
            hook,
            cx,
        }
    }

    #[must_use]
    pub fn phase(&self) -> HookPhase {
        self.phase
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.hook.name()
    }

    #[must_use]
    pub fn context(&self) -> &HookContext<D> {
        &self.cx
    }

    fn invalid(&self, operation: &'static str) -> HookError {
        HookError::InvalidTransition {
            hook: self.hook.name(),
            operation,
            phase: self.phase,
        }
    }

    pub fn mount(&mut self) -> Result<()> {
        if self.phase != HookPhase::Unmounted {
            return Err(self.invalid("mount"));
        }
        let _span = tracing::debug_span!(
            "hook.mount",
            hook = self.hook.name(),
            instance = self.cx.instance.0
        )
        .entered();
        match self.hook.mounted(&self.cx) {
            Ok(()) => {
                self.phase = HookPhase::Mounted;
                tracing::debug!(
                    message = "hook.mounted",
                    handles = self.cx.scope.handle_count()
                );
                Ok(())
            }
            Err(err) => {
                self.teardown();
                Err(err)
            }
        }
    }

    pub fn update(&mut self) -> Result<()> {
        if self.phase != HookPhase::Mounted {
            return Err(self.invalid("update"));
        }
        self.hook.updated(&self.cx);
        Ok(())
    }

    pub fn destroy(&mut self) {
        if self.phase == HookPhase::Destroyed {
            return;
        }
        tracing::debug!(
            message = "hook.destroy",
            hook = self.hook.name(),
            instance = self.cx.instance.0,
            handles = self.cx.scope.handle_count()
        );
        self.teardown();
    }

    fn teardown(&mut self) {
        self.hook.destroyed(&self.cx);
        self.cx.scope.release();
        self.phase = HookPhase::Destroyed;
    }
}
