//! Logout sequencing contract.
//!
//! A fixed linear protocol:
//!
//! 1. `unregister_push_token` always runs first, so no further pushes reach
//!    a dying session.
//! 2. In strict mode only: `mark_offline`, then `backend_logout`. Presence
//!    is cleared before the backend forgets the session.
//! 3. `stop_and_clear_local_session` always runs last.
//!
//! A failing step is logged and recorded in the [`LogoutReport`]; later
//! steps still run so the local session is always torn down. Each action
//! applies its own timeout; the contract only fixes ordering.

use std::future::Future;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{info, warn};

use cargolink_core::{logging, Result};

/// Side effects composed by the logout contract.
#[async_trait]
pub trait LogoutActions: Send + Sync {
    async fn unregister_push_token(&self) -> Result<()>;

    async fn mark_offline(&self) -> Result<()>;

    async fn backend_logout(&self) -> Result<()>;

    async fn stop_and_clear_local_session(&self) -> Result<()>;
}

/// One step of the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutStep {
    UnregisterPushToken,
    MarkOffline,
    BackendLogout,
    ClearLocalSession,
}

impl LogoutStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogoutStep::UnregisterPushToken => "unregister",
            LogoutStep::MarkOffline => "offline",
            LogoutStep::BackendLogout => "backend_logout",
            LogoutStep::ClearLocalSession => "local_clear",
        }
    }

    /// Steps executed for the given mode, in order.
    pub fn sequence(strict: bool) -> &'static [LogoutStep] {
        if strict {
            &[
                LogoutStep::UnregisterPushToken,
                LogoutStep::MarkOffline,
                LogoutStep::BackendLogout,
                LogoutStep::ClearLocalSession,
            ]
        } else {
            &[LogoutStep::UnregisterPushToken, LogoutStep::ClearLocalSession]
        }
    }
}

/// Outcome of one executed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: LogoutStep,
    /// Error message if the step failed.
    pub error: Option<String>,
}

/// What the contract executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutReport {
    pub strict: bool,
    pub outcomes: Vec<StepOutcome>,
}

impl LogoutReport {
    /// Executed steps in order.
    pub fn steps(&self) -> Vec<LogoutStep> {
        self.outcomes.iter().map(|o| o.step).collect()
    }

    /// Whether every step succeeded.
    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(|o| o.error.is_none())
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }
}

/// Run the logout contract against `actions`.
pub async fn execute_logout_contract(strict: bool, actions: &dyn LogoutActions) -> LogoutReport {
    info!(strict, "Executing logout contract");

    let mut outcomes = Vec::with_capacity(4);
    for step in LogoutStep::sequence(strict) {
        let result = match step {
            LogoutStep::UnregisterPushToken => actions.unregister_push_token().await,
            LogoutStep::MarkOffline => actions.mark_offline().await,
            LogoutStep::BackendLogout => actions.backend_logout().await,
            LogoutStep::ClearLocalSession => actions.stop_and_clear_local_session().await,
        };
        let error = result.err().map(|e| {
            warn!(
                step = step.as_str(),
                { logging::ERROR_MSG } = e.to_string().as_str(),
                "Logout step failed, continuing"
            );
            e.to_string()
        });
        outcomes.push(StepOutcome { step: *step, error });
    }

    let report = LogoutReport { strict, outcomes };
    info!(
        strict,
        { logging::SUCCESS } = report.is_clean(),
        steps = report.outcomes.len(),
        "Logout contract finished"
    );
    report
}

/// A boxed async action.
pub type LogoutAction = Box<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

fn boxed<F, Fut>(f: F) -> LogoutAction
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Box::new(move || f().boxed())
}

/// The four logout actions as closures. Unset actions succeed immediately.
pub struct LogoutSteps {
    unregister_push_token: LogoutAction,
    mark_offline: LogoutAction,
    backend_logout: LogoutAction,
    stop_and_clear_local_session: LogoutAction,
}

impl Default for LogoutSteps {
    fn default() -> Self {
        Self {
            unregister_push_token: boxed(|| async { Ok(()) }),
            mark_offline: boxed(|| async { Ok(()) }),
            backend_logout: boxed(|| async { Ok(()) }),
            stop_and_clear_local_session: boxed(|| async { Ok(()) }),
        }
    }
}

impl LogoutSteps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_unregister_push_token<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.unregister_push_token = boxed(f);
        self
    }

    pub fn on_mark_offline<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.mark_offline = boxed(f);
        self
    }

    pub fn on_backend_logout<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.backend_logout = boxed(f);
        self
    }

    pub fn on_stop_and_clear_local_session<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.stop_and_clear_local_session = boxed(f);
        self
    }
}

#[async_trait]
impl LogoutActions for LogoutSteps {
    async fn unregister_push_token(&self) -> Result<()> {
        (self.unregister_push_token)().await
    }

    async fn mark_offline(&self) -> Result<()> {
        (self.mark_offline)().await
    }

    async fn backend_logout(&self) -> Result<()> {
        (self.backend_logout)().await
    }

    async fn stop_and_clear_local_session(&self) -> Result<()> {
        (self.stop_and_clear_local_session)().await
    }
}
