use serde::Serialize;
use tokio::sync::watch;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{
    access::can_access,
    navigation::Navigator,
    roles::Role,
    session::{Session, SessionProvider},
};

/// Login entry point for unauthenticated visitors.
pub const LOGIN_PATH: &str = "/auth/login";
/// Not-authorized view.
pub const FORBIDDEN_PATH: &str = "/forbidden";

/// GuardState
///
/// Where the last evaluation left a guarded region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum GuardState {
    Unknown,
    Unauthenticated,
    Forbidden,
    Authorized,
}

/// GuardDecision
///
/// The declarative outcome handed to the navigation collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Render the protected children unchanged.
    Authorized,
    /// Session not yet known; render nothing and do not navigate.
    Pending,
    RedirectTo(String),
}

impl GuardDecision {
    pub fn renders_children(&self) -> bool {
        matches!(self, GuardDecision::Authorized)
    }

    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            GuardDecision::RedirectTo(path) => Some(path),
            _ => None,
        }
    }
}

/// RehydrationPolicy
///
/// How a session still marked `loading` is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RehydrationPolicy {
    /// Hold in `Unknown` until rehydration completes.
    #[default]
    AwaitRehydration,
    /// Ignore the loading flag and evaluate the session as it stands, which can
    /// redirect a returning user to login before their session is restored.
    RedirectImmediately,
}

/// GuardConfig
///
/// Redirect targets and the rehydration policy shared by every guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    pub login_path: String,
    pub forbidden_path: String,
    pub rehydration: RehydrationPolicy,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            login_path: LOGIN_PATH.to_string(),
            forbidden_path: FORBIDDEN_PATH.to_string(),
            rehydration: RehydrationPolicy::default(),
        }
    }
}

/// GuardOutcome
///
/// State plus decision of a single evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOutcome {
    pub state: GuardState,
    pub decision: GuardDecision,
}

/// decide
///
/// Pure guard evaluation. Order matters: the loading gate comes first, then the
/// token check, then the role check. A token without a user fails closed.
pub fn decide<S: AsRef<str>>(
    session: &Session,
    allowed_roles: &[S],
    config: &GuardConfig,
) -> GuardOutcome {
    if session.loading && config.rehydration == RehydrationPolicy::AwaitRehydration {
        return GuardOutcome {
            state: GuardState::Unknown,
            decision: GuardDecision::Pending,
        };
    }

    if !session.has_token() {
        return GuardOutcome {
            state: GuardState::Unauthenticated,
            decision: GuardDecision::RedirectTo(config.login_path.clone()),
        };
    }

    let role = session.user.as_ref().map(|user| user.role.as_str());
    if !can_access(role, allowed_roles) {
        return GuardOutcome {
            state: GuardState::Forbidden,
            decision: GuardDecision::RedirectTo(config.forbidden_path.clone()),
        };
    }

    GuardOutcome {
        state: GuardState::Authorized,
        decision: GuardDecision::Authorized,
    }
}

/// RouteGuard
///
/// An allow-list bound to a guard configuration. Stateless; one instance can
/// serve any number of concurrent evaluations.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    allowed_roles: Vec<Role>,
    config: GuardConfig,
}

impl RouteGuard {
    pub fn new(allowed_roles: impl IntoIterator<Item = Role>, config: GuardConfig) -> Self {
        Self {
            allowed_roles: allowed_roles.into_iter().collect(),
            config,
        }
    }

    /// from_names
    ///
    /// Builds a guard from role strings as a page layout would declare them.
    /// Names that match no role are dropped.
    pub fn from_names<S: AsRef<str>>(names: &[S], config: GuardConfig) -> Self {
        let allowed_roles = names
            .iter()
            .filter_map(|name| {
                let parsed = Role::parse(name.as_ref());
                if parsed.is_none() {
                    tracing::warn!(role = %name.as_ref(), "Ignoring unknown role in allow-list");
                }
                parsed
            })
            .collect::<Vec<_>>();
        Self::new(allowed_roles, config)
    }

    pub fn allowed_roles(&self) -> &[Role] {
        &self.allowed_roles
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn set_allowed_roles(&mut self, allowed_roles: impl IntoIterator<Item = Role>) {
        self.allowed_roles = allowed_roles.into_iter().collect();
    }

    pub fn evaluate(&self, session: &Session) -> GuardOutcome {
        let names = self
            .allowed_roles
            .iter()
            .map(Role::as_str)
            .collect::<Vec<_>>();
        decide(session, &names, &self.config)
    }
}

// --- Mounted Region ---

/// GuardedRegion
///
/// A protected region that stays mounted while the session changes. It owns the
/// effectful half of the guard: each evaluation forwards redirects to the
/// navigator, but never issues the same redirect twice in a row. Any evaluation
/// that lands on `Authorized` or `Pending` re-arms it, so a later logout
/// redirects again.
pub struct GuardedRegion<P, N> {
    guard: RouteGuard,
    provider: P,
    navigator: N,
    last_redirect: Option<String>,
    state: GuardState,
}

impl<P, N> GuardedRegion<P, N>
where
    P: SessionProvider,
    N: Navigator,
{
    pub fn new(guard: RouteGuard, provider: P, navigator: N) -> Self {
        Self {
            guard,
            provider,
            navigator,
            last_redirect: None,
            state: GuardState::Unknown,
        }
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Re-evaluates against the provider's current session.
    pub fn evaluate(&mut self) -> GuardOutcome {
        let session = self.provider.get_session();
        self.apply(&session)
    }

    /// Changes the allow-list and re-evaluates immediately.
    pub fn set_allowed_roles(&mut self, allowed_roles: impl IntoIterator<Item = Role>) -> GuardOutcome {
        self.guard.set_allowed_roles(allowed_roles);
        self.evaluate()
    }

    /// run
    ///
    /// Evaluates once, then again on every session change, until the provider's
    /// change feed closes.
    pub async fn run(mut self) -> GuardState {
        let mut changes = self.provider.subscribe();
        loop {
            let session = changes.borrow_and_update().clone();
            self.apply(&session);
            if changes.changed().await.is_err() {
                break;
            }
        }
        self.state
    }

    /// run_until_unmounted
    ///
    /// Like `run`, but also stops when the `unmount` flag flips to `true`.
    pub async fn run_until_unmounted(mut self, mut unmount: watch::Receiver<bool>) -> GuardState {
        let mut changes = self.provider.subscribe();
        loop {
            let session = changes.borrow_and_update().clone();
            self.apply(&session);

            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = async { let _ = unmount.wait_for(|unmounted| *unmounted).await; } => break,
            }
        }
        self.state
    }

    fn apply(&mut self, session: &Session) -> GuardOutcome {
        let outcome = self.guard.evaluate(session);
        self.state = outcome.state;

        match &outcome.decision {
            GuardDecision::RedirectTo(path) => {
                if self.last_redirect.as_deref() != Some(path.as_str()) {
                    tracing::debug!(target_path = %path, state = ?outcome.state, "Guard redirect");
                    self.navigator.redirect(path);
                    self.last_redirect = Some(path.clone());
                }
            }
            GuardDecision::Authorized | GuardDecision::Pending => {
                self.last_redirect = None;
            }
        }

        outcome
    }
}
