use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use painel_core::{CoreError, SessionScope};
use tokio::sync::broadcast;
use tracing::{info, warn};

const AUTH_EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    LoginRequired {
        scope: SessionScope,
        login_route: &'static str,
    },
}

#[derive(Debug)]
pub struct Session {
    tokens: RwLock<BTreeMap<SessionScope, String>>,
    protected: BTreeSet<SessionScope>,
    store_path: Option<PathBuf>,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new([SessionScope::Rondas])
    }
}

impl Session {
    pub fn new(protected: impl IntoIterator<Item = SessionScope>) -> Self {
        let (events, _receiver) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            tokens: RwLock::new(BTreeMap::new()),
            protected: protected.into_iter().collect(),
            store_path: None,
            events,
        }
    }

    pub fn load_from(
        path: impl Into<PathBuf>,
        protected: impl IntoIterator<Item = SessionScope>,
    ) -> Result<Self, CoreError> {
        let path = path.into();
        let mut session = Self::new(protected);
        let tokens = read_token_store(&path)?;
        *session
            .tokens
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = tokens;
        session.store_path = Some(path);
        Ok(session)
    }

    pub fn token(&self, scope: SessionScope) -> Option<String> {
        self.tokens
            .read()
            .expect("session token read lock")
            .get(&scope)
            .cloned()
    }

    pub fn is_authenticated(&self, scope: SessionScope) -> bool {
        self.token(scope).is_some()
    }

    pub fn is_protected(&self, scope: SessionScope) -> bool {
        self.protected.contains(&scope)
    }

    pub fn set_token(&self, scope: SessionScope, token: impl Into<String>) -> Result<(), CoreError> {
        let token = token.into();
        let token = token.trim();
        if token.is_empty() {
            return Err(CoreError::Configuration(format!(
                "refusing to store an empty {scope} session token"
            )));
        }

        self.tokens
            .write()
            .expect("session token write lock")
            .insert(scope, token.to_owned());
        self.persist()
    }

    pub fn clear(&self, scope: SessionScope) -> Result<(), CoreError> {
        let removed = self
            .tokens
            .write()
            .expect("session token write lock")
            .remove(&scope);
        if removed.is_some() {
            self.persist()?;
        }
        Ok(())
    }

    pub fn invalidate(&self, scope: SessionScope) {
        if let Err(error) = self.clear(scope) {
            warn!(scope = %scope, error = %error, "failed to persist session invalidation");
        }
        info!(scope = %scope, login_route = scope.login_route(), "session invalidated; login required");
        let _ = self.events.send(AuthEvent::LoginRequired {
            scope,
            login_route: scope.login_route(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    fn persist(&self) -> Result<(), CoreError> {
        let Some(path) = self.store_path.as_deref() else {
            return Ok(());
        };

        let snapshot = self
            .tokens
            .read()
            .expect("session token read lock")
            .iter()
            .map(|(scope, token)| (scope.as_key().to_owned(), token.clone()))
            .collect::<BTreeMap<_, _>>();
        write_token_store(path, &snapshot)
    }
}

fn read_token_store(path: &Path) -> Result<BTreeMap<SessionScope, String>, CoreError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(error) => {
            return Err(CoreError::Configuration(format!(
                "failed to read session store '{}': {error}",
                path.display()
            )))
        }
    };

    let stored: BTreeMap<String, String> = serde_json::from_str(&raw).map_err(|error| {
        CoreError::Configuration(format!(
            "failed to parse session store '{}': {error}",
            path.display()
        ))
    })?;

    let mut tokens = BTreeMap::new();
    for (raw_scope, token) in stored {
        match SessionScope::from_key(&raw_scope) {
            Some(scope) if !token.trim().is_empty() => {
                tokens.insert(scope, token.trim().to_owned());
            }
            Some(_) => {}
            None => warn!(scope = %raw_scope, "ignoring unknown scope in session store"),
        }
    }
    Ok(tokens)
}

fn write_token_store(path: &Path, tokens: &BTreeMap<String, String>) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|error| {
                CoreError::Configuration(format!(
                    "failed to create session store directory '{}': {error}",
                    parent.display()
                ))
            })?;
        }
    }

    let rendered = serde_json::to_string_pretty(tokens).map_err(|error| {
        CoreError::Configuration(format!("failed to serialize session store: {error}"))
    })?;
    std::fs::write(path, rendered.as_bytes()).map_err(|error| {
        CoreError::Configuration(format!(
            "failed to write session store '{}': {error}",
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_store_path(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir()
            .join(format!("painel-session-{prefix}-{nanos}-{}", std::process::id()))
            .join("session.json")
    }

    #[test]
    fn scopes_hold_independent_tokens() {
        let session = Session::default();
        session.set_token(SessionScope::Main, "main-token").expect("set main");
        session
            .set_token(SessionScope::Rondas, " rondas-token ")
            .expect("set rondas");

        assert_eq!(session.token(SessionScope::Main).as_deref(), Some("main-token"));
        assert_eq!(session.token(SessionScope::Rondas).as_deref(), Some("rondas-token"));

        session.clear(SessionScope::Rondas).expect("clear rondas");
        assert!(session.is_authenticated(SessionScope::Main));
        assert!(!session.is_authenticated(SessionScope::Rondas));
    }

    #[test]
    fn empty_tokens_are_rejected() {
        let session = Session::default();
        let error = session
            .set_token(SessionScope::Main, "   ")
            .expect_err("empty token should fail");
        assert!(matches!(error, CoreError::Configuration(_)));
    }

    #[tokio::test]
    async fn invalidate_clears_token_and_requests_login() {
        let session = Session::default();
        let mut events = session.subscribe();
        session.set_token(SessionScope::Rondas, "expired").expect("set token");

        session.invalidate(SessionScope::Rondas);

        assert!(session.token(SessionScope::Rondas).is_none());
        let event = events.recv().await.expect("auth event");
        assert_eq!(
            event,
            AuthEvent::LoginRequired {
                scope: SessionScope::Rondas,
                login_route: "/rondas/login",
            }
        );
    }

    #[test]
    fn tokens_persist_across_loads() {
        let path = unique_store_path("persist");
        {
            let session =
                Session::load_from(&path, [SessionScope::Rondas]).expect("load empty store");
            assert!(session.token(SessionScope::Main).is_none());
            session.set_token(SessionScope::Main, "persisted").expect("set token");
        }

        let reloaded = Session::load_from(&path, [SessionScope::Rondas]).expect("reload store");
        assert_eq!(reloaded.token(SessionScope::Main).as_deref(), Some("persisted"));
        assert!(reloaded.is_protected(SessionScope::Rondas));
        assert!(!reloaded.is_protected(SessionScope::Main));

        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }
}
