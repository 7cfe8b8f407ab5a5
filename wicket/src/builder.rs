//! Builder for [`Wicket`] instances
//!
//! Storage selection is tracked in the type: `build` only exists once a
//! store has been attached, so a half-configured instance cannot be
//! constructed.

use std::sync::Arc;

use wicket_core::{CredentialStore, Error, Notifier};

use crate::{Config, TracingNotifier, Wicket};

#[cfg(feature = "sqlite")]
use wicket_storage_sqlite::{SqlitePool, SqliteStore};

/// Marker: no store attached yet.
pub struct NoStore;

/// Marker: a store has been attached.
pub struct WithStore<S: CredentialStore>(Arc<S>);

pub struct WicketBuilder<State = NoStore> {
    config: Config,
    notifier: Option<Arc<dyn Notifier>>,
    state: State,
}

impl WicketBuilder<NoStore> {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            notifier: None,
            state: NoStore,
        }
    }

    /// Build a configuration from `WICKET_`-prefixed environment
    /// variables.
    pub fn from_env() -> Result<Self, Error> {
        Ok(Self::new(Config::from_env()?))
    }

    /// Attach an already-constructed store.
    pub fn with_store<S: CredentialStore>(self, store: Arc<S>) -> WicketBuilder<WithStore<S>> {
        WicketBuilder {
            config: self.config,
            notifier: self.notifier,
            state: WithStore(store),
        }
    }

    /// Connect a SQLite store at the given URL.
    #[cfg(feature = "sqlite")]
    pub async fn with_sqlite(self, url: &str) -> Result<WicketBuilder<WithStore<SqliteStore>>, Error> {
        let store = SqliteStore::connect(url).await?;
        Ok(self.with_store(Arc::new(store)))
    }

    /// Wrap an existing SQLite pool.
    #[cfg(feature = "sqlite")]
    pub fn with_sqlite_pool(self, pool: SqlitePool) -> WicketBuilder<WithStore<SqliteStore>> {
        self.with_store(Arc::new(SqliteStore::new(pool)))
    }
}

impl<State> WicketBuilder<State> {
    /// Replace the default logging notifier with a real transport.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }
}

impl<S: CredentialStore> WicketBuilder<WithStore<S>> {
    pub fn build(self) -> Wicket<S> {
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(TracingNotifier::new(self.config.mail_from.clone())));
        Wicket::new(self.state.0, notifier, &self.config)
    }
}
