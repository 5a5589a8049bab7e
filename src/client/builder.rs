use std::sync::Arc;

use tracing::debug;

use super::BaseClient;
use super::ClientContext;
use super::NamespaceClient;
use super::UsualClient;
use crate::AuthEntry;
use crate::ClientSettings;
use crate::Coordinator;
use crate::DefaultStrategyFactory;
use crate::DelayRetryPolicy;
use crate::Result;
use crate::StrategyFactory;
use crate::StrategyType;

pub struct ClientBuilder {
    settings: ClientSettings,
    factory: Arc<dyn StrategyFactory>,
}

impl ClientBuilder {
    /// Starts from already loaded settings
    pub fn new(settings: ClientSettings) -> Self {
        Self {
            settings,
            factory: Arc::new(DefaultStrategyFactory),
        }
    }

    /// Starts from defaults, `CONFIG_PATH` and `COORD__*` environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ClientSettings::new()?))
    }

    /// Set the namespace root (default: `/coord`)
    pub fn root_path(
        mut self,
        root_path: impl Into<String>,
    ) -> Self {
        self.settings.client.root_path = root_path.into();
        self
    }

    /// Set the strategy selected on build (default: `USUAL`)
    pub fn strategy(
        mut self,
        kind: StrategyType,
    ) -> Self {
        self.settings.client.strategy = kind;
        self
    }

    pub fn retry_policy(
        mut self,
        policy: DelayRetryPolicy,
    ) -> Self {
        self.settings.retry = policy;
        self
    }

    /// Adds an authority registered with the connection on build
    pub fn auth(
        mut self,
        scheme: impl Into<String>,
        auth: impl Into<String>,
    ) -> Self {
        self.settings.client.auths.push(AuthEntry::new(scheme, auth));
        self
    }

    /// Replaces the factory strategies are built with
    pub fn strategy_factory(
        mut self,
        factory: Arc<dyn StrategyFactory>,
    ) -> Self {
        self.factory = factory;
        self
    }

    /// Validates the settings, registers authorities and activates the
    /// configured strategy.
    pub async fn build(
        self,
        coordinator: Arc<dyn Coordinator>,
    ) -> Result<UsualClient> {
        let settings = self.settings.validate()?;
        debug!(?settings, "building client");
        let kind = settings.client.strategy;

        let ctx = Arc::new(ClientContext::new(settings, coordinator));
        let base = Arc::new(NamespaceClient::new(ctx));
        base.start().await?;

        let client = UsualClient::new(base, self.factory);
        client.select_strategy(kind);
        Ok(client)
    }
}
