//! Runtime wiring: providers, tools, storage, hub and chat service.

use std::sync::Arc;

use pchat::{ChatLoopHooks, ChatService, ConversationStore, NoopChatLoopHooks, ToolExecutionLoop};
use phub::{Dispatcher, HubError, HubServer, NotificationHub};
use pmemory::create_conversation_store;
use pobserve::{MetricsObservabilityHooks, PanicGuard, TracingObservabilityHooks};
use pprovider::{ModelGateway, NoopOperationHooks, ProviderOperationHooks, ProviderRegistry};
use ptooling::{NoopToolRuntimeHooks, ToolExecutor, ToolRegistry, ToolRuntimeHooks};
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, EngineConfig, HookSet};
use crate::providers::build_provider_registry;

#[derive(Clone)]
pub struct RuntimeBundle {
    pub config: EngineConfig,
    pub store: Arc<dyn ConversationStore>,
    pub hub: Arc<NotificationHub>,
    pub chat: Arc<ChatService>,
}

impl RuntimeBundle {
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(Arc::clone(&self.chat), Arc::clone(&self.hub))
    }
}

impl std::fmt::Debug for RuntimeBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeBundle")
            .field("config", &self.config)
            .field("clients", &self.hub.client_count())
            .finish_non_exhaustive()
    }
}

/// Builds providers from `config.providers` and registers the built-in tools.
pub fn build_runtime(config: EngineConfig) -> Result<RuntimeBundle, ConfigError> {
    config.validate()?;
    let providers = build_provider_registry(&config.providers)?;
    build_runtime_with(config, providers, ToolRegistry::with_builtins())
}

pub fn build_runtime_with(
    config: EngineConfig,
    providers: ProviderRegistry,
    tools: ToolRegistry,
) -> Result<RuntimeBundle, ConfigError> {
    config.validate()?;
    for model in &config.models {
        if !providers.contains(model.provider) {
            return Err(ConfigError::invalid(format!(
                "model '{}' needs provider '{}', which is not registered",
                model.name, model.provider
            )));
        }
    }

    let store = create_conversation_store(config.storage.store_config())?;
    let hub = Arc::new(NotificationHub::new());
    let hooks = HookBundle::for_set(config.observability.hooks);

    let gateway = ModelGateway::new(Arc::new(providers))
        .with_retry_policy(config.retry.policy())
        .with_hooks(hooks.provider);
    let executor = ToolExecutor::new(Arc::new(tools)).with_hooks(hooks.tool);

    let tool_loop = ToolExecutionLoop::new(gateway, executor, Arc::clone(&store))
        .with_notifier(hub.clone())
        .with_status_reporter(hub.clone())
        .with_hooks(hooks.chat)
        .with_catalog(Arc::new(config.catalog()))
        .with_policy(config.chat.policy());
    let chat = Arc::new(ChatService::new(tool_loop));

    tracing::info!(
        phase = "runtime",
        event = "built",
        models = config.models.len(),
        hooks = ?config.observability.hooks
    );
    Ok(RuntimeBundle {
        config,
        store,
        hub,
        chat,
    })
}

/// Serves websocket clients on `config.server.bind_address` until the process stops.
pub async fn serve(bundle: &RuntimeBundle) -> Result<(), HubError> {
    serve_until(bundle, CancellationToken::new()).await
}

pub async fn serve_until(
    bundle: &RuntimeBundle,
    shutdown: CancellationToken,
) -> Result<(), HubError> {
    let server = HubServer::bind(&bundle.config.server.bind_address, bundle.dispatcher()).await?;
    server.serve_until(shutdown).await
}

struct HookBundle {
    provider: Arc<dyn ProviderOperationHooks>,
    tool: Arc<dyn ToolRuntimeHooks>,
    chat: Arc<dyn ChatLoopHooks>,
}

impl HookBundle {
    fn guarded<H>(hooks: H) -> Self
    where
        H: ProviderOperationHooks + ToolRuntimeHooks + ChatLoopHooks + 'static,
    {
        let shared = Arc::new(PanicGuard::new(hooks));
        Self {
            provider: shared.clone(),
            tool: shared.clone(),
            chat: shared,
        }
    }

    fn for_set(set: HookSet) -> Self {
        match set {
            HookSet::Tracing => Self::guarded(TracingObservabilityHooks),
            HookSet::Metrics => Self::guarded(MetricsObservabilityHooks),
            HookSet::Disabled => Self {
                provider: Arc::new(NoopOperationHooks),
                tool: Arc::new(NoopToolRuntimeHooks),
                chat: Arc::new(NoopChatLoopHooks),
            },
        }
    }
}
