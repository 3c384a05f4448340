pub mod context;
pub mod realtime;

// Re-export commonly used types for convenience
pub use realtime::{
    ClientFrame, ControlSignal, GeminiLiveConnector, LiveSessionConfig, RealtimeError,
    RealtimeResult, ResponseModality, ServerEvent, UpstreamConnector, UpstreamOptions,
    UpstreamProvider, UpstreamSession, create_upstream_connector,
    get_supported_upstream_providers,
};

pub use context::{
    ContextError, InventoryApiContextProvider, ShopContextProvider, StaticContextProvider,
    create_context_provider, resolve_context,
};
