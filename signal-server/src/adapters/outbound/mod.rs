pub mod bridge_gateway;
pub mod llm_client;
pub mod persistence;
pub mod telegram;

pub use bridge_gateway::HttpBridgeGateway;
pub use llm_client::OpenAiLlmClient;
pub use persistence::SqliteSettingsStore;
pub use telegram::TeloxideIngress;
