//! Conversational core for Tanya.
//!
//! Windows stored history, composes the model request, calls the LLM
//! gateway, classifies the reply and dispatches chart directives before
//! persisting the bot turn.

pub mod directive;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod history;
pub mod locks;
pub mod orchestrator;
pub mod prompt;
pub mod response;

pub use directive::{parse_reply, AssistantReply, ChartDirective};
pub use dispatcher::{BotTurn, ToolCallDispatcher};
pub use error::ChatError;
pub use gateway::{GatewayError, GeminiGateway, GenerateRequest, LlmGateway, ModelInfo};
pub use history::{HistoryTurn, HistoryWindower, Role};
pub use locks::ConversationLocks;
pub use orchestrator::ChatOrchestrator;
pub use prompt::PromptComposer;
pub use response::{ChatReply, ResponseWriter};
