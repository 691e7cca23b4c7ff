//! External collaborator traits — classification, generation, delivery.
//!
//! These are consumed boundaries: the real implementations (LLM/keyword
//! classifier, response model, chat surface) live in the surrounding
//! application. Tests use fakes.

use async_trait::async_trait;

use crate::error::ExternalError;
use crate::review::model::RiskVerdict;

/// Context handed to the classifier alongside the message text.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    /// Recent turns, oldest first ("user: ..." / "assistant: ...").
    pub recent_turns: Vec<String>,
    /// The AI entity persona in play, if relevant to classification.
    pub ai_entity_id: Option<String>,
}

/// Classifies the risk of an inbound user message.
#[async_trait]
pub trait RiskClassifier: Send + Sync {
    async fn classify(
        &self,
        message: &str,
        context: &ConversationContext,
    ) -> Result<RiskVerdict, ExternalError>;
}

/// Produces a candidate reply for a message given its verdict.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(
        &self,
        message: &str,
        verdict: &RiskVerdict,
    ) -> Result<String, ExternalError>;
}

/// The single place a final reply is handed back to the chat surface.
/// Invoked exactly once per resolved message.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    async fn deliver(
        &self,
        user_id: &str,
        ai_entity_id: &str,
        reply: &str,
    ) -> Result<(), ExternalError>;
}
