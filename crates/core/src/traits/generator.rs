//! Answer generation contract

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::message::Message;

/// Streams answer text from a large language model.
///
/// Fragments are pushed into `tx` in token order. A closed receiver means
/// the consumer cancelled; implementations stop sending and return `Ok`.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate_stream(
        &self,
        model: &str,
        messages: &[Message],
        tx: mpsc::Sender<String>,
    ) -> Result<()>;
}
