//! Prompt assembly for the generation stage
//!
//! Message order: system prompt (optionally extended with formatting
//! instructions), prior chat turns, then the current user turn built from
//! the corrected transcript and the retrieved documents.

use answerflow_core::{ChatTurn, KmSearchResult, Message};

/// Builds the message list for one generation call
#[derive(Debug, Default)]
pub struct PromptBuilder {
    system_prompt: String,
    format_prompt: Option<String>,
    history: Vec<Message>,
    question: String,
    documents: Vec<(String, String)>,
}

impl PromptBuilder {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            ..Default::default()
        }
    }

    /// Append formatting instructions to the system prompt.
    pub fn with_format_prompt(mut self, format_prompt: impl Into<String>) -> Self {
        self.format_prompt = Some(format_prompt.into());
        self
    }

    pub fn with_history(mut self, history: &[ChatTurn]) -> Self {
        self.history = history.iter().map(Message::from).collect();
        self
    }

    /// The corrected transcript this turn answers.
    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = question.into();
        self
    }

    pub fn with_documents(mut self, result: &KmSearchResult) -> Self {
        self.documents = result
            .data
            .iter()
            .map(|hit| {
                let id = if hit.document.public_id.is_empty() {
                    hit.document.id.clone()
                } else {
                    hit.document.public_id.clone()
                };
                (id, hit.document.content.clone())
            })
            .collect();
        self
    }

    pub fn build(self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);

        let system = match &self.format_prompt {
            Some(format_prompt) => format!("{}\n\n{}", self.system_prompt, format_prompt),
            None => self.system_prompt.clone(),
        };
        messages.push(Message::system(system));
        messages.extend(self.history.iter().cloned());
        messages.push(Message::user(self.render_user_turn()));
        messages
    }

    fn render_user_turn(&self) -> String {
        let mut turn = format!("Question: {}\n\n", self.question);

        if self.documents.is_empty() {
            turn.push_str("No supporting documents were retrieved.");
        } else {
            turn.push_str("Supporting documents:\n");
            for (id, content) in &self.documents {
                turn.push_str(&format!("[doc {}]\n{}\n\n", id, content));
            }
            // Drop the trailing blank line from the last document block
            while turn.ends_with('\n') {
                turn.pop();
            }
        }

        turn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use answerflow_core::{ChatRole, KmDocument, KmHit, Role};

    fn km_result() -> KmSearchResult {
        KmSearchResult {
            data: vec![KmHit {
                document_id: "d1".into(),
                document: KmDocument {
                    id: "d1".into(),
                    metadata: serde_json::Value::Null,
                    public_id: "pub-1".into(),
                    sample_questions: vec![],
                    content: "Pay online.".into(),
                },
                reranker_score: None,
                score: 0.8,
            }],
            total: 1,
        }
    }

    #[test]
    fn test_message_order() {
        let history = vec![
            ChatTurn {
                role: ChatRole::User,
                content: "earlier question".into(),
            },
            ChatTurn {
                role: ChatRole::Assistant,
                content: "earlier answer".into(),
            },
        ];

        let messages = PromptBuilder::new("Be helpful.")
            .with_history(&history)
            .with_question("How do I pay?")
            .with_documents(&km_result())
            .build();

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "earlier question");
        assert_eq!(messages[2].role, Role::Assistant);
        assert!(messages[3].content.contains("Question: How do I pay?"));
        assert!(messages[3].content.contains("[doc pub-1]"));
    }

    #[test]
    fn test_format_prompt_extends_system() {
        let messages = PromptBuilder::new("Be helpful.")
            .with_format_prompt("Answer in two sections.")
            .with_question("hi")
            .build();
        assert!(messages[0].content.starts_with("Be helpful."));
        assert!(messages[0].content.ends_with("Answer in two sections."));
    }

    #[test]
    fn test_no_documents_still_renders_turn() {
        let messages = PromptBuilder::new("Be helpful.")
            .with_question("hi")
            .build();
        // System + user only when there is no history
        assert_eq!(messages.len(), 2);
        assert!(messages[1]
            .content
            .contains("No supporting documents were retrieved."));
    }
}
