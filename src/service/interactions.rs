//! Interaction service: prompt building and persistence for AI exchanges.
//!
//! Both operations require a COMPLETED extraction; queries replay a short
//! window of prior exchanges so the assistant has conversational memory.

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository;
use crate::models::enums::{InteractionType, ProcessingStatus};
use crate::models::{Document, ExtractionResult, Interaction};
use crate::pipeline::assistant::{AssistantClient, ChatTurn};

use super::ServiceError;

/// How many prior interactions are replayed as conversational memory.
const HISTORY_LIMIT: u32 = 5;

pub(crate) const ASSISTANT_SYSTEM_PROMPT: &str = "\
You are a document assistant. Answer using only the document text the user \
provides. Be concise and factual. If the document does not contain the \
answer, say so plainly.";

/// Ask for a general or context-directed explanation of the document.
/// Persists an EXPLANATION interaction whose prompt is the instruction sent.
pub fn explain(
    conn: &Connection,
    assistant: &dyn AssistantClient,
    document: &Document,
    context: Option<&str>,
) -> Result<Interaction, ServiceError> {
    let extraction = completed_extraction(conn, &document.id)?;
    let instruction = build_explanation_instruction(context);

    let turns = [ChatTurn::user(format!(
        "{instruction}\n\nDocument text:\n{}",
        extraction.extracted_text
    ))];
    let completion = assistant.complete(ASSISTANT_SYSTEM_PROMPT, &turns)?;

    let interaction = Interaction {
        id: Uuid::new_v4(),
        document_id: document.id,
        interaction_type: InteractionType::Explanation,
        prompt: instruction,
        response: completion.text,
        tokens_used: completion.tokens_used,
        model_id: Some(completion.model_id),
        created_at: repository::now(),
    };
    repository::insert_interaction(conn, &interaction)?;

    tracing::info!(
        document_id = %document.id,
        interaction_id = %interaction.id,
        "Explanation generated"
    );
    Ok(interaction)
}

/// Ask a free-form question about the document. Persists a QUERY interaction
/// whose prompt is the literal question.
pub fn query(
    conn: &Connection,
    assistant: &dyn AssistantClient,
    document: &Document,
    question: &str,
) -> Result<Interaction, ServiceError> {
    let extraction = completed_extraction(conn, &document.id)?;
    let history = repository::recent_interactions(conn, &document.id, HISTORY_LIMIT)?;
    let turns = build_query_turns(&history, &extraction.extracted_text, question);

    let completion = assistant.complete(ASSISTANT_SYSTEM_PROMPT, &turns)?;

    let interaction = Interaction {
        id: Uuid::new_v4(),
        document_id: document.id,
        interaction_type: InteractionType::Query,
        prompt: question.to_string(),
        response: completion.text,
        tokens_used: completion.tokens_used,
        model_id: Some(completion.model_id),
        created_at: repository::now(),
    };
    repository::insert_interaction(conn, &interaction)?;

    tracing::info!(
        document_id = %document.id,
        interaction_id = %interaction.id,
        history_turns = history.len(),
        "Query answered"
    );
    Ok(interaction)
}

fn completed_extraction(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<ExtractionResult, ServiceError> {
    repository::get_extraction_result(conn, document_id)?
        .filter(|r| r.status == ProcessingStatus::Completed)
        .ok_or(ServiceError::NotReady)
}

pub(crate) fn build_explanation_instruction(context: Option<&str>) -> String {
    match context {
        Some(context) => format!("Explain this document in the context of: {context}"),
        None => "Explain this document, highlighting key entities, dates, amounts, \
                 and the parties involved."
            .to_string(),
    }
}

/// Replay prior exchanges oldest-first as alternating user/assistant turns,
/// then append the new user turn carrying the document text and question.
/// `history` arrives newest-first from the repository.
pub(crate) fn build_query_turns(
    history: &[Interaction],
    extracted_text: &str,
    question: &str,
) -> Vec<ChatTurn> {
    let mut turns = Vec::with_capacity(history.len() * 2 + 1);
    for past in history.iter().rev() {
        turns.push(ChatTurn::user(past.prompt.clone()));
        turns.push(ChatTurn::assistant(past.response.clone()));
    }
    turns.push(ChatTurn::user(format!(
        "Document text:\n{extracted_text}\n\nQuestion: {question}"
    )));
    turns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::document::{insert_document, test_document};
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::ProcessingStatus;
    use crate::pipeline::assistant::{ChatRole, MockAssistant};

    fn completed_result(document_id: Uuid, text: &str) -> ExtractionResult {
        let ts = repository::now();
        ExtractionResult {
            id: Uuid::new_v4(),
            document_id,
            extracted_text: text.into(),
            summary: None,
            confidence: Some(95.0),
            processing_time_ms: Some(100),
            status: ProcessingStatus::Completed,
            error_message: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    fn setup_completed(conn: &Connection, text: &str) -> Document {
        let doc = test_document("user-1", "invoice.pdf");
        insert_document(conn, &doc).unwrap();
        repository::upsert_extraction_result(conn, &completed_result(doc.id, text)).unwrap();
        doc
    }

    #[test]
    fn explain_requires_completed_extraction() {
        let conn = open_memory_database().unwrap();
        let doc = test_document("user-1", "a.pdf");
        insert_document(&conn, &doc).unwrap();
        let assistant = MockAssistant::new("unused");

        // No extraction row at all
        let result = explain(&conn, &assistant, &doc, None);
        assert!(matches!(result, Err(ServiceError::NotReady)));

        // Non-terminal extraction row
        let mut processing = completed_result(doc.id, "");
        processing.status = ProcessingStatus::Processing;
        repository::upsert_extraction_result(&conn, &processing).unwrap();
        let result = explain(&conn, &assistant, &doc, None);
        assert!(matches!(result, Err(ServiceError::NotReady)));

        // And nothing was persisted
        assert_eq!(repository::count_interactions(&conn, &doc.id).unwrap(), 0);
    }

    #[test]
    fn explain_persists_explanation_with_instruction_prompt() {
        let conn = open_memory_database().unwrap();
        let doc = setup_completed(&conn, "Invoice #42, due 2026-09-01, total 99.00 EUR");
        let assistant = MockAssistant::new("This is an invoice over 99 euros.");

        let interaction = explain(&conn, &assistant, &doc, None).unwrap();
        assert_eq!(interaction.interaction_type, InteractionType::Explanation);
        assert!(interaction.prompt.contains("key entities"));
        assert_eq!(interaction.response, "This is an invoice over 99 euros.");
        assert_eq!(interaction.model_id.as_deref(), Some("mock-model"));

        let call = assistant.last_call().unwrap();
        assert_eq!(call.turns.len(), 1);
        assert!(call.turns[0].content.contains("Invoice #42"));

        assert_eq!(repository::count_interactions(&conn, &doc.id).unwrap(), 1);
    }

    #[test]
    fn explain_with_context_uses_directed_instruction() {
        let conn = open_memory_database().unwrap();
        let doc = setup_completed(&conn, "some text");
        let assistant = MockAssistant::new("ok");

        let interaction = explain(&conn, &assistant, &doc, Some("tax filing")).unwrap();
        assert!(interaction.prompt.contains("in the context of: tax filing"));
    }

    #[test]
    fn query_persists_literal_question_as_prompt() {
        let conn = open_memory_database().unwrap();
        let doc = setup_completed(&conn, "Receipt. Total: 42.00");
        let assistant = MockAssistant::new("The total is 42.00.");

        let interaction = query(&conn, &assistant, &doc, "What is the total?").unwrap();
        assert_eq!(interaction.interaction_type, InteractionType::Query);
        assert_eq!(interaction.prompt, "What is the total?");
        assert!(!interaction.response.is_empty());

        let call = assistant.last_call().unwrap();
        // No history: a single user turn carrying text + question
        assert_eq!(call.turns.len(), 1);
        assert!(call.turns[0].content.contains("Receipt. Total: 42.00"));
        assert!(call.turns[0].content.contains("What is the total?"));
    }

    #[test]
    fn query_replays_recent_history_oldest_first() {
        let conn = open_memory_database().unwrap();
        let doc = setup_completed(&conn, "document body");
        let assistant = MockAssistant::new("answer");

        for n in 0..7 {
            query(&conn, &assistant, &doc, &format!("question {n}")).unwrap();
        }

        query(&conn, &assistant, &doc, "final question").unwrap();
        let call = assistant.last_call().unwrap();

        // 5 replayed exchanges (10 turns) + the new user turn
        assert_eq!(call.turns.len(), 11);
        // Oldest replayed first: questions 2..=6
        assert_eq!(call.turns[0].content, "question 2");
        assert_eq!(call.turns[0].role, ChatRole::User);
        assert_eq!(call.turns[1].content, "answer");
        assert_eq!(call.turns[1].role, ChatRole::Assistant);
        assert_eq!(call.turns[8].content, "question 6");
        assert!(call.turns[10].content.contains("final question"));
        assert_eq!(call.turns[10].role, ChatRole::User);
    }

    #[test]
    fn assistant_failure_persists_nothing() {
        let conn = open_memory_database().unwrap();
        let doc = setup_completed(&conn, "text");
        let assistant = MockAssistant::failing("model on fire");

        let result = query(&conn, &assistant, &doc, "anything?");
        assert!(matches!(result, Err(ServiceError::Assistant(_))));
        assert_eq!(repository::count_interactions(&conn, &doc.id).unwrap(), 0);
    }
}
