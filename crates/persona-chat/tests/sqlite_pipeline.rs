//! End-to-end turns through the orchestrator backed by the SQLite store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use persona_chat::{ChatOrchestrator, EchoGenerator, ResponseGenerator};
use persona_core::config::PersonaConfig;
use persona_core::types::{GenerationRequest, GenerationResult};
use persona_storage::{ConversationStore, Database, SqliteConversationStore};
use persona_vector::{EmbeddingProvider, MockEmbedding};

const DIMS: usize = 64;

struct PromptLog {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl ResponseGenerator for PromptLog {
    async fn generate(&self, request: GenerationRequest) -> GenerationResult {
        let reply = format!("reply #{}", self.prompts.lock().unwrap().len() + 1);
        self.prompts.lock().unwrap().push(request.prompt);
        GenerationResult::Text(reply)
    }
}

fn open_store(path: &std::path::Path) -> Arc<SqliteConversationStore> {
    let db = Arc::new(Database::new(path).unwrap());
    Arc::new(SqliteConversationStore::new(db, DIMS).unwrap())
}

fn build(
    store: &Arc<SqliteConversationStore>,
    generator: Arc<dyn ResponseGenerator>,
) -> ChatOrchestrator {
    ChatOrchestrator::new(
        Arc::new(MockEmbedding::new(DIMS)) as Arc<dyn EmbeddingProvider>,
        Arc::clone(store) as Arc<dyn ConversationStore>,
        generator,
        &PersonaConfig::default(),
    )
}

#[tokio::test]
async fn test_repeated_message_retrieves_earlier_turn() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir.path().join("persona.db"));
    let generator = Arc::new(PromptLog {
        prompts: Mutex::new(Vec::new()),
    });
    let orch = build(&store, Arc::clone(&generator) as Arc<dyn ResponseGenerator>);

    let first = orch.process_turn("want to get tacos later?").await.unwrap();
    assert_eq!(first.context_turns, 0);
    assert!(first.embedded);

    let second = orch.process_turn("want to get tacos later?").await.unwrap();
    assert_eq!(second.context_turns, 1);
    assert!(second.degradations.is_empty());

    let prompts = generator.prompts.lock().unwrap().clone();
    assert!(prompts[0].starts_with("You are having a casual conversation."));
    assert!(prompts[1].contains("User: want to get tacos later?\nYou: reply #1"));
}

#[tokio::test]
async fn test_turns_survive_reopen_and_show_in_history() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("persona.db");

    {
        let store = open_store(&path);
        let orch = build(&store, Arc::new(EchoGenerator));
        assert_eq!(
            orch.process("see you at 6").await.unwrap(),
            "(offline) You said: see you at 6"
        );
        orch.process("bring snacks").await.unwrap();
    }

    let store = open_store(&path);
    assert_eq!(store.count().unwrap(), 2);

    let orch = build(&store, Arc::new(EchoGenerator));
    let history = orch.history(10).await.unwrap();
    let messages: Vec<&str> = history.iter().map(|t| t.user_message.as_str()).collect();
    assert_eq!(messages, vec!["bring snacks", "see you at 6"]);
    assert!(history.iter().all(|t| t.embedding.as_ref().map(Vec::len) == Some(DIMS)));
}

#[tokio::test]
async fn test_context_is_bounded_by_k() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir.path().join("persona.db"));
    let orch = build(&store, Arc::new(EchoGenerator));

    for i in 0..6 {
        orch.process(&format!("message number {}", i)).await.unwrap();
    }

    let outcome = orch.process_turn("message number 2").await.unwrap();
    assert_eq!(outcome.context_turns, 3);
    assert_eq!(store.count().unwrap(), 7);
}
