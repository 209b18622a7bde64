use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use voltdesk::chat::conversation::{Attachment, Conversation, FeedbackDialog, MessageId};
use voltdesk::chat::directory::SessionDirectory;
use voltdesk::chat::gateway::{CompletionGateway, CompletionRequest, GatewayError};
use voltdesk::chat::{ChatError, FALLBACK_REPLY, MISSING_QUESTION_PLACEHOLDER};
use voltdesk::db::connection::init_schema;
use voltdesk::db::service::DbService;
use voltdesk::db::DbPool;
use voltdesk::storage::{FileStore, StoreError, StoredFile};

fn test_pool() -> DbPool {
    let conn = duckdb::Connection::open_in_memory().unwrap();
    init_schema(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

/// Gateway double: replies with a fixed string, or fails when none is set.
/// Records every request it receives.
struct ScriptedGateway {
    reply: Option<String>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedGateway {
    fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            reply: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn last_request(&self) -> CompletionRequest {
        self.seen.lock().unwrap().last().unwrap().clone()
    }
}

#[async_trait]
impl CompletionGateway for ScriptedGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
        self.seen.lock().unwrap().push(request);
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(GatewayError::Upstream("scripted failure".to_string())),
        }
    }
}

/// File store double: fabricates URLs in memory, or fails on demand.
struct MemStore {
    fail: bool,
}

#[async_trait]
impl FileStore for MemStore {
    async fn store(
        &self,
        user_id: Uuid,
        original_name: &str,
        _bytes: &[u8],
    ) -> Result<StoredFile, StoreError> {
        if self.fail {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "mem store down",
            )));
        }
        Ok(StoredFile {
            url: format!("mem://{}/{}", user_id, original_name),
            file_name: original_name.to_string(),
        })
    }
}

fn new_session(pool: &DbPool, user: Uuid) -> Uuid {
    let conn = pool.lock().unwrap();
    DbService::insert_session(&conn, user, "Test Chat").unwrap().id
}

#[tokio::test]
async fn empty_send_is_a_no_op() {
    let pool = test_pool();
    let user = Uuid::new_v4();
    let session = new_session(&pool, user);

    let gateway = ScriptedGateway::replying("should not be called");
    let store = MemStore { fail: false };

    let mut conversation = Conversation::open(pool.clone(), user, session).unwrap();
    let outcome = conversation
        .send_message(&store, &gateway, "   ", None)
        .await
        .unwrap();

    assert!(outcome.is_none());
    assert_eq!(conversation.entries().len(), 1); // just the greeting
    assert_eq!(gateway.calls(), 0);

    // Even a no-op send hides the suggestion panel for good
    assert!(!conversation.suggestions_visible());

    let conn = pool.lock().unwrap();
    assert!(DbService::get_messages(&conn, session).unwrap().is_empty());
}

#[tokio::test]
async fn empty_session_seeds_greeting_and_suggestions() {
    let pool = test_pool();
    let user = Uuid::new_v4();
    let session = new_session(&pool, user);

    let conversation = Conversation::open(pool.clone(), user, session).unwrap();

    assert!(conversation.suggestions_visible());
    assert_eq!(conversation.entries().len(), 1);
    let greeting = &conversation.entries()[0];
    assert!(!greeting.is_user);
    assert!(!greeting.id.is_persisted());
}

#[tokio::test]
async fn first_send_appends_user_and_assistant_pair() {
    let pool = test_pool();
    let user = Uuid::new_v4();
    let session = new_session(&pool, user);

    let gateway = ScriptedGateway::replying("Up to 40 miles on a full charge.");
    let store = MemStore { fail: false };

    let mut conversation = Conversation::open(pool.clone(), user, session).unwrap();
    let outcome = conversation
        .send_message(&store, &gateway, "What's the range?", None)
        .await
        .unwrap()
        .unwrap();

    assert!(!conversation.suggestions_visible());
    assert!(outcome.gateway_error.is_none());
    assert_eq!(outcome.reply, "Up to 40 miles on a full charge.");

    // Greeting plus exactly one user and one assistant entry
    assert_eq!(conversation.entries().len(), 3);
    let user_entry = &conversation.entries()[1];
    let reply_entry = &conversation.entries()[2];
    assert!(user_entry.is_user);
    assert_eq!(user_entry.content, "What's the range?");
    assert!(!reply_entry.is_user);

    // Both sides were reconciled with their persisted rows
    assert!(user_entry.id.is_persisted());
    assert!(reply_entry.id.is_persisted());

    let conn = pool.lock().unwrap();
    let rows = DbService::get_messages(&conn, session).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].is_user);
    assert!(!rows[1].is_user);
}

#[tokio::test]
async fn gateway_failure_substitutes_fallback_reply() {
    let pool = test_pool();
    let user = Uuid::new_v4();
    let session = new_session(&pool, user);

    let gateway = ScriptedGateway::failing();
    let store = MemStore { fail: false };

    let mut conversation = Conversation::open(pool.clone(), user, session).unwrap();
    let outcome = conversation
        .send_message(&store, &gateway, "hello", None)
        .await
        .unwrap()
        .unwrap();

    assert!(outcome.gateway_error.is_some());
    assert_eq!(outcome.reply, FALLBACK_REPLY);

    let last = conversation.entries().last().unwrap();
    assert!(!last.is_user);
    assert_eq!(last.content, FALLBACK_REPLY);

    // The user's message is still present and unaltered
    let user_entry = &conversation.entries()[conversation.entries().len() - 2];
    assert!(user_entry.is_user);
    assert_eq!(user_entry.content, "hello");

    // The fallback is persisted like any other assistant message
    let conn = pool.lock().unwrap();
    let rows = DbService::get_messages(&conn, session).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].content, FALLBACK_REPLY);
}

#[tokio::test]
async fn upload_failure_aborts_the_whole_send() {
    let pool = test_pool();
    let user = Uuid::new_v4();
    let session = new_session(&pool, user);

    let gateway = ScriptedGateway::replying("unreached");
    let store = MemStore { fail: true };

    let mut conversation = Conversation::open(pool.clone(), user, session).unwrap();
    let err = conversation
        .send_message(
            &store,
            &gateway,
            "see attached",
            Some(Attachment {
                file_name: "photo.jpg".to_string(),
                bytes: vec![1, 2, 3],
            }),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::UploadFailed));
    assert_eq!(conversation.entries().len(), 1); // greeting only
    assert_eq!(gateway.calls(), 0);

    // The attempt still hid the suggestion panel
    assert!(!conversation.suggestions_visible());

    let conn = pool.lock().unwrap();
    assert!(DbService::get_messages(&conn, session).unwrap().is_empty());
}

#[tokio::test]
async fn attachment_only_send_uses_synthetic_prompt() {
    let pool = test_pool();
    let user = Uuid::new_v4();
    let session = new_session(&pool, user);

    let gateway = ScriptedGateway::replying("Happy to take a look.");
    let store = MemStore { fail: false };

    let mut conversation = Conversation::open(pool.clone(), user, session).unwrap();
    conversation
        .send_message(
            &store,
            &gateway,
            "",
            Some(Attachment {
                file_name: "manual.pdf".to_string(),
                bytes: vec![0; 16],
            }),
        )
        .await
        .unwrap()
        .unwrap();

    let request = gateway.last_request();
    assert!(request.has_file);
    assert_eq!(request.file_name.as_deref(), Some("manual.pdf"));
    assert!(request.message.contains("manual.pdf"));

    let user_entry = &conversation.entries()[1];
    assert_eq!(user_entry.file_url.as_deref(), Some(&*format!("mem://{}/manual.pdf", user)));
    assert_eq!(user_entry.file_name.as_deref(), Some("manual.pdf"));
}

#[tokio::test]
async fn suggestions_are_gone_after_any_send() {
    let pool = test_pool();
    let user = Uuid::new_v4();
    let session = new_session(&pool, user);

    let gateway = ScriptedGateway::replying("Sure.");
    let store = MemStore { fail: false };

    let mut conversation = Conversation::open(pool.clone(), user, session).unwrap();
    conversation
        .select_suggestion(&store, &gateway, "How long does the battery last?")
        .await
        .unwrap()
        .unwrap();

    assert!(!conversation.suggestions_visible());

    // A second pick is rejected: the panel never comes back
    let err = conversation
        .select_suggestion(&store, &gateway, "What's covered under warranty?")
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Validation(_)));
}

#[tokio::test]
async fn reopened_session_hides_suggestions() {
    let pool = test_pool();
    let user = Uuid::new_v4();
    let session = new_session(&pool, user);

    let gateway = ScriptedGateway::replying("Sure.");
    let store = MemStore { fail: false };

    let mut conversation = Conversation::open(pool.clone(), user, session).unwrap();
    conversation
        .send_message(&store, &gateway, "hi", None)
        .await
        .unwrap();

    let reopened = Conversation::open(pool.clone(), user, session).unwrap();
    assert!(!reopened.suggestions_visible());
    assert_eq!(reopened.entries().len(), 2); // no greeting once real messages exist
}

#[tokio::test]
async fn open_rejects_foreign_and_missing_sessions() {
    let pool = test_pool();
    let owner = Uuid::new_v4();
    let session = new_session(&pool, owner);

    let err = Conversation::open(pool.clone(), Uuid::new_v4(), session).unwrap_err();
    assert!(matches!(err, ChatError::NotFound));

    let err = Conversation::open(pool.clone(), owner, Uuid::new_v4()).unwrap_err();
    assert!(matches!(err, ChatError::NotFound));
}

#[tokio::test]
async fn feedback_validation_and_capture() {
    let pool = test_pool();
    let user = Uuid::new_v4();
    let session = new_session(&pool, user);

    let gateway = ScriptedGateway::replying("It charges in about five hours.");
    let store = MemStore { fail: false };

    let mut conversation = Conversation::open(pool.clone(), user, session).unwrap();
    conversation
        .send_message(&store, &gateway, "How do I charge my scooter?", None)
        .await
        .unwrap();

    let target = conversation.entries().last().unwrap().id;
    conversation.open_feedback(target).unwrap();

    // Too short: rejected, dialog stays open
    let err = conversation.submit_feedback("ok").unwrap_err();
    assert!(matches!(err, ChatError::Validation(_)));
    assert!(matches!(conversation.feedback(), FeedbackDialog::Open { .. }));

    let record = conversation
        .submit_feedback("this is valid feedback")
        .unwrap();
    assert_eq!(record.status, "pending");
    assert_eq!(record.original_query, "How do I charge my scooter?");
    assert_eq!(record.chatbot_response, "It charges in about five hours.");
    assert_eq!(record.user_feedback, "this is valid feedback");
    assert_eq!(*conversation.feedback(), FeedbackDialog::Closed);

    let conn = pool.lock().unwrap();
    assert_eq!(DbService::list_feedback(&conn, user).unwrap().len(), 1);
}

#[tokio::test]
async fn feedback_on_greeting_uses_placeholder_question() {
    let pool = test_pool();
    let user = Uuid::new_v4();
    let session = new_session(&pool, user);

    let mut conversation = Conversation::open(pool.clone(), user, session).unwrap();
    let greeting = conversation.entries()[0].id;
    conversation.open_feedback(greeting).unwrap();

    match conversation.feedback() {
        FeedbackDialog::Open { question, .. } => {
            assert_eq!(question, MISSING_QUESTION_PLACEHOLDER)
        }
        other => panic!("expected open dialog, got {:?}", other),
    }
}

#[tokio::test]
async fn feedback_rejects_user_messages() {
    let pool = test_pool();
    let user = Uuid::new_v4();
    let session = new_session(&pool, user);

    let gateway = ScriptedGateway::replying("Sure.");
    let store = MemStore { fail: false };

    let mut conversation = Conversation::open(pool.clone(), user, session).unwrap();
    conversation
        .send_message(&store, &gateway, "hi", None)
        .await
        .unwrap();

    let user_id_entry = conversation
        .entries()
        .iter()
        .find(|e| e.is_user)
        .unwrap()
        .id;
    let err = conversation.open_feedback(user_id_entry).unwrap_err();
    assert!(matches!(err, ChatError::Validation(_)));
}

#[tokio::test]
async fn rename_session_enforces_title_bounds() {
    let pool = test_pool();
    let user = Uuid::new_v4();
    let session = new_session(&pool, user);

    let mut conversation = Conversation::open(pool.clone(), user, session).unwrap();

    assert!(matches!(
        conversation.rename_session("   "),
        Err(ChatError::Validation(_))
    ));
    assert!(matches!(
        conversation.rename_session(&"x".repeat(101)),
        Err(ChatError::Validation(_))
    ));
    assert_eq!(conversation.session().title, "Test Chat");

    conversation.rename_session("My Chat").unwrap();
    assert_eq!(conversation.session().title, "My Chat");

    let conn = pool.lock().unwrap();
    let stored = DbService::get_session(&conn, session).unwrap().unwrap();
    assert_eq!(stored.title, "My Chat");
}

#[tokio::test]
async fn directory_lists_only_sessions_with_user_messages() {
    let pool = test_pool();
    let user = Uuid::new_v4();

    // Greeting-only session: nothing persisted, must not be listed
    let empty = new_session(&pool, user);
    let _ = Conversation::open(pool.clone(), user, empty).unwrap();

    // Session whose only persisted message is assistant-authored
    let assistant_only = new_session(&pool, user);
    {
        let conn = pool.lock().unwrap();
        DbService::insert_message(&conn, assistant_only, false, "orphan reply", None, None).unwrap();
    }

    // Real conversation
    let real = new_session(&pool, user);
    let gateway = ScriptedGateway::replying("The Volt S2 and the Volt Pro.");
    let store = MemStore { fail: false };
    let mut conversation = Conversation::open(pool.clone(), user, real).unwrap();
    conversation
        .send_message(&store, &gateway, "Which models do you sell?", None)
        .await
        .unwrap();

    let directory = SessionDirectory::new(pool.clone(), user);
    let summaries = directory.list().unwrap();

    assert_eq!(summaries.len(), 1);
    let summary = &summaries[0];
    assert_eq!(summary.session.id, real);
    assert_eq!(summary.message_count, 2);
    // Preview is the most recent message's text
    assert_eq!(
        summary.last_message.as_deref(),
        Some("The Volt S2 and the Volt Pro.")
    );
}

#[tokio::test]
async fn directory_delete_cascades_and_checks_ownership() {
    let pool = test_pool();
    let user = Uuid::new_v4();
    let session = new_session(&pool, user);
    {
        let conn = pool.lock().unwrap();
        DbService::insert_message(&conn, session, true, "hello", None, None).unwrap();
    }

    let stranger = SessionDirectory::new(pool.clone(), Uuid::new_v4());
    assert!(matches!(
        stranger.delete(session),
        Err(ChatError::NotFound)
    ));

    let directory = SessionDirectory::new(pool.clone(), user);
    directory.delete(session).unwrap();

    let conn = pool.lock().unwrap();
    assert!(DbService::get_session(&conn, session).unwrap().is_none());
    assert!(DbService::get_messages(&conn, session).unwrap().is_empty());
}

#[tokio::test]
async fn transcript_order_is_stable_and_idempotent() {
    let pool = test_pool();
    let user = Uuid::new_v4();
    let session = new_session(&pool, user);

    let gateway = ScriptedGateway::replying("Noted.");
    let store = MemStore { fail: false };
    let mut conversation = Conversation::open(pool.clone(), user, session).unwrap();
    conversation
        .send_message(&store, &gateway, "first", None)
        .await
        .unwrap();
    conversation
        .send_message(&store, &gateway, "second", None)
        .await
        .unwrap();

    let conn = pool.lock().unwrap();
    let once = DbService::get_messages(&conn, session).unwrap();
    let twice = DbService::get_messages(&conn, session).unwrap();

    assert_eq!(once.len(), 4);
    for pair in once.windows(2) {
        assert!(pair[0].created_at <= pair[1].created_at);
    }

    // Fetching without sending anything returns the identical sequence
    assert_eq!(once.len(), twice.len());
    for (a, b) in once.iter().zip(twice.iter()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.content, b.content);
        assert_eq!(a.created_at, b.created_at);
    }
}
