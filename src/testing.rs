//! In-memory collaborators for unit tests.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::auth::repo_types::User;
use crate::completion::provider::{CompletionProvider, ProviderError};
use crate::conversations::repo_types::{Conversation, ConversationSummaryRow, Message, Role};
use crate::storage::{ChatStore, ChatTx, StoreError, StoreResult};

#[derive(Debug, Default, Clone)]
pub struct Tables {
    pub users: Vec<User>,
    pub conversations: Vec<Conversation>,
    pub messages: Vec<Message>,
}

impl Tables {
    pub fn messages_of(&self, conversation_id: &str) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .collect()
    }
}

/// Something a test collaborator observed, in the order it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    InsertConversation,
    InsertMessage(Role),
    TouchConversation,
    Commit,
    Complete,
}

/// Ordered log shared between a [`MemoryStore`] and a [`ScriptedProvider`].
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Event>>>);

impl Journal {
    fn record(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }
}

/// Each transaction works on a private copy of the tables; commit publishes
/// the copy, dropping it discards every staged write.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_commit: Arc<AtomicBool>,
    journal: Journal,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Tables {
        self.tables.lock().unwrap().clone()
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn fail_next_commit(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }

    pub fn seed_user(&self, id: &str, username: &str) -> User {
        let user = User {
            id: id.into(),
            username: username.into(),
            email: format!("{username}@example.com"),
            password_hash: "not-a-real-hash".into(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.tables.lock().unwrap().users.push(user.clone());
        user
    }

    pub fn seed_conversation(
        &self,
        id: &str,
        user_id: &str,
        title: &str,
        updated_at: OffsetDateTime,
    ) -> Conversation {
        let conversation = Conversation {
            id: id.into(),
            user_id: user_id.into(),
            title: title.into(),
            created_at: updated_at,
            updated_at,
        };
        self.tables
            .lock()
            .unwrap()
            .conversations
            .push(conversation.clone());
        conversation
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn ChatTx>> {
        let work = self.tables.lock().unwrap().clone();
        Ok(Box::new(MemoryTx {
            shared: self.tables.clone(),
            fail_commit: self.fail_commit.clone(),
            journal: self.journal.clone(),
            work,
        }))
    }
}

struct MemoryTx {
    shared: Arc<Mutex<Tables>>,
    fail_commit: Arc<AtomicBool>,
    journal: Journal,
    work: Tables,
}

#[async_trait]
impl ChatTx for MemoryTx {
    async fn find_user(&mut self, user_id: &str) -> StoreResult<Option<User>> {
        Ok(self.work.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.work.users.iter().find(|u| u.email == email).cloned())
    }

    async fn user_id_exists(&mut self, user_id: &str) -> StoreResult<bool> {
        Ok(self.work.users.iter().any(|u| u.id == user_id))
    }

    async fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        for u in &self.work.users {
            if u.id == user.id {
                return Err(StoreError::Duplicate("id"));
            }
            if u.email == user.email {
                return Err(StoreError::Duplicate("email"));
            }
            if u.username == user.username {
                return Err(StoreError::Duplicate("username"));
            }
        }
        self.work.users.push(user.clone());
        Ok(())
    }

    async fn find_conversation(
        &mut self,
        conversation_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<Conversation>> {
        Ok(self
            .work
            .conversations
            .iter()
            .find(|c| c.id == conversation_id && c.user_id == user_id)
            .cloned())
    }

    async fn insert_conversation(&mut self, conversation: &Conversation) -> StoreResult<()> {
        if !self.work.users.iter().any(|u| u.id == conversation.user_id) {
            return Err(StoreError::Backend("conversation owner does not exist".into()));
        }
        self.journal.record(Event::InsertConversation);
        self.work.conversations.push(conversation.clone());
        Ok(())
    }

    async fn touch_conversation(
        &mut self,
        conversation_id: &str,
        at: OffsetDateTime,
    ) -> StoreResult<()> {
        self.journal.record(Event::TouchConversation);
        if let Some(c) = self
            .work
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
        {
            c.updated_at = c.updated_at.max(at);
        }
        Ok(())
    }

    async fn list_conversations(
        &mut self,
        user_id: &str,
    ) -> StoreResult<Vec<ConversationSummaryRow>> {
        let mut rows: Vec<ConversationSummaryRow> = self
            .work
            .conversations
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| ConversationSummaryRow {
                id: c.id.clone(),
                title: c.title.clone(),
                created_at: c.created_at,
                updated_at: c.updated_at,
                last_message: self
                    .work
                    .messages_of(&c.id)
                    .last()
                    .map(|m| m.content.clone()),
            })
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows)
    }

    async fn delete_conversation(&mut self, conversation_id: &str) -> StoreResult<()> {
        self.work.conversations.retain(|c| c.id != conversation_id);
        Ok(())
    }

    async fn insert_message(&mut self, message: &Message) -> StoreResult<()> {
        if !self
            .work
            .conversations
            .iter()
            .any(|c| c.id == message.conversation_id)
        {
            return Err(StoreError::Backend("message parent does not exist".into()));
        }
        self.journal.record(Event::InsertMessage(message.role));
        self.work.messages.push(message.clone());
        Ok(())
    }

    async fn list_messages(&mut self, conversation_id: &str) -> StoreResult<Vec<Message>> {
        Ok(self
            .work
            .messages_of(conversation_id)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn delete_messages(&mut self, conversation_id: &str) -> StoreResult<u64> {
        let before = self.work.messages.len();
        self.work
            .messages
            .retain(|m| m.conversation_id != conversation_id);
        Ok((before - self.work.messages.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        if self.fail_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("injected commit failure".into()));
        }
        let MemoryTx {
            shared,
            journal,
            work,
            ..
        } = *self;
        journal.record(Event::Commit);
        *shared.lock().unwrap() = work;
        Ok(())
    }
}

enum Script {
    Reply(String),
    Empty,
    Fail(fn() -> ProviderError),
    Panic,
}

/// Completion provider with a fixed behaviour that counts its calls.
pub struct ScriptedProvider {
    script: Script,
    calls: AtomicUsize,
    journal: Option<Journal>,
}

impl ScriptedProvider {
    fn with(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            journal: None,
        }
    }

    /// Also log each call into `journal`.
    pub fn recording(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn reply(text: &str) -> Self {
        Self::with(Script::Reply(text.into()))
    }

    pub fn empty() -> Self {
        Self::with(Script::Empty)
    }

    pub fn fail(make: fn() -> ProviderError) -> Self {
        Self::with(Script::Fail(make))
    }

    pub fn panics() -> Self {
        Self::with(Script::Panic)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, _prompt: &str) -> Result<Option<String>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(journal) = &self.journal {
            journal.record(Event::Complete);
        }
        match &self.script {
            Script::Reply(text) => Ok(Some(text.clone())),
            Script::Empty => Ok(None),
            Script::Fail(make) => Err(make()),
            Script::Panic => panic!("scripted provider panic"),
        }
    }
}
