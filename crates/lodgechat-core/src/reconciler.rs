//! Chat session reconciler.
//!
//! Owns one conversation at a time and reconciles it between the local cache
//! and the remote account store: anonymous transcripts are upserted into the
//! cache, authenticated ones are saved to the account, and cached sessions are
//! migrated to the account (best effort, one pass) on login.
//!
//! All state lives on the instance — the authenticated flag and the
//! save/migration guards are fields, never module globals, so independent
//! reconcilers (and tests) cannot see each other.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use crate::error::{ChatError, Result};
use crate::inference::{self, InferenceProvider};
use crate::model::{validate_message_text, ChatSession, Feedback, Role, SessionOrigin, MAX_MESSAGE_LENGTH};
use crate::store::SessionStore;
use crate::title::{derive_title, TitleRules};

/// Per-conversation lifecycle phase. A new `send_message` is rejected while a
/// reply is in flight so bot replies can never interleave out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    AwaitingReply,
}

struct Conversation {
    session: ChatSession,
    phase: Phase,
}

/// What `schedule_save` decided to do. Save failures are logged, never
/// propagated — the next successful reply saves the full transcript again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Full transcript persisted to the remote account store.
    Remote,
    /// Remote save failed; logged only.
    RemoteFailed,
    /// Full transcript upserted into the local cache.
    Local,
    /// Local upsert failed; logged only.
    LocalFailed,
    /// A remote save for this conversation was already in flight.
    SkippedInFlight,
    /// No user message yet — nothing worth persisting.
    NothingToSave,
}

/// Result of one migration pass.
#[derive(Debug, Default)]
pub struct MigrationReport {
    /// False when another pass was already running and this trigger collapsed.
    pub ran: bool,
    /// `(old local id, new remote id)` per migrated session.
    pub migrated: Vec<(Uuid, Uuid)>,
    /// Local ids that failed to migrate in this pass.
    pub failed: Vec<Uuid>,
    /// Whether the local cache was cleared at the end of the pass.
    pub cache_cleared: bool,
}

pub struct Reconciler<L, R, I> {
    local: L,
    remote: R,
    inference: I,
    rules: TitleRules,
    max_message_len: usize,
    conversation: Mutex<Conversation>,
    authenticated: AtomicBool,
    save_in_flight: AtomicBool,
    migrating: AtomicBool,
}

impl<L, R, I> Reconciler<L, R, I>
where
    L: SessionStore,
    R: SessionStore,
    I: InferenceProvider,
{
    pub fn new(local: L, remote: R, inference: I) -> Self {
        Self::with_rules(local, remote, inference, TitleRules::default())
    }

    pub fn with_rules(local: L, remote: R, inference: I, rules: TitleRules) -> Self {
        Self {
            local,
            remote,
            inference,
            rules,
            max_message_len: MAX_MESSAGE_LENGTH,
            conversation: Mutex::new(Conversation {
                session: ChatSession::new(),
                phase: Phase::Idle,
            }),
            authenticated: AtomicBool::new(false),
            save_in_flight: AtomicBool::new(false),
            migrating: AtomicBool::new(false),
        }
    }

    /// Override the message length cap (configured via `chat.max_message_len`).
    pub fn with_max_message_len(mut self, limit: usize) -> Self {
        self.max_message_len = limit;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    pub fn set_authenticated(&self, value: bool) {
        self.authenticated.store(value, Ordering::SeqCst);
    }

    // The guard is never held across an await.
    fn lock(&self) -> Result<MutexGuard<'_, Conversation>> {
        self.conversation
            .lock()
            .map_err(|_| ChatError::Storage("conversation state lock poisoned".into()))
    }

    /// Clone of the active conversation, for display.
    pub fn snapshot(&self) -> Result<ChatSession> {
        Ok(self.lock()?.session.clone())
    }

    pub fn session_id(&self) -> Result<Uuid> {
        Ok(self.lock()?.session.session_id)
    }

    /// Start a fresh conversation: new session id, message list reset to the
    /// single seed bot message. Returns the new id.
    pub fn new_chat(&self) -> Result<Uuid> {
        let mut convo = self.lock()?;
        convo.session = ChatSession::new();
        convo.phase = Phase::Idle;
        Ok(convo.session.session_id)
    }

    /// Send a user message and wait for the bot reply.
    ///
    /// Returns `Ok(None)` when a reply is already in flight (the message is
    /// rejected, not queued). On inference failure the classified apology is
    /// appended in place of a reply and no save is attempted for the turn.
    pub async fn send_message(&self, text: &str) -> Result<Option<String>> {
        validate_message_text(text, self.max_message_len)?;

        let session_id = {
            let mut convo = self.lock()?;
            if convo.phase != Phase::Idle {
                return Ok(None);
            }
            convo.session.push(Role::User, text.trim());
            convo.phase = Phase::AwaitingReply;
            convo.session.session_id
        };

        let outcome = self.inference.reply(session_id, text.trim()).await;

        let reply = match outcome {
            Ok(reply) => {
                {
                    let mut convo = self.lock()?;
                    convo.session.push(Role::Bot, reply.as_str());
                    convo.phase = Phase::Idle;
                }
                self.schedule_save().await?;
                reply
            }
            Err(err) => {
                tracing::warn!(error = %err, "inference failed, appending apology");
                let apology = inference::apology_for(&err);
                let mut convo = self.lock()?;
                convo.session.push(Role::Bot, apology);
                convo.phase = Phase::Idle;
                apology.to_string()
            }
        };

        Ok(Some(reply))
    }

    /// Persist the active conversation to whichever store currently owns it.
    ///
    /// Authenticated: full transcript to the remote store, at most one save in
    /// flight at a time (a second trigger is dropped, not queued — the next
    /// successful reply saves the superset transcript anyway). Anonymous:
    /// idempotent upsert into the local cache.
    pub async fn schedule_save(&self) -> Result<SaveOutcome> {
        let snapshot = {
            let mut convo = self.lock()?;
            if !convo.session.has_user_message() {
                return Ok(SaveOutcome::NothingToSave);
            }
            let texts: Vec<String> = convo.session.user_texts().map(str::to_string).collect();
            convo.session.title = derive_title(texts.iter().map(String::as_str), &self.rules);
            convo.session.preview = convo.session.derive_preview();
            convo.session.clone()
        };

        if self.is_authenticated() {
            if self.save_in_flight.swap(true, Ordering::SeqCst) {
                return Ok(SaveOutcome::SkippedInFlight);
            }
            let result = self.remote.save(&snapshot).await;
            self.save_in_flight.store(false, Ordering::SeqCst);
            match result {
                Ok(()) => {
                    // The transcript now lives in the account store; later
                    // feedback/rename/delete must go through it.
                    let mut convo = self.lock()?;
                    if convo.session.session_id == snapshot.session_id {
                        convo.session.origin = SessionOrigin::Remote;
                    }
                    Ok(SaveOutcome::Remote)
                }
                Err(err) => {
                    tracing::warn!(
                        session_id = %snapshot.session_id,
                        error = %err,
                        "remote save failed, will retry on next successful reply"
                    );
                    Ok(SaveOutcome::RemoteFailed)
                }
            }
        } else {
            match self.local.save(&snapshot).await {
                Ok(()) => Ok(SaveOutcome::Local),
                Err(err) => {
                    tracing::warn!(
                        session_id = %snapshot.session_id,
                        error = %err,
                        "local cache save failed"
                    );
                    Ok(SaveOutcome::LocalFailed)
                }
            }
        }
    }

    /// Explicit login workflow: mark authenticated, persist any pending
    /// transcript, then migrate cached sessions. Sequential and
    /// completion-driven — there are no settle timers.
    pub async fn on_login(&self) -> Result<MigrationReport> {
        self.set_authenticated(true);
        self.schedule_save().await?;
        self.migrate_local_sessions().await
    }

    /// One best-effort migration pass: copy every cached session to the remote
    /// store under a fresh session id (never reusing the local id, which could
    /// collide with a session the account already owns).
    ///
    /// If at least one session migrates, the entire cache is cleared — even
    /// entries that failed in the same pass. Migration runs once per login and
    /// is not retried per item; the report names the dropped ids. If nothing
    /// migrates the cache is left untouched.
    pub async fn migrate_local_sessions(&self) -> Result<MigrationReport> {
        if self.migrating.swap(true, Ordering::SeqCst) {
            return Ok(MigrationReport::default());
        }
        let result = self.migrate_pass().await;
        self.migrating.store(false, Ordering::SeqCst);
        result
    }

    async fn migrate_pass(&self) -> Result<MigrationReport> {
        let mut report = MigrationReport {
            ran: true,
            ..MigrationReport::default()
        };

        let cached = self.local.list().await?;
        if cached.is_empty() {
            return Ok(report);
        }

        for session in &cached {
            let mut copy = session.clone();
            copy.session_id = Uuid::new_v4();
            copy.origin = SessionOrigin::Remote;
            match self.remote.save(&copy).await {
                Ok(()) => report.migrated.push((session.session_id, copy.session_id)),
                Err(err) => {
                    tracing::warn!(
                        session_id = %session.session_id,
                        error = %err,
                        "failed to migrate cached session"
                    );
                    report.failed.push(session.session_id);
                }
            }
        }

        if !report.migrated.is_empty() {
            if let Err(err) = self.local.clear().await {
                tracing::warn!(error = %err, "failed to clear session cache after migration");
            } else {
                report.cache_cleared = true;
            }
        } else if !report.failed.is_empty() {
            tracing::warn!(
                failed = report.failed.len(),
                "migration pass moved nothing, keeping local cache"
            );
        }

        Ok(report)
    }

    /// Merged session list: local cache always, remote store when signed in.
    /// Each entry keeps its origin tag; the combined list is sorted newest
    /// first, so concat order only matters for equal timestamps.
    pub async fn load_history(&self) -> Result<Vec<ChatSession>> {
        let mut sessions = self.local.list().await?;
        if self.is_authenticated() {
            sessions.extend(self.remote.list().await?);
        }
        sessions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(sessions)
    }

    /// Make a listed session the active conversation, refetching it from the
    /// store named by its origin tag.
    pub async fn select_session(&self, id: Uuid, origin: SessionOrigin) -> Result<()> {
        let session = match origin {
            SessionOrigin::Local => self.local.get(id).await?,
            SessionOrigin::Remote => {
                self.require_auth("open an account session")?;
                self.remote.get(id).await?
            }
        };
        let mut convo = self.lock()?;
        convo.session = session;
        convo.phase = Phase::Idle;
        Ok(())
    }

    pub async fn rename_session(&self, id: Uuid, origin: SessionOrigin, title: &str) -> Result<()> {
        if title.trim().is_empty() {
            return Err(ChatError::InvalidInput("title cannot be empty".into()));
        }
        match origin {
            SessionOrigin::Local => self.local.rename(id, title.trim()).await,
            SessionOrigin::Remote => {
                self.require_auth("rename an account session")?;
                self.remote.rename(id, title.trim()).await
            }
        }
    }

    pub async fn delete_session(&self, id: Uuid, origin: SessionOrigin) -> Result<()> {
        match origin {
            SessionOrigin::Local => self.local.delete(id).await,
            SessionOrigin::Remote => {
                self.require_auth("delete an account session")?;
                self.remote.delete(id).await
            }
        }
    }

    /// Record thumbs up/down on a message of the active conversation.
    ///
    /// The in-memory field updates immediately. Persistence is remote-only:
    /// it happens when the conversation lives in the account store and the
    /// user is signed in, and a failed persist rolls the field back to `None`.
    /// For cache-only sessions the value is accepted but never persisted.
    pub async fn record_feedback(&self, message_id: i64, value: Feedback) -> Result<()> {
        let (session_id, origin) = {
            let mut convo = self.lock()?;
            let message = convo
                .session
                .message_mut(message_id)
                .ok_or_else(|| ChatError::NotFound(format!("message {message_id}")))?;
            message.feedback = value;
            (convo.session.session_id, convo.session.origin)
        };

        if origin == SessionOrigin::Remote && self.is_authenticated() {
            if let Err(err) = self.remote.set_feedback(session_id, message_id, value).await {
                tracing::warn!(
                    message_id,
                    error = %err,
                    "feedback persist failed, rolling back"
                );
                let mut convo = self.lock()?;
                if let Some(message) = convo.session.message_mut(message_id) {
                    message.feedback = Feedback::None;
                }
            }
        }
        Ok(())
    }

    fn require_auth(&self, action: &str) -> Result<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(ChatError::Unauthenticated(format!("sign in to {action}")))
        }
    }
}
