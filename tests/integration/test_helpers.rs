//! Shared fakes and fixtures for integration tests.
//!
//! Provides recording notifiers, scripted advisory and drafting clients,
//! and an in-memory [`Harness`] so individual test modules can focus on
//! behaviour rather than boilerplate.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use taskpulse::advisory::drafter::{TaskDraft, TaskDrafter};
use taskpulse::advisory::{AdvisoryClient, AdvisoryRequest};
use taskpulse::api::AppState;
use taskpulse::models::advisory::Advisory;
use taskpulse::models::task::{NewTask, Task};
use taskpulse::models::user::User;
use taskpulse::notify::{EmailMessage, EmailNotifier, PushMessage, PushNotifier};
use taskpulse::orchestrator::analysis::TaskAnalyzer;
use taskpulse::orchestrator::analysis_scheduler::AnalysisScheduler;
use taskpulse::orchestrator::nlp::NlpTaskService;
use taskpulse::orchestrator::task_service::TaskService;
use taskpulse::persistence::db;
use taskpulse::persistence::task_repo::TaskRepo;
use taskpulse::persistence::user_repo::UserRepo;
use taskpulse::{AppError, Result};

/// Timeout handed to analyzers and the NLP service in tests.
pub const TEST_TIMEOUT: Duration = Duration::from_millis(200);

// ── Notifiers ────────────────────────────────────────

/// Push notifier that records every message and optionally fails.
#[derive(Default)]
pub struct RecordingPush {
    pub sent: Mutex<Vec<PushMessage>>,
    pub fail: bool,
}

impl RecordingPush {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl PushNotifier for RecordingPush {
    fn send(&self, message: PushMessage) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.sent.lock().unwrap().push(message);
            if self.fail {
                Err(AppError::Notify("push provider unavailable".into()))
            } else {
                Ok(())
            }
        })
    }
}

/// Email notifier that records every message and optionally fails.
#[derive(Default)]
pub struct RecordingEmail {
    pub sent: Mutex<Vec<EmailMessage>>,
    pub fail: bool,
}

impl RecordingEmail {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl EmailNotifier for RecordingEmail {
    fn send(
        &self,
        message: EmailMessage,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.sent.lock().unwrap().push(message);
            if self.fail {
                Err(AppError::Notify("relay unavailable".into()))
            } else {
                Ok(())
            }
        })
    }
}

// ── Model clients ────────────────────────────────────

/// Scripted reply of the fake advisory client.
#[derive(Clone)]
pub enum Reply {
    Advise(Advisory),
    Violate,
    Hang,
}

/// Advisory client answering per task title; unknown titles violate the
/// contract.
#[derive(Default)]
pub struct ScriptedAdvisory {
    replies: Mutex<HashMap<String, Reply>>,
    pub calls: AtomicUsize,
}

impl ScriptedAdvisory {
    pub fn with(self, title: &str, reply: Reply) -> Self {
        self.replies.lock().unwrap().insert(title.to_owned(), reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AdvisoryClient for ScriptedAdvisory {
    fn evaluate(
        &self,
        request: AdvisoryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Advisory>> + Send + '_>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .replies
                .lock()
                .unwrap()
                .get(&request.title)
                .cloned()
                .unwrap_or(Reply::Violate);
            match reply {
                Reply::Advise(advisory) => Ok(advisory),
                Reply::Violate => Err(AppError::Advisory("unknown newPriority".into())),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(AppError::Advisory("unreachable".into()))
                }
            }
        })
    }
}

/// Drafter returning a fixed draft, or hanging.
pub struct ScriptedDrafter {
    draft: Option<TaskDraft>,
    delay: Duration,
    pub calls: AtomicUsize,
}

impl ScriptedDrafter {
    pub fn returning(draft: TaskDraft) -> Self {
        Self {
            draft: Some(draft),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer only after `delay`, keeping concurrent callers overlapped.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn hanging() -> Self {
        Self {
            draft: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TaskDrafter for ScriptedDrafter {
    fn draft(
        &self,
        _command: String,
        _reference_time: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<TaskDraft>> + Send + '_>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.draft {
                Some(draft) => {
                    tokio::time::sleep(self.delay).await;
                    Ok(draft.clone())
                }
                None => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(AppError::Advisory("unreachable".into()))
                }
            }
        })
    }
}

// ── Harness ──────────────────────────────────────────

/// Repositories over one in-memory database.
#[derive(Clone)]
pub struct Harness {
    pub db: Arc<db::Database>,
    pub tasks: TaskRepo,
    pub users: UserRepo,
    pub service: TaskService,
}

impl Harness {
    pub async fn new() -> Self {
        let db = Arc::new(db::connect_memory().await.expect("db"));
        let tasks = TaskRepo::new(Arc::clone(&db));
        Self {
            users: UserRepo::new(Arc::clone(&db)),
            service: TaskService::new(tasks.clone()),
            tasks,
            db,
        }
    }

    /// Register a user with the given channels.
    pub async fn user(&self, id: &str, email: Option<&str>, push_token: Option<&str>) -> User {
        let user = User::new(id, id, email.map(str::to_owned)).expect("valid user");
        self.users.upsert(&user).await.expect("upsert");
        if let Some(token) = push_token {
            self.users
                .update_push_token(id, token, Utc::now())
                .await
                .expect("push token");
        }
        self.users.get_by_id(id).await.expect("query").expect("user")
    }

    /// Store a task due `due_in` from `now`.
    pub async fn task(
        &self,
        user_id: &str,
        title: &str,
        due_in: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Task {
        self.service
            .create(
                user_id,
                NewTask {
                    title: title.into(),
                    due_date: Some(now + due_in),
                    ..NewTask::default()
                },
                now,
            )
            .await
            .expect("create task")
    }

    /// Store a task whose reminder is `reminder_in` from `now`.
    pub async fn task_with_reminder(
        &self,
        user_id: &str,
        title: &str,
        reminder_in: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Task {
        let mut task = Task::new(
            user_id,
            NewTask {
                title: title.into(),
                due_date: Some(now + chrono::Duration::days(1)),
                ..NewTask::default()
            },
            now - chrono::Duration::days(1),
        )
        .expect("valid task");
        task.reminder_time = Some(now + reminder_in);
        self.tasks.create(&task).await.expect("create task")
    }

    pub fn analyzer(&self, advisory: Arc<dyn AdvisoryClient>) -> Arc<TaskAnalyzer> {
        Arc::new(TaskAnalyzer::new(self.tasks.clone(), advisory, TEST_TIMEOUT))
    }

    /// Full API state over this harness.
    pub fn app_state(
        &self,
        advisory: Arc<dyn AdvisoryClient>,
        drafter: Arc<dyn TaskDrafter>,
        ct: &CancellationToken,
    ) -> Arc<AppState> {
        let analyzer = self.analyzer(advisory);
        Arc::new(AppState {
            tasks: self.service.clone(),
            users: self.users.clone(),
            scheduler: Arc::new(AnalysisScheduler::new(
                self.users.clone(),
                Arc::clone(&analyzer),
                ct.clone(),
            )),
            analyzer,
            nlp: Arc::new(NlpTaskService::new(
                self.service.clone(),
                drafter,
                TEST_TIMEOUT,
            )),
        })
    }
}
