//! In-memory doubles for the external services, shared by unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use crate::bot::messenger::{InlineKeyboard, Markup, Media, Messenger, SendError};
use crate::bot::{BotContext, IncomingCallback, IncomingMessage};
use crate::config::Settings;
use crate::error::AppError;
use crate::lifecycle::SubscriptionService;
use crate::payment::{CreatedPayment, PaymentGateway, PaymentRequest, PaymentStatus};
use crate::provisioner::Provisioner;
use crate::storage::Database;
use crate::users::UserProfile;

pub const ADMIN_ID: i64 = 42;

pub async fn temp_db() -> (TempDir, Arc<Database>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.db");
    let db = Database::new(path.to_str().unwrap()).await.unwrap();
    (dir, Arc::new(db))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionerCall {
    Obtain { user_id: i64, days: i64 },
    Extend { token: String, days: i64 },
}

#[derive(Default)]
pub struct FakeProvisioner {
    fail_obtain: bool,
    fail_extend: bool,
    /// Yield to the scheduler once per call, like a real network round trip.
    yielding: bool,
    calls: Mutex<Vec<ProvisionerCall>>,
}

impl FakeProvisioner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Both calls fail.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_obtain: true,
            fail_extend: true,
            ..Self::default()
        })
    }

    pub fn failing_extend() -> Arc<Self> {
        Arc::new(Self {
            fail_extend: true,
            ..Self::default()
        })
    }

    pub fn yielding() -> Arc<Self> {
        Arc::new(Self {
            yielding: true,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<ProvisionerCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provisioner for FakeProvisioner {
    async fn obtain(&self, user_id: i64, days: i64) -> Result<String, AppError> {
        self.calls
            .lock()
            .unwrap()
            .push(ProvisionerCall::Obtain { user_id, days });
        if self.yielding {
            tokio::task::yield_now().await;
        }
        if self.fail_obtain {
            return Err(AppError::Provisioner("vendor unavailable".into()));
        }
        Ok(format!("token-{user_id}"))
    }

    async fn extend(&self, token: &str, days: i64) -> Result<(), AppError> {
        self.calls.lock().unwrap().push(ProvisionerCall::Extend {
            token: token.to_string(),
            days,
        });
        if self.yielding {
            tokio::task::yield_now().await;
        }
        if self.fail_extend {
            return Err(AppError::Provisioner("vendor unavailable".into()));
        }
        Ok(())
    }
}

/// Gateway whose status answers are replayed from a script; `pending` once exhausted.
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Result<PaymentStatus, AppError>>>,
    polls: AtomicU32,
    fail_create: bool,
    requests: Mutex<Vec<PaymentRequest>>,
}

impl ScriptedGateway {
    pub fn new(script: Vec<Result<PaymentStatus, AppError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            polls: AtomicU32::new(0),
            fail_create: false,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing_create() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            polls: AtomicU32::new(0),
            fail_create: true,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<CreatedPayment, AppError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_create {
            return Err(AppError::Gateway("shop is closed".into()));
        }
        Ok(CreatedPayment {
            id: "pay-1".into(),
            status: PaymentStatus::Pending,
            confirmation_url: "https://pay.example/pay-1".into(),
        })
    }

    async fn payment_status(&self, _payment_id: &str) -> Result<PaymentStatus, AppError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(PaymentStatus::Pending))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        chat_id: i64,
        text: String,
        markup: Option<Markup>,
    },
    Photo {
        chat_id: i64,
        photo: Media,
        caption: String,
    },
    Animation {
        chat_id: i64,
        animation: Media,
        caption: String,
        markup: Option<Markup>,
    },
    Edit {
        chat_id: i64,
        message_id: i32,
        text: String,
        keyboard: Option<InlineKeyboard>,
    },
    Delete {
        chat_id: i64,
        message_id: i32,
    },
    Answer {
        callback_id: String,
        text: Option<String>,
        alert: bool,
    },
}

pub struct FakeMessenger {
    sent: Mutex<Vec<Sent>>,
    failures: Mutex<HashMap<i64, SendError>>,
    members: Mutex<HashSet<i64>>,
    next_id: AtomicI32,
}

impl FakeMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            members: Mutex::new(HashSet::new()),
            next_id: AtomicI32::new(100),
        })
    }

    /// Every send to `chat_id` fails with `error`.
    pub fn fail_for(&self, chat_id: i64, error: SendError) {
        self.failures.lock().unwrap().insert(chat_id, error);
    }

    pub fn join_channel(&self, user_id: i64) {
        self.members.lock().unwrap().insert(user_id);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { chat_id: c, text, .. } if c == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| matches!(s, Sent::Edit { .. }))
            .collect()
    }

    pub fn answers(&self) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| matches!(s, Sent::Answer { .. }))
            .collect()
    }

    fn deliver(&self, chat_id: i64, record: Sent) -> Result<i32, SendError> {
        if let Some(err) = self.failures.lock().unwrap().get(&chat_id) {
            return Err(err.clone());
        }
        self.sent.lock().unwrap().push(record);
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<Markup>,
    ) -> Result<i32, SendError> {
        self.deliver(
            chat_id,
            Sent::Text {
                chat_id,
                text: text.to_string(),
                markup,
            },
        )
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        photo: &Media,
        caption: &str,
        _markup: Option<Markup>,
    ) -> Result<i32, SendError> {
        self.deliver(
            chat_id,
            Sent::Photo {
                chat_id,
                photo: photo.clone(),
                caption: caption.to_string(),
            },
        )
    }

    async fn send_animation(
        &self,
        chat_id: i64,
        animation: &Media,
        caption: &str,
        markup: Option<Markup>,
    ) -> Result<i32, SendError> {
        self.deliver(
            chat_id,
            Sent::Animation {
                chat_id,
                animation: animation.clone(),
                caption: caption.to_string(),
                markup,
            },
        )
    }

    async fn edit_text(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<(), SendError> {
        self.deliver(
            chat_id,
            Sent::Edit {
                chat_id,
                message_id,
                text: text.to_string(),
                keyboard,
            },
        )
        .map(|_| ())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<(), SendError> {
        self.deliver(chat_id, Sent::Delete { chat_id, message_id })
            .map(|_| ())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> Result<(), SendError> {
        self.sent.lock().unwrap().push(Sent::Answer {
            callback_id: callback_id.to_string(),
            text: text.map(String::from),
            alert,
        });
        Ok(())
    }

    async fn is_channel_member(&self, _channel: &str, user_id: i64) -> Result<bool, SendError> {
        Ok(self.members.lock().unwrap().contains(&user_id))
    }
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::from_toml(&format!(
        r#"
[telegram]
token = "123:test"
admin_ids = [{ADMIN_ID}]
channel_id = "@shard_channel"
support_url = "https://t.me/shard_support"

[miniapp]
host = "127.0.0.1"
port = 0
base_url = "https://vpn.example"
"#
    ))
    .unwrap();
    settings.payment.poll_interval_secs = 0;
    settings.payment.max_poll_attempts = 3;
    settings.admin.broadcast_delay_ms = 0;
    settings
}

pub fn bot_context(
    db: Arc<Database>,
    vendor: Arc<FakeProvisioner>,
    gateway: Arc<ScriptedGateway>,
    messenger: Arc<FakeMessenger>,
) -> BotContext {
    BotContext::new(
        Arc::new(test_settings()),
        Arc::new(SubscriptionService::new(db, vendor)),
        gateway,
        messenger,
    )
}

pub fn message(user_id: i64, text: &str) -> IncomingMessage {
    IncomingMessage {
        chat_id: user_id,
        from: UserProfile::bare(user_id),
        text: Some(text.to_string()),
        photo: None,
        caption: None,
    }
}

pub fn callback(user_id: i64, data: &str) -> IncomingCallback {
    IncomingCallback {
        id: format!("cb-{user_id}"),
        from: UserProfile::bare(user_id),
        data: data.to_string(),
        message: Some((user_id, 50)),
    }
}
