//! Chat front end: routes incoming messages and button presses to the user
//! and admin flows. Platform specifics live in `telegram`; everything else
//! talks to the [`Messenger`] trait.

pub mod admin_flow;
pub mod admin_session;
pub mod broadcast;
pub mod callbacks;
pub mod keyboards;
pub mod links;
pub mod messenger;
pub mod telegram;
pub mod user_flow;

use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::error::AppError;
use crate::lifecycle::SubscriptionService;
use crate::payment::PaymentGateway;
use crate::payment::poller::PollPolicy;
use crate::users::UserProfile;

use admin_session::AdminSessions;
use callbacks::CallbackAction;
use messenger::Messenger;

pub const GENERIC_FAILURE: &str = "Произошла ошибка. Попробуйте позже.";

/// Shared state handed to every handler.
pub struct BotContext {
    pub settings: Arc<Settings>,
    pub service: Arc<SubscriptionService>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub messenger: Arc<dyn Messenger>,
    pub admin_sessions: AdminSessions,
}

impl BotContext {
    pub fn new(
        settings: Arc<Settings>,
        service: Arc<SubscriptionService>,
        gateway: Arc<dyn PaymentGateway>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        let admin_sessions =
            AdminSessions::new(Duration::from_secs(settings.admin.session_ttl_secs));
        Self {
            settings,
            service,
            gateway,
            messenger,
            admin_sessions,
        }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.settings.is_admin(user_id)
    }

    pub fn support_url(&self) -> Option<&str> {
        self.settings.telegram.support_url.as_deref()
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.settings.payment.poll_interval_secs),
            max_attempts: self.settings.payment.max_poll_attempts,
        }
    }

    pub fn broadcast_delay(&self) -> Duration {
        Duration::from_millis(self.settings.admin.broadcast_delay_ms)
    }

    async fn touch(&self, profile: &UserProfile) {
        match self.service.store().touch_user(profile).await {
            Ok(true) => tracing::info!(user_id = profile.id, "new bot user registered"),
            Ok(false) => {}
            Err(e) => tracing::warn!(user_id = profile.id, "failed to record bot user: {}", e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub from: UserProfile,
    pub text: Option<String>,
    /// File id of the largest photo size, if the message carries a photo.
    pub photo: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IncomingCallback {
    pub id: String,
    pub from: UserProfile,
    pub data: String,
    /// Chat and id of the message the button is attached to, when still accessible.
    pub message: Option<(i64, i32)>,
}

impl IncomingCallback {
    pub fn chat_id(&self) -> i64 {
        self.message.map_or(self.from.id, |(chat, _)| chat)
    }

    pub fn message_id(&self) -> Option<i32> {
        self.message.map(|(_, id)| id)
    }
}

/// How a button press is acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackReply {
    Ack,
    Toast(String),
    Alert(String),
}

impl CallbackReply {
    pub fn alert(text: impl Into<String>) -> Self {
        CallbackReply::Alert(text.into())
    }
}

pub async fn handle_message(ctx: &BotContext, msg: &IncomingMessage) {
    ctx.touch(&msg.from).await;

    let text = msg.text.as_deref().map(str::trim).unwrap_or_default();
    let command = text.split_whitespace().next().unwrap_or_default();
    let result = match (command, text) {
        ("/start", _) => user_flow::start(ctx, msg).await,
        ("/admin", _) => admin_flow::open_panel(ctx, msg).await,
        (_, keyboards::MENU_CONNECT) => user_flow::connect(ctx, msg.chat_id, msg.from.id).await,
        (_, keyboards::MENU_ACCOUNT) => user_flow::account(ctx, msg.chat_id, msg.from.id).await,
        (_, keyboards::MENU_ABOUT) => user_flow::about(ctx, msg.chat_id).await,
        _ if ctx.is_admin(msg.from.id) => admin_flow::handle_input(ctx, msg).await,
        _ => {
            tracing::debug!(user_id = msg.from.id, "ignoring unrecognized message");
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::error!(user_id = msg.from.id, "message handler failed: {}", e);
        if let Err(e) = ctx.messenger.send_text(msg.chat_id, GENERIC_FAILURE, None).await {
            tracing::warn!(chat_id = msg.chat_id, "failed to report error: {}", e);
        }
    }
}

pub async fn handle_callback(ctx: &BotContext, cb: &IncomingCallback) {
    ctx.touch(&cb.from).await;

    let reply = match CallbackAction::parse(&cb.data) {
        Some(action) => dispatch_callback(ctx, cb, action).await.unwrap_or_else(|e| {
            tracing::error!(user_id = cb.from.id, data = %cb.data, "callback failed: {}", e);
            CallbackReply::alert(GENERIC_FAILURE)
        }),
        None => {
            tracing::debug!(user_id = cb.from.id, data = %cb.data, "unknown callback data");
            CallbackReply::Ack
        }
    };

    let answered = match &reply {
        CallbackReply::Ack => ctx.messenger.answer_callback(&cb.id, None, false).await,
        CallbackReply::Toast(text) => ctx.messenger.answer_callback(&cb.id, Some(text), false).await,
        CallbackReply::Alert(text) => ctx.messenger.answer_callback(&cb.id, Some(text), true).await,
    };
    if let Err(e) = answered {
        tracing::debug!(callback_id = %cb.id, "failed to answer callback: {}", e);
    }
}

async fn dispatch_callback(
    ctx: &BotContext,
    cb: &IncomingCallback,
    action: CallbackAction,
) -> Result<CallbackReply, AppError> {
    match action {
        CallbackAction::CheckChannel => user_flow::check_channel(ctx, cb).await,
        CallbackAction::Subscribe => {
            user_flow::send_plans(ctx, cb.chat_id()).await?;
            Ok(CallbackReply::Ack)
        }
        CallbackAction::BackToPlans => user_flow::back_to_plans(ctx, cb).await,
        CallbackAction::ChoosePlan(months) => user_flow::choose_plan(ctx, cb, months).await,
        CallbackAction::CheckPayment(id) => Ok(user_flow::check_payment(ctx, &id).await),
        CallbackAction::Instructions => user_flow::instructions(ctx, cb).await,
        CallbackAction::DeviceInstructions(device) => {
            user_flow::device_instructions(ctx, cb, device).await
        }
        CallbackAction::Renew => user_flow::renew(ctx, cb).await,
        CallbackAction::Admin(action) => {
            if !ctx.is_admin(cb.from.id) {
                tracing::warn!(user_id = cb.from.id, "non-admin pressed an admin button");
                return Ok(CallbackReply::alert("❌ Нет доступа"));
            }
            admin_flow::handle_action(ctx, cb, action).await
        }
    }
}
