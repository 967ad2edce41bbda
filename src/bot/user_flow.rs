use std::sync::Arc;

use crate::bot::callbacks::Device;
use crate::bot::keyboards::{self, day_word, month_word};
use crate::bot::links::{client_link, import_deep_link, miniapp_url};
use crate::bot::messenger::{Markup, Media, Messenger, escape_html};
use crate::bot::{BotContext, CallbackReply, IncomingCallback, IncomingMessage};
use crate::error::AppError;
use crate::lifecycle::{Renewal, SubscriptionService, TrialOutcome};
use crate::payment::poller::{PaymentWatch, PollPolicy, WatchOutcome, watch_payment};
use crate::payment::{PaymentGateway, PaymentRequest, PaymentStatus};
use crate::status::SubscriptionState;
use crate::storage::time::to_stored_string;

const WELCOME: &str = "🌐 <b>Добро Пожаловать в Shard VPN — твой быстрый и надёжный доступ в интернет без границ!</b>

<blockquote><i>Я здесь, чтобы обеспечить тебе свободу в сети и защиту данных.</i></blockquote>";

const PLANS: &str = "<b>👨🏻‍💻Чтобы подключиться — выбери подписку:</b>

<blockquote><i>🔐 Быстрый, стабильный и защищённый VPN.</i></blockquote>";

const RENEW: &str = "<b>🔒Продли подписку и оставайся в безопасности!</b>

<blockquote><i>Выбери удобный вариант:</i></blockquote>";

const ABOUT: &str = "🌐 <b>Shard VPN</b> — быстрый и безопасный интернет без ограничений.

<b>Преимущества:</b>
— ⚡️ Высокая скорость
— 🔒 Полное шифрование
— 🎯 Подключение в 1 клик

<blockquote><i>📩 Вопросы? Напиши в поддержку — мы всегда на связи.</i></blockquote>";

const DEVICES: &str = "⚡️ <b>Инструкция по подключению</b>

Просто выберите устройство — мы сразу покажем, что делать.";

const CONFIG_PENDING: &str = "⏳ Конфигурация ещё готовится. Попробуйте через минуту или напишите в поддержку.";

/// Connection strings derived from a user's token.
struct Connection {
    link: String,
    deep_link: String,
    miniapp: String,
}

fn connection(ctx: &BotContext, user_id: i64, token: &str) -> Result<Connection, AppError> {
    let link = client_link(&ctx.settings.connection, token);
    Ok(Connection {
        deep_link: import_deep_link(&ctx.settings.connection, &link),
        miniapp: miniapp_url(&ctx.settings.miniapp.base_url, user_id, &link)?,
        link,
    })
}

fn link_html(url: &str) -> String {
    let url = escape_html(url);
    format!("<a href=\"{url}\">{url}</a>")
}

pub async fn start(ctx: &BotContext, msg: &IncomingMessage) -> Result<(), AppError> {
    let menu = Markup::from(keyboards::main_menu());
    match &ctx.settings.telegram.welcome_animation_url {
        Some(url) => {
            ctx.messenger
                .send_animation(msg.chat_id, &Media::Url(url.clone()), WELCOME, Some(menu))
                .await?;
        }
        None => {
            ctx.messenger.send_text(msg.chat_id, WELCOME, Some(menu)).await?;
        }
    }

    let used = ctx
        .service
        .has_used_trial(msg.from.id)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(user_id = msg.from.id, "trial lookup failed: {}", e);
            true
        });
    if !used {
        let days = ctx.settings.trial.days;
        let text = format!(
            "<b>🎁 Получите {days} {} бесплатно</b>\n\n\
             Подпишитесь на наш канал и нажмите «✅ Проверить подписку» — мы автоматически выдадим пробный доступ.",
            day_word(days)
        );
        ctx.messenger
            .send_text(
                msg.chat_id,
                &text,
                Some(keyboards::trial_offer(&ctx.settings.telegram.channel_id).into()),
            )
            .await?;
    }
    Ok(())
}

pub async fn check_channel(
    ctx: &BotContext,
    cb: &IncomingCallback,
) -> Result<CallbackReply, AppError> {
    let user_id = cb.from.id;
    let member = ctx.is_admin(user_id)
        || ctx
            .messenger
            .is_channel_member(&ctx.settings.telegram.channel_id, user_id)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(user_id, "channel membership check failed: {}", e);
                false
            });
    if !member {
        return Ok(CallbackReply::alert("Вы ещё не подписались на канал!"));
    }

    let days = ctx.settings.trial.days;
    let mut text = String::from("<b>Спасибо за подписку!</b>\n\n");
    match ctx.service.issue_trial(user_id, days).await {
        Ok(TrialOutcome::Issued(_)) => text.push_str(&format!(
            "<b>🎁 Вам выдана пробная подписка на {days} {}.</b>",
            day_word(days)
        )),
        Ok(TrialOutcome::AlreadyUsed) => {
            text.push_str("<b>Пробный период уже был использован.</b>")
        }
        Err(e) => {
            tracing::error!(user_id, "trial issue failed: {}", e);
            text.push_str(
                "<b>Не удалось автоматически выдать пробный доступ.</b> Обратитесь в поддержку.",
            );
        }
    }

    if let Some(message_id) = cb.message_id() {
        if let Err(e) = ctx.messenger.delete_message(cb.chat_id(), message_id).await {
            tracing::debug!(user_id, "failed to remove trial offer: {}", e);
        }
    }
    ctx.messenger
        .send_text(cb.chat_id(), &text, Some(keyboards::main_menu().into()))
        .await?;
    Ok(CallbackReply::Ack)
}

pub async fn send_plans(ctx: &BotContext, chat_id: i64) -> Result<(), AppError> {
    ctx.messenger
        .send_text(chat_id, PLANS, Some(keyboards::plans(&ctx.settings.plans).into()))
        .await?;
    Ok(())
}

pub async fn back_to_plans(
    ctx: &BotContext,
    cb: &IncomingCallback,
) -> Result<CallbackReply, AppError> {
    let keyboard = keyboards::plans(&ctx.settings.plans);
    match cb.message_id() {
        Some(id) => {
            ctx.messenger
                .edit_text(cb.chat_id(), id, PLANS, Some(keyboard))
                .await?
        }
        None => send_plans(ctx, cb.chat_id()).await?,
    }
    Ok(CallbackReply::Ack)
}

pub async fn connect(ctx: &BotContext, chat_id: i64, user_id: i64) -> Result<(), AppError> {
    let sub = ctx.service.store().get_subscription(user_id).await?;
    let SubscriptionState::Active { expiry, .. } =
        SubscriptionState::derive(sub.as_ref(), ctx.service.now())
    else {
        return send_plans(ctx, chat_id).await;
    };

    let token = match ctx.service.ensure_token(user_id).await {
        Ok(Some(token)) => token,
        Ok(None) => return send_plans(ctx, chat_id).await,
        Err(e) => {
            tracing::warn!(user_id, "VPN config backfill failed: {}", e);
            ctx.messenger.send_text(chat_id, CONFIG_PENDING, None).await?;
            return Ok(());
        }
    };

    let conn = connection(ctx, user_id, &token)?;
    let text = format!(
        "<b>🌐 Shard VPN</b>\n\n\
         <b>🔑 Ссылка для подключения:</b>\n<code>{}</code>\n\n\
         <b>🔗 Мини-приложение:</b>\n{}\n\n\
         <b>Срок действия:</b> <code>{}</code>\n\
         <b>Статус:</b> <code>Активна ✅</code>\n\n\
         <blockquote><i>💡 Нажмите \"Инструкция\" для подключения.</i></blockquote>",
        escape_html(&conn.link),
        link_html(&conn.miniapp),
        to_stored_string(&expiry),
    );
    ctx.messenger
        .send_text(chat_id, &text, Some(keyboards::active_user_actions().into()))
        .await?;
    Ok(())
}

pub async fn account(ctx: &BotContext, chat_id: i64, user_id: i64) -> Result<(), AppError> {
    let sub = ctx.service.store().get_subscription(user_id).await?;
    let state = SubscriptionState::derive(sub.as_ref(), ctx.service.now());

    let (text, markup) = match state {
        SubscriptionState::Active { expiry, days_left } => (
            format!(
                "<b>👾 Ваш профиль</b>\n\n\
                 <b>Статус подписки:</b><code> активна 🟢</code>\n\
                 <b>Дата окончания:</b><code> {}</code>\n\
                 <b>Осталось:</b><code> {} {}</code>",
                to_stored_string(&expiry),
                days_left,
                day_word(days_left)
            ),
            None,
        ),
        SubscriptionState::Missing | SubscriptionState::Expired => (
            "<b>👾 Ваш профиль</b>\n\n\
             <b>Статус подписки:</b> <code>не активна 🔴</code>\n\n\
             <blockquote><i>Для подключения VPN оформите подписку.</i></blockquote>"
                .to_string(),
            Some(keyboards::subscribe_button().into()),
        ),
    };
    ctx.messenger.send_text(chat_id, &text, markup).await?;
    Ok(())
}

pub async fn about(ctx: &BotContext, chat_id: i64) -> Result<(), AppError> {
    let markup = keyboards::about(ctx.support_url()).map(Markup::from);
    ctx.messenger.send_text(chat_id, ABOUT, markup).await?;
    Ok(())
}

pub async fn choose_plan(
    ctx: &BotContext,
    cb: &IncomingCallback,
    months: u32,
) -> Result<CallbackReply, AppError> {
    let user_id = cb.from.id;
    let Some(plan) = ctx.settings.plan_for_months(months) else {
        tracing::warn!(user_id, months, "unknown plan requested");
        return Ok(CallbackReply::alert("Такой тариф недоступен"));
    };

    let request = PaymentRequest {
        user_id,
        months,
        amount_rub: plan.price_rub,
        description: format!("Подписка Shard VPN на {months} {}", month_word(months)),
    };
    let created = match ctx.gateway.create_payment(&request).await {
        Ok(created) => created,
        Err(e) => {
            tracing::error!(user_id, months, "payment creation failed: {}", e);
            return Ok(CallbackReply::alert("Ошибка при создании платежа"));
        }
    };
    tracing::info!(user_id, months, payment_id = %created.id, "payment created");

    let text = format!(
        "<b>Вы выбрали подписку на {months} мес.</b>\n\n\
         <b>Сумма к оплате:</b><code> {}₽</code>\n\n\
         <blockquote><i>Нажмите кнопку ниже для перехода к оплате:</i></blockquote>",
        plan.price_rub
    );
    let keyboard = keyboards::pay(&created.confirmation_url, &created.id, ctx.support_url());
    let chat_id = cb.chat_id();
    let message_id = match cb.message_id() {
        Some(id) => {
            ctx.messenger
                .edit_text(chat_id, id, &text, Some(keyboard))
                .await?;
            id
        }
        None => {
            ctx.messenger
                .send_text(chat_id, &text, Some(keyboard.into()))
                .await?
        }
    };

    let watch = PaymentWatch {
        payment_id: created.id,
        user_id,
        chat_id,
        message_id: Some(message_id),
        plan,
    };
    tokio::spawn(run_payment_watch(
        ctx.gateway.clone(),
        ctx.service.clone(),
        ctx.messenger.clone(),
        watch,
        ctx.poll_policy(),
    ));
    Ok(CallbackReply::Ack)
}

/// Background task for one initiated payment.
pub async fn run_payment_watch(
    gateway: Arc<dyn PaymentGateway>,
    service: Arc<SubscriptionService>,
    messenger: Arc<dyn Messenger>,
    watch: PaymentWatch,
    policy: PollPolicy,
) {
    match watch_payment(gateway.as_ref(), &service, &watch, policy).await {
        WatchOutcome::Completed(renewal) => notify_paid(messenger.as_ref(), &watch, &renewal).await,
        WatchOutcome::BookkeepingFailed => {
            let text = "Ошибка активации подписки. Обратитесь в поддержку.";
            if let Err(e) = messenger.send_text(watch.chat_id, text, None).await {
                tracing::warn!(user_id = watch.user_id, "failed to report activation error: {}", e);
            }
        }
        WatchOutcome::Abandoned | WatchOutcome::TimedOut => {}
    }
}

async fn notify_paid(messenger: &dyn Messenger, watch: &PaymentWatch, renewal: &Renewal) {
    if let Some(message_id) = watch.message_id {
        if let Err(e) = messenger.delete_message(watch.chat_id, message_id).await {
            tracing::warn!(user_id = watch.user_id, "failed to remove pay message: {}", e);
        }
    }

    let action = if renewal.was_active {
        "продлена"
    } else {
        "активирована"
    };
    let text = format!(
        "<b>✅ Оплата успешно выполнена</b>\n\n\
         <b>Ваша подписка на Shard VPN {action}!</b>\n\n\
         <b>Срок подписки:</b> {} мес.\n\
         <b>Дата окончания:</b> <code>{}</code>\n\n\
         <blockquote><i>🔹 Нажмите «Активировать VPN», чтобы начать пользоваться.</i></blockquote>",
        watch.plan.months,
        to_stored_string(&renewal.expiry),
    );
    if let Err(e) = messenger.send_text(watch.chat_id, &text, None).await {
        tracing::warn!(user_id = watch.user_id, "failed to send payment confirmation: {}", e);
    }
}

pub async fn check_payment(ctx: &BotContext, payment_id: &str) -> CallbackReply {
    match ctx.gateway.payment_status(payment_id).await {
        Ok(PaymentStatus::Succeeded) => CallbackReply::alert("Оплата уже подтверждена!"),
        Ok(PaymentStatus::Pending) => {
            CallbackReply::alert("Оплата еще не прошла. Попробуйте позже.")
        }
        Ok(status) => CallbackReply::alert(format!("Статус платежа: {}", status.as_str())),
        Err(e) => {
            tracing::warn!(payment_id, "manual payment check failed: {}", e);
            CallbackReply::alert("Ошибка при проверке платежа")
        }
    }
}

pub async fn instructions(
    ctx: &BotContext,
    cb: &IncomingCallback,
) -> Result<CallbackReply, AppError> {
    ctx.messenger
        .send_text(
            cb.chat_id(),
            DEVICES,
            Some(keyboards::devices(ctx.support_url()).into()),
        )
        .await?;
    Ok(CallbackReply::Ack)
}

fn device_steps(device: Device) -> (&'static str, &'static str) {
    match device {
        Device::Ios => (
            "📱 Инструкция для iOS:",
            "1. Скачайте приложение <b>V2RayTun</b> из App Store\n\
             2. Нажмите кнопку \"Установить VPN\" ниже\n\
             3. Разрешите приложению добавить VPN-конфигурацию\n\
             4. Включите соединение в приложении",
        ),
        Device::Android => (
            "🤖 Инструкция для Android:",
            "1. Скачайте приложение <b>V2RayTun</b> из Play Market\n\
             2. Нажмите кнопку \"Установить VPN\" ниже\n\
             3. Разрешите приложению добавить VPN-конфигурацию\n\
             4. Включите соединение в приложении",
        ),
        Device::Windows => (
            "💻 Инструкция для Windows:",
            "1. Скачайте и установите <b>V2RayTun</b> с официального сайта\n\
             2. Нажмите кнопку \"Установить VPN\" ниже\n\
             3. Приложение автоматически добавит конфигурацию\n\
             4. Включите соединение в программе",
        ),
        Device::MacOs => (
            "🍎 Инструкция для macOS:",
            "1. Скачайте и установите <b>V2RayTun</b> из App Store\n\
             2. Нажмите кнопку \"Установить VPN\" ниже\n\
             3. Приложение автоматически добавит конфигурацию\n\
             4. Включите соединение в программе",
        ),
    }
}

pub async fn device_instructions(
    ctx: &BotContext,
    cb: &IncomingCallback,
    device: Device,
) -> Result<CallbackReply, AppError> {
    let user_id = cb.from.id;
    let token = match ctx.service.ensure_token(user_id).await {
        Ok(Some(token)) => token,
        Ok(None) => return Ok(CallbackReply::alert("Ошибка получения конфигурации")),
        Err(e) => {
            tracing::warn!(user_id, "VPN config backfill failed: {}", e);
            return Ok(CallbackReply::alert("Ошибка получения конфигурации"));
        }
    };
    let expiry = ctx
        .service
        .store()
        .get_subscription(user_id)
        .await?
        .and_then(|s| s.expiry())
        .map(|e| to_stored_string(&e))
        .unwrap_or_else(|| "не определена".to_string());

    let conn = connection(ctx, user_id, &token)?;
    let (title, steps) = device_steps(device);
    let mut text = format!("<b>{title}</b>\n\n{steps}\n\n");
    if device == Device::MacOs {
        text.push_str(&format!(
            "<b>Конфигурация:</b>\n<code>{}</code>\n\n",
            escape_html(&conn.link)
        ));
    }
    text.push_str(&format!(
        "<b>🔗 Мини-приложение:</b>\n{}\n\n<b>Срок действия:</b> <code>{expiry}</code>",
        link_html(&conn.miniapp)
    ));

    let store_url = match device {
        Device::Ios => Some(ctx.settings.connection.ios_app_url.as_str()),
        Device::Android => Some(ctx.settings.connection.android_app_url.as_str()),
        Device::Windows | Device::MacOs => None,
    };
    let keyboard = keyboards::device_setup(
        store_url,
        &conn.deep_link,
        Some(&conn.miniapp),
        ctx.support_url(),
    );
    ctx.messenger
        .send_text(cb.chat_id(), &text, Some(keyboard.into()))
        .await?;
    Ok(CallbackReply::Ack)
}

pub async fn renew(ctx: &BotContext, cb: &IncomingCallback) -> Result<CallbackReply, AppError> {
    let sub = ctx.service.store().get_subscription(cb.from.id).await?;
    if SubscriptionState::derive(sub.as_ref(), ctx.service.now()).is_active() {
        ctx.messenger
            .send_text(
                cb.chat_id(),
                RENEW,
                Some(keyboards::plans(&ctx.settings.plans).into()),
            )
            .await?;
        return Ok(CallbackReply::Ack);
    }
    send_plans(ctx, cb.chat_id()).await?;
    Ok(CallbackReply::alert(
        "У вас нет активной подписки. Оформите новую подписку.",
    ))
}
