//! Chat-based admin panel. Every entry point here assumes the caller has
//! already been checked against the admin allow-list.

use chrono::NaiveDateTime;
use std::collections::HashSet;

use crate::bot::admin_session::AdminPrompt;
use crate::bot::broadcast::{Audience, BroadcastContent, load_audience, send_broadcast};
use crate::bot::callbacks::AdminAction;
use crate::bot::keyboards::{self, day_word};
use crate::bot::messenger::{InlineKeyboard, Media, escape_html};
use crate::bot::{BotContext, CallbackReply, IncomingCallback, IncomingMessage};
use crate::error::AppError;
use crate::lifecycle::Activation;
use crate::stats::{self, DashboardStats, DetailedStats};
use crate::status;
use crate::storage::time::to_stored_string;
use crate::subscription::Subscription;

/// Rows shown in the subscription lists.
const LIST_LIMIT: usize = 20;
const RECENT_USERS_LIMIT: usize = 15;
const CARD_GRANT_DAYS: [i64; 3] = [7, 30, 90];
const GUIDED_GRANT_DAYS: [i64; 4] = [7, 30, 90, 365];

fn rub(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}

fn dashboard_text(stats: &DashboardStats, now: NaiveDateTime) -> String {
    format!(
        "<b>🔧 Админ панель Shard VPN</b>\n\n\
         <b>📊 Быстрая статистика:</b>\n\
         • Всего пользователей: <code>{}</code>\n\
         • Активных подписок: <code>{}</code>\n\
         • Доход за месяц: <code>{}₽</code>\n\
         • Новых за сегодня: <code>{}</code>\n\n\
         <b>🕐 Время:</b> <code>{}</code>",
        stats.total_users,
        stats.active_subs,
        rub(stats.monthly_revenue),
        stats.new_today,
        to_stored_string(&now),
    )
}

fn periods_text(stats: &DetailedStats, suffix: &str) -> String {
    stats::REPORTED_PERIODS
        .iter()
        .map(|&m| {
            format!(
                "• {m} {}: <code>{}</code>{suffix}",
                keyboards::month_word(m as u32),
                stats.payments.count_for_period(m)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn detailed_text(stats: &DetailedStats) -> String {
    let u = &stats.users;
    let p = &stats.payments;
    format!(
        "<b>📊 Подробная статистика</b>\n\n\
         <b>👥 Пользователи:</b>\n\
         • Всего пользователей бота: <code>{}</code>\n\
         • Активных подписок: <code>{}</code>\n\
         • Истекших подписок: <code>{}</code>\n\
         • Новых за сегодня: <code>{}</code>\n\
         • Новых за неделю: <code>{}</code>\n\n\
         <b>💰 Финансы:</b>\n\
         • Доход за сегодня: <code>{}₽</code>\n\
         • Доход за неделю: <code>{}₽</code>\n\
         • Доход за месяц: <code>{}₽</code>\n\
         • Средний чек: <code>{}₽</code>\n\n\
         <b>📈 Подписки по периодам:</b>\n{}",
        u.total_users,
        u.active_subs,
        u.expired_subs,
        u.new_today,
        u.new_week,
        rub(p.revenue_today),
        rub(p.revenue_week),
        rub(p.revenue_month),
        rub(p.avg_payment),
        periods_text(stats, ""),
    )
}

fn payments_text(stats: &DetailedStats) -> String {
    let p = &stats.payments;
    format!(
        "<b>💰 Статистика платежей</b>\n\n\
         <b>📊 Доходы:</b>\n\
         • За сегодня: <code>{}₽</code>\n\
         • За неделю: <code>{}₽</code>\n\
         • За месяц: <code>{}₽</code>\n\
         • Средний чек: <code>{}₽</code>\n\n\
         <b>📈 Подписки по периодам:</b>\n{}",
        rub(p.revenue_today),
        rub(p.revenue_week),
        rub(p.revenue_month),
        rub(p.avg_payment),
        periods_text(stats, " шт."),
    )
}

async fn dashboard(ctx: &BotContext) -> String {
    let now = ctx.service.now();
    let detailed = stats::collect(ctx.service.store().as_ref(), now).await;
    dashboard_text(&DashboardStats::from(&detailed), now)
}

/// `/admin` command.
pub async fn open_panel(ctx: &BotContext, msg: &IncomingMessage) -> Result<(), AppError> {
    let admin_id = msg.from.id;
    if !ctx.is_admin(admin_id) {
        tracing::warn!(user_id = admin_id, "admin panel requested by non-admin");
        ctx.messenger
            .send_text(
                msg.chat_id,
                "❌ У вас нет прав доступа к админ панели.",
                None,
            )
            .await?;
        return Ok(());
    }
    ctx.admin_sessions.clear(admin_id);
    let text = dashboard(ctx).await;
    ctx.messenger
        .send_text(msg.chat_id, &text, Some(keyboards::admin_home().into()))
        .await?;
    Ok(())
}

/// Replaces the panel message in place, or sends a new one when it is gone.
async fn show(
    ctx: &BotContext,
    cb: &IncomingCallback,
    text: &str,
    keyboard: InlineKeyboard,
) -> Result<(), AppError> {
    match cb.message_id() {
        Some(id) => {
            ctx.messenger
                .edit_text(cb.chat_id(), id, text, Some(keyboard))
                .await?
        }
        None => {
            ctx.messenger
                .send_text(cb.chat_id(), text, Some(keyboard.into()))
                .await?;
        }
    }
    Ok(())
}

pub async fn handle_action(
    ctx: &BotContext,
    cb: &IncomingCallback,
    action: AdminAction,
) -> Result<CallbackReply, AppError> {
    let admin_id = cb.from.id;
    let back_to_users = || keyboards::admin_back(AdminAction::Users);

    match action {
        AdminAction::Home => {
            ctx.admin_sessions.clear(admin_id);
            show(ctx, cb, &dashboard(ctx).await, keyboards::admin_home()).await?;
        }
        AdminAction::RecalcStats => {
            show(ctx, cb, &dashboard(ctx).await, keyboards::admin_home()).await?;
            return Ok(CallbackReply::alert("📊 Статистика пересчитана!"));
        }
        AdminAction::Stats => {
            let detailed = stats::collect(ctx.service.store().as_ref(), ctx.service.now()).await;
            let text = detailed_text(&detailed);
            show(ctx, cb, &text, keyboards::admin_back(AdminAction::Home)).await?;
        }
        AdminAction::Payments => {
            let detailed = stats::collect(ctx.service.store().as_ref(), ctx.service.now()).await;
            let text = payments_text(&detailed);
            show(ctx, cb, &text, keyboards::admin_back(AdminAction::Home)).await?;
        }
        AdminAction::Users => {
            ctx.admin_sessions.clear(admin_id);
            show(
                ctx,
                cb,
                "<b>👥 Управление пользователями</b>\n\nВыберите действие:",
                keyboards::admin_users(),
            )
            .await?;
        }
        AdminAction::FindUser => {
            ctx.admin_sessions.begin(admin_id, AdminPrompt::FindUser);
            show(
                ctx,
                cb,
                "<b>🔍 Поиск пользователя</b>\n\nОтправьте ID пользователя для поиска:",
                back_to_users(),
            )
            .await?;
        }
        AdminAction::GrantPrompt => {
            ctx.admin_sessions.begin(admin_id, AdminPrompt::GrantUserId);
            show(
                ctx,
                cb,
                "<b>🎁 Выдача подписки</b>\n\nОтправьте ID пользователя, которому хотите выдать подписку:",
                back_to_users(),
            )
            .await?;
        }
        AdminAction::ActiveList | AdminAction::ExpiringList | AdminAction::ExpiredList => {
            let text = match subscription_list(ctx, &action).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("failed to load subscription list: {}", e);
                    return Ok(CallbackReply::alert("Ошибка получения данных"));
                }
            };
            show(ctx, cb, &text, back_to_users()).await?;
        }
        AdminAction::RecentUsers => {
            let text = match recent_users(ctx).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("failed to load bot users: {}", e);
                    return Ok(CallbackReply::alert("Ошибка получения данных"));
                }
            };
            show(ctx, cb, &text, back_to_users()).await?;
        }
        AdminAction::BroadcastMenu => {
            ctx.admin_sessions.clear(admin_id);
            show(
                ctx,
                cb,
                "<b>📢 Рассылка сообщений</b>\n\n\
                 Выберите целевую аудиторию для рассылки:\n\n\
                 <blockquote><i>⚠️ После выбора отправьте текст сообщения или фото с подписью для рассылки</i></blockquote>",
                keyboards::broadcast_audiences(),
            )
            .await?;
        }
        AdminAction::BroadcastTo(audience) => {
            ctx.admin_sessions
                .begin(admin_id, AdminPrompt::BroadcastMessage(audience));
            let text = format!(
                "<b>📢 Рассылка {}</b>\n\n\
                 Отправьте сообщение или фото с подписью, которое хотите разослать.\n\n\
                 <blockquote><i>⚠️ Будьте осторожны! Отменить рассылку будет невозможно.</i></blockquote>",
                audience.label()
            );
            show(ctx, cb, &text, keyboards::broadcast_cancel()).await?;
        }
        AdminAction::Close => {
            ctx.admin_sessions.clear(admin_id);
            if let Some(id) = cb.message_id() {
                ctx.messenger.delete_message(cb.chat_id(), id).await?;
            }
            return Ok(CallbackReply::Toast("Админ панель закрыта".into()));
        }
        AdminAction::Extend { user_id, days } => {
            return Ok(mutation_reply(
                ctx.service.admin_extend(user_id, days).await,
                user_id,
                |expiry| {
                    format!(
                        "✅ Подписка пользователя {user_id} продлена на {days} {} (до {})",
                        day_word(days),
                        to_stored_string(&expiry)
                    )
                },
                "продления подписки",
            ));
        }
        AdminAction::Deactivate(user_id) => {
            return Ok(mutation_reply(
                ctx.service.admin_deactivate(user_id).await,
                user_id,
                |_| format!("✅ Подписка пользователя {user_id} деактивирована"),
                "деактивации подписки",
            ));
        }
        AdminAction::Activate(user_id) => {
            return Ok(mutation_reply(
                ctx.service.admin_activate(user_id).await,
                user_id,
                |outcome| match outcome {
                    Activation::FlagRestored => {
                        format!("✅ Подписка пользователя {user_id} активирована")
                    }
                    Activation::Restored { expiry } => format!(
                        "✅ Подписка пользователя {user_id} активирована до {}",
                        to_stored_string(&expiry)
                    ),
                    Activation::Grace { expiry } => format!(
                        "✅ Подписка пользователя {user_id} активирована с льготным периодом до {}",
                        to_stored_string(&expiry)
                    ),
                },
                "активации подписки",
            ));
        }
        AdminAction::Delete(user_id) => {
            return Ok(mutation_reply(
                ctx.service.admin_delete(user_id).await,
                user_id,
                |_| format!("✅ Пользователь {user_id} удален"),
                "удаления пользователя",
            ));
        }
        AdminAction::Grant { user_id, days } => {
            return Ok(mutation_reply(
                ctx.service.admin_grant(user_id, days).await,
                user_id,
                |renewal| {
                    let mut text = format!(
                        "✅ Пользователю {user_id} выдана подписка на {days} {}",
                        day_word(days)
                    );
                    if !renewal.token_ready {
                        text.push_str("\n⚠️ Конфиг будет выдан при первом подключении");
                    }
                    text
                },
                "выдачи подписки",
            ));
        }
    }
    Ok(CallbackReply::Ack)
}

/// Alert answer for a direct admin mutation.
fn mutation_reply<T>(
    result: Result<T, AppError>,
    user_id: i64,
    done: impl FnOnce(T) -> String,
    operation: &str,
) -> CallbackReply {
    match result {
        Ok(value) => CallbackReply::Alert(done(value)),
        Err(AppError::NotFound(_)) => {
            CallbackReply::Alert(format!("❌ Пользователь {user_id} не найден"))
        }
        Err(e) => {
            tracing::error!(user_id, operation, "admin operation failed: {}", e);
            CallbackReply::Alert(format!("❌ Ошибка {operation} пользователя {user_id}"))
        }
    }
}

fn newest_first(subs: &mut [Subscription]) {
    subs.sort_by(|a, b| b.payment_at().cmp(&a.payment_at()));
}

async fn subscription_list(ctx: &BotContext, action: &AdminAction) -> Result<String, AppError> {
    let now = ctx.service.now();
    let mut subs = ctx.service.store().list_subscriptions().await?;
    newest_first(&mut subs);

    let keep = |s: &Subscription| match action {
        AdminAction::ActiveList => s.is_enabled_and_active_at(now),
        AdminAction::ExpiringList => {
            s.is_enabled_and_active_at(now)
                && status::is_expiring_at(s.expiry_date.as_deref(), now)
        }
        _ => s.active && !s.is_active_at(now) && s.expiry_date.is_some(),
    };
    let rows: Vec<&Subscription> = subs.iter().filter(|s| keep(s)).take(LIST_LIMIT).collect();

    let (title, empty, verb) = match action {
        AdminAction::ActiveList => (
            format!("👥 Активные пользователи (последние {LIST_LIMIT})"),
            "<b>👥 Активные пользователи</b>\n\nНет активных пользователей",
            "до",
        ),
        AdminAction::ExpiringList => (
            format!(
                "⏰ Истекающие подписки (ближайшие {} дня)",
                status::EXPIRING_WINDOW_DAYS
            ),
            "<b>⏰ Истекающие подписки</b>\n\nНет истекающих подписок в ближайшие 3 дня",
            "истекает",
        ),
        _ => (
            format!("❌ Истекшие подписки (последние {LIST_LIMIT})"),
            "<b>❌ Истекшие подписки</b>\n\nНет истекших подписок",
            "истекла",
        ),
    };
    if rows.is_empty() {
        return Ok(empty.to_string());
    }

    let mut text = format!("<b>{title}</b>\n\n");
    for s in rows {
        text.push_str(&format!(
            "• ID: <code>{}</code> {verb} <code>{}</code>\n",
            s.user_id,
            escape_html(s.expiry_date.as_deref().unwrap_or_default())
        ));
    }
    Ok(text)
}

async fn recent_users(ctx: &BotContext) -> Result<String, AppError> {
    let store = ctx.service.store();
    let mut users = store.list_bot_users().await?;
    if users.is_empty() {
        return Ok("<b>👥 Все пользователи бота</b>\n\nНет пользователей".to_string());
    }
    let subscribed: HashSet<i64> = store
        .list_subscriptions()
        .await?
        .into_iter()
        .map(|s| s.user_id)
        .collect();
    users.sort_by(|a, b| b.first_seen_at().cmp(&a.first_seen_at()));

    let mut text = format!("<b>👥 Все пользователи бота (последние {RECENT_USERS_LIMIT})</b>\n\n");
    for u in users.iter().take(RECENT_USERS_LIMIT) {
        let mark = if subscribed.contains(&u.id) { "💎" } else { "👤" };
        let name = u
            .first_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .map(escape_html)
            .unwrap_or_else(|| "Без имени".to_string());
        text.push_str(&format!("{mark} <code>{}</code> - {name}\n", u.id));
    }
    text.push_str("\n💎 - есть подписка\n👤 - только запускал бота");
    Ok(text)
}

/// Free-text input from an admin; only meaningful while a prompt is pending.
pub async fn handle_input(ctx: &BotContext, msg: &IncomingMessage) -> Result<(), AppError> {
    let admin_id = msg.from.id;
    let Some(prompt) = ctx.admin_sessions.take(admin_id) else {
        tracing::debug!(user_id = admin_id, "admin message without a pending prompt");
        return Ok(());
    };

    match prompt {
        AdminPrompt::FindUser | AdminPrompt::GrantUserId => {
            let Some(user_id) = msg.text.as_deref().and_then(|t| t.trim().parse::<i64>().ok())
            else {
                ctx.admin_sessions.begin(admin_id, prompt);
                ctx.messenger
                    .send_text(msg.chat_id, "❌ Отправьте числовой ID пользователя.", None)
                    .await?;
                return Ok(());
            };
            if prompt == AdminPrompt::FindUser {
                user_card(ctx, msg.chat_id, user_id).await
            } else {
                guided_grant(ctx, msg.chat_id, user_id).await
            }
        }
        AdminPrompt::BroadcastMessage(audience) => {
            let content = match (&msg.photo, &msg.text) {
                (Some(file_id), _) => BroadcastContent::Photo {
                    photo: Media::FileId(file_id.clone()),
                    caption: msg.caption.clone().unwrap_or_default(),
                },
                (None, Some(text)) => BroadcastContent::Text(text.clone()),
                (None, None) => {
                    ctx.admin_sessions.begin(admin_id, prompt);
                    return Ok(());
                }
            };
            broadcast(ctx, msg.chat_id, audience, &content).await
        }
    }
}

async fn user_card(ctx: &BotContext, chat_id: i64, user_id: i64) -> Result<(), AppError> {
    let store = ctx.service.store();
    let now = ctx.service.now();

    let (text, keyboard) = if let Some(sub) = store.get_subscription(user_id).await? {
        let active = sub.is_enabled_and_active_at(now);
        let payments = store.list_user_payments(user_id).await?;
        let paid: f64 = payments.iter().map(|p| p.amount).sum();
        let token = match sub.token() {
            Some(t) if t.chars().count() > 20 => {
                format!("{}...", t.chars().take(20).collect::<String>())
            }
            Some(t) => t.to_string(),
            None => "Отсутствует".to_string(),
        };
        let text = format!(
            "<b>👤 Информация о пользователе</b>\n\n\
             <b>ID:</b> <code>{user_id}</code>\n\
             <b>Подписка:</b> {}\n\
             <b>Дата платежа:</b> <code>{}</code>\n\
             <b>Дата окончания:</b> <code>{}</code>\n\
             <b>Платежей:</b> <code>{} на {}₽</code>\n\
             <b>Конфиг:</b> <code>{}</code>\n\
             <b>Последнее обновление:</b> <code>{}</code>",
            if active { "🟢 Активна" } else { "🔴 Неактивна" },
            escape_html(sub.payment_date.as_deref().unwrap_or("Не указана")),
            escape_html(sub.expiry_date.as_deref().unwrap_or("Не указана")),
            payments.len(),
            rub(paid),
            escape_html(&token),
            escape_html(sub.last_update.as_deref().unwrap_or("Не указано")),
        );
        let keyboard = if active {
            keyboards::user_card_active(user_id)
        } else {
            keyboards::user_card_inactive(user_id)
        };
        (text, keyboard)
    } else if let Some(user) = store.get_bot_user(user_id).await? {
        let name = user
            .display_name()
            .map(|n| escape_html(&n))
            .unwrap_or_else(|| "Не указано".to_string());
        let text = format!(
            "<b>👤 Информация о пользователе</b>\n\n\
             <b>ID:</b> <code>{user_id}</code>\n\
             <b>Имя:</b> <code>{name}</code>\n\
             <b>Статус:</b> 🔴 Нет подписки\n\
             <b>Взаимодействие с ботом:</b> ✅ Есть\n\n\
             <i>Пользователь запускал бота, но не имеет VPN подписки</i>"
        );
        (
            text,
            keyboards::grant_options(user_id, &CARD_GRANT_DAYS, "🎁 Выдать "),
        )
    } else {
        (
            format!("❌ Пользователь с ID <code>{user_id}</code> не найден."),
            keyboards::admin_back(AdminAction::Users),
        )
    };

    ctx.messenger
        .send_text(chat_id, &text, Some(keyboard.into()))
        .await?;
    Ok(())
}

async fn guided_grant(ctx: &BotContext, chat_id: i64, user_id: i64) -> Result<(), AppError> {
    let store = ctx.service.store();
    let back = keyboards::admin_back(AdminAction::Users);

    let (text, keyboard) = match store.get_bot_user(user_id).await? {
        None => (
            format!(
                "❌ Пользователь с ID <code>{user_id}</code> не найден в базе бота.\n\n\
                 <i>Пользователь должен сначала запустить бота командой /start</i>"
            ),
            back,
        ),
        Some(_) if store.get_subscription(user_id).await?.is_some() => (
            format!(
                "⚠️ У пользователя <code>{user_id}</code> уже есть подписка.\n\n\
                 <i>Используйте поиск пользователя для управления существующей подпиской.</i>"
            ),
            back,
        ),
        Some(user) => {
            let name = user
                .display_name()
                .map(|n| escape_html(&n))
                .unwrap_or_else(|| "Без имени".to_string());
            (
                format!(
                    "<b>🎁 Выдача подписки</b>\n\n\
                     <b>Пользователь:</b> {name} (<code>{user_id}</code>)\n\n\
                     Выберите период подписки:"
                ),
                keyboards::grant_options(user_id, &GUIDED_GRANT_DAYS, "🎁 "),
            )
        }
    };

    ctx.messenger
        .send_text(chat_id, &text, Some(keyboard.into()))
        .await?;
    Ok(())
}

async fn broadcast(
    ctx: &BotContext,
    chat_id: i64,
    audience: Audience,
    content: &BroadcastContent,
) -> Result<(), AppError> {
    ctx.messenger
        .send_text(chat_id, "📤 Начинаю рассылку...", None)
        .await?;

    let recipients = load_audience(ctx.service.store().as_ref(), audience, ctx.service.now()).await?;
    tracing::info!(
        audience = audience.as_str(),
        recipients = recipients.len(),
        "broadcast started"
    );
    let report = send_broadcast(
        ctx.messenger.as_ref(),
        &recipients,
        content,
        ctx.broadcast_delay(),
    )
    .await;

    let text = format!(
        "<b>📊 Результат рассылки</b>\n\n\
         <b>Успешно отправлено:</b> <code>{}</code>\n\
         <b>Ошибки отправки:</b> <code>{}</code>\n\
         <b>Заблокировали бота:</b> <code>{}</code>\n\
         <b>Всего пользователей:</b> <code>{}</code>",
        report.success, report.failed, report.blocked, report.total
    );
    ctx.messenger.send_text(chat_id, &text, None).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::handle_callback;
    use crate::bot::messenger::SendError;
    use crate::storage::Database;
    use crate::storage::time::now_local;
    use crate::subscription::{SubscriptionStore, SubscriptionUpsert};
    use crate::test_support::{
        ADMIN_ID, FakeMessenger, FakeProvisioner, ScriptedGateway, Sent, bot_context, callback,
        message, temp_db,
    };
    use crate::users::{BotUserStore, UserProfile};
    use chrono::Duration;

    async fn seed(db: &Database, user_id: i64, expiry_in_days: i64) {
        db.touch_user(&UserProfile::bare(user_id)).await.unwrap();
        db.upsert_subscription(&SubscriptionUpsert {
            user_id,
            payment_date: now_local() - Duration::days(1),
            expiry: now_local() + Duration::days(expiry_in_days),
            token: format!("tok-{user_id}"),
        })
        .await
        .unwrap();
    }

    fn last_alert(messenger: &FakeMessenger) -> Option<String> {
        messenger.answers().into_iter().rev().find_map(|s| match s {
            Sent::Answer {
                text, alert: true, ..
            } => text,
            _ => None,
        })
    }

    #[test]
    fn rubles_drop_zero_cents() {
        assert_eq!(rub(149.0), "149");
        assert_eq!(rub(182.333), "182.33");
    }

    #[tokio::test]
    async fn panel_requires_allow_list() {
        let (_dir, db) = temp_db().await;
        let messenger = FakeMessenger::new();
        let ctx = bot_context(
            db,
            FakeProvisioner::new(),
            ScriptedGateway::new(Vec::new()),
            messenger.clone(),
        );

        open_panel(&ctx, &message(5, "/admin")).await.unwrap();
        assert_eq!(
            messenger.texts_to(5),
            vec!["❌ У вас нет прав доступа к админ панели.".to_string()]
        );

        open_panel(&ctx, &message(ADMIN_ID, "/admin")).await.unwrap();
        assert!(messenger.texts_to(ADMIN_ID)[0].contains("Админ панель Shard VPN"));
    }

    #[tokio::test]
    async fn find_user_prompt_is_consumed_by_one_id() {
        let (_dir, db) = temp_db().await;
        let messenger = FakeMessenger::new();
        let ctx = bot_context(
            db.clone(),
            FakeProvisioner::new(),
            ScriptedGateway::new(Vec::new()),
            messenger.clone(),
        );
        seed(&db, 300, 10).await;

        handle_callback(&ctx, &callback(ADMIN_ID, "admin_find_user")).await;
        handle_input(&ctx, &message(ADMIN_ID, "abc")).await.unwrap();
        handle_input(&ctx, &message(ADMIN_ID, "300")).await.unwrap();
        handle_input(&ctx, &message(ADMIN_ID, "300")).await.unwrap();

        let texts = messenger.texts_to(ADMIN_ID);
        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains("числовой ID"));
        assert!(texts[1].contains("🟢 Активна"));
        assert!(texts[1].contains("tok-300"));
    }

    #[tokio::test]
    async fn user_card_summarizes_payment_history() {
        let (_dir, db) = temp_db().await;
        let messenger = FakeMessenger::new();
        let ctx = bot_context(
            db.clone(),
            FakeProvisioner::new(),
            ScriptedGateway::new(Vec::new()),
            messenger.clone(),
        );
        let month = crate::config::Plan {
            months: 1,
            price_rub: 149,
        };
        ctx.service.record_purchase(302, month).await.unwrap();
        ctx.service.record_purchase(302, month).await.unwrap();
        ctx.service.admin_grant(302, 7).await.unwrap();

        user_card(&ctx, ADMIN_ID, 302).await.unwrap();

        let card = &messenger.texts_to(ADMIN_ID)[0];
        assert!(card.contains("🟢 Активна"));
        assert!(card.contains("<b>Платежей:</b> <code>3 на 298₽</code>"));
    }

    #[tokio::test]
    async fn user_card_for_registry_only_user_offers_grants() {
        let (_dir, db) = temp_db().await;
        let messenger = FakeMessenger::new();
        let ctx = bot_context(
            db.clone(),
            FakeProvisioner::new(),
            ScriptedGateway::new(Vec::new()),
            messenger.clone(),
        );
        db.touch_user(&UserProfile {
            id: 301,
            first_name: Some("<Ann>".into()),
            ..UserProfile::default()
        })
        .await
        .unwrap();

        user_card(&ctx, ADMIN_ID, 301).await.unwrap();
        user_card(&ctx, ADMIN_ID, 999).await.unwrap();

        let sent = messenger.sent();
        let Sent::Text {
            text,
            markup: Some(crate::bot::messenger::Markup::Inline(kb)),
            ..
        } = &sent[0]
        else {
            panic!("card should carry an inline keyboard");
        };
        assert!(text.contains("&lt;Ann&gt;"));
        assert!(kb.callbacks().any(|d| d == "give_subscription_301_90"));
        assert!(messenger.texts_to(ADMIN_ID)[1].contains("не найден"));
    }

    #[tokio::test]
    async fn guided_grant_checks_registry_and_existing_subscription() {
        let (_dir, db) = temp_db().await;
        let messenger = FakeMessenger::new();
        let ctx = bot_context(
            db.clone(),
            FakeProvisioner::new(),
            ScriptedGateway::new(Vec::new()),
            messenger.clone(),
        );
        seed(&db, 302, 10).await;
        db.touch_user(&UserProfile::bare(303)).await.unwrap();

        guided_grant(&ctx, ADMIN_ID, 404).await.unwrap();
        guided_grant(&ctx, ADMIN_ID, 302).await.unwrap();
        guided_grant(&ctx, ADMIN_ID, 303).await.unwrap();

        let texts = messenger.texts_to(ADMIN_ID);
        assert!(texts[0].contains("не найден в базе бота"));
        assert!(texts[1].contains("уже есть подписка"));
        assert!(texts[2].contains("Без имени"));
    }

    #[tokio::test]
    async fn mutations_answer_with_alerts() {
        let (_dir, db) = temp_db().await;
        let messenger = FakeMessenger::new();
        let ctx = bot_context(
            db.clone(),
            FakeProvisioner::new(),
            ScriptedGateway::new(Vec::new()),
            messenger.clone(),
        );
        seed(&db, 304, 10).await;

        handle_callback(&ctx, &callback(ADMIN_ID, "extend_user_404_7")).await;
        assert_eq!(
            last_alert(&messenger).as_deref(),
            Some("❌ Пользователь 404 не найден")
        );

        handle_callback(&ctx, &callback(ADMIN_ID, "deactivate_user_304")).await;
        assert_eq!(
            last_alert(&messenger).as_deref(),
            Some("✅ Подписка пользователя 304 деактивирована")
        );
        let sub = db.get_subscription(304).await.unwrap().unwrap();
        assert!(!sub.is_enabled_and_active_at(now_local()));

        handle_callback(&ctx, &callback(ADMIN_ID, "give_subscription_305_30")).await;
        assert_eq!(
            last_alert(&messenger).as_deref(),
            Some("✅ Пользователю 305 выдана подписка на 30 дней")
        );

        handle_callback(&ctx, &callback(ADMIN_ID, "delete_user_304")).await;
        assert_eq!(
            last_alert(&messenger).as_deref(),
            Some("✅ Пользователь 304 удален")
        );
        assert!(db.get_subscription(304).await.unwrap().is_none());
        assert!(db.get_bot_user(304).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lists_filter_by_status() {
        let (_dir, db) = temp_db().await;
        let ctx = bot_context(
            db.clone(),
            FakeProvisioner::new(),
            ScriptedGateway::new(Vec::new()),
            FakeMessenger::new(),
        );
        seed(&db, 310, 30).await;
        seed(&db, 311, 2).await;
        seed(&db, 312, -5).await;

        let active = subscription_list(&ctx, &AdminAction::ActiveList).await.unwrap();
        assert!(active.contains("310") && active.contains("311") && !active.contains("312"));
        let expiring = subscription_list(&ctx, &AdminAction::ExpiringList).await.unwrap();
        assert!(expiring.contains("311") && !expiring.contains("310"));
        let expired = subscription_list(&ctx, &AdminAction::ExpiredList).await.unwrap();
        assert!(expired.contains("312") && !expired.contains("311"));

        let recent = recent_users(&ctx).await.unwrap();
        assert!(recent.contains("💎 <code>310</code> - Без имени"));
    }

    #[tokio::test]
    async fn broadcast_prompt_sends_and_reports() {
        let (_dir, db) = temp_db().await;
        let messenger = FakeMessenger::new();
        let ctx = bot_context(
            db.clone(),
            FakeProvisioner::new(),
            ScriptedGateway::new(Vec::new()),
            messenger.clone(),
        );
        seed(&db, 320, 10).await;
        seed(&db, 321, 10).await;
        db.touch_user(&UserProfile::bare(322)).await.unwrap();
        messenger.fail_for(321, SendError::Blocked);

        handle_callback(&ctx, &callback(ADMIN_ID, "broadcast_active")).await;
        handle_input(&ctx, &message(ADMIN_ID, "Новые серверы!"))
            .await
            .unwrap();

        assert_eq!(messenger.texts_to(320), vec!["Новые серверы!".to_string()]);
        assert!(messenger.texts_to(322).is_empty());
        let report = messenger.texts_to(ADMIN_ID).pop().unwrap();
        assert!(report.contains("Успешно отправлено:</b> <code>1</code>"));
        assert!(report.contains("Заблокировали бота:</b> <code>1</code>"));
        assert!(report.contains("Всего пользователей:</b> <code>2</code>"));

        handle_input(&ctx, &message(ADMIN_ID, "второй раз")).await.unwrap();
        assert_eq!(messenger.texts_to(320).len(), 1);
    }

    #[tokio::test]
    async fn closing_panel_clears_pending_prompt() {
        let (_dir, db) = temp_db().await;
        let messenger = FakeMessenger::new();
        let ctx = bot_context(
            db,
            FakeProvisioner::new(),
            ScriptedGateway::new(Vec::new()),
            messenger.clone(),
        );

        handle_callback(&ctx, &callback(ADMIN_ID, "admin_give_subscription")).await;
        handle_callback(&ctx, &callback(ADMIN_ID, "admin_close")).await;

        assert!(ctx.admin_sessions.take(ADMIN_ID).is_none());
        assert!(messenger.sent().contains(&Sent::Delete {
            chat_id: ADMIN_ID,
            message_id: 50
        }));
        assert_eq!(
            messenger.answers().last(),
            Some(&Sent::Answer {
                callback_id: format!("cb-{ADMIN_ID}"),
                text: Some("Админ панель закрыта".into()),
                alert: false
            })
        );
    }
}
