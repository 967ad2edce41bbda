use crate::bot::broadcast::Audience;
use crate::bot::callbacks::{AdminAction, CallbackAction, Device};
use crate::bot::messenger::{Button, InlineKeyboard, MenuKeyboard};
use crate::config::Plan;

pub const MENU_CONNECT: &str = "🌐Активировать VPN";
pub const MENU_ACCOUNT: &str = "👾Аккаунт";
pub const MENU_ABOUT: &str = "🔒О VPN";

fn cb(text: &str, action: impl Into<CallbackAction>) -> Button {
    Button::callback(text, action.into().to_data())
}

fn support_row(support_url: Option<&str>, text: &str) -> Option<Vec<Button>> {
    support_url.map(|url| vec![Button::url(text, url)])
}

pub fn main_menu() -> MenuKeyboard {
    MenuKeyboard {
        rows: vec![
            vec![MENU_CONNECT.to_string()],
            vec![MENU_ACCOUNT.to_string(), MENU_ABOUT.to_string()],
        ],
    }
}

/// `https://t.me/<name>` for a public channel given as `@name`.
pub fn channel_url(channel_id: &str) -> String {
    format!("https://t.me/{}", channel_id.trim_start_matches('@'))
}

pub fn trial_offer(channel_id: &str) -> InlineKeyboard {
    InlineKeyboard::new(vec![
        vec![Button::url("Подписаться", channel_url(channel_id))],
        vec![cb("✅ Проверить подписку", CallbackAction::CheckChannel)],
    ])
}

pub fn month_word(months: u32) -> &'static str {
    match (months % 10, months % 100) {
        (1, m) if m != 11 => "месяц",
        (2..=4, m) if !(12..=14).contains(&m) => "месяца",
        _ => "месяцев",
    }
}

pub fn day_word(days: i64) -> &'static str {
    match (days % 10, days % 100) {
        (1, d) if d != 11 => "день",
        (2..=4, d) if !(12..=14).contains(&d) => "дня",
        _ => "дней",
    }
}

pub fn plans(plans: &[Plan]) -> InlineKeyboard {
    InlineKeyboard::new(
        plans
            .iter()
            .map(|p| {
                vec![cb(
                    &format!("{} {} - {}₽", p.months, month_word(p.months), p.price_rub),
                    CallbackAction::ChoosePlan(p.months),
                )]
            })
            .collect(),
    )
}

pub fn subscribe_button() -> InlineKeyboard {
    InlineKeyboard::single(cb("💳 Оформить подписку", CallbackAction::Subscribe))
}

pub fn active_user_actions() -> InlineKeyboard {
    InlineKeyboard::new(vec![
        vec![cb("📖 Инструкция", CallbackAction::Instructions)],
        vec![cb("🔄 Продлить подписку", CallbackAction::Renew)],
    ])
}

pub fn pay(confirmation_url: &str, payment_id: &str, support_url: Option<&str>) -> InlineKeyboard {
    let mut rows = vec![
        vec![Button::url("💳 Оплатить ЮKassa", confirmation_url)],
        vec![cb(
            "🔄 Проверить оплату",
            CallbackAction::CheckPayment(payment_id.to_string()),
        )],
        vec![cb("🔙 Назад", CallbackAction::BackToPlans)],
    ];
    rows.extend(support_row(support_url, "📞 Поддержка"));
    InlineKeyboard::new(rows)
}

pub fn about(support_url: Option<&str>) -> Option<InlineKeyboard> {
    support_row(support_url, "🧑‍💻 Поддержка").map(|row| InlineKeyboard::new(vec![row]))
}

pub fn devices(support_url: Option<&str>) -> InlineKeyboard {
    let label = |d: Device| match d {
        Device::Ios => "📱 iOS",
        Device::Android => "🤖 Android",
        Device::Windows => "💻 Windows",
        Device::MacOs => "🍎 macOS",
    };
    let mut rows: Vec<Vec<Button>> = Device::ALL
        .into_iter()
        .map(|d| vec![cb(label(d), CallbackAction::DeviceInstructions(d))])
        .collect();
    rows.extend(support_row(support_url, "🧑‍💻 Поддержка"));
    InlineKeyboard::new(rows)
}

pub fn device_setup(
    store_url: Option<&str>,
    deep_link: &str,
    miniapp_url: Option<&str>,
    support_url: Option<&str>,
) -> InlineKeyboard {
    let mut rows = Vec::new();
    if let Some(url) = store_url {
        rows.push(vec![Button::url("⬇️ Скачать V2RayTun", url)]);
    }
    rows.push(vec![Button::url("🔌 Установить VPN", deep_link)]);
    if let Some(url) = miniapp_url {
        rows.push(vec![Button::url("🔗 Открыть миниапп", url)]);
    }
    rows.extend(support_row(support_url, "🆘 Поддержка"));
    InlineKeyboard::new(rows)
}

pub fn admin_home() -> InlineKeyboard {
    InlineKeyboard::new(vec![
        vec![
            cb("📊 Статистика", AdminAction::Stats),
            cb("👥 Пользователи", AdminAction::Users),
        ],
        vec![
            cb("💰 Платежи", AdminAction::Payments),
            cb("📢 Рассылка", AdminAction::BroadcastMenu),
        ],
        vec![cb("🔄 Обновить статистику", AdminAction::RecalcStats)],
        vec![cb("❌ Закрыть", AdminAction::Close)],
    ])
}

pub fn admin_users() -> InlineKeyboard {
    InlineKeyboard::new(vec![
        vec![
            cb("🔍 Найти пользователя", AdminAction::FindUser),
            cb("🎁 Выдать подписку", AdminAction::GrantPrompt),
        ],
        vec![
            cb("📋 Список активных", AdminAction::ActiveList),
            cb("⏰ Истекающие подписки", AdminAction::ExpiringList),
        ],
        vec![
            cb("❌ Истекшие подписки", AdminAction::ExpiredList),
            cb("👥 Все пользователи бота", AdminAction::RecentUsers),
        ],
        vec![cb("🔙 Назад", AdminAction::Home)],
    ])
}

pub fn admin_back(to: AdminAction) -> InlineKeyboard {
    InlineKeyboard::single(cb("🔙 Назад", to))
}

pub fn broadcast_audiences() -> InlineKeyboard {
    InlineKeyboard::new(vec![
        vec![
            cb("📢 Всем пользователям", AdminAction::BroadcastTo(Audience::All)),
            cb("💎 Только активным", AdminAction::BroadcastTo(Audience::Active)),
        ],
        vec![
            cb(
                "⏰ Истекающим подпискам",
                AdminAction::BroadcastTo(Audience::Expiring),
            ),
            cb("❌ Неактивным", AdminAction::BroadcastTo(Audience::Inactive)),
        ],
        vec![cb("🔙 Назад", AdminAction::Home)],
    ])
}

pub fn broadcast_cancel() -> InlineKeyboard {
    InlineKeyboard::single(cb("❌ Отмена", AdminAction::BroadcastMenu))
}

pub fn user_card_active(user_id: i64) -> InlineKeyboard {
    InlineKeyboard::new(vec![
        vec![
            cb("➕ Продлить на 7 дней", AdminAction::Extend { user_id, days: 7 }),
            cb("➕ Продлить на 30 дней", AdminAction::Extend { user_id, days: 30 }),
        ],
        vec![
            cb("🚫 Деактивировать", AdminAction::Deactivate(user_id)),
            cb("🗑 Удалить", AdminAction::Delete(user_id)),
        ],
        vec![cb("🔙 Назад", AdminAction::Users)],
    ])
}

pub fn user_card_inactive(user_id: i64) -> InlineKeyboard {
    InlineKeyboard::new(vec![
        vec![
            cb("🔄 Активировать", AdminAction::Activate(user_id)),
            cb("➕ Продлить на 30 дней", AdminAction::Extend { user_id, days: 30 }),
        ],
        vec![
            cb("🗑 Удалить", AdminAction::Delete(user_id)),
            cb("🔙 Назад", AdminAction::Users),
        ],
    ])
}

pub fn grant_options(user_id: i64, periods: &[i64], label_prefix: &str) -> InlineKeyboard {
    let mut rows: Vec<Vec<Button>> = periods
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|&days| {
                    cb(
                        &format!("{label_prefix}{days} {}", day_word(days)),
                        AdminAction::Grant { user_id, days },
                    )
                })
                .collect()
        })
        .collect();
    rows.push(vec![cb("🔙 Назад", AdminAction::Users)]);
    InlineKeyboard::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_labels_use_russian_plurals() {
        let kb = plans(&[
            Plan { months: 1, price_rub: 149 },
            Plan { months: 3, price_rub: 399 },
            Plan { months: 12, price_rub: 999 },
        ]);
        let labels: Vec<&str> = kb.rows.iter().map(|r| r[0].text.as_str()).collect();
        assert_eq!(labels, vec!["1 месяц - 149₽", "3 месяца - 399₽", "12 месяцев - 999₽"]);
        assert_eq!(kb.callbacks().collect::<Vec<_>>(), vec!["sub_1", "sub_3", "sub_12"]);
    }

    #[test]
    fn day_word_agrees_with_number() {
        assert_eq!(day_word(1), "день");
        assert_eq!(day_word(3), "дня");
        assert_eq!(day_word(14), "дней");
        assert_eq!(day_word(21), "день");
        assert_eq!(day_word(365), "дней");
    }

    #[test]
    fn grant_keyboard_pairs_periods() {
        let kb = grant_options(5, &[7, 30, 90, 365], "🎁 ");
        assert_eq!(kb.rows.len(), 3);
        assert_eq!(kb.rows[1][1].text, "🎁 365 дней");
        assert!(kb.callbacks().any(|d| d == "give_subscription_5_90"));
    }

    #[test]
    fn channel_url_drops_at_sign() {
        assert_eq!(channel_url("@shard_vpn"), "https://t.me/shard_vpn");
    }
}
