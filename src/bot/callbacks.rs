//! Callback payloads carried by inline buttons.

use crate::bot::broadcast::Audience;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Ios,
    Android,
    Windows,
    MacOs,
}

impl Device {
    pub const ALL: [Device; 4] = [Device::Ios, Device::Android, Device::Windows, Device::MacOs];

    pub fn as_str(self) -> &'static str {
        match self {
            Device::Ios => "ios",
            Device::Android => "android",
            Device::Windows => "win",
            Device::MacOs => "mac",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Device::ALL.into_iter().find(|d| d.as_str() == s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// Verify channel membership and issue the trial.
    CheckChannel,
    /// Send the plan picker as a new message.
    Subscribe,
    /// Replace the current message with the plan picker.
    BackToPlans,
    ChoosePlan(u32),
    CheckPayment(String),
    Instructions,
    DeviceInstructions(Device),
    Renew,
    Admin(AdminAction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminAction {
    Home,
    Stats,
    Payments,
    Users,
    BroadcastMenu,
    BroadcastTo(Audience),
    FindUser,
    GrantPrompt,
    ActiveList,
    ExpiringList,
    ExpiredList,
    RecentUsers,
    RecalcStats,
    Close,
    Extend { user_id: i64, days: i64 },
    Deactivate(i64),
    Activate(i64),
    Delete(i64),
    Grant { user_id: i64, days: i64 },
}

fn id_and_days(rest: &str) -> Option<(i64, i64)> {
    let (id, days) = rest.rsplit_once('_')?;
    Some((id.parse().ok()?, days.parse().ok()?))
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let action = match data {
            "check_sub" => CallbackAction::CheckChannel,
            "subscribe" | "subscribe_from_profile" => CallbackAction::Subscribe,
            "back" => CallbackAction::BackToPlans,
            "instruction" => CallbackAction::Instructions,
            "renew_sub" => CallbackAction::Renew,
            _ => return Self::parse_prefixed(data),
        };
        Some(action)
    }

    fn parse_prefixed(data: &str) -> Option<Self> {
        if let Some(m) = data.strip_prefix("sub_") {
            return m.parse().ok().map(CallbackAction::ChoosePlan);
        }
        if let Some(id) = data.strip_prefix("check_pay:") {
            return (!id.is_empty()).then(|| CallbackAction::CheckPayment(id.to_string()));
        }
        if let Some(d) = data.strip_prefix("instruction_") {
            return Device::parse(d).map(CallbackAction::DeviceInstructions);
        }
        AdminAction::parse(data).map(CallbackAction::Admin)
    }

    pub fn to_data(&self) -> String {
        match self {
            CallbackAction::CheckChannel => "check_sub".into(),
            CallbackAction::Subscribe => "subscribe".into(),
            CallbackAction::BackToPlans => "back".into(),
            CallbackAction::ChoosePlan(m) => format!("sub_{m}"),
            CallbackAction::CheckPayment(id) => format!("check_pay:{id}"),
            CallbackAction::Instructions => "instruction".into(),
            CallbackAction::DeviceInstructions(d) => format!("instruction_{}", d.as_str()),
            CallbackAction::Renew => "renew_sub".into(),
            CallbackAction::Admin(a) => a.to_data(),
        }
    }
}

impl AdminAction {
    pub fn parse(data: &str) -> Option<Self> {
        let action = match data {
            "admin_back_main" => AdminAction::Home,
            "admin_stats" => AdminAction::Stats,
            "admin_payments" => AdminAction::Payments,
            "admin_users" => AdminAction::Users,
            "admin_broadcast" => AdminAction::BroadcastMenu,
            "admin_find_user" => AdminAction::FindUser,
            "admin_give_subscription" => AdminAction::GrantPrompt,
            "admin_active_users" => AdminAction::ActiveList,
            "admin_expiring" => AdminAction::ExpiringList,
            "admin_expired" => AdminAction::ExpiredList,
            "admin_all_bot_users" => AdminAction::RecentUsers,
            "admin_recalc_stats" => AdminAction::RecalcStats,
            "admin_close" => AdminAction::Close,
            _ => return Self::parse_targeted(data),
        };
        Some(action)
    }

    fn parse_targeted(data: &str) -> Option<Self> {
        if let Some(aud) = data.strip_prefix("broadcast_") {
            return Audience::parse(aud).map(AdminAction::BroadcastTo);
        }
        if let Some(rest) = data.strip_prefix("extend_user_") {
            let (user_id, days) = id_and_days(rest)?;
            return Some(AdminAction::Extend { user_id, days });
        }
        if let Some(rest) = data.strip_prefix("give_subscription_") {
            let (user_id, days) = id_and_days(rest)?;
            return Some(AdminAction::Grant { user_id, days });
        }
        if let Some(id) = data.strip_prefix("deactivate_user_") {
            return id.parse().ok().map(AdminAction::Deactivate);
        }
        if let Some(id) = data.strip_prefix("activate_user_") {
            return id.parse().ok().map(AdminAction::Activate);
        }
        if let Some(id) = data.strip_prefix("delete_user_") {
            return id.parse().ok().map(AdminAction::Delete);
        }
        None
    }

    pub fn to_data(&self) -> String {
        match self {
            AdminAction::Home => "admin_back_main".into(),
            AdminAction::Stats => "admin_stats".into(),
            AdminAction::Payments => "admin_payments".into(),
            AdminAction::Users => "admin_users".into(),
            AdminAction::BroadcastMenu => "admin_broadcast".into(),
            AdminAction::BroadcastTo(a) => format!("broadcast_{}", a.as_str()),
            AdminAction::FindUser => "admin_find_user".into(),
            AdminAction::GrantPrompt => "admin_give_subscription".into(),
            AdminAction::ActiveList => "admin_active_users".into(),
            AdminAction::ExpiringList => "admin_expiring".into(),
            AdminAction::ExpiredList => "admin_expired".into(),
            AdminAction::RecentUsers => "admin_all_bot_users".into(),
            AdminAction::RecalcStats => "admin_recalc_stats".into(),
            AdminAction::Close => "admin_close".into(),
            AdminAction::Extend { user_id, days } => format!("extend_user_{user_id}_{days}"),
            AdminAction::Deactivate(id) => format!("deactivate_user_{id}"),
            AdminAction::Activate(id) => format!("activate_user_{id}"),
            AdminAction::Delete(id) => format!("delete_user_{id}"),
            AdminAction::Grant { user_id, days } => format!("give_subscription_{user_id}_{days}"),
        }
    }
}

impl From<AdminAction> for CallbackAction {
    fn from(a: AdminAction) -> Self {
        CallbackAction::Admin(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_payloads() {
        assert_eq!(CallbackAction::parse("sub_12"), Some(CallbackAction::ChoosePlan(12)));
        assert_eq!(
            CallbackAction::parse("subscribe_from_profile"),
            Some(CallbackAction::Subscribe)
        );
        assert_eq!(
            CallbackAction::parse("check_pay:2e1f-000f"),
            Some(CallbackAction::CheckPayment("2e1f-000f".into()))
        );
        assert_eq!(
            CallbackAction::parse("instruction_win"),
            Some(CallbackAction::DeviceInstructions(Device::Windows))
        );
        assert_eq!(CallbackAction::parse("instruction_linux"), None);
        assert_eq!(CallbackAction::parse("sub_x"), None);
        assert_eq!(CallbackAction::parse("check_pay:"), None);
        assert_eq!(CallbackAction::parse("promo_action"), None);
    }

    #[test]
    fn admin_payloads_carry_targets() {
        assert_eq!(
            CallbackAction::parse("extend_user_123456_30"),
            Some(CallbackAction::Admin(AdminAction::Extend {
                user_id: 123456,
                days: 30
            }))
        );
        assert_eq!(
            CallbackAction::parse("give_subscription_77_365"),
            Some(CallbackAction::Admin(AdminAction::Grant {
                user_id: 77,
                days: 365
            }))
        );
        assert_eq!(
            CallbackAction::parse("broadcast_expiring"),
            Some(CallbackAction::Admin(AdminAction::BroadcastTo(
                Audience::Expiring
            )))
        );
        assert_eq!(CallbackAction::parse("extend_user_12"), None);
        assert_eq!(CallbackAction::parse("broadcast_vip"), None);
    }

    #[test]
    fn data_fits_telegram_limit_and_parses_back() {
        let actions = [
            CallbackAction::Admin(AdminAction::Grant {
                user_id: 9_999_999_999,
                days: 365,
            }),
            CallbackAction::Admin(AdminAction::Deactivate(5_000_000_000)),
            CallbackAction::CheckPayment("2e1f6a3b-000f-5000-9000-1c2d3e4f5a6b".into()),
            CallbackAction::DeviceInstructions(Device::MacOs),
        ];
        for action in actions {
            let data = action.to_data();
            assert!(data.len() <= 64, "{data} is too long");
            assert_eq!(CallbackAction::parse(&data), Some(action));
        }
    }
}
