use std::time::Duration;

use crate::config::Plan;
use crate::lifecycle::{Renewal, SubscriptionService};
use crate::payment::{PaymentGateway, PaymentStatus};

/// A payment the bot is waiting on, with enough context to notify the payer.
#[derive(Debug, Clone)]
pub struct PaymentWatch {
    pub payment_id: String,
    pub user_id: i64,
    pub chat_id: i64,
    /// Message carrying the pay button; removed once the payment succeeds.
    pub message_id: Option<i32>,
    pub plan: Plan,
}

#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

#[derive(Debug)]
pub enum WatchOutcome {
    Completed(Renewal),
    /// Gateway reported `canceled` or `failed`.
    Abandoned,
    TimedOut,
    /// Payment succeeded but the subscription could not be recorded.
    BookkeepingFailed,
}

/// Polls the gateway until the payment settles or the attempt budget runs out.
/// Renewal bookkeeping runs at most once, on the first `succeeded` status.
pub async fn watch_payment(
    gateway: &dyn PaymentGateway,
    service: &SubscriptionService,
    watch: &PaymentWatch,
    policy: PollPolicy,
) -> WatchOutcome {
    for attempt in 1..=policy.max_attempts {
        match gateway.payment_status(&watch.payment_id).await {
            Ok(PaymentStatus::Succeeded) => {
                return match service.record_purchase(watch.user_id, watch.plan).await {
                    Ok(renewal) => WatchOutcome::Completed(renewal),
                    Err(e) => {
                        tracing::error!(
                            user_id = watch.user_id,
                            payment_id = %watch.payment_id,
                            "payment succeeded but subscription was not updated: {}",
                            e
                        );
                        WatchOutcome::BookkeepingFailed
                    }
                };
            }
            Ok(status) if status.is_final() => {
                tracing::info!(
                    user_id = watch.user_id,
                    payment_id = %watch.payment_id,
                    status = status.as_str(),
                    "payment abandoned"
                );
                return WatchOutcome::Abandoned;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    payment_id = %watch.payment_id,
                    attempt,
                    "payment status check failed: {}",
                    e
                );
            }
        }
        tokio::time::sleep(policy.interval).await;
    }

    tracing::warn!(
        user_id = watch.user_id,
        payment_id = %watch.payment_id,
        "payment did not complete after {} checks",
        policy.max_attempts
    );
    WatchOutcome::TimedOut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::payments::PaymentStore;
    use crate::test_support::{FakeProvisioner, ScriptedGateway, temp_db};
    use std::sync::Arc;

    const POLICY: PollPolicy = PollPolicy {
        interval: Duration::ZERO,
        max_attempts: 5,
    };

    fn watch(user_id: i64) -> PaymentWatch {
        PaymentWatch {
            payment_id: "pay-1".into(),
            user_id,
            chat_id: user_id,
            message_id: Some(10),
            plan: Plan {
                months: 1,
                price_rub: 149,
            },
        }
    }

    #[tokio::test]
    async fn success_books_renewal_once() {
        let (_dir, db) = temp_db().await;
        let service = SubscriptionService::new(db.clone(), FakeProvisioner::new());
        let gateway = ScriptedGateway::new(vec![
            Ok(PaymentStatus::Pending),
            Err(AppError::Gateway("flaky".into())),
            Ok(PaymentStatus::Succeeded),
            Ok(PaymentStatus::Succeeded),
        ]);

        let outcome = watch_payment(gateway.as_ref(), &service, &watch(1), POLICY).await;
        let WatchOutcome::Completed(renewal) = outcome else {
            panic!("expected completion, got {:?}", outcome);
        };
        assert!(!renewal.was_active);
        assert_eq!(gateway.polls(), 3);
        assert_eq!(db.list_user_payments(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn canceled_payment_books_nothing() {
        let (_dir, db) = temp_db().await;
        let service = SubscriptionService::new(db.clone(), FakeProvisioner::new());
        let gateway = ScriptedGateway::new(vec![
            Ok(PaymentStatus::WaitingForCapture),
            Ok(PaymentStatus::Canceled),
        ]);

        let outcome = watch_payment(gateway.as_ref(), &service, &watch(2), POLICY).await;
        assert!(matches!(outcome, WatchOutcome::Abandoned));
        assert!(db.list_user_payments(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn gives_up_after_attempt_budget() {
        let (_dir, db) = temp_db().await;
        let service = SubscriptionService::new(db.clone(), FakeProvisioner::new());
        let gateway: Arc<ScriptedGateway> = ScriptedGateway::new(Vec::new());

        let outcome = watch_payment(gateway.as_ref(), &service, &watch(3), POLICY).await;
        assert!(matches!(outcome, WatchOutcome::TimedOut));
        assert_eq!(gateway.polls(), 5);
        assert!(db.list_user_payments(3).await.unwrap().is_empty());
    }
}
