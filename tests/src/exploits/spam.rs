//! # Spam and Burst Attempts
//!
//! A caller hammers the ledger faster than the cooldowns and caps allow.
//! Every rejected attempt must leave no record and consume no quota.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use custody_ledger::prelude::*;

    fn p(id: &str) -> ProductId {
        ProductId::from(id)
    }

    #[tokio::test]
    async fn test_create_flood_within_cooldown() {
        let service = standard_ledger().await;
        service
            .create_product(ctx(MAKER, 1_000), p("P0"), "ok".into())
            .await
            .unwrap();

        for i in 1..=20u64 {
            let err = service
                .create_product(ctx(MAKER, 1_000 + i), p(&format!("P{i}")), "spam".into())
                .await
                .unwrap_err();
            assert!(matches!(err, LedgerError::ActionTooFrequent { .. }));
            assert_eq!(
                service.get_product(&p(&format!("P{i}"))).await.unwrap_err().code(),
                "NotFound"
            );
        }

        // Rejections did not push the window: the anti-spam boundary holds.
        service
            .create_product(ctx(MAKER, 1_030), p("P21"), "ok".into())
            .await
            .unwrap();
        assert_eq!(service.stats().await.requests_rejected, 20);
    }

    #[tokio::test]
    async fn test_cooldown_guards_in_order() {
        let service = standard_ledger().await;
        service
            .create_product(ctx(MAKER, 0), p("P0"), "ok".into())
            .await
            .unwrap();

        let err = service
            .create_product(ctx(MAKER, 5), p("P1"), "x".into())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::ActionTooFrequent {
                guard: CooldownGuard::ActionCooldown,
                required_secs: 10,
                retry_at: 10,
            }
        );

        let err = service
            .create_product(ctx(MAKER, 15), p("P1"), "x".into())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::ActionTooFrequent {
                guard: CooldownGuard::AntiSpam,
                required_secs: 30,
                retry_at: 30,
            }
        );
        assert_eq!(err.retry_at(), Some(30));
    }

    #[tokio::test]
    async fn test_exempt_identity_skips_anti_spam_only() {
        let service = service_with(AnomalyPolicy::default().with_anti_spam_exempt(MAKER));
        grant_cast(&service).await;
        service
            .create_product(ctx(MAKER, 0), p("P0"), "ok".into())
            .await
            .unwrap();

        let err = service
            .create_product(ctx(MAKER, 9), p("P1"), "x".into())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::ActionTooFrequent {
                guard: CooldownGuard::ActionCooldown,
                ..
            }
        ));
        service
            .create_product(ctx(MAKER, 10), p("P1"), "x".into())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_warranty_burst_hits_cap() {
        let service = cooldown_free_ledger().await;
        for i in 0..3 {
            let id = format!("W{i}");
            service.create_product(ctx(MAKER, i), p(&id), "x".into()).await.unwrap();
            service
                .transfer_product(ctx(MAKER, 10 + i), p(&id), CENTER, String::new())
                .await
                .unwrap();
        }

        service.record_warranty(ctx(CENTER, 5_000), p("W0"), String::new()).await.unwrap();
        service.record_warranty(ctx(CENTER, 5_001), p("W1"), String::new()).await.unwrap();
        let err = service
            .record_warranty(ctx(CENTER, 5_002), p("W2"), String::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::RateLimitExceeded {
                limit: RateLimitKind::Warranty,
                max: 2,
                window_secs: 300,
                retry_at: 5_300,
            }
        );
        assert_eq!(service.history_length(&p("W2")).await.unwrap(), 2);

        // The window slides: the oldest claim ages out at 5300.
        service.record_warranty(ctx(CENTER, 5_300), p("W2"), String::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_third_warranty_in_four_minutes_rejected() {
        let service = standard_ledger().await;
        service.create_product(ctx(MAKER, 0), p("P1"), "x".into()).await.unwrap();
        service
            .transfer_product(ctx(MAKER, 100), p("P1"), CENTER, String::new())
            .await
            .unwrap();

        service.record_warranty(ctx(CENTER, 4_000), p("P1"), String::new()).await.unwrap();
        service.record_warranty(ctx(CENTER, 4_060), p("P1"), String::new()).await.unwrap();
        let err = service
            .record_warranty(ctx(CENTER, 4_120), p("P1"), String::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "RateLimitExceeded");
        assert_eq!(service.history_length(&p("P1")).await.unwrap(), 4);

        service.record_warranty(ctx(CENTER, 4_300), p("P1"), String::new()).await.unwrap();
        assert_eq!(service.history_length(&p("P1")).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_repair_daily_cap_behind_short_window() {
        let service = cooldown_free_ledger().await;
        service.create_product(ctx(MAKER, 0), p("R"), "x".into()).await.unwrap();
        service
            .transfer_product(ctx(MAKER, 1), p("R"), CENTER, String::new())
            .await
            .unwrap();

        for now in [10_000, 10_001, 10_400] {
            service.record_repair(ctx(CENTER, now), p("R"), String::new()).await.unwrap();
        }
        let err = service
            .record_repair(ctx(CENTER, 10_401), p("R"), String::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::RateLimitExceeded {
                limit: RateLimitKind::RepairDaily,
                max: 3,
                ..
            }
        ));

        let status = service.rate_status(CENTER, 10_401).await;
        assert_eq!(status.repairs_today, 3);
        assert_eq!(status.repairs_in_window, 1);
        assert_eq!(status.next_repair_at, Some(10_000 + 86_400));
    }

    #[tokio::test]
    async fn test_activity_cap_across_kinds() {
        let service = cooldown_free_ledger().await;
        for i in 0..20u64 {
            service
                .create_product(ctx(MAKER, i), p(&format!("A{i}")), "x".into())
                .await
                .unwrap();
        }

        let err = service
            .transfer_product(ctx(MAKER, 100), p("A0"), DEALER, String::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::RateLimitExceeded {
                limit: RateLimitKind::Activity,
                max: 20,
                window_secs: 3_600,
                retry_at: 3_600,
            }
        ));
        assert_eq!(service.get_product(&p("A0")).await.unwrap().current_owner, MAKER);

        service
            .transfer_product(ctx(MAKER, 3_600), p("A0"), DEALER, String::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_flooding_one_identity_leaves_others_alone() {
        let service = standard_ledger().await;
        service.create_product(ctx(MAKER, 0), p("P0"), "x".into()).await.unwrap();
        service
            .transfer_product(ctx(MAKER, 40), p("P0"), DEALER, String::new())
            .await
            .unwrap();
        for now in 41..60 {
            assert!(service
                .create_product(ctx(MAKER, now), p("flood"), "x".into())
                .await
                .is_err());
        }

        // The dealer's quota is untouched.
        service
            .transfer_product(ctx(DEALER, 45), p("P0"), CUSTOMER, String::new())
            .await
            .unwrap();
        assert_eq!(service.rate_status(DEALER, 45).await.actions_in_window, 1);
    }
}
