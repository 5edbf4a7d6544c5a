//! # Integration Test Flows
//!
//! A product's life from the manufacturer's bench to the warranty center,
//! driven through the async service.
//!
//! ## Flows Tested:
//!
//! 1. **Happy path**: create → dealer → customer → warranty center → warranty → repair
//! 2. **Soft flags**: void, premature warranty and rapid re-transfer commit but flag
//! 3. **Notification feed**: events mirror commit order
//! 4. **Restart**: snapshot restore keeps ownership, flags and rate state

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use custody_ledger::prelude::*;
    use std::sync::Arc;

    fn p(id: &str) -> ProductId {
        ProductId::from(id)
    }

    /// Walk P1 through the whole chain. Returns the time of the last step.
    async fn walk_full_chain(service: &TestService) -> Timestamp {
        service
            .create_product(ctx(MAKER, 1_000), p("P1"), "55in television".into())
            .await
            .unwrap();
        service
            .transfer_product(ctx(MAKER, 1_040), p("P1"), DEALER, "to dealer".into())
            .await
            .unwrap();
        service
            .transfer_product(ctx(DEALER, 1_100), p("P1"), CUSTOMER, "sold".into())
            .await
            .unwrap();
        service
            .transfer_product(ctx(CUSTOMER, 5_000), p("P1"), CENTER, "screen flickers".into())
            .await
            .unwrap();
        service
            .record_warranty(ctx(CENTER, 9_000), p("P1"), "claim accepted".into())
            .await
            .unwrap();
        service
            .record_repair(ctx(CENTER, 9_040), p("P1"), "panel replaced".into())
            .await
            .unwrap();
        9_040
    }

    // =============================================================================
    // HAPPY PATH
    // =============================================================================

    #[tokio::test]
    async fn test_full_custody_chain() {
        let service = standard_ledger().await;
        walk_full_chain(&service).await;

        let view = service.get_product(&p("P1")).await.unwrap();
        assert_eq!(view.current_owner, CENTER);
        assert_eq!(view.history_count, 6);
        assert!(!view.suspicious);
        assert_eq!(view.suspicious_reason, "");

        let history = service.history(&p("P1")).await.unwrap();
        let kinds: Vec<RecordKind> = history.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RecordKind::Created,
                RecordKind::Transferred,
                RecordKind::Transferred,
                RecordKind::Transferred,
                RecordKind::Warranty,
                RecordKind::Repair,
            ]
        );
        let actors: Vec<Identity> = history.iter().map(|r| r.actor).collect();
        assert_eq!(actors, vec![MAKER, MAKER, DEALER, CUSTOMER, CENTER, CENTER]);
        assert_eq!(history[0].note, "55in television");

        let verification = service.verify_history(&p("P1")).await.unwrap();
        assert!(verification.is_intact());
        assert_eq!(verification.head, Some(history[5].record_hash));
    }

    #[tokio::test]
    async fn test_history_record_access() {
        let service = standard_ledger().await;
        walk_full_chain(&service).await;

        let third = service.history_record(&p("P1"), 2).await.unwrap();
        assert_eq!(third.actor, DEALER);
        assert_eq!(third.new_owner, CUSTOMER);

        let err = service.history_record(&p("P1"), 6).await.unwrap_err();
        assert_eq!(err.code(), "NotFound");
        assert_eq!(service.history_length(&p("P1")).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_role_queries_after_grants() {
        let service = standard_ledger().await;

        assert_eq!(service.registry_owner().await, OWNER);
        assert_eq!(service.role_of(CENTER).await, Role::WarrantyCenter);
        assert_eq!(service.role_of(STRANGER).await, Role::None);

        let mut dealers = service.members_of(Role::Dealer).await;
        dealers.sort();
        assert_eq!(dealers, vec![DEALER, SECOND_DEALER]);

        // Re-granting moves the identity between roles.
        service
            .grant_role(ctx(OWNER, 10), SECOND_DEALER, Role::Customer.code())
            .await
            .unwrap();
        assert_eq!(service.members_of(Role::Dealer).await, vec![DEALER]);
        assert_eq!(service.role_grants(0).await.len(), 7);
        assert_eq!(service.role_grants(6).await[0].identity, SECOND_DEALER);
    }

    // =============================================================================
    // SOFT FLAGS
    // =============================================================================

    #[tokio::test]
    async fn test_void_transfer_commits_and_flags() {
        let service = standard_ledger().await;
        service
            .create_product(ctx(MAKER, 100), p("P1"), "kettle".into())
            .await
            .unwrap();

        let receipt = service
            .transfer_product(ctx(MAKER, 200), p("P1"), Identity::ZERO, String::new())
            .await
            .unwrap();
        assert!(receipt.flagged.is_some());
        assert_eq!(receipt.owner, Identity::ZERO);

        assert!(service.is_product_suspicious(&p("P1")).await.unwrap());
        assert_eq!(
            service.suspicious_reason(&p("P1")).await.unwrap(),
            "Transfer to the zero address"
        );
        let flagged = service.suspicious_products().await;
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].id, p("P1"));
    }

    #[tokio::test]
    async fn test_premature_warranty_commits_and_flags() {
        let service = standard_ledger().await;
        service
            .create_product(ctx(MAKER, 100), p("P1"), "phone".into())
            .await
            .unwrap();
        service
            .transfer_product(ctx(MAKER, 200), p("P1"), CENTER, String::new())
            .await
            .unwrap();

        // Ten minutes after the transfer.
        let receipt = service
            .record_warranty(ctx(CENTER, 800), p("P1"), String::new())
            .await
            .unwrap();
        assert_eq!(receipt.kind, RecordKind::Warranty);
        let reason = service.suspicious_reason(&p("P1")).await.unwrap();
        assert!(reason.starts_with("Warranty claimed 600s after transfer"));
        assert_eq!(service.history_length(&p("P1")).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_rapid_retransfer_flags_sixth_hop() {
        let service = cooldown_free_ledger().await;
        service
            .create_product(ctx(MAKER, 0), p("P1"), "bike".into())
            .await
            .unwrap();

        let hops = [
            (MAKER, DEALER),
            (DEALER, SECOND_DEALER),
            (SECOND_DEALER, DEALER),
            (DEALER, SECOND_DEALER),
            (SECOND_DEALER, DEALER),
        ];
        for (i, (from, to)) in hops.into_iter().enumerate() {
            let receipt = service
                .transfer_product(ctx(from, 10 + i as u64), p("P1"), to, String::new())
                .await
                .unwrap();
            assert!(receipt.flagged.is_none(), "hop {i} flagged early");
        }

        let receipt = service
            .transfer_product(ctx(DEALER, 20), p("P1"), SECOND_DEALER, String::new())
            .await
            .unwrap();
        assert_eq!(
            receipt.flagged.as_deref(),
            Some("Rapid re-transfer: 6 transfers within 3600s")
        );
        assert_eq!(service.get_product(&p("P1")).await.unwrap().current_owner, SECOND_DEALER);
    }

    #[tokio::test]
    async fn test_flag_is_never_cleared() {
        let service = standard_ledger().await;
        service
            .create_product(ctx(MAKER, 100), p("P1"), "drill".into())
            .await
            .unwrap();
        service
            .transfer_product(ctx(MAKER, 200), p("P1"), MAKER, String::new())
            .await
            .unwrap();
        service
            .transfer_product(ctx(MAKER, 300), p("P1"), DEALER, String::new())
            .await
            .unwrap();

        let view = service.get_product(&p("P1")).await.unwrap();
        assert!(view.suspicious);
        assert_eq!(view.suspicious_reason, "Transfer to the current owner");
    }

    // =============================================================================
    // NOTIFICATION FEED
    // =============================================================================

    #[tokio::test]
    async fn test_feed_mirrors_commit_order() {
        let service = standard_ledger().await;
        let mut live = service.events().subscribe();
        walk_full_chain(&service).await;

        let events = service.events_since(0).await;
        let names: Vec<&str> = events.iter().map(|e| e.kind.name()).collect();
        assert_eq!(
            &names[names.len() - 6..],
            &[
                "product_created",
                "product_transferred",
                "product_transferred",
                "product_transferred",
                "warranty_recorded",
                "repair_recorded",
            ]
        );
        for pair in events.windows(2) {
            assert_eq!(pair[1].sequence, pair[0].sequence + 1);
        }

        // Subscribed after the grants, so the first live event is the create.
        let first = live.recv().await.unwrap();
        assert!(matches!(first.kind, LedgerEventKind::ProductCreated { .. }));
    }

    #[tokio::test]
    async fn test_rejection_publishes_nothing() {
        let service = standard_ledger().await;
        let before = service.events_since(0).await.len();

        let err = service
            .transfer_product(ctx(DEALER, 100), p("missing"), CUSTOMER, String::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NotFound");
        assert_eq!(service.events_since(0).await.len(), before);

        let stats = service.stats().await;
        assert_eq!(stats.requests_rejected, 1);
        assert_eq!(stats.rejected_by_code.get("NotFound"), Some(&1));
    }

    // =============================================================================
    // CONCURRENCY
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_makers_and_readers() {
        let service = Arc::new(service_with(AnomalyPolicy::default()));
        let makers: Vec<Identity> = (0..8u8).map(|i| Identity::repeat(0x40 + i)).collect();
        for maker in &makers {
            service
                .grant_role(ctx(OWNER, 0), *maker, Role::Manufacturer.code())
                .await
                .unwrap();
        }

        let mut writers = Vec::new();
        let mut readers = Vec::new();
        for (i, maker) in makers.iter().copied().enumerate() {
            let writer = Arc::clone(&service);
            writers.push(tokio::spawn(async move {
                writer
                    .create_product(ctx(maker, 100), p(&format!("C{i}")), "crate".into())
                    .await
            }));
            let reader = Arc::clone(&service);
            readers.push(tokio::spawn(async move {
                reader.get_product(&p(&format!("C{i}"))).await
            }));
        }
        for writer in writers {
            assert!(writer.await.unwrap().is_ok());
        }
        // Reads see either nothing or a fully committed product.
        for reader in readers {
            match reader.await.unwrap() {
                Ok(view) => assert_eq!(view.history_count, 1),
                Err(err) => assert_eq!(err.code(), "NotFound"),
            }
        }

        for i in 0..makers.len() {
            let view = service.get_product(&p(&format!("C{i}"))).await.unwrap();
            assert_eq!(view.current_owner, makers[i]);
        }
        assert_eq!(service.stats().await.transitions_accepted, 8);
    }

    // =============================================================================
    // RESTART
    // =============================================================================

    #[tokio::test]
    async fn test_snapshot_restore_keeps_state_and_limits() {
        let service = standard_ledger().await;
        walk_full_chain(&service).await;
        service
            .create_product(ctx(MAKER, 2_000), p("P2"), "toaster".into())
            .await
            .unwrap();
        service
            .transfer_product(ctx(MAKER, 2_100), p("P2"), Identity::ZERO, String::new())
            .await
            .unwrap();

        let json = service.snapshot().await.to_json().unwrap();
        let snapshot = LedgerSnapshot::from_json(&json).unwrap();
        let restored = CustodyLedgerService::from_snapshot(&snapshot, InMemoryEventFeed::new()).unwrap();

        assert_eq!(restored.registry_owner().await, OWNER);
        assert_eq!(restored.role_of(DEALER).await, Role::Dealer);
        assert_eq!(
            restored.get_product(&p("P1")).await.unwrap(),
            service.get_product(&p("P1")).await.unwrap()
        );
        assert!(restored.is_product_suspicious(&p("P2")).await.unwrap());

        // The center's repair at 9040 still gates its next action.
        let err = restored
            .record_repair(ctx(CENTER, 9_045), p("P1"), String::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ActionTooFrequent");
        assert_eq!(
            restored.rate_status(CENTER, 9_045).await,
            service.rate_status(CENTER, 9_045).await
        );
    }
}
