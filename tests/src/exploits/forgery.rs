//! # Forged Authority
//!
//! Callers try to act on products they do not hold, take roles they were
//! never granted, or route products outside the allowed chain.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use custody_ledger::prelude::*;

    fn p(id: &str) -> ProductId {
        ProductId::from(id)
    }

    async fn ledger_with_product() -> TestService {
        let service = standard_ledger().await;
        service
            .create_product(ctx(MAKER, 100), p("P1"), "watch".into())
            .await
            .unwrap();
        service
            .transfer_product(ctx(MAKER, 200), p("P1"), DEALER, String::new())
            .await
            .unwrap();
        service
    }

    async fn assert_untouched(service: &TestService) {
        let view = service.get_product(&p("P1")).await.unwrap();
        assert_eq!(view.current_owner, DEALER);
        assert_eq!(view.history_count, 2);
        assert!(!view.suspicious);
    }

    #[tokio::test]
    async fn test_self_promotion_rejected() {
        let service = standard_ledger().await;
        for caller in [MAKER, STRANGER, CENTER] {
            let err = service
                .grant_role(ctx(caller, 10), caller, Role::Manufacturer.code())
                .await
                .unwrap_err();
            assert_eq!(err.code(), "Unauthorized");
            assert!(err.to_string().starts_with("Only contract owner"));
        }
        assert_eq!(service.role_of(STRANGER).await, Role::None);
        assert_eq!(service.role_of(CENTER).await, Role::WarrantyCenter);
    }

    #[tokio::test]
    async fn test_previous_owner_cannot_pull_back() {
        let service = ledger_with_product().await;
        let err = service
            .transfer_product(ctx(MAKER, 1_000), p("P1"), SECOND_DEALER, String::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotOwner { .. }));
        assert!(err.to_string().starts_with("You are not the product owner"));
        assert_untouched(&service).await;
    }

    #[tokio::test]
    async fn test_roleless_caller_rejected_before_ownership() {
        let service = ledger_with_product().await;
        let err = service
            .transfer_product(ctx(STRANGER, 1_000), p("P1"), STRANGER, String::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Unauthorized {
                reason: UnauthorizedReason::RoleNotAllowed { role: Role::None, .. }
            }
        ));
        assert_untouched(&service).await;
    }

    #[tokio::test]
    async fn test_non_center_cannot_record_service() {
        let service = ledger_with_product().await;
        // The dealer holds the product but is not a warranty center.
        for result in [
            service
                .record_warranty(ctx(DEALER, 1_000), p("P1"), String::new())
                .await,
            service
                .record_repair(ctx(DEALER, 1_100), p("P1"), String::new())
                .await,
        ] {
            assert!(err_is_role_not_allowed(result));
        }
        assert_untouched(&service).await;
    }

    fn err_is_role_not_allowed(result: Result<TransitionReceipt, LedgerError>) -> bool {
        matches!(
            result,
            Err(LedgerError::Unauthorized {
                reason: UnauthorizedReason::RoleNotAllowed { .. }
            })
        )
    }

    #[tokio::test]
    async fn test_center_cannot_service_product_it_does_not_hold() {
        let service = ledger_with_product().await;
        let err = service
            .record_warranty(ctx(CENTER, 1_000), p("P1"), String::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NotOwner");
        assert_untouched(&service).await;
    }

    #[tokio::test]
    async fn test_customer_resale_blocked() {
        let service = ledger_with_product().await;
        service
            .transfer_product(ctx(DEALER, 300), p("P1"), CUSTOMER, String::new())
            .await
            .unwrap();

        let err = service
            .transfer_product(ctx(CUSTOMER, 1_000), p("P1"), SECOND_CUSTOMER, String::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Unauthorized {
                reason: UnauthorizedReason::RecipientNotAllowed {
                    recipient_role: Role::Customer,
                    ..
                }
            }
        ));
        assert_eq!(
            service.get_product(&p("P1")).await.unwrap().current_owner,
            CUSTOMER
        );
    }

    #[tokio::test]
    async fn test_revoked_maker_loses_authority() {
        let service = ledger_with_product().await;
        service
            .grant_role(ctx(OWNER, 300), MAKER, Role::None.code())
            .await
            .unwrap();

        let err = service
            .create_product(ctx(MAKER, 1_000), p("P2"), "fake".into())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "Unauthorized");
        assert!(service.members_of(Role::Manufacturer).await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_id_cannot_overwrite() {
        let service = ledger_with_product().await;
        let rival = Identity::repeat(0x51);
        service
            .grant_role(ctx(OWNER, 0), rival, Role::Manufacturer.code())
            .await
            .unwrap();

        let err = service
            .create_product(ctx(rival, 1_000), p("P1"), "counterfeit".into())
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::DuplicateProduct(p("P1")));
        assert_eq!(service.history(&p("P1")).await.unwrap()[0].note, "watch");
    }
}
