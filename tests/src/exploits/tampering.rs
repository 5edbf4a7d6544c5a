//! # History Tampering
//!
//! An operator edits an exported snapshot and tries to load it back.
//! Restore must refuse anything the ledger itself could not have produced.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use custody_ledger::prelude::*;

    fn p(id: &str) -> ProductId {
        ProductId::from(id)
    }

    async fn exported() -> LedgerSnapshot {
        let service = standard_ledger().await;
        service
            .create_product(ctx(MAKER, 100), p("P1"), "camera".into())
            .await
            .unwrap();
        service
            .transfer_product(ctx(MAKER, 200), p("P1"), DEALER, "invoice 17".into())
            .await
            .unwrap();
        service
            .transfer_product(ctx(DEALER, 300), p("P1"), CUSTOMER, String::new())
            .await
            .unwrap();
        service.snapshot().await
    }

    fn product(snapshot: &mut LedgerSnapshot) -> &mut custody_ledger::adapters::ProductSnapshot {
        &mut snapshot.products[0]
    }

    #[tokio::test]
    async fn test_untouched_snapshot_restores() {
        let snapshot = exported().await;
        assert!(snapshot.restore().is_ok());
    }

    #[tokio::test]
    async fn test_edited_note_breaks_chain() {
        let mut snapshot = exported().await;
        product(&mut snapshot).history[1].note = "invoice 18".into();

        match snapshot.restore() {
            Err(SnapshotError::BrokenChain { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected broken chain, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_dropped_record_breaks_chain() {
        let mut snapshot = exported().await;
        product(&mut snapshot).history.remove(1);
        assert!(snapshot.restore().is_err());
    }

    #[tokio::test]
    async fn test_rewritten_owner_rejected() {
        let mut snapshot = exported().await;
        product(&mut snapshot).current_owner = STRANGER;
        assert!(snapshot.restore().is_err());
    }

    #[tokio::test]
    async fn test_cleared_flag_rejected() {
        let service = standard_ledger().await;
        service
            .create_product(ctx(MAKER, 100), p("P1"), "camera".into())
            .await
            .unwrap();
        service
            .transfer_product(ctx(MAKER, 200), p("P1"), Identity::ZERO, String::new())
            .await
            .unwrap();
        let mut snapshot = service.snapshot().await;

        product(&mut snapshot).suspicious = false;
        product(&mut snapshot).suspicious_reason.clear();
        assert!(snapshot.restore().is_err());
    }

    #[tokio::test]
    async fn test_spliced_grant_log_rejected() {
        let mut snapshot = exported().await;
        snapshot.grants.remove(0);
        assert!(matches!(
            snapshot.restore(),
            Err(SnapshotError::GrantSequence { expected: 0, found: 1 })
        ));
    }

    #[tokio::test]
    async fn test_version_checked() {
        let mut snapshot = exported().await;
        snapshot.version += 1;
        assert!(matches!(
            snapshot.restore(),
            Err(SnapshotError::UnsupportedVersion(_))
        ));
    }
}
