//! Shared identities and ledger setup for the suite.

use custody_ledger::prelude::*;
use shared_types::Identity;

/// Registry owner used by every fixture ledger.
pub const OWNER: Identity = Identity::repeat(0xA0);
pub const MAKER: Identity = Identity::repeat(0x01);
pub const DEALER: Identity = Identity::repeat(0x02);
pub const SECOND_DEALER: Identity = Identity::repeat(0x22);
pub const CUSTOMER: Identity = Identity::repeat(0x03);
pub const SECOND_CUSTOMER: Identity = Identity::repeat(0x33);
pub const CENTER: Identity = Identity::repeat(0x04);
/// Holds no role.
pub const STRANGER: Identity = Identity::repeat(0xEE);

pub type TestService = CustodyLedgerService<InMemoryEventFeed>;

/// Ledger with the given policy and no roles granted.
pub fn service_with(policy: AnomalyPolicy) -> TestService {
    match CustodyLedgerService::new(LedgerConfig { owner: OWNER, policy }, InMemoryEventFeed::new()) {
        Ok(service) => service,
        Err(e) => panic!("fixture policy rejected: {e}"),
    }
}

pub fn ctx(caller: Identity, now: Timestamp) -> RequestContext {
    RequestContext::new(caller, now)
}

/// Grant the standard cast their roles at t = 0.
pub async fn grant_cast(service: &TestService) {
    let cast = [
        (MAKER, Role::Manufacturer),
        (DEALER, Role::Dealer),
        (SECOND_DEALER, Role::Dealer),
        (CUSTOMER, Role::Customer),
        (SECOND_CUSTOMER, Role::Customer),
        (CENTER, Role::WarrantyCenter),
    ];
    for (identity, role) in cast {
        if let Err(e) = service.grant_role(ctx(OWNER, 0), identity, role.code()).await {
            panic!("fixture grant failed: {e}");
        }
    }
}

/// Default-policy ledger with the cast granted.
pub async fn standard_ledger() -> TestService {
    let service = service_with(AnomalyPolicy::default());
    grant_cast(&service).await;
    service
}

/// Cooldown-free ledger with the cast granted.
pub async fn cooldown_free_ledger() -> TestService {
    let service = service_with(AnomalyPolicy::without_cooldowns());
    grant_cast(&service).await;
    service
}
