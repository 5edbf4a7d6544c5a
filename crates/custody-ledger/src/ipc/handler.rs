//! IPC request handler for the custody ledger.
//!
//! Turns a [`LedgerEnvelope`] into one service call and wraps the outcome
//! in a [`LedgerResponseEnvelope`]. Rejections are responses, not errors.

use crate::domain::entities::RequestContext;
use crate::domain::value_objects::Role;
use crate::errors::LedgerError;
use crate::ipc::payloads::{LedgerEnvelope, LedgerReply, LedgerRequest, LedgerResponseEnvelope};
use crate::ports::inbound::CustodyLedgerApi;
use crate::ports::outbound::{EventSink, TimeSource};
use crate::service::CustodyLedgerService;
use std::sync::Arc;
use tracing::debug;

/// Request handler over a shared service.
pub struct RequestHandler<E: EventSink, T: TimeSource> {
    service: Arc<CustodyLedgerService<E>>,
    time_source: T,
}

impl<E: EventSink, T: TimeSource> RequestHandler<E, T> {
    /// Creates a new request handler.
    pub fn new(service: Arc<CustodyLedgerService<E>>, time_source: T) -> Self {
        Self {
            service,
            time_source,
        }
    }

    /// Returns the underlying service.
    pub fn service(&self) -> &Arc<CustodyLedgerService<E>> {
        &self.service
    }

    /// Handle one request.
    pub async fn handle(&self, envelope: LedgerEnvelope) -> LedgerResponseEnvelope {
        let correlation_id = envelope.correlation_id;
        let now = envelope
            .timestamp
            .unwrap_or_else(|| self.time_source.now());
        let ctx = RequestContext::new(envelope.caller, now);
        debug!(
            correlation_id = %correlation_id,
            method = envelope.request.method(),
            caller = %ctx.caller,
            "Handling request"
        );

        match self.dispatch(ctx, envelope.request).await {
            Ok(reply) => LedgerResponseEnvelope::ok(correlation_id, reply),
            Err(err) => LedgerResponseEnvelope::rejected(correlation_id, &err),
        }
    }

    async fn dispatch(
        &self,
        ctx: RequestContext,
        request: LedgerRequest,
    ) -> Result<LedgerReply, LedgerError> {
        let service = &self.service;
        let reply = match request {
            LedgerRequest::GrantRole { identity, role } => {
                LedgerReply::Granted(service.grant_role(ctx, identity, role).await?)
            }
            LedgerRequest::RoleOf { identity } => LedgerReply::Role(service.role_of(identity).await),
            LedgerRequest::OwnerOf => LedgerReply::Identity(service.registry_owner().await),
            LedgerRequest::MembersOf { role } => {
                let role = Role::from_code(role).ok_or(LedgerError::InvalidRole(role))?;
                LedgerReply::Identities(service.members_of(role).await)
            }
            LedgerRequest::RoleAssignments => {
                LedgerReply::Assignments(service.role_assignments().await)
            }
            LedgerRequest::RoleGrants { from } => LedgerReply::Grants(service.role_grants(from).await),
            LedgerRequest::CreateProduct { id, info } => {
                LedgerReply::Receipt(service.create_product(ctx, id, info).await?)
            }
            LedgerRequest::TransferProduct { id, to, note } => {
                LedgerReply::Receipt(service.transfer_product(ctx, id, to, note).await?)
            }
            LedgerRequest::WarrantyProduct { id, note } => {
                LedgerReply::Receipt(service.record_warranty(ctx, id, note).await?)
            }
            LedgerRequest::RepairProduct { id, note } => {
                LedgerReply::Receipt(service.record_repair(ctx, id, note).await?)
            }
            LedgerRequest::GetProduct { id } => LedgerReply::Product(service.get_product(&id).await?),
            LedgerRequest::IsProductSuspicious { id } => {
                LedgerReply::Flag(service.is_product_suspicious(&id).await?)
            }
            LedgerRequest::GetSuspiciousReason { id } => {
                LedgerReply::Reason(service.suspicious_reason(&id).await?)
            }
            LedgerRequest::GetProductHistoryLength { id } => {
                LedgerReply::Length(service.history_length(&id).await?)
            }
            LedgerRequest::GetProductHistoryRecord { id, index } => {
                LedgerReply::Record(service.history_record(&id, index).await?)
            }
            LedgerRequest::GetProductHistory { id } => {
                LedgerReply::History(service.history(&id).await?)
            }
            LedgerRequest::VerifyProductHistory { id } => {
                LedgerReply::Verification(service.verify_history(&id).await?)
            }
            LedgerRequest::SuspiciousProducts => {
                LedgerReply::Products(service.suspicious_products().await)
            }
            LedgerRequest::RateStatus { identity } => {
                let identity = identity.unwrap_or(ctx.caller);
                LedgerReply::RateStatus(service.rate_status(identity, ctx.now).await)
            }
            LedgerRequest::Events { from } => LedgerReply::Events(service.events_since(from).await),
            LedgerRequest::Snapshot => LedgerReply::Snapshot(service.snapshot().await),
        };
        Ok(reply)
    }
}
