//! Server-side per-call authentication state.

use tracing::{debug, warn};

use crate::auth_context::AuthContext;
use crate::call::{Call, ContextSlot};
use crate::error::CallError;
use crate::metadata::Metadata;
use crate::processor::MetadataProcessorRegistry;

/// The authenticated identity of the peer that issued a server call.
///
/// Lives in the call's [`ContextSlot::Security`] slot and holds one handle
/// to the call's [`AuthContext`] until the call is torn down.
#[derive(Debug, Clone)]
pub struct ServerSecurityContext {
    auth_context: AuthContext,
}

impl ServerSecurityContext {
    #[must_use]
    pub fn auth_context(&self) -> &AuthContext {
        &self.auth_context
    }
}

/// Attach `ctx` as the authenticated context of a server call.
///
/// Any previously attached context is released.
///
/// # Errors
///
/// - `NotOnServerSideCall` if `call` was initiated by this process
pub fn set_auth_context(call: &mut Call, ctx: AuthContext) -> Result<(), CallError> {
    if call.is_client() {
        warn!(method = call.method(), "method is server-side only");
        return Err(CallError::NotOnServerSideCall);
    }
    debug!(
        method = call.method(),
        authenticated = ctx.is_authenticated(),
        chain_depth = ctx.chain_depth(),
        "attached auth context to call"
    );
    call.context_mut()
        .set(ContextSlot::Security, ServerSecurityContext { auth_context: ctx });
    Ok(())
}

/// Acquire a handle to the authenticated context of a server call.
///
/// `None` for client calls and for server calls that carry no identity.
#[must_use]
pub fn call_auth_context(call: &Call) -> Option<AuthContext> {
    call.context()
        .get::<ServerSecurityContext>(ContextSlot::Security)
        .map(|s| s.auth_context.acquire())
}

/// Run `registry`'s processor for a server call and attach the result.
///
/// Without a registered processor the transport context, if any, is
/// attached as is.
///
/// # Errors
///
/// - `NotOnServerSideCall` if `call` was initiated by this process
/// - `Unauthenticated` if the processor failed the call; nothing is attached
pub async fn authenticate_call(
    call: &mut Call,
    registry: &MetadataProcessorRegistry,
    transport_ctx: Option<&AuthContext>,
    metadata: &Metadata,
) -> Result<(), CallError> {
    if call.is_client() {
        return Err(CallError::NotOnServerSideCall);
    }

    match registry.authenticate(transport_ctx, metadata).await {
        Ok(Some(ctx)) => set_auth_context(call, ctx),
        Ok(None) => Ok(()),
        Err(e) => {
            warn!(method = call.method(), error = %e, "call authentication failed");
            Err(e.into())
        }
    }
}
