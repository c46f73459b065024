//! `AuthMetadataProcessor` implementation backed by the domain service.

use rpc_security::{AuthContext, AuthMetadataProcessor, Metadata, ProcessingDone};
use tracing::{debug, warn};

use super::service::Service;

impl AuthMetadataProcessor for Service {
    fn process(
        &self,
        transport_ctx: Option<&AuthContext>,
        metadata: &Metadata,
        done: ProcessingDone,
    ) {
        match self.authenticate(transport_ctx, metadata) {
            Ok(ctx) => {
                debug!(
                    chain_depth = ctx.chain_depth(),
                    "static processor authenticated call"
                );
                done.succeed(ctx);
            }
            Err(rejection) => {
                warn!(reason = %rejection, "static processor rejected call");
                done.fail(rejection.to_string());
            }
        }
    }
}
