//! Client-side per-call credentials.

use std::fmt;

use tracing::{debug, error};

use crate::call::{Call, ContextSlot};
use crate::credentials::CredentialsHandle;
use crate::error::CallError;

/// Credentials bound to one outgoing call.
///
/// Lives in the call's [`ContextSlot::Security`] slot and is destroyed with
/// the call's context store, releasing its credentials handle.
#[derive(Default)]
pub struct ClientSecurityContext {
    creds: Option<CredentialsHandle>,
}

impl ClientSecurityContext {
    /// Credentials currently bound to the call, if any.
    #[must_use]
    pub fn credentials(&self) -> Option<&CredentialsHandle> {
        self.creds.as_ref()
    }
}

impl fmt::Debug for ClientSecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSecurityContext")
            .field(
                "creds",
                &self.creds.as_ref().map(|c| c.credentials_type().to_owned()),
            )
            .finish()
    }
}

/// Bind `creds` to an outgoing call, replacing whatever was bound before.
///
/// Passing `None` clears the call's credentials. The call acquires its own
/// handle to `creds`; the previously bound handle, if any, is released.
///
/// # Errors
///
/// - `NotOnClientSideCall` if `call` was not initiated by this process
/// - `IncompatibleCredentials` if `creds` is usable beyond a single call
///
/// On error the call's stored credentials are left untouched.
pub fn set_credentials(call: &mut Call, creds: Option<&CredentialsHandle>) -> Result<(), CallError> {
    if !call.is_client() {
        error!(method = call.method(), "method is client-side only");
        return Err(CallError::NotOnClientSideCall);
    }
    if let Some(c) = creds
        && !c.has_request_metadata_only()
    {
        error!(
            method = call.method(),
            credentials_type = c.credentials_type(),
            "incompatible credentials to set on a call"
        );
        return Err(CallError::IncompatibleCredentials {
            credentials_type: c.credentials_type().to_owned(),
        });
    }

    let new_creds = creds.cloned();
    let store = call.context_mut();
    if let Some(ctx) = store.get_mut::<ClientSecurityContext>(ContextSlot::Security) {
        // Assignment drops the previous handle.
        ctx.creds = new_creds;
    } else {
        store.set(ContextSlot::Security, ClientSecurityContext { creds: new_creds });
    }

    debug!(
        method = call.method(),
        cleared = creds.is_none(),
        "bound call credentials"
    );
    Ok(())
}

/// The client security context of `call`, if credentials were ever set.
#[must_use]
pub fn client_security_context(call: &Call) -> Option<&ClientSecurityContext> {
    call.context().get::<ClientSecurityContext>(ContextSlot::Security)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use std::sync::Arc;

    use super::*;
    use crate::credentials::{Credentials, CredentialsScope};

    struct TestCreds {
        kind: &'static str,
        scope: CredentialsScope,
    }

    impl Credentials for TestCreds {
        fn credentials_type(&self) -> &str {
            self.kind
        }

        fn scope(&self) -> CredentialsScope {
            self.scope
        }
    }

    fn per_call(kind: &'static str) -> CredentialsHandle {
        Arc::new(TestCreds {
            kind,
            scope: CredentialsScope::RequestOnly,
        })
    }

    #[test]
    fn first_set_creates_context() {
        let mut call = Call::client("/svc/Get");
        assert!(client_security_context(&call).is_none());

        let creds = per_call("oauth2");
        set_credentials(&mut call, Some(&creds)).unwrap();

        let bound = client_security_context(&call).unwrap().credentials().unwrap();
        assert!(Arc::ptr_eq(bound, &creds));
        assert_eq!(Arc::strong_count(&creds), 2);
    }

    #[test]
    fn clearing_releases_handle_and_keeps_context() {
        let mut call = Call::client("/svc/Get");
        let creds = per_call("oauth2");

        set_credentials(&mut call, Some(&creds)).unwrap();
        set_credentials(&mut call, None).unwrap();

        assert_eq!(Arc::strong_count(&creds), 1);
        assert!(client_security_context(&call).unwrap().credentials().is_none());
    }

    #[test]
    fn clear_on_fresh_call_creates_empty_context() {
        let mut call = Call::client("/svc/Get");
        set_credentials(&mut call, None).unwrap();
        assert!(client_security_context(&call).unwrap().credentials().is_none());
    }

    #[test]
    fn channel_credentials_rejected() {
        let mut call = Call::client("/svc/Get");
        let channel: CredentialsHandle = Arc::new(TestCreds {
            kind: "ssl",
            scope: CredentialsScope::Channel,
        });

        let err = set_credentials(&mut call, Some(&channel)).unwrap_err();
        assert_eq!(
            err,
            CallError::IncompatibleCredentials {
                credentials_type: "ssl".to_owned()
            }
        );
        assert!(client_security_context(&call).is_none());
        assert_eq!(Arc::strong_count(&channel), 1);
    }

    #[test]
    fn teardown_releases_credentials() {
        let creds = per_call("jwt");
        {
            let mut call = Call::client("/svc/Get");
            set_credentials(&mut call, Some(&creds)).unwrap();
            assert_eq!(Arc::strong_count(&creds), 2);
        }
        assert_eq!(Arc::strong_count(&creds), 1);
    }

    #[test]
    fn debug_shows_type_only() {
        let mut call = Call::client("/svc/Get");
        set_credentials(&mut call, Some(&per_call("oauth2"))).unwrap();
        let rendered = format!("{:?}", client_security_context(&call).unwrap());
        assert!(rendered.contains("oauth2"));
    }
}
