//! Shared fixtures for the integration tests.

use std::sync::Arc;

use gns_auth_sessions::core::{
    pairing_signing_payload, ManualClock, PairingAction, ScriptedTokens,
};
use gns_auth_sessions::{
    ApproveSessionParams, IdentityRecord, MemoryStore, PairingConfig, PairingEngine,
    RequestSessionResponse,
};
use gns_crypto_core::GnsIdentity;

pub struct Harness {
    pub engine: Arc<PairingEngine>,
    pub clock: Arc<ManualClock>,
    pub tokens: Arc<ScriptedTokens>,
    pub store: Arc<MemoryStore>,
    pub identity: GnsIdentity,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(PairingConfig::default())
    }

    pub fn with_config(config: PairingConfig) -> Self {
        let clock = Arc::new(ManualClock::default());
        let tokens = Arc::new(ScriptedTokens::new());
        let store = Arc::new(MemoryStore::new());
        let identity = GnsIdentity::generate();
        store.register_identity(IdentityRecord {
            public_key: identity.public_key_hex(),
            handle: Some("alice".into()),
            encryption_key: None,
        });

        let engine = PairingEngine::builder(config)
            .browser_sessions(store.clone())
            .identities(store.clone())
            .clock(clock.clone())
            .tokens(tokens.clone())
            .build()
            .expect("engine builds");

        Self {
            engine,
            clock,
            tokens,
            store,
            identity,
        }
    }

    pub fn approve_params(&self, session: &RequestSessionResponse) -> ApproveSessionParams {
        approve_params_for(&self.identity, &session.session_id, &session.challenge)
    }
}

pub fn sign(
    identity: &GnsIdentity,
    action: PairingAction,
    session_id: &str,
    challenge: &str,
) -> String {
    let payload =
        pairing_signing_payload(action, session_id, challenge, &identity.public_key_hex());
    identity.sign_string(&payload)
}

pub fn approve_params_for(
    identity: &GnsIdentity,
    session_id: &str,
    challenge: &str,
) -> ApproveSessionParams {
    ApproveSessionParams {
        session_id: session_id.to_string(),
        public_key: identity.public_key_hex(),
        signature: sign(identity, PairingAction::Approve, session_id, challenge),
        device_info: None,
        encryption_key: None,
        message_sync: None,
    }
}
