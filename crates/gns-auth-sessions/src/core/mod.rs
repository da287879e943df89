//! GNS Auth Session Core
//!
//! Pairing engine, session store, reaper, notifications and persistence.

pub mod clock;
pub mod engine;
pub mod notify;
pub mod persistence;
pub mod random;
pub mod reaper;
pub mod storage;
pub mod store;
pub mod verifier;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{PairingEngine, PairingEngineBuilder, SessionWatch};
pub use notify::{NotificationHub, SessionEvent, Subscription};
pub use persistence::{BrowserSessionStore, IdentityDirectory, MemoryStore};
pub use random::{OsTokenSource, ScriptedTokens, TokenKind, TokenSource};
pub use reaper::ReaperHandle;
pub use storage::SqliteStore;
pub use store::{SessionStore, SweepPolicy, SweepReport};
pub use verifier::{pairing_signing_payload, Ed25519Verifier, PairingAction, SignatureVerifier};
