//! # tonio-identity
//!
//! Identity collaborator for the Tonio client.
//!
//! - [`IdentityProvider`] / [`IdentityApp`]: the abstract sign-in, token and
//!   auth-state capability
//! - [`FirebaseIdentityProvider`]: REST implementation over the Firebase
//!   Identity Toolkit and Secure Token endpoints
//! - [`SessionState`]: initialize/destroy lifecycle driven by a rust-fsm
//!   state machine

mod error;
mod firebase;
mod provider;
mod session;
pub mod session_fsm;

pub use error::{IdentityError, IdentityResult};
pub use firebase::{FirebaseApp, FirebaseIdentityProvider};
pub use provider::{
    AuthStateListener, IdentityApp, IdentityProvider, IdentityUser, ListenerId, ListenerRegistry,
};
pub use session::{AuthState, AuthSubscription, SessionState};
pub use session_fsm::{SessionInput, SessionMachine, SessionPhase};
