//! Client lifecycle state machine using rust-fsm.
//!
//! ```text
//! ┌─────────────────┐  Initialize   ┌─────────────────┐
//! │  Uninitialized  │ ────────────► │   Initialized   │
//! │    (initial)    │ ◄──────────── │                 │
//! └─────────────────┘    Destroy    └─────────────────┘
//! ```
//!
//! Any other input is rejected by the machine, which is how a second
//! `initialize` or a premature `destroy` is detected.

use rust_fsm::*;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Uninitialized)

    Uninitialized => {
        Initialize => Initialized
    },
    Initialized => {
        Destroy => Uninitialized
    }
}

pub use session_machine::Input as SessionInput;
pub use session_machine::State as SessionPhase;
pub use session_machine::StateMachine as SessionMachine;
