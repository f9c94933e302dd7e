//! # State Module
//!
//! Register state shared between operations.
//!
//! Each piece of state is its own type so an operation touches only what it
//! needs and independent state never contends on one lock.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    State Architecture                                   │
//! │                                                                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────┐      │
//! │  │  CartState   │  │  GateState   │  │  ShiftHandle             │      │
//! │  │              │  │              │  │  (see session.rs)        │      │
//! │  │  Arc<Mutex<  │  │  Arc<Mutex<  │  │                          │      │
//! │  │    Cart      │  │  Authoriza-  │  │  mpsc::Sender ──► task   │      │
//! │  │  >>          │  │  tionGate>>  │  │  owning ShiftLedger      │      │
//! │  └──────────────┘  └──────────────┘  └──────────────────────────┘      │
//! │                                                                         │
//! │  THREAD SAFETY:                                                        │
//! │  • CartState / GateState: short synchronous critical sections,         │
//! │    never held across an await                                          │
//! │  • ShiftHandle: all ledger mutations queue through one task            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod cart;
mod gate;

pub use cart::CartState;
pub use gate::GateState;
