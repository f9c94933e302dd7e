//! # Mostrador Terminal
//!
//! The register process: owns the cart, the supervisor prompt and the
//! live shift, and writes everything through `mostrador-db`.
//!
//! ## Module Organization
//! ```text
//! mostrador_terminal/
//! ├── lib.rs          ◄─── You are here (exports, tracing setup)
//! ├── terminal.rs     ◄─── Terminal: one method per operator action
//! ├── checkout.rs     ◄─── prepare (pure) + commit (ordered writes)
//! ├── session.rs      ◄─── Per-shift actor: single writer for the ledger
//! ├── state/
//! │   ├── cart.rs     ◄─── Shared cart
//! │   └── gate.rs     ◄─── Shared supervisor prompt
//! ├── credentials.rs  ◄─── argon2 PIN verification
//! ├── printing.rs     ◄─── Ticket descriptors + print sinks
//! ├── config.rs       ◄─── terminal.toml + MOSTRADOR_* overrides
//! └── error.rs        ◄─── TerminalError, partial failures, UI notices
//! ```

pub mod checkout;
pub mod config;
pub mod credentials;
pub mod error;
pub mod printing;
pub mod session;
pub mod state;
pub mod terminal;

use tracing_subscriber::EnvFilter;

pub use checkout::{PreparedCheckout, StockDraw, Tender};
pub use config::TerminalConfig;
pub use credentials::{hash_pin, Argon2Verifier, DenyAll};
pub use error::{Notice, NoticeCode, TerminalError, TerminalResult};
pub use printing::{MemoryPrintSink, PrintSink, TicketDescriptor, TracingPrintSink};
pub use session::{SessionSnapshot, ShiftHandle};
pub use terminal::{Terminal, TerminalStatus};

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=mostrador_terminal=trace` - Trace the register only
/// - Default: INFO, DEBUG for mostrador crates
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mostrador=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
