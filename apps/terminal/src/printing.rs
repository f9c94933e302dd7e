//! # Ticket Printing
//!
//! Tickets are plain data handed to a [`PrintSink`]. The sink decides how
//! they reach paper (thermal printer, PDF, log).
//!
//! ```text
//! ┌───────────────────┐     TicketDescriptor      ┌──────────────────────┐
//! │ Terminal operation│ ─────────────────────────►│ PrintSink::render    │
//! │ (checkout, abono, │   Sale | ShiftReport |    │  TracingPrintSink    │
//! │  return, Z cut)   │   PaymentReceipt | Return │  MemoryPrintSink     │
//! └───────────────────┘                           └──────────────────────┘
//! ```
//!
//! A print failure after an operation has committed is logged, not
//! returned: the sale exists whether or not the paper came out. Reprints
//! are the exception, since printing is the whole operation.

use std::sync::Mutex;

use serde::Serialize;
use tracing::info;

use mostrador_core::credit::PaymentReceipt;
use mostrador_core::returns::ReturnOutcome;
use mostrador_core::shift::ShiftReport;
use mostrador_core::Sale;

use crate::config::StoreConfig;
use crate::error::PrintError;

// =============================================================================
// Descriptors
// =============================================================================

/// Store header printed on every ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketHeader {
    pub store_name: String,
    pub address: Vec<String>,
    pub register_name: String,
}

impl TicketHeader {
    pub fn new(store: &StoreConfig, register_name: &str) -> Self {
        TicketHeader {
            store_name: store.name.clone(),
            address: store.address.clone(),
            register_name: register_name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TicketDescriptor {
    Sale {
        header: TicketHeader,
        sale: Box<Sale>,
        reprint: bool,
    },
    ShiftReport {
        header: TicketHeader,
        report: Box<ShiftReport>,
    },
    PaymentReceipt {
        header: TicketHeader,
        receipt: PaymentReceipt,
    },
    Return {
        header: TicketHeader,
        outcome: ReturnOutcome,
    },
}

impl TicketDescriptor {
    pub fn kind(&self) -> &'static str {
        match self {
            TicketDescriptor::Sale { reprint: true, .. } => "sale_reprint",
            TicketDescriptor::Sale { .. } => "sale",
            TicketDescriptor::ShiftReport { .. } => "shift_report",
            TicketDescriptor::PaymentReceipt { .. } => "payment_receipt",
            TicketDescriptor::Return { .. } => "return",
        }
    }
}

// =============================================================================
// Sinks
// =============================================================================

pub trait PrintSink: Send + Sync {
    fn render(&self, ticket: &TicketDescriptor) -> Result<(), PrintError>;
}

/// Logs each ticket as JSON. Default sink when no printer is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPrintSink;

impl PrintSink for TracingPrintSink {
    fn render(&self, ticket: &TicketDescriptor) -> Result<(), PrintError> {
        let body = serde_json::to_string(ticket).map_err(|e| PrintError::Render(e.to_string()))?;
        info!(kind = ticket.kind(), ticket = %body, "Printing ticket");
        Ok(())
    }
}

/// Keeps rendered tickets in memory.
#[derive(Debug, Default)]
pub struct MemoryPrintSink {
    tickets: Mutex<Vec<TicketDescriptor>>,
    offline: bool,
}

impl MemoryPrintSink {
    pub fn new() -> Self {
        MemoryPrintSink::default()
    }

    /// A sink whose printer is unplugged: every render fails.
    pub fn offline() -> Self {
        MemoryPrintSink {
            tickets: Mutex::new(Vec::new()),
            offline: true,
        }
    }

    pub fn tickets(&self) -> Vec<TicketDescriptor> {
        self.tickets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.tickets().iter().map(TicketDescriptor::kind).collect()
    }
}

impl PrintSink for MemoryPrintSink {
    fn render(&self, ticket: &TicketDescriptor) -> Result<(), PrintError> {
        if self.offline {
            return Err(PrintError::Unavailable("printer offline".to_string()));
        }
        self.tickets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(ticket.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mostrador_core::Money;

    fn header() -> TicketHeader {
        TicketHeader::new(&StoreConfig::default(), "Caja 1")
    }

    fn receipt() -> PaymentReceipt {
        PaymentReceipt {
            client_id: "c1".into(),
            client_name: "Don Ramiro".into(),
            date: Utc::now(),
            amount: Money::from_major(40),
            reason: None,
            allocations: Vec::new(),
            balance_before: Money::from_major(80),
            balance_after: Money::from_major(40),
        }
    }

    #[test]
    fn test_descriptor_is_tagged() {
        let ticket = TicketDescriptor::PaymentReceipt {
            header: header(),
            receipt: receipt(),
        };
        let json = serde_json::to_value(&ticket).unwrap();
        assert_eq!(json["type"], "payment_receipt");
        assert_eq!(json["header"]["storeName"], "Mostrador");
        assert_eq!(json["receipt"]["balanceAfter"], 40);
    }

    #[test]
    fn test_memory_sink_records_tickets() {
        let sink = MemoryPrintSink::new();
        let ticket = TicketDescriptor::PaymentReceipt {
            header: header(),
            receipt: receipt(),
        };
        sink.render(&ticket).unwrap();
        assert_eq!(sink.kinds(), vec!["payment_receipt"]);

        let offline = MemoryPrintSink::offline();
        assert!(matches!(
            offline.render(&ticket),
            Err(PrintError::Unavailable(_))
        ));
        assert!(offline.tickets().is_empty());
    }

    #[test]
    fn test_tracing_sink_accepts_every_ticket() {
        let ticket = TicketDescriptor::PaymentReceipt {
            header: header(),
            receipt: receipt(),
        };
        assert!(TracingPrintSink.render(&ticket).is_ok());
    }
}
