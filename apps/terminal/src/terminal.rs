//! # Terminal
//!
//! The register controller. Every operator action is one method here; the
//! method loads what it needs, runs the pure core operation, and writes the
//! result.
//!
//! ## Operation Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Terminal Operations                              │
//! │                                                                         │
//! │  Shift        open_shift · resume_shift · x_report                      │
//! │               register_cash_movement                                    │
//! │               begin_z_cut → submit_pin → authorize_z_cut                │
//! │               → count_cash → close_shift                                │
//! │                                                                         │
//! │  Cart         scan · add_to_cart · set_quantity · totals                │
//! │               remove_line (PIN) · clear_cart (PIN)                      │
//! │                                                                         │
//! │  Sale         checkout = prepare_checkout + commit_checkout             │
//! │                                                                         │
//! │  Accounts     receive_payment (abono)                                   │
//! │                                                                         │
//! │  After-sale   process_return (PIN) · reprint (PIN)                      │
//! │                                                                         │
//! │  PIN prompt   request_authorization · submit_pin · close_prompt         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Operations that write more than once name their committed steps when
//! they fail part-way (see [`TerminalError::PartialFailure`]).

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use mostrador_core::auth::{CloseOutcome, GateState as PromptState};
use mostrador_core::credit::{apply_payment, PaymentReceipt};
use mostrador_core::pricing::{CartLine, CartTotals, LineVariant, QuantityChange};
use mostrador_core::returns::{process_return_batch, ReturnLine, ReturnOutcome};
use mostrador_core::shift::{CashCount, ShiftLedger, ShiftRecord, ShiftReport, ShiftStatus};
use mostrador_core::{
    Approval, CashMovement, CashMovementKind, CoreError, CredentialVerifier, InventoryMovement,
    InventoryReason, Money, PaymentMethod, ProtectedAction, Quantity, Sale, ValidationError,
};
use mostrador_db::{Database, DbConfig, DbError};

use crate::checkout::{self, PreparedCheckout, Tender};
use crate::config::TerminalConfig;
use crate::credentials::verifier_from_config;
use crate::error::{ConfigError, StepLog, TerminalError, TerminalResult};
use crate::printing::{PrintSink, TicketDescriptor, TicketHeader, TracingPrintSink};
use crate::session::{SessionSnapshot, ShiftHandle, ShiftSession};
use crate::state::{CartState, GateState};

/// What `mostrador status` prints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalStatus {
    pub register_id: String,
    pub register_name: String,
    /// Live view when this process runs the shift session.
    pub session: Option<SessionSnapshot>,
    /// Stored open shift otherwise.
    pub stored_shift: Option<ShiftRecord>,
    pub cart_lines: usize,
    pub cart_total: Money,
    pub pending_authorization: Option<ProtectedAction>,
}

pub struct Terminal {
    config: TerminalConfig,
    db: Database,
    cart: CartState,
    gate: GateState,
    shift: Mutex<Option<ShiftHandle>>,
    verifier: Arc<dyn CredentialVerifier>,
    printer: Arc<dyn PrintSink>,
    header: TicketHeader,
}

impl Terminal {
    pub fn new(
        config: TerminalConfig,
        db: Database,
        verifier: Arc<dyn CredentialVerifier>,
        printer: Arc<dyn PrintSink>,
    ) -> Self {
        let header = TicketHeader::new(&config.store, &config.register.name);
        Terminal {
            config,
            db,
            cart: CartState::new(),
            gate: GateState::new(),
            shift: Mutex::new(None),
            verifier,
            printer,
            header,
        }
    }

    /// Opens the configured database and builds the register with the
    /// configured supervisor PIN and a logging print sink.
    pub async fn from_config(config: TerminalConfig) -> TerminalResult<Self> {
        let path = config.database_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::from)?;
        }
        info!(path = %path.display(), register = %config.register.id, "Opening register database");

        let db = Database::new(DbConfig::new(path)).await?;
        let verifier = verifier_from_config(&config)?;
        Ok(Terminal::new(config, db, verifier, Arc::new(TracingPrintSink)))
    }

    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn cart(&self) -> &CartState {
        &self.cart
    }

    pub fn prompt_state(&self) -> PromptState {
        self.gate.state()
    }

    pub fn current_shift(&self) -> Option<ShiftHandle> {
        self.shift_slot().clone()
    }

    fn shift_slot(&self) -> MutexGuard<'_, Option<ShiftHandle>> {
        self.shift.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn session(&self) -> TerminalResult<ShiftHandle> {
        self.current_shift().ok_or(TerminalError::NoOpenShift)
    }

    fn print(&self, ticket: TicketDescriptor) {
        if let Err(e) = self.printer.render(&ticket) {
            error!(kind = ticket.kind(), error = %e, "Ticket not printed");
        }
    }

    // =========================================================================
    // Shift
    // =========================================================================

    /// Opens a new shift with `initial_fund` in the drawer.
    pub async fn open_shift(&self, initial_fund: Money) -> TerminalResult<ShiftRecord> {
        if let Some(handle) = self.current_shift() {
            return Err(TerminalError::ShiftAlreadyOpen(handle.shift_id().to_string()));
        }
        let register_id = self.config.register_id();
        if let Some(existing) = self.db.shifts().open_for_register(register_id).await? {
            return Err(TerminalError::ShiftAlreadyOpen(existing.id));
        }

        let ledger = ShiftLedger::open(
            Uuid::new_v4().to_string(),
            register_id,
            initial_fund,
            Utc::now(),
            self.config.cash_out_policy(),
        )?;
        let record = ledger.record();
        self.db.shifts().insert(&record).await?;

        *self.shift_slot() = Some(ShiftSession::new(ledger, &self.db).start());
        info!(shift = %record.id, fund = %record.initial_fund, "Shift opened");
        Ok(record)
    }

    /// Picks up the register's unclosed shift after a restart.
    ///
    /// A shift that was interrupted during its Z cut comes back OPEN.
    pub async fn resume_shift(&self) -> TerminalResult<Option<ShiftRecord>> {
        if let Some(handle) = self.current_shift() {
            return Ok(Some(handle.snapshot().await?.record));
        }
        let Some(record) = self
            .db
            .shifts()
            .open_for_register(self.config.register_id())
            .await?
        else {
            debug!(register = %self.config.register_id(), "No shift to resume");
            return Ok(None);
        };

        let sales = self.db.sales().by_shift(&record.id).await?;
        let movements = self.db.movements().cash_for_shift(&record.id).await?;
        let ledger = ShiftLedger::restore(&record, &sales, &movements, self.config.cash_out_policy())?;
        let restored = ledger.record();
        if restored.status != record.status {
            self.db.shifts().save(&restored).await?;
            warn!(
                shift = %record.id,
                was = record.status.as_str(),
                "Shift interrupted during Z cut reopened"
            );
        }

        *self.shift_slot() = Some(ShiftSession::new(ledger, &self.db).start());
        info!(
            shift = %restored.id,
            sales = sales.len(),
            movements = movements.len(),
            "Shift resumed"
        );
        Ok(Some(restored))
    }

    pub async fn register_cash_movement(
        &self,
        kind: CashMovementKind,
        amount: Money,
        reason: &str,
    ) -> TerminalResult<CashMovement> {
        self.session()?
            .register_cash_movement(kind, amount, reason, Utc::now())
            .await
    }

    /// Prints and returns an X report. The shift stays open.
    pub async fn x_report(&self) -> TerminalResult<ShiftReport> {
        let report = self.session()?.report(Utc::now()).await?;
        info!(
            shift = %report.shift_id,
            sales = report.sale_count,
            expected = %report.expected_cash_in_drawer,
            "X report generated"
        );
        self.print(TicketDescriptor::ShiftReport {
            header: self.header.clone(),
            report: Box::new(report.clone()),
        });
        Ok(report)
    }

    /// Stops sales and opens the supervisor prompt for the Z cut.
    pub async fn begin_z_cut(&self) -> TerminalResult<ProtectedAction> {
        let session = self.session()?;
        let action = session.begin_z_cut().await?;
        if let Err(e) = self.gate.request(action.clone()) {
            session.cancel_z_cut().await?;
            return Err(e.into());
        }
        Ok(action)
    }

    /// Accepts the supervisor approval and returns the report to count
    /// against.
    pub async fn authorize_z_cut(&self, approval: Approval) -> TerminalResult<ShiftReport> {
        let session = self.session()?;
        let authorized = session.authorize_z(approval).await;
        self.gate.finish();
        if let Err(e) = authorized {
            // the prompt is gone, so the shift must not stay in AUTHORIZING_Z
            if let Err(cancel) = session.cancel_z_cut().await {
                debug!(error = %cancel, "Z cut not reopened");
            }
            return Err(e);
        }
        session.report(Utc::now()).await
    }

    /// Builds a drawer count from `(denomination, pieces)` pairs.
    pub fn count_cash(entries: &[(Money, u32)]) -> TerminalResult<CashCount> {
        let mut count = CashCount::new();
        for (denomination, pieces) in entries {
            count.add(*denomination, *pieces)?;
        }
        Ok(count)
    }

    /// Closes the shift with the counted cash and prints the Z report.
    pub async fn close_shift(
        &self,
        report: &ShiftReport,
        count: CashCount,
    ) -> TerminalResult<ShiftReport> {
        let session = self.session()?;
        let closed = session.close(report.clone(), count, Utc::now()).await;
        if matches!(closed, Ok(_) | Err(TerminalError::PartialFailure { .. })) {
            self.retire_session().await;
        }
        let z = closed?;

        self.print(TicketDescriptor::ShiftReport {
            header: self.header.clone(),
            report: Box::new(z.clone()),
        });
        Ok(z)
    }

    async fn retire_session(&self) {
        let handle = self.shift_slot().take();
        if let Some(handle) = handle {
            if handle.shutdown().await.is_err() {
                debug!(shift = %handle.shift_id(), "Shift session already stopped");
            }
        }
    }

    // =========================================================================
    // Cart
    // =========================================================================

    pub async fn add_to_cart(
        &self,
        product_id: &str,
        quantity: Quantity,
        variant: LineVariant,
    ) -> TerminalResult<String> {
        let product = self.db.products().require(product_id).await?;
        if !product.is_active {
            return Err(DbError::not_found("Product", product_id).into());
        }
        let key = self
            .cart
            .with_cart_mut(|cart| cart.add_line(&product, quantity, variant))?;
        debug!(line = %key, quantity = %quantity, "Added to cart");
        Ok(key)
    }

    /// Adds whatever the scanned code resolves to.
    pub async fn scan(&self, code: &str, quantity: Quantity) -> TerminalResult<String> {
        let (product, variant) = self
            .db
            .products()
            .resolve_code(code)
            .await?
            .ok_or_else(|| TerminalError::UnknownCode(code.trim().to_string()))?;
        let key = self
            .cart
            .with_cart_mut(|cart| cart.add_line(&product, quantity, variant))?;
        debug!(code = %code, line = %key, "Scanned");
        Ok(key)
    }

    /// Edits a line's quantity. Zero opens the PIN prompt for removing it.
    pub fn set_quantity(&self, line_key: &str, quantity: Quantity) -> TerminalResult<QuantityChange> {
        let change = self
            .cart
            .with_cart_mut(|cart| cart.set_quantity(line_key, quantity))?;
        if let QuantityChange::RemovalRequested { line_key } = &change {
            self.gate.request(ProtectedAction::DeleteCartLine {
                line_key: line_key.clone(),
            })?;
        }
        Ok(change)
    }

    pub fn totals(&self) -> CartTotals {
        self.cart.totals(self.config.tax_rate())
    }

    pub fn remove_line(&self, line_key: &str, approval: Approval) -> TerminalResult<CartLine> {
        let removed = self
            .cart
            .with_cart_mut(|cart| cart.remove_line(line_key, approval));
        self.gate.finish();
        Ok(removed?)
    }

    pub fn clear_cart(&self, approval: Approval) -> TerminalResult<()> {
        let cleared = self.cart.with_cart_mut(|cart| cart.clear(approval));
        self.gate.finish();
        Ok(cleared?)
    }

    // =========================================================================
    // Supervisor prompt
    // =========================================================================

    pub fn request_authorization(&self, action: ProtectedAction) -> TerminalResult<()> {
        self.gate.request(action)?;
        Ok(())
    }

    pub fn submit_pin(&self, pin: &str) -> TerminalResult<Approval> {
        match self.gate.submit(pin, self.verifier.as_ref()) {
            Ok(approval) => {
                info!(action = approval.action().label(), "Supervisor approved");
                Ok(approval)
            }
            Err(e) => {
                warn!(attempts = self.gate.failed_attempts(), error = %e, "Supervisor PIN rejected");
                Err(e.into())
            }
        }
    }

    /// The prompt was dismissed. Abandoning a Z cut reopens the shift.
    pub async fn close_prompt(&self) -> TerminalResult<CloseOutcome> {
        let outcome = self.gate.close();
        if let CloseOutcome::Cancelled(action) = &outcome {
            debug!(action = action.label(), "Authorization abandoned");
            if let ProtectedAction::ZCut { .. } = action {
                self.session()?.cancel_z_cut().await?;
            }
        }
        Ok(outcome)
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Validates the cart against `tender`. Drop the result to cancel.
    pub async fn prepare_checkout(&self, tender: Tender) -> TerminalResult<PreparedCheckout> {
        let session = self.session()?;
        let client = match &tender {
            Tender::Credit { client_id } => self.db.clients().get(client_id).await?,
            _ => None,
        };
        let cart = self.cart.snapshot();
        Ok(checkout::prepare_checkout(
            &cart,
            self.config.tax_rate(),
            &tender,
            client,
            session.shift_id(),
            Utc::now(),
        )?)
    }

    /// Writes a prepared sale, empties the cart and prints the ticket.
    pub async fn commit_checkout(&self, prepared: PreparedCheckout) -> TerminalResult<Sale> {
        let session = self.session()?;
        match checkout::commit(prepared, &self.db, &session, Utc::now()).await {
            Ok(sale) => {
                self.cart.with_cart_mut(|cart| cart.finish_sale());
                self.print(TicketDescriptor::Sale {
                    header: self.header.clone(),
                    sale: Box::new(sale.clone()),
                    reprint: false,
                });
                Ok(sale)
            }
            Err(e @ TerminalError::PartialFailure { .. }) => {
                // the sale exists; ringing the cart again would duplicate it
                self.cart.with_cart_mut(|cart| cart.finish_sale());
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn checkout(&self, tender: Tender) -> TerminalResult<Sale> {
        let prepared = self.prepare_checkout(tender).await?;
        self.commit_checkout(prepared).await
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Records an abono against a client's open credit tickets, oldest first.
    ///
    /// Cash abonos go into the drawer; card abonos do not.
    pub async fn receive_payment(
        &self,
        client_id: &str,
        amount: Money,
        reason: Option<&str>,
        method: PaymentMethod,
    ) -> TerminalResult<PaymentReceipt> {
        let session = match method {
            PaymentMethod::Cash => {
                let session = self.session()?;
                let status = session.snapshot().await?.record.status;
                if status != ShiftStatus::Open {
                    return Err(CoreError::InvalidShiftState {
                        expected: ShiftStatus::Open.as_str().to_string(),
                        current: status.as_str().to_string(),
                    }
                    .into());
                }
                Some(session)
            }
            PaymentMethod::Card => None,
            PaymentMethod::Credit => {
                return Err(CoreError::from(ValidationError::InvalidFormat {
                    field: "paymentMethod".to_string(),
                    reason: "an abono is paid in cash or by card".to_string(),
                })
                .into())
            }
        };

        let now = Utc::now();
        let clients = self.db.clients();
        let sales = self.db.sales();
        let mut client = clients.require(client_id).await?;
        let mut tickets = sales.open_credit_tickets(client_id).await?;
        let receipt = apply_payment(
            &mut client,
            &mut tickets,
            amount,
            reason,
            self.config.credit_policy(),
            now,
        )?;

        let mut steps = StepLog::new("receive_payment");
        for allocation in &receipt.allocations {
            let Some(ticket) = tickets.iter().find(|t| t.id == allocation.ticket_id) else {
                continue;
            };
            let step = format!("ticket {}", ticket.id);
            sales
                .update_balance(ticket)
                .await
                .map_err(|e| steps.fail(&step, e))?;
            steps.committed(step);
        }
        clients
            .adjust_balance(client_id, -receipt.amount)
            .await
            .map_err(|e| steps.fail("client balance", e))?;
        steps.committed("client balance");

        if let Some(session) = session {
            session
                .register_cash_movement(
                    CashMovementKind::In,
                    receipt.amount,
                    format!("Abono {}", client.name),
                    now,
                )
                .await
                .map_err(|e| steps.fail("drawer", e))?;
        }

        info!(
            client = %client.id,
            applied = %receipt.amount,
            tickets = receipt.allocations.len(),
            balance = %receipt.balance_after,
            method = method.as_str(),
            "Abono received"
        );
        self.print(TicketDescriptor::PaymentReceipt {
            header: self.header.clone(),
            receipt: receipt.clone(),
        });
        Ok(receipt)
    }

    // =========================================================================
    // Returns / Reprints
    // =========================================================================

    /// Takes goods back on a ticket.
    ///
    /// On a credit ticket the refund first cancels unpaid balance (credit
    /// note); only the rest leaves the drawer.
    pub async fn process_return(
        &self,
        sale_id: &str,
        lines: &[ReturnLine],
        approval: Approval,
    ) -> TerminalResult<ReturnOutcome> {
        let now = Utc::now();
        let sales = self.db.sales();
        let loaded = sales.require(sale_id).await;
        let mut sale = match loaded {
            Ok(sale) => sale,
            Err(e) => {
                self.gate.finish();
                return Err(e.into());
            }
        };
        let processed =
            process_return_batch(&mut sale, lines, approval, self.config.return_policy(), now);
        self.gate.finish();
        let outcome = processed?;

        let credited_client = match (&sale.client_id, outcome.credit_note.is_positive()) {
            (Some(client_id), true) => Some(client_id.clone()),
            _ => None,
        };
        let session = if outcome.cash_refund.is_positive() {
            Some(self.session()?)
        } else {
            None
        };

        let mut steps = StepLog::new("process_return");
        if let Some(session) = &session {
            session
                .register_cash_movement(
                    CashMovementKind::Out,
                    outcome.cash_refund,
                    format!("Devolución ticket {}", sale.id),
                    now,
                )
                .await?;
            steps.committed("drawer");
        }

        sales
            .update_items(&sale)
            .await
            .map_err(|e| steps.fail("ticket items", e))?;
        steps.committed("ticket items");
        if outcome.credit_note.is_positive() {
            sales
                .update_balance(&sale)
                .await
                .map_err(|e| steps.fail("ticket balance", e))?;
            steps.committed("ticket balance");
        }

        let products = self.db.products();
        let movements = self.db.movements();
        for line in &outcome.lines {
            let step = format!("stock {}", line.product_id);
            products
                .adjust_stock(&line.product_id, line.stock_units)
                .await
                .map_err(|e| steps.fail(&step, e))?;
            steps.committed(step);

            let step = format!("kardex {}", line.product_id);
            let entry = InventoryMovement {
                id: Uuid::new_v4().to_string(),
                product_id: line.product_id.clone(),
                delta: line.stock_units,
                reason: InventoryReason::Return,
                reference: Some(sale.id.clone()),
                created_at: now,
            };
            movements
                .insert_inventory(&entry)
                .await
                .map_err(|e| steps.fail(&step, e))?;
            steps.committed(step);
        }

        if let Some(client_id) = &credited_client {
            self.db
                .clients()
                .adjust_balance(client_id, -outcome.credit_note)
                .await
                .map_err(|e| steps.fail("client balance", e))?;
            steps.committed("client balance");
        }

        info!(
            sale_id = %sale.id,
            refund = %outcome.refund,
            credit_note = %outcome.credit_note,
            cash_refund = %outcome.cash_refund,
            "Return processed"
        );
        self.print(TicketDescriptor::Return {
            header: self.header.clone(),
            outcome: outcome.clone(),
        });
        Ok(outcome)
    }

    /// Prints a ticket again. Tickets of closed shifts are refused.
    pub async fn reprint(&self, sale_id: &str, approval: Approval) -> TerminalResult<TicketDescriptor> {
        let covered = approval.ensure_covers(&ProtectedAction::ReprintTicket {
            sale_id: sale_id.to_string(),
        });
        self.gate.finish();
        covered?;

        let sale = self.db.sales().require(sale_id).await?;
        match self.current_shift() {
            Some(handle) if handle.shift_id() == sale.shift_id => {
                handle.ensure_reprintable(sale.clone()).await?
            }
            _ => self.ensure_reprintable_elsewhere(&sale).await?,
        }

        let ticket = TicketDescriptor::Sale {
            header: self.header.clone(),
            sale: Box::new(sale),
            reprint: true,
        };
        self.printer.render(&ticket)?;
        info!(sale_id = %sale_id, "Ticket reprinted");
        Ok(ticket)
    }

    /// Reprint check for a sale outside this register's live shift.
    async fn ensure_reprintable_elsewhere(&self, sale: &Sale) -> TerminalResult<()> {
        let shift_closed = match self.db.shifts().get(&sale.shift_id).await? {
            Some(record) => record.status == ShiftStatus::Closed,
            None => false,
        };
        if sale.closure_id.is_some() || shift_closed {
            return Err(CoreError::ReprintOfClosedShift {
                sale_id: sale.id.clone(),
                shift_id: sale.shift_id.clone(),
            }
            .into());
        }
        Ok(())
    }

    // =========================================================================
    // Status / Shutdown
    // =========================================================================

    pub async fn status(&self) -> TerminalResult<TerminalStatus> {
        let session = match self.current_shift() {
            Some(handle) => Some(handle.snapshot().await?),
            None => None,
        };
        let stored_shift = match session {
            Some(_) => None,
            None => {
                self.db
                    .shifts()
                    .open_for_register(self.config.register_id())
                    .await?
            }
        };
        let pending_authorization = match self.gate.state() {
            PromptState::AwaitingAuth(action) => Some(action),
            _ => None,
        };
        let totals = self.totals();

        Ok(TerminalStatus {
            register_id: self.config.register.id.clone(),
            register_name: self.config.register.name.clone(),
            session,
            stored_shift,
            cart_lines: totals.lines.len(),
            cart_total: totals.total,
            pending_authorization,
        })
    }

    /// Stops the shift session (the shift stays open) and closes the pool.
    pub async fn shutdown(&self) {
        self.retire_session().await;
        self.db.close().await;
        info!("Register shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printing::MemoryPrintSink;
    use mostrador_core::auth::StaticPin;
    use mostrador_core::Product;

    async fn terminal() -> (Terminal, Arc<MemoryPrintSink>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let printer = Arc::new(MemoryPrintSink::new());
        let terminal = Terminal::new(
            TerminalConfig::default(),
            db,
            Arc::new(StaticPin("2468".into())),
            printer.clone(),
        );
        (terminal, printer)
    }

    async fn stock(terminal: &Terminal, id: &str, price: i64) {
        let mut product = Product::basic(id, format!("Producto {id}"), Money::from_major(price));
        product.sku = Some(id.to_uppercase());
        product.stock = Quantity::from_units(50);
        terminal.database().products().insert(&product).await.unwrap();
    }

    #[tokio::test]
    async fn test_open_shift_twice_is_rejected() {
        let (terminal, _) = terminal().await;
        let record = terminal.open_shift(Money::from_major(500)).await.unwrap();
        assert_eq!(record.status, ShiftStatus::Open);

        assert!(matches!(
            terminal.open_shift(Money::from_major(500)).await,
            Err(TerminalError::ShiftAlreadyOpen(id)) if id == record.id
        ));
    }

    #[tokio::test]
    async fn test_checkout_needs_open_shift() {
        let (terminal, _) = terminal().await;
        stock(&terminal, "p1", 10).await;
        terminal.scan("P1", Quantity::from_units(1)).await.unwrap();

        assert!(matches!(
            terminal.checkout(Tender::Card).await,
            Err(TerminalError::NoOpenShift)
        ));
        assert_eq!(terminal.cart().with_cart(|c| c.line_count()), 1);
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let (terminal, _) = terminal().await;
        assert!(matches!(
            terminal.scan(" NOPE ", Quantity::from_units(1)).await,
            Err(TerminalError::UnknownCode(code)) if code == "NOPE"
        ));
    }

    #[tokio::test]
    async fn test_zero_quantity_opens_removal_prompt() {
        let (terminal, _) = terminal().await;
        stock(&terminal, "p1", 10).await;
        let key = terminal.scan("P1", Quantity::from_units(3)).await.unwrap();

        let change = terminal.set_quantity(&key, Quantity::zero()).unwrap();
        assert_eq!(
            change,
            QuantityChange::RemovalRequested {
                line_key: key.clone()
            }
        );
        assert_eq!(
            terminal.prompt_state(),
            PromptState::AwaitingAuth(ProtectedAction::DeleteCartLine {
                line_key: key.clone()
            })
        );

        assert!(terminal.submit_pin("1111").is_err());
        let approval = terminal.submit_pin("2468").unwrap();
        let removed = terminal.remove_line(&key, approval).unwrap();
        assert_eq!(removed.quantity, Quantity::from_units(3));
        assert!(terminal.cart().with_cart(|c| c.is_empty()));
        assert_eq!(terminal.prompt_state(), PromptState::Idle);
    }

    #[tokio::test]
    async fn test_dismissed_z_prompt_reopens_shift() {
        let (terminal, _) = terminal().await;
        terminal.open_shift(Money::from_major(100)).await.unwrap();

        terminal.begin_z_cut().await.unwrap();
        let outcome = terminal.close_prompt().await.unwrap();
        assert!(matches!(outcome, CloseOutcome::Cancelled(ProtectedAction::ZCut { .. })));

        let status = terminal.status().await.unwrap();
        assert_eq!(
            status.session.map(|s| s.record.status),
            Some(ShiftStatus::Open)
        );
        assert!(status.pending_authorization.is_none());
    }

    #[tokio::test]
    async fn test_count_cash_rejects_odd_denominations() {
        let count = Terminal::count_cash(&[(Money::from_major(500), 2), (Money::from_major(20), 3)])
            .unwrap();
        assert_eq!(count.total(), Money::from_major(1060));
        assert!(Terminal::count_cash(&[(Money::from_major(3), 1)]).is_err());
    }
}
