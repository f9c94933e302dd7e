//! # Shift Session
//!
//! One task per open shift owns the [`ShiftLedger`]. Every read and write of
//! the ledger is a command on its queue, so a sale being finalized and a cash
//! movement can never interleave and a report never sees half of either.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Shift Session                                   │
//! │                                                                         │
//! │  checkout ─────┐                                                        │
//! │  cash in/out ──┤   ShiftHandle (Clone)                                  │
//! │  X report ─────┼──► mpsc::Sender<SessionCommand> ──┐                    │
//! │  Z cut ────────┘                                   │                    │
//! │                                                    ▼                    │
//! │                                     ┌──────────────────────────────┐   │
//! │                                     │  ShiftSession task           │   │
//! │                                     │                              │   │
//! │                                     │  1. apply to a ledger clone  │   │
//! │                                     │  2. persist                  │   │
//! │                                     │  3. swap clone in            │   │
//! │                                     │  4. reply on oneshot         │   │
//! │                                     └──────────────────────────────┘   │
//! │                                                    │                    │
//! │                                                    ▼                    │
//! │                                    sales / cash_movements / shifts      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A command that fails validation or whose first write fails leaves the
//! ledger exactly as it was.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use mostrador_core::shift::{CashCount, ShiftLedger, ShiftRecord, ShiftReport};
use mostrador_core::{Approval, CashMovement, CashMovementKind, Money, ProtectedAction, Sale};
use mostrador_db::{Database, MovementRepository, SaleRepository, ShiftRepository};

use crate::error::{TerminalError, TerminalResult};

/// Queue depth. The register is single-operator; this only absorbs bursts.
const COMMAND_BUFFER: usize = 32;

type Reply<T> = oneshot::Sender<TerminalResult<T>>;

/// Read-only view of the session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub record: ShiftRecord,
    pub expected_cash_in_drawer: Money,
    pub movement_count: usize,
}

#[derive(Debug)]
enum SessionCommand {
    FinalizeSale {
        sale: Box<Sale>,
        reply: Reply<()>,
    },
    CashMovement {
        kind: CashMovementKind,
        amount: Money,
        reason: String,
        now: DateTime<Utc>,
        reply: Reply<CashMovement>,
    },
    Report {
        now: DateTime<Utc>,
        reply: Reply<ShiftReport>,
    },
    BeginZ {
        reply: Reply<ProtectedAction>,
    },
    AuthorizeZ {
        approval: Approval,
        reply: Reply<()>,
    },
    CancelZ {
        reply: Reply<()>,
    },
    Close {
        report: Box<ShiftReport>,
        count: CashCount,
        now: DateTime<Utc>,
        reply: Reply<ShiftReport>,
    },
    EnsureReprintable {
        sale: Box<Sale>,
        reply: Reply<()>,
    },
    Snapshot {
        reply: Reply<SessionSnapshot>,
    },
    Shutdown,
}

// =============================================================================
// Handle
// =============================================================================

/// Handle to a running shift session.
#[derive(Debug, Clone)]
pub struct ShiftHandle {
    shift_id: String,
    cmd_tx: mpsc::Sender<SessionCommand>,
}

impl ShiftHandle {
    pub fn shift_id(&self) -> &str {
        &self.shift_id
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> SessionCommand) -> TerminalResult<T> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(reply))
            .await
            .map_err(|_| TerminalError::SessionClosed)?;
        rx.await.map_err(|_| TerminalError::SessionClosed)?
    }

    /// Persists a completed sale and adds it to the shift totals.
    pub async fn finalize_sale(&self, sale: Sale) -> TerminalResult<()> {
        self.call(|reply| SessionCommand::FinalizeSale {
            sale: Box::new(sale),
            reply,
        })
        .await
    }

    pub async fn register_cash_movement(
        &self,
        kind: CashMovementKind,
        amount: Money,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> TerminalResult<CashMovement> {
        let reason = reason.into();
        self.call(|reply| SessionCommand::CashMovement {
            kind,
            amount,
            reason,
            now,
            reply,
        })
        .await
    }

    /// X report.
    pub async fn report(&self, now: DateTime<Utc>) -> TerminalResult<ShiftReport> {
        self.call(|reply| SessionCommand::Report { now, reply }).await
    }

    pub async fn begin_z_cut(&self) -> TerminalResult<ProtectedAction> {
        self.call(|reply| SessionCommand::BeginZ { reply }).await
    }

    pub async fn authorize_z(&self, approval: Approval) -> TerminalResult<()> {
        self.call(|reply| SessionCommand::AuthorizeZ { approval, reply })
            .await
    }

    pub async fn cancel_z_cut(&self) -> TerminalResult<()> {
        self.call(|reply| SessionCommand::CancelZ { reply }).await
    }

    pub async fn close(
        &self,
        report: ShiftReport,
        count: CashCount,
        now: DateTime<Utc>,
    ) -> TerminalResult<ShiftReport> {
        self.call(|reply| SessionCommand::Close {
            report: Box::new(report),
            count,
            now,
            reply,
        })
        .await
    }

    pub async fn ensure_reprintable(&self, sale: Sale) -> TerminalResult<()> {
        self.call(|reply| SessionCommand::EnsureReprintable {
            sale: Box::new(sale),
            reply,
        })
        .await
    }

    pub async fn snapshot(&self) -> TerminalResult<SessionSnapshot> {
        self.call(|reply| SessionCommand::Snapshot { reply }).await
    }

    /// Stops the session task after the commands already queued.
    pub async fn shutdown(&self) -> TerminalResult<()> {
        self.cmd_tx
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| TerminalError::SessionClosed)
    }
}

// =============================================================================
// Session
// =============================================================================

pub struct ShiftSession {
    ledger: ShiftLedger,
    sales: SaleRepository,
    movements: MovementRepository,
    shifts: ShiftRepository,
}

impl ShiftSession {
    pub fn new(ledger: ShiftLedger, db: &Database) -> Self {
        ShiftSession {
            ledger,
            sales: db.sales(),
            movements: db.movements(),
            shifts: db.shifts(),
        }
    }

    /// Spawns the session task and returns its handle.
    pub fn start(self) -> ShiftHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let shift_id = self.ledger.shift_id().to_string();

        tokio::spawn(async move {
            self.run(cmd_rx).await;
        });

        ShiftHandle { shift_id, cmd_tx }
    }

    async fn run(mut self, mut cmd_rx: mpsc::Receiver<SessionCommand>) {
        info!(shift = %self.ledger.shift_id(), status = self.ledger.status().as_str(), "Shift session started");

        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                SessionCommand::Shutdown => {
                    info!(shift = %self.ledger.shift_id(), "Shift session shutting down");
                    break;
                }
                SessionCommand::FinalizeSale { sale, reply } => {
                    let _ = reply.send(self.finalize_sale(*sale).await);
                }
                SessionCommand::CashMovement {
                    kind,
                    amount,
                    reason,
                    now,
                    reply,
                } => {
                    let _ = reply.send(self.cash_movement(kind, amount, &reason, now).await);
                }
                SessionCommand::Report { now, reply } => {
                    let _ = reply.send(Ok(self.ledger.generate_report(now)));
                }
                SessionCommand::BeginZ { reply } => {
                    let _ = reply.send(self.begin_z().await);
                }
                SessionCommand::AuthorizeZ { approval, reply } => {
                    let _ = reply.send(self.authorize_z(approval).await);
                }
                SessionCommand::CancelZ { reply } => {
                    let _ = reply.send(self.cancel_z().await);
                }
                SessionCommand::Close {
                    report,
                    count,
                    now,
                    reply,
                } => {
                    let _ = reply.send(self.close(&report, count, now).await);
                }
                SessionCommand::EnsureReprintable { sale, reply } => {
                    let _ = reply.send(self.ledger.ensure_reprintable(&sale).map_err(Into::into));
                }
                SessionCommand::Snapshot { reply } => {
                    let _ = reply.send(Ok(SessionSnapshot {
                        record: self.ledger.record(),
                        expected_cash_in_drawer: self.ledger.expected_cash_in_drawer(),
                        movement_count: self.ledger.movements().len(),
                    }));
                }
            }
        }

        debug!(shift = %self.ledger.shift_id(), "Shift session stopped");
    }

    async fn finalize_sale(&mut self, sale: Sale) -> TerminalResult<()> {
        let mut next = self.ledger.clone();
        next.record_sale(&sale)?;
        self.sales.insert(&sale).await?;
        self.ledger = next;
        debug!(sale_id = %sale.id, total = %sale.total, method = sale.payment_method.as_str(), "Sale recorded in shift");
        Ok(())
    }

    async fn cash_movement(
        &mut self,
        kind: CashMovementKind,
        amount: Money,
        reason: &str,
        now: DateTime<Utc>,
    ) -> TerminalResult<CashMovement> {
        let mut next = self.ledger.clone();
        let movement = next.register_cash_movement(kind, amount, reason, now)?;
        self.movements.insert_cash(&movement).await?;
        self.ledger = next;
        info!(
            shift = %movement.shift_id,
            amount = %movement.signed_amount(),
            reason = %movement.reason,
            "Cash movement registered"
        );
        Ok(movement)
    }

    async fn begin_z(&mut self) -> TerminalResult<ProtectedAction> {
        let mut next = self.ledger.clone();
        let action = next.begin_z_cut()?;
        self.shifts.save(&next.record()).await?;
        self.ledger = next;
        info!(shift = %self.ledger.shift_id(), "Z cut started, awaiting supervisor");
        Ok(action)
    }

    async fn authorize_z(&mut self, approval: Approval) -> TerminalResult<()> {
        let mut next = self.ledger.clone();
        next.authorize_z(approval)?;
        self.shifts.save(&next.record()).await?;
        self.ledger = next;
        info!(shift = %self.ledger.shift_id(), "Z cut authorized, counting cash");
        Ok(())
    }

    async fn cancel_z(&mut self) -> TerminalResult<()> {
        let mut next = self.ledger.clone();
        next.cancel_z_cut()?;
        self.shifts.save(&next.record()).await?;
        self.ledger = next;
        info!(shift = %self.ledger.shift_id(), "Z cut cancelled, shift reopened");
        Ok(())
    }

    /// Writes the closed shift record, then stamps the shift's tickets.
    async fn close(
        &mut self,
        report: &ShiftReport,
        count: CashCount,
        now: DateTime<Utc>,
    ) -> TerminalResult<ShiftReport> {
        let mut next = self.ledger.clone();
        let z = next.close_shift(report, count, now)?;
        self.shifts.save(&next.record()).await?;
        self.ledger = next;
        info!(
            shift = %z.shift_id,
            expected = %z.expected_cash_in_drawer,
            counted = ?z.cash_counted,
            difference = ?z.difference,
            "Shift closed"
        );

        let shift_id = self.ledger.shift_id().to_string();
        match self.sales.mark_closed(&shift_id, &shift_id).await {
            Ok(stamped) => {
                debug!(shift = %shift_id, tickets = stamped, "Tickets stamped with closure");
                Ok(z)
            }
            Err(e) => {
                error!(shift = %shift_id, error = %e, "Shift closed but tickets were not stamped");
                Err(TerminalError::PartialFailure {
                    operation: "close_shift".to_string(),
                    committed: vec!["shift record".to_string()],
                    failed_step: "ticket closure".to_string(),
                    source: Box::new(e.into()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mostrador_core::shift::{CashOutPolicy, ShiftStatus};
    use mostrador_core::{CoreError, PaymentMethod};
    use mostrador_db::DbConfig;

    async fn setup(policy: CashOutPolicy) -> (Database, ShiftHandle) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = ShiftLedger::open("s1", "caja-1", Money::from_major(500), Utc::now(), policy).unwrap();
        db.shifts().insert(&ledger.record()).await.unwrap();
        let handle = ShiftSession::new(ledger, &db).start();
        (db, handle)
    }

    fn sale(id: &str, method: PaymentMethod, total: i64) -> Sale {
        let total = Money::from_major(total);
        Sale {
            id: id.to_string(),
            shift_id: "s1".to_string(),
            date: Utc::now(),
            items: Vec::new(),
            subtotal: total,
            tax: Money::zero(),
            savings: Money::zero(),
            total,
            payment_method: method,
            amount_tendered: total,
            change: Money::zero(),
            customer_name: None,
            client_id: None,
            remaining_balance: Money::zero(),
            payment_history: Vec::new(),
            closure_id: None,
        }
    }

    #[tokio::test]
    async fn test_finalize_sale_persists_and_tallies() {
        let (db, handle) = setup(CashOutPolicy::AllowNegative).await;

        handle
            .finalize_sale(sale("v1", PaymentMethod::Cash, 1200))
            .await
            .unwrap();

        assert!(db.sales().get("v1").await.unwrap().is_some());
        let report = handle.report(Utc::now()).await.unwrap();
        assert_eq!(report.cash_sales, Money::from_major(1200));
        assert_eq!(report.expected_cash_in_drawer, Money::from_major(1700));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_ledger_unchanged() {
        let (_db, handle) = setup(CashOutPolicy::AllowNegative).await;
        handle
            .finalize_sale(sale("v1", PaymentMethod::Cash, 100))
            .await
            .unwrap();

        // same id again: the insert is rejected as a duplicate
        assert!(matches!(
            handle.finalize_sale(sale("v1", PaymentMethod::Card, 300)).await,
            Err(TerminalError::Persistence(_))
        ));

        let report = handle.report(Utc::now()).await.unwrap();
        assert_eq!(report.sale_count, 1);
        assert_eq!(report.card_sales, Money::zero());
    }

    #[tokio::test]
    async fn test_concurrent_commands_are_serialized() {
        let (db, handle) = setup(CashOutPolicy::AllowNegative).await;

        let mut tasks = Vec::new();
        for i in 0..10 {
            let h = handle.clone();
            tasks.push(tokio::spawn(async move {
                h.finalize_sale(sale(&format!("v{i}"), PaymentMethod::Cash, 100))
                    .await
                    .unwrap();
                h.register_cash_movement(CashMovementKind::Out, Money::from_major(10), "Gasto", Utc::now())
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let report = handle.report(Utc::now()).await.unwrap();
        assert_eq!(report.sale_count, 10);
        assert_eq!(report.cash_out, Money::from_major(100));
        // 500 + 1000 - 100
        assert_eq!(report.expected_cash_in_drawer, Money::from_major(1400));
        assert_eq!(db.movements().cash_for_shift("s1").await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_limit_to_drawer_rejects_without_writing() {
        let (db, handle) = setup(CashOutPolicy::LimitToDrawer).await;

        let err = handle
            .register_cash_movement(CashMovementKind::Out, Money::from_major(600), "Pago proveedor", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TerminalError::Core(CoreError::DrawerInsufficient { .. })
        ));
        assert!(db.movements().cash_for_shift("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_z_cut_status_is_persisted() {
        let (db, handle) = setup(CashOutPolicy::AllowNegative).await;

        let action = handle.begin_z_cut().await.unwrap();
        assert_eq!(action, ProtectedAction::ZCut { shift_id: "s1".into() });
        assert_eq!(
            db.shifts().require("s1").await.unwrap().status,
            ShiftStatus::AuthorizingZ
        );

        // no sales while the Z cut is in progress
        assert!(handle
            .finalize_sale(sale("late", PaymentMethod::Cash, 10))
            .await
            .is_err());
        assert!(db.sales().get("late").await.unwrap().is_none());

        handle.cancel_z_cut().await.unwrap();
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.record.status, ShiftStatus::Open);
        assert_eq!(
            db.shifts().require("s1").await.unwrap().status,
            ShiftStatus::Open
        );
    }

    #[tokio::test]
    async fn test_shutdown_closes_handle() {
        let (_db, handle) = setup(CashOutPolicy::AllowNegative).await;
        handle.shutdown().await.unwrap();
        tokio::task::yield_now().await;

        assert!(matches!(
            handle.report(Utc::now()).await,
            Err(TerminalError::SessionClosed)
        ));
    }
}
