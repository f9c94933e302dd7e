//! # Shift Ledger
//!
//! Running tallies for one register shift, X-cut snapshots and the Z-cut.
//!
//! ## Shift Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   open()                                                                │
//! │     │                                                                   │
//! │     ▼          record_sale / register_cash_movement / generate_report   │
//! │   ┌──────┐ ◄──────────────────────────────────────────────────────┐     │
//! │   │ OPEN │ ───────────────────────────────────────────────────────┘     │
//! │   └──┬───┘          (X-cut never changes state)                         │
//! │      │ begin_z_cut()                   ▲                                │
//! │      ▼                                 │ cancel_z_cut()                 │
//! │   ┌─────────────────┐                  │                                │
//! │   │ AUTHORIZING_Z   │ ─────────────────┤                                │
//! │   └──┬──────────────┘                  │                                │
//! │      │ authorize_z(Approval)           │                                │
//! │      ▼                                 │                                │
//! │   ┌─────────────────┐                  │                                │
//! │   │ COUNTING_CASH   │ ─────────────────┘                                │
//! │   └──┬──────────────┘                                                   │
//! │      │ close_shift(report, CashCount)                                   │
//! │      ▼                                                                  │
//! │   ┌────────┐                                                            │
//! │   │ CLOSED │  second close → ShiftAlreadyClosed                         │
//! │   └────────┘  reprint of its tickets → ReprintOfClosedShift             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Drawer Arithmetic
//! ```text
//! expectedCashInDrawer = initialFund + cashSales + cashIn − cashOut
//! difference           = cashCounted − expectedCashInDrawer
//! ```

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::auth::{Approval, ProtectedAction};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::{CashMovement, CashMovementKind, PaymentMethod, Sale};
use crate::validation::{validate_amount, validate_reason};

// =============================================================================
// Policy and Status
// =============================================================================

/// Whether a cash OUT may take the drawer below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum CashOutPolicy {
    /// Emergency float: the drawer may go negative.
    #[default]
    AllowNegative,
    /// Reject outflows larger than the expected drawer contents.
    LimitToDrawer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ShiftStatus {
    Open,
    AuthorizingZ,
    CountingCash,
    Closed,
}

impl ShiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftStatus::Open => "OPEN",
            ShiftStatus::AuthorizingZ => "AUTHORIZING_Z",
            ShiftStatus::CountingCash => "COUNTING_CASH",
            ShiftStatus::Closed => "CLOSED",
        }
    }
}

// =============================================================================
// Cash Count
// =============================================================================

/// Peso denominations accepted in a count, largest first, in cents.
pub const DENOMINATIONS: [i64; 12] = [
    100_000, 50_000, 20_000, 10_000, 5_000, 2_000, // bills
    2_000, 1_000, 500, 200, 100, 50, // coins
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DenominationCount {
    pub denomination: Money,
    pub count: u32,
}

impl DenominationCount {
    pub fn subtotal(&self) -> Money {
        self.denomination * self.count as i64
    }
}

/// Physical drawer count, itemized by denomination for audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CashCount {
    pub entries: Vec<DenominationCount>,
}

impl CashCount {
    pub fn new() -> Self {
        CashCount::default()
    }

    /// Adds `count` pieces of `denomination`. The $20 bill and $20 coin
    /// share a face value and are counted together.
    pub fn add(&mut self, denomination: Money, count: u32) -> CoreResult<()> {
        if !DENOMINATIONS.contains(&denomination.cents()) {
            return Err(ValidationError::InvalidFormat {
                field: "denomination".to_string(),
                reason: format!("{denomination} is not a peso denomination"),
            }
            .into());
        }
        match self
            .entries
            .iter_mut()
            .find(|e| e.denomination == denomination)
        {
            Some(entry) => entry.count += count,
            None => self.entries.push(DenominationCount {
                denomination,
                count,
            }),
        }
        Ok(())
    }

    pub fn with(mut self, denomination: Money, count: u32) -> CoreResult<Self> {
        self.add(denomination, count)?;
        Ok(self)
    }

    pub fn total(&self) -> Money {
        self.entries.iter().map(DenominationCount::subtotal).sum()
    }
}

// =============================================================================
// Report
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ReportKind {
    X,
    Z,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SoldProduct {
    pub name: String,
    #[ts(type = "number")]
    pub quantity: Quantity,
    pub total: Money,
}

/// X or Z report of a shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ShiftReport {
    pub shift_id: String,
    pub kind: ReportKind,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub generated_at: DateTime<Utc>,
    pub sale_count: u32,
    pub total_sales: Money,
    pub cash_sales: Money,
    pub card_sales: Money,
    /// `totalSales − cashSales − cardSales`.
    pub credit_sales: Money,
    pub initial_fund: Money,
    pub cash_in: Money,
    pub cash_out: Money,
    pub expected_cash_in_drawer: Money,
    #[serde(default)]
    pub sold_products: Vec<SoldProduct>,
    /// Z-cut only.
    pub cash_counted: Option<Money>,
    /// Z-cut only: `cashCounted − expectedCashInDrawer`.
    pub difference: Option<Money>,
    pub cash_count: Option<CashCount>,
}

/// Persisted shift row.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ShiftRecord {
    pub id: String,
    pub register_id: String,
    pub status: ShiftStatus,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    pub initial_fund: Money,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    pub z_report: Option<ShiftReport>,
}

// =============================================================================
// Ledger
// =============================================================================

#[derive(Debug, Clone)]
pub struct ShiftLedger {
    shift_id: String,
    register_id: String,
    opened_at: DateTime<Utc>,
    initial_fund: Money,
    status: ShiftStatus,
    policy: CashOutPolicy,
    closed_at: Option<DateTime<Utc>>,
    z_report: Option<ShiftReport>,

    recorded_sales: HashSet<String>,
    cash_sales: Money,
    card_sales: Money,
    credit_sales: Money,
    sold: Vec<SoldProduct>,
    sold_index: HashMap<String, usize>,

    movements: Vec<CashMovement>,
    cash_in: Money,
    cash_out: Money,
}

impl ShiftLedger {
    /// Opens a new shift with `initial_fund` in the drawer.
    pub fn open(
        shift_id: impl Into<String>,
        register_id: impl Into<String>,
        initial_fund: Money,
        opened_at: DateTime<Utc>,
        policy: CashOutPolicy,
    ) -> CoreResult<Self> {
        if initial_fund.is_negative() {
            return Err(ValidationError::OutOfRange {
                field: "initial fund".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }
        Ok(ShiftLedger {
            shift_id: shift_id.into(),
            register_id: register_id.into(),
            opened_at,
            initial_fund,
            status: ShiftStatus::Open,
            policy,
            closed_at: None,
            z_report: None,
            recorded_sales: HashSet::new(),
            cash_sales: Money::zero(),
            card_sales: Money::zero(),
            credit_sales: Money::zero(),
            sold: Vec::new(),
            sold_index: HashMap::new(),
            movements: Vec::new(),
            cash_in: Money::zero(),
            cash_out: Money::zero(),
        })
    }

    /// Rebuilds a ledger from its persisted record, sales and movements.
    ///
    /// A shift interrupted mid Z-cut resumes as `OPEN`: the authorization
    /// must be repeated.
    pub fn restore(
        record: &ShiftRecord,
        sales: &[Sale],
        movements: &[CashMovement],
        policy: CashOutPolicy,
    ) -> CoreResult<Self> {
        let mut ledger = ShiftLedger::open(
            record.id.clone(),
            record.register_id.clone(),
            record.initial_fund,
            record.opened_at,
            policy,
        )?;
        for sale in sales.iter().filter(|s| s.shift_id == record.id) {
            ledger.tally_sale(sale);
        }
        for movement in movements.iter().filter(|m| m.shift_id == record.id) {
            ledger.tally_movement(movement.clone());
        }
        if record.status == ShiftStatus::Closed {
            ledger.status = ShiftStatus::Closed;
            ledger.closed_at = record.closed_at;
            ledger.z_report = record.z_report.clone();
        }
        Ok(ledger)
    }

    pub fn shift_id(&self) -> &str {
        &self.shift_id
    }

    pub fn status(&self) -> ShiftStatus {
        self.status
    }

    pub fn policy(&self) -> CashOutPolicy {
        self.policy
    }

    pub fn movements(&self) -> &[CashMovement] {
        &self.movements
    }

    pub fn z_report(&self) -> Option<&ShiftReport> {
        self.z_report.as_ref()
    }

    /// The persisted form of the shift.
    pub fn record(&self) -> ShiftRecord {
        ShiftRecord {
            id: self.shift_id.clone(),
            register_id: self.register_id.clone(),
            status: self.status,
            opened_at: self.opened_at,
            initial_fund: self.initial_fund,
            closed_at: self.closed_at,
            z_report: self.z_report.clone(),
        }
    }

    pub fn expected_cash_in_drawer(&self) -> Money {
        self.initial_fund + self.cash_sales + self.cash_in - self.cash_out
    }

    fn require(&self, expected: ShiftStatus) -> CoreResult<()> {
        if self.status == ShiftStatus::Closed {
            return Err(CoreError::ShiftAlreadyClosed(self.shift_id.clone()));
        }
        if self.status != expected {
            return Err(CoreError::InvalidShiftState {
                expected: expected.as_str().to_string(),
                current: self.status.as_str().to_string(),
            });
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Mutations (OPEN only)
    // -------------------------------------------------------------------------

    /// Adds a completed sale to the tallies. Recording the same sale twice
    /// is a no-op.
    pub fn record_sale(&mut self, sale: &Sale) -> CoreResult<()> {
        self.require(ShiftStatus::Open)?;
        self.tally_sale(sale);
        Ok(())
    }

    fn tally_sale(&mut self, sale: &Sale) {
        if !self.recorded_sales.insert(sale.id.clone()) {
            return;
        }
        match sale.payment_method {
            PaymentMethod::Cash => self.cash_sales += sale.total,
            PaymentMethod::Card => self.card_sales += sale.total,
            PaymentMethod::Credit => self.credit_sales += sale.total,
        }
        for item in &sale.items {
            let index = match self.sold_index.get(&item.name) {
                Some(&index) => index,
                None => {
                    self.sold.push(SoldProduct {
                        name: item.name.clone(),
                        quantity: Quantity::zero(),
                        total: Money::zero(),
                    });
                    self.sold_index.insert(item.name.clone(), self.sold.len() - 1);
                    self.sold.len() - 1
                }
            };
            let entry = &mut self.sold[index];
            entry.quantity += item.quantity;
            entry.total += item.line_total();
        }
    }

    /// Registers money put into or taken out of the drawer.
    pub fn register_cash_movement(
        &mut self,
        kind: CashMovementKind,
        amount: Money,
        reason: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<CashMovement> {
        self.require(ShiftStatus::Open)?;
        validate_amount(amount, "amount")?;
        let reason = validate_reason(reason)?;

        if kind == CashMovementKind::Out && self.policy == CashOutPolicy::LimitToDrawer {
            let available = self.expected_cash_in_drawer();
            if amount > available {
                return Err(CoreError::DrawerInsufficient { amount, available });
            }
        }

        let movement = CashMovement {
            id: Uuid::new_v4().to_string(),
            shift_id: self.shift_id.clone(),
            kind,
            amount,
            reason,
            created_at: now,
        };
        self.tally_movement(movement.clone());
        Ok(movement)
    }

    fn tally_movement(&mut self, movement: CashMovement) {
        match movement.kind {
            CashMovementKind::In => self.cash_in += movement.amount,
            CashMovementKind::Out => self.cash_out += movement.amount,
        }
        self.movements.push(movement);
    }

    // -------------------------------------------------------------------------
    // Reports
    // -------------------------------------------------------------------------

    /// X-cut snapshot. Never changes the ledger.
    pub fn generate_report(&self, now: DateTime<Utc>) -> ShiftReport {
        let total_sales = self.cash_sales + self.card_sales + self.credit_sales;
        ShiftReport {
            shift_id: self.shift_id.clone(),
            kind: ReportKind::X,
            opened_at: self.opened_at,
            generated_at: now,
            sale_count: self.recorded_sales.len() as u32,
            total_sales,
            cash_sales: self.cash_sales,
            card_sales: self.card_sales,
            credit_sales: total_sales - self.cash_sales - self.card_sales,
            initial_fund: self.initial_fund,
            cash_in: self.cash_in,
            cash_out: self.cash_out,
            expected_cash_in_drawer: self.expected_cash_in_drawer(),
            sold_products: self.sold.clone(),
            cash_counted: None,
            difference: None,
            cash_count: None,
        }
    }

    // -------------------------------------------------------------------------
    // Z-cut
    // -------------------------------------------------------------------------

    /// Starts the Z-cut. Returns the action to submit to the gate.
    pub fn begin_z_cut(&mut self) -> CoreResult<ProtectedAction> {
        self.require(ShiftStatus::Open)?;
        self.status = ShiftStatus::AuthorizingZ;
        Ok(ProtectedAction::ZCut {
            shift_id: self.shift_id.clone(),
        })
    }

    pub fn authorize_z(&mut self, approval: Approval) -> CoreResult<()> {
        self.require(ShiftStatus::AuthorizingZ)?;
        approval.ensure_covers(&ProtectedAction::ZCut {
            shift_id: self.shift_id.clone(),
        })?;
        self.status = ShiftStatus::CountingCash;
        Ok(())
    }

    /// Abandons a Z-cut in progress and reopens the shift.
    pub fn cancel_z_cut(&mut self) -> CoreResult<()> {
        match self.status {
            ShiftStatus::AuthorizingZ | ShiftStatus::CountingCash => {
                self.status = ShiftStatus::Open;
                Ok(())
            }
            ShiftStatus::Closed => Err(CoreError::ShiftAlreadyClosed(self.shift_id.clone())),
            ShiftStatus::Open => Err(CoreError::InvalidShiftState {
                expected: ShiftStatus::AuthorizingZ.as_str().to_string(),
                current: ShiftStatus::Open.as_str().to_string(),
            }),
        }
    }

    /// Closes the shift with the counted cash and returns the Z report.
    ///
    /// Figures come from the ledger itself; `report` identifies the shift
    /// the operator reviewed. No sale or movement can be recorded after
    /// `begin_z_cut`, so the two agree.
    pub fn close_shift(
        &mut self,
        report: &ShiftReport,
        counted: CashCount,
        now: DateTime<Utc>,
    ) -> CoreResult<ShiftReport> {
        self.require(ShiftStatus::CountingCash)?;
        if report.shift_id != self.shift_id {
            return Err(CoreError::ReportMismatch {
                shift_id: self.shift_id.clone(),
                report_shift: report.shift_id.clone(),
            });
        }

        let mut z = self.generate_report(now);
        let cash_counted = counted.total();
        z.kind = ReportKind::Z;
        z.difference = Some(cash_counted - z.expected_cash_in_drawer);
        z.cash_counted = Some(cash_counted);
        z.cash_count = Some(counted);

        self.status = ShiftStatus::Closed;
        self.closed_at = Some(now);
        self.z_report = Some(z.clone());
        Ok(z)
    }

    /// Rejects reprints of tickets that belong to a closed shift.
    pub fn ensure_reprintable(&self, sale: &Sale) -> CoreResult<()> {
        let closed_here = sale.shift_id == self.shift_id && self.status == ShiftStatus::Closed;
        if sale.closure_id.is_some() || closed_here {
            return Err(CoreError::ReprintOfClosedShift {
                sale_id: sale.id.clone(),
                shift_id: sale.shift_id.clone(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
