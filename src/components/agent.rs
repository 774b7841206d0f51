//! Agent Components
//!
//! Components for individual residents: identity, activity state, vitals,
//! movement bookkeeping, and the financial ledger.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::world::{Coordinate, Position};
use super::social::{Relationships, Speech};

/// Marker component identifying an entity as an agent.
#[derive(Component, Debug, Clone, Default)]
pub struct Agent;

/// Unique, stable identifier for an agent.
#[derive(Component, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

/// Human-readable name.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct AgentName(pub String);

/// One-line description used as dialogue context.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct Persona(pub String);

/// An agent's profession. Determines income and the default work site.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Mayor,
    Doctor,
    Police,
    Librarian,
    Baker,
    Gardener,
    /// Any other profession; paid the base wage, works at the library.
    Resident,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Mayor => "Mayor",
            Role::Doctor => "Doctor",
            Role::Police => "Police",
            Role::Librarian => "Librarian",
            Role::Baker => "Baker",
            Role::Gardener => "Gardener",
            Role::Resident => "Resident",
        }
    }
}

/// What an agent is doing this tick. Drives which per-tick logic applies.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    Idle,
    Moving,
    Working,
    Talking,
    Sleeping,
    Criminal,
    Arrested,
    Eating,
    Banking,
    Treating,
    Shopping,
    Dead,
}

impl AgentState {
    pub fn is_dead(&self) -> bool {
        matches!(self, AgentState::Dead)
    }
}

/// Hunger, health, and charm, each in [0, 100].
///
/// Hunger 100 is starvation; health 0 is critical; charm 100 ends the
/// simulation with a winner.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct Vitals {
    pub hunger: f64,
    pub health: f64,
    pub charm: f64,
}

impl Default for Vitals {
    fn default() -> Self {
        Self {
            hunger: 0.0,
            health: 100.0,
            charm: 0.0,
        }
    }
}

impl Vitals {
    /// Charm gained from a luxury purchase: 1 point per 5 spent (clamped to
    /// 1..=10) plus one point per close friend (capped at 5). Charm never
    /// exceeds 100.
    pub fn increase_charm(&mut self, amount_spent: f64, close_friends: usize) {
        let base = ((amount_spent / 5.0).floor() as i64).clamp(1, 10) as f64;
        let bonus = close_friends.min(5) as f64;
        self.charm = (self.charm + base + bonus).min(100.0);
    }
}

/// Cash on hand, bank balance, and outstanding loan. All non-negative.
#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Finances {
    pub cash: f64,
    pub bank: f64,
    pub loan: f64,
}

impl Finances {
    pub fn total_wealth(&self) -> f64 {
        self.cash + self.bank
    }

    /// Pay `cost` from cash first, drawing any remainder from the bank
    /// balance. Returns false (and changes nothing) if the total cannot
    /// cover it; neither balance ever goes negative.
    pub fn pay(&mut self, cost: f64) -> bool {
        if self.cash >= cost {
            self.cash -= cost;
            true
        } else if self.total_wealth() >= cost {
            let remainder = cost - self.cash;
            self.cash = 0.0;
            self.bank -= remainder;
            true
        } else {
            false
        }
    }
}

/// Kind of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    Income,
    Expense,
    Bank,
    Loan,
}

/// One entry in an agent's financial history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub amount: f64,
    pub description: String,
    pub kind: TxKind,
    pub tick: u64,
}

/// Which economic activity an open session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionKind {
    Work,
    Meal,
    Shopping,
    Treatment,
}

/// An open ledger session: repeated per-tick amounts batched into a single
/// transaction when the activity ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSession {
    pub kind: SessionKind,
    pub tx_kind: TxKind,
    pub label: String,
    /// Venue whose session revenue should be finalized alongside this.
    pub venue: Option<String>,
    pub amount: f64,
}

impl LedgerSession {
    pub fn begin(
        kind: SessionKind,
        tx_kind: TxKind,
        label: impl Into<String>,
        venue: Option<String>,
    ) -> Self {
        Self {
            kind,
            tx_kind,
            label: label.into(),
            venue,
            amount: 0.0,
        }
    }

    pub fn accumulate(&mut self, delta: f64) {
        self.amount += delta;
    }
}

/// How many transactions an agent keeps. Oldest entries are evicted.
pub const AGENT_TRANSACTION_CAP: usize = 100;

/// An agent's financial history plus any in-progress session accumulators.
#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    /// Most-recent-first, capped at [`AGENT_TRANSACTION_CAP`].
    pub entries: VecDeque<Transaction>,
    pub session: Option<LedgerSession>,
    /// Loan repayments made during the current work session.
    pub session_loan: f64,
}

impl Ledger {
    pub fn log(&mut self, amount: f64, description: impl Into<String>, kind: TxKind, tick: u64) {
        self.entries.push_front(Transaction {
            amount,
            description: description.into(),
            kind,
            tick,
        });
        self.entries.truncate(AGENT_TRANSACTION_CAP);
    }

    /// True if the open session (if any) is of the given kind.
    pub fn session_is(&self, kind: SessionKind) -> bool {
        self.session.as_ref().map_or(false, |s| s.kind == kind)
    }

    /// Close the open session and post it as one ledger entry. Returns the
    /// flushed session for venue-side bookkeeping.
    pub fn flush_session(&mut self, tick: u64) -> Option<LedgerSession> {
        let session = self.session.take()?;
        self.log(session.amount, session.label.clone(), session.tx_kind, tick);
        Some(session)
    }
}

/// Per-agent movement bookkeeping used by the collision resolver.
#[derive(Component, Debug, Clone, Default)]
pub struct Movement {
    pub target: Option<Coordinate>,
    /// Remaining steps to traverse, front first.
    pub path: VecDeque<Coordinate>,
    /// Consecutive ticks the next step has been occupied.
    pub blocked_ticks: u32,
    /// Consecutive ticks spent yielding in a symmetric conflict.
    pub wait_ticks: u32,
    /// Recently visited cells, for movement-cycle detection.
    pub recent: VecDeque<Coordinate>,
}

impl Movement {
    /// Remember the current cell for cycle detection, bounded history.
    pub fn record_position(&mut self, position: Coordinate, cap: usize) {
        self.recent.push_back(position);
        while self.recent.len() > cap {
            self.recent.pop_front();
        }
    }

    /// The current position reappearing in history (excluding the two most
    /// recent entries) indicates the agent is walking in circles.
    pub fn in_cycle(&self, position: Coordinate, min_history: usize) -> bool {
        if self.recent.len() < min_history {
            return false;
        }
        self.recent
            .iter()
            .take(self.recent.len().saturating_sub(2))
            .any(|&c| c == position)
    }

    pub fn clear(&mut self) {
        self.target = None;
        self.path.clear();
    }
}

/// Free-form scratch memory.
#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMemory {
    /// Name of the location the agent was last seen inside, for
    /// visit counting.
    pub last_location: Option<String>,
    /// Last diagnosed illness, for death-cause attribution.
    pub last_diagnosis: Option<String>,
}

/// Lifetime bookkeeping. `death_cause` and `death_tick` are set once, on the
/// transition to DEAD, and never change afterwards.
#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lifespan {
    pub living_ticks: u64,
    pub death_cause: Option<String>,
    pub death_tick: Option<u64>,
}

/// Everything a freshly spawned resident carries.
#[derive(Bundle)]
pub struct AgentBundle {
    pub marker: Agent,
    pub id: AgentId,
    pub name: AgentName,
    pub persona: Persona,
    pub role: Role,
    pub position: Position,
    pub state: AgentState,
    pub vitals: Vitals,
    pub finances: Finances,
    pub ledger: Ledger,
    pub movement: Movement,
    pub memory: AgentMemory,
    pub lifespan: Lifespan,
    pub relationships: Relationships,
    pub speech: Speech,
}

impl AgentBundle {
    /// A resident with zero finances and full health.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        role: Role,
        start: Coordinate,
        persona: impl Into<String>,
    ) -> Self {
        Self {
            marker: Agent,
            id: AgentId(id.into()),
            name: AgentName(name.into()),
            persona: Persona(persona.into()),
            role,
            position: Position(start),
            state: AgentState::Idle,
            vitals: Vitals::default(),
            finances: Finances::default(),
            ledger: Ledger::default(),
            movement: Movement::default(),
            memory: AgentMemory::default(),
            lifespan: Lifespan::default(),
            relationships: Relationships::default(),
            speech: Speech::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pay_from_cash() {
        let mut f = Finances {
            cash: 10.0,
            bank: 5.0,
            loan: 0.0,
        };
        assert!(f.pay(3.0));
        assert!((f.cash - 7.0).abs() < 1e-12);
        assert!((f.bank - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_pay_splits_into_bank() {
        let mut f = Finances {
            cash: 2.0,
            bank: 5.0,
            loan: 0.0,
        };
        assert!(f.pay(4.0));
        assert_eq!(f.cash, 0.0);
        assert!((f.bank - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_pay_refuses_when_broke() {
        let mut f = Finances {
            cash: 1.0,
            bank: 1.0,
            loan: 0.0,
        };
        assert!(!f.pay(3.0));
        assert!((f.cash - 1.0).abs() < 1e-12);
        assert!((f.bank - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_charm_never_exceeds_cap() {
        let mut v = Vitals {
            charm: 95.0,
            ..Vitals::default()
        };
        v.increase_charm(10_000.0, 50);
        assert_eq!(v.charm, 100.0);
    }

    #[test]
    fn test_charm_gain_breakdown() {
        let mut v = Vitals::default();
        // 12 spent -> base 2; 3 close friends -> +3.
        v.increase_charm(12.0, 3);
        assert_eq!(v.charm, 5.0);

        // Tiny purchase still grants the minimum base of 1.
        let mut w = Vitals::default();
        w.increase_charm(0.5, 0);
        assert_eq!(w.charm, 1.0);
    }

    #[test]
    fn test_ledger_cap_and_order() {
        let mut ledger = Ledger::default();
        for i in 0..120 {
            ledger.log(i as f64, format!("entry {i}"), TxKind::Income, i);
        }
        assert_eq!(ledger.entries.len(), AGENT_TRANSACTION_CAP);
        assert_eq!(ledger.entries[0].tick, 119);
    }

    #[test]
    fn test_session_flush() {
        let mut ledger = Ledger::default();
        ledger.session = Some(LedgerSession::begin(
            SessionKind::Meal,
            TxKind::Expense,
            "Food at Bakery",
            Some("Bakery".to_string()),
        ));
        ledger.session.as_mut().unwrap().accumulate(-0.03);
        ledger.session.as_mut().unwrap().accumulate(-0.03);

        let flushed = ledger.flush_session(500).unwrap();
        assert_eq!(flushed.venue.as_deref(), Some("Bakery"));
        assert!(ledger.session.is_none());
        assert_eq!(ledger.entries.len(), 1);
        assert!((ledger.entries[0].amount + 0.06).abs() < 1e-12);
        assert_eq!(ledger.entries[0].kind, TxKind::Expense);
    }

    #[test]
    fn test_movement_cycle_detection() {
        let mut m = Movement::default();
        let a = Coordinate::new(1, 1);
        let b = Coordinate::new(2, 1);
        for _ in 0..3 {
            m.record_position(a, 10);
            m.record_position(b, 10);
        }
        assert!(m.in_cycle(a, 5));

        let mut fresh = Movement::default();
        fresh.record_position(a, 10);
        assert!(!fresh.in_cycle(a, 5));
    }
}
