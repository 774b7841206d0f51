//! Economic Sub-steps
//!
//! Income, meals, luxury shopping, medical bills, the banking window, and
//! interest accrual. Repeated per-tick amounts accumulate in ledger
//! sessions and are flushed as single entries when the activity ends; the
//! paying side and the venue side are kept consistent by flushing both
//! together.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::Rng;

use crate::components::agent::{
    AgentState, Finances, Ledger, LedgerSession, Role, SessionKind, TxKind, Vitals,
};
use crate::components::social::Relationships;
use crate::components::world::{LocationExtra, LocationRegistry, Position};
use crate::events::{EventLog, SimEventKind};

use super::{agent_id, agent_name, say, set_state, BehaviorCtx};

/// Flush the open session if it is of the given kind.
pub(crate) fn flush_session_if(
    world: &mut World,
    locations: &mut LocationRegistry,
    kind: SessionKind,
    tick: u64,
    entity: Entity,
) {
    let matches = world
        .get::<Ledger>(entity)
        .map_or(false, |l| l.session_is(kind));
    if matches {
        flush_open_session(world, locations, tick, entity);
    }
}

/// Flush whatever session is open: one ledger entry on the agent, plus the
/// venue-side finalization (or, for work, the batched loan repayment).
pub(crate) fn flush_open_session(
    world: &mut World,
    locations: &mut LocationRegistry,
    tick: u64,
    entity: Entity,
) {
    let id = agent_id(world, entity);
    let name = agent_name(world, entity);

    let mut ledger = world.get_mut::<Ledger>(entity).expect("agent ledger");
    let Some(session) = ledger.flush_session(tick) else {
        return;
    };

    match session.kind {
        SessionKind::Work => {
            let loan_total = std::mem::take(&mut ledger.session_loan);
            if loan_total > 0.0 {
                ledger.log(loan_total, "Loan repayment (Automatic)", TxKind::Loan, tick);
                drop(ledger);
                if let Some(bank) = locations.get_mut("Bank") {
                    bank.stats
                        .log_transaction(loan_total, format!("Loan repayment from {name}"), tick);
                }
            }
        }
        SessionKind::Meal | SessionKind::Shopping => {
            drop(ledger);
            if let Some(venue) = &session.venue {
                if let Some(location) = locations.get_mut(venue) {
                    location
                        .stats
                        .finalize_session(&id, format!("Sales to {name}"), tick);
                }
            }
        }
        SessionKind::Treatment => {
            drop(ledger);
            if let Some(venue) = &session.venue {
                if let Some(location) = locations.get_mut(venue) {
                    location
                        .stats
                        .finalize_session(&id, format!("Treatment fee from {name}"), tick);
                }
            }
        }
    }
}

/// Make sure a session of the given kind (and venue) is open, flushing any
/// mismatched one first.
fn ensure_session(
    world: &mut World,
    locations: &mut LocationRegistry,
    tick: u64,
    entity: Entity,
    kind: SessionKind,
    tx_kind: TxKind,
    label: String,
    venue: Option<String>,
) {
    let keep = world.get::<Ledger>(entity).map_or(false, |l| {
        l.session
            .as_ref()
            .map_or(false, |s| s.kind == kind && s.venue == venue)
    });
    if keep {
        return;
    }

    let open = world
        .get::<Ledger>(entity)
        .map_or(false, |l| l.session.is_some());
    if open {
        flush_open_session(world, locations, tick, entity);
    }

    world.get_mut::<Ledger>(entity).expect("agent ledger").session =
        Some(LedgerSession::begin(kind, tx_kind, label, venue));
}

fn accumulate(world: &mut World, entity: Entity, delta: f64) {
    if let Some(session) = world
        .get_mut::<Ledger>(entity)
        .expect("agent ledger")
        .session
        .as_mut()
    {
        session.accumulate(delta);
    }
}

/// Step 2: work income with automatic loan repayment.
pub(crate) fn handle_income(
    world: &mut World,
    locations: &mut LocationRegistry,
    ctx: &BehaviorCtx,
    entity: Entity,
) {
    let state = *world.get::<AgentState>(entity).expect("agent state");
    if state != AgentState::Working {
        flush_session_if(world, locations, SessionKind::Work, ctx.tick, entity);
        return;
    }

    let role = *world.get::<Role>(entity).expect("agent role");
    let gross = ctx.config.economy.income_for(role) * ctx.levers.wage;

    let mut finances = world.get_mut::<Finances>(entity).expect("agent finances");
    let repayment = if finances.loan > 0.0 {
        finances
            .loan
            .min(gross * ctx.config.economy.loan_repayment_fraction)
    } else {
        0.0
    };
    finances.loan -= repayment;
    finances.cash += gross - repayment;
    drop(finances);

    if repayment > 0.0 {
        world
            .get_mut::<Ledger>(entity)
            .expect("agent ledger")
            .session_loan += repayment;
        // Repayments hit the bank's books as they happen; the transaction
        // entry is batched until the work session ends.
        if let Some(bank) = locations.get_mut("Bank") {
            bank.stats.revenue += repayment;
        }
    }

    ensure_session(
        world,
        locations,
        ctx.tick,
        entity,
        SessionKind::Work,
        TxKind::Income,
        format!("Work ({})", role.label()),
        None,
    );
    accumulate(world, entity, gross);
}

/// Step 3: eating recovers hunger and a little health, paid per tick.
pub(crate) fn handle_eating(
    world: &mut World,
    locations: &mut LocationRegistry,
    ctx: &BehaviorCtx,
    entity: Entity,
) {
    let state = *world.get::<AgentState>(entity).expect("agent state");
    if state != AgentState::Eating {
        flush_session_if(world, locations, SessionKind::Meal, ctx.tick, entity);
        return;
    }

    {
        let mut vitals = world.get_mut::<Vitals>(entity).expect("agent vitals");
        vitals.hunger = (vitals.hunger - ctx.config.vitals.eating_recovery).max(0.0);
        vitals.health = (vitals.health + ctx.config.vitals.eating_health_bonus).min(100.0);
    }

    let position = world.get::<Position>(entity).expect("agent position").0;
    let venue = locations.name_at(position).map(str::to_string);
    let economy = &ctx.config.economy;
    let cost = match venue.as_deref() {
        Some("Bakery") => economy.bakery_meal_cost,
        Some("My House") => economy.home_meal_cost,
        _ => economy.restaurant_meal_cost,
    } * ctx.levers.price;

    let id = agent_id(world, entity);
    let (paid, remaining) = {
        let mut finances = world.get_mut::<Finances>(entity).expect("agent finances");
        let paid = finances.pay(cost);
        (paid, finances.total_wealth())
    };

    if paid {
        if let Some(name) = &venue {
            if let Some(location) = locations.get_mut(name) {
                location.stats.record_session_payment(&id, cost);
            }
        }
        let label = format!("Food at {}", venue.as_deref().unwrap_or("Local Area"));
        ensure_session(
            world,
            locations,
            ctx.tick,
            entity,
            SessionKind::Meal,
            TxKind::Expense,
            label,
            venue.clone(),
        );
        accumulate(world, entity, -cost);
    }

    if remaining < cost {
        set_state(world, entity, AgentState::Idle);
        match venue.as_deref() {
            Some("Restaurant") | Some("Bakery") => {
                say(world, entity, "Too expensive here! I need something cheaper.", 30);
            }
            _ => say(world, entity, "I'm completely broke and starving!", 50),
        }
    } else if world.get::<Vitals>(entity).expect("agent vitals").hunger <= 0.0 {
        set_state(world, entity, AgentState::Idle);
        say(world, entity, "I'm full!", 50);
    }
}

/// Step 4: luxury shopping converts money into charm.
pub(crate) fn handle_shopping(
    world: &mut World,
    locations: &mut LocationRegistry,
    rng: &mut SmallRng,
    ctx: &BehaviorCtx,
    entity: Entity,
) {
    let state = *world.get::<AgentState>(entity).expect("agent state");
    if state != AgentState::Shopping {
        flush_session_if(world, locations, SessionKind::Shopping, ctx.tick, entity);
        return;
    }

    let economy = &ctx.config.economy;
    let spend = (economy.luxury_spend_rate * ctx.levers.price).max(economy.luxury_spend_min);

    let id = agent_id(world, entity);
    let paid = world
        .get_mut::<Finances>(entity)
        .expect("agent finances")
        .pay(spend);

    if !paid {
        set_state(world, entity, AgentState::Idle);
        say(world, entity, "Too expensive! I'm out of here.", 50);
        return;
    }

    let position = world.get::<Position>(entity).expect("agent position").0;
    let venue = locations
        .name_at(position)
        .map(str::to_string)
        .unwrap_or_else(|| "Mall".to_string());
    if let Some(location) = locations.get_mut(&venue) {
        location.stats.record_session_payment(&id, spend);
    }
    ensure_session(
        world,
        locations,
        ctx.tick,
        entity,
        SessionKind::Shopping,
        TxKind::Expense,
        "Luxury Shopping".to_string(),
        Some(venue),
    );
    accumulate(world, entity, -spend);

    let friends = world
        .get::<Relationships>(entity)
        .expect("agent relationships")
        .close_friend_count();
    let charm = {
        let mut vitals = world.get_mut::<Vitals>(entity).expect("agent vitals");
        vitals.health = (vitals.health + ctx.config.vitals.shopping_health_bonus).min(100.0);
        vitals.increase_charm(spend, friends);
        vitals.charm
    };

    if rng.gen_bool(ctx.config.behavior.shopping_stop_chance) {
        set_state(world, entity, AgentState::Idle);
        say(
            world,
            entity,
            &format!("Great shopping! My charm is now {}!", charm.round() as i64),
            50,
        );
    }
}

/// Step 5: hospital treatment heals over time, billed per tick.
pub(crate) fn handle_medical(
    world: &mut World,
    locations: &mut LocationRegistry,
    ctx: &BehaviorCtx,
    entity: Entity,
) {
    let state = *world.get::<AgentState>(entity).expect("agent state");
    if state != AgentState::Treating {
        flush_session_if(world, locations, SessionKind::Treatment, ctx.tick, entity);
        return;
    }

    {
        let mut vitals = world.get_mut::<Vitals>(entity).expect("agent vitals");
        vitals.health = (vitals.health + ctx.config.vitals.treatment_heal).min(100.0);
    }

    let cost = ctx.config.economy.treatment_cost * ctx.levers.price;
    let id = agent_id(world, entity);
    let (paid, remaining) = {
        let mut finances = world.get_mut::<Finances>(entity).expect("agent finances");
        let paid = finances.pay(cost);
        (paid, finances.total_wealth())
    };

    if paid {
        if let Some(hospital) = locations.get_mut("Hospital") {
            hospital.stats.record_session_payment(&id, cost);
        }
        ensure_session(
            world,
            locations,
            ctx.tick,
            entity,
            SessionKind::Treatment,
            TxKind::Expense,
            "Hospital Treatment".to_string(),
            Some("Hospital".to_string()),
        );
        accumulate(world, entity, -cost);
    }

    if remaining < cost {
        set_state(world, entity, AgentState::Idle);
        say(world, entity, "I can't afford treatment anymore!", 50);
    } else if world.get::<Vitals>(entity).expect("agent vitals").health >= 100.0 {
        set_state(world, entity, AgentState::Idle);
        say(world, entity, "I feel much better now!", 50);
    }
}

/// Step 6: service at the bank window, in priority order: emergency loan,
/// health withdrawal, rare cash top-up, deposit. Always ends in IDLE.
pub(crate) fn handle_banking(
    world: &mut World,
    locations: &mut LocationRegistry,
    events: &mut EventLog,
    rng: &mut SmallRng,
    ctx: &BehaviorCtx,
    entity: Entity,
) {
    let state = *world.get::<AgentState>(entity).expect("agent state");
    if state != AgentState::Banking {
        return;
    }

    let position = world.get::<Position>(entity).expect("agent position").0;
    let at_bank = locations
        .get("Bank")
        .map_or(false, |b| b.contains(position) || b.entry == position);
    if !at_bank {
        // Still on the way; the decision cascade keeps routing us.
        return;
    }

    let economy = &ctx.config.economy;
    let behavior = &ctx.config.behavior;
    let id = agent_id(world, entity);
    let name = agent_name(world, entity);
    let finances = world.get::<Finances>(entity).expect("agent finances").clone();
    let (health, hunger) = {
        let vitals = world.get::<Vitals>(entity).expect("agent vitals");
        (vitals.health, vitals.hunger)
    };

    let wealthy = finances.total_wealth() >= behavior.wealthy_threshold * ctx.levers.price;
    let deposit_threshold = if wealthy {
        economy.deposit_threshold_wealthy
    } else {
        economy.deposit_threshold
    };

    let needs_emergency_loan = (health < behavior.health_seek_threshold
        || hunger > economy.emergency_hunger_threshold)
        && finances.cash < economy.low_cash_threshold
        && finances.bank < economy.low_bank_threshold;

    if needs_emergency_loan {
        let amount = economy.emergency_loan_amount;
        {
            let mut finances = world.get_mut::<Finances>(entity).expect("agent finances");
            finances.loan += amount;
            finances.cash += amount;
        }
        world
            .get_mut::<Ledger>(entity)
            .expect("agent ledger")
            .log(amount, "Emergency Bank Loan", TxKind::Loan, ctx.tick);
        if let Some(bank) = locations.get_mut("Bank") {
            bank.stats
                .log_transaction(amount, format!("Emergency Loan to {name}"), ctx.tick);
            if let Some(LocationExtra::Bank { loans, .. }) = bank.stats.extra.as_mut() {
                *loans += amount;
            }
        }
        let line = if health < behavior.health_seek_threshold {
            "Bank gave me a life-saving loan for health!"
        } else {
            "Bank gave me a loan so I don't starve!"
        };
        say(world, entity, line, 50);
        events.record(ctx.tick, SimEventKind::EmergencyLoan, id, "emergency loan granted");
    } else if health < behavior.health_seek_threshold
        && finances.cash < economy.low_cash_threshold
        && finances.bank >= economy.health_withdrawal_amount
    {
        let amount = economy.health_withdrawal_amount;
        {
            let mut finances = world.get_mut::<Finances>(entity).expect("agent finances");
            finances.bank -= amount;
            finances.cash += amount;
        }
        world
            .get_mut::<Ledger>(entity)
            .expect("agent ledger")
            .log(amount, "Withdraw for bills", TxKind::Bank, ctx.tick);
        if let Some(bank) = locations.get_mut("Bank") {
            bank.stats
                .log_transaction(-amount, format!("Withdrawal (Health) by {name}"), ctx.tick);
            if let Some(LocationExtra::Bank { withdrawals, .. }) = bank.stats.extra.as_mut() {
                *withdrawals += amount;
            }
        }
        say(world, entity, "Withdrew money for medical bills!", 50);
    } else if finances.bank >= economy.regular_withdrawal_amount
        && finances.cash < economy.pocket_cash_floor
        && rng.gen_bool(economy.regular_withdrawal_chance)
    {
        let amount = economy.regular_withdrawal_amount;
        {
            let mut finances = world.get_mut::<Finances>(entity).expect("agent finances");
            finances.bank -= amount;
            finances.cash += amount;
        }
        world
            .get_mut::<Ledger>(entity)
            .expect("agent ledger")
            .log(amount, "Bank Withdrawal", TxKind::Bank, ctx.tick);
        if let Some(bank) = locations.get_mut("Bank") {
            bank.stats
                .log_transaction(-amount, format!("Regular Withdrawal by {name}"), ctx.tick);
            if let Some(LocationExtra::Bank { withdrawals, .. }) = bank.stats.extra.as_mut() {
                *withdrawals += amount;
            }
        }
        say(world, entity, "Withdrew some cash for future needs.", 50);
    } else if finances.cash >= deposit_threshold {
        let amount = finances.cash;
        {
            let mut finances = world.get_mut::<Finances>(entity).expect("agent finances");
            finances.cash = 0.0;
            finances.bank += amount;
        }
        world
            .get_mut::<Ledger>(entity)
            .expect("agent ledger")
            .log(-amount, "Deposit to Bank", TxKind::Bank, ctx.tick);
        if let Some(bank) = locations.get_mut("Bank") {
            bank.stats
                .log_transaction(amount, format!("Deposit from {name}"), ctx.tick);
            if let Some(LocationExtra::Bank { deposits, .. }) = bank.stats.extra.as_mut() {
                *deposits += amount;
            }
        }
        say(world, entity, "Money safely deposited!", 50);
    }

    set_state(world, entity, AgentState::Idle);
}

/// Step 9: hourly interest on deposits and loans, skipped below the posting
/// minimum.
pub(crate) fn handle_interest(
    world: &mut World,
    locations: &mut LocationRegistry,
    ctx: &BehaviorCtx,
    entity: Entity,
) {
    let economy = &ctx.config.economy;
    if ctx.tick % economy.interest_interval != 0 {
        return;
    }

    let name = agent_name(world, entity);
    let finances = world.get::<Finances>(entity).expect("agent finances").clone();

    if finances.bank > 0.0 {
        let interest = finances.bank * economy.deposit_interest_rate;
        if interest >= economy.interest_minimum {
            world
                .get_mut::<Finances>(entity)
                .expect("agent finances")
                .bank += interest;
            world
                .get_mut::<Ledger>(entity)
                .expect("agent ledger")
                .log(interest, "Bank Interest Earned", TxKind::Bank, ctx.tick);
            if let Some(bank) = locations.get_mut("Bank") {
                bank.stats
                    .log_transaction(-interest, format!("Interest Paid to {name}"), ctx.tick);
            }
        }
    }

    if finances.loan > 0.0 {
        let interest = finances.loan * economy.loan_interest_rate;
        if interest >= economy.interest_minimum {
            world
                .get_mut::<Finances>(entity)
                .expect("agent finances")
                .loan += interest;
            world
                .get_mut::<Ledger>(entity)
                .expect("agent ledger")
                .log(-interest, "Loan Interest Accrued", TxKind::Loan, ctx.tick);
            if let Some(bank) = locations.get_mut("Bank") {
                bank.stats
                    .log_transaction(interest, format!("Loan Interest from {name}"), ctx.tick);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{behavior_world, spawn_agent};
    use super::super::run_behavior;
    use super::*;
    use crate::components::world::{Coordinate, WorldClock};

    #[test]
    fn test_loan_repayment_diverts_twenty_percent() {
        let mut world = behavior_world();
        // Inside the library so the schedule keeps them working.
        let agent = spawn_agent(&mut world, "bob", Role::Librarian, Coordinate::new(22, 4));
        *world.get_mut::<AgentState>(agent).unwrap() = AgentState::Working;
        world.get_mut::<Finances>(agent).unwrap().loan = 100.0;

        run_behavior(&mut world);

        let finances = world.get::<Finances>(agent).unwrap();
        // Gross 0.2: repayment = 0.04, cash credit = 0.16.
        assert!((finances.loan - 99.96).abs() < 1e-9);
        assert!((finances.cash - 0.16).abs() < 1e-9);
        let ledger = world.get::<Ledger>(agent).unwrap();
        assert!((ledger.session_loan - 0.04).abs() < 1e-9);
        assert!(ledger.session_is(SessionKind::Work));
    }

    #[test]
    fn test_eating_pays_venue_and_agent_consistently() {
        let mut world = behavior_world();
        // Standing inside the restaurant footprint.
        let agent = spawn_agent(&mut world, "alice", Role::Baker, Coordinate::new(10, 4));
        *world.get_mut::<AgentState>(agent).unwrap() = AgentState::Eating;
        {
            let mut finances = world.get_mut::<Finances>(agent).unwrap();
            finances.cash = 10.0;
        }
        world.get_mut::<Vitals>(agent).unwrap().hunger = 50.0;

        run_behavior(&mut world);

        let finances = world.get::<Finances>(agent).unwrap();
        assert!((finances.cash - 9.95).abs() < 1e-9);

        let locations = world.resource::<LocationRegistry>();
        let restaurant = locations.get("Restaurant").unwrap();
        assert!((restaurant.stats.revenue - 0.05).abs() < 1e-9);
        assert!((restaurant.stats.session_revenue["alice"] - 0.05).abs() < 1e-9);

        let vitals = world.get::<Vitals>(agent).unwrap();
        assert!((vitals.hunger - 44.0).abs() < 1e-9);
    }

    #[test]
    fn test_meal_session_flushes_one_entry_on_exit() {
        let mut world = behavior_world();
        let agent = spawn_agent(&mut world, "alice", Role::Baker, Coordinate::new(10, 4));
        *world.get_mut::<AgentState>(agent).unwrap() = AgentState::Eating;
        world.get_mut::<Finances>(agent).unwrap().cash = 10.0;
        world.get_mut::<Vitals>(agent).unwrap().hunger = 100.0;

        // Three paid ticks, then leave the table.
        for _ in 0..3 {
            let tick = world.resource::<WorldClock>().tick;
            let config = world.resource::<crate::config::SimConfig>().clone();
            let levers = *world.resource::<crate::components::world::EconomicLevers>();
            let map = world.resource::<crate::components::world::TownMap>().clone();
            world.resource_scope(|world, mut locations: Mut<LocationRegistry>| {
                let ctx = BehaviorCtx {
                    config: &config,
                    levers,
                    map: &map,
                    tick,
                };
                handle_eating(world, &mut locations, &ctx, agent);
            });
        }
        *world.get_mut::<AgentState>(agent).unwrap() = AgentState::Idle;
        {
            let config = world.resource::<crate::config::SimConfig>().clone();
            let levers = *world.resource::<crate::components::world::EconomicLevers>();
            let map = world.resource::<crate::components::world::TownMap>().clone();
            world.resource_scope(|world, mut locations: Mut<LocationRegistry>| {
                let ctx = BehaviorCtx {
                    config: &config,
                    levers,
                    map: &map,
                    tick: 600,
                };
                handle_eating(world, &mut locations, &ctx, agent);
            });
        }

        let ledger = world.get::<Ledger>(agent).unwrap();
        assert!(ledger.session.is_none());
        assert_eq!(ledger.entries.len(), 1);
        assert!((ledger.entries[0].amount + 0.15).abs() < 1e-9);
        assert_eq!(ledger.entries[0].kind, TxKind::Expense);

        let locations = world.resource::<LocationRegistry>();
        let restaurant = locations.get("Restaurant").unwrap();
        assert!(restaurant.stats.session_revenue.is_empty());
        assert!((restaurant.stats.transactions[0].amount - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_broke_eater_bounces_to_idle() {
        let mut world = behavior_world();
        let agent = spawn_agent(&mut world, "poor", Role::Gardener, Coordinate::new(10, 4));
        *world.get_mut::<AgentState>(agent).unwrap() = AgentState::Eating;
        // Nothing in cash or bank.

        let config = world.resource::<crate::config::SimConfig>().clone();
        let levers = *world.resource::<crate::components::world::EconomicLevers>();
        let map = world.resource::<crate::components::world::TownMap>().clone();
        world.resource_scope(|world, mut locations: Mut<LocationRegistry>| {
            let ctx = BehaviorCtx {
                config: &config,
                levers,
                map: &map,
                tick: 500,
            };
            handle_eating(world, &mut locations, &ctx, agent);
        });

        assert_eq!(*world.get::<AgentState>(agent).unwrap(), AgentState::Idle);
        let speech = world.get::<crate::components::social::Speech>(agent).unwrap();
        assert!(speech.text.as_ref().unwrap().contains("expensive"));
    }

    #[test]
    fn test_emergency_loan_at_the_window() {
        let mut world = behavior_world();
        // Standing inside the bank.
        let agent = spawn_agent(&mut world, "needy", Role::Gardener, Coordinate::new(28, 4));
        *world.get_mut::<AgentState>(agent).unwrap() = AgentState::Banking;
        world.get_mut::<Vitals>(agent).unwrap().hunger = 90.0;

        run_behavior(&mut world);

        let finances = world.get::<Finances>(agent).unwrap();
        assert_eq!(finances.cash, 50.0);
        assert_eq!(finances.loan, 50.0);
        // Still starving, so the cascade sends them straight off to eat.
        assert_eq!(*world.get::<AgentState>(agent).unwrap(), AgentState::Moving);

        let locations = world.resource::<LocationRegistry>();
        let bank = locations.get("Bank").unwrap();
        match bank.stats.extra {
            Some(LocationExtra::Bank { loans, .. }) => assert_eq!(loans, 50.0),
            _ => panic!("bank extras missing"),
        }
    }

    #[test]
    fn test_deposit_at_the_window() {
        let mut world = behavior_world();
        let agent = spawn_agent(&mut world, "saver", Role::Mayor, Coordinate::new(28, 4));
        *world.get_mut::<AgentState>(agent).unwrap() = AgentState::Banking;
        world.get_mut::<Finances>(agent).unwrap().cash = 120.0;

        run_behavior(&mut world);

        let finances = world.get::<Finances>(agent).unwrap();
        assert_eq!(finances.cash, 0.0);
        assert_eq!(finances.bank, 120.0);

        let locations = world.resource::<LocationRegistry>();
        let bank = locations.get("Bank").unwrap();
        match bank.stats.extra {
            Some(LocationExtra::Bank { deposits, .. }) => assert_eq!(deposits, 120.0),
            _ => panic!("bank extras missing"),
        }
    }

    #[test]
    fn test_interest_skipped_below_minimum() {
        let mut world = behavior_world();
        let agent = spawn_agent(&mut world, "tiny", Role::Baker, Coordinate::new(16, 10));
        world.get_mut::<Finances>(agent).unwrap().bank = 50.0;

        let config = world.resource::<crate::config::SimConfig>().clone();
        let levers = *world.resource::<crate::components::world::EconomicLevers>();
        let map = world.resource::<crate::components::world::TownMap>().clone();
        world.resource_scope(|world, mut locations: Mut<LocationRegistry>| {
            let ctx = BehaviorCtx {
                config: &config,
                levers,
                map: &map,
                tick: 540, // on the hour
            };
            handle_interest(world, &mut locations, &ctx, agent);
        });

        // 50 * 0.0001 = 0.005 < 0.01 minimum: nothing posted.
        let finances = world.get::<Finances>(agent).unwrap();
        assert_eq!(finances.bank, 50.0);
        assert!(world.get::<Ledger>(agent).unwrap().entries.is_empty());
    }

    #[test]
    fn test_interest_posts_above_minimum() {
        let mut world = behavior_world();
        let agent = spawn_agent(&mut world, "rich", Role::Mayor, Coordinate::new(16, 10));
        world.get_mut::<Finances>(agent).unwrap().bank = 200.0;
        world.get_mut::<Finances>(agent).unwrap().loan = 100.0;

        let config = world.resource::<crate::config::SimConfig>().clone();
        let levers = *world.resource::<crate::components::world::EconomicLevers>();
        let map = world.resource::<crate::components::world::TownMap>().clone();
        world.resource_scope(|world, mut locations: Mut<LocationRegistry>| {
            let ctx = BehaviorCtx {
                config: &config,
                levers,
                map: &map,
                tick: 540,
            };
            handle_interest(world, &mut locations, &ctx, agent);
        });

        let finances = world.get::<Finances>(agent).unwrap();
        assert!((finances.bank - 200.02).abs() < 1e-9);
        assert!((finances.loan - 100.05).abs() < 1e-9);
        let ledger = world.get::<Ledger>(agent).unwrap();
        assert_eq!(ledger.entries.len(), 2);
    }
}
