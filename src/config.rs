//! Configuration System
//!
//! Loads tuning parameters from tuning.toml for easy adjustment without
//! recompiling. Every threshold the behavior engine, movement resolver, and
//! social trigger consult lives here as a named field, so tests can override
//! them deterministically.

use bevy_ecs::prelude::Resource;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::components::agent::Role;

/// Default tuning file path
pub const DEFAULT_TUNING_PATH: &str = "tuning.toml";

/// Top-level configuration structure
#[derive(Resource, Debug, Clone, Deserialize)]
pub struct SimConfig {
    pub clock: ClockConfig,
    pub vitals: VitalsConfig,
    pub economy: EconomyConfig,
    pub hazards: HazardConfig,
    pub behavior: BehaviorConfig,
    pub movement: MovementConfig,
    pub social: SocialConfig,
}

/// Clock and banking-hours parameters
#[derive(Debug, Clone, Deserialize)]
pub struct ClockConfig {
    /// Tick the simulation starts at (480 = 08:00 of day 1).
    pub start_tick: u64,
    pub bank_open_hour: u64,
    pub bank_close_hour: u64,
}

impl ClockConfig {
    pub fn is_bank_open(&self, hour: u64) -> bool {
        hour >= self.bank_open_hour && hour < self.bank_close_hour
    }
}

/// Vital-stat rates, all per tick
#[derive(Debug, Clone, Deserialize)]
pub struct VitalsConfig {
    pub hunger_growth: f64,
    pub eating_recovery: f64,
    pub eating_health_bonus: f64,
    pub treatment_heal: f64,
    pub shopping_health_bonus: f64,
    pub passive_health_decay: f64,
    pub starvation_health_decay: f64,
}

/// Prices, wages, and banking amounts. Prices scale with the price lever,
/// incomes with the wage lever.
#[derive(Debug, Clone, Deserialize)]
pub struct EconomyConfig {
    pub restaurant_meal_cost: f64,
    pub bakery_meal_cost: f64,
    pub home_meal_cost: f64,
    pub treatment_cost: f64,
    /// Per-tick luxury spend at the mall: max(luxury_spend_min, rate * price).
    pub luxury_spend_min: f64,
    pub luxury_spend_rate: f64,
    pub income_mayor: f64,
    pub income_doctor: f64,
    pub income_police: f64,
    pub income_librarian: f64,
    pub income_baker: f64,
    pub income_gardener: f64,
    pub income_default: f64,
    /// Fraction of gross income diverted to loan repayment.
    pub loan_repayment_fraction: f64,
    pub emergency_loan_amount: f64,
    /// No further loans are plausible past this outstanding balance.
    pub loan_ceiling: f64,
    /// Cash below this counts as critically low at the bank window.
    pub low_cash_threshold: f64,
    /// Bank balance below this counts as critically low at the bank window.
    pub low_bank_threshold: f64,
    /// Hunger above this qualifies for an emergency loan.
    pub emergency_hunger_threshold: f64,
    /// Cash below this makes a rare top-up withdrawal plausible.
    pub pocket_cash_floor: f64,
    pub health_withdrawal_amount: f64,
    pub regular_withdrawal_amount: f64,
    pub regular_withdrawal_chance: f64,
    pub deposit_threshold: f64,
    pub deposit_threshold_wealthy: f64,
    pub deposit_trip_chance: f64,
    pub deposit_trip_chance_wealthy: f64,
    /// A deposit trip only happens while comfortably fed and healthy.
    pub deposit_trip_hunger_limit: f64,
    pub deposit_trip_health_floor: f64,
    /// Interest applied once every `interest_interval` ticks.
    pub interest_interval: u64,
    pub deposit_interest_rate: f64,
    pub loan_interest_rate: f64,
    /// Interest below this amount is not posted.
    pub interest_minimum: f64,
}

impl EconomyConfig {
    pub fn income_for(&self, role: Role) -> f64 {
        match role {
            Role::Mayor => self.income_mayor,
            Role::Doctor => self.income_doctor,
            Role::Police => self.income_police,
            Role::Librarian => self.income_librarian,
            Role::Baker => self.income_baker,
            Role::Gardener => self.income_gardener,
            Role::Resident => self.income_default,
        }
    }
}

/// Per-tick hazard probabilities, scaled by the risk lever
#[derive(Debug, Clone, Deserialize)]
pub struct HazardConfig {
    pub sickness_chance: f64,
    pub sickness_health: f64,
    pub cardiac_chance: f64,
    pub cardiac_health: f64,
    /// Only rolled while the agent is outdoors.
    pub accident_chance: f64,
    /// Per-tick chance of death at zero health.
    pub death_chance: f64,
}

/// Decision-cascade thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct BehaviorConfig {
    pub crime_chance: f64,
    pub release_chance: f64,
    /// Hunger panic threshold for agents who can afford a meal outright.
    pub starvation_threshold_wealthy: f64,
    /// Poorer agents tolerate more hunger before acting.
    pub starvation_threshold_poor: f64,
    pub health_seek_threshold: f64,
    /// Total wealth (times the price lever) above which an agent counts as
    /// wealthy.
    pub wealthy_threshold: f64,
    pub basic_needs_hunger: f64,
    pub basic_needs_health: f64,
    pub shopping_trip_chance: f64,
    pub shopping_stop_chance: f64,
    /// Hunger that justifies interrupting an in-progress walk.
    pub moving_interrupt_hunger_wealthy: f64,
    pub moving_interrupt_hunger_poor: f64,
    pub wander_chance: f64,
    pub lunch_stagger_step: usize,
    pub lunch_stagger_window: usize,
    /// Chance a wealthy agent picks the mall over the leisure rotation.
    pub mall_preference: f64,
    pub charm_goal: f64,
    /// Attempts at sampling a free interior tile before falling back to the
    /// index-derived offset.
    pub interior_placement_attempts: u32,
}

/// Movement-resolver escalation bounds, in ticks
#[derive(Debug, Clone, Deserialize)]
pub struct MovementConfig {
    pub blocked_replan_after: u32,
    pub blocked_sidestep_after: u32,
    pub blocked_give_up_after: u32,
    pub conflict_wait_ticks: u32,
    pub conflict_sidestep_after: u32,
    pub conflict_give_up_after: u32,
    pub position_history: usize,
    pub cycle_min_history: usize,
    pub cycle_replan_chance: f64,
}

/// Conversation trigger and relationship parameters
#[derive(Debug, Clone, Deserialize)]
pub struct SocialConfig {
    pub trigger_distance: i32,
    pub trigger_chance: f64,
    pub speech_ttl: u32,
    pub pending_ttl: u32,
    pub intimacy_positive: f64,
    pub intimacy_negative: f64,
    pub intimacy_neutral: f64,
    pub intimacy_noise: f64,
    /// Model identifier forwarded to the external generator.
    pub model: String,
}

impl SimConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from the default path, or use defaults if not found
    pub fn load_or_default() -> Self {
        Self::load(DEFAULT_TUNING_PATH).unwrap_or_else(|e| {
            tracing::warn!("could not load {}: {}. Using defaults.", DEFAULT_TUNING_PATH, e);
            Self::default()
        })
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            clock: ClockConfig {
                start_tick: 480,
                bank_open_hour: 9,
                bank_close_hour: 18,
            },
            vitals: VitalsConfig {
                hunger_growth: 0.02,
                eating_recovery: 6.0,
                eating_health_bonus: 0.2,
                treatment_heal: 1.0,
                shopping_health_bonus: 0.5,
                passive_health_decay: 0.02,
                starvation_health_decay: 0.1,
            },
            economy: EconomyConfig {
                restaurant_meal_cost: 0.05,
                bakery_meal_cost: 0.03,
                home_meal_cost: 0.01,
                treatment_cost: 0.2,
                luxury_spend_min: 5.0,
                luxury_spend_rate: 0.5,
                income_mayor: 0.5,
                income_doctor: 0.4,
                income_police: 0.3,
                income_librarian: 0.2,
                income_baker: 0.2,
                income_gardener: 0.1,
                income_default: 0.1,
                loan_repayment_fraction: 0.2,
                emergency_loan_amount: 50.0,
                loan_ceiling: 200.0,
                low_cash_threshold: 10.0,
                low_bank_threshold: 20.0,
                emergency_hunger_threshold: 80.0,
                pocket_cash_floor: 5.0,
                health_withdrawal_amount: 20.0,
                regular_withdrawal_amount: 50.0,
                regular_withdrawal_chance: 0.05,
                deposit_threshold: 100.0,
                deposit_threshold_wealthy: 50.0,
                deposit_trip_chance: 0.001,
                deposit_trip_chance_wealthy: 0.05,
                deposit_trip_hunger_limit: 20.0,
                deposit_trip_health_floor: 90.0,
                interest_interval: 60,
                deposit_interest_rate: 0.0001,
                loan_interest_rate: 0.0005,
                interest_minimum: 0.01,
            },
            hazards: HazardConfig {
                sickness_chance: 0.00002,
                sickness_health: 30.0,
                cardiac_chance: 0.000005,
                cardiac_health: 5.0,
                accident_chance: 0.000002,
                death_chance: 0.001,
            },
            behavior: BehaviorConfig {
                crime_chance: 0.001,
                release_chance: 0.005,
                starvation_threshold_wealthy: 20.0,
                starvation_threshold_poor: 70.0,
                health_seek_threshold: 70.0,
                wealthy_threshold: 100.0,
                basic_needs_hunger: 30.0,
                basic_needs_health: 80.0,
                shopping_trip_chance: 0.1,
                shopping_stop_chance: 0.05,
                moving_interrupt_hunger_wealthy: 30.0,
                moving_interrupt_hunger_poor: 80.0,
                wander_chance: 0.02,
                lunch_stagger_step: 3,
                lunch_stagger_window: 15,
                mall_preference: 0.7,
                charm_goal: 100.0,
                interior_placement_attempts: 10,
            },
            movement: MovementConfig {
                blocked_replan_after: 10,
                blocked_sidestep_after: 15,
                blocked_give_up_after: 30,
                conflict_wait_ticks: 3,
                conflict_sidestep_after: 5,
                conflict_give_up_after: 20,
                position_history: 10,
                cycle_min_history: 5,
                cycle_replan_chance: 0.7,
            },
            social: SocialConfig {
                trigger_distance: 2,
                trigger_chance: 0.02,
                speech_ttl: 80,
                pending_ttl: 100,
                intimacy_positive: 6.0,
                intimacy_negative: -4.0,
                intimacy_neutral: 1.0,
                intimacy_noise: 1.0,
                model: "qwen3:4b".to_string(),
            },
        }
    }
}

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {message}")]
    Io { path: String, message: String },
    #[error("could not parse tuning file: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.clock.start_tick, 480);
        assert!(config.economy.income_for(Role::Mayor) > config.economy.income_for(Role::Gardener));
        assert_eq!(config.economy.income_for(Role::Resident), 0.1);
        assert!(config.hazards.sickness_chance > config.hazards.accident_chance);
    }

    #[test]
    fn test_bank_hours() {
        let config = SimConfig::default();
        assert!(!config.clock.is_bank_open(8));
        assert!(config.clock.is_bank_open(9));
        assert!(config.clock.is_bank_open(17));
        assert!(!config.clock.is_bank_open(18));
    }

    #[test]
    fn test_load_config_file() {
        // This test requires the tuning.toml file to exist
        if Path::new(DEFAULT_TUNING_PATH).exists() {
            let config = SimConfig::load(DEFAULT_TUNING_PATH).unwrap();
            assert!(config.economy.emergency_loan_amount > 0.0);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = toml::from_str::<SimConfig>("clock = 3").unwrap_err();
        let _ = err.to_string();
    }
}
