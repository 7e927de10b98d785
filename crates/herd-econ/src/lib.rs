#![deny(warnings)]

//! Economic models for the herd projection.
//!
//! This crate provides validated, configurable building blocks for:
//! - The staggered 12-month revenue cycle, gated by a landing offset
//! - Welfare-fund (CPF) accrual with founder and offspring exemptions
//! - Age-bracket asset valuation over interchangeable price tables
//! - Named per-report configurations combining the above

use herd_core::{absolute_month, age_in_months, Animal, FounderRole, SimWindow, YearMonth};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Length of one revenue cycle.
pub const CYCLE_MONTHS: u32 = 12;

/// Errors produced by economic configuration.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Cycle phases must add up to exactly one year.
    #[error("revenue cycle phases must cover 12 months, got {0}")]
    CycleLength(u32),
    /// Prices and costs must be non-negative.
    #[error("negative monetary value is invalid: {0}")]
    NegativeMoney(&'static str),
    /// A valuation table needs at least one bracket.
    #[error("valuation table `{0}` has no brackets")]
    EmptyTable(String),
    /// The first bracket must start at age zero.
    #[error("valuation table `{0}`: first bracket must start at 0 months")]
    TableStart(String),
    /// Brackets must follow each other without gaps or overlaps.
    #[error("valuation table `{table}`: bracket `{label}` leaves a gap or overlap")]
    NotContiguous { table: String, label: String },
    /// Only the final bracket may omit its upper edge, and it must omit it.
    #[error("valuation table `{table}`: bracket `{label}` has a misplaced open end")]
    OpenEnd { table: String, label: String },
    /// Bracket values must not decrease with age.
    #[error("valuation table `{table}`: bracket `{label}` is worth less than the one before")]
    NotMonotone { table: String, label: String },
}

/// Phase of the 12-month production cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CyclePhase {
    /// Peak production at the high monthly rate.
    High,
    /// Tapering production at the medium monthly rate.
    Medium,
    /// Dry months, no revenue.
    Rest,
}

/// Per-animal revenue cycle.
///
/// Production starts `offset` months after the anchor (2 for founders, 34 for
/// offspring) and then repeats: 5 high months, 3 medium months, 4 rest months.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevenueCycle {
    /// Length of the high phase in months.
    pub high_months: u32,
    /// Length of the medium phase in months.
    pub medium_months: u32,
    /// Length of the rest phase in months.
    pub rest_months: u32,
    /// Revenue per high-phase month.
    pub high_monthly: Decimal,
    /// Revenue per medium-phase month.
    pub medium_monthly: Decimal,
    /// Months between a founder's acquisition and its first productive month.
    pub founder_offset_months: u32,
    /// Months between an offspring's birth and its first productive month.
    pub offspring_offset_months: u32,
}

impl Default for RevenueCycle {
    fn default() -> Self {
        Self {
            high_months: 5,
            medium_months: 3,
            rest_months: 4,
            high_monthly: Decimal::new(9_000, 0),
            medium_monthly: Decimal::new(6_000, 0),
            founder_offset_months: 2,
            offspring_offset_months: 34,
        }
    }
}

impl RevenueCycle {
    pub fn validate(&self) -> Result<(), EconError> {
        let total = self.high_months + self.medium_months + self.rest_months;
        if total != CYCLE_MONTHS {
            return Err(EconError::CycleLength(total));
        }
        if self.high_monthly < Decimal::ZERO || self.medium_monthly < Decimal::ZERO {
            return Err(EconError::NegativeMoney("revenue cycle price"));
        }
        Ok(())
    }

    /// Landing offset before the first productive month.
    pub fn offset_for(&self, generation: u32) -> u32 {
        if generation == 0 {
            self.founder_offset_months
        } else {
            self.offspring_offset_months
        }
    }

    /// Phase at a position in the cycle; positions wrap every 12 months.
    pub fn phase_at(&self, position: u32) -> CyclePhase {
        let p = position % CYCLE_MONTHS;
        if p < self.high_months {
            CyclePhase::High
        } else if p < self.high_months + self.medium_months {
            CyclePhase::Medium
        } else {
            CyclePhase::Rest
        }
    }

    pub fn phase_revenue(&self, phase: CyclePhase) -> Decimal {
        match phase {
            CyclePhase::High => self.high_monthly,
            CyclePhase::Medium => self.medium_monthly,
            CyclePhase::Rest => Decimal::ZERO,
        }
    }

    /// Revenue over one full cycle.
    pub fn revenue_per_cycle(&self) -> Decimal {
        let high = self.high_monthly * Decimal::from(self.high_months);
        let medium = self.medium_monthly * Decimal::from(self.medium_months);
        high + medium
    }

    /// Phase of `animal` at `(year, month)`, or `None` before its offset.
    pub fn phase_for(&self, animal: &Animal, year: i32, month: u32) -> Option<CyclePhase> {
        let since = animal.months_since_anchor(year, month);
        let offset = self.offset_for(animal.generation) as i32;
        if since < offset {
            return None;
        }
        Some(self.phase_at((since - offset) as u32))
    }

    /// Revenue earned by `animal` in `(year, month)`; zero outside `window`.
    pub fn monthly_revenue(
        &self,
        animal: &Animal,
        year: i32,
        month: u32,
        window: &SimWindow,
    ) -> Decimal {
        if !window.contains(absolute_month(year, month)) {
            return Decimal::ZERO;
        }
        match self.phase_for(animal, year, month) {
            Some(phase) => self.phase_revenue(phase),
            None => Decimal::ZERO,
        }
    }
}

/// Welfare-fund (CPF) accrual rules.
///
/// The projection policy charges offspring from 36 months, the cost-estimate
/// policy from 24.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WelfareFundPolicy {
    /// Yearly fund contribution per animal.
    pub annual_cost: Decimal,
    /// Months after the simulation start at which the second founder's free period begins.
    pub second_founder_free_from: u32,
    /// Length of the second founder's free period.
    pub second_founder_free_months: u32,
    /// Offspring pay once they reach this age.
    pub offspring_min_age_months: u32,
}

impl Default for WelfareFundPolicy {
    fn default() -> Self {
        Self::projection()
    }
}

impl WelfareFundPolicy {
    /// Offspring pay from full maturity (36 months).
    pub fn projection() -> Self {
        Self {
            annual_cost: Decimal::new(13_000, 0),
            second_founder_free_from: 6,
            second_founder_free_months: 12,
            offspring_min_age_months: 36,
        }
    }

    /// Offspring pay from 24 months, as in the cost-bracket breakdown.
    pub fn cost_estimate() -> Self {
        Self {
            offspring_min_age_months: 24,
            ..Self::projection()
        }
    }

    pub fn validate(&self) -> Result<(), EconError> {
        if self.annual_cost < Decimal::ZERO {
            return Err(EconError::NegativeMoney("welfare fund annual cost"));
        }
        Ok(())
    }

    /// Cost of one applicable animal-month.
    pub fn monthly_cost(&self) -> Decimal {
        self.annual_cost / Decimal::from(CYCLE_MONTHS)
    }

    /// Cost of `months` applicable animal-months; exact for whole years.
    pub fn cost_for_months(&self, months: u64) -> Decimal {
        self.annual_cost * Decimal::from(months) / Decimal::from(CYCLE_MONTHS)
    }

    /// Whether `animal` accrues the fund in `(year, month)`.
    pub fn is_cost_applicable(
        &self,
        animal: &Animal,
        year: i32,
        month: u32,
        window: &SimWindow,
    ) -> bool {
        let abs = absolute_month(year, month);
        if !window.contains(abs) || !animal.is_present(year, month) {
            return false;
        }
        if !animal.is_founder() {
            return age_in_months(animal, year, month) >= self.offspring_min_age_months;
        }
        match animal.founder_role() {
            Some(FounderRole::Second) => {
                let rel = abs - window.start;
                let free_from = self.second_founder_free_from as i32;
                let free_to = free_from + self.second_founder_free_months as i32;
                !(free_from..free_to).contains(&rel)
            }
            _ => true,
        }
    }

    /// Fund cost of `animal` in `(year, month)`.
    pub fn monthly_cost_for(
        &self,
        animal: &Animal,
        year: i32,
        month: u32,
        window: &SimWindow,
    ) -> Decimal {
        if self.is_cost_applicable(animal, year, month, window) {
            self.monthly_cost()
        } else {
            Decimal::ZERO
        }
    }
}

/// A named age range with a fixed market value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgeBracket {
    /// Display label, e.g. "13-18 months".
    pub label: String,
    /// Inclusive lower edge in months.
    pub min_months: u32,
    /// Inclusive upper edge; `None` for the final open-ended bracket.
    #[serde(default)]
    pub max_months: Option<u32>,
    /// Value of one animal in this bracket.
    pub value: Decimal,
}

impl AgeBracket {
    pub fn contains(&self, age_months: u32) -> bool {
        let below_max = self.max_months.map_or(true, |max| age_months <= max);
        age_months >= self.min_months && below_max
    }
}

#[derive(Deserialize)]
struct ValuationTableDef {
    name: String,
    brackets: Vec<AgeBracket>,
}

impl TryFrom<ValuationTableDef> for ValuationTable {
    type Error = EconError;

    fn try_from(def: ValuationTableDef) -> Result<Self, Self::Error> {
        ValuationTable::new(def.name, def.brackets)
    }
}

/// Step function from age in months to asset value.
///
/// Tables are validated on construction (contiguous from 0, open-ended last
/// bracket, non-decreasing values), so every age maps to exactly one bracket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ValuationTableDef")]
pub struct ValuationTable {
    name: String,
    brackets: Vec<AgeBracket>,
}

impl Default for ValuationTable {
    fn default() -> Self {
        Self::detailed()
    }
}

impl ValuationTable {
    pub fn new(name: impl Into<String>, brackets: Vec<AgeBracket>) -> Result<Self, EconError> {
        let name = name.into();
        let Some(first) = brackets.first() else {
            return Err(EconError::EmptyTable(name));
        };
        if first.min_months != 0 {
            return Err(EconError::TableStart(name));
        }
        for (i, b) in brackets.iter().enumerate() {
            let is_last = i + 1 == brackets.len();
            if b.value < Decimal::ZERO {
                return Err(EconError::NegativeMoney("valuation bracket"));
            }
            if b.max_months.is_none() != is_last
                || b.max_months.is_some_and(|max| max < b.min_months)
            {
                return Err(EconError::OpenEnd {
                    table: name,
                    label: b.label.clone(),
                });
            }
            if i == 0 {
                continue;
            }
            let prev = &brackets[i - 1];
            if prev.max_months.map(|max| max + 1) != Some(b.min_months) {
                return Err(EconError::NotContiguous {
                    table: name,
                    label: b.label.clone(),
                });
            }
            if b.value < prev.value {
                return Err(EconError::NotMonotone {
                    table: name,
                    label: b.label.clone(),
                });
            }
        }
        debug!(table = %name, brackets = brackets.len(), "valuation table accepted");
        Ok(Self { name, brackets })
    }

    /// Coarse market price table used by the herd valuation view.
    pub fn market() -> Self {
        Self::preset(
            "market",
            &[
                ("calf (0-12 months)", 0, Some(12), 10_000),
                ("heifer (13-24 months)", 13, Some(24), 30_000),
                ("young (25-36 months)", 25, Some(36), 80_000),
                ("prime (37-48 months)", 37, Some(48), 150_000),
                ("mature (48+ months)", 49, None, 175_000),
            ],
        )
    }

    /// Finer table used by the projection and cost views.
    pub fn detailed() -> Self {
        Self::preset(
            "detailed",
            &[
                ("0-12 months", 0, Some(12), 10_000),
                ("13-18 months", 13, Some(18), 25_000),
                ("19-24 months", 19, Some(24), 40_000),
                ("25-34 months", 25, Some(34), 100_000),
                ("35-40 months", 35, Some(40), 150_000),
                ("41-48 months", 41, Some(48), 160_000),
                ("48+ months", 49, None, 175_000),
            ],
        )
    }

    fn preset(name: &str, rows: &[(&str, u32, Option<u32>, i64)]) -> Self {
        Self {
            name: name.to_string(),
            brackets: rows
                .iter()
                .map(|&(label, min_months, max_months, value)| AgeBracket {
                    label: label.to_string(),
                    min_months,
                    max_months,
                    value: Decimal::new(value, 0),
                })
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn brackets(&self) -> &[AgeBracket] {
        &self.brackets
    }

    /// Bracket holding `age_months`.
    ///
    /// Panics if no bracket matches, which validated tables rule out.
    pub fn bracket_for(&self, age_months: u32) -> &AgeBracket {
        &self.brackets[self.bracket_index(age_months)]
    }

    fn bracket_index(&self, age_months: u32) -> usize {
        match self.brackets.iter().position(|b| b.contains(age_months)) {
            Some(i) => i,
            None => panic!(
                "valuation table `{}` has no bracket for age {} months",
                self.name, age_months
            ),
        }
    }

    pub fn value_by_age(&self, age_months: u32) -> Decimal {
        self.bracket_for(age_months).value
    }

    /// Value of `animal` at `at`; zero before it joins the herd.
    pub fn animal_value(&self, animal: &Animal, at: YearMonth) -> Decimal {
        if !animal.is_present(at.year, at.month) {
            return Decimal::ZERO;
        }
        self.value_by_age(age_in_months(animal, at.year, at.month))
    }

    /// Total value of every animal already in the herd at `at`.
    pub fn herd_value<'a>(
        &self,
        animals: impl IntoIterator<Item = &'a Animal>,
        at: YearMonth,
    ) -> Decimal {
        let mut total = Decimal::ZERO;
        for a in animals {
            total += self.animal_value(a, at);
        }
        total
    }

    /// Per-bracket head count and value at `at`, in table order.
    pub fn breakdown<'a>(
        &self,
        animals: impl IntoIterator<Item = &'a Animal>,
        at: YearMonth,
    ) -> Vec<BracketHolding> {
        let mut rows: Vec<BracketHolding> = self
            .brackets
            .iter()
            .map(|b| BracketHolding {
                label: b.label.clone(),
                unit_value: b.value,
                count: 0,
                total: Decimal::ZERO,
            })
            .collect();
        for a in animals {
            if !a.is_present(at.year, at.month) {
                continue;
            }
            let row = &mut rows[self.bracket_index(age_in_months(a, at.year, at.month))];
            row.count += 1;
            row.total += row.unit_value;
        }
        rows
    }
}

/// Head count and value of one age bracket at a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BracketHolding {
    /// Bracket label from the valuation table.
    pub label: String,
    /// Value of one animal in the bracket.
    pub unit_value: Decimal,
    /// Animals in the bracket at the snapshot.
    pub count: u32,
    /// `unit_value * count`.
    pub total: Decimal,
}

/// Purchase prices that make up the initial investment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pricing {
    /// Price of one founder.
    pub founder_price: Decimal,
    /// One-off welfare-fund enrollment per unit.
    pub welfare_setup_cost: Decimal,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            founder_price: Decimal::new(175_000, 0),
            welfare_setup_cost: Decimal::new(13_000, 0),
        }
    }
}

impl Pricing {
    pub fn validate(&self) -> Result<(), EconError> {
        if self.founder_price < Decimal::ZERO || self.welfare_setup_cost < Decimal::ZERO {
            return Err(EconError::NegativeMoney("pricing"));
        }
        Ok(())
    }

    /// `units * 2 * founder_price + units * welfare_setup_cost`.
    pub fn initial_investment(&self, units: u32) -> Decimal {
        let units = Decimal::from(units);
        units * Decimal::TWO * self.founder_price + units * self.welfare_setup_cost
    }

    /// Share carried by one founder lineage: its price plus half the unit's enrollment.
    pub fn lineage_investment(&self) -> Decimal {
        self.founder_price + self.welfare_setup_cost / Decimal::TWO
    }
}

/// Named configuration of one report view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// View name used for lookup, e.g. "welfare-cost".
    pub name: String,
    /// Welfare-fund rules applied by the view.
    pub welfare: WelfareFundPolicy,
    /// Price table used for herd valuation.
    pub valuation: ValuationTable,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self::projection()
    }
}

impl ViewConfig {
    /// Headline projection and break-even.
    pub fn projection() -> Self {
        Self {
            name: "projection".to_string(),
            welfare: WelfareFundPolicy::projection(),
            valuation: ValuationTable::detailed(),
        }
    }

    /// Year-by-year herd valuation at market prices.
    pub fn herd_valuation() -> Self {
        Self {
            name: "herd-valuation".to_string(),
            welfare: WelfareFundPolicy::projection(),
            valuation: ValuationTable::market(),
        }
    }

    /// Welfare-fund cost breakdown.
    pub fn welfare_cost() -> Self {
        Self {
            name: "welfare-cost".to_string(),
            welfare: WelfareFundPolicy::cost_estimate(),
            valuation: ValuationTable::detailed(),
        }
    }

    pub fn presets() -> Vec<Self> {
        vec![
            Self::projection(),
            Self::herd_valuation(),
            Self::welfare_cost(),
        ]
    }

    pub fn named(name: &str) -> Option<Self> {
        Self::presets().into_iter().find(|v| v.name == name)
    }
}
