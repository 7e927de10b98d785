//! Financial aggregation and break-even detection over one generated herd.

use crate::herd::generate_herd;
use crate::ledger::MonthlyLedger;
use chrono::NaiveDate;
use herd_core::{
    age_in_months, validate_herd, validate_params, Animal, AnimalId, HerdIndex, SimParams,
    SimWindow, ValidationError, YearMonth,
};
use herd_econ::{
    BracketHolding, EconError, Pricing, RevenueCycle, ValuationTable, ViewConfig,
    WelfareFundPolicy,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Errors surfaced by a projection run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid parameters: {0}")]
    Params(#[from] ValidationError),
    #[error("invalid configuration: {0}")]
    Config(#[from] EconError),
    #[error("unknown report view: {0}")]
    UnknownView(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("scenario parse error: {0}")]
    Scenario(#[from] serde_yaml::Error),
}

/// Everything the engine needs besides the run parameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Purchase prices behind the initial investment.
    pub pricing: Pricing,
    /// Revenue cycle shared by every view.
    pub cycle: RevenueCycle,
    /// View used for the headline series and break-even.
    pub view: ViewConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EconError> {
        self.pricing.validate()?;
        self.cycle.validate()?;
        self.view.welfare.validate()?;
        Ok(())
    }
}

/// Display tier of the recovery percentage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RecoveryTier {
    /// Below 25%.
    Starting,
    Quarter,
    Half,
    ThreeQuarters,
    /// 100% or more.
    Recovered,
}

impl RecoveryTier {
    pub fn from_percent(percent: Decimal) -> Self {
        if percent >= Decimal::ONE_HUNDRED {
            RecoveryTier::Recovered
        } else if percent >= Decimal::new(75, 0) {
            RecoveryTier::ThreeQuarters
        } else if percent >= Decimal::new(50, 0) {
            RecoveryTier::Half
        } else if percent >= Decimal::new(25, 0) {
            RecoveryTier::Quarter
        } else {
            RecoveryTier::Starting
        }
    }
}

/// Herd-wide totals for one window month.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonthTotals {
    pub at: YearMonth,
    /// Revenue of every present member.
    pub revenue: Decimal,
    /// Animals accruing the welfare fund this month.
    pub cost_months: u64,
    /// Herd value at this month under the view's table.
    pub asset_value: Decimal,
    /// Members already in the herd.
    pub herd_size: u32,
}

/// One calendar year of the window.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct YearSummary {
    pub year: i32,
    /// Window months inside this year.
    pub months: u32,
    /// Herd size at the year's last window month.
    pub total_animals: u32,
    /// Members with revenue in at least one month of the year.
    pub producing_animals: u32,
    pub non_producing_animals: u32,
    pub annual_revenue: Decimal,
    pub annual_welfare_cost: Decimal,
    /// `annual_revenue - annual_welfare_cost`.
    pub net_annual_revenue: Decimal,
    /// Revenue since the window start, this year included.
    pub cumulative_revenue: Decimal,
    pub cumulative_welfare_cost: Decimal,
    pub cumulative_net_revenue: Decimal,
    /// Herd value at the year's last window month.
    pub year_end_asset_value: Decimal,
    /// `cumulative_net_revenue + year_end_asset_value`.
    pub total_value: Decimal,
    /// `total_value` as a share of the investment, two decimals.
    pub recovery_percent: Decimal,
    /// Tier of the unrounded recovery ratio.
    pub recovery_tier: RecoveryTier,
    /// Zero when nothing produced this year.
    pub revenue_per_producing_animal: Decimal,
}

/// First month where cumulative net revenue plus herd value covers the investment.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BreakEven {
    pub at: YearMonth,
    /// Zero-based month index from the window start.
    pub month_index: usize,
    /// Last day of the break-even month.
    pub date: NaiveDate,
    pub cumulative_revenue: Decimal,
    pub cumulative_welfare_cost: Decimal,
    /// Herd value in the break-even month.
    pub asset_value: Decimal,
    /// Revenue minus welfare cost plus herd value; at least the investment.
    pub total_value: Decimal,
}

/// Year-end herd valuation with per-bracket breakdown.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct YearValuation {
    pub year: i32,
    /// Snapshot month, the year's last window month.
    pub at: YearMonth,
    /// Name of the valuation table used.
    pub table: String,
    pub animal_count: u32,
    pub total_value: Decimal,
    /// One entry per table bracket, empty ones included.
    pub brackets: Vec<BracketHolding>,
}

/// Lifetime figures of one animal over the window.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnimalTotals {
    pub animal_id: AnimalId,
    /// Revenue over the whole window.
    pub revenue: Decimal,
    /// Welfare-fund cost over the whole window.
    pub welfare_cost: Decimal,
    pub net: Decimal,
    /// Age in the last window month.
    pub age_months_at_end: u32,
    /// Value in the last window month.
    pub value_at_end: Decimal,
}

/// Aggregation restricted to a lineage or a unit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupSummary {
    /// Founder id for a lineage, "unit N" for a unit.
    pub label: String,
    pub members: usize,
    /// Share of the initial investment carried by the group.
    pub investment: Decimal,
    pub yearly: Vec<YearSummary>,
    pub break_even: Option<BreakEven>,
}

/// Recovery of `investment` by `total`: percent to two decimals and its tier.
///
/// The tier comes from the exact ratio, so 99.996% shows as 100.00 but stays
/// below `Recovered`. A zero investment recovers nothing.
pub(crate) fn recovery(total: Decimal, investment: Decimal) -> (Decimal, RecoveryTier) {
    if investment.is_zero() {
        return (Decimal::ZERO, RecoveryTier::Starting);
    }
    let exact = total / investment * Decimal::ONE_HUNDRED;
    (exact.round_dp(2), RecoveryTier::from_percent(exact))
}

/// Average per head; zero for an empty group.
pub(crate) fn per_head(total: Decimal, count: u32) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    total / Decimal::from(count)
}

/// Folds a subset of the herd into monthly, yearly and break-even figures.
pub(crate) struct Rollup<'a> {
    pub animals: &'a [Animal],
    pub ledger: &'a MonthlyLedger,
    pub members: &'a [usize],
    pub welfare: &'a WelfareFundPolicy,
    pub table: &'a ValuationTable,
    pub investment: Decimal,
}

impl<'a> Rollup<'a> {
    pub fn monthly(&self) -> Vec<MonthTotals> {
        self.ledger
            .window
            .months()
            .enumerate()
            .map(|(offset, at)| {
                let mut totals = MonthTotals {
                    at,
                    revenue: Decimal::ZERO,
                    cost_months: 0,
                    asset_value: Decimal::ZERO,
                    herd_size: 0,
                };
                for &pos in self.members {
                    let animal = &self.animals[pos];
                    if !animal.is_present(at.year, at.month) {
                        continue;
                    }
                    let cell = &self.ledger.rows[pos].cells[offset];
                    totals.revenue += cell.revenue;
                    totals.cost_months += u64::from(cell.cost_applicable);
                    totals.asset_value += self.table.animal_value(animal, at);
                    totals.herd_size += 1;
                }
                totals
            })
            .collect()
    }

    /// Running `revenue - welfare cost + herd value` for every window month.
    pub fn cumulative_values(&self, months: &[MonthTotals]) -> Vec<Decimal> {
        let mut revenue = Decimal::ZERO;
        let mut cost_months = 0u64;
        months
            .iter()
            .map(|m| {
                revenue += m.revenue;
                cost_months += m.cost_months;
                revenue - self.welfare.cost_for_months(cost_months) + m.asset_value
            })
            .collect()
    }

    pub fn break_even(&self, months: &[MonthTotals]) -> Option<BreakEven> {
        let mut revenue = Decimal::ZERO;
        let mut cost_months = 0u64;
        for (month_index, m) in months.iter().enumerate() {
            revenue += m.revenue;
            cost_months += m.cost_months;
            let cost = self.welfare.cost_for_months(cost_months);
            let total_value = revenue - cost + m.asset_value;
            if total_value >= self.investment {
                return Some(BreakEven {
                    at: m.at,
                    month_index,
                    date: m.at.last_day()?,
                    cumulative_revenue: revenue,
                    cumulative_welfare_cost: cost,
                    asset_value: m.asset_value,
                    total_value,
                });
            }
        }
        None
    }

    pub fn yearly(&self, months: &[MonthTotals]) -> Vec<YearSummary> {
        let window = self.ledger.window;
        let mut cumulative_revenue = Decimal::ZERO;
        let mut cumulative_cost_months = 0u64;
        let mut out = Vec::new();
        for year in window.calendar_years() {
            let Some(year_end) = window.year_end(year) else {
                continue;
            };
            let offsets: Vec<usize> = window
                .months_in_year(year)
                .filter_map(|ym| window.offset_of(ym.absolute()))
                .collect();
            let Some(end) = window.offset_of(year_end.absolute()).map(|i| &months[i]) else {
                continue;
            };

            let annual_revenue: Decimal = offsets.iter().map(|&i| months[i].revenue).sum();
            let annual_cost_months: u64 = offsets.iter().map(|&i| months[i].cost_months).sum();
            let producing = self
                .members
                .iter()
                .filter(|&&pos| {
                    offsets
                        .iter()
                        .any(|&i| self.ledger.rows[pos].cells[i].revenue > Decimal::ZERO)
                })
                .count() as u32;

            cumulative_revenue += annual_revenue;
            cumulative_cost_months += annual_cost_months;
            let annual_welfare_cost = self.welfare.cost_for_months(annual_cost_months);
            let cumulative_welfare_cost = self.welfare.cost_for_months(cumulative_cost_months);
            let cumulative_net_revenue = cumulative_revenue - cumulative_welfare_cost;
            let total_value = cumulative_net_revenue + end.asset_value;
            let (recovery_percent, recovery_tier) = recovery(total_value, self.investment);

            out.push(YearSummary {
                year,
                months: offsets.len() as u32,
                total_animals: end.herd_size,
                producing_animals: producing,
                non_producing_animals: end.herd_size.saturating_sub(producing),
                annual_revenue,
                annual_welfare_cost,
                net_annual_revenue: annual_revenue - annual_welfare_cost,
                cumulative_revenue,
                cumulative_welfare_cost,
                cumulative_net_revenue,
                year_end_asset_value: end.asset_value,
                total_value,
                recovery_percent,
                recovery_tier,
                revenue_per_producing_animal: per_head(annual_revenue, producing),
            });
        }
        out
    }

    pub fn summary(&self, label: String) -> GroupSummary {
        let months = self.monthly();
        GroupSummary {
            label,
            members: self.members.len(),
            investment: self.investment,
            yearly: self.yearly(&months),
            break_even: self.break_even(&months),
        }
    }
}

/// Year-end valuation of `members` for every calendar year of the window.
pub(crate) fn valuation_by_year(
    animals: &[Animal],
    members: &[usize],
    window: &SimWindow,
    table: &ValuationTable,
) -> Vec<YearValuation> {
    let group = || members.iter().map(|&pos| &animals[pos]);
    window
        .calendar_years()
        .filter_map(|year| {
            let at = window.year_end(year)?;
            let brackets = table.breakdown(group(), at);
            Some(YearValuation {
                year,
                at,
                table: table.name().to_string(),
                animal_count: brackets.iter().map(|b| b.count).sum(),
                total_value: table.herd_value(group(), at),
                brackets,
            })
        })
        .collect()
}

/// Result of one projection run. Immutable once built.
#[derive(Clone, Debug, Serialize)]
pub struct Projection {
    pub params: SimParams,
    pub config: EngineConfig,
    pub window: SimWindow,
    pub initial_investment: Decimal,
    pub animals: Vec<Animal>,
    #[serde(skip)]
    pub index: HerdIndex,
    pub ledger: MonthlyLedger,
    pub monthly: Vec<MonthTotals>,
    pub animal_totals: Vec<AnimalTotals>,
    pub yearly: Vec<YearSummary>,
    pub valuation_by_year: Vec<YearValuation>,
    pub break_even: Option<BreakEven>,
}

/// Validate inputs, generate the herd and aggregate it under `config.view`.
pub fn run_projection(
    params: &SimParams,
    config: &EngineConfig,
) -> Result<Projection, EngineError> {
    validate_params(params)?;
    config.validate()?;

    let window = params.window();
    let animals = generate_herd(params);
    validate_herd(&animals)?;
    let index = HerdIndex::build(&animals);
    let view = &config.view;
    let ledger = MonthlyLedger::build(&animals, &window, &config.cycle, &view.welfare);
    let initial_investment = config.pricing.initial_investment(params.units_count);
    let everyone: Vec<usize> = (0..animals.len()).collect();

    let rollup = Rollup {
        animals: &animals,
        ledger: &ledger,
        members: &everyone,
        welfare: &view.welfare,
        table: &view.valuation,
        investment: initial_investment,
    };
    let monthly = rollup.monthly();
    let yearly = rollup.yearly(&monthly);
    let break_even = rollup.break_even(&monthly);
    let valuation_by_year = valuation_by_year(&animals, &everyone, &window, &view.valuation);

    let end = window.last();
    let animal_totals = animals
        .iter()
        .zip(&ledger.rows)
        .map(|(a, row)| {
            let revenue = row.total_revenue();
            let welfare_cost = view.welfare.cost_for_months(row.cost_months());
            AnimalTotals {
                animal_id: a.id.clone(),
                revenue,
                welfare_cost,
                net: revenue - welfare_cost,
                age_months_at_end: age_in_months(a, end.year, end.month),
                value_at_end: view.valuation.animal_value(a, end),
            }
        })
        .collect();

    match &break_even {
        Some(be) => info!(
            view = %view.name,
            animals = animals.len(),
            investment = %initial_investment,
            break_even = %be.at,
            "projection complete"
        ),
        None => info!(
            view = %view.name,
            animals = animals.len(),
            investment = %initial_investment,
            "projection complete without break-even"
        ),
    }

    Ok(Projection {
        params: params.clone(),
        config: config.clone(),
        window,
        initial_investment,
        animals,
        index,
        ledger,
        monthly,
        animal_totals,
        yearly,
        valuation_by_year,
        break_even,
    })
}

impl Projection {
    pub fn animal(&self, id: &AnimalId) -> Option<&Animal> {
        self.index.get(&self.animals, id)
    }

    pub fn totals_for(&self, id: &AnimalId) -> Option<&AnimalTotals> {
        self.index.position(id).and_then(|pos| self.animal_totals.get(pos))
    }

    /// Running cumulative value per window month under the run's view.
    pub fn cumulative_values(&self) -> Vec<Decimal> {
        let everyone: Vec<usize> = (0..self.animals.len()).collect();
        let rollup = self.rollup(&everyone, self.initial_investment);
        rollup.cumulative_values(&self.monthly)
    }

    /// Rollup of one founder's lineage, or `None` if `root` is not a founder.
    pub fn lineage_summary(&self, root: &AnimalId) -> Option<GroupSummary> {
        let founder = self.animal(root).filter(|a| a.is_founder())?;
        let members = self.index.lineage(&founder.id);
        let rollup = self.rollup(members, self.config.pricing.lineage_investment());
        Some(rollup.summary(founder.id.to_string()))
    }

    /// Rollup of one breeding unit, or `None` if the unit does not exist.
    pub fn unit_summary(&self, unit: u32) -> Option<GroupSummary> {
        let members = self.index.unit_members(unit);
        if members.is_empty() {
            return None;
        }
        let rollup = self.rollup(members, self.config.pricing.initial_investment(1));
        Some(rollup.summary(format!("unit {unit}")))
    }

    fn rollup<'a>(&'a self, members: &'a [usize], investment: Decimal) -> Rollup<'a> {
        Rollup {
            animals: &self.animals,
            ledger: &self.ledger,
            members,
            welfare: &self.config.view.welfare,
            table: &self.config.view.valuation,
            investment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn params(units: u32, month: u32, years: u32) -> SimParams {
        SimParams {
            units_count: units,
            start_year: 2026,
            start_month: month,
            start_day: 1,
            simulation_years: years,
        }
    }

    fn run(units: u32, month: u32, years: u32) -> Projection {
        run_projection(&params(units, month, years), &EngineConfig::default())
            .unwrap()
    }

    fn d(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    #[test]
    fn rejects_invalid_params() {
        let config = EngineConfig::default();
        let err = run_projection(&params(0, 0, 1), &config).unwrap_err();
        assert!(matches!(err, EngineError::Params(ValidationError::NoUnits)));
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.cycle.high_months = 6;
        let err = run_projection(&params(1, 0, 1), &config).unwrap_err();
        assert!(matches!(err, EngineError::Config(EconError::CycleLength(13))));
    }

    #[test]
    fn single_unit_first_year() {
        let p = run(1, 0, 1);
        assert_eq!(p.initial_investment, d(363_000));
        assert_eq!(p.animals.len(), 2);
        assert_eq!(p.yearly.len(), 1);
        let y = &p.yearly[0];
        assert_eq!(y.year, 2026);
        assert_eq!(y.months, 12);
        assert_eq!(y.total_animals, 2);
        assert_eq!(y.producing_animals, 2);
        assert_eq!(y.annual_revenue, d(99_000));
        // A pays all twelve months, B is inside its free period.
        assert_eq!(y.annual_welfare_cost, d(13_000));
        assert_eq!(y.net_annual_revenue, d(86_000));
        assert_eq!(y.year_end_asset_value, d(350_000));
        assert_eq!(y.total_value, d(436_000));
        assert_eq!(y.recovery_tier, RecoveryTier::Recovered);
        assert_eq!(y.revenue_per_producing_animal, d(49_500));
    }

    #[test]
    fn break_even_lands_when_second_founder_arrives() {
        let p = run(1, 0, 1);
        let be = p.break_even.as_ref().unwrap();
        assert_eq!(be.at, YearMonth::new(2026, 6));
        assert_eq!(be.month_index, 6);
        assert_eq!(be.date, NaiveDate::from_ymd_opt(2026, 7, 31).unwrap());
        assert_eq!(be.cumulative_revenue, d(45_000));
        assert_eq!(be.asset_value, d(350_000));
        assert!(be.total_value >= p.initial_investment);
    }

    #[test]
    fn founder_totals() {
        let p = run(1, 0, 1);
        let a = p.totals_for(&AnimalId::new("A")).unwrap();
        assert_eq!(a.revenue, d(63_000));
        assert_eq!(a.welfare_cost, d(13_000));
        assert_eq!(a.net, d(50_000));
        assert_eq!(a.age_months_at_end, 71);
        let b = p.totals_for(&AnimalId::new("B")).unwrap();
        assert_eq!(b.welfare_cost, Decimal::ZERO);
    }

    #[test]
    fn unit_and_lineage_summaries() {
        let p = run(2, 0, 5);
        let unit = p.unit_summary(2).unwrap();
        assert_eq!(unit.investment, d(363_000));
        assert!(unit.members >= 2);
        assert!(p.unit_summary(3).is_none());

        let lineage = p.lineage_summary(&AnimalId::new("C")).unwrap();
        assert_eq!(lineage.label, "C");
        assert_eq!(lineage.investment, d(181_500));
        assert!(p.lineage_summary(&AnimalId::new("C1")).is_none());

        let mut both = Decimal::ZERO;
        for root in ["C", "D"] {
            let lineage = p.lineage_summary(&AnimalId::new(root)).unwrap();
            both += lineage.yearly[4].cumulative_revenue;
        }
        assert_eq!(both, unit.yearly[4].cumulative_revenue);
    }

    #[test]
    fn valuation_by_year_counts_year_end_herd() {
        let p = run(1, 0, 4);
        assert_eq!(p.valuation_by_year.len(), 4);
        let last = p.valuation_by_year.last().unwrap();
        assert_eq!(last.at, YearMonth::new(2029, 11));
        assert_eq!(last.animal_count, 8);
        assert_eq!(last.table, "detailed");
        assert_eq!(last.total_value, p.yearly[3].year_end_asset_value);
        let by_bracket: Decimal = last.brackets.iter().map(|b| b.total).sum();
        assert_eq!(by_bracket, last.total_value);
    }

    #[test]
    fn recovery_tiers() {
        assert_eq!(RecoveryTier::from_percent(d(10)), RecoveryTier::Starting);
        assert_eq!(RecoveryTier::from_percent(d(25)), RecoveryTier::Quarter);
        assert_eq!(RecoveryTier::from_percent(d(74)), RecoveryTier::Half);
        assert_eq!(RecoveryTier::from_percent(d(75)), RecoveryTier::ThreeQuarters);
        assert_eq!(RecoveryTier::from_percent(d(100)), RecoveryTier::Recovered);
        assert_eq!(per_head(d(5), 0), Decimal::ZERO);
    }

    #[test]
    fn recovery_tier_ignores_display_rounding() {
        let (percent, tier) = recovery(d(99_996), d(100_000));
        assert_eq!(percent, Decimal::new(10_000, 2));
        assert_eq!(tier, RecoveryTier::ThreeQuarters);
        let (percent, tier) = recovery(d(100_000), d(100_000));
        assert_eq!(percent, d(100));
        assert_eq!(tier, RecoveryTier::Recovered);
        let (_, tier) = recovery(d(24_999), d(100_000));
        assert_eq!(tier, RecoveryTier::Starting);
        let empty = recovery(d(5), Decimal::ZERO);
        assert_eq!(empty, (Decimal::ZERO, RecoveryTier::Starting));
    }

    #[test]
    fn identical_inputs_serialize_identically() {
        let config = EngineConfig::default();
        let a = run_projection(&params(2, 3, 6), &config).unwrap();
        let b = run_projection(&params(2, 3, 6), &config).unwrap();
        let a = serde_json::to_string(&a).unwrap();
        let b = serde_json::to_string(&b).unwrap();
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn break_even_is_first_crossing(units in 1u32..4, month in 0u32..12, years in 1u32..=10) {
            let p = run(units, month, years);
            let values = p.cumulative_values();
            prop_assert_eq!(values.len(), p.window.len_months());
            match &p.break_even {
                Some(be) => {
                    prop_assert!(values[be.month_index] >= p.initial_investment);
                    prop_assert_eq!(values[be.month_index], be.total_value);
                    if be.month_index > 0 {
                        prop_assert!(values[be.month_index - 1] < p.initial_investment);
                    }
                }
                None => prop_assert!(values.iter().all(|v| *v < p.initial_investment)),
            }
        }

        #[test]
        fn yearly_totals_match_ledger(units in 1u32..3, month in 0u32..12, years in 1u32..=10) {
            let p = run(units, month, years);
            let from_years: Decimal = p.yearly.iter().map(|y| y.annual_revenue).sum();
            let from_animals: Decimal = p.animal_totals.iter().map(|t| t.revenue).sum();
            prop_assert_eq!(from_years, from_animals);
            let months: u32 = p.yearly.iter().map(|y| y.months).sum();
            prop_assert_eq!(months as usize, p.window.len_months());
        }
    }
}
