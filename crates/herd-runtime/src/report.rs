//! Named report views over a finished projection.

use crate::ledger::MonthlyLedger;
use crate::projection::{
    valuation_by_year, AnimalTotals, BreakEven, EngineError, GroupSummary, Projection, Rollup,
    YearSummary, YearValuation,
};
use herd_core::age_in_months;
use herd_econ::ViewConfig;
use rust_decimal::Decimal;
use serde::Serialize;
use std::borrow::Cow;
use tracing::debug;

/// Re-aggregation of a projection under one view and selection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    /// Name of the view the report was built under.
    pub view: String,
    /// Name of the view's valuation table.
    pub valuation_table: String,
    pub selected_year: Option<i32>,
    pub selected_unit: Option<u32>,
    /// Animals in the selection.
    pub members: usize,
    /// Investment of the selection: the whole herd or one unit.
    pub investment: Decimal,
    /// Year rows, narrowed to the selected year.
    pub yearly: Vec<YearSummary>,
    /// Searched over the whole window regardless of the selected year.
    pub break_even: Option<BreakEven>,
    /// Year-end valuations, narrowed to the selected year.
    pub valuation: Vec<YearValuation>,
    /// Per-animal totals in herd order.
    pub animals: Vec<AnimalTotals>,
    /// One rollup per founder in the selection.
    pub lineages: Vec<GroupSummary>,
}

/// Aggregate `projection` under `view`, optionally narrowed to a unit and a year.
///
/// The year only filters the yearly and valuation series; break-even is always
/// searched over the whole window. An unknown unit yields an empty selection.
pub fn report_for(
    projection: &Projection,
    view: &ViewConfig,
    selected_year: Option<i32>,
    selected_unit: Option<u32>,
) -> Report {
    let ledger: Cow<'_, MonthlyLedger> = if view.welfare == projection.config.view.welfare {
        Cow::Borrowed(&projection.ledger)
    } else {
        Cow::Owned(MonthlyLedger::build(
            &projection.animals,
            &projection.window,
            &projection.config.cycle,
            &view.welfare,
        ))
    };

    let everyone: Vec<usize> = (0..projection.animals.len()).collect();
    let members = match selected_unit {
        Some(unit) => projection.index.unit_members(unit),
        None => everyone.as_slice(),
    };
    let pricing = &projection.config.pricing;
    let investment = match selected_unit {
        Some(_) => pricing.initial_investment(1),
        None => projection.initial_investment,
    };
    let in_year = |year: i32| selected_year.map_or(true, |sel| sel == year);

    let rollup = Rollup {
        animals: &projection.animals,
        ledger: &ledger,
        members,
        welfare: &view.welfare,
        table: &view.valuation,
        investment,
    };
    let monthly = rollup.monthly();
    let mut yearly = rollup.yearly(&monthly);
    yearly.retain(|y| in_year(y.year));
    let break_even = rollup.break_even(&monthly);

    let mut valuation = valuation_by_year(
        &projection.animals,
        members,
        &projection.window,
        &view.valuation,
    );
    valuation.retain(|v| in_year(v.year));

    let end = projection.window.last();
    let animals = members
        .iter()
        .map(|&pos| {
            let animal = &projection.animals[pos];
            let row = &ledger.rows[pos];
            let revenue = row.total_revenue();
            let welfare_cost = view.welfare.cost_for_months(row.cost_months());
            AnimalTotals {
                animal_id: animal.id.clone(),
                revenue,
                welfare_cost,
                net: revenue - welfare_cost,
                age_months_at_end: age_in_months(animal, end.year, end.month),
                value_at_end: view.valuation.animal_value(animal, end),
            }
        })
        .collect();

    let lineages = members
        .iter()
        .map(|&pos| &projection.animals[pos])
        .filter(|a| a.is_founder())
        .map(|founder| {
            let mut summary = Rollup {
                members: projection.index.lineage(&founder.id),
                investment: pricing.lineage_investment(),
                ..rollup
            }
            .summary(founder.id.to_string());
            summary.yearly.retain(|y| in_year(y.year));
            summary
        })
        .collect();

    debug!(
        view = %view.name,
        year = ?selected_year,
        unit = ?selected_unit,
        members = members.len(),
        reused_ledger = matches!(ledger, Cow::Borrowed(_)),
        "built report"
    );

    Report {
        view: view.name.clone(),
        valuation_table: view.valuation.name().to_string(),
        selected_year,
        selected_unit,
        members: members.len(),
        investment,
        yearly,
        break_even,
        valuation,
        animals,
        lineages,
    }
}

impl Projection {
    /// [`report_for`] with a preset view looked up by name.
    pub fn report(
        &self,
        view: &str,
        selected_year: Option<i32>,
        selected_unit: Option<u32>,
    ) -> Result<Report, EngineError> {
        let view = if view == self.config.view.name {
            self.config.view.clone()
        } else {
            match ViewConfig::named(view) {
                Some(preset) => preset,
                None => return Err(EngineError::UnknownView(view.to_string())),
            }
        };
        Ok(report_for(self, &view, selected_year, selected_unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{run_projection, EngineConfig};
    use herd_core::SimParams;

    fn run(units: u32, years: u32) -> Projection {
        let params = SimParams {
            units_count: units,
            start_year: 2026,
            start_month: 0,
            start_day: 1,
            simulation_years: years,
        };
        run_projection(&params, &EngineConfig::default()).unwrap()
    }

    #[test]
    fn projection_view_matches_headline_series() {
        let p = run(1, 4);
        let r = report_for(&p, &ViewConfig::projection(), None, None);
        assert_eq!(r.yearly, p.yearly);
        assert_eq!(r.break_even, p.break_even);
        assert_eq!(r.valuation, p.valuation_by_year);
        assert_eq!(r.animals, p.animal_totals);
        assert_eq!(r.members, p.animals.len());
    }

    #[test]
    fn cost_view_charges_offspring_earlier() {
        let p = run(1, 4);
        let projection = p.report("projection", Some(2029), None).unwrap();
        let estimate = p.report("welfare-cost", Some(2029), None).unwrap();
        assert_eq!(projection.yearly.len(), 1);
        let (headline, early) = (&projection.yearly[0], &estimate.yearly[0]);
        // A1 pays all of 2029, B1 from July.
        let extra = early.annual_welfare_cost - headline.annual_welfare_cost;
        assert_eq!(extra, Decimal::new(19_500, 0));
        assert_eq!(early.annual_revenue, headline.annual_revenue);
    }

    #[test]
    fn valuation_view_uses_market_table() {
        let p = run(1, 4);
        let r = p.report("herd-valuation", Some(2027), None).unwrap();
        assert_eq!(r.valuation_table, "market");
        assert_eq!(r.valuation.len(), 1);
        let v = &r.valuation[0];
        assert_eq!(v.table, "market");
        // two founders plus A1 (11 months) and B1 (5 months)
        assert_eq!(v.animal_count, 4);
        assert_eq!(v.total_value, Decimal::new(370_000, 0));
    }

    #[test]
    fn unit_selection_narrows_members_and_investment() {
        let p = run(2, 3);
        let r = p.report("projection", None, Some(2)).unwrap();
        assert_eq!(r.investment, Decimal::new(363_000, 0));
        for t in &r.animals {
            assert_eq!(p.animal(&t.animal_id).unwrap().unit, 2);
        }
        let labels: Vec<&str> = r.lineages.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(labels, ["C", "D"]);
        assert_eq!(r.break_even, p.unit_summary(2).unwrap().break_even);
    }

    #[test]
    fn unknown_unit_is_empty() {
        let p = run(1, 2);
        let r = report_for(&p, &ViewConfig::projection(), None, Some(5));
        assert_eq!(r.members, 0);
        assert!(r.lineages.is_empty());
        assert!(r.break_even.is_none());
        assert!(r.yearly.iter().all(|y| y.total_animals == 0));
    }

    #[test]
    fn unknown_view_is_an_error() {
        let p = run(1, 1);
        let err = p.report("cash-flow", None, None).unwrap_err();
        assert!(matches!(err, EngineError::UnknownView(name) if name == "cash-flow"));
    }
}
