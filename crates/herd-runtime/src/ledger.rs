//! Per-animal, per-month revenue and welfare-fund grid.

use herd_core::{Animal, AnimalId, HerdIndex, SimWindow, YearMonth};
use herd_econ::{RevenueCycle, WelfareFundPolicy};
use rust_decimal::Decimal;
use serde::Serialize;

/// One animal in one window month.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct MonthCell {
    /// Cycle revenue earned this month.
    pub revenue: Decimal,
    /// Welfare-fund share charged this month.
    pub welfare_cost: Decimal,
    /// Whether the fund applied, even when its cost rounds to nothing.
    pub cost_applicable: bool,
}

/// All window months of one animal.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LedgerRow {
    pub animal_id: AnimalId,
    /// One cell per window month, oldest first.
    pub cells: Vec<MonthCell>,
}

impl LedgerRow {
    pub fn total_revenue(&self) -> Decimal {
        self.cells.iter().map(|c| c.revenue).sum()
    }

    /// Number of months the welfare fund applied.
    pub fn cost_months(&self) -> u64 {
        self.cells.iter().filter(|c| c.cost_applicable).count() as u64
    }
}

/// Revenue/cost grid keyed by animal; rows follow the herd order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonthlyLedger {
    /// Months covered by every row.
    pub window: SimWindow,
    /// Rows in herd order; row `i` belongs to the animal at position `i`.
    pub rows: Vec<LedgerRow>,
}

impl MonthlyLedger {
    pub fn build(
        animals: &[Animal],
        window: &SimWindow,
        cycle: &RevenueCycle,
        welfare: &WelfareFundPolicy,
    ) -> Self {
        let cell = |a: &Animal, ym: YearMonth| MonthCell {
            revenue: cycle.monthly_revenue(a, ym.year, ym.month, window),
            welfare_cost: welfare.monthly_cost_for(a, ym.year, ym.month, window),
            cost_applicable: welfare.is_cost_applicable(a, ym.year, ym.month, window),
        };
        let rows = animals
            .iter()
            .map(|a| LedgerRow {
                animal_id: a.id.clone(),
                cells: window.months().map(|ym| cell(a, ym)).collect(),
            })
            .collect();
        Self {
            window: *window,
            rows,
        }
    }

    /// Cell of the animal at herd position `pos` in month `at`.
    pub fn cell(&self, pos: usize, at: YearMonth) -> Option<&MonthCell> {
        let offset = self.window.offset_of(at.absolute())?;
        self.rows.get(pos)?.cells.get(offset)
    }

    /// Row of `id`, looked up through the herd index the ledger was built from.
    pub fn row_for(&self, index: &HerdIndex, id: &AnimalId) -> Option<&LedgerRow> {
        index.position(id).and_then(|pos| self.rows.get(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::herd::generate_herd;
    use herd_core::SimParams;
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

    fn build(herd: &[Animal], p: &SimParams, welfare: &WelfareFundPolicy) -> MonthlyLedger {
        MonthlyLedger::build(herd, &p.window(), &RevenueCycle::default(), welfare)
    }

    fn one_unit_one_year() -> (HerdIndex, MonthlyLedger) {
        let p = params(1, 0, 1);
        let herd = generate_herd(&p);
        let ledger = build(&herd, &p, &WelfareFundPolicy::projection());
        (HerdIndex::build(&herd), ledger)
    }

    #[test]
    fn first_founder_row() {
        let (index, ledger) = one_unit_one_year();
        let a = ledger.row_for(&index, &AnimalId::new("A")).unwrap();
        assert_eq!(a.cells.len(), 12);
        assert_eq!(a.cells[1].revenue, Decimal::ZERO);
        assert_eq!(a.cells[2].revenue, Decimal::new(9_000, 0));
        // March..July high (5), August..October medium (3)
        assert_eq!(a.total_revenue(), Decimal::new(63_000, 0));
        assert_eq!(a.cost_months(), 12);
    }

    #[test]
    fn second_founder_is_exempt_after_arrival() {
        let (index, ledger) = one_unit_one_year();
        let b = ledger.row_for(&index, &AnimalId::new("B")).unwrap();
        assert_eq!(b.cost_months(), 0);
        assert!(b.cells.iter().all(|c| c.welfare_cost == Decimal::ZERO));
        // July arrival, first revenue in September
        let september = ledger.cell(1, YearMonth::new(2026, 8));
        assert_eq!(september.map(|c| c.revenue), Some(Decimal::new(9_000, 0)));
        assert_eq!(b.total_revenue(), Decimal::new(36_000, 0));
    }

    #[test]
    fn rows_are_found_through_the_index() {
        let p = params(2, 0, 4);
        let herd = generate_herd(&p);
        let index = HerdIndex::build(&herd);
        let ledger = build(&herd, &p, &WelfareFundPolicy::projection());
        for a in &herd {
            let row = ledger.row_for(&index, &a.id).unwrap();
            assert_eq!(row.animal_id, a.id);
        }
        assert!(ledger.row_for(&index, &AnimalId::new("Z9")).is_none());
    }

    #[test]
    fn cost_cells_carry_the_monthly_share() {
        let (index, ledger) = one_unit_one_year();
        let a = ledger.row_for(&index, &AnimalId::new("A")).unwrap();
        let share = WelfareFundPolicy::projection().monthly_cost();
        assert!(a.cells.iter().all(|c| c.welfare_cost == share));
    }

    #[test]
    fn cells_outside_window_are_absent() {
        let (_, ledger) = one_unit_one_year();
        assert!(ledger.cell(0, YearMonth::new(2027, 0)).is_none());
        assert!(ledger.cell(5, YearMonth::new(2026, 0)).is_none());
    }

    proptest! {
        #[test]
        fn generated_herds_accrue_nothing_outside_window(
            units in 1u32..4,
            month in 0u32..12,
            years in 1u32..=10,
            offset in 1i32..36
        ) {
            let p = params(units, month, years);
            let window = p.window();
            let herd = generate_herd(&p);
            let cycle = RevenueCycle::default();
            let policies = [WelfareFundPolicy::projection(), WelfareFundPolicy::cost_estimate()];
            let outside = [window.start - offset, window.end + offset];
            for welfare in &policies {
                let ledger = build(&herd, &p, welfare);
                for (pos, a) in herd.iter().enumerate() {
                    prop_assert_eq!(ledger.rows[pos].cells.len(), window.len_months());
                    for abs in outside {
                        let ym = YearMonth::from_absolute(abs);
                        let rev = cycle.monthly_revenue(a, ym.year, ym.month, &window);
                        prop_assert_eq!(rev, Decimal::ZERO);
                        prop_assert!(!welfare.is_cost_applicable(a, ym.year, ym.month, &window));
                        prop_assert!(ledger.cell(pos, ym).is_none());
                    }
                }
            }
        }
    }
}
