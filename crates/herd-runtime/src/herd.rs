//! Herd generation: founders per unit, then one calf per mature animal per year.

use herd_core::{
    Animal, AnimalId, SimParams, YearMonth, FOUNDER_AGE_YEARS, MATURITY_AGE_YEARS,
    SECOND_FOUNDER_DELAY_MONTHS,
};
use tracing::{debug, info};

/// Founders per breeding unit.
pub const FOUNDERS_PER_UNIT: u32 = 2;

/// Spreadsheet-style founder label: 1 → "A", 26 → "Z", 27 → "AA".
pub fn founder_label(ordinal: u32) -> String {
    let mut n = ordinal;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(char::from(b'A' + (n % 26) as u8));
        n /= 26;
    }
    letters.iter().rev().collect()
}

/// Id of the `counter`-th calf of `parent`.
///
/// Founder ids end in a letter, so the counter is appended directly ("A1");
/// below that a "." keeps digit runs unambiguous ("A1.2").
pub fn offspring_id(parent: &Animal, counter: u32) -> AnimalId {
    if parent.is_founder() {
        AnimalId::new(format!("{}{}", parent.id, counter))
    } else {
        AnimalId::new(format!("{}.{}", parent.id, counter))
    }
}

/// Breeding state tracked alongside each animal during generation only.
#[derive(Debug, Clone)]
struct Breeder {
    age_years: u32,
    mature: bool,
    calves: u32,
}

impl Breeder {
    fn founder() -> Self {
        Self {
            age_years: FOUNDER_AGE_YEARS,
            mature: true,
            calves: 0,
        }
    }

    fn newborn() -> Self {
        Self {
            age_years: 0,
            mature: false,
            calves: 0,
        }
    }

    fn age_one_year(&mut self) {
        self.age_years += 1;
        if !self.mature && self.age_years >= MATURITY_AGE_YEARS {
            self.mature = true;
        }
    }
}

/// Generate the full herd for a run.
///
/// Births happen in calendar years `start_year + 1 ..= end_year` of the window,
/// in the parent's anchor month. A birth outside the window is skipped, not
/// deferred. Output order: founders by unit, then calves in creation order.
pub fn generate_herd(params: &SimParams) -> Vec<Animal> {
    let window = params.window();
    let start = params.start();
    let founders = params.units_count * FOUNDERS_PER_UNIT;
    let mut animals: Vec<Animal> = Vec::with_capacity(founders as usize * 4);
    let mut breeders: Vec<Breeder> = Vec::with_capacity(founders as usize * 4);

    for ordinal in 1..=founders {
        let unit = (ordinal - 1) / FOUNDERS_PER_UNIT + 1;
        let slot = ((ordinal - 1) % FOUNDERS_PER_UNIT) as i32;
        let delay = slot * SECOND_FOUNDER_DELAY_MONTHS;
        let acquired = YearMonth::from_absolute(start.absolute() + delay);
        animals.push(Animal::founder(
            AnimalId::new(founder_label(ordinal)),
            unit,
            ordinal,
            acquired,
        ));
        breeders.push(Breeder::founder());
    }

    let years_to_simulate = window.end_year() - params.start_year;
    for year in 1..=years_to_simulate {
        let calendar_year = params.start_year + year;
        let existing = animals.len();
        let mut born = 0u32;
        let mut skipped = 0u32;
        for pos in 0..existing {
            if !breeders[pos].mature {
                continue;
            }
            let parent = &animals[pos];
            let birth = YearMonth::new(calendar_year, parent.anchor().month);
            if !window.contains(birth.absolute()) || birth.absolute() < parent.anchor_month() {
                skipped += 1;
                continue;
            }
            breeders[pos].calves += 1;
            let id = offspring_id(parent, breeders[pos].calves);
            animals.push(Animal::offspring(id, parent, birth));
            breeders.push(Breeder::newborn());
            born += 1;
        }
        for b in &mut breeders {
            b.age_one_year();
        }
        debug!(
            year = calendar_year,
            born,
            skipped,
            herd = animals.len(),
            "simulated breeding year"
        );
    }

    info!(
        units = params.units_count,
        founders,
        calves = animals.len() as u32 - founders,
        "generated herd"
    );
    animals
}
