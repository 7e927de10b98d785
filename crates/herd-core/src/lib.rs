#![deny(warnings)]

//! Core domain models and invariants for the herd projection.
//!
//! This crate defines the serializable types shared by the engine (animals,
//! run parameters, the simulation window), absolute-month calendar helpers,
//! validation of run parameters and generated herds, and a lineage index
//! built once per run.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::RangeInclusive;
use thiserror::Error;
use tracing::debug;

/// Months in a calendar year.
pub const MONTHS_PER_YEAR: i32 = 12;
/// Effective age of a founder on the day it is acquired.
pub const FOUNDER_AGE_YEARS: u32 = 5;
/// Age at which an animal starts breeding.
pub const MATURITY_AGE_YEARS: u32 = 3;
/// The second founder of a unit arrives this many months after the first.
pub const SECOND_FOUNDER_DELAY_MONTHS: i32 = 6;
/// Longest supported projection horizon.
pub const MAX_SIMULATION_YEARS: u32 = 10;
/// Largest number of breeding units accepted for one run.
pub const MAX_UNITS_COUNT: u32 = 1_000;

/// Absolute month number `year * 12 + month`, with `month` in `0..=11`.
pub fn absolute_month(year: i32, month: u32) -> i32 {
    year * MONTHS_PER_YEAR + month as i32
}

/// Last calendar day of a zero-based month, or `None` for an invalid month.
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 11 {
        (year + 1, 1)
    } else {
        (year, month + 2)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// A calendar month. `month` is zero-based (January = 0).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    /// Calendar year.
    pub year: i32,
    /// Zero-based month, 0..=11.
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// Inverse of [`absolute_month`].
    pub fn from_absolute(abs: i32) -> Self {
        Self {
            year: abs.div_euclid(MONTHS_PER_YEAR),
            month: abs.rem_euclid(MONTHS_PER_YEAR) as u32,
        }
    }

    pub fn absolute(self) -> i32 {
        absolute_month(self.year, self.month)
    }

    pub fn last_day(self) -> Option<NaiveDate> {
        last_day_of_month(self.year, self.month)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month + 1)
    }
}

/// Inclusive absolute-month window covered by a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimWindow {
    /// First absolute month of the run.
    pub start: i32,
    /// Last absolute month of the run, inclusive.
    pub end: i32,
}

impl SimWindow {
    /// Window of `years` whole years starting at `(start_year, start_month)`.
    pub fn new(start_year: i32, start_month: u32, years: u32) -> Self {
        let start = absolute_month(start_year, start_month);
        Self {
            start,
            end: start + MONTHS_PER_YEAR * years as i32 - 1,
        }
    }

    pub fn contains(&self, abs: i32) -> bool {
        (self.start..=self.end).contains(&abs)
    }

    pub fn len_months(&self) -> usize {
        (self.end - self.start + 1).max(0) as usize
    }

    pub fn first(&self) -> YearMonth {
        YearMonth::from_absolute(self.start)
    }

    pub fn last(&self) -> YearMonth {
        YearMonth::from_absolute(self.end)
    }

    pub fn start_year(&self) -> i32 {
        self.first().year
    }

    pub fn end_year(&self) -> i32 {
        self.last().year
    }

    /// Cutoff month of the final calendar year.
    pub fn end_month(&self) -> u32 {
        self.last().month
    }

    /// Zero-based offset of `abs` from the window start, if inside.
    pub fn offset_of(&self, abs: i32) -> Option<usize> {
        self.contains(abs).then(|| (abs - self.start) as usize)
    }

    pub fn months(&self) -> impl Iterator<Item = YearMonth> {
        (self.start..=self.end).map(YearMonth::from_absolute)
    }

    /// Calendar years touched by the window, including partial ones.
    pub fn calendar_years(&self) -> RangeInclusive<i32> {
        self.start_year()..=self.end_year()
    }

    /// Months of `year` that fall inside the window.
    pub fn months_in_year(&self, year: i32) -> impl Iterator<Item = YearMonth> {
        let from = absolute_month(year, 0).max(self.start);
        let to = absolute_month(year, 11).min(self.end);
        (from..=to).map(YearMonth::from_absolute)
    }

    /// Last window month inside `year`, used as the year-end snapshot.
    pub fn year_end(&self, year: i32) -> Option<YearMonth> {
        let to = absolute_month(year, 11).min(self.end);
        if to < self.start || to < absolute_month(year, 0) {
            return None;
        }
        Some(YearMonth::from_absolute(to))
    }
}

/// Identifier of a herd member, e.g. "A", "B", "A1", "A1.2".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnimalId(pub String);

impl AnimalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnimalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of a founder within its unit.
///
/// Founders alternate by global ordinal: #1, #3, #5… are first-in-unit and
/// pay the welfare fund from day one; #2, #4, #6… are second-in-unit and get
/// a free period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FounderRole {
    First,
    Second,
}

impl FounderRole {
    pub fn from_ordinal(ordinal: u32) -> Self {
        if ordinal % 2 == 1 {
            FounderRole::First
        } else {
            FounderRole::Second
        }
    }
}

/// One herd member. Immutable once generated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Animal {
    /// Unique label encoding lineage.
    pub id: AnimalId,
    /// 0 for founders, parent's generation + 1 otherwise.
    pub generation: u32,
    /// 1-based breeding unit.
    pub unit: u32,
    /// Founder at the head of this lineage.
    pub root_id: AnimalId,
    /// Parent id; `None` for founders.
    #[serde(default)]
    pub parent_id: Option<AnimalId>,
    /// 1-based ordinal among all founders; founders only.
    #[serde(default)]
    pub founder_ordinal: Option<u32>,
    /// Birth year; implied (`acquisition_year - 5`) for founders.
    pub birth_year: i32,
    /// Zero-based birth month; offspring only.
    #[serde(default)]
    pub birth_month: Option<u32>,
    /// Year the founder joined the herd.
    #[serde(default)]
    pub acquisition_year: Option<i32>,
    /// Zero-based month the founder joined the herd.
    #[serde(default)]
    pub acquisition_month: Option<u32>,
    /// Canonical cycle anchor. Legacy records may lack it.
    #[serde(default)]
    pub absolute_acquisition_month: Option<i32>,
}

impl Animal {
    /// A founder acquired at `acquired`, already five years old.
    pub fn founder(id: AnimalId, unit: u32, ordinal: u32, acquired: YearMonth) -> Self {
        Self {
            root_id: id.clone(),
            id,
            generation: 0,
            unit,
            parent_id: None,
            founder_ordinal: Some(ordinal),
            birth_year: acquired.year - FOUNDER_AGE_YEARS as i32,
            birth_month: None,
            acquisition_year: Some(acquired.year),
            acquisition_month: Some(acquired.month),
            absolute_acquisition_month: Some(acquired.absolute()),
        }
    }

    /// An offspring of `parent` born at `born`.
    pub fn offspring(id: AnimalId, parent: &Animal, born: YearMonth) -> Self {
        Self {
            id,
            generation: parent.generation + 1,
            unit: parent.unit,
            root_id: parent.root_id.clone(),
            parent_id: Some(parent.id.clone()),
            founder_ordinal: None,
            birth_year: born.year,
            birth_month: Some(born.month),
            acquisition_year: None,
            acquisition_month: None,
            absolute_acquisition_month: Some(born.absolute()),
        }
    }

    pub fn is_founder(&self) -> bool {
        self.generation == 0
    }

    /// Role inside the unit; `None` for offspring.
    pub fn founder_role(&self) -> Option<FounderRole> {
        if !self.is_founder() {
            return None;
        }
        self.founder_ordinal.map(FounderRole::from_ordinal)
    }

    /// Month used as the birth month for age computation.
    pub fn effective_birth_month(&self) -> u32 {
        self.birth_month.or(self.acquisition_month).unwrap_or(0)
    }

    /// Absolute anchor month for cycle math.
    ///
    /// Falls back to the acquisition pair, then the birth pair, for records
    /// without `absolute_acquisition_month`.
    pub fn anchor_month(&self) -> i32 {
        if let Some(abs) = self.absolute_acquisition_month {
            return abs;
        }
        match (self.acquisition_year, self.acquisition_month) {
            (Some(year), Some(month)) => absolute_month(year, month),
            _ => absolute_month(self.birth_year, self.effective_birth_month()),
        }
    }

    pub fn anchor(&self) -> YearMonth {
        YearMonth::from_absolute(self.anchor_month())
    }

    /// Signed months elapsed since the anchor; negative before it.
    pub fn months_since_anchor(&self, year: i32, month: u32) -> i32 {
        absolute_month(year, month) - self.anchor_month()
    }

    /// Whether the animal has been acquired or born by `(year, month)`.
    pub fn is_present(&self, year: i32, month: u32) -> bool {
        self.months_since_anchor(year, month) >= 0
    }
}

/// Age in whole months at `(year, month)`, clamped at zero.
pub fn age_in_months(animal: &Animal, year: i32, month: u32) -> u32 {
    let born = absolute_month(animal.birth_year, animal.effective_birth_month());
    (absolute_month(year, month) - born).max(0) as u32
}

/// Input parameters of a projection run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Breeding units bought at the start, two founders each.
    pub units_count: u32,
    /// Calendar year of the first window month.
    pub start_year: i32,
    /// Zero-based start month.
    pub start_month: u32,
    /// Day of the start month; only checked for existence.
    pub start_day: u32,
    /// Horizon in whole years, 1..=10.
    pub simulation_years: u32,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            units_count: 1,
            start_year: 2026,
            start_month: 0,
            start_day: 1,
            simulation_years: MAX_SIMULATION_YEARS,
        }
    }
}

impl SimParams {
    pub fn start(&self) -> YearMonth {
        YearMonth::new(self.start_year, self.start_month)
    }

    pub fn window(&self) -> SimWindow {
        SimWindow::new(self.start_year, self.start_month, self.simulation_years)
    }

    /// Calendar start date, if the day exists in the start month.
    pub fn start_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.start_year, self.start_month + 1, self.start_day)
    }
}

/// Validation errors for run parameters and generated herds.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// At least one breeding unit is required.
    #[error("units count must be at least 1")]
    NoUnits,
    /// More units than a single run supports.
    #[error("units count {0} is out of supported range [1, 1000]")]
    UnitsOutOfRange(u32),
    /// Horizon outside [1, 10] years.
    #[error("simulation years {0} is out of supported range [1, 10]")]
    YearsOutOfRange(u32),
    /// Year outside supported range [1970, 2100].
    #[error("year {0} is out of supported range [1970, 2100]")]
    YearOutOfRange(i32),
    /// Month must be zero-based, 0..=11.
    #[error("month {0} is invalid (expected 0..=11)")]
    InvalidMonth(u32),
    /// Day does not exist in the start month.
    #[error("day {day} does not exist in {year}-{month:02}")]
    InvalidDay { year: i32, month: u32, day: u32 },
    /// Two animals share an id.
    #[error("duplicate animal id: {0}")]
    DuplicateId(String),
    /// Offspring refers to a parent that is not in the herd.
    #[error("parent not found for animal {0}")]
    ParentNotFound(String),
    /// Offspring disagrees with its parent on unit, root or generation.
    #[error("animal {0} does not belong to its parent's lineage")]
    LineageMismatch(String),
    /// Offspring anchored before its parent.
    #[error("animal {0} is anchored before its parent")]
    BornBeforeParent(String),
}

/// Validate run parameters before a projection starts.
pub fn validate_params(p: &SimParams) -> Result<(), ValidationError> {
    if p.units_count == 0 {
        return Err(ValidationError::NoUnits);
    }
    if p.units_count > MAX_UNITS_COUNT {
        return Err(ValidationError::UnitsOutOfRange(p.units_count));
    }
    if !(1..=MAX_SIMULATION_YEARS).contains(&p.simulation_years) {
        return Err(ValidationError::YearsOutOfRange(p.simulation_years));
    }
    if !(1970..=2100).contains(&p.start_year) {
        return Err(ValidationError::YearOutOfRange(p.start_year));
    }
    if p.start_month > 11 {
        return Err(ValidationError::InvalidMonth(p.start_month));
    }
    if p.start_date().is_none() {
        return Err(ValidationError::InvalidDay {
            year: p.start_year,
            month: p.start_month + 1,
            day: p.start_day,
        });
    }
    Ok(())
}

/// Lineage index built once per run.
///
/// Maps ids to herd positions, parents to children, founders to their
/// lineage and units to their members. Position lists keep herd order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct HerdIndex {
    positions: BTreeMap<AnimalId, usize>,
    children: BTreeMap<AnimalId, Vec<AnimalId>>,
    lineages: BTreeMap<AnimalId, Vec<usize>>,
    units: BTreeMap<u32, Vec<usize>>,
}

impl HerdIndex {
    /// Build the index in a single pass. Later duplicates are ignored here;
    /// [`validate_herd`] reports them.
    pub fn build(animals: &[Animal]) -> Self {
        let mut index = HerdIndex::default();
        for (pos, a) in animals.iter().enumerate() {
            index.positions.entry(a.id.clone()).or_insert(pos);
            index
                .lineages
                .entry(a.root_id.clone())
                .or_default()
                .push(pos);
            index.units.entry(a.unit).or_default().push(pos);
            if let Some(parent) = &a.parent_id {
                index
                    .children
                    .entry(parent.clone())
                    .or_default()
                    .push(a.id.clone());
            }
        }
        debug!(
            animals = animals.len(),
            lineages = index.lineages.len(),
            units = index.units.len(),
            "built herd index"
        );
        index
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn position(&self, id: &AnimalId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn get<'a>(&self, animals: &'a [Animal], id: &AnimalId) -> Option<&'a Animal> {
        self.position(id).and_then(|pos| animals.get(pos))
    }

    /// Direct children in birth order.
    pub fn children(&self, id: &AnimalId) -> &[AnimalId] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All descendants of `id`, depth-first, excluding `id` itself.
    pub fn descendants(&self, id: &AnimalId) -> Vec<AnimalId> {
        let mut out = Vec::new();
        let mut stack: Vec<&AnimalId> = self.children(id).iter().rev().collect();
        while let Some(next) = stack.pop() {
            out.push(next.clone());
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    /// Positions of every animal in a founder's lineage, the founder included.
    pub fn lineage(&self, root: &AnimalId) -> &[usize] {
        self.lineages.get(root).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Positions of every animal in a breeding unit.
    pub fn unit_members(&self, unit: u32) -> &[usize] {
        self.units.get(&unit).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Validate herd invariants: unique ids and consistent parent links.
pub fn validate_herd(animals: &[Animal]) -> Result<(), ValidationError> {
    let mut seen: BTreeSet<&AnimalId> = BTreeSet::new();
    for a in animals {
        if !seen.insert(&a.id) {
            return Err(ValidationError::DuplicateId(a.id.0.clone()));
        }
    }
    let index = HerdIndex::build(animals);
    for a in animals {
        let Some(parent_id) = &a.parent_id else {
            if !a.is_founder() || a.root_id != a.id {
                return Err(ValidationError::LineageMismatch(a.id.0.clone()));
            }
            continue;
        };
        let parent = index
            .get(animals, parent_id)
            .ok_or_else(|| ValidationError::ParentNotFound(a.id.0.clone()))?;
        if parent.unit != a.unit
            || parent.root_id != a.root_id
            || parent.generation + 1 != a.generation
        {
            return Err(ValidationError::LineageMismatch(a.id.0.clone()));
        }
        if a.anchor_month() < parent.anchor_month() {
            return Err(ValidationError::BornBeforeParent(a.id.0.clone()));
        }
    }
    Ok(())
}
