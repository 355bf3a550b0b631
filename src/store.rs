use crate::data::ObservationSource;
use crate::error::{DataLoadError, NotFoundError};
use crate::types::{country_locations, Country, CountryLocation, Gender, Indicator, Observation};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Filter criteria. Criteria are ANDed; `None` matches everything.
///
/// `countries: Some(empty)` matches nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    pub year: Option<u16>,
    pub gender: Option<Gender>,
    pub countries: Option<BTreeSet<Country>>,
    pub indicator: Option<Indicator>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn year(mut self, year: u16) -> Self {
        self.year = Some(year);
        self
    }

    pub fn gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    pub fn countries(mut self, countries: impl IntoIterator<Item = Country>) -> Self {
        self.countries = Some(countries.into_iter().collect());
        self
    }

    pub fn indicator(mut self, indicator: Indicator) -> Self {
        self.indicator = Some(indicator);
        self
    }

    pub fn matches(&self, obs: &Observation) -> bool {
        self.year.map_or(true, |y| obs.year == y)
            && self.gender.map_or(true, |g| obs.gender == g)
            && self.indicator.map_or(true, |i| obs.indicator == i)
            && self
                .countries
                .as_ref()
                .map_or(true, |set| set.contains(&obs.country))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CountryAverage {
    pub country: Country,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub year: u16,
    pub country: Country,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankEntry {
    pub rank: usize,
    pub country: Country,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearlyAverage {
    pub year: u16,
    pub indicator: Indicator,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapPoint {
    pub country: Country,
    pub indicator: Indicator,
    pub value: f64,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenderTrendPoint {
    pub year: u16,
    pub gender: Gender,
    pub value: f64,
}

/// A radar chart cell. Serializes as a number, or `null` when missing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RadarCell {
    Observed(f64),
    Missing,
}

impl RadarCell {
    pub fn value(self) -> Option<f64> {
        match self {
            RadarCell::Observed(v) => Some(v),
            RadarCell::Missing => None,
        }
    }
}

/// Country-by-indicator matrix. Every requested country has a row and every
/// row has all indicator columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadarPivot {
    pub year: u16,
    pub gender: Gender,
    pub rows: BTreeMap<Country, BTreeMap<Indicator, RadarCell>>,
}

impl RadarPivot {
    pub fn cell(&self, country: Country, indicator: Indicator) -> Option<RadarCell> {
        self.rows.get(&country).and_then(|row| row.get(&indicator)).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairComparison {
    pub indicator: Indicator,
    pub year: u16,
    pub gender: Gender,
    pub first: Country,
    pub first_value: f64,
    pub second: Country,
    pub second_value: f64,
    /// `second_value - first_value`
    pub difference: f64,
    pub gap: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Advantage {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenderGap {
    /// Mean male value minus mean female value.
    pub points: f64,
    pub advantage: Advantage,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorValue {
    pub indicator: Indicator,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryProfile {
    pub country: Country,
    pub latest_year: u16,
    pub values: BTreeMap<Gender, Vec<IndicatorValue>>,
    pub average_all: Option<f64>,
    pub gender_gap: Option<GenderGap>,
    pub strongest: Option<Indicator>,
    pub weakest: Option<Indicator>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    sum: f64,
    count: usize,
}

impl Accumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    // Only ever called on groups that received at least one value.
    fn mean(self) -> f64 {
        self.sum / self.count as f64
    }
}

fn note_empty(query: &str, len: usize) {
    if len == 0 {
        debug!(query, "query matched no observations");
    }
}

#[derive(Debug, Clone)]
pub struct ObservationStore {
    observations: Vec<Observation>,
    locations: BTreeMap<Country, CountryLocation>,
}

impl ObservationStore {
    /// Builds a store with the standard country locations.
    pub fn new(observations: Vec<Observation>) -> Result<Self, DataLoadError> {
        Self::with_locations(observations, country_locations())
    }

    pub fn with_locations(
        observations: Vec<Observation>,
        locations: Vec<CountryLocation>,
    ) -> Result<Self, DataLoadError> {
        if observations.is_empty() {
            return Err(DataLoadError::Empty("observation table".to_string()));
        }
        if let Some(bad) = observations.iter().find(|o| !(0.0..=100.0).contains(&o.value)) {
            return Err(DataLoadError::OutOfRange {
                context: format!("{} {} {} {}", bad.country, bad.year, bad.indicator, bad.gender),
                value: bad.value,
            });
        }

        // One row per (country, year, indicator, gender); every query relies on it.
        let mut seen = HashSet::with_capacity(observations.len());
        if let Some(dup) = observations
            .iter()
            .find(|o| !seen.insert((o.country, o.year, o.indicator, o.gender)))
        {
            return Err(DataLoadError::Duplicate {
                country: dup.country,
                year: dup.year,
                indicator: dup.indicator,
                gender: dup.gender,
            });
        }

        let locations = locations.into_iter().map(|l| (l.country, l)).collect();
        Ok(Self {
            observations,
            locations,
        })
    }

    pub fn load(source: &dyn ObservationSource) -> Result<Self, DataLoadError> {
        let observations = source.load()?;
        let store = Self::new(observations)?;
        info!(source = %source.describe(), observations = store.len(), "Observation store ready");
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn filter(&self, criteria: &Criteria) -> Vec<Observation> {
        let rows: Vec<Observation> = self
            .observations
            .iter()
            .filter(|o| criteria.matches(o))
            .copied()
            .collect();
        note_empty("filter", rows.len());
        rows
    }

    /// Mean value per indicator. Indicators without matching rows are omitted.
    pub fn average_by_indicator(&self, criteria: &Criteria) -> BTreeMap<Indicator, f64> {
        let mut groups: BTreeMap<Indicator, Accumulator> = BTreeMap::new();
        for obs in self.observations.iter().filter(|o| criteria.matches(o)) {
            groups.entry(obs.indicator).or_default().add(obs.value);
        }
        note_empty("average_by_indicator", groups.len());
        groups.into_iter().map(|(k, acc)| (k, acc.mean())).collect()
    }

    /// Mean value per country, highest first; equal means in country-name order.
    pub fn average_by_country(&self, criteria: &Criteria) -> Vec<CountryAverage> {
        let mut groups: BTreeMap<Country, Accumulator> = BTreeMap::new();
        for obs in self.observations.iter().filter(|o| criteria.matches(o)) {
            groups.entry(obs.country).or_default().add(obs.value);
        }

        let mut averages: Vec<CountryAverage> = groups
            .into_iter()
            .map(|(country, acc)| CountryAverage {
                country,
                value: acc.mean(),
            })
            .collect();
        averages.sort_by(|a, b| b.value.total_cmp(&a.value).then(a.country.cmp(&b.country)));
        note_empty("average_by_country", averages.len());
        averages
    }

    /// Time series for the given countries. An empty set yields an empty series.
    pub fn trend(
        &self,
        indicator: Indicator,
        countries: &BTreeSet<Country>,
        gender: Gender,
    ) -> Vec<TrendPoint> {
        if countries.is_empty() {
            return Vec::new();
        }

        let mut points: Vec<TrendPoint> = self
            .observations
            .iter()
            .filter(|o| o.indicator == indicator && o.gender == gender && countries.contains(&o.country))
            .map(|o| TrendPoint {
                year: o.year,
                country: o.country,
                value: o.value,
            })
            .collect();
        points.sort_by_key(|p| (p.year, p.country));
        note_empty("trend", points.len());
        points
    }

    /// Country-by-indicator matrix for one year.
    pub fn pivot_for_radar(
        &self,
        year: u16,
        countries: &BTreeSet<Country>,
        gender: Gender,
    ) -> RadarPivot {
        let cells: BTreeMap<(Country, Indicator), f64> = self
            .observations
            .iter()
            .filter(|o| o.year == year && o.gender == gender && countries.contains(&o.country))
            .map(|o| ((o.country, o.indicator), o.value))
            .collect();
        note_empty("pivot_for_radar", cells.len());

        let rows = countries
            .iter()
            .map(|&country| {
                let row = Indicator::ALL
                    .into_iter()
                    .map(|indicator| {
                        let cell = cells
                            .get(&(country, indicator))
                            .map_or(RadarCell::Missing, |&v| RadarCell::Observed(v));
                        (indicator, cell)
                    })
                    .collect();
                (country, row)
            })
            .collect();

        RadarPivot { year, gender, rows }
    }

    /// Sequential ranking: ties get distinct ranks in country-name order.
    /// `countries: None` ranks every country.
    pub fn rank(
        &self,
        indicator: Indicator,
        year: u16,
        gender: Gender,
        countries: Option<&BTreeSet<Country>>,
    ) -> Vec<RankEntry> {
        let mut rows: Vec<&Observation> = self
            .observations
            .iter()
            .filter(|o| o.indicator == indicator && o.year == year && o.gender == gender)
            .filter(|o| countries.map_or(true, |set| set.contains(&o.country)))
            .collect();
        rows.sort_by(|a, b| b.value.total_cmp(&a.value).then(a.country.cmp(&b.country)));
        note_empty("rank", rows.len());

        rows.into_iter()
            .enumerate()
            .map(|(i, o)| RankEntry {
                rank: i + 1,
                country: o.country,
                value: o.value,
            })
            .collect()
    }

    pub fn lookup_coordinates(&self, country: &str) -> Result<(f64, f64), NotFoundError> {
        self.coordinates(country.parse()?)
    }

    pub fn coordinates(&self, country: Country) -> Result<(f64, f64), NotFoundError> {
        self.locations
            .get(&country)
            .map(|l| (l.latitude, l.longitude))
            .ok_or_else(|| NotFoundError::location(country.name()))
    }

    /// Mean per (year, indicator) for the dashboard trend lines.
    pub fn yearly_indicator_averages(
        &self,
        gender: Gender,
        countries: &BTreeSet<Country>,
    ) -> Vec<YearlyAverage> {
        let mut groups: BTreeMap<(u16, Indicator), Accumulator> = BTreeMap::new();
        for obs in &self.observations {
            if obs.gender == gender && countries.contains(&obs.country) {
                groups.entry((obs.year, obs.indicator)).or_default().add(obs.value);
            }
        }
        note_empty("yearly_indicator_averages", groups.len());

        groups
            .into_iter()
            .map(|((year, indicator), acc)| YearlyAverage {
                year,
                indicator,
                value: acc.mean(),
            })
            .collect()
    }

    /// Observations for one indicator/year/gender, placed on the map.
    pub fn map_points(
        &self,
        indicator: Indicator,
        year: u16,
        gender: Gender,
    ) -> Result<Vec<MapPoint>, NotFoundError> {
        let criteria = Criteria::new().indicator(indicator).year(year).gender(gender);
        self.filter(&criteria)
            .into_iter()
            .map(|o| {
                let (latitude, longitude) = self.coordinates(o.country)?;
                Ok(MapPoint {
                    country: o.country,
                    indicator: o.indicator,
                    value: o.value,
                    latitude,
                    longitude,
                })
            })
            .collect()
    }

    pub fn compare_pair(
        &self,
        indicator: Indicator,
        year: u16,
        gender: Gender,
        first: Country,
        second: Country,
    ) -> Option<PairComparison> {
        let value_of = |country: Country| {
            self.observations
                .iter()
                .find(|o| {
                    o.country == country && o.indicator == indicator && o.year == year && o.gender == gender
                })
                .map(|o| o.value)
        };

        let first_value = value_of(first)?;
        let second_value = value_of(second)?;
        let difference = second_value - first_value;
        Some(PairComparison {
            indicator,
            year,
            gender,
            first,
            first_value,
            second,
            second_value,
            difference,
            gap: difference.abs(),
        })
    }

    /// Summary of a country's most recent year. `None` if it has no data.
    pub fn country_profile(&self, country: Country) -> Option<CountryProfile> {
        let latest_year = self
            .observations
            .iter()
            .filter(|o| o.country == country)
            .map(|o| o.year)
            .max()?;

        let latest: Vec<&Observation> = self
            .observations
            .iter()
            .filter(|o| o.country == country && o.year == latest_year)
            .collect();

        let mut values: BTreeMap<Gender, Vec<IndicatorValue>> = BTreeMap::new();
        let mut by_gender: BTreeMap<Gender, Accumulator> = BTreeMap::new();
        for obs in &latest {
            values.entry(obs.gender).or_default().push(IndicatorValue {
                indicator: obs.indicator,
                value: obs.value,
            });
            by_gender.entry(obs.gender).or_default().add(obs.value);
        }

        let mean_of = |g: Gender| by_gender.get(&g).map(|acc| acc.mean());
        let gender_gap = match (mean_of(Gender::Male), mean_of(Gender::Female)) {
            (Some(male), Some(female)) => {
                let points = male - female;
                Some(GenderGap {
                    points,
                    advantage: if points > 0.0 { Advantage::Male } else { Advantage::Female },
                })
            }
            _ => None,
        };

        let all_rows = values.get(&Gender::All).map(Vec::as_slice).unwrap_or(&[]);
        let mut strongest: Option<&IndicatorValue> = None;
        let mut weakest: Option<&IndicatorValue> = None;
        for iv in all_rows {
            if strongest.map_or(true, |s| iv.value > s.value) {
                strongest = Some(iv);
            }
            if weakest.map_or(true, |w| iv.value < w.value) {
                weakest = Some(iv);
            }
        }

        Some(CountryProfile {
            country,
            latest_year,
            average_all: mean_of(Gender::All),
            gender_gap,
            strongest: strongest.map(|iv| iv.indicator),
            weakest: weakest.map(|iv| iv.indicator),
            values,
        })
    }

    /// One country's series for an indicator across all genders.
    pub fn country_trend(&self, country: Country, indicator: Indicator) -> Vec<GenderTrendPoint> {
        let mut points: Vec<GenderTrendPoint> = self
            .observations
            .iter()
            .filter(|o| o.country == country && o.indicator == indicator)
            .map(|o| GenderTrendPoint {
                year: o.year,
                gender: o.gender,
                value: o.value,
            })
            .collect();
        points.sort_by_key(|p| (p.year, p.gender));
        points
    }

    /// Distinct years, newest first.
    pub fn years(&self) -> Vec<u16> {
        let years: BTreeSet<u16> = self.observations.iter().map(|o| o.year).collect();
        years.into_iter().rev().collect()
    }

    pub fn countries(&self) -> Vec<Country> {
        let countries: BTreeSet<Country> = self.observations.iter().map(|o| o.country).collect();
        countries.into_iter().collect()
    }

    pub fn indicators(&self) -> Vec<Indicator> {
        let indicators: BTreeSet<Indicator> = self.observations.iter().map(|o| o.indicator).collect();
        indicators.into_iter().collect()
    }
}

/// Shared, swappable reference to the current store.
///
/// Readers take a snapshot and query it without holding the lock; a reload
/// replaces the whole table at once.
pub struct StoreHandle {
    current: RwLock<Arc<ObservationStore>>,
}

impl StoreHandle {
    pub fn new(store: ObservationStore) -> Self {
        Self {
            current: RwLock::new(Arc::new(store)),
        }
    }

    pub fn snapshot(&self) -> Arc<ObservationStore> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Swaps in a new table, returning the previous one.
    pub fn replace(&self, store: ObservationStore) -> Arc<ObservationStore> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(store))
    }

    /// Rebuilds from `source`. On failure the current table stays in place.
    pub fn reload(&self, source: &dyn ObservationSource) -> Result<usize, DataLoadError> {
        let store = ObservationStore::load(source)?;
        let count = store.len();
        self.replace(store);
        Ok(count)
    }
}
