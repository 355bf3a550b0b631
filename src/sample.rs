use crate::config::GeneratorConfig;
use crate::data::ObservationSource;
use crate::error::DataLoadError;
use crate::types::{Country, Gender, Indicator, Observation};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::info;

/// Placeholder for real ingestion: seeded random values in plausible ranges.
pub struct SampleSource {
    config: GeneratorConfig,
}

impl SampleSource {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }
}

impl ObservationSource for SampleSource {
    fn describe(&self) -> String {
        format!("sample generator (seed {})", self.config.seed)
    }

    fn load(&self) -> Result<Vec<Observation>, DataLoadError> {
        let observations = generate(&self.config);
        if observations.is_empty() {
            return Err(DataLoadError::Empty(self.describe()));
        }
        Ok(observations)
    }
}

// (min, max) for male, female, all
fn ranges(indicator: Indicator) -> [(f64, f64); 3] {
    match indicator {
        Indicator::InternetUsage => [(60.0, 95.0), (55.0, 92.0), (57.0, 93.0)],
        Indicator::MobilePhoneOwnership => [(70.0, 98.0), (65.0, 96.0), (67.0, 97.0)],
        Indicator::DigitalLiteracy => [(45.0, 85.0), (40.0, 82.0), (42.0, 83.0)],
        Indicator::IctEmployment => [(15.0, 35.0), (10.0, 30.0), (12.0, 32.0)],
        Indicator::OnlineShopping => [(30.0, 70.0), (35.0, 75.0), (32.0, 72.0)],
        Indicator::DigitalBanking => [(25.0, 80.0), (20.0, 78.0), (22.0, 79.0)],
    }
}

const GENDER_ORDER: [Gender; 3] = [Gender::Male, Gender::Female, Gender::All];

pub fn generate(config: &GeneratorConfig) -> Vec<Observation> {
    info!(seed = config.seed, years = config.years.len(), "Generating sample observations");

    // Each country draws from its own seeded RNG so the output is identical
    // regardless of how rayon schedules the work.
    let observations: Vec<Observation> = Country::ALL
        .par_iter()
        .enumerate()
        .flat_map_iter(|(idx, &country)| {
            let mut rng = StdRng::seed_from_u64(
                config.seed ^ (idx as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15),
            );
            generate_for_country(config, country, &mut rng)
        })
        .collect();

    info!(count = observations.len(), "Generated sample observations");
    observations
}

fn generate_for_country(config: &GeneratorConfig, country: Country, rng: &mut StdRng) -> Vec<Observation> {
    let mut rows = Vec::with_capacity(config.years.len() * Indicator::ALL.len() * GENDER_ORDER.len());

    for &year in &config.years {
        for indicator in Indicator::ALL {
            let bounds = ranges(indicator);
            for (gender, (min_val, max_val)) in GENDER_ORDER.into_iter().zip(bounds) {
                let value = match country {
                    Country::Singapore => rng.gen_range(max_val - 10.0..max_val),
                    Country::Cambodia | Country::Laos | Country::Myanmar => {
                        rng.gen_range(min_val..min_val + 20.0)
                    }
                    _ => rng.gen_range(min_val..max_val),
                };

                rows.push(Observation {
                    country,
                    year,
                    indicator,
                    gender,
                    value: (value * 10.0).round() / 10.0,
                });
            }
        }
    }

    rows
}
