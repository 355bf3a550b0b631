use crate::data::HEADER;
use crate::error::ExportError;
use crate::store::RankEntry;
use crate::types::{Country, Gender, Indicator, Observation};
use csv::WriterBuilder;
use std::io::Write;

/// Writes rows in the loader's own layout, so the output can be read back in.
pub fn write_observations<W: Write>(writer: W, rows: &[Observation]) -> Result<(), ExportError> {
    // Header written by hand so an empty result still gets one.
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(HEADER)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_ranking<W: Write>(
    writer: W,
    indicator: Indicator,
    entries: &[RankEntry],
) -> Result<(), ExportError> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(["Rank".to_string(), "Country".to_string(), ranking_value_column(indicator)])?;
    for entry in entries {
        wtr.serialize((entry.rank, entry.country, entry.value))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn observations_to_csv(rows: &[Observation]) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_observations(&mut buf, rows)?;
    Ok(String::from_utf8(buf)?)
}

pub fn ranking_to_csv(indicator: Indicator, entries: &[RankEntry]) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_ranking(&mut buf, indicator, entries)?;
    Ok(String::from_utf8(buf)?)
}

/// Value column of a ranking export: the indicator's display name plus ` (%)`.
pub fn ranking_value_column(indicator: Indicator) -> String {
    format!("{} (%)", indicator)
}

pub fn chart_data_file_name(indicator: Indicator, year: u16, gender: Gender) -> String {
    format!("{}_{}_{}.csv", indicator, year, gender)
}

pub fn country_data_file_name(country: Country) -> String {
    format!("{}_digital_inclusion_data.csv", country)
}

pub fn comparison_file_name(indicator: Indicator, year: u16) -> String {
    format!("comparison_{}_{}.csv", indicator, year)
}

pub fn ranking_file_name(indicator: Indicator, year: u16, gender: Gender) -> String {
    format!("ranking_{}_{}_{}.csv", indicator, year, gender)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;
    use crate::data::read_observations;
    use crate::sample::SampleSource;
    use crate::store::{Criteria, ObservationStore};

    fn sorted(mut rows: Vec<Observation>) -> Vec<Observation> {
        rows.sort_by(|a, b| {
            (a.country, a.year, a.indicator, a.gender)
                .cmp(&(b.country, b.year, b.indicator, b.gender))
                .then(a.value.total_cmp(&b.value))
        });
        rows
    }

    #[test]
    fn test_raw_export_layout() {
        let rows = vec![
            Observation {
                country: Country::Singapore,
                year: 2023,
                indicator: Indicator::InternetUsage,
                gender: Gender::All,
                value: 95.0,
            },
            Observation {
                country: Country::PapuaNewGuinea,
                year: 2023,
                indicator: Indicator::InternetUsage,
                gender: Gender::Female,
                value: 12.3,
            },
        ];

        assert_eq!(
            observations_to_csv(&rows).unwrap(),
            "Country,Year,Indicator,Gender,Value\n\
             Singapore,2023,Internet Usage (%),all,95.0\n\
             Papua New Guinea,2023,Internet Usage (%),female,12.3\n"
        );
    }

    #[test]
    fn test_empty_export_keeps_header() {
        assert_eq!(
            observations_to_csv(&[]).unwrap(),
            "Country,Year,Indicator,Gender,Value\n"
        );
    }

    #[test]
    fn test_ranking_export_layout() {
        let entries = vec![
            RankEntry {
                rank: 1,
                country: Country::Singapore,
                value: 95.0,
            },
            RankEntry {
                rank: 2,
                country: Country::TimorLeste,
                value: 40.5,
            },
        ];

        assert_eq!(
            ranking_to_csv(Indicator::InternetUsage, &entries).unwrap(),
            "Rank,Country,Internet Usage (%) (%)\n1,Singapore,95.0\n2,Timor-Leste,40.5\n"
        );
    }

    #[test]
    fn test_filter_export_round_trip() {
        let store = ObservationStore::load(&SampleSource::new(GeneratorConfig::default())).unwrap();
        let criteria = Criteria::new()
            .year(2021)
            .countries([Country::Laos, Country::Singapore, Country::TimorLeste]);
        let rows = store.filter(&criteria);
        assert_eq!(rows.len(), 54);

        let csv = observations_to_csv(&rows).unwrap();
        let parsed = read_observations(csv.as_bytes()).unwrap();
        assert_eq!(sorted(parsed), sorted(rows));
    }

    #[test]
    fn test_file_names() {
        assert_eq!(
            chart_data_file_name(Indicator::DigitalBanking, 2023, Gender::Female),
            "Digital Banking (%)_2023_female.csv"
        );
        assert_eq!(
            country_data_file_name(Country::TimorLeste),
            "Timor-Leste_digital_inclusion_data.csv"
        );
        assert_eq!(
            comparison_file_name(Indicator::IctEmployment, 2020),
            "comparison_ICT Employment (%)_2020.csv"
        );
        assert_eq!(
            ranking_file_name(Indicator::OnlineShopping, 2019, Gender::All),
            "ranking_Online Shopping (%)_2019_all.csv"
        );
    }
}
