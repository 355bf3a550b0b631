use crate::error::NotFoundError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Countries covered by the dashboard.
///
/// Variants are declared in display-name order so the derived `Ord` sorts
/// countries alphabetically by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Country {
    Brunei,
    Cambodia,
    Indonesia,
    Laos,
    Malaysia,
    Myanmar,
    #[serde(rename = "Papua New Guinea")]
    PapuaNewGuinea,
    Philippines,
    Singapore,
    Thailand,
    #[serde(rename = "Timor-Leste")]
    TimorLeste,
    Vietnam,
}

impl Country {
    pub const ALL: [Country; 12] = [
        Country::Brunei,
        Country::Cambodia,
        Country::Indonesia,
        Country::Laos,
        Country::Malaysia,
        Country::Myanmar,
        Country::PapuaNewGuinea,
        Country::Philippines,
        Country::Singapore,
        Country::Thailand,
        Country::TimorLeste,
        Country::Vietnam,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Country::Brunei => "Brunei",
            Country::Cambodia => "Cambodia",
            Country::Indonesia => "Indonesia",
            Country::Laos => "Laos",
            Country::Malaysia => "Malaysia",
            Country::Myanmar => "Myanmar",
            Country::PapuaNewGuinea => "Papua New Guinea",
            Country::Philippines => "Philippines",
            Country::Singapore => "Singapore",
            Country::Thailand => "Thailand",
            Country::TimorLeste => "Timor-Leste",
            Country::Vietnam => "Vietnam",
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Country {
    type Err = NotFoundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Country::ALL
            .into_iter()
            .find(|c| c.name() == s.trim())
            .ok_or_else(|| NotFoundError::country(s))
    }
}

/// Digital-inclusion indicators, each a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Indicator {
    #[serde(rename = "Internet Usage (%)")]
    InternetUsage,
    #[serde(rename = "Mobile Phone Ownership (%)")]
    MobilePhoneOwnership,
    #[serde(rename = "Digital Literacy (%)")]
    DigitalLiteracy,
    #[serde(rename = "ICT Employment (%)")]
    IctEmployment,
    #[serde(rename = "Online Shopping (%)")]
    OnlineShopping,
    #[serde(rename = "Digital Banking (%)")]
    DigitalBanking,
}

impl Indicator {
    pub const ALL: [Indicator; 6] = [
        Indicator::InternetUsage,
        Indicator::MobilePhoneOwnership,
        Indicator::DigitalLiteracy,
        Indicator::IctEmployment,
        Indicator::OnlineShopping,
        Indicator::DigitalBanking,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Indicator::InternetUsage => "Internet Usage (%)",
            Indicator::MobilePhoneOwnership => "Mobile Phone Ownership (%)",
            Indicator::DigitalLiteracy => "Digital Literacy (%)",
            Indicator::IctEmployment => "ICT Employment (%)",
            Indicator::OnlineShopping => "Online Shopping (%)",
            Indicator::DigitalBanking => "Digital Banking (%)",
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Indicator {
    type Err = NotFoundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Indicator::ALL
            .into_iter()
            .find(|i| i.name() == s.trim())
            .ok_or_else(|| NotFoundError::indicator(s))
    }
}

/// Pre-aggregated gender partition of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    All,
    Male,
    Female,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::All, Gender::Male, Gender::Female];

    pub fn name(self) -> &'static str {
        match self {
            Gender::All => "all",
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Gender {
    type Err = NotFoundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gender::ALL
            .into_iter()
            .find(|g| g.name() == s.trim())
            .ok_or_else(|| NotFoundError::gender(s))
    }
}

/// One data point. Field names double as the CSV export header.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    #[serde(rename = "Country")]
    pub country: Country,
    #[serde(rename = "Year")]
    pub year: u16,
    #[serde(rename = "Indicator")]
    pub indicator: Indicator,
    #[serde(rename = "Gender")]
    pub gender: Gender,
    #[serde(rename = "Value")]
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CountryLocation {
    pub country: Country,
    pub latitude: f64,
    pub longitude: f64,
}

/// Reference coordinates used to place countries on the map.
pub fn country_locations() -> Vec<CountryLocation> {
    [
        (Country::Brunei, 4.5353, 114.7277),
        (Country::Cambodia, 12.5657, 104.9910),
        (Country::Indonesia, -0.7893, 113.9213),
        (Country::Laos, 19.8563, 102.4955),
        (Country::Malaysia, 4.2105, 101.9758),
        (Country::Myanmar, 21.9162, 95.9560),
        (Country::Philippines, 12.8797, 121.7740),
        (Country::Singapore, 1.3521, 103.8198),
        (Country::Thailand, 15.8700, 100.9925),
        (Country::Vietnam, 14.0583, 108.2772),
        (Country::PapuaNewGuinea, -6.3150, 143.9555),
        (Country::TimorLeste, -8.8742, 125.7275),
    ]
    .into_iter()
    .map(|(country, latitude, longitude)| CountryLocation {
        country,
        latitude,
        longitude,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_order_follows_names() {
        let mut by_name = Country::ALL.to_vec();
        by_name.sort_by_key(|c| c.name());
        assert_eq!(by_name, Country::ALL.to_vec());

        let mut derived = Country::ALL.to_vec();
        derived.reverse();
        derived.sort();
        assert_eq!(derived, by_name);
    }

    #[test]
    fn test_parse_known_members() {
        assert_eq!("Timor-Leste".parse::<Country>().unwrap(), Country::TimorLeste);
        assert_eq!(
            " ICT Employment (%) ".parse::<Indicator>().unwrap(),
            Indicator::IctEmployment
        );
        assert_eq!("female".parse::<Gender>().unwrap(), Gender::Female);
    }

    #[test]
    fn test_parse_unknown_members() {
        let err = "Atlantis".parse::<Country>().unwrap_err();
        assert_eq!(err.to_string(), "unknown country \"Atlantis\"");
        assert!("Internet Usage".parse::<Indicator>().is_err());
        assert!("All".parse::<Gender>().is_err());
    }

    #[test]
    fn test_every_country_has_a_location() {
        let locations = country_locations();
        assert_eq!(locations.len(), Country::ALL.len());
        for country in Country::ALL {
            assert!(locations.iter().any(|l| l.country == country));
        }
    }
}
