use crate::types::Country;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Page {
    #[default]
    Dashboard,
    #[serde(rename = "ASEAN Map")]
    AseanMap,
    #[serde(rename = "Country Profiles")]
    CountryProfiles,
    Comparison,
    About,
}

/// Owned by the caller; there is no global navigation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationContext {
    pub current_page: Page,
    pub selected_country: Country,
}

impl Default for NavigationContext {
    fn default() -> Self {
        Self {
            current_page: Page::Dashboard,
            selected_country: Country::ALL[0],
        }
    }
}

impl NavigationContext {
    pub fn navigate(&mut self, page: Page) {
        self.current_page = page;
    }

    /// Picks a country and opens its profile.
    pub fn select_country(&mut self, country: Country) {
        self.selected_country = country;
        self.current_page = Page::CountryProfiles;
    }

    /// Country to profile: an explicit choice wins over the remembered one.
    pub fn resolve_country(&self, requested: Option<Country>) -> Country {
        requested.unwrap_or(self.selected_country)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ctx = NavigationContext::default();
        assert_eq!(ctx.current_page, Page::Dashboard);
        assert_eq!(ctx.selected_country, Country::Brunei);
    }

    #[test]
    fn test_select_country_opens_profile() {
        let mut ctx = NavigationContext::default();
        ctx.navigate(Page::Comparison);
        assert_eq!(ctx.current_page, Page::Comparison);

        ctx.select_country(Country::Vietnam);
        assert_eq!(ctx.current_page, Page::CountryProfiles);
        assert_eq!(ctx.resolve_country(None), Country::Vietnam);
        assert_eq!(ctx.resolve_country(Some(Country::Laos)), Country::Laos);
    }

    #[test]
    fn test_contexts_are_independent() {
        let mut a = NavigationContext::default();
        let b = NavigationContext::default();
        a.select_country(Country::Singapore);
        assert_eq!(b.selected_country, Country::Brunei);
        assert_ne!(a, b);
    }
}
