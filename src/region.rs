//! Vendor service base URLs per cloud region.

use serde::{Deserialize, Serialize};

/// Ayla cloud region. Selects the base URLs for the three vendor services.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    /// US / global deployment (the default).
    #[default]
    UnitedStates,
    /// European deployment.
    Europe,
}

impl Region {
    /// User-field service: sign-in, token refresh, user profile.
    pub fn user_field_url(self) -> &'static str {
        match self {
            Region::UnitedStates => "https://user-field.aylanetworks.com",
            Region::Europe => "https://user-field-eu.aylanetworks.com",
        }
    }

    /// Device service ("ADS"): device listing, properties, datapoints.
    pub fn ads_url(self) -> &'static str {
        match self {
            Region::UnitedStates => "https://ads-field.aylanetworks.com",
            Region::Europe => "https://ads-eu.aylanetworks.com",
        }
    }

    /// Rules service: actions and rules tied to an account.
    pub fn rulesservice_url(self) -> &'static str {
        match self {
            Region::UnitedStates => "https://rulesservice-field.aylanetworks.com",
            Region::Europe => "https://rulesservice-eu.aylanetworks.com",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_region_is_us() {
        assert_eq!(Region::default(), Region::UnitedStates);
    }

    #[test]
    fn test_us_bases() {
        let r = Region::UnitedStates;
        assert_eq!(r.user_field_url(), "https://user-field.aylanetworks.com");
        assert_eq!(r.ads_url(), "https://ads-field.aylanetworks.com");
        assert_eq!(
            r.rulesservice_url(),
            "https://rulesservice-field.aylanetworks.com"
        );
    }

    #[test]
    fn test_eu_bases() {
        let r = Region::Europe;
        assert_eq!(r.user_field_url(), "https://user-field-eu.aylanetworks.com");
        assert_eq!(r.ads_url(), "https://ads-eu.aylanetworks.com");
        assert_eq!(
            r.rulesservice_url(),
            "https://rulesservice-eu.aylanetworks.com"
        );
    }
}
