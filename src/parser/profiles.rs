// Declarative per-site locator tables.
use crate::model::ConfigError;
use scraper::Selector;
use serde::Deserialize;
use std::collections::BTreeMap;

/// A structural rule for finding elements that may hold an odds value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LocatorStrategy {
    /// Rows whose label mentions the market line (and the keyword, if set);
    /// candidates are the row's value elements.
    Row {
        row: String,
        label: String,
        value: String,
        #[serde(default)]
        keyword: Option<String>,
    },
    /// Every element matching the selector, in document order.
    Css { css: String },
}

impl LocatorStrategy {
    #[cfg(test)]
    pub fn css(selector: &str) -> Self {
        LocatorStrategy::Css { css: selector.to_string() }
    }

    pub fn row(row: &str, label: &str, value: &str, keyword: Option<&str>) -> Self {
        LocatorStrategy::Row {
            row: row.to_string(),
            label: label.to_string(),
            value: value.to_string(),
            keyword: keyword.map(str::to_string),
        }
    }

    fn selectors(&self) -> Vec<&str> {
        match self {
            LocatorStrategy::Row { row, label, value, .. } => {
                vec![row.as_str(), label.as_str(), value.as_str()]
            }
            LocatorStrategy::Css { css } => vec![css.as_str()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SiteProfile {
    pub name: String,
    #[serde(default)]
    pub over: Vec<LocatorStrategy>,
    #[serde(default)]
    pub under: Vec<LocatorStrategy>,
}

impl SiteProfile {
    /// A profile with no locators; extraction falls straight to the text stage.
    pub fn bare(name: &str) -> Self {
        Self { name: name.to_string(), over: Vec::new(), under: Vec::new() }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for strategy in self.over.iter().chain(self.under.iter()) {
            for selector in strategy.selectors() {
                if Selector::parse(selector).is_err() {
                    return Err(ConfigError::Selector {
                        site: self.name.clone(),
                        selector: selector.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Site name -> profile. Built once at startup, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    profiles: BTreeMap<String, SiteProfile>,
}

impl SiteRegistry {
    pub fn new(profiles: Vec<SiteProfile>) -> Result<Self, ConfigError> {
        let mut registry = Self::default();
        for profile in profiles {
            registry.insert(profile)?;
        }
        Ok(registry)
    }

    /// Adds or replaces a profile after checking its selectors.
    pub fn insert(&mut self, profile: SiteProfile) -> Result<(), ConfigError> {
        profile.validate()?;
        self.profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SiteProfile> {
        self.profiles.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Locator tables for the sites supported out of the box.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::new(builtin_profiles())
    }
}

fn builtin_profiles() -> Vec<SiteProfile> {
    vec![
        SiteProfile {
            name: "betano".into(),
            over: vec![
                LocatorStrategy::row(
                    "[data-qa='event-selection']",
                    "[data-qa='selection-label']",
                    "[data-qa='selection-price']",
                    Some("Mais de"),
                ),
                LocatorStrategy::row(
                    ".selections__selection",
                    ".selections__selection__title",
                    ".selections__selection__odd",
                    Some("Mais de"),
                ),
            ],
            under: vec![
                LocatorStrategy::row(
                    "[data-qa='event-selection']",
                    "[data-qa='selection-label']",
                    "[data-qa='selection-price']",
                    Some("Menos de"),
                ),
                LocatorStrategy::row(
                    ".selections__selection",
                    ".selections__selection__title",
                    ".selections__selection__odd",
                    Some("Menos de"),
                ),
            ],
        },
        SiteProfile {
            name: "bet365".into(),
            over: vec![LocatorStrategy::row(
                ".gl-Market_General",
                ".gl-MarketColumnHeader",
                ".gl-ParticipantOddsOnly_Odds",
                Some("Mais de"),
            )],
            under: vec![LocatorStrategy::row(
                ".gl-Market_General",
                ".gl-MarketColumnHeader",
                ".gl-ParticipantOddsOnly_Odds",
                Some("Menos de"),
            )],
        },
        SiteProfile {
            name: "kto".into(),
            over: vec![LocatorStrategy::row(
                "[data-test-name='outcome']",
                "[data-test-name='outcome-label']",
                "[data-test-name='odds']",
                Some("Mais de"),
            )],
            under: vec![LocatorStrategy::row(
                "[data-test-name='outcome']",
                "[data-test-name='outcome-label']",
                "[data-test-name='odds']",
                Some("Menos de"),
            )],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_profiles_have_valid_selectors() {
        let registry = SiteRegistry::builtin().unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["bet365", "betano", "kto"]);
    }

    #[test]
    fn invalid_selector_is_rejected() {
        let profile = SiteProfile {
            name: "broken".into(),
            over: vec![LocatorStrategy::css("div[[")],
            under: vec![],
        };
        let err = SiteRegistry::new(vec![profile]).unwrap_err();
        assert!(matches!(err, ConfigError::Selector { ref site, .. } if site == "broken"));
    }

    #[test]
    fn strategies_deserialize_from_json() {
        let json = r#"{
            "name": "acme",
            "over": [{"css": ".over .odd"}],
            "under": [{"row": "li", "label": "span", "value": "b", "keyword": "Under"}]
        }"#;
        let profile: SiteProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.over, vec![LocatorStrategy::css(".over .odd")]);
        assert_eq!(profile.under, vec![LocatorStrategy::row("li", "span", "b", Some("Under"))]);
    }

    #[test]
    fn inserting_replaces_existing_profile() {
        let mut registry = SiteRegistry::builtin().unwrap();
        registry.insert(SiteProfile::bare("kto")).unwrap();
        assert!(registry.get("kto").unwrap().over.is_empty());
        assert!(registry.contains("betano"));
    }
}
