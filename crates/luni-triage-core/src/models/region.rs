//! Regional pricing and veterinary-authority metadata.

use std::fmt;
use std::str::FromStr;

use luni_triage_llm::PromptRegion;
use serde::{Deserialize, Serialize};

/// Supported service region.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Region {
    #[default]
    AU,
    NZ,
}

/// Prices in minor currency units (cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingTiers {
    /// One-off AI Health Report
    pub health_report: u32,
    /// Scheduled video consult with a vet
    pub video_consult: u32,
    /// Priority consult for urgent cases
    pub urgent_consult: u32,
}

/// Static metadata for a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionInfo {
    /// ISO country code
    pub code: &'static str,
    /// Country display name
    pub country: &'static str,
    /// ISO currency code
    pub currency: &'static str,
    /// Currency symbol for display
    pub currency_symbol: &'static str,
    /// Consultation pricing
    pub pricing: PricingTiers,
    /// Veterinary authority name
    pub authority_name: &'static str,
    /// Authority abbreviation for badges
    pub authority_short: &'static str,
    /// What owners should do in an emergency
    pub emergency_advice: &'static str,
}

const AU_INFO: RegionInfo = RegionInfo {
    code: "AU",
    country: "Australia",
    currency: "AUD",
    currency_symbol: "A$",
    pricing: PricingTiers {
        health_report: 1_495,
        video_consult: 4_900,
        urgent_consult: 7_900,
    },
    authority_name: "Australian Veterinary Association",
    authority_short: "AVA",
    emergency_advice: "contact your nearest 24-hour emergency vet clinic immediately",
};

const NZ_INFO: RegionInfo = RegionInfo {
    code: "NZ",
    country: "New Zealand",
    currency: "NZD",
    currency_symbol: "NZ$",
    pricing: PricingTiers {
        health_report: 1_695,
        video_consult: 5_500,
        urgent_consult: 8_900,
    },
    authority_name: "Veterinary Council of New Zealand",
    authority_short: "VCNZ",
    emergency_advice: "call your local after-hours vet or emergency animal hospital immediately",
};

impl Region {
    /// All supported regions.
    pub const ALL: [Region; 2] = [Region::AU, Region::NZ];

    /// Look up static metadata.
    pub fn info(self) -> &'static RegionInfo {
        match self {
            Region::AU => &AU_INFO,
            Region::NZ => &NZ_INFO,
        }
    }

    /// Region framing for prompts.
    pub fn prompt_region(self) -> PromptRegion<'static> {
        let info = self.info();
        PromptRegion {
            country: info.country,
            authority: info.authority_name,
            emergency_advice: info.emergency_advice,
        }
    }

    /// Opening message for a new case.
    pub fn greeting(self) -> String {
        let info = self.info();
        format!(
            "Hi, I'm Luni! Tell me what's going on with your pet and I'll help you work out \
             how urgent it is. If your pet is in distress right now, please {}.",
            info.emergency_advice
        )
    }
}

impl RegionInfo {
    /// Format a price in minor units, e.g. `A$49.00`.
    pub fn format_price(&self, cents: u32) -> String {
        format!("{}{}.{:02}", self.currency_symbol, cents / 100, cents % 100)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().code)
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "AU" | "AUS" | "AUSTRALIA" => Ok(Region::AU),
            "NZ" | "NZL" | "NEW ZEALAND" => Ok(Region::NZ),
            other => Err(format!("Unsupported region: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_lookup() {
        assert_eq!(Region::AU.info().currency, "AUD");
        assert_eq!(Region::NZ.info().authority_short, "VCNZ");
        assert_eq!(Region::default(), Region::AU);
    }

    #[test]
    fn test_region_parse() {
        assert_eq!("au".parse::<Region>(), Ok(Region::AU));
        assert_eq!(" New Zealand ".parse::<Region>(), Ok(Region::NZ));
        assert!("US".parse::<Region>().is_err());
    }

    #[test]
    fn test_format_price() {
        let info = Region::AU.info();
        assert_eq!(info.format_price(info.pricing.video_consult), "A$49.00");
        assert_eq!(Region::NZ.info().format_price(1_695), "NZ$16.95");
    }

    #[test]
    fn test_greeting_mentions_emergency_advice() {
        assert!(Region::NZ.greeting().contains("after-hours vet"));
    }

    #[test]
    fn test_serde_codes() {
        assert_eq!(serde_json::to_string(&Region::NZ).unwrap(), "\"NZ\"");
        let parsed: Region = serde_json::from_str("\"AU\"").unwrap();
        assert_eq!(parsed, Region::AU);
    }
}
