use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst, TimestampMilliSeconds};
use thiserror::Error;

use crate::intake::{self, ImageSlot, IntakeError};

pub const EXPECTED_ALT_TITLES: usize = 3;
pub const EXPECTED_BULLET_POINTS: usize = 5;
pub const EXPECTED_SECONDARY_IMAGES: usize = 6;
pub const EXPECTED_ROADMAP_PHASES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Swimwear,
    Sportswear,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Swimwear => "Swimwear",
            Category::Sportswear => "Sportswear",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A product as described by the user on the form.
///
/// Images travel as data URLs (`data:image/png;base64,...`). The wire names
/// `imageFront`/`imageBack` match what the browser form and stored history use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDescription {
    pub name: String,
    pub category: Category,
    pub material: String,
    pub features: String,
    pub style: String,
    pub target_audience: String,
    #[serde(
        default,
        rename = "imageFront",
        alias = "frontImage",
        skip_serializing_if = "Option::is_none"
    )]
    pub front_image: Option<String>,
    #[serde(
        default,
        rename = "imageBack",
        alias = "backImage",
        skip_serializing_if = "Option::is_none"
    )]
    pub back_image: Option<String>,
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{slot} image is invalid: {source}")]
    InvalidImage {
        slot: ImageSlot,
        #[source]
        source: IntakeError,
    },
}

impl ProductDescription {
    /// Checks the submission rules: every text field non-blank, images decodable.
    pub fn validate(&self) -> Result<(), InputError> {
        let mandatory = [
            ("name", &self.name),
            ("material", &self.material),
            ("features", &self.features),
            ("style", &self.style),
            ("targetAudience", &self.target_audience),
        ];
        for (field, value) in mandatory {
            if value.trim().is_empty() {
                return Err(InputError::MissingField(field));
            }
        }

        for (slot, image) in [
            (ImageSlot::Front, &self.front_image),
            (ImageSlot::Back, &self.back_image),
        ] {
            if let Some(url) = image {
                intake::parse_data_url(url)
                    .map_err(|source| InputError::InvalidImage { slot, source })?;
            }
        }
        Ok(())
    }

    /// Features as entered, one per non-blank line.
    pub fn feature_lines(&self) -> impl Iterator<Item = &str> {
        self.features
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
    }
}

// --- Generated result ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub listing: Listing,
    pub ads: AdStrategy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub main_title: String,
    pub alt_titles: Vec<String>,
    pub bullet_points: Vec<String>,
    /// HTML markup (`<p>`, `<b>`, `<ul>`...), ready to paste into Seller Central.
    pub description: String,
    #[serde(default)]
    pub search_terms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specs: Option<ListingSpecs>,
    pub visual_assets: VisualAssets,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationales: Option<ListingRationales>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingSpecs {
    pub material_composition: String,
    pub sizing_detail: String,
    pub care_instructions: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingRationales {
    pub title_logic: String,
    pub bullet_logic: String,
    pub keyword_logic: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisualAssets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_image: Option<MainImagePlan>,
    pub secondary_images: Vec<SecondaryImagePlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub a_plus_content: Option<APlusContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_video: Option<ProductVideo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MainImagePlan {
    pub composition: String,
    pub lighting_and_tone: String,
    pub example_description: String,
    pub rationale: String,
    pub generation_prompt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecondaryImagePlan {
    pub title: String,
    pub description: String,
    pub key_selling_point: String,
    pub usage_scenario: String,
    pub visual_example: String,
    pub rationale: String,
    pub generation_prompt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct APlusContent {
    pub layout_strategy: String,
    pub modules: Vec<APlusModule>,
    pub rationale: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct APlusModule {
    #[serde(rename = "type")]
    pub module_type: String,
    pub content: String,
    pub design_goal: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductVideo {
    pub tone: String,
    pub usage_scenario: String,
    pub script_outline: String,
    pub key_scenes: Vec<String>,
    pub rationale: String,
    pub generation_prompt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdStrategy {
    pub campaign_name: String,
    pub asin_targeting: Vec<String>,
    pub detailed_roadmap: Vec<LaunchPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_intel: Option<MarketIntel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creative_copy: Option<CreativeCopy>,
}

/// One phase of the PPC launch roadmap. Budgets are USD per day.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LaunchPhase {
    pub day_range: String,
    pub phase_name: String,
    pub objective: String,
    pub ad_types: Vec<String>,
    // the model occasionally quotes numbers
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_budget: Option<f64>,
    pub targeting_focus: String,
    pub placement_strategy: String,
    pub bidding_strategy: String,
    pub suggested_bid_range: String,
    pub content_instruction: String,
    pub strategic_logic: String,
    pub optimization_task: String,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketIntel {
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_launch_price: Option<f64>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regular_price: Option<f64>,
    pub competitor_benchmark: String,
    pub positioning: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreativeCopy {
    pub headline: String,
    pub video_concept: String,
    pub call_to_action: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub uri: String,
}

impl GenerationResult {
    /// Lists the places where the output deviates from the requested counts.
    ///
    /// These are advisory: the provider is asked for fixed counts but a short
    /// list is still a usable result.
    pub fn shape_warnings(&self) -> Vec<String> {
        let checks = [
            ("listing.altTitles", self.listing.alt_titles.len(), EXPECTED_ALT_TITLES),
            ("listing.bulletPoints", self.listing.bullet_points.len(), EXPECTED_BULLET_POINTS),
            (
                "listing.visualAssets.secondaryImages",
                self.listing.visual_assets.secondary_images.len(),
                EXPECTED_SECONDARY_IMAGES,
            ),
            ("ads.detailedRoadmap", self.ads.detailed_roadmap.len(), EXPECTED_ROADMAP_PHASES),
        ];
        checks
            .into_iter()
            .filter(|(_, actual, expected)| actual != expected)
            .map(|(field, actual, expected)| format!("{field}: expected {expected}, got {actual}"))
            .collect()
    }
}

// --- History ---

/// One archived generation. `id` is the creation time in unix milliseconds.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub timestamp: DateTime<Utc>,
    pub input: ProductDescription,
    pub result: GenerationResult,
}

impl HistoryRecord {
    pub fn new(stamp: DateTime<Utc>, input: ProductDescription, result: GenerationResult) -> Self {
        Self {
            id: stamp.timestamp_millis().to_string(),
            timestamp: stamp,
            input,
            result,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub const RESULT_JSON: &str = include_str!("../tests/fixtures/generation_result.json");

    pub fn sample_result() -> GenerationResult {
        serde_json::from_str(RESULT_JSON).expect("fixture parses")
    }

    pub fn sample_input() -> ProductDescription {
        ProductDescription {
            name: "Women's One-Piece Swimsuit".into(),
            category: Category::Swimwear,
            material: "82% Nylon, 18% Spandex".into(),
            features: "Tummy control\nAdjustable straps".into(),
            style: "Retro high-cut".into(),
            target_audience: "Women 25-45".into(),
            front_image: None,
            back_image: None,
        }
    }

    pub const TINY_PNG: &[u8] = &[
        0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n', 0, 0, 0, 13, b'I', b'H', b'D', b'R',
    ];
}
