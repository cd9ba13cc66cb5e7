//! Text rendering of a result: the three tabs, and copyable fragments.
//!
//! Every optional part of a result has one defined empty rendering
//! ([`EMPTY`]); callers never null-check individual fields.

use std::str::FromStr;

use serde::Serialize;

use crate::models::GenerationResult;

pub const EMPTY: &str = "(none)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    Listing,
    Visual,
    Ads,
}

impl Tab {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Listing => "listing",
            Tab::Visual => "visual",
            Tab::Ads => "ads",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Listing => "Amazon Listing",
            Tab::Visual => "Visual Assets Report",
            Tab::Ads => "PPC Ad Plan",
        }
    }

    /// File-name stem used when the section is exported.
    pub fn export_stem(&self) -> &'static str {
        match self {
            Tab::Listing => "Listing_Copy",
            Tab::Visual => "Visual_Assets_Report",
            Tab::Ads => "PPC_Ad_Plan",
        }
    }
}

impl FromStr for Tab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "listing" => Ok(Tab::Listing),
            "visual" => Ok(Tab::Visual),
            "ads" => Ok(Tab::Ads),
            other => Err(format!("unknown section '{other}' (expected listing, visual or ads)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub tab: Tab,
    pub title: String,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub heading: String,
    pub lines: Vec<String>,
}

impl Block {
    fn new(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            lines: Vec::new(),
        }
    }

    fn field(mut self, label: &str, value: &str) -> Self {
        self.lines.push(format!("{label}: {}", or_empty(value)));
        self
    }

    fn items<'a>(mut self, items: impl IntoIterator<Item = &'a String>) -> Self {
        let before = self.lines.len();
        self.lines.extend(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| format!("{}. {}", i + 1, or_empty(item))),
        );
        if self.lines.len() == before {
            self.lines.push(EMPTY.to_string());
        }
        self
    }

    fn text(mut self, text: &str) -> Self {
        if text.trim().is_empty() {
            self.lines.push(EMPTY.to_string());
        } else {
            self.lines.extend(text.lines().map(str::to_string));
        }
        self
    }

    fn empty(mut self) -> Self {
        self.lines.push(EMPTY.to_string());
        self
    }
}

pub fn or_empty(value: &str) -> &str {
    if value.trim().is_empty() {
        EMPTY
    } else {
        value
    }
}

fn money(value: Option<f64>) -> String {
    value.map(|v| format!("${v:.2}")).unwrap_or_else(|| EMPTY.to_string())
}

/// Converts the listing's HTML description into readable plain text.
pub fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let Some(end) = rest[start..].find('>') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let tag = rest[start + 1..start + end].trim().to_ascii_lowercase();
        let name = tag.trim_start_matches('/').split_whitespace().next().unwrap_or("");
        match name {
            "br" | "br/" => out.push('\n'),
            "p" | "ul" | "ol" | "h1" | "h2" | "h3" | "h4" if tag.starts_with('/') => out.push('\n'),
            "li" if !tag.starts_with('/') => out.push_str("\n- "),
            _ => {}
        }
        rest = &rest[start + end + 1..];
    }
    out.push_str(rest);

    let text = out
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders one tab. Tabs are independent views over the same result.
pub fn render_tab(result: &GenerationResult, tab: Tab) -> Section {
    let blocks = match tab {
        Tab::Listing => listing_blocks(result),
        Tab::Visual => visual_blocks(result),
        Tab::Ads => ads_blocks(result),
    };
    Section {
        tab,
        title: tab.title().to_string(),
        blocks,
    }
}

fn listing_blocks(result: &GenerationResult) -> Vec<Block> {
    let listing = &result.listing;
    let mut blocks = vec![
        Block::new("Main Title").text(&listing.main_title),
        Block::new("Alternative Titles").items(&listing.alt_titles),
        Block::new("Bullet Points").items(&listing.bullet_points),
        Block::new("Description").text(&strip_html(&listing.description)),
        Block::new("Search Terms").text(&listing.search_terms.join(", ")),
    ];

    blocks.push(match &listing.specs {
        Some(specs) => Block::new("Specifications")
            .field("Material", &specs.material_composition)
            .field("Sizing", &specs.sizing_detail)
            .field("Care", &specs.care_instructions),
        None => Block::new("Specifications").empty(),
    });
    blocks.push(match &listing.rationales {
        Some(r) => Block::new("Rationale")
            .field("Title", &r.title_logic)
            .field("Bullets", &r.bullet_logic)
            .field("Keywords", &r.keyword_logic),
        None => Block::new("Rationale").empty(),
    });
    if !result.sources.is_empty() {
        let mut sources = Block::new("Sources");
        sources.lines = result
            .sources
            .iter()
            .map(|s| format!("{} ({})", or_empty(&s.title), s.uri))
            .collect();
        blocks.push(sources);
    }
    blocks
}

fn visual_blocks(result: &GenerationResult) -> Vec<Block> {
    let visual = &result.listing.visual_assets;
    let mut blocks = Vec::new();

    blocks.push(match &visual.main_image {
        Some(main) => Block::new("Main Image")
            .field("Composition", &main.composition)
            .field("Lighting & Tone", &main.lighting_and_tone)
            .field("Example", &main.example_description)
            .field("Rationale", &main.rationale)
            .field("Prompt", &main.generation_prompt),
        None => Block::new("Main Image").empty(),
    });

    if visual.secondary_images.is_empty() {
        blocks.push(Block::new("Secondary Images").empty());
    }
    for (i, slide) in visual.secondary_images.iter().enumerate() {
        blocks.push(
            Block::new(format!("Slide {}: {}", i + 1, or_empty(&slide.title)))
                .field("Selling Point", &slide.key_selling_point)
                .field("Scenario", &slide.usage_scenario)
                .field("Visual", &slide.visual_example)
                .field("Rationale", &slide.rationale)
                .field("Prompt", &slide.generation_prompt),
        );
    }

    blocks.push(match &visual.a_plus_content {
        Some(a_plus) => {
            let mut block = Block::new("A+ Content").field("Layout", &a_plus.layout_strategy);
            for module in &a_plus.modules {
                block.lines.push(format!(
                    "[{}] {} (goal: {})",
                    or_empty(&module.module_type),
                    or_empty(&module.content),
                    or_empty(&module.design_goal)
                ));
            }
            block
        }
        None => Block::new("A+ Content").empty(),
    });

    blocks.push(match &visual.product_video {
        Some(video) => Block::new("Product Video")
            .field("Tone", &video.tone)
            .field("Scenario", &video.usage_scenario)
            .field("Script", &video.script_outline)
            .field("Prompt", &video.generation_prompt)
            .items(&video.key_scenes),
        None => Block::new("Product Video").empty(),
    });
    blocks
}

fn ads_blocks(result: &GenerationResult) -> Vec<Block> {
    let ads = &result.ads;
    let mut blocks = Vec::new();
    if !ads.campaign_name.trim().is_empty() {
        blocks.push(Block::new("Campaign").text(&ads.campaign_name));
    }

    if ads.detailed_roadmap.is_empty() {
        blocks.push(Block::new("Roadmap").empty());
    }
    for phase in &ads.detailed_roadmap {
        blocks.push(
            Block::new(format!("{} | {}", or_empty(&phase.day_range), or_empty(&phase.phase_name)))
                .field("Objective", &phase.objective)
                .field("Daily Budget", &money(phase.daily_budget))
                .field("Targeting", &phase.targeting_focus)
                .field("Bidding", &phase.bidding_strategy)
                .field("Content", &phase.content_instruction)
                .field("Logic", &phase.strategic_logic),
        );
    }

    if let Some(intel) = &ads.market_intel {
        blocks.push(
            Block::new("Market Intel")
                .field("Launch Price", &money(intel.suggested_launch_price))
                .field("Regular Price", &money(intel.regular_price))
                .field("Benchmark", &intel.competitor_benchmark)
                .field("Positioning", &intel.positioning),
        );
    }
    if let Some(copy) = &ads.creative_copy {
        blocks.push(
            Block::new("Creative Copy")
                .field("Headline", &copy.headline)
                .field("Video Concept", &copy.video_concept)
                .field("Call to Action", &copy.call_to_action),
        );
    }
    blocks
}

/// Looks up a copyable fragment by name (`mainTitle`, `bullet.2`, ...).
///
/// Indices are 1-based, as displayed. Absent optional content yields an empty
/// string; unknown names or out-of-range indices yield `None`.
pub fn fragment(result: &GenerationResult, name: &str) -> Option<String> {
    let listing = &result.listing;
    let visual = &listing.visual_assets;
    let (key, index) = match name.split_once('.') {
        Some((key, n)) => (key, Some(n.parse::<usize>().ok().filter(|n| *n > 0)?)),
        None => (name, None),
    };
    let nth = |items: &[String], n: usize| items.get(n - 1).cloned();

    match (key, index) {
        ("mainTitle", None) => Some(listing.main_title.clone()),
        ("altTitle", Some(n)) => nth(&listing.alt_titles[..], n),
        ("bullets", None) => Some(listing.bullet_points.join("\n")),
        ("bullet", Some(n)) => nth(&listing.bullet_points[..], n),
        ("description", None) => Some(listing.description.clone()),
        ("searchTerms", None) => Some(listing.search_terms.join(" ")),
        ("mainImagePrompt", None) => Some(
            visual
                .main_image
                .as_ref()
                .map(|m| m.generation_prompt.clone())
                .unwrap_or_default(),
        ),
        ("secondaryImagePrompt", Some(n)) => visual
            .secondary_images
            .get(n - 1)
            .map(|slide| slide.generation_prompt.clone()),
        ("videoScript", None) => Some(
            visual
                .product_video
                .as_ref()
                .map(|v| v.script_outline.clone())
                .unwrap_or_default(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::sample_result;
    use pretty_assertions::assert_eq;

    #[test]
    fn strip_html_keeps_structure() {
        let text = strip_html("<p><b>Retro</b><br>Made for sun &amp; sand.</p><ul><li>One</li><li>Two</li></ul>");
        assert_eq!(text, "Retro\nMade for sun & sand.\n- One\n- Two");
    }

    #[test]
    fn strip_html_tolerates_unclosed_tags() {
        assert_eq!(strip_html("plain <b"), "plain <b");
    }

    #[test]
    fn tabs_render_independently() {
        let result = sample_result();
        let listing = render_tab(&result, Tab::Listing);
        assert_eq!(listing.blocks[2].heading, "Bullet Points");
        assert_eq!(listing.blocks[2].lines.len(), 5);

        let visual = render_tab(&result, Tab::Visual);
        let slides = visual.blocks.iter().filter(|b| b.heading.starts_with("Slide ")).count();
        assert_eq!(slides, 6);

        let ads = render_tab(&result, Tab::Ads);
        assert_eq!(ads.blocks.len(), 4);
        assert!(ads.blocks[3].lines.contains(&"Daily Budget: $60.50".to_string()));
        assert_eq!(render_tab(&result, Tab::Ads), ads);
    }

    #[test]
    fn absent_optional_sections_render_as_empty() {
        let mut result = sample_result();
        result.listing.visual_assets.main_image = None;
        result.listing.visual_assets.product_video = None;
        result.listing.visual_assets.secondary_images.clear();
        result.ads.detailed_roadmap.clear();

        let visual = render_tab(&result, Tab::Visual);
        assert_eq!(visual.blocks[0].lines, vec![EMPTY.to_string()]);
        assert_eq!(visual.blocks[1].heading, "Secondary Images");
        let ads = render_tab(&result, Tab::Ads);
        assert_eq!(ads.blocks[0].lines, vec![EMPTY.to_string()]);
    }

    #[test]
    fn fragments_follow_displayed_numbering() {
        let result = sample_result();
        assert_eq!(fragment(&result, "mainTitle").unwrap(), result.listing.main_title);
        assert_eq!(fragment(&result, "bullet.1").unwrap(), result.listing.bullet_points[0]);
        assert_eq!(fragment(&result, "bullets").unwrap().lines().count(), 5);
        assert_eq!(
            fragment(&result, "secondaryImagePrompt.6").unwrap(),
            "Swimsuit in a branded gift box"
        );
        assert!(fragment(&result, "description").unwrap().starts_with("<p>"));
        assert_eq!(fragment(&result, "bullet.0"), None);
        assert_eq!(fragment(&result, "bullet.6"), None);
        assert_eq!(fragment(&result, "altTitle.x"), None);
        assert_eq!(fragment(&result, "nonsense"), None);
    }

    #[test]
    fn missing_video_fragment_is_empty_text() {
        let mut result = sample_result();
        result.listing.visual_assets.product_video = None;
        assert_eq!(fragment(&result, "videoScript"), Some(String::new()));
    }

    #[test]
    fn tab_names_parse() {
        assert_eq!("visual".parse::<Tab>().unwrap(), Tab::Visual);
        assert!("seo".parse::<Tab>().is_err());
        assert_eq!(Tab::Ads.export_stem(), "PPC_Ad_Plan");
    }
}
