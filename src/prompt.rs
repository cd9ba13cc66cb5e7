//! Instruction text and the structured-output schema sent with every request.

use serde_json::{json, Value};

use crate::models::{Category, ProductDescription};

/// Category-specific system instruction. Rationale is requested in Chinese,
/// listing copy and image prompts in English.
pub fn system_instruction(category: Category) -> String {
    format!(
        "你是一位顶级的亚马逊美国站运营专家。你必须为 {category} 类目的新品生成全套 Listing 文案、视觉方案和广告策略。\n\
         \n\
         重点任务：\n\
         1. 标题生成：强制生成 1 个主标题 (Main Title) 和 3 个备选副标题 (Alternative Titles)。\n\
         2. 五点描述：生成 5 个高转化 Bullet Points。\n\
         3. 产品长描述 (Description)：\n\
            - 必须采用 HTML 源代码格式（使用 <b>, <strong>, <p>, <br>, <ul>, <li> 等标签）。\n\
            - 每个段落必须包含【主标题】和【副标题】，然后是详细内容。\n\
            - 需要加粗强调的内容请直接在代码中使用 <b> 或 <strong>。\n\
         4. 附图策划逻辑（共 6 张）：\n\
            - Slide 1: 核心功能展示 (Features Focus)\n\
            - Slide 2: 真实场景演示 (Lifestyle Scenario)\n\
            - Slide 3: 材质细节/特写 (Material & Detail)\n\
            - Slide 4: 尺码建议/版型 (Sizing & Fit Guide)\n\
            - Slide 5: 使用对比/痛点解决 (Comparison)\n\
            - Slide 6: 品牌承诺/包装 (Brand Value)\n\
         5. AI 指令工程：为图像生成模型编写摄影级英文提示词 (generationPrompt)。\n\
         6. 广告策略：给出 4 个阶段的 PPC 推广路线图，每阶段包含日预算 (美元)。\n\
         7. 语言：解释说明用中文，亚马逊 Listing 核心文案（Title, Bullets, Description）和 AI 指令必须用专业英文。"
    )
}

/// The per-request task text carrying the product details.
pub fn user_prompt(input: &ProductDescription) -> String {
    let features = input.feature_lines().collect::<Vec<_>>().join("; ");
    format!(
        "请为以下产品生成全套资产。\n\
         要求：1个主标题+3个副标题；5个Bullet Points；HTML格式Description（包含主副标题及加粗）；6张附图方案；4阶段详细广告计划。\n\
         \n\
         产品详情：\n\
         名称: {name} | 类目: {category} | 材质: {material} | 风格: {style} | 目标人群: {audience} | 卖点: {features}",
        name = input.name.trim(),
        category = input.category,
        material = input.material.trim(),
        style = input.style.trim(),
        audience = input.target_audience.trim(),
    )
}

fn string() -> Value {
    json!({ "type": "STRING" })
}

fn number() -> Value {
    json!({ "type": "NUMBER" })
}

fn strings(description: Option<&str>) -> Value {
    let mut schema = json!({ "type": "ARRAY", "items": string() });
    if let Some(description) = description {
        schema["description"] = json!(description);
    }
    schema
}

fn object(properties: Value) -> Value {
    json!({ "type": "OBJECT", "properties": properties })
}

fn array_of(items: Value, description: &str) -> Value {
    json!({ "type": "ARRAY", "items": items, "description": description })
}

/// Response schema mirroring [`crate::models::GenerationResult`].
pub fn response_schema() -> Value {
    let main_image = object(json!({
        "composition": string(),
        "lightingAndTone": string(),
        "exampleDescription": string(),
        "rationale": string(),
        "generationPrompt": string(),
    }));

    let secondary_image = object(json!({
        "title": string(),
        "description": string(),
        "keySellingPoint": string(),
        "usageScenario": string(),
        "visualExample": string(),
        "rationale": string(),
        "generationPrompt": string(),
    }));

    let a_plus = object(json!({
        "layoutStrategy": string(),
        "modules": {
            "type": "ARRAY",
            "items": object(json!({
                "type": string(),
                "content": string(),
                "designGoal": string(),
            })),
        },
        "rationale": string(),
    }));

    let video = object(json!({
        "tone": string(),
        "usageScenario": string(),
        "scriptOutline": string(),
        "keyScenes": strings(None),
        "rationale": string(),
        "generationPrompt": string(),
    }));

    let mut listing = object(json!({
        "mainTitle": string(),
        "altTitles": strings(Some("3 alternative titles")),
        "bulletPoints": strings(Some("5 bullet points")),
        "description": {
            "type": "STRING",
            "description": "Professional Amazon product description in HTML format with main/sub headings and bold tags",
        },
        "searchTerms": strings(None),
        "specs": object(json!({
            "materialComposition": string(),
            "sizingDetail": string(),
            "careInstructions": string(),
        })),
        "visualAssets": object(json!({
            "mainImage": main_image,
            "secondaryImages": array_of(secondary_image, "6 secondary image slides"),
            "aPlusContent": a_plus,
            "productVideo": video,
        })),
        "rationales": object(json!({
            "titleLogic": string(),
            "bulletLogic": string(),
            "keywordLogic": string(),
        })),
    }));
    listing["required"] = json!(["mainTitle", "altTitles", "bulletPoints", "description", "visualAssets"]);

    let phase = object(json!({
        "dayRange": string(),
        "phaseName": string(),
        "objective": string(),
        "adTypes": strings(None),
        "dailyBudget": number(),
        "targetingFocus": string(),
        "placementStrategy": string(),
        "biddingStrategy": string(),
        "suggestedBidRange": string(),
        "contentInstruction": string(),
        "strategicLogic": string(),
        "optimizationTask": string(),
    }));

    let ads = object(json!({
        "campaignName": string(),
        "asinTargeting": strings(None),
        "detailedRoadmap": array_of(phase, "4 launch phases"),
        "marketIntel": object(json!({
            "suggestedLaunchPrice": number(),
            "regularPrice": number(),
            "competitorBenchmark": string(),
            "positioning": string(),
        })),
        "creativeCopy": object(json!({
            "headline": string(),
            "videoConcept": string(),
            "callToAction": string(),
        })),
    }));

    let mut root = object(json!({ "listing": listing, "ads": ads }));
    root["required"] = json!(["listing", "ads"]);
    root
}
