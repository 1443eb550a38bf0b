/// A named rewrite instruction applied to the user's prompt before generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PromptTemplate {
    pub id: &'static str,
    pub label: &'static str,
    pub instruction: &'static str,
}

pub const PROMPT_TEMPLATES: &[PromptTemplate] = &[
    PromptTemplate {
        id: "cinematic",
        label: "Cinematic",
        instruction: "Rewrite the following prompt to be a high-budget cinematic film shot. Describe lighting, camera angles (e.g. wide shot, anamorphic), and texture in detail. Keep it under 300 characters. Prompt: ",
    },
    PromptTemplate {
        id: "claymation",
        label: "Claymation",
        instruction: "Rewrite the following prompt to describe a stop-motion claymation scene. Mention the texture of the clay, the handmade feel, and slightly jerky animation style. Prompt: ",
    },
    PromptTemplate {
        id: "cyberpunk",
        label: "Cyberpunk",
        instruction: "Rewrite the following prompt to be set in a futuristic cyberpunk city. Mention neon lights, rain, holographic advertisements, and high-tech gadgets. Prompt: ",
    },
    PromptTemplate {
        id: "anime",
        label: "Anime",
        instruction: "Rewrite the following prompt to describe a high-quality anime scene (Studio Ghibli style). Mention vibrant colors, cel-shading, and emotional atmosphere. Prompt: ",
    },
    PromptTemplate {
        id: "pixel",
        label: "Pixel Art",
        instruction: "Rewrite the following prompt to describe a retro 16-bit pixel art video game scene. Mention limited color palette and blocky aesthetics. Prompt: ",
    },
];

pub fn find_template(id: &str) -> Option<&'static PromptTemplate> {
    let id = id.trim();
    PROMPT_TEMPLATES
        .iter()
        .find(|template| template.id.eq_ignore_ascii_case(id))
}

/// Full text sent to the rewriting model, or `None` for an unknown template.
pub fn enhancement_instruction(template_id: &str, prompt: &str) -> Option<String> {
    find_template(template_id).map(|template| format!("{}{}", template.instruction, prompt))
}
