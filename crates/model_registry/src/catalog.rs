use crate::{ModelConfig, ThinkingPolicy};

const FLASH_MAX_BUDGET: u32 = 24576;
const PRO_BUDGET: u32 = 32768;

fn switchable(min_budget: u32) -> ThinkingPolicy {
    ThinkingPolicy {
        toggleable: true,
        default_on: true,
        budget_when_on: FLASH_MAX_BUDGET,
        budget_when_off: 0,
        fixed_budget: None,
        min_budget,
        max_budget: FLASH_MAX_BUDGET,
    }
}

/// Models shipped with the client, in display order.
pub fn builtin_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig::new("gpt-4.1", "azure", "GPT-4.1").with_short_name("GPT-4.1"),
        ModelConfig::new("gemini-2.5-pro-preview-05-06", "google", "Gemini 2.5 Pro")
            .with_short_name("2.5 Pro")
            .with_thinking_policy(ThinkingPolicy {
                toggleable: false,
                default_on: true,
                budget_when_on: PRO_BUDGET,
                budget_when_off: 0,
                fixed_budget: Some(PRO_BUDGET),
                min_budget: 128,
                max_budget: PRO_BUDGET,
            }),
        ModelConfig::new("gemini-2.5-flash-preview-05-20", "google", "Gemini 2.5 flash")
            .with_short_name("2.5 Flash")
            .with_thinking_policy(switchable(0)),
        ModelConfig::new(
            "gemini-2.5-flash-lite-preview-06-17",
            "google",
            "Gemini 2.5 Flash Lite",
        )
        .with_thinking_policy(switchable(512)),
        ModelConfig::new("gemini-2.0-flash", "google", "Gemini 2.0 flash")
            .with_short_name("2.0 Flash"),
        ModelConfig::new("gemini-2.0-flash-lite-001", "google", "Gemini 2.0 flash Lite"),
        ModelConfig::new("llama3.1-8b", "cerebras", "llama3.1-8b"),
        ModelConfig::new("qwen-3-32b", "cerebras", "qwen-3-32b"),
    ]
}
