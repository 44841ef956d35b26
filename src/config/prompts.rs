//! Prompt templates for ytsum.
//!
//! Prompts can be customized by placing `map.toml` / `reduce.toml` in the
//! custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    pub map: PromptPair,
    pub reduce: PromptPair,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// A system prompt and a user template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

impl Default for PromptPair {
    fn default() -> Self {
        Self::map_default()
    }
}

impl PromptPair {
    fn map_default() -> Self {
        Self {
            system: r#"You extract the substance of video transcripts. You never invent content that is not in the text you are given. Skip greetings, sponsor reads, and requests to like or subscribe."#.to_string(),

            user: r#"The text below is part {{index}} of {{total}} of the transcript of the YouTube video "{{title}}" (roughly {{start}} to {{end}}, language: {{language}}).

Extract 3-5 key points from this part. Also list any memorable verbatim quotes with their approximate timestamp, and any insight that goes beyond restating the content.

Text:
{{chunk}}

Respond with a JSON object:
{"key_points": ["..."], "quotes": [{"t": "MM:SS", "text": "..."}], "insights": ["..."]}"#.to_string(),
        }
    }

    fn reduce_default() -> Self {
        Self {
            system: r#"You write concise, faithful summaries of YouTube videos from notes taken on consecutive parts of the transcript. Parts overlap slightly, so the same point can appear twice; merge duplicates. Keep the order in which content appears in the video."#.to_string(),

            user: r#"Below are the key points extracted from each part of the video "{{title}}", in order.

{{partials}}

Write the summary in the language with tag "{{output_language}}". Respond with a JSON object:
{
  "summary": "one paragraph TL;DR capturing the essence and flow of the video",
  "highlights": ["most important points, in order, at most 10"],
  "new_insights": ["3-5 takeaways that emerge from the discussion as a whole"],
  "notable_quotes": [{"t": "MM:SS", "text": "memorable statement"}]
}"#.to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let map_path = custom_path.join("map.toml");
            if map_path.exists() {
                let content = std::fs::read_to_string(&map_path)?;
                prompts.map = toml::from_str(&content)?;
            }

            let reduce_path = custom_path.join("reduce.toml");
            if reduce_path.exists() {
                let content = std::fs::read_to_string(&reduce_path)?;
                prompts.reduce = merge_pair(toml::from_str(&content)?, PromptPair::reduce_default());
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render with both provided variables and custom config variables.
    /// Provided variables take precedence.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            map: PromptPair::map_default(),
            reduce: PromptPair::reduce_default(),
            variables: HashMap::new(),
        }
    }
}

/// A partial `reduce.toml` falls back to the reduce defaults, not the map ones.
fn merge_pair(loaded: PartialPair, defaults: PromptPair) -> PromptPair {
    PromptPair {
        system: loaded.system.unwrap_or(defaults.system),
        user: loaded.user.unwrap_or(defaults.user),
    }
}

#[derive(Deserialize)]
struct PartialPair {
    system: Option<String>,
    user: Option<String>,
}
