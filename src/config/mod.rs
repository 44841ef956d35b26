//! Configuration module for ytsum.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{PromptPair, Prompts};
pub use settings::{
    GeneralSettings, PromptSettings, Provider, RateSettings, RetrySettings, RunSettings,
    Settings, SettingsOverrides, SummarySettings, TranscriptSettings,
};
