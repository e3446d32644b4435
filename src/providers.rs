//! Catalog of speech-to-text and language-model providers available to
//! session pipelines, derived from configured credentials.

use crate::config::ProvidersConfig;
use anyhow::{bail, Result};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SttProvider {
    AssemblyAi,
    Deepgram,
    Groq,
    OpenAi,
    Whisper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Anthropic,
    Gemini,
    Groq,
    Ollama,
    OpenAi,
}

impl SttProvider {
    pub const ALL: [SttProvider; 5] = [
        SttProvider::AssemblyAi,
        SttProvider::Deepgram,
        SttProvider::Groq,
        SttProvider::OpenAi,
        SttProvider::Whisper,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SttProvider::AssemblyAi => "assemblyai",
            SttProvider::Deepgram => "deepgram",
            SttProvider::Groq => "groq",
            SttProvider::OpenAi => "openai",
            SttProvider::Whisper => "whisper",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl LlmProvider {
    pub const ALL: [LlmProvider; 5] = [
        LlmProvider::Anthropic,
        LlmProvider::Gemini,
        LlmProvider::Groq,
        LlmProvider::Ollama,
        LlmProvider::OpenAi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Gemini => "gemini",
            LlmProvider::Groq => "groq",
            LlmProvider::Ollama => "ollama",
            LlmProvider::OpenAi => "openai",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for SttProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Providers usable by this process, plus the preferred defaults
#[derive(Debug, Clone, Serialize)]
pub struct ProviderCatalog {
    pub stt: Vec<SttProvider>,
    pub llm: Vec<LlmProvider>,
    pub default_stt: Option<SttProvider>,
    pub default_llm: Option<LlmProvider>,
}

impl ProviderCatalog {
    /// Build the catalog from configuration.
    ///
    /// Fails if no STT or no LLM provider is configured; the server cannot
    /// process audio without both.
    pub fn from_config(config: &ProvidersConfig) -> Result<Self> {
        let mut stt = Vec::new();
        for (name, creds) in &config.stt {
            match SttProvider::parse(name) {
                Some(provider) if creds.is_configured() => stt.push(provider),
                Some(_) => {}
                None => warn!("Ignoring unknown STT provider '{}'", name),
            }
        }

        let mut llm = Vec::new();
        for (name, creds) in &config.llm {
            match LlmProvider::parse(name) {
                Some(provider) if creds.is_configured() => llm.push(provider),
                Some(_) => {}
                None => warn!("Ignoring unknown LLM provider '{}'", name),
            }
        }

        stt.sort();
        stt.dedup();
        llm.sort();
        llm.dedup();

        if stt.is_empty() {
            bail!("No STT providers available. Configure at least one STT API key.");
        }
        if llm.is_empty() {
            bail!("No LLM providers available. Configure at least one LLM API key.");
        }

        let default_stt = config.default_stt.as_deref().and_then(|name| {
            let found = SttProvider::parse(name).filter(|p| stt.contains(p));
            if found.is_none() {
                warn!("Default STT provider '{}' is not available", name);
            }
            found
        });

        let default_llm = config.default_llm.as_deref().and_then(|name| {
            let found = LlmProvider::parse(name).filter(|p| llm.contains(p));
            if found.is_none() {
                warn!("Default LLM provider '{}' is not available", name);
            }
            found
        });

        let catalog = Self {
            stt,
            llm,
            default_stt,
            default_llm,
        };

        info!("Available STT providers: {:?}", catalog.stt_names());
        info!("Available LLM providers: {:?}", catalog.llm_names());

        Ok(catalog)
    }

    pub fn stt_names(&self) -> Vec<&'static str> {
        self.stt.iter().map(SttProvider::as_str).collect()
    }

    pub fn llm_names(&self) -> Vec<&'static str> {
        self.llm.iter().map(LlmProvider::as_str).collect()
    }
}
