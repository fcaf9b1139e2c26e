//! # Localization Module
//!
//! Chat texts are Fluent messages compiled into the binary from
//! `locales/<lang>/main.ftl`. Unknown languages fall back to English.

use std::collections::HashMap;
use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use unic_langid::LanguageIdentifier;

const DEFAULT_LANGUAGE: &str = "en";

const RESOURCES: &[(&str, &str)] = &[("en", include_str!("../locales/en/main.ftl"))];

/// Localization manager for the recommendation bot
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a new localization manager with every embedded language
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for (lang, source) in RESOURCES {
            let locale: LanguageIdentifier = lang.parse()?;
            bundles.insert(lang.to_string(), Self::create_bundle(locale, source)?);
        }

        Ok(Self { bundles })
    }

    fn create_bundle(locale: LanguageIdentifier, source: &str) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale]);
        // Telegram renders the bidi isolation marks as visible garbage
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("invalid Fluent resource: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("duplicate Fluent messages: {errors:?}"))?;

        Ok(bundle)
    }

    /// Get a localized message in the requested language
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&FluentArgs>,
    ) -> String {
        let bundle = match self
            .bundles
            .get(language)
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE))
        {
            Some(bundle) => bundle,
            None => return format!("Missing translation: {key}"),
        };

        let pattern = match bundle.get_message(key).and_then(|msg| msg.value()) {
            Some(pattern) => pattern,
            None => return format!("Missing translation: {key}"),
        };

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, args, &mut errors);
        if !errors.is_empty() {
            log::warn!("Formatting errors for {key}: {errors:?}");
        }
        value.into_owned()
    }

    /// Get an English message
    pub fn get_message(&self, key: &str, args: Option<&FluentArgs>) -> String {
        self.get_message_in_language(key, DEFAULT_LANGUAGE, args)
    }
}

static LOCALIZATION_MANAGER: OnceLock<LocalizationManager> = OnceLock::new();

/// Initialize the global localization manager
pub fn init_localization() -> Result<()> {
    if LOCALIZATION_MANAGER.get().is_none() {
        let manager = LocalizationManager::new()?;
        // Lost races leave an equivalent manager in place
        let _ = LOCALIZATION_MANAGER.set(manager);
    }
    Ok(())
}

fn manager() -> Option<&'static LocalizationManager> {
    if LOCALIZATION_MANAGER.get().is_none() {
        if let Err(e) = init_localization() {
            log::error!("Localization unavailable: {e}");
        }
    }
    LOCALIZATION_MANAGER.get()
}

/// Convenience function to get a localized message
pub fn t(key: &str) -> String {
    match manager() {
        Some(manager) => manager.get_message(key, None),
        None => key.to_string(),
    }
}

/// Convenience function to get a localized message with arguments
pub fn t_args(key: &str, args: &[(&str, FluentValue<'_>)]) -> String {
    let mut fluent_args = FluentArgs::new();
    for (name, value) in args {
        fluent_args.set(*name, value.clone());
    }

    match manager() {
        Some(manager) => manager.get_message(key, Some(&fluent_args)),
        None => key.to_string(),
    }
}
