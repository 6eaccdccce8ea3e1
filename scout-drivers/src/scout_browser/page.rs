use crate::scout_browser::{
    behavioral::BehavioralEngine,
    fingerprint::UserAgentManager,
    stealth::{StealthProfile, StealthScripts},
};
use anyhow::Result;
use fantoccini::{elements::Element, Client, Locator};
use std::time::Duration;
use tracing::debug;

/// High‑level page wrapper providing navigation and bounded element queries.
pub struct ScoutPage {
    pub(crate) client: Client,
    pub(crate) stealth_profile: StealthProfile,
    pub(crate) fingerprint_manager: UserAgentManager,
    pub(crate) behavioral_engine: BehavioralEngine,
}

impl ScoutPage {
    /// Construct a page wrapper around an existing WebDriver client.
    pub fn new(
        client: Client,
        stealth_profile: StealthProfile,
        fingerprint_manager: UserAgentManager,
        behavioral_engine: BehavioralEngine,
    ) -> Self {
        Self {
            client,
            stealth_profile,
            fingerprint_manager,
            behavioral_engine,
        }
    }

    /// Navigate to `url` and apply stealth/fingerprint scripts.
    ///
    /// Returns once the document reaches the session's page-load strategy
    /// (DOMContentLoaded for sessions built by [`ScoutDriver`](super::driver::ScoutDriver)).
    pub async fn goto(&mut self, url: &str) -> Result<()> {
        self.behavioral_engine.random_delay(300, 1200).await;
        self.client.goto(url).await.map_err(anyhow::Error::from)?;

        self.apply_stealth_and_fingerprint().await?;

        Ok(())
    }

    /// Apply stealth scripts and basic fingerprinting adjustments.
    async fn apply_stealth_and_fingerprint(&mut self) -> Result<()> {
        let languages = self.fingerprint_manager.get_session_profile().languages.clone();
        self.client
            .execute(&StealthScripts::core_evasions(&languages), vec![])
            .await?;

        match self.stealth_profile {
            StealthProfile::Lightweight => {}

            StealthProfile::Balanced => {
                self.client
                    .execute(StealthScripts::canvas_evasions(), vec![])
                    .await?;
            }

            StealthProfile::Maximum => {
                self.client
                    .execute(StealthScripts::canvas_evasions(), vec![])
                    .await?;
                self.client
                    .execute(StealthScripts::webgl_evasions(), vec![])
                    .await?;

                let platform = self.fingerprint_manager.get_session_profile().platform.clone();
                self.client
                    .execute(
                        &format!(
                            "Object.defineProperty(navigator, 'platform', {{ get: () => '{platform}' }});"
                        ),
                        vec![],
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Return the full page HTML source.
    pub async fn get_content(&self) -> Result<String> {
        self.client.source().await.map_err(anyhow::Error::from)
    }

    /// Wait up to `timeout` for an element matching `selector` to be attached
    /// to the DOM.
    pub async fn wait_for_element(&self, selector: &str, timeout: Duration) -> Result<ScoutElement> {
        debug!(target: "browser.page", %selector, timeout_ms = timeout.as_millis() as u64, "wait_for_element");
        let element = self
            .client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await?;
        Ok(ScoutElement::new(element, &self.behavioral_engine))
    }

    /// Find zero or more elements by CSS selector without waiting.
    pub async fn find_elements(&self, selector: &str) -> Result<Vec<ScoutElement>> {
        let elements = self.client.find_all(Locator::Css(selector)).await?;

        Ok(elements
            .into_iter()
            .map(|element| ScoutElement::new(element, &self.behavioral_engine))
            .collect())
    }

    /// Human-like pause between interactions.
    pub async fn pause(&self) {
        self.behavioral_engine.random_delay(100, 500).await;
    }
}

#[derive(Clone)]
/// Wrapper for DOM elements that provides typed helpers consistent with [`ScoutPage`].
pub struct ScoutElement {
    pub element: Element,
    pub behavioral_engine: BehavioralEngine,
}

impl ScoutElement {
    /// Construct an element wrapper.
    pub fn new(element: Element, behavioral: &BehavioralEngine) -> Self {
        Self {
            element,
            behavioral_engine: behavioral.clone(),
        }
    }

    /// Clear the element, then type into it using human‑like timings.
    pub async fn fill(&self, text: &str) -> Result<()> {
        self.element.clear().await?;
        self.behavioral_engine
            .type_text_human_like(&self.element, text)
            .await
    }

    /// Click the element.
    pub async fn click(&self) -> Result<()> {
        self.behavioral_engine.random_delay(80, 300).await;
        self.element.clone().click().await?;
        Ok(())
    }
}
