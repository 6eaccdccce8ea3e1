use crate::scout_browser::{
    behavioral::BehavioralEngine,
    fingerprint::UserAgentManager,
    page::ScoutPage,
    stealth::{build_stealth_arguments, StealthProfile},
};
use anyhow::{Context, Result};
use fantoccini::{wd::TimeoutConfiguration, Client, ClientBuilder};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;
use webdriver::capabilities::Capabilities;

/// One WebDriver browser session with stealth and behavioral helpers.
///
/// Each session gets a fresh fingerprint; nothing is shared between
/// sessions.
pub struct ScoutDriver {
    pub client: Client,
    pub session_id: Uuid,
    pub behavioral_engine: BehavioralEngine,
    pub user_agent_manager: UserAgentManager,
    pub stealth_profile: StealthProfile,
}

impl ScoutDriver {
    /// Open a new session against the WebDriver service at `webdriver_url`.
    ///
    /// Navigations return at DOMContentLoaded (`pageLoadStrategy: eager`) and
    /// fail once `page_load_timeout` elapses.
    pub async fn connect(
        webdriver_url: &str,
        headless: bool,
        stealth_profile: StealthProfile,
        page_load_timeout: Duration,
    ) -> Result<Self> {
        let session_id = Uuid::new_v4();
        let mut user_agent_manager = UserAgentManager::new();
        let mut args = build_stealth_arguments(&stealth_profile, user_agent_manager.get_session_profile());

        if headless {
            args.push("--headless=new".to_string());
            if !args.iter().any(|a| a == "--disable-gpu") {
                args.push("--disable-gpu".to_string());
            }
        }

        let mut caps = Capabilities::new();
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
        caps.insert("pageLoadStrategy".to_string(), json!("eager"));

        debug!(target: "browser.driver", %session_id, %webdriver_url, headless, ?stealth_profile, "session.connecting");

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(webdriver_url)
            .await
            .with_context(|| format!("connecting to webdriver at {webdriver_url}"))?;

        client
            .update_timeouts(TimeoutConfiguration::new(None, Some(page_load_timeout), None))
            .await
            .context("setting page load timeout")?;

        info!(target: "browser.driver", %session_id, "session.opened");

        Ok(Self {
            client,
            session_id,
            behavioral_engine: BehavioralEngine::new(),
            user_agent_manager,
            stealth_profile,
        })
    }

    /// Navigate to `url` and return a [`ScoutPage`] with stealth/fingerprint
    /// scripts applied.
    pub async fn goto(&mut self, url: &str) -> Result<ScoutPage> {
        let mut page = ScoutPage::new(
            self.client.clone(),
            self.stealth_profile,
            self.user_agent_manager.clone(),
            self.behavioral_engine.clone(),
        );
        page.goto(url)
            .await
            .with_context(|| format!("navigating to {url}"))?;
        Ok(page)
    }

    /// Close the underlying browser session.
    pub async fn close(self) -> Result<()> {
        let session_id = self.session_id;
        self.client.close().await?;
        debug!(target: "browser.driver", %session_id, "session.closed");
        Ok(())
    }
}
