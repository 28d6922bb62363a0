use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use thirtyfour::prelude::*;
use thirtyfour::ChromiumLikeCapabilities;
use tracing::{debug, info};

use super::PageDriver;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// chromedriver (or Selenium) endpoint.
    pub server_url: String,
    pub headless: bool,
    pub window: (u32, u32),
}

impl BrowserOptions {
    pub fn new(server_url: &str, headless: bool) -> Self {
        Self {
            server_url: server_url.to_string(),
            headless,
            window: (1920, 1080),
        }
    }

    fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.headless {
            args.push("--headless".to_string());
        }
        args.extend(
            ["--disable-gpu", "--no-sandbox", "--disable-dev-shm-usage"]
                .iter()
                .map(|a| a.to_string()),
        );
        args.push(format!("--window-size={},{}", self.window.0, self.window.1));
        args
    }
}

/// A Chrome session driven over the WebDriver protocol.
pub struct WebDriverSession {
    driver: WebDriver,
}

impl WebDriverSession {
    pub async fn launch(opts: &BrowserOptions) -> Result<Self> {
        info!("Initializing browser via {}...", opts.server_url);
        let mut caps = DesiredCapabilities::chrome();
        for arg in opts.args() {
            caps.add_arg(&arg)?;
        }
        debug!(args = ?opts.args(), "Chrome capabilities");

        let driver = WebDriver::new(opts.server_url.as_str(), caps)
            .await
            .with_context(|| format!("Failed to start a browser session via {}", opts.server_url))?;
        Ok(Self { driver })
    }

    async fn run_script(&self, script: &str, element: &WebElement) -> Result<()> {
        self.driver.execute(script, vec![element.to_json()?]).await?;
        Ok(())
    }
}

impl PageDriver for WebDriverSession {
    type Element = WebElement;

    async fn navigate(&self, url: &str) -> Result<()> {
        self.driver.goto(url).await?;
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]")?);
        spinner.set_message(format!("Waiting for {}", selector));
        spinner.enable_steady_tick(Duration::from_millis(100));

        let found = self
            .driver
            .query(By::Css(selector))
            .wait(timeout, POLL_INTERVAL)
            .first()
            .await;
        spinner.finish_and_clear();

        found.with_context(|| format!("Timed out after {:.0?} waiting for {}", timeout, selector))?;
        info!("Page loaded");
        Ok(())
    }

    async fn find(&self, scope: Option<&WebElement>, selector: &str) -> Result<WebElement> {
        let element = match scope {
            Some(parent) => parent.find(By::Css(selector)).await,
            None => self.driver.find(By::Css(selector)).await,
        };
        element.with_context(|| format!("Element {} not found", selector))
    }

    async fn find_all(&self, scope: Option<&WebElement>, selector: &str) -> Result<Vec<WebElement>> {
        let elements = match scope {
            Some(parent) => parent.find_all(By::Css(selector)).await?,
            None => self.driver.find_all(By::Css(selector)).await?,
        };
        Ok(elements)
    }

    async fn text(&self, element: &WebElement) -> Result<String> {
        Ok(element.text().await?)
    }

    async fn attr(&self, element: &WebElement, name: &str) -> Result<Option<String>> {
        Ok(element.attr(name).await?)
    }

    async fn is_displayed(&self, element: &WebElement) -> Result<bool> {
        Ok(element.is_displayed().await?)
    }

    // Script click: the sticky header intercepts native clicks on some spoilers.
    async fn click(&self, element: &WebElement) -> Result<()> {
        self.run_script("arguments[0].click();", element).await
    }

    async fn scroll_into_view(&self, element: &WebElement) -> Result<()> {
        self.run_script("arguments[0].scrollIntoView({block: 'center'});", element)
            .await
    }

    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn quit(self) -> Result<()> {
        self.driver.quit().await?;
        Ok(())
    }
}
