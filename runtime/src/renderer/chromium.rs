// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chromium-based page backend using chromiumoxide.

use super::{NavigationResult, RenderContext, Renderer, WaitPolicy, WaitState};
use crate::dom::{DomQuery, ElementSnapshot};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::layout::Point;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

/// Poll interval for `wait_for_selector`.
const WAIT_POLL: Duration = Duration::from_millis(100);

/// Extra quiet time granted to `WaitPolicy::NetworkIdle`.
const NETWORK_IDLE_GRACE: Duration = Duration::from_millis(500);

/// In-page implementation of [`DomQuery`]. `__QUERY__` is replaced by the
/// JSON-encoded query, so no caller string is ever spliced into code.
const QUERY_SCRIPT: &str = r#"(() => {
  const q = __QUERY__;
  const clean = t => (t || '').replace(/\s+/g, ' ').trim();
  const scopes = q.within ? Array.from(document.querySelectorAll(q.within)) : [document];
  const seen = new Set();
  const els = [];
  outer: for (const scope of scopes) {
    for (const el of scope.querySelectorAll(q.selector)) {
      if (seen.has(el)) continue;
      seen.add(el);
      els.push(el);
      if (q.limit !== null && els.length >= q.limit) break outer;
    }
  }
  const ancestry = el => {
    const path = [];
    for (let n = el; n && n.nodeType === 1; n = n.parentElement) {
      let nth = 1;
      for (let s = n.previousElementSibling; s; s = s.previousElementSibling) {
        if (s.tagName === n.tagName) nth++;
      }
      path.unshift({ tag: n.tagName.toLowerCase(), id: n.id || null, nth_of_type: nth });
    }
    return path;
  };
  const siblingText = el => {
    for (const n of [el.nextSibling, el.previousSibling]) {
      if (!n) continue;
      const t = clean(n.nodeType === 3 ? n.textContent : n.innerText);
      if (t) return t;
    }
    return null;
  };
  const labelHints = el => {
    let labelFor = null;
    if (el.id) {
      const l = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
      if (l) labelFor = clean(l.innerText) || null;
    }
    const enclosing = el.closest('label');
    return {
      label_for: labelFor,
      enclosing_label: enclosing ? (clean(enclosing.innerText) || null) : null,
      sibling_text: siblingText(el),
    };
  };
  const card = el => {
    const root = el.closest('[data-product-id],[data-product],[class*="product"],article,li') || el.parentElement;
    if (!root) return null;
    const texts = [];
    for (const t of root.querySelectorAll('h1,h2,h3,h4,h5,h6,[class*="title"],[class*="name"]')) {
      const v = clean(t.innerText);
      if (v) texts.push(v);
    }
    const img = root.querySelector('img');
    if (img && img.alt) texts.push(clean(img.alt));
    const price = root.querySelector('[itemprop="price"],[class*="price"],[data-price]');
    let image = null;
    if (img) {
      image = img.currentSrc || img.getAttribute('src') || img.getAttribute('data-src');
      if (!image && img.getAttribute('srcset')) image = img.getAttribute('srcset').split(',')[0].trim().split(' ')[0];
    }
    return { texts, price_text: price ? (clean(price.innerText) || price.getAttribute('content')) : null, image };
  };
  return els.map(el => {
    const cs = getComputedStyle(el);
    const r = el.getBoundingClientRect();
    const attributes = {};
    for (const name of ['id', 'class', ...q.attributes]) {
      const v = el.getAttribute(name);
      if (v !== null) attributes[name] = v;
    }
    return {
      tag: el.tagName.toLowerCase(),
      text: clean(el.innerText || el.textContent),
      attributes,
      href: el.tagName === 'A' && el.href ? el.href : null,
      checked: !!el.checked,
      style: { display: cs.display, visibility: cs.visibility, opacity: parseFloat(cs.opacity) },
      bounding_box: { x: r.x, y: r.y, width: r.width, height: r.height },
      ancestry: ancestry(el),
      label_hints: q.label_hints ? labelHints(el) : null,
      card: q.card_context ? card(el) : null,
    };
  });
})()"#;

const SET_STYLE_SCRIPT: &str = r#"(() => {
  const args = __ARGS__;
  const els = document.querySelectorAll(args.selector);
  for (const el of els) {
    for (const [prop, value] of args.declarations) {
      if (value === '') el.style.removeProperty(prop);
      else el.style.setProperty(prop, value, 'important');
    }
  }
  return els.length;
})()"#;

const CHROMIUM_ENV: &str = "AISLE_CHROMIUM_PATH";

/// Browser binaries unpacked under `~/.aisle/chromium`.
const BUNDLED_BINARIES: &[&str] = &[
    "chrome-linux64/chrome",
    "chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
    "chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
    "chrome",
];

const PATH_BINARIES: &[&str] = &["google-chrome", "chromium", "chromium-browser"];

/// Locate a Chromium binary: `AISLE_CHROMIUM_PATH`, then the bundled
/// download under `~/.aisle/chromium`, then `PATH`.
pub fn find_chromium() -> Option<PathBuf> {
    let from_env = std::env::var_os(CHROMIUM_ENV).map(PathBuf::from);
    let bundled = dirs::home_dir()
        .map(|home| home.join(".aisle/chromium"))
        .into_iter()
        .flat_map(|root| BUNDLED_BINARIES.iter().map(move |b| root.join(b)));

    from_env
        .into_iter()
        .chain(bundled)
        .find(|p| p.is_file())
        .or_else(|| PATH_BINARIES.iter().find_map(|name| which::which(name).ok()))
}

/// Launch settings for the headless browser.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub executable: Option<PathBuf>,
    pub window: (u32, u32),
    pub extra_args: Vec<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            executable: None,
            window: (1440, 900),
            extra_args: Vec::new(),
        }
    }
}

/// Headless Chromium. Each context is one tab.
pub struct ChromiumRenderer {
    browser: Browser,
    events: JoinHandle<()>,
    open_pages: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    pub async fn new() -> Result<Self> {
        Self::launch(LaunchOptions::default()).await
    }

    pub async fn launch(options: LaunchOptions) -> Result<Self> {
        let executable = match options.executable {
            Some(path) => path,
            None => find_chromium()
                .with_context(|| format!("no Chromium binary found; set {CHROMIUM_ENV}"))?,
        };
        debug!(path = %executable.display(), "launching Chromium");

        let (width, height) = options.window;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .window_size(width, height);
        for arg in [
            "--headless=new",
            "--disable-gpu",
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--disable-extensions",
            "--disable-blink-features=AutomationControlled",
        ]
        .into_iter()
        .map(String::from)
        .chain(options.extra_args)
        {
            builder = builder.arg(arg);
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("invalid browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Chromium failed to start")?;
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser event error");
                }
            }
        });

        Ok(Self {
            browser,
            events,
            open_pages: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("could not open a tab")?;
        let open = self.open_pages.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(open, "tab opened");
        Ok(Box::new(ChromiumContext {
            page,
            open_pages: Arc::clone(&self.open_pages),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        self.events.abort();
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.open_pages.load(Ordering::Relaxed)
    }
}

/// One Chromium tab.
pub struct ChromiumContext {
    page: Page,
    open_pages: Arc<AtomicUsize>,
}

impl ChromiumContext {
    async fn find(
        &self,
        selector: &str,
        timeout_ms: u64,
    ) -> Result<chromiumoxide::element::Element> {
        match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.page.find_element(selector),
        )
        .await
        {
            Ok(found) => found.with_context(|| format!("element not found: {selector}")),
            Err(_) => bail!("timed out after {timeout_ms}ms locating {selector}"),
        }
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitPolicy,
        timeout_ms: u64,
    ) -> Result<NavigationResult> {
        let started = Instant::now();
        tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.goto(url))
            .await
            .map_err(|_| anyhow!("loading {url} took longer than {timeout_ms}ms"))?
            .with_context(|| format!("could not load {url}"))?;

        match wait {
            WaitPolicy::DomContentLoaded => {}
            WaitPolicy::Load => {
                let _ = self.page.wait_for_navigation().await;
            }
            WaitPolicy::NetworkIdle => {
                let _ = self.page.wait_for_navigation().await;
                tokio::time::sleep(NETWORK_IDLE_GRACE).await;
            }
        }

        // The protocol response is not surfaced by chromiumoxide's goto.
        Ok(NavigationResult {
            final_url: self.get_url().await.unwrap_or_else(|_| url.to_string()),
            status: 200,
            load_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        self.page
            .evaluate(script)
            .await
            .context("script evaluation failed")?
            .into_value()
            .map_err(|e| anyhow!("script returned a non-JSON value: {e:?}"))
    }

    async fn query(&self, query: &DomQuery) -> Result<Vec<ElementSnapshot>> {
        let encoded = serde_json::to_string(query)?;
        let value = self
            .execute_js(&QUERY_SCRIPT.replace("__QUERY__", &encoded))
            .await
            .with_context(|| format!("query failed: {}", query.selector))?;
        Ok(serde_json::from_value(value)?)
    }

    async fn hover(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        let element = self.find(selector, timeout_ms).await?;
        element.scroll_into_view().await?;
        element.hover().await?;
        Ok(())
    }

    async fn click(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        let element = self.find(selector, timeout_ms).await?;
        element.scroll_into_view().await?;
        element.click().await?;
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: WaitState,
        timeout_ms: u64,
    ) -> Result<bool> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let query = DomQuery::new(selector);
        loop {
            let found = self.query(&query).await.unwrap_or_default();
            let reached = match state {
                WaitState::Attached => !found.is_empty(),
                WaitState::Visible => found.iter().any(ElementSnapshot::is_visible),
                WaitState::Hidden => found.iter().all(|s| !s.is_visible()),
            };
            if reached {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                debug!(selector, ?state, "wait_for_selector timed out");
                return Ok(false);
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }

    async fn mouse_move(&self, x: f64, y: f64) -> Result<()> {
        self.page.move_mouse(Point::new(x, y)).await?;
        Ok(())
    }

    async fn set_style(&self, selector: &str, declarations: &[(String, String)]) -> Result<usize> {
        let args = serde_json::json!({ "selector": selector, "declarations": declarations });
        let touched = self
            .execute_js(&SET_STYLE_SCRIPT.replace("__ARGS__", &args.to_string()))
            .await?;
        Ok(touched.as_u64().unwrap_or(0) as usize)
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self
            .page
            .url()
            .await
            .context("could not read the tab URL")?
            .unwrap_or_default())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.open_pages.fetch_sub(1, Ordering::Relaxed);
        if let Err(e) = self.page.close().await {
            debug!(error = %e, "tab close failed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_script_embeds_json() {
        let q = DomQuery::new("a[href=\"x\"]").limit(3);
        let script = QUERY_SCRIPT.replace("__QUERY__", &serde_json::to_string(&q).unwrap());
        assert!(script.contains(r#""selector":"a[href=\"x\"]""#));
        assert!(script.contains(r#""limit":3"#));
        assert!(!script.contains("__QUERY__"));
    }

    #[tokio::test]
    #[ignore = "needs a local Chromium"]
    async fn test_chromium_query_and_style() {
        let renderer = ChromiumRenderer::launch(LaunchOptions::default()).await.unwrap();
        let mut ctx = renderer.new_context().await.unwrap();
        assert_eq!(renderer.active_contexts(), 1);

        ctx.navigate(
            "data:text/html,<nav><a id='x' href='/a'>Shoes</a><div class='dd' style='display:none'>x</div></nav>",
            WaitPolicy::Load,
            10_000,
        )
        .await
        .expect("navigation failed");

        let found = ctx.query(&DomQuery::new("nav a")).await.expect("query failed");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "Shoes");
        assert_eq!(found[0].selector(), "#x");

        let touched = ctx
            .set_style(".dd", &super::super::declarations(&[("display", "block")]))
            .await
            .expect("set_style failed");
        assert_eq!(touched, 1);
        assert!(ctx
            .wait_for_selector(".dd", WaitState::Visible, 1_000)
            .await
            .unwrap());

        ctx.close().await.expect("close failed");
        assert_eq!(renderer.active_contexts(), 0);
    }
}
