// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Offline page backend over saved HTML.
//!
//! A [`FixtureSite`] is a set of `url → html` documents plus a few interaction
//! rules (hover reveals, click effects). [`FixturePage`] implements the full
//! [`RenderContext`] capability against it with `scraper`, approximating the
//! browser where the engines care:
//!
//! - computed visibility comes from inline `style`, the `hidden` attribute,
//!   hover reveals and `set_style` overrides;
//! - descendants of a `display:none` ancestor report an empty bounding box;
//! - clicking an anchor (or an input carrying `data-href`) navigates, clicking
//!   a checkbox/radio toggles `checked`, clicking a button toggles `aria-pressed`.
//!
//! Used by the engine tests and by the CLI's `--offline` replay mode.

use super::{NavigationResult, RenderContext, Renderer, WaitPolicy, WaitState};
use crate::dom::{
    collapse_whitespace, BoundingBox, CardContext, ComputedStyle, DomQuery, ElementSnapshot,
    LabelHints, PathSegment,
};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const BLANK_DOCUMENT: &str = "<html><head></head><body></body></html>";

const CARD_SELECTOR: &str = r#"[data-product-id], [data-product], [class*="product"], article, li"#;
const CARD_TEXT_SELECTOR: &str = r#"h1, h2, h3, h4, h5, h6, [class*="title"], [class*="name"]"#;
const CARD_PRICE_SELECTOR: &str = r#"[itemprop="price"], [class*="price"], [data-price]"#;

/// What happens when an element matching a click rule is clicked.
#[derive(Debug, Clone)]
pub enum ClickEffect {
    /// Load another fixture page.
    Navigate(String),
    /// Force elements matching the selector visible.
    Reveal(String),
}

#[derive(Debug, Clone)]
struct HoverRule {
    trigger: String,
    target: String,
}

#[derive(Debug, Clone)]
struct ClickRule {
    selector: String,
    effect: ClickEffect,
}

/// Documents and interaction rules shared by every page opened on the site.
#[derive(Debug, Clone, Default)]
pub struct FixtureSite {
    pages: HashMap<String, String>,
    hover_rules: Vec<HoverRule>,
    click_rules: Vec<ClickRule>,
    hover_delay: Duration,
}

impl FixtureSite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document.
    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(page_key(url), html.to_string());
        self
    }

    /// Hovering an element matching `trigger` (or inside one) shows `target`.
    pub fn hover_reveal(mut self, trigger: &str, target: &str) -> Self {
        self.hover_rules.push(HoverRule {
            trigger: trigger.to_string(),
            target: target.to_string(),
        });
        self
    }

    pub fn on_click(mut self, selector: &str, effect: ClickEffect) -> Self {
        self.click_rules.push(ClickRule {
            selector: selector.to_string(),
            effect,
        });
        self
    }

    /// Latency applied before a hover takes effect.
    pub fn hover_delay(mut self, delay: Duration) -> Self {
        self.hover_delay = delay;
        self
    }

    /// Load every `*.html` file in `dir`. `index.html` maps to `base_url/`;
    /// other stems map to paths with `__` standing for `/` and `~` for `?`,
    /// so `c__shoes~color=red.html` is `base_url/c/shoes?color=red`.
    pub fn from_dir(dir: &Path, base_url: &str) -> Result<Self> {
        let base = base_url.trim_end_matches('/');
        let mut site = Self::new();
        let entries =
            std::fs::read_dir(dir).with_context(|| format!("cannot read {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            let url = if stem == "index" {
                format!("{base}/")
            } else {
                format!("{base}/{}", stem.replace("__", "/").replace('~', "?"))
            };
            let html = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            site.pages.insert(page_key(&url), html);
        }
        Ok(site)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Renderer handing out [`FixturePage`]s over one site.
pub struct FixtureRenderer {
    site: FixtureSite,
    active: Arc<AtomicUsize>,
}

impl FixtureRenderer {
    pub fn new(site: FixtureSite) -> Self {
        Self {
            site,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Renderer for FixtureRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        self.active.fetch_add(1, Ordering::Relaxed);
        let mut page = FixturePage::new(self.site.clone());
        page.active = Some(Arc::clone(&self.active));
        Ok(Box::new(page))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct PageState {
    url: String,
    html: String,
    /// Element key → property → value, from `set_style` and click reveals.
    style_overrides: HashMap<String, BTreeMap<String, String>>,
    attr_overrides: HashMap<String, BTreeMap<String, String>>,
    checked_overrides: HashMap<String, bool>,
    /// Keys of the hovered element and its ancestors.
    hovered: Vec<String>,
    actions: Vec<String>,
    visits: Vec<String>,
}

/// One offline page session.
pub struct FixturePage {
    site: FixtureSite,
    state: Mutex<PageState>,
    active: Option<Arc<AtomicUsize>>,
}

impl FixturePage {
    pub fn new(site: FixtureSite) -> Self {
        Self {
            site,
            state: Mutex::new(PageState {
                url: "about:blank".to_string(),
                html: BLANK_DOCUMENT.to_string(),
                ..Default::default()
            }),
            active: None,
        }
    }

    /// Every hover/click/mouse/style action, in order.
    pub fn action_log(&self) -> Vec<String> {
        self.lock().actions.clone()
    }

    /// Every URL passed to `navigate` (or reached by clicking), in order.
    pub fn visits(&self) -> Vec<String> {
        self.lock().visits.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load(&self, state: &mut PageState, url: &str) -> Option<()> {
        let html = self.site.pages.get(&page_key(url))?;
        state.url = url.to_string();
        state.html = html.clone();
        state.style_overrides.clear();
        state.attr_overrides.clear();
        state.checked_overrides.clear();
        state.hovered.clear();
        state.visits.push(url.to_string());
        Some(())
    }

    fn hover_targets(&self, doc: &Html, state: &PageState) -> HashSet<String> {
        let mut targets = HashSet::new();
        if state.hovered.is_empty() {
            return targets;
        }
        for rule in &self.site.hover_rules {
            let (Ok(trigger), Ok(target)) =
                (Selector::parse(&rule.trigger), Selector::parse(&rule.target))
            else {
                continue;
            };
            let triggered = doc
                .select(&trigger)
                .any(|el| state.hovered.contains(&element_key(el)));
            if triggered {
                targets.extend(doc.select(&target).map(element_key));
            }
        }
        targets
    }

    fn declared_style(
        el: ElementRef<'_>,
        state: &PageState,
        hover_targets: &HashSet<String>,
    ) -> BTreeMap<String, String> {
        let mut decls = parse_inline_style(el.value().attr("style").unwrap_or(""));
        if el.value().attr("hidden").is_some() {
            decls.insert("display".into(), "none".into());
        }
        let key = element_key(el);
        if hover_targets.contains(&key) {
            decls.insert("display".into(), "block".into());
            decls.insert("visibility".into(), "visible".into());
            decls.insert("opacity".into(), "1".into());
        }
        if let Some(overrides) = state.style_overrides.get(&key) {
            decls.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        decls
    }

    fn snapshot(
        &self,
        el: ElementRef<'_>,
        query: &DomQuery,
        doc: &Html,
        state: &PageState,
        hover_targets: &HashSet<String>,
    ) -> ElementSnapshot {
        let key = element_key(el);
        let value = el.value();

        let mut attributes = BTreeMap::new();
        let overrides = state.attr_overrides.get(&key);
        for name in ["id", "class"]
            .into_iter()
            .chain(query.attributes.iter().map(String::as_str))
        {
            let v = overrides
                .and_then(|o| o.get(name).cloned())
                .or_else(|| value.attr(name).map(String::from));
            if let Some(v) = v {
                attributes.insert(name.to_string(), v);
            }
        }

        let href = (value.name() == "a")
            .then(|| value.attr("href"))
            .flatten()
            .and_then(|h| resolve(&state.url, h));

        let checked = state
            .checked_overrides
            .get(&key)
            .copied()
            .unwrap_or_else(|| value.attr("checked").is_some());

        let decls = Self::declared_style(el, state, hover_targets);
        let style = computed_style(&decls);

        let collapsed = std::iter::once(el)
            .chain(el.ancestors().filter_map(ElementRef::wrap))
            .any(|node| {
                computed_style(&Self::declared_style(node, state, hover_targets)).display == "none"
            });
        let bounding_box = Some(if collapsed {
            BoundingBox::default()
        } else {
            BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 20.0,
            }
        });

        ElementSnapshot {
            tag: value.name().to_string(),
            text: collapse_whitespace(&el.text().collect::<String>()),
            attributes,
            href,
            checked,
            style,
            bounding_box,
            ancestry: ancestry(el),
            label_hints: query.label_hints.then(|| label_hints(el, doc)),
            card: if query.card_context {
                card_context(el)
            } else {
                None
            },
        }
    }

    fn first_match(&self, html: &str, selector: &str) -> Result<(String, ElementInfo)> {
        let doc = Html::parse_document(html);
        let sel = parse_selector(selector)?;
        let el = doc
            .select(&sel)
            .next()
            .ok_or_else(|| anyhow!("element not found: {selector}"))?;
        Ok((element_key(el), ElementInfo::of(el)))
    }
}

/// The bits of a clicked/hovered element needed after the document is dropped.
struct ElementInfo {
    tag: String,
    input_type: Option<String>,
    href: Option<String>,
    data_href: Option<String>,
    aria_pressed: Option<String>,
    checked: bool,
    ancestor_keys: Vec<String>,
    anchor_href: Option<String>,
}

impl ElementInfo {
    fn of(el: ElementRef<'_>) -> Self {
        let mut ancestor_keys: Vec<String> = el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .map(element_key)
            .collect();
        ancestor_keys.insert(0, element_key(el));
        let anchor_href = el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|a| a.value().name() == "a")
            .and_then(|a| a.value().attr("href").map(String::from));
        Self {
            tag: el.value().name().to_string(),
            input_type: el.value().attr("type").map(|t| t.to_ascii_lowercase()),
            href: el.value().attr("href").map(String::from),
            data_href: el.value().attr("data-href").map(String::from),
            aria_pressed: el.value().attr("aria-pressed").map(String::from),
            checked: el.value().attr("checked").is_some(),
            ancestor_keys,
            anchor_href,
        }
    }
}

#[async_trait]
impl RenderContext for FixturePage {
    async fn navigate(
        &mut self,
        url: &str,
        _wait: WaitPolicy,
        _timeout_ms: u64,
    ) -> Result<NavigationResult> {
        let mut state = self.lock();
        if self.load(&mut state, url).is_none() {
            bail!("navigation failed: no fixture page for {url}");
        }
        Ok(NavigationResult {
            final_url: url.to_string(),
            status: 200,
            load_time_ms: 0,
        })
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let mut state = self.lock();
        let head: String = script.chars().take(40).collect();
        state.actions.push(format!("js {head}"));
        Ok(serde_json::Value::Null)
    }

    async fn query(&self, query: &DomQuery) -> Result<Vec<ElementSnapshot>> {
        let state = self.lock();
        let doc = Html::parse_document(&state.html);
        let sel = parse_selector(&query.selector)?;
        let hover_targets = self.hover_targets(&doc, &state);

        let mut seen = HashSet::new();
        let mut matched: Vec<ElementRef<'_>> = Vec::new();
        match &query.within {
            Some(scope) => {
                let scope_sel = parse_selector(scope)?;
                for root in doc.select(&scope_sel) {
                    for el in root.select(&sel) {
                        if seen.insert(element_key(el)) {
                            matched.push(el);
                        }
                    }
                }
            }
            None => {
                for el in doc.select(&sel) {
                    if seen.insert(element_key(el)) {
                        matched.push(el);
                    }
                }
            }
        }
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }

        Ok(matched
            .into_iter()
            .map(|el| self.snapshot(el, query, &doc, &state, &hover_targets))
            .collect())
    }

    async fn hover(&self, selector: &str, _timeout_ms: u64) -> Result<()> {
        let html = self.lock().html.clone();
        let (_, info) = self.first_match(&html, selector)?;
        if !self.site.hover_delay.is_zero() {
            tokio::time::sleep(self.site.hover_delay).await;
        }
        let mut state = self.lock();
        state.hovered = info.ancestor_keys;
        state.actions.push(format!("hover {selector}"));
        Ok(())
    }

    async fn click(&self, selector: &str, _timeout_ms: u64) -> Result<()> {
        let mut state = self.lock();
        let (key, info) = self.first_match(&state.html, selector)?;
        state.actions.push(format!("click {selector}"));

        // Explicit rules win over default behaviour.
        let doc = Html::parse_document(&state.html);
        let mut effect = None;
        for rule in &self.site.click_rules {
            let Ok(sel) = Selector::parse(&rule.selector) else {
                continue;
            };
            if doc
                .select(&sel)
                .any(|el| info.ancestor_keys.contains(&element_key(el)))
            {
                effect = Some(rule.effect.clone());
                break;
            }
        }
        let reveal_keys: Vec<String> = match &effect {
            Some(ClickEffect::Reveal(target)) => {
                let sel = parse_selector(target)?;
                doc.select(&sel).map(element_key).collect()
            }
            _ => Vec::new(),
        };
        drop(doc);

        let navigate_to = match effect {
            Some(ClickEffect::Navigate(url)) => Some(url),
            Some(ClickEffect::Reveal(_)) => {
                for k in reveal_keys {
                    let o = state.style_overrides.entry(k).or_default();
                    o.insert("display".into(), "block".into());
                    o.insert("visibility".into(), "visible".into());
                    o.insert("opacity".into(), "1".into());
                }
                None
            }
            None => {
                let is_toggle = info.tag == "input"
                    && matches!(info.input_type.as_deref(), Some("checkbox") | Some("radio"));
                if is_toggle {
                    let was = state
                        .checked_overrides
                        .get(&key)
                        .copied()
                        .unwrap_or(info.checked);
                    state.checked_overrides.insert(key.clone(), !was);
                }
                if info.tag == "button" {
                    let pressed = info.aria_pressed.as_deref() == Some("true");
                    let overrides = state.attr_overrides.entry(key.clone()).or_default();
                    let now = overrides
                        .get("aria-pressed")
                        .map(|v| v == "true")
                        .unwrap_or(pressed);
                    overrides.insert("aria-pressed".into(), (!now).to_string());
                }
                let target = if info.tag == "a" {
                    info.href.clone()
                } else {
                    info.data_href.clone().or(info.anchor_href.clone())
                };
                // Fragment-only links do not reload the document.
                target
                    .and_then(|h| resolve(&state.url, &h))
                    .filter(|u| page_key(u) != page_key(&state.url))
            }
        };

        if let Some(url) = navigate_to {
            if self.load(&mut state, &url).is_none() {
                state.url = url.clone();
                state.html = BLANK_DOCUMENT.to_string();
                state.visits.push(url);
            }
        }
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: WaitState,
        _timeout_ms: u64,
    ) -> Result<bool> {
        let found = self.query(&DomQuery::new(selector)).await?;
        Ok(match state {
            WaitState::Attached => !found.is_empty(),
            WaitState::Visible => found.iter().any(ElementSnapshot::is_visible),
            WaitState::Hidden => found.iter().all(|s| !s.is_visible()),
        })
    }

    async fn mouse_move(&self, x: f64, y: f64) -> Result<()> {
        let mut state = self.lock();
        state.hovered.clear();
        state.actions.push(format!("mouse {x:.0},{y:.0}"));
        Ok(())
    }

    async fn set_style(&self, selector: &str, declarations: &[(String, String)]) -> Result<usize> {
        let mut state = self.lock();
        let doc = Html::parse_document(&state.html);
        let sel = parse_selector(selector)?;
        let keys: Vec<String> = doc.select(&sel).map(element_key).collect();
        drop(doc);
        for key in &keys {
            let overrides = state.style_overrides.entry(key.clone()).or_default();
            for (prop, value) in declarations {
                if value.is_empty() {
                    overrides.remove(prop);
                } else {
                    overrides.insert(prop.clone(), value.clone());
                }
            }
        }
        let summary = declarations
            .iter()
            .map(|(k, v)| format!("{k}:{v}"))
            .collect::<Vec<_>>()
            .join(";");
        state.actions.push(format!("style {selector} {summary}"));
        Ok(keys.len())
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self.lock().url.clone())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        if let Some(active) = &self.active {
            active.fetch_sub(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

fn page_key(url: &str) -> String {
    let trimmed = url.trim();
    let trimmed = trimmed.split_once('#').map_or(trimmed, |(head, _)| head);
    match trimmed.split_once('?') {
        Some((path, query)) => format!("{}?{query}", path.trim_end_matches('/')),
        None => trimmed.trim_end_matches('/').to_string(),
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("invalid selector {selector}: {e:?}"))
}

fn resolve(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if href.starts_with("javascript:") || href.starts_with("mailto:") || href.starts_with("tel:") {
        return Some(href.to_string());
    }
    match url::Url::parse(base) {
        Ok(base) => base.join(href).ok().map(|u| u.to_string()),
        Err(_) => url::Url::parse(href).ok().map(|u| u.to_string()),
    }
}

fn segment(el: ElementRef<'_>) -> PathSegment {
    let name = el.value().name();
    let nth = 1 + el
        .prev_siblings()
        .filter_map(ElementRef::wrap)
        .filter(|s| s.value().name() == name)
        .count();
    PathSegment {
        tag: name.to_string(),
        id: el.value().id().map(String::from),
        nth_of_type: nth,
    }
}

fn ancestry(el: ElementRef<'_>) -> Vec<PathSegment> {
    let mut path: Vec<PathSegment> = el
        .ancestors()
        .filter_map(ElementRef::wrap)
        .map(segment)
        .collect();
    path.reverse();
    path.push(segment(el));
    path
}

fn element_key(el: ElementRef<'_>) -> String {
    ancestry(el)
        .iter()
        .map(|s| format!("{}[{}]", s.tag, s.nth_of_type))
        .collect::<Vec<_>>()
        .join("/")
}

fn parse_inline_style(style: &str) -> BTreeMap<String, String> {
    style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .map(|(k, v)| {
            (
                k.trim().to_ascii_lowercase(),
                v.trim().trim_end_matches("!important").trim().to_string(),
            )
        })
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

fn computed_style(decls: &BTreeMap<String, String>) -> ComputedStyle {
    let mut style = ComputedStyle::default();
    if let Some(d) = decls.get("display") {
        style.display = d.clone();
    }
    if let Some(v) = decls.get("visibility") {
        style.visibility = v.clone();
    }
    if let Some(o) = decls.get("opacity").and_then(|o| o.parse::<f32>().ok()) {
        style.opacity = o;
    }
    style
}

fn non_empty(text: String) -> Option<String> {
    let t = collapse_whitespace(&text);
    (!t.is_empty()).then_some(t)
}

fn label_hints(el: ElementRef<'_>, doc: &Html) -> LabelHints {
    let label_for = el.value().id().and_then(|id| {
        let labels = Selector::parse("label[for]").ok()?;
        doc.select(&labels)
            .find(|l| l.value().attr("for") == Some(id))
            .and_then(|l| non_empty(l.text().collect()))
    });
    let enclosing_label = el
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "label")
        .and_then(|l| non_empty(l.text().collect()));
    let sibling_text = [el.next_sibling(), el.prev_sibling()]
        .into_iter()
        .flatten()
        .find_map(|node| {
            if let Some(text) = node.value().as_text() {
                non_empty(text.to_string())
            } else {
                ElementRef::wrap(node).and_then(|e| non_empty(e.text().collect()))
            }
        });
    LabelHints {
        label_for,
        enclosing_label,
        sibling_text,
    }
}

fn card_context(el: ElementRef<'_>) -> Option<CardContext> {
    let card_sel = Selector::parse(CARD_SELECTOR).ok()?;
    let text_sel = Selector::parse(CARD_TEXT_SELECTOR).ok()?;
    let price_sel = Selector::parse(CARD_PRICE_SELECTOR).ok()?;
    let img_sel = Selector::parse("img").ok()?;

    let root = el
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| card_sel.matches(a))
        .or_else(|| el.parent().and_then(ElementRef::wrap))?;

    let mut texts: Vec<String> = root
        .select(&text_sel)
        .filter_map(|t| non_empty(t.text().collect()))
        .collect();
    let img = root.select(&img_sel).next();
    if let Some(alt) = img.and_then(|i| i.value().attr("alt")) {
        if let Some(alt) = non_empty(alt.to_string()) {
            texts.push(alt);
        }
    }
    let price_text = root.select(&price_sel).next().and_then(|p| {
        non_empty(p.text().collect()).or_else(|| p.value().attr("content").map(String::from))
    });
    let image = img.and_then(|i| {
        i.value()
            .attr("src")
            .or_else(|| i.value().attr("data-src"))
            .map(String::from)
            .or_else(|| {
                i.value()
                    .attr("srcset")
                    .and_then(|s| s.split(',').next())
                    .and_then(|s| s.split_whitespace().next())
                    .map(String::from)
            })
    });
    Some(CardContext {
        texts,
        price_text,
        image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MENU: &str = r#"<html><body>
        <nav><ul>
          <li class="item" id="shoes"><a href="/c/shoes">Shoes</a>
            <div class="dd" style="display:none"><a href="/c/boots">Boots</a></div>
          </li>
        </ul></nav>
        <label for="red">Red (4)</label><input type="checkbox" id="red" name="color">
        </body></html>"#;

    fn site() -> FixtureSite {
        FixtureSite::new()
            .page("https://shop.test/", MENU)
            .page("https://shop.test/c/shoes", "<html><body><h1>Shoes</h1></body></html>")
            .hover_reveal("li.item", ".dd")
    }

    #[tokio::test]
    async fn test_hover_reveals_and_mouse_move_clears() {
        let mut page = FixturePage::new(site());
        page.navigate("https://shop.test/", WaitPolicy::Load, 1000)
            .await
            .unwrap();

        assert!(!page.wait_for_selector(".dd", WaitState::Visible, 10).await.unwrap());
        let hidden_link = page.query(&DomQuery::new(".dd a")).await.unwrap();
        assert!(!hidden_link[0].is_visible());

        page.hover("li.item > a", 100).await.unwrap();
        assert!(page.wait_for_selector(".dd", WaitState::Visible, 10).await.unwrap());

        page.mouse_move(3.0, 3.0).await.unwrap();
        assert!(!page.wait_for_selector(".dd", WaitState::Visible, 10).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_style_forces_visibility() {
        let mut page = FixturePage::new(site());
        page.navigate("https://shop.test", WaitPolicy::Load, 1000)
            .await
            .unwrap();
        let touched = page
            .set_style(".dd", &crate::renderer::declarations(&[("display", "flex")]))
            .await
            .unwrap();
        assert_eq!(touched, 1);
        let dd = page.query(&DomQuery::new(".dd")).await.unwrap();
        assert_eq!(dd[0].style.display, "flex");
    }

    #[tokio::test]
    async fn test_query_snapshot_fields() {
        let mut page = FixturePage::new(site());
        page.navigate("https://shop.test/", WaitPolicy::Load, 1000)
            .await
            .unwrap();
        let links = page.query(&DomQuery::new("li.item > a")).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].href.as_deref(), Some("https://shop.test/c/shoes"));
        assert_eq!(links[0].selector(), "#shoes > a:nth-of-type(1)");

        let boxes = page
            .query(&DomQuery::new("input").with_label_hints())
            .await
            .unwrap();
        let hints = boxes[0].label_hints.clone().unwrap();
        assert_eq!(hints.label_for.as_deref(), Some("Red (4)"));
        assert!(!boxes[0].checked);
    }

    #[tokio::test]
    async fn test_click_toggles_and_navigates() {
        let mut page = FixturePage::new(site());
        page.navigate("https://shop.test/", WaitPolicy::Load, 1000)
            .await
            .unwrap();
        page.click("#red", 100).await.unwrap();
        let boxes = page.query(&DomQuery::new("#red")).await.unwrap();
        assert!(boxes[0].checked);

        page.click("li.item > a", 100).await.unwrap();
        assert_eq!(page.get_url().await.unwrap(), "https://shop.test/c/shoes");
        assert_eq!(page.visits().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_page_fails_navigation() {
        let mut page = FixturePage::new(site());
        let err = page
            .navigate("https://shop.test/missing", WaitPolicy::Load, 1000)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no fixture page"));
    }

    #[test]
    fn test_from_dir_maps_file_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<p>home</p>").unwrap();
        std::fs::write(dir.path().join("c__shoes~color=red.html"), "<p>red</p>").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip").unwrap();
        let site = FixtureSite::from_dir(dir.path(), "https://shop.test").unwrap();
        assert_eq!(site.len(), 2);
        assert!(site.pages.contains_key(&page_key("https://shop.test/")));
        assert!(site
            .pages
            .contains_key(&page_key("https://shop.test/c/shoes?color=red")));
    }
}
