// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! One page session per command: headless Chromium, or saved HTML snapshots
//! replayed through the fixture backend.

use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::fixture::{FixtureRenderer, FixtureSite};
use crate::renderer::{RenderContext, Renderer, WaitPolicy};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

pub struct Session {
    renderer: Box<dyn Renderer>,
    ctx: Box<dyn RenderContext>,
}

impl Session {
    /// Open a session able to load `url`.
    pub async fn open(offline: Option<&Path>, url: &str) -> Result<Self> {
        let renderer: Box<dyn Renderer> = match offline {
            Some(dir) => {
                let site = FixtureSite::from_dir(dir, &origin(url)?)?;
                info!(dir = %dir.display(), pages = site.len(), "replaying offline snapshots");
                Box::new(FixtureRenderer::new(site))
            }
            None => {
                let renderer = ChromiumRenderer::new().await?;
                info!("Chromium renderer initialized");
                Box::new(renderer)
            }
        };
        let ctx = renderer.new_context().await?;
        Ok(Self { renderer, ctx })
    }

    pub async fn goto(&mut self, url: &str, timeout_ms: u64) -> Result<()> {
        self.ctx
            .navigate(url, WaitPolicy::Load, timeout_ms)
            .await
            .with_context(|| format!("failed to load {url}"))?;
        Ok(())
    }

    pub fn page(&mut self) -> &mut dyn RenderContext {
        self.ctx.as_mut()
    }

    pub async fn close(self) -> Result<()> {
        self.ctx.close().await?;
        self.renderer.shutdown().await
    }
}

/// `scheme://host[:port]` of a URL.
fn origin(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url).with_context(|| format!("invalid URL {url}"))?;
    Ok(parsed.origin().ascii_serialization())
}
