//! Report Rendering
//!
//! Text tree for terminals and JSON for machines. Text output depends only
//! on the inventory groups (never on the timestamp), so identical hardware
//! state renders identical bytes.

use std::fmt::Write as _;
use std::io::IsTerminal;

use crate::domain::model::{DeviceRecord, HealthStatus, LinkSpeed, LinkTier};
use crate::error::Result;

use super::{ControllerGroup, Inventory};

/// Report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// When to emit ANSI colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ColorMode {
    /// Colour when stdout is a terminal and `NO_COLOR` is unset
    #[default]
    Auto,
    Always,
    Never,
}

/// Presentation settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub color: ColorMode,
}

impl RenderOptions {
    pub fn new(color: ColorMode) -> Self {
        Self { color }
    }

    pub fn use_color(&self) -> bool {
        match self.color {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => {
                std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
            }
        }
    }
}

// =============================================================================
// Palette
// =============================================================================

const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Copy)]
struct Palette {
    red: &'static str,
    green: &'static str,
    bold_green: &'static str,
    cyan: &'static str,
    yellow: &'static str,
    reset: &'static str,
}

impl Palette {
    const ANSI: Palette = Palette {
        red: "\x1b[0;31m",
        green: "\x1b[0;32m",
        bold_green: "\x1b[1;32m",
        cyan: "\x1b[0;36m",
        yellow: "\x1b[1;33m",
        reset: "\x1b[0m",
    };

    const PLAIN: Palette = Palette {
        red: "",
        green: "",
        bold_green: "",
        cyan: "",
        yellow: "",
        reset: "",
    };

    fn for_options(options: &RenderOptions) -> Self {
        if options.use_color() {
            Self::ANSI
        } else {
            Self::PLAIN
        }
    }

    fn tier(&self, tier: LinkTier) -> &'static str {
        match tier {
            LinkTier::Top => self.bold_green,
            LinkTier::Mid => self.green,
            LinkTier::Low => self.yellow,
            LinkTier::Plain => "",
        }
    }
}

// =============================================================================
// Renderers
// =============================================================================

/// Render in the requested format.
pub fn render(inventory: &Inventory, format: OutputFormat, options: &RenderOptions) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(inventory, options)),
        OutputFormat::Json => render_json(inventory),
    }
}

/// Pretty-printed JSON including the `generated_at` timestamp.
pub fn render_json(inventory: &Inventory) -> Result<String> {
    let mut json = serde_json::to_string_pretty(inventory)?;
    json.push('\n');
    Ok(json)
}

/// Controller tree. An empty inventory renders as an empty string.
pub fn render_text(inventory: &Inventory, options: &RenderOptions) -> String {
    let palette = Palette::for_options(options);
    let mut out = String::new();
    for group in &inventory.groups {
        write_group(&mut out, group, &palette);
    }
    out
}

fn write_group(out: &mut String, group: &ControllerGroup, p: &Palette) {
    let _ = writeln!(out, "{}🎯 {}{}", p.cyan, group.controller.label(), p.reset);
    for record in &group.devices {
        let _ = writeln!(out, "  └── {}", device_line(record, p));
    }
    out.push('\n');
}

fn device_line(record: &DeviceRecord, p: &Palette) -> String {
    let identity = [record.vendor.as_deref(), record.model.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    let identity = if identity.is_empty() {
        UNKNOWN.to_string()
    } else {
        identity
    };

    format!(
        "{}💾 {}{}  ({}, {}, {}, {}, {}, {}, 🔢 SN: {}, 🔧 FW: {})",
        p.green,
        record.device.dev_node.display(),
        p.reset,
        identity,
        or_unknown(&record.capacity),
        or_unknown(&record.protocol),
        link_text(record, p),
        health_text(record.health, p),
        temperature_text(record.temperature_celsius),
        or_unknown(&record.serial),
        or_unknown(&record.firmware),
    )
}

fn or_unknown(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(UNKNOWN)
}

fn link_text(record: &DeviceRecord, p: &Palette) -> String {
    let Some(link) = record.link_speed else {
        return format!("🧩 link={}", UNKNOWN);
    };
    let color = p.tier(link.tier());
    let reset = if color.is_empty() { "" } else { p.reset };
    let mut text = format!("{}🧩 link={}{}", color, link, reset);
    if record.link_degraded() {
        if let Some(max) = record.max_link_speed.as_ref() {
            text.push_str(&degraded_suffix(max, p));
        }
    }
    text
}

fn degraded_suffix(max: &LinkSpeed, p: &Palette) -> String {
    format!(" {}⚠️ below max {}{}", p.red, max, p.reset)
}

fn health_text(health: HealthStatus, p: &Palette) -> String {
    match health {
        HealthStatus::Healthy => "❤️ SMART: ✅".to_string(),
        HealthStatus::Unknown => "❤️ SMART: ❓".to_string(),
        HealthStatus::Degraded => format!("{}❤️ SMART: ⚠️{}", p.red, p.reset),
    }
}

fn temperature_text(celsius: Option<i32>) -> String {
    match celsius {
        Some(t) => format!("🌡️ {}°C", t),
        None => "🌡️ N/A".to_string(),
    }
}
