/// config.rs — File Zipper Config Loader
/// Reads config.json, validates every value, falls back to defaults.
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};
use tracing::{info, warn};

// ─── Raw JSON shapes (with optional fields for validation) ────────────────────

#[derive(Deserialize, Default, Clone)]
struct RawLoader {
    read_buffer_kb: Option<usize>,
}

#[derive(Deserialize, Default, Clone)]
struct RawArchive {
    extension:      Option<String>,
    compress_level: Option<u32>,
    write_chunk_kb: Option<usize>,
}

#[derive(Deserialize, Default, Clone)]
struct RawServer {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Deserialize, Default, Clone)]
struct RawChooser {
    start_dir: Option<String>,
}

#[derive(Deserialize, Default, Clone)]
struct RawConfig {
    #[serde(default)]
    loader:  RawLoader,
    #[serde(default)]
    archive: RawArchive,
    #[serde(default)]
    server:  RawServer,
    #[serde(default)]
    chooser: RawChooser,
}

// ─── Validated, exported config ───────────────────────────────────────────────

#[derive(Clone, Debug, Serialize)]
pub struct Config {
    // Loader
    pub read_buffer_bytes: usize,        // KB → bytes

    // Archive
    pub archive_extension:  String,
    pub zip_compress_level: u32,
    pub write_chunk_bytes:  usize,       // KB → bytes

    // Server
    pub host: String,
    pub port: u16,

    // File chooser
    pub start_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_raw(RawConfig::default())
    }
}

impl Config {
    pub fn load(base_dir: &Path) -> Self {
        let path = base_dir.join("config.json");
        let raw: RawConfig = if path.exists() {
            match fs::read_to_string(&path)
                .context("read config.json")
                .and_then(|s| parse_raw(&s)) {
                Ok(r) => r,
                Err(e) => {
                    warn!("⚠️  config.json parse error: {e:#} → using defaults");
                    RawConfig::default()
                }
            }
        } else {
            warn!("⚠️  config.json not found → using defaults");
            RawConfig::default()
        };

        Self::from_raw(raw)
    }

    /// Parse a config document directly; used when the JSON does not come from disk.
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        Ok(Self::from_raw(parse_raw(s)?))
    }

    fn from_raw(r: RawConfig) -> Self {
        let l = &r.loader;
        let a = &r.archive;
        let s = &r.server;
        let c = &r.chooser;

        macro_rules! clamp {
            ($val:expr, $default:expr, $lo:expr, $hi:expr) => {{
                let v = $val.unwrap_or($default);
                let lo = $lo;
                let hi = $hi;
                if v < lo || v > hi {
                    warn!("⚠️  config value {} out of range [{lo},{hi}] → default {}", v, $default);
                    $default
                } else {
                    v
                }
            }};
        }

        let read_buffer_kb     = clamp!(l.read_buffer_kb, 64, 4, 4096);
        let zip_compress_level = clamp!(a.compress_level, 6, 0, 9);
        let write_chunk_kb     = clamp!(a.write_chunk_kb, 64, 4, 4096);

        let extension_raw = a.extension.clone().unwrap_or_else(|| "zip".to_string());
        let extension_raw = extension_raw.trim().trim_start_matches('.').to_string();
        let archive_extension = if extension_raw.is_empty()
            || extension_raw.contains(['.', '/', '\\'])
        {
            warn!("⚠️  archive.extension {extension_raw:?} invalid → default zip");
            "zip".to_string()
        } else {
            extension_raw
        };

        let start_dir = c.start_dir.as_ref()
            .map(PathBuf::from)
            .filter(|p| p.is_dir())
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        Config {
            read_buffer_bytes: read_buffer_kb * 1024,

            archive_extension,
            zip_compress_level,
            write_chunk_bytes: write_chunk_kb * 1024,

            host: s.host.clone().unwrap_or_else(|| "127.0.0.1".to_string()),
            port: s.port.unwrap_or(8765),

            start_dir,
        }
    }

    pub fn print_summary(&self) {
        info!("{}", "─".repeat(60));
        info!("⚙️  File Zipper Config");
        info!("   Loader  : read_buffer={}KB", self.read_buffer_bytes / 1024);
        info!(
            "   Archive : ext=.{}  level={}  chunk={}KB",
            self.archive_extension, self.zip_compress_level, self.write_chunk_bytes / 1024,
        );
        info!("   Server  : {}:{}", self.host, self.port);
        info!("   Chooser : start_dir={}", self.start_dir.display());
        info!("{}", "─".repeat(60));
    }
}

fn parse_raw(s: &str) -> anyhow::Result<RawConfig> {
    // Strip keys starting with "_" using serde_json value manipulation
    let mut val: serde_json::Value = serde_json::from_str(s)?;
    strip_comment_keys(&mut val);
    serde_json::from_value(val).map_err(Into::into)
}

fn strip_comment_keys(val: &mut serde_json::Value) {
    if let serde_json::Value::Object(map) = val {
        map.retain(|k, _| !k.starts_with('_'));
        for v in map.values_mut() {
            strip_comment_keys(v);
        }
    }
}
