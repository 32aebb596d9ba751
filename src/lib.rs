#![crate_type = "rlib"]

#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;
#[macro_use]
extern crate lopdf;

pub mod assembly;
pub mod designer;
pub mod error;
pub mod geometry;
pub mod guard;
pub mod models;
pub mod pdf;
pub mod registry;
pub mod render;
pub mod session;
pub mod signature;
pub mod store;

pub use error::Error;

/// Namespace prefix for final signed artifacts in the object store.
pub const SIGNED_DOCUMENTS_DIR: &'static str = "signed-documents";

/// Fixed ladder of zoom factors the page renderer steps through.
pub const ZOOM_LADDER: [f64; 7] = [0.5, 0.75, 1.0, 1.25, 1.5, 2.0, 3.0];

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    #[serde(default = "default_min_zoom")]
    pub min_zoom: f64,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: f64,
    #[serde(default = "default_max_font_size")]
    pub max_font_size: f64,
    #[serde(default = "default_field_size")]
    pub default_field_size: (f64, f64),
    #[serde(default = "default_checkbox_size")]
    pub default_checkbox_size: (f64, f64),
    #[serde(default = "default_signature_size")]
    pub default_signature_size: (f64, f64),
}

fn default_min_zoom() -> f64 {
    0.5
}

fn default_max_zoom() -> f64 {
    3.0
}

fn default_max_font_size() -> f64 {
    12.0
}

fn default_field_size() -> (f64, f64) {
    (150.0, 30.0)
}

fn default_checkbox_size() -> (f64, f64) {
    (24.0, 24.0)
}

fn default_signature_size() -> (f64, f64) {
    (200.0, 80.0)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_zoom: default_min_zoom(),
            max_zoom: default_max_zoom(),
            max_font_size: default_max_font_size(),
            default_field_size: default_field_size(),
            default_checkbox_size: default_checkbox_size(),
            default_signature_size: default_signature_size(),
        }
    }
}

impl Config {
    /// Read config from defaults, then `Docsign.toml`, then `DOCSIGN_*`
    /// environment variables, last writer wins.
    pub fn load() -> Result<Self, Error> {
        use figment::providers::{Env, Format, Serialized, Toml};

        figment::Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("Docsign.toml"))
            .merge(Env::prefixed("DOCSIGN_"))
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }
}
