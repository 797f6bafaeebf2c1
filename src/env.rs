//! Process run mode, read from `TSU_ENV`.
//!
//! Unset, empty or `development` means development; any other value is
//! production. The only behavior it drives inside tsu is template reloading:
//!
//! ```rust,no_run
//! use tsu_web::Env;
//! use tsu_web::middleware::RenderOptions;
//!
//! let options = RenderOptions {
//!     reload: Env::current().reload_templates(),
//!     ..Default::default()
//! };
//! ```

use std::fmt;

pub const ENV_VAR: &str = "TSU_ENV";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Env {
    #[default]
    Development,
    Production,
}

impl Env {
    /// Reads `TSU_ENV`.
    pub fn current() -> Self {
        Self::parse(std::env::var(ENV_VAR).ok().as_deref())
    }

    pub fn parse(value: Option<&str>) -> Self {
        match value {
            None | Some("" | "development") => Self::Development,
            Some(_) => Self::Production,
        }
    }

    /// Templates are recompiled per request in development.
    pub fn reload_templates(self) -> bool {
        self == Self::Development
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Development => "development",
            Self::Production => "production",
        })
    }
}
