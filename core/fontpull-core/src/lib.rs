//! fontpull-core: web fonts, fetched once and served locally
//!
//! Given a CSS font-family, the library asks the font API for its stylesheet while
//! posing as several browsers (each one gets a different binary format), reads the
//! `@font-face` blocks out of every answer, merges them per family/style/weight,
//! downloads the binaries into a local folder and writes a stylesheet that prefers
//! the local copies and falls back to the remote URLs.
//!
//! ```rust,no_run
//! use fontpull_core::install::{FontInstaller, InstallOptions};
//!
//! let installer = FontInstaller::with_http(InstallOptions::from_env())?;
//! let report = installer.install("'Open Sans', sans-serif");
//! println!("{}", report.css);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Stages, in order:
//!
//! - [`family`]: family name cleanup and query token
//! - [`fetch`]: one stylesheet request per [`model::ClientIdentity`]
//! - [`parse`]: one `@font-face` record per subset
//! - [`aggregate`]: merge into [`model::AggregatedFontFace`]s
//! - [`cache`]: download binaries, swap in local URLs
//! - [`emit`]: render the final CSS
//!
//! Nothing past name normalization can fail the pipeline; a failed request,
//! unparsable block or failed download only removes that piece from the output.
//!
//! Made by FontLab https://www.fontlab.com/

pub mod aggregate;
pub mod cache;
pub mod emit;
pub mod family;
pub mod fetch;
pub mod install;
pub mod model;
pub mod output;
pub mod parse;
