#![cfg_attr(not(doctest), doc = include_str!("../README.md"))]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use clap_complete;
pub use k8s_openapi;
pub use kube;

pub mod catalog;
pub mod claputil;
pub use claputil::context_value_completer;
pub mod config;
pub mod discover;
mod error;
pub mod kind;
pub mod schema;

pub use catalog::{build_catalog, build_catalog_blocking, build_catalog_with};
pub use self::config::{
    ClientConfiguration, GlobalOptions, PlatformEnv, apply_global_options, resolve,
};
pub use error::{BoxError, Error, Result};
pub use kind::{Catalog, Kind, ResourceTargetSpec};

/// Resolve the client configuration from the process environment.
///
/// Reads the global options and platform variables once and runs [`config::resolve`].
pub fn resolve_from_env() -> Result<ClientConfiguration> {
    let options = GlobalOptions::from_env()?;
    resolve(&options, &PlatformEnv::capture())
}
