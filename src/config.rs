use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{ Context, Result };

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_IMAGE_DIR: &str = "mkdocs_images_extracted";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub image_dir: PathBuf,
    pub db_path: PathBuf,
    pub index_dir: Option<PathBuf>,
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("multimodal-rag").join("db"))
        .unwrap_or_else(|| PathBuf::from("./db"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Builds the config from `RAG_*` variables, falling back to defaults.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| vars.get(key).filter(|v| !v.trim().is_empty()).cloned();

        let bind_addr = get("RAG_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid RAG_BIND_ADDR '{}'", bind_addr))?;

        Ok(Self {
            bind_addr,
            image_dir: get("RAG_IMAGE_DIR").map_or_else(|| PathBuf::from(DEFAULT_IMAGE_DIR), PathBuf::from),
            db_path: get("RAG_DB_PATH").map_or_else(default_db_path, PathBuf::from),
            index_dir: get("RAG_INDEX_DIR").map(PathBuf::from),
        })
    }
}
