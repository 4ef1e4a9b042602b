use crate::types::AddressState;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Estado persistido de todos os endereços, indexado pelo id do endereço.
pub type StateMap = BTreeMap<String, AddressState>;

/// Arquivo JSON com o estado entre execuções.
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Arquivo ausente ou corrompido equivale à primeira execução.
    pub fn load(&self) -> StateMap {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StateMap::new(),
            Err(e) => {
                warn!(
                    "[ESTADO] Não foi possível ler {}: {}. Seguindo como primeira execução.",
                    self.path.display(),
                    e
                );
                return StateMap::new();
            }
        };
        match serde_json::from_str(&text) {
            Ok(states) => states,
            Err(e) => {
                warn!(
                    "[ESTADO] Arquivo {} corrompido: {}. Seguindo como primeira execução.",
                    self.path.display(),
                    e
                );
                StateMap::new()
            }
        }
    }

    /// Grava num arquivo temporário vizinho e renomeia por cima do destino.
    pub fn save(&self, states: &StateMap) -> Result<()> {
        let json = serde_json::to_string_pretty(states)?;
        write_atomic(&self.path, json.as_bytes())
            .with_context(|| format!("gravando estado em {}", self.path.display()))
    }
}

/// Escrita atômica: arquivo temporário no mesmo diretório + rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
