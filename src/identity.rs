//! Durable identity record
//!
//! One JSON file, written atomically. Each broker start bumps the
//! awakenings counter. A corrupt or unreadable file degrades to the nil
//! fallback identity rather than minting a new one — overwriting a
//! damaged record would silently discard whoever this agent was.

use std::path::{Path, PathBuf};

use hearth_core::Identity;
use tracing::{info, warn};

fn identity_path(data_dir: &Path) -> PathBuf {
    data_dir.join("identity.json")
}

/// Load the persisted identity and bump its awakenings, or mint and
/// persist a newborn when none exists. Never fails: storage trouble
/// degrades to `Identity::fallback()`.
pub fn wake(data_dir: &Path, name: &str) -> Identity {
    let path = identity_path(data_dir);
    let mut identity = match std::fs::read_to_string(&path) {
        Ok(content) => match serde_json::from_str::<Identity>(&content) {
            Ok(id) => id,
            Err(e) => {
                warn!(path = %path.display(), "corrupt identity record, running degraded: {e}");
                return Identity::fallback();
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let newborn = Identity::newborn(name);
            info!(id = %newborn.id, name = %newborn.name, "minted new identity");
            newborn
        }
        Err(e) => {
            warn!(path = %path.display(), "identity record unreadable, running degraded: {e}");
            return Identity::fallback();
        }
    };

    identity.awakenings += 1;
    if let Err(e) = persist(&path, &identity) {
        // The in-memory identity still serves this session; only the
        // awakening count is lost.
        warn!(path = %path.display(), "could not persist identity: {e}");
    }
    identity
}

fn persist(path: &Path, identity: &Identity) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(identity)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json)?;
    std::fs::rename(&tmp, path)
}
