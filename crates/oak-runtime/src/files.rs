use std::path::Path;

use sha2::{Digest, Sha256};

use crate::Result;

/// Port the relay reserves for itself; derivation skips it
const RESERVED_RELAY_PORT: u16 = 49500;

/// Dynamic/private port range
const PORT_BASE: u16 = 49152;
const PORT_SPAN: u16 = 16384;

/// Deterministic port for a project: same path, same port, across
/// restarts and machines.
pub fn derive_port(project_root: &Path) -> u16 {
    let digest = Sha256::digest(project_root.to_string_lossy().as_bytes());
    let seed = u16::from_be_bytes([digest[0], digest[1]]);
    let mut port = PORT_BASE + (seed % PORT_SPAN);
    if port == RESERVED_RELAY_PORT {
        port += 1;
    }
    port
}

pub fn write_port_file(data_dir: &Path, port: u16) -> Result<()> {
    std::fs::create_dir_all(data_dir)?;
    std::fs::write(data_dir.join("port"), port.to_string())?;
    Ok(())
}

pub fn write_pid_file(data_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(data_dir)?;
    std::fs::write(data_dir.join("oakd.pid"), std::process::id().to_string())?;
    Ok(())
}

pub fn remove_runtime_files(data_dir: &Path) {
    let _ = std::fs::remove_file(data_dir.join("port"));
    let _ = std::fs::remove_file(data_dir.join("oakd.pid"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_port_is_deterministic_and_in_range() {
        let a = derive_port(&PathBuf::from("/home/dev/project-a"));
        let b = derive_port(&PathBuf::from("/home/dev/project-a"));
        assert_eq!(a, b);
        assert!(a >= PORT_BASE);
        assert_ne!(a, RESERVED_RELAY_PORT);
    }

    #[test]
    fn test_different_projects_usually_differ() {
        let a = derive_port(&PathBuf::from("/home/dev/project-a"));
        let b = derive_port(&PathBuf::from("/home/dev/project-b"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_port_and_pid_files() {
        let temp_dir = TempDir::new().unwrap();
        write_port_file(temp_dir.path(), 50123).unwrap();
        write_pid_file(temp_dir.path()).unwrap();

        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("port")).unwrap(),
            "50123"
        );
        assert!(temp_dir.path().join("oakd.pid").exists());

        remove_runtime_files(temp_dir.path());
        assert!(!temp_dir.path().join("port").exists());
    }
}
