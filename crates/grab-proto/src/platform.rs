use std::path::PathBuf;

const APP_DIR: &str = "mediagrab";

pub fn data_dir() -> PathBuf {
    // On macOS and Linux, use ~/.local/share/mediagrab/ (XDG standard)
    // instead of macOS Application Support for consistency
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join(APP_DIR)
    }
    #[cfg(windows)]
    {
        // On Windows, check for portable data directory in executable directory first
        if let Some(dir) = portable_dir("data") {
            return dir;
        }

        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

pub fn config_dir() -> PathBuf {
    // On Windows, check for portable config.toml in executable directory first
    #[cfg(windows)]
    {
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                if exe_dir.join("config.toml").exists() {
                    return exe_dir.to_path_buf();
                }
            }
        }
    }

    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join(APP_DIR)
    }

    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

/// Default target for finished downloads: the user's download folder when
/// the platform has one, `~/mediagrab-downloads` otherwise.
pub fn downloads_dir() -> PathBuf {
    #[cfg(windows)]
    {
        if let Some(dir) = portable_dir("downloads") {
            return dir;
        }
    }

    dirs::download_dir()
        .map(|d| d.join(APP_DIR))
        .or_else(|| dirs::home_dir().map(|h| h.join("mediagrab-downloads")))
        .unwrap_or_else(|| std::env::temp_dir().join("mediagrab-downloads"))
}

#[cfg(windows)]
fn portable_dir(name: &str) -> Option<PathBuf> {
    let exe_path = std::env::current_exe().ok()?;
    let candidate = exe_path.parent()?.join(name);
    candidate.exists().then_some(candidate)
}
