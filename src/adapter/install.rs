//! Shared engine-binary install/version logic
//!
//! Both adapters install a single-binary engine archive the same way: check
//! a sidecar `<binary>.version` file against [`EngineConfig::min_version`],
//! download and extract `download_url` if the binary is missing or stale,
//! and record the version that was just installed. Grounded in the
//! teacher's download-then-extract bootstrap step, generalized here across
//! both adapters instead of duplicating it per adapter.

use std::path::Path;

use super::error::AdapterError;
use crate::config::EngineConfig;

/// Ensure `binary_name` is installed under `config.install_dir` and at least
/// `config.min_version`, downloading and extracting `config.download_url`
/// (with `{version}` substituted for `config.min_version`) if not.
pub async fn ensure_installed_generic(
    client: &reqwest::Client,
    config: &EngineConfig,
    binary_name: &str,
) -> Result<(), AdapterError> {
    std::fs::create_dir_all(&config.install_dir)?;
    let binary = config.install_dir.join(binary_name);
    let version_file = config.install_dir.join(format!("{binary_name}.version"));

    let installed_version = std::fs::read_to_string(&version_file).ok();
    let needs_install = match &installed_version {
        Some(v) if binary.exists() => version_is_older(v.trim(), &config.min_version),
        _ => true,
    };

    if !needs_install {
        return Ok(());
    }

    let Some(template) = &config.download_url else {
        return Err(AdapterError::InstallFailed(format!(
            "{binary_name} is missing or older than {} and no download_url is configured",
            config.min_version
        )));
    };
    let url = template.replace("{version}", &config.min_version);

    tracing::info!(binary = binary_name, url = %url, "downloading engine archive");
    let bytes = client.get(&url).send().await?.error_for_status()?.bytes().await?;

    extract_archive(&bytes, &config.install_dir)?;

    #[cfg(unix)]
    if binary.exists() {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&binary)?.permissions();
        perms.set_mode(perms.mode() | 0o111);
        std::fs::set_permissions(&binary, perms)?;
    }

    if !binary.exists() {
        return Err(AdapterError::InstallFailed(format!(
            "extracted archive from {url} did not contain a '{binary_name}' binary"
        )));
    }

    std::fs::write(&version_file, &config.min_version)?;
    Ok(())
}

fn extract_archive(bytes: &[u8], dest_dir: &Path) -> Result<(), AdapterError> {
    let decoder = flate2::read::GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);
    archive
        .unpack(dest_dir)
        .map_err(|e| AdapterError::InstallFailed(format!("failed to extract engine archive: {e}")))
}

/// Naive dot-separated integer version comparison. A missing or
/// non-numeric component compares as 0, so `"0.9"` is still older than
/// `"0.9.1"`.
fn version_is_older(have: &str, want: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> { v.split('.').map(|p| p.parse().unwrap_or(0)).collect() };
    let have_parts = parse(have);
    let want_parts = parse(want);
    let len = have_parts.len().max(want_parts.len());
    for i in 0..len {
        let h = have_parts.get(i).copied().unwrap_or(0);
        let w = want_parts.get(i).copied().unwrap_or(0);
        if h != w {
            return h < w;
        }
    }
    false
}
