// ─── AppX Package Registry ───
// Windows backend: reads the per-user package repository hive with `reg`,
// mutates registrations through the AppX PowerShell cmdlets.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{PackageRegistry, RegisteredPackage};
use crate::core::error::RegistrationError;

const PACKAGE_REPOSITORY_KEY: &str = r"HKCU\SOFTWARE\Classes\Local Settings\Software\Microsoft\Windows\CurrentVersion\AppModel\Repository\Packages";
const APP_MODEL_UNLOCK_KEY: &str =
    r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\AppModelUnlock";
const DEVELOPER_MODE_VALUE: &str = "AllowDevelopmentWithoutDevLicense";
const PACKAGE_ID_VALUE: &str = "PackageID";
const PACKAGE_ROOT_VALUE: &str = "PackageRootFolder";

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Registry for one package family, e.g. `Microsoft.MinecraftUWP`.
#[derive(Debug, Clone)]
pub struct AppxRegistry {
    package_name: String,
}

impl AppxRegistry {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
        }
    }

    fn key_prefix(&self) -> String {
        format!("{}_", self.package_name)
    }
}

#[async_trait]
impl PackageRegistry for AppxRegistry {
    async fn query(&self) -> Result<Option<RegisteredPackage>, RegistrationError> {
        let prefix = self.key_prefix();
        let listing = run(
            "reg",
            &["query", PACKAGE_REPOSITORY_KEY, "/f", prefix.as_str(), "/k"],
        )
        .await?;
        // `reg` exits non-zero both for "no match" and for a missing hive.
        if !listing.status.success() {
            return Ok(None);
        }

        let stdout = String::from_utf8_lossy(&listing.stdout);
        let Some(key) = parse_subkeys(&stdout, &prefix).into_iter().next() else {
            return Ok(None);
        };

        let detail = run("reg", &["query", key.as_str()]).await?;
        if !detail.status.success() {
            return Err(RegistrationError::Query(format!(
                "reg query {key} failed: {}",
                String::from_utf8_lossy(&detail.stderr).trim()
            )));
        }

        let values = parse_reg_values(&String::from_utf8_lossy(&detail.stdout));
        match (values.get(PACKAGE_ID_VALUE), values.get(PACKAGE_ROOT_VALUE)) {
            (Some(id), Some(root)) => Ok(Some(RegisteredPackage {
                id: id.clone(),
                root: PathBuf::from(root),
            })),
            _ => {
                warn!("Package key {} is missing its id or root folder", key);
                Ok(None)
            }
        }
    }

    async fn remove(&self, package_id: &str) -> Result<(), RegistrationError> {
        info!("Removing package {}", package_id);
        let output = powershell(&remove_script(package_id, true)).await?;
        if check("Remove-AppxPackage", &output, false).is_ok() {
            return Ok(());
        }

        // Store installs reject -PreserveApplicationData.
        warn!(
            "Removing {} while keeping its data failed ({}); retrying without it",
            package_id,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        let output = powershell(&remove_script(package_id, false)).await?;
        check("Remove-AppxPackage", &output, false)
    }

    async fn register_manifest(&self, manifest: &Path) -> Result<(), RegistrationError> {
        info!("Registering package from {:?}", manifest);
        let script = format!(
            "Add-AppxPackage -Path {} -Register",
            ps_quote(&manifest.display().to_string())
        );
        let output = powershell(&script).await?;
        debug!("Add-AppxPackage: {}", String::from_utf8_lossy(&output.stdout).trim());
        check("Add-AppxPackage", &output, true)
    }

    async fn developer_mode_enabled(&self) -> Result<bool, RegistrationError> {
        let output = run(
            "reg",
            &["query", APP_MODEL_UNLOCK_KEY, "/v", DEVELOPER_MODE_VALUE],
        )
        .await?;
        if !output.status.success() {
            return Ok(false);
        }

        let values = parse_reg_values(&String::from_utf8_lossy(&output.stdout));
        Ok(values
            .get(DEVELOPER_MODE_VALUE)
            .and_then(|raw| parse_dword(raw))
            == Some(1))
    }

    async fn enable_developer_mode(&self) -> Result<bool, RegistrationError> {
        warn!("Requesting elevation to enable developer mode");
        let script = format!(
            "Start-Process -FilePath reg -Verb RunAs -Wait -WindowStyle Hidden -ArgumentList @('add',{},'/v','{}','/t','REG_DWORD','/d','1','/f')",
            ps_quote(APP_MODEL_UNLOCK_KEY),
            DEVELOPER_MODE_VALUE
        );
        let output = powershell(&script).await?;
        Ok(output.status.success())
    }
}

async fn run(program: &str, args: &[&str]) -> Result<Output, RegistrationError> {
    let mut cmd = Command::new(program);
    cmd.args(args);

    #[cfg(target_os = "windows")]
    cmd.creation_flags(CREATE_NO_WINDOW);

    cmd.output()
        .await
        .map_err(|source| RegistrationError::Spawn {
            program: program.to_string(),
            source,
        })
}

async fn powershell(script: &str) -> Result<Output, RegistrationError> {
    run(
        "powershell",
        &["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command", script],
    )
    .await
}

fn check(action: &str, output: &Output, stderr_is_failure: bool) -> Result<(), RegistrationError> {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if output.status.success() && !(stderr_is_failure && !stderr.trim().is_empty()) {
        return Ok(());
    }

    let message = if stderr.trim().is_empty() {
        format!("exit status {}", output.status)
    } else {
        stderr.trim().to_string()
    };
    Err(RegistrationError::Command {
        action: action.to_string(),
        message,
    })
}

/// `-PreserveApplicationData` keeps LocalState, where worlds live.
fn remove_script(package_id: &str, preserve_data: bool) -> String {
    let mut script = format!("Remove-AppxPackage -Package {}", ps_quote(package_id));
    if preserve_data {
        script.push_str(" -PreserveApplicationData");
    }
    script
}

/// Single-quoted PowerShell literal.
fn ps_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

/// Full key paths from `reg query <key> /f <prefix> /k` output whose last
/// segment starts with `prefix` (registry names compare case-insensitively).
fn parse_subkeys(output: &str, prefix: &str) -> Vec<String> {
    let prefix = prefix.to_ascii_lowercase();
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("HKEY_"))
        .filter(|line| {
            line.rsplit('\\')
                .next()
                .map(|leaf| leaf.to_ascii_lowercase().starts_with(&prefix))
                .unwrap_or(false)
        })
        .map(str::to_string)
        .collect()
}

/// `name -> value` pairs from `reg query` value listings:
/// `    PackageRootFolder    REG_SZ    C:\Some Path\Minecraft-1.2.3`
fn parse_reg_values(output: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("HKEY_") {
            continue;
        }

        let Some(type_start) = trimmed.find("    REG_") else {
            continue;
        };
        let name = trimmed[..type_start].trim();
        let after_type = trimmed[type_start..].trim_start();
        let value = after_type
            .split_once(char::is_whitespace)
            .map(|(_, rest)| rest.trim())
            .unwrap_or("");

        if !name.is_empty() {
            values.insert(name.to_string(), value.to_string());
        }
    }
    values
}

fn parse_dword(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}
