use crate::utils::get_data_dir;
use color_eyre::{eyre, Report};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

/// Storage credential used by the transport, either the default profile or
/// an admin credential passed along with an upload command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileCredential {
    pub name: String,
    pub access_key: String,
    pub secret_key: String,
    pub default_region: String,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub selected: bool,
}

impl FileCredential {
    fn try_parse_file(path: &Path, selected: bool) -> eyre::Result<Self> {
        let file = fs::File::open(path)?;
        let reader = io::BufReader::new(file);
        let mut access_key = String::new();
        let mut secret_key = String::new();
        let mut default_region = String::new();
        let mut endpoint_url = None;
        let mut force_path_style = false;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "default".to_string());

        for line in reader.lines() {
            let line = line?;
            if let Some(stripped) = line.strip_prefix("access_key=") {
                access_key = stripped.trim().to_string()
            } else if let Some(stripped) = line.strip_prefix("secret_key=") {
                secret_key = stripped.trim().to_string()
            } else if let Some(stripped) = line.strip_prefix("default_region=") {
                default_region = stripped.trim().to_string()
            } else if let Some(stripped) = line.strip_prefix("endpoint_url=") {
                endpoint_url = Some(stripped.trim().to_string())
            } else if let Some(stripped) = line.strip_prefix("force_path_style=") {
                force_path_style = stripped.trim().parse().map_err(|_| {
                    Report::msg(format!(
                        "force_path_style is not a valid boolean (true/false) in file: {:?}",
                        path
                    ))
                })?;
            }
        }

        if access_key.is_empty() || secret_key.is_empty() || default_region.is_empty() {
            return Err(Report::msg(format!(
                "Missing access_key/secret_key/default_region in file: {:?}",
                path
            )));
        }

        Ok(Self {
            name,
            access_key,
            secret_key,
            default_region,
            endpoint_url,
            force_path_style,
            selected,
        })
    }
}

/// Loads credentials from an explicit file, or from `<data dir>/creds`
pub fn load_credentials(creds_file: Option<PathBuf>) -> eyre::Result<Vec<FileCredential>> {
    if let Some(path) = creds_file {
        load_credentials_from_file(path.as_path())
    } else {
        let path = get_data_dir().join("creds");
        load_credentials_from_dir(path.as_path())
    }
}

/// Picks the named profile, else the selected one
pub fn pick_credential(
    credentials: Vec<FileCredential>,
    profile: Option<&str>,
) -> eyre::Result<FileCredential> {
    match profile {
        Some(name) => credentials
            .into_iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Report::msg(format!("No credentials profile named '{}'", name))),
        None => credentials
            .into_iter()
            .find(|c| c.selected)
            .ok_or_else(|| Report::msg("No credentials profile selected")),
    }
}

fn load_credentials_from_file(dir_path: &Path) -> eyre::Result<Vec<FileCredential>> {
    Ok(vec![FileCredential::try_parse_file(dir_path, true)?])
}

fn load_credentials_from_dir(dir_path: &Path) -> eyre::Result<Vec<FileCredential>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir_path)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    paths.sort();

    let mut credentials = Vec::new();
    let mut selected = true;
    for path in paths.into_iter().filter(|p| p.is_file()) {
        credentials.push(FileCredential::try_parse_file(&path, selected)?);
        selected = false; // Only the first entry is selected
    }

    if credentials.is_empty() {
        Err(Report::msg("Missing credentials in your data creds folder"))
    } else {
        Ok(credentials)
    }
}
