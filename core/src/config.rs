use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use dirs::home_dir;
use serde::Deserialize;

use crate::assembler::RequestOptions;
use crate::error::ResponsesErr;
use crate::error::Result;
use crate::variant_profile::OPENAI_PROFILE_ID;
use crate::variant_profile::VariantProfile;
use crate::variant_profile::built_in_profiles;

/// Resolved configuration: built-in profiles merged with
/// `~/.responses/config.toml`.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub default_profile: String,
    pub profiles: HashMap<String, VariantProfile>,
    pub request: RequestOptions,
}

/// Raw shape of `config.toml`.
#[derive(Deserialize, Debug, Default)]
struct ConfigToml {
    default_profile: Option<String>,
    #[serde(default)]
    profiles: HashMap<String, ProfileToml>,
    #[serde(default)]
    request: RequestOptions,
}

#[derive(Deserialize, Debug)]
struct ProfileToml {
    #[serde(flatten)]
    profile: VariantProfile,
    /// Read into `instructions_text`, relative to the config directory.
    instructions_file: Option<PathBuf>,
}

impl Config {
    /// Loads `~/.responses/config.toml`, falling back to the built-in
    /// profiles when the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from_dir(&responses_home()?)
    }

    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join("config.toml");
        match std::fs::read_to_string(&path) {
            Ok(contents) => Self::from_toml(&contents, dir),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("config.toml not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => {
                tracing::error!("Failed to read config.toml: {e}");
                Err(e.into())
            }
        }
    }

    /// Parses `contents`; `instructions_file` entries resolve against
    /// `base_dir`.
    pub fn from_toml(contents: &str, base_dir: &Path) -> Result<Self> {
        let raw: ConfigToml = toml::from_str(contents).inspect_err(|e| {
            tracing::error!("Failed to parse config.toml: {e}");
        })?;

        let mut profiles = built_in_profiles();
        for (id, ProfileToml { mut profile, instructions_file }) in raw.profiles {
            if let Some(file) = instructions_file {
                let text = std::fs::read_to_string(base_dir.join(file))?;
                profile.instructions_text = text;
            }
            profile.instructions_text = profile.instructions_text.trim().to_string();
            if profiles.insert(id.clone(), profile).is_some() {
                tracing::debug!(profile = %id, "overriding built-in profile");
            }
        }

        let config = Self {
            default_profile: raw
                .default_profile
                .unwrap_or_else(|| OPENAI_PROFILE_ID.to_string()),
            profiles,
            request: raw.request,
        };
        // Fail at load time rather than on the first request.
        config.active_profile()?;
        Ok(config)
    }

    pub fn profile(&self, id: &str) -> Result<&VariantProfile> {
        self.profiles
            .get(id)
            .ok_or_else(|| ResponsesErr::UnknownProfile(id.to_string()))
    }

    pub fn active_profile(&self) -> Result<&VariantProfile> {
        self.profile(&self.default_profile)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: OPENAI_PROFILE_ID.to_string(),
            profiles: built_in_profiles(),
            request: RequestOptions::default(),
        }
    }
}

/// Returns the path to the configuration directory, `~/.responses`. Does not
/// verify that the directory exists.
pub fn responses_home() -> std::io::Result<PathBuf> {
    let mut p = home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not find home directory",
        )
    })?;
    p.push(".responses");
    Ok(p)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::assembler::ReasoningEffort;
    use crate::variant_profile::CHATGPT_CODEX_PROFILE_ID;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_built_in_profiles() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.profiles.contains_key(CHATGPT_CODEX_PROFILE_ID));
        assert_eq!(config.active_profile().unwrap().backend_id, OPENAI_PROFILE_ID);
    }

    #[test]
    fn user_profiles_extend_built_ins() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("gateway.md"), "\n  Gateway rules.  \n").unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            r#"
default_profile = "gateway"

[profiles.gateway]
backend_id = "gateway"
endpoint_url = "https://gateway.example.com/v1/responses"
model_name = "gpt-5-mini"
instructions_file = "gateway.md"
allows_store_flag = true

[profiles.gateway.http_headers]
x-gateway-key = "abc"

[request]
max_output_tokens = 4096
reasoning_effort = "high"
encrypted_reasoning = true
"#,
        )
        .unwrap();

        let config = Config::load_from_dir(dir.path()).unwrap();
        let gateway = config.active_profile().unwrap();
        assert_eq!(gateway.instructions_text, "Gateway rules.");
        assert_eq!(gateway.http_headers["x-gateway-key"], "abc");
        assert!(gateway.allows_store_flag);
        assert!(gateway.requires_same_batch_pairing);
        assert_eq!(config.request.max_output_tokens, Some(4096));
        assert_eq!(config.request.reasoning_effort, Some(ReasoningEffort::High));
        assert!(config.request.encrypted_reasoning);
        assert!(config.profiles.contains_key(OPENAI_PROFILE_ID));
    }

    #[test]
    fn unknown_default_profile_is_rejected() {
        let err = Config::from_toml(r#"default_profile = "missing""#, Path::new(".")).unwrap_err();
        assert!(matches!(err, ResponsesErr::UnknownProfile(id) if id == "missing"));
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let err = Config::from_toml("default_profile = ", Path::new(".")).unwrap_err();
        assert!(matches!(err, ResponsesErr::Toml(_)));
    }
}
