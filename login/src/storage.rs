use std::fs::OpenOptions;
use std::io::Read;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::credential::Credential;

/// On-disk shape of `auth.json`.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct AuthDotJson {
    #[serde(rename = "OPENAI_API_KEY", default)]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Credential>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refresh: Option<DateTime<Utc>>,
}

pub fn get_auth_file(home: &Path) -> PathBuf {
    home.join("auth.json")
}

pub fn try_read_auth_json(auth_file: &Path) -> std::io::Result<AuthDotJson> {
    let mut file = std::fs::File::open(auth_file)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    let auth_dot_json: AuthDotJson = serde_json::from_str(&contents)?;
    Ok(auth_dot_json)
}

pub fn write_auth_json(auth_file: &Path, auth_dot_json: &AuthDotJson) -> std::io::Result<()> {
    if let Some(parent) = auth_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json_data = serde_json::to_string_pretty(auth_dot_json)?;
    let mut options = OpenOptions::new();
    options.truncate(true).write(true).create(true);
    #[cfg(unix)]
    {
        options.mode(0o600);
    }
    let mut file = options.open(auth_file)?;
    file.write_all(json_data.as_bytes())?;
    file.flush()?;
    Ok(())
}

pub(crate) fn persist_credential(auth_file: &Path, credential: &Credential) -> std::io::Result<()> {
    let auth = AuthDotJson {
        api_key: None,
        tokens: Some(credential.clone()),
        last_refresh: Some(Utc::now()),
    };
    write_auth_json(auth_file, &auth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    #[expect(clippy::unwrap_used)]
    fn loads_api_key_from_auth_json() {
        let dir = tempdir().unwrap();
        let auth_file = get_auth_file(dir.path());
        std::fs::write(
            &auth_file,
            r#"
        {
            "OPENAI_API_KEY": "sk-test-key",
            "tokens": null,
            "last_refresh": null
        }
        "#,
        )
        .unwrap();

        let auth = try_read_auth_json(&auth_file).unwrap();
        assert_eq!(auth.api_key.as_deref(), Some("sk-test-key"));
        assert_eq!(auth.tokens, None);
    }

    #[cfg(unix)]
    #[test]
    #[expect(clippy::unwrap_used)]
    fn written_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let auth_file = dir.path().join("nested").join("auth.json");
        let auth = AuthDotJson {
            api_key: Some("sk".to_string()),
            tokens: None,
            last_refresh: None,
        };
        write_auth_json(&auth_file, &auth).unwrap();
        let mode = std::fs::metadata(&auth_file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(try_read_auth_json(&auth_file).unwrap(), auth);
    }
}
