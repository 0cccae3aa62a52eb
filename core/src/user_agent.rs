pub const DEFAULT_ORIGINATOR: &str = "responses_sdk_rs";

pub fn get_user_agent(originator: Option<&str>) -> String {
    let build_version = env!("CARGO_PKG_VERSION");
    let os_info = os_info::get();
    format!(
        "{}/{build_version} ({} {}; {})",
        originator.unwrap_or(DEFAULT_ORIGINATOR),
        os_info.os_type(),
        os_info.version(),
        os_info.architecture().unwrap_or("unknown"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_user_agent() {
        let user_agent = get_user_agent(None);
        assert!(user_agent.starts_with("responses_sdk_rs/"));
        assert!(get_user_agent(Some("codex_cli_rs")).starts_with("codex_cli_rs/"));
    }
}
