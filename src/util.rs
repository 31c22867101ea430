const CONFIG_PATH: &str = "GM_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config.json";

pub fn get_default_config_path() -> &'static str {
    DEFAULT_CONFIG_PATH
}

/// Config file location, taken from `GM_CONFIG` if set and non-empty.
pub fn get_config_path() -> String {
    let path_from_env = std::env::var(CONFIG_PATH);
    path_from_env
        .ok()
        .filter(|path| !path.is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

const LOG_FILTER: &str = "GUARDIA_LOG";

/// Optional log filter directives (e.g. `guardia_collector=debug`).
pub fn get_log_filter() -> Option<String> {
    let filter_from_env = std::env::var(LOG_FILTER);
    filter_from_env.ok().filter(|filter| !filter.is_empty())
}
