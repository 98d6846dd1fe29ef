use std::path::Path;

use tracing::debug;

const DOTENV_PATH: &str = "config/.env";

/// Load `config/.env`, falling back to `.env` in the working directory
pub fn load_dotenv() {
    match dotenv::from_path(Path::new(DOTENV_PATH)) {
        Ok(()) => debug!("loaded environment from {DOTENV_PATH}"),
        Err(_) => {
            if let Ok(path) = dotenv::dotenv() {
                debug!("loaded environment from {}", path.display());
            }
        }
    }
}

/// Non-empty value of an environment variable
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
