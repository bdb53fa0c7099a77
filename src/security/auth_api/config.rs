#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub allow_anonymous_paths: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            allow_anonymous_paths: vec![
                "/health".to_string(),
                "/api/v1/auth/login".to_string(),
                "/api/v1/public/".to_string(),
            ],
        }
    }
}

impl AuthConfig {
    pub fn is_anonymous_allowed(&self, path: &str) -> bool {
        self.allow_anonymous_paths.iter().any(|allowed| {
            if allowed.ends_with('/') {
                path.starts_with(allowed.as_str())
            } else {
                path == allowed || path.starts_with(&format!("{allowed}/"))
            }
        })
    }
}
