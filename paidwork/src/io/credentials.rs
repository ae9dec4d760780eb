//! Credential discovery from the environment.
//!
//! Lookups go through a closure so callers (and tests) decide where values
//! come from; production passes [`env_lookup`].

/// Tokens for reading the source repository, in priority order.
pub const SOURCE_TOKEN_VARS: [&str; 2] = ["GH_TOKEN", "GITHUB_TOKEN"];

/// Token with write access to the public repository.
pub const PUBLIC_TOKEN_VAR: &str = "GH_PAT";

/// First non-blank value among `names`.
pub fn resolve_token<F>(names: &[&str], lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names
        .iter()
        .filter_map(|name| lookup(name))
        .find(|value| !value.trim().is_empty())
}

pub fn source_token<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    resolve_token(&SOURCE_TOKEN_VARS, lookup)
}

pub fn public_token<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    resolve_token(&[PUBLIC_TOKEN_VAR], lookup)
}

/// Process environment lookup.
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
