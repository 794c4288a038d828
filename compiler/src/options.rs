// options.rs — Per-scope option strings
//
// A scope's options are a colon-separated list of `key=value` items carried
// by the `ScopeOptions` attribute of its members. The only recognized key
// selects how the eligibility checker treats content that breaks a scope.
//
// Preconditions: none.
// Postconditions: a parsed `ScopeOptions`, unknown keys listed for warnings.
// Failure modes: bad policy value or item without `=` → `FusionError`.
// Side effects: none.

use crate::error::FusionError;

pub const STRICT_SCOPE_CHECK: &str = "strict-scope-check";

/// What to do with a non-member, non-pass-through node inside a scope span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrictPolicy {
    /// Record a cut point and split the scope automatically.
    #[default]
    Split,
    /// Tolerate the node and keep the scope whole.
    Bypass,
    /// Fail the whole pass.
    Abort,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeOptions {
    pub strict: StrictPolicy,
    pub unknown_keys: Vec<String>,
}

/// Parse the option string of `scope`.
pub fn parse_scope_options(scope: &str, raw: &str) -> Result<ScopeOptions, FusionError> {
    let mut opts = ScopeOptions::default();
    for item in raw.split(':').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((key, value)) = item.split_once('=') else {
            return Err(FusionError::MalformedOption {
                scope: scope.to_string(),
                item: item.to_string(),
            });
        };
        let (key, value) = (key.trim(), value.trim());
        if key != STRICT_SCOPE_CHECK {
            opts.unknown_keys.push(key.to_string());
            continue;
        }
        opts.strict = match value {
            "bypass" => StrictPolicy::Bypass,
            "abort" => StrictPolicy::Abort,
            _ => {
                return Err(FusionError::InvalidOption {
                    scope: scope.to_string(),
                    key: key.to_string(),
                    value: value.to_string(),
                })
            }
        };
    }
    Ok(opts)
}
