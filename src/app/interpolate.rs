use crate::app::inputs::InputValues;
use crate::error::InterpolationError;
use crate::model::Invocation;
use regex::Regex;
use std::sync::OnceLock;

fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]*)\}").expect("valid reference pattern"))
}

/// Replace `${name}` with the collected input of that exact name and `${env:NAME}`
/// with the environment variable (empty when unset). Any other unresolved
/// reference fails the whole string.
pub fn interpolate(
    text: &str,
    values: &InputValues,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<String, InterpolationError> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in reference_re().captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        let name = name.as_str();
        if let Some(var) = name.strip_prefix("env:") {
            out.push_str(&env(var).unwrap_or_default());
        } else {
            let sub = values.substitution(name).ok_or_else(|| InterpolationError {
                reference: name.to_string(),
            })?;
            out.push_str(sub);
        }
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Interpolate each part of an invocation separately; a value never splits into
/// several arguments.
pub fn interpolate_invocation(
    inv: &Invocation,
    values: &InputValues,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<Invocation, InterpolationError> {
    inv.try_map(|part| interpolate(part, values, env))
}

pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
