use std::collections::HashMap;

use tracing::warn;

/// Where `$NAME` indirections in environment variable values get resolved
pub trait EnvLookup: Send + Sync {
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Resolves against the environment of this process
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Merges profile variables with workspace variables, resolving `$NAME` values
///
/// Workspace variables win on key collisions. A value pointing at a variable
/// that is not set is skipped with a warning, it never fails the merge.
pub fn resolve_env_vars(
    base: Option<&HashMap<String, String>>,
    overrides: &HashMap<String, String>,
    env: &dyn EnvLookup,
) -> HashMap<String, String> {
    let mut env_vars = HashMap::new();

    for (key, value) in base.into_iter().flatten().chain(overrides) {
        match value.strip_prefix('$') {
            Some(name) => match env.lookup(name) {
                Some(resolved) => {
                    env_vars.insert(key.clone(), resolved);
                }
                None => warn!(key = %key, "Environment variable {} not found", name),
            },
            None => {
                env_vars.insert(key.clone(), value.clone());
            }
        }
    }

    env_vars
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolves_indirection() {
        let env = vars(&[("HOME", "/root")]);

        let resolved = resolve_env_vars(Some(&vars(&[("A", "$HOME")])), &HashMap::new(), &env);

        assert_eq!(resolved, vars(&[("A", "/root")]));
    }

    #[test_log::test]
    fn test_drops_unresolved_indirection() {
        let env = HashMap::new();

        let resolved = resolve_env_vars(Some(&vars(&[("A", "$HOME")])), &HashMap::new(), &env);

        assert!(resolved.is_empty());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let env = HashMap::new();

        let resolved = resolve_env_vars(Some(&vars(&[("A", "1")])), &vars(&[("A", "2")]), &env);

        assert_eq!(resolved, vars(&[("A", "2")]));
    }

    #[test]
    fn test_unresolved_override_keeps_base_value() {
        let env = HashMap::new();

        let resolved = resolve_env_vars(
            Some(&vars(&[("A", "1"), ("B", "plain")])),
            &vars(&[("A", "$MISSING"), ("C", "$ALSO_MISSING")]),
            &env,
        );

        assert_eq!(resolved, vars(&[("A", "1"), ("B", "plain")]));
    }

    #[test]
    fn test_without_profile() {
        let env = vars(&[("TOKEN", "abc")]);

        let resolved = resolve_env_vars(None, &vars(&[("GH_TOKEN", "$TOKEN"), ("X", "y")]), &env);

        assert_eq!(resolved, vars(&[("GH_TOKEN", "abc"), ("X", "y")]));
    }

    #[test]
    fn test_process_env() {
        let path = std::env::var("PATH").ok();
        assert_eq!(ProcessEnv.lookup("PATH"), path);
    }
}
