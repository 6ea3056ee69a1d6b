use std::ffi::OsStr;

use clap_complete::engine::{ArgValueCompleter, CompletionCandidate};
use kube::config::Kubeconfig;

use crate::config::{GlobalOptions, PlatformEnv, load_kubeconfig, resolve_location};

/// Create an `ArgValueCompleter` that lists contexts from the kubeconfig the resolver would load.
///
/// The kubeconfig location follows the same precedence as [`crate::config::resolve`]. Any failure
/// produces no candidates.
pub fn context_value_completer() -> ArgValueCompleter {
    ArgValueCompleter::new(|input: &OsStr| -> Vec<CompletionCandidate> {
        let Some(kubeconfig) = read_kubeconfig() else {
            return Vec::new();
        };

        let input = input.to_string_lossy();
        context_candidates(&kubeconfig, input.trim())
    })
}

fn read_kubeconfig() -> Option<Kubeconfig> {
    let options = GlobalOptions::from_env().ok()?;
    let location = resolve_location(&options, &PlatformEnv::capture()).ok()?;
    load_kubeconfig(&location).ok()
}

/// Contexts starting with `prefix`, the current context first.
fn context_candidates(kubeconfig: &Kubeconfig, prefix: &str) -> Vec<CompletionCandidate> {
    let current_context = kubeconfig.current_context.as_deref();
    let mut completions = Vec::new();

    for named_context in &kubeconfig.contexts {
        let context_name = named_context.name.as_str();
        if !context_name.starts_with(prefix) {
            continue;
        }

        let is_current = current_context == Some(context_name);
        let mut details = Vec::new();
        if is_current {
            details.push(String::from("[current]"));
        }
        if let Some(ctx) = &named_context.context {
            details.push(format!("cluster={}", ctx.cluster));
            if let Some(namespace) = &ctx.namespace {
                details.push(format!("namespace={namespace}"));
            }
        }

        let mut candidate = CompletionCandidate::new(context_name);
        if !details.is_empty() {
            candidate = candidate.help(Some(details.join(" ").into()));
        }

        if is_current {
            completions.insert(0, candidate.display_order(Some(0)));
        } else {
            completions.push(candidate);
        }
    }

    completions
}

#[cfg(test)]
mod tests {
    use kube::config::Kubeconfig;

    use super::context_candidates;

    fn kubeconfig() -> Kubeconfig {
        Kubeconfig::from_yaml(
            r#"
current-context: staging
clusters: []
users: []
contexts:
- name: dev
  context:
    cluster: dev-cluster
- name: staging
  context:
    cluster: staging-cluster
    namespace: web
- name: prod
  context:
    cluster: prod-cluster
"#,
        )
        .unwrap()
    }

    fn values(kubeconfig: &Kubeconfig, prefix: &str) -> Vec<String> {
        context_candidates(kubeconfig, prefix)
            .iter()
            .map(|candidate| candidate.get_value().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn current_context_comes_first() {
        assert_eq!(values(&kubeconfig(), ""), ["staging", "dev", "prod"]);
    }

    #[test]
    fn filters_by_prefix() {
        assert_eq!(values(&kubeconfig(), "d"), ["dev"]);
        assert!(values(&kubeconfig(), "x").is_empty());
    }

    #[test]
    fn describes_cluster_and_namespace() {
        let candidates = context_candidates(&kubeconfig(), "staging");
        let help = candidates[0].get_help().unwrap().to_string();
        assert_eq!(help, "[current] cluster=staging-cluster namespace=web");
    }
}
