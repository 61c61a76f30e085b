use k8scc::cancel;
use k8scc::cluster::KubeClusterClient;
use k8scc::config::K8sccConfig;
use k8scc::fs::RealFileSystem;
use k8scc::orchestrator::Orchestrator;
use k8scc::util::logging;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// Selects a phase by matching the basename of argv[0] or argv[1] against
/// the known procedure names, mirroring the original's
/// `getProcedureFromArg`. Returns the index of the matched argument
/// alongside the phase, since the two matches consume a different number
/// of leading argv slots: basename-dispatch (argv[0]) leaves all of
/// argv[1..] as positional phase arguments, while bare-positional dispatch
/// (argv[1]) consumes that slot as the keyword and leaves argv[2..].
fn select_phase(args: &[String]) -> Option<(&'static str, usize)> {
    const PHASES: &[&str] = &["detect", "build", "release", "run"];
    for (index, arg) in args.iter().take(2).enumerate() {
        let base = Path::new(arg)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(arg);
        if let Some(phase) = PHASES.iter().find(|p| **p == base) {
            return Some((phase, index));
        }
    }
    None
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_from_env();

    let args: Vec<String> = std::env::args().collect();
    let Some((phase, matched_index)) = select_phase(&args) else {
        eprintln!(
            "please pass one of the following values as the first argument \
             or set it as the name of the executable: detect, build, release, run"
        );
        return ExitCode::FAILURE;
    };

    let cfg_path = std::env::var("K8SCC_CFGFILE").unwrap_or_else(|_| "k8scc.yaml".to_string());
    let config = match K8sccConfig::load(Path::new(&cfg_path)) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, path = %cfg_path, "loading configuration");
            return ExitCode::FAILURE;
        }
    };

    let hostname = match std::env::var("HOSTNAME") {
        Ok(h) if !h.is_empty() => h,
        _ => match std::fs::read_to_string("/etc/hostname") {
            Ok(h) => h.trim().to_string(),
            Err(err) => {
                tracing::error!(error = %err, "determining hostname");
                return ExitCode::FAILURE;
            }
        },
    };

    let cluster = match KubeClusterClient::new(&config.namespace).await {
        Ok(client) => Arc::new(client),
        Err(err) => {
            tracing::error!(error = %err, "constructing kubernetes client");
            return ExitCode::FAILURE;
        }
    };

    let orchestrator = Orchestrator::new(config, hostname, Arc::new(RealFileSystem::new()), cluster);
    let cancellation = cancel::install_signal_handler();

    // argv[0]-basename dispatch leaves all of argv[1..] as positional args;
    // bare-positional dispatch (argv[1] is the phase keyword) leaves argv[2..].
    let positional: Vec<PathBuf> = args.iter().skip(matched_index + 1).map(PathBuf::from).collect();

    let result = match phase {
        "detect" => {
            if positional.len() != 2 {
                eprintln!("usage: detect src-dir md-dir");
                return ExitCode::FAILURE;
            }
            orchestrator.detect(&positional[1])
        }
        "build" => {
            if positional.len() != 3 {
                eprintln!("usage: build src-dir md-dir out-dir");
                return ExitCode::FAILURE;
            }
            orchestrator
                .build(&positional[0], &positional[1], &positional[2], cancellation)
                .await
        }
        "release" => {
            if positional.len() != 2 {
                eprintln!("usage: release bld-dir out-dir");
                return ExitCode::FAILURE;
            }
            orchestrator.release(&positional[0], &positional[1])
        }
        "run" => {
            if positional.len() != 2 {
                eprintln!("usage: run out-dir md-dir");
                return ExitCode::FAILURE;
            }
            orchestrator
                .run(&positional[0], &positional[1], cancellation)
                .await
        }
        _ => unreachable!("select_phase only returns known phases"),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = ?err, phase = %phase, "phase failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_phase_matches_bare_argument() {
        let args = vec!["k8scc".to_string(), "detect".to_string()];
        assert_eq!(select_phase(&args), Some(("detect", 1)));
    }

    #[test]
    fn select_phase_matches_basename_of_argv0() {
        let args = vec!["/usr/local/bin/build".to_string()];
        assert_eq!(select_phase(&args), Some(("build", 0)));
    }

    #[test]
    fn select_phase_returns_none_for_unknown_invocation() {
        let args = vec!["k8scc".to_string(), "bogus".to_string()];
        assert_eq!(select_phase(&args), None);
    }
}
