//! Command routing tests: the real tree, routed in-process and via the binary.

mod helpers;

use hatch::router::Outcome;
use hatch::Error;
use helpers::TestEnv;

// =============================================================================
// In-process routing
// =============================================================================

#[test]
fn test_no_args_shows_root_help() {
    let env = TestEnv::new();
    let routed = env.route(&[]);

    assert_eq!(routed.result.unwrap(), Outcome::HelpShown);
    assert!(routed.output.starts_with("Usage: hatch <command>"));
    for name in ["clean", "docker", "config"] {
        assert!(routed.output.contains(&format!("  {}", name)), "missing {name}");
    }
    assert_eq!(routed.launches, 0);
}

#[test]
fn test_branch_without_subcommand_shows_help() {
    let env = TestEnv::new();
    let routed = env.route(&["docker"]);

    assert_eq!(routed.result.unwrap(), Outcome::HelpShown);
    assert!(routed.output.contains("Setup and run the app via docker"));
    for name in ["init", "build", "run", "enter"] {
        assert!(routed.output.contains(name), "missing {name}");
    }
}

#[test]
fn test_leaf_help_does_not_run_body() {
    let env = TestEnv::new();
    env.mkdir(".build");

    for flag in ["--help", "-h"] {
        let routed = env.route(&["clean", flag]);
        assert_eq!(routed.result.unwrap(), Outcome::HelpShown);
        assert!(routed.output.contains("Cleans temporary files."));
    }
    helpers::assert_exists(&env.project.join(".build"));
}

#[test]
fn test_unknown_docker_subcommand() {
    let env = TestEnv::new();
    let routed = env.route(&["docker", "nonexistentsubcmd"]);

    let err = routed.result.unwrap_err();
    match err.downcast_ref::<Error>() {
        Some(Error::UnknownCommand {
            attempted, valid, ..
        }) => {
            assert_eq!(attempted, "nonexistentsubcmd");
            assert_eq!(valid.join("|"), "init|build|run|enter");
        }
        other => panic!("expected UnknownCommand, got {other:?}"),
    }
    assert_eq!(routed.launches, 0);
}

#[test]
fn test_unknown_top_level_command_is_case_sensitive() {
    let env = TestEnv::new();
    let err = env.route(&["Clean"]).result.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::UnknownCommand { .. })
    ));
}

#[test]
fn test_every_leaf_path_routes_to_one_leaf() {
    let tree = hatch::commands::tree();
    let mut seen = Vec::new();
    for path in tree.leaf_paths() {
        let args: Vec<String> = path.iter().map(|s| s.to_string()).collect();
        match hatch::router::resolve(&tree, &args) {
            Ok(hatch::router::Resolved::Leaf { node, path: walked, .. }) => {
                assert_eq!(&walked[1..], &path[..]);
                let key = walked.join(" ");
                assert!(!seen.contains(&key), "{key} reached twice");
                seen.push(key);
                assert_eq!(node.name(), *path.last().unwrap());
            }
            _ => panic!("{path:?} did not reach a leaf"),
        }
    }
    assert_eq!(seen.len(), 6);
}

#[test]
fn test_bad_leaf_flag_is_usage_error() {
    let env = TestEnv::new();
    let err = env.route(&["clean", "--bogus"]).result.unwrap_err();
    assert_eq!(hatch::error::exit_code(&err), hatch::error::EXIT_USAGE);
}

#[test]
fn test_config_lists_settings() {
    let env = TestEnv::new();
    let routed = env.route(&["config"]);
    assert_eq!(routed.result.unwrap(), Outcome::Completed);
    assert!(routed.output.contains("HATCH_TEST_DIRECTORY"));
    assert!(routed.output.contains(&env.project.display().to_string()));
    assert!(routed.output.contains("docker:"));
}

// =============================================================================
// Binary
// =============================================================================

#[test]
fn test_binary_no_args_exits_zero_with_help() {
    let env = TestEnv::new();
    let output = env.run_binary(&[]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage: hatch <command>"));
}

#[test]
fn test_binary_unknown_command_exits_nonzero() {
    let env = TestEnv::new();
    let output = env.run_binary(&["docker", "nonexistentsubcmd"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("error: unknown command 'nonexistentsubcmd'"));
    assert!(stderr.contains("init|build|run|enter"));
    assert!(!stderr.contains("panicked"));
}
