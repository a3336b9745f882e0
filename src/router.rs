//! Command tree and router.
//!
//! The tree is plain data: every node has a name and help text, and is either
//! a branch (children only) or a leaf (a body only). It is built once at
//! startup and walked read-only. Child lookup is exact and case-sensitive.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use tracing::debug;

use crate::error::Error;

/// Leaf body: receives the arguments left after the path was consumed.
pub type Handler<C> = fn(&mut C, &[String]) -> Result<()>;

/// Where the router writes help text.
pub trait Console {
    fn out(&mut self) -> &mut dyn Write;
}

pub enum Kind<C> {
    Branch(Vec<Node<C>>),
    Leaf(Handler<C>),
}

/// One named node of the command tree.
pub struct Node<C> {
    name: &'static str,
    help: &'static [&'static str],
    kind: Kind<C>,
}

impl<C> Node<C> {
    pub fn leaf(name: &'static str, help: &'static [&'static str], handler: Handler<C>) -> Self {
        Self {
            name,
            help,
            kind: Kind::Leaf(handler),
        }
    }

    /// Children keep their declared order; names must be unique among them.
    pub fn branch(name: &'static str, help: &'static [&'static str], children: Vec<Node<C>>) -> Self {
        debug_assert!(
            children
                .iter()
                .enumerate()
                .all(|(i, a)| children[i + 1..].iter().all(|b| a.name != b.name)),
            "duplicate child name under '{name}'"
        );
        Self {
            name,
            help,
            kind: Kind::Branch(children),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// First help line.
    pub fn summary(&self) -> &'static str {
        self.help.first().copied().unwrap_or("")
    }

    pub fn children(&self) -> &[Node<C>] {
        match &self.kind {
            Kind::Branch(children) => children,
            Kind::Leaf(_) => &[],
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, Kind::Leaf(_))
    }

    pub fn child(&self, name: &str) -> Option<&Node<C>> {
        self.children().iter().find(|c| c.name == name)
    }

    /// Help for this node, reached via `path` (e.g. `["hatch", "docker"]`).
    pub fn render_help(&self, path: &[&str]) -> String {
        let mut text = String::new();
        let invocation = path.join(" ");
        if self.is_leaf() {
            let _ = writeln!(text, "Usage: {} [flags]", invocation);
        } else {
            let _ = writeln!(text, "Usage: {} <command> [flags] [--help|-h]", invocation);
        }
        text.push('\n');
        for line in self.help {
            let _ = writeln!(text, "{}", line);
        }

        let children = self.children();
        if !children.is_empty() {
            let width = children.iter().map(|c| c.name.len()).max().unwrap_or(0);
            text.push_str("\nCommands:\n");
            for child in children {
                let _ = writeln!(text, "  {:width$}  {}", child.name, child.summary());
            }
        }
        text
    }

    /// Every path from this node down to a leaf, this node's name excluded.
    pub fn leaf_paths(&self) -> Vec<Vec<&'static str>> {
        match &self.kind {
            Kind::Leaf(_) => vec![Vec::new()],
            Kind::Branch(children) => children
                .iter()
                .flat_map(|child| {
                    child.leaf_paths().into_iter().map(move |mut tail| {
                        tail.insert(0, child.name);
                        tail
                    })
                })
                .collect(),
        }
    }
}

/// Where a walk through the tree ended.
pub enum Resolved<'t, 'a, C> {
    /// Help was requested, or a branch ran out of arguments.
    Help {
        node: &'t Node<C>,
        path: Vec<&'static str>,
    },
    /// A leaf and the arguments left for its body.
    Leaf {
        node: &'t Node<C>,
        path: Vec<&'static str>,
        rest: &'a [String],
    },
}

/// Final outcome of a routed invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    HelpShown,
    Completed,
}

fn is_help_flag(arg: Option<&String>) -> bool {
    matches!(arg.map(String::as_str), Some("--help" | "-h"))
}

/// Walk `args` from `root` without running anything.
///
/// `args` itself is never modified; each step narrows a sub-slice of it.
pub fn resolve<'t, 'a, C>(root: &'t Node<C>, args: &'a [String]) -> Result<Resolved<'t, 'a, C>, Error> {
    let mut node = root;
    let mut rest = args;
    let mut path = vec![root.name];

    loop {
        if is_help_flag(rest.first()) {
            return Ok(Resolved::Help { node, path });
        }
        if node.is_leaf() {
            return Ok(Resolved::Leaf { node, path, rest });
        }
        let Some((first, remainder)) = rest.split_first() else {
            return Ok(Resolved::Help { node, path });
        };
        match node.child(first) {
            Some(child) => {
                node = child;
                rest = remainder;
                path.push(child.name);
            }
            None => {
                return Err(Error::UnknownCommand {
                    attempted: first.clone(),
                    valid: node.children().iter().map(|c| c.name.to_string()).collect(),
                    path: path.join(" "),
                });
            }
        }
    }
}

/// Resolve `args` and either print help or run the leaf body.
pub fn route<C: Console>(root: &Node<C>, args: &[String], ctx: &mut C) -> Result<Outcome> {
    match resolve(root, args)? {
        Resolved::Help { node, path } => {
            let text = node.render_help(&path);
            ctx.out().write_all(text.as_bytes())?;
            Ok(Outcome::HelpShown)
        }
        Resolved::Leaf { node, path, rest } => {
            debug!(command = %path.join(" "), args = ?rest, "dispatching");
            match &node.kind {
                Kind::Leaf(handler) => handler(ctx, rest)?,
                Kind::Branch(_) => unreachable!("resolve only stops at leaves"),
            }
            Ok(Outcome::Completed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        out: Vec<u8>,
        calls: Vec<(String, Vec<String>)>,
    }

    impl Console for Recorder {
        fn out(&mut self) -> &mut dyn Write {
            &mut self.out
        }
    }

    fn alpha(ctx: &mut Recorder, args: &[String]) -> Result<()> {
        ctx.calls.push(("alpha".into(), args.to_vec()));
        Ok(())
    }

    fn beta(ctx: &mut Recorder, args: &[String]) -> Result<()> {
        ctx.calls.push(("beta".into(), args.to_vec()));
        Ok(())
    }

    fn broken(_ctx: &mut Recorder, _args: &[String]) -> Result<()> {
        anyhow::bail!("body failed")
    }

    fn tree() -> Node<Recorder> {
        Node::branch(
            "tool",
            &["Test tool"],
            vec![
                Node::leaf("alpha", &["Runs alpha"], alpha),
                Node::branch(
                    "group",
                    &["Grouped commands", "second line"],
                    vec![
                        Node::leaf("beta", &["Runs beta"], beta),
                        Node::leaf("broken", &["Always fails"], broken),
                    ],
                ),
            ],
        )
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_args_show_root_help() {
        let root = tree();
        let mut ctx = Recorder::default();
        let outcome = route(&root, &[], &mut ctx).unwrap();
        assert_eq!(outcome, Outcome::HelpShown);

        let text = String::from_utf8(ctx.out).unwrap();
        assert!(text.contains("Test tool"));
        assert!(text.contains("alpha  Runs alpha"));
        assert!(text.contains("group  Grouped commands"));
        assert!(!text.contains("second line"));
        assert!(ctx.calls.is_empty());
    }

    #[test]
    fn test_help_flags_on_branch_and_leaf() {
        let root = tree();
        for flag in ["--help", "-h"] {
            let mut ctx = Recorder::default();
            let outcome = route(&root, &args(&["group", flag]), &mut ctx).unwrap();
            assert_eq!(outcome, Outcome::HelpShown);
            let text = String::from_utf8(ctx.out).unwrap();
            assert!(text.starts_with("Usage: tool group <command>"));
            assert!(text.contains("beta"));

            let mut ctx = Recorder::default();
            route(&root, &args(&["alpha", flag]), &mut ctx).unwrap();
            assert!(ctx.calls.is_empty());
            assert!(String::from_utf8(ctx.out).unwrap().contains("Runs alpha"));
        }
    }

    #[test]
    fn test_leaf_receives_remaining_args() {
        let root = tree();
        let mut ctx = Recorder::default();
        let input = args(&["group", "beta", "--flag", "value"]);
        let outcome = route(&root, &input, &mut ctx).unwrap();
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(ctx.calls, vec![("beta".to_string(), args(&["--flag", "value"]))]);
        // Input is untouched
        assert_eq!(input, args(&["group", "beta", "--flag", "value"]));
    }

    #[test]
    fn test_leaf_without_args_runs() {
        let root = tree();
        let mut ctx = Recorder::default();
        route(&root, &args(&["alpha"]), &mut ctx).unwrap();
        assert_eq!(ctx.calls, vec![("alpha".to_string(), vec![])]);
    }

    #[test]
    fn test_body_error_propagates() {
        let root = tree();
        let mut ctx = Recorder::default();
        let err = route(&root, &args(&["group", "broken"]), &mut ctx).unwrap_err();
        assert_eq!(err.to_string(), "body failed");
    }

    #[test]
    fn test_unknown_command_lists_siblings() {
        let root = tree();
        let err = match resolve(&root, &args(&["group", "gamma"])) {
            Err(err) => err,
            Ok(_) => panic!("expected UnknownCommand"),
        };
        match err {
            Error::UnknownCommand {
                attempted,
                valid,
                path,
            } => {
                assert_eq!(attempted, "gamma");
                assert_eq!(valid, vec!["beta", "broken"]);
                assert_eq!(path, "tool group");
            }
            other => panic!("expected UnknownCommand, got {other:?}"),
        }
    }

    #[test]
    fn test_lookup_is_exact() {
        let root = tree();
        for attempt in ["Alpha", "alp", "alpha "] {
            assert!(resolve(&root, &args(&[attempt])).is_err(), "{attempt} matched");
        }
    }

    #[test]
    fn test_every_leaf_path_reaches_exactly_its_leaf() {
        let root = tree();
        let paths = root.leaf_paths();
        assert_eq!(
            paths,
            vec![vec!["alpha"], vec!["group", "beta"], vec!["group", "broken"]]
        );

        for leaf_path in paths {
            let input = args(&leaf_path);
            match resolve(&root, &input) {
                Ok(Resolved::Leaf { node, path, rest }) => {
                    assert_eq!(node.name(), *leaf_path.last().unwrap());
                    assert_eq!(&path[1..], &leaf_path[..]);
                    assert!(rest.is_empty());
                }
                _ => panic!("{leaf_path:?} did not resolve to a leaf"),
            }
        }
    }
}
