//! CLI commands end to end against a temporary workspace

use super::test_utils::{id, TestRoom};
use clap::Parser;
use concord::cli::{map_error, Cli, Commands, RunContext};
use concord::codec;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const OWNER_SEED: &str = "0101010101010101010101010101010101010101010101010101010101010101";
const MEMBER_SEED: &str = "0202020202020202020202020202020202020202020202020202020202020202";

struct Workspace {
    temp: TempDir,
    ctx: RunContext,
}

impl Workspace {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("concord.toml");
        std::fs::write(
            &config_path,
            format!(
                "[storage]\nstore_path = {:?}\n",
                temp.path().join("store").display().to_string()
            ),
        )
        .unwrap();
        let ctx = RunContext::new(temp.path().to_path_buf(), Some(config_path)).unwrap();
        Self { temp, ctx }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.temp.path().join("room").join(name)
    }

    fn run(&self, args: &[&str]) -> Value {
        let command = parse(args);
        let output = self.ctx.execute(&command).unwrap();
        serde_json::from_str(&output).unwrap()
    }

    fn init(&self) -> Value {
        let out = self.temp.path().join("room");
        self.run(&["init", "--seed", OWNER_SEED, "--name", "lobby", "--out", s(&out)])
    }
}

fn parse(args: &[&str]) -> Commands {
    let mut argv = vec!["concord"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap().command
}

fn s(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_init_writes_parameters_and_state() {
    let ws = Workspace::new();
    let out = ws.init();

    let room = TestRoom::new();
    assert_eq!(out["owner"], room.params.owner.to_hex());
    let params = std::fs::read(ws.path("parameters.bin")).unwrap();
    assert_eq!(params, room.parameters().into_bytes());

    let listed = ws.run(&["list"]);
    assert_eq!(listed["instances"][0], out["instance"]);

    let inspected = ws.run(&["inspect", "--state", s(&ws.path("state.bin"))]);
    assert_eq!(inspected["configuration"]["name"], "lobby");
    assert_eq!(inspected["members"].as_array().unwrap().len(), 0);
}

#[test]
fn test_invite_post_and_sync_through_files() {
    let ws = Workspace::new();
    ws.init();
    let params = ws.path("parameters.bin");
    let base = ws.path("state.bin");
    let member = id(1).to_hex();

    ws.run(&[
        "invite", "--params", s(&params), "--state", s(&base), "--seed", OWNER_SEED,
        "--member", member.as_str(), "--out", s(&ws.path("invited.bin")),
    ]);
    let posted = ws.run(&[
        "post", "--params", s(&params), "--state", s(&ws.path("invited.bin")),
        "--seed", MEMBER_SEED, "--content", "hello", "--out", s(&ws.path("posted.bin")),
    ]);
    assert_eq!(posted["messages"][0]["content"], "hello");
    assert_eq!(posted["members"][0]["id"], member);

    let summary = ws.run(&[
        "summarize", "--params", s(&params), "--state", s(&base), "--out", s(&ws.path("base.sum")),
    ]);
    assert!(summary["bytes"].as_u64().unwrap() > 0);

    let delta = ws.run(&[
        "delta", "--params", s(&params), "--state", s(&ws.path("posted.bin")),
        "--summary", s(&ws.path("base.sum")), "--out", s(&ws.path("update.delta")),
    ]);
    assert_eq!(delta["up_to_date"], false);

    let applied = ws.run(&[
        "apply", "--params", s(&params), "--state", s(&base), "--delta", s(&ws.path("update.delta")),
        "--out", s(&ws.path("applied.bin")), "--commit",
    ]);
    assert_eq!(applied["commit"]["changed"], true);
    assert_eq!(
        std::fs::read(ws.path("applied.bin")).unwrap(),
        std::fs::read(ws.path("posted.bin")).unwrap()
    );

    let verdict = ws.run(&[
        "validate", "--params", s(&params), "--state", s(&ws.path("applied.bin")),
    ]);
    assert_eq!(verdict["verdict"], "valid");

    let current = ws.run(&[
        "summarize", "--params", s(&params), "--state", s(&ws.path("applied.bin")),
        "--out", s(&ws.path("applied.sum")),
    ]);
    assert!(current["bytes"].as_u64().unwrap() > 0);
    let again = ws.run(&[
        "delta", "--params", s(&params), "--state", s(&ws.path("posted.bin")),
        "--summary", s(&ws.path("applied.sum")), "--out", s(&ws.path("none.delta")),
    ]);
    assert_eq!(again["up_to_date"], true);
}

#[test]
fn test_merge_command_combines_branches() {
    let ws = Workspace::new();
    ws.init();
    let params = ws.path("parameters.bin");
    let base = ws.path("state.bin");

    for (member, out) in [(1u8, "one.bin"), (2u8, "two.bin")] {
        let member = id(member).to_hex();
        ws.run(&[
            "invite", "--params", s(&params), "--state", s(&base), "--seed", OWNER_SEED,
            "--member", member.as_str(), "--out", s(&ws.path(out)),
        ]);
    }
    ws.run(&[
        "merge", "--params", s(&params), "--a", s(&ws.path("one.bin")), "--b",
        s(&ws.path("two.bin")), "--out", s(&ws.path("merged.bin")),
    ]);

    let merged = codec::decode_state(&concord::State::new(
        std::fs::read(ws.path("merged.bin")).unwrap(),
    ))
    .unwrap();
    assert!(merged.has_member(&id(1)));
    assert!(merged.has_member(&id(2)));
}

#[test]
fn test_post_by_outsider_is_rejected() {
    let ws = Workspace::new();
    ws.init();
    let command = parse(&[
        "post", "--params", s(&ws.path("parameters.bin")), "--state", s(&ws.path("state.bin")),
        "--seed", MEMBER_SEED, "--content", "let me in", "--out", s(&ws.path("nope.bin")),
    ]);

    let err = ws.ctx.execute(&command).unwrap_err();
    assert!(map_error(&err).starts_with("rejected:"));
    assert!(!ws.path("nope.bin").exists());
}

#[test]
fn test_bad_seed_is_invalid_input() {
    let ws = Workspace::new();
    let command = parse(&["init", "--seed", "abc", "--name", "x"]);
    let err = ws.ctx.execute(&command).unwrap_err();
    assert!(matches!(err, concord::ApiError::InvalidInput(_)));
}
