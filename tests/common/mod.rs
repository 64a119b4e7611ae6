// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::net::{Ipv4Addr, SocketAddr, TcpListener};

use assert_cmd::{Command, cargo::cargo_bin_cmd};
use tempfile::TempDir;

/// `lily` with a private, empty repository and no endpoint overrides from the environment.
pub fn lily(repo: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("lily");
    cmd.env("LILY_REPO", repo.path())
        .env_remove("LILY_CONFIG")
        .env_remove("LILY_API")
        .env_remove("LILY_API_TOKEN")
        .env_remove("LILY_STORAGE")
        .env_remove("RUST_LOG");
    cmd
}

/// An address nothing listens on once this returns.
pub fn free_addr() -> SocketAddr {
    TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .and_then(|listener| listener.local_addr())
        .expect("no free port")
}
