use std::path::Path;
use std::sync::Arc;

use assert_cmd::Command;
use merit::config::Config;
use merit::engine::Engine;
use merit::relay::ConnectionRegistry;
use merit::store::Store;
use merit::user::{NewUser, Role, User};
use tempfile::TempDir;

pub struct TestApp {
    dir: TempDir,
}

#[allow(dead_code)]
impl TestApp {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn engine(&self) -> Engine {
        self.engine_with(Arc::new(ConnectionRegistry::new()))
    }

    pub fn engine_with(&self, registry: Arc<ConnectionRegistry>) -> Engine {
        let store = Store::open_in_dir(self.path()).expect("open store");
        Engine::new(store, registry, Config::default())
    }

    pub fn register(&self, engine: &Engine, username: &str, role: Role) -> User {
        engine
            .register_user(NewUser {
                username: username.to_string(),
                password: "correct horse".to_string(),
                role,
            })
            .expect("register user")
    }

    pub fn merit_cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("merit").expect("merit binary");
        cmd.env("MERIT_DATA", self.path());
        cmd.env_remove("MERIT_USER");
        cmd.env_remove("RUST_LOG");
        cmd
    }
}
