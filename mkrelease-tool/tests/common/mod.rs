use assert_cmd::Command;
use async_zip::tokio::read::fs::ZipFileReader;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const README: &[u8] = b"# flexy-osisoft-connector\n";
pub const JAR: &[u8] = &[0x50, 0x4B, 0x03, 0x04, 0x14, 0x00, 0x08, 0x00];
pub const CONNECTOR_CONFIG: &[u8] = br#"{"AppConfig":{"OSIsoftServerIP":"10.0.0.1"}}"#;
pub const JVMRUN: &[u8] = b"#!/bin/sh\n/usr/bin/java -jar flexy-osisoft-connector.jar\n";

/// A checkout shaped like the connector repo:
/// `<root>/README.md` and `<root>/connector/{tools,build,config,scripts}`.
pub struct TestEnv {
    _tmp: TempDir,
    pub root: PathBuf,
    pub tools: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let root = tmp.path().to_path_buf();
        let connector = root.join("connector");
        for dir in ["tools", "build", "config", "scripts"] {
            fs::create_dir_all(connector.join(dir)).expect("create fixture dir");
        }

        fs::write(root.join("README.md"), README).expect("write readme");
        fs::write(connector.join("build/flexy-osisoft-connector.jar"), JAR).expect("write jar");
        fs::write(connector.join("config/ConnectorConfig.json"), CONNECTOR_CONFIG)
            .expect("write config");
        fs::write(connector.join("scripts/jvmrun"), JVMRUN).expect("write jvmrun");

        Self {
            _tmp: tmp,
            tools: connector.join("tools"),
            root,
        }
    }

    pub fn releases(&self) -> PathBuf {
        self.root.join("connector/releases")
    }

    pub fn archive(&self, version: &str) -> PathBuf {
        self.releases()
            .join(format!("flexy-osisoft-connector-{version}.zip"))
    }

    /// `mkrelease` running from the tools directory with a clean environment.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("mkrelease").expect("binary exists");
        cmd.current_dir(&self.tools);
        for (key, _) in std::env::vars() {
            if key.starts_with("MKRELEASE_") {
                cmd.env_remove(key);
            }
        }
        cmd
    }
}

/// Entry names and contents, in archive order.
pub fn read_archive(path: &Path) -> Vec<(String, Vec<u8>)> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("build runtime");

    rt.block_on(async {
        let reader = ZipFileReader::new(path).await.expect("open archive");
        let mut out = Vec::new();
        for index in 0..reader.file().entries().len() {
            let name = reader.file().entries()[index]
                .filename()
                .as_str()
                .expect("utf-8 entry name")
                .to_string();
            let mut data = Vec::new();
            let mut entry = reader.reader_with_entry(index).await.expect("open entry");
            entry.read_to_end_checked(&mut data).await.expect("read entry");
            out.push((name, data));
        }
        out
    })
}
