//! Mocks shared by the integration tests.
#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use alloy::primitives::{Address, Bytes, U256};
use argus_common::{
    ether::{
        compiler::{CompiledUnit, Compiler},
        provider::{BlockTag, ChainSource, NodeConnector},
    },
    Error,
};
use async_trait::async_trait;

/// A node that serves the same code and storage value for every address, and
/// counts the requests it receives. An unreachable node fails every request.
#[derive(Debug, Default)]
pub struct MockConnector {
    pub code: Bytes,
    pub storage: U256,
    pub unreachable: bool,
    calls: AtomicUsize,
}

impl MockConnector {
    pub fn with_code(code: &[u8]) -> Self {
        Self { code: Bytes::from(code.to_vec()), ..Default::default() }
    }

    pub fn with_storage(value: U256) -> Self {
        Self { storage: value, ..Default::default() }
    }

    pub fn unreachable() -> Self {
        Self { unreachable: true, ..Default::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Count a request and answer it with `value`, unless the node is unreachable.
    fn respond<T>(&self, value: T) -> Result<T, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(Error::ConnectorUnavailable {
                endpoint: "http://localhost:8545".to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(value)
    }
}

#[async_trait]
impl NodeConnector for MockConnector {
    async fn get_code(&self, _address: Address) -> Result<Bytes, Error> {
        self.respond(self.code.clone())
    }

    async fn get_storage_at(
        &self,
        _address: Address,
        _index: U256,
        _block: BlockTag,
    ) -> Result<U256, Error> {
        self.respond(self.storage)
    }
}

#[async_trait]
impl ChainSource for MockConnector {
    async fn latest_block_number(&self) -> Result<u64, Error> {
        self.respond(0)
    }

    async fn created_contracts(&self, _number: u64) -> Result<Vec<Address>, Error> {
        self.respond(vec![])
    }

    async fn get_balance(&self, _address: Address) -> Result<U256, Error> {
        self.respond(U256::ZERO)
    }
}

/// Compiles every file to `PUSH1 0x01 STOP`, named after the file stem, except
/// the file whose stem is `fail_on`.
#[derive(Debug, Default)]
pub struct MockCompiler {
    pub fail_on: Option<String>,
    calls: AtomicUsize,
}

impl MockCompiler {
    pub fn failing_on(stem: &str) -> Self {
        Self { fail_on: Some(stem.to_string()), ..Default::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Compiler for MockCompiler {
    fn compile(&self, path: &Path) -> Result<CompiledUnit, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();

        if self.fail_on.as_deref() == Some(stem.as_str()) {
            return Err(Error::Compilation {
                path: path.display().to_string(),
                diagnostic: "ParserError: Expected ';' but got '}'".to_string(),
            });
        }
        Ok(CompiledUnit { name: stem, bytecode: vec![0x60, 0x01, 0x00] })
    }
}

/// An empty directory unique to this process and `name`.
pub fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir()
        .join(format!("argus-core-tests-{}", std::process::id()))
        .join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("failed to create scratch directory");
    dir
}

/// Write a solidity file named `<name>.sol` into `dir`.
pub fn source_file(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(format!("{name}.sol"));
    std::fs::write(&path, format!("contract {name} {{\n{body}\n}}\n"))
        .expect("failed to write source file");
    path
}
