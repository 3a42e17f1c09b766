//! Integration tests for contract acquisition.

mod common;

#[cfg(test)]
mod integration_tests {
    use std::collections::HashSet;

    use alloy::primitives::Address;
    use argus_common::{
        ether::signatures::{selector, SignatureCatalog},
        Error,
    };
    use argus_core::{acquire, indexed_address, Source};
    use serde_json::Value;

    use crate::common::{scratch, source_file, MockCompiler, MockConnector};

    fn catalog_on_disk(path: &std::path::Path) -> serde_json::Map<String, Value> {
        let contents = std::fs::read_to_string(path).expect("catalog exists");
        match serde_json::from_str(&contents).expect("catalog is json") {
            Value::Object(map) => map,
            other => panic!("catalog is not an object: {other}"),
        }
    }

    #[tokio::test]
    async fn test_files_get_distinct_reproducible_addresses() {
        let dir = scratch("distinct");
        let files = (0..16)
            .map(|i| source_file(&dir, &format!("C{i}"), &format!("function f{i}() public {{}}")))
            .collect::<Vec<_>>();
        let source = Source::Files(files);
        let compiler = MockCompiler::default();

        let mut catalog = SignatureCatalog::new();
        let first = acquire(&source, &mut catalog, None, &compiler, &dir.join("signatures.json"))
            .await
            .expect("acquisition succeeds");
        let mut catalog = SignatureCatalog::new();
        let second = acquire(&source, &mut catalog, None, &compiler, &dir.join("signatures.json"))
            .await
            .expect("acquisition succeeds");

        assert_eq!(first.len(), 16);
        let addresses = first.iter().map(|c| c.address).collect::<HashSet<_>>();
        assert_eq!(addresses.len(), 16);
        for (i, (a, b)) in first.iter().zip(&second).enumerate() {
            assert_eq!(a.name, format!("C{i}"));
            assert_eq!(a.address, b.address);
            assert_eq!(a.address, indexed_address(i).expect("in range"));
        }
    }

    #[tokio::test]
    async fn test_too_many_files_rejected_before_compiling() {
        let dir = scratch("too-many");
        let files = (0..17)
            .map(|i| source_file(&dir, &format!("C{i}"), "function f() public {}"))
            .collect::<Vec<_>>();
        let compiler = MockCompiler::default();

        let result = acquire(
            &Source::Files(files),
            &mut SignatureCatalog::new(),
            None,
            &compiler,
            &dir.join("signatures.json"),
        )
        .await;

        assert!(matches!(result, Err(Error::TooManyContracts { count: 17, max: 16 })));
        assert_eq!(compiler.calls(), 0);
    }

    #[tokio::test]
    async fn test_signatures_persist_and_reload() {
        let dir = scratch("persist");
        let catalog_path = dir.join("signatures.json");
        let file = source_file(
            &dir,
            "Token",
            "function foo(uint256 amount) public {}\n\
             function bar() external view returns (uint) {}",
        );

        let mut catalog = SignatureCatalog::load(&catalog_path).expect("catalog loads");
        let compiler = MockCompiler::default();
        acquire(&Source::Files(vec![file]), &mut catalog, None, &compiler, &catalog_path)
            .await
            .expect("acquisition succeeds");

        let stored = catalog_on_disk(&catalog_path);
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[&selector("foo(uint256)")], "foo(uint256)");
        assert_eq!(stored[&selector("bar()")], "bar()");

        let reloaded = SignatureCatalog::load(&catalog_path).expect("catalog reloads");
        assert_eq!(reloaded, catalog);

        let copy_path = dir.join("copy.json");
        reloaded.save(&copy_path).expect("catalog saves");
        assert_eq!(
            std::fs::read(&catalog_path).expect("original exists"),
            std::fs::read(&copy_path).expect("copy exists")
        );
    }

    #[tokio::test]
    async fn test_colliding_selector_keeps_original() {
        let dir = scratch("collision");
        let catalog_path = dir.join("signatures.json");
        let foo = selector("foo(uint256)");
        std::fs::write(&catalog_path, format!("{{\"{foo}\": \"original()\"}}"))
            .expect("failed to seed catalog");

        let file = source_file(&dir, "Token", "function foo(uint256 amount) public {}");
        let mut catalog = SignatureCatalog::load(&catalog_path).expect("catalog loads");
        let compiler = MockCompiler::default();
        acquire(&Source::Files(vec![file]), &mut catalog, None, &compiler, &catalog_path)
            .await
            .expect("acquisition succeeds");

        assert_eq!(catalog.get(&foo), Some("original()"));
        assert_eq!(catalog_on_disk(&catalog_path)[&foo], "original()");
    }

    #[tokio::test]
    async fn test_compile_failure_aborts_and_keeps_seen_signatures() {
        let dir = scratch("compile-failure");
        let catalog_path = dir.join("signatures.json");
        let files = vec![
            source_file(&dir, "A", "function a() public {}"),
            source_file(&dir, "B", "function b(address to) public {}"),
            source_file(&dir, "C", "function c() public {}"),
        ];
        let compiler = MockCompiler::failing_on("B");

        let mut catalog = SignatureCatalog::load(&catalog_path).expect("catalog loads");
        let result =
            acquire(&Source::Files(files), &mut catalog, None, &compiler, &catalog_path).await;

        match result {
            Err(Error::Compilation { path, diagnostic }) => {
                assert!(path.ends_with("B.sol"));
                assert!(diagnostic.contains("ParserError"));
            }
            other => panic!("expected a compilation error, got {other:?}"),
        }
        assert_eq!(compiler.calls(), 2);

        let stored = catalog_on_disk(&catalog_path);
        assert!(stored.contains_key(&selector("a()")));
        assert!(stored.contains_key(&selector("b(address)")));
        assert!(!stored.contains_key(&selector("c()")));
    }

    #[tokio::test]
    async fn test_malformed_address_rejected_without_network() {
        let dir = scratch("bad-address");
        let connector = MockConnector::with_code(&[0x00]);

        for address in [
            "0x1234",
            "1f9840a85d5af5bf1d1762f925bdaddc4201f984",
            "0xg000000000000000000000000000000000000000",
        ] {
            let result = acquire(
                &Source::Address(address.to_string()),
                &mut SignatureCatalog::new(),
                Some(&connector),
                &MockCompiler::default(),
                &dir.join("signatures.json"),
            )
            .await;
            assert!(matches!(result, Err(Error::InvalidAddress(_))));
        }
        assert_eq!(connector.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_code_stops_acquisition() {
        let dir = scratch("empty-code");
        let connector = MockConnector::default();
        let address = "0x1f9840a85d5af5bf1d1762f925bdaddc4201f984";

        let result = acquire(
            &Source::Address(address.to_string()),
            &mut SignatureCatalog::new(),
            Some(&connector),
            &MockCompiler::default(),
            &dir.join("signatures.json"),
        )
        .await;

        assert!(matches!(result, Err(Error::EmptyCode(a)) if a == address));
        assert_eq!(connector.calls(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_node_stops_acquisition() {
        let dir = scratch("unreachable");
        let connector = MockConnector::unreachable();

        let result = acquire(
            &Source::Address("0x1f9840a85d5af5bf1d1762f925bdaddc4201f984".to_string()),
            &mut SignatureCatalog::new(),
            Some(&connector),
            &MockCompiler::default(),
            &dir.join("signatures.json"),
        )
        .await;

        match result {
            Err(Error::ConnectorUnavailable { endpoint, reason }) => {
                assert_eq!(endpoint, "http://localhost:8545");
                assert!(reason.contains("refused"));
            }
            other => panic!("expected the node to be unavailable, got {other:?}"),
        }
        assert_eq!(connector.calls(), 1);
    }

    #[tokio::test]
    async fn test_address_mode_uses_real_address() {
        let dir = scratch("address");
        let connector = MockConnector::with_code(&[0x60, 0x80]);
        let address = "0x1F9840a85d5aF5bf1D1762F925BDADdC4201F984";

        let contracts = acquire(
            &Source::Address(address.to_string()),
            &mut SignatureCatalog::new(),
            Some(&connector),
            &MockCompiler::default(),
            &dir.join("signatures.json"),
        )
        .await
        .expect("acquisition succeeds");

        assert_eq!(contracts.len(), 1);
        assert_eq!(contracts[0].name, address);
        assert_eq!(contracts[0].address, address.parse::<Address>().expect("valid address"));
        assert_eq!(contracts[0].bytecode.to_vec(), vec![0x60, 0x80]);
    }
}
