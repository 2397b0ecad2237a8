use super::*;
use tempfile::TempDir;

#[test]
fn defaults_when_no_config_file_exists() {
    let temp_dir = TempDir::new().expect("temp dir");
    let config = Config::load(temp_dir.path()).expect("load succeeds");

    assert_eq!(config.embedding.host, "localhost");
    assert_eq!(config.embedding.port, 11434);
    assert_eq!(config.embedding.model, "all-minilm:latest");
    assert_eq!(config.chunking.chunk_size, 500);
    assert_eq!(config.chunking.chunk_overlap, 50);
    assert_eq!(config.retrieval.top_k, 5);
    assert_eq!(config.store.backend, StoreBackend::Lance);
    assert_eq!(config.base_dir, temp_dir.path());
}

#[test]
fn save_and_load_round_trip() {
    let temp_dir = TempDir::new().expect("temp dir");

    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.embedding.model = "nomic-embed-text:latest".to_string();
    config.chunking.chunk_size = 800;
    config.chunking.chunk_overlap = 80;
    config.retrieval.top_k = 7;
    config.store.backend = StoreBackend::Memory;

    config.save().expect("save succeeds");

    let loaded = Config::load(temp_dir.path()).expect("load succeeds");
    assert_eq!(loaded, config);
}

#[test]
fn partial_config_file_uses_section_defaults() {
    let temp_dir = TempDir::new().expect("temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[chunking]\nchunk_size = 300\n",
    )
    .expect("write succeeds");

    let config = Config::load(temp_dir.path()).expect("load succeeds");
    assert_eq!(config.chunking.chunk_size, 300);
    assert_eq!(config.chunking.chunk_overlap, 50);
    assert_eq!(config.embedding.host, "localhost");
}

#[test]
fn store_backend_parses_from_toml() {
    let temp_dir = TempDir::new().expect("temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[store]\nbackend = \"memory\"\n",
    )
    .expect("write succeeds");

    let config = Config::load(temp_dir.path()).expect("load succeeds");
    assert_eq!(config.store.backend, StoreBackend::Memory);
}

#[test]
fn malformed_config_file_fails_to_load() {
    let temp_dir = TempDir::new().expect("temp dir");
    std::fs::write(temp_dir.path().join("config.toml"), "this is { not toml")
        .expect("write succeeds");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn invalid_protocol_fails_validation() {
    let mut config = Config::default();
    config.embedding.protocol = "ftp".to_string();

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));
}

#[test]
fn zero_port_fails_validation() {
    let mut config = Config::default();
    config.embedding.port = 0;

    assert!(matches!(config.validate(), Err(ConfigError::InvalidPort(0))));
}

#[test]
fn empty_model_fails_validation() {
    let mut config = Config::default();
    config.embedding.model = "  ".to_string();

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidModel(_))
    ));
}

#[test]
fn batch_size_bounds_are_enforced() {
    let mut config = Config::default();
    config.embedding.batch_size = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidBatchSize(0))
    ));

    config.embedding.batch_size = 1001;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidBatchSize(1001))
    ));
}

#[test]
fn chunk_overlap_must_be_smaller_than_chunk_size() {
    let mut config = Config::default();
    config.chunking.chunk_size = 100;
    config.chunking.chunk_overlap = 100;

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidChunkOverlap(100, 100))
    ));
}

#[test]
fn zero_chunk_size_fails_validation() {
    let mut config = Config::default();
    config.chunking.chunk_size = 0;
    config.chunking.chunk_overlap = 0;

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidChunkSize(0))
    ));
}

#[test]
fn top_k_bounds_are_enforced() {
    let mut config = Config::default();
    config.retrieval.top_k = 0;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidTopK(0))));

    config.retrieval.top_k = 101;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidTopK(101))
    ));
}

#[test]
fn temperature_bounds_are_enforced() {
    let mut config = Config::default();
    config.generation.temperature = 3.0;

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidTemperature(_))
    ));
}

#[test]
fn endpoint_url_is_built_from_parts() {
    let embedding = EmbeddingConfig::default();
    let url = embedding.endpoint_url().expect("url builds");

    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn data_paths_live_under_base_dir() {
    let config = Config {
        base_dir: PathBuf::from("/data/qagen"),
        ..Config::default()
    };

    assert_eq!(
        config.vector_db_path(),
        PathBuf::from("/data/qagen/vectors")
    );
    assert_eq!(
        config.snapshot_path(),
        PathBuf::from("/data/qagen/store.json")
    );
    assert_eq!(
        config.config_file_path(),
        PathBuf::from("/data/qagen/config.toml")
    );
}
