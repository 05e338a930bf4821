use std::fs;
use std::io::Write;
use tempfile::TempDir;

use ragkit_core::config::{Config, EmbedderKind, GeneratorKind};
use ragkit_core::data_processor::DataProcessor;
use ragkit_core::Error;

#[test]
fn load_directory_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let file_path = dir.join("a.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Short text").unwrap();

    let processor = DataProcessor::new();
    let docs = processor.load_directory(dir).expect("load");

    assert_eq!(docs.len(), 1, "one file becomes one document");
    assert_eq!(docs[0].id, "a");
    assert_eq!(docs[0].text.trim(), "Short text");
}

#[test]
fn load_directory_limited_two_files_limit_one() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a.txt"), "alpha bravo").unwrap();
    fs::write(dir.join("b.txt"), "charlie delta").unwrap();
    fs::write(dir.join("notes.md"), "ignored").unwrap();

    let processor = DataProcessor::new();
    let docs = processor.load_directory_limited(dir, 1).expect("load limited");

    assert_eq!(docs.len(), 1, "limited to one source document");
    assert_eq!(docs[0].id, "a", "files are visited in sorted order");
}

#[test]
fn load_directory_recurses_and_tolerates_invalid_utf8() {
    let tmp = TempDir::new().unwrap();
    let nested = tmp.path().join("posts/2024");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("p9.txt"), [0x66, 0x6f, 0xff, 0x6f]).unwrap();

    let docs = DataProcessor::new().load_directory(tmp.path()).expect("load");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, "p9");
    assert!(docs[0].text.starts_with("fo"));
}

#[test]
fn settings_defaults_match_documented_values() {
    let settings = Config::from_toml_str("").settings().expect("defaults are valid");
    assert_eq!(settings.data_dir, "data");
    assert_eq!(settings.embedder.kind, EmbedderKind::Hash);
    assert_eq!(settings.embedder.dim, 384);
    assert_eq!(settings.generator.kind, GeneratorKind::Remote);
    assert_eq!(settings.generator.local.num_beams, 4);
    assert_eq!(settings.generator.local.top_k, 50);
    assert_eq!(settings.generator.local.no_repeat_ngram_size, 3);
    assert_eq!(settings.generator.local.max_length, 128);
    assert_eq!(settings.generator.remote.max_retries, 0, "no hidden retry policy");
    assert_eq!(settings.retrieval.top_k, 5);
    assert_eq!(settings.retrieval.preview_chars, 200);
    assert_eq!(settings.chunking.chunk_size, 10_000);
    assert_eq!(settings.chunking.chunk_overlap, 1_000);
}

#[test]
fn settings_read_nested_tables() {
    let config = Config::from_toml_str(
        r#"
        data_dir = "/srv/rag"

        [embedder]
        kind = "remote"
        dim = 768

        [embedder.remote]
        endpoint = "http://localhost:8080/v1"
        model = "embed-small"

        [generator]
        kind = "local"

        [generator.local]
        model_dir = "/models/flan-t5"
        seed = 7
        "#,
    );
    let settings = config.settings().expect("valid settings");
    assert_eq!(settings.data_dir(), std::path::PathBuf::from("/srv/rag"));
    assert_eq!(settings.embedder.kind, EmbedderKind::Remote);
    assert_eq!(settings.embedder.remote.require("embedder.remote").unwrap(), ("http://localhost:8080/v1", "embed-small"));
    assert_eq!(settings.generator.kind, GeneratorKind::Local);
    assert_eq!(settings.generator.local.seed, Some(7));
    assert_eq!(config.get::<usize>("embedder.dim").unwrap(), 768);
}

#[test]
fn settings_reject_out_of_range_values() {
    for toml in [
        "[retrieval]\ntop_k = 0",
        "[chunking]\nchunk_size = 100\nchunk_overlap = 100",
        "[generator.local]\ntop_p = 1.5",
        "[generator.local]\nnum_beams = 0",
        "[embedder]\ndim = 0",
    ] {
        let err = Config::from_toml_str(toml).settings().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)), "{toml} -> {err}");
    }
}

#[test]
fn remote_settings_require_endpoint_and_model() {
    let settings = Config::from_toml_str("[generator.remote]\nmodel = \"m\"").settings().unwrap();
    let err = settings.generator.remote.require("generator.remote").unwrap_err();
    assert!(err.to_string().contains("generator.remote.endpoint"));
}

#[test]
fn overrides_take_precedence() {
    let settings = Config::from_toml_str("data_dir = \"a\"")
        .with_override("data_dir", "b")
        .settings()
        .unwrap();
    assert_eq!(settings.data_dir, "b");
}

#[test]
fn load_from_missing_file_is_invalid_config() {
    let tmp = TempDir::new().unwrap();
    let err = Config::load_from(&tmp.path().join("nope.toml")).err().expect("missing file");
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn production_env_rejects_hash_embedder() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("RUST_ENV", "prod");
        jail.create_file("config.toml", "[embedder]\nkind = \"hash\"\n")?;
        let err = Config::load().err().expect("hash embedder must be rejected in prod");
        assert!(matches!(err, Error::InvalidConfig(_)), "got {err:?}");

        jail.create_file("config.toml", "[embedder]\nkind = \"remote\"\n")?;
        assert!(Config::load().is_ok());
        Ok(())
    });
}

#[test]
fn app_env_vars_override_nested_settings() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("RUST_ENV", "dev");
        jail.create_file("config.toml", "[embedder]\nkind = \"hash\"\ndim = 128\n")?;
        jail.set_env("APP_EMBEDDER__DIM", "768");
        let settings = Config::load().unwrap().settings().unwrap();
        assert_eq!(settings.embedder.dim, 768);
        assert_eq!(settings.embedder.kind, EmbedderKind::Hash);
        Ok(())
    });
}
