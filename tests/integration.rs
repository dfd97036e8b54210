use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn dcsync_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_dcsync"))
}

const LS8: &str = "name: ls8_sr
description: Landsat 8 surface reflectance
metadata_type: eo3
measurements:
  - name: red
    dtype: uint16
  - name: nir
    dtype: uint16
";

const S2_PAIR: &str = "name: s2a_l2a
description: Sentinel-2A
metadata_type: eo3
---
name: s2b_l2a
description: Sentinel-2B
metadata_type: eo3
";

const DEM: &str = "name: nasadem
description: NASA DEM
metadata_type: eo3
";

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let products_dir = root.join("products");
    fs::create_dir_all(&products_dir).unwrap();
    fs::write(products_dir.join("ls8_sr.yaml"), LS8).unwrap();
    fs::write(products_dir.join("s2_l2a.yaml"), S2_PAIR).unwrap();
    fs::write(products_dir.join("nasadem.yaml"), DEM).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/catalog.sqlite"

[fetch]
timeout_secs = 5
"#,
        root.display()
    );

    let config_path = config_dir.join("dcsync.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn write_manifest(root: &Path, rows: &[(&str, &str)]) -> PathBuf {
    let mut body = String::from("product,definition\n");
    for (product, definition) in rows {
        body.push_str(&format!("{},{}\n", product, root.join(definition).display()));
    }
    let path = root.join("products.csv");
    fs::write(&path, body).unwrap();
    path
}

fn good_manifest(root: &Path) -> PathBuf {
    write_manifest(
        root,
        &[
            ("ls8_sr", "products/ls8_sr.yaml"),
            ("s2a_l2a;s2b_l2a", "products/s2_l2a.yaml"),
            ("nasadem", "products/nasadem.yaml"),
        ],
    )
}

fn run_dcsync(config_path: &Path, args: &[&str]) -> (String, String, Option<i32>) {
    let binary = dcsync_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run dcsync binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.code())
}

fn dataset_yaml(id: &str, product: &str) -> String {
    format!(
        concat!(
            "$schema: https://schemas.opendatacube.org/dataset\n",
            "id: {}\n",
            "product:\n  name: {}\n",
            "properties:\n  datetime: 2020-01-01T00:00:00Z\n",
        ),
        id, product
    )
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, code) = run_dcsync(&config_path, &["init"]);
    assert_eq!(code, Some(0), "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/catalog.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, code1) = run_dcsync(&config_path, &["init"]);
    assert_eq!(code1, Some(0), "First init failed");

    let (_, _, code2) = run_dcsync(&config_path, &["init"]);
    assert_eq!(code2, Some(0), "Second init failed (not idempotent)");
}

#[test]
fn test_missing_config_errors() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, code) = run_dcsync(&tmp.path().join("nope.toml"), &["init"]);
    assert_ne!(code, Some(0));
    assert!(stderr.contains("config"));
}

#[test]
fn test_sync_products_adds_all() {
    let (tmp, config_path) = setup_test_env();
    let manifest = good_manifest(tmp.path());

    run_dcsync(&config_path, &["init"]);
    let (stdout, stderr, code) =
        run_dcsync(&config_path, &["sync-products", manifest.to_str().unwrap()]);
    assert_eq!(code, Some(0), "sync failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Added: 4, Updated: 0 and Failed: 0"));

    let (listing, _, _) = run_dcsync(&config_path, &["list-products"]);
    for name in ["ls8_sr", "nasadem", "s2a_l2a", "s2b_l2a"] {
        assert!(listing.contains(name), "missing {} in {}", name, listing);
    }
}

#[test]
fn test_sync_products_second_run_noop() {
    let (tmp, config_path) = setup_test_env();
    let manifest = good_manifest(tmp.path());

    run_dcsync(&config_path, &["init"]);
    run_dcsync(&config_path, &["sync-products", manifest.to_str().unwrap()]);

    let (stdout, _, code) =
        run_dcsync(&config_path, &["sync-products", manifest.to_str().unwrap()]);
    assert_eq!(code, Some(0));
    assert!(stdout.contains("Added: 0, Updated: 0 and Failed: 0"));
}

#[test]
fn test_sync_products_update_if_exists() {
    let (tmp, config_path) = setup_test_env();
    let manifest = good_manifest(tmp.path());

    run_dcsync(&config_path, &["init"]);
    run_dcsync(&config_path, &["sync-products", manifest.to_str().unwrap()]);

    // Changing measurements is unsafe; update-if-exists forces it through.
    fs::write(
        tmp.path().join("products/ls8_sr.yaml"),
        LS8.replace("uint16", "int16"),
    )
    .unwrap();

    let (stdout, stderr, code) = run_dcsync(
        &config_path,
        &[
            "sync-products",
            manifest.to_str().unwrap(),
            "--update-if-exists",
        ],
    );
    assert_eq!(code, Some(0), "stderr={}", stderr);
    assert!(stdout.contains("Added: 0, Updated: 4 and Failed: 0"));
}

#[test]
fn test_sync_products_exit_code_is_failed_count() {
    let (tmp, config_path) = setup_test_env();
    let manifest = write_manifest(
        tmp.path(),
        &[
            ("ls8_sr", "products/ls8_sr.yaml"),
            // Count mismatch: one name, two documents
            ("s2a_l2a", "products/s2_l2a.yaml"),
            // Name mismatch
            ("srtm", "products/nasadem.yaml"),
            // Missing definition file
            ("ghost", "products/ghost.yaml"),
        ],
    );

    run_dcsync(&config_path, &["init"]);
    let (stdout, stderr, code) =
        run_dcsync(&config_path, &["sync-products", manifest.to_str().unwrap()]);
    assert!(stdout.contains("Added: 1, Updated: 0 and Failed: 3"), "stdout={}", stdout);
    assert_eq!(code, Some(3));
    assert!(stderr.contains("ERROR"));
}

#[test]
fn test_sync_products_missing_manifest() {
    let (tmp, config_path) = setup_test_env();
    run_dcsync(&config_path, &["init"]);

    let missing = tmp.path().join("nope.csv");
    let (_, stderr, code) =
        run_dcsync(&config_path, &["sync-products", missing.to_str().unwrap()]);
    assert_ne!(code, Some(0));
    assert!(stderr.contains("manifest"));
}

#[test]
fn test_index_datasets_yaml() {
    let (tmp, config_path) = setup_test_env();
    let manifest = good_manifest(tmp.path());
    run_dcsync(&config_path, &["init"]);
    run_dcsync(&config_path, &["sync-products", manifest.to_str().unwrap()]);

    let ds_dir = tmp.path().join("datasets/2020");
    fs::create_dir_all(&ds_dir).unwrap();
    fs::write(
        ds_dir.join("a.yaml"),
        dataset_yaml("0c3f2ab1-3d1e-4f5a-9b6c-7d8e9f0a1b2c", "ls8_sr"),
    )
    .unwrap();
    fs::write(
        ds_dir.join("b.yaml"),
        dataset_yaml("1d4e3bc2-4e2f-4a6b-8c7d-8e9f0a1b2c3d", "ls8_sr"),
    )
    .unwrap();

    let datasets = tmp.path().join("datasets");
    let (_, stderr, code) =
        run_dcsync(&config_path, &["index-datasets", datasets.to_str().unwrap()]);
    assert_eq!(code, Some(0), "stderr={}", stderr);
    assert!(stderr.contains("Added 2 and failed 0 datasets."), "stderr={}", stderr);
}

#[test]
fn test_index_datasets_failures_and_strict() {
    let (tmp, config_path) = setup_test_env();
    let manifest = good_manifest(tmp.path());
    run_dcsync(&config_path, &["init"]);
    run_dcsync(&config_path, &["sync-products", manifest.to_str().unwrap()]);

    let ds_dir = tmp.path().join("datasets");
    fs::create_dir_all(&ds_dir).unwrap();
    fs::write(
        ds_dir.join("good.yaml"),
        dataset_yaml("2e5f4cd3-5f3a-4b7c-9d8e-9f0a1b2c3d4e", "ls8_sr"),
    )
    .unwrap();
    fs::write(
        ds_dir.join("orphan.yaml"),
        dataset_yaml("3f6a5de4-6a4b-4c8d-8e9f-0a1b2c3d4e5f", "unknown_product"),
    )
    .unwrap();

    let (_, stderr, code) =
        run_dcsync(&config_path, &["index-datasets", ds_dir.to_str().unwrap()]);
    assert_eq!(code, Some(0));
    assert!(stderr.contains("Added 1 and failed 1 datasets."), "stderr={}", stderr);

    let (_, _, strict_code) = run_dcsync(
        &config_path,
        &["index-datasets", ds_dir.to_str().unwrap(), "--strict"],
    );
    assert_eq!(strict_code, Some(1));
}

#[test]
fn test_index_datasets_stac() {
    let (tmp, config_path) = setup_test_env();
    let manifest = good_manifest(tmp.path());
    run_dcsync(&config_path, &["init"]);
    run_dcsync(&config_path, &["sync-products", manifest.to_str().unwrap()]);

    let item = serde_json::json!({
        "type": "Feature",
        "stac_version": "1.0.0",
        "id": "NASADEM_HGT_s56w072",
        "collection": "nasadem",
        "geometry": null,
        "properties": {
            "datetime": "2000-02-20T00:00:00Z",
            "proj:epsg": 4326
        },
        "assets": {
            "elevation": {"href": "elevation.tif", "roles": ["data"]}
        }
    });
    let item_path = tmp.path().join("NASADEM_HGT_s56w072.stac-item.json");
    fs::write(&item_path, serde_json::to_string_pretty(&item).unwrap()).unwrap();

    let (_, stderr, code) = run_dcsync(
        &config_path,
        &["index-datasets", "--stac", item_path.to_str().unwrap()],
    );
    assert_eq!(code, Some(0));
    assert!(stderr.contains("Added 1 and failed 0 datasets."), "stderr={}", stderr);
}

#[test]
fn test_index_datasets_requires_paths() {
    let (_tmp, config_path) = setup_test_env();
    let (_, _, code) = run_dcsync(&config_path, &["index-datasets"]);
    assert_ne!(code, Some(0));
}
