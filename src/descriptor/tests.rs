//! Tests for descriptor rendering, parsing and removal.

use super::*;
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct DescriptorFixture {
    _tmp: TempDir,
    root: Utf8PathBuf,
}

impl DescriptorFixture {
    fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }
}

#[fixture]
fn workspace() -> DescriptorFixture {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|err| panic!("temp path should be utf8: {}", err.display()));
    DescriptorFixture { _tmp: tmp, root }
}

#[rstest]
fn credentials_round_trip(workspace: DescriptorFixture) {
    let path = workspace.path(CLI_CONFIG_FILE_NAME);
    let credentials = vec![
        RegistryCredential::new("app.terraform.io", "token-one"),
        RegistryCredential::new("registry.example.com", "token \"two\""),
    ];

    write_credentials_descriptor(&path, &credentials)
        .unwrap_or_else(|err| panic!("write credentials: {err}"));
    let read_back =
        read_credentials_descriptor(&path).unwrap_or_else(|err| panic!("read credentials: {err}"));

    assert_eq!(read_back, credentials);
}

#[rstest]
fn credentials_render_as_labelled_blocks(workspace: DescriptorFixture) {
    let path = workspace.path(CLI_CONFIG_FILE_NAME);

    write_credentials_descriptor(&path, &[RegistryCredential::new("app.terraform.io", "abc")])
        .unwrap_or_else(|err| panic!("write credentials: {err}"));
    let contents = read_file(&path).unwrap_or_else(|err| panic!("read file: {err}"));

    assert!(
        contents.contains("credentials \"app.terraform.io\""),
        "contents: {contents}"
    );
    assert!(contents.contains("token = \"abc\""), "contents: {contents}");
}

#[rstest]
fn empty_credentials_write_nothing(workspace: DescriptorFixture) {
    let path = workspace.path(CLI_CONFIG_FILE_NAME);

    write_credentials_descriptor(&path, &[])
        .unwrap_or_else(|err| panic!("empty credentials should succeed: {err}"));

    assert!(!path.exists(), "no CLI configuration should be created");
}

#[rstest]
fn credentials_overwrite_previous_file(workspace: DescriptorFixture) {
    let path = workspace.path(CLI_CONFIG_FILE_NAME);
    write_credentials_descriptor(&path, &[RegistryCredential::new("old.example", "1")])
        .unwrap_or_else(|err| panic!("seed credentials: {err}"));

    write_credentials_descriptor(&path, &[RegistryCredential::new("new.example", "2")])
        .unwrap_or_else(|err| panic!("overwrite credentials: {err}"));
    let read_back =
        read_credentials_descriptor(&path).unwrap_or_else(|err| panic!("read credentials: {err}"));

    assert_eq!(read_back, vec![RegistryCredential::new("new.example", "2")]);
}

#[rstest]
fn credentials_fail_when_directory_is_missing(workspace: DescriptorFixture) {
    let path = workspace.path("missing").join(CLI_CONFIG_FILE_NAME);

    let Err(err) = write_credentials_descriptor(&path, &[RegistryCredential::new("h", "t")])
    else {
        panic!("write into a missing directory should fail");
    };

    let DescriptorError::Io { path: failed, .. } = err else {
        panic!("expected io error, got {err:?}");
    };
    assert_eq!(failed, workspace.path("missing"));
}

#[rstest]
#[case("credentials {\n  token = \"abc\"\n}\n")]
#[case("credentials \"host\" {\n  token = 42\n}\n")]
#[case("credentials \"host\" {\n")]
fn read_credentials_rejects_malformed_blocks(
    workspace: DescriptorFixture,
    #[case] contents: &str,
) {
    let path = workspace.path(CLI_CONFIG_FILE_NAME);
    write_file(&path, contents).unwrap_or_else(|err| panic!("seed file: {err}"));

    let Err(err) = read_credentials_descriptor(&path) else {
        panic!("malformed credentials should fail");
    };

    assert!(
        matches!(err, DescriptorError::Parse { .. }),
        "expected parse error, got {err:?}"
    );
}

#[rstest]
fn read_credentials_ignores_unrelated_settings(workspace: DescriptorFixture) {
    let path = workspace.path(CLI_CONFIG_FILE_NAME);
    write_file(
        &path,
        "plugin_cache_dir = \"/tmp/plugins\"\ncredentials \"h\" {\n  token = \"t\"\n}\n",
    )
    .unwrap_or_else(|err| panic!("seed file: {err}"));

    let read_back =
        read_credentials_descriptor(&path).unwrap_or_else(|err| panic!("read credentials: {err}"));

    assert_eq!(read_back, vec![RegistryCredential::new("h", "t")]);
}

#[rstest]
fn module_descriptor_declares_single_module(workspace: DescriptorFixture) {
    let path = workspace.path(MODULE_FILE_NAME);

    write_module_descriptor(&path, &ModuleReference::new("acme/network/aws", "~> 1.0.0"))
        .unwrap_or_else(|err| panic!("write module descriptor: {err}"));
    let contents = read_file(&path).unwrap_or_else(|err| panic!("read file: {err}"));
    let value: serde_json::Value =
        serde_json::from_str(&contents).unwrap_or_else(|err| panic!("parse json: {err}"));

    assert_eq!(
        value,
        serde_json::json!({
            "module": {
                "module": { "source": "acme/network/aws", "version": "~> 1.0.0" }
            }
        })
    );
}

#[rstest]
fn remove_descriptor_deletes_file(workspace: DescriptorFixture) {
    let path = workspace.path(MODULE_FILE_NAME);
    write_module_descriptor(&path, &ModuleReference::new("a/b/c", "1.0.0"))
        .unwrap_or_else(|err| panic!("write module descriptor: {err}"));

    remove_descriptor(&path).unwrap_or_else(|err| panic!("remove descriptor: {err}"));

    assert!(!path.exists());
}

#[rstest]
fn remove_descriptor_tolerates_missing_file(workspace: DescriptorFixture) {
    let path = workspace.path(MODULE_FILE_NAME);

    assert!(remove_descriptor(&path).is_ok());
}

#[rstest]
fn credential_debug_output_hides_token() {
    let rendered = format!("{:?}", RegistryCredential::new("app.terraform.io", "s3cr3t"));

    assert!(rendered.contains("app.terraform.io"));
    assert!(!rendered.contains("s3cr3t"), "rendered: {rendered}");
}
