//! Configuration loading and validation tests.

use rstest::{fixture, rstest};
use tfcli::test_support::EnvGuard;
use tfcli::{ConfigError, TerraformConfig};

#[fixture]
fn valid_config() -> TerraformConfig {
    TerraformConfig {
        terraform_bin: String::from("/usr/local/bin/terraform"),
        working_dir: String::from("/srv/stacks/network"),
    }
}

#[rstest]
fn config_loads_defaults_without_cli_args() {
    let _guard = EnvGuard::set_vars(&[]);

    let cfg = TerraformConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("defaults should load: {err}"));

    assert_eq!(cfg.terraform_bin, "terraform");
    assert_eq!(cfg.working_dir, ".");
}

#[rstest]
fn config_reads_environment_overrides() {
    let _guard = EnvGuard::set_vars(&[
        ("TFCLI_TERRAFORM_BIN", "/opt/hashicorp/terraform"),
        ("TFCLI_WORKING_DIR", "/srv/stacks/dns"),
    ]);

    let cfg = TerraformConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("env overrides should load: {err}"));

    assert_eq!(cfg.terraform_bin, "/opt/hashicorp/terraform");
    assert_eq!(cfg.working_dir, "/srv/stacks/dns");
}

#[rstest]
#[case::binary(
    TerraformConfig { terraform_bin: String::from("  "), ..valid_config() },
    "TFCLI_TERRAFORM_BIN",
    "terraform_bin"
)]
#[case::working_dir(
    TerraformConfig { working_dir: String::new(), ..valid_config() },
    "TFCLI_WORKING_DIR",
    "working_dir"
)]
fn config_validation_produces_actionable_errors(
    #[case] cfg: TerraformConfig,
    #[case] env_var: &str,
    #[case] toml_key: &str,
) {
    let error = cfg.validate().expect_err("validation should fail");
    let ConfigError::MissingField(ref message) = error else {
        panic!("expected MissingField error, got {error:?}");
    };

    assert!(message.contains(env_var), "error should mention env var: {message}");
    assert!(message.contains(toml_key), "error should mention TOML key: {message}");
    assert!(message.contains("tfcli.toml"), "error should mention config file: {message}");
}

#[rstest]
fn config_seeds_terraform_settings(valid_config: TerraformConfig) {
    let settings = valid_config
        .settings()
        .unwrap_or_else(|err| panic!("valid config yields settings: {err}"));

    assert_eq!(settings.binary, "/usr/local/bin/terraform");
    assert_eq!(settings.working_dir, "/srv/stacks/network");
    assert!(settings.vars.is_empty());
    assert!(settings.backend_vars.is_empty());
    assert!(settings.env.is_empty());
    assert!(!settings.has_credentials());
}

#[rstest]
fn config_settings_require_valid_fields(valid_config: TerraformConfig) {
    let cfg = TerraformConfig {
        terraform_bin: String::new(),
        ..valid_config
    };

    assert!(matches!(cfg.settings(), Err(ConfigError::MissingField(_))));
}
