//! Integration tests for environment-driven configuration loading.

use std::time::Duration;

use oci_poller::config::{OPTIONAL_KEYS, REQUIRED_KEYS, unset_optional_keys};
use oci_poller::test_support::EnvGuard;
use oci_poller::{ConfigError, DomainStrategy, Settings};
use rstest::rstest;

const REQUIRED: [(&str, &str); 4] = [
    ("OCI_IMAGE_ID", "ocid1.image.oc1..aaaa"),
    ("OCI_COMPARTMENT_ID", "ocid1.compartment.oc1..bbbb"),
    ("OCI_SUBNET_ID", "ocid1.subnet.oc1..cccc"),
    ("SSH_KEY_PUB", "ssh-ed25519 AAAAC3Nza user@host"),
];

/// Sets `pairs` and clears every other recognised key so ambient values on
/// the test machine cannot leak in.
async fn isolated_env(pairs: &[(&str, &str)]) -> EnvGuard {
    let unset: Vec<&str> = REQUIRED_KEYS
        .iter()
        .chain(OPTIONAL_KEYS.iter())
        .copied()
        .filter(|key| pairs.iter().all(|(set, _)| set != key))
        .collect();
    EnvGuard::apply(pairs, &unset).await
}

fn load_validated() -> Result<Settings, ConfigError> {
    let settings = Settings::load()?;
    settings.validate()?;
    Ok(settings)
}

#[tokio::test]
async fn defaults_apply_when_only_required_values_are_set() {
    let _guard = isolated_env(&REQUIRED).await;

    let settings = load_validated().expect("configuration should load");
    let schedule = settings.schedule().expect("schedule");
    let spec = settings.launch_spec().expect("launch spec");

    assert_eq!(schedule.strategy, DomainStrategy::Sequential);
    assert_eq!(schedule.backoff.base_delay, Duration::from_secs(15));
    assert_eq!(schedule.backoff.max_attempts, 5);
    assert_eq!(schedule.domain_interval, Duration::from_secs(5));
    assert_eq!(schedule.retry_wait, Duration::from_secs(64));
    assert_eq!(schedule.long_wait, Duration::from_secs(600));
    assert_eq!(schedule.call_timeout, Duration::from_secs(120));
    assert!(!schedule.exit_on_success);
    assert_eq!(spec.shape, "VM.Standard.A1.Flex");
    assert_eq!((spec.ocpus, spec.memory_in_gbs), (4, 24));
    assert_eq!(spec.display_name, "myOciInstance");
    assert!(spec.assign_public_ip);
    assert_eq!(settings.cli_config().expect("cli config").bin, "oci");
}

#[tokio::test]
async fn overrides_are_read_from_the_environment() {
    let mut pairs = REQUIRED.to_vec();
    pairs.extend([
        ("OCI_OCPUS", "2"),
        ("OCI_MEMORY_IN_GBS", "12"),
        ("RETRY_WAIT_SECONDS", "30"),
        ("LONG_WAIT_MINUTES", "2"),
        ("DOMAIN_STRATEGY", "single-pass"),
        ("EXIT_ON_SUCCESS", "true"),
        ("OCI_ASSIGN_PUBLIC_IP", "false"),
        ("OCI_CLI_PROFILE", "FRANKFURT"),
    ]);
    let _guard = isolated_env(&pairs).await;

    let settings = load_validated().expect("configuration should load");
    let schedule = settings.schedule().expect("schedule");
    let spec = settings.launch_spec().expect("launch spec");

    assert_eq!(schedule.strategy, DomainStrategy::SinglePass);
    assert_eq!(schedule.retry_wait, Duration::from_secs(30));
    assert_eq!(schedule.long_wait, Duration::from_secs(120));
    assert!(schedule.exit_on_success);
    assert_eq!((spec.ocpus, spec.memory_in_gbs), (2, 12));
    assert!(!spec.assign_public_ip);
    assert_eq!(
        settings.cli_config().expect("cli config").profile.as_deref(),
        Some("FRANKFURT")
    );
}

#[rstest]
#[case::image("OCI_IMAGE_ID")]
#[case::compartment("OCI_COMPARTMENT_ID")]
#[case::subnet("OCI_SUBNET_ID")]
#[case::ssh_key("SSH_KEY_PUB")]
#[tokio::test]
async fn missing_required_value_names_the_variable(#[case] missing: &str) {
    let pairs: Vec<(&str, &str)> = REQUIRED
        .iter()
        .copied()
        .filter(|(key, _)| *key != missing)
        .collect();
    let _guard = isolated_env(&pairs).await;

    let err = load_validated().expect_err("missing value should fail");
    let ConfigError::MissingField(ref message) = err else {
        panic!("expected MissingField, got {err:?}");
    };
    assert!(message.contains(missing), "error should name {missing}: {message}");
}

#[rstest]
#[case::attempts("MAX_BACKOFF_ATTEMPTS", "0")]
#[case::timeout("OCI_CALL_TIMEOUT_SECONDS", "0")]
#[case::strategy("DOMAIN_STRATEGY", "round-robin")]
#[case::public_ip("OCI_ASSIGN_PUBLIC_IP", "maybe")]
#[tokio::test]
async fn out_of_range_values_are_rejected(#[case] key: &str, #[case] value: &str) {
    let mut pairs = REQUIRED.to_vec();
    pairs.push((key, value));
    let _guard = isolated_env(&pairs).await;

    let err = load_validated().expect_err("value should be rejected");
    assert!(
        matches!(err, ConfigError::Invalid { key: rejected, .. } if rejected == key),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn non_numeric_values_fail_to_parse() {
    let mut pairs = REQUIRED.to_vec();
    pairs.push(("OCI_OCPUS", "four"));
    let _guard = isolated_env(&pairs).await;

    let err = Settings::load().expect_err("non-numeric value should fail");
    assert!(matches!(err, ConfigError::Parse(_)), "unexpected error: {err:?}");
}

#[tokio::test]
async fn unset_optional_keys_reflect_the_environment() {
    let mut pairs = REQUIRED.to_vec();
    pairs.push(("RETRY_WAIT_SECONDS", "10"));
    let _guard = isolated_env(&pairs).await;

    let unset = unset_optional_keys(|key| std::env::var(key).ok());
    assert!(!unset.contains(&"RETRY_WAIT_SECONDS"));
    assert!(unset.contains(&"AD_REQ_INTERVAL_SECONDS"));
    assert_eq!(unset.len(), OPTIONAL_KEYS.len() - 1);
}
