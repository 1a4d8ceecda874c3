use std::str::FromStr;

use crate::kernel::constants::API_VERSION;
use crate::plugin_system::version::{ApiVersion, VersionError};

#[test]
fn test_host_version_matches_constant() {
    let host = ApiVersion::host().unwrap();
    assert_eq!(host.to_string(), API_VERSION);
}

#[test]
fn test_parse_components() {
    let version = ApiVersion::from_str("1.4.2").unwrap();
    assert_eq!((version.major(), version.minor(), version.patch()), (1, 4, 2));
    assert_eq!(version, ApiVersion::new(1, 4, 2));
}

#[test]
fn test_invalid_version() {
    let err = ApiVersion::from_str("not-a-version").unwrap_err();
    let VersionError::InvalidVersion { version, .. } = err;
    assert_eq!(version, "not-a-version");
}

#[test]
fn test_pre_one_compatibility_is_per_minor() {
    let host = ApiVersion::new(0, 1, 5);
    assert!(host.accepts(&ApiVersion::new(0, 1, 0)));
    assert!(host.accepts(&ApiVersion::new(0, 1, 5)));
    // Plugin needs a newer patch than the host provides
    assert!(!host.accepts(&ApiVersion::new(0, 1, 6)));
    assert!(!host.accepts(&ApiVersion::new(0, 2, 0)));
}

#[test]
fn test_post_one_compatibility_is_per_major() {
    let host = ApiVersion::new(1, 3, 0);
    assert!(host.accepts(&ApiVersion::new(1, 0, 0)));
    assert!(host.accepts(&ApiVersion::new(1, 2, 9)));
    assert!(!host.accepts(&ApiVersion::new(1, 4, 0)));
    assert!(!host.accepts(&ApiVersion::new(2, 0, 0)));
    assert!(!host.accepts(&ApiVersion::new(0, 9, 0)));
}
