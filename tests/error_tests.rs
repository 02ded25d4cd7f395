// Error handling tests
// Author: kelexine (https://github.com/kelexine)

use stashkit::error::CacheError;

#[test]
fn test_error_display_messages() {
    let errors = vec![
        CacheError::UnsupportedDriver("memcached".to_string()),
        CacheError::directory("/var/cache/app", "permission denied"),
        CacheError::Connection("refused".to_string()),
        CacheError::Config("bad toml".to_string()),
        CacheError::Codec("truncated".to_string()),
    ];

    for error in errors {
        let display = format!("{}", error);
        assert!(!display.is_empty(), "Error should have display message");
    }
}

#[test]
fn test_unsupported_driver_error() {
    let error = CacheError::UnsupportedDriver("memcached".to_string());
    assert_eq!(format!("{}", error), "Unsupported cache driver: memcached");
    assert!(!error.is_construction());
}

#[test]
fn test_directory_error_names_path() {
    let error = CacheError::directory("/var/cache/app", "not writable");
    let display = format!("{}", error);
    assert!(display.contains("/var/cache/app"));
    assert!(display.contains("not writable"));
    assert!(error.is_construction());
}

#[test]
fn test_connection_error() {
    let error = CacheError::Connection("Failed to connect to Redis at 127.0.0.1:6379".to_string());
    assert!(format!("{}", error).contains("127.0.0.1:6379"));
    assert!(error.is_construction());
}

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let error: CacheError = io.into();
    assert!(matches!(error, CacheError::Io(_)));
    assert!(format!("{}", error).contains("missing"));
}
