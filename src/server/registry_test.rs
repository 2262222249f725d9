use super::registry::SubscriberRegistry;

#[test]
fn test_register_under_multiple_paths() {
    let registry = SubscriberRegistry::new();
    registry.register(
        1,
        &[
            "/system/config/hostname".to_string(),
            "/system/config/domain-name".to_string(),
        ],
    );
    assert!(registry.is_subscribed("/system/config/hostname", 1));
    assert!(registry.is_subscribed("/system/config/domain-name", 1));
    assert!(!registry.is_subscribed("/system/config/hostname", 2));
}

#[test]
fn test_multiple_clients_share_a_path() {
    let registry = SubscriberRegistry::new();
    registry.register(1, &["/system/config/hostname".to_string()]);
    registry.register(2, &["/system/config/hostname".to_string()]);
    assert_eq!(registry.subscriber_count("/system/config/hostname"), 2);
}

#[test]
fn test_purge_removes_client_everywhere() {
    let registry = SubscriberRegistry::new();
    registry.register(
        1,
        &[
            "/system/config/hostname".to_string(),
            "/system/state/current-datetime".to_string(),
        ],
    );
    registry.register(2, &["/system/config/hostname".to_string()]);

    registry.purge(1);

    assert!(!registry.is_subscribed("/system/config/hostname", 1));
    assert!(!registry.is_subscribed("/system/state/current-datetime", 1));
    assert!(registry.is_subscribed("/system/config/hostname", 2));
    assert_eq!(registry.subscriber_count("/system/state/current-datetime"), 0);
}

#[test]
fn test_purge_unknown_client_is_harmless() {
    let registry = SubscriberRegistry::new();
    registry.register(1, &["/system".to_string()]);
    registry.purge(9);
    assert!(registry.is_subscribed("/system", 1));
}
