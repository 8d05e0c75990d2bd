use super::*;

#[test]
fn test_is_mdns_hostname() {
    assert!(is_mdns_hostname("4b2c1ab2-a1c2.local"));
    assert!(!is_mdns_hostname("192.168.1.2"));
    assert!(!is_mdns_hostname("stun.example.org"));
    assert!(!is_mdns_hostname("local"));
}

#[tokio::test]
async fn test_release_without_acquire() {
    // releasing an unknown subscriber must not disturb the shared state
    release(usize::MAX).await;
}
