use super::*;

#[test]
fn test_generated_lengths() {
    assert_eq!(generate_ufrag().len(), 4);
    assert_eq!(generate_pwd().len(), 22);
    assert_eq!(generate_foundation().len(), 10);
}

#[test]
fn test_ice_char_alphabet() {
    let s = generate_ice_string(512);
    assert!(s
        .bytes()
        .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'+' | b'/')));
}

#[test]
fn test_randomness() {
    // Two 22-char draws colliding would point at a broken generator.
    assert_ne!(generate_pwd(), generate_pwd());
}
