use super::*;

fn remote(component: u16, host: &str, port: u16, candidate_type: CandidateType) -> Candidate {
    Candidate {
        foundation: candidate_foundation(candidate_type, "udp", host),
        component,
        transport: "udp".to_owned(),
        priority: candidate_priority(component, candidate_type, DEFAULT_LOCAL_PREFERENCE),
        host: host.to_owned(),
        port,
        candidate_type,
        related_address: None,
        related_port: None,
    }
}

#[test]
fn test_candidate_priority() {
    // RFC 5245 4.1.2.1 with the recommended type preferences.
    assert_eq!(
        candidate_priority(1, CandidateType::Host, DEFAULT_LOCAL_PREFERENCE),
        2_130_706_431
    );
    assert_eq!(
        candidate_priority(2, CandidateType::Host, DEFAULT_LOCAL_PREFERENCE),
        2_130_706_430
    );
    assert_eq!(
        candidate_priority(1, CandidateType::PeerReflexive, DEFAULT_LOCAL_PREFERENCE),
        1_862_270_975
    );
    assert_eq!(
        candidate_priority(1, CandidateType::ServerReflexive, DEFAULT_LOCAL_PREFERENCE),
        1_694_498_815
    );
    assert_eq!(
        candidate_priority(1, CandidateType::Relay, DEFAULT_LOCAL_PREFERENCE),
        16_777_215
    );
}

#[test]
fn test_candidate_foundation() {
    // same type, transport and base address share a foundation
    assert_eq!(
        candidate_foundation(CandidateType::Host, "udp", "10.0.0.1"),
        candidate_foundation(CandidateType::Host, "udp", "10.0.0.1"),
    );
    assert_ne!(
        candidate_foundation(CandidateType::Host, "udp", "10.0.0.1"),
        candidate_foundation(CandidateType::ServerReflexive, "udp", "10.0.0.1"),
    );
    assert_ne!(
        candidate_foundation(CandidateType::Host, "udp", "10.0.0.1"),
        candidate_foundation(CandidateType::Host, "udp", "10.0.0.2"),
    );
}

#[test]
fn test_can_pair_with() {
    let local_v4 = remote(1, "192.168.1.2", 1234, CandidateType::Host);
    let remote_v4 = remote(1, "10.2.3.4", 5678, CandidateType::Host);
    let remote_v6 = remote(1, "2001:db8::1", 5678, CandidateType::Host);
    let remote_component2 = remote(2, "10.2.3.4", 5678, CandidateType::Host);
    let remote_hostname = remote(1, "example.local", 5678, CandidateType::Host);

    assert!(local_v4.can_pair_with(&remote_v4));
    assert!(!local_v4.can_pair_with(&remote_v6));
    assert!(!local_v4.can_pair_with(&remote_component2));
    assert!(!local_v4.can_pair_with(&remote_hostname));
}

#[test]
fn test_validate_remote_candidate() {
    assert!(validate_remote_candidate(&remote(1, "10.0.0.1", 1, CandidateType::Host)).is_ok());
    assert!(
        validate_remote_candidate(&remote(1, "10.0.0.1", 1, CandidateType::Relay)).is_ok()
    );
    assert_eq!(
        validate_remote_candidate(&remote(1, "10.0.0.1", 1, CandidateType::PeerReflexive)),
        Err(Error::ErrUnsupportedCandidateType)
    );
    assert!(
        validate_remote_candidate(&remote(1, "not-an-ip", 1, CandidateType::Host)).is_err()
    );
}

#[test]
fn test_pair_priority_symmetric() {
    let local = remote(1, "192.168.1.2", 1234, CandidateType::Host);
    let peer = remote(1, "10.2.3.4", 5678, CandidateType::ServerReflexive);

    // swapping the role and the operands preserves the tie-break
    assert_eq!(
        candidate_pair_priority(&local, &peer, true),
        candidate_pair_priority(&peer, &local, false)
    );
    assert_ne!(
        candidate_pair_priority(&local, &peer, true),
        candidate_pair_priority(&local, &peer, false)
    );
}

#[test]
fn test_pair_priority_formula() {
    let local = remote(1, "192.168.1.2", 1234, CandidateType::Host);
    let peer = remote(1, "10.2.3.4", 5678, CandidateType::Relay);

    let g = u64::from(local.priority);
    let d = u64::from(peer.priority);
    assert_eq!(
        candidate_pair_priority(&local, &peer, true),
        (1 << 32) * d + 2 * g + 1
    );
}
