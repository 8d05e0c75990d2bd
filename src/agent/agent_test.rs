use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::time::{sleep, timeout, Duration};

use super::config::{ConnectionConfig, TransportPolicy};
use super::*;
use crate::candidate::{
    candidate_foundation, candidate_pair_priority, candidate_priority, CandidateType,
    DEFAULT_LOCAL_PREFERENCE,
};

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Binds a loopback UDP socket and registers it as a host endpoint, standing
/// in for gathering, which never yields loopback candidates.
async fn add_loopback_endpoint(conn: &Connection, component: u16) -> Result<Candidate> {
    let internal = &conn.internal;
    let socket = internal
        .net
        .bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
        .await?;
    let local_addr = socket.local_addr()?;
    let candidate = Candidate::new_host(component, local_addr.ip(), local_addr.port());
    let endpoint = StunEndpoint::start(candidate.clone(), socket, None, Arc::clone(internal));

    let mut state = internal.state.lock().await;
    state.endpoints.push(endpoint);
    state.local_candidates.push(candidate.clone());
    state.gather_started = true;
    state.gather_done = true;
    Ok(candidate)
}

async fn loopback_agent(ice_controlling: bool, components: u16) -> Result<Connection> {
    let conn = Connection::new(ConnectionConfig {
        ice_controlling,
        components,
        ..ConnectionConfig::default()
    })?;
    for component in 1..=components {
        add_loopback_endpoint(&conn, component).await?;
    }
    Ok(conn)
}

async fn exchange_credentials(a: &Connection, b: &Connection) {
    a.set_remote_credentials(b.local_username(), b.local_password())
        .await;
    b.set_remote_credentials(a.local_username(), a.local_password())
        .await;
}

async fn exchange_candidates(a: &Connection, b: &Connection) -> Result<()> {
    for candidate in b.local_candidates().await {
        a.add_remote_candidate(Some(candidate)).await?;
    }
    a.add_remote_candidate(None).await?;
    for candidate in a.local_candidates().await {
        b.add_remote_candidate(Some(candidate)).await?;
    }
    b.add_remote_candidate(None).await?;
    Ok(())
}

async fn connect_both(a: &Connection, b: &Connection, deadline: Duration) -> Result<()> {
    let (res_a, res_b) = tokio::join!(
        timeout(deadline, a.connect()),
        timeout(deadline, b.connect())
    );
    res_a.map_err(|_| Error::Other("controlling connect timed out".to_owned()))??;
    res_b.map_err(|_| Error::Other("controlled connect timed out".to_owned()))??;
    Ok(())
}

fn test_candidate(component: u16, host: &str, port: u16, candidate_type: CandidateType) -> Candidate {
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

#[tokio::test]
async fn test_connect_and_transfer() -> Result<()> {
    init_log();
    let a = loopback_agent(true, 1).await?;
    let b = loopback_agent(false, 1).await?;
    exchange_credentials(&a, &b).await;
    exchange_candidates(&a, &b).await?;

    connect_both(&a, &b, Duration::from_secs(2)).await?;

    {
        let state_a = a.internal.state.lock().await;
        let state_b = b.internal.state.lock().await;
        assert!(state_a.nominated.contains_key(&1));
        assert!(state_b.nominated.contains_key(&1));
        // the peers are full agents, so nomination was aggressive and the
        // regular-nomination path never engaged
        assert!(state_a.nominating.is_empty());
        // consent freshness runs once connected
        assert!(state_a.consent_task.is_some());
    }

    a.send(b"ping").await?;
    let (data, component) = timeout(Duration::from_secs(2), b.recvfrom())
        .await
        .map_err(|_| Error::Other("recv timed out".to_owned()))??;
    assert_eq!(data, b"ping");
    assert_eq!(component, 1);

    b.send(b"pong").await?;
    let data = timeout(Duration::from_secs(2), a.recv())
        .await
        .map_err(|_| Error::Other("recv timed out".to_owned()))??;
    assert_eq!(data, b"pong");

    let endpoints = a.internal.state.lock().await.endpoints.clone();
    a.close().await?;
    b.close().await?;

    // in-flight transactions must not survive close
    sleep(Duration::from_millis(100)).await;
    for endpoint in endpoints {
        assert_eq!(endpoint.pending_transactions(), 0);
    }
    Ok(())
}

#[tokio::test]
async fn test_regular_nomination_against_lite_peer() -> Result<()> {
    let a = loopback_agent(true, 1).await?;
    let b = loopback_agent(false, 1).await?;
    // the remote advertises ICE lite, so the controlling agent must hold
    // back USE-CANDIDATE until a first check succeeded
    a.set_remote_is_lite(true).await;
    exchange_credentials(&a, &b).await;
    exchange_candidates(&a, &b).await?;

    connect_both(&a, &b, Duration::from_secs(2)).await?;

    let state_a = a.internal.state.lock().await;
    assert!(state_a.nominated.contains_key(&1));
    assert!(state_a.nominating.contains(&1), "expected a second, nominating request");
    drop(state_a);

    a.close().await?;
    b.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_role_conflict() -> Result<()> {
    init_log();
    // both sides believe they are controlling; the tie-breakers settle it
    let a = loopback_agent(true, 1).await?;
    let b = loopback_agent(true, 1).await?;
    exchange_credentials(&a, &b).await;
    exchange_candidates(&a, &b).await?;

    connect_both(&a, &b, Duration::from_secs(5)).await?;

    let a_controlling = a.internal.state.lock().await.ice_controlling;
    let b_controlling = b.internal.state.lock().await.ice_controlling;
    assert_ne!(
        a_controlling, b_controlling,
        "exactly one side must end up controlling"
    );
    assert!(a.internal.state.lock().await.nominated.contains_key(&1));
    assert!(b.internal.state.lock().await.nominated.contains_key(&1));

    a.close().await?;
    b.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_peer_reflexive_discovery() -> Result<()> {
    let a = loopback_agent(true, 1).await?;
    let b = loopback_agent(false, 1).await?;
    exchange_credentials(&a, &b).await;

    // b's candidates are signaled to a, but a's never reach b: b can only
    // learn about a through inbound checks
    for candidate in b.local_candidates().await {
        a.add_remote_candidate(Some(candidate)).await?;
    }
    a.add_remote_candidate(None).await?;

    connect_both(&a, &b, Duration::from_secs(5)).await?;

    let remote_of_b = b.remote_candidates().await;
    assert!(
        remote_of_b
            .iter()
            .any(|c| c.candidate_type == CandidateType::PeerReflexive),
        "expected a peer reflexive candidate, got {:?}",
        remote_of_b
    );

    a.send(b"hello").await?;
    let data = timeout(Duration::from_secs(2), b.recv())
        .await
        .map_err(|_| Error::Other("recv timed out".to_owned()))??;
    assert_eq!(data, b"hello");

    a.close().await?;
    b.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_end_of_candidates_prunes_components() -> Result<()> {
    let a = loopback_agent(true, 2).await?;
    let b = loopback_agent(false, 1).await?;
    exchange_credentials(&a, &b).await;

    // the remote only ever references component 1
    for candidate in b.local_candidates().await {
        a.add_remote_candidate(Some(candidate)).await?;
    }
    a.add_remote_candidate(None).await?;
    for candidate in a.local_candidates().await {
        if candidate.component == 1 {
            b.add_remote_candidate(Some(candidate)).await?;
        }
    }
    b.add_remote_candidate(None).await?;

    connect_both(&a, &b, Duration::from_secs(2)).await?;

    let state_a = a.internal.state.lock().await;
    assert_eq!(state_a.components.iter().copied().collect::<Vec<_>>(), [1]);
    assert!(state_a.nominated.contains_key(&1));
    assert!(!state_a.nominated.contains_key(&2));
    drop(state_a);

    a.close().await?;
    b.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_check_list_stays_sorted() -> Result<()> {
    let a = loopback_agent(true, 1).await?;
    a.add_remote_candidate(Some(test_candidate(1, "127.0.0.2", 6001, CandidateType::Relay)))
        .await?;
    a.add_remote_candidate(Some(test_candidate(
        1,
        "127.0.0.3",
        6002,
        CandidateType::Host,
    )))
    .await?;
    a.add_remote_candidate(Some(test_candidate(
        1,
        "127.0.0.4",
        6003,
        CandidateType::ServerReflexive,
    )))
    .await?;

    let state = a.internal.state.lock().await;
    let priorities: Vec<u64> = state
        .check_list
        .iter()
        .map(|p| candidate_pair_priority(p.local_candidate(), &p.remote_candidate, true))
        .collect();
    let mut sorted = priorities.clone();
    sorted.sort_unstable_by(|x, y| y.cmp(x));
    assert_eq!(priorities, sorted);
    drop(state);

    a.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_not_ready_errors() -> Result<()> {
    let conn = Connection::new(ConnectionConfig::default())?;
    assert_eq!(conn.recv().await.err(), Some(Error::ErrNotConnected));
    assert_eq!(conn.send(b"x").await.err(), Some(Error::ErrNotConnected));
    assert_eq!(conn.connect().await.err(), Some(Error::ErrGatheringNotDone));

    // gathered but no remote credentials
    let conn = loopback_agent(true, 1).await?;
    assert_eq!(conn.connect().await.err(), Some(Error::ErrRemoteCredentials));
    conn.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_credential_validation() {
    let valid = |username: Option<String>, password: Option<String>| {
        Connection::new(ConnectionConfig {
            local_username: username,
            local_password: password,
            ..ConnectionConfig::default()
        })
        .map(|_| ())
        .err()
    };

    assert_eq!(valid(Some("abcd".to_owned()), None), None);
    assert_eq!(valid(Some("a".repeat(256)), None), None);
    assert_eq!(
        valid(Some("abc".to_owned()), None),
        Some(Error::ErrInvalidUsername)
    );
    assert_eq!(
        valid(Some("a".repeat(257)), None),
        Some(Error::ErrInvalidUsername)
    );
    assert_eq!(
        valid(Some("abcD".to_owned()), None),
        Some(Error::ErrInvalidUsername)
    );

    assert_eq!(valid(None, Some("a".repeat(22))), None);
    assert_eq!(valid(None, Some("a".repeat(256))), None);
    assert_eq!(
        valid(None, Some("a".repeat(21))),
        Some(Error::ErrInvalidPassword)
    );
    assert_eq!(
        valid(None, Some("a".repeat(257))),
        Some(Error::ErrInvalidPassword)
    );
}

#[tokio::test]
async fn test_invalid_construction() {
    assert_eq!(
        Connection::new(ConnectionConfig {
            transport_policy: TransportPolicy::Relay,
            ..ConnectionConfig::default()
        })
        .map(|_| ())
        .err(),
        Some(Error::ErrRelayPolicyRequiresServer)
    );
    assert_eq!(
        Connection::new(ConnectionConfig {
            components: 0,
            ..ConnectionConfig::default()
        })
        .map(|_| ())
        .err(),
        Some(Error::ErrInvalidComponents)
    );
}

#[tokio::test]
async fn test_end_of_candidates_is_final() -> Result<()> {
    let conn = Connection::new(ConnectionConfig::default())?;
    conn.add_remote_candidate(None).await?;
    assert_eq!(
        conn.add_remote_candidate(None).await.err(),
        Some(Error::ErrEndOfCandidates)
    );
    assert_eq!(
        conn.add_remote_candidate(Some(test_candidate(
            1,
            "127.0.0.9",
            7000,
            CandidateType::Host
        )))
        .await
        .err(),
        Some(Error::ErrEndOfCandidates)
    );
    Ok(())
}

#[tokio::test]
async fn test_gather_is_idempotent() -> Result<()> {
    let conn = Connection::new(ConnectionConfig::default())?;
    conn.gather_candidates().await?;
    let first = conn.local_candidates().await;
    conn.gather_candidates().await?;
    assert_eq!(first, conn.local_candidates().await);
    conn.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_close_emits_one_event() -> Result<()> {
    let conn = Arc::new(loopback_agent(false, 1).await?);

    let waiter = {
        let conn = Arc::clone(&conn);
        tokio::spawn(async move { conn.get_event().await })
    };
    // give the waiter time to register
    sleep(Duration::from_millis(50)).await;

    conn.close().await?;
    let event = waiter.await.map_err(|e| Error::Other(e.to_string()))??;
    assert_eq!(event, Some(ConnectionEvent::Closed));

    // closing again is a no-op, and no further event is produced
    conn.close().await?;
    assert_eq!(conn.get_event().await?, None);
    Ok(())
}

#[tokio::test]
async fn test_single_event_waiter() -> Result<()> {
    let conn = Arc::new(loopback_agent(false, 1).await?);

    let waiter = {
        let conn = Arc::clone(&conn);
        tokio::spawn(async move { conn.get_event().await })
    };
    sleep(Duration::from_millis(50)).await;

    assert_eq!(
        conn.get_event().await.err(),
        Some(Error::ErrAlreadyAwaitingEvent)
    );

    conn.close().await?;
    waiter.await.map_err(|e| Error::Other(e.to_string()))??;
    Ok(())
}

#[tokio::test]
async fn test_set_selected_pair() -> Result<()> {
    let a = loopback_agent(false, 1).await?;
    let b = loopback_agent(false, 1).await?;
    exchange_credentials(&a, &b).await;
    exchange_candidates(&a, &b).await?;

    let candidate_a = a.local_candidates().await.remove(0);
    let candidate_b = b.local_candidates().await.remove(0);

    a.set_selected_pair(1, &candidate_a.foundation, &candidate_b.foundation)
        .await?;
    b.set_selected_pair(1, &candidate_b.foundation, &candidate_a.foundation)
        .await?;

    a.send(b"no ice needed").await?;
    let data = timeout(Duration::from_secs(2), b.recv())
        .await
        .map_err(|_| Error::Other("recv timed out".to_owned()))??;
    assert_eq!(data, b"no ice needed");

    assert_eq!(
        a.set_selected_pair(1, "missing", &candidate_b.foundation)
            .await
            .err(),
        Some(Error::ErrCandidateNotFound)
    );

    a.close().await?;
    b.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_close_unblocks_recv() -> Result<()> {
    let a = Arc::new(loopback_agent(true, 1).await?);
    let b = loopback_agent(false, 1).await?;
    exchange_credentials(&a, &b).await;
    exchange_candidates(&a, &b).await?;
    connect_both(&a, &b, Duration::from_secs(2)).await?;

    let receiver = {
        let a = Arc::clone(&a);
        tokio::spawn(async move { a.recv().await })
    };
    sleep(Duration::from_millis(50)).await;

    a.close().await?;
    let result = timeout(Duration::from_secs(2), receiver)
        .await
        .map_err(|_| Error::Other("recv did not unblock".to_owned()))?
        .map_err(|e| Error::Other(e.to_string()))?;
    assert_eq!(result.err(), Some(Error::ErrConnectionLost));

    b.close().await?;
    Ok(())
}

// Consent needs six missed checks to expire, which takes over half a
// minute; run with `cargo test -- --ignored`.
#[tokio::test]
#[ignore]
async fn test_consent_expiry_closes_connection() -> Result<()> {
    let a = Arc::new(loopback_agent(true, 1).await?);
    let b = loopback_agent(false, 1).await?;
    exchange_credentials(&a, &b).await;
    exchange_candidates(&a, &b).await?;
    connect_both(&a, &b, Duration::from_secs(2)).await?;

    let receiver = {
        let a = Arc::clone(&a);
        tokio::spawn(async move { a.recv().await })
    };
    let waiter = {
        let a = Arc::clone(&a);
        tokio::spawn(async move { a.get_event().await })
    };
    sleep(Duration::from_millis(50)).await;

    // the peer vanishes without saying goodbye
    b.close().await?;

    let event = timeout(Duration::from_secs(60), waiter)
        .await
        .map_err(|_| Error::Other("consent did not expire".to_owned()))?
        .map_err(|e| Error::Other(e.to_string()))??;
    assert_eq!(event, Some(ConnectionEvent::Closed));

    let recv_result = timeout(Duration::from_secs(5), receiver)
        .await
        .map_err(|_| Error::Other("recv did not unblock".to_owned()))?
        .map_err(|e| Error::Other(e.to_string()))?;
    assert_eq!(recv_result.err(), Some(Error::ErrConnectionLost));
    Ok(())
}

#[tokio::test]
async fn test_get_default_candidate() -> Result<()> {
    let a = loopback_agent(true, 1).await?;
    {
        // a relayed candidate sorts below the host one and becomes default
        let mut state = a.internal.state.lock().await;
        let relay = test_candidate(1, "127.0.0.8", 3478, CandidateType::Relay);
        state.local_candidates.push(relay);
    }

    let default = a
        .get_default_candidate(1)
        .await
        .ok_or_else(|| Error::Other("no default candidate".to_owned()))?;
    assert_eq!(default.candidate_type, CandidateType::Relay);
    assert_eq!(a.get_default_candidate(2).await, None);

    a.close().await?;
    Ok(())
}
