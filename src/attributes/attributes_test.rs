use stun::message::BINDING_REQUEST;

use super::*;
use crate::error::Result;

#[test]
fn test_priority_round_trip() -> Result<()> {
    let mut m = Message::new();
    let mut p = PriorityAttr::default();
    assert!(p.get_from(&m).is_err(), "empty message should have no PRIORITY");

    m.build(&[Box::new(BINDING_REQUEST), Box::new(PriorityAttr(0x7e00_04ff))])?;

    let mut decoded = Message::new();
    decoded.write(&m.raw)?;
    p.get_from(&decoded)?;
    assert_eq!(p.0, 0x7e00_04ff);

    Ok(())
}

#[test]
fn test_tie_breaker_round_trip() -> Result<()> {
    let mut m = Message::new();
    m.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(AttrControlling(4321)),
    ])?;

    let mut attr = AttrControlling::default();
    attr.get_from(&m)?;
    assert_eq!(attr.0, 4321);

    let mut controlled = AttrControlled::default();
    assert!(
        controlled.get_from(&m).is_err(),
        "ICE-CONTROLLED should be absent"
    );

    let mut m2 = Message::new();
    m2.build(&[Box::new(BINDING_REQUEST), Box::new(AttrControlled(u64::MAX))])?;
    controlled.get_from(&m2)?;
    assert_eq!(controlled.0, u64::MAX);

    Ok(())
}

#[test]
fn test_use_candidate() -> Result<()> {
    let mut m = Message::new();
    m.build(&[Box::new(BINDING_REQUEST), Box::new(UseCandidateAttr::new())])?;
    assert!(UseCandidateAttr::is_set(&m));

    let mut m2 = Message::new();
    m2.build(&[Box::new(BINDING_REQUEST)])?;
    assert!(!UseCandidateAttr::is_set(&m2));

    Ok(())
}
