#[cfg(test)]
mod attributes_test;

use stun::attributes::{
    AttrType, ATTR_ICE_CONTROLLED, ATTR_ICE_CONTROLLING, ATTR_PRIORITY, ATTR_USE_CANDIDATE,
};
use stun::checks::check_size;
use stun::message::{Getter, Message, Setter};

const PRIORITY_SIZE: usize = 4;
const TIE_BREAKER_SIZE: usize = 8;

fn add_u64(m: &mut Message, t: AttrType, v: u64) {
    m.add(t, &v.to_be_bytes());
}

fn get_u64(m: &Message, t: AttrType) -> Result<u64, stun::Error> {
    let v = m.get(t)?;
    check_size(t, v.len(), TIE_BREAKER_SIZE)?;
    Ok(u64::from_be_bytes([
        v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7],
    ]))
}

/// Represents the PRIORITY attribute (RFC 5245 section 19.1).
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
pub struct PriorityAttr(pub u32);

impl Setter for PriorityAttr {
    fn add_to(&self, m: &mut Message) -> Result<(), stun::Error> {
        m.add(ATTR_PRIORITY, &self.0.to_be_bytes());
        Ok(())
    }
}

impl Getter for PriorityAttr {
    fn get_from(&mut self, m: &Message) -> Result<(), stun::Error> {
        let v = m.get(ATTR_PRIORITY)?;
        check_size(ATTR_PRIORITY, v.len(), PRIORITY_SIZE)?;
        self.0 = u32::from_be_bytes([v[0], v[1], v[2], v[3]]);
        Ok(())
    }
}

/// Represents the ICE-CONTROLLING attribute carrying the agent tie-breaker.
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
pub struct AttrControlling(pub u64);

impl Setter for AttrControlling {
    fn add_to(&self, m: &mut Message) -> Result<(), stun::Error> {
        add_u64(m, ATTR_ICE_CONTROLLING, self.0);
        Ok(())
    }
}

impl Getter for AttrControlling {
    fn get_from(&mut self, m: &Message) -> Result<(), stun::Error> {
        self.0 = get_u64(m, ATTR_ICE_CONTROLLING)?;
        Ok(())
    }
}

/// Represents the ICE-CONTROLLED attribute carrying the agent tie-breaker.
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
pub struct AttrControlled(pub u64);

impl Setter for AttrControlled {
    fn add_to(&self, m: &mut Message) -> Result<(), stun::Error> {
        add_u64(m, ATTR_ICE_CONTROLLED, self.0);
        Ok(())
    }
}

impl Getter for AttrControlled {
    fn get_from(&mut self, m: &Message) -> Result<(), stun::Error> {
        self.0 = get_u64(m, ATTR_ICE_CONTROLLED)?;
        Ok(())
    }
}

/// Represents the empty USE-CANDIDATE attribute.
#[derive(Default)]
pub struct UseCandidateAttr;

impl Setter for UseCandidateAttr {
    fn add_to(&self, m: &mut Message) -> Result<(), stun::Error> {
        m.add(ATTR_USE_CANDIDATE, &[]);
        Ok(())
    }
}

impl UseCandidateAttr {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns true if the USE-CANDIDATE attribute is set on `m`.
    #[must_use]
    pub fn is_set(m: &Message) -> bool {
        m.get(ATTR_USE_CANDIDATE).is_ok()
    }
}
