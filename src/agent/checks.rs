use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use stun::agent::TransactionId;
use stun::attributes::ATTR_USERNAME;
use stun::message::{Getter, Message, Setter, BINDING_REQUEST};
use stun::textattrs::Username;
use tokio::time::Duration;

use crate::attributes::{AttrControlled, AttrControlling, PriorityAttr, UseCandidateAttr};
use crate::candidate::{
    candidate_priority, sort_candidate_pairs, Candidate, CandidatePair, CandidatePairState,
    CandidateType, DEFAULT_LOCAL_PREFERENCE,
};
use crate::endpoint::StunEndpoint;
use crate::error::{Error, Result};

use super::{ConnectionInternal, State, ICE_COMPLETED, ICE_FAILED};

/// Cadence of the periodic check scheduler.
pub const CHECK_INTERVAL: Duration = Duration::from_millis(20);

impl ConnectionInternal {
    /// Builds an outbound connectivity-check request for `pair`.
    pub(crate) fn build_request(
        &self,
        state: &State,
        pair: &CandidatePair,
        nominate: bool,
    ) -> Result<Message> {
        let remote_username = state
            .remote_username
            .clone()
            .ok_or(Error::ErrRemoteCredentials)?;
        let username = format!("{}:{}", remote_username, self.local_username);

        let mut setters: Vec<Box<dyn Setter>> = vec![
            Box::new(BINDING_REQUEST),
            Box::new(TransactionId::new()),
            Box::new(Username::new(ATTR_USERNAME, username)),
            Box::new(PriorityAttr(candidate_priority(
                pair.component(),
                CandidateType::PeerReflexive,
                DEFAULT_LOCAL_PREFERENCE,
            ))),
        ];
        if state.ice_controlling {
            setters.push(Box::new(AttrControlling(self.tie_breaker)));
            if nominate {
                setters.push(Box::new(UseCandidateAttr::new()));
            }
        } else {
            setters.push(Box::new(AttrControlled(self.tie_breaker)));
        }

        let mut request = Message::new();
        request.build(&setters)?;
        Ok(request)
    }

    pub(crate) fn sort_check_list(&self, state: &mut State) {
        let ice_controlling = state.ice_controlling;
        sort_candidate_pairs(&mut state.check_list, ice_controlling);
    }

    /// Adopts a new role and re-orders the check list under it.
    pub(crate) fn switch_role(&self, state: &mut State, ice_controlling: bool) {
        log::info!(
            "[{}]: switching to {} role",
            self.name,
            if ice_controlling {
                "controlling"
            } else {
                "controlled"
            }
        );
        state.ice_controlling = ice_controlling;
        self.sort_check_list(state);
    }

    pub(crate) fn find_pair(
        &self,
        state: &State,
        endpoint: &Arc<StunEndpoint>,
        remote_candidate: &Candidate,
    ) -> Option<Arc<CandidatePair>> {
        state
            .check_list
            .iter()
            .find(|p| {
                Arc::ptr_eq(&p.endpoint, endpoint) && p.remote_candidate == *remote_candidate
            })
            .cloned()
    }

    /// Inserts the missing pairs for a remote candidate into the check list.
    pub(crate) fn pair_remote_candidate(&self, state: &mut State, remote_candidate: &Candidate) {
        let endpoints: Vec<Arc<StunEndpoint>> = state
            .endpoints
            .iter()
            .filter(|e| e.local_candidate().can_pair_with(remote_candidate))
            .cloned()
            .collect();

        for endpoint in endpoints {
            if self.find_pair(state, &endpoint, remote_candidate).is_some() {
                continue;
            }
            if let Ok(pair) = CandidatePair::new(endpoint, remote_candidate.clone()) {
                state.check_list.push(Arc::new(pair));
            }
        }
    }

    pub(crate) fn check_state(&self, pair: &CandidatePair, state: CandidatePairState) {
        log::debug!(
            "[{}]: check {} {} -> {}",
            self.name,
            pair,
            pair.state(),
            state
        );
        pair.set_state(state);
    }

    /// Seeds the check list before the first scheduler tick: unfreeze the
    /// first pair of the lowest component, then one pair per remaining local
    /// foundation of that component (RFC 5245 5.7.4).
    pub(crate) fn unfreeze_initial(&self, state: &mut State) {
        let min_component = match state.components.iter().next() {
            Some(c) => *c,
            None => return,
        };
        let first_pair = match state
            .check_list
            .iter()
            .find(|p| p.component() == min_component)
        {
            Some(p) => Arc::clone(p),
            None => return,
        };
        if first_pair.state() == CandidatePairState::Frozen {
            self.check_state(&first_pair, CandidatePairState::Waiting);
        }

        let mut seen_foundations = HashSet::new();
        seen_foundations.insert(first_pair.local_candidate().foundation.clone());
        let pairs: Vec<Arc<CandidatePair>> = state.check_list.to_vec();
        for pair in pairs {
            let foundation = pair.local_candidate().foundation.clone();
            if pair.component() == min_component
                && !seen_foundations.contains(&foundation)
                && pair.state() == CandidatePairState::Frozen
            {
                self.check_state(&pair, CandidatePairState::Waiting);
                seen_foundations.insert(foundation);
            }
        }
    }

    /// One scheduler tick; returns whether more work may still arrive.
    pub(crate) fn check_periodic(&self, state: &mut State) -> bool {
        // the highest-priority pair in the waiting state
        for pair in &state.check_list {
            if pair.state() == CandidatePairState::Waiting {
                self.check_start_task(Arc::clone(pair));
                return true;
            }
        }

        // otherwise the highest-priority frozen pair
        for pair in &state.check_list {
            if pair.state() == CandidatePairState::Frozen {
                self.check_start_task(Arc::clone(pair));
                return true;
            }
        }

        // if more remote candidates may arrive, keep ticking
        if !state.remote_candidates_end {
            return !state.check_list_done;
        }
        false
    }

    /// Spawns a check task for `pair`, unless one is already running.
    pub(crate) fn check_start_task(&self, pair: Arc<CandidatePair>) {
        let internal = match self.upgrade() {
            Some(internal) => internal,
            None => return,
        };
        let mut task = pair.task.lock();
        if task.is_some() {
            return;
        }
        let pair2 = Arc::clone(&pair);
        *task = Some(tokio::spawn(async move {
            internal.check_start(&pair2).await;
        }));
    }

    /// Performs one connectivity check on `pair` (RFC 5245 7.1), retrying
    /// after a repaired role conflict.
    pub(crate) async fn check_start(&self, pair: &Arc<CandidatePair>) {
        loop {
            let (request, remote_password, nominate, sent_controlling) = {
                let mut state = self.state.lock().await;
                self.check_state(pair, CandidatePairState::InProgress);

                let nominate = state.ice_controlling && !state.remote_is_lite;
                let request = match self.build_request(&state, pair, nominate) {
                    Ok(request) => request,
                    Err(_) => {
                        self.check_state(pair, CandidatePairState::Failed);
                        self.check_complete(&mut state, pair);
                        return;
                    }
                };
                let remote_password = match state.remote_password.clone() {
                    Some(password) => password,
                    None => {
                        self.check_state(pair, CandidatePairState::Failed);
                        self.check_complete(&mut state, pair);
                        return;
                    }
                };
                (request, remote_password, nominate, state.ice_controlling)
            };

            let result = pair
                .endpoint
                .request(request, pair.remote_addr(), Some(&remote_password), None)
                .await;

            let response_addr = match result {
                Err(Error::ErrTransactionFailed(487)) => {
                    // 7.1.3.1. Failure Cases: adopt the opposite of the role
                    // we advertised and retry the same pair.
                    let mut state = self.state.lock().await;
                    self.switch_role(&mut state, !sent_controlling);
                    continue;
                }
                Err(_) => {
                    let mut state = self.state.lock().await;
                    self.check_state(pair, CandidatePairState::Failed);
                    self.check_complete(&mut state, pair);
                    return;
                }
                Ok((_response, from)) => from,
            };

            if response_addr != pair.remote_addr() {
                log::info!(
                    "[{}]: check {} failed: source address mismatch",
                    self.name,
                    pair
                );
                let mut state = self.state.lock().await;
                self.check_state(pair, CandidatePairState::Failed);
                self.check_complete(&mut state, pair);
                return;
            }

            if nominate || pair.remote_nominated() {
                // nominated by aggressive nomination or by the remote party
                pair.set_nominated(true);
            } else {
                let nominate_now = {
                    let mut state = self.state.lock().await;
                    if state.ice_controlling && !state.nominating.contains(&pair.component()) {
                        state.nominating.insert(pair.component());
                        true
                    } else {
                        false
                    }
                };

                if nominate_now {
                    // regular nomination: a second request carrying USE-CANDIDATE
                    log::info!("[{}]: check {} nominating pair", self.name, pair);
                    let (request, remote_password) = {
                        let state = self.state.lock().await;
                        let request = match self.build_request(&state, pair, true) {
                            Ok(request) => request,
                            Err(_) => {
                                drop(state);
                                let mut state = self.state.lock().await;
                                self.check_state(pair, CandidatePairState::Failed);
                                self.check_complete(&mut state, pair);
                                return;
                            }
                        };
                        match state.remote_password.clone() {
                            Some(password) => (request, password),
                            None => {
                                drop(state);
                                let mut state = self.state.lock().await;
                                self.check_state(pair, CandidatePairState::Failed);
                                self.check_complete(&mut state, pair);
                                return;
                            }
                        }
                    };
                    if pair
                        .endpoint
                        .request(request, pair.remote_addr(), Some(&remote_password), None)
                        .await
                        .is_err()
                    {
                        log::info!(
                            "[{}]: check {} failed: could not nominate pair",
                            self.name,
                            pair
                        );
                        let mut state = self.state.lock().await;
                        self.check_state(pair, CandidatePairState::Failed);
                        self.check_complete(&mut state, pair);
                        return;
                    }
                    pair.set_nominated(true);
                }
            }

            let mut state = self.state.lock().await;
            self.check_state(pair, CandidatePairState::Succeeded);
            self.check_complete(&mut state, pair);
            return;
        }
    }

    /// Handles global progression after a check finished either way.
    pub(crate) fn check_complete(&self, state: &mut State, pair: &Arc<CandidatePair>) {
        *pair.task.lock() = None;

        if pair.state() == CandidatePairState::Succeeded {
            if pair.nominated() {
                state.nominated.insert(pair.component(), Arc::clone(pair));

                // 8.1.2. Updating States: remove the Waiting and Frozen pairs
                // of the component that just got a nominated pair.
                for p in &state.check_list {
                    if p.component() == pair.component()
                        && matches!(
                            p.state(),
                            CandidatePairState::Waiting | CandidatePairState::Frozen
                        )
                    {
                        self.check_state(p, CandidatePairState::Failed);
                    }
                }
            }

            if state.nominated.len() == state.components.len() {
                if !state.check_list_done {
                    log::info!("[{}]: ICE completed", self.name);
                    let _ = state.check_list_tx.try_send(ICE_COMPLETED);
                    state.check_list_done = true;
                }
                return;
            }

            // 7.1.3.2.3. Updating Pair States: unfreeze the pairs that share
            // the succeeded pair's local foundation.
            for p in &state.check_list {
                if p.local_candidate().foundation == pair.local_candidate().foundation
                    && p.state() == CandidatePairState::Frozen
                {
                    self.check_state(p, CandidatePairState::Waiting);
                }
            }
        }

        for p in &state.check_list {
            if !matches!(
                p.state(),
                CandidatePairState::Succeeded | CandidatePairState::Failed
            ) {
                return;
            }
        }

        // a controlled agent with a succeeded pair still waits for the
        // remote nomination, only the controlling side may give up
        if !state.ice_controlling {
            for p in &state.check_list {
                if p.state() == CandidatePairState::Succeeded {
                    return;
                }
            }
        }

        if !state.check_list_done {
            log::info!("[{}]: ICE failed", self.name);
            let _ = state.check_list_tx.try_send(ICE_FAILED);
            state.check_list_done = true;
        }
    }

    /// Handles an authenticated inbound check: peer-reflexive learning
    /// (7.2.1.3), triggered checks (7.2.1.4) and the nominated flag
    /// (7.2.1.5).
    pub(crate) fn check_incoming(
        &self,
        state: &mut State,
        message: &Message,
        addr: SocketAddr,
        endpoint: &Arc<StunEndpoint>,
    ) {
        let component = endpoint.component();

        let mut remote_candidate = state
            .remote_candidates
            .iter()
            .find(|c| c.host == addr.ip().to_string() && c.port == addr.port())
            .cloned();
        if let Some(candidate) = &remote_candidate {
            if candidate.component != component {
                log::warn!(
                    "[{}]: discard check from {}, component mismatch",
                    self.name,
                    addr
                );
                return;
            }
        }

        if remote_candidate.is_none() {
            let mut priority = PriorityAttr::default();
            let _ = priority.get_from(message);
            let candidate = Candidate::new_peer_reflexive(component, addr, priority.0);
            state.remote_candidates.push(candidate.clone());
            log::info!(
                "[{}]: discovered peer reflexive candidate {}",
                self.name,
                candidate
            );
            remote_candidate = Some(candidate);
        }
        let remote_candidate = match remote_candidate {
            Some(candidate) => candidate,
            None => return,
        };

        let pair = match self.find_pair(state, endpoint, &remote_candidate) {
            Some(pair) => pair,
            None => {
                let pair = match CandidatePair::new(Arc::clone(endpoint), remote_candidate) {
                    Ok(pair) => Arc::new(pair),
                    Err(_) => return,
                };
                pair.set_state(CandidatePairState::Waiting);
                state.check_list.push(Arc::clone(&pair));
                self.sort_check_list(state);
                pair
            }
        };

        // triggered check
        if matches!(
            pair.state(),
            CandidatePairState::Waiting | CandidatePairState::Failed
        ) {
            self.check_start_task(Arc::clone(&pair));
        }

        // 7.2.1.5. Updating the Nominated Flag
        if UseCandidateAttr::is_set(message) && !state.ice_controlling {
            pair.set_remote_nominated(true);
            if pair.state() == CandidatePairState::Succeeded {
                pair.set_nominated(true);
                self.check_complete(state, &pair);
            }
        }
    }
}
