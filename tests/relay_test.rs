// tests/relay_test.rs
//! End-to-end relay scenarios: proposal, challenge, verification game,
//! settlement, and the best-chain query.

use superblock_relay::{
    Address, ClaimDecision, ClaimManager, ClaimState, Hash, ProposalOutcome, RelayConfig,
    RelayError, SessionOutcome, SuperblockStatus,
};

const SUBMITTER: Address = [1; 32];
const CHALLENGER: Address = [2; 32];

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn test_config() -> RelayConfig {
    RelayConfig {
        min_proposal_deposit: 10,
        min_challenge_deposit: 10,
        challenge_window: 100,
        response_timeout: 50,
    }
}

fn batch(from: u8, count: u8) -> Vec<Hash> {
    (from..from + count).map(|i| [i; 32]).collect()
}

fn setup() -> (ClaimManager, Hash) {
    init_logger();
    let mut relay = ClaimManager::new(test_config());
    let genesis = relay.initialize([1; 32], 1, 1, [0xAA; 32], SUBMITTER).unwrap();
    relay.make_deposit(SUBMITTER, 100).unwrap();
    relay.make_deposit(CHALLENGER, 100).unwrap();
    (relay, genesis)
}

fn event_names(relay: &ClaimManager) -> Vec<&'static str> {
    relay.events().events().iter().map(|e| e.name()).collect()
}

#[test]
fn scenario_a_unchallenged_superblock_is_confirmed() {
    let (mut relay, genesis) = setup();

    let id = relay
        .propose_superblock(SUBMITTER, batch(1, 4), 10, 50, [4; 32], genesis, 0)
        .id()
        .expect("proposal accepted");
    assert_eq!(relay.superblock_status(&id), Some(SuperblockStatus::New));

    // Window still open: neither finishable nor confirmable
    assert!(!relay.check_claim_finished(id, 99).unwrap());
    assert!(matches!(
        relay.confirm_superblock(id, 99),
        Err(RelayError::NotReady(_))
    ));

    // Window elapsed with no challengers
    assert!(relay.check_claim_finished(id, 100).unwrap());
    assert_eq!(
        relay.superblock_status(&id),
        Some(SuperblockStatus::SemiApproved)
    );

    relay.confirm_superblock(id, 101).unwrap();
    assert_eq!(relay.superblock_status(&id), Some(SuperblockStatus::Approved));
    assert_eq!(relay.get_best_superblock(), Some(id));

    // Submitter's bond is back and withdrawable
    assert_eq!(relay.deposits().balance_of(&SUBMITTER).bonded, 0);
    relay.withdraw_deposit(SUBMITTER, 100).unwrap();

    let names = event_names(&relay);
    assert_eq!(
        names,
        vec![
            "NewSuperblock",
            "DepositMade",
            "DepositMade",
            "NewSuperblock",
            "ErrorSuperblock",
            "SemiApprovedSuperblock",
            "ApprovedSuperblock",
        ]
    );
}

#[test]
fn scenario_b_submitter_survives_full_verification_game() {
    let (mut relay, genesis) = setup();
    let hashes = batch(1, 4);

    let id = relay
        .propose_superblock(SUBMITTER, hashes.clone(), 10, 50, [4; 32], genesis, 0)
        .id()
        .unwrap();

    relay.challenge_superblock(CHALLENGER, id, 10).unwrap();
    assert_eq!(relay.superblock_status(&id), Some(SuperblockStatus::InBattle));
    assert_eq!(relay.claim(&id).unwrap().state, ClaimState::Challenged);

    assert_eq!(relay.run_next_verification_game(id, 11).unwrap(), 1);
    let session = relay.get_session(&id, &CHALLENGER).unwrap();

    // Round 1: challenger probes the midpoint, disputing [2, 4)
    relay.query(&session, CHALLENGER, 2, 12).unwrap();
    let outcome = relay.respond(&session, SUBMITTER, &hashes[2..4], 13).unwrap();
    assert_eq!(outcome, SessionOutcome::Unset);

    // Round 2: down to a single leaf
    relay.query(&session, CHALLENGER, 3, 14).unwrap();
    let outcome = relay.respond(&session, SUBMITTER, &hashes[3..4], 15).unwrap();
    assert_eq!(outcome, SessionOutcome::SubmitterWins);

    assert_eq!(
        relay.superblock_status(&id),
        Some(SuperblockStatus::SemiApproved)
    );
    assert_eq!(relay.claim(&id).unwrap().decision, ClaimDecision::Confirmed);

    relay.confirm_superblock(id, 16).unwrap();
    assert_eq!(relay.superblock_status(&id), Some(SuperblockStatus::Approved));
    assert_eq!(relay.get_best_superblock(), Some(id));

    // Challenger's bond went to the submitter
    assert_eq!(relay.deposits().balance_of(&SUBMITTER).free, 110);
    assert_eq!(relay.deposits().balance_of(&CHALLENGER).free, 90);
    assert_eq!(relay.deposits().balance_of(&CHALLENGER).bonded, 0);

    let names = event_names(&relay);
    assert!(names.contains(&"ChallengeSuperblock"));
    assert!(names.contains(&"ClaimChallenged"));
    assert!(names.contains(&"VerificationGameStarted"));
    assert!(names.contains(&"SemiApprovedSuperblock"));
    assert!(names.contains(&"ApprovedSuperblock"));
}

#[test]
fn scenario_c_submitter_fails_final_step_and_resubmits() {
    let (mut relay, genesis) = setup();
    let hashes = batch(1, 4);

    let id = relay
        .propose_superblock(SUBMITTER, hashes.clone(), 10, 50, [4; 32], genesis, 0)
        .id()
        .unwrap();
    relay.challenge_superblock(CHALLENGER, id, 10).unwrap();
    relay.run_next_verification_game(id, 11).unwrap();
    let session = relay.get_session(&id, &CHALLENGER).unwrap();

    // Honest rounds down to the lowest leaf
    relay.query(&session, CHALLENGER, 0, 12).unwrap();
    assert_eq!(
        relay.respond(&session, SUBMITTER, &hashes[0..2], 13).unwrap(),
        SessionOutcome::Unset
    );
    relay.query(&session, CHALLENGER, 0, 14).unwrap();

    // Final step: data does not hash to the committed leaf
    let outcome = relay.respond(&session, SUBMITTER, &[[0xEE; 32]], 15).unwrap();
    assert_eq!(outcome, SessionOutcome::ChallengerWins);

    assert_eq!(relay.superblock_status(&id), Some(SuperblockStatus::Invalid));
    assert_eq!(relay.claim(&id).unwrap().decision, ClaimDecision::Invalidated);
    assert_ne!(relay.get_best_superblock(), Some(id));

    // Submitter's bond slashed to the challenger, challenger unbonded
    assert_eq!(relay.deposits().balance_of(&SUBMITTER).free, 90);
    assert_eq!(relay.deposits().balance_of(&SUBMITTER).bonded, 0);
    assert_eq!(relay.deposits().balance_of(&CHALLENGER).free, 110);

    // Confirming the invalidated superblock is rejected
    assert!(matches!(
        relay.confirm_superblock(id, 16),
        Err(RelayError::NotReady(_))
    ));

    // Resubmission with corrected data gets a fresh id and goes through
    let corrected = relay
        .propose_superblock(SUBMITTER, batch(11, 4), 10, 50, [4; 32], genesis, 20)
        .id()
        .expect("corrected resubmission accepted");
    assert_ne!(corrected, id);
    relay.confirm_superblock(corrected, 120).unwrap();
    assert_eq!(
        relay.superblock_status(&corrected),
        Some(SuperblockStatus::Approved)
    );
    assert_eq!(relay.get_best_superblock(), Some(corrected));
}

#[test]
fn scenario_timeout_submitter_forfeits() {
    let (mut relay, genesis) = setup();
    let hashes = batch(1, 4);

    let id = relay
        .propose_superblock(SUBMITTER, hashes, 10, 50, [4; 32], genesis, 0)
        .id()
        .unwrap();
    relay.challenge_superblock(CHALLENGER, id, 10).unwrap();
    relay.run_next_verification_game(id, 11).unwrap();
    let session = relay.get_session(&id, &CHALLENGER).unwrap();

    relay.query(&session, CHALLENGER, 2, 12).unwrap();

    // Submitter never responds; deadline is 12 + 50
    assert_eq!(
        relay.check_session_timeout(&session, 62).unwrap(),
        SessionOutcome::Unset
    );
    assert_eq!(
        relay.check_session_timeout(&session, 63).unwrap(),
        SessionOutcome::ChallengerWins
    );

    assert_eq!(relay.superblock_status(&id), Some(SuperblockStatus::Invalid));
    assert_eq!(relay.deposits().balance_of(&CHALLENGER).free, 110);
}

#[test]
fn scenario_timeout_challenger_forfeits() {
    let (mut relay, genesis) = setup();

    let id = relay
        .propose_superblock(SUBMITTER, batch(1, 4), 10, 50, [4; 32], genesis, 0)
        .id()
        .unwrap();
    relay.challenge_superblock(CHALLENGER, id, 10).unwrap();
    relay.run_next_verification_game(id, 11).unwrap();
    let session = relay.get_session(&id, &CHALLENGER).unwrap();

    // Challenger never queries; their clock started at 11
    assert_eq!(
        relay.check_session_timeout(&session, 62).unwrap(),
        SessionOutcome::SubmitterWins
    );

    assert_eq!(
        relay.superblock_status(&id),
        Some(SuperblockStatus::SemiApproved)
    );
    relay.confirm_superblock(id, 63).unwrap();
    assert_eq!(relay.superblock_status(&id), Some(SuperblockStatus::Approved));

    // Challenger's bond slashed to the submitter
    assert_eq!(relay.deposits().balance_of(&SUBMITTER).free, 110);
    assert_eq!(relay.deposits().balance_of(&CHALLENGER).free, 90);
}

#[test]
fn duplicate_proposal_reports_error_superblock() {
    let (mut relay, genesis) = setup();

    let first = relay.propose_superblock(SUBMITTER, batch(1, 4), 10, 50, [4; 32], genesis, 0);
    assert!(first.is_created());

    let second = relay.propose_superblock(SUBMITTER, batch(1, 4), 10, 50, [4; 32], genesis, 1);
    match second {
        ProposalOutcome::Rejected { error, .. } => {
            assert!(matches!(error, RelayError::DuplicateSuperblock(_)))
        }
        ProposalOutcome::Created(_) => panic!("duplicate must be rejected"),
    }
    assert_eq!(relay.events().last().unwrap().name(), "ErrorSuperblock");

    // The chain still holds exactly genesis plus the first proposal
    assert_eq!(relay.chain().len(), 2);
}

#[test]
fn unknown_parent_is_reported() {
    let (mut relay, _genesis) = setup();
    let outcome =
        relay.propose_superblock(SUBMITTER, batch(1, 4), 10, 50, [4; 32], [0xCD; 32], 0);
    match outcome {
        ProposalOutcome::Rejected { error, .. } => {
            assert!(matches!(error, RelayError::UnknownParent(_)))
        }
        ProposalOutcome::Created(_) => panic!("unknown parent must be rejected"),
    }
    // Rejection did not eat the submitter's funds
    assert_eq!(relay.deposits().balance_of(&SUBMITTER).free, 100);
}

#[test]
fn chain_grows_across_confirmed_superblocks() {
    let (mut relay, genesis) = setup();

    let s1 = relay
        .propose_superblock(SUBMITTER, batch(1, 4), 10, 50, [4; 32], genesis, 0)
        .id()
        .unwrap();
    relay.confirm_superblock(s1, 100).unwrap();

    let s2 = relay
        .propose_superblock(SUBMITTER, batch(5, 4), 20, 90, [5; 32], s1, 100)
        .id()
        .unwrap();
    relay.confirm_superblock(s2, 200).unwrap();

    assert_eq!(relay.get_best_superblock(), Some(s2));
    assert_eq!(relay.chain().get(&s2).unwrap().height, 2);
    assert_eq!(relay.chain().get(&s2).unwrap().parent_id, s1);
}

#[test]
fn deposits_are_conserved_through_a_full_dispute() {
    let (mut relay, genesis) = setup();
    let total_before = relay.deposits().total_held();

    let id = relay
        .propose_superblock(SUBMITTER, batch(1, 4), 10, 50, [4; 32], genesis, 0)
        .id()
        .unwrap();
    relay.challenge_superblock(CHALLENGER, id, 10).unwrap();
    relay.run_next_verification_game(id, 11).unwrap();
    let session = relay.get_session(&id, &CHALLENGER).unwrap();

    relay.query(&session, CHALLENGER, 0, 12).unwrap();
    relay
        .respond(&session, SUBMITTER, &batch(1, 4)[0..2], 13)
        .unwrap();
    relay.query(&session, CHALLENGER, 0, 14).unwrap();
    relay.respond(&session, SUBMITTER, &[[0xEE; 32]], 15).unwrap();

    // Slashing moves funds between participants, never out of the ledger
    assert_eq!(relay.deposits().total_held(), total_before);
}

#[test]
fn verification_game_only_runs_for_registered_challengers() {
    let (mut relay, genesis) = setup();
    let id = relay
        .propose_superblock(SUBMITTER, batch(1, 4), 10, 50, [4; 32], genesis, 0)
        .id()
        .unwrap();

    // No challengers yet: nothing to start, and no session to look up
    assert_eq!(relay.run_next_verification_game(id, 1).unwrap(), 0);
    assert!(matches!(
        relay.get_session(&id, &CHALLENGER),
        Err(RelayError::NoSession(_))
    ));
}
