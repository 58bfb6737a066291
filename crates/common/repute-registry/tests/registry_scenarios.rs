use repute_registry::{
    running_average, Address, RecordView, RegistryEvent, ReputationRecord, ReputationRegistry,
    INITIAL_REPUTATION, MAX_REPUTATION,
};

fn addr(n: u64) -> Address {
    Address::from_low_u64(n)
}

#[tokio::test]
async fn never_registered_addresses_read_as_default() {
    let registry = ReputationRegistry::new();
    for n in [0, 1, 42, u64::MAX] {
        let a = addr(n);
        assert_eq!(registry.reputation(&a).await, INITIAL_REPUTATION);
        assert!(!registry.is_registered(&a).await);
        assert_eq!(registry.lookup(&a).await, RecordView::Default);
        assert_eq!(registry.reputation_data(&a).await, ReputationRecord::unregistered());
    }
    assert_eq!(registry.total_users().await, 0);
}

#[tokio::test]
async fn positive_then_negative_rating() {
    let registry = ReputationRegistry::new();
    let (a, rater) = (addr(1), addr(2));

    registry.register(&a).await.unwrap();
    assert_eq!(registry.reputation_data(&a).await, ReputationRecord::registered());

    registry.give_positive_rating(&rater, &a).await.unwrap();
    let record = registry.reputation_data(&a).await;
    assert_eq!((record.score, record.total_ratings), (800, 1));

    registry.give_negative_rating(&rater, &a).await.unwrap();
    let record = registry.reputation_data(&a).await;
    assert_eq!((record.score, record.total_ratings), (500, 2));

    registry.give_neutral_rating(&rater, &a).await.unwrap();
    let record = registry.reputation_data(&a).await;
    assert_eq!((record.score, record.total_ratings), (500, 3));
}

#[tokio::test]
async fn over_range_rating_is_clamped_on_fresh_address() {
    let registry = ReputationRegistry::new();
    let (b, rater) = (addr(11), addr(12));

    let score = registry.submit_rating(&rater, &b, 5000).await.unwrap();

    assert_eq!(score, MAX_REPUTATION);
    let record = registry.reputation_data(&b).await;
    assert!(record.is_registered);
    assert_eq!((record.score, record.total_ratings), (1000, 1));
    assert!(registry.is_registered(&rater).await);
}

#[tokio::test]
async fn rating_sequence_follows_running_average() {
    let registry = ReputationRegistry::new();
    let (a, rater) = (addr(1), addr(2));
    let ratings = [1000u64, 0, 333, 7, 999_999, 450, 451, 1, 800, 200];

    let mut expected = INITIAL_REPUTATION;
    for (n, raw) in ratings.iter().enumerate() {
        expected = running_average(expected, n as u64, (*raw).min(MAX_REPUTATION)).unwrap();
        let score = registry.submit_rating(&rater, &a, *raw).await.unwrap();
        assert_eq!(score, expected);
    }

    let record = registry.reputation_data(&a).await;
    assert_eq!(record.score, expected);
    assert_eq!(record.total_ratings, ratings.len() as u64);
    assert!(record.score <= MAX_REPUTATION);
}

#[tokio::test]
async fn re_registration_erases_history() {
    let registry = ReputationRegistry::new();
    let (a, rater) = (addr(1), addr(2));

    registry.register(&a).await.unwrap();
    registry.submit_rating(&rater, &a, 100).await.unwrap();
    registry.submit_rating(&rater, &a, 100).await.unwrap();
    assert_eq!(registry.reputation_data(&a).await.total_ratings, 2);

    registry.register(&a).await.unwrap();
    assert_eq!(registry.reputation_data(&a).await, ReputationRecord::registered());
    assert_eq!(registry.registered_users().await, vec![a, rater]);
}

#[tokio::test]
async fn set_reputation_leaves_counter_alone() {
    let registry = ReputationRegistry::new();
    let (a, rater, admin) = (addr(1), addr(2), addr(3));

    registry.submit_rating(&rater, &a, 900).await.unwrap();
    registry.submit_rating(&rater, &a, 300).await.unwrap();

    assert_eq!(registry.set_reputation(&admin, &a, 10).await.unwrap().score, 10);
    let record = registry.reputation_data(&a).await;
    assert_eq!((record.score, record.total_ratings), (10, 2));

    assert_eq!(registry.set_reputation(&admin, &a, 70_000).await.unwrap().score, 1000);
    assert_eq!(registry.reputation_data(&a).await.total_ratings, 2);

    // the next rating averages against the overwritten score
    let score = registry.submit_rating(&rater, &a, 100).await.unwrap();
    assert_eq!(score, (1000 * 2 + 100) / 3);
}

#[tokio::test]
async fn reset_yields_initial_state_in_both_branches() {
    let registry = ReputationRegistry::new();
    let (rated, fresh, admin) = (addr(1), addr(2), addr(3));
    registry.submit_rating(&admin, &rated, 50).await.unwrap();

    registry.reset_reputation(&admin, &rated).await.unwrap();
    registry.reset_reputation(&admin, &fresh).await.unwrap();

    for a in [rated, fresh] {
        let record = registry.reputation_data(&a).await;
        assert_eq!((record.score, record.total_ratings), (500, 0));
        assert!(record.is_registered);
    }
    assert_eq!(registry.registered_users().await, vec![rated, admin, fresh]);
}

#[tokio::test]
async fn batch_reputations_preserve_order_and_duplicates() {
    let registry = ReputationRegistry::new();
    let (a, x, rater) = (addr(1), addr(99), addr(2));
    registry.submit_rating(&rater, &a, 720).await.unwrap();

    let scores = registry.batch_reputations(&[a, x, a]).await;
    assert_eq!(scores, vec![720, 500, 720]);
    assert!(registry.batch_reputations(&[]).await.is_empty());
}

#[tokio::test]
async fn batch_register_keeps_first_position() {
    let registry = ReputationRegistry::new();
    let (a, b) = (addr(1), addr(2));

    registry.batch_register(&[a, b, a]).await.unwrap();

    assert_eq!(registry.registered_users().await, vec![a, b]);
    assert_eq!(registry.total_users().await, 2);

    let kinds: Vec<RegistryEvent> = registry
        .events_since(0)
        .await
        .into_iter()
        .map(|e| e.event)
        .collect();
    assert_eq!(
        kinds,
        vec![
            RegistryEvent::UserRegistered { address: a, initial_score: 500 },
            RegistryEvent::UserRegistered { address: b, initial_score: 500 },
            RegistryEvent::UserRegistered { address: a, initial_score: 500 },
        ]
    );
}

#[tokio::test]
async fn register_self_registers_the_caller() {
    let registry = ReputationRegistry::new();
    let me = addr(77);
    registry.register_self(&me).await.unwrap();
    assert!(registry.is_registered(&me).await);
    assert_eq!(registry.constants().initial_reputation, 500);
    assert_eq!(registry.constants().max_reputation, 1000);
    assert_eq!(registry.constants().min_reputation, 0);
}
