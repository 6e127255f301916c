//! # Concurrent Writers
//!
//! Many callers mutating one study at once. Optimistic versioning must
//! serialize them without losing a write or corrupting block and stratum
//! state, and a conflict that outlives the retry budget must leave the
//! stored study untouched.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use blinding_engine::ports::BlindingApi;
    use blinding_engine::{
        BlindingConfig, RandomizationConfig, StudyStatus, StudyStore,
    };
    use futures::future::join_all;
    use std::sync::Arc;

    fn patient_config() -> BlindingConfig {
        BlindingConfig {
            max_commit_retries: 1_000,
            ..BlindingConfig::for_testing()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_block_enrollment_keeps_blocks_whole() {
        let h = Harness::with_config(patient_config());
        h.active_study(RandomizationConfig::block(Some(4)))
            .await
            .unwrap();

        let handles = (0..24).map(|i| {
            let service = Arc::clone(&h.service);
            tokio::spawn(async move {
                service
                    .enroll_participant(STUDY_ID, &participant_id(i), vec![], PI)
                    .await
            })
        });
        for result in join_all(handles).await {
            result.expect("task").expect("enrollment");
        }

        let study = h.service.get_study_view(STUDY_ID, PI).await.unwrap();
        assert_eq!(study.participants.len(), 24);
        assert_eq!(study.version, 2 + 24);
        assert_eq!(study.audit_log.len(), 2 + 24);

        for block in study.participants.chunks(4) {
            let a = block.iter().filter(|p| p.arm_id == "A").count();
            assert_eq!(a, 2, "block {:?}", block.iter().map(|p| &p.arm_id).collect::<Vec<_>>());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_stratified_enrollment_stays_balanced() {
        let h = Harness::with_config(patient_config());
        h.active_study(RandomizationConfig::stratified(&["site"]))
            .await
            .unwrap();
        for i in 0..30 {
            let site = if i % 3 == 0 { "north" } else { "south" };
            h.directory.insert(&participant_id(i), &[("site", site)]);
        }

        let handles = (0..30).map(|i| {
            let service = Arc::clone(&h.service);
            tokio::spawn(async move {
                service
                    .enroll_participant(STUDY_ID, &participant_id(i), vec![], RESEARCHER_A)
                    .await
            })
        });
        for result in join_all(handles).await {
            result.expect("task").expect("enrollment");
        }

        for (stratum, expected) in [("north", 10), ("south", 20)] {
            let counts = h
                .store
                .get_stratum_counts(STUDY_ID, stratum)
                .await
                .unwrap()
                .expect("stratum stored");
            assert_eq!(counts.counts.values().sum::<u64>(), expected);
            let max = counts.counts.values().max().copied().unwrap_or(0);
            let min = counts.counts.values().min().copied().unwrap_or(0);
            assert!(max - min <= 1, "{} counts {:?}", stratum, counts.counts);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mixed_writers_lose_nothing() {
        let h = Harness::with_config(patient_config());
        h.active_study(RandomizationConfig::simple()).await.unwrap();
        h.enroll_many(10).await.unwrap();

        let readers = (0..10).map(|i| {
            let service = Arc::clone(&h.service);
            tokio::spawn(async move {
                service
                    .get_participant_assignment(STUDY_ID, &participant_id(i), RESEARCHER_A)
                    .await
                    .map(|_| ())
            })
        });
        let withdrawals = (0..5).map(|i| {
            let service = Arc::clone(&h.service);
            tokio::spawn(async move {
                service
                    .withdraw_participant(STUDY_ID, &participant_id(i), "moved away", PI)
                    .await
                    .map(|_| ())
            })
        });
        for result in join_all(readers.chain(withdrawals)).await {
            result.expect("task").expect("operation");
        }

        let study = h.service.get_study_view(STUDY_ID, PI).await.unwrap();
        assert_eq!(study.breaches.len(), 10);
        assert_eq!(study.active_participants().count(), 5);
        assert_eq!(study.version, 2 + 10 + 15);
    }

    #[tokio::test]
    async fn test_exhausted_retries_leave_study_untouched() {
        let h = Harness::new();
        h.active_study(RandomizationConfig::simple()).await.unwrap();
        let before = h.store.get_study(STUDY_ID).await.unwrap().expect("stored");

        let retries = h.service.config().max_commit_retries as usize;
        h.store.inject_conflicts(retries + 1);
        let err = h
            .service
            .transition_status(STUDY_ID, StudyStatus::Paused, PI)
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        let after = h.store.get_study(STUDY_ID).await.unwrap().expect("stored");
        assert_eq!(after, before);
        assert_eq!(h.audit_sink.entries(STUDY_ID).len(), 2);

        // The budget is now spent; the next attempt commits.
        h.service
            .transition_status(STUDY_ID, StudyStatus::Paused, PI)
            .await
            .unwrap();
    }
}
