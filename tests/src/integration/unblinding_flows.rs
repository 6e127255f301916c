//! # Unblinding & Breach Flows
//!
//! Emergency unblinding (auto-approved and approval-gated), assignment
//! lookups, breach registration/resolution, and the integrity report that
//! summarizes them.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use blinding_engine::ports::BlindingApi;
    use blinding_engine::{
        actions, ApprovalStatus, BlindingConfig, BlindingError, BreachReport, BreachSeverity,
        BreachType, RandomizationConfig, StudyStatus,
    };

    async fn running_study() -> Harness {
        let h = Harness::new();
        h.active_study(RandomizationConfig::simple()).await.unwrap();
        h.enroll_many(4).await.unwrap();
        h
    }

    fn report(severity: BreachSeverity, affected: &[&str]) -> BreachReport {
        BreachReport {
            breach_type: BreachType::ProtocolViolation,
            severity,
            description: "Pharmacy label printed with arm code".to_string(),
            affected_participants: affected.iter().map(|p| p.to_string()).collect(),
            affected_researchers: vec![RESEARCHER_A.to_string()],
            occurred_at: None,
        }
    }

    // =============================================================================
    // EMERGENCY UNBLINDING
    // =============================================================================

    #[tokio::test]
    async fn test_auto_approval_registers_one_emergency_breach() {
        let h = running_study().await;
        let decision = h
            .service
            .request_emergency_unblinding(STUDY_ID, &participant_id(0), "anaphylaxis", PI)
            .await
            .unwrap();

        assert_eq!(decision.request.status, ApprovalStatus::Approved);
        assert_eq!(decision.request.approved_by.as_deref(), Some(PI));

        let study = h.service.get_study_view(STUDY_ID, PI).await.unwrap();
        assert_eq!(study.breaches.len(), 1);
        assert_eq!(study.breaches[0].breach_type, BreachType::EmergencyUnblinding);
        assert!(h.notifier.delivered().is_empty());
        assert!(h
            .service
            .list_pending_unblinding_requests(STUDY_ID, PI)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_gated_request_approved_by_named_approver() {
        let h = running_study().await;
        let pid = participant_id(0);
        let decision = h
            .service
            .request_emergency_unblinding(STUDY_ID, &pid, "suspected overdose", COORDINATOR)
            .await
            .unwrap();
        assert_eq!(decision.request.status, ApprovalStatus::Pending);
        assert!(decision.breach.is_none());

        let pending = h.notifier.delivered_to(PI);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].topic, "emergency_unblinding_pending");

        let queue = h
            .service
            .list_pending_unblinding_requests(STUDY_ID, PI)
            .await
            .unwrap();
        assert_eq!(queue.len(), 1);
        for user in [RESEARCHER_A, STATISTICIAN] {
            let err = h
                .service
                .list_pending_unblinding_requests(STUDY_ID, user)
                .await
                .unwrap_err();
            assert!(matches!(err, BlindingError::InsufficientPermissions { .. }));
        }

        let approved = h
            .service
            .resolve_emergency_unblinding(STUDY_ID, &decision.request.id, true, None, PI)
            .await
            .unwrap();
        assert_eq!(approved.request.status, ApprovalStatus::Approved);
        assert!(approved.breach.is_some());

        let resolved = h.notifier.delivered_to(COORDINATOR);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].topic, "emergency_unblinding_resolved");

        let err = h
            .service
            .resolve_emergency_unblinding(STUDY_ID, &decision.request.id, false, None, PI)
            .await
            .unwrap_err();
        assert!(matches!(err, BlindingError::InvalidOperation { .. }));

        // The approved participant can now be looked up without a new breach.
        let access = h
            .service
            .get_participant_assignment(STUDY_ID, &pid, RESEARCHER_A)
            .await
            .unwrap();
        assert!(access.breach.is_none());
        let study = h.service.get_study_view(STUDY_ID, PI).await.unwrap();
        assert_eq!(study.breaches.len(), 1);
    }

    #[tokio::test]
    async fn test_request_without_approvers_reaches_every_unblinder() {
        let h = running_study().await;
        let decision = h
            .service
            .request_emergency_unblinding(STUDY_ID, &participant_id(0), "rash", RESEARCHER_A)
            .await
            .unwrap();

        assert_eq!(h.notifier.delivered_to(PI).len(), 1);
        assert_eq!(h.notifier.delivered_to(COORDINATOR).len(), 1);
        assert!(h.notifier.delivered_to(STATISTICIAN).is_empty());

        let err = h
            .service
            .resolve_emergency_unblinding(STUDY_ID, &decision.request.id, true, None, STATISTICIAN)
            .await
            .unwrap_err();
        assert!(matches!(err, BlindingError::InsufficientPermissions { .. }));

        let denied = h
            .service
            .resolve_emergency_unblinding(
                STUDY_ID,
                &decision.request.id,
                false,
                Some("not clinically indicated"),
                COORDINATOR,
            )
            .await
            .unwrap();
        assert_eq!(denied.request.status, ApprovalStatus::Denied);
        assert!(denied.request.approved_by.is_none());
        assert_eq!(
            denied.request.denial_reason.as_deref(),
            Some("not clinically indicated")
        );
        assert!(denied.breach.is_none());

        let study = h.service.get_study_view(STUDY_ID, PI).await.unwrap();
        assert!(study.breaches.is_empty());
        assert_eq!(
            study.audit_log.last().map(|e| e.action.as_str()),
            Some(actions::EMERGENCY_UNBLINDING_DENIED)
        );
    }

    #[tokio::test]
    async fn test_request_validation() {
        let h = running_study().await;
        let err = h
            .service
            .request_emergency_unblinding(STUDY_ID, &participant_id(0), "  ", PI)
            .await
            .unwrap_err();
        assert!(matches!(err, BlindingError::InvalidOperation { .. }));

        let err = h
            .service
            .request_emergency_unblinding(STUDY_ID, "P999", "reason", PI)
            .await
            .unwrap_err();
        assert!(matches!(err, BlindingError::ParticipantNotFound { .. }));

        h.service
            .transition_status(STUDY_ID, StudyStatus::Terminated, PI)
            .await
            .unwrap();
        let err = h
            .service
            .request_emergency_unblinding(STUDY_ID, &participant_id(0), "reason", PI)
            .await
            .unwrap_err();
        assert!(matches!(err, BlindingError::InvalidStudyState { .. }));
    }

    // =============================================================================
    // ASSIGNMENT ACCESS
    // =============================================================================

    #[tokio::test]
    async fn test_unapproved_access_is_permitted_but_flagged() {
        let h = running_study().await;
        let before = h.service.get_study_view(STUDY_ID, PI).await.unwrap();

        let access = h
            .service
            .get_participant_assignment(STUDY_ID, &participant_id(1), RESEARCHER_B)
            .await
            .unwrap();
        let breach = access.breach.expect("flagged");
        assert_eq!(breach.breach_type, BreachType::AccidentalDisclosure);
        assert_eq!(breach.affected_participants, vec![participant_id(1)]);

        let after = h.service.get_study_view(STUDY_ID, PI).await.unwrap();
        assert_eq!(after.breaches.len(), before.breaches.len() + 1);
        assert_eq!(after.audit_log.len(), before.audit_log.len() + 1);
        assert_eq!(after.version, before.version + 1);
    }

    #[tokio::test]
    async fn test_authorized_unblinder_exempt_unless_configured() {
        let h = running_study().await;
        let access = h
            .service
            .get_participant_assignment(STUDY_ID, &participant_id(0), PI)
            .await
            .unwrap();
        assert!(access.breach.is_none());

        // Full access without unblinding rights is not exempt.
        let access = h
            .service
            .get_participant_assignment(STUDY_ID, &participant_id(0), STATISTICIAN)
            .await
            .unwrap();
        assert!(access.breach.is_some());

        let strict = Harness::with_config(BlindingConfig {
            flag_authorized_assignment_access: true,
            ..BlindingConfig::for_testing()
        });
        strict.active_study(RandomizationConfig::simple()).await.unwrap();
        strict.enroll_many(1).await.unwrap();
        let access = strict
            .service
            .get_participant_assignment(STUDY_ID, &participant_id(0), PI)
            .await
            .unwrap();
        assert!(access.breach.is_some());
    }

    // =============================================================================
    // BREACHES
    // =============================================================================

    #[tokio::test]
    async fn test_critical_breach_notifies_full_access_holders() {
        let h = running_study().await;
        let breach = h
            .service
            .register_breach(
                STUDY_ID,
                report(BreachSeverity::Critical, &[&participant_id(0)]),
                RESEARCHER_A,
            )
            .await
            .unwrap();
        assert_eq!(breach.reported_by, RESEARCHER_A);

        let recipients: Vec<_> = h
            .notifier
            .delivered()
            .into_iter()
            .map(|n| n.user_id)
            .collect();
        assert_eq!(recipients.len(), 3);
        for user in [PI, COORDINATOR, STATISTICIAN] {
            assert!(recipients.iter().any(|r| r == user));
        }

        h.service
            .register_breach(STUDY_ID, report(BreachSeverity::Low, &[]), ANALYST)
            .await
            .unwrap();
        assert_eq!(h.notifier.delivered().len(), 3);
    }

    #[tokio::test]
    async fn test_breach_validation_and_single_resolution() {
        let h = running_study().await;
        let mut empty = report(BreachSeverity::Low, &[]);
        empty.description = String::new();
        let err = h
            .service
            .register_breach(STUDY_ID, empty, PI)
            .await
            .unwrap_err();
        assert!(matches!(err, BlindingError::InvalidOperation { .. }));

        let err = h
            .service
            .register_breach(STUDY_ID, report(BreachSeverity::Low, &["P999"]), PI)
            .await
            .unwrap_err();
        assert!(matches!(err, BlindingError::ParticipantNotFound { .. }));

        let breach = h
            .service
            .register_breach(STUDY_ID, report(BreachSeverity::High, &[]), RESEARCHER_A)
            .await
            .unwrap();

        let err = h
            .service
            .resolve_breach(STUDY_ID, &breach.id, "relabelled", RESEARCHER_A)
            .await
            .unwrap_err();
        assert!(matches!(err, BlindingError::InsufficientPermissions { .. }));

        let resolved = h
            .service
            .resolve_breach(STUDY_ID, &breach.id, "relabelled stock", PI)
            .await
            .unwrap();
        let resolution = resolved.resolution.expect("resolution recorded");
        assert_eq!(resolution.resolved_by, PI);
        assert_eq!(resolution.action_taken, "relabelled stock");

        let err = h
            .service
            .resolve_breach(STUDY_ID, &breach.id, "again", PI)
            .await
            .unwrap_err();
        assert!(matches!(err, BlindingError::InvalidOperation { .. }));
    }

    #[tokio::test]
    async fn test_blinded_roles_never_see_breach_activity() {
        let h = running_study().await;
        h.service
            .get_participant_assignment(STUDY_ID, &participant_id(0), RESEARCHER_A)
            .await
            .unwrap();
        h.service
            .request_emergency_unblinding(STUDY_ID, &participant_id(0), "fever", PI)
            .await
            .unwrap();

        let view = h.service.get_study_view(STUDY_ID, RESEARCHER_A).await.unwrap();
        assert!(view.breaches.is_empty());
        assert!(view.unblinding_requests.is_empty());
        assert!(view.audit_log.iter().all(|e| {
            e.action != actions::EMERGENCY_UNBLINDING_REQUESTED
                && e.action != actions::PARTICIPANT_ASSIGNMENT_ACCESSED
        }));
    }

    // =============================================================================
    // INTEGRITY
    // =============================================================================

    #[tokio::test]
    async fn test_integrity_reflects_breaches_and_repeated_reads() {
        let h = running_study().await;
        let clean = h.service.compute_integrity(STUDY_ID, PI).await.unwrap();
        assert_eq!(clean.score, 100.0);
        assert_eq!(clean.confirmed_breaches, 0);

        for _ in 0..6 {
            h.service
                .get_participant_assignment(STUDY_ID, &participant_id(0), RESEARCHER_A)
                .await
                .unwrap();
        }

        let report = h.service.compute_integrity(STUDY_ID, ANALYST).await.unwrap();
        assert_eq!(report.confirmed_breaches, 6);
        // six suspicious reads plus one over-threshold actor/participant pair
        assert_eq!(report.potential_breaches, 7);
        assert!(report.score < 70.0);
        assert!(!report.recommendations.is_empty());

        let err = h.service.compute_integrity(STUDY_ID, ETHICS).await.unwrap_err();
        assert!(matches!(err, BlindingError::InsufficientPermissions { .. }));
    }
}
