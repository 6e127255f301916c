//! Blinding Service - coordinator
//!
//! The single mutator of study aggregates. Every mutating call:
//!
//! 1. reads the study and validates on a working copy,
//! 2. appends exactly one audit entry and bumps the version,
//! 3. commits with `expected_version` = the version read, retrying on a
//!    version conflict up to `max_commit_retries` times,
//! 4. mirrors the entry to the audit sink and sends notifications.
//!
//! Sink failures after a commit are logged, never returned.

use crate::algorithms::{self, block_position, stratum_key, AssignmentInput};
use crate::audit::{compute_integrity, IntegrityReport};
use crate::config::BlindingConfig;
use crate::domain::{
    check_study_invariants, invariant_single_commit_step, invariant_stratum_balance,
    lifecycle, AccessLevel, AggregateRecord, ApprovalStatus, AuditLogEntry, BlindedParticipant,
    BlindingError, BlindingResult, Breach, BreachReport, Mutation, MutationContext,
    Notification, ParticipantAttributes, ParticipantId, RandomizationMethod, StatusTransition,
    StoreError, Study, StudyDefinition, StudyRole, StudyStatus, UnblindingRequest,
};
use crate::enforcement::{
    self, new_id, project, require_enroller, AssignmentAccess, EnrollmentReceipt,
    UnblindingDecision,
};
use crate::ports::inbound::BlindingApi;
use crate::ports::outbound::{
    AuditSink, NotificationSink, ParticipantDirectory, StudyStore, SystemTimeSource, TimeSource,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;
use trial_telemetry::{log_integrity_event, log_study_event};

/// Blinding service implementation.
pub struct BlindingService<S, D, N, A, T = SystemTimeSource>
where
    S: StudyStore,
    D: ParticipantDirectory,
    N: NotificationSink,
    A: AuditSink,
    T: TimeSource,
{
    config: BlindingConfig,
    store: Arc<S>,
    directory: Arc<D>,
    notifier: Arc<N>,
    audit_sink: Arc<A>,
    clock: Arc<T>,
    rng: Mutex<StdRng>,
}

impl<S, D, N, A> BlindingService<S, D, N, A, SystemTimeSource>
where
    S: StudyStore,
    D: ParticipantDirectory,
    N: NotificationSink,
    A: AuditSink,
{
    /// Create a service on the system clock.
    pub fn new(
        config: BlindingConfig,
        store: Arc<S>,
        directory: Arc<D>,
        notifier: Arc<N>,
        audit_sink: Arc<A>,
    ) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            store,
            directory,
            notifier,
            audit_sink,
            clock: Arc::new(SystemTimeSource),
            rng: Mutex::new(rng),
        }
    }
}

impl<S, D, N, A, T> BlindingService<S, D, N, A, T>
where
    S: StudyStore,
    D: ParticipantDirectory,
    N: NotificationSink,
    A: AuditSink,
    T: TimeSource,
{
    /// Replace the clock.
    pub fn with_clock<C: TimeSource>(self, clock: Arc<C>) -> BlindingService<S, D, N, A, C> {
        BlindingService {
            config: self.config,
            store: self.store,
            directory: self.directory,
            notifier: self.notifier,
            audit_sink: self.audit_sink,
            clock,
            rng: self.rng,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &BlindingConfig {
        &self.config
    }

    async fn load(&self, study_id: &str) -> BlindingResult<Study> {
        self.store
            .get_study(study_id)
            .await?
            .ok_or_else(|| StoreError::StudyNotFound(study_id.to_string()).into())
    }

    fn retry_allowed(&self, err: &BlindingError, attempt: u32, study_id: &str) -> bool {
        if !err.is_retryable() || attempt >= self.config.max_commit_retries {
            return false;
        }
        log_study_event!(
            warn,
            study_id,
            "Version conflict, retrying commit",
            attempt = attempt + 1,
            max_retries = self.config.max_commit_retries
        );
        true
    }

    /// Run `mutate` on a fresh working copy until it commits.
    async fn commit<V, F>(&self, study_id: &str, actor: &str, mut mutate: F) -> BlindingResult<V>
    where
        V: Send,
        F: FnMut(&mut Study, MutationContext<'_>) -> BlindingResult<Mutation<V>> + Send,
    {
        let mut attempt = 0;
        loop {
            let before = self.load(study_id).await?;
            let mut working = before.clone();
            let ctx = MutationContext::new(actor, self.clock.now());
            let mutation = mutate(&mut working, ctx)?;

            match self.try_commit(&before, working, mutation, ctx).await {
                Err(err) if self.retry_allowed(&err, attempt, study_id) => attempt += 1,
                result => return result,
            }
        }
    }

    /// Append the audit entry, check invariants, store, then publish.
    async fn try_commit<V>(
        &self,
        before: &Study,
        mut working: Study,
        mutation: Mutation<V>,
        ctx: MutationContext<'_>,
    ) -> BlindingResult<V> {
        let Mutation {
            value,
            audit,
            notifications,
            records,
        } = mutation;

        let entry = audit.into_entry(new_id("audit"), ctx.now);
        working.audit_log.push(entry.clone());
        working.version = before.version + 1;
        working.updated_at = ctx.now;

        check_study_invariants(&working)?;
        invariant_single_commit_step(before, &working)?;
        for record in &records {
            if let AggregateRecord::StratumCounts(counts) = record {
                invariant_stratum_balance(counts)?;
            }
        }

        let study_id = working.id.clone();
        let version = working.version;
        self.store
            .update_study(working, before.version, records)
            .await?;

        log_study_event!(
            debug,
            study_id,
            "Committed study mutation",
            action = %entry.action,
            actor = %entry.actor,
            version = version
        );

        self.publish(&study_id, &entry, notifications).await;
        Ok(value)
    }

    async fn publish(
        &self,
        study_id: &str,
        entry: &AuditLogEntry,
        notifications: Vec<Notification>,
    ) {
        if let Err(err) = self.audit_sink.append(study_id, entry).await {
            log_study_event!(warn, study_id, "Audit sink append failed", error = %err);
        }
        for notification in notifications {
            let delivered = self
                .notifier
                .notify(
                    &notification.user_id,
                    &notification.topic,
                    &notification.message,
                    &notification.data,
                )
                .await;
            if let Err(err) = delivered {
                log_study_event!(
                    warn,
                    study_id,
                    "Notification delivery failed",
                    user_id = %notification.user_id,
                    topic = %notification.topic,
                    error = %err
                );
            }
        }
    }

    /// The caller's role, cloned out of the snapshot.
    fn caller_role(study: &Study, actor: &str) -> BlindingResult<StudyRole> {
        study.require_role(actor).map(Clone::clone)
    }

    /// Directory attributes of every active participant.
    async fn population(
        &self,
        study: &Study,
    ) -> BlindingResult<HashMap<ParticipantId, ParticipantAttributes>> {
        let mut population = HashMap::new();
        for participant in study.active_participants() {
            let attributes = self
                .directory
                .get_participant_attributes(&participant.participant_id)
                .await?;
            population.insert(participant.participant_id.clone(), attributes);
        }
        Ok(population)
    }

    async fn enroll_once(
        &self,
        before: &Study,
        participant_id: &str,
        data_partitions: &[String],
        actor: &str,
    ) -> BlindingResult<EnrollmentReceipt> {
        before.ensure_status("enroll participant", |s| s.accepts_enrollment())?;
        require_enroller(before, actor)?;

        let method = before.randomization.method;
        let attributes = match method {
            RandomizationMethod::Stratified | RandomizationMethod::Minimization => {
                self.directory
                    .get_participant_attributes(participant_id)
                    .await?
            }
            _ => ParticipantAttributes::new(),
        };

        let block_sequence = match method {
            RandomizationMethod::Block => match block_position(before) {
                (block_number, slot) if slot > 0 => {
                    self.store
                        .get_block_sequence(&before.id, block_number)
                        .await?
                }
                _ => None,
            },
            _ => None,
        };

        let stratum_counts = match method {
            RandomizationMethod::Stratified => {
                let key = stratum_key(&before.randomization.stratification_factors, &attributes);
                self.store.get_stratum_counts(&before.id, &key).await?
            }
            _ => None,
        };

        let population = match method {
            RandomizationMethod::Minimization => self.population(before).await?,
            _ => HashMap::new(),
        };

        let ctx = MutationContext::new(actor, self.clock.now());
        let input = AssignmentInput {
            participant_id,
            attributes: &attributes,
            block_sequence: block_sequence.as_ref(),
            stratum_counts: stratum_counts.as_ref(),
            population: &population,
            now: ctx.now,
        };
        let assignment = {
            let mut rng = self.rng.lock();
            algorithms::assign(before, &input, &mut *rng)
        }?;

        let mut working = before.clone();
        let mutation = enforcement::enroll_participant(
            &mut working,
            participant_id,
            assignment,
            data_partitions.to_vec(),
            ctx,
        )?;
        self.try_commit(before, working, mutation, ctx).await
    }
}

#[async_trait]
impl<S, D, N, A, T> BlindingApi for BlindingService<S, D, N, A, T>
where
    S: StudyStore,
    D: ParticipantDirectory,
    N: NotificationSink,
    A: AuditSink,
    T: TimeSource,
{
    async fn create_study(
        &self,
        definition: StudyDefinition,
        actor: &str,
    ) -> BlindingResult<Study> {
        let ctx = MutationContext::new(actor, self.clock.now());
        let Mutation {
            value: mut study,
            audit,
            notifications,
            ..
        } = lifecycle::create_study(definition, ctx)?;

        let entry = audit.into_entry(new_id("audit"), ctx.now);
        study.audit_log.push(entry.clone());
        study.version = 1;
        check_study_invariants(&study)?;

        self.store.save_study(study.clone()).await?;
        log_study_event!(
            info,
            study.id,
            "Study created",
            actor = %actor,
            method = study.randomization.method.as_str(),
            arms = study.arms.len()
        );

        self.publish(&study.id, &entry, notifications).await;
        Ok(study)
    }

    async fn add_role(
        &self,
        study_id: &str,
        role: StudyRole,
        actor: &str,
    ) -> BlindingResult<StudyRole> {
        let role = self
            .commit(study_id, actor, |study, ctx| {
                enforcement::add_role(study, role.clone(), ctx)
            })
            .await?;
        log_study_event!(
            info,
            study_id,
            "Role added",
            user_id = %role.user_id,
            access = role.access_level.as_str()
        );
        Ok(role)
    }

    async fn remove_role(
        &self,
        study_id: &str,
        user_id: &str,
        actor: &str,
    ) -> BlindingResult<StudyRole> {
        let role = self
            .commit(study_id, actor, |study, ctx| {
                enforcement::remove_role(study, user_id, ctx)
            })
            .await?;
        log_study_event!(info, study_id, "Role removed", user_id = %role.user_id);
        Ok(role)
    }

    async fn enroll_participant(
        &self,
        study_id: &str,
        participant_id: &str,
        data_partitions: Vec<String>,
        actor: &str,
    ) -> BlindingResult<EnrollmentReceipt> {
        let mut attempt = 0;
        loop {
            let before = self.load(study_id).await?;
            match self
                .enroll_once(&before, participant_id, &data_partitions, actor)
                .await
            {
                Err(err) if self.retry_allowed(&err, attempt, study_id) => attempt += 1,
                Err(err) => return Err(err),
                Ok(receipt) => {
                    log_study_event!(
                        info,
                        study_id,
                        "Participant enrolled",
                        blinded_id = %receipt.blinded_id,
                        method = before.randomization.method.as_str()
                    );
                    return Ok(receipt);
                }
            }
        }
    }

    async fn withdraw_participant(
        &self,
        study_id: &str,
        participant_id: &str,
        reason: &str,
        actor: &str,
    ) -> BlindingResult<BlindedParticipant> {
        let participant = self
            .commit(study_id, actor, |study, ctx| {
                enforcement::withdraw_participant(study, participant_id, reason, ctx)
            })
            .await?;
        log_study_event!(
            info,
            study_id,
            "Participant withdrawn",
            blinded_id = %participant.blinded_id
        );
        Ok(participant)
    }

    async fn transition_status(
        &self,
        study_id: &str,
        target: StudyStatus,
        actor: &str,
    ) -> BlindingResult<StatusTransition> {
        let transition = self
            .commit(study_id, actor, |study, ctx| {
                lifecycle::transition_status(study, target, ctx)
            })
            .await?;
        log_study_event!(
            info,
            study_id,
            "Study status changed",
            from = transition.from.as_str(),
            to = transition.to.as_str(),
            actor = %actor
        );
        Ok(transition)
    }

    async fn get_study_view(&self, study_id: &str, actor: &str) -> BlindingResult<Study> {
        let study = self.load(study_id).await?;
        let role = Self::caller_role(&study, actor)?;
        Ok(project(&study, &role, &self.config.blinded_sentinel))
    }

    async fn get_participant_assignment(
        &self,
        study_id: &str,
        participant_id: &str,
        actor: &str,
    ) -> BlindingResult<AssignmentAccess> {
        let flag_authorized = self.config.flag_authorized_assignment_access;
        let access = self
            .commit(study_id, actor, |study, ctx| {
                enforcement::access_assignment(study, participant_id, flag_authorized, ctx)
            })
            .await?;
        if let Some(breach) = &access.breach {
            log_integrity_event!(
                warn,
                study_id,
                "Assignment accessed without unblinding approval",
                participant_id,
                actor = %actor,
                breach_id = %breach.id
            );
        }
        Ok(access)
    }

    async fn request_emergency_unblinding(
        &self,
        study_id: &str,
        participant_id: &str,
        reason: &str,
        actor: &str,
    ) -> BlindingResult<UnblindingDecision> {
        let decision = self
            .commit(study_id, actor, |study, ctx| {
                enforcement::request_emergency_unblinding(study, participant_id, reason, ctx)
            })
            .await?;
        log_integrity_event!(
            warn,
            study_id,
            "Emergency unblinding requested",
            participant_id,
            actor = %actor,
            auto_approved = decision.request.status == ApprovalStatus::Approved
        );
        Ok(decision)
    }

    async fn resolve_emergency_unblinding(
        &self,
        study_id: &str,
        request_id: &str,
        approved: bool,
        denial_reason: Option<&str>,
        actor: &str,
    ) -> BlindingResult<UnblindingDecision> {
        let decision = self
            .commit(study_id, actor, |study, ctx| {
                enforcement::resolve_emergency_unblinding(
                    study,
                    request_id,
                    approved,
                    denial_reason,
                    ctx,
                )
            })
            .await?;
        log_integrity_event!(
            warn,
            study_id,
            "Emergency unblinding resolved",
            decision.request.participant_id,
            actor = %actor,
            approved = approved
        );
        Ok(decision)
    }

    async fn list_pending_unblinding_requests(
        &self,
        study_id: &str,
        actor: &str,
    ) -> BlindingResult<Vec<UnblindingRequest>> {
        let study = self.load(study_id).await?;
        let role = Self::caller_role(&study, actor)?;
        if !role.can_unblind {
            return Err(BlindingError::permission(&study.id, actor, "can_unblind"));
        }
        Ok(study
            .unblinding_requests
            .into_iter()
            .filter(|r| r.status == ApprovalStatus::Pending)
            .collect())
    }

    async fn register_breach(
        &self,
        study_id: &str,
        report: BreachReport,
        actor: &str,
    ) -> BlindingResult<Breach> {
        let breach = self
            .commit(study_id, actor, |study, ctx| {
                enforcement::register_breach(study, report.clone(), ctx)
            })
            .await?;
        log_study_event!(
            warn,
            study_id,
            "Breach registered",
            breach_id = %breach.id,
            severity = ?breach.severity,
            reported_by = %actor
        );
        Ok(breach)
    }

    async fn resolve_breach(
        &self,
        study_id: &str,
        breach_id: &str,
        action_taken: &str,
        actor: &str,
    ) -> BlindingResult<Breach> {
        let breach = self
            .commit(study_id, actor, |study, ctx| {
                enforcement::resolve_breach(study, breach_id, action_taken, ctx)
            })
            .await?;
        log_study_event!(info, study_id, "Breach resolved", breach_id = %breach.id);
        Ok(breach)
    }

    async fn compute_integrity(
        &self,
        study_id: &str,
        actor: &str,
    ) -> BlindingResult<IntegrityReport> {
        let study = self.load(study_id).await?;
        let role = Self::caller_role(&study, actor)?;
        if role.access_level == AccessLevel::MetadataOnly {
            return Err(BlindingError::permission(
                &study.id,
                actor,
                AccessLevel::AggregatedOnly.as_str(),
            ));
        }
        let report = compute_integrity(&study, self.config.repeated_access_threshold);
        log_study_event!(
            debug,
            study_id,
            "Integrity computed",
            score = report.score,
            potential_breaches = report.potential_breaches
        );
        Ok(report)
    }

    async fn get_audit_log(
        &self,
        study_id: &str,
        actor: &str,
    ) -> BlindingResult<Vec<AuditLogEntry>> {
        Ok(self.get_study_view(study_id, actor).await?.audit_log)
    }
}
