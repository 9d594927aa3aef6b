//! Reporting over a trailing period ending now.

use crate::domain::{
    percent, AttendantPerformance, AttendantsReport, ConversationStatus, DomainError, HourCount,
    HourlyVolumeReport, OverviewNumbers, OverviewReport, ReportPeriod, StatusShare,
};
use crate::ports::ReportRepo;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub struct ReportService {
    repo: Arc<dyn ReportRepo>,
}

fn window(period: ReportPeriod, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (now - Duration::days(period.days()), now)
}

/// Percent change from `previous` to `current`. Growth from zero counts as 100.
fn change(current: i64, previous: i64) -> i64 {
    if previous == 0 {
        if current > 0 { 100 } else { 0 }
    } else {
        percent(current - previous, previous)
    }
}

impl ReportService {
    pub fn new(repo: Arc<dyn ReportRepo>) -> Self {
        Self { repo }
    }

    pub async fn overview(
        &self,
        tenant_id: &str,
        period: ReportPeriod,
    ) -> Result<OverviewReport, DomainError> {
        let (from, to) = window(period, Utc::now());
        let previous_from = from - Duration::days(period.days());

        let total = self.repo.count_conversations_created(tenant_id, from, to).await?;
        let previous = self
            .repo
            .count_conversations_created(tenant_id, previous_from, from)
            .await?;
        let by_status = self
            .repo
            .conversations_by_status_created(tenant_id, from, to)
            .await?;
        let closed: i64 = by_status
            .iter()
            .filter(|s| s.status == ConversationStatus::Closed)
            .map(|s| s.count)
            .sum();
        let average_resolution_minutes = self
            .repo
            .average_resolution_minutes(tenant_id, from, to)
            .await?;
        let attendants = self.repo.attendant_totals(tenant_id, from, to).await?;

        Ok(OverviewReport {
            period,
            overview: OverviewNumbers {
                total_conversations: total,
                conversations_change: change(total, previous),
                average_resolution_minutes,
                resolution_rate: percent(closed, total),
                active_attendants: attendants.iter().filter(|a| a.conversations > 0).count() as i64,
                total_attendants: attendants.len() as i64,
            },
            status_breakdown: by_status
                .into_iter()
                .map(|s| StatusShare {
                    status: s.status,
                    count: s.count,
                    percentage: percent(s.count, total),
                })
                .collect(),
        })
    }

    /// Attendants ordered by conversations handled, busiest first.
    pub async fn attendants(
        &self,
        tenant_id: &str,
        period: ReportPeriod,
    ) -> Result<AttendantsReport, DomainError> {
        let (from, to) = window(period, Utc::now());
        let mut attendants: Vec<AttendantPerformance> = self
            .repo
            .attendant_totals(tenant_id, from, to)
            .await?
            .into_iter()
            .map(|t| AttendantPerformance {
                id: t.user.id,
                name: t.user.name,
                email: t.user.email,
                conversations_count: t.conversations,
                resolved_count: t.resolved,
                resolution_rate: percent(t.resolved, t.conversations),
            })
            .collect();
        attendants.sort_by(|a, b| {
            b.conversations_count
                .cmp(&a.conversations_count)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(AttendantsReport { period, attendants })
    }

    /// Inbound messages per UTC hour of day, all 24 hours present.
    pub async fn hourly_volume(
        &self,
        tenant_id: &str,
        period: ReportPeriod,
    ) -> Result<HourlyVolumeReport, DomainError> {
        let (from, to) = window(period, Utc::now());
        let counts = self.repo.inbound_by_hour(tenant_id, from, to).await?;
        let hourly_volume = (0..24u32)
            .map(|hour| HourCount {
                hour,
                count: counts
                    .iter()
                    .find(|(h, _)| *h == hour)
                    .map(|(_, c)| *c)
                    .unwrap_or(0),
            })
            .collect();
        Ok(HourlyVolumeReport {
            period,
            hourly_volume,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::sqlite_repo::test_support::{repo, seeded_tenant};
    use crate::domain::{
        Channel, Contact, Conversation, Message, MessageDirection, MessageMetadata, MessageStatus,
        MessageType, Priority, Role, User, UserStatus,
    };
    use crate::ports::{ContactRepo, ConversationRepo, MessageRepo, UserRepo};

    #[test]
    fn change_handles_empty_previous_period() {
        assert_eq!(change(0, 0), 0);
        assert_eq!(change(5, 0), 100);
        assert_eq!(change(15, 10), 50);
        assert_eq!(change(5, 10), -50);
    }

    #[tokio::test]
    async fn reports_cover_the_period() {
        let (_dir, repo) = repo().await;
        let t = seeded_tenant(&repo, "hotel-rep").await;
        let now = Utc::now();

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: t.id.clone(),
            name: "Rita".into(),
            email: "rita@hotel.test".into(),
            role: Role::Attendant,
            status: UserStatus::Active,
            created_at: now,
        };
        repo.create_user(&user).await.unwrap();
        let idle = User {
            id: uuid::Uuid::new_v4().to_string(),
            name: "Beto".into(),
            email: "beto@hotel.test".into(),
            ..user.clone()
        };
        repo.create_user(&idle).await.unwrap();

        let contact = Contact {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: t.id.clone(),
            channel: Channel::WhatsApp,
            external_id: "5511911112222".into(),
            phone_number: Some("5511911112222".into()),
            name: None,
            email: None,
            profile_picture_url: None,
            organization_id: None,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
            conversations_count: 0,
            last_conversation_at: None,
        };
        repo.create_contact(&contact).await.unwrap();

        let conversation = |status: ConversationStatus, age_days: i64| {
            let created = now - Duration::days(age_days);
            Conversation {
                id: uuid::Uuid::new_v4().to_string(),
                tenant_id: t.id.clone(),
                contact_id: contact.id.clone(),
                channel: Channel::WhatsApp,
                status,
                priority: Priority::Medium,
                assigned_to_id: Some(user.id.clone()),
                ia_locked: false,
                last_message_at: created,
                closed_at: (status == ConversationStatus::Closed)
                    .then(|| created + Duration::minutes(30)),
                created_at: created,
                tag_ids: Vec::new(),
            }
        };
        let closed = conversation(ConversationStatus::Closed, 1);
        repo.create_conversation(&closed).await.unwrap();
        repo.create_conversation(&conversation(ConversationStatus::Open, 2))
            .await
            .unwrap();
        repo.create_conversation(&conversation(ConversationStatus::Closed, 10))
            .await
            .unwrap();

        let at_nine = (now - Duration::days(1))
            .date_naive()
            .and_hms_opt(9, 15, 0)
            .unwrap()
            .and_utc();
        repo.create_message(&Message {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: t.id.clone(),
            conversation_id: closed.id.clone(),
            external_id: Some("wamid.r1".into()),
            direction: MessageDirection::Inbound,
            message_type: MessageType::Text,
            content: "Oi".into(),
            metadata: MessageMetadata::default(),
            status: MessageStatus::Received,
            timestamp: at_nine,
        })
        .await
        .unwrap();

        let repo = Arc::new(repo);
        let svc = ReportService::new(repo);

        let week = svc.overview(&t.id, ReportPeriod::Week).await.unwrap();
        assert_eq!(week.overview.total_conversations, 2);
        assert_eq!(week.overview.resolution_rate, 50);
        assert_eq!(week.overview.average_resolution_minutes, 30);
        assert_eq!(week.overview.conversations_change, 100);
        assert_eq!(week.overview.total_attendants, 2);
        assert_eq!(week.overview.active_attendants, 1);

        let month = svc.overview(&t.id, ReportPeriod::Month).await.unwrap();
        assert_eq!(month.overview.total_conversations, 3);

        let people = svc.attendants(&t.id, ReportPeriod::Week).await.unwrap();
        assert_eq!(people.attendants[0].name, "Rita");
        assert_eq!(people.attendants[0].conversations_count, 2);
        assert_eq!(people.attendants[0].resolution_rate, 50);
        assert_eq!(people.attendants[1].conversations_count, 0);

        let hourly = svc.hourly_volume(&t.id, ReportPeriod::Week).await.unwrap();
        assert_eq!(hourly.hourly_volume.len(), 24);
        assert_eq!(hourly.hourly_volume[9].count, 1);
        assert_eq!(hourly.hourly_volume.iter().map(|h| h.count).sum::<i64>(), 1);
    }
}
