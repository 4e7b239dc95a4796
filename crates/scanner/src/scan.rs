//! Weekly delinquency scan.
//!
//! Walks environments → tenants → members → pending monthly fees, transitions
//! overdue fees to `late`, and enqueues one reminder notification per affected
//! member that has at least one delivery token.
//!
//! The month/year snapshot is taken once at job start; every comparison in the
//! run uses that snapshot. Re-runs are idempotent because the fee query
//! filters on `status = 'pending'` and the update is a compare-and-set on the
//! same status, so an already-`late` fee is excluded from all future passes.
//!
//! Errors propagate and abort the remainder of the run. The status filter
//! keeps a partial run safe: whatever was transitioned stays transitioned,
//! and the next run resumes over the records still pending.

use chrono::{Datelike, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{FeeStatus, Member, MonthlyFee, QueueStatus, Tenant};

/// Counts reported by one scan run, for the completion log marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub tenants_scanned: u32,
    pub fees_marked_late: u32,
    pub notifications_enqueued: u32,
}

/// A fee is overdue when its billing period lies strictly before the current
/// month. A fee for the current month/year is never overdue, regardless of
/// day-of-month.
pub fn is_overdue(fee_year: i32, fee_month: i32, current_year: i32, current_month: i32) -> bool {
    fee_year < current_year || (fee_year == current_year && fee_month < current_month)
}

/// Title and body for an overdue-fee reminder.
pub fn reminder_copy(first_name: &str, month: i32, year: i32) -> (String, String) {
    (
        "Monthly fee overdue".to_string(),
        format!(
            "Hi {first_name}, your condo fee for {month:02}/{year} is overdue. \
             Please settle it with your building administration."
        ),
    )
}

/// Structured payload marking the notification as a finance reminder.
pub fn reminder_data(month: i32, year: i32) -> serde_json::Value {
    json!({
        "category": "fee",
        "kind": "finance_reminder",
        "month": month.to_string(),
        "year": year.to_string(),
    })
}

/// Scheduled scanner over the multi-tenant fee hierarchy.
pub struct DelinquencyScanner {
    pool: PgPool,
    environments: Vec<String>,
}

impl DelinquencyScanner {
    pub fn new(pool: PgPool, environments: Vec<String>) -> Self {
        Self { pool, environments }
    }

    /// Run one full scan. Reads are fully materialized per level before
    /// iterating — no pagination at this scale.
    pub async fn run_scan(&self) -> Result<ScanSummary, AppError> {
        let now = Utc::now();
        let current_month = now.month() as i32;
        let current_year = now.year();

        tracing::info!(current_month, current_year, "Delinquency scan started");

        let mut summary = ScanSummary::default();

        for env in &self.environments {
            let tenants: Vec<Tenant> = sqlx::query_as("SELECT * FROM tenants WHERE env = $1")
                .bind(env)
                .fetch_all(&self.pool)
                .await?;

            for tenant in &tenants {
                summary.tenants_scanned += 1;

                let members: Vec<Member> =
                    sqlx::query_as("SELECT * FROM members WHERE tenant_id = $1")
                        .bind(tenant.id)
                        .fetch_all(&self.pool)
                        .await?;

                for member in &members {
                    let fees: Vec<MonthlyFee> = sqlx::query_as(
                        "SELECT * FROM monthly_fees WHERE member_id = $1 AND status = $2",
                    )
                    .bind(member.id)
                    .bind(FeeStatus::Pending.to_string())
                    .fetch_all(&self.pool)
                    .await?;

                    for fee in &fees {
                        if !is_overdue(fee.year, fee.month, current_year, current_month) {
                            continue;
                        }

                        self.mark_late(fee.id).await?;
                        summary.fees_marked_late += 1;

                        tracing::info!(
                            tenant_id = %tenant.id,
                            member_id = %member.id,
                            fee_id = %fee.id,
                            month = fee.month,
                            year = fee.year,
                            "Fee marked late"
                        );

                        if member.fcm_tokens.is_empty() {
                            continue;
                        }

                        self.enqueue_reminder(env, tenant, member, fee).await?;
                        summary.notifications_enqueued += 1;
                    }
                }
            }
        }

        tracing::info!(
            tenants = summary.tenants_scanned,
            fees_marked_late = summary.fees_marked_late,
            notifications_enqueued = summary.notifications_enqueued,
            "Delinquency scan completed"
        );

        Ok(summary)
    }

    /// Compare-and-set `pending -> late` with a server-assigned timestamp.
    async fn mark_late(&self, fee_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE monthly_fees SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
        )
        .bind(FeeStatus::Late.to_string())
        .bind(fee_id)
        .bind(FeeStatus::Pending.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Enqueue one reminder notification addressed to the member's tokens.
    async fn enqueue_reminder(
        &self,
        env: &str,
        tenant: &Tenant,
        member: &Member,
        fee: &MonthlyFee,
    ) -> Result<(), AppError> {
        let (title, body) = reminder_copy(member.first_name(), fee.month, fee.year);

        sqlx::query(
            r#"
            INSERT INTO notifications_queue (id, title, body, data, tokens, status, tenant_id, env, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&title)
        .bind(&body)
        .bind(reminder_data(fee.month, fee.year))
        .bind(&member.fcm_tokens)
        .bind(QueueStatus::Pending.to_string())
        .bind(tenant.id.to_string())
        .bind(env)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overdue_previous_year() {
        assert!(is_overdue(2023, 12, 2024, 1));
        assert!(is_overdue(2023, 1, 2024, 6));
    }

    #[test]
    fn test_overdue_earlier_month_same_year() {
        assert!(is_overdue(2024, 3, 2024, 6));
        assert!(is_overdue(2024, 5, 2024, 6));
    }

    #[test]
    fn test_current_month_is_never_overdue() {
        assert!(!is_overdue(2024, 6, 2024, 6));
    }

    #[test]
    fn test_future_fee_is_not_overdue() {
        assert!(!is_overdue(2024, 7, 2024, 6));
        assert!(!is_overdue(2025, 1, 2024, 6));
    }

    #[test]
    fn test_reminder_copy_mentions_name_and_period() {
        let (title, body) = reminder_copy("Maria", 3, 2024);
        assert_eq!(title, "Monthly fee overdue");
        assert!(body.contains("Maria"));
        assert!(body.contains("03/2024"));
    }

    #[test]
    fn test_reminder_data_is_a_fee_category_payload() {
        let data = reminder_data(3, 2024);
        assert_eq!(data["category"], "fee");
        assert_eq!(data["kind"], "finance_reminder");
        assert_eq!(data["month"], "3");
        assert_eq!(data["year"], "2024");
    }
}
