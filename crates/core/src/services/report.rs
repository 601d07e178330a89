//! Admin statistics and CSV export.

use admissions_common::{AppError, AppResult};
use admissions_db::{
    entities::{
        application::{self, ApplicationStatus},
        user::{self, SettlementSite},
    },
    repositories::{ApplicationFilter, ApplicationRepository},
};
use chrono::{DateTime, FixedOffset, Months, Utc};
use serde::Serialize;

use super::{
    audit::{AuditEntry, AuditService, RequestMeta, actions},
    review::ApplicationWithApplicant,
};

/// Column headers of the applications export.
pub const EXPORT_HEADERS: [&str; 19] = [
    "Application Number",
    "Status",
    "First Name",
    "Last Name",
    "Email",
    "Phone",
    "Gender",
    "Date of Birth",
    "Nationality",
    "Settlement Site",
    "Refugee ID",
    "Program",
    "Department",
    "Academic Year",
    "Semester",
    "Disability Status",
    "Disability Type",
    "Submitted At",
    "Reviewed At",
];

const RECENT_LIMIT: u64 = 5;

/// Application counts per status.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub submitted: u64,
    pub under_review: u64,
    pub approved: u64,
    pub rejected: u64,
    pub waitlisted: u64,
    pub draft: u64,
}

impl StatusCounts {
    fn set(&mut self, status: ApplicationStatus, count: u64) {
        match status {
            ApplicationStatus::Draft => self.draft = count,
            ApplicationStatus::Submitted => self.submitted = count,
            ApplicationStatus::UnderReview => self.under_review = count,
            ApplicationStatus::Approved => self.approved = count,
            ApplicationStatus::Rejected => self.rejected = count,
            ApplicationStatus::Waitlisted => self.waitlisted = count,
        }
    }
}

/// Application counts per settlement site of the applicant.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementCounts {
    pub rwamwanja: u64,
    pub kyangwali: u64,
    pub nakivale: u64,
}

/// Dashboard statistics.
#[derive(Debug, Clone)]
pub struct ApplicationStats {
    pub total_applications: u64,
    pub by_status: StatusCounts,
    pub by_settlement_site: SettlementCounts,
    pub last_month_applications: u64,
    pub recent_applications: Vec<ApplicationWithApplicant>,
}

/// A rendered CSV export.
#[derive(Debug, Clone)]
pub struct CsvExport {
    pub file_name: &'static str,
    pub body: Vec<u8>,
    pub rows: usize,
}

fn timestamp(value: Option<DateTime<FixedOffset>>) -> String {
    value.map(|t| t.to_rfc3339()).unwrap_or_default()
}

/// One export line for an application and its owner.
#[must_use]
pub fn export_record(app: &application::Model, owner: Option<&user::Model>) -> Vec<String> {
    let text = |value: Option<&String>| value.cloned().unwrap_or_default();

    vec![
        app.application_number.clone(),
        app.status.as_str().to_string(),
        owner.map(|u| u.first_name.clone()).unwrap_or_default(),
        owner.map(|u| u.last_name.clone()).unwrap_or_default(),
        owner.map(|u| u.email.clone()).unwrap_or_default(),
        text(owner.and_then(|u| u.phone.as_ref())),
        owner
            .and_then(|u| u.gender.as_ref())
            .map(|g| g.as_str().to_string())
            .unwrap_or_default(),
        owner
            .and_then(|u| u.date_of_birth)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        text(owner.and_then(|u| u.nationality.as_ref())),
        owner
            .map(|u| u.settlement_site.as_str().to_string())
            .unwrap_or_default(),
        text(owner.and_then(|u| u.refugee_id.as_ref())),
        text(app.program.as_ref()),
        text(app.department.as_ref()),
        text(app.academic_year.as_ref()),
        text(app.semester.as_ref()),
        if app.disability_status { "Yes" } else { "No" }.to_string(),
        text(app.disability_type.as_ref()),
        timestamp(app.submitted_at),
        timestamp(app.reviewed_at),
    ]
}

/// Report service.
#[derive(Clone)]
pub struct ReportService {
    application_repo: ApplicationRepository,
    audit: AuditService,
}

impl ReportService {
    /// Create a new report service.
    #[must_use]
    pub const fn new(application_repo: ApplicationRepository, audit: AuditService) -> Self {
        Self {
            application_repo,
            audit,
        }
    }

    /// Counts for the admin dashboard.
    pub async fn stats(&self) -> AppResult<ApplicationStats> {
        let total_applications = self
            .application_repo
            .count(&ApplicationFilter::default())
            .await?;

        let mut by_status = StatusCounts::default();
        for status in [
            ApplicationStatus::Submitted,
            ApplicationStatus::UnderReview,
            ApplicationStatus::Approved,
            ApplicationStatus::Rejected,
            ApplicationStatus::Waitlisted,
            ApplicationStatus::Draft,
        ] {
            let filter = ApplicationFilter {
                status: Some(status),
                ..ApplicationFilter::default()
            };
            by_status.set(status, self.application_repo.count(&filter).await?);
        }

        let mut by_settlement_site = SettlementCounts::default();
        for (site, slot) in [
            (SettlementSite::Rwamwanja, &mut by_settlement_site.rwamwanja),
            (SettlementSite::Kyangwali, &mut by_settlement_site.kyangwali),
            (SettlementSite::Nakivale, &mut by_settlement_site.nakivale),
        ] {
            let filter = ApplicationFilter {
                settlement_site: Some(site),
                ..ApplicationFilter::default()
            };
            *slot = self.application_repo.count(&filter).await?;
        }

        let now = Utc::now();
        let month_ago = now.checked_sub_months(Months::new(1)).unwrap_or(now);
        let last_month_applications = self.application_repo.count_created_since(month_ago).await?;

        let recent_applications = self
            .application_repo
            .search(&ApplicationFilter::default(), 0, Some(RECENT_LIMIT))
            .await?
            .into_iter()
            .map(|(application, applicant)| ApplicationWithApplicant {
                application,
                applicant,
            })
            .collect();

        Ok(ApplicationStats {
            total_applications,
            by_status,
            by_settlement_site,
            last_month_applications,
            recent_applications,
        })
    }

    /// Render matching applications as CSV.
    pub async fn export_csv(
        &self,
        filter: &ApplicationFilter,
        actor_id: &str,
        meta: &RequestMeta,
    ) -> AppResult<CsvExport> {
        let rows = self.application_repo.search(filter, 0, None).await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(EXPORT_HEADERS).map_err(csv_error)?;
        for (app, owner) in &rows {
            writer
                .write_record(export_record(app, owner.as_ref()))
                .map_err(csv_error)?;
        }
        let body = writer
            .into_inner()
            .map_err(|e| AppError::Internal(format!("Failed to finish CSV: {e}")))?;

        self.audit
            .record_detached(
                AuditEntry::new(
                    Some(actor_id),
                    actions::EXPORT_APPLICATIONS,
                    "Application",
                    None,
                    "Exported applications to CSV",
                ),
                meta,
            )
            .await;

        tracing::info!(rows = rows.len(), "Applications exported");
        Ok(CsvExport {
            file_name: "applications.csv",
            body,
            rows: rows.len(),
        })
    }
}

fn csv_error(e: csv::Error) -> AppError {
    AppError::Internal(format!("Failed to write CSV: {e}"))
}
