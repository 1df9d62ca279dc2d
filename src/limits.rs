// src/limits.rs

use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db;
use crate::models::{Quality, SubscriptionPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LimitType {
    Projects,
    RendersPerProject,
    Credits,
    Quality,
    Video,
    Api,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LimitCheck {
    pub allowed: bool,
    pub limit_type: LimitType,
    pub current: i64,
    /// `None` means unlimited.
    pub limit: Option<i64>,
    pub plan_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanLimits {
    pub plan_name: String,
    pub max_projects: Option<i64>,
    pub max_renders_per_project: Option<i64>,
    pub credits_per_month: i64,
    pub allows_high_quality: bool,
    pub allows_ultra_quality: bool,
    pub allows_video: bool,
    pub allows_api: bool,
}

const PRO_TIER: &[&str] = &["Pro", "Pro Annual", "Enterprise", "Enterprise Annual"];
const ENTERPRISE_TIER: &[&str] = &["Enterprise", "Enterprise Annual"];

impl PlanLimits {
    pub fn free() -> Self {
        PlanLimits {
            plan_name: "Free".to_string(),
            max_projects: Some(3),
            max_renders_per_project: Some(5),
            credits_per_month: 10,
            allows_high_quality: false,
            allows_ultra_quality: false,
            allows_video: false,
            allows_api: false,
        }
    }

    pub fn for_plan(plan: &SubscriptionPlan) -> Self {
        let name = plan.name.as_str();
        PlanLimits {
            plan_name: plan.name.clone(),
            max_projects: plan.max_projects.map(i64::from),
            max_renders_per_project: plan.max_renders_per_project.map(i64::from),
            credits_per_month: i64::from(plan.credits_per_month),
            allows_high_quality: PRO_TIER.contains(&name),
            allows_ultra_quality: ENTERPRISE_TIER.contains(&name),
            allows_video: PRO_TIER.contains(&name),
            allows_api: ENTERPRISE_TIER.contains(&name),
        }
    }

    pub fn check_projects(&self, current: i64) -> LimitCheck {
        self.check_count(LimitType::Projects, current, self.max_projects, |max| {
            format!("You've reached the limit of {max} projects. Upgrade to create more projects.")
        })
    }

    pub fn check_renders_per_project(&self, current: i64) -> LimitCheck {
        self.check_count(LimitType::RendersPerProject, current, self.max_renders_per_project, |max| {
            format!("You've reached the limit of {max} renders per project. Upgrade to create more renders.")
        })
    }

    fn check_count(
        &self,
        limit_type: LimitType,
        current: i64,
        max: Option<i64>,
        message: impl FnOnce(i64) -> String,
    ) -> LimitCheck {
        let Some(max) = max else {
            return self.result(limit_type, true, current, None, None);
        };
        let allowed = current < max;
        let error = (!allowed).then(|| message(max));
        self.result(limit_type, allowed, current, Some(max), error)
    }

    pub fn check_quality(&self, quality: Quality) -> LimitCheck {
        let error = match quality {
            Quality::High if !self.allows_high_quality => Some(
                "High quality renders are only available on Pro plans and above. Upgrade to access high quality renders.",
            ),
            Quality::Ultra if !self.allows_ultra_quality => Some(
                "Ultra quality renders are only available on Enterprise plans. Upgrade to access ultra quality renders.",
            ),
            _ => None,
        };
        let level = match quality {
            Quality::Standard => 1,
            Quality::High => 2,
            Quality::Ultra => 3,
        };
        let max_level = if self.allows_ultra_quality {
            3
        } else if self.allows_high_quality {
            2
        } else {
            1
        };
        self.result(
            LimitType::Quality,
            error.is_none(),
            level,
            Some(max_level),
            error.map(str::to_string),
        )
    }

    pub fn check_video(&self) -> LimitCheck {
        self.check_feature(
            LimitType::Video,
            self.allows_video,
            "Video generation is only available on Pro plans and above. Upgrade to generate videos.",
        )
    }

    pub fn check_api(&self) -> LimitCheck {
        self.check_feature(
            LimitType::Api,
            self.allows_api,
            "API access is only available on Enterprise plans. Upgrade to access the API.",
        )
    }

    fn check_feature(&self, limit_type: LimitType, allowed: bool, message: &str) -> LimitCheck {
        self.result(
            limit_type,
            allowed,
            i64::from(allowed),
            if allowed { None } else { Some(0) },
            (!allowed).then(|| message.to_string()),
        )
    }

    pub fn check_credits(&self, balance: i64, required: i64) -> LimitCheck {
        let allowed = balance >= required;
        let error = (!allowed).then(|| {
            format!(
                "Insufficient credits. You need {required} credits but only have {balance}. Upgrade to get more credits."
            )
        });
        self.result(
            LimitType::Credits,
            allowed,
            balance,
            Some(self.credits_per_month),
            error,
        )
    }

    fn result(
        &self,
        limit_type: LimitType,
        allowed: bool,
        current: i64,
        limit: Option<i64>,
        error: Option<String>,
    ) -> LimitCheck {
        LimitCheck {
            allowed,
            limit_type,
            current,
            limit,
            plan_name: self.plan_name.clone(),
            error,
        }
    }
}

/// Limits of the user's active plan, or the free tier.
pub async fn plan_limits(pool: &PgPool, user_id: Uuid) -> Result<PlanLimits, sqlx::Error> {
    Ok(match db::billing::get_active_subscription(pool, user_id).await? {
        Some((_, plan)) => PlanLimits::for_plan(&plan),
        None => PlanLimits::free(),
    })
}

pub async fn check_project_limit(pool: &PgPool, user_id: Uuid) -> Result<LimitCheck, sqlx::Error> {
    let limits = plan_limits(pool, user_id).await?;
    if limits.max_projects.is_none() {
        return Ok(limits.check_projects(0));
    }
    let current = db::projects::count_projects(pool, user_id).await?;
    Ok(limits.check_projects(current))
}

/// Project count read on `conn`, where the caller holds the user row lock.
pub async fn check_project_limit_locked(
    conn: &mut PgConnection,
    limits: &PlanLimits,
    user_id: Uuid,
) -> Result<LimitCheck, sqlx::Error> {
    if limits.max_projects.is_none() {
        return Ok(limits.check_projects(0));
    }
    let current = db::projects::count_projects(conn, user_id).await?;
    Ok(limits.check_projects(current))
}

pub async fn check_render_limit(pool: &PgPool, user_id: Uuid, project_id: Uuid) -> Result<LimitCheck, sqlx::Error> {
    let limits = plan_limits(pool, user_id).await?;
    if limits.max_renders_per_project.is_none() {
        return Ok(limits.check_renders_per_project(0));
    }
    let current = db::renders::count_renders_in_project(pool, project_id).await?;
    Ok(limits.check_renders_per_project(current))
}

/// Render count read on `conn`, where the caller holds the project row lock.
pub async fn check_render_limit_locked(
    conn: &mut PgConnection,
    limits: &PlanLimits,
    project_id: Uuid,
) -> Result<LimitCheck, sqlx::Error> {
    if limits.max_renders_per_project.is_none() {
        return Ok(limits.check_renders_per_project(0));
    }
    let current = db::renders::count_renders_in_project(conn, project_id).await?;
    Ok(limits.check_renders_per_project(current))
}

pub async fn check_credits_limit(pool: &PgPool, user_id: Uuid, required: i64) -> Result<LimitCheck, sqlx::Error> {
    let limits = plan_limits(pool, user_id).await?;
    let balance = db::billing::get_credit_account(pool, user_id)
        .await?
        .map(|a| i64::from(a.balance))
        .unwrap_or(0);
    Ok(limits.check_credits(balance, required))
}
