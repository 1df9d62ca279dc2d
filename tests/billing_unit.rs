use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use renderiq::billing::{credit_cost, period_end, renewal_due};
use renderiq::limits::{LimitType, PlanLimits};
use renderiq::models::{Quality, RenderSettings, RenderType, SubscriptionPlan};

fn settings(quality: Quality, duration: Option<u32>) -> RenderSettings {
    RenderSettings {
        quality,
        duration,
        ..RenderSettings::default()
    }
}

fn plan(name: &str, max_projects: Option<i32>) -> SubscriptionPlan {
    SubscriptionPlan {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
        price: "999.00".to_string(),
        currency: "INR".to_string(),
        interval: "month".to_string(),
        credits_per_month: 100,
        max_projects,
        max_renders_per_project: None,
        razorpay_plan_id: None,
    }
}

#[test]
fn image_cost_depends_on_quality_and_outputs() {
    assert_eq!(credit_cost(RenderType::Image, &settings(Quality::Standard, None), 1), 6);
    assert_eq!(credit_cost(RenderType::Image, &settings(Quality::High, None), 1), 6);
    assert_eq!(credit_cost(RenderType::Image, &settings(Quality::Ultra, None), 1), 10);
    assert_eq!(credit_cost(RenderType::Image, &settings(Quality::Standard, None), 4), 24);
    assert_eq!(credit_cost(RenderType::Image, &settings(Quality::Standard, None), 0), 6);
}

#[test]
fn video_cost_scales_with_duration() {
    assert_eq!(credit_cost(RenderType::Video, &settings(Quality::Standard, None), 1), 30);
    assert_eq!(credit_cost(RenderType::Video, &settings(Quality::Standard, Some(8)), 1), 48);
    assert_eq!(credit_cost(RenderType::Video, &settings(Quality::Standard, Some(0)), 1), 6);
}

#[test]
fn billing_periods_follow_calendar_months() {
    let start = Utc.with_ymd_and_hms(2025, 1, 31, 12, 0, 0).unwrap();
    assert_eq!(period_end(start, "month"), Utc.with_ymd_and_hms(2025, 2, 28, 12, 0, 0).unwrap());
    assert_eq!(period_end(start, "year"), Utc.with_ymd_and_hms(2026, 1, 31, 12, 0, 0).unwrap());
}

#[test]
fn renewal_waits_until_the_period_is_nearly_over() {
    let now = Utc::now();
    assert!(renewal_due(now - Duration::days(1), now));
    assert!(renewal_due(now + Duration::hours(23), now));
    assert!(!renewal_due(now + Duration::days(29), now));
}

#[test]
fn free_tier_limits() {
    let free = PlanLimits::free();

    let check = free.check_projects(2);
    assert!(check.allowed);
    assert_eq!(check.limit, Some(3));

    let check = free.check_projects(3);
    assert!(!check.allowed);
    assert_eq!(check.limit_type, LimitType::Projects);
    assert!(check.error.unwrap().contains("limit of 3 projects"));

    assert!(!free.check_renders_per_project(5).allowed);
    assert!(free.check_quality(Quality::Standard).allowed);
    assert!(!free.check_quality(Quality::High).allowed);
    assert!(!free.check_video().allowed);
    assert!(!free.check_api().allowed);
}

#[test]
fn plan_names_unlock_features() {
    let pro = PlanLimits::for_plan(&plan("Pro", None));
    assert!(pro.check_projects(1_000).allowed);
    assert_eq!(pro.check_projects(1_000).limit, None);
    assert!(pro.check_quality(Quality::High).allowed);
    assert!(!pro.check_quality(Quality::Ultra).allowed);
    assert!(pro.check_video().allowed);
    assert!(!pro.check_api().allowed);

    let enterprise = PlanLimits::for_plan(&plan("Enterprise Annual", Some(50)));
    assert!(enterprise.check_quality(Quality::Ultra).allowed);
    assert!(enterprise.check_api().allowed);
    assert!(!enterprise.check_projects(50).allowed);
}

#[test]
fn credit_check_reports_shortfall() {
    let check = PlanLimits::free().check_credits(4, 6);
    assert!(!check.allowed);
    assert_eq!(check.current, 4);
    assert_eq!(
        check.error.as_deref(),
        Some("Insufficient credits. You need 6 credits but only have 4. Upgrade to get more credits.")
    );

    let json = serde_json::to_value(PlanLimits::free().check_credits(10, 6)).unwrap();
    assert_eq!(json["limitType"], "credits");
    assert!(json.get("error").is_none());
}
