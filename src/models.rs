// src/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} value: {other}", stringify!($name))),
                }
            }
        }
    };
}

string_enum!(RenderStatus {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
});

string_enum!(RenderType {
    Image => "image",
    Video => "video",
});

string_enum!(Quality {
    Standard => "standard",
    High => "high",
    Ultra => "ultra",
});

string_enum!(Platform {
    Render => "render",
    Canvas => "canvas",
    Tools => "tools",
});

string_enum!(OrderStatus {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

string_enum!(OrderType {
    Subscription => "subscription",
    CreditPackage => "credit_package",
});

string_enum!(UploadStatus {
    Initialized => "initialized",
    Uploading => "uploading",
    Finalized => "finalized",
    Expired => "expired",
    Failed => "failed",
});

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadStatus::Finalized | UploadStatus::Expired | UploadStatus::Failed
        )
    }
}

impl Default for Quality {
    fn default() -> Self {
        Quality::Standard
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Project {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub platform: Platform,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RenderSettings {
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default, rename = "aspectRatio", alias = "aspect_ratio")]
    pub aspect_ratio: Option<String>,
    /// Video length in seconds.
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default, rename = "negativePrompt", alias = "negative_prompt")]
    pub negative_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Render {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub user_id: Uuid,
    pub render_type: RenderType,
    pub prompt: String,
    #[schema(value_type = Object)]
    pub settings: serde_json::Value,
    pub status: RenderStatus,
    pub output_url: Option<String>,
    pub error_message: Option<String>,
    pub credits_cost: i32,
    pub chain_id: Option<Uuid>,
    pub chain_position: Option<i32>,
    pub reference_render_id: Option<Uuid>,
    pub parent_render_id: Option<Uuid>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RenderChain {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreditAccount {
    pub user_id: Uuid,
    pub balance: i32,
    pub total_earned: i32,
    pub total_spent: i32,
    pub monthly_earned: i32,
    pub monthly_spent: i32,
    pub last_reset_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreditTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i32,
    pub tx_type: String, // earned | spent | refund | bonus
    pub description: String,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionPlan {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: String,
    pub currency: String,
    pub interval: String, // month | year
    pub credits_per_month: i32,
    pub max_projects: Option<i32>,
    pub max_renders_per_project: Option<i32>,
    pub razorpay_plan_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreditPackage {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub credits: i32,
    pub bonus_credits: i32,
    pub price: String,
    pub currency: String,
    pub is_popular: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: String, // active | canceled | past_due | unpaid
    pub razorpay_subscription_id: Option<String>,
    pub paddle_subscription_id: Option<String>,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentOrder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_type: OrderType,
    pub reference_id: Option<Uuid>,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_subscription_id: Option<String>,
    pub paddle_transaction_id: Option<String>,
    pub amount: String,
    pub currency: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Invoice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub payment_order_id: Uuid,
    pub invoice_number: String,
    pub amount: String,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CanvasFile {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub version: i32,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResumableUpload {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bucket: String,
    pub file_path: String,
    pub content_type: String,
    pub provider_upload_id: String,
    pub total_size: i64,
    pub uploaded_bytes: i64,
    pub parts: Vec<UploadedPart>,
    pub status: UploadStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadedPart {
    pub part_number: i32,
    pub etag: String,
    pub size: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PluginApiKey {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub key_prefix: String,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PluginWebhook {
    pub id: Uuid,
    pub user_id: Uuid,
    pub url: String,
    #[serde(skip_serializing)]
    pub secret: String,
    pub events: Vec<String>,
    pub is_active: bool,
    pub success_count: i32,
    pub failure_count: i32,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
