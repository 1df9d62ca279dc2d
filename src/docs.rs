use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::auth::register,
        crate::api::auth::login,
        crate::api::auth::forgot_password,
        crate::api::auth::reset_password,
        crate::api::auth::resend_verification,
        crate::api::auth::verify_email,
        crate::api::billing::get_credits,
        crate::api::billing::list_transactions,
        crate::api::billing::check_limits,
        crate::api::billing::list_plans,
        crate::api::billing::list_packages,
        crate::api::payments::create_order,
        crate::api::payments::verify_payment,
        crate::api::payments::cancel_order,
        crate::api::payments::create_subscription,
        crate::api::payments::cancel_subscription,
        crate::api::payments::payment_history,
        crate::api::payments::list_invoices,
        crate::api::payments::razorpay_webhook,
        crate::api::payments::paddle_webhook,
        crate::api::currency::exchange_rate,
        crate::api::projects::list_projects,
        crate::api::projects::create_project,
        crate::api::projects::get_project,
        crate::api::projects::delete_project,
        crate::api::renders::create_render,
        crate::api::renders::list_renders,
        crate::api::renders::get_render,
        crate::api::renders::get_chain,
        crate::api::renders::render_callback,
        crate::api::canvas::list_files,
        crate::api::canvas::create_file,
        crate::api::canvas::get_file,
        crate::api::canvas::delete_file,
        crate::api::canvas::save_graph,
        crate::api::uploads::upload_file,
        crate::api::uploads::init_resumable,
        crate::api::uploads::upload_chunk,
        crate::api::uploads::upload_status,
        crate::api::uploads::finalize_upload,
        crate::api::api_keys::list_keys,
        crate::api::api_keys::create_key,
        crate::api::api_keys::revoke_key,
        crate::api::plugins::list_projects,
        crate::api::plugins::create_project,
        crate::api::plugins::get_project,
        crate::api::plugins::create_render,
        crate::api::plugins::get_render,
        crate::api::plugins::get_credits,
        crate::api::plugins::list_webhooks,
        crate::api::plugins::create_webhook,
        crate::api::plugins::delete_webhook,
        crate::api::sitemap::sitemap_index,
        crate::api::sitemap::sitemap_pages,
        crate::api::sitemap::sitemap_tools,
        crate::api::sitemap::sitemap_gallery,
        crate::api::pwa::web_manifest
    ),
    components(
        schemas(
            crate::api::auth::RegisterRequest,
            crate::api::auth::LoginRequest,
            crate::api::auth::AuthResponse,
            crate::api::auth::EmailRequest,
            crate::api::auth::ResetPasswordRequest,
            crate::api::payments::CreateOrderRequest,
            crate::api::payments::CreateOrderResponse,
            crate::api::payments::VerifyPaymentRequest,
            crate::api::payments::CancelOrderRequest,
            crate::api::payments::CreateSubscriptionRequest,
            crate::api::payments::CancelSubscriptionRequest,
            crate::api::projects::CreateProjectRequest,
            crate::api::renders::CreateRenderRequest,
            crate::api::renders::RenderCallback,
            crate::api::canvas::CreateFileRequest,
            crate::api::uploads::InitUploadRequest,
            crate::api::api_keys::CreateKeyRequest,
            crate::api::plugins::CreateWebhookRequest,
            crate::models::Project,
            crate::models::Platform,
            crate::models::Render,
            crate::models::RenderType,
            crate::models::RenderStatus,
            crate::models::RenderSettings,
            crate::models::Quality,
            crate::models::RenderChain,
            crate::models::CreditAccount,
            crate::models::SubscriptionPlan,
            crate::models::CreditPackage,
            crate::models::PaymentOrder,
            crate::models::OrderType,
            crate::models::OrderStatus,
            crate::models::CanvasFile,
            crate::models::UploadStatus,
            crate::models::PluginWebhook,
            crate::limits::LimitCheck,
            crate::limits::LimitType,
            crate::canvas::graph::CanvasGraph,
            crate::canvas::graph::CanvasNode,
            crate::canvas::graph::CanvasEdge,
            crate::canvas::graph::Position,
            crate::canvas::graph::Viewport,
            crate::uploads::UploadProgress,
            crate::uploads::FinalizedUpload
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Registration, login, password reset, email verification"),
        (name = "billing", description = "Credits, ledger, plan limits and catalog"),
        (name = "payments", description = "Razorpay orders and subscriptions"),
        (name = "webhooks", description = "Payment provider callbacks"),
        (name = "currency", description = "Exchange rates from INR"),
        (name = "projects", description = "Projects"),
        (name = "renders", description = "Render requests, chains and provider callbacks"),
        (name = "canvas", description = "Node editor files and graphs"),
        (name = "uploads", description = "Direct and resumable uploads"),
        (name = "api-keys", description = "Plugin API key management"),
        (name = "plugins", description = "Plugin API (session token or API key)"),
        (name = "sitemap", description = "XML sitemaps"),
        (name = "pwa", description = "Web app manifest")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
