use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::{web, App};
use serde_json::{json, Value};
use uuid::Uuid;

use renderiq::api::auth::JwtMiddleware;
use renderiq::api::projects::{create_project, create_project_for, CreateProjectRequest};
use renderiq::api::renders::{
    create_render, create_render_for, get_chain, get_render, render_callback, CreateRenderRequest,
};
use renderiq::db;
use renderiq::error::ApiError;
use renderiq::models::Project;
use renderiq::AppState;

mod support;

#[actix_web::test]
async fn render_lifecycle_charges_and_refunds_credits() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let user_id = support::insert_user(pool, true).await;
    support::set_balance(pool, user_id, 10).await;

    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let secret = state.config.render_callback_secret.clone();
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .service(render_callback)
            .service(
                web::scope("/api")
                    .wrap(JwtMiddleware)
                    .service(create_project)
                    .service(create_render)
                    .service(get_chain)
                    .service(get_render),
            ),
    )
    .await;

    let req = TestRequest::post()
        .uri("/api/projects")
        .insert_header(support::bearer(user_id))
        .set_json(json!({ "name": "Lake House" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let project: Value = test::read_body_json(resp).await;
    let project_id = project["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(project["data"]["slug"], "lake-house");

    let req = TestRequest::post()
        .uri("/api/renders")
        .insert_header(support::bearer(user_id))
        .set_json(json!({ "projectId": project_id, "prompt": "Timber lake house at dusk" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let render: Value = test::read_body_json(resp).await;
    let render_id = render["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(render["data"]["status"], "pending");
    assert_eq!(support::balance(pool, user_id).await, 4);

    let chain_name: String = sqlx::query_scalar(
        "SELECT c.name FROM render_chains c JOIN renders r ON r.chain_id = c.id WHERE r.id = $1",
    )
    .bind(Uuid::parse_str(&render_id).unwrap())
    .fetch_one(pool)
    .await
    .expect("select chain");
    assert_eq!(chain_name, "Lake House - Iterations");

    // 4 credits left, 6 needed
    let req = TestRequest::post()
        .uri("/api/renders")
        .insert_header(support::bearer(user_id))
        .set_json(json!({ "projectId": project_id, "prompt": "Same house, winter" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Insufficient credits: 6 required");
    assert_eq!(support::balance(pool, user_id).await, 4);

    let renders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM renders WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("count renders");
    assert_eq!(renders, 1);

    let req = TestRequest::post()
        .uri("/api/renders/callback")
        .insert_header(("X-Callback-Secret", secret.as_str()))
        .set_json(json!({ "renderId": render_id, "status": "failed", "error": "provider timeout" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(support::balance(pool, user_id).await, 10);

    // a late completion report does not reopen a failed render
    let req = TestRequest::post()
        .uri("/api/renders/callback")
        .insert_header(("X-Callback-Secret", secret.as_str()))
        .set_json(json!({ "renderId": render_id, "status": "completed", "outputUrl": "https://cdn.test/out.png" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["status"], "failed");
    assert_eq!(support::balance(pool, user_id).await, 10);

    let req = TestRequest::get()
        .uri(&format!("/api/renders/{render_id}"))
        .insert_header(support::bearer(user_id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["error_message"], "provider timeout");
    let chain_id = body["data"]["chain_id"].as_str().unwrap().to_string();

    let req = TestRequest::get()
        .uri(&format!("/api/renders/chains/{chain_id}"))
        .insert_header(support::bearer(user_id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["renders"].as_array().map(Vec::len), Some(1));

    let req = TestRequest::post()
        .uri("/api/renders/callback")
        .insert_header(("X-Callback-Secret", secret.as_str()))
        .set_json(json!({ "renderId": Uuid::new_v4(), "status": "processing" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn unverified_accounts_cannot_render() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let user_id = support::insert_user(pool, false).await;
    support::set_balance(pool, user_id, 100).await;

    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .service(web::scope("/api").wrap(JwtMiddleware).service(create_render)),
    )
    .await;

    let req = TestRequest::post()
        .uri("/api/renders")
        .insert_header(support::bearer(user_id))
        .set_json(json!({ "projectId": Uuid::new_v4(), "prompt": "Courtyard" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(support::balance(pool, user_id).await, 100);
}

fn project_request(name: &str) -> CreateProjectRequest {
    CreateProjectRequest {
        name: name.to_string(),
        description: None,
        platform: None,
    }
}

fn render_request(project_id: Uuid, prompt: &str) -> CreateRenderRequest {
    serde_json::from_value(json!({ "projectId": project_id, "prompt": prompt })).unwrap()
}

/// Fires `count` renders at once, each on its own runtime worker.
async fn render_concurrently(
    state: &Arc<AppState>,
    user_id: Uuid,
    project: &Project,
    count: usize,
) -> Vec<Result<Uuid, ApiError>> {
    let tasks: Vec<_> = (0..count)
        .map(|n| {
            let state = Arc::clone(state);
            let req = render_request(project.id, &format!("Courtyard study number {n}"));
            tokio::spawn(async move { create_render_for(&state, user_id, &req).await.map(|r| r.id) })
        })
        .collect();

    let mut results = Vec::with_capacity(count);
    for task in tasks {
        results.push(task.await.unwrap());
    }
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_renders_keep_plan_limit_and_chain_order() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let user_id = support::insert_user(pool, true).await;
    support::set_balance(pool, user_id, 1000).await;

    let state = Arc::new(support::build_state(test_db.pool.clone()));
    let project = create_project_for(pool, user_id, &project_request("Harbour Pavilion")).await.unwrap();

    let results = render_concurrently(&state, user_id, &project, 8).await;
    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 5, "free plan allows 5 renders per project");
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, ApiError::Forbidden(_))));
    assert_eq!(support::balance(pool, user_id).await, 1000 - 5 * 6);

    let chain_id: Uuid = sqlx::query_scalar("SELECT id FROM render_chains WHERE project_id = $1")
        .bind(project.id)
        .fetch_one(pool)
        .await
        .unwrap();
    let positions: Vec<i32> = db::renders::list_chain_renders(pool, chain_id)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.chain_position.unwrap())
        .collect();
    assert_eq!(positions, vec![0, 1, 2, 3, 4]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_renders_never_overdraw_credits() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let user_id = support::insert_user(pool, true).await;
    support::set_balance(pool, user_id, 8).await;

    let state = Arc::new(support::build_state(test_db.pool.clone()));
    let project = create_project_for(pool, user_id, &project_request("Stone Cottage")).await.unwrap();

    let results = render_concurrently(&state, user_id, &project, 4).await;
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, ApiError::InsufficientCredits(_))));
    assert_eq!(support::balance(pool, user_id).await, 2);

    let renders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM renders WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap();
    assert_eq!(renders, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_debits_stop_at_zero() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = test_db.pool.clone();
    let user_id = support::insert_user(&pool, true).await;
    support::set_balance(&pool, user_id, 10).await;

    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move {
                let mut tx = pool.begin().await.unwrap();
                let debited = db::billing::debit_credits(&mut tx, user_id, 6, "Generated image - default", None)
                    .await
                    .unwrap();
                tx.commit().await.unwrap();
                debited
            })
        })
        .collect();

    let mut succeeded = 0;
    for task in tasks {
        if let Some(balance) = task.await.unwrap() {
            assert!(balance >= 0);
            succeeded += 1;
        }
    }
    assert_eq!(succeeded, 1);
    assert_eq!(support::balance(&pool, user_id).await, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_project_creation_respects_free_limit() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = test_db.pool.clone();
    let user_id = support::insert_user(&pool, true).await;

    let tasks: Vec<_> = (0..6)
        .map(|n| {
            let pool = pool.clone();
            let req = project_request(&format!("Atrium {n}"));
            tokio::spawn(async move { create_project_for(&pool, user_id, &req).await })
        })
        .collect();

    let mut accepted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(e) => assert!(matches!(e, ApiError::Forbidden(_)), "unexpected error: {e}"),
        }
    }
    assert_eq!(accepted, 3);
}

#[actix_web::test]
async fn parent_render_must_belong_to_the_caller() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let owner = support::insert_user(pool, true).await;
    let other = support::insert_user(pool, true).await;
    support::set_balance(pool, owner, 100).await;
    support::set_balance(pool, other, 100).await;
    let state = support::build_state(test_db.pool.clone());

    let owner_project = create_project_for(pool, owner, &project_request("Boathouse")).await.unwrap();
    let foreign = create_render_for(&state, owner, &render_request(owner_project.id, "Boathouse at dusk"))
        .await
        .unwrap();

    let project = create_project_for(pool, other, &project_request("Pavilion")).await.unwrap();
    let mut req = render_request(project.id, "Pavilion in snow");
    req.parent_render_id = Some(foreign.id);
    let orphan = create_render_for(&state, other, &req).await.unwrap();
    let stored = db::renders::get_render(pool, orphan.id).await.unwrap().unwrap();
    assert_eq!(stored.parent_render_id, None);

    let mut req = render_request(project.id, "Pavilion in rain");
    req.parent_render_id = Some(orphan.id);
    let child = create_render_for(&state, other, &req).await.unwrap();
    let stored = db::renders::get_render(pool, child.id).await.unwrap().unwrap();
    assert_eq!(stored.parent_render_id, Some(orphan.id));
}
