use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::{web, App};
use serde_json::{json, Value};
use uuid::Uuid;

use renderiq::api::auth::JwtMiddleware;
use renderiq::api::canvas::{create_file, delete_file, get_file, save_graph};

mod support;

#[actix_web::test]
async fn graphs_are_validated_and_versioned() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let user_id = support::insert_user(pool, true).await;
    let project_id = Uuid::new_v4();
    sqlx::query("INSERT INTO projects (id, user_id, name, slug, platform) VALUES ($1, $2, 'Atrium', $3, 'canvas')")
        .bind(project_id)
        .bind(user_id)
        .bind(format!("atrium-{}", project_id.simple()))
        .execute(pool)
        .await
        .expect("insert project");

    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = test::init_service(
        App::new().app_data(state.clone()).service(
            web::scope("/api")
                .wrap(JwtMiddleware)
                .service(create_file)
                .service(get_file)
                .service(delete_file)
                .service(save_graph),
        ),
    )
    .await;

    let mut slugs = Vec::new();
    let mut file_id = String::new();
    for _ in 0..2 {
        let req = TestRequest::post()
            .uri("/api/canvas/files")
            .insert_header(support::bearer(user_id))
            .set_json(json!({ "projectId": project_id, "name": "Main Board" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        slugs.push(body["data"]["slug"].as_str().unwrap().to_string());
        file_id = body["data"]["id"].as_str().unwrap().to_string();
    }
    assert_eq!(slugs[0], "main-board");
    assert!(slugs[1].starts_with("main-board-"));

    let graph = json!({
        "nodes": [
            { "id": "prompt", "type": "text", "position": { "x": 0.0, "y": 0.0 }, "data": {} },
            { "id": "render", "type": "image", "position": { "x": 300.0, "y": 0.0 }, "data": {} }
        ],
        "edges": [{ "id": "e1", "source": "prompt", "target": "render" }]
    });

    for expected in [1, 2] {
        let req = TestRequest::put()
            .uri(&format!("/api/canvas/files/{file_id}/graph"))
            .insert_header(support::bearer(user_id))
            .set_json(&graph)
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["version"], expected);
    }

    let broken = json!({
        "nodes": [{ "id": "a", "type": "text", "position": { "x": 0.0, "y": 0.0 } }],
        "edges": [{ "id": "e1", "source": "a", "target": "missing" }]
    });
    let req = TestRequest::put()
        .uri(&format!("/api/canvas/files/{file_id}/graph"))
        .insert_header(support::bearer(user_id))
        .set_json(&broken)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Invalid graph: edge 'e1' references unknown node 'missing'");

    let req = TestRequest::get()
        .uri(&format!("/api/canvas/files/{file_id}"))
        .insert_header(support::bearer(user_id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["graphVersion"], 2);
    assert_eq!(body["data"]["graph"]["edges"][0]["target"], "render");

    let stranger = support::insert_user(pool, true).await;
    let req = TestRequest::get()
        .uri(&format!("/api/canvas/files/{file_id}"))
        .insert_header(support::bearer(stranger))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = TestRequest::delete()
        .uri(&format!("/api/canvas/files/{file_id}"))
        .insert_header(support::bearer(user_id))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = TestRequest::get()
        .uri(&format!("/api/canvas/files/{file_id}"))
        .insert_header(support::bearer(user_id))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}
