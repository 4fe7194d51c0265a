/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - /test, /testauth, /users を App に登録
 * - 認証・認可が必要な範囲は route ごとの middleware (authenticate / authorize) で決める
 */
use axum::routing::MethodFilter;

use crate::{
    api::v1::handlers::{test, users},
    middleware::{authenticate, authorize},
    services::auth::ROLE_ADMIN,
    state::AppState,
    web::App,
};

const VERSION: &str = "v1";

pub fn routes(app: App, state: &AppState) -> App {
    let authn = authenticate(state.auth.clone());
    let admin = authorize(&[ROLE_ADMIN]);
    let admin_only = [authn.clone(), admin];

    let ugh = users::Handlers::new(state.users.clone(), state.auth.clone());

    app.handle(MethodFilter::GET, VERSION, "/test", test::test(), &[])
        .handle(MethodFilter::GET, VERSION, "/testauth", test::test(), &admin_only)
        .handle(MethodFilter::GET, VERSION, "/users/token", ugh.token(), &[])
        .handle(MethodFilter::GET, VERSION, "/users/{page}/{rows}", ugh.query(), &admin_only)
        .handle(MethodFilter::GET, VERSION, "/users/{id}", ugh.query_by_id(), &[authn])
        .handle(MethodFilter::POST, VERSION, "/users", ugh.create(), &admin_only)
        .handle(MethodFilter::PUT, VERSION, "/users/{id}", ugh.update(), &admin_only)
        .handle(MethodFilter::DELETE, VERSION, "/users/{id}", ugh.delete(), &admin_only)
}
