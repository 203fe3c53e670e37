use axum::Router;
use sqlx::PgPool;

mod buildings;
mod health;
mod meters;
mod readings;
mod units;
mod users;

// ---

pub fn router(pool: PgPool) -> Router {
    // ---
    Router::new()
        .merge(buildings::router())
        .merge(units::router())
        .merge(meters::router())
        .merge(readings::router())
        .merge(users::router())
        .merge(health::router())
        .with_state(pool)
}
