mod error;
mod handlers;
mod middleware;
mod routes;

pub use error::AppError;
pub use middleware::AuthenticatedActor;
pub use routes::{TeamsState, router, teams_routes};
