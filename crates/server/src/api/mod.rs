pub mod handlers;
pub mod middleware;
pub mod preferences;
pub mod queues;
pub mod quests;
pub mod routes;
pub mod session;
pub mod signals;
pub mod ws;

pub use routes::create_router;
