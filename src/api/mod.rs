//! API Module
//!
//! HTTP handlers and routing for the communication-plan API.
//!
//! # Endpoints
//! - `GET|POST /api/users` - List or create users
//! - `GET|PUT|DELETE /api/users/:id` - One user
//! - `GET|POST /api/projects` - List or create projects
//! - `GET|PUT|DELETE /api/projects/:id` - One project
//! - `GET|POST /api/projects/:id/stakeholders` - A project's stakeholders
//! - `POST /api/projects/:id/stakeholders/bulk` - Create many stakeholders
//! - `GET|POST|PUT /api/projects/:id/communication-plan` - The project's plan
//! - `GET|POST /api/communication-plans/:id/matrix` - A plan's matrix entries
//! - `POST /api/communication-plans/:id/matrix/bulk` - Create many entries
//! - `PUT|DELETE /api/matrix/:id` - One matrix entry
//! - `GET|PUT|DELETE /api/stakeholders/:id` - One stakeholder
//! - `GET|DELETE /api/cache/stats` - Cache statistics, cache reset
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
