//! Request and Response models for the plan API

pub mod requests;
pub mod responses;

pub use requests::{
    BulkBody, ColumnDefault, Required, Resource, COMMUNICATION_PLANS, MATRIX_BULK,
    MATRIX_ENTRIES, PROJECTS, STAKEHOLDERS, STAKEHOLDERS_BULK, USERS,
};
pub use responses::{ApiResponse, CacheStatsResponse, HealthResponse, MessageResponse};
