pub mod approval;
pub mod change_requests;
pub mod events;
pub mod series;
