pub mod deed_status;
pub mod errors;
pub mod reconcile;
pub mod signing;
pub mod validation;
