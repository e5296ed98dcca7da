pub mod gateway;
pub mod request;
pub mod response;
pub mod router;
