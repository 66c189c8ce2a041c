pub mod conversation;
pub mod experiment;
pub mod quality;
pub mod routing;
