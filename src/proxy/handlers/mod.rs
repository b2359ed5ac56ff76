// Endpoint handlers

pub mod asset;
pub mod landing;
pub mod relay;
