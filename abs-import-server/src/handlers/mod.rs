pub mod analysis;
pub mod imports;
pub mod mappings;
pub mod sessions;
pub mod upload;
