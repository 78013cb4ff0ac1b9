mod handler;
mod model;

pub use handler::{create_group, find_by_id, rename_group, share_link, update_members};
