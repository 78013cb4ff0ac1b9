mod handler;
mod model;

pub use handler::{
    add_place, close_list, delete_place, edit_place, get_view, open_list, refresh_list,
    toggle_favorite, toggle_visited,
};
