mod config_gen;
mod links;

pub use config_gen::config_generate;
pub use links::{
    ImportItem, add_link, delete_links, get_link, import_links, list_links, parse_import, ping,
    print_token,
};
