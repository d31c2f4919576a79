mod health;
mod url;

pub use health::{health_handler, ping_handler};
pub use url::{
    delete_user_urls_handler, list_user_urls_handler, redirect_handler, shorten_batch_handler,
    shorten_json_handler, shorten_text_handler,
};
