mod content;
mod sessions;
mod utils;
