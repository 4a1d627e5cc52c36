//! Gatekeeper.
//!
//! Gatekeeper serves the content API of the site. Every request passes through the request
//! governance layer first: public reads are rate limited and served from an in-memory cache,
//! admin operations additionally require a verified session with a sufficient role.

#![warn(missing_debug_implementations, clippy::all)]

mod cli;
mod endpoints;
mod healthcheck;
mod logging;
mod server;

fn main() {
    match cli::execute() {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            logging::ensure_log_error(&error);
            std::process::exit(1);
        }
    }
}
