//! # File Server - Entry Point
//! src/main.rs
//!
//! Parsea la configuración, inicializa el logging y corre el servidor.
//! Sin `--debug` solo se registran warnings y errores.

use file_server::config::Config;
use file_server::server::Server;

fn main() {
    let config = Config::new();

    let default_level = if config.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Err(e) = config.validate() {
        eprintln!("error: {}", e);
        eprintln!("usage: file_server -p port [-d] -u username");
        std::process::exit(2);
    }

    let server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            log::error!("no se pudo iniciar el servidor: {}", e);
            eprintln!("Error fatal: {}", e);
            std::process::exit(1);
        }
    };

    server.config().log_summary();

    if let Err(e) = server.run() {
        log::error!("loop terminó: {}", e);
        eprintln!("Error fatal: {}", e);
        std::process::exit(1);
    }
}
