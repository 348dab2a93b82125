//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración con soporte para argumentos CLI y variables de entorno.
//! Puerto y username son obligatorios; si faltan, clap termina el proceso
//! con un mensaje de uso y código distinto de cero.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./file_server -p 8080 -u alice --root ./data -d
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! FS_PORT=8080 FS_USERNAME=alice FS_MODE=serial ./file_server
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};

/// Cómo se atienden las conexiones aceptadas
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Una conexión a la vez, dentro del loop de readiness
    Serial,

    /// Un worker por conexión, más un thread reclamador
    Threaded,
}

/// Configuración del servidor de archivos
#[derive(Debug, Clone, Parser)]
#[command(name = "file_server")]
#[command(about = "Servidor de archivos GET/PUT sobre TCP")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Puerto en el que escucha el servidor
    #[arg(short, long, env = "FS_PORT")]
    pub port: u16,

    /// Username que el servidor incluye en sus respuestas
    #[arg(short, long, env = "FS_USERNAME")]
    pub username: String,

    /// Modo debug: logs detallados en stderr
    #[arg(short, long, env = "FS_DEBUG")]
    pub debug: bool,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "0.0.0.0", env = "FS_HOST")]
    pub host: String,

    /// Directorio raíz de los archivos servidos
    #[arg(long, default_value = ".", env = "FS_ROOT")]
    pub root: PathBuf,

    /// Modo de atención de conexiones
    #[arg(long, value_enum, default_value = "threaded", env = "FS_MODE")]
    pub mode: Mode,

    // === Loop de readiness ===

    /// Timeout de la espera de readiness en milisegundos (idle tick)
    #[arg(long = "idle-tick-ms", default_value = "3000", env = "FS_IDLE_TICK_MS")]
    pub idle_tick_ms: u64,

    // === Buffers ===

    /// Tamaño de cada read sobre el socket
    #[arg(long = "recv-buffer", default_value = "1024", env = "FS_RECV_BUFFER")]
    pub recv_buffer: usize,

    /// Tamaño máximo del header antes de abortar la conexión
    #[arg(long = "max-header", default_value = "65536", env = "FS_MAX_HEADER")]
    pub max_header: usize,
}

impl Config {
    /// Crea la configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Config para tests y uso embebido: loopback, puerto efímero
    pub fn for_root(root: impl AsRef<Path>, username: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            username: username.to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            ..Self::default()
        }
    }

    /// Dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use file_server::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "0.0.0.0:8080");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Timeout de la espera de readiness
    pub fn idle_tick(&self) -> Duration {
        Duration::from_millis(self.idle_tick_ms)
    }

    /// Valida la configuración
    ///
    /// El puerto 0 solo se acepta con `allow_ephemeral` (tests).
    pub fn validate(&self) -> Result<(), String> {
        self.validate_with(false)
    }

    pub fn validate_with(&self, allow_ephemeral: bool) -> Result<(), String> {
        if self.port == 0 && !allow_ephemeral {
            return Err("Port must be between 1 and 65535".to_string());
        }
        if self.username.trim().is_empty() {
            return Err("Username must not be empty".to_string());
        }
        if self.idle_tick_ms == 0 {
            return Err("Idle tick must be > 0".to_string());
        }
        if self.recv_buffer == 0 {
            return Err("Receive buffer must be >= 1".to_string());
        }
        if self.max_header < self.recv_buffer {
            return Err("Max header must be >= receive buffer".to_string());
        }
        if !self.root.is_dir() {
            return Err(format!("Root {} is not a directory", self.root.display()));
        }
        Ok(())
    }

    /// Imprime un resumen de la configuración en el log
    pub fn log_summary(&self) {
        log::info!("address:     {}", self.address());
        log::info!("root:        {}", self.root.display());
        log::info!("username:    {}", self.username);
        log::info!("mode:        {:?}", self.mode);
        log::info!("idle tick:   {} ms", self.idle_tick_ms);
        log::info!("recv buffer: {} bytes (header max {})", self.recv_buffer, self.max_header);
        if self.mode == Mode::Threaded {
            log::warn!("threaded mode: un thread por conexión, sin límite de concurrencia");
        }
    }
}

impl Default for Config {
    /// Configuración por defecto (el username queda vacío y no valida)
    fn default() -> Self {
        Self {
            port: 8080,
            username: String::new(),
            debug: false,
            host: "0.0.0.0".to_string(),
            root: PathBuf::from("."),
            mode: Mode::Threaded,
            idle_tick_ms: 3000,
            recv_buffer: 1024,
            max_header: 65536,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            username: "alice".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.mode, Mode::Threaded);
        assert_eq!(config.idle_tick(), Duration::from_secs(3));
        assert_eq!(config.recv_buffer, 1024);
    }

    #[test]
    fn test_address_custom() {
        let mut config = Config::default();
        config.host = "127.0.0.1".to_string();
        config.port = 3000;
        assert_eq!(config.address(), "127.0.0.1:3000");
    }

    #[test]
    fn test_validate_success() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_port_zero() {
        let mut config = valid();
        config.port = 0;
        assert!(config.validate().unwrap_err().contains("Port"));
        assert!(config.validate_with(true).is_ok());
    }

    #[test]
    fn test_validate_empty_username() {
        let config = Config::default();
        assert!(config.validate().unwrap_err().contains("Username"));
    }

    #[test]
    fn test_validate_buffers_and_tick() {
        let mut config = valid();
        config.idle_tick_ms = 0;
        assert!(config.validate().unwrap_err().contains("Idle tick"));

        let mut config = valid();
        config.recv_buffer = 0;
        assert!(config.validate().unwrap_err().contains("Receive buffer"));

        let mut config = valid();
        config.max_header = 10;
        assert!(config.validate().unwrap_err().contains("Max header"));
    }

    #[test]
    fn test_validate_root_must_exist() {
        let mut config = valid();
        config.root = PathBuf::from("/definitely/not/a/dir");
        assert!(config.validate().unwrap_err().contains("not a directory"));
    }

    // ==================== CLI ====================

    #[test]
    fn test_parse_required_flags() {
        let config = Config::try_parse_from(["file_server", "-p", "9000", "-u", "bob"]).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.username, "bob");
        assert!(!config.debug);
    }

    #[test]
    fn test_parse_all_flags() {
        let config = Config::try_parse_from([
            "file_server",
            "--port",
            "9001",
            "--username",
            "carol",
            "-d",
            "--mode",
            "serial",
            "--idle-tick-ms",
            "250",
            "--root",
            "/tmp",
        ])
        .unwrap();
        assert!(config.debug);
        assert_eq!(config.mode, Mode::Serial);
        assert_eq!(config.idle_tick_ms, 250);
        assert_eq!(config.root, PathBuf::from("/tmp"));
    }

    #[test]
    fn test_parse_missing_required_flags() {
        assert!(Config::try_parse_from(["file_server", "-p", "9000"]).is_err());
        assert!(Config::try_parse_from(["file_server", "-u", "bob"]).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_port() {
        assert!(Config::try_parse_from(["file_server", "-p", "abc", "-u", "bob"]).is_err());
        assert!(Config::try_parse_from(["file_server", "-p", "70000", "-u", "bob"]).is_err());
    }
}
