//! # Transporte TCP
//! src/transport.rs
//!
//! Primitivas de sockets que usa el resto del servidor:
//! `listen`, `accept`, `connect`, `send`, `recv` y la espera de readiness
//! con timeout (`wait_readable`, sobre poll(2)).

use std::io::{self, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::os::unix::io::RawFd;
use std::time::Duration;

/// Abre un listener en `host:port`
///
/// El listener queda no bloqueante: un `accept` sin conexión pendiente
/// retorna `WouldBlock` en vez de colgar el multiplexor.
pub fn listen(host: &str, port: u16) -> io::Result<TcpListener> {
    let listener = TcpListener::bind((host, port))?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

/// Acepta una conexión pendiente
///
/// El stream aceptado se deja en modo bloqueante.
pub fn accept(listener: &TcpListener) -> io::Result<(TcpStream, SocketAddr)> {
    let (stream, peer) = listener.accept()?;
    stream.set_nonblocking(false)?;
    Ok((stream, peer))
}

/// Conecta a `host:service`, probando cada dirección resuelta en orden
pub fn connect(host: &str, service: &str) -> io::Result<TcpStream> {
    let port: u16 = service
        .parse()
        .map_err(|_| io::Error::new(ErrorKind::InvalidInput, format!("invalid service: {}", service)))?;

    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        log::debug!("intentando conectar a {}", addr);
        match TcpStream::connect(addr) {
            Ok(stream) => {
                log::debug!("usando dirección {}", addr);
                return Ok(stream);
            }
            Err(e) => {
                log::debug!("falló conexión a {}: {}", addr, e);
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(ErrorKind::NotFound, format!("no addresses for {}:{}", host, service))
    }))
}

/// Envía todos los bytes; retorna la cantidad enviada
pub fn send<W: Write>(conn: &mut W, bytes: &[u8]) -> io::Result<usize> {
    conn.write_all(bytes)?;
    conn.flush()?;
    Ok(bytes.len())
}

/// Lee hasta `buf.len()` bytes; `Ok(0)` significa que el peer cerró
pub fn recv<R: Read>(conn: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match conn.read(buf) {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Espera hasta `timeout` a que alguno de `fds` tenga datos para leer
///
/// Retorna los descriptores listos; un vector vacío es un timeout (o una
/// señal que interrumpió la espera).
pub fn wait_readable(fds: &[RawFd], timeout: Duration) -> io::Result<Vec<RawFd>> {
    let mut pollfds: Vec<libc::pollfd> = fds
        .iter()
        .map(|&fd| libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        })
        .collect();

    let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

    // SAFETY: pollfds es un buffer válido de pollfds.len() elementos
    let n = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, timeout_ms) };

    if n < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == ErrorKind::Interrupted {
            return Ok(Vec::new());
        }
        return Err(err);
    }

    // POLLHUP/POLLERR también cuentan: el read siguiente reportará el cierre
    let ready = pollfds
        .iter()
        .filter(|p| p.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0)
        .map(|p| p.fd)
        .collect();
    Ok(ready)
}
