//! # Almacenamiento de Archivos
//! src/storage.rs
//!
//! Fuente y destino de bytes para GET/PUT. Todos los targets se resuelven
//! dentro del directorio raíz del servidor; un target que intenta salir de
//! la raíz (`..`, rutas absolutas anidadas) se trata como prohibido.

use std::ffi::CString;
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::os::unix::ffi::OsStrExt;
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, ServerError};

/// Resultado de evaluar un GET sobre el filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadProbe {
    /// El archivo existe y se puede leer
    Readable { path: PathBuf, size: u64 },

    /// El archivo no existe
    Missing,

    /// Existe pero la política no permite leerlo
    Forbidden,
}

/// Resultado de evaluar un PUT sobre el filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteProbe {
    /// El archivo existe y será sobrescrito
    Overwrite(PathBuf),

    /// El archivo no existe y será creado
    Create(PathBuf),

    /// El directorio contenedor no es escribible o el target no es válido
    Forbidden,
}

/// Archivos servidos bajo un directorio raíz
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directorio raíz del servidor
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Traduce el target de un request (ej: "/docs/a.txt") a una ruta bajo la raíz
    ///
    /// Retorna `None` si el target está vacío o intenta salir de la raíz.
    pub fn resolve(&self, target: &str) -> Option<PathBuf> {
        let relative = target.trim_start_matches('/');
        if relative.is_empty() {
            return None;
        }

        let mut path = self.root.clone();
        let mut pushed = false;
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => {
                    path.push(part);
                    pushed = true;
                }
                Component::CurDir => {}
                _ => return None,
            }
        }

        pushed.then_some(path)
    }

    /// Evalúa si `target` se puede servir con GET
    ///
    /// Solo archivos regulares: directorios, FIFOs y dispositivos son
    /// prohibidos. Los symlinks se siguen pero el destino real debe quedar
    /// bajo la raíz.
    pub fn probe_read(&self, target: &str) -> ReadProbe {
        let Some(path) = self.resolve(target) else {
            return ReadProbe::Forbidden;
        };

        match fs::metadata(&path) {
            Ok(meta) if !meta.is_file() => ReadProbe::Forbidden,
            Ok(_) if !self.contains(&path) => {
                log::warn!("{} apunta fuera de la raíz", path.display());
                ReadProbe::Forbidden
            }
            Ok(meta) => {
                if has_access(&path, libc::R_OK) {
                    ReadProbe::Readable { path, size: meta.len() }
                } else {
                    ReadProbe::Forbidden
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => ReadProbe::Missing,
            Err(e) => {
                log::debug!("stat {} falló: {}", path.display(), e);
                ReadProbe::Forbidden
            }
        }
    }

    /// Evalúa si `target` se puede escribir con PUT
    ///
    /// El directorio contenedor debe existir bajo la raíz y ser escribible.
    /// Un target existente solo se sobrescribe si es (o apunta a) un archivo
    /// regular bajo la raíz; un symlink roto es prohibido.
    pub fn probe_write(&self, target: &str) -> WriteProbe {
        let Some(path) = self.resolve(target) else {
            return WriteProbe::Forbidden;
        };

        let parent_writable = path
            .parent()
            .map(|dir| dir.is_dir() && self.contains(dir) && has_access(dir, libc::W_OK | libc::X_OK))
            .unwrap_or(false);
        if !parent_writable {
            return WriteProbe::Forbidden;
        }

        match fs::symlink_metadata(&path) {
            Err(e) if e.kind() == ErrorKind::NotFound => WriteProbe::Create(path),
            Err(e) => {
                log::debug!("lstat {} falló: {}", path.display(), e);
                WriteProbe::Forbidden
            }
            Ok(_) => match fs::metadata(&path) {
                Ok(meta) if meta.is_file() && self.contains(&path) && has_access(&path, libc::W_OK) => {
                    WriteProbe::Overwrite(path)
                }
                _ => WriteProbe::Forbidden,
            },
        }
    }

    /// Indica si la ruta real de `path` (symlinks resueltos) queda bajo la raíz
    fn contains(&self, path: &Path) -> bool {
        match (self.root.canonicalize(), path.canonicalize()) {
            (Ok(root), Ok(real)) => real.starts_with(root),
            _ => false,
        }
    }

    /// Carga exactamente `len` bytes de `path`
    ///
    /// Una lectura parcial es un error, no se trunca en silencio.
    pub fn load_exact(&self, path: &Path, len: u64) -> Result<Vec<u8>> {
        let file = File::open(path)?;
        let mut payload = Vec::with_capacity(len as usize);
        file.take(len).read_to_end(&mut payload)?;

        let got = payload.len() as u64;
        if got != len {
            return Err(ServerError::ShortRead { expected: len, got });
        }
        Ok(payload)
    }

    /// Abre (truncando) el destino de un PUT
    pub fn open_sink(&self, path: &Path) -> Result<File> {
        Ok(File::create(path)?)
    }
}

/// access(2) sobre `path` con el modo pedido
fn has_access(path: &Path, mode: libc::c_int) -> bool {
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: c_path es un string C válido terminado en NUL durante la llamada
    unsafe { libc::access(c_path.as_ptr(), mode) == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn store_with_file(name: &str, content: &[u8]) -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let mut file = File::create(dir.path().join(name)).unwrap();
        file.write_all(content).unwrap();
        let store = FileStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_resolve_inside_root() {
        let store = FileStore::new("/srv");
        assert_eq!(store.resolve("/a.txt"), Some(PathBuf::from("/srv/a.txt")));
        assert_eq!(store.resolve("/docs/./b"), Some(PathBuf::from("/srv/docs/b")));
    }

    #[test]
    fn test_resolve_rejects_escape() {
        let store = FileStore::new("/srv");
        assert_eq!(store.resolve("/../etc/passwd"), None);
        assert_eq!(store.resolve("/a/../../b"), None);
        assert_eq!(store.resolve("/"), None);
        assert_eq!(store.resolve(""), None);
    }

    #[test]
    fn test_probe_read() {
        let (_dir, store) = store_with_file("hello.txt", b"hello");
        match store.probe_read("/hello.txt") {
            ReadProbe::Readable { size, .. } => assert_eq!(size, 5),
            other => panic!("unexpected probe: {:?}", other),
        }
        assert_eq!(store.probe_read("/missing.txt"), ReadProbe::Missing);
        assert_eq!(store.probe_read("/../hello.txt"), ReadProbe::Forbidden);
    }

    #[test]
    fn test_probe_read_directory_is_forbidden() {
        let (dir, store) = store_with_file("x", b"");
        fs::create_dir(dir.path().join("sub")).unwrap();
        assert_eq!(store.probe_read("/sub"), ReadProbe::Forbidden);
    }

    #[test]
    fn test_probe_write() {
        let (dir, store) = store_with_file("old.bin", b"old");
        assert_eq!(
            store.probe_write("/old.bin"),
            WriteProbe::Overwrite(dir.path().join("old.bin"))
        );
        assert_eq!(
            store.probe_write("/new.bin"),
            WriteProbe::Create(dir.path().join("new.bin"))
        );
        assert_eq!(store.probe_write("/no/such/dir/f"), WriteProbe::Forbidden);
        assert_eq!(store.probe_write("/../escape"), WriteProbe::Forbidden);
    }

    #[test]
    fn test_load_exact() {
        let (dir, store) = store_with_file("data", b"0123456789");
        let path = dir.path().join("data");
        assert_eq!(store.load_exact(&path, 10).unwrap(), b"0123456789".to_vec());

        let result = store.load_exact(&path, 20);
        assert!(matches!(result, Err(ServerError::ShortRead { expected: 20, got: 10 })));
    }

    #[test]
    fn test_open_sink_truncates() {
        let (dir, store) = store_with_file("t", b"long old content");
        let path = dir.path().join("t");
        let mut sink = store.open_sink(&path).unwrap();
        sink.write_all(b"new").unwrap();
        drop(sink);
        assert_eq!(fs::read(&path).unwrap(), b"new".to_vec());
    }

    #[test]
    fn test_symlink_outside_root_is_forbidden() {
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret"), b"top secret").unwrap();
        let (dir, store) = store_with_file("ok", b"ok");
        std::os::unix::fs::symlink(outside.path().join("secret"), dir.path().join("link")).unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("out")).unwrap();

        assert_eq!(store.probe_read("/link"), ReadProbe::Forbidden);
        assert_eq!(store.probe_read("/out/secret"), ReadProbe::Forbidden);
        assert_eq!(store.probe_write("/link"), WriteProbe::Forbidden);
        assert_eq!(store.probe_write("/out/new"), WriteProbe::Forbidden);
    }

    #[test]
    fn test_symlink_inside_root_is_followed() {
        let (dir, store) = store_with_file("real", b"inside");
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();

        match store.probe_read("/alias") {
            ReadProbe::Readable { size, .. } => assert_eq!(size, 6),
            other => panic!("unexpected probe: {:?}", other),
        }
        assert_eq!(
            store.probe_write("/alias"),
            WriteProbe::Overwrite(dir.path().join("alias"))
        );
    }

    #[test]
    fn test_dangling_symlink_cannot_be_written() {
        let (dir, store) = store_with_file("x", b"");
        std::os::unix::fs::symlink("/nonexistent/target", dir.path().join("broken")).unwrap();
        assert_eq!(store.probe_read("/broken"), ReadProbe::Missing);
        assert_eq!(store.probe_write("/broken"), WriteProbe::Forbidden);
    }

    #[test]
    fn test_fifo_is_forbidden() {
        let (dir, store) = store_with_file("x", b"");
        let fifo = dir.path().join("pipe");
        let c_path = CString::new(fifo.as_os_str().as_bytes()).unwrap();
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o644) }, 0);

        assert_eq!(store.probe_read("/pipe"), ReadProbe::Forbidden);
        assert_eq!(store.probe_write("/pipe"), WriteProbe::Forbidden);
    }

    #[test]
    fn test_permission_denied_is_forbidden() {
        use std::os::unix::fs::PermissionsExt;

        // root ignora los permisos de archivo
        if unsafe { libc::geteuid() } == 0 {
            return;
        }

        let (dir, store) = store_with_file("locked", b"data");
        fs::set_permissions(dir.path().join("locked"), fs::Permissions::from_mode(0o000)).unwrap();
        let sealed = dir.path().join("sealed");
        fs::create_dir(&sealed).unwrap();
        fs::set_permissions(&sealed, fs::Permissions::from_mode(0o500)).unwrap();

        assert_eq!(store.probe_read("/locked"), ReadProbe::Forbidden);
        assert_eq!(store.probe_write("/locked"), WriteProbe::Forbidden);
        assert_eq!(store.probe_write("/sealed/new"), WriteProbe::Forbidden);

        fs::set_permissions(&sealed, fs::Permissions::from_mode(0o700)).unwrap();
    }
}
