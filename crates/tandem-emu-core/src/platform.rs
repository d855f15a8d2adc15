//! File access supplied by the embedding frontend.
//!
//! The core never touches the filesystem directly. Every backing file is
//! opened through [`Platform::open`] by name, relative to a storage path the
//! frontend handed out.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::rc::Rc;

use log::{debug, warn};

/// Storage location handle issued by a platform.
pub type PathId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    Optional,
}

pub trait VirtualFile {
    fn size(&self) -> u64;

    /// Fill as much of `buf` as the file allows, returning the byte count.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Read the whole file.
    fn reads(&mut self) -> io::Result<Vec<u8>> {
        let mut data = vec![0; self.size() as usize];
        let n = self.read(&mut data)?;
        data.truncate(n);
        Ok(data)
    }
}

pub trait Platform {
    /// Open `name` under `path`. `requirement` only affects how a failure is
    /// reported; the caller decides what a missing file means.
    fn open(
        &mut self,
        path: PathId,
        name: &str,
        mode: FileMode,
        requirement: Requirement,
    ) -> Option<Box<dyn VirtualFile>>;
}

fn report_missing(name: &str, requirement: Requirement, reason: &dyn std::fmt::Display) {
    match requirement {
        Requirement::Required => warn!("Required file {name} unavailable: {reason}"),
        Requirement::Optional => debug!("Optional file {name} unavailable: {reason}"),
    }
}

/// Serves each path id from a directory on disk.
#[derive(Debug, Default, Clone)]
pub struct DirectoryPlatform {
    roots: Vec<PathBuf>,
}

impl DirectoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a storage directory and return its path id.
    pub fn register(&mut self, dir: impl Into<PathBuf>) -> PathId {
        self.roots.push(dir.into());
        (self.roots.len() - 1) as PathId
    }

    pub fn root(&self, path: PathId) -> Option<&PathBuf> {
        self.roots.get(path as usize)
    }
}

struct DiskFile {
    file: File,
    size: u64,
}

impl VirtualFile for DiskFile {
    fn size(&self) -> u64 {
        self.size
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            match self.file.read(&mut buf[total..])? {
                0 => break,
                n => total += n,
            }
        }
        Ok(total)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.file.write_all(buf)?;
        self.size += buf.len() as u64;
        Ok(())
    }
}

impl Platform for DirectoryPlatform {
    fn open(
        &mut self,
        path: PathId,
        name: &str,
        mode: FileMode,
        requirement: Requirement,
    ) -> Option<Box<dyn VirtualFile>> {
        let Some(root) = self.root(path) else {
            report_missing(name, requirement, &format!("unknown path id {path}"));
            return None;
        };
        let full = root.join(name);
        let opened = match mode {
            FileMode::Read => File::open(&full),
            FileMode::Write => fs::create_dir_all(root).and_then(|_| File::create(&full)),
        };
        match opened {
            Ok(file) => {
                let size = match mode {
                    FileMode::Read => file.metadata().map(|m| m.len()).unwrap_or(0),
                    FileMode::Write => 0,
                };
                Some(Box::new(DiskFile { file, size }))
            }
            Err(e) => {
                report_missing(&full.display().to_string(), requirement, &e);
                None
            }
        }
    }
}

/// Keeps every file in memory. Useful for tests and for frontends that manage
/// storage themselves.
#[derive(Debug, Default, Clone)]
pub struct MemoryPlatform {
    files: HashMap<(PathId, String), Rc<RefCell<Vec<u8>>>>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: PathId, name: &str, data: Vec<u8>) {
        self.files
            .insert((path, name.to_string()), Rc::new(RefCell::new(data)));
    }

    pub fn get(&self, path: PathId, name: &str) -> Option<Vec<u8>> {
        self.files
            .get(&(path, name.to_string()))
            .map(|f| f.borrow().clone())
    }

    pub fn contains(&self, path: PathId, name: &str) -> bool {
        self.files.contains_key(&(path, name.to_string()))
    }

    pub fn remove(&mut self, path: PathId, name: &str) -> Option<Vec<u8>> {
        self.files
            .remove(&(path, name.to_string()))
            .map(|f| f.borrow().clone())
    }
}

struct MemoryFile {
    data: Rc<RefCell<Vec<u8>>>,
    position: usize,
}

impl VirtualFile for MemoryFile {
    fn size(&self) -> u64 {
        self.data.borrow().len() as u64
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.data.borrow();
        let available = data.len().saturating_sub(self.position);
        let n = available.min(buf.len());
        buf[..n].copy_from_slice(&data[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.data.borrow_mut().extend_from_slice(buf);
        Ok(())
    }
}

impl Platform for MemoryPlatform {
    fn open(
        &mut self,
        path: PathId,
        name: &str,
        mode: FileMode,
        requirement: Requirement,
    ) -> Option<Box<dyn VirtualFile>> {
        let key = (path, name.to_string());
        let data = match mode {
            FileMode::Read => match self.files.get(&key) {
                Some(data) => Rc::clone(data),
                None => {
                    report_missing(name, requirement, &"not present");
                    return None;
                }
            },
            FileMode::Write => {
                let data = Rc::new(RefCell::new(Vec::new()));
                self.files.insert(key, Rc::clone(&data));
                data
            }
        };
        Some(Box::new(MemoryFile { data, position: 0 }))
    }
}
