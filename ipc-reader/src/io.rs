//! The random-access source abstraction the reader is built against, plus the
//! concrete backends this crate ships.

use std::{
    fs::File,
    os::unix::fs::FileExt,
    sync::{Arc, OnceLock},
};

use bytes::Bytes;
use futures::executor::block_on;
use ipc_core::errors::Result;
use lazy_static::lazy_static;
use object_store::{path::Path, ObjectStore};

lazy_static! {
    static ref RUNTIME: tokio::runtime::Runtime = tokio::runtime::Runtime::new()
        .expect("failed to start the background tokio runtime used to bridge ObjectStore reads");
}

/// Abstraction over local files, in-memory buffers, and remote object stores.
/// `record_at` requires this to be safe for concurrent non-overlapping reads;
/// all implementations here satisfy that.
pub trait Reader {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()>;
    fn size(&self) -> Result<u64>;
}

impl Reader for File {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        FileExt::read_exact_at(self, buf, offset).map_err(Into::into)
    }

    fn size(&self) -> Result<u64> {
        File::metadata(self).map(|m| m.len()).map_err(Into::into)
    }
}

impl Reader for Arc<File> {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        Reader::read_exact_at(self.as_ref(), buf, offset)
    }

    fn size(&self) -> Result<u64> {
        Reader::size(self.as_ref())
    }
}

impl Reader for [u8] {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        let start = offset as usize;
        let end = start + buf.len();
        let slice = self.get(start..end).ok_or_else(|| {
            ipc_core::errors::Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("read past end of buffer: wanted {start}..{end}, have {}", self.len()),
            ))
        })?;
        buf.copy_from_slice(slice);
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        Ok(self.len() as u64)
    }
}

/// Lets any `&T` stand in for `T` as a [`Reader`], so borrowed sources
/// (`&[u8]`, `&File`, ...) can be passed directly to [`crate::reader::open`]
/// without an owning wrapper.
impl<T: Reader + ?Sized> Reader for &T {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        (**self).read_exact_at(buf, offset)
    }

    fn size(&self) -> Result<u64> {
        (**self).size()
    }
}

impl Reader for Bytes {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        Reader::read_exact_at(self.as_ref(), buf, offset)
    }

    fn size(&self) -> Result<u64> {
        Reader::size(self.as_ref())
    }
}

/// Bridges an async [`ObjectStore`] to the synchronous [`Reader`] contract by
/// driving requests through a dedicated background tokio runtime.
#[derive(Clone)]
pub struct ObjectStoreReadAt {
    object_store: Arc<dyn ObjectStore>,
    location: Arc<Path>,
    /// The file is assumed immutable for the reader's lifetime.
    cached_size: OnceLock<u64>,
}

impl ObjectStoreReadAt {
    pub fn new(object_store: Arc<dyn ObjectStore>, location: Arc<Path>) -> Self {
        Self {
            object_store,
            location,
            cached_size: OnceLock::new(),
        }
    }
}

impl Reader for ObjectStoreReadAt {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        let start = offset as usize;
        let len = buf.len();
        let object_store = Arc::clone(&self.object_store);
        let location = self.location.clone();
        let result = block_on(async move {
            RUNTIME
                .spawn(async move { object_store.get_range(&location, start..start + len).await })
                .await
                .expect("object store read task panicked")
        });
        let bytes = result?;
        buf.copy_from_slice(bytes.as_ref());
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        if let Some(size) = self.cached_size.get() {
            return Ok(*size);
        }
        let object_store = Arc::clone(&self.object_store);
        let location = self.location.clone();
        let meta = block_on(async move {
            RUNTIME
                .spawn(async move { object_store.head(&location).await })
                .await
                .expect("object store head task panicked")
        })?;
        Ok(*self.cached_size.get_or_init(|| meta.size as u64))
    }
}

impl Reader for Arc<ObjectStoreReadAt> {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        Reader::read_exact_at(self.as_ref(), buf, offset)
    }

    fn size(&self) -> Result<u64> {
        Reader::size(self.as_ref())
    }
}
